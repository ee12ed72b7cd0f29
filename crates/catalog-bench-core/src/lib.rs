//! Core library for catalog-bench.
//!
//! Drives a mixed read/update workload against an Iceberg REST catalog:
//! a background task keeps a bearer token fresh, a gate holds the workload
//! back until the first token arrives, and a weighted selector dispatches
//! each iteration to one of the catalog operations, feeding it entities from
//! a generated namespace tree.

pub mod api;
pub mod auth;
pub mod bench;
pub mod config;
pub mod dataset;
pub mod report;
pub mod utils;
pub mod version;
pub mod workload;

pub use api::{ApiError, CatalogClient};
pub use auth::{Authenticator, CredentialHolder, GateError, RefreshSummary};
pub use bench::run_benchmark;
pub use config::Config;
pub use dataset::{CircularFeeder, TreeDataset};
pub use report::{RunReport, RunSummary};
pub use version::VersionError;
pub use workload::{
    Branch, InjectionProfile, Operation, OperationExecutor, OperationFeeders, WorkloadRunner,
    WorkloadSelector,
};

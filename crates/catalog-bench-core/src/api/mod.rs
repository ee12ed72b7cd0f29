//! REST client module for the Iceberg catalog under test.
//!
//! This module provides the `CatalogClient` for authenticating against the
//! catalog's OAuth token endpoint and issuing the namespace, table and view
//! requests the workload is made of.
//!
//! The catalog uses bearer token authentication obtained through the
//! client-credentials grant.

pub mod client;
pub mod error;

pub use client::CatalogClient;
pub use error::ApiError;

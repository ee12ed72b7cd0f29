//! Credential lifecycle for the benchmark.
//!
//! This module provides:
//! - `CredentialHolder`: the shared cell every worker reads its bearer token from
//! - `refresh`: the background loop that re-authenticates on a fixed interval
//! - `gate`: the wait that holds the workload back until a token exists

pub mod credential;
pub mod gate;
pub mod refresh;

pub use credential::CredentialHolder;
pub use gate::{wait_for_token, GateError, DEFAULT_POLL_INTERVAL};
pub use refresh::{spawn_refresh_loop, Authenticator, RefreshSummary, DEFAULT_REFRESH_INTERVAL};

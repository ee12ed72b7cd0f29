//! Workload model: operations, their feeders, the weighted selector, the
//! arrival profile and the runner that ties them together.

mod feeders;
mod injection;
mod operation;
mod runner;
mod selector;

pub use feeders::OperationFeeders;
pub use injection::InjectionProfile;
pub use operation::{Branch, Invocation, Operation, OperationExecutor, OperationInput};
pub use runner::{execute_invocation, WorkloadRunner};
pub use selector::WorkloadSelector;

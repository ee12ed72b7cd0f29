use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::dataset::{EntityIdentity, NamespaceIdentity, PropertyUpdate};

/// Top-level split of the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Read,
    Write,
}

impl Branch {
    pub fn operations(self) -> &'static [Operation] {
        match self {
            Branch::Read => &Operation::READS,
            Branch::Write => &Operation::WRITES,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Read => write!(f, "Read"),
            Branch::Write => write!(f, "Write"),
        }
    }
}

/// One catalog request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListNamespaces,
    NamespaceExists,
    FetchNamespace,
    ListTables,
    TableExists,
    FetchTable,
    ListViews,
    ViewExists,
    FetchView,
    UpdateNamespaceProperties,
    UpdateTableProperties,
    UpdateViewProperties,
}

impl Operation {
    pub const READS: [Operation; 9] = [
        Operation::ListNamespaces,
        Operation::NamespaceExists,
        Operation::FetchNamespace,
        Operation::ListTables,
        Operation::TableExists,
        Operation::FetchTable,
        Operation::ListViews,
        Operation::ViewExists,
        Operation::FetchView,
    ];

    pub const WRITES: [Operation; 3] = [
        Operation::UpdateNamespaceProperties,
        Operation::UpdateTableProperties,
        Operation::UpdateViewProperties,
    ];

    pub fn all() -> impl Iterator<Item = Operation> {
        Self::READS.into_iter().chain(Self::WRITES)
    }

    pub fn branch(self) -> Branch {
        match self {
            Operation::UpdateNamespaceProperties
            | Operation::UpdateTableProperties
            | Operation::UpdateViewProperties => Branch::Write,
            _ => Branch::Read,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Operation::ListNamespaces => "List child namespaces",
            Operation::NamespaceExists => "Check namespace exists",
            Operation::FetchNamespace => "Fetch namespace",
            Operation::ListTables => "List tables",
            Operation::TableExists => "Check table exists",
            Operation::FetchTable => "Fetch table",
            Operation::ListViews => "List views",
            Operation::ViewExists => "Check view exists",
            Operation::FetchView => "Fetch view",
            Operation::UpdateNamespaceProperties => "Update namespace properties",
            Operation::UpdateTableProperties => "Update table properties",
            Operation::UpdateViewProperties => "Update view properties",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Record an operation consumes from its feeder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationInput {
    Namespace(NamespaceIdentity),
    Entity(EntityIdentity),
    NamespaceUpdate(PropertyUpdate<NamespaceIdentity>),
    EntityUpdate(PropertyUpdate<EntityIdentity>),
}

/// An operation paired with the record it was fed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub operation: Operation,
    pub input: OperationInput,
}

/// Executes one invocation against the catalog.
///
/// The token is the one captured from the credential holder when the
/// iteration started.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, invocation: &Invocation, token: &str) -> Result<()>;
}

#[async_trait]
impl<E: OperationExecutor + ?Sized> OperationExecutor for std::sync::Arc<E> {
    async fn execute(&self, invocation: &Invocation, token: &str) -> Result<()> {
        (**self).execute(invocation, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_membership() {
        assert_eq!(Operation::READS.len(), 9);
        assert_eq!(Operation::WRITES.len(), 3);
        assert!(Operation::READS.iter().all(|op| op.branch() == Branch::Read));
        assert!(Operation::WRITES.iter().all(|op| op.branch() == Branch::Write));
        assert_eq!(Operation::all().count(), 12);
    }

    #[test]
    fn test_display() {
        assert_eq!(Operation::FetchTable.to_string(), "Fetch table");
        assert_eq!(Branch::Write.to_string(), "Write");
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&Operation::UpdateViewProperties).unwrap(),
            "\"update_view_properties\""
        );
    }
}

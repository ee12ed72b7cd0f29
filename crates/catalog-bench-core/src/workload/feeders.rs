//! Operation-to-feeder table.
//!
//! Every operation owns a separate feeder, even when two operations walk the
//! same records, so each one cycles through the dataset on its own.

use std::collections::{BTreeMap, HashSet};

use crate::dataset::{
    CircularFeeder, EntityIdentity, NamespaceIdentity, PropertyUpdateFeeder, TreeDataset,
};

use super::{Invocation, Operation, OperationInput};

#[derive(Debug)]
enum Source {
    Namespaces(CircularFeeder<NamespaceIdentity>),
    Entities(CircularFeeder<EntityIdentity>),
    NamespaceUpdates(PropertyUpdateFeeder<NamespaceIdentity>),
    EntityUpdates(PropertyUpdateFeeder<EntityIdentity>),
}

impl Source {
    fn draw(&self) -> Option<OperationInput> {
        match self {
            Source::Namespaces(f) => f.next_record().map(OperationInput::Namespace),
            Source::Entities(f) => f.next_record().map(OperationInput::Entity),
            Source::NamespaceUpdates(f) => f.next_record().map(OperationInput::NamespaceUpdate),
            Source::EntityUpdates(f) => f.next_record().map(OperationInput::EntityUpdate),
        }
    }

    fn len(&self) -> usize {
        match self {
            Source::Namespaces(f) => f.len(),
            Source::Entities(f) => f.len(),
            Source::NamespaceUpdates(f) => f.len(),
            Source::EntityUpdates(f) => f.len(),
        }
    }
}

#[derive(Debug)]
pub struct OperationFeeders {
    sources: BTreeMap<Operation, Source>,
}

impl OperationFeeders {
    pub fn from_dataset(dataset: &TreeDataset) -> Self {
        let shape = dataset.shape();
        let namespaces = dataset.namespaces().to_vec();
        let tables = dataset.tables().to_vec();
        let views = dataset.views().to_vec();
        let table_parents = parents_of(&tables);
        let view_parents = parents_of(&views);

        let ns = |records: &[NamespaceIdentity]| {
            Source::Namespaces(CircularFeeder::new(records.to_vec()))
        };
        let entities = |records: &[EntityIdentity]| {
            Source::Entities(CircularFeeder::new(records.to_vec()))
        };

        let mut sources = BTreeMap::new();
        sources.insert(Operation::ListNamespaces, ns(&namespaces));
        sources.insert(Operation::NamespaceExists, ns(&namespaces));
        sources.insert(Operation::FetchNamespace, ns(&namespaces));
        sources.insert(Operation::ListTables, ns(&table_parents));
        sources.insert(Operation::TableExists, entities(&tables));
        sources.insert(Operation::FetchTable, entities(&tables));
        sources.insert(Operation::ListViews, ns(&view_parents));
        sources.insert(Operation::ViewExists, entities(&views));
        sources.insert(Operation::FetchView, entities(&views));
        sources.insert(
            Operation::UpdateNamespaceProperties,
            Source::NamespaceUpdates(PropertyUpdateFeeder::new(
                namespaces,
                shape.namespace_properties,
            )),
        );
        sources.insert(
            Operation::UpdateTableProperties,
            Source::EntityUpdates(PropertyUpdateFeeder::new(tables, shape.table_properties)),
        );
        sources.insert(
            Operation::UpdateViewProperties,
            Source::EntityUpdates(PropertyUpdateFeeder::new(views, shape.view_properties)),
        );

        Self { sources }
    }

    /// Whether the operation has any record to run against.
    pub fn is_available(&self, operation: Operation) -> bool {
        self.len(operation) > 0
    }

    pub fn len(&self, operation: Operation) -> usize {
        self.sources.get(&operation).map(Source::len).unwrap_or(0)
    }

    /// Draw the next record for `operation`.
    pub fn draw(&self, operation: Operation) -> Option<Invocation> {
        let input = self.sources.get(&operation)?.draw()?;
        Some(Invocation { operation, input })
    }
}

/// Distinct namespaces that contain at least one of `entities`, in first-seen order.
fn parents_of(entities: &[EntityIdentity]) -> Vec<NamespaceIdentity> {
    let mut seen = HashSet::new();
    entities
        .iter()
        .filter(|e| seen.insert((e.catalog.clone(), e.namespace.clone())))
        .map(|e| NamespaceIdentity {
            catalog: e.catalog.clone(),
            namespace: e.namespace.clone(),
        })
        .collect()
}

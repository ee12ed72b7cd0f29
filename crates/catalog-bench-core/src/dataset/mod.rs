//! Benchmark dataset: the entity tree the workload reads and updates.
//!
//! This module provides:
//! - `TreeDataset`: deterministic catalogs / namespace tree / tables / views
//! - `CircularFeeder`: a round-robin record source shared by concurrent workers
//! - `PropertyUpdateFeeder`: identities paired with a fresh property update per draw

pub mod feeder;
pub mod tree;

pub use feeder::{CircularFeeder, PropertyUpdate, PropertyUpdateFeeder};
pub use tree::{EntityIdentity, NamespaceIdentity, NamespacePath, TreeDataset, TreeShape};

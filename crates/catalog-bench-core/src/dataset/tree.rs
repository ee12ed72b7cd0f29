//! N-ary namespace tree dataset.
//!
//! Namespace ordinal 0 is the root; the children of ordinal `n` are
//! `n * width + 1 ..= n * width + width`. Tables and views only live in
//! leaf namespaces and are numbered globally in leaf order.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

/// Separator Iceberg REST uses between namespace levels in a path parameter.
pub const NAMESPACE_SEPARATOR: char = '\u{1F}';

/// Largest number of namespaces, tables or views a dataset may hold across
/// all catalogs.
pub const MAX_ENTITIES: usize = 1_000_000;

/// Shape of the generated dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeShape {
    pub num_catalogs: usize,
    pub namespace_width: usize,
    pub namespace_depth: usize,
    pub tables_per_namespace: usize,
    /// Upper bound on the total number of tables, -1 for none
    pub max_tables: i64,
    pub views_per_namespace: usize,
    /// Upper bound on the total number of views, -1 for none
    pub max_views: i64,
    pub namespace_properties: usize,
    pub table_properties: usize,
    pub view_properties: usize,
}

impl Default for TreeShape {
    fn default() -> Self {
        Self {
            num_catalogs: 1,
            namespace_width: 2,
            namespace_depth: 4,
            tables_per_namespace: 5,
            max_tables: -1,
            views_per_namespace: 3,
            max_views: -1,
            namespace_properties: 10,
            table_properties: 10,
            view_properties: 10,
        }
    }
}

impl TreeShape {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_catalogs == 0 {
            return Err(ConfigError::Invalid("dataset.num_catalogs must be at least 1".into()));
        }
        if self.namespace_width == 0 {
            return Err(ConfigError::Invalid("dataset.namespace_width must be at least 1".into()));
        }
        if self.namespace_depth == 0 {
            return Err(ConfigError::Invalid("dataset.namespace_depth must be at least 1".into()));
        }
        if self.max_tables < -1 || self.max_views < -1 {
            return Err(ConfigError::Invalid(
                "dataset.max_tables and dataset.max_views must be -1 or non-negative".into(),
            ));
        }
        let too_large = || {
            ConfigError::Invalid(format!(
                "dataset of width {} and depth {} exceeds {} entities",
                self.namespace_width, self.namespace_depth, MAX_ENTITIES
            ))
        };
        let leaves = self.leaf_count().ok_or_else(too_large)?;
        let sizes = [
            self.namespace_count(),
            Some(Self::capped(self.tables_per_namespace, leaves, self.max_tables)),
            Some(Self::capped(self.views_per_namespace, leaves, self.max_views)),
        ];
        for size in sizes {
            match size.and_then(|n| n.checked_mul(self.num_catalogs)) {
                Some(total) if total <= MAX_ENTITIES => {}
                _ => return Err(too_large()),
            }
        }
        Ok(())
    }

    /// Number of namespaces in the tree, `None` on overflow.
    pub fn namespace_count(&self) -> Option<usize> {
        let mut total: usize = 0;
        let mut level: usize = 1;
        for depth in 0..self.namespace_depth {
            total = total.checked_add(level)?;
            if depth + 1 < self.namespace_depth {
                level = level.checked_mul(self.namespace_width)?;
            }
        }
        Some(total)
    }

    /// Number of namespaces on the deepest level.
    pub fn leaf_count(&self) -> Option<usize> {
        let exp = u32::try_from(self.namespace_depth.checked_sub(1)?).ok()?;
        self.namespace_width.checked_pow(exp)
    }

    fn capped(per_leaf: usize, leaves: usize, max: i64) -> usize {
        let total = per_leaf.saturating_mul(leaves);
        if max < 0 {
            total
        } else {
            total.min(max as usize)
        }
    }
}

/// Ordered namespace levels, root first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacePath(Vec<String>);

impl NamespacePath {
    pub fn new(levels: Vec<String>) -> Self {
        Self(levels)
    }

    /// Levels joined with the unit separator, as used in REST paths.
    pub fn encoded(&self) -> String {
        self.0.join(&NAMESPACE_SEPARATOR.to_string())
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceIdentity {
    pub catalog: String,
    pub namespace: NamespacePath,
}

/// A table or view inside a leaf namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityIdentity {
    pub catalog: String,
    pub namespace: NamespacePath,
    pub name: String,
}

/// Fully materialized dataset.
#[derive(Debug, Clone)]
pub struct TreeDataset {
    shape: TreeShape,
    namespaces: Vec<NamespaceIdentity>,
    tables: Vec<EntityIdentity>,
    views: Vec<EntityIdentity>,
}

impl TreeDataset {
    pub fn generate(shape: TreeShape) -> Result<Self, ConfigError> {
        shape.validate()?;

        let ns_count = shape.namespace_count().unwrap_or(0);
        let leaf_count = shape.leaf_count().unwrap_or(0);
        let first_leaf = ns_count - leaf_count;
        let table_count =
            TreeShape::capped(shape.tables_per_namespace, leaf_count, shape.max_tables);
        let view_count = TreeShape::capped(shape.views_per_namespace, leaf_count, shape.max_views);

        let catalogs: Vec<String> = (0..shape.num_catalogs).map(catalog_name).collect();
        let paths: Vec<NamespacePath> = (0..ns_count)
            .map(|ordinal| namespace_path(ordinal, shape.namespace_width))
            .collect();

        let mut namespaces = Vec::with_capacity(ns_count * catalogs.len());
        let mut tables = Vec::with_capacity(table_count * catalogs.len());
        let mut views = Vec::with_capacity(view_count * catalogs.len());

        for catalog in &catalogs {
            for path in &paths {
                namespaces.push(NamespaceIdentity {
                    catalog: catalog.clone(),
                    namespace: path.clone(),
                });
            }
            for ordinal in 0..table_count {
                let leaf = first_leaf + ordinal / shape.tables_per_namespace;
                tables.push(EntityIdentity {
                    catalog: catalog.clone(),
                    namespace: paths[leaf].clone(),
                    name: format!("T_{}", ordinal),
                });
            }
            for ordinal in 0..view_count {
                let leaf = first_leaf + ordinal / shape.views_per_namespace;
                views.push(EntityIdentity {
                    catalog: catalog.clone(),
                    namespace: paths[leaf].clone(),
                    name: format!("V_{}", ordinal),
                });
            }
        }

        debug!(
            catalogs = catalogs.len(),
            namespaces = namespaces.len(),
            tables = tables.len(),
            views = views.len(),
            "Tree dataset generated"
        );

        Ok(Self {
            shape,
            namespaces,
            tables,
            views,
        })
    }

    pub fn shape(&self) -> &TreeShape {
        &self.shape
    }

    pub fn namespaces(&self) -> &[NamespaceIdentity] {
        &self.namespaces
    }

    pub fn tables(&self) -> &[EntityIdentity] {
        &self.tables
    }

    pub fn views(&self) -> &[EntityIdentity] {
        &self.views
    }
}

pub fn catalog_name(index: usize) -> String {
    format!("C_{}", index)
}

/// Path from the root down to `ordinal`.
pub fn namespace_path(ordinal: usize, width: usize) -> NamespacePath {
    let mut ordinals = vec![ordinal];
    let mut current = ordinal;
    while current > 0 {
        current = (current - 1) / width;
        ordinals.push(current);
    }
    ordinals.reverse();
    NamespacePath::new(ordinals.into_iter().map(|o| format!("NS_{}", o)).collect())
}

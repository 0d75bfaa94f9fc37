// src/catalog/view.rs

use crate::error::{Result, RewriteError};
use crate::plan::expr::DataType;
use crate::plan::node::LogicalPlan;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered materialized view: its name, the analyzed plan that defines
/// it, and the output schema snapshotted at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    pub plan: LogicalPlan,
    pub schema: Vec<(String, DataType)>,
}

/// Registry of materialized views, iterated in registration order during
/// matching. Views are immutable once registered.
#[derive(Debug, Default)]
pub struct ViewCatalog {
    views: Vec<ViewDefinition>,
    /// Map from lowercase view name → position for fast lookup.
    index: HashMap<String, usize>,
}

impl ViewCatalog {
    pub fn new() -> Self {
        ViewCatalog {
            views: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a view under `name`; error if the name is already taken.
    /// The view's output schema is derived from its defining plan here and
    /// never recomputed.
    pub fn register(&mut self, name: &str, plan: LogicalPlan) -> Result<()> {
        let key = name.to_ascii_lowercase();
        if self.index.contains_key(&key) {
            return Err(RewriteError::DuplicateView {
                name: name.to_string(),
            });
        }
        let schema = plan.output_schema();
        self.index.insert(key, self.views.len());
        self.views.push(ViewDefinition {
            name: name.to_string(),
            plan,
            schema,
        });
        Ok(())
    }

    /// Look up a view by name (case-insensitive).
    pub fn lookup(&self, name: &str) -> Option<&ViewDefinition> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.views[i])
    }

    /// All registered views, in registration order.
    pub fn all(&self) -> &[ViewDefinition] {
        &self.views
    }

    /// Whether `table` names a registered view. The driver uses this to
    /// recognize scans that already read from a view.
    pub fn contains(&self, table: &str) -> bool {
        self.index.contains_key(&table.to_ascii_lowercase())
    }
}

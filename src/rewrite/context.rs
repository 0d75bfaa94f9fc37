// src/rewrite/context.rs

use crate::plan::expr::{ColumnId, Expr};
use std::collections::HashMap;

/// Result of one matcher: whether the view covers the query fragment, and the
/// residual expressions to re-apply on top of the view scan if it does.
#[derive(Debug, Clone, PartialEq)]
pub struct Compensation {
    pub applicable: bool,
    pub residual: Vec<Expr>,
}

impl Compensation {
    /// The "no match" sentinel.
    pub fn not_applicable() -> Self {
        Compensation {
            applicable: false,
            residual: Vec::new(),
        }
    }

    pub fn of(residual: Vec<Expr>) -> Self {
        Compensation {
            applicable: true,
            residual,
        }
    }
}

/// Per-invocation rewrite state, threaded through the ordered matcher calls
/// by plain parameter passing. Never shared across concurrent invocations.
#[derive(Debug, Default)]
pub struct RewriteContext {
    /// Name of the view matched for the subplan currently being replaced.
    /// Write-once per subplan.
    matched_view: Option<String>,
    /// Original column identity token → replacement reference sourced from
    /// the view scan. Consulted by the finishing reference-repair pass.
    column_map: HashMap<ColumnId, Expr>,
}

impl RewriteContext {
    pub fn new() -> Self {
        RewriteContext::default()
    }

    pub fn begin_subplan(&mut self, view_name: &str) {
        self.matched_view = Some(view_name.to_string());
    }

    pub fn matched_view(&self) -> Option<&str> {
        self.matched_view.as_deref()
    }

    pub fn record_replacement(&mut self, original: ColumnId, replacement: Expr) {
        self.column_map.entry(original).or_insert(replacement);
    }

    pub fn replacement_for(&self, id: ColumnId) -> Option<&Expr> {
        self.column_map.get(&id)
    }

    pub fn has_replacements(&self) -> bool {
        !self.column_map.is_empty()
    }
}

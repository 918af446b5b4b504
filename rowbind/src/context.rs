//! Per-execution context objects
//!
//! Thin handles that thread the active configuration scope (and, for
//! results, the cursor's column shape) through binder and producer
//! invocations.

use std::sync::Arc;

use crate::config::ConfigScope;
use crate::value::{ResultShape, RowCursor};

/// Execution context for binding parameters into one statement.
#[derive(Clone)]
pub struct StatementContext {
    scope: Arc<ConfigScope>,
}

impl StatementContext {
    pub fn new(scope: Arc<ConfigScope>) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &ConfigScope {
        &self.scope
    }
}

/// Execution context for mapping one result, carrying the column shape
/// snapshotted from the cursor.
#[derive(Clone)]
pub struct ResultContext {
    scope: Arc<ConfigScope>,
    shape: ResultShape,
}

impl ResultContext {
    pub fn new(scope: Arc<ConfigScope>, cursor: &dyn RowCursor) -> Self {
        let shape = ResultShape::from_cursor(cursor);
        Self { scope, shape }
    }

    pub fn scope(&self) -> &ConfigScope {
        &self.scope
    }

    pub fn shape(&self) -> &ResultShape {
        &self.shape
    }
}

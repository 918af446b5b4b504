//! In-memory sink and cursor doubles shared across the test suite.

use crate::error::BindingError;
use crate::value::{ParameterSink, RowCursor, SqlTypeTag, SqlValue};

/// One recorded sink operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    Value(SqlValue),
    Null(SqlTypeTag),
    UntypedNull,
}

/// Parameter sink that records every operation in call order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub ops: Vec<(usize, SinkOp)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParameterSink for RecordingSink {
    fn set_value(&mut self, position: usize, value: SqlValue) -> Result<(), BindingError> {
        self.ops.push((position, SinkOp::Value(value)));
        Ok(())
    }

    fn set_null(&mut self, position: usize, tag: SqlTypeTag) -> Result<(), BindingError> {
        self.ops.push((position, SinkOp::Null(tag)));
        Ok(())
    }

    fn set_untyped_null(&mut self, position: usize) -> Result<(), BindingError> {
        self.ops.push((position, SinkOp::UntypedNull));
        Ok(())
    }
}

/// Parameter sink for protocols without an untyped-null operation.
#[derive(Debug, Default)]
pub struct TypedOnlySink {
    pub ops: Vec<(usize, SinkOp)>,
}

impl TypedOnlySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParameterSink for TypedOnlySink {
    fn set_value(&mut self, position: usize, value: SqlValue) -> Result<(), BindingError> {
        self.ops.push((position, SinkOp::Value(value)));
        Ok(())
    }

    fn set_null(&mut self, position: usize, tag: SqlTypeTag) -> Result<(), BindingError> {
        self.ops.push((position, SinkOp::Null(tag)));
        Ok(())
    }

    fn set_untyped_null(&mut self, position: usize) -> Result<(), BindingError> {
        Err(BindingError::Rejected {
            position,
            reason: "this statement requires a type code on every null".to_string(),
        })
    }
}

/// Row cursor over in-memory rows, positioned before the first row.
pub struct VecCursor {
    labels: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    row: Option<usize>,
}

impl VecCursor {
    pub fn new(labels: Vec<&str>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            labels: labels.into_iter().map(str::to_string).collect(),
            rows,
            row: None,
        }
    }
}

impl RowCursor for VecCursor {
    fn advance(&mut self) -> bool {
        let next = self.row.map_or(0, |current| current + 1);
        self.row = Some(next);
        next < self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.labels.len()
    }

    fn column_label(&self, position: usize) -> Option<&str> {
        self.labels.get(position).map(String::as_str)
    }

    fn value_at(&self, position: usize) -> Option<SqlValue> {
        self.row
            .and_then(|current| self.rows.get(current))
            .and_then(|row| row.get(position))
            .cloned()
    }
}

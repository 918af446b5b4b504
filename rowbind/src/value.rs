//! In-process SQL value surface and the boundary contracts to the excluded
//! statement-execution and result-iteration collaborators.
//!
//! The engine never owns wire bytes or SQL text; it hands [`SqlValue`]s to a
//! [`ParameterSink`] and reads them back from a [`RowCursor`].

use std::fmt;

use crate::descriptor::{StaticType, TypeDescriptor};
use crate::error::BindingError;

/// SQL type code for a parameter slot.
///
/// Required even for nulls: most database protocols want an explicit type
/// code on every parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlTypeTag {
    Boolean,
    Integer,
    Float,
    Text,
    Blob,
}

impl fmt::Display for SqlTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Blob => "blob",
        };
        write!(f, "{name}")
    }
}

/// One bound parameter value or one result column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlTypeTag),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn tag(&self) -> SqlTypeTag {
        match self {
            Self::Null(tag) => *tag,
            Self::Boolean(_) => SqlTypeTag::Boolean,
            Self::Integer(_) => SqlTypeTag::Integer,
            Self::Float(_) => SqlTypeTag::Float,
            Self::Text(_) => SqlTypeTag::Text,
            Self::Blob(_) => SqlTypeTag::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(_) => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Blob(v) => write!(f, "{} byte blob", v.len()),
        }
    }
}

impl StaticType for SqlValue {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::scalar::<SqlValue>()
    }
}

/// Parameter slots of a native statement handle, owned by the excluded
/// statement-execution layer.
pub trait ParameterSink {
    fn set_value(&mut self, position: usize, value: SqlValue) -> Result<(), BindingError>;

    /// Bind a null carrying an explicit type code.
    fn set_null(&mut self, position: usize, tag: SqlTypeTag) -> Result<(), BindingError>;

    /// Bind a null without a type code; sinks for protocols that cannot
    /// express this should reject it.
    fn set_untyped_null(&mut self, position: usize) -> Result<(), BindingError>;
}

/// Read access to one row of a result cursor plus its column metadata, owned
/// by the excluded result-iteration layer.
///
/// A fresh cursor is positioned before the first row; [`RowCursor::advance`]
/// moves it forward and reports whether a row is available.
pub trait RowCursor {
    fn advance(&mut self) -> bool;

    fn column_count(&self) -> usize;

    /// Label of the column at `position`, if in range.
    fn column_label(&self, position: usize) -> Option<&str>;

    /// Value of the column at `position` in the current row, if in range.
    fn value_at(&self, position: usize) -> Option<SqlValue>;
}

/// The live column set of one result, snapshotted once per execution.
///
/// Shapes key specialization caches: the same target type can map
/// differently against different column sets within one scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultShape {
    labels: Vec<String>,
}

impl ResultShape {
    pub fn from_cursor(cursor: &dyn RowCursor) -> Self {
        let labels = (0..cursor.column_count())
            .map(|i| cursor.column_label(i).unwrap_or_default().to_string())
            .collect();
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn width(&self) -> usize {
        self.labels.len()
    }

    pub fn position_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn values_render_loggable_text() {
        assert_eq!(SqlValue::Null(SqlTypeTag::Text).to_string(), "NULL");
        assert_eq!(SqlValue::Integer(42).to_string(), "42");
        assert_eq!(SqlValue::Text("Brian".into()).to_string(), "'Brian'");
        assert_eq!(SqlValue::Blob(vec![1, 2, 3]).to_string(), "3 byte blob");
    }

    #[test]
    fn tags_match_variants() {
        assert_eq!(SqlValue::Integer(1).tag(), SqlTypeTag::Integer);
        assert_eq!(SqlValue::Null(SqlTypeTag::Blob).tag(), SqlTypeTag::Blob);
        assert!(SqlValue::Null(SqlTypeTag::Text).is_null());
        assert!(!SqlValue::Boolean(true).is_null());
    }
}

//! # Core Type Definitions
//!
//! This module contains the shared types of the metagraph engine:
//! - Element identifiers (`ElementId`)
//! - Runtime values (`Value`) held by attributes and binding-table cells
//! - Document literals (`Literal`) used when loading models
//! - Error types (`MetagraphError`)
//!
//! ## Equality and Ordering
//!
//! `Value` compares Integer and Real numerically, so `1 = 1.0` holds in
//! queries and in `DISTINCT` deduplication. Values of different kinds are
//! never equal and are unordered.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// ELEMENT IDENTIFIER
// =============================================================================

/// Opaque identifier of an instance.
///
/// Ids are random v4 UUIDs, so ids allocated by independent stores never
/// collide when those stores are federated through mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub Uuid);

impl ElementId {
    /// Allocate a fresh, globally unique id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// A runtime value: a primitive, an instance reference, a list, or null.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    Ref(ElementId),
    List(Vec<Value>),
}

impl Value {
    /// Check whether this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the referenced element, if this is a reference.
    #[must_use]
    pub fn as_ref_id(&self) -> Option<ElementId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Get the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the boolean payload, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Human-readable name of the value's kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "Boolean",
            Self::Int(_) => "Integer",
            Self::Real(_) => "Real",
            Self::Str(_) => "String",
            Self::Ref(_) => "reference",
            Self::List(_) => "list",
        }
    }

    /// Collapse a list of ids into a reference value.
    ///
    /// Single-valued ends unwrap to the one reference (or null when unset).
    #[must_use]
    pub fn from_ids(ids: Vec<ElementId>, single_valued: bool) -> Self {
        if single_valued {
            return ids.first().map_or(Self::Null, |id| Self::Ref(*id));
        }
        Self::List(ids.into_iter().map(Self::Ref).collect())
    }

    /// Ordering used by comparison operators.
    ///
    /// Returns `None` for nulls and for values of incomparable kinds.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Real(b)) => (*a as f64).partial_cmp(b),
            (Self::Real(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Real(a), Self::Real(b)) => a.partial_cmp(b),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Real(r) => write!(f, "{}", r),
            Self::Str(s) => write!(f, "{}", s),
            Self::Ref(id) => write!(f, "#{}", id),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Self::Real(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<ElementId> for Value {
    fn from(id: ElementId) -> Self {
        Self::Ref(id)
    }
}

/// References serialize as `{"$ref": "<uuid>"}` so they stay distinct from strings.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Real(r) => serializer.serialize_f64(*r),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Ref(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$ref", &id.to_string())?;
                map.end()
            }
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

// =============================================================================
// LITERAL
// =============================================================================

/// An attribute literal as written in a model document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    List(Vec<Literal>),
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Bool(b) => Self::Bool(b),
            Literal::Int(i) => Self::Int(i),
            Literal::Real(r) => Self::Real(r),
            Literal::Str(s) => Self::Str(s),
            Literal::List(items) => Self::List(items.into_iter().map(Self::from).collect()),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the metagraph engine.
///
/// - Write paths fail fast and leave the store unmodified
/// - Read paths never fail on unknown ids; they return `None` or `Value::Null`
/// - The engine never panics on bad input
#[derive(Debug, Error)]
pub enum MetagraphError {
    /// An unregistered class, association or property was referenced,
    /// or the schema itself is inconsistent.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A value or link endpoint does not conform to its declared type.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// The operation is not permitted on this member or element.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A write would exceed the upper bound of a property or association end.
    #[error("Multiplicity violation on {element}.{property}: upper bound {upper}, attempted {attempted}")]
    MultiplicityViolation {
        element: ElementId,
        property: String,
        upper: u32,
        attempted: usize,
    },

    /// The element is visible neither locally nor through any mount.
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    /// The query text is malformed.
    #[error("GQL parse error at offset {offset}: {message}")]
    GqlParse { offset: usize, message: String },

    /// No operation evaluator exists anywhere in the inheritance chain.
    #[error("Operation not found: {class}::{operation}")]
    OperationNotFound { class: String, operation: String },

    /// An operation evaluator reported failure.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// A schema or model document could not be interpreted.
    #[error("Document error: {0}")]
    Document(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_ids_are_unique() {
        let a = ElementId::new();
        let b = ElementId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn numeric_values_compare_across_kinds() {
        assert_eq!(Value::Int(1), Value::Real(1.0));
        assert_eq!(Value::Int(2).compare(&Value::Real(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Str("a".into()).compare(&Value::Int(1)), None);
    }

    #[test]
    fn null_equals_only_null() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Int(0));
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn from_ids_unwraps_single_valued() {
        let id = ElementId::new();
        assert_eq!(Value::from_ids(vec![id], true), Value::Ref(id));
        assert_eq!(Value::from_ids(Vec::new(), true), Value::Null);
        assert_eq!(
            Value::from_ids(vec![id], false),
            Value::List(vec![Value::Ref(id)])
        );
    }

    #[test]
    fn literal_converts_to_value() {
        let literal = Literal::List(vec![Literal::Int(1), Literal::Str("x".into())]);
        assert_eq!(
            Value::from(literal),
            Value::List(vec![Value::Int(1), Value::Str("x".into())])
        );
    }

    #[test]
    fn display_renders_lists() {
        let v = Value::List(vec![Value::Int(1), Value::Bool(true), Value::Null]);
        assert_eq!(v.to_string(), "[1, true, null]");
    }
}

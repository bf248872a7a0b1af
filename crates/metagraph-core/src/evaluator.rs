//! # Evaluator Registry
//!
//! Explicit dispatch tables for derived properties and operations.
//!
//! Evaluators are keyed by `(class name, member name)`. Lookup walks the
//! precomputed superclass order of the instance's class, so an evaluator
//! registered on a subclass overrides one registered on an ancestor.
//! The registry is filled at startup and read-only afterwards.

use crate::view::ModelView;
use crate::{ElementId, MetagraphError, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Computes a derived property of one instance.
pub type DerivedFn = dyn Fn(&dyn ModelView, ElementId) -> Value + Send + Sync;

/// Executes an operation on one instance with positional arguments.
pub type OperationFn =
    dyn Fn(&dyn ModelView, ElementId, &[Value]) -> Result<Value, MetagraphError> + Send + Sync;

/// `(class, member) -> evaluator` tables.
#[derive(Default, Clone)]
pub struct EvaluatorRegistry {
    derived: BTreeMap<(String, String), Arc<DerivedFn>>,
    operations: BTreeMap<(String, String), Arc<OperationFn>>,
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("derived", &self.derived.keys().collect::<Vec<_>>())
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EvaluatorRegistry {
    /// Insert or replace a derived-property evaluator.
    pub(crate) fn insert_derived(&mut self, class: String, member: String, f: Arc<DerivedFn>) {
        self.derived.insert((class, member), f);
    }

    /// Insert or replace an operation evaluator.
    pub(crate) fn insert_operation(
        &mut self,
        class: String,
        operation: String,
        f: Arc<OperationFn>,
    ) {
        self.operations.insert((class, operation), f);
    }

    /// Evaluator registered exactly on `class.member` (no inheritance walk).
    #[must_use]
    pub fn derived(&self, class: &str, member: &str) -> Option<&Arc<DerivedFn>> {
        self.derived.get(&(class.to_string(), member.to_string()))
    }

    /// Evaluator registered exactly on `class::operation` (no inheritance walk).
    #[must_use]
    pub fn operation(&self, class: &str, operation: &str) -> Option<&Arc<OperationFn>> {
        self.operations
            .get(&(class.to_string(), operation.to_string()))
    }

    /// Number of registered derived-property evaluators.
    #[must_use]
    pub fn derived_count(&self) -> usize {
        self.derived.len()
    }

    /// Number of registered operation evaluators.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

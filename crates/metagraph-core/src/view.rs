//! # Model View
//!
//! The read-only surface handed to collaborators that evaluate expressions
//! over the graph (constraint solvers, derived-property and operation
//! evaluators) without depending on the store's representation.

use crate::store::Instance;
use crate::{ElementId, MetagraphError, Value};

/// Read access to a federated object graph.
///
/// Unknown ids are never an error here: lookups return `None`, empty
/// lists or `Value::Null`.
pub trait ModelView {
    /// Get an instance visible locally or through a mount.
    fn get_instance(&self, id: ElementId) -> Option<&Instance>;

    /// Targets linked from `source` by `association`, in insertion order.
    fn get_linked_targets(&self, association: &str, source: ElementId) -> Vec<ElementId>;

    /// Sources linked to `target` by `association`, in insertion order.
    fn get_linked_sources(&self, association: &str, target: ElementId) -> Vec<ElementId>;

    /// Read an attribute, association end or derived property.
    fn get_property(&self, id: ElementId, name: &str) -> Value;

    /// Reflexive-transitive specialization check on class names.
    fn is_subclass_of(&self, sub: &str, sup: &str) -> bool;

    /// Invoke an operation resolved through the instance's superclass chain.
    fn invoke_operation(
        &self,
        id: ElementId,
        operation: &str,
        args: &[Value],
    ) -> Result<Value, MetagraphError>;
}

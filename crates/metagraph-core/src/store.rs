//! # Object Store
//!
//! Schema-governed storage of instances and links.
//!
//! The store owns every instance created through it and every link whose
//! write went through it. Reads are federated: instances and links of
//! mounted stores are visible as if local (see `mount`).
//!
//! Write paths validate completely before touching any index, so a failed
//! call leaves the store exactly as it was.

use crate::link::{Link, LinkIndex};
use crate::mount::Mount;
use crate::primitives::{PRIMITIVE_BOOLEAN, PRIMITIVE_INTEGER, PRIMITIVE_REAL, PRIMITIVE_STRING};
use crate::schema::{Direction, EndRef, Member, MetaAssociation, MetaProperty, SchemaRegistry};
use crate::view::ModelView;
use crate::{ElementId, MetagraphError, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// =============================================================================
// INSTANCE
// =============================================================================

/// A typed node of the object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// The instance identifier.
    pub id: ElementId,
    /// Name of the instance's metaclass.
    pub class_name: String,
    /// Stored (non-derived) attribute values.
    attributes: BTreeMap<String, Value>,
}

impl Instance {
    fn new(id: ElementId, class_name: String) -> Self {
        Self {
            id,
            class_name,
            attributes: BTreeMap::new(),
        }
    }

    /// Get a stored attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// All stored attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// =============================================================================
// STORE
// =============================================================================

/// The object store.
#[derive(Debug)]
pub struct Store {
    /// Shared, read-only schema
    pub(crate) schema: Arc<SchemaRegistry>,
    /// Local instances: ElementId -> Instance
    pub(crate) instances: BTreeMap<ElementId, Instance>,
    /// Local instances in creation order
    pub(crate) order: Vec<ElementId>,
    /// Local links
    pub(crate) links: LinkIndex,
    /// Active mounts: mount id -> Mount
    pub(crate) mounts: BTreeMap<String, Mount>,
}

impl Store {
    /// Create an empty store governed by `schema`.
    #[must_use]
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            schema,
            instances: BTreeMap::new(),
            order: Vec::new(),
            links: LinkIndex::new(),
            mounts: BTreeMap::new(),
        }
    }

    /// The schema governing this store.
    #[must_use]
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// The shared schema handle, for creating sibling stores.
    #[must_use]
    pub fn schema_handle(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.schema)
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create an empty instance of `class_name`.
    pub fn create_element(&mut self, class_name: &str) -> Result<ElementId, MetagraphError> {
        let class = self.schema.get_class(class_name).ok_or_else(|| {
            MetagraphError::Schema(format!("unregistered class '{}'", class_name))
        })?;
        if class.is_abstract {
            return Err(MetagraphError::Schema(format!(
                "cannot instantiate abstract class '{}'",
                class_name
            )));
        }

        let id = ElementId::new();
        self.instances
            .insert(id, Instance::new(id, class_name.to_string()));
        self.order.push(id);
        tracing::debug!(%id, class = class_name, "created element");
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // Reflection
    // -------------------------------------------------------------------------

    /// Get an instance visible locally or through any active mount.
    #[must_use]
    pub fn get_instance(&self, id: ElementId) -> Option<&Instance> {
        self.instances
            .get(&id)
            .or_else(|| self.mounts.values().find_map(|m| m.store().get_instance(id)))
    }

    /// True when `id` was created directly in this store.
    #[must_use]
    pub fn is_local(&self, id: ElementId) -> bool {
        self.instances.contains_key(&id)
    }

    /// True when the instance's class equals `class_name` or specializes it.
    #[must_use]
    pub fn is_instance_of(&self, id: ElementId, class_name: &str) -> bool {
        self.get_instance(id)
            .is_some_and(|i| self.schema.is_subclass_of(&i.class_name, class_name))
    }

    /// Instances created directly in this store, in creation order.
    pub fn get_local_elements(&self) -> impl Iterator<Item = &Instance> + '_ {
        self.order.iter().filter_map(|id| self.instances.get(id))
    }

    /// Ids of every visible instance: local first, then each mount in id order.
    #[must_use]
    pub fn get_all_elements(&self) -> Vec<ElementId> {
        if self.mounts.is_empty() {
            return self.order.clone();
        }
        let mut seen = BTreeSet::new();
        let mut all = Vec::new();
        let mounted = self.mounts.values().flat_map(|m| m.store().get_all_elements());
        for id in self.order.iter().copied().chain(mounted) {
            if seen.insert(id) {
                all.push(id);
            }
        }
        all
    }

    /// Number of local instances.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.order.len()
    }

    /// Number of local links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Local links, sorted by association, source, then target.
    #[must_use]
    pub fn get_local_links(&self) -> Vec<Link> {
        self.links.links()
    }

    // -------------------------------------------------------------------------
    // Links
    // -------------------------------------------------------------------------

    /// Targets linked from `source` by `association`, in insertion order.
    #[must_use]
    pub fn get_linked_targets(&self, association: &str, source: ElementId) -> Vec<ElementId> {
        let local = self.links.targets(association, source);
        if self.mounts.is_empty() {
            return local.to_vec();
        }
        let mounted = self
            .mounts
            .values()
            .flat_map(|m| m.store().get_linked_targets(association, source));
        dedup(local.iter().copied().chain(mounted))
    }

    /// Sources linked to `target` by `association`, in insertion order.
    #[must_use]
    pub fn get_linked_sources(&self, association: &str, target: ElementId) -> Vec<ElementId> {
        let local = self.links.sources(association, target);
        if self.mounts.is_empty() {
            return local.to_vec();
        }
        let mounted = self
            .mounts
            .values()
            .flat_map(|m| m.store().get_linked_sources(association, target));
        dedup(local.iter().copied().chain(mounted))
    }

    /// The composite owner of `id`, if any, as `(association, owner)`.
    #[must_use]
    pub fn composite_parent(&self, id: ElementId) -> Option<(String, ElementId)> {
        self.schema
            .get_all_associations()
            .filter(|a| a.is_composite())
            .find_map(|a| {
                self.get_linked_sources(&a.name, id)
                    .first()
                    .map(|owner| (a.name.clone(), *owner))
            })
    }

    /// Create a link `source -[association]-> target`.
    ///
    /// Re-creating an existing link is a no-op. For composite associations any
    /// other composite owner of `target` is silently detached first.
    pub fn create_link(
        &mut self,
        association: &str,
        source: ElementId,
        target: ElementId,
    ) -> Result<(), MetagraphError> {
        let schema = Arc::clone(&self.schema);
        let assoc = schema.get_association(association).ok_or_else(|| {
            MetagraphError::Schema(format!("unregistered association '{}'", association))
        })?;

        self.check_endpoints(assoc, source, target)?;
        if self.links.contains(association, source, target) {
            return Ok(());
        }
        self.check_target_side(assoc, source)?;
        self.check_source_side(assoc, target)?;

        self.attach(assoc, source, target);
        Ok(())
    }

    /// Remove a local link. Returns `false` if it did not exist.
    pub fn remove_link(
        &mut self,
        association: &str,
        source: ElementId,
        target: ElementId,
    ) -> Result<bool, MetagraphError> {
        if self.schema.get_association(association).is_none() {
            return Err(MetagraphError::Schema(format!(
                "unregistered association '{}'",
                association
            )));
        }
        let removed = self.links.remove(association, source, target);
        if removed {
            tracing::debug!(association, %source, %target, "removed link");
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    /// Read an attribute, association end or derived property.
    ///
    /// Unknown ids and unknown members read as `Value::Null`. A name that is
    /// not declared in the schema still reaches a registered evaluator.
    #[must_use]
    pub fn get_property(&self, id: ElementId, name: &str) -> Value {
        let Some(instance) = self.get_instance(id) else {
            return Value::Null;
        };
        let class = instance.class_name.as_str();

        match self.schema.resolve_member(class, name) {
            Some(member) if member.is_derived() => self.evaluate_derived(id, class, name),
            Some(Member::Attribute(_)) => instance.attribute(name).cloned().unwrap_or_default(),
            Some(Member::End(end)) => {
                let ids = match end.direction {
                    Direction::Forward => self.get_linked_targets(&end.association.name, id),
                    Direction::Backward => self.get_linked_sources(&end.association.name, id),
                };
                Value::from_ids(ids, end.far_end().multiplicity.is_single_valued())
            }
            None => self.evaluate_derived(id, class, name),
        }
    }

    /// Write an attribute or association end of a local instance.
    ///
    /// For an association end, `value` is the complete new set of linked
    /// instances (`Ref`, `List` of `Ref`, or `Null` to clear).
    pub fn set_property(
        &mut self,
        id: ElementId,
        name: &str,
        value: Value,
    ) -> Result<(), MetagraphError> {
        let class = self.writable_class(id)?;
        let schema = Arc::clone(&self.schema);
        let member = schema.resolve_member(&class, name).ok_or_else(|| {
            MetagraphError::Schema(format!("class '{}' has no property '{}'", class, name))
        })?;
        if member.is_derived() {
            return Err(MetagraphError::InvalidOperation(format!(
                "property '{}::{}' is derived and read-only",
                class, name
            )));
        }

        match member {
            Member::Attribute(property) => self.set_attribute(id, property, value),
            Member::End(end) => self.set_end(id, end, value),
        }
    }

    /// Invoke an operation, resolved most-specific-first through the class chain.
    pub fn invoke_operation(
        &self,
        id: ElementId,
        operation: &str,
        args: &[Value],
    ) -> Result<Value, MetagraphError> {
        let instance = self
            .get_instance(id)
            .ok_or(MetagraphError::ElementNotFound(id))?;
        let evaluator = self
            .schema
            .find_operation(&instance.class_name, operation)
            .ok_or_else(|| MetagraphError::OperationNotFound {
                class: instance.class_name.clone(),
                operation: operation.to_string(),
            })?;
        evaluator(self, id, args)
    }

    // -------------------------------------------------------------------------
    // Internal: evaluation
    // -------------------------------------------------------------------------

    fn evaluate_derived(&self, id: ElementId, class: &str, name: &str) -> Value {
        match self.schema.find_derived(class, name) {
            Some(evaluator) => evaluator(self, id),
            None => Value::Null,
        }
    }

    // -------------------------------------------------------------------------
    // Internal: writes
    // -------------------------------------------------------------------------

    /// Class of a local instance; mounted instances are read-only.
    fn writable_class(&self, id: ElementId) -> Result<String, MetagraphError> {
        if let Some(instance) = self.instances.get(&id) {
            return Ok(instance.class_name.clone());
        }
        if self.get_instance(id).is_some() {
            return Err(MetagraphError::InvalidOperation(format!(
                "element {} belongs to a mounted store and is read-only",
                id
            )));
        }
        Err(MetagraphError::ElementNotFound(id))
    }

    fn set_attribute(
        &mut self,
        id: ElementId,
        property: &MetaProperty,
        value: Value,
    ) -> Result<(), MetagraphError> {
        let value = match value {
            Value::List(items) => {
                if !property.multiplicity.admits(items.len()) {
                    return Err(MetagraphError::MultiplicityViolation {
                        element: id,
                        property: property.name.clone(),
                        upper: property.multiplicity.upper.unwrap_or(u32::MAX),
                        attempted: items.len(),
                    });
                }
                for item in &items {
                    check_primitive(property, item)?;
                }
                if property.multiplicity.is_single_valued() {
                    items.into_iter().next().unwrap_or_default()
                } else {
                    Value::List(items)
                }
            }
            other => {
                check_primitive(property, &other)?;
                other
            }
        };

        let Some(instance) = self.instances.get_mut(&id) else {
            return Err(MetagraphError::ElementNotFound(id));
        };
        if value.is_null() {
            instance.attributes.remove(&property.name);
        } else {
            instance.attributes.insert(property.name.clone(), value);
        }
        Ok(())
    }

    fn set_end(&mut self, id: ElementId, end: EndRef<'_>, value: Value) -> Result<(), MetagraphError> {
        let assoc = end.association;
        let far = end.far_end();
        let ids = reference_list(value, &far.name)?;

        if !far.multiplicity.admits(ids.len()) {
            return Err(MetagraphError::MultiplicityViolation {
                element: id,
                property: far.name.clone(),
                upper: far.multiplicity.upper.unwrap_or(u32::MAX),
                attempted: ids.len(),
            });
        }

        let pairs: Vec<(ElementId, ElementId)> = match end.direction {
            Direction::Forward => ids.iter().map(|t| (id, *t)).collect(),
            Direction::Backward => ids.iter().map(|s| (*s, id)).collect(),
        };
        let existing: Vec<ElementId> = match end.direction {
            Direction::Forward => self.links.targets(&assoc.name, id).to_vec(),
            Direction::Backward => self.links.sources(&assoc.name, id).to_vec(),
        };

        if end.direction == Direction::Backward && assoc.is_composite() && ids.len() > 1 {
            return Err(MetagraphError::MultiplicityViolation {
                element: id,
                property: far.name.clone(),
                upper: 1,
                attempted: ids.len(),
            });
        }
        for &(source, target) in &pairs {
            self.check_endpoints(assoc, source, target)?;
            if self.links.contains(&assoc.name, source, target) {
                continue;
            }
            match end.direction {
                Direction::Forward => self.check_source_side(assoc, target)?,
                Direction::Backward => {
                    self.check_target_side(assoc, source)?;
                    if assoc.is_composite() && self.has_mounted_owner(target) {
                        return Err(mounted_owner_error(target));
                    }
                }
            }
        }

        for other in existing.into_iter().filter(|e| !ids.contains(e)) {
            match end.direction {
                Direction::Forward => self.links.remove(&assoc.name, id, other),
                Direction::Backward => self.links.remove(&assoc.name, other, id),
            };
        }
        for (source, target) in pairs {
            if !self.links.contains(&assoc.name, source, target) {
                self.attach(assoc, source, target);
            }
        }
        Ok(())
    }

    /// Both endpoints are visible and conform to their end types.
    fn check_endpoints(
        &self,
        assoc: &MetaAssociation,
        source: ElementId,
        target: ElementId,
    ) -> Result<(), MetagraphError> {
        for (side, id, end) in [
            ("source", source, &assoc.source),
            ("target", target, &assoc.target),
        ] {
            let instance = self
                .get_instance(id)
                .ok_or(MetagraphError::ElementNotFound(id))?;
            if !self.schema.is_subclass_of(&instance.class_name, &end.type_name) {
                return Err(MetagraphError::TypeMismatch(format!(
                    "{} '{}' of association '{}' expects {}, got {} ({})",
                    side,
                    end.name,
                    assoc.name,
                    end.type_name,
                    instance.class_name,
                    id
                )));
            }
        }
        Ok(())
    }

    /// `source` can take one more target.
    pub(crate) fn check_target_side(
        &self,
        assoc: &MetaAssociation,
        source: ElementId,
    ) -> Result<(), MetagraphError> {
        let count = self.get_linked_targets(&assoc.name, source).len();
        let attempted = count.saturating_add(1);
        if !assoc.target.multiplicity.admits(attempted) {
            return Err(MetagraphError::MultiplicityViolation {
                element: source,
                property: assoc.target.name.clone(),
                upper: assoc.target.multiplicity.upper.unwrap_or(u32::MAX),
                attempted,
            });
        }
        Ok(())
    }

    /// `target` can take one more source, or can be re-parented if composite.
    fn check_source_side(
        &self,
        assoc: &MetaAssociation,
        target: ElementId,
    ) -> Result<(), MetagraphError> {
        if assoc.is_composite() {
            if self.has_mounted_owner(target) {
                return Err(mounted_owner_error(target));
            }
            return Ok(());
        }
        let count = self.get_linked_sources(&assoc.name, target).len();
        let attempted = count.saturating_add(1);
        if !assoc.source.multiplicity.admits(attempted) {
            return Err(MetagraphError::MultiplicityViolation {
                element: target,
                property: assoc.source.name.clone(),
                upper: assoc.source.multiplicity.upper.unwrap_or(u32::MAX),
                attempted,
            });
        }
        Ok(())
    }

    fn has_mounted_owner(&self, id: ElementId) -> bool {
        self.mounts
            .values()
            .any(|m| m.store().composite_parent(id).is_some())
    }

    /// Insert a validated link, detaching other composite owners first.
    fn attach(&mut self, assoc: &MetaAssociation, source: ElementId, target: ElementId) {
        if assoc.is_composite() {
            let schema = Arc::clone(&self.schema);
            for owning in schema.get_all_associations().filter(|a| a.is_composite()) {
                for owner in self.links.sources(&owning.name, target).to_vec() {
                    if owning.name == assoc.name && owner == source {
                        continue;
                    }
                    self.links.remove(&owning.name, owner, target);
                    tracing::debug!(
                        association = %owning.name,
                        %owner,
                        %target,
                        "detached previous composite owner"
                    );
                }
            }
        }
        self.links.insert(&assoc.name, source, target);
    }
}

// =============================================================================
// MODEL VIEW
// =============================================================================

impl ModelView for Store {
    fn get_instance(&self, id: ElementId) -> Option<&Instance> {
        Store::get_instance(self, id)
    }

    fn get_linked_targets(&self, association: &str, source: ElementId) -> Vec<ElementId> {
        Store::get_linked_targets(self, association, source)
    }

    fn get_linked_sources(&self, association: &str, target: ElementId) -> Vec<ElementId> {
        Store::get_linked_sources(self, association, target)
    }

    fn get_property(&self, id: ElementId, name: &str) -> Value {
        Store::get_property(self, id, name)
    }

    fn is_subclass_of(&self, sub: &str, sup: &str) -> bool {
        self.schema.is_subclass_of(sub, sup)
    }

    fn invoke_operation(
        &self,
        id: ElementId,
        operation: &str,
        args: &[Value],
    ) -> Result<Value, MetagraphError> {
        Store::invoke_operation(self, id, operation, args)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn dedup(ids: impl Iterator<Item = ElementId>) -> Vec<ElementId> {
    let mut seen = BTreeSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

/// Interpret a value written to an association end as a duplicate-free id list.
fn reference_list(value: Value, end_name: &str) -> Result<Vec<ElementId>, MetagraphError> {
    let items = match value {
        Value::Null => Vec::new(),
        Value::List(items) => items,
        single => vec![single],
    };
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        let id = item.as_ref_id().ok_or_else(|| {
            MetagraphError::TypeMismatch(format!(
                "association end '{}' expects references, got {}",
                end_name,
                item.kind()
            ))
        })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Kind check for attributes declared with a primitive type.
fn check_primitive(property: &MetaProperty, value: &Value) -> Result<(), MetagraphError> {
    let ok = match property.type_name.as_str() {
        PRIMITIVE_BOOLEAN => matches!(value, Value::Bool(_) | Value::Null),
        PRIMITIVE_INTEGER => matches!(value, Value::Int(_) | Value::Null),
        PRIMITIVE_REAL => matches!(value, Value::Real(_) | Value::Int(_) | Value::Null),
        PRIMITIVE_STRING => matches!(value, Value::Str(_) | Value::Null),
        _ => !matches!(value, Value::List(_)),
    };
    if ok {
        return Ok(());
    }
    Err(MetagraphError::TypeMismatch(format!(
        "attribute '{}' expects {}, got {}",
        property.name,
        property.type_name,
        value.kind()
    )))
}

fn mounted_owner_error(id: ElementId) -> MetagraphError {
    MetagraphError::InvalidOperation(format!(
        "element {} is owned inside a mounted store and cannot be re-parented",
        id
    ))
}

// =============================================================================
// TESTS
// =============================================================================

//! # Schema Registry
//!
//! Metaclass and association definitions for the metagraph engine.
//!
//! The registry is populated once at bootstrap and read-only afterwards.
//! Every registration recomputes the superclass closure, so all later
//! dispatch (member lookup, evaluator lookup, label matching in queries)
//! reads a precomputed, most-specific-first ancestor list.
//!
//! ## Association direction
//!
//! A link always runs from an instance of the `source` end's type to an
//! instance of the `target` end's type. The target end's name is the
//! property that navigates source -> target; the source end's name is the
//! property that navigates target -> source. Ownership also flows
//! source -> target: in a composite association the target is the owned
//! element, whichever end carries the COMPOSITE marker.

use crate::evaluator::{DerivedFn, EvaluatorRegistry, OperationFn};
use crate::MetagraphError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

// =============================================================================
// METAMODEL ELEMENTS
// =============================================================================

/// Aggregation kind of an association end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationKind {
    #[default]
    None,
    Shared,
    Composite,
}

/// Lower/upper bound pair. `upper: None` means unbounded (`*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiplicity {
    #[serde(default)]
    pub lower: u32,
    #[serde(default)]
    pub upper: Option<u32>,
}

impl Multiplicity {
    /// `[lower..upper]`.
    #[must_use]
    pub const fn new(lower: u32, upper: Option<u32>) -> Self {
        Self { lower, upper }
    }

    /// `[0..1]`.
    #[must_use]
    pub const fn optional() -> Self {
        Self::new(0, Some(1))
    }

    /// `[0..*]`.
    #[must_use]
    pub const fn many() -> Self {
        Self::new(0, None)
    }

    /// True when at most one value may be held.
    #[must_use]
    pub fn is_single_valued(&self) -> bool {
        self.upper == Some(1)
    }

    /// True when `count` values fit under the upper bound.
    #[must_use]
    pub fn admits(&self, count: usize) -> bool {
        self.upper.is_none_or(|upper| count <= upper as usize)
    }
}

/// An attribute of a metaclass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "Multiplicity::optional")]
    pub multiplicity: Multiplicity,
    #[serde(default)]
    pub is_derived: bool,
    #[serde(default)]
    pub is_ordered: bool,
    #[serde(default = "default_true")]
    pub is_unique: bool,
}

fn default_true() -> bool {
    true
}

impl MetaProperty {
    /// A single-valued, stored attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            multiplicity: Multiplicity::optional(),
            is_derived: false,
            is_ordered: false,
            is_unique: true,
        }
    }

    #[must_use]
    pub fn with_multiplicity(mut self, lower: u32, upper: Option<u32>) -> Self {
        self.multiplicity = Multiplicity::new(lower, upper);
        self
    }

    #[must_use]
    pub fn derived(mut self) -> Self {
        self.is_derived = true;
        self
    }

    #[must_use]
    pub fn ordered(mut self) -> Self {
        self.is_ordered = true;
        self
    }
}

/// Signature of an operation declared on a metaclass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub return_type: Option<String>,
}

/// A model-element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaClass {
    pub name: String,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub superclasses: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<MetaProperty>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub operations: Vec<OperationDescriptor>,
}

impl MetaClass {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            superclasses: Vec::new(),
            attributes: Vec::new(),
            constraints: Vec::new(),
            operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub fn with_superclass(mut self, name: impl Into<String>) -> Self {
        self.superclasses.push(name.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: MetaProperty) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, name: impl Into<String>) -> Self {
        self.operations.push(OperationDescriptor {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
        });
        self
    }
}

/// One end of an association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaAssociationEnd {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "Multiplicity::many")]
    pub multiplicity: Multiplicity,
    #[serde(default)]
    pub aggregation: AggregationKind,
    #[serde(default = "default_true")]
    pub navigable: bool,
    #[serde(default)]
    pub subsets: Vec<String>,
    #[serde(default)]
    pub redefines: Vec<String>,
    #[serde(default)]
    pub derivation: Option<String>,
}

impl MetaAssociationEnd {
    /// A navigable, unbounded, non-aggregating end.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            multiplicity: Multiplicity::many(),
            aggregation: AggregationKind::None,
            navigable: true,
            subsets: Vec::new(),
            redefines: Vec::new(),
            derivation: None,
        }
    }

    #[must_use]
    pub fn with_multiplicity(mut self, lower: u32, upper: Option<u32>) -> Self {
        self.multiplicity = Multiplicity::new(lower, upper);
        self
    }

    /// Shorthand for `[0..1]`.
    #[must_use]
    pub fn single(self) -> Self {
        self.with_multiplicity(0, Some(1))
    }

    #[must_use]
    pub fn composite(mut self) -> Self {
        self.aggregation = AggregationKind::Composite;
        self
    }

    #[must_use]
    pub fn shared(mut self) -> Self {
        self.aggregation = AggregationKind::Shared;
        self
    }

    #[must_use]
    pub fn non_navigable(mut self) -> Self {
        self.navigable = false;
        self
    }

    #[must_use]
    pub fn derived(mut self, rule: impl Into<String>) -> Self {
        self.derivation = Some(rule.into());
        self
    }

    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.derivation.is_some()
    }
}

/// A typed, directed relationship declaration between two metaclasses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaAssociation {
    pub name: String,
    pub source: MetaAssociationEnd,
    pub target: MetaAssociationEnd,
}

impl MetaAssociation {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: MetaAssociationEnd,
        target: MetaAssociationEnd,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            target,
        }
    }

    /// True when links of this association confer exclusive ownership of the target.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.source.aggregation == AggregationKind::Composite
            || self.target.aggregation == AggregationKind::Composite
    }
}

// =============================================================================
// MEMBER RESOLUTION
// =============================================================================

/// Navigation direction of an association end relative to the instance
/// the property is read on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Property read on a source instance, yielding targets.
    Forward,
    /// Property read on a target instance, yielding sources.
    Backward,
}

/// An association end resolved as a property of some class.
#[derive(Debug, Clone, Copy)]
pub struct EndRef<'a> {
    pub association: &'a MetaAssociation,
    pub direction: Direction,
}

impl<'a> EndRef<'a> {
    /// The end whose name was looked up (the values it yields).
    #[must_use]
    pub fn far_end(&self) -> &'a MetaAssociationEnd {
        match self.direction {
            Direction::Forward => &self.association.target,
            Direction::Backward => &self.association.source,
        }
    }

    /// The end on the side of the instance the property is read on.
    #[must_use]
    pub fn near_end(&self) -> &'a MetaAssociationEnd {
        match self.direction {
            Direction::Forward => &self.association.source,
            Direction::Backward => &self.association.target,
        }
    }
}

/// A named member of a class.
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Attribute(&'a MetaProperty),
    End(EndRef<'a>),
}

impl Member<'_> {
    /// True when the member is computed on read rather than stored.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        match self {
            Member::Attribute(p) => p.is_derived,
            Member::End(end) => end.far_end().is_derived(),
        }
    }
}

// =============================================================================
// SCHEMA REGISTRY
// =============================================================================

/// The class/association registry with its precomputed inheritance closure.
#[derive(Default)]
pub struct SchemaRegistry {
    /// Class storage: name -> MetaClass
    classes: BTreeMap<String, MetaClass>,
    /// Classes in registration order
    class_order: Vec<String>,
    /// Association storage: name -> MetaAssociation
    associations: BTreeMap<String, MetaAssociation>,
    /// Associations in registration order
    association_order: Vec<String>,
    /// Transitive superclasses, most specific first (self excluded)
    ancestors: BTreeMap<String, Vec<String>>,
    /// class -> ancestor -> generalization distance
    ancestor_depth: BTreeMap<String, BTreeMap<String, usize>>,
    /// end name -> (association name, direction)
    end_index: BTreeMap<String, Vec<(String, Direction)>>,
    /// Derived-property and operation evaluators
    evaluators: EvaluatorRegistry,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("classes", &self.class_order)
            .field("associations", &self.association_order)
            .field("evaluators", &self.evaluators)
            .finish()
    }
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metaclass.
    ///
    /// Superclasses may be registered later; a class whose superclass chain
    /// loops back to itself is rejected and the registry is left unchanged.
    pub fn register_class(&mut self, class: MetaClass) -> Result<(), MetagraphError> {
        if self.classes.contains_key(&class.name) {
            return Err(MetagraphError::Schema(format!(
                "class '{}' is already registered",
                class.name
            )));
        }
        if self.reaches(&class.superclasses, &class.name) {
            return Err(MetagraphError::Schema(format!(
                "cyclic superclass chain through '{}'",
                class.name
            )));
        }

        tracing::debug!(class = %class.name, "registering class");
        self.class_order.push(class.name.clone());
        self.classes.insert(class.name.clone(), class);
        self.rebuild_closure();
        Ok(())
    }

    /// Register an association. Both end types must already be registered.
    pub fn register_association(
        &mut self,
        association: MetaAssociation,
    ) -> Result<(), MetagraphError> {
        if self.associations.contains_key(&association.name) {
            return Err(MetagraphError::Schema(format!(
                "association '{}' is already registered",
                association.name
            )));
        }
        for end in [&association.source, &association.target] {
            if !self.classes.contains_key(&end.type_name) {
                return Err(MetagraphError::Schema(format!(
                    "association '{}' end '{}' references unregistered class '{}'",
                    association.name, end.name, end.type_name
                )));
            }
        }

        tracing::debug!(association = %association.name, "registering association");
        self.end_index
            .entry(association.target.name.clone())
            .or_default()
            .push((association.name.clone(), Direction::Forward));
        self.end_index
            .entry(association.source.name.clone())
            .or_default()
            .push((association.name.clone(), Direction::Backward));
        self.association_order.push(association.name.clone());
        self.associations
            .insert(association.name.clone(), association);
        Ok(())
    }

    /// Register a derived-property evaluator for `class.member`.
    pub fn register_derived(
        &mut self,
        class: impl Into<String>,
        member: impl Into<String>,
        evaluator: Arc<DerivedFn>,
    ) {
        self.evaluators.insert_derived(class.into(), member.into(), evaluator);
    }

    /// Register an operation evaluator for `class::operation`.
    pub fn register_operation(
        &mut self,
        class: impl Into<String>,
        operation: impl Into<String>,
        evaluator: Arc<OperationFn>,
    ) {
        self.evaluators
            .insert_operation(class.into(), operation.into(), evaluator);
    }

    /// Superclass names referenced but never registered.
    #[must_use]
    pub fn unresolved_superclasses(&self) -> Vec<String> {
        let mut missing = BTreeSet::new();
        for class in self.classes.values() {
            for sup in &class.superclasses {
                if !self.classes.contains_key(sup) {
                    missing.insert(sup.clone());
                }
            }
        }
        missing.into_iter().collect()
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Get a class by name.
    #[must_use]
    pub fn get_class(&self, name: &str) -> Option<&MetaClass> {
        self.classes.get(name)
    }

    /// Get an association by name.
    #[must_use]
    pub fn get_association(&self, name: &str) -> Option<&MetaAssociation> {
        self.associations.get(name)
    }

    /// All classes in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &MetaClass> + '_ {
        self.class_order
            .iter()
            .filter_map(|name| self.classes.get(name))
    }

    /// All associations in registration order.
    pub fn get_all_associations(&self) -> impl Iterator<Item = &MetaAssociation> + '_ {
        self.association_order
            .iter()
            .filter_map(|name| self.associations.get(name))
    }

    /// Transitive superclasses of `name`, most specific first.
    #[must_use]
    pub fn get_all_superclasses(&self, name: &str) -> &[String] {
        self.ancestors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The class itself followed by its superclasses: the dispatch order.
    pub fn dispatch_order<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        std::iter::once(name).chain(self.get_all_superclasses(name).iter().map(String::as_str))
    }

    /// Registered classes that list `name` as a direct superclass, in registration order.
    #[must_use]
    pub fn get_direct_subclasses(&self, name: &str) -> Vec<&str> {
        self.classes()
            .filter(|c| c.superclasses.iter().any(|s| s == name))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Reflexive-transitive specialization check.
    #[must_use]
    pub fn is_subclass_of(&self, sub: &str, sup: &str) -> bool {
        self.ancestor_distance(sub, sup).is_some()
    }

    /// Number of generalization steps from `sub` up to `sup` (0 when equal).
    #[must_use]
    pub fn ancestor_distance(&self, sub: &str, sup: &str) -> Option<usize> {
        if sub == sup {
            return self.classes.contains_key(sub).then_some(0);
        }
        self.ancestor_depth.get(sub)?.get(sup).copied()
    }

    /// Find an attribute declared on `class` or inherited, most specific first.
    #[must_use]
    pub fn find_attribute(&self, class: &str, name: &str) -> Option<&MetaProperty> {
        self.dispatch_order(class).find_map(|c| {
            self.classes
                .get(c)?
                .attributes
                .iter()
                .find(|a| a.name == name)
        })
    }

    /// Find an association end usable as property `name` on instances of `class`.
    ///
    /// Among several candidates the one whose near end is the closest
    /// ancestor wins; ties go to declaration order.
    #[must_use]
    pub fn find_end(&self, class: &str, name: &str) -> Option<EndRef<'_>> {
        let candidates = self.end_index.get(name)?;
        let mut best: Option<(usize, EndRef<'_>)> = None;
        for (assoc_name, direction) in candidates {
            let Some(association) = self.associations.get(assoc_name) else {
                continue;
            };
            let end = EndRef {
                association,
                direction: *direction,
            };
            if !end.far_end().navigable {
                continue;
            }
            let Some(distance) = self.ancestor_distance(class, &end.near_end().type_name) else {
                continue;
            };
            if best.as_ref().is_none_or(|(d, _)| distance < *d) {
                best = Some((distance, end));
            }
        }
        best.map(|(_, end)| end)
    }

    /// Resolve a member name on a class: attributes first, then association ends.
    #[must_use]
    pub fn resolve_member(&self, class: &str, name: &str) -> Option<Member<'_>> {
        if let Some(attribute) = self.find_attribute(class, name) {
            return Some(Member::Attribute(attribute));
        }
        self.find_end(class, name).map(Member::End)
    }

    /// Navigable association ends labelled `name`, usable as edge types.
    pub(crate) fn ends_named(&self, name: &str) -> Vec<EndRef<'_>> {
        self.end_index
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|(assoc_name, direction)| {
                self.associations.get(assoc_name).map(|association| EndRef {
                    association,
                    direction: *direction,
                })
            })
            .filter(|end| end.far_end().navigable)
            .collect()
    }

    /// The evaluator registry.
    #[must_use]
    pub fn evaluators(&self) -> &EvaluatorRegistry {
        &self.evaluators
    }

    /// Find the most specific derived evaluator for `class.member`.
    #[must_use]
    pub fn find_derived(&self, class: &str, member: &str) -> Option<&Arc<DerivedFn>> {
        self.dispatch_order(class)
            .find_map(|c| self.evaluators.derived(c, member))
    }

    /// Find the most specific operation evaluator for `class::operation`.
    #[must_use]
    pub fn find_operation(&self, class: &str, operation: &str) -> Option<&Arc<OperationFn>> {
        self.dispatch_order(class)
            .find_map(|c| self.evaluators.operation(c, operation))
    }

    /// Number of registered classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of registered associations.
    #[must_use]
    pub fn association_count(&self) -> usize {
        self.associations.len()
    }

    // -------------------------------------------------------------------------
    // Closure maintenance
    // -------------------------------------------------------------------------

    /// True when walking up from `starts` reaches `target`.
    fn reaches(&self, starts: &[String], target: &str) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<&str> = starts.iter().map(String::as_str).collect();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(class) = self.classes.get(current) {
                stack.extend(class.superclasses.iter().map(String::as_str));
            }
        }
        false
    }

    /// Recompute every class's ancestor list (breadth-first, most specific first).
    fn rebuild_closure(&mut self) {
        let mut ancestors = BTreeMap::new();
        let mut depths = BTreeMap::new();

        for name in &self.class_order {
            let mut order = Vec::new();
            let mut depth = BTreeMap::new();
            let mut queue = VecDeque::new();

            if let Some(class) = self.classes.get(name) {
                queue.extend(class.superclasses.iter().map(|s| (s.as_str(), 1usize)));
            }
            while let Some((current, d)) = queue.pop_front() {
                if current == name || depth.contains_key(current) {
                    continue;
                }
                depth.insert(current.to_string(), d);
                order.push(current.to_string());
                if let Some(class) = self.classes.get(current) {
                    queue.extend(
                        class
                            .superclasses
                            .iter()
                            .map(|s| (s.as_str(), d.saturating_add(1))),
                    );
                }
            }

            ancestors.insert(name.clone(), order);
            depths.insert(name.clone(), depth);
        }

        self.ancestors = ancestors;
        self.ancestor_depth = depths;
    }
}

// =============================================================================
// TESTS
// =============================================================================

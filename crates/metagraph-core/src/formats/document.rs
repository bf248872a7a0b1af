//! # Schema and Model Documents
//!
//! Format-agnostic documents that populate a registry and a store.
//!
//! Model documents name their elements with document-local keys; ids are
//! allocated fresh on every load. A shared key scope lets several documents
//! (and mounted models) reference each other's elements.

use crate::schema::{MetaAssociation, MetaClass, SchemaRegistry};
use crate::store::Store;
use crate::{ElementId, Literal, MetagraphError, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SCHEMA DOCUMENT
// =============================================================================

/// Classes and associations in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub classes: Vec<MetaClass>,
    #[serde(default)]
    pub associations: Vec<MetaAssociation>,
}

impl SchemaDocument {
    /// Snapshot a registry back into document form.
    #[must_use]
    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        Self {
            classes: registry.classes().cloned().collect(),
            associations: registry.get_all_associations().cloned().collect(),
        }
    }
}

impl SchemaRegistry {
    /// Build a registry from a document.
    ///
    /// Classes are registered first, so superclasses may be declared after
    /// their subclasses. A superclass that is never declared is an error.
    pub fn from_document(document: SchemaDocument) -> Result<Self, MetagraphError> {
        let mut registry = Self::new();
        for class in document.classes {
            registry.register_class(class)?;
        }
        let missing = registry.unresolved_superclasses();
        if !missing.is_empty() {
            return Err(MetagraphError::Schema(format!(
                "undeclared superclasses: {}",
                missing.join(", ")
            )));
        }
        for association in document.associations {
            registry.register_association(association)?;
        }

        tracing::info!(
            classes = registry.class_count(),
            associations = registry.association_count(),
            "schema loaded"
        );
        Ok(registry)
    }
}

// =============================================================================
// MODEL DOCUMENT
// =============================================================================

/// One instance to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDocument {
    pub key: String,
    pub class: String,
    /// Attribute values; `null` (JSON only) leaves the attribute unset.
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<Literal>>,
}

/// One link, endpoints given by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDocument {
    pub association: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub elements: Vec<ElementDocument>,
    #[serde(default)]
    pub links: Vec<LinkDocument>,
}

impl ModelDocument {
    /// Load into `store` with a fresh key scope; returns key -> id.
    pub fn load_into(&self, store: &mut Store) -> Result<BTreeMap<String, ElementId>, MetagraphError> {
        let mut scope = BTreeMap::new();
        self.load_into_scope(store, &mut scope)?;
        Ok(scope)
    }

    /// Load into `store`, resolving link keys against `scope` as well as
    /// this document's own keys. New keys are added to `scope`.
    ///
    /// Keys, classes and link endpoints are checked before the store is
    /// touched. A value or link rejected by the store afterwards aborts the
    /// load with the elements created so far left in place.
    pub fn load_into_scope(
        &self,
        store: &mut Store,
        scope: &mut BTreeMap<String, ElementId>,
    ) -> Result<(), MetagraphError> {
        self.validate(store, scope)?;

        for element in &self.elements {
            let id = store.create_element(&element.class)?;
            for (name, literal) in &element.attributes {
                let value = literal.clone().map(Value::from).unwrap_or_default();
                store.set_property(id, name, value)?;
            }
            scope.insert(element.key.clone(), id);
        }
        for link in &self.links {
            let source = lookup(scope, &link.source)?;
            let target = lookup(scope, &link.target)?;
            store.create_link(&link.association, source, target)?;
        }

        tracing::debug!(
            elements = self.elements.len(),
            links = self.links.len(),
            "model document loaded"
        );
        Ok(())
    }

    fn validate(
        &self,
        store: &Store,
        scope: &BTreeMap<String, ElementId>,
    ) -> Result<(), MetagraphError> {
        let mut keys = BTreeSet::new();
        for element in &self.elements {
            if scope.contains_key(&element.key) || !keys.insert(element.key.as_str()) {
                return Err(MetagraphError::Document(format!(
                    "duplicate element key '{}'",
                    element.key
                )));
            }
            if store.schema().get_class(&element.class).is_none() {
                return Err(MetagraphError::Schema(format!(
                    "element '{}' has unregistered class '{}'",
                    element.key, element.class
                )));
            }
        }
        for link in &self.links {
            for key in [&link.source, &link.target] {
                if !keys.contains(key.as_str()) && !scope.contains_key(key) {
                    return Err(MetagraphError::Document(format!(
                        "link '{}' references unknown key '{}'",
                        link.association, key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn lookup(scope: &BTreeMap<String, ElementId>, key: &str) -> Result<ElementId, MetagraphError> {
    scope
        .get(key)
        .copied()
        .ok_or_else(|| MetagraphError::Document(format!("unknown key '{}'", key)))
}

// =============================================================================
// TESTS
// =============================================================================

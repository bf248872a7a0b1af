//! # Ownership Resolver
//!
//! Containment in a metamodel is usually expressed through typed
//! relationship objects (`Namespace -> OwningMembership -> Element`) rather
//! than a direct parent pointer. The resolver finds, for an owner class and
//! a new element class, the intermediate relationship class `R` and the two
//! composite associations `owner -> R` and `R -> element` that realize it.
//! A single composite association `owner -> element` is also a binding; it
//! needs no relationship object.
//!
//! ## Ranking
//!
//! Candidates are ranked by generalization distance, closest first:
//! 1. owner class to the owning association's source end type
//! 2. element class to the owned association's target end type
//! 3. `R` to both inner end types (zero for a direct association)
//! 4. relationship patterns before direct associations
//!
//! Remaining ties keep the first candidate in declaration order
//! (associations, then classes), so resolution is deterministic.

use crate::schema::{MetaAssociation, SchemaRegistry};
use crate::store::Store;
use crate::{ElementId, MetagraphError};
use serde::Serialize;
use std::sync::Arc;

/// How an element of some class is attached to an owner of some class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipBinding {
    /// Class of the intermediate relationship object, `None` when the owner
    /// links to the element directly.
    pub relationship_class: Option<String>,
    /// Composite association leaving the owner.
    pub owner_association: String,
    /// End name navigating away from the owner.
    pub owner_end: String,
    /// Composite association reaching the element. Equals
    /// `owner_association` for a direct binding.
    pub element_association: String,
    /// End name navigating to the element.
    pub element_end: String,
}

impl OwnershipBinding {
    /// True when no relationship object sits between owner and element.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.relationship_class.is_none()
    }
}

/// Result of `Store::create_owned_element`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedElement {
    pub element: ElementId,
    /// The intermediate relationship instance, if one was created.
    pub relationship: Option<ElementId>,
}

type Rank = (usize, usize, usize, bool);

/// Resolves ownership patterns against a schema.
#[derive(Debug, Clone, Copy)]
pub struct OwnershipResolver<'a> {
    schema: &'a SchemaRegistry,
}

impl<'a> OwnershipResolver<'a> {
    #[must_use]
    pub fn new(schema: &'a SchemaRegistry) -> Self {
        Self { schema }
    }

    /// Find the best ownership binding, or `None` when no path exists.
    #[must_use]
    pub fn resolve(&self, owner_class: &str, element_class: &str) -> Option<OwnershipBinding> {
        let composites: Vec<&MetaAssociation> = self
            .schema
            .get_all_associations()
            .filter(|a| a.is_composite())
            .collect();

        let mut best: Option<(Rank, OwnershipBinding)> = None;
        for owning in &composites {
            let Some(owner_distance) = self
                .schema
                .ancestor_distance(owner_class, &owning.source.type_name)
            else {
                continue;
            };
            for owned in &composites {
                if owned.name == owning.name {
                    continue;
                }
                let Some(element_distance) = self
                    .schema
                    .ancestor_distance(element_class, &owned.target.type_name)
                else {
                    continue;
                };
                for class in self.schema.classes().filter(|c| !c.is_abstract) {
                    let inner = self
                        .schema
                        .ancestor_distance(&class.name, &owning.target.type_name)
                        .zip(
                            self.schema
                                .ancestor_distance(&class.name, &owned.source.type_name),
                        );
                    let Some((to_owning, to_owned)) = inner else {
                        continue;
                    };
                    let rank = (
                        owner_distance,
                        element_distance,
                        to_owning.saturating_add(to_owned),
                        false,
                    );
                    if best.as_ref().is_some_and(|(r, _)| *r <= rank) {
                        continue;
                    }
                    best = Some((
                        rank,
                        OwnershipBinding {
                            relationship_class: Some(class.name.clone()),
                            owner_association: owning.name.clone(),
                            owner_end: owning.target.name.clone(),
                            element_association: owned.name.clone(),
                            element_end: owned.target.name.clone(),
                        },
                    ));
                }
            }
        }

        for association in &composites {
            let distances = self
                .schema
                .ancestor_distance(owner_class, &association.source.type_name)
                .zip(
                    self.schema
                        .ancestor_distance(element_class, &association.target.type_name),
                );
            let Some((owner_distance, element_distance)) = distances else {
                continue;
            };
            let rank = (owner_distance, element_distance, 0, true);
            if best.as_ref().is_some_and(|(r, _)| *r <= rank) {
                continue;
            }
            best = Some((
                rank,
                OwnershipBinding {
                    relationship_class: None,
                    owner_association: association.name.clone(),
                    owner_end: association.target.name.clone(),
                    element_association: association.name.clone(),
                    element_end: association.target.name.clone(),
                },
            ));
        }

        let binding = best.map(|(_, binding)| binding);
        tracing::trace!(owner_class, element_class, ?binding, "resolved ownership");
        binding
    }
}

impl Store {
    /// Create an element of `class_name` owned by `owner`.
    ///
    /// A relationship binding creates the intermediate relationship object
    /// and both composite links; a direct binding creates the one composite
    /// link. Without a binding the element is left unparented.
    pub fn create_owned_element(
        &mut self,
        owner: ElementId,
        class_name: &str,
    ) -> Result<OwnedElement, MetagraphError> {
        let owner_class = self
            .get_instance(owner)
            .map(|i| i.class_name.clone())
            .ok_or(MetagraphError::ElementNotFound(owner))?;
        let schema = Arc::clone(&self.schema);
        if schema.get_class(class_name).is_none() {
            return Err(MetagraphError::Schema(format!(
                "unregistered class '{}'",
                class_name
            )));
        }

        let Some(binding) = OwnershipResolver::new(&schema).resolve(&owner_class, class_name)
        else {
            let element = self.create_element(class_name)?;
            return Ok(OwnedElement {
                element,
                relationship: None,
            });
        };

        let owning = schema
            .get_association(&binding.owner_association)
            .ok_or_else(|| {
                MetagraphError::Schema(format!(
                    "unregistered association '{}'",
                    binding.owner_association
                ))
            })?;
        self.check_target_side(owning, owner)?;

        let element = self.create_element(class_name)?;
        let Some(relationship_class) = binding.relationship_class.as_deref() else {
            self.create_link(&binding.owner_association, owner, element)?;
            tracing::debug!(
                %owner,
                %element,
                association = %binding.owner_association,
                "created directly owned element"
            );
            return Ok(OwnedElement {
                element,
                relationship: None,
            });
        };

        let relationship = self.create_element(relationship_class)?;
        self.create_link(&binding.owner_association, owner, relationship)?;
        self.create_link(&binding.element_association, relationship, element)?;

        tracing::debug!(
            %owner,
            %element,
            %relationship,
            relationship_class,
            "created owned element"
        );
        Ok(OwnedElement {
            element,
            relationship: Some(relationship),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MetaAssociationEnd, MetaClass};
    use crate::Value;

    fn kernel() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        for class in [
            MetaClass::new("Element").abstract_class(),
            MetaClass::new("Namespace").with_superclass("Element"),
            MetaClass::new("Package").with_superclass("Namespace"),
            MetaClass::new("Relationship")
                .abstract_class()
                .with_superclass("Element"),
            MetaClass::new("Membership").with_superclass("Relationship"),
            MetaClass::new("OwningMembership").with_superclass("Membership"),
            MetaClass::new("FeatureMembership").with_superclass("OwningMembership"),
            MetaClass::new("Type").with_superclass("Namespace"),
            MetaClass::new("Feature").with_superclass("Type"),
        ] {
            schema.register_class(class).expect("register");
        }
        schema
            .register_association(MetaAssociation::new(
                "NamespaceMembership",
                MetaAssociationEnd::new("membershipNamespace", "Namespace")
                    .single()
                    .composite(),
                MetaAssociationEnd::new("ownedMembership", "Membership"),
            ))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "OwnedMemberElement",
                MetaAssociationEnd::new("owningMembership", "OwningMembership")
                    .single()
                    .composite(),
                MetaAssociationEnd::new("ownedMemberElement", "Element").single(),
            ))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "TypeFeatureMembership",
                MetaAssociationEnd::new("owningType", "Type").single().composite(),
                MetaAssociationEnd::new("ownedFeatureMembership", "FeatureMembership"),
            ))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "OwnedMemberFeature",
                MetaAssociationEnd::new("owningFeatureMembership", "FeatureMembership")
                    .single()
                    .composite(),
                MetaAssociationEnd::new("ownedMemberFeature", "Feature").single(),
            ))
            .expect("register");
        schema
    }

    #[test]
    fn package_owns_through_owning_membership() {
        let schema = kernel();
        let binding = OwnershipResolver::new(&schema)
            .resolve("Package", "Package")
            .expect("binding");
        assert_eq!(binding.relationship_class.as_deref(), Some("OwningMembership"));
        assert_eq!(binding.owner_association, "NamespaceMembership");
        assert_eq!(binding.owner_end, "ownedMembership");
        assert_eq!(binding.element_end, "ownedMemberElement");
    }

    #[test]
    fn most_specific_pattern_wins() {
        let schema = kernel();
        let binding = OwnershipResolver::new(&schema)
            .resolve("Feature", "Feature")
            .expect("binding");
        assert_eq!(binding.relationship_class.as_deref(), Some("FeatureMembership"));
        assert_eq!(binding.owner_association, "TypeFeatureMembership");
        assert_eq!(binding.element_association, "OwnedMemberFeature");
    }

    #[test]
    fn no_pattern_yields_none() {
        let schema = kernel();
        assert!(OwnershipResolver::new(&schema)
            .resolve("Membership", "Package")
            .is_none());
    }

    #[test]
    fn single_composite_association_is_a_direct_binding() {
        let schema = kernel();
        let binding = OwnershipResolver::new(&schema)
            .resolve("OwningMembership", "Package")
            .expect("binding");
        assert!(binding.is_direct());
        assert_eq!(binding.owner_association, "OwnedMemberElement");
        assert_eq!(binding.element_association, "OwnedMemberElement");
        assert_eq!(binding.element_end, "ownedMemberElement");
    }

    /// `Namespace --Membership(composite)--> Element` with no relationship class.
    fn membership_only() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        for class in [
            MetaClass::new("Element"),
            MetaClass::new("Namespace").with_superclass("Element"),
            MetaClass::new("Classifier").with_superclass("Element"),
            MetaClass::new("Feature").with_superclass("Classifier"),
        ] {
            schema.register_class(class).expect("register");
        }
        schema
            .register_association(MetaAssociation::new(
                "Membership",
                MetaAssociationEnd::new("namespace", "Namespace").single(),
                MetaAssociationEnd::new("member", "Element").composite(),
            ))
            .expect("register");
        schema
    }

    #[test]
    fn namespace_owns_classifier_through_membership() {
        let schema = membership_only();
        let binding = OwnershipResolver::new(&schema)
            .resolve("Namespace", "Classifier")
            .expect("binding");
        assert_eq!(binding.relationship_class, None);
        assert_eq!(binding.owner_association, "Membership");
        assert_eq!(binding.owner_end, "member");

        let mut store = Store::new(Arc::new(schema));
        let n = store.create_element("Namespace").expect("create");
        let owned = store.create_owned_element(n, "Classifier").expect("owned");
        assert!(owned.relationship.is_none());
        assert_eq!(
            store.composite_parent(owned.element),
            Some(("Membership".to_string(), n))
        );
        assert_eq!(store.get_property(owned.element, "namespace"), Value::Ref(n));
        assert_eq!(store.local_count(), 2);
    }

    #[test]
    fn relationship_pattern_beats_equally_close_direct_association() {
        let mut schema = membership_only();
        schema
            .register_class(MetaClass::new("OwningMembership").with_superclass("Element"))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "OwnedMembership",
                MetaAssociationEnd::new("membershipNamespace", "Namespace").single(),
                MetaAssociationEnd::new("ownedMembership", "OwningMembership").composite(),
            ))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "OwnedMemberElement",
                MetaAssociationEnd::new("owningMembership", "OwningMembership").single(),
                MetaAssociationEnd::new("ownedMemberElement", "Element")
                    .single()
                    .composite(),
            ))
            .expect("register");

        let binding = OwnershipResolver::new(&schema)
            .resolve("Namespace", "Feature")
            .expect("binding");
        assert_eq!(binding.relationship_class.as_deref(), Some("OwningMembership"));
        assert_eq!(binding.owner_association, "OwnedMembership");
    }

    #[test]
    fn create_owned_element_wires_both_links() {
        let mut store = Store::new(Arc::new(kernel()));
        let pkg = store.create_element("Package").expect("create");
        let owned = store.create_owned_element(pkg, "Package").expect("owned");
        let rel = owned.relationship.expect("relationship");

        assert!(store.is_instance_of(rel, "OwningMembership"));
        assert_eq!(store.get_property(pkg, "ownedMembership"), Value::List(vec![Value::Ref(rel)]));
        assert_eq!(store.get_property(rel, "ownedMemberElement"), Value::Ref(owned.element));
        assert_eq!(store.get_property(owned.element, "owningMembership"), Value::Ref(rel));
    }

    #[test]
    fn unparented_when_no_binding() {
        let mut store = Store::new(Arc::new(kernel()));
        let m = store.create_element("Membership").expect("create");
        let owned = store.create_owned_element(m, "Package").expect("owned");
        assert!(owned.relationship.is_none());
        assert_eq!(store.composite_parent(owned.element), None);
        assert_eq!(store.local_count(), 2);
    }

    #[test]
    fn unknown_owner_is_an_error() {
        let mut store = Store::new(Arc::new(kernel()));
        let result = store.create_owned_element(ElementId::new(), "Package");
        assert!(matches!(result, Err(MetagraphError::ElementNotFound(_))));
    }
}

//! # Mount Federation
//!
//! Read-only composition of stores under stable string ids.
//!
//! A mounted store is shared through an `Arc`, so the mounting store can
//! read it but never write it. All stores in a federation are governed by
//! the same schema instance.

use crate::store::Store;
use crate::{ElementId, MetagraphError};
use std::sync::Arc;

/// A store made visible to another store for reads and traversal.
#[derive(Debug, Clone)]
pub struct Mount {
    id: String,
    store: Arc<Store>,
}

impl Mount {
    /// The mount id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The mounted store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Local elements of the mounted store that have no composite owner.
    ///
    /// These are the entry points collaborators use to start name resolution
    /// inside the mounted model.
    #[must_use]
    pub fn root_namespaces(&self) -> Vec<ElementId> {
        self.store
            .get_local_elements()
            .map(|instance| instance.id)
            .filter(|id| self.store.composite_parent(*id).is_none())
            .collect()
    }
}

impl Store {
    /// Mount `store` under `id`.
    ///
    /// Returns `false` when the same store is already mounted under `id`.
    /// Mounting a different store under a taken id replaces the old mount.
    pub fn mount(&mut self, id: impl Into<String>, store: Arc<Store>) -> Result<bool, MetagraphError> {
        let id = id.into();
        if !Arc::ptr_eq(&self.schema, &store.schema) {
            return Err(MetagraphError::Schema(format!(
                "mount '{}' is governed by a different schema",
                id
            )));
        }
        if let Some(existing) = self.mounts.get(&id) {
            if Arc::ptr_eq(&existing.store, &store) {
                return Ok(false);
            }
        }

        tracing::debug!(mount = %id, elements = store.local_count(), "mounted store");
        self.mounts.insert(id.clone(), Mount { id, store });
        Ok(true)
    }

    /// Remove the mount `id`. Returns `false` if nothing was mounted there.
    pub fn unmount(&mut self, id: &str) -> bool {
        let removed = self.mounts.remove(id).is_some();
        if removed {
            tracing::debug!(mount = id, "unmounted store");
        }
        removed
    }

    /// Get an active mount.
    #[must_use]
    pub fn get_mount(&self, id: &str) -> Option<&Mount> {
        self.mounts.get(id)
    }

    /// Active mounts in id order.
    pub fn mounts(&self) -> impl Iterator<Item = &Mount> + '_ {
        self.mounts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MetaAssociation, MetaAssociationEnd, MetaClass, MetaProperty, SchemaRegistry};
    use crate::Value;

    fn schema() -> Arc<SchemaRegistry> {
        let mut schema = SchemaRegistry::new();
        schema
            .register_class(
                MetaClass::new("Element").with_attribute(MetaProperty::new("name", "String")),
            )
            .expect("register");
        schema
            .register_class(MetaClass::new("Namespace").with_superclass("Element"))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "Membership",
                MetaAssociationEnd::new("namespace", "Namespace").single(),
                MetaAssociationEnd::new("member", "Element").composite(),
            ))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "Import",
                MetaAssociationEnd::new("importer", "Namespace"),
                MetaAssociationEnd::new("imported", "Element"),
            ))
            .expect("register");
        Arc::new(schema)
    }

    fn library(schema: &Arc<SchemaRegistry>) -> (Arc<Store>, ElementId, ElementId) {
        let mut lib = Store::new(Arc::clone(schema));
        let pkg = lib.create_element("Namespace").expect("create");
        let item = lib.create_element("Element").expect("create");
        lib.set_property(pkg, "name", Value::from("Lib")).expect("name");
        lib.create_link("Membership", pkg, item).expect("link");
        (Arc::new(lib), pkg, item)
    }

    #[test]
    fn mounted_elements_are_visible_but_not_local() {
        let schema = schema();
        let (lib, pkg, item) = library(&schema);
        let mut store = Store::new(Arc::clone(&schema));
        let own = store.create_element("Namespace").expect("create");

        assert!(store.mount("lib", Arc::clone(&lib)).expect("mount"));
        assert!(!store.mount("lib", lib).expect("remount"));

        assert!(store.get_instance(pkg).is_some());
        assert_eq!(store.get_property(pkg, "name"), Value::from("Lib"));
        assert_eq!(store.get_linked_targets("Membership", pkg), vec![item]);
        assert_eq!(store.get_local_elements().count(), 1);
        assert_eq!(store.get_all_elements(), vec![own, pkg, item]);
    }

    #[test]
    fn unmount_is_idempotent() {
        let schema = schema();
        let (lib, pkg, _) = library(&schema);
        let mut store = Store::new(Arc::clone(&schema));
        store.mount("lib", lib).expect("mount");

        assert!(store.unmount("lib"));
        assert!(!store.unmount("lib"));
        assert!(store.get_instance(pkg).is_none());
    }

    #[test]
    fn mounted_elements_are_read_only() {
        let schema = schema();
        let (lib, pkg, item) = library(&schema);
        let mut store = Store::new(Arc::clone(&schema));
        store.mount("lib", lib).expect("mount");

        let write = store.set_property(pkg, "name", Value::from("x"));
        assert!(matches!(write, Err(MetagraphError::InvalidOperation(_))));

        let local = store.create_element("Namespace").expect("create");
        let steal = store.create_link("Membership", local, item);
        assert!(matches!(steal, Err(MetagraphError::InvalidOperation(_))));
        assert_eq!(store.get_linked_sources("Membership", item), vec![pkg]);
    }

    #[test]
    fn local_links_may_reference_mounted_elements() {
        let schema = schema();
        let (lib, pkg, _) = library(&schema);
        let mut store = Store::new(Arc::clone(&schema));
        store.mount("lib", lib).expect("mount");
        let local = store.create_element("Namespace").expect("create");

        store.create_link("Import", local, pkg).expect("import");
        assert_eq!(store.get_linked_sources("Import", pkg), vec![local]);
    }

    #[test]
    fn root_namespaces_skip_owned_elements() {
        let schema = schema();
        let (lib, pkg, _) = library(&schema);
        let mut store = Store::new(Arc::clone(&schema));
        store.mount("lib", lib).expect("mount");

        let mount = store.get_mount("lib").expect("mount");
        assert_eq!(mount.id(), "lib");
        assert_eq!(mount.root_namespaces(), vec![pkg]);
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let (lib, _, _) = library(&schema());
        let mut store = Store::new(schema());
        let result = store.mount("lib", lib);
        assert!(matches!(result, Err(MetagraphError::Schema(_))));
        assert_eq!(store.mounts().count(), 0);
    }
}

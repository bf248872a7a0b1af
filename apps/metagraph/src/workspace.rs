//! # Workspace Loading
//!
//! Builds a working store from the schema, model and mount documents named
//! by the settings. Documents are JSON unless the file extension is `.toml`.
//!
//! Mounted models are loaded into their own stores first and mounted before
//! the working models, so working links may reference mounted elements as
//! `<mount id>:<key>`.

use metagraph_core::{
    ElementId, MetagraphError, ModelDocument, SchemaDocument, SchemaRegistry, Store,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum size of one schema or model document (100 MB).
const MAX_DOCUMENT_SIZE: u64 = 100 * 1024 * 1024;

/// A mount to build: id plus its model documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSource {
    pub id: String,
    pub paths: Vec<PathBuf>,
}

/// Everything needed to assemble a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sources {
    pub schema: Option<PathBuf>,
    pub models: Vec<PathBuf>,
    pub mounts: Vec<MountSource>,
}

/// A loaded store plus the document keys of every loaded element.
#[derive(Debug)]
pub struct Workspace {
    pub store: Store,
    pub keys: BTreeMap<String, ElementId>,
}

impl Workspace {
    /// Load schema, mounts and models, in that order.
    pub fn load(sources: &Sources) -> Result<Self, MetagraphError> {
        let schema = Arc::new(load_schema(sources)?);
        let mut store = Store::new(Arc::clone(&schema));
        let mut keys = BTreeMap::new();

        for mount in &sources.mounts {
            let mut mounted = Store::new(Arc::clone(&schema));
            let mut scope = BTreeMap::new();
            for path in &mount.paths {
                let document: ModelDocument = read_document(path)?;
                document.load_into_scope(&mut mounted, &mut scope)?;
            }
            tracing::info!(
                mount = %mount.id,
                elements = mounted.local_count(),
                "mounted model loaded"
            );
            for (key, id) in scope {
                keys.insert(format!("{}:{}", mount.id, key), id);
            }
            store.mount(mount.id.clone(), Arc::new(mounted))?;
        }

        for path in &sources.models {
            let document: ModelDocument = read_document(path)?;
            document.load_into_scope(&mut store, &mut keys)?;
            tracing::info!(path = %path.display(), "model loaded");
        }

        Ok(Self { store, keys })
    }

    /// Document key of `id`, if it was loaded from a document.
    #[must_use]
    pub fn key_of(&self, id: ElementId) -> Option<&str> {
        self.keys
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }
}

/// Load only the schema.
pub fn load_schema(sources: &Sources) -> Result<SchemaRegistry, MetagraphError> {
    let path = sources.schema.as_deref().ok_or_else(|| {
        MetagraphError::Document(
            "no schema given; pass --schema or set [schema] path in metagraph.toml".to_string(),
        )
    })?;
    let document: SchemaDocument = read_document(path)?;
    SchemaRegistry::from_document(document)
}

/// Read one JSON or TOML document.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, MetagraphError> {
    let canonical = validate_file_path(path)?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| io_error(path, &e))?;
    if metadata.len() > MAX_DOCUMENT_SIZE {
        return Err(MetagraphError::Document(format!(
            "'{}' is {} bytes, exceeding the maximum of {} bytes",
            path.display(),
            metadata.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    let contents = std::fs::read_to_string(&canonical).map_err(|e| io_error(path, &e))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&contents)
            .map_err(|e| MetagraphError::Document(format!("{}: {}", path.display(), e)))
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| MetagraphError::Document(format!("{}: {}", path.display(), e)))
    }
}

/// Canonicalize `path` and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, MetagraphError> {
    let canonical = path.canonicalize().map_err(|e| io_error(path, &e))?;
    if !canonical.is_file() {
        return Err(MetagraphError::Document(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

fn io_error(path: &Path, error: &std::io::Error) -> MetagraphError {
    MetagraphError::Document(format!("cannot read '{}': {}", path.display(), error))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use metagraph_core::Value;
    use std::fs;

    const SCHEMA: &str = r#"{
        "classes": [
            {"name": "Element", "attributes": [{"name": "name", "type": "String"}]},
            {"name": "Namespace", "superclasses": ["Element"]}
        ],
        "associations": [{
            "name": "Membership",
            "source": {"name": "namespace", "type": "Namespace", "multiplicity": {"lower": 0, "upper": 1}},
            "target": {"name": "member", "type": "Element", "aggregation": "COMPOSITE"}
        }]
    }"#;

    #[test]
    fn loads_mounts_before_models() {
        let dir = tempfile::tempdir().expect("tempdir");
        let schema = dir.path().join("schema.json");
        let library = dir.path().join("library.toml");
        let model = dir.path().join("model.json");
        fs::write(&schema, SCHEMA).expect("write");
        fs::write(
            &library,
            "[[elements]]\nkey = \"root\"\nclass = \"Namespace\"\nattributes = { name = \"Lib\" }\n",
        )
        .expect("write");
        fs::write(
            &model,
            r#"{"elements": [{"key": "e", "class": "Element", "attributes": {"name": "E"}}],
                "links": [{"association": "Membership", "source": "lib:root", "target": "e"}]}"#,
        )
        .expect("write");

        let sources = Sources {
            schema: Some(schema),
            models: vec![model],
            mounts: vec![MountSource {
                id: "lib".into(),
                paths: vec![library],
            }],
        };
        let workspace = Workspace::load(&sources).expect("load");
        let e = workspace.keys["e"];
        let root = workspace.keys["lib:root"];

        assert_eq!(workspace.store.local_count(), 1);
        assert_eq!(workspace.store.get_property(e, "namespace"), Value::Ref(root));
        assert_eq!(workspace.key_of(root), Some("lib:root"));
    }

    #[test]
    fn missing_schema_is_reported() {
        let result = Workspace::load(&Sources::default());
        assert!(matches!(result, Err(MetagraphError::Document(_))));
    }

    #[test]
    fn malformed_document_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write");

        let result: Result<SchemaDocument, _> = read_document(&path);
        let Err(MetagraphError::Document(message)) = result else {
            unreachable!("expected a document error");
        };
        assert!(message.contains("broken.json"));
    }
}

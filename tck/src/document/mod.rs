//! Exported scene documents.
//!
//! A [`Document`] is a read-only view over the JSON part of an artifact
//! (plain `.gltf` or the JSON chunk of a `.glb`). Entities are addressed
//! through [`EntitySelector`] and resolved by name with
//! [`find_entity`], since the authoring tool is free to reorder them.

mod resolver;
mod selector;

pub use resolver::{find_entity, find_entity_index};
pub use selector::{EntityRef, EntitySelector, NameOrIndex};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{HarnessError, HarnessResult};
use crate::validator::glb;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// JSON text with a leading UTF-8 byte order mark removed.
pub(crate) fn strip_utf8_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Entity collections of a document.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
#[allow(missing_docs)]
pub enum CollectionKind {
    Scenes,
    Nodes,
    Materials,
    Textures,
    Images,
    Meshes,
    Cameras,
    Skins,
    Samplers,
    Accessors,
    BufferViews,
    Buffers,
    Animations,
}

impl CollectionKind {
    /// Top-level key of the collection.
    pub fn key(self) -> &'static str {
        self.into()
    }
}

/// Parsed artifact JSON.
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
    source: Option<PathBuf>,
}

impl Document {
    /// Wrap an already parsed JSON root.
    pub fn from_value(root: Value) -> Self {
        Self { root, source: None }
    }

    /// Parse artifact bytes, accepting both JSON text and GLB containers.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> HarnessResult<Self> {
        let unrecognized = |reason: String| HarnessError::ValidatorInputUnrecognized {
            path: path.to_path_buf(),
            reason,
        };

        let json: &[u8] = if glb::is_glb(bytes) {
            glb::read_container(bytes)
                .map_err(|e| unrecognized(e.to_string()))?
                .json
        } else {
            strip_utf8_bom(bytes)
        };

        let root: Value = serde_json::from_slice(json).map_err(|e| unrecognized(e.to_string()))?;
        if !root.is_object() {
            return Err(unrecognized("document root is not an object".to_string()));
        }
        Ok(Self {
            root,
            source: Some(path.to_path_buf()),
        })
    }

    /// Read and parse an artifact from disk.
    pub async fn load(path: &Path) -> HarnessResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| HarnessError::io(path, e))?;
        Self::from_bytes(&bytes, path)
    }

    /// Underlying JSON root.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Path the document was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Entities of a collection; empty when the collection is absent.
    pub fn collection(&self, kind: CollectionKind) -> &[Value] {
        self.root
            .get(kind.key())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entity at a collection position.
    pub fn entity(&self, kind: CollectionKind, index: usize) -> Option<&Value> {
        self.collection(kind).get(index)
    }

    /// Names listed in `extensionsUsed`.
    pub fn extensions_used(&self) -> Vec<&str> {
        self.root
            .get("extensionsUsed")
            .and_then(Value::as_array)
            .map(|used| used.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Document-level `extensions` map.
    pub fn root_extensions(&self) -> Option<&Map<String, Value>> {
        entity_extensions(&self.root)
    }
}

/// Per-entity `extensions` map.
pub fn entity_extensions(entity: &Value) -> Option<&Map<String, Value>> {
    entity.get("extensions").and_then(Value::as_object)
}

/// Escape one JSON-pointer segment.
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_and_extensions() {
        let doc = Document::from_value(json!({
            "asset": { "version": "2.0" },
            "extensionsUsed": ["MOZ_hubs_components"],
            "extensions": { "MOZ_hubs_components": { "version": 4 } },
            "nodes": [{ "name": "Cube" }, { "name": "Camera" }]
        }));

        assert_eq!(doc.collection(CollectionKind::Nodes).len(), 2);
        assert!(doc.collection(CollectionKind::Materials).is_empty());
        assert_eq!(doc.extensions_used(), vec!["MOZ_hubs_components"]);
        assert!(doc
            .root_extensions()
            .is_some_and(|ext| ext.contains_key("MOZ_hubs_components")));
        assert_eq!(
            doc.entity(CollectionKind::Nodes, 1).and_then(|n| n.get("name")),
            Some(&json!("Camera"))
        );
    }

    #[test]
    fn test_from_bytes_rejects_non_document() {
        let err = Document::from_bytes(b"\x00\x01binary", Path::new("x.gltf")).unwrap_err();
        assert_eq!(err.kind(), "ValidatorInputUnrecognized");

        let err = Document::from_bytes(b"[1, 2]", Path::new("x.gltf")).unwrap_err();
        assert_eq!(err.kind(), "ValidatorInputUnrecognized");
    }

    #[test]
    fn test_from_bytes_skips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(br#"{"asset":{"version":"2.0"},"nodes":[{"name":"Cube"}]}"#);
        let doc = Document::from_bytes(&bytes, Path::new("bom.gltf")).unwrap();
        assert_eq!(doc.collection(CollectionKind::Nodes).len(), 1);
    }

    #[test]
    fn test_collection_kind_strings() {
        assert_eq!(CollectionKind::BufferViews.key(), "bufferViews");
        assert_eq!(CollectionKind::BufferViews.to_string(), "bufferViews");
        assert_eq!(
            "materials".parse::<CollectionKind>().unwrap(),
            CollectionKind::Materials
        );
    }

    #[test]
    fn test_pointer_escaping() {
        assert_eq!(escape_pointer_segment("a/b~c"), "a~1b~0c");
    }
}

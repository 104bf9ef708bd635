//! Name-based entity lookup.
//!
//! The authoring tool may reorder, merge or duplicate entities, so fixtures
//! refer to entities by authored name. When several entities share a name
//! the last one wins, matching the tool where later definitions shadow
//! earlier ones.

use serde_json::Value;

use super::{CollectionKind, Document};
use crate::error::{HarnessError, HarnessResult};

/// Find the last entity of `kind` whose `name` equals `name`.
///
/// Returns the entity together with its position in the collection.
pub fn find_entity<'a>(
    document: &'a Document,
    kind: CollectionKind,
    name: &str,
) -> HarnessResult<(&'a Value, usize)> {
    let index = find_entity_index(document, kind, name)?;
    let entity = &document.collection(kind)[index];
    Ok((entity, index))
}

/// Position of the last entity of `kind` named `name`.
pub fn find_entity_index(
    document: &Document,
    kind: CollectionKind,
    name: &str,
) -> HarnessResult<usize> {
    document
        .collection(kind)
        .iter()
        .rposition(|entity| entity.get("name").and_then(Value::as_str) == Some(name))
        .ok_or_else(|| HarnessError::EntityNotFound {
            collection: kind.key().to_string(),
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::from_value(json!({
            "nodes": [
                { "name": "Cube" },
                { "name": "Light" },
                { "name": "Camera", "camera": 0 },
                { "name": "Cube", "mesh": 1 }
            ],
            "materials": [{ "name": "Material" }, { "name": "Material.001" }]
        }))
    }

    #[test]
    fn test_finds_position() {
        let doc = doc();
        let (camera, index) = find_entity(&doc, CollectionKind::Nodes, "Camera").unwrap();
        assert_eq!(index, 2);
        assert_eq!(camera["camera"], json!(0));
    }

    #[test]
    fn test_last_match_wins() {
        let doc = doc();
        let (cube, index) = find_entity(&doc, CollectionKind::Nodes, "Cube").unwrap();
        assert_eq!(index, 3);
        assert_eq!(cube["mesh"], json!(1));
    }

    #[test]
    fn test_material_index_is_collection_relative() {
        let doc = doc();
        assert_eq!(
            find_entity_index(&doc, CollectionKind::Materials, "Material.001").unwrap(),
            1
        );
    }

    #[test]
    fn test_missing_entity() {
        let doc = doc();
        let err = find_entity(&doc, CollectionKind::Nodes, "Speaker").unwrap_err();
        assert!(matches!(
            err,
            HarnessError::EntityNotFound { ref collection, ref name }
                if collection == "nodes" && name == "Speaker"
        ));
        assert!(find_entity(&doc, CollectionKind::Textures, "Any").is_err());
    }
}

//! Extension assertion engine.
//!
//! Compares the extension payload of one entity against a fixture tree.
//! The comparison is fail-fast: the first divergence is reported with its
//! pointer and both values, and siblings are not visited.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use strum::Display;

use super::fixture::{FixtureValue, LinkPlaceholder};
use crate::config::defaults;
use crate::document::{entity_extensions, escape_pointer_segment, Document, EntityRef};
use crate::error::{HarnessError, HarnessResult};

const ABSENT: &str = "<absent>";

/// How much of an entity's extension map a fixture covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExpectationMode {
    /// The fixture is the whole map; extra components fail
    #[default]
    Exact,
    /// Only the listed components are compared
    Partial,
}

fn mismatch(path: &str, expected: impl Into<String>, actual: impl Into<String>) -> HarnessError {
    HarnessError::AssertionMismatch {
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        expected: expected.into(),
        actual: actual.into(),
    }
}

fn child_pointer(parent: &str, key: &str) -> String {
    format!("{}/{}", parent, escape_pointer_segment(key))
}

/// Number equality: exact for two integers, bit-exact `f64` otherwise.
pub fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.to_bits() == y.to_bits(),
        _ => false,
    }
}

/// Deep equality using [`numbers_equal`] for numbers. Map key order is ignored.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Compares extension payloads of one document.
#[derive(Debug, Clone, Copy)]
pub struct AssertionEngine<'a> {
    document: &'a Document,
    link_type_marker: &'a str,
}

impl<'a> AssertionEngine<'a> {
    /// Engine over `document` using the default link marker.
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            link_type_marker: defaults::LINK_TYPE_MARKER,
        }
    }

    /// Override the key marking link-typed fields.
    pub fn with_link_type_marker(mut self, marker: &'a str) -> Self {
        self.link_type_marker = marker;
        self
    }

    /// Top-level activation: declared in `extensionsUsed` and present in the
    /// document `extensions` map.
    pub fn check_document_activation(&self, extension: &str) -> HarnessResult<()> {
        let used = self.document.extensions_used();
        if !used.contains(&extension) {
            return Err(mismatch(
                "/extensionsUsed",
                format!("array containing \"{}\"", extension),
                format!("{:?}", used),
            ));
        }
        match self.document.root_extensions() {
            Some(map) if map.contains_key(extension) => Ok(()),
            _ => Err(mismatch(
                &child_pointer("/extensions", extension),
                "present",
                ABSENT,
            )),
        }
    }

    /// Local activation: the entity carries an entry for `extension`.
    ///
    /// Returns the entity's payload for the extension.
    pub fn check_entity_activation(
        &self,
        entity: &EntityRef<'a>,
        extension: &str,
    ) -> HarnessResult<&'a Value> {
        let entity_value: &'a Value = entity.entity;
        entity_extensions(entity_value)
            .and_then(|map| map.get(extension))
            .ok_or_else(|| {
                mismatch(
                    &child_pointer(&format!("{}/extensions", entity.pointer()), extension),
                    "present",
                    ABSENT,
                )
            })
    }

    /// Compare the `extension` payload of `entity` against `expected`.
    pub fn assert_extension(
        &self,
        entity: &EntityRef<'a>,
        extension: &str,
        mode: ExpectationMode,
        expected: &IndexMap<String, FixtureValue>,
    ) -> HarnessResult<()> {
        let payload = self.check_entity_activation(entity, extension)?;
        let base = child_pointer(&format!("{}/extensions", entity.pointer()), extension);
        let actual = payload
            .as_object()
            .ok_or_else(|| mismatch(&base, "object", payload.to_string()))?;

        match mode {
            ExpectationMode::Exact => self.compare_map(expected, actual, &base),
            ExpectationMode::Partial => {
                for (key, fixture) in expected {
                    let path = child_pointer(&base, key);
                    let value = actual
                        .get(key)
                        .ok_or_else(|| mismatch(&path, fixture.describe(), ABSENT))?;
                    self.compare(fixture, value, &path)?;
                }
                Ok(())
            }
        }
    }

    /// Expected `{<marker>: kind, index}` object for a link placeholder.
    pub fn resolve_link(&self, link: &LinkPlaceholder) -> HarnessResult<Value> {
        let (_, index) = link.target.resolve(self.document, link.kind.collection())?;
        let mut map = Map::new();
        map.insert(
            self.link_type_marker.to_string(),
            Value::from(link.kind.as_str()),
        );
        map.insert("index".to_string(), Value::from(index));
        Ok(Value::Object(map))
    }

    /// Recursive comparison of one fixture node at `path`.
    pub fn compare(&self, expected: &FixtureValue, actual: &Value, path: &str) -> HarnessResult<()> {
        match expected {
            FixtureValue::Literal(literal) => {
                if values_equal(literal, actual) {
                    Ok(())
                } else {
                    Err(mismatch(path, literal.to_string(), actual.to_string()))
                }
            }
            FixtureValue::List(items) => {
                let values = actual
                    .as_array()
                    .ok_or_else(|| mismatch(path, expected.describe(), actual.to_string()))?;
                if values.len() != items.len() {
                    return Err(mismatch(
                        path,
                        expected.describe(),
                        format!("array of {}", values.len()),
                    ));
                }
                items
                    .iter()
                    .zip(values)
                    .enumerate()
                    .try_for_each(|(i, (item, value))| {
                        self.compare(item, value, &format!("{}/{}", path, i))
                    })
            }
            FixtureValue::Nested(map) => {
                let object = actual
                    .as_object()
                    .ok_or_else(|| mismatch(path, expected.describe(), actual.to_string()))?;
                self.compare_map(map, object, path)
            }
            FixtureValue::Link(link) => {
                let resolved = self.resolve_link(link)?;
                if values_equal(&resolved, actual) {
                    Ok(())
                } else {
                    Err(mismatch(path, resolved.to_string(), actual.to_string()))
                }
            }
            FixtureValue::Redacted(shape) => {
                if shape.matches(actual) {
                    Ok(())
                } else {
                    Err(mismatch(path, expected.describe(), actual.to_string()))
                }
            }
        }
    }

    /// Exhaustive map comparison: fixture keys first, in fixture order, then
    /// any key the fixture does not list.
    fn compare_map(
        &self,
        expected: &IndexMap<String, FixtureValue>,
        actual: &Map<String, Value>,
        path: &str,
    ) -> HarnessResult<()> {
        for (key, fixture) in expected {
            let child = child_pointer(path, key);
            let value = actual
                .get(key)
                .ok_or_else(|| mismatch(&child, fixture.describe(), ABSENT))?;
            self.compare(fixture, value, &child)?;
        }
        if let Some((key, value)) = actual.iter().find(|(k, _)| !expected.contains_key(*k)) {
            return Err(mismatch(&child_pointer(path, key), ABSENT, value.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{EntitySelector, NameOrIndex};
    use serde_json::json;

    fn fixture(value: Value) -> IndexMap<String, FixtureValue> {
        match FixtureValue::parse(value).unwrap() {
            FixtureValue::Nested(map) => map,
            other => panic!("not a map: {:?}", other),
        }
    }

    fn with_node_ext(ext: Value) -> Document {
        Document::from_value(json!({
            "asset": { "version": "2.0" },
            "extensionsUsed": ["MOZ_hubs_components"],
            "extensions": { "MOZ_hubs_components": { "version": 4, "exporterVersion": "1.5.0" } },
            "nodes": [{ "name": "Light", "extensions": { "MOZ_hubs_components": ext } }]
        }))
    }

    fn assert_node0(
        doc: &Document,
        mode: ExpectationMode,
        expected: &IndexMap<String, FixtureValue>,
    ) -> HarnessResult<()> {
        let engine = AssertionEngine::new(doc);
        let node = EntitySelector::Node(NameOrIndex::Index(0)).select(doc)?;
        engine.check_document_activation("MOZ_hubs_components")?;
        engine.assert_extension(&node, "MOZ_hubs_components", mode, expected)
    }

    fn mismatch_path(err: HarnessError) -> String {
        match err {
            HarnessError::AssertionMismatch { path, .. } => path,
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_ambient_light_exact() {
        let doc = with_node_ext(json!({ "ambient-light": { "color": "#0cff00", "intensity": 1 } }));
        let expected = fixture(json!({ "ambient-light": { "color": "#0cff00", "intensity": 1 } }));
        assert_node0(&doc, ExpectationMode::Exact, &expected).unwrap();

        let wrong = fixture(json!({ "ambient-light": { "color": "#0cff01", "intensity": 1 } }));
        let err = assert_node0(&doc, ExpectationMode::Exact, &wrong).unwrap_err();
        assert_eq!(
            mismatch_path(err),
            "/nodes/0/extensions/MOZ_hubs_components/ambient-light/color"
        );
    }

    #[test]
    fn test_exact_rejects_extra_component_partial_does_not() {
        let doc = with_node_ext(json!({
            "audio": { "src": "a.mp3" },
            "networked": { "id": "a3670163-1e78-485c-b70d-9af51f6afaff" }
        }));
        let expected = fixture(json!({ "audio": { "src": "a.mp3" } }));

        let err = assert_node0(&doc, ExpectationMode::Exact, &expected).unwrap_err();
        assert_eq!(
            mismatch_path(err),
            "/nodes/0/extensions/MOZ_hubs_components/networked"
        );
        assert_node0(&doc, ExpectationMode::Partial, &expected).unwrap();
    }

    #[test]
    fn test_redacted_uuid() {
        let doc = with_node_ext(json!({ "networked": { "id": "a3670163-1e78-485c-b70d-9af51f6afaff" } }));
        let expected = fixture(json!({ "networked": { "id": { "$redacted": "uuid" } } }));
        assert_node0(&doc, ExpectationMode::Partial, &expected).unwrap();

        let doc = with_node_ext(json!({ "networked": { "id": "not-a-uuid" } }));
        assert!(assert_node0(&doc, ExpectationMode::Partial, &expected).is_err());

        let doc = with_node_ext(json!({ "networked": {} }));
        assert!(assert_node0(&doc, ExpectationMode::Partial, &expected).is_err());
    }

    #[test]
    fn test_floats_are_bit_exact() {
        let doc = Document::from_bytes(
            br#"{
                "extensionsUsed": ["MOZ_hubs_components"],
                "extensions": { "MOZ_hubs_components": {} },
                "nodes": [{ "extensions": { "MOZ_hubs_components": {
                    "fog": { "density": 0.10000000149011612, "near": 1.0 }
                } } }]
            }"#,
            std::path::Path::new("fog.gltf"),
        )
        .unwrap();

        let exact = fixture(json!({ "fog": { "density": 0.10000000149011612, "near": 1 } }));
        assert_node0(&doc, ExpectationMode::Exact, &exact).unwrap();

        let rounded = fixture(json!({ "fog": { "density": 0.1, "near": 1 } }));
        let err = assert_node0(&doc, ExpectationMode::Exact, &rounded).unwrap_err();
        assert!(mismatch_path(err).ends_with("/fog/density"));
    }

    #[test]
    fn test_link_resolved_by_name() {
        let doc = Document::from_value(json!({
            "extensionsUsed": ["MOZ_hubs_components"],
            "extensions": { "MOZ_hubs_components": {} },
            "nodes": [
                { "name": "Cube" },
                { "name": "Other" },
                { "name": "Camera" }
            ],
            "materials": [{
                "name": "Material.001",
                "extensions": { "MOZ_hubs_components": { "video-texture-target": {
                    "srcNode": { "__mhc_link_type": "node", "index": 2 }
                } } }
            }]
        }));
        let engine = AssertionEngine::new(&doc);
        let material = EntitySelector::Material(NameOrIndex::Name("Material.001".to_string()))
            .select(&doc)
            .unwrap();

        let by_name = fixture(json!({ "video-texture-target": {
            "srcNode": { "$link": { "kind": "node", "name": "Camera" } }
        } }));
        engine
            .assert_extension(&material, "MOZ_hubs_components", ExpectationMode::Exact, &by_name)
            .unwrap();

        let pinned = fixture(json!({ "video-texture-target": {
            "srcNode": { "$link": { "kind": "node", "index": 0 } }
        } }));
        assert!(engine
            .assert_extension(&material, "MOZ_hubs_components", ExpectationMode::Exact, &pinned)
            .is_err());

        let missing = fixture(json!({ "video-texture-target": {
            "srcNode": { "$link": { "kind": "node", "name": "Speaker" } }
        } }));
        let err = engine
            .assert_extension(&material, "MOZ_hubs_components", ExpectationMode::Exact, &missing)
            .unwrap_err();
        assert_eq!(err.kind(), "EntityNotFound");
    }

    #[test]
    fn test_activation_checked_first() {
        let doc = Document::from_value(json!({
            "extensionsUsed": [],
            "nodes": [{ "extensions": { "MOZ_hubs_components": { "shadow": {} } } }]
        }));
        let err = AssertionEngine::new(&doc)
            .check_document_activation("MOZ_hubs_components")
            .unwrap_err();
        assert_eq!(mismatch_path(err), "/extensionsUsed");

        let doc = Document::from_value(json!({
            "extensionsUsed": ["MOZ_hubs_components"],
            "extensions": { "MOZ_hubs_components": {} },
            "nodes": [{ "name": "Plain" }]
        }));
        let node = EntitySelector::Node(NameOrIndex::Index(0)).select(&doc).unwrap();
        let err = AssertionEngine::new(&doc)
            .check_entity_activation(&node, "MOZ_hubs_components")
            .unwrap_err();
        assert_eq!(mismatch_path(err), "/nodes/0/extensions/MOZ_hubs_components");
    }

    #[test]
    fn test_list_length_and_element() {
        let doc = with_node_ext(json!({ "video-texture-source": { "resolution": [1280, 720] } }));
        let short = fixture(json!({ "video-texture-source": { "resolution": [1280] } }));
        let err = assert_node0(&doc, ExpectationMode::Exact, &short).unwrap_err();
        assert!(mismatch_path(err).ends_with("/resolution"));

        let wrong = fixture(json!({ "video-texture-source": { "resolution": [1280, 721] } }));
        let err = assert_node0(&doc, ExpectationMode::Exact, &wrong).unwrap_err();
        assert!(mismatch_path(err).ends_with("/resolution/1"));
    }

    #[test]
    fn test_number_equality() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!(-3), &json!(-3)));
        assert!(!values_equal(&json!(0.1), &json!(0.10000000149011612)));
        assert!(!values_equal(&json!(1), &json!("1")));
        assert!(values_equal(&json!({ "a": 1, "b": 2 }), &json!({ "b": 2, "a": 1 })));
    }
}

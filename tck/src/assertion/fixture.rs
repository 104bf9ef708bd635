//! Expected-value trees.
//!
//! Fixtures are authored as plain YAML/JSON values with two reserved
//! single-key forms:
//!
//! ```yaml
//! srcNode: { $link: { kind: node, name: Camera } }   # or { kind: node, index: 0 }
//! id: { $redacted: uuid }                             # or version
//! ```
//!
//! Any other key starting with `$` is rejected when the fixture is parsed.

use std::fmt;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::document::{CollectionKind, NameOrIndex};

const LINK_KEY: &str = "$link";
const REDACTED_KEY: &str = "$redacted";

const UUID_PATTERN: &str =
    r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";
const VERSION_PATTERN: &str = r"^\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.-]+)?$";

/// Malformed fixture tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct FixtureError {
    /// Pointer of the offending fixture node
    pub path: String,
    /// What is wrong with it
    pub reason: String,
}

impl FixtureError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            reason: reason.into(),
        }
    }
}

/// Entity kinds a link field can point at.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum LinkKind {
    Node,
    Texture,
    Material,
}

impl LinkKind {
    /// Collection the link index is relative to.
    pub fn collection(self) -> CollectionKind {
        match self {
            LinkKind::Node => CollectionKind::Nodes,
            LinkKind::Texture => CollectionKind::Textures,
            LinkKind::Material => CollectionKind::Materials,
        }
    }

    /// Marker value written by the exporter.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Symbolic reference expanded to `{<marker>: kind, index}` at assertion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPlaceholder {
    /// Target entity kind
    pub kind: LinkKind,
    /// Target entity, by name (resolved) or pinned position
    pub target: NameOrIndex,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLink {
    kind: LinkKind,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    index: Option<usize>,
}

/// Lexical shape a redacted value must have.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RedactionShape {
    /// RFC 4122 textual UUID, any case
    Uuid,
    /// Dotted `major.minor.patch` version string
    Version,
}

impl RedactionShape {
    fn regex(self) -> Option<&'static Regex> {
        static UUID: OnceLock<Option<Regex>> = OnceLock::new();
        static VERSION: OnceLock<Option<Regex>> = OnceLock::new();
        match self {
            RedactionShape::Uuid => UUID.get_or_init(|| Regex::new(UUID_PATTERN).ok()),
            RedactionShape::Version => VERSION.get_or_init(|| Regex::new(VERSION_PATTERN).ok()),
        }
        .as_ref()
    }

    /// Whether `value` is a string of this shape.
    pub fn matches(self, value: &Value) -> bool {
        match (value.as_str(), self.regex()) {
            (Some(text), Some(regex)) => regex.is_match(text),
            _ => false,
        }
    }
}

/// One node of an expected-value tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum FixtureValue {
    /// Scalar compared by exact equality
    Literal(Value),
    /// Element-wise compared array of equal length
    List(Vec<FixtureValue>),
    /// Exhaustively compared map
    Nested(IndexMap<String, FixtureValue>),
    /// Link field resolved against the document
    Link(LinkPlaceholder),
    /// Present with the given shape, value not compared
    Redacted(RedactionShape),
}

impl FixtureValue {
    /// Parse a fixture from a plain value tree.
    pub fn parse(value: Value) -> Result<Self, FixtureError> {
        Self::parse_at(value, "")
    }

    fn parse_at(value: Value, path: &str) -> Result<Self, FixtureError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| Self::parse_at(item, &format!("{}/{}", path, i)))
                .collect::<Result<_, _>>()
                .map(FixtureValue::List),
            Value::Object(map) => Self::parse_object(map, path),
            scalar => Ok(FixtureValue::Literal(scalar)),
        }
    }

    fn parse_object(map: Map<String, Value>, path: &str) -> Result<Self, FixtureError> {
        if map.len() == 1 {
            if let Some(raw) = map.get(LINK_KEY) {
                return parse_link(raw.clone(), path).map(FixtureValue::Link);
            }
            if let Some(raw) = map.get(REDACTED_KEY) {
                return serde_json::from_value::<RedactionShape>(raw.clone())
                    .map(FixtureValue::Redacted)
                    .map_err(|e| FixtureError::new(path, format!("invalid $redacted: {}", e)));
            }
        }

        let mut nested = IndexMap::with_capacity(map.len());
        for (key, child) in map {
            if key.starts_with('$') {
                let reason = if key == LINK_KEY || key == REDACTED_KEY {
                    format!("reserved key '{}' must be the only key of its map", key)
                } else {
                    format!("unknown reserved key '{}'", key)
                };
                return Err(FixtureError::new(path, reason));
            }
            let child_path = format!("{}/{}", path, key);
            nested.insert(key, Self::parse_at(child, &child_path)?);
        }
        Ok(FixtureValue::Nested(nested))
    }

    /// Literal leaves of the tree, in document order.
    pub fn literals_mut(&mut self) -> Vec<&mut Value> {
        let mut out = Vec::new();
        self.collect_literals(&mut out);
        out
    }

    fn collect_literals<'a>(&'a mut self, out: &mut Vec<&'a mut Value>) {
        match self {
            FixtureValue::Literal(value) => out.push(value),
            FixtureValue::List(items) => items.iter_mut().for_each(|i| i.collect_literals(out)),
            FixtureValue::Nested(map) => map.values_mut().for_each(|v| v.collect_literals(out)),
            FixtureValue::Link(_) | FixtureValue::Redacted(_) => {}
        }
    }

    /// Short rendering of the expected value for mismatch reports.
    pub fn describe(&self) -> String {
        match self {
            FixtureValue::Literal(value) => value.to_string(),
            FixtureValue::List(items) => format!("array of {}", items.len()),
            FixtureValue::Nested(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                format!("object with keys [{}]", keys.join(", "))
            }
            FixtureValue::Link(link) => format!("link to {} {}", link.kind, link.target),
            FixtureValue::Redacted(shape) => format!("any {}", shape),
        }
    }
}

impl TryFrom<Value> for FixtureValue {
    type Error = FixtureError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl fmt::Display for FixtureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn parse_link(raw: Value, path: &str) -> Result<LinkPlaceholder, FixtureError> {
    let raw: RawLink = serde_json::from_value(raw)
        .map_err(|e| FixtureError::new(path, format!("invalid $link: {}", e)))?;
    let target = match (raw.name, raw.index) {
        (Some(name), None) => NameOrIndex::Name(name),
        (None, Some(index)) => NameOrIndex::Index(index),
        _ => {
            return Err(FixtureError::new(
                path,
                "$link needs exactly one of 'name' or 'index'",
            ))
        }
    };
    Ok(LinkPlaceholder {
        kind: raw.kind,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_special_forms() {
        let fixture: FixtureValue = serde_yaml::from_str(
            r#"
video-texture-target:
  targetBaseColorMap: true
  srcNode: { $link: { kind: node, name: Camera } }
networked:
  id: { $redacted: uuid }
"#,
        )
        .unwrap();

        let FixtureValue::Nested(top) = fixture else {
            panic!("expected a map");
        };
        let FixtureValue::Nested(target) = &top["video-texture-target"] else {
            panic!("expected a map");
        };
        assert_eq!(target["targetBaseColorMap"], FixtureValue::Literal(json!(true)));
        assert_eq!(
            target["srcNode"],
            FixtureValue::Link(LinkPlaceholder {
                kind: LinkKind::Node,
                target: NameOrIndex::Name("Camera".to_string()),
            })
        );
        let FixtureValue::Nested(networked) = &top["networked"] else {
            panic!("expected a map");
        };
        assert_eq!(networked["id"], FixtureValue::Redacted(RedactionShape::Uuid));
    }

    #[test]
    fn test_pinned_link() {
        let fixture = FixtureValue::parse(json!({ "$link": { "kind": "texture", "index": 1 } })).unwrap();
        assert_eq!(
            fixture,
            FixtureValue::Link(LinkPlaceholder {
                kind: LinkKind::Texture,
                target: NameOrIndex::Index(1),
            })
        );
    }

    #[test]
    fn test_rejects_unknown_reserved_keys() {
        let err = FixtureValue::parse(json!({ "a": { "$ref": "x" } })).unwrap_err();
        assert_eq!(err.path, "/a");
        assert!(err.reason.contains("unknown reserved key '$ref'"));

        let err = FixtureValue::parse(json!({ "$link": { "kind": "node" }, "extra": 1 })).unwrap_err();
        assert!(err.reason.contains("'$link'"));

        assert!(FixtureValue::parse(json!({ "$link": { "kind": "node", "name": "A", "index": 0 } })).is_err());
        assert!(FixtureValue::parse(json!({ "$link": { "kind": "scene", "index": 0 } })).is_err());
        assert!(FixtureValue::parse(json!({ "$redacted": "ulid" })).is_err());
    }

    #[test]
    fn test_redaction_shapes() {
        assert!(RedactionShape::Uuid.matches(&json!("a3670163-1e78-485c-b70d-9af51f6afaff")));
        assert!(RedactionShape::Uuid.matches(&json!("A3670163-1E78-485C-B70D-9AF51F6AFAFF")));
        assert!(!RedactionShape::Uuid.matches(&json!("a3670163-1e78-485c-b70d")));
        assert!(!RedactionShape::Uuid.matches(&json!(42)));

        assert!(RedactionShape::Version.matches(&json!("1.5.0")));
        assert!(RedactionShape::Version.matches(&json!("1.5.0-dev.1")));
        assert!(!RedactionShape::Version.matches(&json!("1.5")));
    }

    #[test]
    fn test_literals_mut_walks_in_order() {
        let mut fixture = FixtureValue::parse(json!({
            "a": 1,
            "b": [true, { "$redacted": "uuid" }],
            "c": { "d": "x" }
        }))
        .unwrap();
        let leaves: Vec<Value> = fixture.literals_mut().into_iter().map(|v| v.clone()).collect();
        assert_eq!(leaves, vec![json!(1), json!(true), json!("x")]);
    }
}

//! Entity selection.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{escape_pointer_segment, find_entity, CollectionKind, Document};
use crate::error::{HarnessError, HarnessResult};

/// Reference to an entity by authored name or by collection position.
///
/// Positions are only used by fixtures that predate name lookup; they are
/// pinned and break when the tool reorders entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameOrIndex {
    /// Collection position
    Index(usize),
    /// Authored name, last match wins
    Name(String),
}

impl NameOrIndex {
    /// Resolve against a collection, returning the entity and its position.
    pub fn resolve<'a>(
        &self,
        document: &'a Document,
        kind: CollectionKind,
    ) -> HarnessResult<(&'a Value, usize)> {
        match self {
            NameOrIndex::Name(name) => find_entity(document, kind, name),
            NameOrIndex::Index(index) => document
                .entity(kind, *index)
                .map(|entity| (entity, *index))
                .ok_or_else(|| HarnessError::EntityNotFound {
                    collection: kind.key().to_string(),
                    name: format!("#{}", index),
                }),
        }
    }
}

impl fmt::Display for NameOrIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrIndex::Index(index) => write!(f, "{}", index),
            NameOrIndex::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// Which document entity an expectation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitySelector {
    /// The document root
    Root,
    /// A scene by position
    Scene(usize),
    /// A node by name or position
    Node(NameOrIndex),
    /// A material by name or position
    Material(NameOrIndex),
}

/// A selected entity with its location in the document.
#[derive(Debug, Clone)]
pub struct EntityRef<'a> {
    /// The entity object
    pub entity: &'a Value,
    /// Collection and position, `None` for the root
    pub location: Option<(CollectionKind, usize)>,
}

impl EntityRef<'_> {
    /// JSON pointer of the entity.
    pub fn pointer(&self) -> String {
        match self.location {
            Some((kind, index)) => format!("/{}/{}", escape_pointer_segment(kind.key()), index),
            None => String::new(),
        }
    }
}

impl EntitySelector {
    /// Locate the selected entity.
    pub fn select<'a>(&self, document: &'a Document) -> HarnessResult<EntityRef<'a>> {
        let (kind, target) = match self {
            EntitySelector::Root => {
                return Ok(EntityRef {
                    entity: document.root(),
                    location: None,
                })
            }
            EntitySelector::Scene(index) => (CollectionKind::Scenes, NameOrIndex::Index(*index)),
            EntitySelector::Node(target) => (CollectionKind::Nodes, target.clone()),
            EntitySelector::Material(target) => (CollectionKind::Materials, target.clone()),
        };
        let (entity, index) = target.resolve(document, kind)?;
        Ok(EntityRef {
            entity,
            location: Some((kind, index)),
        })
    }
}

impl fmt::Display for EntitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntitySelector::Root => write!(f, "document root"),
            EntitySelector::Scene(index) => write!(f, "scene {}", index),
            EntitySelector::Node(target) => write!(f, "node {}", target),
            EntitySelector::Material(target) => write!(f, "material {}", target),
        }
    }
}

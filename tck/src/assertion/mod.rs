//! Extension assertions.
//!
//! A scenario lists [`ExtensionExpectation`]s: which entity, which
//! extension, how much of it, and the expected [`FixtureValue`] tree.
//! [`assert_expectations`] checks all activation invariants of a document
//! before comparing a single field.

mod engine;
mod fixture;

pub use engine::{numbers_equal, values_equal, AssertionEngine, ExpectationMode};
pub use fixture::{FixtureError, FixtureValue, LinkKind, LinkPlaceholder, RedactionShape};

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::document::{Document, EntitySelector};
use crate::error::HarnessResult;

/// Expected extension payload of one entity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionExpectation {
    /// Entity to inspect
    pub entity: EntitySelector,
    /// Whole map or listed components only
    #[serde(default)]
    pub mode: ExpectationMode,
    /// Extension name, defaults to the configured one
    #[serde(default)]
    pub extension: Option<String>,
    /// Expected components keyed by component name
    pub value: IndexMap<String, FixtureValue>,
}

impl ExtensionExpectation {
    /// Extension this expectation applies to.
    pub fn extension_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.extension.as_deref().unwrap_or(default)
    }
}

/// Check every expectation against `document`.
///
/// Order: document-level activation for each extension, entity selection
/// and entity-level activation for each expectation, then field comparison.
/// The first failure is returned.
pub fn assert_expectations(
    document: &Document,
    expectations: &[ExtensionExpectation],
    default_extension: &str,
    link_type_marker: &str,
) -> HarnessResult<()> {
    let engine = AssertionEngine::new(document).with_link_type_marker(link_type_marker);

    let mut extensions: Vec<&str> = Vec::new();
    for expectation in expectations {
        let name = expectation.extension_name(default_extension);
        if !extensions.contains(&name) {
            extensions.push(name);
        }
    }
    for name in &extensions {
        engine.check_document_activation(name)?;
    }

    let mut selected = Vec::with_capacity(expectations.len());
    for expectation in expectations {
        let entity = expectation.entity.select(document)?;
        engine.check_entity_activation(&entity, expectation.extension_name(default_extension))?;
        selected.push((expectation, entity));
    }

    for (expectation, entity) in &selected {
        debug!("Asserting {} on {}", expectation.extension_name(default_extension), expectation.entity);
        engine.assert_extension(
            entity,
            expectation.extension_name(default_extension),
            expectation.mode,
            &expectation.value,
        )?;
    }
    Ok(())
}

//! Scenario declarations and the registry that runs them.
//!
//! A scenario names an authored scene, the artifact it exports to, and the
//! extension payloads the artifact must carry:
//!
//! ```yaml
//! scenario:
//!   name: video-texture
//!   description: can export video-texture-source and video-texture-target
//! expect:
//!   - entity: { node: Camera }
//!     value:
//!       video-texture-source: { resolution: [1280, 720], fps: 15 }
//!   - entity: { material: Material.001 }
//!     value:
//!       video-texture-target:
//!         targetBaseColorMap: true
//!         targetEmissiveMap: true
//!         srcNode: { $link: { kind: node, name: Camera } }
//! ```

mod catalog;
mod parser;
mod registry;

pub use catalog::{builtin_set, BUILTIN_SETS};
pub use parser::{parse_scenario, parse_scenario_file, validate_scenario};
pub use registry::{Harness, ScenarioSet};

use serde::Deserialize;

use crate::assertion::ExtensionExpectation;
use crate::config::Variant;

/// Identity of a scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioMeta {
    /// Unique name within a set
    pub name: String,
    /// One-line description
    #[serde(default)]
    pub description: Option<String>,
    /// Artifact base name when it differs from the scenario name
    #[serde(default)]
    pub artifact: Option<String>,
}

/// One declared scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Name, description and artifact base name
    #[serde(rename = "scenario")]
    pub meta: ScenarioMeta,
    /// Expected extension payloads, checked in order
    #[serde(default)]
    pub expect: Vec<ExtensionExpectation>,
}

impl Scenario {
    /// Scenario name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Description, empty when none was declared.
    pub fn description(&self) -> &str {
        self.meta.description.as_deref().unwrap_or("")
    }

    /// Base name shared by the source scene and the exported artifact.
    pub fn artifact_base_name(&self) -> &str {
        self.meta.artifact.as_deref().unwrap_or(&self.meta.name)
    }

    /// Artifact file name produced under `variant`.
    pub fn artifact_file(&self, variant: &Variant) -> String {
        format!("{}{}", self.artifact_base_name(), variant.artifact_extension())
    }
}

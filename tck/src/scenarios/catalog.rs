//! Built-in fixture sets.
//!
//! Each set is authoritative for the tool versions it was authored
//! against; sets are never merged.

use super::{parse_scenario, ScenarioSet};
use crate::error::{HarnessError, HarnessResult};

macro_rules! scenario_files {
    ($set:literal: $($name:literal),+ $(,)?) => {
        &[$(($name, include_str!(concat!("../../scenarios/", $set, "/", $name, ".yaml")))),+]
    };
}

const DEFAULT_SET: &[(&str, &str)] = scenario_files!("default":
    "ambient-light",
    "ammo-shape",
    "audio",
    "audio-settings",
    "audio-target",
    "audio-zone",
    "directional-light",
    "environment-settings",
    "fog",
    "image",
    "loop-animation",
    "media-frame",
    "model",
    "morph-audio-feedback",
    "nav-mesh",
    "particle-emitter",
    "personal-space-invader",
    "point-light",
    "reflection-probe",
    "rigid-body",
    "shadow",
    "simple-water",
    "skybox",
    "spawner",
    "spot-light",
    "text_clip-rect",
    "video",
    "video-texture",
    "waypoint",
);

/// Names of the built-in fixture sets.
pub const BUILTIN_SETS: &[&str] = &["default"];

fn set_sources(name: &str) -> Option<&'static [(&'static str, &'static str)]> {
    match name {
        "default" => Some(DEFAULT_SET),
        _ => None,
    }
}

/// Parse a built-in fixture set.
pub fn builtin_set(name: &str) -> HarnessResult<ScenarioSet> {
    let sources = set_sources(name).ok_or_else(|| {
        HarnessError::InvalidConfig(format!(
            "unknown fixture set '{}', available: {}",
            name,
            BUILTIN_SETS.join(", ")
        ))
    })?;

    let scenarios = sources
        .iter()
        .map(|(_, yaml)| parse_scenario(yaml))
        .collect::<HarnessResult<Vec<_>>>()?;
    ScenarioSet::new(scenarios)
}

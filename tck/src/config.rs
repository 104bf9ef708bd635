//! Harness configuration.
//!
//! Every value the pipeline needs from the outside world (tool paths,
//! directories, automation script names, timeouts, the roundtrip allow-list)
//! lives here and is threaded explicitly into the components. Nothing is
//! read from or written to the process environment by the library.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::roundtrip::FieldPattern;

/// Default values for configuration
pub mod defaults {
    /// Root directory for all generated artifacts
    pub const OUT_PREFIX: &str = "tests_out";
    /// Directory holding the authored `.blend` scenes
    pub const SCENES_DIR: &str = "scenes";
    /// Directory the authoring tool loads user scripts (the addon) from
    pub const USER_SCRIPTS_DIR: &str = "..";
    /// Addon module enabled on every invocation
    pub const ADDON_MODULE: &str = "io_hubs_addon";
    /// Automation script exporting the opened scene
    pub const EXPORT_SCRIPT: &str = "export_gltf.py";
    /// Automation script importing an artifact and exporting it again
    pub const ROUNDTRIP_SCRIPT: &str = "roundtrip_gltf.py";
    /// Vendor extension under test
    pub const EXTENSION_NAME: &str = "MOZ_hubs_components";
    /// Key marking a link-typed extension field
    pub const LINK_TYPE_MARKER: &str = "__mhc_link_type";
    /// Built-in fixture set
    pub const FIXTURE_SET: &str = "default";
    /// Upper bound for one tool invocation
    pub const TIMEOUT_SECS: u64 = 600;
    /// Number of error messages kept in a validation digest
    pub const VALIDATION_DIGEST_LIMIT: usize = 6;

    /// Fields the import boundary is known not to preserve.
    pub const LOSSY_FIELDS: &[&str] = &[
        "/asset/generator",
        "/asset/extras/**",
        "/extensions/MOZ_hubs_components/exporterVersion",
        "/buffers/**",
        "/bufferViews/**",
        "/accessors/**",
        "/images/*/uri",
        "/nodes/*/translation",
        "/nodes/*/rotation",
        "/nodes/*/scale",
    ];

    /// Default authoring tool executable for the host platform.
    pub fn tool_executable() -> &'static str {
        if cfg!(target_os = "macos") {
            "/Applications/Blender.app/Contents/MacOS/Blender"
        } else if cfg!(target_os = "windows") {
            "blender.exe"
        } else {
            "blender"
        }
    }
}

/// One authoring tool installation to run the suite against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolTarget {
    /// Identity used in output directory names and reports
    pub label: String,
    /// Executable path or command name
    pub executable: PathBuf,
}

impl ToolTarget {
    /// Build a target whose label is the executable path itself.
    pub fn from_executable(executable: impl Into<PathBuf>) -> Self {
        let executable = executable.into();
        Self {
            label: executable.display().to_string(),
            executable,
        }
    }

    /// Label reduced to characters safe inside a single path component.
    pub fn dir_label(&self) -> String {
        self.label
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// An export variant: extra arguments handed to the automation scripts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Suffix appended to the per-pair output directory
    #[serde(default)]
    pub suffix: String,
    /// Arguments appended verbatim after the positional ones
    #[serde(default)]
    pub args: Vec<String>,
}

impl Variant {
    /// Parse `SUFFIX=ARG ARG...` as given on the command line.
    pub fn parse(raw: &str) -> Self {
        let (suffix, args) = raw.split_once('=').unwrap_or((raw, ""));
        Self {
            suffix: suffix.to_string(),
            args: args.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Artifact file extension produced under this variant.
    pub fn artifact_extension(&self) -> &'static str {
        if self.args.iter().any(|a| a == "--glb") {
            ".glb"
        } else {
            ".gltf"
        }
    }

    /// Human-readable name used in reports.
    pub fn display_name(&self) -> String {
        if self.suffix.is_empty() {
            "default".to_string()
        } else {
            self.suffix.clone()
        }
    }
}

/// Complete harness configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Authoring tool installations
    pub tools: Vec<ToolTarget>,
    /// Export variants run for every tool
    pub variants: Vec<Variant>,
    /// Root directory for generated artifacts
    pub out_prefix: PathBuf,
    /// Directory holding `<artifact>.blend` source scenes
    pub scenes_dir: PathBuf,
    /// User-scripts root handed to every invocation
    pub user_scripts_dir: PathBuf,
    /// Addon module enabled on every invocation
    pub addon_module: String,
    /// Export automation script
    pub export_script: String,
    /// Import-and-reexport automation script
    pub roundtrip_script: String,
    /// Bounded wait for one invocation, in seconds
    pub timeout_secs: u64,
    /// Also capture standard error of failed invocations
    pub capture_stderr: bool,
    /// Vendor extension under test
    pub extension_name: String,
    /// Key marking link-typed fields
    pub link_type_marker: String,
    /// Roundtrip allow-list patterns
    pub lossy_fields: Vec<String>,
    /// Built-in fixture set name
    pub fixture_set: String,
    /// Load scenarios from this directory instead of the built-in set
    pub scenarios_dir: Option<PathBuf>,
    /// Error messages kept in a structural validation digest
    pub validation_digest_limit: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tools: vec![ToolTarget::from_executable(defaults::tool_executable())],
            variants: vec![Variant::default()],
            out_prefix: PathBuf::from(defaults::OUT_PREFIX),
            scenes_dir: PathBuf::from(defaults::SCENES_DIR),
            user_scripts_dir: PathBuf::from(defaults::USER_SCRIPTS_DIR),
            addon_module: defaults::ADDON_MODULE.to_string(),
            export_script: defaults::EXPORT_SCRIPT.to_string(),
            roundtrip_script: defaults::ROUNDTRIP_SCRIPT.to_string(),
            timeout_secs: defaults::TIMEOUT_SECS,
            capture_stderr: false,
            extension_name: defaults::EXTENSION_NAME.to_string(),
            link_type_marker: defaults::LINK_TYPE_MARKER.to_string(),
            lossy_fields: defaults::LOSSY_FIELDS.iter().map(|s| s.to_string()).collect(),
            fixture_set: defaults::FIXTURE_SET.to_string(),
            scenarios_dir: None,
            validation_digest_limit: defaults::VALIDATION_DIGEST_LIMIT,
        }
    }
}

impl HarnessConfig {
    /// Load a configuration from a YAML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: HarnessConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.tools.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "at least one tool must be configured".to_string(),
            ));
        }
        if self.variants.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "at least one variant must be configured".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(HarnessError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.extension_name.is_empty() || self.link_type_marker.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "extension_name and link_type_marker cannot be empty".to_string(),
            ));
        }
        self.lossy_patterns()?;
        Ok(())
    }

    /// Bounded wait for one tool invocation.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed roundtrip allow-list.
    pub fn lossy_patterns(&self) -> HarnessResult<Vec<FieldPattern>> {
        self.lossy_fields
            .iter()
            .map(|raw| FieldPattern::parse(raw))
            .collect()
    }

    /// Output directory shared by all scenarios of one (tool, variant) pair.
    pub fn pair_dir(&self, tool: &ToolTarget, variant: &Variant) -> PathBuf {
        self.out_prefix
            .join(format!("out{}{}", tool.dir_label(), variant.suffix))
    }

    /// Export output directory for a pair.
    pub fn export_dir(&self, tool: &ToolTarget, variant: &Variant) -> PathBuf {
        self.pair_dir(tool, variant).join("export")
    }

    /// Roundtrip output directory for a pair.
    pub fn roundtrip_dir(&self, tool: &ToolTarget, variant: &Variant) -> PathBuf {
        self.pair_dir(tool, variant).join("roundtrip")
    }

    /// Source scene for an artifact base name.
    pub fn scene_path(&self, artifact_base_name: &str) -> PathBuf {
        self.scenes_dir.join(format!("{}.blend", artifact_base_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.validation_digest_limit, 6);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
tools:
  - label: blender-3.6
    executable: /opt/blender-3.6/blender
timeout_secs: 120
"#;
        let config: HarnessConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tools[0].label, "blender-3.6");
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert_eq!(config.extension_name, "MOZ_hubs_components");
        assert_eq!(config.variants, vec![Variant::default()]);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = HarnessConfig {
            timeout_secs: 0,
            ..HarnessConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_lossy_pattern() {
        let config = HarnessConfig {
            lossy_fields: vec!["nodes/*/rotation".to_string()],
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_variant_extension_and_parse() {
        let glb = Variant::parse("_glb=--glb --use-variants");
        assert_eq!(glb.suffix, "_glb");
        assert_eq!(glb.args, vec!["--glb", "--use-variants"]);
        assert_eq!(glb.artifact_extension(), ".glb");
        assert_eq!(Variant::default().artifact_extension(), ".gltf");
        assert_eq!(Variant::parse("_plain").args.len(), 0);
    }

    #[test]
    fn test_pair_directories() {
        let config = HarnessConfig {
            out_prefix: PathBuf::from("/tmp/out"),
            ..HarnessConfig::default()
        };
        let tool = ToolTarget {
            label: "blender 4.1".to_string(),
            executable: PathBuf::from("blender"),
        };
        let variant = Variant::parse("_glb=--glb");
        assert_eq!(
            config.export_dir(&tool, &variant),
            PathBuf::from("/tmp/out/outblender_4.1_glb/export")
        );
        assert_eq!(
            config.roundtrip_dir(&tool, &variant),
            PathBuf::from("/tmp/out/outblender_4.1_glb/roundtrip")
        );
        assert_eq!(
            config.scene_path("audio"),
            PathBuf::from("scenes/audio.blend")
        );
    }
}

//! YAML scenario parser.

use std::path::Path;

use anyhow::{Context, Result};

use super::Scenario;
use crate::error::{HarnessError, HarnessResult};

const UNNAMED: &str = "<unnamed>";

/// Parse and validate one scenario document.
pub fn parse_scenario(yaml: &str) -> HarnessResult<Scenario> {
    let scenario: Scenario =
        serde_yaml::from_str(yaml).map_err(|e| HarnessError::InvalidScenario {
            name: declared_name(yaml).unwrap_or_else(|| UNNAMED.to_string()),
            reason: e.to_string(),
        })?;
    validate_scenario(&scenario)?;
    Ok(scenario)
}

/// Read and parse a scenario file.
pub fn parse_scenario_file(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
    parse_scenario(&content)
        .with_context(|| format!("Failed to parse scenario file: {}", path.display()))
}

/// Best-effort `scenario.name` of a document that failed to deserialize.
fn declared_name(yaml: &str) -> Option<String> {
    let raw: serde_yaml::Value = serde_yaml::from_str(yaml).ok()?;
    raw.get("scenario")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Check a deserialized scenario for declarations the pipeline cannot run.
pub fn validate_scenario(scenario: &Scenario) -> HarnessResult<()> {
    let invalid = |reason: String| HarnessError::InvalidScenario {
        name: if scenario.name().is_empty() {
            UNNAMED.to_string()
        } else {
            scenario.name().to_string()
        },
        reason,
    };

    if scenario.name().trim().is_empty() {
        return Err(invalid("Scenario name cannot be empty".to_string()));
    }

    let artifact = scenario.artifact_base_name();
    if artifact.trim().is_empty()
        || artifact == "."
        || artifact == ".."
        || artifact.contains(['/', '\\'])
    {
        return Err(invalid(format!(
            "Artifact name '{}' must be a single file name",
            artifact
        )));
    }

    for (i, expectation) in scenario.expect.iter().enumerate() {
        if expectation.extension.as_deref().is_some_and(str::is_empty) {
            return Err(invalid(format!("expect[{}]: extension name cannot be empty", i)));
        }
        if let Some(key) = expectation.value.keys().find(|k| k.starts_with('$')) {
            return Err(invalid(format!(
                "expect[{}]: reserved key '{}' is not allowed as a component name",
                i, key
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::{ExpectationMode, FixtureValue};
    use crate::document::{EntitySelector, NameOrIndex};
    use std::io::Write;

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
scenario:
  name: audio-zone
  description: can export audio-zone
expect:
  - entity: { node: 0 }
    mode: partial
    value:
      audio-zone: { inOut: true, outIn: true }
      networked:
        id: { $redacted: uuid }
"#;
        let scenario = parse_scenario(yaml).unwrap();
        assert_eq!(scenario.name(), "audio-zone");
        assert_eq!(scenario.description(), "can export audio-zone");
        assert_eq!(scenario.expect.len(), 1);

        let expectation = &scenario.expect[0];
        assert_eq!(expectation.entity, EntitySelector::Node(NameOrIndex::Index(0)));
        assert_eq!(expectation.mode, ExpectationMode::Partial);
        assert!(matches!(
            expectation.value.get("networked"),
            Some(FixtureValue::Nested(_))
        ));
    }

    #[test]
    fn test_empty_name_fails() {
        let yaml = r#"
scenario:
  name: ""
expect: []
"#;
        let err = parse_scenario(yaml).unwrap_err();
        assert_eq!(err.kind(), "InvalidScenario");
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_reserved_component_name_fails() {
        let yaml = r#"
scenario:
  name: shadow
expect:
  - entity: { node: 0 }
    value:
      $shadow: { cast: true }
"#;
        let err = parse_scenario(yaml).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidScenario { ref name, .. } if name == "shadow"));
    }

    #[test]
    fn test_unknown_reserved_value_carries_name() {
        let yaml = r#"
scenario:
  name: fog
expect:
  - entity: { scene: 0 }
    value:
      fog: { density: { $approx: 0.1 } }
"#;
        let err = parse_scenario(yaml).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidScenario { ref name, .. } if name == "fog"));
    }

    #[test]
    fn test_artifact_with_separator_fails() {
        let yaml = r#"
scenario:
  name: escape
  artifact: ../../etc/escape
"#;
        assert!(parse_scenario(yaml).is_err());
    }

    #[test]
    fn test_parse_scenario_file_context() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scenario: [not, a, map]").unwrap();

        let err = parse_scenario_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse scenario file"));
    }
}

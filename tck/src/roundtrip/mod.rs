//! Export, reimport, compare.
//!
//! ```text
//!   Exported ──▶ Reimported ──▶ Compared ──▶ Done
//!      │             │             │
//!      └─────────────┴─────────────┴──▶ error tagged with the state it was raised in
//! ```
//!
//! Artifact A is the first export, artifact B the result of feeding A back
//! through the tool's import path and exporting again. Both must validate,
//! B must still satisfy the scenario's expectations, and every field outside
//! the lossy allow-list must be identical between A and B.

mod diff;
mod pattern;

pub use diff::{diff_documents, Divergence, DocumentDiff};
pub use pattern::FieldPattern;

use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::assertion::{assert_expectations, ExtensionExpectation};
use crate::config::HarnessConfig;
use crate::document::Document;
use crate::driver::{InvocationBuilder, ToolRunner};
use crate::error::{HarnessError, HarnessResult};
use crate::validator::StructuralValidator;

/// States of the roundtrip state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[allow(missing_docs)]
pub enum RoundtripStage {
    Exported,
    Reimported,
    Compared,
    Done,
}

/// Where artifact A comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundtripSource {
    /// Export this scene first
    Scene(PathBuf),
    /// Reuse an artifact an earlier export produced
    Artifact(PathBuf),
}

/// Inputs of one roundtrip.
#[derive(Debug, Clone)]
pub struct RoundtripPlan {
    /// Authoring tool executable
    pub tool: PathBuf,
    /// Source of artifact A
    pub source: RoundtripSource,
    /// Artifact file name, shared by both generations
    pub artifact_file: String,
    /// Where A is exported to
    pub export_dir: PathBuf,
    /// Where B is exported to
    pub roundtrip_dir: PathBuf,
    /// Variant arguments for both invocations
    pub extra_args: Vec<String>,
}

/// Result of a successful roundtrip.
#[derive(Debug, Clone)]
pub struct RoundtripOutcome {
    /// First generation
    pub artifact_a: PathBuf,
    /// Second generation
    pub artifact_b: PathBuf,
    /// Differences absorbed by the allow-list
    pub ignored_fields: usize,
    /// Last state reached, always `Done`
    pub stage: RoundtripStage,
}

/// Drives one roundtrip through its states.
pub struct RoundtripRunner<'a> {
    runner: &'a dyn ToolRunner,
    validator: &'a StructuralValidator,
    invocations: &'a InvocationBuilder,
    lossy: Vec<FieldPattern>,
    extension_name: String,
    link_type_marker: String,
    digest_limit: usize,
}

impl<'a> RoundtripRunner<'a> {
    /// Runner with the allow-list, extension and marker taken from `config`.
    pub fn new(
        runner: &'a dyn ToolRunner,
        validator: &'a StructuralValidator,
        invocations: &'a InvocationBuilder,
        config: &HarnessConfig,
    ) -> HarnessResult<Self> {
        Ok(Self {
            runner,
            validator,
            invocations,
            lossy: config.lossy_patterns()?,
            extension_name: config.extension_name.clone(),
            link_type_marker: config.link_type_marker.clone(),
            digest_limit: config.validation_digest_limit,
        })
    }

    /// Run all states; `expectations` are re-checked on artifact B.
    pub async fn run(
        &self,
        plan: &RoundtripPlan,
        expectations: &[ExtensionExpectation],
    ) -> HarnessResult<RoundtripOutcome> {
        let artifact_a = self
            .export(plan)
            .await
            .map_err(|e| e.tagged(RoundtripStage::Exported))?;
        debug!("Roundtrip {} -> {}", plan.artifact_file, RoundtripStage::Exported);

        let artifact_b = self
            .reimport(plan, &artifact_a)
            .await
            .map_err(|e| e.tagged(RoundtripStage::Reimported))?;
        debug!("Roundtrip {} -> {}", plan.artifact_file, RoundtripStage::Reimported);

        let ignored_fields = self
            .compare(&artifact_a, &artifact_b, expectations)
            .await
            .map_err(|e| e.tagged(RoundtripStage::Compared))?;
        debug!("Roundtrip {} -> {}", plan.artifact_file, RoundtripStage::Compared);

        Ok(RoundtripOutcome {
            artifact_a,
            artifact_b,
            ignored_fields,
            stage: RoundtripStage::Done,
        })
    }

    async fn export(&self, plan: &RoundtripPlan) -> HarnessResult<PathBuf> {
        let artifact = match &plan.source {
            RoundtripSource::Scene(scene) => {
                let invocation = self.invocations.export(
                    &plan.tool,
                    Some(scene.as_path()),
                    &plan.export_dir,
                    &plan.extra_args,
                );
                self.runner.execute(&invocation).await?;
                plan.export_dir.join(&plan.artifact_file)
            }
            RoundtripSource::Artifact(path) => path.clone(),
        };
        ensure_written(&artifact).await?;
        Ok(artifact)
    }

    async fn reimport(&self, plan: &RoundtripPlan, artifact_a: &Path) -> HarnessResult<PathBuf> {
        let invocation = self.invocations.reimport(
            &plan.tool,
            artifact_a,
            &plan.roundtrip_dir,
            &plan.extra_args,
        );
        self.runner.execute(&invocation).await?;
        let artifact_b = plan.roundtrip_dir.join(&plan.artifact_file);
        ensure_written(&artifact_b).await?;
        Ok(artifact_b)
    }

    async fn compare(
        &self,
        artifact_a: &Path,
        artifact_b: &Path,
        expectations: &[ExtensionExpectation],
    ) -> HarnessResult<usize> {
        self.validator.ensure_valid(artifact_a).await?;
        self.validator.ensure_valid(artifact_b).await?;

        let a = Document::load(artifact_a).await?;
        let b = Document::load(artifact_b).await?;
        assert_expectations(&b, expectations, &self.extension_name, &self.link_type_marker)?;

        let diff = diff_documents(a.root(), b.root(), &self.lossy);
        if diff.is_clean() {
            Ok(diff.ignored)
        } else {
            Err(HarnessError::RoundtripDivergence {
                count: diff.divergences.len(),
                digest: diff.digest(self.digest_limit),
            })
        }
    }
}

/// A successful invocation must leave the artifact behind.
pub(crate) async fn ensure_written(artifact: &Path) -> HarnessResult<()> {
    match tokio::fs::metadata(artifact).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(HarnessError::ToolInvocationFailed {
            reason: format!("{} is not a file", artifact.display()),
            stdout: String::new(),
            stderr: None,
        }),
        Err(e) => Err(HarnessError::ToolInvocationFailed {
            reason: format!("no artifact at {}: {}", artifact.display(), e),
            stdout: String::new(),
            stderr: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Invocation, InvocationMode};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Writes `export` on export and `reimport` on reimport.
    struct ScriptedTool {
        export: Value,
        reimport: Option<Value>,
        calls: Mutex<Vec<InvocationMode>>,
    }

    #[async_trait]
    impl ToolRunner for ScriptedTool {
        async fn execute(&self, invocation: &Invocation) -> HarnessResult<()> {
            self.calls.lock().unwrap().push(invocation.mode.clone());
            std::fs::create_dir_all(&invocation.output_dir).unwrap();
            let body = match &invocation.mode {
                InvocationMode::Export { .. } => &self.export,
                InvocationMode::Reimport { .. } => match &self.reimport {
                    Some(body) => body,
                    None => {
                        return Err(HarnessError::ToolInvocationFailed {
                            reason: "exit status 1".to_string(),
                            stdout: "import failed".to_string(),
                            stderr: None,
                        })
                    }
                },
            };
            std::fs::write(
                invocation.output_dir.join("shadow.gltf"),
                serde_json::to_vec(body).unwrap(),
            )
            .unwrap();
            Ok(())
        }
    }

    fn exported(cast: bool, generator: &str) -> Value {
        json!({
            "asset": { "version": "2.0", "generator": generator },
            "extensionsUsed": ["MOZ_hubs_components"],
            "extensions": { "MOZ_hubs_components": { "version": 4 } },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "Cube", "extensions": { "MOZ_hubs_components": {
                "shadow": { "cast": cast, "receive": true }
            } } }]
        })
    }

    fn plan(dir: &Path) -> RoundtripPlan {
        RoundtripPlan {
            tool: PathBuf::from("blender"),
            source: RoundtripSource::Scene(dir.join("shadow.blend")),
            artifact_file: "shadow.gltf".to_string(),
            export_dir: dir.join("export"),
            roundtrip_dir: dir.join("roundtrip"),
            extra_args: Vec::new(),
        }
    }

    async fn run(tool: &ScriptedTool, dir: &Path) -> HarnessResult<RoundtripOutcome> {
        let config = HarnessConfig::default();
        let validator = StructuralValidator::default();
        let invocations = InvocationBuilder::from_config(&config);
        let runner = RoundtripRunner::new(tool, &validator, &invocations, &config)?;
        runner.run(&plan(dir), &[]).await
    }

    #[tokio::test]
    async fn test_clean_roundtrip_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ScriptedTool {
            export: exported(false, "v3"),
            reimport: Some(exported(false, "v4")),
            calls: Mutex::new(Vec::new()),
        };
        let outcome = run(&tool, dir.path()).await.unwrap();
        assert_eq!(outcome.stage, RoundtripStage::Done);
        assert_eq!(outcome.ignored_fields, 1);
        assert_eq!(outcome.artifact_b, dir.path().join("roundtrip/shadow.gltf"));

        let calls = tool.calls.lock().unwrap();
        assert!(matches!(calls[0], InvocationMode::Export { .. }));
        assert_eq!(
            calls[1],
            InvocationMode::Reimport {
                artifact: dir.path().join("export/shadow.gltf")
            }
        );
    }

    #[tokio::test]
    async fn test_semantic_drift_is_tagged_compared() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ScriptedTool {
            export: exported(false, "v3"),
            reimport: Some(exported(true, "v3")),
            calls: Mutex::new(Vec::new()),
        };
        let err = run(&tool, dir.path()).await.unwrap_err();
        assert_eq!(err.stage(), Some(RoundtripStage::Compared));
        assert_eq!(err.kind(), "RoundtripDivergence");
        assert!(err.to_string().contains("/shadow/cast"));
    }

    #[tokio::test]
    async fn test_structural_failure_in_b_is_distinguishable() {
        let dir = tempfile::tempdir().unwrap();
        let mut broken = exported(false, "v3");
        broken["scene"] = json!(5);
        let tool = ScriptedTool {
            export: exported(false, "v3"),
            reimport: Some(broken),
            calls: Mutex::new(Vec::new()),
        };
        let err = run(&tool, dir.path()).await.unwrap_err();
        assert_eq!(err.stage(), Some(RoundtripStage::Compared));
        assert_eq!(err.kind(), "StructuralValidationFailed");
        assert!(err.to_string().contains("roundtrip"));
    }

    #[tokio::test]
    async fn test_reimport_failure_stops_the_machine() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ScriptedTool {
            export: exported(false, "v3"),
            reimport: None,
            calls: Mutex::new(Vec::new()),
        };
        let err = run(&tool, dir.path()).await.unwrap_err();
        assert_eq!(err.stage(), Some(RoundtripStage::Reimported));
        assert_eq!(err.kind(), "ToolInvocationFailed");
        assert!(!dir.path().join("roundtrip/shadow.gltf").exists());
    }

    #[tokio::test]
    async fn test_missing_source_artifact_is_tagged_exported() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ScriptedTool {
            export: exported(false, "v3"),
            reimport: Some(exported(false, "v3")),
            calls: Mutex::new(Vec::new()),
        };
        let config = HarnessConfig::default();
        let validator = StructuralValidator::default();
        let invocations = InvocationBuilder::from_config(&config);
        let runner = RoundtripRunner::new(&tool, &validator, &invocations, &config).unwrap();

        let mut plan = plan(dir.path());
        plan.source = RoundtripSource::Artifact(dir.path().join("export/absent.gltf"));
        let err = runner.run(&plan, &[]).await.unwrap_err();
        assert_eq!(err.stage(), Some(RoundtripStage::Exported));
        assert!(tool.calls.lock().unwrap().is_empty());
    }
}

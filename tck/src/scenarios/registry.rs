//! Scenario sets and the per-pair pipeline.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use walkdir::WalkDir;

use super::{builtin_set, parse_scenario_file, Scenario};
use crate::assertion::assert_expectations;
use crate::config::{HarnessConfig, ToolTarget, Variant};
use crate::document::Document;
use crate::driver::{InvocationBuilder, ToolRunner};
use crate::error::{HarnessError, HarnessResult};
use crate::report::{PairReport, Phase, RunReport, ScenarioResult};
use crate::roundtrip::{
    ensure_written, RoundtripOutcome, RoundtripPlan, RoundtripRunner, RoundtripSource,
};
use crate::validator::StructuralValidator;

/// Ordered scenarios with unique names.
#[derive(Debug, Clone, Default)]
pub struct ScenarioSet {
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    /// Build a set, rejecting duplicate names.
    pub fn new(scenarios: Vec<Scenario>) -> HarnessResult<Self> {
        let mut seen = HashSet::new();
        for scenario in &scenarios {
            if !seen.insert(scenario.name()) {
                return Err(HarnessError::InvalidScenario {
                    name: scenario.name().to_string(),
                    reason: "duplicate scenario name".to_string(),
                });
            }
        }
        Ok(Self { scenarios })
    }

    /// Load every `*.yaml`/`*.yml` below `dir`, in file name order.
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("Not a directory: {}", dir.display());
        }

        let mut scenarios = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("Failed to walk directory: {}", dir.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || !path
                    .extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                continue;
            }
            match parse_scenario_file(path) {
                Ok(scenario) => scenarios.push(scenario),
                Err(e) => {
                    warn!("Failed to load scenario {}: {:#}", path.display(), e);
                }
            }
        }

        Ok(Self::new(scenarios)?)
    }

    /// Scenarios selected by `config`: a directory when set, else a built-in set.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        match &config.scenarios_dir {
            Some(dir) => Self::load_from_dir(dir),
            None => Ok(builtin_set(&config.fixture_set)?),
        }
    }

    /// Keep only the named scenarios. Unknown names are an error.
    pub fn select(self, names: &[String]) -> HarnessResult<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(HarnessError::InvalidConfig(format!(
                "unknown scenario '{}'",
                unknown
            )));
        }
        let scenarios = self
            .scenarios
            .into_iter()
            .filter(|s| names.iter().any(|n| n == s.name()))
            .collect();
        Ok(Self { scenarios })
    }

    /// Scenario by name.
    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name() == name)
    }

    /// Scenarios in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    /// Number of scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Runs a scenario set against every configured (tool, variant) pair.
///
/// Within a pair every scenario is exported, validated and asserted first;
/// the roundtrip phase then reuses the exported artifacts. A failing
/// scenario is recorded in the report and never stops its siblings.
pub struct Harness {
    config: HarnessConfig,
    scenarios: ScenarioSet,
    runner: Arc<dyn ToolRunner>,
    validator: StructuralValidator,
    invocations: InvocationBuilder,
    roundtrip: bool,
}

impl Harness {
    /// Harness over a validated configuration.
    pub fn new(
        config: HarnessConfig,
        scenarios: ScenarioSet,
        runner: Arc<dyn ToolRunner>,
    ) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self {
            validator: StructuralValidator::from_config(&config),
            invocations: InvocationBuilder::from_config(&config),
            config,
            scenarios,
            runner,
            roundtrip: true,
        })
    }

    /// Replace the structural validator.
    pub fn with_validator(mut self, validator: StructuralValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the invocation builder.
    pub fn with_invocations(mut self, invocations: InvocationBuilder) -> Self {
        self.invocations = invocations;
        self
    }

    /// Enable or disable the roundtrip phase.
    pub fn with_roundtrip(mut self, enabled: bool) -> Self {
        self.roundtrip = enabled;
        self
    }

    /// Scenarios this harness runs.
    pub fn scenarios(&self) -> &ScenarioSet {
        &self.scenarios
    }

    /// Configuration this harness runs with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run every pair, one after the other.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::default();
        for tool in &self.config.tools {
            for variant in &self.config.variants {
                report.pairs.push(self.run_pair(tool, variant).await);
            }
        }
        report
    }

    /// Run all scenarios for one (tool, variant) pair.
    pub async fn run_pair(&self, tool: &ToolTarget, variant: &Variant) -> PairReport {
        let started = Instant::now();
        let mut report = PairReport::new(&tool.label, &variant.display_name());
        info!(
            "Running {} scenario(s) with {} [{}]",
            self.scenarios.len(),
            tool.label,
            variant.display_name()
        );

        let mut not_exported = HashSet::new();
        for scenario in self.scenarios.iter() {
            info!("Export: {}", scenario.name());
            let start = Instant::now();
            let outcome = self.export_scenario(scenario, tool, variant).await;
            match &outcome {
                Ok(_) => info!("Export: {} passed", scenario.name()),
                Err(e) => {
                    warn!("Export: {} failed: {}", scenario.name(), e);
                    if matches!(
                        e,
                        HarnessError::ToolInvocationFailed { .. }
                            | HarnessError::ToolInvocationTimedOut { .. }
                    ) {
                        not_exported.insert(scenario.name());
                    }
                }
            }
            report.add_result(ScenarioResult::from_outcome(
                scenario.name(),
                Phase::Export,
                &outcome,
                start.elapsed(),
            ));
        }

        if self.roundtrip {
            for scenario in self.scenarios.iter() {
                if not_exported.contains(scenario.name()) {
                    warn!("Roundtrip: {} skipped, no export artifact", scenario.name());
                    report.add_result(ScenarioResult::skip(
                        scenario.name(),
                        Phase::Roundtrip,
                        "export invocation failed",
                    ));
                    continue;
                }

                info!("Roundtrip: {}", scenario.name());
                let start = Instant::now();
                let outcome = self.roundtrip_scenario(scenario, tool, variant).await;
                match &outcome {
                    Ok(done) => info!(
                        "Roundtrip: {} passed ({} allow-listed field(s) differ)",
                        scenario.name(),
                        done.ignored_fields
                    ),
                    Err(e) => warn!("Roundtrip: {} failed: {}", scenario.name(), e),
                }
                report.add_result(ScenarioResult::from_outcome(
                    scenario.name(),
                    Phase::Roundtrip,
                    &outcome,
                    start.elapsed(),
                ));
            }
        }

        report.duration = started.elapsed();
        report
    }

    /// Export the scenario's scene, then validate and assert the artifact.
    pub async fn export_scenario(
        &self,
        scenario: &Scenario,
        tool: &ToolTarget,
        variant: &Variant,
    ) -> HarnessResult<PathBuf> {
        let export_dir = self.config.export_dir(tool, variant);
        let scene = self.config.scene_path(scenario.artifact_base_name());
        let invocation =
            self.invocations
                .export(&tool.executable, Some(scene.as_path()), &export_dir, &variant.args);
        self.runner.execute(&invocation).await?;

        let artifact = export_dir.join(scenario.artifact_file(variant));
        ensure_written(&artifact).await?;
        self.check_artifact(scenario, &artifact).await?;
        Ok(artifact)
    }

    /// Validate an existing artifact and check the scenario's expectations on it.
    pub async fn check_artifact(&self, scenario: &Scenario, artifact: &Path) -> HarnessResult<()> {
        let report = self.validator.ensure_valid(artifact).await?;
        debug!(
            "{} is valid ({} message(s))",
            artifact.display(),
            report.messages().len()
        );
        let document = Document::load(artifact).await?;
        assert_expectations(
            &document,
            &scenario.expect,
            &self.config.extension_name,
            &self.config.link_type_marker,
        )
    }

    /// Reimport the exported artifact and compare both generations.
    pub async fn roundtrip_scenario(
        &self,
        scenario: &Scenario,
        tool: &ToolTarget,
        variant: &Variant,
    ) -> HarnessResult<RoundtripOutcome> {
        let export_dir = self.config.export_dir(tool, variant);
        let artifact_file = scenario.artifact_file(variant);
        let plan = RoundtripPlan {
            tool: tool.executable.clone(),
            source: RoundtripSource::Artifact(export_dir.join(&artifact_file)),
            artifact_file,
            export_dir,
            roundtrip_dir: self.config.roundtrip_dir(tool, variant),
            extra_args: variant.args.clone(),
        };
        let runner = RoundtripRunner::new(
            self.runner.as_ref(),
            &self.validator,
            &self.invocations,
            &self.config,
        )?;
        runner.run(&plan, &scenario.expect).await
    }
}

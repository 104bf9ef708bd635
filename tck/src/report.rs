//! Run reports.
//!
//! Every scenario yields one [`ScenarioResult`] per phase. Results are
//! grouped per (tool, variant) pair in a [`PairReport`]; a [`RunReport`]
//! aggregates the pairs and renders as JSON, JUnit XML or text.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::HarnessError;
use crate::roundtrip::RoundtripStage;

const SUMMARY_WIDTH: usize = 100;

/// Pipeline phase a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Export, validate, assert
    Export,
    /// Reimport, validate both, re-assert, diff
    Roundtrip,
}

/// Outcome of one scenario phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Status {
    /// Phase completed
    Pass,
    /// Phase raised an error
    Fail,
    /// Phase not run because its input is not trustworthy
    Skip,
}

/// Result of one scenario phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub scenario: String,
    /// Phase
    pub phase: Phase,
    /// Outcome
    pub status: Status,
    /// Stable error kind when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Roundtrip state the error was raised in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Error message when failed, reason when skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl ScenarioResult {
    /// Passing result.
    pub fn pass(scenario: &str, phase: Phase, duration: Duration) -> Self {
        Self {
            scenario: scenario.to_string(),
            phase,
            status: Status::Pass,
            error_kind: None,
            stage: None,
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Failing result carrying the error kind and message.
    pub fn fail(scenario: &str, phase: Phase, error: &HarnessError, duration: Duration) -> Self {
        Self {
            scenario: scenario.to_string(),
            phase,
            status: Status::Fail,
            error_kind: Some(error.kind().to_string()),
            stage: error.stage().map(|s: RoundtripStage| s.to_string()),
            error: Some(error.to_string()),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Skipped result with the reason.
    pub fn skip(scenario: &str, phase: Phase, reason: impl Into<String>) -> Self {
        Self {
            scenario: scenario.to_string(),
            phase,
            status: Status::Skip,
            error_kind: None,
            stage: None,
            error: Some(reason.into()),
            duration_ms: 0,
        }
    }

    /// Build from a phase outcome.
    pub fn from_outcome<T>(
        scenario: &str,
        phase: Phase,
        outcome: &Result<T, HarnessError>,
        duration: Duration,
    ) -> Self {
        match outcome {
            Ok(_) => Self::pass(scenario, phase, duration),
            Err(e) => Self::fail(scenario, phase, e, duration),
        }
    }
}

/// Results of one (tool, variant) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    /// Tool label
    pub tool: String,
    /// Variant name
    pub variant: String,
    /// Start time, RFC 3339
    pub started_at: DateTime<Utc>,
    /// Total duration
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Passed phases
    pub passed: usize,
    /// Failed phases
    pub failed: usize,
    /// Skipped phases
    pub skipped: usize,
    /// Individual results in execution order
    pub results: Vec<ScenarioResult>,
}

impl PairReport {
    /// Empty report starting now.
    pub fn new(tool: &str, variant: &str) -> Self {
        Self {
            tool: tool.to_string(),
            variant: variant.to_string(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            passed: 0,
            failed: 0,
            skipped: 0,
            results: Vec::new(),
        }
    }

    /// Record a result.
    pub fn add_result(&mut self, result: ScenarioResult) {
        match result.status {
            Status::Pass => self.passed += 1,
            Status::Fail => self.failed += 1,
            Status::Skip => self.skipped += 1,
        }
        self.results.push(result);
    }

    /// Result of a scenario phase, if recorded.
    pub fn result(&self, scenario: &str, phase: Phase) -> Option<&ScenarioResult> {
        self.results
            .iter()
            .find(|r| r.scenario == scenario && r.phase == phase)
    }

    /// Display name of the pair.
    pub fn name(&self) -> String {
        format!("{} [{}]", self.tool, self.variant)
    }
}

/// Aggregated report of a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// One entry per (tool, variant) pair
    pub pairs: Vec<PairReport>,
}

impl RunReport {
    /// Total recorded phases.
    pub fn total(&self) -> usize {
        self.pairs.iter().map(|p| p.results.len()).sum()
    }

    /// Total failed phases.
    pub fn failed(&self) -> usize {
        self.pairs.iter().map(|p| p.failed).sum()
    }

    /// Whether no phase failed.
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Convert to JUnit XML, one testsuite per pair.
    pub fn to_junit_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuites name=\"hubs-tck\" tests=\"{}\" failures=\"{}\">\n",
            self.total(),
            self.failed()
        ));

        for pair in &self.pairs {
            xml.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\" time=\"{:.3}\" timestamp=\"{}\">\n",
                escape_xml(&pair.name()),
                pair.results.len(),
                pair.failed,
                pair.skipped,
                pair.duration.as_secs_f64(),
                pair.started_at.to_rfc3339()
            ));

            for result in &pair.results {
                xml.push_str(&format!(
                    "    <testcase classname=\"{}\" name=\"{}\" time=\"{:.3}\"",
                    result.phase,
                    escape_xml(&result.scenario),
                    result.duration_ms as f64 / 1000.0
                ));

                match result.status {
                    Status::Pass => xml.push_str(" />\n"),
                    Status::Fail => {
                        xml.push_str(">\n");
                        xml.push_str(&format!(
                            "      <failure type=\"{}\">{}</failure>\n",
                            escape_xml(result.error_kind.as_deref().unwrap_or("Error")),
                            escape_xml(result.error.as_deref().unwrap_or_default())
                        ));
                        xml.push_str("    </testcase>\n");
                    }
                    Status::Skip => {
                        xml.push_str(">\n");
                        xml.push_str(&format!(
                            "      <skipped message=\"{}\" />\n",
                            escape_xml(result.error.as_deref().unwrap_or_default())
                        ));
                        xml.push_str("    </testcase>\n");
                    }
                }
            }
            xml.push_str("  </testsuite>\n");
        }

        xml.push_str("</testsuites>\n");
        xml
    }

    /// Human-readable summary.
    pub fn render_summary(&self) -> String {
        let detail = textwrap::Options::new(SUMMARY_WIDTH)
            .initial_indent("      ")
            .subsequent_indent("      ");
        let mut out = String::from("\n=== Hubs TCK Report ===\n");

        for pair in &self.pairs {
            out.push_str(&format!(
                "\n{}\n  Passed: {} | Failed: {} | Skipped: {} | Duration: {:.2}s\n",
                pair.name(),
                pair.passed,
                pair.failed,
                pair.skipped,
                pair.duration.as_secs_f64()
            ));

            for result in pair.results.iter().filter(|r| r.status != Status::Pass) {
                out.push_str(&format!(
                    "  {} {} ({}){}\n",
                    result.status,
                    result.scenario,
                    result.phase,
                    result
                        .error_kind
                        .as_deref()
                        .map(|k| format!(": {}", k))
                        .unwrap_or_default()
                ));
                if let Some(error) = &result.error {
                    for line in error.lines().filter(|l| !l.trim().is_empty()) {
                        out.push_str(&textwrap::fill(line, &detail));
                        out.push('\n');
                    }
                }
            }
        }

        out.push_str(&format!(
            "\nTotal: {} | Failed: {}\nResult: {}\n",
            self.total(),
            self.failed(),
            if self.all_passed() { "PASS" } else { "FAIL" }
        ));
        out
    }

    /// Print human-readable summary
    pub fn print_summary(&self) {
        println!("{}", self.render_summary());
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

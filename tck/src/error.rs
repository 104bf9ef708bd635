//! Harness error taxonomy.
//!
//! Every failure a scenario can hit maps onto one [`HarnessError`] variant.
//! All of them are local to the scenario that raised them: the registry
//! records the error and moves on to the next scenario.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::roundtrip::RoundtripStage;

/// Result alias used throughout the harness.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error type for harness operations.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum HarnessError {
    /// Spawn failure, non-zero exit or death by signal of the authoring tool
    #[error("tool invocation failed: {reason}{}", captured_suffix(.stdout, .stderr))]
    ToolInvocationFailed {
        reason: String,
        stdout: String,
        stderr: Option<String>,
    },

    /// The authoring tool did not exit within the configured bound and was killed
    #[error("tool invocation timed out after {}s", .after.as_secs_f64())]
    ToolInvocationTimedOut { after: Duration },

    /// Bytes could not be recognised as glTF JSON or GLB
    #[error("validator could not recognise {}: {reason}", .path.display())]
    ValidatorInputUnrecognized { path: PathBuf, reason: String },

    /// The artifact is not well-formed
    #[error("Validation failed for {}\nFirst few messages:{digest}", .path.display())]
    StructuralValidationFailed { path: PathBuf, digest: String },

    /// A named entity is missing from a document collection
    #[error("no entity named '{name}' in '{collection}'")]
    EntityNotFound { collection: String, name: String },

    /// Expected and actual extension data diverge
    #[error("assertion mismatch at {path}: expected {expected}, got {actual}")]
    AssertionMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Roundtripped artifact differs outside the lossy allow-list
    #[error("roundtrip divergence in {count} field(s):{digest}")]
    RoundtripDivergence { count: usize, digest: String },

    /// An error raised while the roundtrip runner was in `stage`
    #[error("[{stage}] {source}")]
    RoundtripStageFailed {
        stage: RoundtripStage,
        #[source]
        source: Box<HarnessError>,
    },

    /// Scenario declaration is malformed
    #[error("invalid scenario '{name}': {reason}")]
    InvalidScenario { name: String, reason: String },

    /// Harness configuration is malformed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error outside of the resolver path
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn captured_suffix(stdout: &str, stderr: &Option<String>) -> String {
    let mut out = String::new();
    if !stdout.trim().is_empty() {
        out.push_str("\n--- stdout ---\n");
        out.push_str(stdout.trim_end());
    }
    if let Some(stderr) = stderr.as_deref().filter(|s| !s.trim().is_empty()) {
        out.push_str("\n--- stderr ---\n");
        out.push_str(stderr.trim_end());
    }
    out
}

impl HarnessError {
    /// Stable kind name used in reports.
    ///
    /// Stage-tagged roundtrip errors report the kind of the originating error.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::ToolInvocationFailed { .. } => "ToolInvocationFailed",
            HarnessError::ToolInvocationTimedOut { .. } => "ToolInvocationTimedOut",
            HarnessError::ValidatorInputUnrecognized { .. } => "ValidatorInputUnrecognized",
            HarnessError::StructuralValidationFailed { .. } => "StructuralValidationFailed",
            HarnessError::EntityNotFound { .. } => "EntityNotFound",
            HarnessError::AssertionMismatch { .. } => "AssertionMismatch",
            HarnessError::RoundtripDivergence { .. } => "RoundtripDivergence",
            HarnessError::RoundtripStageFailed { source, .. } => source.kind(),
            HarnessError::InvalidScenario { .. } => "InvalidScenario",
            HarnessError::InvalidConfig(_) => "InvalidConfig",
            HarnessError::Io { .. } => "Io",
        }
    }

    /// Roundtrip stage this error was raised in, if any.
    pub fn stage(&self) -> Option<RoundtripStage> {
        match self {
            HarnessError::RoundtripStageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, skipping stage tags.
    pub fn origin(&self) -> &HarnessError {
        match self {
            HarnessError::RoundtripStageFailed { source, .. } => source.origin(),
            other => other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn tagged(self, stage: RoundtripStage) -> Self {
        HarnessError::RoundtripStageFailed {
            stage,
            source: Box::new(self),
        }
    }
}

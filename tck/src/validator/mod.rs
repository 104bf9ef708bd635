//! Structural validation of exported artifacts.
//!
//! ```text
//!   artifact path ──read──▶ bytes ──▶ SchemaValidator ──▶ ValidationReport
//!                                          │                     │
//!                          ResourceResolver (relative URIs)      └─▶ digest on errors
//! ```
//!
//! The schema checker is a seam: [`BuiltinSchemaValidator`] covers the
//! checks the pipeline relies on, and any other implementation with the same
//! report surface can be plugged in through [`StructuralValidator::new`].

mod builtin;
pub mod glb;
mod resolver;

pub use builtin::BuiltinSchemaValidator;
pub use resolver::{RelativeResolver, ResourceResolver};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{defaults, HarnessConfig};
use crate::error::{HarnessError, HarnessResult};

/// Message severity, glTF-Validator numbering.
pub mod severity {
    /// Structural error
    pub const ERROR: u8 = 0;
    /// Suspicious but valid
    pub const WARNING: u8 = 1;
    /// Informational
    pub const INFO: u8 = 2;
    /// Hint
    pub const HINT: u8 = 3;
}

/// One validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    /// JSON pointer of the offending value
    #[serde(default)]
    pub pointer: String,
    /// Human readable description
    pub message: String,
    /// Stable issue code
    pub code: String,
    /// 0 error, 1 warning, 2 info, 3 hint
    pub severity: u8,
}

/// Issue list of one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issues {
    /// Error-severity messages
    pub num_errors: usize,
    /// Warning-severity messages
    pub num_warnings: usize,
    /// Info-severity messages
    pub num_infos: usize,
    /// Hint-severity messages
    pub num_hints: usize,
    /// Messages in emission order
    pub messages: Vec<ValidationMessage>,
}

/// Validation report, serialised as `{ "issues": { "numErrors", "messages" } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Counted messages
    pub issues: Issues,
}

impl ValidationReport {
    /// Build a report from messages, deriving the per-severity counts.
    pub fn from_messages(messages: Vec<ValidationMessage>) -> Self {
        let count = |sev: u8| messages.iter().filter(|m| m.severity == sev).count();
        Self {
            issues: Issues {
                num_errors: count(severity::ERROR),
                num_warnings: count(severity::WARNING),
                num_infos: count(severity::INFO),
                num_hints: count(severity::HINT),
                messages,
            },
        }
    }

    /// Number of error-severity messages.
    pub fn error_count(&self) -> usize {
        self.issues.num_errors
    }

    /// All messages in emission order.
    pub fn messages(&self) -> &[ValidationMessage] {
        &self.issues.messages
    }

    /// Whether the artifact is well-formed.
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    /// First `limit` error messages, one `\n<pointer> - <message> (<code>)` line each.
    pub fn digest(&self, limit: usize) -> String {
        self.issues
            .messages
            .iter()
            .filter(|m| m.severity == severity::ERROR)
            .take(limit)
            .map(|m| format!("\n{} - {} ({})", m.pointer, m.message, m.code))
            .collect()
    }
}

/// Failure of the schema checker itself, as opposed to a failing report.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ValidatorError {
    #[error("input is not a glTF document: {0}")]
    UnrecognizedInput(String),

    #[error("cannot resolve resource '{uri}': {reason}")]
    Resource { uri: String, reason: String },
}

/// Schema conformance checker: bytes plus resolver in, report out.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    /// Check `bytes`, reading external resources through `resolver`.
    async fn validate_bytes(
        &self,
        bytes: &[u8],
        resolver: &dyn ResourceResolver,
    ) -> Result<ValidationReport, ValidatorError>;
}

/// Validates artifacts on disk and gates the pipeline on a zero error count.
#[derive(Clone)]
pub struct StructuralValidator {
    schema: Arc<dyn SchemaValidator>,
    digest_limit: usize,
}

impl std::fmt::Debug for StructuralValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralValidator")
            .field("digest_limit", &self.digest_limit)
            .finish_non_exhaustive()
    }
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinSchemaValidator::default()))
    }
}

impl StructuralValidator {
    /// Validator delegating to `schema`.
    pub fn new(schema: Arc<dyn SchemaValidator>) -> Self {
        Self {
            schema,
            digest_limit: defaults::VALIDATION_DIGEST_LIMIT,
        }
    }

    /// Bundled checker with the configured digest bound.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::default().with_digest_limit(config.validation_digest_limit)
    }

    /// Number of error messages kept in a failure digest.
    pub fn with_digest_limit(mut self, limit: usize) -> Self {
        self.digest_limit = limit;
        self
    }

    /// Validate the artifact at `path`, resolving resources next to it.
    ///
    /// A report with errors is still `Ok`; see [`Self::ensure_valid`].
    pub async fn validate(&self, path: &Path) -> HarnessResult<ValidationReport> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| HarnessError::io(path, e))?;
        let resolver = RelativeResolver::for_artifact(path);

        match self.schema.validate_bytes(&bytes, &resolver).await {
            Ok(report) => {
                debug!(
                    "Validated {}: {} error(s), {} message(s)",
                    path.display(),
                    report.error_count(),
                    report.messages().len()
                );
                Ok(report)
            }
            Err(ValidatorError::UnrecognizedInput(reason)) => {
                Err(HarnessError::ValidatorInputUnrecognized {
                    path: path.to_path_buf(),
                    reason,
                })
            }
            Err(ValidatorError::Resource { uri, reason }) => {
                warn!("Unreadable resource '{}' in {}", uri, path.display());
                Err(HarnessError::StructuralValidationFailed {
                    path: path.to_path_buf(),
                    digest: format!("\n{} - {} (RESOURCE_UNREADABLE)", uri, reason),
                })
            }
        }
    }

    /// Validate and fail with a bounded digest unless the error count is zero.
    pub async fn ensure_valid(&self, path: &Path) -> HarnessResult<ValidationReport> {
        let report = self.validate(path).await?;
        if report.is_valid() {
            Ok(report)
        } else {
            Err(HarnessError::StructuralValidationFailed {
                path: path.to_path_buf(),
                digest: report.digest(self.digest_limit),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(code: &str, severity: u8) -> ValidationMessage {
        ValidationMessage {
            pointer: format!("/{}", code.to_lowercase()),
            message: format!("{} happened", code),
            code: code.to_string(),
            severity,
        }
    }

    #[test]
    fn test_digest_keeps_first_errors_only() {
        let mut messages = vec![message("UNUSED_EXTENSION", severity::INFO)];
        messages.extend((0..8).map(|i| message(&format!("E{}", i), severity::ERROR)));
        let report = ValidationReport::from_messages(messages);

        assert_eq!(report.error_count(), 8);
        assert_eq!(report.issues.num_infos, 1);

        let digest = report.digest(6);
        assert_eq!(digest.lines().filter(|l| !l.is_empty()).count(), 6);
        assert!(digest.starts_with("\n/e0 - E0 happened (E0)"));
        assert!(!digest.contains("E6"));
        assert!(!digest.contains("UNUSED_EXTENSION"));
    }

    #[test]
    fn test_report_surface() {
        let report = ValidationReport::from_messages(vec![message("X", severity::ERROR)]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["issues"]["numErrors"], json!(1));
        assert_eq!(value["issues"]["messages"][0]["code"], json!("X"));
    }

    #[tokio::test]
    async fn test_failure_message_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gltf");
        std::fs::write(&path, r#"{ "asset": { "version": "2.0" }, "scene": 3 }"#).unwrap();

        let err = StructuralValidator::default()
            .ensure_valid(&path)
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with(&format!("Validation failed for {}", path.display())));
        assert!(text.contains("First few messages:\n/scene - "));
        assert!(text.contains("(UNRESOLVED_REFERENCE)"));
    }

    #[tokio::test]
    async fn test_unreadable_resource_escalates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.gltf");
        std::fs::write(
            &path,
            r#"{ "asset": { "version": "2.0" }, "buffers": [{ "uri": "missing.bin", "byteLength": 4 }] }"#,
        )
        .unwrap();

        let err = StructuralValidator::default()
            .validate(&path)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "StructuralValidationFailed");
        assert!(err.to_string().contains("missing.bin"));
    }

    #[tokio::test]
    async fn test_unrecognized_input_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.gltf");
        std::fs::write(&path, [0u8, 159, 146, 150]).unwrap();

        let err = StructuralValidator::default()
            .validate(&path)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidatorInputUnrecognized");
    }
}

//! External resource resolution for validation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use log::debug;

use super::ValidatorError;

/// Reads resources referenced by URI from inside an artifact.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// Bytes of the resource at `uri`.
    ///
    /// Any failure fails the whole validation; resources are never skipped.
    async fn resolve(&self, uri: &str) -> Result<Vec<u8>, ValidatorError>;
}

/// Resolves URIs relative to the directory containing the artifact.
#[derive(Debug, Clone)]
pub struct RelativeResolver {
    base_dir: PathBuf,
}

impl RelativeResolver {
    /// Resolver rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Resolver rooted at the parent directory of `artifact`.
    pub fn for_artifact(artifact: &Path) -> Self {
        Self::new(artifact.parent().unwrap_or_else(|| Path::new(".")))
    }

    /// Filesystem path a relative URI points at.
    pub fn resolve_path(&self, uri: &str) -> Result<PathBuf, ValidatorError> {
        let decoded = urlencoding::decode(uri).map_err(|e| ValidatorError::Resource {
            uri: uri.to_string(),
            reason: format!("invalid percent-encoding: {}", e),
        })?;
        Ok(self.base_dir.join(decoded.as_ref()))
    }
}

#[async_trait]
impl ResourceResolver for RelativeResolver {
    async fn resolve(&self, uri: &str) -> Result<Vec<u8>, ValidatorError> {
        if let Some(payload) = uri.strip_prefix("data:") {
            return decode_data_uri(uri, payload);
        }
        let path = self.resolve_path(uri)?;
        debug!("Resolving resource {} -> {}", uri, path.display());
        tokio::fs::read(&path)
            .await
            .map_err(|e| ValidatorError::Resource {
                uri: uri.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })
    }
}

/// Decode the payload of a `data:` URI.
pub(crate) fn decode_data_uri(uri: &str, payload: &str) -> Result<Vec<u8>, ValidatorError> {
    let resource_error = |reason: String| ValidatorError::Resource {
        uri: truncate_uri(uri),
        reason,
    };
    let (header, data) = payload
        .split_once(',')
        .ok_or_else(|| resource_error("data URI has no payload separator".to_string()))?;

    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| resource_error(format!("invalid base64 payload: {}", e)))
    } else {
        Ok(urlencoding::decode_binary(data.as_bytes()).into_owned())
    }
}

fn truncate_uri(uri: &str) -> String {
    const MAX: usize = 48;
    match uri.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}...", &uri[..end]),
        None => uri.to_string(),
    }
}

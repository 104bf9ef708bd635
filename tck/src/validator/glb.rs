//! Binary glTF container.
//!
//! Layout: a 12-byte header (magic, version, total length) followed by
//! chunks of `(length, type, data)`. The first chunk is JSON, an optional
//! second chunk carries the binary buffer.

use thiserror::Error;

const MAGIC: &[u8; 4] = b"glTF";
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;
const SUPPORTED_VERSION: u32 = 2;

/// Error reading a GLB container.
#[derive(Debug, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GlbError {
    #[error("GLB header is truncated ({0} bytes)")]
    TruncatedHeader(usize),

    #[error("unsupported GLB version {0}")]
    UnsupportedVersion(u32),

    #[error("declared GLB length {declared} exceeds {actual} available bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("chunk at offset {0} is truncated")]
    TruncatedChunk(usize),

    #[error("first chunk must be JSON, found type {0:#010x}")]
    MissingJsonChunk(u32),
}

/// Borrowed view of the chunks of a GLB file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbContainer<'a> {
    /// JSON chunk payload
    pub json: &'a [u8],
    /// Binary chunk payload, if present
    pub bin: Option<&'a [u8]>,
}

/// Whether `bytes` start with the GLB magic.
pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
}

/// Split a GLB file into its JSON and binary chunks.
pub fn read_container(bytes: &[u8]) -> Result<GlbContainer<'_>, GlbError> {
    if bytes.len() < HEADER_LEN {
        return Err(GlbError::TruncatedHeader(bytes.len()));
    }
    let version = read_u32(bytes, 4).ok_or(GlbError::TruncatedHeader(bytes.len()))?;
    if version != SUPPORTED_VERSION {
        return Err(GlbError::UnsupportedVersion(version));
    }
    let declared = read_u32(bytes, 8).ok_or(GlbError::TruncatedHeader(bytes.len()))? as usize;
    if declared > bytes.len() {
        return Err(GlbError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let bytes = &bytes[..declared];

    let mut offset = HEADER_LEN;
    let mut chunks = Vec::new();
    while offset + CHUNK_HEADER_LEN <= bytes.len() {
        let length = read_u32(bytes, offset).ok_or(GlbError::TruncatedChunk(offset))? as usize;
        let kind = read_u32(bytes, offset + 4).ok_or(GlbError::TruncatedChunk(offset))?;
        let start = offset + CHUNK_HEADER_LEN;
        let data = bytes
            .get(start..start + length)
            .ok_or(GlbError::TruncatedChunk(offset))?;
        chunks.push((kind, data));
        offset = start + length;
    }

    let mut iter = chunks.into_iter();
    let json = match iter.next() {
        Some((CHUNK_JSON, data)) => data,
        Some((other, _)) => return Err(GlbError::MissingJsonChunk(other)),
        None => return Err(GlbError::TruncatedChunk(HEADER_LEN)),
    };
    let bin = iter.find(|(kind, _)| *kind == CHUNK_BIN).map(|(_, data)| data);

    Ok(GlbContainer { json, bin })
}

/// Assemble a GLB file from a JSON payload and optional binary payload.
///
/// Chunks are padded to 4-byte boundaries (spaces for JSON, zeros for BIN).
pub fn write_container(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    fn padded(data: &[u8], pad: u8) -> Vec<u8> {
        let mut out = data.to_vec();
        while out.len() % 4 != 0 {
            out.push(pad);
        }
        out
    }

    let json = padded(json, b' ');
    let bin = bin.map(|b| padded(b, 0));
    let total = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json.len()
        + bin.as_ref().map_or(0, |b| CHUNK_HEADER_LEN + b.len());

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&SUPPORTED_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    if let Some(bin) = bin {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
    }
    out
}

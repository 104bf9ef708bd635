//! Pointer patterns for the lossy-field allow-list.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment
    Any,
    /// trailing `**`: any suffix, including none
    Rest,
}

/// A JSON-pointer pattern such as `/nodes/*/rotation` or `/buffers/**`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPattern {
    raw: String,
    segments: Vec<Segment>,
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

impl FieldPattern {
    /// Parse a pattern. It must start with `/`; `**` is only allowed last.
    pub fn parse(raw: &str) -> HarnessResult<Self> {
        let invalid = |reason: &str| {
            HarnessError::InvalidConfig(format!("lossy field pattern '{}': {}", raw, reason))
        };
        let body = raw
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;

        let parts: Vec<&str> = body.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            segments.push(match *part {
                "**" if i + 1 == parts.len() => Segment::Rest,
                "**" => return Err(invalid("'**' is only allowed as the last segment")),
                "*" => Segment::Any,
                literal => Segment::Literal(unescape(literal)),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pointer given as unescaped segments matches.
    pub fn matches_segments<S: AsRef<str>>(&self, pointer: &[S]) -> bool {
        let mut rest = pointer.iter();
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Any => {
                    if rest.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(literal) => match rest.next() {
                    Some(actual) if actual.as_ref() == literal => {}
                    _ => return false,
                },
            }
        }
        rest.next().is_none()
    }

    /// Whether a JSON pointer string matches.
    pub fn matches(&self, pointer: &str) -> bool {
        let segments: Vec<String> = match pointer.strip_prefix('/') {
            Some(body) => body.split('/').map(unescape).collect(),
            None => Vec::new(),
        };
        self.matches_segments(&segments)
    }
}

impl fmt::Display for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for FieldPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FieldPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldPattern::parse(&raw).map_err(serde::de::Error::custom)
    }
}

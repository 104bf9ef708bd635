//! Field-level diff between two document generations.

use serde_json::Value;

use super::FieldPattern;
use crate::assertion::values_equal;
use crate::document::escape_pointer_segment;

/// One field that differs between the two generations.
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    /// Pointer of the differing field
    pub pointer: String,
    /// Value in the first generation, `None` when absent
    pub before: Option<Value>,
    /// Value in the second generation, `None` when absent
    pub after: Option<Value>,
}

impl Divergence {
    fn render(value: &Option<Value>) -> String {
        match value {
            Some(value) => value.to_string(),
            None => "<absent>".to_string(),
        }
    }

    /// `pointer: before != after`
    pub fn line(&self) -> String {
        format!(
            "{}: {} != {}",
            self.pointer,
            Self::render(&self.before),
            Self::render(&self.after)
        )
    }
}

/// Result of comparing two documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentDiff {
    /// Differences outside the allow-list, in document order
    pub divergences: Vec<Divergence>,
    /// Differing fields covered by the allow-list
    pub ignored: usize,
}

impl DocumentDiff {
    /// No difference outside the allow-list.
    pub fn is_clean(&self) -> bool {
        self.divergences.is_empty()
    }

    /// First `limit` divergences, one `\n<line>` each.
    pub fn digest(&self, limit: usize) -> String {
        let mut out: String = self
            .divergences
            .iter()
            .take(limit)
            .map(|d| format!("\n{}", d.line()))
            .collect();
        if self.divergences.len() > limit {
            out.push_str(&format!("\n... and {} more", self.divergences.len() - limit));
        }
        out
    }
}

/// Compare `before` and `after`, skipping subtrees matched by `lossy`.
pub fn diff_documents(before: &Value, after: &Value, lossy: &[FieldPattern]) -> DocumentDiff {
    let mut diff = DocumentDiff::default();
    let mut segments = Vec::new();
    walk(Some(before), Some(after), &mut segments, lossy, &mut diff);
    diff
}

fn pointer_of(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| format!("/{}", escape_pointer_segment(s)))
        .collect()
}

fn walk(
    before: Option<&Value>,
    after: Option<&Value>,
    segments: &mut Vec<String>,
    lossy: &[FieldPattern],
    diff: &mut DocumentDiff,
) {
    let equal = match (before, after) {
        (Some(a), Some(b)) => values_equal(a, b),
        (None, None) => true,
        _ => false,
    };
    if equal {
        return;
    }
    if lossy.iter().any(|p| p.matches_segments(segments)) {
        diff.ignored += 1;
        return;
    }

    match (before, after) {
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let keys = a.keys().chain(b.keys().filter(|k| !a.contains_key(*k)));
            for key in keys {
                segments.push(key.clone());
                walk(a.get(key), b.get(key), segments, lossy, diff);
                segments.pop();
            }
        }
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            for i in 0..a.len().max(b.len()) {
                segments.push(i.to_string());
                walk(a.get(i), b.get(i), segments, lossy, diff);
                segments.pop();
            }
        }
        _ => diff.divergences.push(Divergence {
            pointer: pointer_of(segments),
            before: before.cloned(),
            after: after.cloned(),
        }),
    }
}

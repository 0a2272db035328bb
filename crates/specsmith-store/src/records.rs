//! On-disk record shapes for a trace directory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Characters of the requirements text kept in a history entry.
pub const REQUIREMENTS_SUMMARY_CHARS: usize = 150;

/// Characters of a refinement instruction kept in a history entry.
pub const INSTRUCTION_SUMMARY_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionKind {
    InitialGeneration,
    Refinement,
}

impl VersionKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InitialGeneration => "initial_generation",
            Self::Refinement => "refinement",
        }
    }
}

impl std::fmt::Display for VersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What produced a new version, and the text it was produced from.
#[derive(Debug, Clone, Copy)]
pub enum Provenance<'a> {
    Initial { requirements: &'a str },
    Refinement { instruction: &'a str },
}

impl Provenance<'_> {
    #[must_use]
    pub const fn kind(&self) -> VersionKind {
        match self {
            Self::Initial { .. } => VersionKind::InitialGeneration,
            Self::Refinement { .. } => VersionKind::Refinement,
        }
    }
}

/// Immutable snapshot stored as `v<N>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version: Option<u32>,
    pub trace_id: String,
    #[serde(rename = "type")]
    pub kind: VersionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement_instruction: Option<String>,
    pub spec: Value,
}

/// Contents of `latest.json`: the newest spec with its fields flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPointer {
    pub current_version: u32,
    pub trace_id: String,
    #[serde(flatten)]
    pub spec: Map<String, Value>,
}

impl LatestPointer {
    /// Pointer fields take precedence over same-named spec keys.
    #[must_use]
    pub fn new(current_version: u32, trace_id: impl Into<String>, spec: &Value) -> Self {
        let mut spec = spec.as_object().cloned().unwrap_or_default();
        spec.remove("current_version");
        spec.remove("trace_id");
        Self {
            current_version,
            trace_id: trace_id.into(),
            spec,
        }
    }

    /// The specification without the pointer fields.
    #[must_use]
    pub fn specification(&self) -> Value {
        Value::Object(self.spec.clone())
    }
}

/// One element of `history.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: u32,
    pub file: String,
    pub generated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: VersionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_summary: Option<String>,
}

impl HistoryEntry {
    pub(crate) fn new(version: u32, generated_at: DateTime<Utc>, provenance: Provenance<'_>) -> Self {
        let (requirements_summary, instruction_summary) = match provenance {
            Provenance::Initial { requirements } => {
                (Some(summarize(requirements, REQUIREMENTS_SUMMARY_CHARS)), None)
            }
            Provenance::Refinement { instruction } => {
                (None, Some(summarize(instruction, INSTRUCTION_SUMMARY_CHARS)))
            }
        };
        Self {
            version,
            file: version_file_name(version),
            generated_at,
            kind: provenance.kind(),
            requirements_summary,
            instruction_summary,
        }
    }
}

/// `v<N>.json`
#[must_use]
pub fn version_file_name(version: u32) -> String {
    format!("v{version}.json")
}

/// Parse `v<N>.json` back to `N`. Leading zeros and `v0` are rejected.
#[must_use]
pub fn parse_version_file_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix('v')?.strip_suffix(".json")?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// First `max_chars` characters followed by `...` when the text is longer.
#[must_use]
pub fn summarize(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

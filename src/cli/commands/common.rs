//! Helpers shared by the commands.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::Serialize;
use std::io::{IsTerminal, Read};

use crate::{GeneratedSpec, LlmFallbackInfo, Specification};

/// Read UTF-8 text from `file`, or from stdin when no file is given.
pub(super) fn read_text(file: Option<&Utf8Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {path}")),
        None => {
            let mut stdin = std::io::stdin();
            if stdin.is_terminal() {
                eprintln!("Reading requirements from stdin (Ctrl-D to finish)...");
            }
            let mut text = String::new();
            stdin
                .read_to_string(&mut text)
                .context("Failed to read requirements from stdin")?;
            Ok(text)
        }
    }
}

/// Pretty JSON to stdout.
pub(super) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

/// What `generate` and `refine` print.
#[derive(Debug, Serialize)]
pub(super) struct VersionOutput<'a> {
    pub trace_id: &'a str,
    pub version: u32,
    pub spec: &'a Specification,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub schema_issues: &'a [String],
    /// Present when the configured provider was replaced by the fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_fallback: Option<&'a LlmFallbackInfo>,
}

impl<'a> VersionOutput<'a> {
    pub fn new(generated: &'a GeneratedSpec, llm_fallback: Option<&'a LlmFallbackInfo>) -> Self {
        Self {
            trace_id: &generated.trace_id,
            version: generated.version,
            spec: &generated.specification,
            schema_issues: &generated.schema_issues,
            llm_fallback,
        }
    }
}

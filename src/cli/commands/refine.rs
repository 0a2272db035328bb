//! `specsmith refine`

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde_json::Value;

use specsmith_utils::error::InputError;
use specsmith_utils::input::validate_refinement;
use specsmith_utils::trace_id::validate_trace_id;

use super::common::{VersionOutput, print_json};
use crate::{Config, SpecEngine, SpecsmithError, VersionStore};

/// Refine a spec file, or the trace's latest version, and print the result.
pub async fn execute_refine_command(
    trace_id: &str,
    instruction: &str,
    spec_file: Option<&Utf8Path>,
    config: Config,
) -> Result<()> {
    validate_trace_id(trace_id).map_err(SpecsmithError::from)?;
    validate_refinement(instruction).map_err(SpecsmithError::from)?;

    let current = match spec_file {
        Some(path) => load_spec_file(path)?,
        None => VersionStore::new(config.state_dir())
            .latest(trace_id)
            .map_err(SpecsmithError::from)?
            .specification(),
    };

    let engine = SpecEngine::from_config(config)?;
    let refined = engine.refine(&current, instruction, trace_id).await?;

    print_json(&VersionOutput::new(&refined, engine.fallback_info()))
}

fn load_spec_file(path: &Utf8Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read specification file: {path}"))?;
    serde_json::from_str(&text).map_err(|e| {
        SpecsmithError::from(InputError::InvalidSpecification {
            reason: format!("{path} is not valid JSON: {e}"),
        })
        .into()
    })
}

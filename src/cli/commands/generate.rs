//! `specsmith generate`

use anyhow::Result;
use camino::Utf8Path;

use specsmith_utils::input::validate_requirements;

use super::common::{VersionOutput, print_json, read_text};
use crate::{Config, SpecEngine, SpecsmithError};

/// Run the generation pipeline and print `{trace_id, version, spec}`.
pub async fn execute_generate_command(file: Option<&Utf8Path>, config: Config) -> Result<()> {
    let text = read_text(file)?;
    // Reject bad input before a backend (and its API key) is needed.
    validate_requirements(&text).map_err(SpecsmithError::from)?;

    let engine = SpecEngine::from_config(config)?;
    let generated = engine.generate(&text).await?;

    print_json(&VersionOutput::new(&generated, engine.fallback_info()))
}

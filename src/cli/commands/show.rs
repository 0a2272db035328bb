//! `specsmith show`

use anyhow::Result;

use super::common::print_json;
use crate::{Config, SpecsmithError, VersionStore};

/// Print one version record, or the latest pointer when `version` is `None`.
pub fn execute_show_command(trace_id: &str, version: Option<u32>, config: &Config) -> Result<()> {
    let store = VersionStore::new(config.state_dir());
    match version {
        Some(version) => {
            let record = store
                .load_version(trace_id, version)
                .map_err(SpecsmithError::from)?;
            print_json(&record)
        }
        None => {
            let latest = store.latest(trace_id).map_err(SpecsmithError::from)?;
            print_json(&latest)
        }
    }
}

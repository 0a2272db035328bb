//! `specsmith history`

use anyhow::Result;

use super::common::print_json;
use crate::{Config, HistoryEntry, SpecsmithError, VersionStore};

pub fn execute_history_command(trace_id: &str, json: bool, config: &Config) -> Result<()> {
    let store = VersionStore::new(config.state_dir());
    let history = store.history(trace_id).map_err(SpecsmithError::from)?;

    if json {
        return print_json(&history);
    }

    if history.is_empty() {
        println!("No versions recorded for trace {trace_id}");
        return Ok(());
    }

    println!("History for trace: {trace_id}");
    for entry in &history {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &HistoryEntry) -> String {
    let summary = entry
        .requirements_summary
        .as_deref()
        .or(entry.instruction_summary.as_deref())
        .unwrap_or("");
    format!(
        "  v{:<3} {}  {:<18}  {}",
        entry.version,
        entry.generated_at.format("%Y-%m-%d %H:%M:%S"),
        entry.kind.as_str(),
        summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry_shows_instruction_summary() {
        let entry: HistoryEntry = serde_json::from_value(serde_json::json!({
            "version": 2,
            "file": "v2.json",
            "generated_at": "2026-03-01T10:20:30Z",
            "type": "refinement",
            "instruction_summary": "Add SSO"
        }))
        .unwrap();

        let line = format_entry(&entry);
        assert!(line.starts_with("  v2"));
        assert!(line.contains("2026-03-01 10:20:30"));
        assert!(line.contains("refinement"));
        assert!(line.ends_with("Add SSO"));
    }
}

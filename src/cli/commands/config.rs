//! `specsmith config`

use anyhow::Result;

use crate::Config;

pub fn execute_config_command(config: &Config) -> Result<()> {
    println!("Effective configuration:");
    for line in render_effective(config) {
        println!("{line}");
    }
    Ok(())
}

fn render_effective(config: &Config) -> Vec<String> {
    let entries = config.effective_config();
    let width = entries.keys().map(String::len).max().unwrap_or(0);
    entries
        .iter()
        .map(|(key, (value, source))| format!("  {key:<width$} = {value}  [{source}]"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_effective_attributes_sources() {
        let config = Config::builder().retries(4).build().unwrap();
        let lines = render_effective(&config);

        let retries = lines
            .iter()
            .find(|l| l.trim_start().starts_with("pipeline.retries"))
            .unwrap();
        assert!(retries.contains("= 4"));
        assert!(retries.ends_with("[programmatic]"));
        assert!(lines.iter().any(|l| l.contains("llm.provider")));
    }
}

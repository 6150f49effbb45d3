//! `milkbot config show`

use anyhow::Result;
use console::style;
use milkbot_types::config::RouterConfig;

/// Print the resolved router configuration as TOML, or JSON with `--json`.
pub fn show_config(config: &RouterConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("  {}", style("── Router ──").dim());
    print!("{}", render_toml(config)?);
    Ok(())
}

fn render_toml(config: &RouterConfig) -> Result<String> {
    Ok(toml::to_string(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_rendering_reads_back() {
        let config = RouterConfig {
            default_ttl: 12,
            queue_capacity: 256,
        };
        let rendered = render_toml(&config).unwrap();
        assert!(rendered.contains("default_ttl = 12"));
        let parsed: RouterConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}

use anyhow::Result;
use colored::Colorize;

use crate::cli::ConfigCommands;
use crate::config::{Config, Settings};
use crate::overlay::brush;

pub fn run(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(),
        ConfigCommands::Set { key, value } => set(&key, &value),
        ConfigCommands::Path => {
            println!("{}", Config::path()?.display());
            Ok(())
        }
    }
}

fn show() -> Result<()> {
    let path = Config::path()?;
    let config = if path.exists() {
        println!("{} {}", "Config file:".bold(), path.display());
        Config::load_from(&path)?
    } else {
        println!(
            "{} {} {}",
            "Config file:".bold(),
            path.display(),
            "(not created yet, showing defaults)".dimmed()
        );
        Config::default()
    };
    println!();

    for (key, value) in effective(&config.settings()) {
        println!("  {:<28} {}", key.cyan(), value);
    }
    Ok(())
}

fn set(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load_or_default();
    config.set(key, value)?;
    let path = config.save()?;
    println!("{} {key} = {value}", "Set".green().bold());
    println!("{}", format!("saved to {}", path.display()).dimmed());
    Ok(())
}

/// Every settable key with its resolved value.
fn effective(s: &Settings) -> Vec<(&'static str, String)> {
    let list = |values: Vec<String>| format!("[{}]", values.join(", "));
    vec![
        ("defaults.theme", s.theme.clone()),
        ("defaults.windowed", s.windowed.to_string()),
        ("brush.color", brush::to_hex(s.brush_color)),
        ("brush.size_index", s.brush_size_index.to_string()),
        (
            "brush.sizes",
            list(s.brush_sizes.iter().map(|v| v.to_string()).collect()),
        ),
        ("zoom.min", s.zoom.min.to_string()),
        ("zoom.max", s.zoom.max.to_string()),
        ("zoom.step", s.zoom.step.to_string()),
        ("laser.size", s.laser_size.to_string()),
        ("laser.opacity", s.laser_opacity.to_string()),
        (
            "outline.levels",
            list(s.outline_levels.iter().map(|v| v.to_string()).collect()),
        ),
        ("outline.clearance", s.outline_clearance.to_string()),
        ("content.marker_class", s.marker_class.clone()),
        ("content.summary_class", s.summary_class.clone()),
        ("content.lazy_class", s.lazy_class.clone()),
        (
            "timing.reinit_throttle_ms",
            s.reinit_throttle.as_millis().to_string(),
        ),
        (
            "timing.fullscreen_delay_ms",
            s.fullscreen_delay.as_millis().to_string(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_lists_defaults() {
        let rows = effective(&Settings::default());
        let get = |key: &str| {
            rows.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("brush.color"), "#ff0000");
        assert_eq!(get("brush.sizes"), "[1, 5, 8, 12, 20, 30]");
        assert_eq!(get("outline.levels"), "[1, 2, 3, 4, 5]");
        assert_eq!(get("timing.fullscreen_delay_ms"), "50");
    }

    #[test]
    fn test_every_row_is_a_settable_key() {
        for (key, value) in effective(&Settings::default()) {
            let mut config = Config::default();
            config
                .set(key, value.trim_matches(|c| c == '[' || c == ']'))
                .unwrap_or_else(|e| panic!("{key}: {e}"));
        }
    }
}

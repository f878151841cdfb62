use anyhow::Result;
use eframe::egui::Color32;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::overlay::brush::{self, BrushSettings};
use crate::overlay::transform::ZoomLimits;

const FILENAME: &str = "config.yaml";
const APP_DIR: &str = "playback";

/// Finer steps would not change the percentage label.
const MIN_ZOOM_STEP: f32 = 0.01;

pub const DEFAULT_BRUSH_SIZES: [f32; 6] = [1.0, 5.0, 8.0, 12.0, 20.0, 30.0];

const VALID_KEYS: &str = "brush.color, brush.size_index, brush.sizes, zoom.min, zoom.max, \
    zoom.step, laser.size, laser.opacity, outline.levels, outline.clearance, \
    content.marker_class, content.summary_class, content.lazy_class, \
    timing.reinit_throttle_ms, timing.fullscreen_delay_ms, defaults.theme, defaults.windowed";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brush: Option<BrushConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<ZoomConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub laser: Option<LaserConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<OutlineConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windowed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrushConfig {
    /// Hex color, `#rrggbb`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_index: Option<usize>,

    /// Allowed pen widths in pixels, thinnest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoomConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<u8>>,

    /// Gap left above a heading after jumping to it, in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearance: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_class: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reinit_throttle_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullscreen_delay_ms: Option<u64>,
}

/// Fully resolved settings: the config file with every gap filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub brush_color: Color32,
    pub brush_size_index: usize,
    pub brush_sizes: Vec<f32>,
    pub zoom: ZoomLimits,
    pub laser_size: f32,
    pub laser_opacity: f32,
    pub outline_levels: Vec<u8>,
    pub outline_clearance: f32,
    pub marker_class: String,
    pub summary_class: String,
    pub lazy_class: String,
    pub reinit_throttle: Duration,
    pub fullscreen_delay: Duration,
    pub theme: String,
    pub windowed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brush_color: Color32::from_rgb(0xFF, 0x00, 0x00),
            brush_size_index: 1,
            brush_sizes: DEFAULT_BRUSH_SIZES.to_vec(),
            zoom: ZoomLimits::default(),
            laser_size: 12.0,
            laser_opacity: 0.9,
            outline_levels: vec![1, 2, 3, 4, 5],
            outline_clearance: 60.0,
            marker_class: "post-content".to_string(),
            summary_class: "aisummary".to_string(),
            lazy_class: "lazyload".to_string(),
            reinit_throttle: Duration::from_millis(200),
            fullscreen_delay: Duration::from_millis(50),
            theme: "light".to_string(),
            windowed: false,
        }
    }
}

impl Settings {
    pub fn brush(&self) -> BrushSettings {
        BrushSettings::new(
            self.brush_color,
            self.brush_sizes.clone(),
            self.brush_size_index,
        )
    }
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR).join(FILENAME))
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!("No config found. Run `playback config show` to see defaults.")
            } else {
                anyhow::anyhow!("Failed to read config: {e}")
            }
        })?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        let contents = format!("# Playback configuration - https://github.com/mklab-se/playback\n{yaml}");
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Resolve against the built-in defaults. Values that made it into the
    /// file without going through [`Config::set`] are re-checked here and
    /// ignored with a warning when they do not make sense.
    pub fn settings(&self) -> Settings {
        let mut s = Settings::default();

        if let Some(defaults) = &self.defaults {
            if let Some(theme) = &defaults.theme {
                s.theme = theme.clone();
            }
            if let Some(windowed) = defaults.windowed {
                s.windowed = windowed;
            }
        }

        if let Some(b) = &self.brush {
            if let Some(color) = &b.color {
                match brush::parse_hex(color) {
                    Ok(c) => s.brush_color = c,
                    Err(e) => tracing::warn!("ignoring brush.color: {e}"),
                }
            }
            if let Some(sizes) = &b.sizes {
                match validate_sizes(sizes) {
                    Ok(()) => s.brush_sizes = sizes.clone(),
                    Err(e) => tracing::warn!("ignoring brush.sizes: {e}"),
                }
            }
            if let Some(index) = b.size_index {
                s.brush_size_index = index;
            }
            if s.brush_size_index >= s.brush_sizes.len() {
                tracing::warn!(
                    index = s.brush_size_index,
                    "brush.size_index out of range, using the last size"
                );
                s.brush_size_index = s.brush_sizes.len() - 1;
            }
        }

        if let Some(z) = &self.zoom {
            let limits = ZoomLimits {
                min: z.min.unwrap_or(s.zoom.min),
                max: z.max.unwrap_or(s.zoom.max),
                step: z.step.unwrap_or(s.zoom.step),
            };
            match validate_zoom(&limits) {
                Ok(()) => s.zoom = limits,
                Err(e) => tracing::warn!("ignoring zoom settings: {e}"),
            }
        }

        if let Some(l) = &self.laser {
            if let Some(size) = l.size.filter(|v| *v > 0.0) {
                s.laser_size = size;
            }
            if let Some(opacity) = l.opacity {
                s.laser_opacity = opacity.clamp(0.0, 1.0);
            }
        }

        if let Some(o) = &self.outline {
            if let Some(levels) = &o.levels {
                match validate_levels(levels) {
                    Ok(()) => s.outline_levels = levels.clone(),
                    Err(e) => tracing::warn!("ignoring outline.levels: {e}"),
                }
            }
            if let Some(clearance) = o.clearance {
                s.outline_clearance = clearance;
            }
        }

        if let Some(c) = &self.content {
            if let Some(v) = non_empty(&c.marker_class) {
                s.marker_class = v;
            }
            if let Some(v) = non_empty(&c.summary_class) {
                s.summary_class = v;
            }
            if let Some(v) = non_empty(&c.lazy_class) {
                s.lazy_class = v;
            }
        }

        if let Some(t) = &self.timing {
            if let Some(ms) = t.reinit_throttle_ms {
                s.reinit_throttle = Duration::from_millis(ms);
            }
            if let Some(ms) = t.fullscreen_delay_ms {
                s.fullscreen_delay = Duration::from_millis(ms);
            }
        }

        s
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "defaults.theme" => {
                match value {
                    "light" | "dark" => {}
                    _ => anyhow::bail!("Invalid theme: {value}. Must be 'light' or 'dark'."),
                }
                self.defaults
                    .get_or_insert_with(DefaultsConfig::default)
                    .theme = Some(value.to_string());
            }
            "defaults.windowed" => {
                let windowed = parse_bool(value)?;
                self.defaults
                    .get_or_insert_with(DefaultsConfig::default)
                    .windowed = Some(windowed);
            }
            "brush.color" => {
                let color = brush::parse_hex(value)?;
                self.brush.get_or_insert_with(BrushConfig::default).color =
                    Some(brush::to_hex(color));
            }
            "brush.size_index" => {
                let index: usize = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid size index: {value}"))?;
                let count = self
                    .brush
                    .as_ref()
                    .and_then(|b| b.sizes.as_ref())
                    .map_or(DEFAULT_BRUSH_SIZES.len(), Vec::len);
                if index >= count {
                    anyhow::bail!("Invalid size index: {value}. Must be below {count}.");
                }
                self.brush.get_or_insert_with(BrushConfig::default).size_index = Some(index);
            }
            "brush.sizes" => {
                let sizes = parse_list::<f32>(value)?;
                validate_sizes(&sizes)?;
                self.brush.get_or_insert_with(BrushConfig::default).sizes = Some(sizes);
            }
            "zoom.min" | "zoom.max" | "zoom.step" => {
                let v = parse_number(value)?;
                let zoom = self.zoom.get_or_insert_with(ZoomConfig::default);
                let slot = match key {
                    "zoom.min" => &mut zoom.min,
                    "zoom.max" => &mut zoom.max,
                    _ => &mut zoom.step,
                };
                let previous = slot.replace(v);
                let defaults = ZoomLimits::default();
                let limits = ZoomLimits {
                    min: zoom.min.unwrap_or(defaults.min),
                    max: zoom.max.unwrap_or(defaults.max),
                    step: zoom.step.unwrap_or(defaults.step),
                };
                if let Err(e) = validate_zoom(&limits) {
                    let slot = match key {
                        "zoom.min" => &mut zoom.min,
                        "zoom.max" => &mut zoom.max,
                        _ => &mut zoom.step,
                    };
                    *slot = previous;
                    return Err(e);
                }
            }
            "laser.size" => {
                let v = parse_number(value)?;
                if v <= 0.0 {
                    anyhow::bail!("Invalid laser size: {value}. Must be positive.");
                }
                self.laser.get_or_insert_with(LaserConfig::default).size = Some(v);
            }
            "laser.opacity" => {
                let v = parse_number(value)?;
                if !(0.0..=1.0).contains(&v) {
                    anyhow::bail!("Invalid laser opacity: {value}. Must be between 0 and 1.");
                }
                self.laser.get_or_insert_with(LaserConfig::default).opacity = Some(v);
            }
            "outline.levels" => {
                let levels = parse_list::<u8>(value)?;
                validate_levels(&levels)?;
                self.outline.get_or_insert_with(OutlineConfig::default).levels = Some(levels);
            }
            "outline.clearance" => {
                let v = parse_number(value)?;
                self.outline
                    .get_or_insert_with(OutlineConfig::default)
                    .clearance = Some(v);
            }
            "content.marker_class" | "content.summary_class" | "content.lazy_class" => {
                let class = value.trim();
                if class.is_empty() || class.contains(char::is_whitespace) {
                    anyhow::bail!("Invalid class name: '{value}'. Must be a single word.");
                }
                let content = self.content.get_or_insert_with(ContentConfig::default);
                let slot = match key {
                    "content.marker_class" => &mut content.marker_class,
                    "content.summary_class" => &mut content.summary_class,
                    _ => &mut content.lazy_class,
                };
                *slot = Some(class.to_string());
            }
            "timing.reinit_throttle_ms" | "timing.fullscreen_delay_ms" => {
                let ms: u64 = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid duration: {value}. Use milliseconds."))?;
                let timing = self.timing.get_or_insert_with(TimingConfig::default);
                if key == "timing.reinit_throttle_ms" {
                    timing.reinit_throttle_ms = Some(ms);
                } else {
                    timing.fullscreen_delay_ms = Some(ms);
                }
            }
            _ => anyhow::bail!("Unknown config key: {key}. Valid keys: {VALID_KEYS}"),
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Invalid value: {value}. Must be 'true' or 'false'."),
    }
}

fn parse_number(value: &str) -> Result<f32> {
    let v: f32 = value
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number: {value}"))?;
    if !v.is_finite() {
        anyhow::bail!("Invalid number: {value}");
    }
    Ok(v)
}

fn parse_list<T: std::str::FromStr>(value: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| anyhow::anyhow!("Invalid list entry: '{s}' in '{value}'"))
        })
        .collect()
}

fn validate_sizes(sizes: &[f32]) -> Result<()> {
    if sizes.is_empty() {
        anyhow::bail!("Brush sizes must not be empty.");
    }
    if sizes.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        anyhow::bail!("Brush sizes must be positive.");
    }
    if sizes.windows(2).any(|w| w[0] >= w[1]) {
        anyhow::bail!("Brush sizes must be strictly increasing.");
    }
    Ok(())
}

fn validate_zoom(limits: &ZoomLimits) -> Result<()> {
    if limits.min <= 0.0 {
        anyhow::bail!("zoom.min must be positive.");
    }
    if limits.min > 1.0 || limits.max < 1.0 {
        anyhow::bail!("The zoom range must include 1.0.");
    }
    if limits.step < MIN_ZOOM_STEP || limits.step > limits.max - limits.min {
        anyhow::bail!(
            "zoom.step must be at least {MIN_ZOOM_STEP} and fit inside the zoom range."
        );
    }
    Ok(())
}

fn validate_levels(levels: &[u8]) -> Result<()> {
    if levels.is_empty() {
        anyhow::bail!("Outline levels must not be empty.");
    }
    if let Some(bad) = levels.iter().find(|l| !(1..=6).contains(*l)) {
        anyhow::bail!("Invalid heading level: {bad}. Must be 1 to 6.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_resolves_to_defaults() {
        let settings = Config::default().settings();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.brush().width(), 5.0);
        assert_eq!(settings.fullscreen_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_yaml_partial_sections() {
        let yaml = "brush:\n  color: '#00ff00'\n  size_index: 3\noutline:\n  levels: [2, 3]\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let s = config.settings();
        assert_eq!(s.brush_color, Color32::from_rgb(0, 255, 0));
        assert_eq!(s.brush().width(), 12.0);
        assert_eq!(s.outline_levels, vec![2, 3]);
        assert_eq!(s.zoom, ZoomLimits::default());
    }

    #[test]
    fn test_invalid_file_values_fall_back() {
        let yaml = "brush:\n  color: nope\n  size_index: 40\nzoom:\n  min: 3.0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let s = config.settings();
        assert_eq!(s.brush_color, Settings::default().brush_color);
        assert_eq!(s.brush_size_index, DEFAULT_BRUSH_SIZES.len() - 1);
        assert_eq!(s.zoom, ZoomLimits::default());
    }

    #[test]
    fn test_set_validates() {
        let mut config = Config::default();
        config.set("brush.color", "#0af").unwrap();
        assert_eq!(
            config.brush.as_ref().unwrap().color.as_deref(),
            Some("#00aaff")
        );
        assert!(config.set("brush.color", "blue").is_err());
        assert!(config.set("brush.size_index", "6").is_err());
        config.set("brush.size_index", "5").unwrap();
        assert!(config.set("defaults.theme", "sepia").is_err());
        assert!(config.set("no.such.key", "1").is_err());
    }

    #[test]
    fn test_set_lists() {
        let mut config = Config::default();
        config.set("brush.sizes", "2, 4, 6").unwrap();
        assert!(config.set("brush.sizes", "4, 2").is_err());
        config.set("outline.levels", "1,2").unwrap();
        assert!(config.set("outline.levels", "0,7").is_err());
        assert_eq!(config.settings().brush_sizes, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_set_zoom_rejects_and_keeps_previous() {
        let mut config = Config::default();
        config.set("zoom.max", "3").unwrap();
        assert!(config.set("zoom.min", "1.5").is_err());
        let zoom = config.zoom.as_ref().unwrap();
        assert_eq!(zoom.min, None);
        assert_eq!(zoom.max, Some(3.0));
        assert_eq!(config.settings().zoom.max, 3.0);
    }

    #[test]
    fn test_zoom_step_below_label_precision_rejected() {
        let mut config = Config::default();
        assert!(config.set("zoom.step", "0.001").is_err());
        config.set("zoom.step", "0.04").unwrap();
        assert_eq!(config.settings().zoom.step, 0.04);

        let yaml = "zoom:\n  step: 0.0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settings().zoom.step, ZoomLimits::default().step);
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let mut config = Config::default();
        config.set("laser.opacity", "0.5").unwrap();
        config.set("timing.reinit_throttle_ms", "120").unwrap();
        config.set("defaults.windowed", "true").unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        let s = back.settings();
        assert_eq!(s.laser_opacity, 0.5);
        assert_eq!(s.reinit_throttle, Duration::from_millis(120));
        assert!(s.windowed);
    }
}

use eframe::egui::Color32;

use super::error::ColorError;

/// Pen color and width. The eraser has no size of its own: it is always twice
/// the pen width.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushSettings {
    pub color: Color32,
    pub size_index: usize,
    sizes: Vec<f32>,
}

impl BrushSettings {
    pub fn new(color: Color32, sizes: Vec<f32>, size_index: usize) -> Self {
        let size_index = size_index.min(sizes.len().saturating_sub(1));
        Self {
            color,
            size_index,
            sizes,
        }
    }

    pub fn width(&self) -> f32 {
        self.sizes.get(self.size_index).copied().unwrap_or(1.0)
    }

    pub fn eraser_width(&self) -> f32 {
        self.width() * 2.0
    }

    pub fn can_shrink(&self) -> bool {
        self.size_index > 0
    }

    pub fn can_grow(&self) -> bool {
        self.size_index + 1 < self.sizes.len()
    }

    pub fn shrink(&mut self) -> bool {
        if !self.can_shrink() {
            return false;
        }
        self.size_index -= 1;
        true
    }

    pub fn grow(&mut self) -> bool {
        if !self.can_grow() {
            return false;
        }
        self.size_index += 1;
        true
    }

    pub fn size_label(&self) -> String {
        format!("{}", self.width())
    }
}

/// Parse `#rrggbb` or `#rgb` (the leading `#` is optional).
pub fn parse_hex(value: &str) -> Result<Color32, ColorError> {
    let err = || ColorError(value.to_string());
    let hex = value.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(err());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());
    match hex.len() {
        6 => Ok(Color32::from_rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        3 => {
            let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            Ok(Color32::from_rgb(short(0)?, short(1)?, short(2)?))
        }
        _ => Err(err()),
    }
}

pub fn to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brush() -> BrushSettings {
        BrushSettings::new(Color32::RED, vec![1.0, 5.0, 8.0, 12.0, 20.0, 30.0], 1)
    }

    #[test]
    fn test_eraser_is_double_width() {
        let mut b = brush();
        assert_eq!(b.width(), 5.0);
        assert_eq!(b.eraser_width(), 10.0);
        b.grow();
        assert_eq!(b.eraser_width(), 16.0);
    }

    #[test]
    fn test_size_steps_stop_at_ends() {
        let mut b = brush();
        assert!(b.shrink());
        assert!(!b.can_shrink());
        assert!(!b.shrink());
        assert_eq!(b.width(), 1.0);
        while b.grow() {}
        assert_eq!(b.width(), 30.0);
        assert!(!b.can_grow());
    }

    #[test]
    fn test_index_clamped_on_construction() {
        let b = BrushSettings::new(Color32::RED, vec![2.0, 4.0], 9);
        assert_eq!(b.width(), 4.0);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#ff0000").unwrap(), Color32::from_rgb(255, 0, 0));
        assert_eq!(parse_hex("00ff7f").unwrap(), Color32::from_rgb(0, 255, 127));
        assert_eq!(parse_hex("#fa0").unwrap(), Color32::from_rgb(255, 170, 0));
        assert!(parse_hex("#ff00").is_err());
        assert!(parse_hex("#gg0000").is_err());
        assert!(parse_hex("").is_err());
    }

    #[test]
    fn test_hex_roundtrip() {
        let c = Color32::from_rgb(0x12, 0xab, 0xef);
        assert_eq!(to_hex(c), "#12abef");
        assert_eq!(parse_hex(&to_hex(c)).unwrap(), c);
    }
}

use eframe::egui::Color32;

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub background: Color32,
    pub foreground: Color32,
    pub heading_color: Color32,
    pub accent: Color32,
    pub code_background: Color32,
    pub code_foreground: Color32,
    /// Backdrop behind the presented content.
    pub overlay_background: Color32,
    pub toolbar_background: Color32,
    pub toolbar_foreground: Color32,
    pub h1_size: f32,
    pub h2_size: f32,
    pub h3_size: f32,
    pub body_size: f32,
    pub code_size: f32,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark".to_string(),
            background: Color32::from_rgb(0x1E, 0x1E, 0x1E),
            foreground: Color32::from_rgb(0xC8, 0xC8, 0xC8),
            heading_color: Color32::WHITE,
            accent: Color32::from_rgb(0x52, 0x94, 0xE2),
            code_background: Color32::from_rgb(0x2D, 0x2D, 0x2D),
            code_foreground: Color32::from_rgb(0xD4, 0xD4, 0xD4),
            overlay_background: Color32::from_rgb(0x14, 0x14, 0x14),
            toolbar_background: Color32::from_rgba_unmultiplied(0x2D, 0x2D, 0x2D, 0xF0),
            toolbar_foreground: Color32::from_rgb(0xE0, 0xE0, 0xE0),
            h1_size: 34.0,
            h2_size: 28.0,
            h3_size: 23.0,
            body_size: 18.0,
            code_size: 15.0,
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light".to_string(),
            background: Color32::WHITE,
            foreground: Color32::from_rgb(0x1A, 0x1A, 0x2E),
            heading_color: Color32::from_rgb(0x16, 0x21, 0x3E),
            accent: Color32::from_rgb(0x0F, 0x34, 0x60),
            code_background: Color32::from_rgb(0xF5, 0xF5, 0xF5),
            code_foreground: Color32::from_rgb(0x33, 0x33, 0x33),
            overlay_background: Color32::from_rgb(0xFA, 0xFA, 0xF7),
            toolbar_background: Color32::from_rgba_unmultiplied(0x20, 0x24, 0x30, 0xE6),
            toolbar_foreground: Color32::WHITE,
            h1_size: 34.0,
            h2_size: 28.0,
            h3_size: 23.0,
            body_size: 18.0,
            code_size: 15.0,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "dark" => Self::dark(),
            _ => Self::light(),
        }
    }

    pub fn toggled(&self) -> Self {
        if self.name == "dark" {
            Self::light()
        } else {
            Self::dark()
        }
    }

    pub fn is_dark(&self) -> bool {
        self.name == "dark"
    }

    /// Apply opacity to a color
    pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
        Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), (opacity * 255.0) as u8)
    }

    pub fn heading_size(&self, level: u8) -> f32 {
        match level {
            1 => self.h1_size,
            2 => self.h2_size,
            3 => self.h3_size,
            4 => (self.h3_size + self.body_size) / 2.0,
            _ => self.body_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_and_toggle() {
        assert_eq!(Theme::from_name("dark").name, "dark");
        assert_eq!(Theme::from_name("anything").name, "light");
        assert!(Theme::light().toggled().is_dark());
    }

    #[test]
    fn test_heading_sizes_decrease() {
        let t = Theme::light();
        let sizes: Vec<f32> = (1..=6).map(|l| t.heading_size(l)).collect();
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
    }
}

use cuelight_core::Rgba;
use eframe::egui::Color32;

pub struct Theme {
    pub bg_color: Color32,
    pub panel_bg: Color32,
    pub element_bg: Color32,
    pub text_color: Color32,
    pub text_dim: Color32,
    pub border_color: Color32,
    pub highlight_color: Color32,
    pub error_color: Color32,
    pub lyric_size: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            bg_color: Color32::from_rgb(0, 0, 0),
            panel_bg: Color32::from_rgb(16, 16, 16),
            element_bg: Color32::from_rgb(32, 32, 32),
            text_color: Color32::from_rgb(255, 255, 255),
            text_dim: Color32::from_rgb(156, 163, 175),
            border_color: Color32::from_rgb(55, 65, 81),
            highlight_color: Color32::from_rgb(59, 130, 246),
            error_color: Color32::from_rgb(248, 113, 113),
            lyric_size: 32.0,
        }
    }
}

/// Converts a parsed cue color into an egui color, keeping its alpha.
pub fn to_color32(color: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

mod lyrics;
mod zone_color;

pub use lyrics::LyricState;
pub use zone_color::ZoneColorState;

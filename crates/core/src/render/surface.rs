use crate::color::Rgba;

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A 2D drawing target sized in pixels.
pub trait RenderSurface: Send {
    fn size(&self) -> (u32, u32);

    /// Changes the pixel size. Always clears the surface to transparent, even
    /// when the size is unchanged.
    fn resize(&mut self, width: u32, height: u32);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba);

    /// Strokes a connected line through `points`.
    fn stroke_polyline(&mut self, points: &[Point], line_width: f32, color: Rgba);

    /// Fills a circle with a soft halo extending `glow` pixels past its edge.
    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba, glow: f32);
}

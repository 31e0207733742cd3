use super::surface::{Point, RenderSurface};
use crate::color::Rgba;

/// CPU-side RGBA canvas. Draws with source-over blending.
#[derive(Clone, Debug, Default)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Straight (non-premultiplied) RGBA bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some(Rgba::rgba(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ))
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Blends `color` over the pixel, scaled by `coverage` in `[0, 1]`.
    fn blend(&mut self, x: i64, y: i64, color: Rgba, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let src_a = color.alpha_f32() * coverage.clamp(0.0, 1.0);
        if src_a <= 0.0 {
            return;
        }

        let i = self.offset(x as u32, y as u32);
        let dst_a = self.pixels[i + 3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);

        let mix = |src: u8, dst: u8| {
            let src = src as f32 / 255.0;
            let dst = dst as f32 / 255.0;
            ((src * src_a + dst * dst_a * (1.0 - src_a)) / out_a * 255.0).round() as u8
        };

        self.pixels[i] = mix(color.r, self.pixels[i]);
        self.pixels[i + 1] = mix(color.g, self.pixels[i + 1]);
        self.pixels[i + 2] = mix(color.b, self.pixels[i + 2]);
        self.pixels[i + 3] = (out_a * 255.0).round() as u8;
    }

    fn clip_x(&self, v: f32) -> i64 {
        (v.floor() as i64).clamp(0, self.width as i64)
    }

    fn clip_y(&self, v: f32) -> i64 {
        (v.floor() as i64).clamp(0, self.height as i64)
    }
}

impl RenderSurface for FrameBuffer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize(width as usize * height as usize * 4, 0);
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        let (x0, x1) = (self.clip_x(x), self.clip_x((x + width).ceil()));
        let (y0, y1) = (self.clip_y(y), self.clip_y((y + height).ceil()));

        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], line_width: f32, color: Rgba) {
        let half = (line_width / 2.0).max(0.5);

        for segment in points.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            let x0 = self.clip_x(a.x.min(b.x) - half);
            let x1 = self.clip_x(a.x.max(b.x) + half + 1.0);
            let y0 = self.clip_y(a.y.min(b.y) - half);
            let y1 = self.clip_y(a.y.max(b.y) + half + 1.0);

            for py in y0..y1 {
                for px in x0..x1 {
                    let center = Point::new(px as f32 + 0.5, py as f32 + 0.5);
                    let d = distance_to_segment(center, a, b);
                    if d <= half {
                        // Joints are covered twice; keep the stroke uniform.
                        self.blend_max(px, py, color);
                    }
                }
            }
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba, glow: f32) {
        let outer = radius + glow.max(0.0);
        let x0 = self.clip_x(center.x - outer);
        let x1 = self.clip_x(center.x + outer + 1.0);
        let y0 = self.clip_y(center.y - outer);
        let y1 = self.clip_y(center.y + outer + 1.0);

        for py in y0..y1 {
            for px in x0..x1 {
                let d = Point::new(px as f32 + 0.5, py as f32 + 0.5).distance_to(&center);
                if d <= radius {
                    self.blend(px, py, color, 1.0);
                } else if d <= outer && glow > 0.0 {
                    let falloff = 1.0 - (d - radius) / glow;
                    self.blend(px, py, color, 0.5 * falloff * falloff);
                }
            }
        }
    }
}

impl FrameBuffer {
    fn blend_max(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = self.offset(x as u32, y as u32);
        if self.pixels[i..i + 3] == [color.r, color.g, color.b] && self.pixels[i + 3] >= color.a {
            return;
        }
        self.blend(x, y, color, 1.0);
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return p.distance_to(&a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance_to(&Point::new(a.x + t * dx, a.y + t * dy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_clears() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.fill_rect(0.0, 0.0, 4.0, 4.0, Rgba::WHITE);
        assert_eq!(fb.pixel(1, 1), Some(Rgba::WHITE));

        fb.resize(4, 4);
        assert_eq!(fb.pixel(1, 1), Some(Rgba::rgba(0, 0, 0, 0)));

        fb.resize(2, 3);
        assert_eq!(fb.size(), (2, 3));
        assert_eq!(fb.pixels().len(), 24);
        assert_eq!(fb.pixel(2, 0), None);
    }

    #[test]
    fn test_fill_rect_clips_to_bounds() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.fill_rect(-2.0, 2.0, 10.0, 10.0, Rgba::rgb(255, 0, 0));

        assert_eq!(fb.pixel(0, 1).unwrap().a, 0);
        assert_eq!(fb.pixel(3, 3), Some(Rgba::rgb(255, 0, 0)));
    }

    #[test]
    fn test_translucent_fill_fades_previous_frame() {
        let mut fb = FrameBuffer::new(1, 1);
        fb.fill_rect(0.0, 0.0, 1.0, 1.0, Rgba::WHITE);
        fb.fill_rect(0.0, 0.0, 1.0, 1.0, Rgba::rgba(0, 0, 0, 128));

        let pixel = fb.pixel(0, 0).unwrap();
        assert_eq!(pixel.a, 255);
        assert!((126..=128).contains(&pixel.r));
    }

    #[test]
    fn test_stroke_covers_line() {
        let mut fb = FrameBuffer::new(10, 10);
        let color = Rgba::rgb(0, 0, 255);
        fb.stroke_polyline(
            &[Point::new(0.0, 5.0), Point::new(10.0, 5.0)],
            4.0,
            color,
        );

        assert_eq!(fb.pixel(5, 5), Some(color));
        assert_eq!(fb.pixel(5, 4), Some(color));
        assert_eq!(fb.pixel(5, 0).unwrap().a, 0);
    }

    #[test]
    fn test_circle_glow_is_fainter_than_core() {
        let mut fb = FrameBuffer::new(20, 20);
        fb.fill_circle(Point::new(10.0, 10.0), 2.0, Rgba::WHITE, 5.0);

        let core = fb.pixel(10, 10).unwrap().a;
        let halo = fb.pixel(14, 10).unwrap().a;
        assert_eq!(core, 255);
        assert!(halo > 0 && halo < core);
        assert_eq!(fb.pixel(0, 0).unwrap().a, 0);
    }
}

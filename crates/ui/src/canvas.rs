use cuelight_core::{FrameBuffer, RenderSurface, Viewport};
use eframe::egui::{self, Color32, ColorImage, TextureHandle, TextureOptions};
use parking_lot::Mutex;

/// Shows a render loop's frame buffer as a texture and notices when the space
/// it was given changes size.
pub struct SurfaceCanvas {
    name: String,
    texture: Option<TextureHandle>,
    viewport: Option<Viewport>,
}

impl SurfaceCanvas {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            texture: None,
            viewport: None,
        }
    }

    /// Paints the latest frame into `size` and returns the new viewport in
    /// physical pixels when it differs from the last one reported.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        surface: &Mutex<FrameBuffer>,
        size: egui::Vec2,
    ) -> Option<Viewport> {
        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());

        self.upload(ui.ctx(), surface);
        if let Some(texture) = &self.texture {
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            ui.painter().image(texture.id(), rect, uv, Color32::WHITE);
        }

        let scale = ui.ctx().pixels_per_point();
        let viewport = Viewport::new(
            (rect.width() * scale).round().max(1.0) as u32,
            (rect.height() * scale).round().max(1.0) as u32,
        );
        if self.viewport == Some(viewport) {
            return None;
        }
        self.viewport = Some(viewport);
        Some(viewport)
    }

    fn upload(&mut self, ctx: &egui::Context, surface: &Mutex<FrameBuffer>) {
        let image = {
            let frame = surface.lock();
            let (width, height) = frame.size();
            if width == 0 || height == 0 {
                return;
            }
            ColorImage::from_rgba_unmultiplied(
                [width as usize, height as usize],
                frame.pixels(),
            )
        };

        let options = TextureOptions {
            magnification: egui::TextureFilter::Linear,
            minification: egui::TextureFilter::Linear,
            ..Default::default()
        };

        match &mut self.texture {
            Some(texture) => texture.set(image, options),
            None => self.texture = Some(ctx.load_texture(self.name.clone(), image, options)),
        }
    }
}

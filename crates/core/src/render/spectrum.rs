use std::sync::Arc;

use super::render_loop::{FrameRenderer, Viewport};
use super::surface::{Point, RenderSurface};
use crate::audio::AudioSignal;
use crate::color::Rgba;
use crate::state::ZoneColorState;

/// `#1a202c`
pub const BACKGROUND_COLOR: Rgba = Rgba::rgb(0x1a, 0x20, 0x2c);

#[derive(Clone, Debug)]
pub struct SpectrumConfig {
    pub waveform_line_width: f32,
    /// Bar width as a fraction of the per-bin slot.
    pub bar_width_ratio: f32,
    pub bar_gap: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            waveform_line_width: 4.0,
            bar_width_ratio: 0.9,
            bar_gap: 1.0,
        }
    }
}

/// Paints the live waveform, split into one colored segment per zone, with
/// the frequency spectrum as rainbow bars on top.
pub struct SpectrumRenderer {
    config: SpectrumConfig,
    zone_colors: Arc<ZoneColorState>,
    signal: Option<Box<dyn AudioSignal>>,
    time_domain: Vec<u8>,
    frequency: Vec<u8>,
}

impl SpectrumRenderer {
    pub fn new(config: SpectrumConfig, zone_colors: Arc<ZoneColorState>) -> Self {
        Self {
            config,
            zone_colors,
            signal: None,
            time_domain: Vec::new(),
            frequency: Vec::new(),
        }
    }

    pub fn with_signal(mut self, signal: Box<dyn AudioSignal>) -> Self {
        self.set_signal(signal);
        self
    }

    pub fn set_signal(&mut self, signal: Box<dyn AudioSignal>) {
        let bins = signal.frequency_bin_count();
        self.time_domain = vec![128; bins];
        self.frequency = vec![0; bins];
        self.signal = Some(signal);
    }

    pub fn has_signal(&self) -> bool {
        self.signal.is_some()
    }

    /// One-line summary of the analysis settings and the color of every zone.
    pub fn diagnostics(&self) -> String {
        let analysis = match &self.signal {
            Some(signal) => format!("{} Hz, fft {}", signal.sample_rate(), signal.fft_size()),
            None => "no signal".to_string(),
        };
        let zones: Vec<String> = self
            .zone_colors
            .zones()
            .iter()
            .map(|zone| format!("{}={}", zone, self.zone_colors.color(zone)))
            .collect();
        format!("{} | {}", analysis, zones.join(" "))
    }

    fn draw_waveform(&self, surface: &mut dyn RenderSurface, width: f32, height: f32) {
        let len = self.time_domain.len();
        if len == 0 {
            return;
        }

        let slice_width = width / len as f32;
        let points: Vec<Point> = self
            .time_domain
            .iter()
            .enumerate()
            .map(|(i, &byte)| {
                let v = byte as f32 / 128.0;
                Point::new(i as f32 * slice_width, v * height / 2.0)
            })
            .collect();

        let zones = self.zone_colors.zones();
        let colors: Vec<Rgba> = if zones.is_empty() {
            vec![self.zone_colors.fallback_color()]
        } else {
            zones.iter().map(|zone| self.zone_colors.color(zone)).collect()
        };

        // Segment k covers samples [k*len/n, (k+1)*len/n) and runs on to the
        // first point of the next segment so the line stays connected.
        let segments = colors.len();
        for (k, color) in colors.into_iter().enumerate() {
            let start = k * len / segments;
            let end = (k + 1) * len / segments;
            if start >= end {
                continue;
            }

            let mut segment: Vec<Point> = if end < len {
                points[start..=end].to_vec()
            } else {
                points[start..].to_vec()
            };
            if end >= len {
                segment.push(Point::new(width, height / 2.0));
            }

            surface.stroke_polyline(&segment, self.config.waveform_line_width, color);
        }
    }

    fn draw_spectrum(&self, surface: &mut dyn RenderSurface, width: f32, height: f32) {
        let len = self.frequency.len();
        if len == 0 {
            return;
        }

        let bar_width = width / len as f32 * self.config.bar_width_ratio;
        let mut x = 0.0;

        for (i, &value) in self.frequency.iter().enumerate() {
            let bar_height = value as f32;
            if bar_height > 0.0 {
                let hue = i as f32 / len as f32 * 360.0;
                surface.fill_rect(
                    x,
                    height - bar_height,
                    bar_width,
                    bar_height,
                    Rgba::from_hsl(hue, 1.0, 0.5),
                );
            }
            x += bar_width + self.config.bar_gap;
        }
    }
}

impl FrameRenderer for SpectrumRenderer {
    fn render(&mut self, surface: &mut dyn RenderSurface, viewport: Viewport) {
        surface.resize(viewport.width, viewport.height);
        let (width, height) = (viewport.width as f32, viewport.height as f32);
        surface.fill_rect(0.0, 0.0, width, height, BACKGROUND_COLOR);

        let Some(signal) = self.signal.as_mut() else {
            return;
        };

        signal.refresh();
        signal.byte_time_domain_data(&mut self.time_domain);
        signal.byte_frequency_data(&mut self.frequency);

        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Spectrum frame: {}", self.diagnostics());
        }

        self.draw_waveform(surface, width, height);
        self.draw_spectrum(surface, width, height);
    }
}

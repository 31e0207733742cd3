use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::media::MediaBuffer;
use super::player::MediaClock;
use crate::render::RenderError;

#[derive(Clone, Debug, PartialEq)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Live time-domain and frequency-domain view of an audio signal.
///
/// Both byte buffers hold `frequency_bin_count` entries.
pub trait AudioSignal: Send {
    fn frequency_bin_count(&self) -> usize;

    fn fft_size(&self) -> usize {
        self.frequency_bin_count() * 2
    }

    /// Sample rate of the analysed media, in Hz.
    fn sample_rate(&self) -> u32;

    /// Pulls the latest samples. Called once per rendered frame.
    fn refresh(&mut self);

    fn byte_time_domain_data(&self, out: &mut [u8]);

    fn byte_frequency_data(&self, out: &mut [u8]);
}

/// Windowed FFT analysis of the most recent `fft_size` samples.
pub struct Analyser {
    config: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    block: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl Analyser {
    pub fn new(config: AnalyserConfig) -> Result<Self, RenderError> {
        if !config.fft_size.is_power_of_two() || !(32..=32768).contains(&config.fft_size) {
            return Err(RenderError::InitializationFailure(format!(
                "fft size {} must be a power of two between 32 and 32768",
                config.fft_size
            )));
        }
        if config.min_decibels >= config.max_decibels {
            return Err(RenderError::InitializationFailure(format!(
                "min decibels {} must be below max decibels {}",
                config.min_decibels, config.max_decibels
            )));
        }

        let size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        Ok(Self {
            fft,
            window: blackman_window(size),
            block: vec![0.0; size],
            smoothed: vec![0.0; size / 2],
            scratch: vec![Complex::new(0.0, 0.0); size],
            config: AnalyserConfig {
                smoothing_time_constant: config.smoothing_time_constant.clamp(0.0, 1.0),
                ..config
            },
        })
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    pub fn time_domain(&self) -> &[f32] {
        &self.block
    }

    /// Analyses a new block. Shorter blocks are left-padded with silence.
    pub fn process(&mut self, samples: &[f32]) {
        let size = self.fft_size();
        let take = samples.len().min(size);
        let pad = size - take;

        self.block[..pad].fill(0.0);
        self.block[pad..].copy_from_slice(&samples[samples.len() - take..]);

        for ((slot, sample), w) in self
            .scratch
            .iter_mut()
            .zip(self.block.iter())
            .zip(self.window.iter())
        {
            *slot = Complex::new(sample * w, 0.0);
        }

        self.fft.process(&mut self.scratch);

        let tau = self.config.smoothing_time_constant;
        let scale = 1.0 / size as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(self.scratch.iter()) {
            let magnitude = bin.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }
    }

    /// Samples mapped from `[-1, 1]` to bytes centred on 128.
    pub fn byte_time_domain_data(&self, out: &mut [u8]) {
        for (byte, sample) in out.iter_mut().zip(self.block.iter()) {
            *byte = (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8;
        }
    }

    /// Smoothed magnitudes in decibels, scaled between the min and max
    /// decibel bounds onto 0-255.
    pub fn byte_frequency_data(&self, out: &mut [u8]) {
        let min = self.config.min_decibels;
        let range = self.config.max_decibels - min;

        for (byte, magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            let db = if *magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
            *byte = (255.0 / range * (db - min)).clamp(0.0, 255.0) as u8;
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

/// An [`Analyser`] fed from decoded media at the clock's position.
pub struct SignalGraph {
    media: MediaBuffer,
    clock: Arc<dyn MediaClock>,
    analyser: Analyser,
    window: Vec<f32>,
}

impl SignalGraph {
    pub fn attach(
        media: &MediaBuffer,
        clock: Arc<dyn MediaClock>,
        config: AnalyserConfig,
    ) -> Result<Self, RenderError> {
        if media.mono().is_empty() {
            return Err(RenderError::InitializationFailure(
                "media source has no decoded samples".to_string(),
            ));
        }

        let analyser = Analyser::new(config)?;
        let window = vec![0.0; analyser.fft_size()];
        log::info!(
            "Signal graph attached ({} Hz, fft size {}, {} bins)",
            media.sample_rate(),
            analyser.fft_size(),
            analyser.frequency_bin_count()
        );

        Ok(Self {
            media: media.clone(),
            clock,
            analyser,
            window,
        })
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }
}

impl AudioSignal for SignalGraph {
    fn frequency_bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    fn fft_size(&self) -> usize {
        self.analyser.fft_size()
    }

    fn sample_rate(&self) -> u32 {
        self.media.sample_rate()
    }

    fn refresh(&mut self) {
        self.media
            .window_ending_at(self.clock.position(), &mut self.window);
        self.analyser.process(&self.window);
    }

    fn byte_time_domain_data(&self, out: &mut [u8]) {
        self.analyser.byte_time_domain_data(out);
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        self.analyser.byte_frequency_data(out);
    }
}

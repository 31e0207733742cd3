use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cue::cue::{CueValue, Zone};
use crate::fixture::ConnectionState;
use crate::render::Viewport;

/// Commands sent from the shell to the performance
#[derive(Debug, Clone)]
pub enum ShowCommand {
    Play,
    Pause,
    /// Pause and rewind to the start
    Stop,
    SetVolume(f32),
    ConnectFixtures,
    DisconnectFixtures,
    ClearFixtures,
    /// Size of the spectrum canvas
    ResizeSpectrum(Viewport),
    /// Size of one zone's particle canvas
    ResizeZone { zone: Zone, viewport: Viewport },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Events sent from the performance to the shell
#[derive(Debug, Clone)]
pub enum ShowEvent {
    PlaybackStateChanged {
        state: PlaybackState,
    },
    PositionUpdated {
        seconds: f64,
        duration: Option<f64>,
    },
    LyricsChanged {
        lines: Arc<Vec<String>>,
    },
    ZoneColorChanged {
        zone: Zone,
        value: CueValue,
    },
    FixtureStateChanged {
        state: ConnectionState,
    },
    Status {
        message: String,
    },
    Error {
        message: String,
    },
    ShutdownComplete,
}

/// Settings configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // General settings
    pub target_fps: u32,
    pub fallback_color: String,

    // Rendering settings
    pub waveform_line_width: f32,
    pub particles_per_cluster: usize,
    pub cluster_count: usize,

    // Analysis settings
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,

    // Audio settings
    pub volume: f32,

    // Output settings (Art-Net)
    pub artnet_enabled: bool,
    pub artnet_broadcast: bool,
    pub artnet_dest_ip: String,
    pub artnet_port: u16,
    pub artnet_universe: u8,
    pub connect_fixtures_on_start: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // General defaults
            target_fps: 60,
            fallback_color: crate::cue::cue::DEFAULT_FALLBACK_COLOR.to_string(),

            // Rendering defaults
            waveform_line_width: 4.0,
            particles_per_cluster: 50,
            cluster_count: 4,

            // Analysis defaults
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,

            // Audio defaults
            volume: 1.0,

            // Output defaults
            artnet_enabled: true,
            artnet_broadcast: false,
            artnet_dest_ip: "192.168.1.200".to_string(),
            artnet_port: 6454,
            artnet_universe: 1,
            connect_fixtures_on_start: false,
        }
    }
}

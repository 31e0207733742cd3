pub use audio::{
    Analyser, AnalyserConfig, AudioError, AudioPlayer, AudioSignal, FreeRunningClock,
    MediaBuffer, MediaClock, MediaError, SignalGraph,
};
pub use color::Rgba;
pub use config::{ConfigError, ConfigFile, ConfigManager, ConfigSchema};
pub use cue::cue::{
    CueValue, LyricCue, MetadataCue, TrackCue, Zone, DEFAULT_FALLBACK_COLOR, LIGHTING_CUE_TYPE,
};
pub use cue::cue_sync::{select_lighting_value, CueSync, SubscriptionId, SyncPhase};
pub use cue::track::{
    CueTrack, ReadyState, TrackChange, TrackEngine, TrackError, TrackId, TrackKind,
};
pub use fixture::{
    ArtNetConfig, ArtNetController, ArtNetMode, ConnectionState, DmxChannel, DmxPayload,
    FixtureBridge, FixtureController, FixtureError, BLACKOUT_ZONE,
};
pub use messages::{PlaybackState, Settings, ShowCommand, ShowEvent};
// Async module system exports
pub use modules::{
    AsyncModule, FixtureModule, ModuleEvent, ModuleId, ModuleManager, ModuleMessage,
};
pub use performance::{particle_loop_name, Performance, Stage, SPECTRUM_LOOP};
pub use render::{
    ColorChannel, DrawCommand, FrameBuffer, FrameRenderer, Particle, ParticleConfig,
    ParticleField, Point, RecordingSurface, RenderError, RenderLoop, RenderLoops, RenderSurface,
    SpectrumConfig, SpectrumRenderer, Viewport, BACKGROUND_COLOR,
};
pub use show::show::{FixtureEntry, Show, ShowFile, TrackEntry, TrackEntryKind};
pub use show::show_loader::{ShowError, ShowLoader};
pub use state::{LyricState, ZoneColorState};

mod audio;
mod color;
mod config;
mod cue;
mod fixture;
pub mod messages;
mod modules;
mod performance;
mod render;
mod show;
mod state;

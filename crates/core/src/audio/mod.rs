pub mod analyser;
pub mod media;
pub mod player;

pub use analyser::{Analyser, AnalyserConfig, AudioSignal, SignalGraph};
pub use media::{MediaBuffer, MediaError};
pub use player::{AudioError, AudioPlayer, FreeRunningClock, MediaClock};

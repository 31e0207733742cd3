use std::collections::BTreeMap;
use std::sync::Arc;

use cuelight_core::{ConnectionState, CueValue, PlaybackState, ShowEvent, Zone};

/// Everything the shell knows about the running performance, built up from
/// the events it receives.
#[derive(Debug, Clone)]
pub struct ShowState {
    pub title: String,
    pub playback_state: PlaybackState,
    pub position: f64,
    pub duration: Option<f64>,
    pub volume: f32,
    pub lyrics: Arc<Vec<String>>,
    pub zone_values: BTreeMap<Zone, CueValue>,
    pub fixture_state: ConnectionState,
    pub status: Option<String>,
    pub last_error: Option<String>,
    pub shutdown_complete: bool,
}

impl ShowState {
    pub fn new(title: impl Into<String>, volume: f32) -> Self {
        Self {
            title: title.into(),
            playback_state: PlaybackState::Stopped,
            position: 0.0,
            duration: None,
            volume,
            lyrics: Arc::new(Vec::new()),
            zone_values: BTreeMap::new(),
            fixture_state: ConnectionState::Disconnected,
            status: None,
            last_error: None,
            shutdown_complete: false,
        }
    }

    pub fn update(&mut self, event: ShowEvent) {
        match event {
            ShowEvent::PlaybackStateChanged { state } => {
                self.playback_state = state;
            }
            ShowEvent::PositionUpdated { seconds, duration } => {
                self.position = seconds;
                self.duration = duration;
            }
            ShowEvent::LyricsChanged { lines } => {
                self.lyrics = lines;
            }
            ShowEvent::ZoneColorChanged { zone, value } => {
                self.zone_values.insert(zone, value);
            }
            ShowEvent::FixtureStateChanged { state } => {
                self.fixture_state = state;
            }
            ShowEvent::Status { message } => {
                self.status = Some(message);
            }
            ShowEvent::Error { message } => {
                log::debug!("Performance reported: {}", message);
                self.last_error = Some(message);
            }
            ShowEvent::ShutdownComplete => {
                self.shutdown_complete = true;
            }
        }
    }

    /// Playback progress in `[0, 1]`, zero when the duration is unknown.
    pub fn progress(&self) -> f32 {
        match self.duration {
            Some(duration) if duration > 0.0 => (self.position / duration).clamp(0.0, 1.0) as f32,
            _ => 0.0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback_state == PlaybackState::Playing
    }

    pub fn fixtures_connected(&self) -> bool {
        matches!(
            self.fixture_state,
            ConnectionState::Connected | ConnectionState::Connecting
        )
    }
}

/// `m:ss` rendering of a position in seconds.
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_tracks_events() {
        let mut state = ShowState::new("Opening", 0.8);
        state.update(ShowEvent::PlaybackStateChanged {
            state: PlaybackState::Playing,
        });
        state.update(ShowEvent::PositionUpdated {
            seconds: 30.0,
            duration: Some(120.0),
        });
        state.update(ShowEvent::LyricsChanged {
            lines: Arc::new(vec!["first".to_string(), "second".to_string()]),
        });
        state.update(ShowEvent::ZoneColorChanged {
            zone: Zone::new("left"),
            value: CueValue::with_color("red"),
        });
        state.update(ShowEvent::FixtureStateChanged {
            state: ConnectionState::Connected,
        });

        assert!(state.is_playing());
        assert_eq!(state.progress(), 0.25);
        assert_eq!(state.lyrics.len(), 2);
        assert_eq!(state.zone_values[&Zone::new("left")].color, "red");
        assert!(state.fixtures_connected());
    }

    #[test]
    fn test_errors_and_shutdown_are_kept() {
        let mut state = ShowState::new("Opening", 1.0);
        state.update(ShowEvent::Error {
            message: "no device".to_string(),
        });
        state.update(ShowEvent::ShutdownComplete);

        assert_eq!(state.last_error.as_deref(), Some("no device"));
        assert!(state.shutdown_complete);
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(75.9), "1:15");
        assert_eq!(format_time(-3.0), "0:00");
    }
}

use thiserror::Error;

use crate::cue::cue::{LyricCue, MetadataCue, TrackCue, Zone};

pub type TrackId = usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("Track {0} does not exist")]
    UnknownTrack(TrackId),

    #[error("Track {0} is already loaded")]
    AlreadyLoaded(TrackId),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrackKind {
    /// Caption track whose text is shown as lyrics.
    Lyric { label: String },
    /// Metadata track carrying lighting cues for one zone.
    Metadata { zone: Zone },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Loaded,
}

/// A text track with its cues ordered by start time.
#[derive(Clone, Debug)]
pub struct CueTrack {
    id: TrackId,
    kind: TrackKind,
    ready: ReadyState,
    cues: Vec<TrackCue>,
    active: Vec<usize>,
}

impl CueTrack {
    pub fn lyric(label: impl Into<String>, cues: Vec<LyricCue>) -> Self {
        Self::loaded(
            TrackKind::Lyric {
                label: label.into(),
            },
            cues.into_iter().map(TrackCue::Lyric).collect(),
        )
    }

    pub fn metadata(zone: Zone, cues: Vec<MetadataCue>) -> Self {
        Self::loaded(
            TrackKind::Metadata { zone },
            cues.into_iter().map(TrackCue::Metadata).collect(),
        )
    }

    /// A track whose cues have not arrived yet.
    pub fn pending(kind: TrackKind) -> Self {
        CueTrack {
            id: 0,
            kind,
            ready: ReadyState::Loading,
            cues: Vec::new(),
            active: Vec::new(),
        }
    }

    fn loaded(kind: TrackKind, cues: Vec<TrackCue>) -> Self {
        let mut track = Self::pending(kind);
        track.load(cues);
        track
    }

    /// Installs the cues and marks the track loaded.
    pub fn load(&mut self, mut cues: Vec<TrackCue>) {
        // Stable sort keeps file order for cues sharing a start time.
        cues.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        self.cues = cues;
        self.active.clear();
        self.ready = ReadyState::Loaded;
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn kind(&self) -> &TrackKind {
        &self.kind
    }

    pub fn zone(&self) -> Option<&Zone> {
        match &self.kind {
            TrackKind::Metadata { zone } => Some(zone),
            TrackKind::Lyric { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready == ReadyState::Loaded
    }

    pub fn cues(&self) -> &[TrackCue] {
        &self.cues
    }

    /// Currently active cues in start-time order.
    pub fn active_cues(&self) -> Vec<TrackCue> {
        self.active.iter().map(|&i| self.cues[i].clone()).collect()
    }

    fn recompute(&mut self, seconds: f64) -> bool {
        let active: Vec<usize> = self
            .cues
            .iter()
            .enumerate()
            .filter(|(_, cue)| cue.is_active_at(seconds))
            .map(|(i, _)| i)
            .collect();

        if active == self.active {
            return false;
        }
        self.active = active;
        true
    }
}

/// Notification that a track's set of active cues changed.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackChange {
    pub track: TrackId,
    pub kind: TrackKind,
    pub active: Vec<TrackCue>,
}

/// Drives text tracks from the media position and reports activation changes.
pub struct TrackEngine {
    tracks: Vec<CueTrack>,
    position: Option<f64>,
    ready_signalled: bool,
}

impl TrackEngine {
    pub fn new(tracks: Vec<CueTrack>) -> Self {
        let tracks = tracks
            .into_iter()
            .enumerate()
            .map(|(id, mut track)| {
                track.id = id;
                track
            })
            .collect();

        Self {
            tracks,
            position: None,
            ready_signalled: false,
        }
    }

    pub fn tracks(&self) -> &[CueTrack] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&CueTrack> {
        self.tracks.get(id)
    }

    pub fn zones(&self) -> Vec<Zone> {
        zones_of(&self.tracks)
    }

    /// Delivers the cues of a pending track.
    pub fn load_track(&mut self, id: TrackId, cues: Vec<TrackCue>) -> Result<(), TrackError> {
        let track = self
            .tracks
            .get_mut(id)
            .ok_or(TrackError::UnknownTrack(id))?;
        if track.is_ready() {
            return Err(TrackError::AlreadyLoaded(id));
        }
        track.load(cues);
        Ok(())
    }

    pub fn all_ready(&self) -> bool {
        self.tracks.iter().all(CueTrack::is_ready)
    }

    /// Returns `true` exactly once, the first time every track is loaded.
    pub fn take_ready_signal(&mut self) -> bool {
        if self.ready_signalled || !self.all_ready() {
            return false;
        }
        self.ready_signalled = true;
        true
    }

    pub fn position(&self) -> Option<f64> {
        self.position
    }

    /// Moves to `seconds` and returns a change for every loaded track whose
    /// active set differs from the previous position.
    pub fn advance(&mut self, seconds: f64) -> Vec<TrackChange> {
        self.position = Some(seconds);

        self.tracks
            .iter_mut()
            .filter(|track| track.is_ready())
            .filter_map(|track| {
                track.recompute(seconds).then(|| TrackChange {
                    track: track.id,
                    kind: track.kind.clone(),
                    active: track.active_cues(),
                })
            })
            .collect()
    }
}

/// Zones of the metadata tracks in declaration order, without duplicates.
pub fn zones_of(tracks: &[CueTrack]) -> Vec<Zone> {
    let mut zones: Vec<Zone> = Vec::new();
    for zone in tracks.iter().filter_map(CueTrack::zone) {
        if !zones.contains(zone) {
            zones.push(zone.clone());
        }
    }
    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::cue::CueValue;

    fn lighting(color: &str, start: f64, end: f64) -> MetadataCue {
        MetadataCue::lighting(CueValue::with_color(color), start, end)
    }

    fn engine() -> TrackEngine {
        TrackEngine::new(vec![
            CueTrack::lyric(
                "English",
                vec![LyricCue {
                    text: "hello".to_string(),
                    start_time: 1.0,
                    end_time: 2.0,
                }],
            ),
            CueTrack::metadata(
                Zone::from("left"),
                vec![lighting("blue", 2.0, 6.0), lighting("red", 1.0, 4.0)],
            ),
            CueTrack::pending(TrackKind::Metadata {
                zone: Zone::from("right"),
            }),
        ])
    }

    #[test]
    fn test_advance_reports_only_changed_tracks() {
        let mut engine = engine();

        assert!(engine.advance(0.5).is_empty());

        let changes = engine.advance(1.0);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].track, 0);
        assert_eq!(changes[1].track, 1);

        // Same active sets, no notifications.
        assert!(engine.advance(1.5).is_empty());

        let changes = engine.advance(2.5);
        assert_eq!(changes.len(), 2);
        assert!(changes[0].active.is_empty());
        assert_eq!(changes[1].active.len(), 2);
    }

    #[test]
    fn test_active_cues_are_in_start_order() {
        let mut engine = engine();
        engine.advance(3.0);
        let starts: Vec<f64> = engine.tracks()[1]
            .active_cues()
            .iter()
            .map(TrackCue::start_time)
            .collect();
        assert_eq!(starts, vec![1.0, 2.0]);
    }

    #[test]
    fn test_pending_track_is_silent_until_loaded() {
        let mut engine = engine();
        assert!(!engine.all_ready());
        assert!(!engine.take_ready_signal());

        assert!(engine.advance(3.0).iter().all(|c| c.track != 2));

        engine
            .load_track(2, vec![TrackCue::Metadata(lighting("green", 0.0, 10.0))])
            .unwrap();
        assert!(engine.take_ready_signal());
        assert!(!engine.take_ready_signal());

        let changes = engine.advance(3.5);
        assert!(changes.iter().any(|c| c.track == 2));
        assert_eq!(
            engine.load_track(9, Vec::new()),
            Err(TrackError::UnknownTrack(9))
        );
        assert_eq!(
            engine.load_track(2, Vec::new()),
            Err(TrackError::AlreadyLoaded(2))
        );
        assert_eq!(engine.track(2).map(|t| t.cues().len()), Some(1));
    }

    #[test]
    fn test_zones_follow_declaration_order() {
        let engine = engine();
        assert_eq!(engine.zones(), vec![Zone::from("left"), Zone::from("right")]);
    }
}

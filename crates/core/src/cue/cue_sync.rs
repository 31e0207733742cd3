use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cue::cue::{CueValue, TrackCue, Zone};
use crate::cue::track::{CueTrack, TrackChange, TrackEngine, TrackId, TrackKind};
use crate::state::{LyricState, ZoneColorState};

pub type SubscriptionId = u64;

type ZoneHandler = Box<dyn FnMut(&Zone, &CueValue) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing registered yet.
    Idle,
    /// Loaded tracks registered; waiting for the rest to finish loading.
    Attached,
    /// The tracks-ready signal has been handled. No further registration.
    Ready,
}

#[derive(Clone, Debug, PartialEq)]
enum Registration {
    Zone(Zone),
    Lyric,
}

/// Turns active-cue notifications into one current value per zone and the
/// current lyric lines.
///
/// When several lighting cues are active at once, the one with the latest
/// start time wins; cues sharing a start time resolve to the one the track
/// reports last. Cues without the lighting discriminator or without a color
/// are skipped, and a zone whose active set holds only such cues keeps its
/// previous value.
pub struct CueSync {
    zone_colors: Arc<ZoneColorState>,
    lyrics: Arc<LyricState>,
    registrations: HashMap<TrackId, Registration>,
    registered_zones: HashSet<Zone>,
    lyric_track: Option<TrackId>,
    subscribers: Vec<(SubscriptionId, Zone, ZoneHandler)>,
    next_subscription: SubscriptionId,
    phase: SyncPhase,
}

impl CueSync {
    pub fn new(zone_colors: Arc<ZoneColorState>, lyrics: Arc<LyricState>) -> Self {
        Self {
            zone_colors,
            lyrics,
            registrations: HashMap::new(),
            registered_zones: HashSet::new(),
            lyric_track: None,
            subscribers: Vec::new(),
            next_subscription: 1,
            phase: SyncPhase::Idle,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn zone_colors(&self) -> &Arc<ZoneColorState> {
        &self.zone_colors
    }

    pub fn lyrics(&self) -> &Arc<LyricState> {
        &self.lyrics
    }

    pub fn is_registered(&self, zone: &Zone) -> bool {
        self.registered_zones.contains(zone)
    }

    /// Registers every track that has finished loading. Tracks still loading
    /// are left for [`CueSync::tracks_ready`]. Only the first call registers.
    pub fn attach(&mut self, engine: &TrackEngine) -> usize {
        if self.phase != SyncPhase::Idle {
            log::debug!("CueSync already attached, ignoring");
            return 0;
        }
        self.phase = SyncPhase::Attached;
        self.register_loaded(engine)
    }

    /// Handles the one-time signal that all tracks finished loading.
    pub fn tracks_ready(&mut self, engine: &TrackEngine) -> usize {
        match self.phase {
            SyncPhase::Ready => {
                log::debug!("Tracks-ready already handled, ignoring");
                0
            }
            SyncPhase::Idle | SyncPhase::Attached => {
                self.phase = SyncPhase::Ready;
                self.register_loaded(engine)
            }
        }
    }

    fn register_loaded(&mut self, engine: &TrackEngine) -> usize {
        engine
            .tracks()
            .iter()
            .filter(|track| track.is_ready())
            .filter(|track| self.register(track))
            .count()
    }

    fn register(&mut self, track: &CueTrack) -> bool {
        if self.registrations.contains_key(&track.id()) {
            return false;
        }

        match track.kind() {
            TrackKind::Metadata { zone } => {
                if !self.registered_zones.insert(zone.clone()) {
                    log::warn!(
                        "Zone {} already has a cue track, ignoring track {}",
                        zone,
                        track.id()
                    );
                    return false;
                }
                self.registrations
                    .insert(track.id(), Registration::Zone(zone.clone()));
                log::info!("Listening for lighting cues on zone {}", zone);
                self.publish(zone, self.zone_colors.fallback().as_ref().clone());
                true
            }
            TrackKind::Lyric { label } => {
                if self.lyric_track.is_some() {
                    log::warn!("Lyric track already registered, ignoring {}", label);
                    return false;
                }
                self.lyric_track = Some(track.id());
                self.registrations.insert(track.id(), Registration::Lyric);
                log::info!("Listening for lyrics on track {}", label);
                true
            }
        }
    }

    /// Calls `handler` whenever the zone's value changes.
    pub fn subscribe<F>(&mut self, zone: Zone, handler: F) -> SubscriptionId
    where
        F: FnMut(&Zone, &CueValue) + Send + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, zone, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Applies an active-cues-changed notification.
    pub fn handle_change(&mut self, change: &TrackChange) {
        match self.registrations.get(&change.track).cloned() {
            Some(Registration::Zone(zone)) => self.apply_zone(&zone, &change.active),
            Some(Registration::Lyric) => self.apply_lyrics(&change.active),
            None => log::trace!("Track {} not registered, skipping change", change.track),
        }
    }

    fn apply_zone(&mut self, zone: &Zone, active: &[TrackCue]) {
        if active.is_empty() {
            log::debug!("{}: no active cues", zone);
            self.publish(zone, self.zone_colors.fallback().as_ref().clone());
            return;
        }

        match select_lighting_value(active) {
            Some(value) => {
                log::debug!("{}: {:?}", zone, value);
                self.publish(zone, value);
            }
            None => log::warn!(
                "{}: {} active cue(s) without a lighting value, keeping current color",
                zone,
                active.len()
            ),
        }
    }

    fn apply_lyrics(&self, active: &[TrackCue]) {
        let last_caption = active.iter().rev().find_map(|cue| match cue {
            TrackCue::Lyric(lyric) => Some(lyric),
            TrackCue::Metadata(_) => None,
        });

        match last_caption {
            Some(lyric) => self.lyrics.set_lines(lyric.lines()),
            None => self.lyrics.clear(),
        }
    }

    fn publish(&mut self, zone: &Zone, value: CueValue) {
        if !self.zone_colors.set(zone, value.clone()) {
            return;
        }
        for (_, subscribed, handler) in self.subscribers.iter_mut() {
            if subscribed == zone {
                handler(zone, &value);
            }
        }
    }
}

/// Picks the winning lighting value among simultaneously active cues.
pub fn select_lighting_value(active: &[TrackCue]) -> Option<CueValue> {
    active
        .iter()
        .enumerate()
        .filter_map(|(order, cue)| match cue {
            TrackCue::Metadata(metadata) => metadata
                .lighting_value()
                .map(|value| (metadata.start_time, order, value)),
            TrackCue::Lyric(_) => None,
        })
        .max_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, _, value)| value)
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::cue::cue::{LyricCue, MetadataCue, DEFAULT_FALLBACK_COLOR};

    fn lighting(color: &str, start: f64, end: f64) -> TrackCue {
        TrackCue::Metadata(MetadataCue::lighting(
            CueValue::with_color(color),
            start,
            end,
        ))
    }

    fn setup() -> (CueSync, TrackEngine) {
        let engine = TrackEngine::new(vec![
            CueTrack::lyric("English", Vec::new()),
            CueTrack::metadata(Zone::from("left"), Vec::new()),
            CueTrack::metadata(Zone::from("right"), Vec::new()),
        ]);
        let zone_colors = Arc::new(ZoneColorState::new(engine.zones(), DEFAULT_FALLBACK_COLOR));
        let mut sync = CueSync::new(zone_colors, Arc::new(LyricState::new()));
        sync.attach(&engine);
        (sync, engine)
    }

    fn change(track: TrackId, zone: &str, active: Vec<TrackCue>) -> TrackChange {
        TrackChange {
            track,
            kind: TrackKind::Metadata {
                zone: Zone::from(zone),
            },
            active,
        }
    }

    #[test]
    fn test_latest_start_wins() {
        let active = vec![lighting("red", 1.0, 5.0), lighting("blue", 2.0, 5.0)];
        assert_eq!(select_lighting_value(&active).unwrap().color, "blue");

        let reversed = vec![lighting("blue", 2.0, 5.0), lighting("red", 1.0, 5.0)];
        assert_eq!(select_lighting_value(&reversed).unwrap().color, "blue");
    }

    #[test]
    fn test_equal_start_resolves_to_last_reported() {
        let active = vec![lighting("red", 1.0, 5.0), lighting("green", 1.0, 3.0)];
        assert_eq!(select_lighting_value(&active).unwrap().color, "green");
    }

    #[test]
    fn test_non_lighting_cues_are_skipped() {
        let other = TrackCue::Metadata(MetadataCue {
            kind: "org.webvmt.example.path".to_string(),
            value: json!({ "color": "black" }),
            start_time: 3.0,
            end_time: 4.0,
        });
        let active = vec![lighting("red", 1.0, 5.0), other.clone()];
        assert_eq!(select_lighting_value(&active).unwrap().color, "red");
        assert!(select_lighting_value(&[other]).is_none());
    }

    #[test]
    fn test_malformed_cue_keeps_previous_value() {
        let (mut sync, _) = setup();
        let left = Zone::from("left");

        sync.handle_change(&change(1, "left", vec![lighting("red", 0.0, 2.0)]));
        let malformed = TrackCue::Metadata(MetadataCue {
            kind: crate::cue::cue::LIGHTING_CUE_TYPE.to_string(),
            value: json!({ "intensity": 1.0 }),
            start_time: 1.0,
            end_time: 2.0,
        });
        sync.handle_change(&change(1, "left", vec![malformed]));

        assert_eq!(sync.zone_colors().get(&left).color, "red");
    }

    #[test]
    fn test_zone_cycle_ends_at_fallback_with_single_notification() {
        let (mut sync, _) = setup();
        let left = Zone::from("left");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        sync.subscribe(left.clone(), move |_, value| {
            sink.lock().push(value.color.clone())
        });

        let cue_a = lighting("red", 1.0, 10.0);
        let cue_b = lighting("blue", 2.0, 10.0);

        sync.handle_change(&change(1, "left", vec![]));
        sync.handle_change(&change(1, "left", vec![cue_a.clone()]));
        sync.handle_change(&change(1, "left", vec![cue_a.clone(), cue_b.clone()]));
        assert_eq!(sync.zone_colors().get(&left).color, "blue");

        // Re-applying the same set changes nothing.
        sync.handle_change(&change(1, "left", vec![cue_a, cue_b]));
        sync.handle_change(&change(1, "left", vec![]));

        assert_eq!(sync.zone_colors().get(&left).color, DEFAULT_FALLBACK_COLOR);
        assert_eq!(
            *seen.lock(),
            vec!["red", "blue", DEFAULT_FALLBACK_COLOR]
        );
    }

    #[test]
    fn test_zones_are_independent() {
        let (mut sync, _) = setup();
        sync.handle_change(&change(2, "right", vec![lighting("red", 0.0, 1.0)]));
        assert_eq!(sync.zone_colors().get(&Zone::from("right")).color, "red");
        assert_eq!(
            sync.zone_colors().get(&Zone::from("left")).color,
            DEFAULT_FALLBACK_COLOR
        );
    }

    #[test]
    fn test_lyrics_follow_last_active_caption() {
        let (mut sync, _) = setup();
        let caption = |text: &str, start: f64| {
            TrackCue::Lyric(LyricCue {
                text: text.to_string(),
                start_time: start,
                end_time: 10.0,
            })
        };

        sync.handle_change(&TrackChange {
            track: 0,
            kind: TrackKind::Lyric {
                label: "English".to_string(),
            },
            active: vec![caption("first", 0.0), caption("line one\nline two", 1.0)],
        });
        assert_eq!(*sync.lyrics().lines(), vec!["line one", "line two"]);

        sync.handle_change(&TrackChange {
            track: 0,
            kind: TrackKind::Lyric {
                label: "English".to_string(),
            },
            active: vec![],
        });
        assert!(sync.lyrics().lines().is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let (mut sync, _) = setup();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let id = sync.subscribe(Zone::from("left"), move |_, _| *sink.lock() += 1);

        sync.handle_change(&change(1, "left", vec![lighting("red", 0.0, 1.0)]));
        assert!(sync.unsubscribe(id));
        assert!(!sync.unsubscribe(id));
        sync.handle_change(&change(1, "left", vec![lighting("blue", 0.0, 1.0)]));

        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_loading_tracks_register_once_on_ready_signal() {
        let mut engine = TrackEngine::new(vec![
            CueTrack::metadata(Zone::from("left"), Vec::new()),
            CueTrack::pending(TrackKind::Metadata {
                zone: Zone::from("right"),
            }),
            CueTrack::metadata(Zone::from("left"), Vec::new()),
        ]);
        let zone_colors = Arc::new(ZoneColorState::new(engine.zones(), DEFAULT_FALLBACK_COLOR));
        let mut sync = CueSync::new(zone_colors, Arc::new(LyricState::new()));

        // The duplicate left track is refused.
        assert_eq!(sync.attach(&engine), 1);
        assert_eq!(sync.attach(&engine), 0);
        assert!(!sync.is_registered(&Zone::from("right")));

        // Changes for the unregistered track are dropped.
        sync.handle_change(&change(1, "right", vec![lighting("red", 0.0, 1.0)]));
        assert_eq!(
            sync.zone_colors().get(&Zone::from("right")).color,
            DEFAULT_FALLBACK_COLOR
        );

        engine.load_track(1, Vec::new()).unwrap();
        assert!(engine.take_ready_signal());
        assert_eq!(sync.tracks_ready(&engine), 1);
        assert_eq!(sync.tracks_ready(&engine), 0);
        assert_eq!(sync.phase(), SyncPhase::Ready);

        sync.handle_change(&change(1, "right", vec![lighting("red", 0.0, 1.0)]));
        assert_eq!(sync.zone_colors().get(&Zone::from("right")).color, "red");
    }
}

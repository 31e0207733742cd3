use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::color::Rgba;
use crate::cue::cue::{CueValue, Zone};

/// Current cue value per declared zone.
///
/// Every declared zone always has an entry; zones without an active cue hold
/// the fallback value. Values are swapped as whole `Arc`s under one lock, so a
/// reader sees either the previous value or the new one.
pub struct ZoneColorState {
    zones: Vec<Zone>,
    fallback: Arc<CueValue>,
    fallback_rgba: Rgba,
    entries: Mutex<HashMap<Zone, Arc<CueValue>>>,
}

impl ZoneColorState {
    pub fn new(zones: impl IntoIterator<Item = Zone>, fallback_color: &str) -> Self {
        let fallback = Arc::new(CueValue::with_color(fallback_color));
        let fallback_rgba = Rgba::parse(fallback_color).unwrap_or(Rgba::WHITE);

        let mut declared = Vec::new();
        let mut entries = HashMap::new();
        for zone in zones {
            if entries.contains_key(&zone) {
                continue;
            }
            entries.insert(zone.clone(), Arc::clone(&fallback));
            declared.push(zone);
        }

        Self {
            zones: declared,
            fallback,
            fallback_rgba,
            entries: Mutex::new(entries),
        }
    }

    /// Declared zones in declaration order.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn fallback(&self) -> Arc<CueValue> {
        Arc::clone(&self.fallback)
    }

    pub fn fallback_color(&self) -> Rgba {
        self.fallback_rgba
    }

    pub fn get(&self, zone: &Zone) -> Arc<CueValue> {
        self.entries
            .lock()
            .get(zone)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Parsed color of the zone's current value.
    pub fn color(&self, zone: &Zone) -> Rgba {
        self.get(zone).rgba_or(self.fallback_rgba)
    }

    /// Replaces the zone's value. Returns `false` when the zone is not
    /// declared or the value is unchanged.
    pub fn set(&self, zone: &Zone, value: CueValue) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(zone) {
            Some(current) if **current == value => false,
            Some(current) => {
                *current = Arc::new(value);
                true
            }
            None => {
                log::warn!("Ignoring cue value for undeclared zone {}", zone);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::cue::DEFAULT_FALLBACK_COLOR;

    fn state() -> ZoneColorState {
        ZoneColorState::new(
            vec![Zone::from("left"), Zone::from("right"), Zone::from("left")],
            DEFAULT_FALLBACK_COLOR,
        )
    }

    #[test]
    fn test_every_zone_starts_at_fallback() {
        let state = state();
        assert_eq!(state.zones(), &[Zone::from("left"), Zone::from("right")]);
        for zone in state.zones() {
            assert_eq!(state.get(zone).color, DEFAULT_FALLBACK_COLOR);
        }
        assert_eq!(state.color(&Zone::from("left")), Rgba::rgb(129, 140, 248));
    }

    #[test]
    fn test_unknown_zone_reads_fallback_and_rejects_writes() {
        let state = state();
        let center = Zone::from("center");
        assert_eq!(state.get(&center).color, DEFAULT_FALLBACK_COLOR);
        assert!(!state.set(&center, CueValue::with_color("red")));
        assert_eq!(state.zones().len(), 2);
    }

    #[test]
    fn test_set_is_last_write_wins_and_reports_changes() {
        let state = state();
        let left = Zone::from("left");

        assert!(state.set(&left, CueValue::with_color("red")));
        assert!(!state.set(&left, CueValue::with_color("red")));
        assert!(state.set(&left, CueValue::with_color("blue")));
        assert_eq!(state.get(&left).color, "blue");
        assert_eq!(state.get(&Zone::from("right")).color, DEFAULT_FALLBACK_COLOR);

        assert!(state.set(&left, state.fallback().as_ref().clone()));
        assert_eq!(state.get(&left).color, DEFAULT_FALLBACK_COLOR);
    }

    #[test]
    fn test_unparseable_color_reads_as_fallback_rgba() {
        let state = state();
        let left = Zone::from("left");
        state.set(&left, CueValue::with_color("sparkly"));
        assert_eq!(state.color(&left), Rgba::rgb(129, 140, 248));
    }

    #[test]
    fn test_readers_hold_their_snapshot_across_writes() {
        let state = state();
        let left = Zone::from("left");
        state.set(&left, CueValue::with_color("red"));

        let held = state.get(&left);
        state.set(&left, CueValue::with_color("green"));

        assert_eq!(held.color, "red");
        assert_eq!(state.get(&left).color, "green");
    }
}

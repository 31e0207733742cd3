use std::path::PathBuf;

use cuelight_fixtures::PatchedFixture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::MediaBuffer;
use crate::cue::cue::Zone;
use crate::cue::track::{zones_of, CueTrack};

/// On-disk description of a show.
///
/// ```json
/// {
///   "title": "Opening",
///   "media": "opening.mp3",
///   "tracks": [
///     { "kind": "subtitles", "label": "English", "src": "lyrics.json" },
///     { "kind": "metadata", "for": "left", "cues": [ ... ] }
///   ],
///   "fixtures": [
///     { "name": "Left PAR", "zone": "left", "profile": "generic-drgb", "address": 1 }
///   ]
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShowFile {
    pub title: String,
    /// Relative paths resolve against the show file's directory.
    pub media: PathBuf,
    #[serde(default)]
    pub fallback_color: Option<String>,
    #[serde(default)]
    pub tracks: Vec<TrackEntry>,
    #[serde(default)]
    pub fixtures: Vec<FixtureEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackEntryKind {
    Subtitles,
    Metadata,
}

/// A text track: cues are given inline or in a sibling JSON file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackEntry {
    pub kind: TrackEntryKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "for", default)]
    pub zone: Option<Zone>,
    #[serde(default)]
    pub cues: Option<Vec<Value>>,
    #[serde(default)]
    pub src: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureEntry {
    pub name: String,
    pub zone: String,
    pub profile: String,
    /// Defaults to the configured Art-Net universe.
    #[serde(default)]
    pub universe: Option<u8>,
    pub address: u16,
}

/// A show with its media decoded and every track loaded.
#[derive(Clone, Debug)]
pub struct Show {
    pub title: String,
    pub media_path: PathBuf,
    pub media: MediaBuffer,
    pub fallback_color: Option<String>,
    pub tracks: Vec<CueTrack>,
    pub fixtures: Vec<PatchedFixture>,
}

impl Show {
    /// Metadata zones in declaration order.
    pub fn zones(&self) -> Vec<Zone> {
        zones_of(&self.tracks)
    }
}

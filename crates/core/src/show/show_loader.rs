use std::path::{Path, PathBuf};

use cuelight_fixtures::{FixtureLibrary, PatchedFixture};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;

use super::show::{FixtureEntry, Show, ShowFile, TrackEntry, TrackEntryKind};
use crate::audio::{MediaBuffer, MediaError};
use crate::cue::cue::{LyricCue, MetadataCue};
use crate::cue::track::CueTrack;

#[derive(Debug, Error)]
pub enum ShowError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid track {index}: {reason}")]
    InvalidTrack { index: usize, reason: String },

    #[error("Failed to load media {}: {source}", path.display())]
    Media {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("Invalid fixture patch: {0}")]
    Fixture(String),

    #[error("Show loading task failed: {0}")]
    Task(String),
}

/// Reads a show file, its cue files and its media.
///
/// Cue files and media decoding run concurrently; the returned [`Show`] has
/// every track loaded.
pub struct ShowLoader {
    default_universe: u8,
    media_override: Option<PathBuf>,
    library: FixtureLibrary,
}

impl ShowLoader {
    pub fn new(default_universe: u8) -> Self {
        Self {
            default_universe,
            media_override: None,
            library: FixtureLibrary::new(),
        }
    }

    /// Decode `path` instead of the media named by the show file.
    pub fn with_media_override(mut self, path: Option<PathBuf>) -> Self {
        self.media_override = path;
        self
    }

    pub async fn load(&self, path: impl AsRef<Path>) -> Result<Show, ShowError> {
        let path = path.as_ref();
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ShowError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file: ShowFile = serde_json::from_str(&content).map_err(|source| ShowError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!(
            "Loading show '{}' with {} track(s)",
            file.title,
            file.tracks.len()
        );

        let media_path = match &self.media_override {
            Some(path) => path.clone(),
            None => base_dir.join(&file.media),
        };
        let decode_path = media_path.clone();
        let media_task = tokio::task::spawn_blocking(move || MediaBuffer::decode(decode_path));

        let mut cue_values: Vec<Option<Vec<Value>>> = vec![None; file.tracks.len()];
        let mut pending = JoinSet::new();

        for (index, entry) in file.tracks.iter().enumerate() {
            validate_entry(index, entry)?;
            match (&entry.cues, &entry.src) {
                (Some(cues), None) => cue_values[index] = Some(cues.clone()),
                (None, Some(src)) => {
                    let src_path = base_dir.join(src);
                    pending.spawn(async move { (index, read_cue_file(src_path).await) });
                }
                _ => {
                    return Err(ShowError::InvalidTrack {
                        index,
                        reason: "exactly one of `cues` or `src` is required".to_string(),
                    })
                }
            }
        }

        while let Some(joined) = pending.join_next().await {
            let (index, result) = joined.map_err(|e| ShowError::Task(e.to_string()))?;
            cue_values[index] = Some(result?);
        }

        let mut tracks = Vec::with_capacity(file.tracks.len());
        for (index, (entry, values)) in file.tracks.iter().zip(cue_values).enumerate() {
            let values = values.unwrap_or_default();
            tracks.push(build_track(index, entry, values)?);
        }

        let media = media_task
            .await
            .map_err(|e| ShowError::Task(e.to_string()))?
            .map_err(|source| ShowError::Media {
                path: media_path.clone(),
                source,
            })?;
        log::info!(
            "Decoded {} ({:.1}s, {} Hz, {} channel(s))",
            media_path.display(),
            media.duration_seconds(),
            media.sample_rate(),
            media.channels()
        );

        let fixtures = file
            .fixtures
            .iter()
            .map(|entry| self.patch(entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Show {
            title: file.title,
            media_path,
            media,
            fallback_color: file.fallback_color,
            tracks,
            fixtures,
        })
    }

    fn patch(&self, entry: &FixtureEntry) -> Result<PatchedFixture, ShowError> {
        self.library
            .patch(
                &entry.name,
                &entry.zone,
                &entry.profile,
                entry.universe.unwrap_or(self.default_universe),
                entry.address,
            )
            .map_err(ShowError::Fixture)
    }
}

impl Default for ShowLoader {
    fn default() -> Self {
        Self::new(1)
    }
}

fn validate_entry(index: usize, entry: &TrackEntry) -> Result<(), ShowError> {
    if entry.kind == TrackEntryKind::Metadata && entry.zone.is_none() {
        return Err(ShowError::InvalidTrack {
            index,
            reason: "metadata track is missing `for`".to_string(),
        });
    }
    Ok(())
}

async fn read_cue_file(path: PathBuf) -> Result<Vec<Value>, ShowError> {
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ShowError::Io {
            path: path.clone(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| ShowError::Parse { path, source })
}

fn build_track(index: usize, entry: &TrackEntry, values: Vec<Value>) -> Result<CueTrack, ShowError> {
    match (&entry.kind, &entry.zone) {
        (TrackEntryKind::Subtitles, _) => {
            let cues = parse_cues::<LyricCue>(index, values);
            let label = entry.label.clone().unwrap_or_else(|| "lyrics".to_string());
            Ok(CueTrack::lyric(label, cues))
        }
        (TrackEntryKind::Metadata, Some(zone)) => {
            let cues = parse_cues::<MetadataCue>(index, values);
            log::debug!("Track {} drives zone {} with {} cue(s)", index, zone, cues.len());
            Ok(CueTrack::metadata(zone.clone(), cues))
        }
        (TrackEntryKind::Metadata, None) => Err(ShowError::InvalidTrack {
            index,
            reason: "metadata track is missing `for`".to_string(),
        }),
    }
}

/// Malformed cues are dropped one by one; the rest of the track still plays.
fn parse_cues<T: DeserializeOwned>(index: usize, values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(position, value)| match serde_json::from_value::<T>(value) {
            Ok(cue) => Some(cue),
            Err(e) => {
                log::warn!("Skipping cue {} of track {}: {}", position, index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::cue::cue::{Zone, LIGHTING_CUE_TYPE};

    /// Writes a 16-bit PCM mono WAV file.
    pub(crate) fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        fs::write(path, bytes).unwrap();
    }

    fn write_show(dir: &TempDir, show: Value) -> PathBuf {
        let path = dir.path().join("show.json");
        fs::write(&path, serde_json::to_string_pretty(&show).unwrap()).unwrap();
        path
    }

    fn tone(len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect()
    }

    #[tokio::test]
    async fn test_load_show_with_inline_and_sibling_cues() {
        let dir = TempDir::new().unwrap();
        write_wav(&dir.path().join("song.wav"), &tone(4410), 44100);
        fs::write(
            dir.path().join("lyrics.json"),
            json!([
                { "text": "line one\nline two", "start": 0.0, "end": 1.0 },
            ])
            .to_string(),
        )
        .unwrap();

        let path = write_show(
            &dir,
            json!({
                "title": "Opening",
                "media": "song.wav",
                "tracks": [
                    { "kind": "subtitles", "label": "English", "src": "lyrics.json" },
                    { "kind": "metadata", "for": "left", "cues": [
                        { "type": LIGHTING_CUE_TYPE, "value": { "color": "red" }, "start": 0.0, "end": 2.0 },
                    ]},
                    { "kind": "metadata", "for": "right", "cues": [] },
                ],
                "fixtures": [
                    { "name": "Left PAR", "zone": "left", "profile": "generic-drgb", "address": 1 },
                    { "name": "Right PAR", "zone": "right", "profile": "generic-drgb", "universe": 2, "address": 1 },
                ],
            }),
        );

        let show = ShowLoader::new(3).load(&path).await.unwrap();

        assert_eq!(show.title, "Opening");
        assert_eq!(show.tracks.len(), 3);
        assert!(show.tracks.iter().all(CueTrack::is_ready));
        assert_eq!(show.zones(), vec![Zone::from("left"), Zone::from("right")]);
        assert_eq!(show.tracks[0].cues().len(), 1);
        assert_eq!(show.fixtures[0].universe, 3);
        assert_eq!(show.fixtures[1].universe, 2);
        assert_eq!(show.media.sample_rate(), 44100);
        assert!((show.media.duration_seconds() - 0.1).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_metadata_track_requires_zone() {
        let dir = TempDir::new().unwrap();
        write_wav(&dir.path().join("song.wav"), &tone(100), 8000);
        let path = write_show(
            &dir,
            json!({
                "title": "Broken",
                "media": "song.wav",
                "tracks": [{ "kind": "metadata", "cues": [] }],
            }),
        );

        let result = ShowLoader::default().load(&path).await;
        assert!(matches!(result, Err(ShowError::InvalidTrack { index: 0, .. })));
    }

    #[tokio::test]
    async fn test_track_needs_exactly_one_source() {
        let dir = TempDir::new().unwrap();
        write_wav(&dir.path().join("song.wav"), &tone(100), 8000);
        let path = write_show(
            &dir,
            json!({
                "title": "Broken",
                "media": "song.wav",
                "tracks": [{ "kind": "subtitles", "cues": [], "src": "lyrics.json" }],
            }),
        );

        let result = ShowLoader::default().load(&path).await;
        assert!(matches!(result, Err(ShowError::InvalidTrack { index: 0, .. })));
    }

    #[tokio::test]
    async fn test_missing_cue_file_and_media() {
        let dir = TempDir::new().unwrap();
        let path = write_show(
            &dir,
            json!({
                "title": "Missing",
                "media": "song.wav",
                "tracks": [{ "kind": "subtitles", "src": "missing.json" }],
            }),
        );
        let result = ShowLoader::default().load(&path).await;
        assert!(matches!(result, Err(ShowError::Io { .. })));

        let path = write_show(&dir, json!({ "title": "No media", "media": "song.wav" }));
        let result = ShowLoader::default().load(&path).await;
        assert!(matches!(result, Err(ShowError::Media { .. })));
    }

    #[tokio::test]
    async fn test_unknown_fixture_profile() {
        let dir = TempDir::new().unwrap();
        write_wav(&dir.path().join("song.wav"), &tone(100), 8000);
        let path = write_show(
            &dir,
            json!({
                "title": "Rig",
                "media": "song.wav",
                "fixtures": [{ "name": "Mystery", "zone": "left", "profile": "nope", "address": 1 }],
            }),
        );

        let result = ShowLoader::default().load(&path).await;
        assert!(matches!(result, Err(ShowError::Fixture(_))));
    }

    #[tokio::test]
    async fn test_malformed_cue_is_skipped() {
        let dir = TempDir::new().unwrap();
        write_wav(&dir.path().join("song.wav"), &tone(100), 8000);
        let path = write_show(
            &dir,
            json!({
                "title": "Patchy",
                "media": "song.wav",
                "tracks": [
                    { "kind": "metadata", "for": "left", "cues": [
                        { "type": LIGHTING_CUE_TYPE, "value": { "color": "red" }, "start": 0.0, "end": 1.0 },
                        { "value": { "color": "blue" }, "start": 1.0, "end": 2.0 },
                        { "type": LIGHTING_CUE_TYPE, "value": { "color": "green" }, "start": 2.0, "end": 3.0 },
                    ]},
                    { "kind": "subtitles", "cues": [
                        { "start": 0.0, "end": 1.0 },
                        { "text": "still here", "start": 1.0, "end": 2.0 },
                    ]},
                ],
            }),
        );

        let show = ShowLoader::default().load(&path).await.unwrap();

        assert_eq!(show.tracks[0].cues().len(), 2);
        assert_eq!(show.tracks[1].cues().len(), 1);
    }

    #[tokio::test]
    async fn test_media_override_replaces_show_media() {
        let dir = TempDir::new().unwrap();
        let override_path = dir.path().join("other.wav");
        write_wav(&override_path, &tone(800), 8000);
        // The show's own media does not exist.
        let path = write_show(&dir, json!({ "title": "Swap", "media": "song.wav" }));

        let show = ShowLoader::default()
            .with_media_override(Some(override_path.clone()))
            .load(&path)
            .await
            .unwrap();

        assert_eq!(show.media_path, override_path);
        assert!((show.media.duration_seconds() - 0.1).abs() < 0.01);
    }
}

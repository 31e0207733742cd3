use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::color::Rgba;

/// Discriminator carried by lighting cues on metadata tracks.
pub const LIGHTING_CUE_TYPE: &str = "org.webvmt.example.lighting";

/// Color applied to a zone while none of its cues is active (Indigo-300).
pub const DEFAULT_FALLBACK_COLOR: &str = "rgb(129, 140, 248)";

/// Identifier of an independent lighting / visual channel, e.g. `left`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(String);

impl Zone {
    pub fn new(name: impl Into<String>) -> Self {
        Zone(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Zone {
    fn from(name: &str) -> Self {
        Zone::new(name)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured payload of a lighting cue.
///
/// Only `color` is interpreted by the renderers. Every other field (intensity,
/// pattern id, ...) is carried verbatim to the fixture bridge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CueValue {
    pub color: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CueValue {
    pub fn with_color(color: impl Into<String>) -> Self {
        CueValue {
            color: color.into(),
            fields: Map::new(),
        }
    }

    /// Reads a cue payload, rejecting anything without a string `color`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let color = object.get("color")?.as_str()?.to_string();
        let fields = object
            .iter()
            .filter(|(key, _)| key.as_str() != "color")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(CueValue { color, fields })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Parsed color, or `fallback` when the string is not a CSS color.
    pub fn rgba_or(&self, fallback: Rgba) -> Rgba {
        Rgba::parse(&self.color).unwrap_or(fallback)
    }

    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("color".to_string(), Value::String(self.color.clone()));
        Value::Object(object)
    }
}

/// A timed cue on a metadata track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataCue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
    #[serde(rename = "start")]
    pub start_time: f64,
    #[serde(rename = "end")]
    pub end_time: f64,
}

impl MetadataCue {
    pub fn lighting(value: CueValue, start_time: f64, end_time: f64) -> Self {
        MetadataCue {
            kind: LIGHTING_CUE_TYPE.to_string(),
            value: value.to_json(),
            start_time,
            end_time,
        }
    }

    pub fn is_lighting(&self) -> bool {
        self.kind == LIGHTING_CUE_TYPE
    }

    /// The cue's value when it is a well-formed lighting cue.
    pub fn lighting_value(&self) -> Option<CueValue> {
        if !self.is_lighting() {
            return None;
        }
        CueValue::from_json(&self.value)
    }
}

/// A timed caption on the lyric track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LyricCue {
    pub text: String,
    #[serde(rename = "start")]
    pub start_time: f64,
    #[serde(rename = "end")]
    pub end_time: f64,
}

impl LyricCue {
    pub fn lines(&self) -> Vec<String> {
        self.text
            .split('\n')
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrackCue {
    Metadata(MetadataCue),
    Lyric(LyricCue),
}

impl TrackCue {
    pub fn start_time(&self) -> f64 {
        match self {
            TrackCue::Metadata(cue) => cue.start_time,
            TrackCue::Lyric(cue) => cue.start_time,
        }
    }

    pub fn end_time(&self) -> f64 {
        match self {
            TrackCue::Metadata(cue) => cue.end_time,
            TrackCue::Lyric(cue) => cue.end_time,
        }
    }

    pub fn is_active_at(&self, seconds: f64) -> bool {
        self.start_time() <= seconds && seconds < self.end_time()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_cue_value_keeps_extra_fields() {
        let value = CueValue::from_json(&json!({
            "color": "rgb(255, 0, 0)",
            "intensity": 0.5,
            "pattern": 3,
        }))
        .unwrap();

        assert_eq!(value.color, "rgb(255, 0, 0)");
        assert_eq!(value.field("intensity"), Some(&json!(0.5)));
        assert_eq!(value.field("pattern"), Some(&json!(3)));
        assert!(value.field("color").is_none());
        assert_eq!(value.to_json()["color"], json!("rgb(255, 0, 0)"));
    }

    #[test]
    fn test_cue_value_requires_string_color() {
        assert!(CueValue::from_json(&json!({ "intensity": 1 })).is_none());
        assert!(CueValue::from_json(&json!({ "color": 12 })).is_none());
        assert!(CueValue::from_json(&json!("red")).is_none());
    }

    #[test]
    fn test_lighting_value_checks_discriminator() {
        let cue = MetadataCue {
            kind: "org.webvmt.example.path".to_string(),
            value: json!({ "color": "red" }),
            start_time: 0.0,
            end_time: 1.0,
        };
        assert!(cue.lighting_value().is_none());

        let cue = MetadataCue::lighting(CueValue::with_color("red"), 0.0, 1.0);
        assert_eq!(cue.lighting_value(), Some(CueValue::with_color("red")));
    }

    #[test]
    fn test_metadata_cue_deserializes_from_show_format() {
        let cue: MetadataCue = serde_json::from_value(json!({
            "type": LIGHTING_CUE_TYPE,
            "value": { "color": "#ff0000", "intensity": 200 },
            "start": 1.5,
            "end": 3.0,
        }))
        .unwrap();

        assert!(cue.is_lighting());
        assert_eq!(cue.start_time, 1.5);
        assert_eq!(cue.lighting_value().unwrap().field("intensity"), Some(&json!(200)));
    }

    #[test]
    fn test_lyric_lines_split_on_newlines() {
        let cue = LyricCue {
            text: "line one\r\nline two".to_string(),
            start_time: 0.0,
            end_time: 1.0,
        };
        assert_eq!(cue.lines(), vec!["line one", "line two"]);
    }

    #[test]
    fn test_active_interval_is_half_open() {
        let cue = TrackCue::Lyric(LyricCue {
            text: String::new(),
            start_time: 1.0,
            end_time: 2.0,
        });
        assert!(!cue.is_active_at(0.99));
        assert!(cue.is_active_at(1.0));
        assert!(!cue.is_active_at(2.0));
    }
}

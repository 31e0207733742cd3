use cuelight_fixtures::{ChannelType, PatchedFixture};
use serde_json::Value;

use crate::color::Rgba;
use crate::cue::cue::{CueValue, Zone};

/// Zone name carried by [`DmxPayload::blackout`].
pub const BLACKOUT_ZONE: &str = "*";

/// One DMX channel write. Addresses are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmxChannel {
    pub universe: u8,
    pub address: u16,
    pub value: u8,
}

/// Device payload for one zone's cue value.
#[derive(Clone, Debug, PartialEq)]
pub struct DmxPayload {
    pub zone: Zone,
    pub value: CueValue,
    pub channels: Vec<DmxChannel>,
}

impl DmxPayload {
    /// Maps `value` onto every fixture patched to `zone`.
    ///
    /// `color` drives red / green / blue (and white as their minimum),
    /// `intensity` or `dimmer` drives the dimmer, `strobe` the strobe channel,
    /// and any other numeric field is written to the channel of the same name.
    pub fn build(
        zone: &Zone,
        value: &CueValue,
        fixtures: &[PatchedFixture],
        fallback: Rgba,
    ) -> Self {
        let color = value.rgba_or(fallback);
        let level = value
            .field("intensity")
            .or_else(|| value.field("dimmer"))
            .and_then(level_byte)
            .unwrap_or(255);
        let strobe = value.field("strobe").and_then(channel_byte);

        let mut channels = Vec::new();
        for fixture in fixtures.iter().filter(|f| f.zone == zone.as_str()) {
            let mut write = |address: Option<u16>, byte: u8| {
                if let Some(address) = address {
                    channels.push(DmxChannel {
                        universe: fixture.universe,
                        address,
                        value: byte,
                    });
                }
            };

            let has_dimmer = fixture.address_of(&ChannelType::Dimmer).is_some();
            let scale = |c: u8| {
                if has_dimmer {
                    c
                } else {
                    (c as u16 * level as u16 / 255) as u8
                }
            };
            let (r, g, b) = (scale(color.r), scale(color.g), scale(color.b));

            write(fixture.address_of(&ChannelType::Dimmer), level);
            write(fixture.address_of(&ChannelType::Red), r);
            write(fixture.address_of(&ChannelType::Green), g);
            write(fixture.address_of(&ChannelType::Blue), b);
            write(fixture.address_of(&ChannelType::White), r.min(g).min(b));
            if let Some(strobe) = strobe {
                write(fixture.address_of(&ChannelType::Strobe), strobe);
            }

            for (name, field) in value.fields.iter() {
                if matches!(name.as_str(), "intensity" | "dimmer" | "strobe") {
                    continue;
                }
                if let Some(byte) = channel_byte(field) {
                    write(fixture.address_of_named(name), byte);
                }
            }
        }

        Self {
            zone: zone.clone(),
            value: value.clone(),
            channels,
        }
    }

    /// Zero on every channel of every fixture, across all zones.
    pub fn blackout(fixtures: &[PatchedFixture]) -> Self {
        let channels = fixtures
            .iter()
            .flat_map(|fixture| {
                fixture.addresses().map(move |address| DmxChannel {
                    universe: fixture.universe,
                    address,
                    value: 0,
                })
            })
            .collect();

        Self {
            zone: Zone::new(BLACKOUT_ZONE),
            value: CueValue::with_color("black"),
            channels,
        }
    }
}

/// `0.0..=1.0` floats scale to a byte, integers pass through clamped.
fn level_byte(value: &Value) -> Option<u8> {
    if value.is_f64() {
        let v = value.as_f64()?;
        return Some((v.clamp(0.0, 1.0) * 255.0).round() as u8);
    }
    channel_byte(value)
}

fn channel_byte(value: &Value) -> Option<u8> {
    if let Some(v) = value.as_i64() {
        return Some(v.clamp(0, 255) as u8);
    }
    value.as_f64().map(|v| v.clamp(0.0, 255.0).round() as u8)
}

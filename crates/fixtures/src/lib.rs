use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A fixture patched onto a universe and bound to one zone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatchedFixture {
    pub name: String,
    pub zone: String,
    pub profile: FixtureProfile,
    pub universe: u8,
    pub start_address: u16,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FixtureType {
    PAR,
    Wash,
    LEDBar,
    Pinspot,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureProfile {
    pub id: String,
    pub fixture_type: FixtureType,
    pub manufacturer: String,
    pub model: String,
    pub channel_layout: Vec<Channel>,
}

impl std::fmt::Display for FixtureProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.manufacturer, self.model)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub channel_type: ChannelType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ChannelType {
    Dimmer,
    Red,
    Green,
    Blue,
    White,
    Amber,
    UV,
    Strobe,
    Other(String),
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChannelType::Dimmer => write!(f, "Dimmer"),
            ChannelType::Red => write!(f, "Red"),
            ChannelType::Green => write!(f, "Green"),
            ChannelType::Blue => write!(f, "Blue"),
            ChannelType::White => write!(f, "White"),
            ChannelType::Amber => write!(f, "Amber"),
            ChannelType::UV => write!(f, "UV"),
            ChannelType::Strobe => write!(f, "Strobe"),
            ChannelType::Other(s) => write!(f, "Other({})", s),
        }
    }
}

#[macro_export]
macro_rules! channel_layout {
    ($(($name:expr, $type:expr)),* $(,)?) => {
        vec![
            $(
                $crate::Channel {
                    name: $name.to_string(),
                    channel_type: $type,
                },
            )*
        ]
    };
}

pub struct FixtureLibrary {
    pub profiles: HashMap<String, FixtureProfile>,
}

impl FixtureLibrary {
    pub fn new() -> Self {
        let mut profiles = HashMap::new();

        // Built-in profiles. Layouts follow each fixture's DMX chart in its default mode.
        profiles.insert(
            "generic-rgb".to_string(),
            FixtureProfile {
                id: "generic-rgb".to_string(),
                fixture_type: FixtureType::LEDBar,
                manufacturer: "Generic".to_string(),
                model: "RGB 3ch".to_string(),
                channel_layout: channel_layout![
                    ("Red", ChannelType::Red),
                    ("Green", ChannelType::Green),
                    ("Blue", ChannelType::Blue),
                ],
            },
        );

        profiles.insert(
            "generic-drgb".to_string(),
            FixtureProfile {
                id: "generic-drgb".to_string(),
                fixture_type: FixtureType::PAR,
                manufacturer: "Generic".to_string(),
                model: "Dimmer + RGB 4ch".to_string(),
                channel_layout: channel_layout![
                    ("Dimmer", ChannelType::Dimmer),
                    ("Red", ChannelType::Red),
                    ("Green", ChannelType::Green),
                    ("Blue", ChannelType::Blue),
                ],
            },
        );

        profiles.insert(
            "shehds-rgbw-par".to_string(),
            FixtureProfile {
                id: "shehds-rgbw-par".to_string(),
                fixture_type: FixtureType::PAR,
                manufacturer: "Shehds".to_string(),
                model: "LED Flat PAR 12x3W RGBW".to_string(),
                channel_layout: channel_layout![
                    ("Dimmer", ChannelType::Dimmer),
                    ("Red", ChannelType::Red),
                    ("Green", ChannelType::Green),
                    ("Blue", ChannelType::Blue),
                    ("White", ChannelType::White),
                    ("Strobe", ChannelType::Strobe),
                    ("Program", ChannelType::Other("Program".to_string())),
                    ("Function", ChannelType::Other("Function".to_string())),
                ],
            },
        );

        profiles.insert(
            "shehds-led-wash-rgbwa-uv".to_string(),
            FixtureProfile {
                id: "shehds-led-wash-rgbwa-uv".to_string(),
                fixture_type: FixtureType::Wash,
                manufacturer: "Shehds".to_string(),
                model: "LED Wash 7x18W RGBWA+UV".to_string(),
                channel_layout: channel_layout![
                    ("Dimmer", ChannelType::Dimmer),
                    ("Red", ChannelType::Red),
                    ("Green", ChannelType::Green),
                    ("Blue", ChannelType::Blue),
                    ("White", ChannelType::White),
                    ("Amber", ChannelType::Amber),
                    ("UV", ChannelType::UV),
                    ("Strobe", ChannelType::Strobe),
                ],
            },
        );

        profiles.insert(
            "shehds-mini-led-pinspot-10w".to_string(),
            FixtureProfile {
                id: "shehds-mini-led-pinspot-10w".to_string(),
                fixture_type: FixtureType::Pinspot,
                manufacturer: "Shehds".to_string(),
                model: "Mini LED Pinspot 10W".to_string(),
                channel_layout: channel_layout![
                    ("Red", ChannelType::Red),
                    ("Green", ChannelType::Green),
                    ("Blue", ChannelType::Blue),
                    ("White", ChannelType::White),
                    ("Dimmer", ChannelType::Dimmer),
                    ("Strobe", ChannelType::Strobe),
                ],
            },
        );

        FixtureLibrary { profiles }
    }

    pub fn get(&self, profile_id: &str) -> Option<&FixtureProfile> {
        self.profiles.get(profile_id)
    }

    /// Patch a fixture from a library profile onto a zone.
    pub fn patch(
        &self,
        name: &str,
        zone: &str,
        profile_id: &str,
        universe: u8,
        start_address: u16,
    ) -> Result<PatchedFixture, String> {
        let profile = self
            .get(profile_id)
            .ok_or_else(|| format!("Profile {} not found", profile_id))?;

        let last_address = start_address as usize + profile.channel_layout.len() - 1;
        if start_address == 0 || last_address > 512 {
            return Err(format!(
                "Fixture {} does not fit in universe {} at address {}",
                name, universe, start_address
            ));
        }

        Ok(PatchedFixture {
            name: name.to_string(),
            zone: zone.to_string(),
            profile: profile.clone(),
            universe,
            start_address,
        })
    }
}

impl Default for FixtureLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchedFixture {
    /// DMX address (1-based) of the first channel of the given type.
    pub fn address_of(&self, channel_type: &ChannelType) -> Option<u16> {
        self.profile
            .channel_layout
            .iter()
            .position(|c| &c.channel_type == channel_type)
            .map(|offset| self.start_address + offset as u16)
    }

    /// DMX address of the channel whose name matches, ignoring case.
    pub fn address_of_named(&self, channel_name: &str) -> Option<u16> {
        self.profile
            .channel_layout
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(channel_name))
            .map(|offset| self.start_address + offset as u16)
    }

    /// Every address occupied by this fixture.
    pub fn addresses(&self) -> std::ops::Range<u16> {
        self.start_address..self.start_address + self.profile.channel_layout.len() as u16
    }
}

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Rgba;
use crate::Settings;

/// Configuration manager for cuelight settings
/// Keeps the schema (defaults, valid ranges, descriptions) separate from the persisted values.
/// Configuration is stored in config.json in the working directory by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub general: GeneralConfigSchema,
    pub render: RenderConfigSchema,
    pub analysis: AnalysisConfigSchema,
    pub audio: AudioConfigSchema,
    pub output: OutputConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfigSchema {
    pub target_fps: ConfigOption<u32>,
    pub fallback_color: ConfigOption<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfigSchema {
    pub waveform_line_width: ConfigOption<f32>,
    pub particles_per_cluster: ConfigOption<usize>,
    pub cluster_count: ConfigOption<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfigSchema {
    pub fft_size: ConfigOption<usize>,
    pub smoothing_time_constant: ConfigOption<f32>,
    pub min_decibels: ConfigOption<f32>,
    pub max_decibels: ConfigOption<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfigSchema {
    pub volume: ConfigOption<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigSchema {
    pub artnet_enabled: ConfigOption<bool>,
    pub artnet_broadcast: ConfigOption<bool>,
    pub artnet_dest_ip: ConfigOption<String>,
    pub artnet_port: ConfigOption<u16>,
    pub artnet_universe: ConfigOption<u8>,
    pub connect_fixtures_on_start: ConfigOption<bool>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

impl<T: PartialOrd + Copy + std::fmt::Display> ConfigOption<T> {
    fn check_range(&self, name: &str, value: T, errors: &mut Vec<String>) {
        if let Some((min, max)) = self.valid_range {
            if value < min || value > max {
                errors.push(format!("{} must be between {} and {}", name, min, max));
            }
        }
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'config.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from configuration file
    /// Writes the defaults to disk when the file doesn't exist yet
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.existing_created_at().unwrap_or_else(|| now.clone());

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    fn existing_created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        let existing: ConfigFile = serde_json::from_str(&content).ok()?;
        Some(existing.created_at)
    }

    /// Validate, update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();

        ConfigSchema {
            general: GeneralConfigSchema {
                target_fps: ConfigOption {
                    default: defaults.target_fps,
                    valid_range: Some((30, 120)),
                    valid_choices: None,
                    description: "Render loop rate in frames per second".to_string(),
                    requires_restart: true,
                },
                fallback_color: ConfigOption {
                    default: defaults.fallback_color,
                    valid_range: None,
                    valid_choices: None,
                    description: "CSS color shown on a zone while none of its cues is active"
                        .to_string(),
                    requires_restart: true,
                },
            },
            render: RenderConfigSchema {
                waveform_line_width: ConfigOption {
                    default: defaults.waveform_line_width,
                    valid_range: Some((1.0, 20.0)),
                    valid_choices: None,
                    description: "Waveform stroke width in pixels".to_string(),
                    requires_restart: false,
                },
                particles_per_cluster: ConfigOption {
                    default: defaults.particles_per_cluster,
                    valid_range: Some((1, 500)),
                    valid_choices: None,
                    description: "Particles around each cluster center".to_string(),
                    requires_restart: true,
                },
                cluster_count: ConfigOption {
                    default: defaults.cluster_count,
                    valid_range: Some((1, 16)),
                    valid_choices: None,
                    description: "Cluster centers per particle field".to_string(),
                    requires_restart: true,
                },
            },
            analysis: AnalysisConfigSchema {
                fft_size: ConfigOption {
                    default: defaults.fft_size,
                    valid_range: None,
                    valid_choices: Some((5..=15).map(|shift| 1usize << shift).collect()),
                    description: "Analysis window in samples; half of it is the bin count"
                        .to_string(),
                    requires_restart: true,
                },
                smoothing_time_constant: ConfigOption {
                    default: defaults.smoothing_time_constant,
                    valid_range: Some((0.0, 1.0)),
                    valid_choices: None,
                    description: "Weight of the previous spectrum frame".to_string(),
                    requires_restart: true,
                },
                min_decibels: ConfigOption {
                    default: defaults.min_decibels,
                    valid_range: Some((-200.0, 0.0)),
                    valid_choices: None,
                    description: "Level mapped to a zero-height bar".to_string(),
                    requires_restart: true,
                },
                max_decibels: ConfigOption {
                    default: defaults.max_decibels,
                    valid_range: Some((-200.0, 0.0)),
                    valid_choices: None,
                    description: "Level mapped to a full-height bar".to_string(),
                    requires_restart: true,
                },
            },
            audio: AudioConfigSchema {
                volume: ConfigOption {
                    default: defaults.volume,
                    valid_range: Some((0.0, 1.0)),
                    valid_choices: None,
                    description: "Playback volume".to_string(),
                    requires_restart: false,
                },
            },
            output: OutputConfigSchema {
                artnet_enabled: ConfigOption {
                    default: defaults.artnet_enabled,
                    valid_range: None,
                    valid_choices: None,
                    description: "Enable fixture output via Art-Net".to_string(),
                    requires_restart: true,
                },
                artnet_broadcast: ConfigOption {
                    default: defaults.artnet_broadcast,
                    valid_range: None,
                    valid_choices: None,
                    description: "Use broadcast mode for Art-Net (vs unicast)".to_string(),
                    requires_restart: true,
                },
                artnet_dest_ip: ConfigOption {
                    default: defaults.artnet_dest_ip,
                    valid_range: None,
                    valid_choices: None,
                    description: "Destination IP address for Art-Net unicast".to_string(),
                    requires_restart: true,
                },
                artnet_port: ConfigOption {
                    default: defaults.artnet_port,
                    valid_range: Some((1024, 65535)),
                    valid_choices: None,
                    description: "UDP port for Art-Net output".to_string(),
                    requires_restart: true,
                },
                artnet_universe: ConfigOption {
                    default: defaults.artnet_universe,
                    valid_range: Some((0, 255)),
                    valid_choices: None,
                    description: "Universe for fixtures patched without one".to_string(),
                    requires_restart: true,
                },
                connect_fixtures_on_start: ConfigOption {
                    default: defaults.connect_fixtures_on_start,
                    valid_range: None,
                    valid_choices: None,
                    description: "Connect to the fixtures as soon as the show starts".to_string(),
                    requires_restart: true,
                },
            },
        }
    }

    /// Validate settings against schema, reporting every violation
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        schema
            .general
            .target_fps
            .check_range("target_fps", settings.target_fps, &mut errors);
        if Rgba::parse(&settings.fallback_color).is_none() {
            errors.push(format!(
                "fallback_color {:?} is not a CSS color",
                settings.fallback_color
            ));
        }

        schema.render.waveform_line_width.check_range(
            "waveform_line_width",
            settings.waveform_line_width,
            &mut errors,
        );
        schema.render.particles_per_cluster.check_range(
            "particles_per_cluster",
            settings.particles_per_cluster,
            &mut errors,
        );
        schema
            .render
            .cluster_count
            .check_range("cluster_count", settings.cluster_count, &mut errors);

        if let Some(choices) = &schema.analysis.fft_size.valid_choices {
            if !choices.contains(&settings.fft_size) {
                errors.push(format!("fft_size must be one of: {:?}", choices));
            }
        }
        schema.analysis.smoothing_time_constant.check_range(
            "smoothing_time_constant",
            settings.smoothing_time_constant,
            &mut errors,
        );
        schema
            .analysis
            .min_decibels
            .check_range("min_decibels", settings.min_decibels, &mut errors);
        schema
            .analysis
            .max_decibels
            .check_range("max_decibels", settings.max_decibels, &mut errors);
        if settings.min_decibels >= settings.max_decibels {
            errors.push("min_decibels must be below max_decibels".to_string());
        }

        schema
            .audio
            .volume
            .check_range("volume", settings.volume, &mut errors);

        schema
            .output
            .artnet_port
            .check_range("artnet_port", settings.artnet_port, &mut errors);
        if !settings.artnet_broadcast && settings.artnet_dest_ip.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "artnet_dest_ip {:?} is not an IP address",
                settings.artnet_dest_ip
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Failed to parse config file: {0}")]
    ParseError(String),
    #[error("Failed to serialize config: {0}")]
    SerializeError(String),
    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}

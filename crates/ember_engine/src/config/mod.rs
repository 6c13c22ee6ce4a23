//! Configuration system
//!
//! Every config struct is plain serde data. Files are read as TOML or RON
//! depending on their extension, and missing fields fall back to defaults.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration trait
pub trait Config: Serialize + DeserializeOwned + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match Format::of(path)? {
            Format::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Format::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Load from `path` if it exists, otherwise use defaults
    fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match Format::of(path)? {
            Format::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Format::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

enum Format {
    Toml,
    Ron,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Asset lookup settings
    pub assets: AssetConfig,
    /// Physics stepping settings
    pub physics: PhysicsConfig,
    /// Default `env_logger` filter, overridden by `RUST_LOG`
    pub log_level: Option<String>,
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frames = self.renderer.frames_in_flight;
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&frames) {
            return Err(ConfigError::Invalid {
                field: "renderer.frames_in_flight",
                reason: format!("{frames} not in 1..={MAX_FRAMES_IN_FLIGHT}"),
            });
        }
        if self.physics.fixed_timestep <= 0.0 || !self.physics.fixed_timestep.is_finite() {
            return Err(ConfigError::Invalid {
                field: "physics.fixed_timestep",
                reason: format!("{} must be positive", self.physics.fixed_timestep),
            });
        }
        if self.physics.max_substeps == 0 {
            return Err(ConfigError::Invalid {
                field: "physics.max_substeps",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid {
                field: "window",
                reason: format!("{}x{} has a zero dimension", self.window.width, self.window.height),
            });
        }
        Ok(())
    }
}

/// Largest frame ring the renderer accepts
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// Window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial width in pixels
    pub width: u32,
    /// Initial height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Ember".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Size of the frame ring, fixed once the renderer is initialized
    pub frames_in_flight: usize,
    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,
    /// RGBA clear color
    pub clear_color: [f32; 4],
    /// Directory holding compiled `.spv` shaders
    pub shader_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            enable_validation: cfg!(debug_assertions),
            clear_color: [0.05, 0.05, 0.08, 1.0],
            shader_dir: PathBuf::from("target/shaders"),
        }
    }
}

/// Asset lookup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directories searched in order for relative asset paths
    pub search_paths: Vec<PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from("assets"), PathBuf::from(".")],
        }
    }
}

impl AssetConfig {
    /// First existing file for `relative`, or the path itself when none matches
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            return relative.to_path_buf();
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| relative.to_path_buf())
    }
}

/// Physics stepping settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Seconds per simulation step
    pub fixed_timestep: f32,
    /// Upper bound of steps taken in one frame
    pub max_substeps: u32,
    /// Gravity acceleration
    pub gravity: [f32; 3],
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            gravity: [0.0, -9.81, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_frames_in_flight_range() {
        let mut config = EngineConfig::default();
        config.renderer.frames_in_flight = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "renderer.frames_in_flight", .. })
        ));
        config.renderer.frames_in_flight = MAX_FRAMES_IN_FLIGHT + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [renderer]
            frames_in_flight = 3

            [window]
            title = "test"
            "#,
        )
        .unwrap();
        assert_eq!(config.renderer.frames_in_flight, 3);
        assert_eq!(config.window.title, "test");
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.physics, PhysicsConfig::default());
    }

    #[test]
    fn test_ron_roundtrip_through_file() {
        let dir = std::env::temp_dir().join(format!("ember_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.ron");

        let mut config = EngineConfig::default();
        config.log_level = Some("debug".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = EngineConfig::default().save_to_file("engine.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}

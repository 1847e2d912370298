//! Configuration file handling

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub display: DisplayConfig,
    pub demo: DemoConfig,
}

impl Config {
    /// Get the config file path for this platform
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "deckctl").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load config from file, or create default if it doesn't exist
    pub fn load_or_create() -> Result<Self, Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_with_header()?;
            println!("created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Save config with header comments for new files
    pub fn save_with_header(&self) -> Result<(), Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = "# deckctl configuration file\n\n";
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, format!("{header}{contents}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// HID path of the deck to open, first connected deck if unset
    pub path: Option<String>,
    /// Serial number of the deck to open, ignored when a path is set
    pub serial: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Brightness applied by the demo, in percent
    pub brightness: u8,
    /// Background color for transparent images (hex)
    pub background_color: String,
    /// Use nearest neighbor interpolation
    pub use_nearest_neighbor: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            brightness: 75,
            background_color: "#000000".into(),
            use_nearest_neighbor: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Pause between demo steps
    #[serde(with = "humantime_serde")]
    pub step_delay: Duration,
    /// Channel increment for each frame of the color sweep
    pub color_step: u8,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(500),
            color_step: 10,
        }
    }
}

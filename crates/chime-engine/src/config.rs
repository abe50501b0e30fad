use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Which side of a session this process is. Direct device playback is only
/// performed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Host,
    #[default]
    Client,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub device: Option<String>,       // match by substring (case-insensitive)
    pub device_index: Option<usize>,  // explicit index among output devices
    pub sample_rate: Option<u32>,     // e.g., 48000
    pub block_size: Option<u32>,      // frames per buffer (if backend supports)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub mode: RuntimeMode,
    pub assets_dir: PathBuf,
    pub muted: bool,
    pub output: OutputConfig,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::default(),
            assets_dir: PathBuf::from("assets"),
            muted: false,
            output: OutputConfig::default(),
        }
    }
}

impl SoundConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

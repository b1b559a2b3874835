use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::io::{DEFAULT_QUALITY, DecodeLimits, SaveFormat};
use crate::{log_info, log_warn};

/// Environment variable overriding the default config file location.
pub const CONFIG_ENV: &str = "CHANNELFE_CONFIG";

fn default_max_upload_bytes() -> usize {
    DecodeLimits::default().max_bytes
}

fn default_max_pixels() -> u64 {
    DecodeLimits::default().max_pixels
}

fn default_offset_limit() -> i32 {
    255
}

fn default_adjusted_prefix() -> String {
    "adjusted_".to_string()
}

fn default_saved_name() -> String {
    "saved_image.png".to_string()
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("static").join("uploads")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Uploads larger than this are rejected before decoding.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Decoded images with more pixels than this are rejected.
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
    /// Largest accepted |offset| per channel in a request.
    #[serde(default = "default_offset_limit")]
    pub offset_limit: i32,
    #[serde(default = "default_adjusted_prefix")]
    pub adjusted_prefix: String,
    #[serde(default = "default_saved_name")]
    pub saved_name: String,
    /// Used when the uploaded file name has no recognised extension.
    #[serde(default)]
    pub default_format: SaveFormat,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_pixels: default_max_pixels(),
            offset_limit: default_offset_limit(),
            adjusted_prefix: default_adjusted_prefix(),
            saved_name: default_saved_name(),
            default_format: SaveFormat::default(),
            jpeg_quality: default_jpeg_quality(),
            store_dir: default_store_dir(),
        }
    }
}

impl EngineConfig {
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_bytes: self.max_upload_bytes,
            max_pixels: self.max_pixels,
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: EngineConfig = serde_json::from_str(&data)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load `path` (or the default location), keeping defaults if the file is
    /// missing or unreadable.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        match Self::load_from_file(&path) {
            Ok(cfg) => {
                log_info!("Loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                log_warn!("Using default config; cannot load {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.offset_limit < 0 {
            return Err(EngineError::Config(format!(
                "offset_limit must be non-negative, got {}",
                self.offset_limit
            )));
        }
        if self.saved_name.trim().is_empty() {
            return Err(EngineError::Config("saved_name must not be empty".into()));
        }
        Ok(())
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(p);
    }
    PathBuf::from("channelfe.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channelfe.json");
        std::fs::write(&path, r#"{"offset_limit": 100, "default_format": "jpeg"}"#).unwrap();

        let cfg = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(cfg.offset_limit, 100);
        assert_eq!(cfg.default_format, SaveFormat::Jpeg);
        assert_eq!(cfg.saved_name, "saved_image.png");
        assert_eq!(cfg.adjusted_prefix, "adjusted_");
    }

    #[test]
    fn save_then_load_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let cfg = EngineConfig {
            jpeg_quality: 70,
            store_dir: PathBuf::from("out"),
            ..Default::default()
        };
        cfg.save_to_file(&path).unwrap();
        assert_eq!(EngineConfig::load_from_file(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::load_or_default(Some(&dir.path().join("absent.json")));
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn negative_offset_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"offset_limit": -1}"#).unwrap();
        assert!(matches!(
            EngineConfig::load_from_file(&path).unwrap_err(),
            EngineError::Config(_)
        ));
    }
}

use anyhow::{Context, Result};
use autocrop_vision::{codec, detector, geometry};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("com", "autocropapp", "AutoCrop"));

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| match option_env!("AUTOCROP_CONFIG_PATH") {
    Some(path) => PathBuf::from(path),
    None => PROJECT_DIRS
        .as_ref()
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("autocrop.toml")),
});

pub static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| match option_env!("AUTOCROP_DATA_ROOT") {
    Some(path) => PathBuf::from(path),
    None => PROJECT_DIRS
        .as_ref()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("autocrop-data")),
});

/// Upper bound for `box_stroke` and `marker_radius`, in pixels.
pub const MAX_STROKE_PX: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parent of the `ProcessedFaces` and `SavedFaces` directories.
    pub data_root: PathBuf,
    pub jpeg_quality: u8,
    /// Fraction of the face box added on each side.
    pub padding: f32,
    pub detect_timeout_ms: u64,
    /// Share of width/height kept by the no-face fallback crop.
    pub fallback_keep: f32,
    pub box_stroke: u32,
    pub marker_radius: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: DATA_ROOT.clone(),
            jpeg_quality: codec::DEFAULT_QUALITY,
            padding: geometry::DEFAULT_PADDING,
            detect_timeout_ms: detector::DEFAULT_TIMEOUT.as_millis() as u64,
            fallback_keep: geometry::DEFAULT_KEEP,
            box_stroke: 5,
            marker_radius: 3,
        }
    }
}

impl Config {
    /// Defaults with a different data root; handy for embedding and tests.
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            anyhow::bail!("jpeg_quality must be between 1 and 100, got {}", self.jpeg_quality);
        }
        if !self.padding.is_finite() || self.padding < 0.0 {
            anyhow::bail!("padding must be a non-negative number, got {}", self.padding);
        }
        if !self.fallback_keep.is_finite() || self.fallback_keep <= 0.0 || self.fallback_keep > 1.0 {
            anyhow::bail!("fallback_keep must be in (0, 1], got {}", self.fallback_keep);
        }
        if self.detect_timeout_ms == 0 {
            anyhow::bail!("detect_timeout_ms must be > 0");
        }
        if !(1..=MAX_STROKE_PX).contains(&self.box_stroke) {
            anyhow::bail!(
                "box_stroke must be between 1 and {MAX_STROKE_PX}, got {}",
                self.box_stroke
            );
        }
        if !(1..=MAX_STROKE_PX).contains(&self.marker_radius) {
            anyhow::bail!(
                "marker_radius must be between 1 and {MAX_STROKE_PX}, got {}",
                self.marker_radius
            );
        }
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.jpeg_quality, 95);
        assert_eq!(cfg.detect_timeout(), Duration::from_secs(5));
        assert!((cfg.padding - 0.2).abs() < f32::EPSILON);
        assert!((cfg.fallback_keep - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.box_stroke, 5);
        assert_eq!(cfg.marker_radius, 3);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "jpeg_quality = 80\ndata_root = \"/tmp/faces\"\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.jpeg_quality, 80);
        assert_eq!(cfg.data_root, PathBuf::from("/tmp/faces"));
        assert_eq!(cfg.detect_timeout_ms, 5000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::with_data_root(dir.path());
        cfg.padding = 0.3;
        cfg.marker_radius = 5;

        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "jpeg_quality = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        std::fs::write(&path, "fallback_keep = 1.5\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        std::fs::write(&path, "padding = -0.1\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        std::fs::write(&path, "box_stroke = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        std::fs::write(&path, "marker_radius = 4000000000\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        std::fs::write(&path, "marker_radius = 64\nbox_stroke = 64\n").unwrap();
        assert!(load_config(Some(&path)).is_ok());

        std::fs::write(&path, "not toml at all [").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}

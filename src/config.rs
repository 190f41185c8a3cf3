use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entity::{NoteKind, Palette, Size};
use crate::error::{BoardError, Result};

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_CLASSIFY_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_GENERATE_TIMEOUT_MS: u64 = 60_000;

/// Board settings, read from `.stickyboard/config.yaml`. Every field has a
/// default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Minimum gap between a note and the surface edge while dragging.
    pub margin: f64,
    /// Surface used when no real viewport is available (the CLI).
    pub surface: Size,
    pub note_size: Size,
    pub image_note_size: Size,
    pub palette: Palette,
    pub classify_timeout_ms: u64,
    pub generate_timeout_ms: u64,
    /// `tracing` filter directive, overridden by `STICKYBOARD_LOG`.
    pub log_filter: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            margin: 10.0,
            surface: Size::new(1280.0, 800.0),
            note_size: Size::new(192.0, 192.0),
            image_note_size: Size::new(128.0, 128.0),
            palette: Palette::default(),
            classify_timeout_ms: DEFAULT_CLASSIFY_TIMEOUT_MS,
            generate_timeout_ms: DEFAULT_GENERATE_TIMEOUT_MS,
            log_filter: "info".to_string(),
        }
    }
}

impl BoardConfig {
    /// Load from `dir/config.yaml`, or defaults if the file does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::write(dir.join(CONFIG_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(BoardError::Config(format!(
                "margin must be a non-negative number, got {}",
                self.margin
            )));
        }
        for (name, size) in [
            ("surface", self.surface),
            ("note_size", self.note_size),
            ("image_note_size", self.image_note_size),
        ] {
            if !(size.width > 0.0 && size.height > 0.0) {
                return Err(BoardError::Config(format!(
                    "{} must be positive, got {}x{}",
                    name, size.width, size.height
                )));
            }
        }
        if self.classify_timeout_ms == 0 || self.generate_timeout_ms == 0 {
            return Err(BoardError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_millis(self.classify_timeout_ms)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }

    /// On-screen size of a note of `kind`.
    pub fn rendered_size(&self, kind: NoteKind) -> Size {
        match kind {
            NoteKind::Text => self.note_size,
            NoteKind::Image => self.image_note_size,
        }
    }
}

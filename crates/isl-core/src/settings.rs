//! Engine settings
//!
//! Loaded from a JSON file (`isl_api.json` by default). Every field has a
//! default so a partial or missing file is valid.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::log::msg;
use crate::{IslError, IslResult, DEFAULT_STEP_TOLERANCE};

/// Default settings file name
pub const SETTINGS_FILE: &str = "isl_api.json";

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "ISL_SETTINGS";

/// What a non-waiting write does when the FIFO has no free slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Overwrite the oldest entry; lagging readers skip to the oldest retained one
    #[default]
    DropOldest,
    /// Refuse the write with `FifoFull`
    Reject,
}

/// Engine-wide limits and defaults
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum byte length of names and text values
    pub max_string_size: usize,
    /// Maximum (and default) FIFO depth per output
    pub max_fifo_depth: usize,
    /// Maximum readers attached to one output
    pub max_readers: usize,
    /// Slots in the simulations table
    pub max_simulations: usize,
    /// Default relative step tolerance
    pub step_tolerance: f64,
    /// Non-waiting write on a full FIFO
    pub overflow_policy: OverflowPolicy,
    /// Poll interval while waiting for peers in `connect`
    #[serde(with = "duration_str")]
    pub connect_poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_string_size: 1024,
            max_fifo_depth: 1024,
            max_readers: 16,
            max_simulations: 256,
            step_tolerance: DEFAULT_STEP_TOLERANCE,
            overflow_policy: OverflowPolicy::DropOldest,
            connect_poll_interval: Duration::from_millis(500),
        }
    }
}

impl Settings {
    /// Small limits for tests and embedded use
    pub fn compact() -> Self {
        Settings {
            max_fifo_depth: 16,
            max_readers: 4,
            max_simulations: 8,
            connect_poll_interval: Duration::from_millis(20),
            ..Settings::default()
        }
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> IslResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            IslError::LoadError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            IslError::LoadError(format!("failed to parse {}: {}", path.display(), e))
        })?;
        settings.validated()
    }

    /// Load from `ISL_SETTINGS`, else `isl_api.json` in the working directory,
    /// else the defaults. An unreadable file falls back to the defaults.
    pub fn from_env() -> Self {
        let path = match std::env::var(SETTINGS_ENV) {
            Ok(path) => path,
            Err(_) if Path::new(SETTINGS_FILE).exists() => SETTINGS_FILE.to_string(),
            Err(_) => return Settings::default(),
        };
        match Settings::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(msg_id = msg::SETTINGS_LOAD_FAILED, path = %path, "settings ignored: {}", e);
                Settings::default()
            }
        }
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> IslResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IslError::SaveError(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    fn validated(mut self) -> IslResult<Self> {
        if self.max_fifo_depth < 2 {
            return Err(IslError::ValidationError(format!(
                "max_fifo_depth must be at least 2, got {}",
                self.max_fifo_depth
            )));
        }
        if self.max_readers == 0 || self.max_simulations == 0 {
            return Err(IslError::ValidationError(
                "max_readers and max_simulations must be positive".into(),
            ));
        }
        if self.step_tolerance <= 0.0 || self.step_tolerance >= 1.0 {
            tracing::warn!(
                msg_id = msg::SETTINGS_BAD_TOLERANCE,
                tolerance = self.step_tolerance,
                "step tolerance out of (0,1), using default"
            );
            self.step_tolerance = DEFAULT_STEP_TOLERANCE;
        }
        Ok(self)
    }
}

/// `Duration` as a humantime string ("500ms", "2s")
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.max_fifo_depth, 1024);
        assert_eq!(s.max_readers, 16);
        assert_eq!(s.max_simulations, 256);
        assert_eq!(s.max_string_size, 1024);
        assert_eq!(s.overflow_policy, OverflowPolicy::DropOldest);
    }

    #[test]
    fn test_partial_json() {
        let s: Settings =
            serde_json::from_str(r#"{"max_fifo_depth": 8, "connect_poll_interval": "50ms"}"#)
                .unwrap();
        assert_eq!(s.max_fifo_depth, 8);
        assert_eq!(s.connect_poll_interval, Duration::from_millis(50));
        assert_eq!(s.max_readers, 16);
    }

    #[test]
    fn test_save_load() {
        let path = std::env::temp_dir().join(format!("isl_settings_{}.json", std::process::id()));
        let mut s = Settings::compact();
        s.overflow_policy = OverflowPolicy::Reject;
        s.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, s);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let s = Settings {
            max_fifo_depth: 1,
            ..Settings::default()
        };
        assert!(s.validated().is_err());
    }
}

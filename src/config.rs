//! Persistent settings (`trackhack.json`)
//!
//! CLI flags override these for a single run. A missing file yields defaults,
//! a malformed one is an error.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::prefetch::DEFAULT_PREFETCH_LIMIT;
use crate::entities::movie::MovieOptions;

pub const SETTINGS_FILE: &str = "trackhack.json";
pub const MAX_RECENT_PATTERNS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Filename regex used when `--pattern` is absent
    pub pattern: String,
    /// Speed cap for trackees whose session entry gives none
    pub speed_cap: u32,
    pub prefetch: bool,
    pub prefetch_limit: usize,
    /// Most recent first
    pub recent_patterns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            speed_cap: 5,
            prefetch: true,
            prefetch_limit: DEFAULT_PREFETCH_LIMIT,
            recent_patterns: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings {}", path.display()))?;
        info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write settings {}", path.display()))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Make `pattern` the default and move it to the front of the recent list
    pub fn remember_pattern(&mut self, pattern: &str) {
        self.pattern = pattern.to_string();
        self.recent_patterns.retain(|p| p != pattern);
        self.recent_patterns.insert(0, pattern.to_string());
        self.recent_patterns.truncate(MAX_RECENT_PATTERNS);
    }

    pub fn movie_options(&self) -> MovieOptions {
        MovieOptions {
            prefetch: self.prefetch,
            prefetch_limit: self.prefetch_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = scratch_dir("settings_missing");
        let settings = Settings::load(&dir.join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.prefetch_limit, 1024);
    }

    #[test]
    fn test_save_load() {
        let dir = scratch_dir("settings_save");
        let path = dir.join(SETTINGS_FILE);
        let mut settings = Settings::default();
        settings.remember_pattern(r"\.bmp$");
        settings.speed_cap = 9;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = scratch_dir("settings_partial");
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "speed_cap": 3 }"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.speed_cap, 3);
        assert!(settings.prefetch);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = scratch_dir("settings_bad");
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_recent_patterns() {
        let mut settings = Settings::default();
        for i in 0..12 {
            settings.remember_pattern(&format!("p{}", i));
        }
        settings.remember_pattern("p5");
        assert_eq!(settings.pattern, "p5");
        assert_eq!(settings.recent_patterns.len(), MAX_RECENT_PATTERNS);
        assert_eq!(settings.recent_patterns[0], "p5");
        assert_eq!(settings.recent_patterns[1], "p11");
        assert_eq!(settings.recent_patterns.iter().filter(|p| *p == "p5").count(), 1);
    }
}

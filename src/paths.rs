//! Where settings and logs live
//!
//! Priority for both the config and the data directory:
//! 1. `--config-dir` CLI argument
//! 2. `TRACKHACK_CONFIG_DIR` environment variable
//! 3. Current directory IF it already holds `trackhack.json` or `trackhack.log`
//! 4. Platform directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/trackhack, ~/.local/share/trackhack
//! - macOS: ~/Library/Application Support/trackhack
//! - Windows: %APPDATA%\trackhack

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "trackhack";
pub const CONFIG_ENV: &str = "TRACKHACK_CONFIG_DIR";
const LOCAL_MARKERS: [&str; 2] = ["trackhack.json", "trackhack.log"];

/// Override for the default directories
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// CLI value first, then the environment
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        Self { config_dir }
    }

    /// Settings file path
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir().join(name)
    }

    /// Log file path
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.resolve(dirs_next::config_dir())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.resolve(dirs_next::data_dir())
    }

    /// Create both directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.config_dir(), self.data_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    fn resolve(&self, platform: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if let Ok(cwd) = std::env::current_dir() {
            if has_local_files(&cwd) {
                return cwd;
            }
        }
        platform
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn has_local_files(dir: &Path) -> bool {
    LOCAL_MARKERS.iter().any(|f| dir.join(f).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_dir_wins() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config.config_file("trackhack.json"), PathBuf::from("/custom/trackhack.json"));
        assert_eq!(config.data_file("trackhack.log"), PathBuf::from("/custom/trackhack.log"));
    }

    #[test]
    fn test_cli_over_env() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from-cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from-cli")));
    }

    #[test]
    fn test_platform_default_named_after_app() {
        let config = PathConfig::default();
        let path = config.config_file("trackhack.json");
        assert!(path.to_string_lossy().contains("trackhack"));
    }

    #[test]
    fn test_local_marker_detection() {
        let dir = crate::test_support::scratch_dir("paths_local");
        assert!(!has_local_files(&dir));
        std::fs::write(dir.join("trackhack.json"), "{}").unwrap();
        assert!(has_local_files(&dir));
    }

    #[test]
    fn test_ensure_dirs_creates_custom_dir() {
        let dir = crate::test_support::scratch_dir("paths_ensure").join("nested");
        let config = PathConfig {
            config_dir: Some(dir.clone()),
        };
        config.ensure_dirs().unwrap();
        assert!(dir.is_dir());
    }
}

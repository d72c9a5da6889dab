//! Settings file locations using the `dirs` crate.
//!
//! Lookup order:
//!
//!   1. `./appsettings.toml` in the current working directory
//!   2. Platform config dir:
//!        Windows: %APPDATA%\voice2text\settings.toml
//!        macOS:   ~/Library/Application Support/voice2text/settings.toml
//!        Linux:   ~/.config/voice2text/settings.toml

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// `appsettings.toml` in the working directory.
    pub local_settings_file: PathBuf,
    /// Directory for the per-user `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to the per-user `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice2text";
    const LOCAL_SETTINGS: &'static str = "appsettings.toml";

    /// Resolves all paths.  Falls back to the current directory if the
    /// platform cannot provide a config directory.
    pub fn new() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            local_settings_file: cwd.join(Self::LOCAL_SETTINGS),
            settings_file: config_dir.join("settings.toml"),
            config_dir,
        }
    }

    /// Settings files in the order they are tried.
    pub fn settings_candidates(&self) -> Vec<PathBuf> {
        vec![self.local_settings_file.clone(), self.settings_file.clone()]
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

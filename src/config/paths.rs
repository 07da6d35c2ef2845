//! Application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Linux:   ~/.config/book-reader/
//!   macOS:   ~/Library/Application Support/book-reader/
//!
//! Data dir (captured frames):
//!   Linux:   ~/.local/share/book-reader/captures/
//!   macOS:   ~/Library/Application Support/book-reader/captures/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default directory for saved camera frames.
    pub captures_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "book-reader";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (a service account without a home directory, say).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            captures_dir: data_dir.join("captures"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths.captures_dir.ends_with("captures"));
    }

    #[test]
    fn settings_file_lives_in_config_dir() {
        let paths = AppPaths::new();
        assert_eq!(paths.settings_file.parent(), Some(paths.config_dir.as_path()));
    }
}

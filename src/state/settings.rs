// SPDX-License-Identifier: MPL-2.0

use crate::config::{APP_ID, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Base URL of the Travel Book service
    #[serde(default = "default_api_url")]
    pub api_base_url: String,
    /// Remote calls give up after this long
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Serve data from the built-in fixtures instead of the service
    #[serde(default)]
    pub use_fixtures: bool,
    /// Where the signed-in session is kept
    #[serde(default)]
    pub session_backend: SessionBackend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// The desktop secret service (libsecret)
    #[default]
    Keyring,
    /// An owner-only JSON file in the config directory
    File,
}

impl std::str::FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            other => Err(format!(
                "unknown session backend {other:?}, expected keyring or file"
            )),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_url(),
            request_timeout_secs: default_timeout(),
            use_fixtures: false,
            session_backend: SessionBackend::Keyring,
        }
    }
}

impl AppSettings {
    /// Get the settings file path (~/.config/io.github.sethcottle.TravelBook/settings.json)
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk, then apply environment overrides
    pub fn load() -> Self {
        Self::load_stored().with_overrides(|key| std::env::var(key).ok())
    }

    /// What the settings file holds, without environment overrides
    pub fn load_stored() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Read a settings file, or return defaults if missing or malformed
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed settings");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Apply TRAVEL_BOOK_* overrides from the given lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TRAVEL_BOOK_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup("TRAVEL_BOOK_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => tracing::warn!(
                    value = %raw,
                    keeping = self.request_timeout_secs,
                    "invalid TRAVEL_BOOK_TIMEOUT_SECS"
                ),
            }
        }
        if let Some(raw) = lookup("TRAVEL_BOOK_FIXTURES") {
            self.use_fixtures = matches!(raw.trim(), "1" | "true" | "yes");
        }
        if let Some(raw) = lookup("TRAVEL_BOOK_SESSION_BACKEND") {
            match raw.parse() {
                Ok(backend) => self.session_backend = backend,
                Err(e) => tracing::warn!(error = %e, "ignoring TRAVEL_BOOK_SESSION_BACKEND"),
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::settings_path().ok_or("Could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {e}"))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {e}"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = AppSettings::load_from(&dir.path().join("settings.json"));
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg/settings.json");
        let settings = AppSettings {
            api_base_url: "https://travel.example".into(),
            request_timeout_secs: 4,
            use_fixtures: true,
            session_backend: SessionBackend::File,
        };

        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "use_fixtures": true }"#).unwrap();

        let settings = AppSettings::load_from(&path);
        assert!(settings.use_fixtures);
        assert_eq!(settings.api_base_url, DEFAULT_API_URL);
        assert_eq!(settings.session_backend, SessionBackend::Keyring);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TRAVEL_BOOK_API_URL", "http://10.0.0.2:8000"),
            ("TRAVEL_BOOK_TIMEOUT_SECS", "3"),
            ("TRAVEL_BOOK_FIXTURES", "true"),
            ("TRAVEL_BOOK_SESSION_BACKEND", "file"),
        ]
        .into_iter()
        .collect();

        let settings =
            AppSettings::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.api_base_url, "http://10.0.0.2:8000");
        assert_eq!(settings.request_timeout_secs, 3);
        assert!(settings.use_fixtures);
        assert_eq!(settings.session_backend, SessionBackend::File);
    }

    #[test]
    fn test_bad_timeout_override_is_ignored() {
        let settings = AppSettings::default().with_overrides(|k| {
            (k == "TRAVEL_BOOK_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(settings.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}

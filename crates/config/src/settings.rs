// Application settings
// Loaded from ~/.config/tuition-recon/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides the config directory (tests, portable installs).
pub const CONFIG_DIR_ENV: &str = "TUITION_CONFIG_DIR";

const APP_DIR: &str = "tuition-recon";

/// Where unit data lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local JSON file (default)
    #[default]
    File,
    /// Firebase Realtime Database over REST
    Firebase,
    /// Process memory; nothing persists
    Memory,
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Firebase => "firebase",
            Self::Memory => "memory",
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "firebase" => Ok(Self::Firebase),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown store backend '{}' (expected file, firebase or memory)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,

    /// Data file for the file backend. None = platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Firebase database URL, e.g. https://<project>-default-rtdb.firebaseio.com
    #[serde(rename = "databaseUrl", skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl StoreSettings {
    /// Effective data file for the file backend
    pub fn effective_path(&self) -> PathBuf {
        match &self.path {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => default_data_path(),
        }
    }
}

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// AI features disabled (default)
    #[default]
    None,
    /// Google Gemini API
    Gemini,
}

impl AIProvider {
    /// Returns true if AI features are enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::Gemini => "gemini",
        }
    }

    /// Returns the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::Gemini => "gemini-3-pro-preview",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

/// AI-specific settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AISettings {
    /// Selected AI provider
    pub provider: AIProvider,

    /// Model identifier. Empty = provider default.
    pub model: String,

    /// API base URL override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl AISettings {
    /// Get the effective model (user-specified or provider default)
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    pub fn effective_endpoint(&self) -> &str {
        match self.endpoint.as_deref() {
            Some(e) if !e.is_empty() => e,
            _ => self.provider.default_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "store")]
    pub store: StoreSettings,

    /// Billing rules file (TOML). None = built-in defaults.
    #[serde(rename = "rules.file", skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<String>,

    #[serde(rename = "ai")]
    pub ai: AISettings,
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default data file for the file store
pub fn default_data_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("units.json")
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        config_dir().join("settings.json")
    }

    /// Load settings from disk, falling back to defaults.
    /// Writes a commented default file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load a specific settings file, falling back to defaults on error
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(&path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Where unit data is stored
    // Backend options: "file", "firebase", "memory"
    // Firebase auth token: keychain or TUITION_FIREBASE_KEY
    "store": {
        "backend": "file"
    },

    // Billing rules (TOML with base_days and min_expected_value)
    // "rules.file": "/path/to/rules.toml",

    // AI summaries (disabled by default)
    // Provider options: "none", "gemini"
    // API keys are stored in system keychain or TUITION_GEMINI_KEY, not in this file
    "ai": {
        "provider": "none",
        "model": ""
    }
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("Error writing default settings.json: {}", e);
        } else {
            log::info!("Created default settings at {}", path.display());
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

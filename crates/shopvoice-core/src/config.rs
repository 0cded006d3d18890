use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ShopVoiceError};

/// Environment variable that overrides `backend.api_base_url`.
pub const API_BASE_URL_ENV: &str = "SHOPVOICE_API_BASE_URL";

/// Top-level configuration for the ShopVoice client.
///
/// Loaded from `~/.shopvoice/config.toml` by default. Each section maps to one
/// of the collaborators wired together by the app crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopVoiceConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl ShopVoiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ShopVoiceConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ShopVoiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply environment overrides. Called once at startup.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_BASE_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                info!(api_base_url = %url, "Backend base URL taken from environment");
                self.backend.api_base_url = url.to_string();
            }
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Assistant backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the chat service; `/chat` and `/health` are appended.
    pub api_base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Assistant message pre-appended when a session starts.
    pub greeting: String,
    /// Speak the greeting once the session is up.
    pub speak_greeting: bool,
    /// Assistant message appended when a turn fails.
    pub fallback_reply: String,
    /// Refuse a new submission while a turn is awaiting its reply. When off,
    /// turns overlap and `loading` stays raised until the last one resolves.
    pub reject_while_loading: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: "Hi, I'm your ecommerce assistant. You can ask about products, orders, or returns.".to_string(),
            speak_greeting: true,
            fallback_reply: "Sorry, something went wrong.".to_string(),
            reject_while_loading: true,
        }
    }
}

/// Speech input/output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Master switch for both capture and playback.
    pub enabled: bool,
    /// BCP-47 language tag used for recognition and synthesis.
    pub language: String,
    /// Playback speaking rate (1.0 = normal).
    pub rate: f32,
    /// Playback pitch (1.0 = normal).
    pub pitch: f32,
    /// Recognizer command; prints one transcript line on stdout.
    pub capture_command: Option<Vec<String>>,
    /// Synthesizer command; `{text}` in an argument is replaced by the utterance,
    /// otherwise the utterance is appended as the last argument.
    pub playback_command: Option<Vec<String>>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en-US".to_string(),
            rate: 1.0,
            pitch: 1.0,
            capture_command: None,
            playback_command: None,
        }
    }
}

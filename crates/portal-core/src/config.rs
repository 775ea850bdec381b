//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/portal/config.toml)
//! 3. Environment variables (PORTAL_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "PORTAL";

/// Default chat-completions endpoint
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

/// Which local store adapter backs the view model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocalBackend {
    /// One JSON file per collection, written atomically
    #[default]
    File,
    /// A key/value table in SQLite
    Sqlite,
}

impl std::str::FromStr for LocalBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(LocalBackend::File),
            "sqlite" => Ok(LocalBackend::Sqlite),
            other => Err(format!("unknown local backend '{}' (expected file or sqlite)", other)),
        }
    }
}

/// Chat assistant settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    /// OpenAI-compatible chat-completions URL
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with each request
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Bearer token for the endpoint
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            model: default_chat_model(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Directory for local storage
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Local store adapter
    #[serde(default)]
    pub local_backend: LocalBackend,

    /// Base URL of the remote store (e.g. https://xyz.supabase.co)
    #[serde(default)]
    pub remote_url: Option<String>,

    /// API key for the remote store
    #[serde(default)]
    pub remote_key: Option<String>,

    /// Whether the remote store is used at all
    #[serde(default)]
    pub remote_enabled: bool,

    /// Let an empty remote collection replace local data during hydration
    #[serde(default)]
    pub trust_empty_remote: bool,

    /// Emails allowed to enter admin mode
    #[serde(default = "default_admin_emails")]
    pub admin_emails: Vec<String>,

    /// Chat assistant settings
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            local_backend: LocalBackend::default(),
            remote_url: None,
            remote_key: None,
            remote_enabled: false,
            trust_empty_remote: false,
            admin_emails: default_admin_emails(),
            chat: ChatConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (PORTAL_DATA_DIR, PORTAL_REMOTE_URL, ...)
    /// 2. Config file (~/.config/portal/config.toml or PORTAL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_REMOTE_URL", ENV_PREFIX)) {
            self.remote_url = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_REMOTE_KEY", ENV_PREFIX)) {
            self.remote_key = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_REMOTE_ENABLED", ENV_PREFIX)) {
            self.remote_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = std::env::var(format!("{}_CHAT_KEY", ENV_PREFIX)) {
            self.chat.api_key = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with PORTAL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portal")
            .join("config.toml")
    }

    /// Directory holding one JSON snapshot per collection
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("local")
    }

    /// Path to the SQLite key/value database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("portal.db")
    }

    /// Whether the remote store is enabled and has a URL
    pub fn remote_ready(&self) -> bool {
        self.remote_enabled && self.remote_url.is_some()
    }

    /// Whether `email` is on the admin allowlist (exact match)
    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|allowed| allowed == email)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portal")
}

fn default_admin_emails() -> Vec<String> {
    vec![
        "admin@mathportal.com".to_string(),
        "sandeep.baghel@edu.com".to_string(),
    ]
}

fn default_chat_endpoint() -> String {
    DEFAULT_CHAT_ENDPOINT.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "PORTAL_DATA_DIR",
        "PORTAL_REMOTE_URL",
        "PORTAL_REMOTE_KEY",
        "PORTAL_REMOTE_ENABLED",
        "PORTAL_CHAT_KEY",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.remote_enabled);
        assert!(config.remote_url.is_none());
        assert!(!config.trust_empty_remote);
        assert_eq!(config.local_backend, LocalBackend::File);
        assert!(config.data_dir.ends_with("portal"));
        assert_eq!(config.chat.temperature, 0.7);
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.snapshot_dir().ends_with("local"));
        assert!(config.sqlite_path().ends_with("portal.db"));
    }

    #[test]
    fn test_admin_allowlist_is_exact_match() {
        let config = Config::default();
        assert!(config.is_admin("admin@mathportal.com"));
        assert!(!config.is_admin("ADMIN@mathportal.com"));
        assert!(!config.is_admin("admin@mathportal.com "));
        assert!(!config.is_admin(""));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("PORTAL_DATA_DIR", "/tmp/portal-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/portal-test"));
    }

    #[test]
    fn test_env_override_remote() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        assert!(!config.remote_ready());

        env::set_var("PORTAL_REMOTE_URL", "https://demo.supabase.co");
        env::set_var("PORTAL_REMOTE_ENABLED", "1");
        config.apply_env_overrides();
        assert!(config.remote_ready());

        // Empty string clears it
        env::set_var("PORTAL_REMOTE_URL", "");
        config.apply_env_overrides();
        assert!(config.remote_url.is_none());
        assert!(!config.remote_ready());
    }

    #[test]
    fn test_env_override_chat_key() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("PORTAL_CHAT_KEY", "sk-test");
        config.apply_env_overrides();
        assert_eq!(config.chat.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/portal"),
            local_backend: LocalBackend::Sqlite,
            remote_url: Some("https://demo.supabase.co".to_string()),
            remote_key: Some("anon".to_string()),
            remote_enabled: true,
            trust_empty_remote: true,
            admin_emails: vec!["me@example.com".to_string()],
            chat: ChatConfig::default(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("local_backend = \"sqlite\""));
        assert!(toml_str.contains("remote_url"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            remote_url = "https://demo.supabase.co"
            remote_enabled = true
            admin_emails = ["teacher@example.com"]

            [chat]
            model = "local/tutor"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert!(config.remote_ready());
        assert!(config.is_admin("teacher@example.com"));
        assert!(!config.is_admin("admin@mathportal.com"));
        assert_eq!(config.chat.model, "local/tutor");
        assert_eq!(config.chat.endpoint, DEFAULT_CHAT_ENDPOINT);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("PORTAL_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(!config.remote_enabled);
        assert!(config.data_dir.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().join("data"),
            trust_empty_remote: true,
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }
}

//! Configuration management for the Gmail MCP server
//!
//! Handles paths, environment variables, and fixed protocol constants.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Name of the OAuth client secrets file
pub const OAUTH_KEYS_FILE: &str = "gcp-oauth.keys.json";

/// Name of the stored token file
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Configuration for the Gmail MCP server
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for storing configuration files
    pub config_dir: PathBuf,

    /// Path to OAuth keys file (client credentials)
    pub oauth_path: PathBuf,

    /// Path to stored credentials (access/refresh tokens)
    pub credentials_path: PathBuf,

    /// Port the OAuth callback listener binds to
    pub oauth_callback_port: u16,

    /// Redirect URI registered with Google
    pub oauth_callback_url: String,
}

impl Config {
    /// Build the configuration from the process environment
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        Ok(Self::from_lookup(&home, |key| std::env::var(key).ok()))
    }

    /// Build the configuration from an explicit home directory and variable lookup
    pub fn from_lookup<F>(home: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_dir = home.join(".gmail-mcp");

        let oauth_path = lookup("GMAIL_OAUTH_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join(OAUTH_KEYS_FILE));

        let credentials_path = lookup("GMAIL_CREDENTIALS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join(CREDENTIALS_FILE));

        let oauth_callback_port = lookup("GMAIL_OAUTH_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(oauth::DEFAULT_CALLBACK_PORT);

        Self {
            config_dir,
            oauth_path,
            credentials_path,
            oauth_callback_port,
            oauth_callback_url: oauth::callback_url(oauth_callback_port),
        }
    }

    /// Configuration rooted in a single directory (keys and tokens side by side)
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let config_dir = dir.into();
        Self {
            oauth_path: config_dir.join(OAUTH_KEYS_FILE),
            credentials_path: config_dir.join(CREDENTIALS_FILE),
            oauth_callback_port: oauth::DEFAULT_CALLBACK_PORT,
            oauth_callback_url: oauth::callback_url(oauth::DEFAULT_CALLBACK_PORT),
            config_dir,
        }
    }

    /// Use a custom redirect URI (the listener still binds the configured port)
    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_callback_url = url.into();
        self
    }

    /// Create the config directory if it doesn't exist
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir).map_err(|source| {
                ConfigError::DirCreationFailed {
                    path: self.config_dir.display().to_string(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Copy a keys file found in `dir` over the configured keys path.
    ///
    /// Returns whether a file was copied.
    pub fn adopt_local_oauth_keys(&self, dir: &Path) -> Result<bool> {
        let local = dir.join(OAUTH_KEYS_FILE);
        if !local.is_file() || local == self.oauth_path {
            return Ok(false);
        }

        if let Some(parent) = self.oauth_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&local, &self.oauth_path)?;
        tracing::info!(
            from = %local.display(),
            to = %self.oauth_path.display(),
            "OAuth keys found in current directory, copied to global config"
        );
        Ok(true)
    }
}

/// Gmail API constants
pub mod gmail {
    /// Base URL for Gmail API
    pub const API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

    /// User ID for the authenticated user
    pub const USER_ID: &str = "me";

    /// Default chunk size for batch tools
    pub const DEFAULT_BATCH_SIZE: usize = 50;

    /// Default number of search results
    pub const DEFAULT_MAX_RESULTS: u32 = 10;

    /// System label IDs used by filter templates
    pub mod labels {
        pub const INBOX: &str = "INBOX";
        pub const UNREAD: &str = "UNREAD";
        pub const IMPORTANT: &str = "IMPORTANT";
    }
}

/// OAuth constants
pub mod oauth {
    use std::time::Duration;

    /// Scopes requested during the interactive flow
    pub const SCOPES: &[&str] = &[
        "https://www.googleapis.com/auth/gmail.modify",
        "https://www.googleapis.com/auth/gmail.settings.basic",
    ];

    pub const DEFAULT_CALLBACK_PORT: u16 = 3000;

    pub const CALLBACK_PATH: &str = "/oauth2callback";

    /// How long the interactive flow waits for the browser callback
    pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    /// Tokens expiring within this window are refreshed before use
    pub const EXPIRY_SKEW_MS: i64 = 60_000;

    pub fn callback_url(port: u16) -> String {
        format!("http://localhost:{}{}", port, CALLBACK_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = Config::from_lookup(Path::new("/home/someone"), |_| None);
        assert_eq!(
            config.oauth_path,
            PathBuf::from("/home/someone/.gmail-mcp/gcp-oauth.keys.json")
        );
        assert_eq!(
            config.credentials_path,
            PathBuf::from("/home/someone/.gmail-mcp/credentials.json")
        );
        assert_eq!(config.oauth_callback_port, 3000);
        assert_eq!(config.oauth_callback_url, "http://localhost:3000/oauth2callback");
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(Path::new("/home/someone"), |key| match key {
            "GMAIL_OAUTH_PATH" => Some("/etc/keys.json".to_string()),
            "GMAIL_CREDENTIALS_PATH" => Some("/var/tokens.json".to_string()),
            "GMAIL_OAUTH_PORT" => Some("4100".to_string()),
            _ => None,
        });
        assert_eq!(config.oauth_path, PathBuf::from("/etc/keys.json"));
        assert_eq!(config.credentials_path, PathBuf::from("/var/tokens.json"));
        assert_eq!(config.oauth_callback_url, "http://localhost:4100/oauth2callback");
    }

    #[test]
    fn test_adopt_local_oauth_keys() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let config = Config::in_dir(home.path().join("cfg"));

        assert!(!config.adopt_local_oauth_keys(cwd.path()).unwrap());

        std::fs::write(cwd.path().join(OAUTH_KEYS_FILE), "{}").unwrap();
        assert!(config.adopt_local_oauth_keys(cwd.path()).unwrap());
        assert!(config.oauth_path.exists());
    }
}

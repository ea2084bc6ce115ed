//! On-disk OAuth material: the client secrets file and the token file

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// OAuth client credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthKeys {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

impl From<yup_oauth2::ApplicationSecret> for OAuthKeys {
    fn from(secret: yup_oauth2::ApplicationSecret) -> Self {
        Self {
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            auth_uri: secret.auth_uri,
            token_uri: secret.token_uri,
        }
    }
}

impl OAuthKeys {
    /// Load client secrets from a Google keys file (`installed` or `web`)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read(path).map_err(|_| ConfigError::KeysFileNotFound {
            path: path.display().to_string(),
        })?;

        let secret =
            yup_oauth2::parse_application_secret(content).map_err(|e| ConfigError::InvalidKeys {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(secret.into())
    }
}

/// Stored credentials (tokens), in the layout Google's client libraries write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Expiry timestamp (Unix milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default)]
    pub scope: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredCredentials {
    /// Whether the token expires before `now_ms + skew_ms`.
    ///
    /// A missing expiry never expires.
    pub fn expires_within(&self, now_ms: i64, skew_ms: i64) -> bool {
        match self.expiry_date {
            Some(expiry) => expiry <= now_ms + skew_ms,
            None => false,
        }
    }
}

/// Current time in Unix milliseconds
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Reads and writes the token file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored credentials; `None` when the file doesn't exist
    pub async fn load(&self) -> Result<Option<StoredCredentials>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Overwrite the token file with `credentials`
    pub async fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(credentials)?;
        tokio::fs::write(&self.path, content).await?;
        tracing::debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    /// Delete the token file if present
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GmailMcpError;

    fn sample() -> StoredCredentials {
        StoredCredentials {
            access_token: "ya29.token".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry_date: Some(1_700_000_000_000),
            token_type: "Bearer".to_string(),
            scope: "https://www.googleapis.com/auth/gmail.modify".to_string(),
            id_token: None,
        }
    }

    #[test]
    fn test_load_installed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(
            &path,
            r#"{
                "installed": {
                    "client_id": "test-client-id",
                    "client_secret": "test-secret",
                    "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                    "token_uri": "https://oauth2.googleapis.com/token",
                    "redirect_uris": ["http://localhost"]
                }
            }"#,
        )
        .unwrap();

        let keys = OAuthKeys::load(&path).unwrap();
        assert_eq!(keys.client_id, "test-client-id");
        assert_eq!(keys.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_load_keys_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            OAuthKeys::load(&missing),
            Err(GmailMcpError::Config(ConfigError::KeysFileNotFound { .. }))
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"other": {}}"#).unwrap();
        assert!(matches!(
            OAuthKeys::load(&bad),
            Err(GmailMcpError::Config(ConfigError::InvalidKeys { .. }))
        ));
    }

    #[test]
    fn test_expiry() {
        let creds = sample();
        assert!(creds.expires_within(1_700_000_000_000, 0));
        assert!(!creds.expires_within(1_600_000_000_000, 60_000));

        let no_expiry = StoredCredentials {
            expiry_date: None,
            ..sample()
        };
        assert!(!no_expiry.expires_within(i64::MAX - 1, 0));
    }

    #[tokio::test]
    async fn test_store_roundtrip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested").join("credentials.json"));

        assert_eq!(store.load().await.unwrap(), None);

        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample()));

        store.remove().await.unwrap();
        assert!(!store.path().exists());
        store.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_google_library_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"access_token":"a","refresh_token":"r","scope":"s","token_type":"Bearer","expiry_date":1750000000000}"#,
        )
        .unwrap();

        let creds = CredentialStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(creds.expiry_date, Some(1_750_000_000_000));
        assert_eq!(creds.refresh_token.as_deref(), Some("r"));
    }
}

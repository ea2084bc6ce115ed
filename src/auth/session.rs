//! The process-wide credential session
//!
//! Owns the single `StoredCredentials` instance. Validation, refresh, and
//! code exchange all go through the same mutex, so concurrent callers never
//! refresh twice.

use serde::Deserialize;
use tokio::sync::{Mutex, MutexGuard};

use super::credentials::{now_millis, CredentialStore, OAuthKeys, StoredCredentials};
use crate::config::oauth;
use crate::error::{AuthError, Result};

/// Token response from OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

impl TokenResponse {
    fn into_credentials(self, fallback_refresh: Option<String>) -> StoredCredentials {
        StoredCredentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(fallback_refresh),
            expiry_date: self.expires_in.map(|secs| now_millis() + secs * 1000),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: self.scope.unwrap_or_default(),
            id_token: self.id_token,
        }
    }
}

/// OAuth session
pub struct Session {
    keys: OAuthKeys,
    store: CredentialStore,
    http_client: reqwest::Client,
    redirect_uri: String,
    credentials: Mutex<Option<StoredCredentials>>,
}

impl Session {
    /// Create a session with no credentials installed
    pub fn new(keys: OAuthKeys, store: CredentialStore, redirect_uri: impl Into<String>) -> Self {
        Self {
            keys,
            store,
            http_client: reqwest::Client::new(),
            redirect_uri: redirect_uri.into(),
            credentials: Mutex::new(None),
        }
    }

    /// Create a session from whatever the store currently holds
    pub async fn load(
        keys: OAuthKeys,
        store: CredentialStore,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        let credentials = store.load().await?;
        if credentials.is_none() {
            tracing::info!(path = %store.path().display(), "No stored credentials");
        }
        Ok(Self::new(keys, store, redirect_uri).with_credentials(credentials))
    }

    /// Install credentials without persisting them
    pub fn with_credentials(self, credentials: Option<StoredCredentials>) -> Self {
        Self {
            credentials: Mutex::new(credentials),
            ..self
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Snapshot of the current credentials
    pub async fn credentials(&self) -> Option<StoredCredentials> {
        self.credentials.lock().await.clone()
    }

    /// Check the credentials are usable, refreshing at most once.
    ///
    /// An unexpired token is accepted without contacting the token endpoint.
    pub async fn validate(&self) -> bool {
        let mut guard = self.credentials.lock().await;

        let refresh_token = match guard.as_ref() {
            None => return false,
            Some(creds) if creds.access_token.is_empty() => return false,
            Some(creds) if !creds.expires_within(now_millis(), 0) => return true,
            Some(creds) => creds.refresh_token.clone(),
        };

        let Some(refresh_token) = refresh_token else {
            tracing::warn!("Access token expired and no refresh token is stored");
            return false;
        };

        match self.refresh_locked(&mut guard, refresh_token).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed during validation");
                false
            }
        }
    }

    /// Exchange the refresh token for a new access token and persist it
    pub async fn refresh(&self) -> Result<String> {
        let mut guard = self.credentials.lock().await;
        let refresh_token = guard
            .as_ref()
            .and_then(|c| c.refresh_token.clone())
            .ok_or(AuthError::NoRefreshToken)?;
        self.refresh_locked(&mut guard, refresh_token).await
    }

    /// Get a bearer token, refreshing when it is about to expire
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.credentials.lock().await;
        let now = now_millis();

        let (token, refresh_token, expired) = match guard.as_ref() {
            Some(creds) => (
                creds.access_token.clone(),
                creds.refresh_token.clone(),
                creds.expires_within(now, 0),
            ),
            None => {
                return Err(AuthError::CredentialsNotFound {
                    path: self.store.path().display().to_string(),
                }
                .into())
            }
        };

        let stale = guard
            .as_ref()
            .is_some_and(|c| c.expires_within(now, oauth::EXPIRY_SKEW_MS));

        match (stale, refresh_token) {
            (false, _) => Ok(token),
            (true, Some(refresh_token)) => self.refresh_locked(&mut guard, refresh_token).await,
            (true, None) if expired => Err(AuthError::InvalidCredentials.into()),
            (true, None) => Ok(token),
        }
    }

    async fn refresh_locked(
        &self,
        slot: &mut MutexGuard<'_, Option<StoredCredentials>>,
        refresh_token: String,
    ) -> Result<String> {
        tracing::debug!("Refreshing access token");

        let params = [
            ("client_id", self.keys.client_id.as_str()),
            ("client_secret", self.keys.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&self.keys.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshRejected { message: text }.into());
        }

        let token_response: TokenResponse = response.json().await?;
        let credentials = token_response.into_credentials(Some(refresh_token));

        self.store.save(&credentials).await?;
        let token = credentials.access_token.clone();
        **slot = Some(credentials);

        tracing::info!("Access token refreshed");
        Ok(token)
    }

    /// Generate the authorization URL
    pub fn authorization_url(&self) -> String {
        let scopes = oauth::SCOPES.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.keys.auth_uri,
            urlencoding::encode(&self.keys.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes)
        )
    }

    /// Exchange authorization code for tokens, persist and install them
    pub async fn exchange_code(&self, code: &str) -> Result<()> {
        let params = [
            ("client_id", self.keys.client_id.as_str()),
            ("client_secret", self.keys.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.keys.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchangeFailed { message: text }.into());
        }

        let token_response: TokenResponse = response.json().await?;
        let credentials = token_response.into_credentials(None);

        self.store.save(&credentials).await?;
        *self.credentials.lock().await = Some(credentials);
        Ok(())
    }
}

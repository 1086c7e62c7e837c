//! Local OAuth token cache for the Gmail source.
//!
//! The file uses Google's "authorized user" JSON layout (`token`,
//! `refresh_token`, `client_id`, `client_secret`, `token_uri`, `expiry`), so a
//! token written by Google's own client libraries can be reused directly.
//! Obtaining the first token through the consent screen is not handled here.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::FetchError;
use crate::error::ScribeError;

/// Default Google OAuth token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Cached OAuth credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCache {
    #[serde(rename = "token", alias = "access_token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// Fields we do not use (`scopes`, `universe_domain`, ...), written back unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenCache {
    /// Read the cache file.
    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::Auth(format!(
                    "no token cache at '{}'; place an authorized-user token JSON there \
                     (or point gmail.token_path at one)",
                    path.display()
                ))
            } else {
                FetchError::Local(ScribeError::io(path, e))
            }
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| FetchError::Decode(format!("token cache '{}': {e}", path.display())))
    }

    /// Write the cache file back.
    pub fn save(&self, path: &Path) -> Result<(), FetchError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ScribeError::io(parent, e))?;
        }
        std::fs::write(path, contents).map_err(|e| ScribeError::io(path, e))?;
        debug!(path = %path.display(), "Saved token cache");
        Ok(())
    }

    /// `true` when the token is past (or within a minute of) its expiry.
    ///
    /// A token without an expiry is assumed valid until the server rejects it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| now + Duration::seconds(EXPIRY_SKEW_SECS) >= expiry)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Exchange the refresh token for a new access token.
    pub fn refresh(&mut self, client: &reqwest::blocking::Client) -> Result<(), FetchError> {
        let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            self.refresh_token.as_deref(),
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
        ) else {
            return Err(FetchError::Auth(
                "token expired and the cache has no refresh credentials".into(),
            ));
        };

        let response = client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(FetchError::Auth(format!(
                "token refresh rejected ({status}): {}",
                message.trim()
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .map_err(|e| FetchError::Decode(format!("token refresh response: {e}")))?;
        self.access_token = refreshed.access_token;
        self.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(rotated) = refreshed.refresh_token {
            self.refresh_token = Some(rotated);
        }
        info!("Refreshed access token");
        Ok(())
    }
}

/// Token cache plus the file it lives in.
#[derive(Debug)]
pub struct Credentials {
    path: PathBuf,
    token: TokenCache,
}

impl Credentials {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let path = path.into();
        let token = TokenCache::load(&path)?;
        Ok(Self { path, token })
    }

    /// A usable access token, refreshing (and persisting) it first if expired.
    pub fn access_token(&mut self, client: &reqwest::blocking::Client) -> Result<&str, FetchError> {
        if self.token.is_expired(Utc::now()) {
            self.force_refresh(client)?;
        }
        Ok(&self.token.access_token)
    }

    pub fn can_refresh(&self) -> bool {
        self.token.can_refresh()
    }

    /// Refresh regardless of the recorded expiry (the server rejected the token).
    pub fn force_refresh(&mut self, client: &reqwest::blocking::Client) -> Result<(), FetchError> {
        self.token.refresh(client)?;
        self.token.save(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOGLE_LAYOUT: &str = r#"{
        "token": "ya29.old",
        "refresh_token": "1//refresh",
        "token_uri": "https://oauth2.googleapis.com/token",
        "client_id": "id.apps.googleusercontent.com",
        "client_secret": "secret",
        "scopes": ["https://www.googleapis.com/auth/gmail.readonly"],
        "expiry": "2024-01-01T12:00:00.123456Z"
    }"#;

    #[test]
    fn test_reads_google_layout() {
        let token: TokenCache = serde_json::from_str(GOOGLE_LAYOUT).unwrap();
        assert_eq!(token.access_token, "ya29.old");
        assert!(token.can_refresh());
        assert!(token.extra.contains_key("scopes"));
        let noon = "2024-01-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(token.is_expired(noon));
        assert!(!token.is_expired(noon - Duration::hours(1)));
    }

    #[test]
    fn test_minimal_token_never_expires() {
        let token: TokenCache = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.token_uri, GOOGLE_TOKEN_URI);
        assert!(!token.is_expired(Utc::now()));
        assert!(!token.can_refresh());
    }

    #[test]
    fn test_save_round_trip_keeps_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let token: TokenCache = serde_json::from_str(GOOGLE_LAYOUT).unwrap();
        token.save(&path).unwrap();

        let reloaded = TokenCache::load(&path).unwrap();
        assert_eq!(reloaded.access_token, "ya29.old");
        assert_eq!(reloaded.extra.get("scopes"), token.extra.get("scopes"));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"token\""));
    }

    #[test]
    fn test_missing_file_is_auth_error() {
        let err = TokenCache::load(Path::new("/nonexistent/token.json")).unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));
    }

    #[test]
    fn test_refresh_without_credentials_fails_fast() {
        let mut token: TokenCache = serde_json::from_str(r#"{"token": "abc"}"#).unwrap();
        let client = reqwest::blocking::Client::new();
        assert!(matches!(token.refresh(&client), Err(FetchError::Auth(_))));
    }
}

//! Google API client: OAuth2 token handling shared by the calendar adapter.
//!
//! Reads a previously authorized token from `~/.meetledger/google/token.json`
//! (the JSON shape Google's own client libraries write, so a token minted by
//! any standard OAuth flow drops in) and refreshes the access token through
//! the token endpoint when it has expired. This tool never runs the initial
//! consent flow itself.

pub mod calendar;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum GoogleApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Google token expired or revoked; re-authorize and try again")]
    AuthExpired,
    #[error("Google token not found at {0}")]
    TokenNotFound(PathBuf),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("Google API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<GoogleApiError> for PortError {
    fn from(err: GoogleApiError) -> Self {
        match err {
            GoogleApiError::Api { status, message } => PortError::Api { status, message },
            GoogleApiError::Http(e) => PortError::Transport(e.to_string()),
            GoogleApiError::Io(e) => PortError::Transport(e.to_string()),
            other => PortError::Auth(other.to_string()),
        }
    }
}

/// OAuth2 token payload. Field names match what Google's client libraries
/// write; both `token` and `access_token` are accepted on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleToken {
    #[serde(alias = "access_token")]
    pub token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Path to the token file: `~/.meetledger/google/token.json`.
pub fn token_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".meetledger")
        .join("google")
        .join("token.json")
}

pub fn load_token() -> Result<GoogleToken, GoogleApiError> {
    let path = token_path();
    if !path.exists() {
        return Err(GoogleApiError::TokenNotFound(path));
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_token(token: &GoogleToken) -> Result<(), GoogleApiError> {
    let path = token_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(token)?)?;
    Ok(())
}

/// A token is treated as expired within 60 seconds of its recorded expiry,
/// or when the expiry is missing or unreadable.
pub fn is_token_expired(token: &GoogleToken) -> bool {
    match &token.expiry {
        None => true,
        Some(expiry_str) => {
            match chrono::DateTime::parse_from_rfc3339(&expiry_str.replace('Z', "+00:00"))
                .or_else(|_| chrono::DateTime::parse_from_rfc3339(expiry_str))
            {
                Ok(expiry) => expiry <= chrono::Utc::now() + chrono::Duration::seconds(60),
                Err(_) => true,
            }
        }
    }
}

/// Exchange the refresh token for a new access token and persist the result.
pub async fn refresh_access_token(token: &GoogleToken) -> Result<GoogleToken, GoogleApiError> {
    let refresh_token = token
        .refresh_token
        .as_deref()
        .ok_or(GoogleApiError::AuthExpired)?;

    let mut form = vec![
        ("client_id", token.client_id.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    if let Some(secret) = token.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }

    let client = reqwest::Client::new();
    let response = client.post(&token.token_uri).form(&form).send().await?;
    let status = response.status();
    let body_text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        let lowered = body_text.to_lowercase();
        if lowered.contains("invalid_grant") || lowered.contains("expired") {
            return Err(GoogleApiError::AuthExpired);
        }
        return Err(GoogleApiError::RefreshFailed(format!(
            "HTTP {status}: {body_text}"
        )));
    }

    let body: serde_json::Value = serde_json::from_str(&body_text)?;
    let access_token = body["access_token"]
        .as_str()
        .ok_or_else(|| GoogleApiError::RefreshFailed("no access_token in response".into()))?;
    let expires_in = body["expires_in"].as_u64().unwrap_or(3600);
    let expiry = chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64);

    let mut refreshed = token.clone();
    refreshed.token = access_token.to_string();
    refreshed.expiry = Some(expiry.to_rfc3339());
    save_token(&refreshed)?;

    Ok(refreshed)
}

/// Load the stored token, refreshing it first if expired. The entry point
/// for every calendar call.
pub async fn get_valid_access_token() -> Result<String, GoogleApiError> {
    let token = load_token()?;
    if is_token_expired(&token) {
        let refreshed = refresh_access_token(&token).await?;
        Ok(refreshed.token)
    } else {
        Ok(token.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expiry: Option<String>) -> GoogleToken {
        GoogleToken {
            token: "ya29.test".into(),
            refresh_token: Some("1//refresh".into()),
            token_uri: default_token_uri(),
            client_id: "client.apps.googleusercontent.com".into(),
            client_secret: Some("secret".into()),
            expiry,
        }
    }

    #[test]
    fn test_token_accepts_both_field_spellings() {
        let as_token: GoogleToken = serde_json::from_str(
            r#"{"token": "ya29.a", "refresh_token": "r", "client_id": "c"}"#,
        )
        .unwrap();
        assert_eq!(as_token.token, "ya29.a");

        let as_access_token: GoogleToken = serde_json::from_str(
            r#"{"access_token": "ya29.b", "refresh_token": "r", "client_id": "c"}"#,
        )
        .unwrap();
        assert_eq!(as_access_token.token, "ya29.b");
        assert_eq!(as_access_token.token_uri, default_token_uri());
    }

    #[test]
    fn test_expiry_handling() {
        assert!(is_token_expired(&token(None)));
        assert!(is_token_expired(&token(Some("garbage".into()))));

        let past = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        assert!(is_token_expired(&token(Some(past))));

        let future = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        assert!(!is_token_expired(&token(Some(future))));

        // Google's own format uses a trailing Z with fractional seconds.
        let future_z = (chrono::Utc::now() + chrono::Duration::hours(1))
            .format("%Y-%m-%dT%H:%M:%S%.6fZ")
            .to_string();
        assert!(!is_token_expired(&token(Some(future_z))));
    }
}

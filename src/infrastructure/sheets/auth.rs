//! Google service account authentication (OAuth2 JWT bearer flow)

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::application::errors::InventoryError;

/// Scopes the bot needs
pub const SCOPES: &[&str] = &[
    "https://spreadsheets.google.com/feeds",
    "https://www.googleapis.com/auth/drive",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Assertions are valid for one hour
const ASSERTION_TTL_SECS: i64 = 3600;

/// Refresh this long before the access token expires
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Fields of a service account key file we use
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(content: &str) -> Result<Self, InventoryError> {
        serde_json::from_str(content)
            .map_err(|e| InventoryError::Credentials(format!("invalid key file: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Mints and caches access tokens for a service account key file
pub struct ServiceAccountAuth {
    key_path: PathBuf,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key_path: impl Into<PathBuf>, client: Client) -> Self {
        Self {
            key_path: key_path.into(),
            client,
            cached: Mutex::new(None),
        }
    }

    /// Whether the key file is where it is expected
    pub fn key_present(&self) -> bool {
        self.key_path.is_file()
    }

    /// A bearer token, reusing the cached one while it is fresh
    pub async fn access_token(&self) -> Result<String, InventoryError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let key = self.load_key().await?;
        let fresh = self.exchange(&key, now).await?;
        tracing::debug!("Obtained Google access token for {}", key.client_email);
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn load_key(&self) -> Result<ServiceAccountKey, InventoryError> {
        let content = tokio::fs::read_to_string(&self.key_path).await.map_err(|e| {
            tracing::error!(
                "Credentials file {} not found or unreadable: {}. Check the mounted secret files.",
                self.key_path.display(),
                e
            );
            InventoryError::Credentials(format!("{}: {}", self.key_path.display(), e))
        })?;
        ServiceAccountKey::from_json(&content)
    }

    async fn exchange(&self, key: &ServiceAccountKey, now: i64) -> Result<CachedToken, InventoryError> {
        let assertion = sign_assertion(key, now)?;

        let response = self.client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| InventoryError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InventoryError::Auth(format!("{}: {}", status, body)));
        }

        let data: TokenResponse = response
            .json()
            .await
            .map_err(|e| InventoryError::Auth(format!("bad token response: {}", e)))?;

        Ok(CachedToken {
            value: data.access_token,
            expires_at: now + data.expires_in,
        })
    }
}

/// RS256-signed JWT asserting the service account identity
pub fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, InventoryError> {
    let claims = Claims {
        iss: &key.client_email,
        scope: SCOPES.join(" "),
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_TTL_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| InventoryError::Credentials(format!("invalid private key: {}", e)))?;

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| InventoryError::Credentials(format!("cannot sign assertion: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"type":"service_account","client_email":"bot@proj.iam.gserviceaccount.com","private_key":"x"}"#,
        ).unwrap();
        assert_eq!(key.client_email, "bot@proj.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_key_rejects_garbage() {
        assert!(matches!(
            ServiceAccountKey::from_json("{}"),
            Err(InventoryError::Credentials(_))
        ));
    }

    #[test]
    fn test_bad_private_key() {
        let key = ServiceAccountKey {
            client_email: "bot@example.com".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        assert!(matches!(sign_assertion(&key, 0), Err(InventoryError::Credentials(_))));
    }

    #[tokio::test]
    async fn test_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let auth = ServiceAccountAuth::new(dir.path().join("service_account.json"), Client::new());
        assert!(!auth.key_present());
        assert!(matches!(auth.access_token().await, Err(InventoryError::Credentials(_))));
    }
}

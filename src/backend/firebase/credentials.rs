//! Short-lived OAuth access tokens minted from a service-account key
//! (JWT bearer grant), used to authorize FCM and Instance ID calls.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, Secret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::common::DispatchError;

pub const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, DispatchError>;
}

#[derive(Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, DispatchError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| DispatchError::Credentials(format!("{}: {err}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|err| DispatchError::Credentials(format!("{}: {err}", path.display())))
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

fn assertion_claims<'a>(key: &'a ServiceAccountKey, scope: &'a str, now: i64) -> AssertionClaims<'a> {
    AssertionClaims {
        iss: &key.client_email,
        scope,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// Signs assertions with the service-account key and caches the exchanged
/// token until shortly before it expires.
pub struct ServiceAccountTokenSource {
    http: reqwest::Client,
    key: ServiceAccountKey,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(http: reqwest::Client, key: ServiceAccountKey, scope: impl Into<String>) -> Self {
        Self {
            http,
            key,
            scope: scope.into(),
            cached: Mutex::new(None),
        }
    }

    fn sign_assertion(&self) -> Result<String, DispatchError> {
        let claims = assertion_claims(&self.key, &self.scope, chrono::Utc::now().timestamp());
        let key = EncodingKey::from_rsa_pem(self.key.private_key.expose_secret().as_bytes())?;
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<SecretString, DispatchError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(Secret::new(token.token.expose_secret().clone()));
            }
        }

        let assertion = self.sign_assertion()?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Credentials(format!(
                "token exchange returned {status}: {body}"
            )));
        }

        let exchanged: TokenResponse = response.json().await?;
        log::debug!(
            "Minted access token for {} ({}s)",
            self.key.client_email,
            exchanged.expires_in
        );
        *cached = Some(CachedToken {
            token: Secret::new(exchanged.access_token.clone()),
            expires_at: Instant::now() + Duration::from_secs(exchanged.expires_in),
        });
        Ok(Secret::new(exchanged.access_token))
    }
}

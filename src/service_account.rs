use crate::store::StoreError;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tokio::sync::Mutex;
use tracing::{debug, error};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub(crate) const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ServiceAccount {
    pub email: String,
    pub private_key: String,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME.as_secs()
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    valid_until: Instant,
}

/// Exchanges a signed service account assertion for OAuth2 access tokens.
#[derive(Debug, Clone)]
pub struct TokenSource {
    client: reqwest::Client,
    token_url: String,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenSource {
    pub fn new(client: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            cached: Arc::default(),
        }
    }

    pub async fn access_token(&self, account: &ServiceAccount) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.valid_until > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.assertion(account)?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let code = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%code, %body, "Token exchange rejected");
            return Err(StoreError::Status { code, body });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!(expires_in = token.expires_in, "Fetched new access token");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            valid_until: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn assertion(&self, account: &ServiceAccount) -> Result<String, StoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            iss: &account.email,
            scope: SHEETS_SCOPE,
            aud: &self.token_url,
            iat: now,
            exp: now + ASSERTION_LIFETIME.as_secs(),
        };
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }
}

/// Keys pasted into env files usually carry literal `\n` sequences.
pub fn normalize_private_key(key: &str) -> String {
    key.replace("\\n", "\n")
}

//! IBM Cloud IAM Authentication
//!
//! Exchanges an API key for a bearer token at the IAM token endpoint and
//! caches it until shortly before it expires.

use super::http::IbmHttpClient;
use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Public IAM endpoint
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Environment variables checked for an API key, in order
const API_KEY_ENV_VARS: &[&str] = &["IC_API_KEY", "IBMCLOUD_API_KEY"];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    #[serde(default)]
    account: Option<AccountClaim>,
}

#[derive(Debug, Deserialize)]
struct AccountClaim {
    #[serde(default)]
    bss: Option<String>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// IAM credentials holder with token caching
#[derive(Clone)]
pub struct IamCredentials {
    api_key: String,
    token_url: String,
    http: IbmHttpClient,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl IamCredentials {
    pub fn new(api_key: &str, iam_url: &str, http: IbmHttpClient) -> Self {
        Self {
            api_key: api_key.to_string(),
            token_url: format!("{}/identity/token", iam_url.trim_end_matches('/')),
            http,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls.
    /// Concurrent callers that miss the cache share a single exchange.
    pub async fn get_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.token.clone());
            }
        }

        // The write lock is held across the exchange
        let mut cache = self.token_cache.write().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.token.clone());
        }
        tracing::debug!("No valid cached token, fetching new token");

        let response: TokenResponse = self
            .http
            .post_form(
                &self.token_url,
                &[("grant_type", APIKEY_GRANT_TYPE), ("apikey", self.api_key.as_str())],
            )
            .await
            .context("Failed to get IAM access token")?;

        let ttl = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_EXPIRY_BUFFER);
        let expires_at = Instant::now() + ttl;

        *cache = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at,
        });
        drop(cache);

        tracing::debug!("New token cached, expires in ~{} minutes", ttl.as_secs() / 60);

        Ok(response.access_token)
    }

    /// Force refresh the token
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }

    /// Account the API key belongs to, read from the access token
    pub async fn account_id(&self) -> Result<String> {
        let token = self.get_token().await?;
        account_from_token(&token).context("Access token carries no account ID")
    }
}

/// Read the API key from the environment
pub fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|key| !key.trim().is_empty())
}

/// Extract the `account.bss` claim from a JWT access token.
/// The signature is not verified; the token came straight from IAM.
pub fn account_from_token(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: AccessTokenClaims = serde_json::from_slice(&bytes).ok()?;

    claims
        .account
        .and_then(|a| a.bss)
        .filter(|id| !id.is_empty())
}

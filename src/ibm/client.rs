//! IBM Cloud Client
//!
//! Main client for interacting with IBM Cloud APIs, combining IAM
//! authentication and HTTP functionality. The account a call targets is
//! always passed explicitly; the client itself holds no account.

use super::auth::{IamCredentials, DEFAULT_IAM_URL};
use super::http::IbmHttpClient;
use anyhow::Result;
use serde::de::DeserializeOwned;

/// Service endpoints used by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub iam_url: String,
    pub findings_url: String,
}

impl Endpoints {
    /// Public endpoints for a region
    pub fn for_region(region: &str) -> Self {
        Self {
            iam_url: DEFAULT_IAM_URL.to_string(),
            findings_url: format!("https://{}.secadvisor.cloud.ibm.com/findings", region),
        }
    }
}

/// Main IBM Cloud client
#[derive(Clone)]
pub struct IbmClient {
    pub credentials: IamCredentials,
    pub http: IbmHttpClient,
    pub endpoints: Endpoints,
}

impl IbmClient {
    pub fn new(api_key: &str, endpoints: Endpoints) -> Result<Self> {
        let http = IbmHttpClient::new()?;
        let credentials = IamCredentials::new(api_key, &endpoints.iam_url, http.clone());

        Ok(Self {
            credentials,
            http,
            endpoints,
        })
    }

    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Account owning the configured API key
    pub async fn default_account_id(&self) -> Result<String> {
        self.credentials.account_id().await
    }

    // =========================================================================
    // Findings API helpers
    // =========================================================================

    /// Build Findings API URL scoped to an account
    pub fn findings_url(&self, account_id: &str, path: &str) -> String {
        format!(
            "{}/v1/{}/{}",
            self.endpoints.findings_url.trim_end_matches('/'),
            urlencoding::encode(account_id),
            path
        )
    }
}

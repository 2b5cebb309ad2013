//! HTTP utilities for IBM Cloud REST API calls

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for IBM Cloud API calls
#[derive(Clone)]
pub struct IbmHttpClient {
    client: Client,
}

impl IbmHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ibm-findings/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make an authenticated GET request and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// POST a form-encoded body (used by the IAM token endpoint)
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T> {
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only the sanitized body is logged; it is never part of the error
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format an IBM Cloud API error for display
pub fn format_ibm_error(error: &anyhow::Error) -> String {
    let error_str = format!("{:#}", error);

    // Only API status failures get the friendly messages; anything else
    // (validation, config) is shown as-is
    if let Some(status) = error_str
        .split("API request failed: ")
        .nth(1)
        .and_then(|rest| rest.get(..3))
    {
        return match status {
            "401" => "Authentication failed. Check IC_API_KEY.".to_string(),
            "403" => "Permission denied. Check your IAM access policies.".to_string(),
            "404" => "Resource not found.".to_string(),
            "429" => "Rate limit exceeded. Please try again later.".to_string(),
            "400" => "Invalid request. Check your parameters.".to_string(),
            "500" | "502" | "503" => {
                "IBM Cloud service temporarily unavailable. Please try again.".to_string()
            }
            _ => "Request failed. Check your network connection and try again.".to_string(),
        };
    }

    let mut printable = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ');
    let sanitized = printable.by_ref().take(120).collect::<String>();

    if printable.next().is_some() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

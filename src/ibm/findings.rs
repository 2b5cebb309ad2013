//! Security and Compliance Findings providers
//!
//! Lists every findings provider registered in an account by draining the
//! paged `GET /v1/{account_id}/providers` endpoint.

use super::client::IbmClient;
use crate::composite_id::CompositeId;
use crate::pagination::{Collector, Page, PageRequest, PageSource};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Largest page the providers endpoint accepts
pub const MAX_PAGE_SIZE: u64 = 200;

/// Provider as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiProvider {
    /// Name in the form `{account_id}/providers/{provider_id}`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListProvidersResponse {
    #[serde(default)]
    pub providers: Vec<ApiProvider>,
    #[serde(default)]
    pub total_count: u64,
}

/// Page source for one account's providers
pub struct ProvidersPageSource<'a> {
    client: &'a IbmClient,
    account_id: &'a str,
}

impl<'a> ProvidersPageSource<'a> {
    pub fn new(client: &'a IbmClient, account_id: &'a str) -> Self {
        Self { client, account_id }
    }

    fn page_url(&self, request: PageRequest) -> Result<Url> {
        let mut url = Url::parse(&self.client.findings_url(self.account_id, "providers"))
            .context("Invalid findings endpoint URL")?;

        if request.skip.is_some() || request.limit.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(skip) = request.skip {
                query.append_pair("skip", &skip.to_string());
            }
            if let Some(limit) = request.limit {
                query.append_pair("limit", &limit.to_string());
            }
        }

        Ok(url)
    }
}

impl PageSource<ApiProvider> for ProvidersPageSource<'_> {
    async fn fetch_page(&self, request: PageRequest) -> Result<Page<ApiProvider>> {
        let url = self.page_url(request)?;
        let response: ListProvidersResponse = self.client.get(url.as_str()).await?;
        Ok(Page::new(response.providers, response.total_count))
    }
}

/// What to list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvidersQuery {
    /// Account to list; defaults to the API key's account
    pub account_id: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Flattened provider; absent fields are omitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `(account_id, provider_id)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<CompositeId>,
}

/// Result of a providers listing
#[derive(Debug, Clone, Serialize)]
pub struct ProvidersListing {
    /// Snapshot identifier (UTC time of the listing)
    pub id: String,
    pub account_id: String,
    pub providers: Vec<ProviderRecord>,
    pub total_count: u64,
}

/// Reject page sizes the providers endpoint would refuse
pub fn validate_page_size(limit: u64) -> Result<()> {
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        anyhow::bail!(
            "limit must be between 1 and {}, got {}",
            MAX_PAGE_SIZE,
            limit
        );
    }
    Ok(())
}

/// Split a provider name of the form `{account_id}/providers/{provider_id}`
pub fn parse_provider_name(name: &str) -> Option<(&str, &str)> {
    let (account_id, rest) = name.split_once('/')?;
    let provider_id = rest.strip_prefix("providers/")?;
    if account_id.is_empty() || provider_id.is_empty() {
        return None;
    }
    Some((account_id, provider_id))
}

/// Flatten API providers, keeping only the fields that are present
pub fn flatten_providers(account_id: &str, providers: Vec<ApiProvider>) -> Vec<ProviderRecord> {
    providers
        .into_iter()
        .map(|provider| {
            let provider_id = provider.id.as_deref().or_else(|| {
                provider
                    .name
                    .as_deref()
                    .and_then(parse_provider_name)
                    .map(|(_, id)| id)
            });
            let resource_id = provider_id.and_then(|id| CompositeId::pair(account_id, id).ok());

            ProviderRecord {
                name: provider.name,
                id: provider.id,
                resource_id,
            }
        })
        .collect()
}

/// Explicit account, else the one owning the API key
pub async fn resolve_account(client: &IbmClient, account_id: Option<&str>) -> Result<String> {
    match account_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            tracing::debug!("Using specified account ID {}", id);
            Ok(id.to_string())
        }
        None => {
            let id = client.default_account_id().await?;
            tracing::debug!("Account ID not specified, using {}", id);
            Ok(id)
        }
    }
}

/// List every provider matching the query
pub async fn list_providers(
    client: &IbmClient,
    collector: &Collector,
    query: &ProvidersQuery,
) -> Result<ProvidersListing> {
    if let Some(limit) = query.limit {
        validate_page_size(limit)?;
    }

    let account_id = resolve_account(client, query.account_id.as_deref()).await?;
    let source = ProvidersPageSource::new(client, &account_id);

    let collected = collector
        .collect_all(&source, PageRequest::new(query.skip, query.limit))
        .await
        .inspect_err(|e| tracing::debug!("ListProviders failed for {}: {:#}", account_id, e))
        .context("ListProviders failed")?;

    tracing::info!(
        "Listed {} of {} providers in account {}",
        collected.items.len(),
        collected.total_count,
        account_id
    );

    Ok(ProvidersListing {
        id: chrono::Utc::now().to_rfc3339(),
        providers: flatten_providers(&account_id, collected.items),
        total_count: collected.total_count,
        account_id,
    })
}

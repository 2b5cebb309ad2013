//! IBM Cloud API interaction module
//!
//! # Module Structure
//!
//! - [`auth`] - IAM API-key authentication with token caching
//! - [`client`] - Main client combining credentials, HTTP and endpoints
//! - [`http`] - HTTP utilities for REST API calls
//! - [`findings`] - Security and Compliance findings providers
//!
//! # Example
//!
//! ```ignore
//! use ibm_findings::ibm::client::{Endpoints, IbmClient};
//! use ibm_findings::ibm::findings::{list_providers, ProvidersQuery};
//! use ibm_findings::Collector;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = IbmClient::new("api-key", Endpoints::for_region("us-south"))?;
//!     let collector = Collector::new().with_page_size(100);
//!     let listing = list_providers(&client, &collector, &ProvidersQuery::default()).await?;
//!     println!("{} providers", listing.total_count);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod findings;
pub mod http;

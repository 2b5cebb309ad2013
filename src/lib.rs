//! List IBM Cloud Security and Compliance findings providers.
//!
//! - [`pagination`] - drains skip/limit paged endpoints into one collection
//! - [`composite_id`] - structured identifiers for nested resources
//! - [`ibm`] - IAM authentication, HTTP client and the findings API
//! - [`config`] - persisted defaults

pub mod composite_id;
pub mod config;
pub mod ibm;
pub mod pagination;

pub use composite_id::{CompositeId, IdError};
pub use pagination::{
    collect_all, Collected, Collector, Page, PageRequest, PageSource, PaginationError,
};

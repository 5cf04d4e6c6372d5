//! Remote list API client.
//!
//! This crate talks to the directory/list service that hosts the survey
//! responses. It focuses on:
//!
//! - Acquiring and caching a bearer credential ([`TokenProvider`])
//! - Resolving a site path and list display name to stable identifiers
//!   ([`GraphClient::resolve`])
//! - Retrieving every item of a list across continuation cursors
//!   ([`GraphClient::fetch_all`])
//!
//! All HTTP goes through the [`GraphTransport`] seam; [`ReqwestTransport`] is
//! the production implementation.
//!
//! # Example
//!
//! ```ignore
//! use intake_api::{ClientCredentials, GraphClient, GraphSettings};
//! use intake_types::ResourceKey;
//!
//! async fn run() -> Result<(), intake_api::GraphError> {
//!     let credentials = ClientCredentials::new("tenant", "client", "secret")?;
//!     let client = GraphClient::new(GraphSettings::default(), credentials)?;
//!     let key = ResourceKey::new("contoso.sharepoint.com", "/sites/Intake", "Survey 2024");
//!     let handle = client.resolve(&key).await?;
//!     let records = client.fetch_all(&handle, None).await?;
//!     println!("{} records", records.len());
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod locator;
mod pager;
mod token;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{DEFAULT_AUTHORITY_URL, DEFAULT_GRAPH_BASE_URL, DEFAULT_SCOPE, GraphClient, GraphSettings};
pub use error::{GraphError, ResourceKind};
pub use locator::{ListSummary, find_list};
pub use pager::{NEXT_LINK_FIELD, project_record};
pub use token::{ClientCredentials, Credential, TokenProvider};
pub use transport::{GraphTransport, HttpReply, ReqwestTransport};

//! # Nefino SDK
//!
//! Authenticated client for the Nefino renewable-energy news API.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nefino_sdk::{CredentialConfig, NefinoClient, NefinoResult};
//! use nefino_core::{NewsQuery, PlaceType, SearchWindow};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> NefinoResult<()> {
//!     let client = NefinoClient::builder()
//!         .base_url("https://api.nefino.li")
//!         .credentials(CredentialConfig::ApiKey {
//!             api_key: SecretString::from("sk-your-api-key".to_string()),
//!         })
//!         .build()?;
//!
//!     let query = NewsQuery::new("DE-09162", PlaceType::LocalAdministrativeUnit)
//!         .with_window(SearchWindow::Recency { last_n_days: 7 });
//!
//!     let result = client.news().search(&query).await?;
//!     println!("Found {} news items", result.item_count);
//!
//!     Ok(())
//! }
//! ```
//!
//! Requests are never retried. Errors carry an [`ErrorKind`] so callers can
//! tell throttling from authentication or provider failures.

pub mod api;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod transport;

// Re-export main client
pub use client::{NefinoClient, NefinoClientBuilder};
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_NEWS_PATH};
pub use credential::{
    Credential, CredentialCache, CredentialConfig, CredentialSource, CredentialStatus,
};
pub use error::{ErrorKind, NefinoError, NefinoResult};

// Re-export core types for convenience
pub use nefino_core::{
    NewsItem, NewsQuery, NewsResult, NewsTopic, PlaceType, RangeOrRecency, SearchWindow,
    ValidationError,
};

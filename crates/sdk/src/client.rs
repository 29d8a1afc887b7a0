//! Main client for the Nefino SDK.

use crate::api::NewsApi;
use crate::config::ClientConfig;
use crate::credential::{CredentialCache, CredentialConfig, CredentialSource, CredentialStatus};
use crate::error::{NefinoError, NefinoResult};
use crate::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Main client for interacting with the Nefino API.
#[derive(Clone)]
pub struct NefinoClient {
    config: Arc<ClientConfig>,
    pub(crate) http: HttpTransport,
}

impl NefinoClient {
    /// Create a new client builder.
    pub fn builder() -> NefinoClientBuilder {
        NefinoClientBuilder::new()
    }

    /// Create a client from configuration and a credential cache.
    pub fn from_parts(config: ClientConfig, credentials: Arc<CredentialCache>) -> NefinoResult<Self> {
        let config = Arc::new(config);
        let http = HttpTransport::new(config.clone(), credentials)?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the news API.
    pub fn news(&self) -> NewsApi<'_> {
        NewsApi::new(self)
    }

    /// Snapshot of the credential cache.
    pub async fn credential_status(&self) -> CredentialStatus {
        self.http.credentials().status().await
    }
}

enum PendingCredential {
    Config(CredentialConfig),
    Source(Arc<dyn CredentialSource>),
}

/// Builder for creating a NefinoClient.
pub struct NefinoClientBuilder {
    base_url: Option<String>,
    news_path: Option<String>,
    timeout: Duration,
    refresh_timeout: Duration,
    refresh_skew: Duration,
    user_agent: Option<String>,
    credential: Option<PendingCredential>,
}

impl NefinoClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            news_path: None,
            timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(15),
            refresh_skew: Duration::from_secs(30),
            user_agent: None,
            credential: None,
        }
    }

    /// Set the base URL of the Nefino API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the path of the news endpoint.
    pub fn news_path(mut self, path: impl Into<String>) -> Self {
        self.news_path = Some(path.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the credential refresh timeout.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Set how long before expiry a credential is refreshed.
    pub fn refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Use credentials described by configuration.
    pub fn credentials(mut self, config: CredentialConfig) -> Self {
        self.credential = Some(PendingCredential::Config(config));
        self
    }

    /// Use an already constructed credential source.
    pub fn credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credential = Some(PendingCredential::Source(source));
        self
    }

    /// Build the client.
    pub fn build(self) -> NefinoResult<NefinoClient> {
        let base_url_str = self
            .base_url
            .ok_or_else(|| NefinoError::Config("base_url is required".to_string()))?;
        let base_url = Url::parse(&base_url_str)?;

        let source = match self.credential {
            Some(PendingCredential::Config(config)) => config.into_source(self.refresh_timeout)?,
            Some(PendingCredential::Source(source)) => source,
            None => return Err(NefinoError::Config("credentials are required".to_string())),
        };

        let mut config = ClientConfig::new(base_url);
        config.timeout = self.timeout;
        config.refresh_timeout = self.refresh_timeout;
        if let Some(path) = self.news_path {
            config.news_path = path;
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }

        let credentials = Arc::new(
            CredentialCache::new(source)
                .with_refresh_skew(self.refresh_skew)
                .with_refresh_timeout(self.refresh_timeout),
        );

        NefinoClient::from_parts(config, credentials)
    }
}

impl Default for NefinoClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

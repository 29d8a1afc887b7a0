use anyhow::{anyhow, bail, Context, Result};
use nefino_sdk::{CredentialConfig, NefinoClient, DEFAULT_BASE_URL, DEFAULT_NEWS_PATH};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Process configuration: TOML file, then environment overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub credential: CredentialSettings,

    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_news_path")]
    pub news_path: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_news_path() -> String {
    DEFAULT_NEWS_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            news_path: default_news_path(),
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    ApiKey,
    SignedAssertion,
    ClientCredentials,
}

#[derive(Clone, Deserialize)]
pub struct CredentialSettings {
    #[serde(default)]
    pub mode: Option<CredentialMode>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub token_url: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,

    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_refresh_skew_secs() -> u64 {
    30
}

fn default_refresh_timeout_secs() -> u64 {
    15
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            mode: None,
            api_key: None,
            username: None,
            jwt_secret: None,
            ttl_secs: default_ttl_secs(),
            client_id: None,
            client_secret: None,
            token_url: None,
            scope: None,
            refresh_skew_secs: default_refresh_skew_secs(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
        }
    }
}

// Secrets stay out of logs
impl fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redacted(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "[REDACTED]"
            } else {
                "None"
            }
        }

        f.debug_struct("CredentialSettings")
            .field("mode", &self.mode)
            .field("api_key", &redacted(&self.api_key))
            .field("username", &self.username)
            .field("jwt_secret", &redacted(&self.jwt_secret))
            .field("ttl_secs", &self.ttl_secs)
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .field("refresh_skew_secs", &self.refresh_skew_secs)
            .field("refresh_timeout_secs", &self.refresh_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthConfig {
    /// Address for the HTTP health endpoint; disabled when unset
    #[serde(default)]
    pub addr: Option<String>,
}

impl AppConfig {
    /// Load from `config_path` if it exists, then apply `NEFINO_*` variables.
    pub fn load(config_path: &Path) -> Result<Self> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(
        config_path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read configuration file {}", config_path.display())
            })?;
            toml::from_str(&content).with_context(|| {
                format!("Failed to parse configuration file {}", config_path.display())
            })?
        } else {
            tracing::info!(
                path = %config_path.display(),
                "Configuration file not found, using defaults"
            );
            Self::default()
        };

        config.apply_env(lookup);
        Ok(config)
    }

    /// Environment values win over the file. Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("NEFINO_BASE_URL") {
            self.upstream.base_url = v;
        }
        if let Some(v) = var("NEFINO_NEWS_PATH") {
            self.upstream.news_path = v;
        }

        let credential = &mut self.credential;
        for (key, slot) in [
            ("NEFINO_API_KEY", &mut credential.api_key),
            ("NEFINO_USERNAME", &mut credential.username),
            ("NEFINO_JWT_SECRET", &mut credential.jwt_secret),
            ("NEFINO_CLIENT_ID", &mut credential.client_id),
            ("NEFINO_CLIENT_SECRET", &mut credential.client_secret),
            ("NEFINO_TOKEN_URL", &mut credential.token_url),
            ("NEFINO_SCOPE", &mut credential.scope),
        ] {
            if let Some(v) = var(key) {
                *slot = Some(v);
            }
        }
    }

    /// The configured mode, or the first one whose material is present:
    /// api key, then client credentials, then signed assertion.
    pub fn credential_mode(&self) -> Result<CredentialMode> {
        let c = &self.credential;
        if let Some(mode) = c.mode {
            return Ok(mode);
        }
        if c.api_key.is_some() {
            Ok(CredentialMode::ApiKey)
        } else if c.client_id.is_some() {
            Ok(CredentialMode::ClientCredentials)
        } else if c.username.is_some() {
            Ok(CredentialMode::SignedAssertion)
        } else {
            bail!(
                "No credentials configured: set NEFINO_API_KEY, NEFINO_CLIENT_ID and \
                 NEFINO_CLIENT_SECRET, or NEFINO_USERNAME and NEFINO_JWT_SECRET"
            )
        }
    }

    pub fn credential_config(&self) -> Result<CredentialConfig> {
        let c = &self.credential;
        let mode = self.credential_mode()?;

        let required = |value: &Option<String>, name: &str| -> Result<String> {
            value
                .clone()
                .ok_or_else(|| anyhow!("Credential mode {:?} requires {}", mode, name))
        };

        Ok(match mode {
            CredentialMode::ApiKey => CredentialConfig::ApiKey {
                api_key: SecretString::from(required(&c.api_key, "api_key")?),
            },
            CredentialMode::SignedAssertion => CredentialConfig::SignedAssertion {
                username: required(&c.username, "username")?,
                secret: SecretString::from(required(&c.jwt_secret, "jwt_secret")?),
                ttl: Duration::from_secs(c.ttl_secs),
            },
            CredentialMode::ClientCredentials => {
                let token_url = required(&c.token_url, "token_url")?;
                CredentialConfig::ClientCredentials {
                    client_id: required(&c.client_id, "client_id")?,
                    client_secret: SecretString::from(required(
                        &c.client_secret,
                        "client_secret",
                    )?),
                    token_url: Url::parse(&token_url)
                        .with_context(|| format!("Invalid token_url {}", token_url))?,
                    scope: c.scope.clone(),
                }
            }
        })
    }

    /// Build the upstream client described by this configuration
    pub fn client(&self) -> Result<NefinoClient> {
        if self.upstream.timeout_secs == 0 {
            bail!("upstream.timeout_secs must be positive");
        }

        let mut builder = NefinoClient::builder()
            .base_url(self.upstream.base_url.clone())
            .news_path(self.upstream.news_path.clone())
            .timeout(Duration::from_secs(self.upstream.timeout_secs))
            .refresh_skew(Duration::from_secs(self.credential.refresh_skew_secs))
            .refresh_timeout(Duration::from_secs(self.credential.refresh_timeout_secs))
            .credentials(self.credential_config()?);
        if let Some(user_agent) = &self.upstream.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        builder.build().context("Failed to build Nefino client")
    }
}

use super::{Credential, CredentialSource};
use crate::error::{NefinoError, NefinoResult};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Static API key sent as a bearer token.
pub struct StaticToken {
    token: SecretString,
}

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait::async_trait]
impl CredentialSource for StaticToken {
    async fn acquire(&self) -> NefinoResult<Credential> {
        Ok(Credential::never_expiring(self.token.clone()))
    }

    fn name(&self) -> &'static str {
        "api_key"
    }
}

/// Longest lifetime accepted for a locally signed assertion
pub const MAX_ASSERTION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Short-lived HS256 assertion signed locally with a shared secret.
pub struct SignedAssertion {
    username: String,
    secret: SecretString,
    ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl SignedAssertion {
    pub fn new(username: impl Into<String>, secret: SecretString, ttl: Duration) -> NefinoResult<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(NefinoError::Config("username must not be empty".to_string()));
        }
        if secret.expose_secret().is_empty() {
            return Err(NefinoError::Config("jwt secret must not be empty".to_string()));
        }
        if ttl.is_zero() {
            return Err(NefinoError::Config("assertion ttl must be positive".to_string()));
        }
        if ttl > MAX_ASSERTION_TTL {
            return Err(NefinoError::Config(format!(
                "assertion ttl must not exceed {} seconds",
                MAX_ASSERTION_TTL.as_secs()
            )));
        }
        Ok(Self {
            username,
            secret,
            ttl,
        })
    }

    fn sign(&self, now: i64) -> NefinoResult<String> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| NefinoError::Authentication("assertion expiry out of range".to_string()))?;
        let claims = AssertionClaims {
            sub: self.username.clone(),
            iat: now,
            exp,
        };
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| NefinoError::Authentication(format!("failed to sign assertion: {}", e)))
    }
}

#[async_trait::async_trait]
impl CredentialSource for SignedAssertion {
    async fn acquire(&self) -> NefinoResult<Credential> {
        let token = self.sign(chrono::Utc::now().timestamp())?;
        Ok(Credential::expiring_in(SecretString::from(token), self.ttl))
    }

    fn name(&self) -> &'static str {
        "signed_assertion"
    }
}

/// OAuth2 client-credentials exchange against a token endpoint.
pub struct ClientCredentials {
    client_id: String,
    client_secret: SecretString,
    token_url: Url,
    scope: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        token_url: Url,
        scope: Option<String>,
        timeout: Duration,
    ) -> NefinoResult<Self> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(NefinoError::Config("client_id must not be empty".to_string()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client_id,
            client_secret,
            token_url,
            scope,
            http,
        })
    }
}

#[async_trait::async_trait]
impl CredentialSource for ClientCredentials {
    async fn acquire(&self) -> NefinoResult<Credential> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];
        if let Some(ref scope) = self.scope {
            form.push(("scope", scope.as_str()));
        }

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| NefinoError::Authentication(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NefinoError::Authentication(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let payload: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| NefinoError::Authentication(format!("malformed token response: {}", e)))?;

        let token = SecretString::from(payload.access_token);
        Ok(match payload.expires_in {
            Some(secs) => Credential::expiring_in(token, Duration::from_secs(secs)),
            None => Credential::never_expiring(token),
        })
    }

    fn name(&self) -> &'static str {
        "client_credentials"
    }
}

/// Which credential source to build, with its material.
#[derive(Debug, Clone)]
pub enum CredentialConfig {
    ApiKey {
        api_key: SecretString,
    },
    SignedAssertion {
        username: String,
        secret: SecretString,
        ttl: Duration,
    },
    ClientCredentials {
        client_id: String,
        client_secret: SecretString,
        token_url: Url,
        scope: Option<String>,
    },
}

impl CredentialConfig {
    pub fn mode(&self) -> &'static str {
        match self {
            CredentialConfig::ApiKey { .. } => "api_key",
            CredentialConfig::SignedAssertion { .. } => "signed_assertion",
            CredentialConfig::ClientCredentials { .. } => "client_credentials",
        }
    }

    /// Build the source. `timeout` bounds token endpoint calls.
    pub fn into_source(self, timeout: Duration) -> NefinoResult<Arc<dyn CredentialSource>> {
        Ok(match self {
            CredentialConfig::ApiKey { api_key } => {
                if api_key.expose_secret().trim().is_empty() {
                    return Err(NefinoError::Config("api key must not be empty".to_string()));
                }
                Arc::new(StaticToken::new(api_key))
            }
            CredentialConfig::SignedAssertion {
                username,
                secret,
                ttl,
            } => Arc::new(SignedAssertion::new(username, secret, ttl)?),
            CredentialConfig::ClientCredentials {
                client_id,
                client_secret,
                token_url,
                scope,
            } => Arc::new(ClientCredentials::new(
                client_id,
                client_secret,
                token_url,
                scope,
                timeout,
            )?),
        })
    }
}

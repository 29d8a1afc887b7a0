//! HTTP transport layer for the Nefino SDK.

use crate::config::ClientConfig;
use crate::credential::CredentialCache;
use crate::error::{NefinoError, NefinoResult};
use reqwest::{header, Client, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// HTTP transport for authenticated API requests.
///
/// Every call is a single attempt: failures are mapped and returned, never
/// retried here.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
    credentials: Arc<CredentialCache>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    pub fn new(config: Arc<ClientConfig>, credentials: Arc<CredentialCache>) -> NefinoResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    /// Build a URL for the given path.
    fn build_url(&self, path: &str) -> NefinoResult<url::Url> {
        self.config
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(NefinoError::InvalidUrl)
    }

    /// Execute a GET request with query parameters and decode a JSON body.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> NefinoResult<T> {
        let url = self.build_url(path)?;
        let token = self.credentials.token().await?;

        debug!(url = %url, params = query.len(), "GET request");
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Response received"
        );

        if !status.is_success() {
            let err = error_from_response(response).await;
            if matches!(err, NefinoError::Authentication(_)) {
                self.credentials.invalidate(&token).await;
            }
            warn!(status = status.as_u16(), error = %err, "Upstream request failed");
            return Err(err);
        }

        decode_json(response).await
    }
}

fn map_send_error(e: reqwest::Error) -> NefinoError {
    if e.is_timeout() {
        NefinoError::Timeout
    } else {
        NefinoError::Http(e)
    }
}

async fn error_from_response(response: Response) -> NefinoError {
    let status = response.status().as_u16();
    let retry_after_secs = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    NefinoError::from_response(status, &body, retry_after_secs)
}

/// Read the whole body and decode it, reporting any mismatch as a
/// malformed response rather than a transport error.
async fn decode_json<T: DeserializeOwned>(response: Response) -> NefinoResult<T> {
    let bytes = response.bytes().await.map_err(map_send_error)?;
    serde_json::from_slice(&bytes).map_err(|e| NefinoError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticToken;
    use secrecy::SecretString;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
        value: i32,
    }

    fn create_transport(base_url: &str, api_key: &str) -> HttpTransport {
        let mut config = ClientConfig::new(url::Url::parse(base_url).unwrap());
        config.timeout = Duration::from_secs(2);
        let source = Arc::new(StaticToken::new(SecretString::from(api_key.to_string())));
        let credentials = Arc::new(CredentialCache::new(source));
        HttpTransport::new(Arc::new(config), credentials).unwrap()
    }

    #[tokio::test]
    async fn test_get_with_query_sends_bearer() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/test"))
            .and(query_param("a", "1"))
            .and(header("Authorization", "Bearer sk-test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "success".to_string(),
                value: 42,
            }))
            .expect(1)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), "sk-test-key");
        let result: TestResponse = transport
            .get_with_query("/api/test", &[("a", "1".to_string())])
            .await
            .unwrap();
        assert_eq!(result.value, 42);
    }

    #[tokio::test]
    async fn test_rate_limit_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), "k");
        let err = transport
            .get_with_query::<TestResponse>("/api/busy", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NefinoError::RateLimited {
                retry_after_secs: Some(17)
            }
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_discards_credential() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/protected"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({"error": "expired"})))
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), "k");
        let err = transport
            .get_with_query::<TestResponse>("/api/protected", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NefinoError::Authentication(_)));
        assert!(!transport.credentials().status().await.cached);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), "k");
        let err = transport
            .get_with_query::<TestResponse>("/api/garbled", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NefinoError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), "k");
        let err = transport
            .get_with_query::<TestResponse>("/api/slow", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NefinoError::Timeout));
    }

    #[tokio::test]
    async fn test_build_url() {
        let transport = create_transport("http://localhost:8080/v1", "k");

        let url = transport.build_url("/news").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/news");

        let url = transport.build_url("news").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/news");
    }
}

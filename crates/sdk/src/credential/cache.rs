use super::{fingerprint, Credential, CredentialSource};
use crate::error::{NefinoError, NefinoResult};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Process-wide owner of the current credential.
///
/// Readers share the cached token. Refreshes are serialised through a
/// single lock: callers that find the token expired queue on it, and all
/// but the first find a fresh token once they get in.
pub struct CredentialCache {
    source: Arc<dyn CredentialSource>,
    current: RwLock<Option<Credential>>,
    refresh_lock: Mutex<()>,
    refresh_skew: Duration,
    refresh_timeout: Duration,
    refreshes: AtomicU64,
}

/// Snapshot of the cache for health reporting. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub source: String,
    pub cached: bool,
    /// `None` when nothing is cached or the credential never expires
    pub expires_in_secs: Option<u64>,
    pub refreshes: u64,
}

impl CredentialCache {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_skew: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(15),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Treat credentials within `skew` of their expiry as expired.
    pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Upper bound on a single call to the source.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Number of successful acquisitions so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Current token, acquiring or refreshing it first when needed.
    pub async fn token(&self) -> NefinoResult<SecretString> {
        if let Some(token) = self.usable_token().await {
            return Ok(token);
        }

        let seen = self.refresh_count();
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        // A credential installed meanwhile is reused even when its whole
        // lifetime is shorter than the skew, as long as it has not expired.
        let refreshed_meanwhile = self.refresh_count() != seen;
        let skew = if refreshed_meanwhile {
            Duration::ZERO
        } else {
            self.refresh_skew
        };
        if let Some(token) = self.cached_token(skew).await {
            debug!("Reusing credential refreshed by a concurrent caller");
            return Ok(token);
        }

        self.refresh_locked().await
    }

    /// Drop the cached credential if it is still the one the upstream
    /// rejected, so the next call acquires a new one.
    pub async fn invalidate(&self, rejected: &SecretString) {
        let mut current = self.current.write().await;
        let matches = current
            .as_ref()
            .is_some_and(|c| c.token().expose_secret() == rejected.expose_secret());
        if matches {
            warn!(
                source = self.source.name(),
                fingerprint = %fingerprint(rejected),
                "Upstream rejected credential, discarding it"
            );
            *current = None;
        }
    }

    pub async fn status(&self) -> CredentialStatus {
        let now = Instant::now();
        let current = self.current.read().await;
        CredentialStatus {
            source: self.source.name().to_string(),
            cached: current.is_some(),
            expires_in_secs: current
                .as_ref()
                .and_then(|c| c.expires_at())
                .map(|at| at.saturating_duration_since(now).as_secs()),
            refreshes: self.refresh_count(),
        }
    }

    async fn usable_token(&self) -> Option<SecretString> {
        self.cached_token(self.refresh_skew).await
    }

    async fn cached_token(&self, skew: Duration) -> Option<SecretString> {
        let now = Instant::now();
        self.current
            .read()
            .await
            .as_ref()
            .filter(|c| c.is_usable(now, skew))
            .map(|c| c.token().clone())
    }

    /// Must only be called while holding `refresh_lock`.
    async fn refresh_locked(&self) -> NefinoResult<SecretString> {
        let had_credential = self.current.read().await.is_some();
        if had_credential {
            info!(source = self.source.name(), "Refreshing expired credential");
        } else {
            info!(source = self.source.name(), "Acquiring credential");
        }

        let credential = match tokio::time::timeout(self.refresh_timeout, self.source.acquire()).await {
            Ok(Ok(credential)) => credential,
            Ok(Err(e)) => {
                warn!(source = self.source.name(), error = %e, "Credential acquisition failed");
                return Err(match e {
                    NefinoError::Authentication(_) => e,
                    other => NefinoError::Authentication(other.to_string()),
                });
            }
            Err(_) => {
                warn!(
                    source = self.source.name(),
                    timeout_ms = self.refresh_timeout.as_millis() as u64,
                    "Credential acquisition timed out"
                );
                return Err(NefinoError::Authentication(format!(
                    "credential refresh timed out after {}s",
                    self.refresh_timeout.as_secs_f64()
                )));
            }
        };

        self.refreshes.fetch_add(1, Ordering::Relaxed);
        debug!(
            source = self.source.name(),
            fingerprint = %credential.fingerprint(),
            "Credential acquired"
        );

        let token = credential.token().clone();
        *self.current.write().await = Some(credential);
        Ok(token)
    }
}

//! Credentials attached to upstream requests.
//!
//! A [`CredentialSource`] knows how to obtain a bearer token; the
//! [`CredentialCache`] owns the current token for the whole process and
//! decides when a source has to be asked again.
//!
//! ```text
//! acquire -> valid -> expired -> refresh -> valid
//!               \                    ^
//!                +-- rejected (401) -+
//! ```

mod cache;
mod sources;

pub use cache::{CredentialCache, CredentialStatus};
pub use sources::{ClientCredentials, CredentialConfig, SignedAssertion, StaticToken};

use crate::error::NefinoResult;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::time::Instant;

/// A bearer token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct Credential {
    token: SecretString,
    expires_at: Option<Instant>,
}

impl Credential {
    /// A token that never expires, such as a static API key.
    pub fn never_expiring(token: SecretString) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    /// A token valid for `ttl` from now. A `ttl` too large to represent as
    /// an instant is treated as never expiring.
    pub fn expiring_in(token: SecretString, ttl: Duration) -> Self {
        Self {
            token,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Whether the token can still be sent, treating the last `skew` of its
    /// lifetime as already expired.
    pub fn is_usable(&self, now: Instant, skew: Duration) -> bool {
        match self.expires_at {
            None => true,
            Some(at) => now.checked_add(skew).is_some_and(|limit| limit < at),
        }
    }

    /// Short SHA-256 prefix of the token, safe to log.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.token)
    }
}

pub(crate) fn fingerprint(token: &SecretString) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(token.expose_secret().as_bytes());
    hex::encode(&digest[..6])
}

/// Something that can mint or fetch a bearer token.
#[async_trait::async_trait]
pub trait CredentialSource: Send + Sync {
    /// Obtain a fresh credential.
    async fn acquire(&self) -> NefinoResult<Credential>;

    /// Short name for logs and status reporting.
    fn name(&self) -> &'static str;
}

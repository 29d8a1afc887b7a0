//! Configuration types for the Nefino SDK.

use std::time::Duration;
use url::Url;

/// Default base URL of the Nefino API.
pub const DEFAULT_BASE_URL: &str = "https://api.nefino.li/";

/// Default path of the news endpoint, relative to the base URL.
pub const DEFAULT_NEWS_PATH: &str = "news";

/// Configuration for the Nefino client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Nefino API. Always ends with a slash.
    pub base_url: Url,
    /// Path of the news endpoint, joined onto the base URL.
    pub news_path: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Timeout for a single credential refresh.
    pub refresh_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            news_path: DEFAULT_NEWS_PATH.to_string(),
            timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(15),
            user_agent: format!("nefino-mcp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `Url::join` replaces the last path segment unless the base ends with `/`.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

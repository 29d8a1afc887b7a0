//! Fetch recent news for a place.
//!
//! Reads the API key from `NEFINO_API_KEY` and the base URL from
//! `NEFINO_BASE_URL` (defaults to the public API).
//!
//! Run with: cargo run --example fetch_news -- <place-id> [place-type]

use nefino_sdk::{
    CredentialConfig, NefinoClient, NefinoError, NefinoResult, NewsQuery, NewsTopic, PlaceType,
    SearchWindow, DEFAULT_BASE_URL,
};
use secrecy::SecretString;
use std::time::Duration;

#[tokio::main]
async fn main() -> NefinoResult<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let place_id = args.next().unwrap_or_else(|| "DE-09162".to_string());
    let place_type: PlaceType = args
        .next()
        .unwrap_or_else(|| "LAU".to_string())
        .parse()
        .map_err(|e| NefinoError::Config(format!("{}", e)))?;

    let api_key = std::env::var("NEFINO_API_KEY")
        .map_err(|_| NefinoError::Config("NEFINO_API_KEY is not set".to_string()))?;
    let base_url = std::env::var("NEFINO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    let client = NefinoClient::builder()
        .base_url(base_url)
        .credentials(CredentialConfig::ApiKey {
            api_key: SecretString::from(api_key),
        })
        .timeout(Duration::from_secs(20))
        .build()?;

    let query = NewsQuery::new(place_id, place_type)
        .with_window(SearchWindow::Recency { last_n_days: 30 })
        .with_topics([NewsTopic::Solar, NewsTopic::Wind]);

    match client.news().search(&query).await {
        Ok(result) => {
            println!("{} news items for {} {}", result.item_count, result.place_type, result.place_id);
            for item in &result.items {
                println!("  - {} ({})", item.title, item.published_at.as_deref().unwrap_or("undated"));
            }
        }
        Err(e) => {
            eprintln!("Search failed [{}]: {}", e.kind(), e);
        }
    }

    Ok(())
}

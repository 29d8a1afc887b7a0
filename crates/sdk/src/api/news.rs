//! News API endpoints.

use crate::client::NefinoClient;
use crate::error::{NefinoError, NefinoResult};
use nefino_core::{NewsItem, NewsQuery, NewsResult};
use serde::{Deserialize, Serialize};
use tracing::info;

/// News API for searching news items by place.
pub struct NewsApi<'a> {
    client: &'a NefinoClient,
}

impl<'a> NewsApi<'a> {
    pub(crate) fn new(client: &'a NefinoClient) -> Self {
        Self { client }
    }

    /// Fetch news items for a place.
    ///
    /// Issues exactly one request. The provider body is reshaped into a
    /// [`NewsResult`]; a body missing required fields is a
    /// [`NefinoError::MalformedResponse`].
    pub async fn search(&self, query: &NewsQuery) -> NefinoResult<NewsResult> {
        let http = &self.client.http;
        let body: UpstreamNewsBody = http
            .get_with_query(&http.config().news_path, &query.query_pairs())
            .await?;

        let result = reshape(query, body)?;
        info!(
            place_id = %result.place_id,
            place_type = %result.place_type,
            items = result.item_count,
            "News items retrieved"
        );
        Ok(result)
    }
}

/// Response body of the news endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamNewsBody {
    /// `None` when the provider omitted the list entirely
    #[serde(default)]
    pub news_items: Option<Vec<UpstreamNewsItem>>,
}

/// A news item as the provider sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamNewsItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// `null` and a missing field both mean no topics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

impl From<UpstreamNewsItem> for NewsItem {
    fn from(item: UpstreamNewsItem) -> Self {
        NewsItem {
            id: item.id,
            title: item.title,
            summary: item.summary,
            url: item.url,
            published_at: item.published_at,
            source: item.source,
            topics: item.topics.unwrap_or_default(),
        }
    }
}

impl From<NewsItem> for UpstreamNewsItem {
    fn from(item: NewsItem) -> Self {
        UpstreamNewsItem {
            id: item.id,
            title: item.title,
            summary: item.summary,
            url: item.url,
            published_at: item.published_at,
            source: item.source,
            topics: (!item.topics.is_empty()).then_some(item.topics),
        }
    }
}

/// Convert a provider body into the tool result for `query`.
pub fn reshape(query: &NewsQuery, body: UpstreamNewsBody) -> NefinoResult<NewsResult> {
    let items = body.news_items.ok_or_else(|| {
        NefinoError::MalformedResponse("response has no `newsItems` field".to_string())
    })?;
    Ok(NewsResult::new(
        query,
        items.into_iter().map(NewsItem::from).collect(),
    ))
}

/// Inverse of [`reshape`]: the provider body a result was built from.
pub fn unshape(result: NewsResult) -> UpstreamNewsBody {
    UpstreamNewsBody {
        news_items: Some(result.items.into_iter().map(UpstreamNewsItem::from).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nefino_core::PlaceType;

    fn sample_result() -> NewsResult {
        let query = NewsQuery::new("DE-09162", PlaceType::LocalAdministrativeUnit);
        NewsResult::new(
            &query,
            vec![
                NewsItem {
                    id: "n-1".to_string(),
                    title: "Solar park approved".to_string(),
                    summary: Some("The council approved a 20 MW park.".to_string()),
                    url: Some("https://example.org/n-1".to_string()),
                    published_at: Some("2024-04-02".to_string()),
                    source: Some("Local Gazette".to_string()),
                    topics: vec!["solar".to_string()],
                },
                NewsItem {
                    id: "n-2".to_string(),
                    title: "Grid upgrade".to_string(),
                    summary: None,
                    url: None,
                    published_at: None,
                    source: None,
                    topics: vec![],
                },
            ],
        )
    }

    #[test]
    fn test_reshape_inverts_unshape() {
        let result = sample_result();
        let query = NewsQuery::new(result.place_id.clone(), result.place_type);
        let body = unshape(result.clone());
        assert_eq!(reshape(&query, body).unwrap(), result);
    }

    #[test]
    fn test_upstream_body_is_camel_case() {
        let body: UpstreamNewsBody = serde_json::from_value(serde_json::json!({
            "newsItems": [{
                "id": "n-1",
                "title": "Hydrogen hub",
                "publishedAt": "2024-01-10",
                "topics": ["hydrogen"]
            }]
        }))
        .unwrap();

        let items = body.news_items.unwrap();
        assert_eq!(items[0].published_at.as_deref(), Some("2024-01-10"));
    }

    #[test]
    fn test_null_topics_mean_no_topics() {
        let body: UpstreamNewsBody = serde_json::from_value(serde_json::json!({
            "newsItems": [
                { "id": "n-1", "title": "Wind tender", "topics": null },
                { "id": "n-2", "title": "Heat pumps" }
            ]
        }))
        .unwrap();

        let query = NewsQuery::new("DE-09162", PlaceType::LocalAdministrativeUnit);
        let result = reshape(&query, body).unwrap();
        assert_eq!(result.items.len(), 2);
        assert!(result.items.iter().all(|item| item.topics.is_empty()));
    }

    #[test]
    fn test_missing_list_is_malformed() {
        let query = NewsQuery::new("1", PlaceType::County);
        let err = reshape(&query, UpstreamNewsBody { news_items: None }).unwrap_err();
        assert!(matches!(err, NefinoError::MalformedResponse(_)));
    }

    #[test]
    fn test_item_without_title_fails_to_decode() {
        let parsed = serde_json::from_value::<UpstreamNewsBody>(serde_json::json!({
            "newsItems": [{ "id": "n-1" }]
        }));
        assert!(parsed.is_err());
    }
}

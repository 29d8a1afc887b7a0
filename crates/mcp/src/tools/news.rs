// News tools backed by the Nefino API

use crate::protocol::ToolSchema;
use crate::tools::Tool;
use nefino_core::{NewsQuery, NewsResult};
use nefino_sdk::{NefinoClient, NefinoError, NefinoResult};
use serde_json::Value;
use tracing::debug;

/// Tool to retrieve news items for a place
pub struct GetNewsTool {
    client: NefinoClient,
}

impl GetNewsTool {
    pub const NAME: &'static str = "GetNews";

    pub fn new(client: NefinoClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Tool for GetNewsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Useful if you need to retrieve news items for a place".to_string(),
            input_schema: NewsQuery::input_schema().to_json_schema(),
            output_schema: Some(NewsResult::output_schema()),
        }
    }

    async fn execute(&self, arguments: Value) -> NefinoResult<Value> {
        // Validation happens before the client is touched
        let query = NewsQuery::from_arguments(&arguments)?;
        debug!(
            place_id = %query.place_id,
            place_type = %query.place_type,
            window = ?query.window,
            topics = query.topics.len(),
            "Running GetNews"
        );

        let result = self.client.news().search(&query).await?;
        serde_json::to_value(&result).map_err(|e| NefinoError::MalformedResponse(e.to_string()))
    }
}

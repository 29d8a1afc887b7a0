//! News search queries and the results returned to tool callers.

use crate::error::{ValidationError, ValidationResult};
use crate::schema::{FieldKind, InputSchema};
use crate::types::{NewsTopic, PlaceType, RangeOrRecency};
use crate::validation::{parse_date, validate_date_range, validate_last_n_days, MAX_LAST_N_DAYS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Time restriction applied to a news search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchWindow {
    Recency { last_n_days: u32 },
    Range { begin: NaiveDate, end: NaiveDate },
    /// Window values given without a `range_or_recency` mode; forwarded
    /// as-is and left to the provider to interpret.
    Unscoped {
        last_n_days: Option<u32>,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl SearchWindow {
    pub fn mode(&self) -> Option<RangeOrRecency> {
        match self {
            SearchWindow::Recency { .. } => Some(RangeOrRecency::Recency),
            SearchWindow::Range { .. } => Some(RangeOrRecency::Range),
            SearchWindow::Unscoped { .. } => None,
        }
    }
}

/// A validated news search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub place_id: String,
    pub place_type: PlaceType,
    pub window: Option<SearchWindow>,
    pub topics: Vec<NewsTopic>,
}

#[derive(Debug, Deserialize)]
struct GetNewsArgs {
    place_id: String,
    place_type: PlaceType,
    #[serde(default)]
    range_or_recency: Option<RangeOrRecency>,
    #[serde(default)]
    last_n_days: Option<i64>,
    #[serde(default)]
    date_range_begin: Option<String>,
    #[serde(default)]
    date_range_end: Option<String>,
    #[serde(default)]
    news_topics: Option<Vec<NewsTopic>>,
}

impl NewsQuery {
    pub fn new(place_id: impl Into<String>, place_type: PlaceType) -> Self {
        Self {
            place_id: place_id.into(),
            place_type,
            window: None,
            topics: Vec::new(),
        }
    }

    pub fn with_window(mut self, window: SearchWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_topics(mut self, topics: impl IntoIterator<Item = NewsTopic>) -> Self {
        self.topics = dedup_topics(topics);
        self
    }

    /// Argument declaration of the `GetNews` tool
    pub fn input_schema() -> InputSchema {
        InputSchema::new()
            .required("place_id", FieldKind::non_empty_string(), "The id of the place")
            .required(
                "place_type",
                FieldKind::one_of(PlaceType::codes()),
                "The type of the place (PR, CTY, AU, LAU)",
            )
            .optional(
                "range_or_recency",
                FieldKind::one_of(RangeOrRecency::codes()),
                "Type of search (RANGE or RECENCY)",
            )
            .optional(
                "last_n_days",
                FieldKind::integer(Some(1), Some(MAX_LAST_N_DAYS)),
                "Number of days to search for (when range_or_recency=RECENCY)",
            )
            .optional(
                "date_range_begin",
                FieldKind::Date,
                "Start date in YYYY-MM-DD format (when range_or_recency=RANGE)",
            )
            .optional(
                "date_range_end",
                FieldKind::Date,
                "End date in YYYY-MM-DD format (when range_or_recency=RANGE)",
            )
            .optional(
                "news_topics",
                FieldKind::array_of(FieldKind::one_of(NewsTopic::codes())),
                "List of topics to filter by (batteryStorage, gridExpansion, solar, hydrogen, wind)",
            )
    }

    /// Build a query from raw tool arguments.
    ///
    /// The schema check runs first; the window rules then pick the
    /// arguments that belong to the selected mode and drop the rest.
    pub fn from_arguments(arguments: &Value) -> ValidationResult<Self> {
        Self::input_schema().validate(arguments)?;

        let args: GetNewsArgs = serde_json::from_value(arguments.clone()).map_err(|e| {
            ValidationError::combination(format!("malformed GetNews arguments: {}", e))
        })?;

        let window = match args.range_or_recency {
            Some(RangeOrRecency::Recency) => Some(SearchWindow::Recency {
                last_n_days: validate_last_n_days("last_n_days", args.last_n_days)?,
            }),
            Some(RangeOrRecency::Range) => {
                let (begin, end) = validate_date_range(
                    args.date_range_begin.as_deref(),
                    args.date_range_end.as_deref(),
                )?;
                Some(SearchWindow::Range { begin, end })
            }
            None => unscoped_window(&args)?,
        };

        Ok(Self {
            place_id: args.place_id.trim().to_string(),
            place_type: args.place_type,
            window,
            topics: dedup_topics(args.news_topics.unwrap_or_default()),
        })
    }

    /// Upstream query parameters, in a stable order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("placeId", self.place_id.clone()),
            ("placeType", self.place_type.code().to_string()),
        ];

        match self.window {
            Some(SearchWindow::Recency { last_n_days }) => {
                pairs.push(("rangeOrRecency", RangeOrRecency::Recency.code().to_string()));
                pairs.push(("lastNDays", last_n_days.to_string()));
            }
            Some(SearchWindow::Range { begin, end }) => {
                pairs.push(("rangeOrRecency", RangeOrRecency::Range.code().to_string()));
                pairs.push(("dateRangeBegin", begin.format("%Y-%m-%d").to_string()));
                pairs.push(("dateRangeEnd", end.format("%Y-%m-%d").to_string()));
            }
            Some(SearchWindow::Unscoped {
                last_n_days,
                begin,
                end,
            }) => {
                if let Some(days) = last_n_days {
                    pairs.push(("lastNDays", days.to_string()));
                }
                if let Some(begin) = begin {
                    pairs.push(("dateRangeBegin", begin.format("%Y-%m-%d").to_string()));
                }
                if let Some(end) = end {
                    pairs.push(("dateRangeEnd", end.format("%Y-%m-%d").to_string()));
                }
            }
            None => {}
        }

        for topic in &self.topics {
            pairs.push(("newsTopics", topic.code().to_string()));
        }

        pairs
    }
}

fn unscoped_window(args: &GetNewsArgs) -> ValidationResult<Option<SearchWindow>> {
    let last_n_days = match args.last_n_days {
        Some(_) => Some(validate_last_n_days("last_n_days", args.last_n_days)?),
        None => None,
    };
    let begin = args
        .date_range_begin
        .as_deref()
        .map(|v| parse_date("date_range_begin", v))
        .transpose()?;
    let end = args
        .date_range_end
        .as_deref()
        .map(|v| parse_date("date_range_end", v))
        .transpose()?;

    if last_n_days.is_none() && begin.is_none() && end.is_none() {
        return Ok(None);
    }
    Ok(Some(SearchWindow::Unscoped {
        last_n_days,
        begin,
        end,
    }))
}

fn dedup_topics(topics: impl IntoIterator<Item = NewsTopic>) -> Vec<NewsTopic> {
    let mut out: Vec<NewsTopic> = Vec::new();
    for topic in topics {
        if !out.contains(&topic) {
            out.push(topic);
        }
    }
    out
}

/// A single news item as returned to tool callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
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
    /// Topic codes as the provider reported them
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Result of a `GetNews` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsResult {
    pub place_id: String,
    pub place_type: PlaceType,
    pub item_count: usize,
    pub items: Vec<NewsItem>,
}

impl NewsResult {
    pub fn new(query: &NewsQuery, items: Vec<NewsItem>) -> Self {
        Self {
            place_id: query.place_id.clone(),
            place_type: query.place_type,
            item_count: items.len(),
            items,
        }
    }

    /// Declared output shape for `tools/list`
    pub fn output_schema() -> Value {
        let optional_string = json!({ "type": "string" });
        json!({
            "type": "object",
            "properties": {
                "place_id": { "type": "string" },
                "place_type": { "type": "string", "enum": PlaceType::codes() },
                "item_count": { "type": "integer", "minimum": 0 },
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "summary": optional_string,
                            "url": optional_string,
                            "published_at": optional_string,
                            "source": optional_string,
                            "topics": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["id", "title", "topics"]
                    }
                }
            },
            "required": ["place_id", "place_type", "item_count", "items"]
        })
    }
}

// Exa API client
// Web search and page contents used by the search tools
// Endpoint: https://api.exa.ai

use std::time::Duration;

use chrono::{Days, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::search::{FetchContentsArguments, SearchWebArguments};
use super::{ToolError, ToolResult};

pub const EXA_API_URL: &str = "https://api.exa.ai";

const DEFAULT_NUM_RESULTS: i64 = 6;
const MIN_NUM_RESULTS: i64 = 3;
const MAX_NUM_RESULTS: i64 = 12;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub published_date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub site_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExaCost {
    #[serde(default)]
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaResults {
    #[serde(default)]
    pub request_id: String,
    #[serde(default, rename = "resolvedSearchType")]
    pub search_type: String,
    #[serde(default)]
    pub results: Vec<ExaResult>,
    #[serde(default)]
    pub cost_dollars: ExaCost,
}

impl ExaResults {
    /// JSON document handed back to the model
    pub fn to_result_text(&self) -> String {
        json!({ "results": self.results }).to_string()
    }
}

/// Clamp the requested number of results; zero or less means the default
pub fn clamp_num_results(requested: i64) -> i64 {
    if requested <= 0 {
        DEFAULT_NUM_RESULTS
    } else {
        requested.clamp(MIN_NUM_RESULTS, MAX_NUM_RESULTS)
    }
}

fn start_of_day(date: &str) -> String {
    format!("{}T00:00:00.000Z", date)
}

/// Build the `/search` body; `today` anchors the default news window
pub fn search_body(args: &SearchWebArguments, today: NaiveDate) -> Value {
    let num_results = clamp_num_results(args.num_results);

    let mut data = Map::new();
    data.insert("query".into(), json!(args.query));
    data.insert("type".into(), json!("auto"));
    data.insert("numResults".into(), json!(num_results));

    if !args.domains.is_empty() {
        data.insert("includeDomains".into(), json!(args.domains));
    }
    if !args.start_date.is_empty() {
        data.insert("startPublishedDate".into(), json!(start_of_day(&args.start_date)));
    }
    if !args.end_date.is_empty() {
        data.insert("endPublishedDate".into(), json!(start_of_day(&args.end_date)));
    }

    let mut contents = Map::new();
    contents.insert(
        "highlights".into(),
        json!({ "numSentences": 3, "highlightsPerUrl": 3, "query": args.query }),
    );
    contents.insert("livecrawl".into(), json!("preferred"));

    match args.intent.as_str() {
        "news" => {
            data.insert("category".into(), json!("news"));
            data.insert("numResults".into(), json!(num_results.max(8)));

            if args.start_date.is_empty() {
                let since = today.checked_sub_days(Days::new(30)).unwrap_or(today);
                data.insert(
                    "startPublishedDate".into(),
                    json!(start_of_day(&since.format("%Y-%m-%d").to_string())),
                );
            }
        }
        "docs" => {
            contents.insert("subpages".into(), json!(1));
            contents.insert(
                "subpageTarget".into(),
                json!(["documentation", "changelog", "release notes"]),
            );
        }
        "papers" => {
            data.insert("category".into(), json!("research paper"));
        }
        "code" => {
            data.insert("category".into(), json!("github"));
            contents.insert("subpages".into(), json!(1));
            contents.insert("subpageTarget".into(), json!(["readme", "changelog", "code"]));
            contents.insert("text".into(), json!({ "maxCharacters": 10000 }));
        }
        "deep_read" => {
            contents.insert("text".into(), json!({ "maxCharacters": 25000 }));
        }
        _ => {}
    }

    data.insert("contents".into(), Value::Object(contents));

    Value::Object(data)
}

/// Build the `/contents` body
pub fn contents_body(args: &FetchContentsArguments) -> Value {
    json!({
        "urls": args.urls,
        "summary": {},
        "highlights": { "numSentences": 2, "highlightsPerUrl": 3 },
        "text": { "maxCharacters": 20000 },
        "livecrawl": "preferred",
    })
}

pub struct ExaClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ExaClient {
    pub fn new(api_key: String, timeout: Duration) -> ToolResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: EXA_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        headers
    }

    async fn post(&self, path: &str, body: &Value) -> ToolResult<ExaResults> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => e.to_string(),
            };

            return Err(ToolError::Api {
                service: "Exa",
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    pub async fn search(&self, args: &SearchWebArguments) -> ToolResult<ExaResults> {
        let body = search_body(args, chrono::Utc::now().date_naive());
        self.post("/search", &body).await
    }

    pub async fn contents(&self, args: &FetchContentsArguments) -> ToolResult<ExaResults> {
        self.post("/contents", &contents_body(args)).await
    }
}

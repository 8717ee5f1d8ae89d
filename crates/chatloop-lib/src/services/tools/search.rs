// Search tools
// search_web and fetch_contents, both backed by Exa

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::exa::{ExaClient, ExaResults};
use super::{
    parse_and_update_args, parse_args, string_or_number, ToolContext, ToolError, ToolHandler,
    ToolResult,
};
use crate::models::{FunctionDefinition, ToolCall, ToolDefinition};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchWebArguments {
    #[serde(deserialize_with = "string_or_number")]
    pub query: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub num_results: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub intent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start_date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end_date: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchContentsArguments {
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Turn an Exa response into the call's result; upstream failures are
/// recorded as `error: ...` so the model can react to them
fn apply_results(call: &mut ToolCall, results: ToolResult<ExaResults>) -> ToolResult<()> {
    match results {
        Ok(results) => {
            call.cost = results.cost_dollars.total;

            call.result = if results.results.is_empty() {
                "error: no search results".to_string()
            } else {
                results.to_result_text()
            };

            Ok(())
        }
        Err(ToolError::Cancelled) => Err(ToolError::Cancelled),
        Err(e) => {
            log::warn!("[tools] {} failed: {}", call.name, e);
            call.result = format!("error: {}", e);
            Ok(())
        }
    }
}

// ============================================================================
// search_web
// ============================================================================

pub struct SearchWebTool {
    exa: Arc<ExaClient>,
}

impl SearchWebTool {
    pub fn new(exa: Arc<ExaClient>) -> Self {
        Self { exa }
    }
}

#[async_trait]
impl ToolHandler for SearchWebTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(FunctionDefinition {
            name: "search_web".to_string(),
            description: "Search the live web via Exa. Returns highly relevant highlights and text snippets.".to_string(),
            parameters: json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A concise, specific search query. Focus on core entities and keywords."
                    },
                    "num_results": {
                        "type": "integer",
                        "description": "Number of results to return (3-12). Default is 6.",
                        "minimum": 3,
                        "maximum": 12
                    },
                    "intent": {
                        "type": "string",
                        "enum": ["auto", "news", "docs", "papers", "code", "deep_read"],
                        "description": "Category filter. 'news' (recent events), 'docs' (official documentation), 'papers' (academic), 'code' (GitHub), 'deep_read' (full page text instead of highlights). Default 'auto'."
                    },
                    "start_date": {
                        "type": "string",
                        "description": "Only results published after this date (YYYY-MM-DD)."
                    },
                    "end_date": {
                        "type": "string",
                        "description": "Only results published before this date (YYYY-MM-DD)."
                    },
                    "domains": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Restrict the search to these domains (e.g. ['europa.eu', 'who.int'])."
                    }
                },
                "additionalProperties": false
            }),
            strict: None,
        })
    }

    fn normalize(&self, call: &mut ToolCall) -> ToolResult<()> {
        parse_and_update_args::<SearchWebArguments>(call).map(|_| ())
    }

    async fn handle(&self, ctx: &ToolContext, call: &mut ToolCall) -> ToolResult<()> {
        let arguments: SearchWebArguments = parse_args(call)?;

        if arguments.query.trim().is_empty() {
            return Err(ToolError::MissingQuery);
        }

        log::debug!("[tools] search_web: {}", arguments.query);

        let results = ctx.run(self.exa.search(&arguments)).await;
        apply_results(call, results)
    }
}

// ============================================================================
// fetch_contents
// ============================================================================

pub struct FetchContentsTool {
    exa: Arc<ExaClient>,
}

impl FetchContentsTool {
    pub fn new(exa: Arc<ExaClient>) -> Self {
        Self { exa }
    }
}

#[async_trait]
impl ToolHandler for FetchContentsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(FunctionDefinition {
            name: "fetch_contents".to_string(),
            description: "Fetch and summarize page contents for one or more URLs (via Exa /contents). Use when the user provides specific links.".to_string(),
            parameters: json!({
                "type": "object",
                "required": ["urls"],
                "properties": {
                    "urls": {
                        "type": "array",
                        "description": "List of URLs to fetch.",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "maxItems": 5
                    }
                },
                "additionalProperties": false
            }),
            strict: Some(true),
        })
    }

    fn normalize(&self, call: &mut ToolCall) -> ToolResult<()> {
        parse_and_update_args::<FetchContentsArguments>(call).map(|_| ())
    }

    async fn handle(&self, ctx: &ToolContext, call: &mut ToolCall) -> ToolResult<()> {
        let arguments: FetchContentsArguments = parse_args(call)?;

        if arguments.urls.is_empty() {
            return Err(ToolError::MissingUrls);
        }

        log::debug!("[tools] fetch_contents: {} urls", arguments.urls.len());

        let results = ctx.run(self.exa.contents(&arguments)).await;
        apply_results(call, results)
    }
}

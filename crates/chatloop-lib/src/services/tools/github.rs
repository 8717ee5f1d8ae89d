// GitHub repository tool
// Repository metadata, README and top-level listing rendered as markdown

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    parse_and_update_args, parse_args, string_or_number, ToolContext, ToolError, ToolHandler,
    ToolResult,
};
use crate::models::{FunctionDefinition, ToolCall, ToolDefinition};

pub const GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubRepositoryArguments {
    #[serde(deserialize_with = "string_or_number")]
    pub owner: String,
    #[serde(deserialize_with = "string_or_number")]
    pub repo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubRepo {
    pub name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub visibility: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubReadme {
    pub path: String,
    pub content: String,
    pub encoding: String,
}

impl GitHubReadme {
    pub fn as_text(&self) -> ToolResult<String> {
        if self.encoding != "base64" {
            return Ok(self.content.clone());
        }

        // GitHub wraps base64 content at 60 columns
        let compact: String = self.content.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| ToolError::ParseError(e.to_string()))?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub struct GitHubClient {
    client: Client,
    token: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: String, timeout: Duration) -> ToolResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Http(e.to_string()))?;

        Ok(Self {
            client,
            token,
            base_url: GITHUB_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("chatloop"));

        if !self.token.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ToolResult<T> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let response = self.client.get(&url).headers(self.headers()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            return Err(ToolError::Api {
                service: "GitHub",
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    pub async fn repository(&self, owner: &str, repo: &str) -> ToolResult<GitHubRepo> {
        let repository: GitHubRepo = self
            .get(&format!(
                "/repos/{}/{}",
                urlencoding::encode(owner),
                urlencoding::encode(repo)
            ))
            .await?;

        if repository.name.is_empty() {
            return Err(ToolError::ParseError("error getting data".to_string()));
        }

        Ok(repository)
    }

    pub async fn readme(&self, owner: &str, repo: &str, branch: &str) -> ToolResult<GitHubReadme> {
        self.get(&format!(
            "/repos/{}/{}/readme?ref={}",
            urlencoding::encode(owner),
            urlencoding::encode(repo),
            urlencoding::encode(branch)
        ))
        .await
    }

    pub async fn contents(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> ToolResult<Vec<GitHubContent>> {
        self.get(&format!(
            "/repos/{}/{}/contents?ref={}",
            urlencoding::encode(owner),
            urlencoding::encode(repo),
            urlencoding::encode(branch)
        ))
        .await
    }

    /// Fetch everything and render the overview
    pub async fn overview(&self, args: &GitHubRepositoryArguments) -> ToolResult<String> {
        let repository = self.repository(&args.owner, &args.repo).await?;
        let branch = repository.default_branch.as_str();

        let (readme, contents) = tokio::join!(
            self.readme(&args.owner, &args.repo, branch),
            self.contents(&args.owner, &args.repo, branch),
        );

        let readme = match readme.and_then(|readme| readme.as_text()) {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("[tools] failed to load repository readme: {}", e);
                None
            }
        };

        let contents = contents.unwrap_or_else(|e| {
            log::warn!("[tools] failed to get repository contents: {}", e);
            Vec::new()
        });

        Ok(render_overview(args, &repository, &contents, readme.as_deref()))
    }
}

/// Render repository metadata, listing and README as markdown
pub fn render_overview(
    args: &GitHubRepositoryArguments,
    repository: &GitHubRepo,
    contents: &[GitHubContent],
    readme: Option<&str>,
) -> String {
    let branch = &repository.default_branch;

    let mut directories: Vec<String> = Vec::new();
    let mut files: Vec<String> = Vec::new();

    for entry in contents {
        match entry.kind.as_str() {
            "dir" => directories.push(format!(
                "[{}](https://github.com/{}/{}/tree/{}/{})",
                entry.name, args.owner, args.repo, branch, entry.name
            )),
            "file" => files.push(format!(
                "[{}](https://raw.githubusercontent.com/{}/{}/refs/heads/{}/{})",
                entry.name, args.owner, args.repo, branch, entry.name
            )),
            _ => {}
        }
    }

    directories.sort();
    files.sort();

    let description = repository
        .description
        .as_deref()
        .filter(|description| !description.is_empty())
        .unwrap_or("(none)")
        .replace('\n', " ");

    let mut out = String::new();

    let _ = writeln!(out, "### {} ({})", repository.name, repository.visibility);
    let _ = writeln!(out, "- URL: {}", repository.html_url);
    let _ = writeln!(out, "- Description: {}", description);
    let _ = writeln!(out, "- Default branch: {}", branch);
    let _ = writeln!(
        out,
        "- Stars: {} | Forks: {}",
        repository.stargazers_count, repository.forks_count
    );

    out.push_str("\n### Top-level files and directories\n");

    if directories.is_empty() && files.is_empty() {
        out.push_str("*No entries or insufficient permissions.*\n");
    } else {
        for directory in &directories {
            let _ = writeln!(out, "- [D] {}", directory);
        }
        for file in &files {
            let _ = writeln!(out, "- [F] {}", file);
        }
    }

    out.push_str("\n### README\n");

    match readme.filter(|readme| !readme.is_empty()) {
        Some(readme) => out.push_str(readme),
        None => out.push_str("*No README found or could not load.*\n"),
    }

    out
}

// ============================================================================
// github_repository
// ============================================================================

pub struct GitHubRepositoryTool {
    github: Arc<GitHubClient>,
}

impl GitHubRepositoryTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl ToolHandler for GitHubRepositoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(FunctionDefinition {
            name: "github_repository".to_string(),
            description: "Fetch repository metadata and README from GitHub.".to_string(),
            parameters: json!({
                "type": "object",
                "required": ["owner", "repo"],
                "properties": {
                    "owner": {
                        "type": "string",
                        "description": "Repository owner (e.g., 'torvalds')."
                    },
                    "repo": {
                        "type": "string",
                        "description": "Repository name (e.g., 'linux')."
                    }
                },
                "additionalProperties": false
            }),
            strict: Some(true),
        })
    }

    fn normalize(&self, call: &mut ToolCall) -> ToolResult<()> {
        parse_and_update_args::<GitHubRepositoryArguments>(call).map(|_| ())
    }

    async fn handle(&self, ctx: &ToolContext, call: &mut ToolCall) -> ToolResult<()> {
        let arguments: GitHubRepositoryArguments = parse_args(call)?;

        if arguments.owner.trim().is_empty() || arguments.repo.trim().is_empty() {
            return Err(ToolError::MissingRepository);
        }

        log::debug!("[tools] github_repository: {}/{}", arguments.owner, arguments.repo);

        match ctx.run(self.github.overview(&arguments)).await {
            Ok(overview) => call.result = overview,
            Err(ToolError::Cancelled) => return Err(ToolError::Cancelled),
            Err(e) => {
                log::warn!("[tools] github_repository failed: {}", e);
                call.result = format!("error: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GitHubRepositoryArguments {
        GitHubRepositoryArguments {
            owner: "tokio-rs".to_string(),
            repo: "tokio".to_string(),
        }
    }

    fn repository() -> GitHubRepo {
        GitHubRepo {
            name: "tokio".to_string(),
            html_url: "https://github.com/tokio-rs/tokio".to_string(),
            description: Some("A runtime\nfor Rust".to_string()),
            stargazers_count: 25000,
            forks_count: 2300,
            visibility: "public".to_string(),
            default_branch: "master".to_string(),
        }
    }

    #[test]
    fn test_readme_base64_decoding() {
        let readme = GitHubReadme {
            path: "README.md".to_string(),
            content: "IyBUb2tp\nbwo=\n".to_string(),
            encoding: "base64".to_string(),
        };

        assert_eq!(readme.as_text().unwrap(), "# Tokio\n");
    }

    #[test]
    fn test_render_overview_sorted_listing() {
        let contents = vec![
            GitHubContent {
                kind: "file".to_string(),
                name: "README.md".to_string(),
            },
            GitHubContent {
                kind: "dir".to_string(),
                name: "tokio".to_string(),
            },
            GitHubContent {
                kind: "dir".to_string(),
                name: "benches".to_string(),
            },
            GitHubContent {
                kind: "symlink".to_string(),
                name: "ignored".to_string(),
            },
        ];

        let overview = render_overview(&args(), &repository(), &contents, Some("# Tokio\n"));

        assert!(overview.starts_with("### tokio (public)\n"));
        assert!(overview.contains("- Description: A runtime for Rust\n"));
        assert!(overview.contains("- Stars: 25000 | Forks: 2300\n"));

        let benches = overview.find("- [D] [benches]").unwrap();
        let tokio = overview.find("- [D] [tokio]").unwrap();
        let readme = overview
            .find("- [F] [README.md](https://raw.githubusercontent.com/tokio-rs/tokio/refs/heads/master/README.md)")
            .unwrap();

        assert!(benches < tokio && tokio < readme);
        assert!(!overview.contains("ignored"));
        assert!(overview.ends_with("### README\n# Tokio\n"));
    }

    #[test]
    fn test_render_overview_placeholders() {
        let mut repository = repository();
        repository.description = None;

        let overview = render_overview(&args(), &repository, &[], None);

        assert!(overview.contains("- Description: (none)\n"));
        assert!(overview.contains("*No entries or insufficient permissions.*"));
        assert!(overview.contains("*No README found or could not load.*"));
    }

    #[test]
    fn test_arguments_require_owner_and_repo() {
        let tool = GitHubRepositoryTool::new(Arc::new(
            GitHubClient::new(String::new(), Duration::from_secs(1)).unwrap(),
        ));

        let mut call = ToolCall {
            name: "github_repository".to_string(),
            args: r#"{"owner":"tokio-rs"}"#.to_string(),
            ..Default::default()
        };

        assert!(matches!(
            tool.normalize(&mut call),
            Err(ToolError::InvalidArguments(_))
        ));
    }
}

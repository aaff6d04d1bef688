//! Web search and page retrieval tools
//!
//! Search is an opaque `query -> [hit]` capability behind [`SearchBackend`].
//! Two backends ship with the crate: Google results through SerpAPI, and
//! DuckDuckGo through the daedra crate. [`FetchPageTool`] gives workers local
//! page retrieval when no tool-protocol server is configured.

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use crate::utils::progress::SharedSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Results returned when the caller does not ask for a count
pub const DEFAULT_RESULT_COUNT: usize = 10;

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Query to ordered hits, possibly empty.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, result_count: usize) -> Result<Vec<SearchHit>>;

    /// Short backend identifier used in logs
    fn name(&self) -> &'static str;
}

/// Google search through SerpAPI.
pub struct SerpApiSearch {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerpApiSearch {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: SERPAPI_ENDPOINT.to_string(),
        })
    }

    /// Point the backend at a different endpoint (a proxy or a test server)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpApiResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl SearchBackend for SerpApiSearch {
    async fn search(&self, query: &str, result_count: usize) -> Result<Vec<SearchHit>> {
        let num = result_count.to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("hl", "en"),
                ("gl", "us"),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Tool(format!("SerpAPI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Tool(format!(
                "SerpAPI returned {}: {}",
                status, body
            )));
        }

        let body: SerpApiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Tool(format!("Invalid SerpAPI response: {}", e)))?;

        if let Some(error) = body.error {
            // SerpAPI reports "no results" as an error string on a 200 response
            if body.organic_results.is_empty() && error.contains("hasn't returned any results") {
                return Ok(Vec::new());
            }
            return Err(AppError::Tool(format!("SerpAPI error: {}", error)));
        }

        Ok(body
            .organic_results
            .into_iter()
            .take(result_count)
            .map(|r| SearchHit {
                title: r.title,
                link: r.link,
                snippet: r.snippet,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "serpapi"
    }
}

/// DuckDuckGo search through daedra. Needs no API key.
#[derive(Debug, Default, Clone, Copy)]
pub struct DuckDuckGoSearch;

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    async fn search(&self, query: &str, result_count: usize) -> Result<Vec<SearchHit>> {
        let args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: result_count,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&args)
            .await
            .map_err(|e| AppError::Tool(format!("Search failed: {}", e)))?;

        Ok(response
            .data
            .iter()
            .map(|r| SearchHit {
                title: r.title.clone(),
                link: r.url.clone(),
                snippet: r.description.clone(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "duckduckgo"
    }
}

/// `search_web`: the search capability exposed to workers.
pub struct WebSearchTool {
    backend: Arc<dyn SearchBackend>,
    default_count: usize,
    sink: SharedSink,
}

impl WebSearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>, sink: SharedSink) -> Self {
        Self {
            backend,
            default_count: DEFAULT_RESULT_COUNT,
            sink,
        }
    }

    pub fn with_default_count(mut self, count: usize) -> Self {
        self.default_count = count.max(1);
        self
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web for a query. Returns a JSON array of results, each with a title, a link and a snippet."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": format!("Maximum number of results to return (default: {})", self.default_count),
                    "default": self.default_count
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AppError::InvalidInput("Missing 'query' parameter".to_string()))?;

        let count = args
            .get("num_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .filter(|n| *n > 0)
            .unwrap_or(self.default_count);

        self.sink.line(&format!("Searching the web for: {}", query));
        tracing::debug!(backend = self.backend.name(), query, count, "web search");

        let hits = self.backend.search(query, count).await?;
        let pretty = serde_json::to_string_pretty(&hits)
            .map_err(|e| AppError::Internal(format!("Failed to encode results: {}", e)))?;
        Ok(Value::String(pretty))
    }
}

/// `fetch_page`: local page retrieval as markdown.
pub struct FetchPageTool {
    max_chars: usize,
    sink: SharedSink,
}

impl FetchPageTool {
    /// Page bodies longer than this many characters are cut
    pub const DEFAULT_MAX_CHARS: usize = 20_000;

    pub fn new(sink: SharedSink) -> Self {
        Self {
            max_chars: Self::DEFAULT_MAX_CHARS,
            sink,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[async_trait]
impl Tool for FetchPageTool {
    fn name(&self) -> &str {
        "fetch_page"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its main content as markdown"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the page to fetch"
                },
                "selector": {
                    "type": "string",
                    "description": "Optional CSS selector to extract specific content"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or_else(|| {
                AppError::InvalidInput("Missing or invalid 'url' parameter".to_string())
            })?;

        let selector = args
            .get("selector")
            .and_then(|v| v.as_str())
            .map(String::from);

        self.sink.line(&format!("Fetching page: {}", url));

        let fetch_args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector,
        };

        let page = daedra::tools::fetch::fetch_page(&fetch_args)
            .await
            .map_err(|e| AppError::Tool(format!("Failed to fetch page: {}", e)))?;

        let (content, truncated) = truncate_chars(&page.content, self.max_chars);
        Ok(json!({
            "url": page.url,
            "title": page.title,
            "content": content,
            "truncated": truncated,
            "word_count": page.word_count
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::progress::{MemorySink, NullSink};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hit(n: usize) -> SearchHit {
        SearchHit {
            title: format!("Result {}", n),
            link: format!("https://example.com/{}", n),
            snippet: format!("snippet {}", n),
        }
    }

    #[tokio::test]
    async fn test_search_web_returns_pretty_json_array() {
        let mut backend = MockSearchBackend::new();
        backend
            .expect_search()
            .times(1)
            .returning(|_, count| Ok((1..=count).map(hit).collect()));
        backend.expect_name().return_const("mock");

        let sink = Arc::new(MemorySink::new());
        let tool = WebSearchTool::new(Arc::new(backend), sink.clone());
        let value = tool
            .execute(json!({"query": "ESG trends 2024", "num_results": 2}))
            .await
            .unwrap();

        let text = value.as_str().unwrap();
        assert!(text.contains('\n'));
        let hits: Vec<SearchHit> = serde_json::from_str(text).unwrap();
        assert_eq!(hits, vec![hit(1), hit(2)]);
        assert_eq!(sink.lines(), vec!["Searching the web for: ESG trends 2024"]);
    }

    #[tokio::test]
    async fn test_search_web_uses_default_count() {
        let mut backend = MockSearchBackend::new();
        backend
            .expect_search()
            .times(1)
            .returning(|_, count| {
                assert_eq!(count, DEFAULT_RESULT_COUNT);
                Ok(Vec::new())
            });
        backend.expect_name().return_const("mock");

        let tool = WebSearchTool::new(Arc::new(backend), Arc::new(NullSink));
        let value = tool.execute(json!({"query": "rust"})).await.unwrap();
        assert_eq!(value, Value::String("[]".to_string()));
    }

    #[tokio::test]
    async fn test_search_web_missing_query() {
        let backend = MockSearchBackend::new();
        let tool = WebSearchTool::new(Arc::new(backend), Arc::new(NullSink));
        let result = tool.execute(json!({"query": "  "})).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_serpapi_reads_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("engine", "google"))
            .and(query_param("q", "solid state batteries"))
            .and(query_param("num", "2"))
            .and(query_param("api_key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [
                    {"title": "A", "link": "https://a.example", "snippet": "first"},
                    {"title": "B", "link": "https://b.example", "snippet": "second", "position": 2}
                ]
            })))
            .mount(&server)
            .await;

        let backend = SerpApiSearch::new("secret")
            .unwrap()
            .with_endpoint(format!("{}/search", server.uri()));
        let hits = backend.search("solid state batteries", 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "A");
        assert_eq!(hits[1].link, "https://b.example");
    }

    #[tokio::test]
    async fn test_serpapi_empty_result_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "Google hasn't returned any results for this query."
            })))
            .mount(&server)
            .await;

        let backend = SerpApiSearch::new("k").unwrap().with_endpoint(server.uri());
        assert!(backend.search("zzzz", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_serpapi_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let backend = SerpApiSearch::new("bad").unwrap().with_endpoint(server.uri());
        let err = backend.search("q", 5).await.unwrap_err();
        assert!(matches!(err, AppError::Tool(msg) if msg.contains("401")));
    }

    #[test]
    fn test_fetch_page_tool_definition() {
        let tool = FetchPageTool::new(Arc::new(NullSink));
        assert_eq!(tool.name(), "fetch_page");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], json!(["url"]));
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_bad_url() {
        let tool = FetchPageTool::new(Arc::new(NullSink));
        assert!(tool.execute(json!({})).await.is_err());
        assert!(tool.execute(json!({"url": "ftp://x"})).await.is_err());
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), ("hé".to_string(), true));
        assert_eq!(truncate_chars("abc", 10), ("abc".to_string(), false));
    }
}

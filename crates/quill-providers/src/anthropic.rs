//! Anthropic Messages API generator.
//!
//! Supports the server-side web search tool, `pause_turn` continuation and
//! backoff on overload / rate-limit responses.

use async_trait::async_trait;
use quill_core::{
    config::{ProviderConfig, RetryConfig},
    error::QuillError,
    traits::{Citation, Generation, GenerationRequest, Generator},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const WEB_SEARCH_TOOL: &str = "web_search_20250305";
/// Upper bound on `pause_turn` round trips for one request.
const MAX_CONTINUATIONS: usize = 8;

/// Anthropic Messages API generator.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    retry: RetryConfig,
}

impl AnthropicGenerator {
    /// Create from config values.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, QuillError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuillError::Provider(format!("anthropic: failed to build client: {e}")))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            retry: config.retry.clone(),
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WebSearchTool>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    /// Plain string for the user turn, block array for a resumed assistant turn.
    content: Value,
}

#[derive(Serialize, Clone)]
struct WebSearchTool {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
    max_uses: u32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<Value>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    server_tool_use: Option<ServerToolUse>,
}

#[derive(Deserialize, Default)]
struct ServerToolUse {
    #[serde(default)]
    web_search_requests: u32,
}

#[derive(Deserialize)]
struct TextBlock {
    #[serde(default)]
    text: String,
    #[serde(default)]
    citations: Vec<RawCitation>,
}

#[derive(Deserialize)]
struct RawCitation {
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    cited_text: Option<String>,
}

/// Accumulated state across `pause_turn` continuations.
#[derive(Default)]
struct Transcript {
    blocks: Vec<Value>,
    model: Option<String>,
    input_tokens: u64,
    output_tokens: u64,
    search_requests: u32,
}

impl Transcript {
    fn absorb(&mut self, resp: AnthropicResponse) -> Option<String> {
        self.blocks.extend(resp.content);
        if resp.model.is_some() {
            self.model = resp.model;
        }
        let usage = resp.usage.unwrap_or_default();
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.search_requests += usage
            .server_tool_use
            .map(|s| s.web_search_requests)
            .unwrap_or(0);
        resp.stop_reason
    }

    /// Concatenated text blocks plus the unique URLs they cite.
    fn text_and_citations(&self) -> (String, Vec<Citation>) {
        let mut text = String::new();
        let mut citations: Vec<Citation> = Vec::new();
        for block in &self.blocks {
            if block.get("type").and_then(Value::as_str) != Some("text") {
                continue;
            }
            let Ok(parsed) = serde_json::from_value::<TextBlock>(block.clone()) else {
                continue;
            };
            text.push_str(&parsed.text);
            for raw in parsed.citations {
                let Some(url) = raw.url else { continue };
                if citations.iter().any(|c| c.url == url) {
                    continue;
                }
                citations.push(Citation {
                    url,
                    title: raw.title.unwrap_or_default(),
                    cited_text: raw.cited_text.unwrap_or_default(),
                });
            }
        }
        (text, citations)
    }
}

/// Whether a failed response is worth retrying.
fn is_retryable(status: u16, body: &str) -> bool {
    status == 429 || status == 529 || body.contains("overloaded_error")
}

impl AnthropicGenerator {
    /// POST one request, retrying overload and rate-limit responses with backoff.
    async fn send(&self, body: &AnthropicRequest<'_>) -> Result<AnthropicResponse, QuillError> {
        let mut attempt: u32 = 0;
        loop {
            debug!(
                "anthropic: POST {} model={} attempt={}",
                self.api_url,
                body.model,
                attempt + 1
            );
            let resp = self
                .client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(body)
                .send()
                .await
                .map_err(|e| QuillError::Provider(format!("anthropic request failed: {e}")))?;

            let status = resp.status();
            if status.is_success() {
                return resp.json().await.map_err(|e| {
                    QuillError::Provider(format!("anthropic: failed to parse response: {e}"))
                });
            }

            let text = resp.text().await.unwrap_or_default();
            if is_retryable(status.as_u16(), &text) && attempt < self.retry.max_retries {
                let delay = self.retry.delay_secs(attempt);
                attempt += 1;
                warn!(
                    "anthropic: {status}, retrying in {delay}s (attempt {attempt}/{})",
                    self.retry.max_retries
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
                continue;
            }
            return Err(QuillError::Provider(format!(
                "anthropic returned {status}: {text}"
            )));
        }
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, QuillError> {
        let start = Instant::now();
        let tools = request
            .web_search
            .map(|max_uses| {
                vec![WebSearchTool {
                    kind: WEB_SEARCH_TOOL,
                    name: "web_search",
                    max_uses,
                }]
            })
            .unwrap_or_default();

        let mut transcript = Transcript::default();
        for round in 0..=MAX_CONTINUATIONS {
            let mut messages = vec![AnthropicMessage {
                role: "user",
                content: Value::String(request.user.clone()),
            }];
            if !transcript.blocks.is_empty() {
                messages.push(AnthropicMessage {
                    role: "assistant",
                    content: Value::Array(transcript.blocks.clone()),
                });
            }
            let body = AnthropicRequest {
                model: &request.model,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
                system: request.system.as_deref(),
                messages,
                tools: tools.clone(),
            };

            let resp = self.send(&body).await?;
            let stop_reason = transcript.absorb(resp);
            if stop_reason.as_deref() != Some("pause_turn") {
                break;
            }
            if round == MAX_CONTINUATIONS {
                warn!("anthropic: still paused after {MAX_CONTINUATIONS} continuations, using partial output");
                break;
            }
            info!("anthropic: turn paused during search, continuing");
        }

        let (text, citations) = transcript.text_and_citations();
        if text.trim().is_empty() {
            return Err(QuillError::Provider(
                "anthropic: response contained no text".into(),
            ));
        }

        Ok(Generation {
            text,
            citations,
            model: transcript.model.unwrap_or_else(|| request.model.clone()),
            input_tokens: transcript.input_tokens,
            output_tokens: transcript.output_tokens,
            search_requests: transcript.search_requests,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(web_search: Option<u32>) -> GenerationRequest {
        GenerationRequest {
            system: None,
            user: "Hello".into(),
            model: "claude-sonnet-4-5-20250929".into(),
            max_tokens: 4096,
            temperature: 0.0,
            web_search,
        }
    }

    #[test]
    fn test_generator_name() {
        let g = AnthropicGenerator::from_config(&ProviderConfig::default()).unwrap();
        assert_eq!(g.name(), "anthropic");
    }

    #[test]
    fn test_request_serialization_with_search_tool() {
        let req = request(Some(3));
        let body = AnthropicRequest {
            model: &req.model,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            system: Some("Be precise."),
            messages: vec![AnthropicMessage {
                role: "user",
                content: Value::String(req.user.clone()),
            }],
            tools: vec![WebSearchTool {
                kind: WEB_SEARCH_TOOL,
                name: "web_search",
                max_uses: 3,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-5-20250929");
        assert_eq!(json["system"], "Be precise.");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert_eq!(json["tools"][0]["type"], "web_search_20250305");
        assert_eq!(json["tools"][0]["max_uses"], 3);
    }

    #[test]
    fn test_request_omits_empty_system_and_tools() {
        let body = AnthropicRequest {
            model: "m",
            max_tokens: 10,
            temperature: 0.7,
            system: None,
            messages: vec![],
            tools: vec![],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_response_text_blocks_concatenated() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Python is used by "},
                {"type": "server_tool_use", "id": "srvtoolu_1", "name": "web_search", "input": {"query": "python"}},
                {"type": "web_search_tool_result", "tool_use_id": "srvtoolu_1", "content": []},
                {"type": "text", "text": "51% of developers.", "citations": [
                    {"type": "web_search_result_location", "url": "https://survey.stackoverflow.co/2026/", "title": "Survey", "cited_text": "51%"},
                    {"type": "web_search_result_location", "url": "https://survey.stackoverflow.co/2026/", "title": "Survey", "cited_text": "51%"}
                ]}
            ],
            "model": "claude-sonnet-4-5-20250929",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 100, "output_tokens": 20, "server_tool_use": {"web_search_requests": 2}}
        }"#;
        let resp: AnthropicResponse = serde_json::from_str(json).unwrap();
        let mut t = Transcript::default();
        assert_eq!(t.absorb(resp).as_deref(), Some("end_turn"));
        let (text, citations) = t.text_and_citations();
        assert_eq!(text, "Python is used by 51% of developers.");
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://survey.stackoverflow.co/2026/");
        assert_eq!(t.search_requests, 2);
        assert_eq!(t.input_tokens, 100);
    }

    #[test]
    fn test_transcript_accumulates_continuations() {
        let first: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Part one. "}],"stop_reason":"pause_turn","usage":{"input_tokens":5,"output_tokens":3}}"#,
        )
        .unwrap();
        let second: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Part two."}],"model":"m","stop_reason":"end_turn","usage":{"input_tokens":7,"output_tokens":4}}"#,
        )
        .unwrap();
        let mut t = Transcript::default();
        assert_eq!(t.absorb(first).as_deref(), Some("pause_turn"));
        assert_eq!(t.absorb(second).as_deref(), Some("end_turn"));
        let (text, _) = t.text_and_citations();
        assert_eq!(text, "Part one. Part two.");
        assert_eq!(t.input_tokens, 12);
        assert_eq!(t.output_tokens, 7);
        assert_eq!(t.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(429, ""));
        assert!(is_retryable(529, ""));
        assert!(is_retryable(500, r#"{"type":"error","error":{"type":"overloaded_error"}}"#));
        assert!(!is_retryable(400, r#"{"error":{"type":"invalid_request_error"}}"#));
        assert!(!is_retryable(401, ""));
    }
}

// LLM access for the AI routes
// GeminiClient talks to the generateContent and streamGenerateContent REST
// endpoints; LlmGateway adds caching and rate-limit retries in front of any
// TextGenerator.

use crate::metrics;
use async_trait::async_trait;
use aura_resilience::{ResponseCache, RetryPolicy};
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM is not configured: {0}")]
    NotConfigured(String),
    #[error("Gemini API request failed: {0}")]
    Request(String),
    #[error("Gemini API error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to parse Gemini response: {0}")]
    Parse(String),
    #[error("Gemini returned no text")]
    Empty,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request(err.to_string())
    }
}

/// Incremental text of one streamed reply
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;

    /// Generators without native streaming deliver the whole reply as one chunk
    async fn generate_stream(&self, model: &str, prompt: &str) -> Result<TextStream, LlmError> {
        let text = self.generate(model, prompt).await?;
        Ok(stream::iter([Ok(text)]).boxed())
    }
}

pub struct GeminiClient {
    api_key: Option<String>,
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured("GEMINI_API_KEY is not set".to_string()))
    }

    fn request_body(prompt: &str) -> GeminiRequest<'_> {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
        }
    }

    async fn post(&self, model: &str, method: &str, prompt: &str) -> Result<reqwest::Response, LlmError> {
        let api_key = self.api_key()?;
        let url = format!("{}/models/{}:{}", self.base_url, model, method);
        let mut query = vec![("key", api_key)];
        if method == "streamGenerateContent" {
            query.push(("alt", "sse"));
        }

        let response = self
            .client
            .post(&url)
            .query(&query)
            .json(&Self::request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status.as_u16(), &body));
        }
        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Concatenated text parts of the first candidate, untrimmed
fn candidate_text(response: GeminiResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn response_text(response: GeminiResponse) -> Result<String, LlmError> {
    let text = candidate_text(response);
    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(text.to_string())
}

/// Keep the vendor's status token (e.g. RESOURCE_EXHAUSTED) in the message
/// so the retry classifier can see it.
fn status_error(status: u16, body: &str) -> LlmError {
    let message = match serde_json::from_str::<GeminiErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(token) => format!("{} ({})", parsed.error.message, token),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    };
    LlmError::Status { status, message }
}

/// Text carried by one server-sent event line; other lines yield nothing
fn sse_line_text(line: &str) -> Option<Result<String, LlmError>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<GeminiResponse>(data)
            .map(candidate_text)
            .map_err(|e| LlmError::Parse(e.to_string())),
    )
}

/// Split complete lines off the front of `buffer`. Bytes are only decoded
/// once a full line is present so multi-byte characters are never cut.
fn drain_sse_lines(buffer: &mut Vec<u8>, pending: &mut VecDeque<Result<String, LlmError>>) {
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        if let Some(item) = sse_line_text(String::from_utf8_lossy(&line).trim_end()) {
            pending.push_back(item);
        }
    }
}

struct SseState {
    response: Option<reqwest::Response>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, LlmError>>,
}

fn sse_stream(response: reqwest::Response) -> TextStream {
    let state = SseState {
        response: Some(response),
        buffer: Vec::new(),
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            let Some(response) = state.response.as_mut() else {
                return None;
            };
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    state.buffer.extend_from_slice(&bytes);
                    drain_sse_lines(&mut state.buffer, &mut state.pending);
                }
                Ok(None) => {
                    state.response = None;
                    state.buffer.push(b'\n');
                    drain_sse_lines(&mut state.buffer, &mut state.pending);
                }
                Err(e) => {
                    state.response = None;
                    return Some((Err(LlmError::from(e)), state));
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self.post(model, "generateContent", prompt).await?;

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        response_text(parsed)
    }

    async fn generate_stream(&self, model: &str, prompt: &str) -> Result<TextStream, LlmError> {
        let response = self.post(model, "streamGenerateContent", prompt).await?;
        Ok(sse_stream(response))
    }
}

/// Shared front door to the LLM: cache lookup, then a retried call, then cache fill
#[derive(Clone)]
pub struct LlmGateway {
    generator: Arc<dyn TextGenerator>,
    cache: Arc<ResponseCache>,
    retry: RetryPolicy,
    model: String,
}

impl LlmGateway {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        cache: Arc<ResponseCache>,
        retry: RetryPolicy,
        model: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            cache,
            retry,
            model: model.into(),
        }
    }

    pub async fn generate(&self, operation: &str, prompt: &str) -> Result<String, LlmError> {
        if let Some(cached) = self.cache.get(prompt, &self.model) {
            metrics::LLM_CACHE_TOTAL.with_label_values(&["hit"]).inc();
            debug!(operation, "Serving LLM response from cache");
            return Ok(cached);
        }
        metrics::LLM_CACHE_TOTAL.with_label_values(&["miss"]).inc();

        let text = self
            .retry
            .call(operation, || self.generator.generate(&self.model, prompt))
            .await?;

        self.cache.put(prompt, text.clone(), &self.model);
        Ok(text)
    }

    /// Open a streamed reply. Only opening the stream is retried, and streamed
    /// replies are never cached.
    pub async fn stream(&self, operation: &str, prompt: &str) -> Result<TextStream, LlmError> {
        self.retry
            .call(operation, || self.generator.generate_stream(&self.model, prompt))
            .await
    }
}

/// Pull the JSON payload out of a model reply that may wrap it in a fenced block
pub fn extract_json_block(text: &str) -> &str {
    if let Some((_, rest)) = text.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    let mut fenced = text.split("```");
    match (fenced.next(), fenced.next()) {
        (Some(_), Some(inner)) => inner.trim(),
        _ => text.trim(),
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::ScriptedGenerator;
    use super::*;
    use std::time::Duration;

    fn gateway(generator: Arc<ScriptedGenerator>) -> LlmGateway {
        LlmGateway::new(
            generator,
            Arc::new(ResponseCache::new()),
            RetryPolicy::new(3, Duration::from_millis(1)),
            "test-model",
        )
    }

    #[test]
    fn test_extract_json_block() {
        assert_eq!(extract_json_block("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json_block("intro ```\n{\"a\": 2}\n``` outro"), "{\"a\": 2}");
        assert_eq!(extract_json_block("  {\"a\": 3}  "), "{\"a\": 3}");
    }

    #[test]
    fn test_status_error_keeps_vendor_token() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = status_error(429, body);
        let message = err.to_string();
        assert_eq!(
            message,
            "Gemini API error 429: Resource has been exhausted (RESOURCE_EXHAUSTED)"
        );
        assert!(aura_resilience::is_transient(&message));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let parsed: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": " Hello "}, {"text": "world "}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(parsed).unwrap(), "Hello world");

        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(response_text(empty), Err(LlmError::Empty)));
    }

    #[test]
    fn test_sse_lines_survive_split_chunks() {
        let mut buffer = Vec::new();
        let mut pending = VecDeque::new();

        buffer.extend_from_slice(b"data: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"Hel");
        drain_sse_lines(&mut buffer, &mut pending);
        assert!(pending.is_empty());

        buffer.extend_from_slice(b"lo \"}]}}]}\r\n\r\ndata: {\"candidates\": []}\n");
        drain_sse_lines(&mut buffer, &mut pending);

        let texts: Vec<String> = pending.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["Hello ".to_string(), String::new()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sse_non_data_lines_are_skipped() {
        assert!(sse_line_text("").is_none());
        assert!(sse_line_text(": keep-alive").is_none());
        assert!(matches!(sse_line_text("data: not json"), Some(Err(LlmError::Parse(_)))));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_not_configured() {
        let client = GeminiClient::new(None);
        let err = client.generate("model", "prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));

        let err = client.generate_stream("model", "prompt").await.err().unwrap();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_gateway_caches_successful_replies() {
        let generator = Arc::new(ScriptedGenerator::new().reply("first"));
        let gateway = gateway(generator.clone());

        assert_eq!(gateway.generate("hint", "prompt").await.unwrap(), "first");
        assert_eq!(gateway.generate("hint", "prompt").await.unwrap(), "first");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_gateway_retries_rate_limits() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .fail("429 Too Many Requests")
                .reply("after retry"),
        );
        let gateway = gateway(generator.clone());

        assert_eq!(gateway.generate("hint", "prompt").await.unwrap(), "after retry");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_gateway_stream_retries_opening_and_skips_cache() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .fail("RESOURCE_EXHAUSTED")
                .reply("whole reply")
                .reply("second reply"),
        );
        let gateway = gateway(generator.clone());

        let chunks: Vec<String> = gateway
            .stream("pair", "prompt")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["whole reply".to_string()]);
        assert_eq!(generator.calls(), 2);

        let chunks: Vec<String> = gateway
            .stream("pair", "prompt")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["second reply".to_string()]);
    }

    #[tokio::test]
    async fn test_gateway_does_not_cache_failures() {
        let generator = Arc::new(ScriptedGenerator::new().fail("invalid key").reply("ok"));
        let gateway = gateway(generator.clone());

        assert!(gateway.generate("hint", "prompt").await.is_err());
        assert_eq!(generator.calls(), 1);
        assert_eq!(gateway.generate("hint", "prompt").await.unwrap(), "ok");
    }
}

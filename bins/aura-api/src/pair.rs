// Pair programming orchestrator
//
// A session streams the model's reply as it is written, then closes with one
// terminal frame: the parsed suggestion, or an error. The whole session is
// bounded by a fixed window.

use crate::llm::{LlmError, LlmGateway};
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const SESSION_WINDOW: Duration = Duration::from_secs(30);
pub const SESSION_TIMEOUT_MESSAGE: &str = "Session timeout - pair programming window closed";

const FRAME_BUFFER: usize = 32;

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairSession {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_code: String,
    #[serde(default)]
    pub problem_description: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Earlier turns of the conversation, passed through untouched
    #[serde(default)]
    pub context_window: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeSuggestion {
    pub suggestion: String,
    pub explanation: String,
    pub code_snippet: Option<String>,
    pub language: String,
}

/// One NDJSON line of a streamed session
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Chunk { text: String },
    SuggestionComplete { data: Value },
    Error { message: String },
}

impl StreamFrame {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFrame::Chunk { .. })
    }
}

#[derive(Debug, Default, Deserialize)]
struct SuggestionFields {
    #[serde(default)]
    suggestion: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    code_snippet: Option<String>,
}

/// Widest `{ ... }` span of a reply: first opening brace to last closing brace
fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Payload of the terminal frame. Replies without a JSON object are passed on as plain text.
fn completed_suggestion(reply: &str, language: &str) -> Value {
    if let Some(span) = json_object_span(reply) {
        match serde_json::from_str::<Value>(span) {
            Ok(data @ Value::Object(_)) => return data,
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Streamed suggestion was not valid JSON"),
        }
    }
    json!({
        "suggestion": reply,
        "explanation": "Pair programming suggestion",
        "language": language,
    })
}

fn session_prompt(session: &PairSession) -> String {
    format!(
        "You are an expert React developer pair programming with someone building a React component for a hackathon challenge.\n\n\
         Challenge: {}\n\n\
         Their current React code ({}):\n```tsx\n{}\n```\n\n\
         Identify where they left off and suggest the single most impactful next step. \
         Mention a specific hook, pattern or JSX snippet to write next (max 8 lines) and keep it encouraging.\n\n\
         Respond as JSON with keys: suggestion, explanation, code_snippet (optional), language",
        session.problem_description, session.language, session.user_code,
    )
}

fn next_step_prompt(session: &PairSession) -> String {
    format!(
        "Given this code and problem, what's the next best step?\n\n\
         Problem: {}\n\n\
         Current code in {}:\n```\n{}\n```\n\n\
         Respond with JSON: {{\"suggestion\": \"...\", \"explanation\": \"...\", \"code_snippet\": \"...\"}}",
        session.problem_description, session.language, session.user_code,
    )
}

#[derive(Clone)]
pub struct PairProgrammer {
    llm: LlmGateway,
    window: Duration,
}

impl PairProgrammer {
    pub fn new(llm: LlmGateway) -> Self {
        Self {
            llm,
            window: SESSION_WINDOW,
        }
    }

    /// Stream a session. The returned stream always ends with exactly one terminal frame.
    pub fn stream_session(&self, session: PairSession) -> impl Stream<Item = StreamFrame> + Send + 'static {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let programmer = self.clone();
        tokio::spawn(async move { programmer.run_session(session, tx).await });

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|frame| (frame, rx)) })
    }

    async fn run_session(&self, session: PairSession, tx: mpsc::Sender<StreamFrame>) {
        let prompt = session_prompt(&session);
        let mut reply = String::new();

        let streamed = tokio::time::timeout(self.window, async {
            let mut chunks = self.llm.stream("pair_session", &prompt).await?;
            while let Some(chunk) = chunks.next().await {
                let text = chunk?;
                if text.is_empty() {
                    continue;
                }
                reply.push_str(&text);
                if tx.send(StreamFrame::Chunk { text }).await.is_err() {
                    debug!(session_id = %session.session_id, "Client left the pair session");
                    break;
                }
            }
            Ok::<(), LlmError>(())
        })
        .await;

        let last = match streamed {
            Ok(Ok(())) => StreamFrame::SuggestionComplete {
                data: completed_suggestion(&reply, &session.language),
            },
            Ok(Err(e)) => {
                warn!(session_id = %session.session_id, error = %e, "Pair session failed");
                StreamFrame::Error {
                    message: format!("Pair programming error: {}", e),
                }
            }
            Err(_) => {
                warn!(session_id = %session.session_id, window_secs = self.window.as_secs(), "Pair session window closed");
                StreamFrame::Error {
                    message: SESSION_TIMEOUT_MESSAGE.to_string(),
                }
            }
        };

        info!(
            session_id = %session.session_id,
            history_turns = session.context_window.len(),
            reply_chars = reply.len(),
            completed = matches!(last, StreamFrame::SuggestionComplete { .. }),
            "Pair session finished"
        );
        let _ = tx.send(last).await;
    }

    /// One-shot suggestion for the next step; failures become a fallback suggestion
    pub async fn next_step(&self, session: &PairSession) -> CodeSuggestion {
        let prompt = next_step_prompt(session);
        let parsed = match self.llm.generate("pair_next_step", &prompt).await {
            Ok(reply) => match json_object_span(&reply) {
                Some(span) => serde_json::from_str::<SuggestionFields>(span).map_err(|e| e.to_string()),
                None => Ok(SuggestionFields::default()),
            },
            Err(e) => Err(e.to_string()),
        };

        match parsed {
            Ok(fields) => CodeSuggestion {
                suggestion: fields.suggestion,
                explanation: fields.explanation,
                code_snippet: fields.code_snippet,
                language: session.language.clone(),
            },
            Err(message) => {
                warn!(session_id = %session.session_id, error = %message, "Next step analysis failed, using fallback");
                CodeSuggestion {
                    suggestion: "Unable to generate suggestion".to_string(),
                    explanation: message,
                    code_snippet: None,
                    language: session.language.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fakes::{ScriptedGenerator, StreamEnd};
    use aura_resilience::{ResponseCache, RetryPolicy};
    use std::sync::Arc;

    fn programmer(generator: ScriptedGenerator) -> PairProgrammer {
        PairProgrammer::new(LlmGateway::new(
            Arc::new(generator),
            Arc::new(ResponseCache::new()),
            RetryPolicy::new(0, Duration::from_millis(1)),
            "test-model",
        ))
    }

    fn session() -> PairSession {
        serde_json::from_value(json!({
            "session_id": "pair-1",
            "user_code": "function Todo() {}",
            "problem_description": "Build a todo list",
            "language": "tsx"
        }))
        .unwrap()
    }

    async fn frames(programmer: &PairProgrammer) -> Vec<StreamFrame> {
        programmer.stream_session(session()).collect().await
    }

    #[test]
    fn test_session_defaults() {
        let session: PairSession = serde_json::from_str("{}").unwrap();
        assert_eq!(session.language, "python");
        assert!(session.session_id.is_empty());
        assert!(session.context_window.is_empty());
    }

    #[test]
    fn test_frame_wire_shape() {
        let chunk = serde_json::to_value(StreamFrame::Chunk { text: "a".to_string() }).unwrap();
        assert_eq!(chunk, json!({"type": "chunk", "text": "a"}));

        let done = serde_json::to_value(StreamFrame::SuggestionComplete { data: json!({}) }).unwrap();
        assert_eq!(done, json!({"type": "suggestion_complete", "data": {}}));
    }

    #[test]
    fn test_json_object_span() {
        assert_eq!(json_object_span("```json\n{\"a\": {\"b\": 1}}\n```"), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(json_object_span("no braces"), None);
        assert_eq!(json_object_span("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_stream_relays_chunks_then_parsed_suggestion() {
        let programmer = programmer(ScriptedGenerator::new().stream(
            &["{\"suggestion\": \"Add useState\", ", "\"explanation\": \"Track items\"}"],
            StreamEnd::Done,
        ));

        let frames = frames(&programmer).await;

        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[0],
            StreamFrame::Chunk {
                text: "{\"suggestion\": \"Add useState\", ".to_string()
            }
        );
        assert_eq!(
            frames[2],
            StreamFrame::SuggestionComplete {
                data: json!({"suggestion": "Add useState", "explanation": "Track items"})
            }
        );
    }

    #[tokio::test]
    async fn test_plain_text_reply_completes_with_fallback_payload() {
        let programmer = programmer(ScriptedGenerator::new().stream(&["Add a form"], StreamEnd::Done));

        let frames = frames(&programmer).await;
        assert_eq!(
            frames.last(),
            Some(&StreamFrame::SuggestionComplete {
                data: json!({
                    "suggestion": "Add a form",
                    "explanation": "Pair programming suggestion",
                    "language": "tsx"
                })
            })
        );
    }

    #[tokio::test]
    async fn test_stream_failure_ends_with_error_frame() {
        let programmer = programmer(ScriptedGenerator::new().stream(&["partial"], StreamEnd::Fail("connection reset")));

        let frames = frames(&programmer).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[1],
            StreamFrame::Error {
                message: "Pair programming error: Gemini API request failed: connection reset".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_stream_hits_session_window() {
        let programmer = programmer(ScriptedGenerator::new().stream(&["thinking"], StreamEnd::Stall));

        let frames = frames(&programmer).await;
        assert_eq!(
            frames.last(),
            Some(&StreamFrame::Error {
                message: SESSION_TIMEOUT_MESSAGE.to_string()
            })
        );
        assert_eq!(frames.iter().filter(|f| f.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_next_step_parses_suggestion() {
        let programmer = programmer(ScriptedGenerator::new().reply(
            "Sure!\n{\"suggestion\": \"Map over todos\", \"explanation\": \"Render the list\", \"code_snippet\": \"todos.map(t => <li>{t}</li>)\"}",
        ));

        let suggestion = programmer.next_step(&session()).await;
        assert_eq!(
            suggestion,
            CodeSuggestion {
                suggestion: "Map over todos".to_string(),
                explanation: "Render the list".to_string(),
                code_snippet: Some("todos.map(t => <li>{t}</li>)".to_string()),
                language: "tsx".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_next_step_without_json_is_empty_suggestion() {
        let programmer = programmer(ScriptedGenerator::new().reply("Keep going"));

        let suggestion = programmer.next_step(&session()).await;
        assert_eq!(suggestion.suggestion, "");
        assert_eq!(suggestion.explanation, "");
        assert!(suggestion.code_snippet.is_none());
    }

    #[tokio::test]
    async fn test_next_step_failure_falls_back() {
        let programmer = programmer(ScriptedGenerator::new().fail("invalid key"));

        let suggestion = programmer.next_step(&session()).await;
        assert_eq!(suggestion.suggestion, "Unable to generate suggestion");
        assert_eq!(suggestion.explanation, "Gemini API request failed: invalid key");
        assert_eq!(suggestion.language, "tsx");
    }
}

use std::error::Error as StdError;
use std::fmt;

use futures_util::StreamExt;
use memchr::memchr;

use crate::api::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use crate::core::backend::{ChatBackend, Conversation, FragmentSink, FragmentStream, FALLBACK_REPLY};
use crate::core::config::Config;
use crate::core::message::{Attachment, Message, Role};
use crate::utils::url::construct_api_url;

/// Everything the Gemini backend needs besides the HTTP client.
#[derive(Clone, Debug)]
pub struct GeminiSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub system_instruction: String,
}

impl GeminiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            api_key: config.api_key(),
            temperature: config.temperature(),
            system_instruction: config.system_instruction().to_string(),
        }
    }

    fn stream_url(&self) -> String {
        construct_api_url(
            &self.base_url,
            &format!("models/{}:streamGenerateContent?alt=sse", self.model),
        )
    }
}

#[derive(Debug)]
enum StreamError {
    MissingApiKey,
    Transport(reqwest::Error),
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    Payload(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::MissingApiKey => write!(f, "no API key configured"),
            StreamError::Transport(err) => write!(f, "request failed: {err}"),
            StreamError::Status { status, body } => match summarize_error_body(body) {
                Some(summary) => write!(f, "API returned {status}: {summary}"),
                None => write!(f, "API returned {status}"),
            },
            StreamError::Payload(detail) => write!(f, "API error: {detail}"),
        }
    }
}

impl StdError for StreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StreamError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineOutcome {
    Continue,
    /// The consumer went away; stop reading.
    Stop,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str, sink: &FragmentSink) -> Result<LineOutcome, StreamError> {
    if payload.trim().is_empty() {
        return Ok(LineOutcome::Continue);
    }

    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(response) if !response.candidates.is_empty() => {
            if let Some(text) = response.text() {
                if !sink.chunk(text) {
                    return Ok(LineOutcome::Stop);
                }
            }
            match response.finish_reason() {
                None | Some("STOP") => {}
                Some(reason) => tracing::warn!("reply cut short by the model: {reason}"),
            }
            Ok(LineOutcome::Continue)
        }
        _ => match summarize_error_body(payload) {
            Some(summary) => Err(StreamError::Payload(summary)),
            None => Ok(LineOutcome::Continue),
        },
    }
}

fn process_sse_line(line: &str, sink: &FragmentSink) -> Result<LineOutcome, StreamError> {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, sink))
        .unwrap_or(Ok(LineOutcome::Continue))
}

/// One-line summary of a JSON error body, for logs.
fn summarize_error_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    let value = match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(collapsed.trim().to_string())
}

struct StreamParams {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    request: GenerateContentRequest,
}

async fn stream_reply(params: StreamParams, sink: &FragmentSink) -> Result<(), StreamError> {
    let StreamParams {
        client,
        url,
        api_key,
        request,
    } = params;
    let api_key = api_key.ok_or(StreamError::MissingApiKey)?;

    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", api_key)
        .json(&request)
        .send()
        .await
        .map_err(StreamError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(StreamError::Status { status, body });
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk_bytes = chunk.map_err(StreamError::Transport)?;
        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let outcome = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(line) => process_sse_line(line.trim(), sink)?,
                Err(err) => {
                    tracing::warn!("invalid UTF-8 in stream: {err}");
                    LineOutcome::Continue
                }
            };
            buffer.drain(..=newline_pos);
            if outcome == LineOutcome::Stop {
                return Ok(());
            }
        }
    }

    if let Ok(rest) = std::str::from_utf8(&buffer) {
        process_sse_line(rest.trim(), sink)?;
    }
    Ok(())
}

/// Streams replies from Gemini's `streamGenerateContent` SSE endpoint.
#[derive(Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    settings: GeminiSettings,
}

impl GeminiBackend {
    pub fn new(client: reqwest::Client, settings: GeminiSettings) -> Self {
        if settings.api_key.is_none() {
            tracing::warn!("no API key found; every reply will fail until one is set");
        }
        Self { client, settings }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> GenerateContentRequest {
        let mut contents = conversation.history().to_vec();
        contents.push(Content::turn(Role::User.as_str(), text, attachment));
        GenerateContentRequest {
            system_instruction: Content::system(conversation.system_instruction()),
            contents,
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        }
    }
}

impl ChatBackend for GeminiBackend {
    fn start_conversation(&self, prior: &[Message]) -> Conversation {
        Conversation::new(self.settings.system_instruction.clone(), prior)
    }

    fn send_turn(
        &self,
        conversation: &Conversation,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> FragmentStream {
        let (sink, stream) = FragmentStream::channel();
        let params = StreamParams {
            client: self.client.clone(),
            url: self.settings.stream_url(),
            api_key: self.settings.api_key.clone(),
            request: self.build_request(conversation, text, attachment),
        };
        let model = self.settings.model.clone();

        tokio::spawn(async move {
            let cancel_token = sink.cancel_token().clone();
            tokio::select! {
                result = stream_reply(params, &sink) => match result {
                    Ok(()) => sink.end(),
                    Err(err) => {
                        tracing::error!("error streaming reply from {model}: {err}");
                        sink.fail(FALLBACK_REPLY);
                    }
                },
                _ = cancel_token.cancelled() => {
                    tracing::debug!("reply stream from {model} cancelled");
                }
            }
        });

        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::StreamMessage;

    fn settings() -> GeminiSettings {
        GeminiSettings {
            base_url: "https://example.test/v1beta/".into(),
            model: "gemini-test".into(),
            api_key: Some("key".into()),
            temperature: 0.7,
            system_instruction: "directive".into(),
        }
    }

    #[tokio::test]
    async fn process_sse_line_handles_spacing_variants() {
        let (sink, mut stream) = FragmentStream::channel();
        let lines = [
            r#"data: {"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#,
            r#"data:{"candidates":[{"content":{"parts":[{"text":" world"}],"role":"model"}}]}"#,
            "",
            ": keep-alive",
        ];
        for line in lines {
            assert_eq!(
                process_sse_line(line, &sink).expect("line"),
                LineOutcome::Continue
            );
        }
        sink.end();

        assert_eq!(
            stream.next().await,
            Some(StreamMessage::Chunk("Hello".into()))
        );
        assert_eq!(
            stream.next().await,
            Some(StreamMessage::Chunk(" world".into()))
        );
        assert_eq!(stream.next().await, Some(StreamMessage::End));
    }

    #[tokio::test]
    async fn empty_candidates_produce_no_fragments() {
        let (sink, mut stream) = FragmentStream::channel();
        let line = r#"data: {"candidates":[{"finishReason":"STOP"}],"usageMetadata":{}}"#;
        assert_eq!(
            process_sse_line(line, &sink).expect("line"),
            LineOutcome::Continue
        );
        sink.end();
        assert_eq!(stream.next().await, Some(StreamMessage::End));
    }

    #[test]
    fn error_payloads_surface_as_stream_errors() {
        let (sink, _stream) = FragmentStream::channel();
        let line = r#"data: {"error":{"code":503,"message":"The model is   overloaded."}}"#;
        match process_sse_line(line, &sink) {
            Err(StreamError::Payload(summary)) => {
                assert_eq!(summary, "The model is overloaded.")
            }
            other => panic!("expected payload error, got {other:?}"),
        }
    }

    #[test]
    fn closed_consumer_stops_processing() {
        let (sink, mut stream) = FragmentStream::channel();
        stream.close();
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"x"}]}}]}"#;
        assert_eq!(
            process_sse_line(line, &sink).expect("line"),
            LineOutcome::Stop
        );
    }

    #[test]
    fn status_errors_summarize_array_bodies() {
        let body = r#"[{"error":{"code":400,"message":"API key not valid."}}]"#;
        let err = StreamError::Status {
            status: reqwest::StatusCode::BAD_REQUEST,
            body: body.into(),
        };
        assert_eq!(
            err.to_string(),
            "API returned 400 Bad Request: API key not valid."
        );
    }

    #[test]
    fn stream_url_targets_sse_endpoint() {
        assert_eq!(
            settings().stream_url(),
            "https://example.test/v1beta/models/gemini-test:streamGenerateContent?alt=sse"
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_with_fallback_text() {
        let backend = GeminiBackend::new(
            reqwest::Client::new(),
            GeminiSettings {
                api_key: None,
                ..settings()
            },
        );
        let conversation = backend.start_conversation(&[]);
        let mut stream = backend.send_turn(&conversation, "Hello", None);
        assert_eq!(
            stream.next().await,
            Some(StreamMessage::Error(FALLBACK_REPLY.into()))
        );
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_with_fallback_text() {
        let backend = GeminiBackend::new(
            reqwest::Client::new(),
            GeminiSettings {
                base_url: "http://127.0.0.1:9".into(),
                ..settings()
            },
        );
        let conversation = backend.start_conversation(&[]);
        let mut stream = backend.send_turn(&conversation, "Hello", None);
        assert_eq!(
            stream.next().await,
            Some(StreamMessage::Error(FALLBACK_REPLY.into()))
        );
    }

    #[test]
    fn request_appends_user_turn_after_history() {
        let backend = GeminiBackend::new(reqwest::Client::new(), settings());
        let prior = vec![Message::user("Earlier", None), Message::model("Reply")];
        let conversation = backend.start_conversation(&prior);
        let request = backend.build_request(&conversation, "Now", None);

        assert_eq!(request.contents.len(), 3);
        assert_eq!(request.contents[2], Content::turn("user", "Now", None));
        assert_eq!(request.system_instruction, Content::system("directive"));
        assert_eq!(request.generation_config.temperature, 0.7);
    }
}

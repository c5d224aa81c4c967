//! Unify router client.
//!
//! Unify exposes an OpenAI-compatible chat-completions endpoint where the
//! target model is named `model@provider`. Streaming responses arrive as
//! server-sent events whose `data:` payloads carry `choices[0].delta.content`
//! and end with `data: [DONE]`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt, stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::backpressure::{DEFAULT_STREAM_BUFFER, bounded_stream};
use super::traits::CompletionClient;
use crate::stream::FragmentStream;
use crate::telemetry;
use crate::types::GenerateOptions;
use crate::{PromptifyError, Result};

/// Default base URL for the Unify API.
pub const DEFAULT_BASE_URL: &str = "https://api.unify.ai/v0";

/// Default request timeout for single-shot calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for the Unify chat-completions API.
#[derive(Clone)]
pub struct UnifyClient {
    api_key: String,
    http: Client,
    base_url: String,
    timeout: Duration,
    stream_buffer: usize,
}

impl UnifyClient {
    /// Create a client for the public Unify API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        // No overall timeout on the shared client: it would cut long streams.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                PromptifyError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        })
    }

    /// Set the timeout for single-shot requests.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many fragments may queue ahead of a slow consumer.
    pub fn stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size;
        self
    }

    /// Replace the API key used for subsequent requests.
    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = api_key.into();
    }

    async fn send(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream,
            options,
        };

        let mut request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        if !stream {
            request = request.timeout(self.timeout);
        }

        let operation = if stream { "generate_stream" } else { "generate" };
        let started = Instant::now();
        let result = match request.send().await {
            Ok(response) => check_status(response).await,
            Err(e) => Err(e.into()),
        };
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL, "operation" => operation, "status" => status)
            .increment(1);
        result
    }
}

#[async_trait]
impl CompletionClient for UnifyClient {
    fn name(&self) -> &str {
        "unify"
    }

    #[instrument(name = "unify.generate", skip(self, prompt, options), fields(model = %options.model))]
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let response = self.send(prompt, options, false).await?;
        let completion: ChatCompletion = response.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(PromptifyError::EmptyResponse)?;
        debug!(chars = text.len(), "completion received");
        Ok(text)
    }

    #[instrument(name = "unify.generate_stream", skip(self, prompt, options), fields(model = %options.model))]
    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<FragmentStream> {
        let response = self.send(prompt, options, true).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| PromptifyError::Stream(e.to_string())));
        Ok(bounded_stream(
            Box::pin(sse_fragments(bytes)),
            self.stream_buffer,
        ))
    }
}

/// Map a non-success HTTP status to an error, keeping the body as message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(PromptifyError::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(PromptifyError::RateLimited { retry_after })
        }
        code => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message())
                .unwrap_or(body);
            Err(PromptifyError::Api {
                status: code,
                message,
            })
        }
    }
}

/// Decode a server-sent-event byte stream into content fragments.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across chunks decode correctly. Comment and non-`data`
/// lines are ignored; `[DONE]` ends the stream.
pub(crate) fn sse_fragments<S, B>(bytes: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(bytes),
        buffer: Vec::new(),
        queue: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.queue.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(chunk.as_ref());
                    while let Some(pos) = st.buffer.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = st.buffer.drain(..=pos).collect();
                        st.handle_line(&line);
                        if st.done {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    st.done = true;
                    st.queue.push_back(Err(e));
                }
                None => {
                    st.done = true;
                    let rest = std::mem::take(&mut st.buffer);
                    st.handle_line(&rest);
                }
            }
        }
    })
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    queue: VecDeque<Result<String>>,
    done: bool,
}

impl<S> SseState<S> {
    fn handle_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return;
        }

        match serde_json::from_str::<StreamChunk>(data) {
            Ok(StreamChunk {
                error: Some(error), ..
            }) => {
                self.done = true;
                self.queue.push_back(Err(PromptifyError::Stream(error.to_string())));
            }
            Ok(chunk) => {
                let content = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .filter(|s| !s.is_empty());
                if let Some(content) = content {
                    self.queue.push_back(Ok(content));
                }
            }
            Err(e) => {
                self.done = true;
                self.queue.push_back(Err(PromptifyError::Stream(format!(
                    "malformed event payload: {e}"
                ))));
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    #[serde(flatten)]
    options: &'a GenerateOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        let value = self.detail.or(self.error)?;
        Some(match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Object(ref map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
            other => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn decode(chunks: Vec<&'static str>) -> Vec<Result<String>> {
        let source = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, PromptifyError>(c.as_bytes())),
        );
        sse_fragments(source).collect().await
    }

    fn texts(items: Vec<Result<String>>) -> Vec<String> {
        items.into_iter().map(|i| i.unwrap()).collect()
    }

    #[tokio::test]
    async fn decodes_content_deltas() {
        let items = decode(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;
        assert_eq!(texts(items), vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn events_split_across_chunks() {
        let items = decode(vec![
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"a\"}}]}\n",
            "\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\ndata: [DONE]\n",
        ])
        .await;
        assert_eq!(texts(items), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn multibyte_characters_split_across_chunks() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n\n";
        let bytes = event.as_bytes();
        // Split inside the two-byte encoding of 'é'.
        let split = event.find('\u{e9}').unwrap() + 1;
        let source = stream::iter(vec![
            Ok::<_, PromptifyError>(bytes[..split].to_vec()),
            Ok(bytes[split..].to_vec()),
        ]);
        let items: Vec<_> = sse_fragments(source).collect().await;
        assert_eq!(texts(items), vec!["café"]);
    }

    #[tokio::test]
    async fn ignores_comments_and_empty_deltas() {
        let items = decode(vec![
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n",
        ])
        .await;
        assert_eq!(texts(items), vec!["x"]);
    }

    #[tokio::test]
    async fn trailing_event_without_newline_is_decoded() {
        let items = decode(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"z\"}}]}"]).await;
        assert_eq!(texts(items), vec!["z"]);
    }

    #[tokio::test]
    async fn error_event_ends_stream() {
        let items = decode(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"overloaded\"}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ])
        .await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(PromptifyError::Stream(_))));
    }

    #[tokio::test]
    async fn malformed_payload_is_stream_error() {
        let items = decode(vec!["data: {not json\n\n"]).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(PromptifyError::Stream(_))));
    }

    #[test]
    fn request_body_flattens_options() {
        let options = GenerateOptions::new("llama-3-8b-chat@fireworks-ai").max_tokens(1000);
        let body = ChatRequest {
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            stream: true,
            options: &options,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "llama-3-8b-chat@fireworks-ai");
        assert_eq!(value["max_tokens"], 1000);
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn error_body_message_extraction() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail": "bad endpoint"}"#).unwrap();
        assert_eq!(body.message().as_deref(), Some("bad endpoint"));
        let body: ErrorBody =
            serde_json::from_str(r#"{"error": {"message": "quota"}}"#).unwrap();
        assert_eq!(body.message().as_deref(), Some("quota"));
    }
}

//! Proxies a single provider chat call to a remote agent-runtime server, over
//! plain HTTP, Server-Sent Events, or WebSocket. The multi-round loop and
//! tool dispatch stay local to the orchestrator — this back-end only ever
//! performs the one-call contract [`Executor::execute_chat`] asks for.

use crate::error::{AppError, Result};
use crate::executor::Executor;
use crate::llm::{ChatOptions, ChatResponse, FinishReason, StreamChunk};
use crate::retry::{retry_with_config, RetryConfig};
use crate::types::{ApiMessage, Message, ToolCall, ToolSchema};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
struct WireOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatWireRequest<'a> {
    messages: &'a [ApiMessage],
    provider: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<WireOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RemoteFinishReason {
    Stop,
    ToolCalls,
    Length,
}

impl From<RemoteFinishReason> for FinishReason {
    fn from(value: RemoteFinishReason) -> Self {
        match value {
            RemoteFinishReason::Stop => FinishReason::Stop,
            RemoteFinishReason::ToolCalls => FinishReason::ToolCalls,
            RemoteFinishReason::Length => FinishReason::Length,
        }
    }
}

/// A chunk of a server-sent event or WebSocket stream, before it has been
/// resolved to a [`StreamChunk`].
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireChunk {
    Delta { text: String },
    ToolCall { tool_call: ToolCall },
    Done { finish_reason: RemoteFinishReason },
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct NativeMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct NativeChoice {
    message: NativeMessage,
    #[serde(default)]
    finish_reason: Option<RemoteFinishReason>,
}

/// Provider-native `choices[0].message` shape (mirrors an OpenAI-style
/// completion response).
#[derive(Debug, Deserialize)]
struct NativeChatResponse {
    choices: Vec<NativeChoice>,
}

/// A server that has already normalized the provider's response to a flat
/// role/content/toolCalls record.
#[derive(Debug, Deserialize)]
struct NormalizedChatResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, rename = "toolCalls")]
    tool_calls: Vec<ToolCall>,
    #[serde(default)]
    finish_reason: Option<RemoteFinishReason>,
}

/// The response to `POST /api/v1/chat` is either a provider-native
/// completion shape or a pre-normalized one; a remote server is free to
/// return whichever it already has on hand.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Native(NativeChatResponse),
    Normalized(NormalizedChatResponse),
}

impl From<WireResponse> for ChatResponse {
    fn from(value: WireResponse) -> Self {
        match value {
            WireResponse::Native(native) => {
                let choice = native.choices.into_iter().next();
                let (content, tool_calls, finish_reason) = match choice {
                    Some(choice) => (
                        choice.message.content,
                        choice.message.tool_calls,
                        choice.finish_reason,
                    ),
                    None => (None, Vec::new(), None),
                };
                let finish_reason = finish_reason
                    .map(FinishReason::from)
                    .unwrap_or(if tool_calls.is_empty() { FinishReason::Stop } else { FinishReason::ToolCalls });
                ChatResponse {
                    content,
                    tool_calls,
                    finish_reason,
                }
            }
            WireResponse::Normalized(normalized) => {
                let finish_reason = normalized.finish_reason.map(FinishReason::from).unwrap_or(
                    if normalized.tool_calls.is_empty() {
                        FinishReason::Stop
                    } else {
                        FinishReason::ToolCalls
                    },
                );
                ChatResponse {
                    content: normalized.content,
                    tool_calls: normalized.tool_calls,
                    finish_reason,
                }
            }
        }
    }
}

/// Talks to a remote agent-runtime server over HTTP (`POST /api/v1/chat`),
/// SSE (same endpoint, `stream: true`), or WebSocket (`/ws/chat`).
pub struct RemoteExecutor {
    client: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl RemoteExecutor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            // Matches the spec's 30s per-attempt timeout / 3 retries /
            // exponential backoff starting at 1s for the remote executor's
            // HTTP transport.
            retry_config: RetryConfig {
                max_attempts: 4,
                initial_backoff: Duration::from_secs(1),
                backoff_multiplier: 2.0,
                max_backoff: Duration::from_secs(30),
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    /// Override the retry policy applied to transport errors on
    /// [`Executor::execute_chat`].
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn wire_options(options: &ChatOptions) -> Option<WireOptions> {
        if options.temperature.is_none() && options.max_tokens.is_none() {
            None
        } else {
            Some(WireOptions {
                temperature: options.temperature,
                max_tokens: options.max_tokens,
            })
        }
    }

    /// Stream a single round over Server-Sent Events.
    ///
    /// `text/event-stream` framing is `data: <json>\n\n` per event, ending
    /// with a literal `data: [DONE]` line. There is no ready-made SSE
    /// client here, so this buffers raw bytes from the response and splits
    /// on blank lines itself, the same incremental-buffer-then-split
    /// technique a line-oriented NDJSON reader uses.
    pub async fn stream_sse(
        &self,
        provider: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let api_messages: Vec<ApiMessage> = messages.iter().map(Message::to_api).collect();
        let tools = if options.tools.is_empty() { None } else { Some(options.tools.as_slice()) };
        let request = ChatWireRequest {
            messages: &api_messages,
            provider,
            model: &options.model,
            options: Self::wire_options(options),
            tools,
            stream: true,
        };

        let response = self
            .client
            .post(self.endpoint("/api/v1/chat"))
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "remote executor returned status {}",
                response.status()
            )));
        }

        let byte_stream = response.bytes_stream();
        let chunk_stream = async_stream::stream! {
            tokio::pin!(byte_stream);
            let mut buffer = String::new();

            while let Some(next) = byte_stream.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(AppError::Network(e.to_string()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(event_end) = buffer.find("\n\n") {
                    let event = buffer[..event_end].to_string();
                    buffer.drain(..event_end + 2);

                    for line in event.lines() {
                        let Some(data) = line.strip_prefix("data: ") else { continue };
                        if data == "[DONE]" {
                            return;
                        }
                        match serde_json::from_str::<WireChunk>(data) {
                            Ok(WireChunk::Delta { text }) => yield Ok(StreamChunk::TextDelta(text)),
                            Ok(WireChunk::ToolCall { tool_call }) => yield Ok(StreamChunk::ToolCall(tool_call)),
                            Ok(WireChunk::Done { finish_reason }) => {
                                yield Ok(StreamChunk::Done(finish_reason.into()));
                                return;
                            }
                            Ok(WireChunk::Error { message }) => {
                                yield Err(AppError::Network(message));
                                return;
                            }
                            Err(e) => {
                                warn!(error = %e, line = %data, "failed to parse SSE event");
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(chunk_stream))
    }

    /// Stream a single round over a WebSocket connection.
    ///
    /// The wire protocol is a short handshake (an `auth` frame, then a
    /// `chat_stream` frame describing the call) followed by a series of
    /// JSON frames mirroring [`WireChunk`].
    pub async fn stream_websocket(
        &self,
        provider: &str,
        messages: &[Message],
        options: &ChatOptions,
        auth_token: Option<&str>,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let ws_url = self
            .endpoint("/ws/chat")
            .replacen("http://", "ws://", 1)
            .replacen("https://", "wss://", 1);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|e| AppError::Network(format!("websocket connect failed: {e}")))?;

        let (mut write, mut read) = ws_stream.split();

        let auth_frame = serde_json::json!({
            "type": "auth",
            "token": auth_token,
        });
        write
            .send(WsMessage::Text(auth_frame.to_string()))
            .await
            .map_err(|e| AppError::Network(format!("failed to send auth frame: {e}")))?;

        let api_messages: Vec<ApiMessage> = messages.iter().map(Message::to_api).collect();
        let chat_frame = serde_json::json!({
            "type": "chat_stream",
            "provider": provider,
            "model": options.model,
            "messages": api_messages,
        });
        write
            .send(WsMessage::Text(chat_frame.to_string()))
            .await
            .map_err(|e| AppError::Network(format!("failed to send chat_stream frame: {e}")))?;

        let chunk_stream = async_stream::stream! {
            while let Some(next) = read.next().await {
                let msg = match next {
                    Ok(msg) => msg,
                    Err(e) => {
                        yield Err(AppError::Network(e.to_string()));
                        return;
                    }
                };

                let text = match msg {
                    WsMessage::Text(text) => text,
                    WsMessage::Close(_) => return,
                    _ => continue,
                };

                match serde_json::from_str::<WireChunk>(&text) {
                    Ok(WireChunk::Delta { text }) => yield Ok(StreamChunk::TextDelta(text)),
                    Ok(WireChunk::ToolCall { tool_call }) => yield Ok(StreamChunk::ToolCall(tool_call)),
                    Ok(WireChunk::Done { finish_reason }) => {
                        yield Ok(StreamChunk::Done(finish_reason.into()));
                        return;
                    }
                    Ok(WireChunk::Error { message }) => {
                        yield Err(AppError::Network(message));
                        return;
                    }
                    Err(e) => {
                        debug!(error = %e, frame = %text, "failed to parse websocket frame");
                    }
                }
            }
        };

        Ok(Box::pin(chunk_stream))
    }
}

#[async_trait]
impl Executor for RemoteExecutor {
    /// Posts a single round to `/api/v1/chat`, retrying transport-level
    /// failures (connection errors, non-2xx statuses) with exponential
    /// backoff per `retry_config`. A successfully decoded response is never
    /// retried even if the round itself reports a tool-calling finish.
    async fn execute_chat(&self, provider: &str, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        let api_messages: Vec<ApiMessage> = messages.iter().map(Message::to_api).collect();
        let tools = if options.tools.is_empty() { None } else { Some(options.tools.as_slice()) };
        let wire_options = Self::wire_options(options);

        retry_with_config(self.retry_config, || async {
            let request = ChatWireRequest {
                messages: &api_messages,
                provider,
                model: &options.model,
                options: wire_options.clone(),
                tools,
                stream: false,
            };

            let response = self
                .client
                .post(self.endpoint("/api/v1/chat"))
                .json(&request)
                .send()
                .await
                .map_err(|e| AppError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Network(format!(
                    "remote executor returned status {status}: {body}"
                )));
            }

            let parsed: WireResponse = response
                .json()
                .await
                .map_err(|e| AppError::Network(format!("failed to decode remote response: {e}")))?;

            Ok(parsed.into())
        })
        .await
    }
}

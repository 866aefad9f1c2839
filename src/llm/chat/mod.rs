pub mod gemini;

use async_trait::async_trait;
use futures::{ Future, Stream, StreamExt };
use log::debug;
use reqwest::Client as HttpClient;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use self::gemini::GeminiChatClient;
use super::{ LlmConfig, LlmError };
use crate::models::chat::{ ChatMessage, ImagePayload };

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Turns one line of a streamed body into a token. `None` skips the line,
/// `Some(Err(_))` ends the stream with that error.
pub type LineParser = fn(&str) -> Option<Result<String, LlmError>>;

/// Everything the model sees for one call: prior turns, the user's stored
/// images and the new prompt, in that order.
#[derive(Clone, Debug, Default)]
pub struct CompletionRequest {
    pub history: Vec<ChatMessage>,
    pub images: Vec<ImagePayload>,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    fn get_model(&self) -> String;
}

/// Drains a token stream into one string, failing on the first error.
pub async fn collect_stream(mut stream: TextStream) -> Result<String, LlmError> {
    let mut full = String::new();
    while let Some(chunk) = stream.next().await {
        full.push_str(&chunk?);
    }
    Ok(full)
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> Result<TextStream, LlmError>
    where
        F: FnOnce(mpsc::Sender<Result<String, LlmError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = Arc::new(GeminiChatClient::from_config(config)?);
    Ok(client)
}

/// Splits a byte stream into lines without losing text that straddles chunk
/// boundaries, handing each line to `parse`.
fn drain_lines(
    buf: &mut Vec<u8>,
    parse: LineParser,
    out: &mut Vec<Result<String, LlmError>>
) {
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line);
        if let Some(tok) = parse(text.trim_end_matches(['\r', '\n'])) {
            out.push(tok);
        }
    }
}

/// Forwards parsed items; returns false once the stream must stop.
async fn forward(
    tx: &mpsc::Sender<Result<String, LlmError>>,
    items: &mut Vec<Result<String, LlmError>>
) -> bool {
    for item in items.drain(..) {
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            return false;
        }
    }
    true
}

pub async fn http_stream_generate(
    http: &HttpClient,
    url: &str,
    payload: &(impl serde::Serialize + Sync),
    line_parser: LineParser,
    headers: Option<Vec<(String, String)>>
) -> Result<TextStream, LlmError> {
    let mut req = http.post(url).json(payload);

    if let Some(header_list) = headers {
        for (name, value) in header_list {
            req = req.header(name, value);
        }
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(LlmError::Status { status, body });
    }

    create_streaming_response(move |tx| async move {
        let mut bytes = resp.bytes_stream();
        let mut pending = Vec::new();
        let mut items = Vec::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    pending.extend_from_slice(&buf);
                    drain_lines(&mut pending, line_parser, &mut items);
                    if !forward(&tx, &mut items).await {
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(LlmError::Stream(e.to_string()))).await;
                    return;
                }
            }
        }

        if !pending.is_empty() {
            pending.push(b'\n');
            drain_lines(&mut pending, line_parser, &mut items);
            if !forward(&tx, &mut items).await {
                return;
            }
        }
        debug!("Chat stream finished");
    })
}

use async_trait::async_trait;
use base64::{ engine::general_purpose::STANDARD as BASE64, Engine as _ };
use log::info;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ collect_stream, http_stream_generate, ChatClient, CompletionRequest, CompletionResponse, TextStream };
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::Role;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize, Debug)]
struct GeminiStreamRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Debug)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        inline_data: GeminiBlob,
    },
}

#[derive(Serialize, Debug)]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleChunk {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    error: Option<GoogleError>,
    prompt_feedback: Option<GooglePromptFeedback>,
}

#[derive(Deserialize)]
struct GoogleError {
    code: Option<i64>,
    message: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn build_contents(request: &CompletionRequest) -> Vec<GeminiContent> {
    let mut contents: Vec<GeminiContent> = request.history
        .iter()
        .map(|msg| GeminiContent {
            role: wire_role(msg.role),
            parts: vec![GeminiPart::Text { text: msg.content.clone() }],
        })
        .collect();

    let mut parts: Vec<GeminiPart> = request.images
        .iter()
        .map(|img| GeminiPart::InlineData {
            inline_data: GeminiBlob {
                mime_type: img.mime_type.clone(),
                data: BASE64.encode(&img.data),
            },
        })
        .collect();
    parts.push(GeminiPart::Text { text: request.prompt.clone() });

    contents.push(GeminiContent { role: wire_role(Role::User), parts });
    contents
}

/// Parses one server-sent-events line of `streamGenerateContent?alt=sse`.
/// Error objects and blocked prompts arrive inside a 200 stream and end it.
fn parse_gemini_line(line: &str) -> Option<Result<String, LlmError>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    let chunk = serde_json::from_str::<GoogleChunk>(data).ok()?;
    if let Some(err) = chunk.error {
        return Some(
            Err(
                LlmError::Stream(
                    format!(
                        "{} ({}): {}",
                        err.status.as_deref().unwrap_or("ERROR"),
                        err.code.unwrap_or_default(),
                        err.message.as_deref().unwrap_or("no message")
                    )
                )
            )
        );
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Some(Err(LlmError::Stream(format!("prompt blocked: {}", reason))));
    }
    let text: String = chunk.candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if text.is_empty() { None } else { Some(Ok(text)) }
}

pub struct GeminiChatClient {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        http: HttpClient
    ) -> Self {
        Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), http))
    }

    pub async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        info!(
            "GeminiChatClient::complete_stream() → model={} turns={} images={}",
            self.model,
            request.history.len(),
            request.images.len()
        );

        let payload = GeminiStreamRequest {
            contents: build_contents(request),
        };

        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("x-goog-api-key".to_string(), self.api_key.clone())
        ];

        http_stream_generate(
            &self.http,
            &self.stream_url(),
            &payload,
            parse_gemini_line,
            Some(headers)
        ).await
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let stream = self.complete_stream(request).await?;
        let response = collect_stream(stream).await?;
        if response.is_empty() {
            return Err(LlmError::Stream("stream carried no candidate text".to_string()));
        }
        Ok(CompletionResponse { response })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ ChatMessage, ImagePayload };
    use serde_json::json;
    use wiremock::matchers::{ header, method, path, query_param };
    use wiremock::{ Mock, MockServer, ResponseTemplate };

    fn request() -> CompletionRequest {
        CompletionRequest {
            history: vec![
                ChatMessage { role: Role::User, content: "hello".into(), timestamp: 0 },
                ChatMessage { role: Role::Assistant, content: "hi there".into(), timestamp: 0 }
            ],
            images: vec![ImagePayload { mime_type: "image/png".into(), data: b"abc".to_vec() }],
            prompt: "describe".into(),
        }
    }

    fn client(base_url: String) -> GeminiChatClient {
        GeminiChatClient::new("test-key".into(), None, Some(base_url), HttpClient::new())
    }

    #[test]
    fn contents_carry_history_then_images_then_prompt() {
        let value = serde_json::to_value(GeminiStreamRequest { contents: build_contents(&request()) }).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "hello" }] },
                    { "role": "model", "parts": [{ "text": "hi there" }] },
                    { "role": "user", "parts": [
                        { "inline_data": { "mime_type": "image/png", "data": "YWJj" } },
                        { "text": "describe" }
                    ] }
                ]
            })
        );
    }

    #[test]
    fn sse_lines_yield_candidate_text() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}],"role":"model"}}]}"#;
        assert_eq!(parse_gemini_line(line).unwrap().unwrap(), "Hello");
        assert!(parse_gemini_line("").is_none());
        assert!(parse_gemini_line("data: {\"usageMetadata\":{}}").is_none());
        assert!(parse_gemini_line("event: ping").is_none());
    }

    #[test]
    fn sse_error_and_block_lines_are_failures() {
        let err = parse_gemini_line(
            r#"data: {"error":{"code":500,"message":"An internal error has occurred","status":"INTERNAL"}}"#
        ).unwrap().unwrap_err();
        assert!(matches!(err, LlmError::Stream(ref m) if m == "INTERNAL (500): An internal error has occurred"));

        let err = parse_gemini_line(r#"data: {"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap().unwrap_err();
        assert!(matches!(err, LlmError::Stream(ref m) if m == "prompt blocked: SAFETY"));
    }

    async fn complete_with_sse(body: &'static str) -> Result<CompletionResponse, LlmError> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server).await;
        client(server.uri()).complete(&request()).await
    }

    #[tokio::test]
    async fn stream_error_payload_is_a_failure() {
        let err = complete_with_sse(
            "data: {\"error\":{\"code\":500,\"message\":\"An internal error has occurred\",\"status\":\"INTERNAL\"}}\r\n\r\n"
        ).await.unwrap_err();
        assert!(err.to_string().contains("An internal error has occurred"));
    }

    #[tokio::test]
    async fn blocked_prompt_is_a_failure() {
        let err = complete_with_sse(
            "data: {\"promptFeedback\":{\"blockReason\":\"SAFETY\"}}\r\n\r\n"
        ).await.unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn error_after_partial_text_is_a_failure() {
        let err = complete_with_sse(
            concat!(
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Bon\"}]}}]}\r\n\r\n",
                "data: {\"error\":{\"code\":503,\"message\":\"overloaded\",\"status\":\"UNAVAILABLE\"}}\r\n\r\n"
            )
        ).await.unwrap_err();
        assert!(matches!(err, LlmError::Stream(ref m) if m.contains("overloaded")));
    }

    #[tokio::test]
    async fn stream_without_candidate_text_is_a_failure() {
        let err = complete_with_sse(
            "data: {\"candidates\":[{\"finishReason\":\"SAFETY\"}]}\r\n\r\n"
        ).await.unwrap_err();
        assert!(matches!(err, LlmError::Stream(ref m) if m == "stream carried no candidate text"));
    }

    #[tokio::test]
    async fn complete_concatenates_streamed_chunks() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Bon\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"jour\"}]}}]}\r\n\r\n"
        );
        Mock::given(method("POST"))
            .and(path(format!("/models/{}:streamGenerateContent", DEFAULT_MODEL)))
            .and(query_param("alt", "sse"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server).await;

        let resp = client(server.uri()).complete(&request()).await.unwrap();
        assert_eq!(resp.response, "Bonjour");
    }

    #[tokio::test]
    async fn api_errors_surface_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server).await;

        let err = client(server.uri()).complete(&request()).await.unwrap_err();
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("API key not valid"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = GeminiChatClient::from_config(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}

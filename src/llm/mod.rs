pub mod chat;

use std::time::Duration;
use thiserror::Error;

use crate::cli::Args;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key is required for the chat client")]
    MissingApiKey,
    #[error("chat request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("chat API answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("chat API stream ended with an error: {0}")]
    Stream(String),
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            completion_model: None,
            base_url: None,
            timeout: None,
        }
    }
}

impl LlmConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.trim().is_empty()),
            completion_model: Some(args.chat_model.clone()).filter(|m| !m.trim().is_empty()),
            base_url: Some(args.chat_base_url.clone()).filter(|u| !u.trim().is_empty()),
            timeout: Some(Duration::from_secs(args.chat_timeout_secs)).filter(|t| !t.is_zero()),
        }
    }
}

use crate::history::{ initialize_history_store, HistoryError, HistoryStore };
use crate::images::{ FetchError, HttpImageFetcher, ImageFetcher };
use crate::cli::Args;
use crate::llm::{ LlmConfig, LlmError };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient, CompletionRequest };
use crate::models::chat::{ MemoryStatus, Role };

use log::{ info, warn, error };
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result of one completion request, with counts taken after the exchange was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub images_count: usize,
    pub new_images_added: usize,
    pub conversation_length: usize,
    pub response: String,
}

#[derive(Clone)]
pub struct GeminiAgent {
    chat_client: Arc<dyn ChatClient>,
    image_fetcher: Arc<dyn ImageFetcher>,
    history_store: Arc<dyn HistoryStore>,
}

impl GeminiAgent {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        image_fetcher: Arc<dyn ImageFetcher>,
        history_store: Arc<dyn HistoryStore>
    ) -> Self {
        Self {
            chat_client,
            image_fetcher,
            history_store,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, AgentError> {
        let chat_config = LlmConfig::from_args(args);
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Model={}, BaseURL={:?}",
            chat_client.get_model(),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );

        let image_fetcher: Arc<dyn ImageFetcher> = Arc::new(HttpImageFetcher::from_args(args)?);
        let history_store = initialize_history_store(args)?;

        Ok(Self::new(chat_client, image_fetcher, history_store))
    }

    /// Downloads each URL in order and stores the ones that succeed. Returns how many were added.
    async fn collect_images(&self, request_id: &Uuid, user_id: &str, image_urls: &[String]) -> usize {
        let mut added = 0;
        for url in image_urls {
            match self.image_fetcher.fetch(url).await {
                Ok(image) => {
                    self.history_store.append_image(user_id, image).await;
                    added += 1;
                }
                Err(e) => {
                    warn!("[{}] Skipping image {}: {}", request_id, url, e);
                }
            }
        }
        added
    }

    pub async fn process_message(
        &self,
        user_id: &str,
        prompt: &str,
        image_urls: &[String]
    ) -> Result<CompletionOutcome, AgentError> {
        let request_id = Uuid::new_v4();
        info!(
            "[{}] Completion for user {} with {} image URL(s)",
            request_id,
            user_id,
            image_urls.len()
        );

        self.history_store.ensure(user_id).await;
        let new_images_added = self.collect_images(&request_id, user_id, image_urls).await;

        let memory = self.history_store.get_or_create(user_id).await;
        let images_count = memory.images.len();
        let request = CompletionRequest {
            history: memory.history,
            images: memory.images,
            prompt: prompt.to_string(),
        };

        let response = self.chat_client.complete(&request).await
            .map_err(|e| {
                error!("[{}] Completion call failed: {}", request_id, e);
                e
            })?
            .response;

        self.history_store.append_turn(user_id, Role::User, prompt).await;
        let conversation_length = self.history_store
            .append_turn(user_id, Role::Assistant, &response).await;

        info!(
            "[{}] Completed: {} new image(s), {} stored, {} turn(s)",
            request_id,
            new_images_added,
            images_count,
            conversation_length
        );

        Ok(CompletionOutcome {
            images_count,
            new_images_added,
            conversation_length,
            response,
        })
    }

    pub async fn reset(&self, user_id: &str) -> bool {
        let existed = self.history_store.reset(user_id).await;
        info!("Memory reset for user {} (existed: {})", user_id, existed);
        existed
    }

    pub async fn status(&self, user_id: &str) -> MemoryStatus {
        self.history_store.describe(user_id).await
    }
}

mod memory;

pub use memory::InMemoryHistoryStore;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::{ ImagePayload, MemoryStatus, Role, UserMemory };

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Unsupported history store type: {0}")]
    UnsupportedType(String),
    #[error("History limit must be at least 2, got {0}")]
    InvalidLimit(usize),
}

/// Keyed per-user memory. Every call is atomic on its own; callers that chain
/// several calls for one user get no isolation from concurrent requests.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Creates an empty record if none exists. Returns true when one was created.
    async fn ensure(&self, user_id: &str) -> bool;

    /// Returns a snapshot of the user's memory, creating an empty record first if needed.
    async fn get_or_create(&self, user_id: &str) -> UserMemory;

    /// Appends a turn and trims the history to the store's limit. Returns the new length.
    async fn append_turn(&self, user_id: &str, role: Role, content: &str) -> usize;

    /// Returns the number of images stored after the append.
    async fn append_image(&self, user_id: &str, image: ImagePayload) -> usize;

    /// Returns true when a record existed.
    async fn reset(&self, user_id: &str) -> bool;

    async fn describe(&self, user_id: &str) -> MemoryStatus;
}

pub fn create_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    if args.history_limit < 2 {
        return Err(HistoryError::InvalidLimit(args.history_limit));
    }
    match args.history_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryHistoryStore::new(args.history_limit))),
        _ => Err(HistoryError::UnsupportedType(args.history_type.clone())),
    }
}

pub fn initialize_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    info!(
        "Chat history will be stored in: {} (last {} turns per user)",
        args.history_type,
        args.history_limit
    );
    create_history_store(args)
}

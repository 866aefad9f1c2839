use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::history::{ HistoryStore, DEFAULT_HISTORY_LIMIT };
use crate::models::chat::{ ChatMessage, ImagePayload, MemoryStatus, Role, UserMemory };

pub struct InMemoryHistoryStore {
    users: RwLock<HashMap<String, UserMemory>>,
    limit: usize,
}

impl InMemoryHistoryStore {
    pub fn new(limit: usize) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            limit,
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

fn trim_to_last(history: &mut Vec<ChatMessage>, limit: usize) {
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn ensure(&self, user_id: &str) -> bool {
        if self.users.read().await.contains_key(user_id) {
            return false;
        }
        let mut users = self.users.write().await;
        if users.contains_key(user_id) {
            return false;
        }
        debug!("Creating memory for user {}", user_id);
        users.insert(user_id.to_string(), UserMemory::default());
        true
    }

    async fn get_or_create(&self, user_id: &str) -> UserMemory {
        if let Some(memory) = self.users.read().await.get(user_id) {
            return memory.clone();
        }
        let mut users = self.users.write().await;
        users
            .entry(user_id.to_string())
            .or_insert_with(|| {
                debug!("Creating memory for user {}", user_id);
                UserMemory::default()
            })
            .clone()
    }

    async fn append_turn(&self, user_id: &str, role: Role, content: &str) -> usize {
        let mut users = self.users.write().await;
        let memory = users.entry(user_id.to_string()).or_default();
        memory.history.push(ChatMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now().timestamp(),
        });
        trim_to_last(&mut memory.history, self.limit);
        memory.history.len()
    }

    async fn append_image(&self, user_id: &str, image: ImagePayload) -> usize {
        let mut users = self.users.write().await;
        let memory = users.entry(user_id.to_string()).or_default();
        memory.images.push(image);
        memory.images.len()
    }

    async fn reset(&self, user_id: &str) -> bool {
        self.users.write().await.remove(user_id).is_some()
    }

    async fn describe(&self, user_id: &str) -> MemoryStatus {
        match self.users.read().await.get(user_id) {
            Some(memory) => MemoryStatus {
                exists: true,
                images_stored: memory.images.len(),
                conversation_length: memory.history.len(),
            },
            None => MemoryStatus::absent(),
        }
    }
}

use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

/// Raw image bytes as downloaded, tagged with the MIME type reported by the origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Everything remembered for one user id.
#[derive(Clone, Debug, Default)]
pub struct UserMemory {
    pub images: Vec<ImagePayload>,
    pub history: Vec<ChatMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStatus {
    pub exists: bool,
    pub images_stored: usize,
    pub conversation_length: usize,
}

impl MemoryStatus {
    pub fn absent() -> Self {
        Self {
            exists: false,
            images_stored: 0,
            conversation_length: 0,
        }
    }
}

use serde::{ Serialize, Deserialize };

#[derive(Deserialize, Debug, Default)]
pub struct UidQuery {
    pub uid: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReply {
    pub success: bool,
    pub uid: String,
    pub prompt: String,
    pub images_count: usize,
    pub new_images_added: usize,
    pub conversation_length: usize,
    pub response: String,
}

#[derive(Serialize, Debug)]
pub struct ResetReply {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
    pub uid: String,
    pub exists: bool,
    pub images_stored: usize,
    pub conversation_length: usize,
}

#[derive(Serialize, Debug)]
pub struct ErrorReply {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct HealthReply {
    pub status: &'static str,
}

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// History store type (memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    /// Number of most recent turns kept per user. Older turns are dropped.
    #[arg(long, env = "HISTORY_LIMIT", default_value = "20")]
    pub history_limit: usize,

    // --- Chat LLM Provider Args ---
    /// API Key for the Gemini API
    #[arg(long, env = "GEMINI_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.0-flash-exp, gemini-1.5-pro)
    #[arg(long, env = "CHAT_MODEL", default_value = "gemini-2.0-flash-exp")]
    pub chat_model: String,

    /// Base URL for the Gemini API, without the model path
    #[arg(long, env = "CHAT_BASE_URL", default_value = "https://generativelanguage.googleapis.com/v1beta")]
    pub chat_base_url: String,

    /// Timeout in seconds for a single completion call.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "120")]
    pub chat_timeout_secs: u64,

    // --- Image Download Args ---
    /// Timeout in seconds for downloading one image.
    #[arg(long, env = "IMAGE_TIMEOUT_SECS", default_value = "30")]
    pub image_timeout_secs: u64,

    /// Largest image body accepted, in bytes.
    #[arg(long, env = "MAX_IMAGE_BYTES", default_value = "20971520")]
    pub max_image_bytes: usize,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the server to listen on. Takes precedence over --port.
    #[arg(long, env = "SERVER_ADDR")]
    pub server_addr: Option<String>,

    /// Port to listen on all interfaces when no server address is given.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

pub const DEFAULT_PORT: u16 = 5000;

impl Args {
    /// Address the server binds to: SERVER_ADDR, else 0.0.0.0 on PORT, else port 5000.
    pub fn bind_addr(&self) -> String {
        match &self.server_addr {
            Some(addr) if !addr.trim().is_empty() => addr.clone(),
            _ => format!("0.0.0.0:{}", self.port.unwrap_or(DEFAULT_PORT)),
        }
    }
}

pub mod agent;
pub mod cli;
pub mod history;
pub mod images;
pub mod llm;
pub mod models;
pub mod server;

use agent::GeminiAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub fn log_configuration(args: &Args) {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.bind_addr());
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Chat API Key: {}", if args.chat_api_key.is_empty() { "missing" } else { "set" });
    info!("Chat Timeout: {}s", args.chat_timeout_secs);
    info!("History Store Type: {}", args.history_type);
    info!("History Limit: {}", args.history_limit);
    info!("Image Timeout: {}s", args.image_timeout_secs);
    info!("Max Image Bytes: {}", args.max_image_bytes);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");
}

fn log_usage(addr: &str) {
    let base = match addr.strip_prefix("0.0.0.0:") {
        Some(port) => format!("http://localhost:{}", port),
        None => format!("http://{}", addr),
    };
    info!("Usage:");
    info!("  {}/gemini?pro=Describe%20this&image1=https://example.com/cat.jpg&uid=123", base);
    info!("  {}/gemini?pro=Hello&uid=123", base);
    info!("  {}/reset?uid=123", base);
    info!("  {}/status?uid=123", base);
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    log_configuration(&args);

    let agent = Arc::new(GeminiAgent::from_args(&args)?);
    let addr = args.bind_addr();
    info!("Starting server on: {}", addr);
    log_usage(&addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}

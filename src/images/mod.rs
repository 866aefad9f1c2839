use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use reqwest::{ header::CONTENT_TYPE, Client as HttpClient };
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cli::Args;
use crate::models::chat::ImagePayload;

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid image URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("image request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("image server answered {status}")]
    Status { status: reqwest::StatusCode },
    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ImagePayload, FetchError>;
}

pub struct HttpImageFetcher {
    http: HttpClient,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http, max_bytes })
    }

    pub fn from_args(args: &Args) -> Result<Self, FetchError> {
        Self::new(Duration::from_secs(args.image_timeout_secs), args.max_image_bytes)
    }
}

fn parse_image_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other =>
            Err(FetchError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
    }
}

/// Strips parameters such as `; charset=binary`, falling back to JPEG.
pub fn normalize_mime_type(header: Option<&str>) -> String {
    header
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string()
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImagePayload, FetchError> {
        let url = parse_image_url(url)?;
        let resp = self.http.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status { status: resp.status() });
        }
        if let Some(len) = resp.content_length() {
            if len as usize > self.max_bytes {
                return Err(FetchError::TooLarge { limit: self.max_bytes });
            }
        }

        let mime_type = normalize_mime_type(
            resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
        );

        let mut data = Vec::new();
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge { limit: self.max_bytes });
            }
            data.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes ({}) from {}", data.len(), mime_type, url);
        Ok(ImagePayload { mime_type, data })
    }
}

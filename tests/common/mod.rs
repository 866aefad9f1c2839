use gemini_gateway::agent::GeminiAgent;
use gemini_gateway::history::InMemoryHistoryStore;
use gemini_gateway::images::HttpImageFetcher;
use gemini_gateway::llm::chat::gemini::GeminiChatClient;
use gemini_gateway::server::api::router;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{ method, path, path_regex };
use wiremock::{ Mock, MockServer, ResponseTemplate };

pub const MODEL: &str = "gemini-test";

pub struct TestApp {
    pub address: String,
    pub upstream: MockServer,
    pub http: reqwest::Client,
}

impl TestApp {
    pub async fn get(&self, path_and_query: &str) -> (u16, serde_json::Value) {
        let resp = self.http
            .get(format!("{}{}", self.address, path_and_query))
            .send().await
            .expect("Failed to reach gateway");
        let status = resp.status().as_u16();
        (status, resp.json().await.expect("Gateway did not answer JSON"))
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/img/{}", self.upstream.uri(), name)
    }
}

/// Mounts an upstream that serves `/img/ok*.png` and answers every
/// completion with two SSE chunks.
pub async fn spawn_app() -> TestApp {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/img/ok.*\.png$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "image/png"))
        .mount(&upstream).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/broken.*$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream).await;

    let sse = concat!(
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Salut\"}]}}]}\r\n\r\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" !\"}]}}]}\r\n\r\n"
    );
    Mock::given(method("POST"))
        .and(path(format!("/models/{}:streamGenerateContent", MODEL)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&upstream).await;

    let chat = GeminiChatClient::new(
        "test-key".into(),
        Some(MODEL.into()),
        Some(upstream.uri()),
        reqwest::Client::new()
    );
    let fetcher = HttpImageFetcher::new(Duration::from_secs(5), 1024 * 1024).expect("fetcher");
    let agent = GeminiAgent::new(
        Arc::new(chat),
        Arc::new(fetcher),
        Arc::new(InMemoryHistoryStore::default())
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let app = router(Arc::new(agent));
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.expect("Gateway crashed");
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        upstream,
        http: reqwest::Client::new(),
    }
}

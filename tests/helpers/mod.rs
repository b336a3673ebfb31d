//! Test helper utilities for API testing

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use photo_strip_gen::app_state::AppState;
use photo_strip_gen::config::AppConfig;
use photo_strip_gen::routes;
use reqwest::multipart;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::sleep;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const FAL_MODEL_PATH: &str = "/fal-ai/nano-banana-pro/edit";
pub const FAL_STATUS_PATH: &str = "/fal-ai/nano-banana-pro/requests/req-1/status";
pub const FAL_RESPONSE_PATH: &str = "/fal-ai/nano-banana-pro/requests/req-1";
pub const CDN_IMAGE_PATH: &str = "/cdn/strip.png";

/// Minimal bytes that sniff as PNG.
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    bytes.resize(len.max(bytes.len()), 0);
    bytes
}

/// Minimal bytes that sniff as JPEG.
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(len.max(bytes.len()), 0);
    bytes
}

/// A running server plus the fake FAL queue it talks to.
pub struct TestApp {
    pub base_url: String,
    pub fal: MockServer,
    pub client: reqwest::Client,
    _assets: TempDir,
}

impl TestApp {
    /// Start the service with brand assets in a temp dir and FAL pointed at a mock server.
    pub async fn spawn() -> Self {
        let fal = MockServer::start().await;

        let assets = TempDir::new().expect("Failed to create asset dir");
        std::fs::write(assets.path().join("logo.png"), png_bytes(256)).unwrap();
        std::fs::write(assets.path().join("QR.png"), png_bytes(256)).unwrap();

        let mut config = AppConfig::with_fal_key("test-key");
        config.fal_queue_base = fal.uri();
        config.asset_dir = assets.path().to_path_buf();
        config.poll_interval_ms = 10;
        config.provider_timeout_secs = 10;

        let state = AppState::from_config(&config, None).expect("Failed to build state");
        let app = routes::router(state, None, config.max_upload_bytes);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            fal,
            client: reqwest::Client::new(),
            _assets: assets,
        }
    }

    /// Mount a FAL queue that completes immediately with the given result payload.
    pub async fn mount_fal_result(&self, result: Value) {
        Mock::given(method("POST"))
            .and(path(FAL_MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "req-1",
                "status_url": format!("{}{}", self.fal.uri(), FAL_STATUS_PATH),
                "response_url": format!("{}{}", self.fal.uri(), FAL_RESPONSE_PATH),
            })))
            .mount(&self.fal)
            .await;
        Mock::given(method("GET"))
            .and(path(FAL_STATUS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "COMPLETED"})))
            .mount(&self.fal)
            .await;
        Mock::given(method("GET"))
            .and(path(FAL_RESPONSE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(result))
            .mount(&self.fal)
            .await;
    }

    /// Mount a FAL queue whose single result is a PNG served by the same mock server.
    pub async fn mount_fal_png(&self) {
        Mock::given(method("GET"))
            .and(path(CDN_IMAGE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(png_bytes(512)),
            )
            .mount(&self.fal)
            .await;
        let url = format!("{}{}", self.fal.uri(), CDN_IMAGE_PATH);
        self.mount_fal_result(json!({"images": [{"url": url}]})).await;
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// POST /generate with the given photo and text fields.
    pub async fn upload(
        &self,
        image: Option<Vec<u8>>,
        image2: Option<Vec<u8>>,
        fields: &[(&str, &str)],
    ) -> reqwest::Response {
        let mut form = multipart::Form::new();
        if let Some(bytes) = image {
            form = form.part(
                "image",
                multipart::Part::bytes(bytes)
                    .file_name("photo.jpg")
                    .mime_str("image/jpeg")
                    .unwrap(),
            );
        }
        if let Some(bytes) = image2 {
            form = form.part(
                "image2",
                multipart::Part::bytes(bytes)
                    .file_name("friend.jpg")
                    .mime_str("image/jpeg")
                    .unwrap(),
            );
        }
        for (name, value) in fields {
            form = form.text(name.to_string(), value.to_string());
        }

        self.client
            .post(self.url("/generate"))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// Upload and return the accepted job id.
    pub async fn submit(&self, image2: Option<Vec<u8>>, fields: &[(&str, &str)]) -> String {
        let response = self.upload(Some(jpeg_bytes(500)), image2, fields).await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        body["job_id"].as_str().unwrap().to_string()
    }

    pub async fn progress(&self, job_id: &str) -> (u16, Value) {
        let response = self
            .client
            .get(self.url("/check_progress"))
            .query(&[("id", job_id)])
            .send()
            .await
            .expect("Progress request failed");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// Poll until the job reaches a terminal status.
    pub async fn wait_for_terminal(&self, job_id: &str, timeout: Duration) -> Value {
        let start = std::time::Instant::now();
        loop {
            let (status, body) = self.progress(job_id).await;
            assert_eq!(status, 200, "unexpected progress response: {body}");
            match body["status"].as_str() {
                Some("succeeded") | Some("failed") => return body,
                _ => {}
            }
            if start.elapsed() > timeout {
                panic!("Job {job_id} did not finish within {timeout:?}: {body}");
            }
            sleep(Duration::from_millis(25)).await;
        }
    }

    /// The prompt FAL received in its first submission.
    pub async fn submitted_prompt(&self) -> String {
        let requests = self.fal.received_requests().await.unwrap();
        let submission = requests
            .iter()
            .find(|request| request.url.path() == FAL_MODEL_PATH)
            .expect("No FAL submission recorded");
        let body: Value = serde_json::from_slice(&submission.body).unwrap();
        body["prompt"].as_str().unwrap().to_string()
    }
}

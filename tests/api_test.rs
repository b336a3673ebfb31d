//! End-to-end API tests against a real listener and a mocked FAL queue.
//!
//! Run with: cargo test --test api_test

mod helpers;

use std::time::Duration;

use helpers::{jpeg_bytes, TestApp};
use photo_strip_gen::models::options::Layout;
use photo_strip_gen::services::prompt::{duo_clause, layout_marker};
use serde_json::{json, Value};

const JOB_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_generate_and_poll_to_success() {
    let app = TestApp::spawn().await;
    app.mount_fal_png().await;

    let job_id = app
        .submit(
            None,
            &[("layout", "1x4"), ("color_mode", "bw"), ("style", "default")],
        )
        .await;

    let body = app.wait_for_terminal(&job_id, JOB_TIMEOUT).await;
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["result_ready"], true);
    assert_eq!(body["success"], true);

    let urls = body["result_urls"].as_array().unwrap();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(body["result_url"], urls[0]);
    assert!(body["result_filename"]
        .as_str()
        .unwrap()
        .starts_with("photo_strip_"));

    let prompt = app.submitted_prompt().await;
    assert!(prompt.contains(&layout_marker(Layout::OneByFour)));
    assert!(prompt.contains("black and white"));
}

#[tokio::test]
async fn test_single_photo_prompt_has_no_duo_clause() {
    let app = TestApp::spawn().await;
    app.mount_fal_png().await;

    let job_id = app.submit(None, &[]).await;
    app.wait_for_terminal(&job_id, JOB_TIMEOUT).await;

    let prompt = app.submitted_prompt().await;
    assert!(!prompt.contains(duo_clause()));
}

#[tokio::test]
async fn test_second_photo_adds_duo_clause_and_reference_image() {
    let app = TestApp::spawn().await;
    app.mount_fal_png().await;

    let job_id = app
        .submit(Some(jpeg_bytes(600)), &[("layout", "2x2")])
        .await;
    app.wait_for_terminal(&job_id, JOB_TIMEOUT).await;

    let prompt = app.submitted_prompt().await;
    assert!(prompt.contains(duo_clause()));
    assert!(prompt.contains(&layout_marker(Layout::TwoByTwo)));
    assert!(prompt.contains("logo from the third reference image"));

    // user, second user, logo, QR
    let requests = app.fal.received_requests().await.unwrap();
    let submission: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(submission["image_urls"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_empty_provider_result_fails_job() {
    let app = TestApp::spawn().await;
    app.mount_fal_result(json!({"images": []})).await;

    let job_id = app.submit(None, &[]).await;
    let body = app.wait_for_terminal(&job_id, JOB_TIMEOUT).await;

    assert_eq!(body["status"], "failed");
    assert_eq!(body["success"], false);
    assert_eq!(body["result_ready"], false);
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert!(body["result_urls"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_is_stable_once_finished() {
    let app = TestApp::spawn().await;
    app.mount_fal_png().await;

    let job_id = app.submit(None, &[]).await;
    let first = app.wait_for_terminal(&job_id, JOB_TIMEOUT).await;

    let (status, second) = app.progress(&job_id).await;
    assert_eq!(status, 200);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = TestApp::spawn().await;

    let (status, body) = app.progress("does-not-exist").await;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_progress_without_id_is_bad_request() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/api/check_progress"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_missing_image_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.upload(None, None, &[("layout", "1x4")]).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    // Nothing reached the provider
    assert!(app.fal.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tiny_image_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.upload(Some(jpeg_bytes(40)), None, &[]).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_unknown_image_format_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.upload(Some(vec![b'z'; 500]), None, &[]).await;
    assert_eq!(response.status(), 415);
}

#[tokio::test]
async fn test_out_of_range_image_count_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .upload(Some(jpeg_bytes(500)), None, &[("num_images", "9")])
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_unknown_options_fall_back_to_defaults() {
    let app = TestApp::spawn().await;
    app.mount_fal_png().await;

    let job_id = app
        .submit(None, &[("layout", "9x9"), ("style", "baroque")])
        .await;
    app.wait_for_terminal(&job_id, JOB_TIMEOUT).await;

    let prompt = app.submitted_prompt().await;
    assert!(prompt.contains(&layout_marker(Layout::OneByFour)));
}

#[tokio::test]
async fn test_reset_on_upload_removes_job() {
    let app = TestApp::spawn().await;
    app.mount_fal_png().await;

    let job_id = app.submit(None, &[]).await;
    app.wait_for_terminal(&job_id, JOB_TIMEOUT).await;

    let response = app
        .client
        .post(app.url("/reset_on_upload"))
        .query(&[("id", job_id.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    let (status, _) = app.progress(&job_id).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_gallery_without_database_is_unavailable() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/gallery"))
        .json(&json!({"job_id": "anything"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn test_health_and_index() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"], json!(["fal"]));
    assert_eq!(body["checks"]["assets"]["status"], "ok");

    let page = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(page.status(), 200);
    let html = page.text().await.unwrap();
    assert!(html.contains("<form"));
    assert!(html.contains("/api/gallery"));
}

/// Gallery round trip against a real Postgres.
///
/// Note: requires DATABASE_URL pointing at a disposable database.
#[tokio::test]
#[ignore] // Run with: cargo test --test api_test -- --ignored
async fn test_gallery_round_trip() {
    use photo_strip_gen::db;
    use photo_strip_gen::models::job::{Job, JobId, JobInputs, JobUpdate, ProviderReport, ResultImage};
    use photo_strip_gen::models::options::PromptOptions;
    use photo_strip_gen::services::gallery::GalleryStore;
    use photo_strip_gen::services::job_store::JobStore;

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::init_pool(&database_url).await.expect("Failed to connect");
    db::run_migrations(&pool).await.expect("Failed to migrate");
    let gallery = GalleryStore::new(pool, 1, None);

    let store = JobStore::new(Duration::from_secs(60));
    let id = JobId::generate(&jpeg_bytes(500));
    let inputs = JobInputs {
        image_size: 500,
        image_mime: "image/jpeg".to_string(),
        has_secondary: false,
        options: PromptOptions::default(),
        num_images: 1,
        prompt: "prompt".to_string(),
    };
    store.create(Job::new(id.clone(), inputs, ["fal"])).await.unwrap();
    store.update(&id, JobUpdate::Started).await.unwrap();
    store
        .update(
            &id,
            JobUpdate::ProviderFinished {
                provider: "fal".to_string(),
                report: ProviderReport::Done {
                    images: vec![ResultImage {
                        provider: "fal".to_string(),
                        mime_type: "image/png".to_string(),
                        bytes: helpers::png_bytes(64),
                        source: "https://cdn.example/strip.png".to_string(),
                    }],
                    warnings: Vec::new(),
                },
            },
        )
        .await
        .unwrap();
    let job = store.update(&id, JobUpdate::Finalize).await.unwrap();

    let saved = gallery.save(&job).await.expect("Save failed");
    assert_eq!(saved.image_urls, vec!["https://cdn.example/strip.png".to_string()]);

    let fetched = gallery.get(&saved.public_id).await.expect("Fetch failed");
    assert_eq!(fetched.public_id, saved.public_id);
}

//! End-to-end tests for webtools-convert.
//!
//! Library-level tests drive `TaskTracker` and `ImageProcessor` against a
//! scratch directory; HTTP tests push hand-built multipart requests through
//! the router with `tower::ServiceExt::oneshot`, no socket involved.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tower::ServiceExt;
use webtools_convert::{
    http, AppState, CompressOptions, ImageProcessor, ServiceConfig, ServiceError, StorageLocation,
    TaskTracker,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOUNDARY: &str = "webtools-test-boundary";

fn config(dir: &Path) -> ServiceConfig {
    ServiceConfig::builder()
        .storage_dir(dir)
        .build()
        .unwrap()
}

fn write(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(w, h, |x, y| image::Rgb([x as u8, y as u8, 200]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart(parts)))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

fn json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        panic!("not JSON ({e}): {}", String::from_utf8_lossy(bytes))
    })
}

fn app(dir: &Path) -> Router {
    http::build(Arc::new(AppState::new(config(dir))))
}

// ── Tracker lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn text_file_converts_to_pdf() {
    let tmp = TempDir::new().unwrap();
    let tracker = TaskTracker::from_config(&config(tmp.path()));
    let src = write(tmp.path(), "upload.txt", b"ten bytes!");

    let task = tracker.submit(&src, "pdf", "ten.txt").await.unwrap();
    assert!(!task.passthrough);

    let artifact = tracker.resolve(&task.task_id).await.unwrap();
    assert_eq!(artifact.mime_type, "application/pdf");
    assert_eq!(artifact.file_name, "ten.pdf");
    let pdf = std::fs::read(&artifact.path).unwrap();
    assert!(!pdf.is_empty());
    assert!(pdf.starts_with(b"%PDF"));
}

#[tokio::test]
async fn docx_to_txt_is_byte_identical_passthrough() {
    let tmp = TempDir::new().unwrap();
    let tracker = TaskTracker::from_config(&config(tmp.path()));
    let payload: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
    let src = write(tmp.path(), "upload.docx", &payload);

    let task = tracker.submit(&src, "txt", "Report.docx").await.unwrap();
    assert!(task.passthrough);

    let artifact = tracker.resolve(&task.task_id).await.unwrap();
    assert_eq!(artifact.mime_type, "text/plain");
    assert_eq!(std::fs::read(&artifact.path).unwrap(), payload);
}

#[tokio::test]
async fn cancel_succeeds_once() {
    let tmp = TempDir::new().unwrap();
    let tracker = TaskTracker::from_config(&config(tmp.path()));
    let src = write(tmp.path(), "a.txt", b"cancel me");
    let task = tracker.submit(&src, "pdf", "a.txt").await.unwrap();

    assert!(tracker.cancel(&task.task_id).await);
    assert!(!tracker.cancel(&task.task_id).await);
    assert!(matches!(
        tracker.resolve(&task.task_id).await,
        Err(ServiceError::TaskNotFound { .. })
    ));
    assert!(!src.exists());
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let tracker = TaskTracker::from_config(&config(tmp.path()));
    let err = tracker.resolve("does-not-exist").await.unwrap_err();
    assert!(matches!(err, ServiceError::TaskNotFound { .. }));
    assert_eq!(err.kind(), webtools_convert::ErrorKind::NotFound);
}

#[tokio::test]
async fn sweep_spares_fresh_files_and_reports_stale_artifacts_missing() {
    let tmp = TempDir::new().unwrap();
    let tracker = TaskTracker::from_config(&config(tmp.path()));
    let src = write(tmp.path(), "a.txt", b"hello");
    let task = tracker.submit(&src, "pdf", "a.txt").await.unwrap();

    // Nothing is older than a day yet.
    assert_eq!(tracker.reclaim_expired(Duration::from_secs(86_400)).await, 0);
    assert!(tracker.resolve(&task.task_id).await.is_ok());

    // Age every stored file by two days, tracked or not.
    let stray = write(tmp.path(), "stray.bin", b"untracked");
    for entry in std::fs::read_dir(tmp.path()).unwrap() {
        let path = entry.unwrap().path();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(2 * 86_400))
            .unwrap();
    }
    assert_eq!(tracker.reclaim_expired(Duration::from_secs(86_400)).await, 3);
    assert!(!stray.exists());

    // The record survives the sweep but its artifact is gone.
    assert!(matches!(
        tracker.resolve(&task.task_id).await,
        Err(ServiceError::MissingArtifact { .. })
    ));
}

// ── Images ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn compression_at_full_quality_may_grow() {
    let tmp = TempDir::new().unwrap();
    let images = ImageProcessor::new(StorageLocation::new(tmp.path()));
    // A tiny PNG of flat colour re-encoded as max-quality JPEG usually grows.
    let src = write(tmp.path(), "tiny.png", &png_bytes(2, 2));

    let report = images
        .compress(&src, CompressOptions::new(100, 100).unwrap())
        .await
        .unwrap();
    assert!(report.compressed_size > 0);
    assert_eq!(
        report.compression_ratio,
        webtools_convert::imaging::compression_ratio(report.original_size, report.compressed_size)
    );
}

#[tokio::test]
async fn unknown_image_target_is_rejected_before_io() {
    let tmp = TempDir::new().unwrap();
    let images = ImageProcessor::new(StorageLocation::new(tmp.path()));
    // The source does not even exist: the target check must come first.
    let err = images
        .convert_format(&tmp.path().join("missing.png"), "foo")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnsupportedImageFormat { .. }));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn http_index_health_and_formats() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());

    let (status, _, body) = send(&app, Request::get("/api").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["endpoints"]["files"], "/api/file");

    let (status, _, body) =
        send(&app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "ok");

    let (status, _, body) =
        send(&app, Request::get("/api/file/formats").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let formats = json(&body);
    let txt = formats["formats"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["extension"] == "txt")
        .unwrap();
    assert_eq!(txt["targetFormats"][0]["extension"], "pdf");
}

#[tokio::test]
async fn http_convert_download_cancel_round_trip() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());

    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/file/convert",
            &[
                Part::File("file", "meeting notes.txt", b"agenda\n- item"),
                Part::Text("targetFormat", "pdf"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let resp = json(&body);
    assert_eq!(resp["originalName"], "meeting notes");
    assert_eq!(resp["extension"], "pdf");
    assert_eq!(resp["passthrough"], false);
    let file_id = resp["fileId"].as_str().unwrap().to_string();

    let (status, headers, body) = send(
        &app,
        Request::get(format!("/api/file/download/{file_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"meeting notes.pdf\""
    );
    assert!(body.starts_with(b"%PDF"));

    let cancel = || {
        Request::post(format!("/api/file/cancel/{file_id}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _, _) = send(&app, cancel()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, body) = send(&app, cancel()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["message"].is_string());

    let (status, _, _) = send(
        &app,
        Request::get(format!("/api/file/download/{file_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_convert_rejects_bad_requests() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());

    // No file part.
    let (status, _, body) = send(
        &app,
        post_multipart("/api/file/convert", &[Part::Text("targetFormat", "pdf")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["message"].is_string());

    // No target format: the upload must not linger.
    let (status, _, _) = send(
        &app,
        post_multipart("/api/file/convert", &[Part::File("file", "a.txt", b"x")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Filtered extension.
    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/file/convert",
            &[
                Part::File("file", "tool.exe", b"MZ"),
                Part::Text("targetFormat", "pdf"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["message"].as_str().unwrap().contains(".exe"));

    // Invalid target token.
    let (status, _, _) = send(
        &app,
        post_multipart(
            "/api/file/convert",
            &[
                Part::File("file", "a.txt", b"x"),
                Part::Text("targetFormat", "../pdf"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn http_upload_over_limit_is_400() {
    let tmp = TempDir::new().unwrap();
    let config = ServiceConfig::builder()
        .storage_dir(tmp.path())
        .max_upload_bytes(1024)
        .build()
        .unwrap();
    let app = http::build(Arc::new(AppState::new(config)));

    let big = vec![b'a'; 4096];
    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/file/convert",
            &[Part::Text("targetFormat", "pdf"), Part::File("file", "big.txt", &big)],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["message"].as_str().unwrap().contains("1MB"));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn http_image_compress_and_download() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());
    let png = png_bytes(64, 32);

    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/image/compress",
            &[
                Part::File("image", "photo.png", &png),
                Part::Text("quality", "50"),
                Part::Text("scale", "50"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let resp = json(&body);
    assert_eq!(resp["success"], true);
    assert!(resp["compressionRatio"].is_i64());
    let url = resp["imageUrl"].as_str().unwrap().to_string();
    assert!(url.starts_with("/api/image/download/") && url.ends_with(".jpg"));

    let (status, headers, body) =
        send(&app, Request::get(url.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    let decoded = image::load_from_memory(&body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 16));
}

#[tokio::test]
async fn http_image_format_convert() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());
    let png = png_bytes(8, 8);

    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/image/format-convert",
            &[
                Part::File("image", "icon.png", &png),
                Part::Text("targetFormat", "webp"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let resp = json(&body);
    assert_eq!(resp["originalFormat"], "png");
    assert_eq!(resp["convertedFormat"], "webp");

    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/image/format-convert",
            &[
                Part::File("image", "icon.png", &png),
                Part::Text("targetFormat", "foo"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["success"], false);
}

#[tokio::test]
async fn http_image_download_rejects_unknown_ids() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());
    for id in ["nope.png", "..%2Fsecret", "00000000-0000-0000-0000-000000000000.png"] {
        let (status, _, _) = send(
            &app,
            Request::get(format!("/api/image/download/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "id {id}");
    }
}

#[tokio::test]
async fn http_conversion_failure_explains_itself() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());

    // No layout font configured, so Helvetica cannot draw these.
    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/file/convert",
            &[
                Part::File("file", "notes.txt", "你好世界".as_bytes()),
                Part::Text("targetFormat", "pdf"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let resp = json(&body);
    let message = resp["message"].as_str().unwrap();
    assert!(message.starts_with("File conversion failed: "), "{message}");
    assert!(message.contains("U+4F60"), "{message}");
    let file_id = resp["fileId"].as_str().unwrap().to_string();

    let (status, _, _) = send(
        &app,
        Request::post(format!("/api/file/cancel/{file_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn http_image_failure_always_carries_error() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());

    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/image/compress",
            &[Part::File("image", "broken.png", b"definitely not a png")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let resp = json(&body);
    assert_eq!(resp["success"], false);
    assert!(resp["message"]
        .as_str()
        .unwrap()
        .starts_with("Image compression failed: "));
    assert!(!resp["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn http_download_streams_large_passthrough_intact() {
    let tmp = TempDir::new().unwrap();
    let app = app(tmp.path());
    let data: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();

    let (status, _, body) = send(
        &app,
        post_multipart(
            "/api/file/convert",
            &[
                Part::File("file", "archive.docx", &data),
                Part::Text("targetFormat", "txt"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let file_id = json(&body)["fileId"].as_str().unwrap().to_string();

    let (status, headers, body) = send(
        &app,
        Request::get(format!("/api/file/download/{file_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_LENGTH], "300000");
    assert_eq!(body, data);
}

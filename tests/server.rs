use std::path::Path;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use surat_justifikasi::config::Settings;
use surat_justifikasi::docx::builder::write_docx;
use surat_justifikasi::docx::WordDocument;
use surat_justifikasi::server::{
    build_router, AppState, MSG_EMPTY_NAME, MSG_NOT_DOCX, MSG_NO_FILE, MSG_NO_LETTER,
};

const BOUNDARY: &str = "surat-test-boundary";

fn settings(root: &Path) -> Settings {
    let template = root.join("template.docx");
    write_docx(&template, &["Nomor: [NOMOR_SURAT]", "Barang: [NAMA_BARANG]"])
        .expect("write template");
    let settings = Settings {
        upload_dir: root.join("uploads"),
        template,
        ..Settings::default()
    };
    settings.ensure_upload_dir().expect("upload dir");
    settings
}

fn app(root: &Path) -> Router {
    build_router(AppState::new(settings(root)))
}

fn job_dirs(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(root.join("uploads"))
        .expect("read uploads")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn letter_id(html: &str) -> String {
    let link_at = html.find("/download?id=").expect("download link");
    html[link_at + "/download?id=".len()..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect()
}

fn multipart(field: &str, file_name: Option<&str>, content: &[u8]) -> Request<Body> {
    let disposition = match file_name {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    String::from_utf8_lossy(&bytes).into_owned()
}

fn request_docx(root: &Path) -> Vec<u8> {
    let path = root.join("pr-source.docx");
    write_docx(
        &path,
        &[
            "Nomor PR: PR-2024-07",
            "Deskripsi Barang/Jasa:",
            "Printer Epson L3210 - 2 unit",
        ],
    )
    .expect("write request");
    std::fs::read(path).expect("read request")
}

#[tokio::test]
async fn form_is_served() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resp = app(dir.path()).oneshot(get("/")).await.expect("response");
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains(r#"enctype="multipart/form-data""#));
    assert!(html.contains(r#"name="file""#));
}

#[tokio::test]
async fn upload_without_file_part_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let req = multipart("note", None, b"hello");
    let resp = app(dir.path()).oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(resp).await, MSG_NO_FILE);
}

#[tokio::test]
async fn upload_with_wrong_extension_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let req = multipart("file", Some("pr.pdf"), b"%PDF-1.4");
    let resp = app(dir.path()).oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(resp).await, MSG_NOT_DOCX);
}

#[tokio::test]
async fn upload_with_empty_file_name_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let req = multipart("file", Some(""), b"");
    let resp = app(dir.path()).oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(resp).await, MSG_EMPTY_NAME);
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        max_upload_bytes: 1024,
        ..settings(dir.path())
    };
    let app = build_router(AppState::new(settings));
    let req = multipart("file", Some("pr.docx"), &vec![b'x'; 4096]);
    let resp = app.oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(job_dirs(dir.path()).is_empty());
}

#[tokio::test]
async fn corrupt_docx_is_a_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let req = multipart("file", Some("pr.docx"), b"not a zip archive");
    let resp = app(dir.path()).oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_uploads_leave_no_job_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path());
    for _ in 0..3 {
        let req = multipart("file", Some("x.docx"), b"not a zip archive");
        let resp = app.clone().oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
    assert!(job_dirs(dir.path()).is_empty());

    let resp = app.oneshot(get("/download")).await.expect("response");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn old_letters_are_pruned_but_latest_stays() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        keep_jobs: 1,
        ..settings(dir.path())
    };
    let app = build_router(AppState::new(settings));
    let content = request_docx(dir.path());

    let mut ids = Vec::new();
    for _ in 0..3 {
        let resp = app
            .clone()
            .oneshot(multipart("file", Some("pr.docx"), &content))
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        ids.push(letter_id(&body_text(resp).await));
    }
    let latest = ids.last().cloned().expect("latest id");
    assert_eq!(job_dirs(dir.path()), vec![latest.clone()]);

    let resp = app.clone().oneshot(get("/download")).await.expect("response");
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app
        .oneshot(get(&format!("/download?id={}", ids[0])))
        .await
        .expect("response");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_before_any_letter_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path());

    let resp = app.clone().oneshot(get("/download")).await.expect("response");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(resp).await, MSG_NO_LETTER);

    let resp = app
        .oneshot(get("/download?id=0123456789abcdef0123456789abcdef"))
        .await
        .expect("response");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_then_download_letter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path());
    let content = request_docx(dir.path());

    let resp = app
        .clone()
        .oneshot(multipart("file", Some("PR Printer.docx"), &content))
        .await
        .expect("response");
    assert_eq!(resp.status(), StatusCode::OK);
    let id = letter_id(&body_text(resp).await);
    assert_eq!(id.len(), 32);

    let stored = dir.path().join("uploads").join(&id).join("PR_Printer.docx");
    assert!(stored.is_file(), "upload not stored at {}", stored.display());

    for uri in [format!("/download?id={id}"), "/download".to_string()] {
        let resp = app.clone().oneshot(get(&uri)).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        let headers = resp.headers();
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .expect("ascii header")
            .contains("surat_output.docx"));

        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        let saved = dir.path().join("downloaded.docx");
        std::fs::write(&saved, &bytes).expect("write download");
        let texts = WordDocument::open(&saved).expect("open letter").paragraph_texts();
        assert_eq!(texts, vec!["Nomor: PR-2024-07", "Barang: Printer Epson L3210"]);
    }
}

use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::AppState;
use crate::error::LetterError;
use crate::letter::{generate_letter, prune_jobs, JobPaths, OUTPUT_FILE_NAME};
use crate::textutil::{has_docx_extension, secure_filename};

const UPLOAD_FORM_HTML: &str = r#"
        <h2>Upload Dokumen PR (.docx)</h2>
        <form method="post" enctype="multipart/form-data">
            <input type="file" name="file">
            <input type="submit" value="Upload">
        </form>
    "#;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub const MSG_NO_FILE: &str = "Tidak ada file yang dipilih!";
pub const MSG_EMPTY_NAME: &str = "Nama file kosong!";
pub const MSG_NOT_DOCX: &str = "Format file harus .docx!";
pub const MSG_NO_LETTER: &str = "Surat belum dibuat!";

fn plain(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, msg.into()).into_response()
}

pub async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM_HTML)
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    // Parts without a filename are form values, not files.
    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("malformed multipart body: {e}");
                return plain(e.status(), e.body_text());
            }
        };
        if field.name() != Some("file") || upload.is_some() {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        match field.bytes().await {
            Ok(bytes) => upload = Some((file_name, bytes.to_vec())),
            Err(e) => {
                warn!("failed to read upload bytes: {e}");
                return plain(e.status(), e.body_text());
            }
        }
    }

    let Some((file_name, bytes)) = upload else {
        return plain(StatusCode::BAD_REQUEST, MSG_NO_FILE);
    };
    if file_name.is_empty() {
        return plain(StatusCode::BAD_REQUEST, MSG_EMPTY_NAME);
    }
    if !has_docx_extension(&file_name) {
        return plain(StatusCode::BAD_REQUEST, MSG_NOT_DOCX);
    }

    let settings = state.settings.clone();
    let job = match JobPaths::create(&settings.upload_dir) {
        Ok(job) => job,
        Err(e) => {
            error!("{e:#}");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Gagal menyimpan file!");
        }
    };
    let mut stored_name = secure_filename(&file_name);
    if stored_name.is_empty() {
        stored_name = "document.docx".to_string();
    }
    let source = job.upload(&stored_name);
    if let Err(e) = tokio::fs::write(&source, &bytes).await {
        error!("failed to store upload {}: {e}", source.display());
        discard_job(job).await;
        return plain(StatusCode::INTERNAL_SERVER_ERROR, "Gagal menyimpan file!");
    }
    info!(job = %job.id, file = %stored_name, bytes = bytes.len(), "upload stored");

    let output = job.output();
    let template = settings.template.clone();
    let result =
        tokio::task::spawn_blocking(move || generate_letter(&source, &template, &output)).await;
    match result {
        Ok(Ok(report)) => {
            info!(
                job = %job.id,
                missing = report.missing.len(),
                unresolved = report.fill.unresolved.len(),
                "letter ready"
            );
            *state.latest_job.lock().await = Some(job.id.clone());
            let (upload_dir, keep, current) =
                (settings.upload_dir.clone(), settings.keep_jobs, job.id.clone());
            match tokio::task::spawn_blocking(move || prune_jobs(&upload_dir, keep, &current)).await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("{e:#}"),
                Err(e) => warn!("prune task failed: {e}"),
            }
            Html(format!(
                r#"
                <h2>Surat berhasil dibuat!</h2>
                <a href="/download?id={}">Klik di sini untuk mengunduh surat</a>
            "#,
                job.id
            ))
            .into_response()
        }
        Ok(Err(e)) => {
            error!(job = %job.id, "{}", e.chain());
            let status = match &e {
                LetterError::Parse { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            discard_job(job).await;
            plain(status, e.chain())
        }
        Err(e) => {
            error!(job = %job.id, "letter task failed: {e}");
            discard_job(job).await;
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Gagal membuat surat!")
        }
    }
}

async fn discard_job(job: JobPaths) {
    if let Err(e) = tokio::fs::remove_dir_all(&job.dir).await {
        warn!(job = %job.id, "failed to remove job dir: {e}");
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub id: Option<String>,
}

pub async fn download(State(state): State<AppState>, Query(query): Query<DownloadQuery>) -> Response {
    let upload_dir = &state.settings.upload_dir;
    let job = match query.id {
        Some(id) => JobPaths::find(upload_dir, &id),
        None => {
            let latest = state.latest_job.lock().await.clone();
            latest.and_then(|id| JobPaths::find(upload_dir, &id))
        }
    };
    let Some(job) = job else {
        return plain(StatusCode::NOT_FOUND, MSG_NO_LETTER);
    };

    match tokio::fs::read(job.output()).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, DOCX_MIME.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{OUTPUT_FILE_NAME}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            plain(StatusCode::NOT_FOUND, MSG_NO_LETTER)
        }
        Err(e) => {
            error!(job = %job.id, "failed to read letter: {e}");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Gagal membaca surat!")
        }
    }
}

use std::path::{Path, PathBuf};

use axum::Json;
use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::application::ports::ExtractionOptions;
use crate::application::services::{MediaSource, PipelineOutput, PipelineRequest};
use crate::domain::{
    AudioFormat, AudioQuality, Job, JobMetadata, JobType, MediaKind, mime_for_format,
};
use crate::presentation::config::PipelineSettings;
use crate::presentation::state::AppState;

use super::error::ApiError;

#[derive(Serialize)]
pub struct TranscriptionResponse {
    pub id: String,
    pub job_id: String,
    pub text: String,
    pub duration_seconds: f64,
    pub word_count: usize,
    pub language: Option<String>,
    pub success: bool,
}

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub id: String,
    pub job_id: String,
    pub markdown: String,
    pub duration_seconds: Option<f64>,
    pub success: bool,
}

/// Submission form fields; exactly one source field may be set.
#[derive(Debug, Default)]
struct SubmissionForm {
    upload: Option<(UploadGuard, String)>,
    video_path: Option<String>,
    youtube_url: Option<String>,
    text: Option<String>,
    format: Option<String>,
    quality: Option<String>,
    media_kind: Option<String>,
    language: Option<String>,
    prompt: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
}

#[tracing::instrument(skip_all)]
pub async fn transcribe_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (job, request) = accept(&state, multipart, JobType::Transcription).await?;
    let job_id = job.id;
    let output = state
        .pipeline
        .clone()
        .run_detached(job, request)
        .await
        .map_err(|e| ApiError::from(e).with_job(job_id))?;

    match output {
        PipelineOutput::Transcription(result) => Ok((
            StatusCode::OK,
            Json(TranscriptionResponse {
                id: job_id.to_string(),
                job_id: job_id.to_string(),
                text: result.text,
                duration_seconds: result.duration_seconds,
                word_count: result.word_count,
                language: result.language,
                success: true,
            }),
        )
            .into_response()),
        _ => Err(unexpected_output(job_id)),
    }
}

#[tracing::instrument(skip_all)]
pub async fn analyze_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (job, request) = accept(&state, multipart, JobType::Analysis).await?;
    let job_id = job.id;
    let output = state
        .pipeline
        .clone()
        .run_detached(job, request)
        .await
        .map_err(|e| ApiError::from(e).with_job(job_id))?;

    match output {
        PipelineOutput::Analysis(result) => Ok((
            StatusCode::OK,
            Json(AnalysisResponse {
                id: job_id.to_string(),
                job_id: job_id.to_string(),
                markdown: result.markdown,
                duration_seconds: result.duration_seconds,
                success: true,
            }),
        )
            .into_response()),
        _ => Err(unexpected_output(job_id)),
    }
}

/// Returns the media itself; job metadata travels in `x-job-id` and the
/// `content-disposition` file name.
#[tracing::instrument(skip_all)]
pub async fn download_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (job, request) = accept(&state, multipart, JobType::Download).await?;
    let job_id = job.id;
    let output = state
        .pipeline
        .clone()
        .run_detached(job, request)
        .await
        .map_err(|e| ApiError::from(e).with_job(job_id))?;

    let PipelineOutput::Download { result, content } = output else {
        return Err(unexpected_output(job_id));
    };

    let mut response = Response::new(Body::from(content));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime_for_format(&result.format)),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", result.file_name))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&job_id.to_string()) {
        headers.insert("x-job-id", value);
    }
    Ok(response)
}

fn unexpected_output(job_id: crate::domain::JobId) -> ApiError {
    tracing::error!(job_id = %job_id, "Pipeline returned output of another job type");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error").with_job(job_id)
}

/// Reads the form, validates it, and records the pending job. An uploaded
/// file stays guarded until the job exists and the run takes it over; a
/// rejected or abandoned submission removes it.
async fn accept(
    state: &AppState,
    multipart: Multipart,
    job_type: JobType,
) -> Result<(Job, PipelineRequest), ApiError> {
    let settings = state.pipeline_settings.as_ref();
    let form = read_form(multipart, settings).await?;
    let (request, metadata, upload) = build_request(form, job_type, settings).await?;
    let job = state.controller.create_job(job_type, metadata).await?;
    if let Some(upload) = upload {
        upload.hand_over();
    }
    Ok((job, request))
}

async fn build_request(
    mut form: SubmissionForm,
    job_type: JobType,
    settings: &PipelineSettings,
) -> Result<(PipelineRequest, JobMetadata, Option<UploadGuard>), ApiError> {
    let mut metadata = JobMetadata::new();
    let mut upload = None;

    let format = parse_field::<AudioFormat>(form.format.as_deref(), "format")?.unwrap_or_default();
    let quality =
        parse_field::<AudioQuality>(form.quality.as_deref(), "quality")?.unwrap_or_default();
    let media_kind = match job_type {
        JobType::Download => parse_field::<MediaKind>(form.media_kind.as_deref(), "mediaKind")?
            .unwrap_or(MediaKind::Video),
        JobType::Transcription | JobType::Analysis => MediaKind::Audio,
    };
    let extraction = ExtractionOptions {
        format,
        quality,
        start_time: parse_seconds(form.start_time.as_deref(), "startTime")?,
        end_time: parse_seconds(form.end_time.as_deref(), "endTime")?,
    };
    extraction
        .clip()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let sources = [
        form.upload.is_some(),
        form.video_path.is_some(),
        form.youtube_url.is_some(),
        form.text.is_some(),
    ];
    if sources.iter().filter(|s| **s).count() != 1 {
        return Err(ApiError::bad_request(
            "Provide exactly one of audioFile, videoPath, youtubeUrl or text",
        ));
    }

    let source = if let Some((guard, file_name)) = form.upload.take() {
        metadata.insert(JobMetadata::SOURCE, "upload");
        metadata.insert(JobMetadata::FILE_NAME, file_name);
        let path = guard.path().to_path_buf();
        upload = Some(guard);
        MediaSource::Upload(path)
    } else if let Some(raw) = form.video_path {
        let path = resolve_local_path(&raw, &settings.temp_dir).await?;
        metadata.insert(JobMetadata::SOURCE, "local");
        metadata.insert(JobMetadata::FILE_NAME, raw);
        MediaSource::LocalFile(path)
    } else if let Some(url) = form.youtube_url {
        metadata.insert(JobMetadata::SOURCE, "youtube");
        metadata.insert(JobMetadata::SOURCE_URL, url.clone());
        MediaSource::Remote(url)
    } else {
        if job_type != JobType::Analysis {
            return Err(ApiError::bad_request("text input is only accepted for analysis"));
        }
        metadata.insert(JobMetadata::SOURCE, "text");
        MediaSource::Text(form.text.unwrap_or_default())
    };

    metadata.insert(JobMetadata::FORMAT, format.to_string());
    metadata.insert(JobMetadata::QUALITY, quality.to_string());
    metadata.insert(JobMetadata::MEDIA_KIND, media_kind.to_string());
    if let Some(language) = form.language.as_deref() {
        metadata.insert(JobMetadata::LANGUAGE, language);
    }

    let request = PipelineRequest {
        source,
        media_kind,
        extraction,
        language: form.language,
        prompt: form.prompt,
    };
    Ok((request, metadata, upload))
}

async fn read_form(
    mut multipart: Multipart,
    settings: &PipelineSettings,
) -> Result<SubmissionForm, ApiError> {
    let mut form = SubmissionForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read multipart");
                return Err(ApiError::bad_request(format!("Failed to read multipart: {}", e)));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let outcome = match name.as_str() {
            "audioFile" | "videoFile" | "file" => {
                form.upload = None;
                store_upload(field, settings)
                    .await
                    .map(|stored| form.upload = Some(stored))
            }
            other => match field.text().await {
                Ok(value) => {
                    assign_text(&mut form, other, value);
                    Ok(())
                }
                Err(e) => Err(ApiError::bad_request(format!("Failed to read field {}: {}", other, e))),
            },
        };

        outcome?;
    }

    Ok(form)
}

fn assign_text(form: &mut SubmissionForm, name: &str, value: String) {
    let value = value.trim().to_string();
    if value.is_empty() {
        return;
    }
    let slot = match name {
        "videoPath" => &mut form.video_path,
        "youtubeUrl" | "url" => &mut form.youtube_url,
        "text" => &mut form.text,
        "format" => &mut form.format,
        "quality" => &mut form.quality,
        "mediaKind" | "kind" => &mut form.media_kind,
        "language" => &mut form.language,
        "prompt" => &mut form.prompt,
        "startTime" => &mut form.start_time,
        "endTime" => &mut form.end_time,
        other => {
            tracing::debug!(field = %other, "Ignoring unknown form field");
            return;
        }
    };
    *slot = Some(value);
}

/// Streams an uploaded file into the temp root, enforcing the upload limit.
async fn store_upload(
    mut field: Field<'_>,
    settings: &PipelineSettings,
) -> Result<(UploadGuard, String), ApiError> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let extension = upload_extension(&file_name);
    let limit = settings.max_upload_bytes();

    tokio::fs::create_dir_all(&settings.temp_dir)
        .await
        .map_err(storage_error)?;
    let path = settings
        .temp_dir
        .join(format!("upload-{}.{}", Uuid::new_v4(), extension));
    let guard = UploadGuard::new(path);
    let mut file = tokio::fs::File::create(guard.path())
        .await
        .map_err(storage_error)?;

    let mut written: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                return Err(ApiError::bad_request(format!("Failed to read upload: {}", e)));
            }
        };
        written += chunk.len() as u64;
        if written > limit {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Upload exceeds {} MB", settings.max_upload_mb),
            ));
        }
        file.write_all(&chunk).await.map_err(storage_error)?;
    }
    file.flush().await.map_err(storage_error)?;

    tracing::debug!(path = %guard.path().display(), bytes = written, file_name = %file_name, "Upload stored");
    Ok((guard, file_name))
}

fn upload_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

/// `videoPath` must name an existing file inside the temp root.
async fn resolve_local_path(raw: &str, temp_dir: &Path) -> Result<PathBuf, ApiError> {
    let candidate = Path::new(raw);
    let candidate = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        temp_dir.join(candidate)
    };
    let rejected = || ApiError::bad_request(format!("videoPath is not an available file: {}", raw));

    let root = tokio::fs::canonicalize(temp_dir).await.map_err(|_| rejected())?;
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|_| rejected())?;
    if !resolved.starts_with(&root) {
        tracing::warn!(path = %resolved.display(), "videoPath outside the temp root rejected");
        return Err(rejected());
    }
    Ok(resolved)
}

fn parse_field<T>(raw: Option<&str>, name: &str) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.map(|value| {
        value
            .parse::<T>()
            .map_err(|e| ApiError::bad_request(format!("Invalid {}: {}", name, e)))
    })
    .transpose()
}

fn parse_seconds(raw: Option<&str>, name: &str) -> Result<Option<f64>, ApiError> {
    raw.map(|value| {
        value
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite())
            .ok_or_else(|| ApiError::bad_request(format!("Invalid {}: {}", name, value)))
    })
    .transpose()
}

fn storage_error(e: std::io::Error) -> ApiError {
    tracing::error!(error = %e, "Failed to store upload");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload")
}

/// Owns a stored upload until a job run takes it over. Dropping the guard
/// (rejected form, client gone mid-stream) removes the file.
#[derive(Debug)]
struct UploadGuard {
    path: PathBuf,
    armed: bool,
}

impl UploadGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn hand_over(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Unclaimed upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove unclaimed upload")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_odd_file_names_when_deriving_extension_then_only_safe_ones_are_kept() {
        assert_eq!(upload_extension("talk.M4A"), "m4a");
        assert_eq!(upload_extension("noext"), "bin");
        assert_eq!(upload_extension("evil.m4a;rm -rf"), "bin");
    }

    #[test]
    fn given_upload_guard_when_dropped_unclaimed_then_file_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let dropped = root.path().join("upload-a.m4a");
        let claimed = root.path().join("upload-b.m4a");
        std::fs::write(&dropped, b"audio").unwrap();
        std::fs::write(&claimed, b"audio").unwrap();

        drop(UploadGuard::new(dropped.clone()));
        let handed = UploadGuard::new(claimed.clone()).hand_over();

        assert!(!dropped.exists());
        assert_eq!(handed, claimed);
        assert!(claimed.exists());
    }

    #[tokio::test]
    async fn given_path_outside_temp_root_when_resolving_then_it_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::NamedTempFile::new().unwrap();

        let outcome = resolve_local_path(&outside.path().to_string_lossy(), root.path()).await;

        assert_eq!(outcome.unwrap_err().status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn given_relative_path_inside_temp_root_when_resolving_then_it_is_accepted() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("clip.m4a"), b"audio").unwrap();

        let resolved = resolve_local_path("clip.m4a", root.path()).await.unwrap();

        assert!(resolved.ends_with("clip.m4a"));
    }
}

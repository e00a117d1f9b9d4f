mod helpers;

use std::sync::atomic::Ordering;
use std::time::Duration;

use mediascribe::application::ports::{Completion, ExtractionOptions};
use mediascribe::application::services::{
    CANCELLED_MESSAGE, MediaSource, PipelineError, PipelineOutput, PipelineRequest,
};
use mediascribe::domain::{
    AudioFormat, JobMetadata, JobResult, JobStatus, JobType, MediaKind,
};

use helpers::{DownloadBehavior, HarnessBuilder, MB, files_in, write_file};

fn request(source: MediaSource) -> PipelineRequest {
    PipelineRequest {
        source,
        media_kind: MediaKind::Audio,
        extraction: ExtractionOptions::default(),
        language: None,
        prompt: None,
    }
}

const VIDEO_URL: &str = "https://www.youtube.com/watch?v=abc12345678";

#[tokio::test]
async fn given_remote_m4a_within_limits_when_transcribing_then_it_is_sent_without_extraction() {
    let harness = HarnessBuilder::default()
        .download(DownloadBehavior::Produce {
            suffix: "abc12345678.m4a",
            size: 10 * MB,
            delay: Duration::ZERO,
        })
        .duration_seconds(120.0)
        .transcript("hello world")
        .build();
    let url = "https://youtu.be/abc12345678";
    let job = harness
        .controller
        .create_job(
            JobType::Transcription,
            JobMetadata::new().with(JobMetadata::SOURCE_URL, url),
        )
        .await
        .unwrap();

    let output = harness
        .pipeline
        .clone()
        .run_detached(job.clone(), request(MediaSource::Remote(url.to_string())))
        .await
        .unwrap();

    let PipelineOutput::Transcription(result) = output else {
        panic!("expected a transcription");
    };
    assert_eq!(result.text, "hello world");
    assert_eq!(result.word_count, 2);
    assert_eq!(result.duration_seconds, 120.0);
    assert_eq!(harness.transcoder.extract_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 1);

    let stored = harness.controller.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.progress, 100);
    assert!(matches!(stored.result, Some(JobResult::Transcription(_))));
    assert!(files_in(harness.temp_path()).is_empty());
}

#[tokio::test]
async fn given_oversized_extraction_when_transcribing_then_job_fails_without_invocation() {
    let harness = HarnessBuilder::default().extracted_size(30 * MB).build();
    let upload = write_file(harness.temp_path(), "upload-1.mp4", 40 * MB);
    let job = harness
        .controller
        .create_job(JobType::Transcription, JobMetadata::new())
        .await
        .unwrap();

    let outcome = harness
        .pipeline
        .clone()
        .run_detached(job.clone(), request(MediaSource::Upload(upload)))
        .await;

    assert!(matches!(outcome, Err(PipelineError::PayloadTooLarge(_))));
    assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 0);
    let stored = harness.controller.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error.unwrap().contains("payload too large"));
    assert!(files_in(harness.temp_path()).is_empty());
}

#[tokio::test]
async fn given_content_longer_than_limit_when_transcribing_then_payload_too_large() {
    let harness = HarnessBuilder::default().duration_seconds(9000.0).build();
    let upload = write_file(harness.temp_path(), "upload-1.m4a", MB);
    let job = harness
        .controller
        .create_job(JobType::Transcription, JobMetadata::new())
        .await
        .unwrap();

    let outcome = harness
        .pipeline
        .clone()
        .run_detached(job, request(MediaSource::Upload(upload)))
        .await;

    assert!(matches!(outcome, Err(PipelineError::PayloadTooLarge(_))));
    assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_whitespace_transcript_when_transcribing_then_job_fails_with_empty_result() {
    let harness = HarnessBuilder::default().transcript("   \n").build();
    let upload = write_file(harness.temp_path(), "upload-1.m4a", MB);
    let job = harness
        .controller
        .create_job(JobType::Transcription, JobMetadata::new())
        .await
        .unwrap();

    let outcome = harness
        .pipeline
        .clone()
        .run_detached(job.clone(), request(MediaSource::Upload(upload)))
        .await;

    assert!(matches!(outcome, Err(PipelineError::EmptyResult { .. })));
    let stored = harness.controller.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.result.is_none());
}

#[tokio::test]
async fn given_remote_video_when_transcribing_then_download_and_extraction_are_both_cleaned() {
    let harness = HarnessBuilder::default()
        .download(DownloadBehavior::Produce {
            suffix: "abc12345678.webm",
            size: 3 * MB,
            delay: Duration::ZERO,
        })
        .build();
    let job = harness
        .controller
        .create_job(JobType::Transcription, JobMetadata::new())
        .await
        .unwrap();

    let output = harness
        .pipeline
        .clone()
        .run_detached(job, request(MediaSource::Remote(VIDEO_URL.to_string())))
        .await
        .unwrap();

    assert!(matches!(output, PipelineOutput::Transcription(_)));
    assert_eq!(harness.downloader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.transcoder.extract_calls.load(Ordering::SeqCst), 1);
    assert!(files_in(harness.temp_path()).is_empty());
}

#[tokio::test]
async fn given_unsupported_url_when_running_then_downloader_is_never_called() {
    let harness = HarnessBuilder::default().build();
    let job = harness
        .controller
        .create_job(JobType::Transcription, JobMetadata::new())
        .await
        .unwrap();

    let outcome = harness
        .pipeline
        .clone()
        .run_detached(
            job,
            request(MediaSource::Remote("https://example.com/video".to_string())),
        )
        .await;

    assert!(matches!(outcome, Err(PipelineError::InvalidSource(_))));
    assert_eq!(harness.downloader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_failing_download_when_running_then_job_error_names_the_stage() {
    let harness = HarnessBuilder::default()
        .download(DownloadBehavior::Fail)
        .build();
    let job = harness
        .controller
        .create_job(JobType::Analysis, JobMetadata::new())
        .await
        .unwrap();

    let outcome = harness
        .pipeline
        .clone()
        .run_detached(job.clone(), request(MediaSource::Remote(VIDEO_URL.to_string())))
        .await;

    assert!(matches!(outcome, Err(PipelineError::Acquisition(_))));
    let stored = harness.controller.get_job(job.id).await.unwrap();
    assert!(stored.error.unwrap().starts_with("download failed"));
    assert_eq!(harness.analysis.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_hanging_download_when_cancelled_then_job_fails_as_cancelled() {
    let harness = HarnessBuilder::default()
        .download(DownloadBehavior::Hang)
        .build();
    let job = harness
        .controller
        .create_job(JobType::Transcription, JobMetadata::new())
        .await
        .unwrap();

    let pipeline = harness.pipeline.clone();
    let run_job = job.clone();
    let running = tokio::spawn(async move {
        pipeline
            .run_detached(run_job, request(MediaSource::Remote(VIDEO_URL.to_string())))
            .await
    });
    harness.downloader.started.notified().await;

    harness.controller.cancel_job(job.id).await.unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(outcome, Err(PipelineError::Cancelled)));
    let stored = harness.controller.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(!harness.controller.cancellations().is_running(job.id));
    assert_eq!(harness.engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_video_download_request_when_running_then_media_is_returned_untranscoded() {
    let harness = HarnessBuilder::default()
        .download(DownloadBehavior::Produce {
            suffix: "abc12345678.mp4",
            size: 64 * MB,
            delay: Duration::ZERO,
        })
        .build();
    let job = harness
        .controller
        .create_job(JobType::Download, JobMetadata::new())
        .await
        .unwrap();
    let mut video = request(MediaSource::Remote(VIDEO_URL.to_string()));
    video.media_kind = MediaKind::Video;

    let output = harness
        .pipeline
        .clone()
        .run_detached(job.clone(), video)
        .await
        .unwrap();

    let PipelineOutput::Download { result, content } = output else {
        panic!("expected a download");
    };
    assert_eq!(result.media_kind, MediaKind::Video);
    assert_eq!(result.format, "mp4");
    assert_eq!(content.len() as u64, 64 * MB);
    assert_eq!(harness.transcoder.extract_calls.load(Ordering::SeqCst), 0);
    assert!(files_in(harness.temp_path()).is_empty());
    assert_eq!(
        harness.controller.get_job(job.id).await.unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn given_audio_download_in_other_format_when_running_then_audio_is_extracted() {
    let harness = HarnessBuilder::default().build();
    let job = harness
        .controller
        .create_job(JobType::Download, JobMetadata::new())
        .await
        .unwrap();
    let mut audio = request(MediaSource::Remote(VIDEO_URL.to_string()));
    audio.extraction.format = AudioFormat::Mp3;

    let output = harness
        .pipeline
        .clone()
        .run_detached(job, audio)
        .await
        .unwrap();

    let PipelineOutput::Download { result, .. } = output else {
        panic!("expected a download");
    };
    assert_eq!(result.format, "mp3");
    assert_eq!(harness.transcoder.extract_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn given_text_source_when_analyzing_then_no_media_stage_runs() {
    let harness = HarnessBuilder::default().build();
    let job = harness
        .controller
        .create_job(JobType::Analysis, JobMetadata::new())
        .await
        .unwrap();
    let mut text = request(MediaSource::Text("Meeting notes".to_string()));
    text.prompt = Some("Focus on decisions".to_string());

    let output = harness
        .pipeline
        .clone()
        .run_detached(job, text)
        .await
        .unwrap();

    let PipelineOutput::Analysis(result) = output else {
        panic!("expected an analysis");
    };
    assert_eq!(result.markdown, "# Report");
    assert!(result.duration_seconds.is_none());
    let prompts = harness.analysis.prompts.lock().unwrap().clone();
    assert!(prompts[0].contains("Focus on decisions"));
    assert!(prompts[0].ends_with("Meeting notes"));
    assert_eq!(harness.analysis.media_types.lock().unwrap()[0], None);
    assert_eq!(harness.transcoder.probe_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_blocked_completion_when_analyzing_media_then_job_fails_as_blocked() {
    let harness = HarnessBuilder::default()
        .completion(Completion {
            text: None,
            block_reason: Some("SAFETY".to_string()),
        })
        .build();
    let upload = write_file(harness.temp_path(), "upload-1.m4a", MB);
    let job = harness
        .controller
        .create_job(JobType::Analysis, JobMetadata::new())
        .await
        .unwrap();

    let outcome = harness
        .pipeline
        .clone()
        .run_detached(job.clone(), request(MediaSource::Upload(upload)))
        .await;

    assert!(matches!(outcome, Err(PipelineError::ContentBlocked(_))));
    assert_eq!(
        harness.analysis.media_types.lock().unwrap()[0].as_deref(),
        Some("audio/mp4")
    );
    assert_eq!(
        harness.controller.get_job(job.id).await.unwrap().status,
        JobStatus::Failed
    );
}

#[tokio::test]
async fn given_local_file_when_transcribing_then_the_source_file_is_kept() {
    let harness = HarnessBuilder::default().build();
    let local = write_file(harness.temp_path(), "lecture.m4a", MB);
    let job = harness
        .controller
        .create_job(JobType::Transcription, JobMetadata::new())
        .await
        .unwrap();

    harness
        .pipeline
        .clone()
        .run_detached(job, request(MediaSource::LocalFile(local.clone())))
        .await
        .unwrap();

    assert!(local.exists());
    assert_eq!(files_in(harness.temp_path()), vec!["lecture.m4a".to_string()]);
}

#[tokio::test]
async fn given_language_hint_when_transcribing_then_engine_receives_it() {
    let harness = HarnessBuilder::default().build();
    let upload = write_file(harness.temp_path(), "upload-1.m4a", MB);
    let job = harness
        .controller
        .create_job(JobType::Transcription, JobMetadata::new())
        .await
        .unwrap();
    let mut hinted = request(MediaSource::Upload(upload));
    hinted.language = Some("no".to_string());

    let output = harness
        .pipeline
        .clone()
        .run_detached(job, hinted)
        .await
        .unwrap();

    let options = harness.engine.last_options.lock().unwrap().clone().unwrap();
    assert_eq!(options.language.as_deref(), Some("no"));
    let PipelineOutput::Transcription(result) = output else {
        panic!("expected a transcription");
    };
    assert_eq!(result.language.as_deref(), Some("no"));
}

//! Error handling integration tests.
//!
//! These tests verify that bad inputs surface as meaningful errors from the
//! FFmpeg source and as well-formed verdicts from the inspector.

use std::path::Path;
use std::sync::Arc;

use playcheck::{
    Classification, DeviceHint, FfmpegFrameSource, FrameCount, FrameSource, InspectOptions,
    LumaClassifier, PlaycheckError, VerdictStatus, VideoFrames, VideoInspector, VideoTask,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn ffmpeg_inspector() -> VideoInspector<FfmpegFrameSource> {
    VideoInspector::new(
        Arc::new(FfmpegFrameSource::new()),
        Arc::new(LumaClassifier::new()),
        InspectOptions::new().with_device(DeviceHint::Cpu),
    )
}

#[test]
fn open_nonexistent_file() {
    let result = FfmpegFrameSource::new().open("this_file_does_not_exist.mp4");
    assert!(result.is_err());

    let error_message = result.unwrap_err().to_string();
    assert!(
        error_message.contains("Failed to open video"),
        "Error message should mention file open failure: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FfmpegFrameSource::new().open(invalid_file_path.to_str().unwrap());
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn nonexistent_file_is_unreadable() {
    let verdict = ffmpeg_inspector().inspect(&VideoTask::new("this_file_does_not_exist.mp4"));

    assert_eq!(verdict.classification, Classification::Unreadable);
    assert_eq!(verdict.status, VerdictStatus::Success);
    assert_eq!(verdict.frames_read, 0);
}

#[test]
fn garbage_file_is_unreadable() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("garbage.mp4");
    std::fs::write(&invalid_file_path, [0u8; 4096]).expect("Failed to write invalid file");

    let verdict =
        ffmpeg_inspector().inspect(&VideoTask::new(invalid_file_path.to_string_lossy()));
    assert_eq!(verdict.classification, Classification::Unreadable);
}

#[test]
fn zero_skip_interval_is_rejected() {
    let result = InspectOptions::new().with_skip_interval(0);
    assert!(matches!(result, Err(PlaycheckError::InvalidInterval)));
}

#[test]
fn unknown_device_is_rejected() {
    let result = "tpu".parse::<DeviceHint>();
    assert!(matches!(result, Err(PlaycheckError::InvalidDevice(_))));
}

#[test]
fn sample_video_decodes_frames() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let mut video = FfmpegFrameSource::new()
        .open(SAMPLE_VIDEO)
        .expect("Failed to open test video");
    let FrameCount::Frames(total) = video.frame_count() else {
        panic!("sample video should have a video stream");
    };
    assert!(total > 0);

    assert!(video.skip_frame().expect("Failed to skip frame"));
    let frame = video
        .next_frame()
        .expect("Failed to decode frame")
        .expect("sample video ended early");
    assert!(frame.width() > 0 && frame.height() > 0);
}

#[test]
fn sample_video_gets_a_verdict() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let verdict = ffmpeg_inspector().inspect(&VideoTask::new(SAMPLE_VIDEO));

    assert_eq!(verdict.status, VerdictStatus::Success);
    assert!(verdict.frames_read > 0);
    assert!(verdict.frames_classified <= verdict.frames_read);
    assert_eq!(verdict.to_json()["code"], 1);
}

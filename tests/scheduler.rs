//! BatchScheduler integration tests.

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{Script, ScriptedClassifier, ScriptedSource, Shot};
use playcheck::{
    BatchScheduler, CancellationToken, Classification, InspectOptions, PlaycheckError,
    ProgressCallback, ProgressInfo, VideoTask,
};

fn scheduler(source: ScriptedSource, workers: usize) -> BatchScheduler<ScriptedSource> {
    BatchScheduler::new(source, Arc::new(ScriptedClassifier::new()))
        .with_workers(workers)
        .with_options(InspectOptions::new().with_compressed(false))
}

fn by_source(verdicts: Vec<playcheck::VideoVerdict>) -> HashMap<String, Classification> {
    verdicts
        .into_iter()
        .map(|verdict| (verdict.source, verdict.classification))
        .collect()
}

#[test]
fn every_task_gets_one_verdict() {
    let mut source = ScriptedSource::new();
    let mut tasks = Vec::new();
    for index in 0..20 {
        let name = format!("video-{index}.mp4");
        let shot = match index % 3 {
            0 => Shot::Normal,
            1 => Shot::Black,
            _ => Shot::Distort,
        };
        source = source.with(&name, Script::repeated(shot, 25));
        tasks.push(VideoTask::new(name));
    }

    let verdicts: Vec<_> = scheduler(source, 4).run(tasks).unwrap().collect();
    assert_eq!(verdicts.len(), 20);

    let classes = by_source(verdicts);
    assert_eq!(classes.len(), 20);
    assert_eq!(classes["video-0.mp4"], Classification::Normal);
    assert_eq!(classes["video-1.mp4"], Classification::Black);
    assert_eq!(classes["video-2.mp4"], Classification::Distort);
}

#[test]
fn run_reports_exact_length() {
    let source = ScriptedSource::new()
        .with("a.mp4", Script::repeated(Shot::Normal, 3))
        .with("b.mp4", Script::repeated(Shot::Normal, 3));

    let mut run = scheduler(source, 2).run(["a.mp4", "b.mp4", "missing.mp4"]).unwrap();
    assert_eq!(run.len(), 3);
    run.next().unwrap();
    assert_eq!(run.remaining(), 2);
    assert_eq!(run.by_ref().count(), 2);
    assert!(run.next().is_none());
}

#[test]
fn concurrency_never_exceeds_worker_count() {
    let mut source = ScriptedSource::new();
    let mut tasks = Vec::new();
    for index in 0..12 {
        let name = format!("slow-{index}.mp4");
        source = source.with(
            &name,
            Script::repeated(Shot::Normal, 10).frame_delay(Duration::from_millis(2)),
        );
        tasks.push(name);
    }
    let stats = Arc::clone(&source.stats);

    let verdicts: Vec<_> = scheduler(source, 3).run(tasks).unwrap().collect();

    assert_eq!(verdicts.len(), 12);
    assert!(stats.max_active.load(Ordering::SeqCst) <= 3);
    assert_eq!(stats.released.load(Ordering::SeqCst), 12);
}

#[test]
fn failing_video_does_not_affect_others() {
    let source = ScriptedSource::new()
        .with("good.mp4", Script::repeated(Shot::Black, 30))
        .with("panic.mp4", Script::repeated(Shot::Panic, 30))
        .with("broken.mp4", Script::repeated(Shot::Normal, 30).decode_fails_at(2))
        .with("empty.mp4", Script::repeated(Shot::Normal, 1).reported(playcheck::FrameCount::Frames(0)));

    let tasks = ["good.mp4", "panic.mp4", "broken.mp4", "empty.mp4", "absent.mp4"];
    let classes = by_source(scheduler(source, 2).run(tasks).unwrap().collect());

    assert_eq!(classes["good.mp4"], Classification::Black);
    assert_eq!(classes["panic.mp4"], Classification::UnknownError);
    assert_eq!(classes["broken.mp4"], Classification::UnknownError);
    assert_eq!(classes["empty.mp4"], Classification::Unreadable);
    assert_eq!(classes["absent.mp4"], Classification::Unreadable);
}

#[test]
fn scheduler_exposes_its_classifier() {
    let scheduler = scheduler(ScriptedSource::new(), 2);
    assert_eq!(scheduler.inspector().classifier().name(), "scripted");
}

#[test]
fn zero_workers_is_rejected() {
    let result = scheduler(ScriptedSource::new(), 0).run(Vec::<VideoTask>::new());
    assert!(matches!(result, Err(PlaycheckError::InvalidWorkerCount)));
}

#[test]
fn empty_batch_yields_nothing() {
    let mut run = scheduler(ScriptedSource::new(), 2)
        .run(Vec::<VideoTask>::new())
        .unwrap();
    assert_eq!(run.len(), 0);
    assert!(run.next().is_none());
}

#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for Recording {
    fn on_progress(&self, info: &ProgressInfo) {
        self.seen.lock().unwrap().push(info.clone());
    }
}

#[test]
fn progress_is_reported_per_verdict() {
    let source = ScriptedSource::new()
        .with("a.mp4", Script::repeated(Shot::Normal, 5))
        .with("b.mp4", Script::repeated(Shot::Black, 25))
        .with("c.mp4", Script::repeated(Shot::Distort, 25));
    let recording = Arc::new(Recording::default());
    let scheduler = BatchScheduler::new(source, Arc::new(ScriptedClassifier::new()))
        .with_workers(2)
        .with_options(
            InspectOptions::new()
                .with_compressed(false)
                .with_progress(recording.clone()),
        );

    let verdicts: Vec<_> = scheduler.run(["a.mp4", "b.mp4", "c.mp4"]).unwrap().collect();

    let seen = recording.seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen.last().unwrap().completed, 3);
    assert_eq!(seen.last().unwrap().total, 3);
    assert!((seen.last().unwrap().percentage - 100.0).abs() < f32::EPSILON);
    for (info, verdict) in seen.iter().zip(&verdicts) {
        assert_eq!(info.last_source, verdict.source);
        assert_eq!(info.last_classification, verdict.classification);
    }
}

#[test]
fn cancelled_batch_still_answers_every_task() {
    let token = CancellationToken::new();
    token.cancel();
    let source = ScriptedSource::new()
        .with("a.mp4", Script::repeated(Shot::Normal, 30))
        .with("b.mp4", Script::repeated(Shot::Normal, 30));
    let scheduler = BatchScheduler::new(source, Arc::new(ScriptedClassifier::new()))
        .with_options(InspectOptions::new().with_cancellation(token));

    let verdicts: Vec<_> = scheduler.run(["a.mp4", "b.mp4"]).unwrap().collect();

    assert_eq!(verdicts.len(), 2);
    assert!(
        verdicts
            .iter()
            .all(|verdict| verdict.classification == Classification::UnknownError)
    );
}

//! Scripted frame source and classifier shared by the integration tests.
//!
//! Each scripted frame is a small solid image whose red channel encodes the
//! label the classifier should return, so the inspection pipeline runs end to
//! end without FFmpeg or a model.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};
use playcheck::{
    DeviceHint, FrameClassifier, FrameCount, FrameLabel, FrameSource, PlaycheckError,
    VideoFrames,
};

const NORMAL: u8 = 10;
const BLACK: u8 = 20;
const DISTORT: u8 = 30;
const PANIC: u8 = 40;
const FAIL: u8 = 50;

/// What one scripted frame makes the classifier do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shot {
    Normal,
    Black,
    Distort,
    /// Classifier returns an inference error.
    Fail,
    /// Classifier panics.
    Panic,
}

impl Shot {
    fn code(self) -> u8 {
        match self {
            Shot::Normal => NORMAL,
            Shot::Black => BLACK,
            Shot::Distort => DISTORT,
            Shot::Fail => FAIL,
            Shot::Panic => PANIC,
        }
    }
}

/// Script for one video.
#[derive(Debug, Clone)]
pub struct Script {
    pub reported: FrameCount,
    pub shots: Vec<Shot>,
    pub open_fails: bool,
    /// Decoding frame at this 0-based position fails.
    pub decode_fails_at: Option<usize>,
    /// Sleep before each decoded frame.
    pub frame_delay: Duration,
}

impl Script {
    /// Video whose reported frame count matches its shots.
    pub fn frames(shots: Vec<Shot>) -> Self {
        Self {
            reported: FrameCount::Frames(shots.len() as u64),
            shots,
            open_fails: false,
            decode_fails_at: None,
            frame_delay: Duration::ZERO,
        }
    }

    pub fn repeated(shot: Shot, count: usize) -> Self {
        Self::frames(vec![shot; count])
    }

    pub fn reported(mut self, count: FrameCount) -> Self {
        self.reported = count;
        self
    }

    pub fn open_fails() -> Self {
        let mut script = Self::frames(Vec::new());
        script.open_fails = true;
        script
    }

    pub fn decode_fails_at(mut self, position: usize) -> Self {
        self.decode_fails_at = Some(position);
        self
    }

    pub fn frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }
}

/// Counters shared between the source and every handle it opened.
#[derive(Debug, Default)]
pub struct Stats {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub frames_read: Mutex<HashMap<String, u64>>,
}

impl Stats {
    pub fn frames_read(&self, source: &str) -> u64 {
        self.frames_read
            .lock()
            .unwrap()
            .get(source)
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Script>,
    pub stats: Arc<Stats>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: &str, script: Script) -> Self {
        self.scripts.insert(source.to_string(), script);
        self
    }
}

impl FrameSource for ScriptedSource {
    type Video = ScriptedVideo;

    fn open(&self, source: &str) -> Result<Self::Video, PlaycheckError> {
        let script = match self.scripts.get(source) {
            Some(script) if !script.open_fails => script.clone(),
            _ => {
                return Err(PlaycheckError::FileOpen {
                    path: source.into(),
                    reason: "scripted open failure".to_string(),
                });
            }
        };

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(ScriptedVideo {
            source: source.to_string(),
            script,
            position: 0,
            stats: Arc::clone(&self.stats),
        })
    }
}

pub struct ScriptedVideo {
    source: String,
    script: Script,
    position: usize,
    stats: Arc<Stats>,
}

impl ScriptedVideo {
    fn advance(&mut self) -> Result<Option<Shot>, PlaycheckError> {
        if !self.script.frame_delay.is_zero() {
            thread::sleep(self.script.frame_delay);
        }
        if self.script.decode_fails_at == Some(self.position) {
            return Err(PlaycheckError::VideoDecodeError(
                "scripted decode failure".to_string(),
            ));
        }
        let Some(&shot) = self.script.shots.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        *self
            .stats
            .frames_read
            .lock()
            .unwrap()
            .entry(self.source.clone())
            .or_default() += 1;
        Ok(Some(shot))
    }
}

impl VideoFrames for ScriptedVideo {
    fn frame_count(&self) -> FrameCount {
        self.script.reported
    }

    fn next_frame(&mut self) -> Result<Option<DynamicImage>, PlaycheckError> {
        Ok(self.advance()?.map(|shot| {
            DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([shot.code(), 0, 0])))
        }))
    }

    fn skip_frame(&mut self) -> Result<bool, PlaycheckError> {
        Ok(self.advance()?.is_some())
    }
}

impl Drop for ScriptedVideo {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Decodes the label from the red channel of the frame's first pixel.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    pub calls: AtomicU64,
    pub last_size: Mutex<Option<(u32, u32)>>,
    pub last_device: Mutex<Option<DeviceHint>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameClassifier for ScriptedClassifier {
    fn classify(
        &self,
        frame: &DynamicImage,
        device: &DeviceHint,
    ) -> Result<FrameLabel, PlaycheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_size.lock().unwrap() = Some((frame.width(), frame.height()));
        *self.last_device.lock().unwrap() = Some(*device);

        let code = frame.to_rgb8().get_pixel(0, 0).0[0];
        match code {
            NORMAL => Ok(FrameLabel::Normal),
            BLACK => Ok(FrameLabel::Black),
            DISTORT => Ok(FrameLabel::Distort),
            PANIC => panic!("scripted classifier panic"),
            _ => Err(PlaycheckError::InferenceError(format!(
                "scripted failure (code {code})"
            ))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// `count` copies of each `(shot, count)` pair, in order.
pub fn sequence(parts: &[(Shot, usize)]) -> Vec<Shot> {
    parts
        .iter()
        .flat_map(|&(shot, count)| std::iter::repeat_n(shot, count))
        .collect()
}

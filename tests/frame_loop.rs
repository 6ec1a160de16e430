use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use inky_frame::config::Configuration;
use inky_frame::display::{DisplayReport, FrameDisplay};
use inky_frame::error::{Error, Result};
use inky_frame::events::FrameState;
use inky_frame::immich::{Asset, AssetSource};
use inky_frame::tasks::frame::Frame;
use reqwest::StatusCode;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
enum Reply {
    Fail,
    Empty,
    Photo,
}

/// Serves scripted replies in order, repeating the last one forever.
#[derive(Clone)]
struct ScriptedSource {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedSource {
    fn new(replies: &[Reply]) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.iter().copied().collect())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            *replies.front().unwrap()
        }
    }

    fn call_offsets(&self, start: Instant) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start))
            .collect()
    }
}

impl AssetSource for ScriptedSource {
    async fn random_assets(&self, _count: usize) -> Result<Vec<Asset>> {
        self.calls.lock().unwrap().push(Instant::now());
        match self.next_reply() {
            Reply::Fail => Err(Error::Status {
                url: "http://immich.test/api/assets/random?count=10".to_string(),
                status: StatusCode::SERVICE_UNAVAILABLE,
            }),
            Reply::Empty => Ok(Vec::new()),
            Reply::Photo => Ok(vec![Asset {
                id: "p1".to_string(),
                original_file_name: "photo.jpg".to_string(),
                asset_type: "IMAGE".to_string(),
                file_created_at: None,
                created_at: None,
            }]),
        }
    }

    async fn download_original(&self, _asset_id: &str) -> Result<Vec<u8>> {
        Ok(b"jpeg".to_vec())
    }
}

#[derive(Clone)]
struct RecordingDisplay {
    succeed: bool,
    shown: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingDisplay {
    fn new(succeed: bool) -> Self {
        Self {
            succeed,
            shown: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FrameDisplay for RecordingDisplay {
    async fn show(&self, image: &Path) -> DisplayReport {
        self.shown.lock().unwrap().push(image.to_path_buf());
        DisplayReport {
            command: format!("fake {}", image.display()),
            success: self.succeed,
            completed: true,
            exit_code: Some(if self.succeed { 0 } else { 1 }),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

fn config(dir: &Path) -> Configuration {
    Configuration {
        base_url: "http://immich.test".to_string(),
        api_key: "key".to_string(),
        rotation_interval_minutes: 10,
        retry_backoff: Duration::from_secs(60),
        image_path: dir.join("current_frame.jpg"),
        ..Configuration::default()
    }
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_retries_after_exactly_the_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(&[Reply::Fail]);
    let display = RecordingDisplay::new(true);
    let frame = Frame::new(source.clone(), display.clone(), &config(dir.path()));

    let start = Instant::now();
    let _ = tokio::time::timeout(Duration::from_secs(150), frame.run(CancellationToken::new())).await;

    let offsets = source.call_offsets(start);
    assert_eq!(offsets.len(), 3, "calls at 0s, 60s and 120s: {offsets:?}");
    for pair in offsets.windows(2) {
        assert_eq!((pair[1] - pair[0]).as_secs(), 60);
    }
    assert!(display.shown.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_batch_waits_the_rotation_interval() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(&[Reply::Empty]);
    let display = RecordingDisplay::new(true);
    let frame = Frame::new(source.clone(), display.clone(), &config(dir.path()));

    let start = Instant::now();
    let _ = tokio::time::timeout(Duration::from_secs(900), frame.run(CancellationToken::new())).await;

    let offsets = source.call_offsets(start);
    assert_eq!(offsets.len(), 2, "{offsets:?}");
    assert_eq!((offsets[1] - offsets[0]).as_secs(), 600);
    assert!(display.shown.lock().unwrap().is_empty());
    assert!(!dir.path().join("current_frame.jpg").exists());
}

#[tokio::test(start_paused = true)]
async fn recovers_to_normal_interval_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(&[Reply::Fail, Reply::Photo]);
    let display = RecordingDisplay::new(true);
    let frame = Frame::new(source.clone(), display.clone(), &config(dir.path()));

    let start = Instant::now();
    let _ = tokio::time::timeout(Duration::from_secs(60 + 600 + 30), frame.run(CancellationToken::new()))
        .await;

    let offsets = source.call_offsets(start);
    assert_eq!(offsets.len(), 3, "{offsets:?}");
    assert_eq!((offsets[1] - offsets[0]).as_secs(), 60);
    assert_eq!((offsets[2] - offsets[1]).as_secs(), 600);
    // photos shown at 60s and 660s
    assert_eq!(display.shown.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn display_failure_moves_to_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let display = RecordingDisplay::new(false);
    let frame = Frame::new(ScriptedSource::new(&[Reply::Photo]), display.clone(), &cfg);

    assert_eq!(frame.step().await, FrameState::Backoff);
    assert_eq!(*display.shown.lock().unwrap(), vec![cfg.image_path.clone()]);
    assert_eq!(std::fs::read(&cfg.image_path).unwrap(), b"jpeg");
}

#[tokio::test]
async fn successful_cycle_stays_running() {
    let dir = tempfile::tempdir().unwrap();
    let frame = Frame::new(
        ScriptedSource::new(&[Reply::Photo]),
        RecordingDisplay::new(true),
        &config(dir.path()),
    );
    assert_eq!(frame.step().await, FrameState::Running);
}

#[tokio::test(start_paused = true)]
async fn cancellation_ends_the_loop_during_a_wait() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new(&[Reply::Empty]);
    let frame = Frame::new(source.clone(), RecordingDisplay::new(true), &config(dir.path()));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { frame.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop should stop promptly")
        .expect("loop task panicked");
    assert_eq!(source.calls.lock().unwrap().len(), 1);
}

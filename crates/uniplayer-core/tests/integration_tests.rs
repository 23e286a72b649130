//! Integration tests for Uniplayer Core

use std::io;
use std::sync::{Arc, Mutex};

use tokio_test::{assert_pending, assert_ready_ok, task};
use uniplayer_core::headless::{Headless, HeadlessScript, JournalEntry, RemoteCall, SinkCall};
use uniplayer_core::{
    classify, EmbedProvider, FatalErrorKind, Generation, MediaEvent, PlaybackController,
    PlayerConfig, PlayerState, RemoteEvent, RemoteState, SourceKind, SourceOptions, StreamEvent,
};

fn controller(headless: &Headless) -> PlaybackController {
    PlaybackController::new(
        PlayerConfig::default(),
        Box::new(headless.sink()),
        Box::new(headless.backends()),
    )
    .unwrap()
}

fn paused() -> SourceOptions {
    SourceOptions { autoplay: Some(false) }
}

fn remote_calls(headless: &Headless) -> Vec<RemoteCall> {
    headless
        .journal()
        .into_iter()
        .filter_map(|entry| match entry {
            JournalEntry::Remote(call) => Some(call),
            _ => None,
        })
        .collect()
}

/// Log sink capturing formatted output
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines_containing(&self, needle: &str) -> usize {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Classification Tests
// =============================================================================

#[test]
fn test_classification_table() {
    let cases = [
        ("stream.m3u8", SourceKind::Hls),
        ("https://cdn.example.com/live/index.M3U8?token=abc", SourceKind::Hls),
        ("/media/manifest.mpd#t=10", SourceKind::Dash),
        ("https://cdn.example.com/clip.mp4", SourceKind::Progressive),
        ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", SourceKind::RemoteEmbed),
        ("youtu.be/dQw4w9WgXcQ", SourceKind::RemoteEmbed),
        ("https://vimeo.com/76979871", SourceKind::RemoteEmbed),
    ];
    for (locator, kind) in cases {
        assert_eq!(classify(locator).unwrap().kind, kind, "{}", locator);
    }
}

#[test]
fn test_unextractable_embed_rejected() {
    let err = classify("https://vimeo.com/channels/staffpicks").unwrap_err();
    assert_eq!(err.error_code(), "UNRECOGNIZED_EMBED");
    assert!(err.is_recoverable());
}

// =============================================================================
// Engine Lifecycle Tests
// =============================================================================

#[test]
fn test_hls_source_is_live() {
    let headless = Headless::default();
    let mut player = controller(&headless);

    player.set_source("stream.m3u8", SourceOptions::default()).unwrap();

    let state = player.state();
    assert_eq!(state.source, Some(SourceKind::Hls));
    assert!(state.is_live);
    assert_eq!(state.duration, 0.0);
    assert_eq!(state.state, PlayerState::Playing);

    let opened = headless
        .journal()
        .iter()
        .filter(|e| matches!(e, JournalEntry::SessionOpened { .. }))
        .count();
    assert_eq!(opened, 1);
}

#[test]
fn test_hls_without_library_plays_natively() {
    let headless = Headless::new(HeadlessScript {
        hls_supported: false,
        ..Default::default()
    });
    let mut player = controller(&headless);

    player.set_source("stream.m3u8", SourceOptions::default()).unwrap();

    assert!(headless.sessions().is_empty());
    assert_eq!(headless.source().as_deref(), Some("stream.m3u8"));
    assert!(player.state().is_live);
    assert_eq!(player.state().duration, 0.0);
}

#[test]
fn test_dash_liveness_from_manifest() {
    let vod = Headless::default();
    let mut player = controller(&vod);
    player.set_source("movie.mpd", paused()).unwrap();
    assert!(!player.state().is_live);
    assert_eq!(player.state().duration, 60.0);
    assert_eq!(player.state().state, PlayerState::Ready);

    let live = Headless::new(HeadlessScript {
        dash_live: true,
        ..Default::default()
    });
    let mut player = controller(&live);
    player.set_source("event.mpd", paused()).unwrap();
    assert!(player.state().is_live);
    assert_eq!(player.state().duration, 0.0);
}

#[test]
fn test_remote_embed_session() {
    let headless = Headless::default();
    let mut player = controller(&headless);

    player
        .set_source("https://www.youtube.com/watch?v=dQw4w9WgXcQ", SourceOptions::default())
        .unwrap();

    let remote = headless.remotes()[0].clone();
    assert_eq!(remote.provider(), EmbedProvider::YouTube);
    assert_eq!(remote.video_id().as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(player.state().state, PlayerState::Playing);
    assert_eq!(player.state().duration, 212.0);

    headless.advance(10.0);
    player.tick().unwrap();
    assert_eq!(player.state().current_time, 10.0);

    player.seek(100.0).unwrap();
    assert_eq!(player.state().current_time, 100.0);
    assert_eq!(remote.current_time(), 100.0);
}

#[test]
fn test_remote_error_is_fatal() {
    let headless = Headless::default();
    let mut player = controller(&headless);
    player.set_source("https://vimeo.com/76979871", SourceOptions::default()).unwrap();

    headless.remotes()[0].deliver(RemoteEvent::Error { code: 100 });
    player.pump().unwrap();

    assert_eq!(player.state().state, PlayerState::Error);
    assert_eq!(player.state().error, Some(FatalErrorKind::NotFound));
    assert!(!player.state().playing);
}

#[test]
fn test_remote_controls_before_ready_leave_state() {
    let headless = Headless::new(HeadlessScript::manual());
    let mut player = controller(&headless);
    player
        .set_source("https://www.youtube.com/watch?v=dQw4w9WgXcQ", paused())
        .unwrap();

    player.seek(30.0).unwrap();
    player.pause().unwrap();
    let state = player.state();
    assert_eq!(state.state, PlayerState::Loading);
    assert_eq!(state.current_time, 0.0);
    assert!(remote_calls(&headless).is_empty());

    headless.remotes()[0].deliver(RemoteEvent::Ready { duration: 90.0 });
    player.pump().unwrap();
    player.seek(30.0).unwrap();
    assert_eq!(player.state().current_time, 30.0);
    assert_eq!(remote_calls(&headless), vec![RemoteCall::SeekTo(30.0)]);
}

#[test]
fn test_remote_duration_after_start_ends_live() {
    let headless = Headless::new(HeadlessScript::manual());
    let mut player = controller(&headless);
    player.set_rate(1.5).unwrap();
    player
        .set_source("https://www.youtube.com/watch?v=dQw4w9WgXcQ", paused())
        .unwrap();

    let remote = headless.remotes()[0].clone();
    remote.deliver(RemoteEvent::Ready { duration: 0.0 });
    player.pump().unwrap();
    assert!(player.state().is_live);
    assert!(!remote_calls(&headless).contains(&RemoteCall::SetPlaybackRate(1.5)));

    remote.deliver(RemoteEvent::StateChange(RemoteState::Playing));
    player.tick().unwrap();
    let state = player.state();
    assert!(!state.is_live);
    assert_eq!(state.duration, 212.0);
    assert_eq!(state.state, PlayerState::Playing);
    assert!(remote_calls(&headless).contains(&RemoteCall::SetPlaybackRate(1.5)));

    player.seek(60.0).unwrap();
    assert_eq!(player.state().current_time, 60.0);
    assert_eq!(remote.current_time(), 60.0);
}

#[test]
fn test_progressive_plays_to_end() {
    let headless = Headless::default();
    let mut player = controller(&headless);
    player.set_source("clip.mp4", SourceOptions::default()).unwrap();

    headless.advance(45.0);
    player.pump().unwrap();
    assert_eq!(player.state().current_time, 45.0);

    headless.advance(30.0);
    player.pump().unwrap();
    assert_eq!(player.state().state, PlayerState::Ended);
    assert_eq!(player.state().current_time, 60.0);
    assert!(!player.state().playing);
}

#[test]
fn test_attach_failure_without_fallback() {
    let headless = Headless::new(HeadlessScript {
        fail_backend: Some(SourceKind::Dash),
        ..Default::default()
    });
    let mut player = controller(&headless);

    let err = player.set_source("movie.mpd", SourceOptions::default()).unwrap_err();
    assert_eq!(err.error_code(), "ENGINE_ATTACH");
    assert_eq!(player.state().state, PlayerState::Error);
    assert!(headless.source().is_none());
    assert_eq!(headless.active_attachments(), 0);

    player.set_source("clip.mp4", SourceOptions::default()).unwrap();
    assert_eq!(player.state().state, PlayerState::Playing);
    assert_eq!(player.state().error, None);
}

// =============================================================================
// Property Tests
// =============================================================================

#[test]
fn test_at_most_one_attachment() {
    let headless = Headless::default();
    let mut player = controller(&headless);
    let locators = [
        "a.mp4",
        "b.m3u8",
        "c.mpd",
        "https://youtu.be/dQw4w9WgXcQ",
        "d.mp4",
        "https://player.vimeo.com/video/76979871",
        "e.m3u8",
        "e.m3u8",
        "f.mpd",
    ];

    for locator in locators {
        player.set_source(locator, SourceOptions::default()).unwrap();
        assert_eq!(headless.active_attachments(), 1, "{}", locator);
    }
    assert_eq!(headless.max_active_attachments(), 1);
    assert_eq!(player.generation(), Generation(locators.len() as u64));

    for session in headless.sessions().iter().rev().skip(1) {
        assert!(session.is_destroyed());
    }
}

#[test]
fn test_live_seek_stays_live() {
    let headless = Headless::default();
    let mut player = controller(&headless);
    player.set_source("live.m3u8", SourceOptions::default()).unwrap();

    headless.advance(30.0);
    player.pump().unwrap();

    for target in [0.0, 5.0, 1e9, -20.0] {
        player.seek(target).unwrap();
        let state = player.state();
        assert!(state.is_live);
        assert_eq!(state.duration, 0.0);
    }
    assert!(headless.sink_calls().contains(&SinkCall::Seek(30.0)));

    player.set_rate(2.0).unwrap();
    assert_eq!(player.state().rate, 1.0);
}

#[test]
fn test_dispose_twice_equals_once() {
    let headless = Headless::default();
    let mut player = controller(&headless);
    player.set_source("clip.mp4", SourceOptions::default()).unwrap();

    player.dispose();
    let journal = headless.journal();
    let generation = player.generation();
    player.dispose();

    assert_eq!(headless.journal(), journal);
    assert_eq!(player.generation(), generation);
    assert_eq!(headless.active_attachments(), 0);
    assert!(player.pump().is_err());
}

#[test]
fn test_stale_events_are_discarded() {
    let headless = Headless::new(HeadlessScript::manual());
    let mut player = controller(&headless);

    player.set_source("first.mpd", paused()).unwrap();
    player.set_source("second.mp4", paused()).unwrap();
    assert_eq!(player.state().state, PlayerState::Loading);

    let first = headless.sessions()[0].clone();
    assert!(first.is_destroyed());
    first.deliver_in_flight(StreamEvent::ManifestParsed {
        live: true,
        duration: None,
    });
    first.deliver_in_flight(StreamEvent::Error {
        fatal: true,
        kind: FatalErrorKind::Network,
        details: "manifestLoadError".into(),
    });
    player.pump().unwrap();

    let state = player.state();
    assert!(!state.is_live);
    assert_eq!(state.error, None);
    assert_eq!(state.state, PlayerState::Loading);

    headless.deliver(MediaEvent::LoadedMetadata { duration: 30.0 });
    player.pump().unwrap();
    assert_eq!(player.state().state, PlayerState::Ready);
    assert_eq!(player.state().duration, 30.0);
}

#[test]
fn test_stale_remote_events_are_discarded() {
    let headless = Headless::new(HeadlessScript::manual());
    let mut player = controller(&headless);

    player.set_source("https://youtu.be/dQw4w9WgXcQ", SourceOptions::default()).unwrap();
    player.set_source("clip.mp4", paused()).unwrap();

    let remote = headless.remotes()[0].clone();
    assert!(remote.is_destroyed());
    remote.deliver_in_flight(RemoteEvent::Ready { duration: 0.0 });
    remote.deliver_in_flight(RemoteEvent::Error { code: 150 });
    player.pump().unwrap();

    assert!(!player.state().is_live);
    assert_eq!(player.state().error, None);
    assert_eq!(player.state().source, Some(SourceKind::Progressive));
}

// =============================================================================
// Autoplay Policy Tests
// =============================================================================

#[test]
fn test_blocked_autoplay_logged_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let headless = Headless::new(HeadlessScript {
            block_autoplay: true,
            ..Default::default()
        });
        let mut player = controller(&headless);

        player.set_source("clip.mp4", SourceOptions::default()).unwrap();
        assert!(!player.state().playing);
        assert_eq!(player.state().state, PlayerState::Ready);
        assert_eq!(player.state().error, None);

        player.play().unwrap();
        player.play().unwrap();
        assert!(!player.state().playing);
        assert_eq!(logs.lines_containing("Playback blocked"), 1);

        headless.grant_gesture();
        player.play().unwrap();
        assert!(player.state().playing);
    });

    assert_eq!(logs.lines_containing("Playback blocked"), 1);
}

#[test]
fn test_blocked_autoplay_on_remote() {
    let headless = Headless::new(HeadlessScript {
        block_autoplay: true,
        ..Default::default()
    });
    let mut player = controller(&headless);

    player.set_source("https://youtu.be/dQw4w9WgXcQ", SourceOptions::default()).unwrap();
    assert!(!player.state().playing);
    assert_eq!(player.state().state, PlayerState::Ready);

    headless.grant_gesture();
    player.play().unwrap();
    assert!(player.state().playing);
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_config_from_json() {
    let config = PlayerConfig::from_json(r#"{"autoplay": false, "initial_volume": 0.25}"#).unwrap();
    assert!(!config.autoplay);
    assert_eq!(config.initial_volume, 0.25);
    assert_eq!(config.initial_rate, 1.0);

    let headless = Headless::default();
    let mut player =
        PlaybackController::new(config, Box::new(headless.sink()), Box::new(headless.backends())).unwrap();
    player.set_source("clip.mp4", SourceOptions::default()).unwrap();
    assert_eq!(player.state().state, PlayerState::Ready);
    assert!(headless.sink_calls().contains(&SinkCall::SetVolume(0.25)));

    assert!(PlayerConfig::from_json(r#"{"initial_rate": 0}"#).is_err());
    assert!(PlayerConfig::from_json("not json").is_err());
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[tokio::test]
async fn test_watch_subscription_sees_updates() {
    let headless = Headless::default();
    let mut player = controller(&headless);
    let mut rx = player.subscribe();
    assert_eq!(rx.borrow().state, PlayerState::Empty);

    player.set_source("clip.mp4", SourceOptions::default()).unwrap();
    rx.changed().await.unwrap();
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.state, PlayerState::Playing);
    assert_eq!(&snapshot, player.state());
}

#[test]
fn test_watch_not_woken_without_change() {
    let headless = Headless::default();
    let mut player = controller(&headless);
    player.set_source("clip.mp4", SourceOptions::default()).unwrap();

    let mut rx = player.subscribe();
    {
        let mut changed = task::spawn(rx.changed());
        assert_pending!(changed.poll());

        player.play().unwrap();
        player.set_muted(false).unwrap();
        assert!(!changed.is_woken());

        player.set_muted(true).unwrap();
        assert!(changed.is_woken());
        assert_ready_ok!(changed.poll());
    }
    assert!(rx.borrow().muted);
}

#[test]
fn test_dispose_closes_subscription() {
    let headless = Headless::default();
    let player = controller(&headless);
    let mut rx = player.subscribe();
    drop(player);

    let mut changed = task::spawn(rx.changed());
    assert!(changed.poll().is_ready());
}

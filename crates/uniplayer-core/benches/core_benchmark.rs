//! Benchmark tests for uniplayer-core operations
//!
//! Run with: cargo bench -p uniplayer-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use uniplayer_core::headless::{Headless, HeadlessScript};
use uniplayer_core::reconcile::{fold, ControlChange, Update};
use uniplayer_core::{
    classify, EngineEvent, PlaybackController, PlaybackState, PlayerConfig, SourceKind,
    SourceOptions,
};

// ============================================================================
// Helpers
// ============================================================================

const LOCATORS: &[(&str, &str)] = &[
    ("progressive", "https://cdn.example.com/media/clip.mp4"),
    ("hls", "https://cdn.example.com/live/index.m3u8?token=abcdef"),
    ("dash", "/media/manifest.mpd#t=30"),
    ("youtube", "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
    ("youtu_be", "youtu.be/dQw4w9WgXcQ"),
    ("vimeo", "https://player.vimeo.com/video/76979871"),
];

/// A playback session's worth of updates: load, play, time ticks, pause
fn create_update_stream(ticks: usize) -> Vec<Update> {
    let mut updates = vec![
        Update::Control(ControlChange::SourceChanged(SourceKind::Progressive)),
        Update::Engine(EngineEvent::DurationKnown(ticks as f64)),
        Update::Engine(EngineEvent::PlayStateChanged(true)),
    ];
    for i in 0..ticks {
        updates.push(Update::Engine(EngineEvent::TimeUpdate(i as f64 * 0.25)));
    }
    updates.push(Update::Control(ControlChange::Paused));
    updates
}

// ============================================================================
// Classification Benchmarks
// ============================================================================

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("Classify");

    for (name, locator) in LOCATORS {
        group.bench_with_input(BenchmarkId::from_parameter(name), locator, |b, locator| {
            b.iter(|| classify(black_box(locator)))
        });
    }

    group.finish();
}

// ============================================================================
// Fold Benchmarks
// ============================================================================

fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fold");

    for ticks in [10usize, 100, 1000] {
        let updates = create_update_stream(ticks);
        group.bench_with_input(BenchmarkId::new("session", ticks), &updates, |b, updates| {
            b.iter(|| {
                updates
                    .iter()
                    .fold(PlaybackState::default(), |state, update| fold(state, black_box(update)))
            })
        });
    }

    group.finish();
}

// ============================================================================
// Controller Benchmarks
// ============================================================================

fn bench_source_switch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Source Switch");

    group.bench_function("headless_cycle", |b| {
        let headless = Headless::new(HeadlessScript::default());
        let mut player = PlaybackController::new(
            PlayerConfig::default(),
            Box::new(headless.sink()),
            Box::new(headless.backends()),
        )
        .unwrap();

        b.iter(|| {
            for (_, locator) in LOCATORS {
                player.set_source(black_box(locator), SourceOptions::default()).unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(classify_benches, bench_classify);

criterion_group!(fold_benches, bench_fold);

criterion_group!(controller_benches, bench_source_switch);

criterion_main!(classify_benches, fold_benches, controller_benches);

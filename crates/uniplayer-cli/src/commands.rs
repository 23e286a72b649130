//! CLI command implementations

use crate::output::{render, ClassifyRow, OutputFormat, StepRow};
use crate::SimulateArgs;
use anyhow::Context;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uniplayer_core::headless::{Headless, HeadlessScript};
use uniplayer_core::{PlaybackController, PlaybackState, PlayerConfig, SourceOptions};

/// Classify locators and report the selected backend
pub fn classify(locators: &[String], format: &str) -> anyhow::Result<()> {
    let mut rejected = 0;
    let rows: Vec<ClassifyRow> = locators
        .iter()
        .map(|locator| match uniplayer_core::classify(locator) {
            Ok(descriptor) => ClassifyRow::classified(&descriptor),
            Err(e) => {
                rejected += 1;
                ClassifyRow::rejected(locator, &e)
            }
        })
        .collect();

    let text = render(&rows, OutputFormat::from(format), |row| {
        if row.error.is_empty() {
            let remote = if row.id.is_empty() {
                String::new()
            } else {
                format!(" ({} id {})", row.provider, row.id)
            };
            format!("{} -> {}{}", row.locator, row.kind, remote)
        } else {
            format!("{} -> rejected: {}", row.locator, row.error)
        }
    });
    println!("{}", text);

    if rejected > 0 {
        anyhow::bail!("{} locator(s) rejected", rejected);
    }
    Ok(())
}

fn load_config(args: &SimulateArgs) -> anyhow::Result<PlayerConfig> {
    match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(PlayerConfig::from_json(&json)?)
        }
        None => Ok(PlayerConfig::default()),
    }
}

/// Count the distinct snapshots a subscriber observes until the controller
/// goes away
async fn observe(mut rx: watch::Receiver<PlaybackState>) -> usize {
    let mut seen = 0;
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        debug!(state = %state.state, time = state.current_time, "Subscriber update");
        seen += 1;
    }
    seen
}

/// Run a scripted session against headless backends
pub async fn simulate(args: SimulateArgs, format: &str) -> anyhow::Result<()> {
    let local = tokio::task::LocalSet::new();
    local.run_until(run_simulation(args, format)).await
}

async fn run_simulation(args: SimulateArgs, format: &str) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let descriptor = uniplayer_core::classify(&args.locator)?;

    let script = HeadlessScript {
        block_autoplay: args.block_autoplay,
        media_duration: args.duration,
        remote_duration: args.duration,
        hls_supported: !args.no_hls,
        dash_live: args.live_dash,
        fail_attach: args.fail_attach.then_some(descriptor.kind),
        ..Default::default()
    };
    let headless = Headless::new(script);
    let mut player = PlaybackController::new(
        config,
        Box::new(headless.sink()),
        Box::new(headless.backends()),
    )?;
    let observer = tokio::task::spawn_local(observe(player.subscribe()));

    info!(locator = %args.locator, kind = %descriptor.kind, "Simulating session");

    let mut rows = Vec::new();
    let options = SourceOptions {
        autoplay: args.no_autoplay.then_some(false),
    };

    match player.set_descriptor(descriptor, options) {
        Ok(()) => rows.push(StepRow::new("load", player.state())),
        Err(e) => {
            warn!(error = %e, "Load failed");
            rows.push(StepRow::new(format!("load failed ({})", e.error_code()), player.state()));
        }
    }
    tokio::task::yield_now().await;

    headless.advance(args.play_for);
    player.tick()?;
    rows.push(StepRow::new(format!("advance {}s", args.play_for), player.state()));
    tokio::task::yield_now().await;

    if let Some(volume) = args.volume {
        player.set_volume(volume)?;
        rows.push(StepRow::new(format!("volume {}", volume), player.state()));
    }
    if let Some(rate) = args.rate {
        player.set_rate(rate)?;
        rows.push(StepRow::new(format!("rate {}", rate), player.state()));
    }
    if let Some(position) = args.seek {
        player.seek(position)?;
        rows.push(StepRow::new(format!("seek {}", position), player.state()));
    }
    tokio::task::yield_now().await;

    if args.block_autoplay && !player.state().playing {
        headless.grant_gesture();
        player.play()?;
        rows.push(StepRow::new("gesture + play", player.state()));
    }

    headless.advance(args.play_for);
    player.tick()?;
    rows.push(StepRow::new(format!("advance {}s", args.play_for), player.state()));

    player.pause()?;
    rows.push(StepRow::new("pause", player.state()));

    player.dispose();
    let peak = headless.max_active_attachments();
    drop(player);
    let updates = observer.await?;

    let text = render(&rows, OutputFormat::from(format), |row| {
        let mut line = format!(
            "{:<18} {:<8} {:>6} / {:<6} playing={} volume={} muted={} rate={}",
            row.step, row.state, row.time, row.duration, row.playing, row.volume, row.muted, row.rate
        );
        if let Some(error) = &row.error {
            line.push_str(&format!(" error={}", error));
        }
        line
    });
    println!("{}", text);

    if OutputFormat::from(format) != OutputFormat::Json {
        println!("\n{} subscriber update(s), peak attached backends: {}", updates, peak);
    }

    Ok(())
}

//! Headless playback example
//!
//! Drives a controller through a few source changes against the in-process
//! backends and prints the state after each step.
//!
//! Run with: cargo run -p uniplayer-core --example headless_session

use uniplayer_core::headless::{Headless, HeadlessScript};
use uniplayer_core::{format_time, PlaybackController, PlaybackState, PlayerConfig, SourceOptions};

fn print_state(label: &str, state: &PlaybackState) {
    let duration = if state.is_live {
        "LIVE".to_string()
    } else {
        format_time(state.duration)
    };
    println!(
        "{:<28} {:<8} {} / {}  volume={:.2} rate={}x",
        label,
        state.state,
        format_time(state.current_time),
        duration,
        state.volume,
        state.rate
    );
}

fn main() -> uniplayer_core::Result<()> {
    println!("Uniplayer Core - Headless Session Example");
    println!("==========================================\n");

    let headless = Headless::new(HeadlessScript::default());
    let mut player = PlaybackController::new(
        PlayerConfig::default(),
        Box::new(headless.sink()),
        Box::new(headless.backends()),
    )?;

    player.set_source("https://cdn.example.com/clip.mp4", SourceOptions::default())?;
    print_state("progressive loaded", player.state());

    headless.advance(12.0);
    player.pump()?;
    player.set_rate(1.5)?;
    player.set_volume(0.4)?;
    print_state("after 12s, 1.5x", player.state());

    player.set_source("https://cdn.example.com/live/index.m3u8", SourceOptions::default())?;
    print_state("hls loaded", player.state());

    headless.advance(30.0);
    player.seek(0.0)?;
    print_state("hls seek (live edge)", player.state());

    player.set_source("https://youtu.be/dQw4w9WgXcQ", SourceOptions::default())?;
    headless.advance(5.0);
    player.tick()?;
    print_state("youtube after 5s", player.state());

    if let Err(e) = player.set_source("https://vimeo.com/channels/staffpicks", SourceOptions::default()) {
        println!("\nRejected locator: {} ({})", e, e.error_code());
    }

    player.dispose();
    println!(
        "\nDisposed; {} backend(s) still attached, peak {}",
        headless.active_attachments(),
        headless.max_active_attachments()
    );

    Ok(())
}

//! Uniplayer WASM - Browser bindings for the player core
//!
//! Wires the core controller to the page:
//! - `<video>` element sink with autoplay-rejection reporting
//! - hls.js and dash.js sessions (page globals `Hls`, `dashjs`)
//! - YouTube IFrame API and Vimeo Player SDK bridges
//! - `UniPlayer`, the JS-facing control API
//!
//! ## Usage
//!
//! ```javascript
//! import init, { UniPlayer } from '@uniplayer/wasm';
//!
//! await init();
//! const player = new UniPlayer(video, container);
//! player.onState((state) => console.log(state.state, state.current_time));
//! player.setSource('https://youtu.be/dQw4w9WgXcQ');
//! ```

use wasm_bindgen::prelude::*;

mod backends;
mod js;
mod player;
mod remote;
mod sink;
mod streaming;

pub use backends::WebBackends;
pub use player::UniPlayer;
pub use sink::WebMediaSink;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    js::info(&format!("Initialized v{}", uniplayer_core::VERSION));
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Classify a locator without creating a player
#[wasm_bindgen(js_name = classifySource)]
pub fn classify_source(locator: &str) -> Result<JsValue, JsError> {
    let descriptor = uniplayer_core::classify(locator)?;
    serde_wasm_bindgen::to_value(&descriptor).map_err(|e| JsError::new(&e.to_string()))
}

/// Format seconds as `m:ss`; minutes keep counting past the hour
#[wasm_bindgen(js_name = formatTime)]
pub fn format_time(seconds: f64) -> String {
    uniplayer_core::format_time(seconds)
}

//! JS-facing player
//!
//! Engine callbacks run on the browser event loop while a control call may
//! still hold the controller, so the waker only schedules a pump on the
//! microtask queue and the pump itself retries if the controller is busy.

use crate::backends::WebBackends;
use crate::js;
use crate::sink::WebMediaSink;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use uniplayer_core::{PlaybackController, PlaybackState, PlayerConfig, SourceOptions, Waker};
use wasm_bindgen::prelude::*;
use web_sys::{HtmlElement, HtmlVideoElement};

struct Shared {
    controller: RefCell<PlaybackController>,
    pump_scheduled: Cell<bool>,
    on_state: RefCell<Option<js_sys::Function>>,
    last_notified: RefCell<Option<PlaybackState>>,
}

impl Shared {
    fn waker(shared: Weak<Shared>) -> Waker {
        Rc::new(move || {
            if let Some(shared) = shared.upgrade() {
                Shared::schedule_pump(&shared);
            }
        })
    }

    fn schedule_pump(shared: &Rc<Shared>) {
        if shared.pump_scheduled.replace(true) {
            return;
        }
        let weak = Rc::downgrade(shared);
        wasm_bindgen_futures::spawn_local(async move {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            shared.pump_scheduled.set(false);
            let pumped = match shared.controller.try_borrow_mut() {
                Ok(mut controller) => controller.pump().map_err(|e| e.to_string()),
                Err(_) => {
                    Shared::schedule_pump(&shared);
                    return;
                }
            };
            if let Err(e) = pumped {
                js::warn(&format!("pump failed: {}", e));
            }
            shared.notify();
        });
    }

    /// Run a control call, then report the new state to the subscriber
    fn control<T>(
        &self,
        f: impl FnOnce(&mut PlaybackController) -> uniplayer_core::Result<T>,
    ) -> Result<T, JsError> {
        let result = {
            let mut controller = self
                .controller
                .try_borrow_mut()
                .map_err(|_| JsError::new("player is busy"))?;
            f(&mut controller)
        };
        self.notify();
        result.map_err(|e| JsError::new(&format!("{} ({})", e, e.error_code())))
    }

    fn snapshot(&self) -> Option<PlaybackState> {
        self.controller.try_borrow().ok().map(|c| c.state().clone())
    }

    /// Call the `onState` callback if the snapshot changed since the last call.
    /// No borrow is held while the callback runs, so it may call back in.
    fn notify(&self) {
        let Some(callback) = self.on_state.borrow().clone() else {
            return;
        };
        let Some(state) = self.snapshot() else {
            return;
        };
        if self.last_notified.borrow().as_ref() == Some(&state) {
            return;
        }
        let value = match serde_wasm_bindgen::to_value(&state) {
            Ok(value) => value,
            Err(e) => {
                js::error(&format!("Failed to convert state: {}", e));
                return;
            }
        };
        *self.last_notified.borrow_mut() = Some(state);
        if let Err(e) = callback.call1(&JsValue::NULL, &value) {
            js::error(&format!("onState callback threw: {}", js::describe(&e)));
        }
    }
}

fn parse_config(config: JsValue) -> Result<PlayerConfig, JsError> {
    if config.is_undefined() || config.is_null() {
        return Ok(PlayerConfig::default());
    }
    if let Some(json) = config.as_string() {
        return PlayerConfig::from_json(&json).map_err(JsError::from);
    }
    let config: PlayerConfig =
        serde_wasm_bindgen::from_value(config).map_err(|e| JsError::new(&format!("invalid config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Video player bound to a `<video>` element and its container
///
/// ```javascript
/// const player = new UniPlayer(video, container, { autoplay: false });
/// player.onState((state) => render(state));
/// player.setSource('https://cdn.example.com/live/index.m3u8');
/// setInterval(() => player.tick(), 250);
/// ```
#[wasm_bindgen]
pub struct UniPlayer {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl UniPlayer {
    /// Create a player. `config` may be a `PlayerConfig` object, a JSON
    /// string, or omitted.
    #[wasm_bindgen(constructor)]
    pub fn new(video: HtmlVideoElement, container: HtmlElement, config: JsValue) -> Result<UniPlayer, JsError> {
        let config = parse_config(config)?;
        let sink = WebMediaSink::new(video.clone(), container.clone());
        let backends = WebBackends::new(video, container);
        let controller = PlaybackController::new(config, Box::new(sink), Box::new(backends))?;

        let shared = Rc::new(Shared {
            controller: RefCell::new(controller),
            pump_scheduled: Cell::new(false),
            on_state: RefCell::new(None),
            last_notified: RefCell::new(None),
        });
        shared
            .controller
            .borrow_mut()
            .set_waker(Shared::waker(Rc::downgrade(&shared)));

        Ok(UniPlayer { shared })
    }

    /// Controller identifier
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.shared
            .controller
            .try_borrow()
            .map(|c| c.id().to_string())
            .unwrap_or_default()
    }

    /// Load a locator. `autoplay` overrides the configured default.
    #[wasm_bindgen(js_name = setSource)]
    pub fn set_source(&self, locator: &str, autoplay: Option<bool>) -> Result<(), JsError> {
        self.shared
            .control(|c| c.set_source(locator, SourceOptions { autoplay }))
    }

    pub fn play(&self) -> Result<(), JsError> {
        self.shared.control(|c| c.play())
    }

    pub fn pause(&self) -> Result<(), JsError> {
        self.shared.control(|c| c.pause())
    }

    /// Seek to `position` seconds; jumps to the live edge on live sources
    pub fn seek(&self, position: f64) -> Result<(), JsError> {
        self.shared.control(|c| c.seek(position))
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f64) -> Result<(), JsError> {
        self.shared.control(|c| c.set_volume(volume))
    }

    #[wasm_bindgen(js_name = setMuted)]
    pub fn set_muted(&self, muted: bool) -> Result<(), JsError> {
        self.shared.control(|c| c.set_muted(muted))
    }

    #[wasm_bindgen(js_name = setRate)]
    pub fn set_rate(&self, rate: f64) -> Result<(), JsError> {
        self.shared.control(|c| c.set_rate(rate))
    }

    #[wasm_bindgen(js_name = setPitchPreserved)]
    pub fn set_pitch_preserved(&self, preserve: bool) -> Result<(), JsError> {
        self.shared.control(|c| c.set_pitch_preserved(preserve))
    }

    #[wasm_bindgen(js_name = toggleFullscreen)]
    pub fn toggle_fullscreen(&self) -> Result<(), JsError> {
        self.shared.control(|c| c.toggle_fullscreen())
    }

    /// Poll backends without push events (iframe players). Call periodically.
    pub fn tick(&self) -> Result<(), JsError> {
        self.shared.control(|c| c.tick())
    }

    /// Current state as a plain object
    pub fn state(&self) -> Result<JsValue, JsError> {
        let state = self
            .shared
            .snapshot()
            .ok_or_else(|| JsError::new("player is busy"))?;
        serde_wasm_bindgen::to_value(&state).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Played fraction of the timeline, 0 for live sources
    pub fn progress(&self) -> f64 {
        self.shared.snapshot().map(|s| s.progress()).unwrap_or(0.0)
    }

    /// Register the state callback, replacing any previous one. It receives
    /// the current state right away.
    #[wasm_bindgen(js_name = onState)]
    pub fn on_state(&self, callback: js_sys::Function) {
        *self.shared.on_state.borrow_mut() = Some(callback);
        *self.shared.last_notified.borrow_mut() = None;
        self.shared.notify();
    }

    /// Tear down the active backend. Further control calls fail.
    pub fn dispose(&self) {
        if let Ok(mut controller) = self.shared.controller.try_borrow_mut() {
            controller.dispose();
        }
        self.shared.notify();
        *self.shared.on_state.borrow_mut() = None;
        js::info("Player disposed");
    }
}

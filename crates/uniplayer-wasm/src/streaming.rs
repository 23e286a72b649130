//! hls.js and dash.js bridges
//!
//! Both libraries are expected as page globals (`Hls`, `dashjs`). Sessions
//! attach to the player's `<video>` element directly.

use crate::js;
use std::cell::Cell;
use std::rc::Rc;
use uniplayer_core::{
    BackendError, FatalErrorKind, MediaSink, StreamEvent, StreamListener, StreamingSession, Subscription,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlMediaElement, HtmlVideoElement};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = Hls)]
    type HlsJs;

    #[wasm_bindgen(static_method_of = HlsJs, js_class = "Hls", js_name = isSupported, catch)]
    fn is_supported() -> Result<bool, JsValue>;

    #[wasm_bindgen(constructor, js_class = "Hls", catch)]
    fn new() -> Result<HlsJs, JsValue>;

    #[wasm_bindgen(method, js_name = loadSource)]
    fn load_source(this: &HlsJs, url: &str);

    #[wasm_bindgen(method, js_name = attachMedia)]
    fn attach_media(this: &HlsJs, media: &HtmlMediaElement);

    #[wasm_bindgen(method)]
    fn on(this: &HlsJs, event: &str, callback: &js_sys::Function);

    #[wasm_bindgen(method, getter, js_name = liveSyncPosition)]
    fn live_sync_position(this: &HlsJs) -> Option<f64>;

    #[wasm_bindgen(method)]
    fn destroy(this: &HlsJs);
}

#[wasm_bindgen]
extern "C" {
    type DashFactory;

    #[wasm_bindgen(js_namespace = dashjs, js_name = MediaPlayer, catch)]
    fn dash_media_player() -> Result<DashFactory, JsValue>;

    #[wasm_bindgen(method)]
    fn create(this: &DashFactory) -> DashPlayer;

    #[derive(Clone)]
    type DashPlayer;

    #[wasm_bindgen(method)]
    fn initialize(this: &DashPlayer, view: &HtmlMediaElement, url: &str, autoplay: bool);

    #[wasm_bindgen(method)]
    fn on(this: &DashPlayer, event: &str, callback: &js_sys::Function);

    #[wasm_bindgen(method, js_name = isDynamic)]
    fn is_dynamic(this: &DashPlayer) -> bool;

    #[wasm_bindgen(method)]
    fn duration(this: &DashPlayer) -> f64;

    #[wasm_bindgen(method)]
    fn reset(this: &DashPlayer);
}

/// Whether hls.js is loaded and Media Source Extensions are available
pub fn hls_supported() -> bool {
    HlsJs::is_supported().unwrap_or(false)
}

/// Gate shared between a session's callbacks and the subscription handed
/// back to the engine
fn gate() -> (Rc<Cell<bool>>, Subscription) {
    let active = Rc::new(Cell::new(true));
    let flag = active.clone();
    (active, Subscription::new(move || flag.set(false)))
}

fn hls_error_kind(data: &JsValue) -> FatalErrorKind {
    match js::get_string(data, "type").as_deref() {
        Some("networkError") => FatalErrorKind::Network,
        Some("mediaError") => FatalErrorKind::Decode,
        _ => FatalErrorKind::Other(js::get_string(data, "details").unwrap_or_else(|| "hls.js error".to_string())),
    }
}

fn dash_error_kind(code: Option<f64>, message: String) -> FatalErrorKind {
    match code.map(|c| c as i64) {
        // DOWNLOAD_ERROR_ID_* codes
        Some(25..=28) => FatalErrorKind::Network,
        // CAPABILITY_MEDIASOURCE_ERROR_CODE
        Some(24) => FatalErrorKind::SourceNotSupported,
        _ => FatalErrorKind::Other(message),
    }
}

type HlsCallback = Closure<dyn FnMut(JsValue, JsValue)>;

/// hls.js session
pub struct HlsJsSession {
    video: HtmlVideoElement,
    hls: Option<HlsJs>,
    callbacks: Vec<HlsCallback>,
}

impl HlsJsSession {
    pub fn new(video: HtmlVideoElement) -> Self {
        Self {
            video,
            hls: None,
            callbacks: Vec::new(),
        }
    }
}

impl StreamingSession for HlsJsSession {
    fn open(
        &mut self,
        locator: &str,
        _sink: &mut dyn MediaSink,
        listener: StreamListener,
    ) -> Result<Subscription, BackendError> {
        let hls = HlsJs::new().map_err(|e| BackendError::new(format!("hls.js unavailable: {}", js::describe(&e))))?;
        let (active, subscription) = gate();

        let reported = Rc::new(Cell::new(false));
        let on_level = {
            let active = active.clone();
            let listener = listener.clone();
            HlsCallback::new(move |_event: JsValue, data: JsValue| {
                if !active.get() || reported.replace(true) {
                    return;
                }
                let details = js::get_object(&data, "details").unwrap_or(JsValue::UNDEFINED);
                listener(StreamEvent::ManifestParsed {
                    live: js::get_bool(&details, "live").unwrap_or(false),
                    duration: js::get_f64(&details, "totalduration"),
                });
            })
        };
        let on_error = HlsCallback::new(move |_event: JsValue, data: JsValue| {
            if !active.get() {
                return;
            }
            listener(StreamEvent::Error {
                fatal: js::get_bool(&data, "fatal").unwrap_or(false),
                kind: hls_error_kind(&data),
                details: js::get_string(&data, "details").unwrap_or_default(),
            });
        });

        hls.on("hlsLevelLoaded", on_level.as_ref().unchecked_ref());
        hls.on("hlsError", on_error.as_ref().unchecked_ref());
        hls.load_source(locator);
        hls.attach_media(&self.video);

        self.callbacks = vec![on_level, on_error];
        self.hls = Some(hls);
        Ok(subscription)
    }

    fn live_edge(&self) -> Option<f64> {
        self.hls.as_ref().and_then(|hls| hls.live_sync_position())
    }

    fn destroy(&mut self) {
        if let Some(hls) = self.hls.take() {
            hls.destroy();
        }
        self.callbacks.clear();
    }
}

type DashCallback = Closure<dyn FnMut(JsValue)>;

/// dash.js session
pub struct DashJsSession {
    video: HtmlVideoElement,
    player: Option<DashPlayer>,
    callbacks: Vec<DashCallback>,
}

impl DashJsSession {
    pub fn new(video: HtmlVideoElement) -> Self {
        Self {
            video,
            player: None,
            callbacks: Vec::new(),
        }
    }
}

impl StreamingSession for DashJsSession {
    fn open(
        &mut self,
        locator: &str,
        _sink: &mut dyn MediaSink,
        listener: StreamListener,
    ) -> Result<Subscription, BackendError> {
        let player = dash_media_player()
            .map_err(|e| BackendError::new(format!("dash.js unavailable: {}", js::describe(&e))))?
            .create();
        let (active, subscription) = gate();

        let on_initialized = {
            let active = active.clone();
            let listener = listener.clone();
            let player = player.clone();
            DashCallback::new(move |_event: JsValue| {
                if !active.get() {
                    return;
                }
                listener(StreamEvent::ManifestParsed {
                    live: player.is_dynamic(),
                    duration: Some(player.duration()),
                });
            })
        };
        let on_error = DashCallback::new(move |event: JsValue| {
            if !active.get() {
                return;
            }
            let error = js::get_object(&event, "error").unwrap_or(JsValue::UNDEFINED);
            let message = js::get_string(&error, "message").unwrap_or_else(|| "dash.js error".to_string());
            listener(StreamEvent::Error {
                fatal: true,
                kind: dash_error_kind(js::get_f64(&error, "code"), message.clone()),
                details: message,
            });
        });

        player.on("streamInitialized", on_initialized.as_ref().unchecked_ref());
        player.on("error", on_error.as_ref().unchecked_ref());
        // The engine issues play() itself once attached
        player.initialize(&self.video, locator, false);

        self.callbacks = vec![on_initialized, on_error];
        self.player = Some(player);
        Ok(subscription)
    }

    fn live_edge(&self) -> Option<f64> {
        None
    }

    fn destroy(&mut self) {
        if let Some(player) = self.player.take() {
            player.reset();
        }
        self.callbacks.clear();
    }
}

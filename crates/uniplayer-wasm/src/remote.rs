//! YouTube IFrame API and Vimeo Player SDK bridges
//!
//! Each loaded player gets its own host `<div>` inside the player container;
//! the provider script replaces it with an iframe.

use crate::js;
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;
use uniplayer_core::{BackendError, RemoteEvent, RemoteListener, RemotePlayer, RemoteState, Subscription};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Element, HtmlElement};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = YT, js_name = Player)]
    type YtPlayer;

    #[wasm_bindgen(constructor, js_namespace = YT, js_class = "Player", catch)]
    fn new(host: &Element, options: &JsValue) -> Result<YtPlayer, JsValue>;

    #[wasm_bindgen(method, js_name = playVideo)]
    fn play_video(this: &YtPlayer);

    #[wasm_bindgen(method, js_name = pauseVideo)]
    fn pause_video(this: &YtPlayer);

    #[wasm_bindgen(method, js_name = seekTo)]
    fn seek_to(this: &YtPlayer, seconds: f64, allow_seek_ahead: bool);

    #[wasm_bindgen(method, js_name = setVolume)]
    fn set_volume(this: &YtPlayer, volume: f64);

    #[wasm_bindgen(method)]
    fn mute(this: &YtPlayer);

    #[wasm_bindgen(method, js_name = unMute)]
    fn un_mute(this: &YtPlayer);

    #[wasm_bindgen(method, js_name = setPlaybackRate)]
    fn set_playback_rate(this: &YtPlayer, rate: f64);

    #[wasm_bindgen(method, js_name = getCurrentTime, catch)]
    fn get_current_time(this: &YtPlayer) -> Result<f64, JsValue>;

    #[wasm_bindgen(method, js_name = getDuration, catch)]
    fn get_duration(this: &YtPlayer) -> Result<f64, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn destroy(this: &YtPlayer) -> Result<(), JsValue>;
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = Vimeo, js_name = Player)]
    #[derive(Clone)]
    type VimeoPlayer;

    #[wasm_bindgen(constructor, js_namespace = Vimeo, js_class = "Player", catch)]
    fn new(host: &Element, options: &JsValue) -> Result<VimeoPlayer, JsValue>;

    #[wasm_bindgen(method)]
    fn on(this: &VimeoPlayer, event: &str, callback: &js_sys::Function);

    #[wasm_bindgen(method)]
    fn play(this: &VimeoPlayer) -> js_sys::Promise;

    #[wasm_bindgen(method)]
    fn pause(this: &VimeoPlayer) -> js_sys::Promise;

    #[wasm_bindgen(method, js_name = setCurrentTime)]
    fn set_current_time(this: &VimeoPlayer, seconds: f64) -> js_sys::Promise;

    #[wasm_bindgen(method, js_name = setVolume)]
    fn set_volume(this: &VimeoPlayer, volume: f64) -> js_sys::Promise;

    #[wasm_bindgen(method, js_name = setMuted)]
    fn set_muted(this: &VimeoPlayer, muted: bool) -> js_sys::Promise;

    #[wasm_bindgen(method, js_name = setPlaybackRate)]
    fn set_playback_rate(this: &VimeoPlayer, rate: f64) -> js_sys::Promise;

    #[wasm_bindgen(method, js_name = getDuration)]
    fn get_duration(this: &VimeoPlayer) -> js_sys::Promise;

    #[wasm_bindgen(method)]
    fn destroy(this: &VimeoPlayer) -> js_sys::Promise;
}

/// `playerVars` for the YouTube IFrame API
#[derive(Serialize)]
struct YouTubePlayerVars {
    autoplay: u8,
    controls: u8,
    playsinline: u8,
    rel: u8,
}

#[derive(Serialize)]
struct VimeoOptions<'a> {
    id: &'a str,
    autoplay: bool,
    controls: bool,
}

/// Host element for one provider iframe. Removed from the page on drop.
struct IframeHost(Element);

impl IframeHost {
    fn create(container: &HtmlElement) -> Result<Self, BackendError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| BackendError::new("no document"))?;
        let host = document
            .create_element("div")
            .map_err(|e| BackendError::new(js::describe(&e)))?;
        container
            .append_child(&host)
            .map_err(|e| BackendError::new(js::describe(&e)))?;
        Ok(Self(host))
    }
}

impl Drop for IframeHost {
    fn drop(&mut self) {
        self.0.remove();
    }
}

fn gate() -> (Rc<Cell<bool>>, Subscription) {
    let active = Rc::new(Cell::new(true));
    let flag = active.clone();
    (active, Subscription::new(move || flag.set(false)))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, BackendError> {
    serde_wasm_bindgen::to_value(value).map_err(|e| BackendError::new(e.to_string()))
}

type EventCallback = Closure<dyn FnMut(JsValue)>;

/// YouTube IFrame API player
pub struct YouTubePlayer {
    container: HtmlElement,
    host: Option<IframeHost>,
    player: Option<YtPlayer>,
    callbacks: Vec<EventCallback>,
}

impl YouTubePlayer {
    pub fn new(container: HtmlElement) -> Self {
        Self {
            container,
            host: None,
            player: None,
            callbacks: Vec::new(),
        }
    }

    fn with_player(&self, f: impl FnOnce(&YtPlayer)) {
        if let Some(player) = &self.player {
            f(player);
        }
    }
}

impl RemotePlayer for YouTubePlayer {
    fn load(
        &mut self,
        video_id: &str,
        autoplay: bool,
        listener: RemoteListener,
    ) -> Result<Subscription, BackendError> {
        let host = IframeHost::create(&self.container)?;
        let (active, subscription) = gate();

        let on_ready = {
            let (active, listener) = (active.clone(), listener.clone());
            EventCallback::new(move |event: JsValue| {
                if !active.get() {
                    return;
                }
                let duration = js::get_object(&event, "target")
                    .map(|target| target.unchecked_into::<YtPlayer>())
                    .and_then(|player| player.get_duration().ok())
                    .unwrap_or(0.0);
                listener(RemoteEvent::Ready { duration });
            })
        };
        let on_state = {
            let (active, listener) = (active.clone(), listener.clone());
            EventCallback::new(move |event: JsValue| {
                if !active.get() {
                    return;
                }
                let code = js::get_f64(&event, "data").map(|c| c as i32);
                if let Some(state) = code.and_then(RemoteState::from_code) {
                    listener(RemoteEvent::StateChange(state));
                }
            })
        };
        let on_error = {
            let (active, listener) = (active.clone(), listener.clone());
            EventCallback::new(move |event: JsValue| {
                if active.get() {
                    let code = js::get_f64(&event, "data").map_or(-1, |c| c as i32);
                    listener(RemoteEvent::Error { code });
                }
            })
        };
        let on_blocked = EventCallback::new(move |_event: JsValue| {
            if active.get() {
                listener(RemoteEvent::AutoplayBlocked);
            }
        });

        let events = js_sys::Object::new();
        js::set(&events, "onReady", on_ready.as_ref());
        js::set(&events, "onStateChange", on_state.as_ref());
        js::set(&events, "onError", on_error.as_ref());
        js::set(&events, "onAutoplayBlocked", on_blocked.as_ref());

        let options = js_sys::Object::new();
        js::set(&options, "videoId", &JsValue::from_str(video_id));
        js::set(
            &options,
            "playerVars",
            &to_js(&YouTubePlayerVars {
                autoplay: u8::from(autoplay),
                controls: 0,
                playsinline: 1,
                rel: 0,
            })?,
        );
        js::set(&options, "events", &events);

        let player = YtPlayer::new(&host.0, &options)
            .map_err(|e| BackendError::new(format!("YouTube IFrame API unavailable: {}", js::describe(&e))))?;

        self.callbacks = vec![on_ready, on_state, on_error, on_blocked];
        self.host = Some(host);
        self.player = Some(player);
        Ok(subscription)
    }

    fn play_video(&mut self) {
        self.with_player(|p| p.play_video());
    }

    fn pause_video(&mut self) {
        self.with_player(|p| p.pause_video());
    }

    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool) {
        self.with_player(|p| p.seek_to(seconds, allow_seek_ahead));
    }

    fn set_volume(&mut self, volume: f64) {
        self.with_player(|p| p.set_volume((volume * 100.0).round()));
    }

    fn set_muted(&mut self, muted: bool) {
        self.with_player(|p| if muted { p.mute() } else { p.un_mute() });
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.with_player(|p| p.set_playback_rate(rate));
    }

    fn current_time(&self) -> f64 {
        self.player
            .as_ref()
            .and_then(|p| p.get_current_time().ok())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> f64 {
        self.player
            .as_ref()
            .and_then(|p| p.get_duration().ok())
            .unwrap_or(0.0)
    }

    fn destroy(&mut self) {
        if let Some(player) = self.player.take() {
            if let Err(e) = player.destroy() {
                js::warn(&format!("YouTube player destroy failed: {}", js::describe(&e)));
            }
        }
        self.callbacks.clear();
        self.host = None;
    }
}

/// Vimeo error names mapped onto the provider codes the engine understands
fn vimeo_error_code(name: &str) -> i32 {
    match name {
        "NotFoundError" => 100,
        "PrivacyError" | "PasswordError" => 101,
        "UnsupportedError" => 2,
        _ => -1,
    }
}

/// Settle a Vimeo SDK promise, logging rejections
fn settle(promise: js_sys::Promise, operation: &'static str) {
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(e) = JsFuture::from(promise).await {
            js::warn(&format!("Vimeo {} failed: {}", operation, js::describe(&e)));
        }
    });
}

/// Vimeo Player SDK player. Time and duration arrive through events, so
/// they are cached for the synchronous getters.
pub struct VimeoRemote {
    container: HtmlElement,
    host: Option<IframeHost>,
    player: Option<VimeoPlayer>,
    callbacks: Vec<EventCallback>,
    time: Rc<Cell<f64>>,
    duration: Rc<Cell<f64>>,
    listener: Option<(Rc<Cell<bool>>, RemoteListener)>,
}

impl VimeoRemote {
    pub fn new(container: HtmlElement) -> Self {
        Self {
            container,
            host: None,
            player: None,
            callbacks: Vec::new(),
            time: Rc::new(Cell::new(0.0)),
            duration: Rc::new(Cell::new(0.0)),
            listener: None,
        }
    }

    fn forward(&mut self, event: &'static str, map: impl Fn(&JsValue) -> Option<RemoteEvent> + 'static) {
        let (Some(player), Some((active, listener))) = (&self.player, &self.listener) else {
            return;
        };
        let (active, listener) = (active.clone(), listener.clone());
        let callback = EventCallback::new(move |data: JsValue| {
            if !active.get() {
                return;
            }
            if let Some(event) = map(&data) {
                listener(event);
            }
        });
        player.on(event, callback.as_ref().unchecked_ref());
        self.callbacks.push(callback);
    }
}

impl RemotePlayer for VimeoRemote {
    fn load(
        &mut self,
        video_id: &str,
        autoplay: bool,
        listener: RemoteListener,
    ) -> Result<Subscription, BackendError> {
        let host = IframeHost::create(&self.container)?;
        let options = to_js(&VimeoOptions {
            id: video_id,
            autoplay,
            controls: false,
        })?;
        let player = VimeoPlayer::new(&host.0, &options)
            .map_err(|e| BackendError::new(format!("Vimeo Player SDK unavailable: {}", js::describe(&e))))?;
        let (active, subscription) = gate();

        self.host = Some(host);
        self.player = Some(player);
        self.listener = Some((active, listener));

        let duration = self.duration.clone();
        let loaded = self.player.clone();
        let ready = self.listener.clone();
        self.forward("loaded", move |_| {
            let (player, (active, listener)) = (loaded.clone()?, ready.clone()?);
            let duration = duration.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let value = JsFuture::from(player.get_duration()).await.ok().and_then(|v| v.as_f64());
                let value = value.unwrap_or(0.0);
                duration.set(value);
                if active.get() {
                    listener(RemoteEvent::Ready { duration: value });
                }
            });
            None
        });

        let time = self.time.clone();
        self.forward("timeupdate", move |data| {
            if let Some(seconds) = js::get_f64(data, "seconds") {
                time.set(seconds);
            }
            None
        });
        self.forward("play", |_| Some(RemoteEvent::StateChange(RemoteState::Playing)));
        self.forward("pause", |_| Some(RemoteEvent::StateChange(RemoteState::Paused)));
        self.forward("ended", |_| Some(RemoteEvent::StateChange(RemoteState::Ended)));
        self.forward("bufferstart", |_| Some(RemoteEvent::StateChange(RemoteState::Buffering)));
        self.forward("error", |data| {
            let name = js::get_string(data, "name").unwrap_or_default();
            js::error(&format!("Vimeo player error: {}", name));
            Some(RemoteEvent::Error {
                code: vimeo_error_code(&name),
            })
        });

        Ok(subscription)
    }

    fn play_video(&mut self) {
        let (Some(player), Some((active, listener))) = (&self.player, &self.listener) else {
            return;
        };
        let promise = player.play();
        let (active, listener) = (active.clone(), listener.clone());
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                if js::get_string(&e, "name").as_deref() == Some("NotAllowedError") && active.get() {
                    listener(RemoteEvent::AutoplayBlocked);
                } else {
                    js::warn(&format!("Vimeo play failed: {}", js::describe(&e)));
                }
            }
        });
    }

    fn pause_video(&mut self) {
        if let Some(player) = &self.player {
            settle(player.pause(), "pause");
        }
    }

    fn seek_to(&mut self, seconds: f64, _allow_seek_ahead: bool) {
        if let Some(player) = &self.player {
            self.time.set(seconds);
            settle(player.set_current_time(seconds), "seek");
        }
    }

    fn set_volume(&mut self, volume: f64) {
        if let Some(player) = &self.player {
            settle(player.set_volume(volume), "setVolume");
        }
    }

    fn set_muted(&mut self, muted: bool) {
        if let Some(player) = &self.player {
            settle(player.set_muted(muted), "setMuted");
        }
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if let Some(player) = &self.player {
            settle(player.set_playback_rate(rate), "setPlaybackRate");
        }
    }

    fn current_time(&self) -> f64 {
        self.time.get()
    }

    fn duration(&self) -> f64 {
        self.duration.get()
    }

    fn destroy(&mut self) {
        if let Some(player) = self.player.take() {
            settle(player.destroy(), "destroy");
        }
        self.listener = None;
        self.callbacks.clear();
        self.host = None;
    }
}

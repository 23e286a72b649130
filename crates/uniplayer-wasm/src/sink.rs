//! `<video>` element sink
//!
//! DOM listeners are installed once per element and fan out to the listeners
//! registered through `MediaSink::listen`, so replacing an engine only touches
//! the Rust-side registry.

use crate::js;
use std::cell::RefCell;
use std::rc::Rc;
use uniplayer_core::{BackendError, MediaErrorCode, MediaEvent, MediaListener, MediaSink, Subscription};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Event, HtmlElement, HtmlVideoElement};

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, MediaListener)>,
}

#[derive(Clone, Default)]
struct Listeners(Rc<RefCell<Registry>>);

impl Listeners {
    fn add(&self, listener: MediaListener) -> u64 {
        let mut registry = self.0.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, listener));
        id
    }

    fn remove(&self, id: u64) {
        self.0.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
    }

    fn dispatch(&self, event: MediaEvent) {
        self.dispatch_matching(event, |_| true);
    }

    /// Ids of the listeners registered right now
    fn snapshot(&self) -> Vec<u64> {
        self.0.borrow().listeners.iter().map(|(id, _)| *id).collect()
    }

    /// Dispatch only to listeners in `ids` that are still registered
    fn dispatch_to(&self, ids: &[u64], event: MediaEvent) {
        self.dispatch_matching(event, |id| ids.contains(&id));
    }

    fn dispatch_matching(&self, event: MediaEvent, keep: impl Fn(u64) -> bool) {
        // Listeners may subscribe or unsubscribe while handling the event
        let targets: Vec<MediaListener> = self
            .0
            .borrow()
            .listeners
            .iter()
            .filter(|(id, _)| keep(*id))
            .map(|(_, l)| l.clone())
            .collect();
        for listener in targets {
            listener(event.clone());
        }
    }
}

type DomCallback = Closure<dyn FnMut(Event)>;

/// Media sink backed by an `HTMLVideoElement`
pub struct WebMediaSink {
    video: HtmlVideoElement,
    container: HtmlElement,
    listeners: Listeners,
    dom: Vec<(&'static str, DomCallback)>,
}

impl WebMediaSink {
    pub fn new(video: HtmlVideoElement, container: HtmlElement) -> Self {
        let mut sink = Self {
            video,
            container,
            listeners: Listeners::default(),
            dom: Vec::new(),
        };
        sink.install("loadedmetadata", |video| {
            Some(MediaEvent::LoadedMetadata {
                duration: video.duration(),
            })
        });
        sink.install("timeupdate", |video| Some(MediaEvent::TimeUpdate(video.current_time())));
        sink.install("playing", |_| Some(MediaEvent::Play));
        sink.install("pause", |_| Some(MediaEvent::Pause));
        sink.install("ended", |_| Some(MediaEvent::Ended));
        sink.install("error", |video| {
            let code = video.error().map(|e| e.code())?;
            MediaErrorCode::from_code(code).map(MediaEvent::Error)
        });
        sink
    }

    fn install(&mut self, name: &'static str, map: fn(&HtmlVideoElement) -> Option<MediaEvent>) {
        let video = self.video.clone();
        let listeners = self.listeners.clone();
        let callback = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            if let Some(event) = map(&video) {
                listeners.dispatch(event);
            }
        });
        if let Err(e) = self
            .video
            .add_event_listener_with_callback(name, callback.as_ref().unchecked_ref())
        {
            js::warn(&format!("Failed to listen for {}: {}", name, js::describe(&e)));
            return;
        }
        self.dom.push((name, callback));
    }
}

impl MediaSink for WebMediaSink {
    fn set_source(&mut self, locator: &str) -> Result<(), BackendError> {
        self.video.set_src(locator);
        Ok(())
    }

    fn clear_source(&mut self) {
        if let Err(e) = self.video.remove_attribute("src") {
            js::warn(&format!("Failed to clear source: {}", js::describe(&e)));
        }
        // Aborts the pending fetch and resets the element
        self.video.load();
    }

    fn listen(&mut self, listener: MediaListener) -> Subscription {
        let id = self.listeners.add(listener);
        let listeners = self.listeners.clone();
        Subscription::new(move || listeners.remove(id))
    }

    fn play(&mut self) {
        // The promise can settle after the source changed; only listeners
        // bound when play() was called hear about it
        let listeners = self.listeners.clone();
        let requested_by = listeners.snapshot();
        match self.video.play() {
            Ok(promise) => wasm_bindgen_futures::spawn_local(async move {
                let Err(e) = JsFuture::from(promise).await else {
                    return;
                };
                // A newer load or pause() interrupted the request
                if js::get_string(&e, "name").as_deref() == Some("AbortError") {
                    return;
                }
                listeners.dispatch_to(
                    &requested_by,
                    MediaEvent::PlayRejected {
                        reason: js::describe(&e),
                    },
                );
            }),
            Err(e) => listeners.dispatch_to(
                &requested_by,
                MediaEvent::PlayRejected {
                    reason: js::describe(&e),
                },
            ),
        }
    }

    fn pause(&mut self) {
        if let Err(e) = self.video.pause() {
            js::warn(&format!("pause() failed: {}", js::describe(&e)));
        }
    }

    fn seek(&mut self, position: f64) {
        self.video.set_current_time(position);
    }

    fn set_volume(&mut self, volume: f64) {
        self.video.set_volume(volume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.video.set_muted(muted);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.video.set_playback_rate(rate);
    }

    fn set_preserves_pitch(&mut self, preserve: bool) {
        js::set(&self.video, "preservesPitch", &JsValue::from_bool(preserve));
    }

    fn current_time(&self) -> f64 {
        self.video.current_time()
    }

    fn seekable_end(&self) -> Option<f64> {
        let ranges = self.video.seekable();
        let count = ranges.length();
        if count == 0 {
            return None;
        }
        ranges.end(count - 1).ok()
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), BackendError> {
        if fullscreen {
            return self
                .container
                .request_fullscreen()
                .map_err(|e| BackendError::new(js::describe(&e)));
        }
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| BackendError::new("no document"))?;
        document.exit_fullscreen();
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        web_sys::window()
            .and_then(|w| w.document())
            .is_some_and(|d| d.fullscreen_element().is_some())
    }
}

impl Drop for WebMediaSink {
    fn drop(&mut self) {
        for (name, callback) in self.dom.drain(..) {
            let _ = self
                .video
                .remove_event_listener_with_callback(name, callback.as_ref().unchecked_ref());
        }
    }
}

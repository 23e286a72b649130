//! Playback sink and listener subscriptions
//!
//! The sink is the media surface (a `<video>` element in browsers). The
//! controller owns it and lends it to the active engine on every call.

use crate::BackendError;
use std::rc::Rc;

/// Events raised by the media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Metadata loaded; `duration` may be infinite for unbounded streams
    LoadedMetadata { duration: f64 },
    TimeUpdate(f64),
    Play,
    Pause,
    Ended,
    /// `play()` was rejected, usually by the autoplay policy
    PlayRejected { reason: String },
    Error(MediaErrorCode),
}

/// `MediaError.code` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
}

impl MediaErrorCode {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(MediaErrorCode::Aborted),
            2 => Some(MediaErrorCode::Network),
            3 => Some(MediaErrorCode::Decode),
            4 => Some(MediaErrorCode::SrcNotSupported),
            _ => None,
        }
    }
}

/// Callback receiving media events
pub type MediaListener = Rc<dyn Fn(MediaEvent)>;

/// Registration guard. Dropping it removes the listener.
#[must_use = "dropping a subscription unregisters the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Unregister now
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// The media output surface
pub trait MediaSink {
    /// Assign a locator for the element to play natively
    fn set_source(&mut self, locator: &str) -> Result<(), BackendError>;
    /// Drop the current source and stop loading
    fn clear_source(&mut self);
    /// Register a listener for media events
    fn listen(&mut self, listener: MediaListener) -> Subscription;

    /// Request playback. Rejections arrive as `MediaEvent::PlayRejected`.
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    fn set_playback_rate(&mut self, rate: f64);
    fn set_preserves_pitch(&mut self, preserve: bool);

    fn current_time(&self) -> f64;
    /// End of the seekable range, if the element exposes one
    fn seekable_end(&self) -> Option<f64>;

    /// Enter or leave fullscreen for the player container
    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), BackendError>;

    /// Whether the player container is fullscreen right now
    fn is_fullscreen(&self) -> bool;
}

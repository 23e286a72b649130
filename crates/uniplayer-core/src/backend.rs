//! Host backends wrapped by the engine adapters
//!
//! Browsers provide these through hls.js, dash.js and iframe player APIs;
//! `crate::headless` provides in-process versions.

use crate::{BackendError, EmbedProvider, FatalErrorKind, MediaSink, Subscription};
use std::rc::Rc;

/// Events raised by a streaming session (hls.js / dash.js)
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Manifest loaded. `live` is true for manifests without a fixed end
    /// (DASH `type="dynamic"`).
    ManifestParsed { live: bool, duration: Option<f64> },
    /// Session error; non-fatal errors are recovered by the library itself
    Error { fatal: bool, kind: FatalErrorKind, details: String },
}

pub type StreamListener = Rc<dyn Fn(StreamEvent)>;

/// Manifest-driven streaming library bound to the sink
pub trait StreamingSession {
    /// Load the manifest and attach to the sink's media element
    fn open(
        &mut self,
        locator: &str,
        sink: &mut dyn MediaSink,
        listener: StreamListener,
    ) -> Result<Subscription, BackendError>;

    /// Most recent playable position for live manifests
    fn live_edge(&self) -> Option<f64>;

    /// Stop fetching and release the media element
    fn destroy(&mut self);
}

/// Iframe player states (YouTube numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl RemoteState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(RemoteState::Unstarted),
            0 => Some(RemoteState::Ended),
            1 => Some(RemoteState::Playing),
            2 => Some(RemoteState::Paused),
            3 => Some(RemoteState::Buffering),
            5 => Some(RemoteState::Cued),
            _ => None,
        }
    }
}

/// Events raised by an iframe player
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// Player ready and metadata loaded; 0 when the duration is unknown
    Ready { duration: f64 },
    StateChange(RemoteState),
    /// Provider error code
    Error { code: i32 },
    /// The provider refused to start playback without a user gesture
    AutoplayBlocked,
}

pub type RemoteListener = Rc<dyn Fn(RemoteEvent)>;

/// Remote-control API of an embedded third-party player
pub trait RemotePlayer {
    /// Create the iframe and cue `video_id`
    fn load(
        &mut self,
        video_id: &str,
        autoplay: bool,
        listener: RemoteListener,
    ) -> Result<Subscription, BackendError>;

    fn play_video(&mut self);
    fn pause_video(&mut self);
    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool);
    /// Volume in [0, 1]
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    fn set_playback_rate(&mut self, rate: f64);

    fn current_time(&self) -> f64;
    /// 0 while unknown, and for most live broadcasts
    fn duration(&self) -> f64;

    /// Remove the iframe
    fn destroy(&mut self);
}

/// Builds backend instances for the engine adapters
pub trait BackendFactory {
    /// Whether a segment-fetching HLS library can run here. When false, HLS
    /// manifests are handed to the sink directly.
    fn supports_hls(&self) -> bool;
    fn hls_session(&mut self) -> Result<Box<dyn StreamingSession>, BackendError>;
    fn dash_session(&mut self) -> Result<Box<dyn StreamingSession>, BackendError>;
    fn remote_player(
        &mut self,
        provider: EmbedProvider,
    ) -> Result<Box<dyn RemotePlayer>, BackendError>;
}

//! Uniplayer Core - Backend-agnostic video player core
//!
//! This crate provides the core functionality behind the player widget:
//! - Source classification (progressive, HLS, DASH, embedded players)
//! - Engine adapters over the media element, streaming libraries and
//!   iframe player APIs
//! - Playback controller with generation-tagged event handling
//! - State reconciliation into a single observable snapshot
//! - Headless backends for simulation and testing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Uniplayer Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐        ┌──────────────────────────────┐       │
//! │  │    Source    │───────▶│      Playback Controller     │       │
//! │  │  Classifier  │        └──────┬─────────────────┬─────┘       │
//! │  └──────────────┘               │ attach/control  │ fold        │
//! │                                 ▼                 ▼             │
//! │  ┌────────┐ ┌──────┐ ┌──────┐ ┌────────┐  ┌──────────────┐      │
//! │  │ Native │ │ HLS  │ │ DASH │ │ Remote │  │   Playback   │      │
//! │  │ Engine │ │Engine│ │Engine│ │ Engine │  │    State     │      │
//! │  └───┬────┘ └──┬───┘ └──┬───┘ └───┬────┘  └──────┬───────┘      │
//! │      │ events (generation-tagged) │              │ watch        │
//! │      └─────────┴────────┴─────────┘              ▼              │
//! │  ┌──────────────┐  ┌──────────────┐       ┌──────────────┐      │
//! │  │ Media Sink   │  │   Backend    │       │ Subscribers  │      │
//! │  │ (<video>)    │  │   Factory    │       │              │      │
//! │  └──────────────┘  └──────────────┘       └──────────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod source;
pub mod sink;
pub mod backend;
pub mod events;
pub mod engine;
pub mod reconcile;
pub mod controller;
pub mod headless;

pub use error::{BackendError, Error, Result};
pub use types::*;
pub use source::{classify, detect_stream_kind};
pub use sink::{MediaErrorCode, MediaEvent, MediaListener, MediaSink, Subscription};
pub use backend::{
    BackendFactory, RemoteEvent, RemoteListener, RemotePlayer, RemoteState, StreamEvent,
    StreamListener, StreamingSession,
};
pub use events::{EngineEvent, Envelope, EventEmitter, Generation, Waker};
pub use engine::{remote_error_kind, Engine, PlaybackEngine};
pub use reconcile::{fold, ControlChange, Update};
pub use controller::PlaybackController;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Uniplayer Core initialized");
}

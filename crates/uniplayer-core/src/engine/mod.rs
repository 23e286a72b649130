//! Engine adapters
//!
//! Each adapter wraps one playback backend behind [`PlaybackEngine`]:
//! - [`NativeEngine`]: progressive files assigned to the media element
//! - [`HlsEngine`]: segment-fetching HLS library (or native HLS)
//! - [`DashEngine`]: manifest-driven DASH library
//! - [`RemoteEngine`]: third-party iframe player
//!
//! [`Engine`] is the tagged union the controller owns.

mod dash;
mod hls;
mod native;
mod remote;
mod streaming;

pub use dash::DashEngine;
pub use hls::HlsEngine;
pub use native::NativeEngine;
pub use remote::{remote_error_kind, RemoteEngine};

use crate::{
    BackendFactory, EngineEvent, EventEmitter, FatalErrorKind, Generation, MediaErrorCode,
    MediaEvent, MediaListener, MediaSink, Result, SourceDescriptor, SourceKind,
};
use std::rc::Rc;
use tracing::{debug, trace};

/// Capability interface shared by all backends.
///
/// Control calls never fail: anything the backend cannot do in its current
/// state is logged and ignored. Seek and rate changes are no-ops while the
/// engine reports a live source.
pub trait PlaybackEngine {
    fn kind(&self) -> SourceKind;

    /// Generation this engine was built for
    fn generation(&self) -> Generation;

    fn is_attached(&self) -> bool;

    /// Whether the backend currently reports a live source
    fn is_live(&self) -> bool;

    /// Bind to the sink and start loading. Issues `play()` afterwards when
    /// `autoplay` is set.
    fn attach(&mut self, sink: &mut dyn MediaSink, autoplay: bool) -> Result<()>;

    /// Release every backend resource. Safe to call repeatedly, or before
    /// `attach`.
    fn detach(&mut self, sink: &mut dyn MediaSink);

    fn play(&mut self, sink: &mut dyn MediaSink);
    /// Returns whether the call reached the backend
    fn pause(&mut self, sink: &mut dyn MediaSink) -> bool;
    /// Returns whether the call reached the backend
    fn seek(&mut self, sink: &mut dyn MediaSink, position: f64) -> bool;
    fn seek_to_live_edge(&mut self, sink: &mut dyn MediaSink);
    fn set_volume(&mut self, sink: &mut dyn MediaSink, volume: f64);
    fn set_muted(&mut self, sink: &mut dyn MediaSink, muted: bool);
    fn set_rate(&mut self, sink: &mut dyn MediaSink, rate: f64);
    fn set_pitch_preserved(&mut self, sink: &mut dyn MediaSink, preserve: bool);

    /// Pull state from backends that do not push it
    fn poll(&mut self, _sink: &mut dyn MediaSink) {}
}

/// The active engine, one variant per backend
pub enum Engine {
    Native(NativeEngine),
    Hls(HlsEngine),
    Dash(DashEngine),
    Remote(RemoteEngine),
}

impl Engine {
    /// Construct the adapter matching `descriptor.kind`. Backend instances are
    /// requested from `backends`; a refusal is an attach failure.
    pub fn build(
        descriptor: &SourceDescriptor,
        emitter: EventEmitter,
        backends: &mut dyn BackendFactory,
    ) -> Result<Self> {
        let engine = match descriptor.kind {
            SourceKind::Progressive => {
                Engine::Native(NativeEngine::new(descriptor.locator.clone(), emitter))
            }
            SourceKind::Hls => Engine::Hls(HlsEngine::new(
                descriptor.locator.clone(),
                emitter,
                backends,
            )?),
            SourceKind::Dash => Engine::Dash(DashEngine::new(
                descriptor.locator.clone(),
                emitter,
                backends,
            )?),
            SourceKind::RemoteEmbed => {
                let target = descriptor.remote.clone().ok_or_else(|| {
                    crate::Error::attach(SourceKind::RemoteEmbed, "descriptor has no embed target")
                })?;
                Engine::Remote(RemoteEngine::new(target, emitter, backends)?)
            }
        };
        debug!(kind = %engine.kind(), generation = %engine.generation(), "Engine constructed");
        Ok(engine)
    }

    fn inner(&self) -> &dyn PlaybackEngine {
        match self {
            Engine::Native(e) => e,
            Engine::Hls(e) => e,
            Engine::Dash(e) => e,
            Engine::Remote(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PlaybackEngine {
        match self {
            Engine::Native(e) => e,
            Engine::Hls(e) => e,
            Engine::Dash(e) => e,
            Engine::Remote(e) => e,
        }
    }
}

impl PlaybackEngine for Engine {
    fn kind(&self) -> SourceKind {
        self.inner().kind()
    }

    fn generation(&self) -> Generation {
        self.inner().generation()
    }

    fn is_attached(&self) -> bool {
        self.inner().is_attached()
    }

    fn is_live(&self) -> bool {
        self.inner().is_live()
    }

    fn attach(&mut self, sink: &mut dyn MediaSink, autoplay: bool) -> Result<()> {
        self.inner_mut().attach(sink, autoplay)
    }

    fn detach(&mut self, sink: &mut dyn MediaSink) {
        self.inner_mut().detach(sink)
    }

    fn play(&mut self, sink: &mut dyn MediaSink) {
        self.inner_mut().play(sink)
    }

    fn pause(&mut self, sink: &mut dyn MediaSink) -> bool {
        self.inner_mut().pause(sink)
    }

    fn seek(&mut self, sink: &mut dyn MediaSink, position: f64) -> bool {
        self.inner_mut().seek(sink, position)
    }

    fn seek_to_live_edge(&mut self, sink: &mut dyn MediaSink) {
        self.inner_mut().seek_to_live_edge(sink)
    }

    fn set_volume(&mut self, sink: &mut dyn MediaSink, volume: f64) {
        self.inner_mut().set_volume(sink, volume)
    }

    fn set_muted(&mut self, sink: &mut dyn MediaSink, muted: bool) {
        self.inner_mut().set_muted(sink, muted)
    }

    fn set_rate(&mut self, sink: &mut dyn MediaSink, rate: f64) {
        self.inner_mut().set_rate(sink, rate)
    }

    fn set_pitch_preserved(&mut self, sink: &mut dyn MediaSink, preserve: bool) {
        self.inner_mut().set_pitch_preserved(sink, preserve)
    }

    fn poll(&mut self, sink: &mut dyn MediaSink) {
        self.inner_mut().poll(sink)
    }
}

/// How an adapter treats durations reported by the media element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DurationPolicy {
    /// Forward durations; infinite ones are reported as unknown (0)
    Report,
    /// Never forward durations (always-live sources)
    Suppress,
}

/// Translate media element events into engine events
pub(crate) fn media_listener(emitter: EventEmitter, policy: DurationPolicy) -> MediaListener {
    Rc::new(move |event| match event {
        MediaEvent::LoadedMetadata { duration } => {
            if policy == DurationPolicy::Report {
                let duration = if duration.is_finite() && duration > 0.0 { duration } else { 0.0 };
                emitter.emit(EngineEvent::DurationKnown(duration));
            }
        }
        MediaEvent::TimeUpdate(t) => emitter.emit(EngineEvent::TimeUpdate(t)),
        MediaEvent::Play => emitter.emit(EngineEvent::PlayStateChanged(true)),
        MediaEvent::Pause => emitter.emit(EngineEvent::PlayStateChanged(false)),
        MediaEvent::Ended => emitter.emit(EngineEvent::Ended),
        MediaEvent::PlayRejected { reason } => emitter.emit(EngineEvent::PlayRejected(reason)),
        MediaEvent::Error(code) => match code {
            MediaErrorCode::Aborted => {
                trace!(generation = %emitter.generation(), "Media load aborted");
            }
            MediaErrorCode::Network => emitter.emit(EngineEvent::FatalError(FatalErrorKind::Network)),
            MediaErrorCode::Decode => emitter.emit(EngineEvent::FatalError(FatalErrorKind::Decode)),
            MediaErrorCode::SrcNotSupported => {
                emitter.emit(EngineEvent::FatalError(FatalErrorKind::SourceNotSupported))
            }
        },
    })
}

/// Log a control call the engine cannot honor
pub(crate) fn ignored(kind: SourceKind, operation: &str, reason: &str) {
    debug!(kind = %kind, operation, reason, "Engine ignored control call");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{channel, Envelope};

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Envelope>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    #[test]
    fn test_media_listener_translation() {
        let (tx, mut rx) = channel();
        let listener = media_listener(EventEmitter::new(Generation(1), tx, None), DurationPolicy::Report);

        listener(MediaEvent::LoadedMetadata { duration: 12.5 });
        listener(MediaEvent::LoadedMetadata { duration: f64::INFINITY });
        listener(MediaEvent::Play);
        listener(MediaEvent::TimeUpdate(3.0));
        listener(MediaEvent::Error(MediaErrorCode::Aborted));
        listener(MediaEvent::Error(MediaErrorCode::Decode));

        assert_eq!(
            drain(&mut rx),
            vec![
                EngineEvent::DurationKnown(12.5),
                EngineEvent::DurationKnown(0.0),
                EngineEvent::PlayStateChanged(true),
                EngineEvent::TimeUpdate(3.0),
                EngineEvent::FatalError(FatalErrorKind::Decode),
            ]
        );
    }

    #[test]
    fn test_suppressed_durations() {
        let (tx, mut rx) = channel();
        let listener = media_listener(EventEmitter::new(Generation(1), tx, None), DurationPolicy::Suppress);
        listener(MediaEvent::LoadedMetadata { duration: 30.0 });
        listener(MediaEvent::Pause);
        assert_eq!(drain(&mut rx), vec![EngineEvent::PlayStateChanged(false)]);
    }
}

//! Shared adapter for manifest-driven streaming libraries

use super::{ignored, media_listener, DurationPolicy};
use crate::{
    EngineEvent, Error, EventEmitter, Generation, MediaSink, Result, SourceKind, StreamEvent,
    StreamListener, StreamingSession, Subscription,
};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, error};

/// Where an adapter's liveness comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LivePolicy {
    /// Live from the moment it attaches
    Always,
    /// Live when the manifest says so
    Reported,
}

/// Streaming session (or native manifest playback) bound to the sink
pub(crate) struct StreamEngine {
    kind: SourceKind,
    locator: String,
    emitter: EventEmitter,
    /// `None` plays the manifest through the sink directly
    session: Option<Box<dyn StreamingSession>>,
    policy: LivePolicy,
    live: Rc<Cell<bool>>,
    media: Option<Subscription>,
    stream: Option<Subscription>,
}

impl StreamEngine {
    pub(crate) fn new(
        kind: SourceKind,
        locator: String,
        emitter: EventEmitter,
        session: Option<Box<dyn StreamingSession>>,
        policy: LivePolicy,
    ) -> Self {
        Self {
            kind,
            locator,
            emitter,
            session,
            policy,
            live: Rc::new(Cell::new(false)),
            media: None,
            stream: None,
        }
    }

    pub(crate) fn is_native(&self) -> bool {
        self.session.is_none()
    }

    fn attached_or_log(&self, operation: &str) -> bool {
        if self.media.is_none() {
            ignored(self.kind, operation, "not attached");
            return false;
        }
        true
    }

    fn live_or_log(&self, operation: &str) -> bool {
        if self.live.get() {
            ignored(self.kind, operation, "source is live");
            return true;
        }
        false
    }

    fn stream_listener(&self) -> StreamListener {
        let emitter = self.emitter.clone();
        let live = self.live.clone();
        let policy = self.policy;
        let kind = self.kind;

        Rc::new(move |event| match event {
            StreamEvent::ManifestParsed { live: dynamic, duration } => {
                if policy == LivePolicy::Always {
                    debug!(kind = %kind, "Manifest parsed");
                    return;
                }
                live.set(dynamic);
                emitter.emit(EngineEvent::LiveDetected(dynamic));
                if let Some(duration) = duration.filter(|d| !dynamic && d.is_finite() && *d > 0.0) {
                    emitter.emit(EngineEvent::DurationKnown(duration));
                }
            }
            StreamEvent::Error { fatal: true, kind: error_kind, details } => {
                error!(kind = %kind, error = %error_kind, details, "Fatal streaming error");
                emitter.emit(EngineEvent::FatalError(error_kind));
            }
            StreamEvent::Error { fatal: false, details, .. } => {
                debug!(kind = %kind, details, "Recoverable streaming error");
            }
        })
    }

    pub(crate) fn kind(&self) -> SourceKind {
        self.kind
    }

    pub(crate) fn generation(&self) -> Generation {
        self.emitter.generation()
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.media.is_some()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.get()
    }

    pub(crate) fn attach(&mut self, sink: &mut dyn MediaSink, autoplay: bool) -> Result<()> {
        if self.media.is_some() {
            return Ok(());
        }

        let duration_policy = match self.policy {
            LivePolicy::Always => DurationPolicy::Suppress,
            LivePolicy::Reported => DurationPolicy::Report,
        };
        let media = sink.listen(media_listener(self.emitter.clone(), duration_policy));
        let listener = self.stream_listener();

        match self.session.as_mut() {
            Some(session) => {
                let stream = session
                    .open(&self.locator, sink, listener)
                    .map_err(|e| Error::attach(self.kind, e.to_string()))?;
                self.stream = Some(stream);
            }
            None => {
                sink.set_source(&self.locator)
                    .map_err(|e| Error::attach(self.kind, e.to_string()))?;
            }
        }
        self.media = Some(media);

        if self.policy == LivePolicy::Always {
            self.live.set(true);
            self.emitter.emit(EngineEvent::LiveDetected(true));
        }

        debug!(
            kind = %self.kind,
            locator = %self.locator,
            native = self.is_native(),
            generation = %self.generation(),
            "Stream attached"
        );

        if autoplay {
            sink.play();
        }
        Ok(())
    }

    pub(crate) fn detach(&mut self, sink: &mut dyn MediaSink) {
        let was_bound = self.media.is_some() || self.stream.is_some();
        self.media.take();
        self.stream.take();

        if let Some(mut session) = self.session.take() {
            session.destroy();
        }
        if was_bound {
            sink.clear_source();
            debug!(kind = %self.kind, generation = %self.generation(), "Stream detached");
        }
    }

    pub(crate) fn play(&mut self, sink: &mut dyn MediaSink) {
        if self.attached_or_log("play") {
            sink.play();
        }
    }

    pub(crate) fn pause(&mut self, sink: &mut dyn MediaSink) -> bool {
        if !self.attached_or_log("pause") {
            return false;
        }
        sink.pause();
        true
    }

    pub(crate) fn seek(&mut self, sink: &mut dyn MediaSink, position: f64) -> bool {
        if !self.attached_or_log("seek") || self.live_or_log("seek") {
            return false;
        }
        sink.seek(position);
        true
    }

    pub(crate) fn seek_to_live_edge(&mut self, sink: &mut dyn MediaSink) {
        if !self.attached_or_log("seek_to_live_edge") {
            return;
        }
        if !self.live.get() {
            ignored(self.kind, "seek_to_live_edge", "source is not live");
            return;
        }
        let edge = self
            .session
            .as_ref()
            .and_then(|s| s.live_edge())
            .or_else(|| sink.seekable_end());
        match edge {
            Some(edge) => sink.seek(edge),
            None => ignored(self.kind, "seek_to_live_edge", "live edge unknown"),
        }
    }

    pub(crate) fn set_volume(&mut self, sink: &mut dyn MediaSink, volume: f64) {
        if self.attached_or_log("set_volume") {
            sink.set_volume(volume);
        }
    }

    pub(crate) fn set_muted(&mut self, sink: &mut dyn MediaSink, muted: bool) {
        if self.attached_or_log("set_muted") {
            sink.set_muted(muted);
        }
    }

    pub(crate) fn set_rate(&mut self, sink: &mut dyn MediaSink, rate: f64) {
        if self.attached_or_log("set_rate") && !self.live_or_log("set_rate") {
            sink.set_playback_rate(rate);
        }
    }

    pub(crate) fn set_pitch_preserved(&mut self, sink: &mut dyn MediaSink, preserve: bool) {
        if self.attached_or_log("set_pitch_preserved") {
            sink.set_preserves_pitch(preserve);
        }
    }
}

/// Implement `PlaybackEngine` for a wrapper holding a `StreamEngine` in
/// `self.stream`
macro_rules! delegate_to_stream {
    ($engine:ty) => {
        impl $crate::engine::PlaybackEngine for $engine {
            fn kind(&self) -> $crate::SourceKind {
                self.stream.kind()
            }

            fn generation(&self) -> $crate::Generation {
                self.stream.generation()
            }

            fn is_attached(&self) -> bool {
                self.stream.is_attached()
            }

            fn is_live(&self) -> bool {
                self.stream.is_live()
            }

            fn attach(&mut self, sink: &mut dyn $crate::MediaSink, autoplay: bool) -> $crate::Result<()> {
                self.stream.attach(sink, autoplay)
            }

            fn detach(&mut self, sink: &mut dyn $crate::MediaSink) {
                self.stream.detach(sink)
            }

            fn play(&mut self, sink: &mut dyn $crate::MediaSink) {
                self.stream.play(sink)
            }

            fn pause(&mut self, sink: &mut dyn $crate::MediaSink) -> bool {
                self.stream.pause(sink)
            }

            fn seek(&mut self, sink: &mut dyn $crate::MediaSink, position: f64) -> bool {
                self.stream.seek(sink, position)
            }

            fn seek_to_live_edge(&mut self, sink: &mut dyn $crate::MediaSink) {
                self.stream.seek_to_live_edge(sink)
            }

            fn set_volume(&mut self, sink: &mut dyn $crate::MediaSink, volume: f64) {
                self.stream.set_volume(sink, volume)
            }

            fn set_muted(&mut self, sink: &mut dyn $crate::MediaSink, muted: bool) {
                self.stream.set_muted(sink, muted)
            }

            fn set_rate(&mut self, sink: &mut dyn $crate::MediaSink, rate: f64) {
                self.stream.set_rate(sink, rate)
            }

            fn set_pitch_preserved(&mut self, sink: &mut dyn $crate::MediaSink, preserve: bool) {
                self.stream.set_pitch_preserved(sink, preserve)
            }
        }
    };
}

pub(crate) use delegate_to_stream;

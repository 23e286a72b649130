//! Native engine - progressive files played by the media element

use super::{ignored, media_listener, DurationPolicy, PlaybackEngine};
use crate::{Error, EventEmitter, Generation, MediaSink, Result, SourceKind, Subscription};
use tracing::debug;

/// Assigns the locator straight to the sink. Never live.
pub struct NativeEngine {
    locator: String,
    emitter: EventEmitter,
    subscription: Option<Subscription>,
}

impl NativeEngine {
    pub fn new(locator: String, emitter: EventEmitter) -> Self {
        Self {
            locator,
            emitter,
            subscription: None,
        }
    }

    fn attached_or_log(&self, operation: &str) -> bool {
        if self.subscription.is_none() {
            ignored(SourceKind::Progressive, operation, "not attached");
            return false;
        }
        true
    }
}

impl PlaybackEngine for NativeEngine {
    fn kind(&self) -> SourceKind {
        SourceKind::Progressive
    }

    fn generation(&self) -> Generation {
        self.emitter.generation()
    }

    fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    fn is_live(&self) -> bool {
        false
    }

    fn attach(&mut self, sink: &mut dyn MediaSink, autoplay: bool) -> Result<()> {
        if self.subscription.is_some() {
            return Ok(());
        }

        let subscription = sink.listen(media_listener(self.emitter.clone(), DurationPolicy::Report));
        sink.set_source(&self.locator)
            .map_err(|e| Error::attach(SourceKind::Progressive, e.to_string()))?;
        self.subscription = Some(subscription);

        debug!(locator = %self.locator, generation = %self.generation(), "Native source assigned");

        if autoplay {
            sink.play();
        }
        Ok(())
    }

    fn detach(&mut self, sink: &mut dyn MediaSink) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            sink.clear_source();
            debug!(generation = %self.generation(), "Native engine detached");
        }
    }

    fn play(&mut self, sink: &mut dyn MediaSink) {
        if self.attached_or_log("play") {
            sink.play();
        }
    }

    fn pause(&mut self, sink: &mut dyn MediaSink) -> bool {
        if !self.attached_or_log("pause") {
            return false;
        }
        sink.pause();
        true
    }

    fn seek(&mut self, sink: &mut dyn MediaSink, position: f64) -> bool {
        if !self.attached_or_log("seek") {
            return false;
        }
        sink.seek(position);
        true
    }

    fn seek_to_live_edge(&mut self, _sink: &mut dyn MediaSink) {
        ignored(SourceKind::Progressive, "seek_to_live_edge", "progressive sources are never live");
    }

    fn set_volume(&mut self, sink: &mut dyn MediaSink, volume: f64) {
        if self.attached_or_log("set_volume") {
            sink.set_volume(volume);
        }
    }

    fn set_muted(&mut self, sink: &mut dyn MediaSink, muted: bool) {
        if self.attached_or_log("set_muted") {
            sink.set_muted(muted);
        }
    }

    fn set_rate(&mut self, sink: &mut dyn MediaSink, rate: f64) {
        if self.attached_or_log("set_rate") {
            sink.set_playback_rate(rate);
        }
    }

    fn set_pitch_preserved(&mut self, sink: &mut dyn MediaSink, preserve: bool) {
        if self.attached_or_log("set_pitch_preserved") {
            sink.set_preserves_pitch(preserve);
        }
    }
}

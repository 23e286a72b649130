//! Remote engine - third-party iframe players
//!
//! The iframe API pushes state changes but not time updates, so the current
//! position is pulled in [`PlaybackEngine::poll`].

use super::{ignored, PlaybackEngine};
use crate::{
    BackendFactory, EmbedProvider, EmbedTarget, EngineEvent, Error, EventEmitter, FatalErrorKind,
    Generation, MediaSink, RemoteEvent, RemoteListener, RemotePlayer, RemoteState, Result,
    SourceKind, Subscription,
};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, error, trace};

/// Player status shared with the iframe listener
#[derive(Default)]
struct RemoteStatus {
    ready: Cell<bool>,
    live: Cell<bool>,
    playing: Cell<bool>,
    /// Liveness was inferred from a zero duration at ready; re-read the
    /// duration once playback starts
    duration_pending: Cell<bool>,
}

pub struct RemoteEngine {
    target: EmbedTarget,
    emitter: EventEmitter,
    player: Option<Box<dyn RemotePlayer>>,
    status: Rc<RemoteStatus>,
    subscription: Option<Subscription>,
    last_time: Option<f64>,
}

/// Map a provider error code to a fatal error kind
pub fn remote_error_kind(provider: EmbedProvider, code: i32) -> FatalErrorKind {
    match code {
        2 => FatalErrorKind::SourceNotSupported,
        5 => FatalErrorKind::Decode,
        100 => FatalErrorKind::NotFound,
        101 | 150 => FatalErrorKind::EmbedNotAllowed,
        other => FatalErrorKind::Other(format!("{} player error {}", provider, other)),
    }
}

impl RemoteEngine {
    pub fn new(target: EmbedTarget, emitter: EventEmitter, backends: &mut dyn BackendFactory) -> Result<Self> {
        let player = backends
            .remote_player(target.provider)
            .map_err(|e| Error::attach(SourceKind::RemoteEmbed, e.to_string()))?;

        Ok(Self {
            target,
            emitter,
            player: Some(player),
            status: Rc::new(RemoteStatus::default()),
            subscription: None,
            last_time: None,
        })
    }

    pub fn target(&self) -> &EmbedTarget {
        &self.target
    }

    fn listener(&self) -> RemoteListener {
        let emitter = self.emitter.clone();
        let status = self.status.clone();
        let provider = self.target.provider;

        Rc::new(move |event| match event {
            RemoteEvent::Ready { duration } => {
                status.ready.set(true);
                if duration.is_finite() && duration > 0.0 {
                    emitter.emit(EngineEvent::LiveDetected(false));
                    emitter.emit(EngineEvent::DurationKnown(duration));
                } else {
                    status.live.set(true);
                    status.duration_pending.set(true);
                    emitter.emit(EngineEvent::LiveDetected(true));
                }
            }
            RemoteEvent::StateChange(RemoteState::Playing) => {
                status.playing.set(true);
                emitter.emit(EngineEvent::PlayStateChanged(true));
            }
            RemoteEvent::StateChange(RemoteState::Paused) => {
                status.playing.set(false);
                emitter.emit(EngineEvent::PlayStateChanged(false));
            }
            RemoteEvent::StateChange(RemoteState::Ended) => {
                status.playing.set(false);
                emitter.emit(EngineEvent::Ended);
            }
            RemoteEvent::StateChange(state) => {
                trace!(provider = %provider, state = ?state, "Remote player state");
            }
            RemoteEvent::Error { code } => {
                let kind = remote_error_kind(provider, code);
                error!(provider = %provider, code, error = %kind, "Remote player error");
                emitter.emit(EngineEvent::FatalError(kind));
            }
            RemoteEvent::AutoplayBlocked => {
                emitter.emit(EngineEvent::PlayRejected(format!("{} blocked autoplay", provider)));
            }
        })
    }

    /// The loaded player, once it has reported ready
    fn ready_player(&mut self, operation: &str) -> Option<&mut Box<dyn RemotePlayer>> {
        if self.subscription.is_none() {
            ignored(SourceKind::RemoteEmbed, operation, "not attached");
            return None;
        }
        if !self.status.ready.get() {
            ignored(SourceKind::RemoteEmbed, operation, "player not ready");
            return None;
        }
        self.player.as_mut()
    }
}

impl PlaybackEngine for RemoteEngine {
    fn kind(&self) -> SourceKind {
        SourceKind::RemoteEmbed
    }

    fn generation(&self) -> Generation {
        self.emitter.generation()
    }

    fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    fn is_live(&self) -> bool {
        self.status.live.get()
    }

    fn attach(&mut self, _sink: &mut dyn MediaSink, autoplay: bool) -> Result<()> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let listener = self.listener();
        let player = self
            .player
            .as_mut()
            .ok_or_else(|| Error::attach(SourceKind::RemoteEmbed, "player already destroyed"))?;

        let subscription = player
            .load(&self.target.id, autoplay, listener)
            .map_err(|e| Error::attach(SourceKind::RemoteEmbed, e.to_string()))?;
        self.subscription = Some(subscription);

        debug!(
            provider = %self.target.provider,
            video_id = %self.target.id,
            generation = %self.generation(),
            "Remote player loaded"
        );
        Ok(())
    }

    fn detach(&mut self, _sink: &mut dyn MediaSink) {
        let was_bound = self.subscription.take().is_some();
        if let Some(mut player) = self.player.take() {
            player.destroy();
        }
        if was_bound {
            debug!(provider = %self.target.provider, generation = %self.generation(), "Remote player destroyed");
        }
    }

    fn play(&mut self, _sink: &mut dyn MediaSink) {
        if let Some(player) = self.ready_player("play") {
            player.play_video();
        }
    }

    fn pause(&mut self, _sink: &mut dyn MediaSink) -> bool {
        match self.ready_player("pause") {
            Some(player) => {
                player.pause_video();
                true
            }
            None => false,
        }
    }

    fn seek(&mut self, _sink: &mut dyn MediaSink, position: f64) -> bool {
        if self.status.live.get() {
            ignored(SourceKind::RemoteEmbed, "seek", "source is live");
            return false;
        }
        match self.ready_player("seek") {
            Some(player) => {
                player.seek_to(position, true);
                true
            }
            None => false,
        }
    }

    fn seek_to_live_edge(&mut self, _sink: &mut dyn MediaSink) {
        if !self.status.live.get() {
            ignored(SourceKind::RemoteEmbed, "seek_to_live_edge", "source is not live");
            return;
        }
        if let Some(player) = self.ready_player("seek_to_live_edge") {
            let edge = player.duration().max(player.current_time());
            player.seek_to(edge, true);
        }
    }

    fn set_volume(&mut self, _sink: &mut dyn MediaSink, volume: f64) {
        if let Some(player) = self.ready_player("set_volume") {
            player.set_volume(volume);
        }
    }

    fn set_muted(&mut self, _sink: &mut dyn MediaSink, muted: bool) {
        if let Some(player) = self.ready_player("set_muted") {
            player.set_muted(muted);
        }
    }

    fn set_rate(&mut self, _sink: &mut dyn MediaSink, rate: f64) {
        if self.status.live.get() {
            ignored(SourceKind::RemoteEmbed, "set_rate", "source is live");
            return;
        }
        if let Some(player) = self.ready_player("set_rate") {
            player.set_playback_rate(rate);
        }
    }

    fn set_pitch_preserved(&mut self, _sink: &mut dyn MediaSink, _preserve: bool) {
        ignored(SourceKind::RemoteEmbed, "set_pitch_preserved", "iframe players have no pitch control");
    }

    fn poll(&mut self, _sink: &mut dyn MediaSink) {
        if self.subscription.is_none() || !self.status.ready.get() {
            return;
        }
        let Some(player) = self.player.as_ref() else {
            return;
        };

        // Providers report 0 until metadata loads, which can be after ready
        if self.status.duration_pending.get() && self.status.playing.get() {
            self.status.duration_pending.set(false);
            let duration = player.duration();
            if duration.is_finite() && duration > 0.0 {
                debug!(provider = %self.target.provider, duration, "Remote duration known after start");
                self.status.live.set(false);
                self.emitter.emit(EngineEvent::LiveDetected(false));
                self.emitter.emit(EngineEvent::DurationKnown(duration));
            }
        }

        let time = player.current_time();
        if self.last_time != Some(time) {
            self.last_time = Some(time);
            self.emitter.emit(EngineEvent::TimeUpdate(time));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{channel, Envelope};
    use crate::headless::{Headless, HeadlessScript, RemoteCall, JournalEntry};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<Envelope>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    fn target() -> EmbedTarget {
        EmbedTarget {
            provider: EmbedProvider::YouTube,
            id: "dQw4w9WgXcQ".into(),
        }
    }

    fn remote_calls(headless: &Headless) -> Vec<RemoteCall> {
        headless
            .journal()
            .into_iter()
            .filter_map(|e| match e {
                JournalEntry::Remote(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_load_and_autoplay() {
        let headless = Headless::default();
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, mut rx) = channel();

        let mut engine = RemoteEngine::new(target(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, true).unwrap();

        assert!(!engine.is_live());
        assert_eq!(headless.remotes()[0].video_id().as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            drain(&mut rx),
            vec![
                EngineEvent::LiveDetected(false),
                EngineEvent::DurationKnown(212.0),
                EngineEvent::PlayStateChanged(true),
            ]
        );
    }

    #[test]
    fn test_zero_duration_is_live() {
        let headless = Headless::new(HeadlessScript {
            remote_duration: 0.0,
            ..Default::default()
        });
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, mut rx) = channel();

        let mut engine = RemoteEngine::new(target(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, false).unwrap();

        assert!(engine.is_live());
        assert_eq!(drain(&mut rx), vec![EngineEvent::LiveDetected(true)]);

        assert!(!engine.seek(&mut sink, 10.0));
        engine.set_rate(&mut sink, 2.0);
        assert!(remote_calls(&headless).is_empty());
    }

    #[test]
    fn test_controls_wait_for_ready() {
        let headless = Headless::new(HeadlessScript::manual());
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, _rx) = channel();

        let mut engine = RemoteEngine::new(target(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, false).unwrap();
        engine.play(&mut sink);
        assert!(!engine.pause(&mut sink));
        assert!(!engine.seek(&mut sink, 30.0));
        assert!(remote_calls(&headless).is_empty());

        headless.remotes()[0].deliver(RemoteEvent::Ready { duration: 90.0 });
        engine.play(&mut sink);
        assert!(engine.seek(&mut sink, 30.0));
        engine.set_volume(&mut sink, 0.5);
        assert_eq!(
            remote_calls(&headless),
            vec![RemoteCall::PlayVideo, RemoteCall::SeekTo(30.0), RemoteCall::SetVolume(0.5)]
        );
    }

    #[test]
    fn test_poll_reports_time() {
        let headless = Headless::default();
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, mut rx) = channel();

        let mut engine = RemoteEngine::new(target(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, true).unwrap();
        drain(&mut rx);

        headless.advance(4.0);
        engine.poll(&mut sink);
        engine.poll(&mut sink);
        assert_eq!(drain(&mut rx), vec![EngineEvent::TimeUpdate(4.0)]);
    }

    #[test]
    fn test_duration_after_start_clears_live() {
        let headless = Headless::new(HeadlessScript::manual());
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, mut rx) = channel();

        let mut engine = RemoteEngine::new(target(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, false).unwrap();
        let remote = headless.remotes()[0].clone();

        remote.deliver(RemoteEvent::Ready { duration: 0.0 });
        assert!(engine.is_live());
        engine.poll(&mut sink);
        assert_eq!(drain(&mut rx), vec![EngineEvent::LiveDetected(true), EngineEvent::TimeUpdate(0.0)]);

        remote.deliver(RemoteEvent::StateChange(RemoteState::Playing));
        engine.poll(&mut sink);
        assert!(!engine.is_live());
        assert_eq!(
            drain(&mut rx),
            vec![
                EngineEvent::PlayStateChanged(true),
                EngineEvent::LiveDetected(false),
                EngineEvent::DurationKnown(212.0),
            ]
        );
        assert!(engine.seek(&mut sink, 60.0));
    }

    #[test]
    fn test_live_after_start_stays_live() {
        let headless = Headless::new(HeadlessScript {
            remote_duration: 0.0,
            ..HeadlessScript::manual()
        });
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, mut rx) = channel();

        let mut engine = RemoteEngine::new(target(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, false).unwrap();
        let remote = headless.remotes()[0].clone();
        remote.deliver(RemoteEvent::Ready { duration: 0.0 });
        remote.deliver(RemoteEvent::StateChange(RemoteState::Playing));
        engine.poll(&mut sink);

        assert!(engine.is_live());
        assert!(!drain(&mut rx).contains(&EngineEvent::LiveDetected(false)));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(remote_error_kind(EmbedProvider::YouTube, 100), FatalErrorKind::NotFound);
        assert_eq!(remote_error_kind(EmbedProvider::YouTube, 150), FatalErrorKind::EmbedNotAllowed);
        assert_eq!(remote_error_kind(EmbedProvider::YouTube, 2), FatalErrorKind::SourceNotSupported);
        assert!(matches!(remote_error_kind(EmbedProvider::Vimeo, 42), FatalErrorKind::Other(_)));
    }

    #[test]
    fn test_detach_destroys_player() {
        let headless = Headless::default();
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, _rx) = channel();

        let mut engine = RemoteEngine::new(target(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, false).unwrap();
        engine.detach(&mut sink);
        engine.detach(&mut sink);

        assert!(headless.remotes()[0].is_destroyed());
        assert_eq!(headless.active_attachments(), 0);
        assert!(engine.attach(&mut sink, false).is_err());
    }
}

//! Playback controller - owns the active engine and the playback state
//!
//! Coordinates:
//! - Source classification and engine replacement
//! - Generation tagging of engine events
//! - Folding events and control changes into [`PlaybackState`]
//! - State broadcast to subscribers

use crate::{
    classify,
    engine::{Engine, PlaybackEngine},
    events::{channel, Envelope, Waker},
    reconcile::{fold, ControlChange, Update},
    BackendFactory, EngineEvent, Error, EventEmitter, FatalErrorKind, Generation, MediaSink,
    PlaybackState, PlayerConfig, PlayerId, PlayerState, Result, SourceDescriptor, SourceOptions,
    MAX_RATE, MIN_RATE,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, trace, warn};

/// Backend-agnostic player driving one engine at a time
pub struct PlaybackController {
    /// Unique controller ID
    id: PlayerId,
    config: PlayerConfig,
    /// Media surface, lent to the active engine per call
    sink: Box<dyn MediaSink>,
    backends: Box<dyn BackendFactory>,
    engine: Option<Engine>,
    descriptor: Option<SourceDescriptor>,
    /// Generation of the current engine; events tagged otherwise are stale
    generation: Generation,
    state: PlaybackState,
    /// State change broadcaster
    state_tx: watch::Sender<PlaybackState>,
    /// `None` once disposed
    events_tx: Option<mpsc::UnboundedSender<Envelope>>,
    events_rx: mpsc::UnboundedReceiver<Envelope>,
    waker: Option<Waker>,
    /// Generation for which a blocked play was already reported
    blocked_reported: Option<Generation>,
    disposed: bool,
}

impl PlaybackController {
    /// Create a controller over a sink and the backends that can drive it
    pub fn new(
        config: PlayerConfig,
        sink: Box<dyn MediaSink>,
        backends: Box<dyn BackendFactory>,
    ) -> Result<Self> {
        config.validate()?;

        let state = PlaybackState::from_config(&config);
        let (state_tx, _) = watch::channel(state.clone());
        let (events_tx, events_rx) = channel();
        let id = PlayerId::new();

        info!(player_id = %id, autoplay = config.autoplay, "Playback controller created");

        Ok(Self {
            id,
            config,
            sink,
            backends,
            engine: None,
            descriptor: None,
            generation: Generation::default(),
            state,
            state_tx,
            events_tx: Some(events_tx),
            events_rx,
            waker: None,
            blocked_reported: None,
            disposed: false,
        })
    }

    /// Install a callback run whenever an engine queues an event. Applies to
    /// engines attached from now on.
    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Current snapshot
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Descriptor of the current source
    pub fn source(&self) -> Option<&SourceDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_active(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::ControllerDisposed);
        }
        Ok(())
    }

    /// Fold an update and broadcast the result
    fn apply(&mut self, update: Update) {
        let previous = self.state.state;
        self.state = fold(std::mem::take(&mut self.state), &update);
        if previous != self.state.state {
            info!(from = %previous, to = %self.state.state, generation = %self.generation, "State transition");
        }

        let state = &self.state;
        self.state_tx.send_if_modified(|current| {
            if current == state {
                return false;
            }
            *current = state.clone();
            true
        });
    }

    /// Run `f` against the active engine. Returns `None` without an engine.
    fn with_engine<R>(&mut self, operation: &str, f: impl FnOnce(&mut Engine, &mut dyn MediaSink) -> R) -> Option<R> {
        match self.engine.as_mut() {
            Some(engine) => Some(f(engine, self.sink.as_mut())),
            None => {
                debug!(operation, "No active engine");
                None
            }
        }
    }

    /// Load a new source, replacing the current engine
    #[instrument(skip(self))]
    pub fn set_source(&mut self, locator: &str, options: SourceOptions) -> Result<()> {
        self.ensure_active()?;
        let descriptor = classify(locator).inspect_err(|e| {
            warn!(error = %e, "Source rejected, keeping current engine");
        })?;
        self.set_descriptor(descriptor, options)
    }

    /// Load an already classified source
    #[instrument(skip(self, descriptor), fields(kind = %descriptor.kind))]
    pub fn set_descriptor(&mut self, descriptor: SourceDescriptor, options: SourceOptions) -> Result<()> {
        self.ensure_active()?;
        let tx = self.events_tx.clone().ok_or(Error::ControllerDisposed)?;

        self.detach_engine();
        self.generation = self.generation.next();
        self.blocked_reported = None;

        info!(
            player_id = %self.id,
            locator = %descriptor.locator,
            kind = %descriptor.kind,
            generation = %self.generation,
            "Source changed"
        );

        self.apply(ControlChange::SourceChanged(descriptor.kind).into());
        self.descriptor = Some(descriptor.clone());

        let emitter = EventEmitter::new(self.generation, tx, self.waker.clone());
        let mut engine = match Engine::build(&descriptor, emitter, self.backends.as_mut()) {
            Ok(engine) => engine,
            Err(err) => return Err(self.attach_failed(err)),
        };

        let autoplay = options.autoplay.unwrap_or(self.config.autoplay);
        if let Err(err) = engine.attach(self.sink.as_mut(), autoplay) {
            engine.detach(self.sink.as_mut());
            return Err(self.attach_failed(err));
        }
        self.engine = Some(engine);

        self.reapply_preferences();
        self.drain();
        Ok(())
    }

    fn attach_failed(&mut self, err: Error) -> Error {
        error!(error = %err, code = err.error_code(), generation = %self.generation, "Engine attach failed");
        self.apply(EngineEvent::FatalError(FatalErrorKind::Other(err.to_string())).into());
        err
    }

    fn detach_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.detach(self.sink.as_mut());
            debug!(kind = %engine.kind(), generation = %engine.generation(), "Engine detached");
        }
    }

    /// Push volume, mute, rate and pitch preferences to the active engine
    fn reapply_preferences(&mut self) {
        let PlaybackState {
            volume,
            muted,
            rate,
            pitch_preserved,
            ..
        } = self.state;

        self.with_engine("reapply_preferences", |engine, sink| {
            engine.set_volume(sink, volume);
            engine.set_muted(sink, muted);
            if !engine.is_live() {
                engine.set_rate(sink, rate);
            }
            engine.set_pitch_preserved(sink, pitch_preserved);
        });
    }

    fn report_blocked(&mut self, reason: &str) {
        if self.blocked_reported == Some(self.generation) {
            debug!(reason, "Playback still blocked");
            return;
        }
        self.blocked_reported = Some(self.generation);
        let err = Error::PlaybackBlocked {
            reason: reason.to_string(),
        };
        warn!(error = %err, code = err.error_code(), generation = %self.generation, "Playback blocked");
    }

    /// Fold queued engine events; returns how many were applied
    fn drain(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let was_loading = self.state.state == PlayerState::Loading;
            let was_live = self.state.is_live;
            let mut batch = 0;

            while let Ok(envelope) = self.events_rx.try_recv() {
                if envelope.generation != self.generation {
                    trace!(
                        stale = %envelope.generation,
                        current = %self.generation,
                        event = ?envelope.event,
                        "Discarding stale event"
                    );
                    continue;
                }
                match &envelope.event {
                    EngineEvent::PlayRejected(reason) => self.report_blocked(reason),
                    EngineEvent::FatalError(kind) => {
                        let err = Error::FatalPlayback(kind.clone());
                        error!(error = %err, code = err.error_code(), generation = %self.generation, "Playback failed");
                    }
                    _ => {}
                }
                self.apply(Update::Engine(envelope.event));
                batch += 1;
            }
            applied += batch;

            // Backends that load asynchronously only take preferences once ready,
            // and the rate is withheld until a source turns out not to be live
            let became_ready = was_loading
                && matches!(self.state.state, PlayerState::Ready | PlayerState::Playing | PlayerState::Paused);
            let became_seekable = was_live && !self.state.is_live;
            if !became_ready && !became_seekable {
                break;
            }
            self.reapply_preferences();
        }
        applied
    }

    /// Fold every queued engine event
    pub fn pump(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.drain();
        Ok(())
    }

    /// Poll the active engine, then pump. Hosts call this from a timer.
    pub fn tick(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.with_engine("tick", |engine, sink| engine.poll(sink));
        self.drain();
        Ok(())
    }

    /// Request playback. `playing` flips only when the engine confirms.
    #[instrument(skip(self))]
    pub fn play(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.state.state == PlayerState::Playing {
            debug!("Already playing");
            return Ok(());
        }
        self.with_engine("play", |engine, sink| engine.play(sink));
        self.drain();
        Ok(())
    }

    /// Pause playback
    #[instrument(skip(self))]
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.with_engine("pause", |engine, sink| engine.pause(sink)) == Some(true) {
            self.apply(ControlChange::Paused.into());
        }
        self.drain();
        Ok(())
    }

    /// Seek to `position` seconds. Live sources jump to the live edge.
    #[instrument(skip(self))]
    pub fn seek(&mut self, position: f64) -> Result<()> {
        self.ensure_active()?;
        if !position.is_finite() {
            warn!(position, "Ignoring non-finite seek position");
            return Ok(());
        }

        let live = self.state.is_live || self.engine.as_ref().is_some_and(|e| e.is_live());
        if live {
            self.with_engine("seek", |engine, sink| engine.seek_to_live_edge(sink));
        } else {
            let duration = self.state.duration;
            let clamped = if duration > 0.0 {
                position.clamp(0.0, duration)
            } else {
                position.max(0.0)
            };
            if self.with_engine("seek", |engine, sink| engine.seek(sink, clamped)) == Some(true) {
                self.apply(ControlChange::Seeked(clamped).into());
            }
        }
        self.drain();
        Ok(())
    }

    /// Set volume in [0, 1]. A positive volume unmutes.
    #[instrument(skip(self))]
    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.ensure_active()?;
        if !volume.is_finite() {
            warn!(volume, "Ignoring non-finite volume");
            return Ok(());
        }
        let volume = volume.clamp(0.0, 1.0);
        let unmute = volume > 0.0 && self.state.muted;

        self.apply(ControlChange::Volume(volume).into());
        if unmute {
            self.apply(ControlChange::Muted(false).into());
        }
        self.with_engine("set_volume", |engine, sink| {
            engine.set_volume(sink, volume);
            if unmute {
                engine.set_muted(sink, false);
            }
        });
        self.drain();
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.ensure_active()?;
        self.apply(ControlChange::Muted(muted).into());
        self.with_engine("set_muted", |engine, sink| engine.set_muted(sink, muted));
        self.drain();
        Ok(())
    }

    /// Set the playback rate. No-op while live.
    #[instrument(skip(self))]
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.ensure_active()?;
        if !rate.is_finite() || rate <= 0.0 {
            warn!(rate, "Ignoring invalid playback rate");
            return Ok(());
        }
        if self.state.is_live {
            debug!(rate, "Rate changes are disabled for live sources");
            return Ok(());
        }
        let rate = rate.clamp(MIN_RATE, MAX_RATE);
        self.apply(ControlChange::Rate(rate).into());
        self.with_engine("set_rate", |engine, sink| engine.set_rate(sink, rate));
        self.drain();
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_pitch_preserved(&mut self, preserve: bool) -> Result<()> {
        self.ensure_active()?;
        self.apply(ControlChange::PitchPreserved(preserve).into());
        self.with_engine("set_pitch_preserved", |engine, sink| {
            engine.set_pitch_preserved(sink, preserve)
        });
        self.drain();
        Ok(())
    }

    /// Enter or leave fullscreen. A refused request leaves the flag alone.
    ///
    /// The host can leave fullscreen on its own (Escape), so the sink's
    /// flag is authoritative over the last folded one.
    #[instrument(skip(self))]
    pub fn toggle_fullscreen(&mut self) -> Result<()> {
        self.ensure_active()?;
        let actual = self.sink.is_fullscreen();
        if actual != self.state.is_fullscreen {
            debug!(fullscreen = actual, "Fullscreen changed outside the player");
            self.apply(ControlChange::Fullscreen(actual).into());
        }
        let target = !actual;
        match self.sink.set_fullscreen(target) {
            Ok(()) => self.apply(ControlChange::Fullscreen(target).into()),
            Err(e) => warn!(error = %e, fullscreen = target, "Fullscreen request failed"),
        }
        self.drain();
        Ok(())
    }

    /// Tear down the engine and close the event queue. Idempotent.
    #[instrument(skip(self), fields(player_id = %self.id))]
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.detach_engine();
        self.generation = self.generation.next();
        self.events_tx = None;
        self.events_rx.close();
        while self.events_rx.try_recv().is_ok() {}
        self.disposed = true;

        info!("Playback controller disposed");
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("source", &self.descriptor)
            .field("state", &self.state)
            .field("disposed", &self.disposed)
            .finish()
    }
}

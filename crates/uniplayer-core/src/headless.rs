//! Headless backends
//!
//! In-process implementations of the sink, streaming sessions and remote
//! players. They keep a journal of every call so attachment ordering can be
//! inspected, and they can either answer loads immediately or wait for the
//! caller to deliver events by hand.
//!
//! ```
//! use uniplayer_core::headless::{Headless, HeadlessScript};
//! use uniplayer_core::{PlaybackController, PlayerConfig, SourceOptions};
//!
//! let headless = Headless::new(HeadlessScript::default());
//! let mut player = PlaybackController::new(
//!     PlayerConfig::default(),
//!     Box::new(headless.sink()),
//!     Box::new(headless.backends()),
//! ).unwrap();
//!
//! player.set_source("clip.mp4", SourceOptions::default()).unwrap();
//! assert!(player.state().playing);
//! ```

use crate::{
    BackendError, BackendFactory, EmbedProvider, MediaEvent, MediaListener, MediaSink,
    RemoteEvent, RemoteListener, RemotePlayer, RemoteState, SourceKind, StreamEvent,
    StreamListener, StreamingSession, Subscription,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// Behavior of the headless backends
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessScript {
    /// Reject `play()` until a user gesture is granted
    pub block_autoplay: bool,
    /// Answer loads (metadata, manifests, ready) synchronously
    pub respond_immediately: bool,
    /// Duration of progressive and VOD DASH media, in seconds
    pub media_duration: f64,
    /// Whether a segment-fetching HLS library is available
    pub hls_supported: bool,
    /// Report DASH manifests as dynamic
    pub dash_live: bool,
    /// Duration the remote player reports at ready; 0 means live
    pub remote_duration: f64,
    /// Backend the factory refuses to construct
    pub fail_backend: Option<SourceKind>,
    /// Backend whose attach (load/open/set_source) fails
    pub fail_attach: Option<SourceKind>,
    /// Refuse fullscreen requests
    pub deny_fullscreen: bool,
}

impl Default for HeadlessScript {
    fn default() -> Self {
        Self {
            block_autoplay: false,
            respond_immediately: true,
            media_duration: 60.0,
            hls_supported: true,
            dash_live: false,
            remote_duration: 212.0,
            fail_backend: None,
            fail_attach: None,
            deny_fullscreen: false,
        }
    }
}

impl HeadlessScript {
    /// Nothing happens until the caller delivers events
    pub fn manual() -> Self {
        Self {
            respond_immediately: false,
            ..Default::default()
        }
    }
}

/// Calls received by the headless sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    SetSource(String),
    ClearSource,
    Play,
    Pause,
    Seek(f64),
    SetVolume(f64),
    SetMuted(bool),
    SetRate(f64),
    SetPreservesPitch(bool),
    SetFullscreen(bool),
}

/// Calls received by headless remote players
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    PlayVideo,
    PauseVideo,
    SeekTo(f64),
    SetVolume(f64),
    SetMuted(bool),
    SetPlaybackRate(f64),
}

/// Everything the headless backends observed, in order
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    Sink(SinkCall),
    SessionOpened { kind: SourceKind, locator: String },
    SessionDestroyed { kind: SourceKind },
    RemoteLoaded { provider: EmbedProvider, video_id: String },
    Remote(RemoteCall),
    RemoteDestroyed { provider: EmbedProvider },
}

#[derive(Default)]
struct SinkState {
    source: Option<String>,
    /// A streaming session currently feeds the element
    stream_attached: bool,
    listeners: Vec<(u64, MediaListener)>,
    next_listener: u64,
    playing: bool,
    time: f64,
    /// Duration of the loaded media; infinite for live streams
    duration: f64,
    live_edge: f64,
    rate: f64,
    fullscreen: bool,
}

struct Shared {
    script: HeadlessScript,
    journal: RefCell<Vec<JournalEntry>>,
    sink: RefCell<SinkState>,
    gesture: Cell<bool>,
    sessions: RefCell<Vec<SessionHandle>>,
    remotes: RefCell<Vec<RemoteHandle>>,
}

impl Shared {
    fn record(&self, entry: JournalEntry) {
        self.journal.borrow_mut().push(entry);
    }

    fn play_allowed(&self) -> bool {
        !self.script.block_autoplay || self.gesture.get()
    }

    fn deliver(&self, event: MediaEvent) {
        let listeners: Vec<MediaListener> = self
            .sink
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event.clone());
        }
    }
}

/// Test and simulation handle over a set of headless backends
#[derive(Clone)]
pub struct Headless {
    shared: Rc<Shared>,
}

impl Default for Headless {
    fn default() -> Self {
        Self::new(HeadlessScript::default())
    }
}

impl Headless {
    pub fn new(script: HeadlessScript) -> Self {
        Self {
            shared: Rc::new(Shared {
                script,
                journal: RefCell::new(Vec::new()),
                sink: RefCell::new(SinkState {
                    rate: 1.0,
                    ..Default::default()
                }),
                gesture: Cell::new(false),
                sessions: RefCell::new(Vec::new()),
                remotes: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn script(&self) -> &HeadlessScript {
        &self.shared.script
    }

    /// Sink to hand to a controller
    pub fn sink(&self) -> HeadlessSink {
        HeadlessSink {
            shared: self.shared.clone(),
        }
    }

    /// Backend factory to hand to a controller
    pub fn backends(&self) -> HeadlessBackends {
        HeadlessBackends {
            shared: self.shared.clone(),
        }
    }

    /// Simulate a user click so later `play()` calls are allowed
    pub fn grant_gesture(&self) {
        self.shared.gesture.set(true);
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.shared.journal.borrow().clone()
    }

    pub fn sink_calls(&self) -> Vec<SinkCall> {
        self.shared
            .journal
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Sink(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    /// Deliver a media event to every sink listener
    pub fn deliver(&self, event: MediaEvent) {
        self.shared.deliver(event);
    }

    pub fn listener_count(&self) -> usize {
        self.shared.sink.borrow().listeners.len()
    }

    pub fn source(&self) -> Option<String> {
        self.shared.sink.borrow().source.clone()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.shared.sink.borrow().fullscreen
    }

    /// Leave fullscreen as the user would with Escape, bypassing the player
    pub fn exit_fullscreen(&self) {
        self.shared.sink.borrow_mut().fullscreen = false;
    }

    /// Streaming sessions created so far, oldest first
    pub fn sessions(&self) -> Vec<SessionHandle> {
        self.shared.sessions.borrow().clone()
    }

    /// Remote players created so far, oldest first
    pub fn remotes(&self) -> Vec<RemoteHandle> {
        self.shared.remotes.borrow().clone()
    }

    /// Number of backends currently bound (sink source, open sessions, loaded
    /// remote players)
    pub fn active_attachments(&self) -> usize {
        replay_attachments(&self.shared.journal.borrow()).0
    }

    /// Highest number of simultaneously bound backends seen so far
    pub fn max_active_attachments(&self) -> usize {
        replay_attachments(&self.shared.journal.borrow()).1
    }

    /// Let `seconds` of wall time pass: playing media advances, live edges
    /// move forward, and media reaching its end stops.
    pub fn advance(&self, seconds: f64) {
        let mut events = Vec::new();
        {
            let mut sink = self.shared.sink.borrow_mut();
            sink.live_edge += seconds;
            if sink.playing {
                let mut time = sink.time + seconds * sink.rate;
                if sink.duration.is_finite() && sink.duration > 0.0 && time >= sink.duration {
                    time = sink.duration;
                    sink.playing = false;
                    events.push(MediaEvent::TimeUpdate(time));
                    events.push(MediaEvent::Pause);
                    events.push(MediaEvent::Ended);
                } else {
                    events.push(MediaEvent::TimeUpdate(time));
                }
                sink.time = time;
            }
        }
        for event in events {
            self.shared.deliver(event);
        }

        for remote in self.remotes() {
            remote.advance(seconds);
        }
    }
}

fn replay_attachments(journal: &[JournalEntry]) -> (usize, usize) {
    let mut sink_source = false;
    let mut sessions = 0usize;
    let mut remotes = 0usize;
    let mut max = 0usize;

    for entry in journal {
        match entry {
            JournalEntry::Sink(SinkCall::SetSource(_)) => sink_source = true,
            JournalEntry::Sink(SinkCall::ClearSource) => sink_source = false,
            JournalEntry::SessionOpened { .. } => sessions += 1,
            JournalEntry::SessionDestroyed { .. } => sessions = sessions.saturating_sub(1),
            JournalEntry::RemoteLoaded { .. } => remotes += 1,
            JournalEntry::RemoteDestroyed { .. } => remotes = remotes.saturating_sub(1),
            _ => {}
        }
        max = max.max(sink_source as usize + sessions + remotes);
    }

    (sink_source as usize + sessions + remotes, max)
}

/// Headless media element
pub struct HeadlessSink {
    shared: Rc<Shared>,
}

impl HeadlessSink {
    fn has_media(&self) -> bool {
        let sink = self.shared.sink.borrow();
        sink.source.is_some() || sink.stream_attached
    }
}

impl MediaSink for HeadlessSink {
    fn set_source(&mut self, locator: &str) -> Result<(), BackendError> {
        self.shared.record(JournalEntry::Sink(SinkCall::SetSource(locator.to_string())));
        let script = &self.shared.script;
        let kind = crate::source::detect_stream_kind(locator);
        if script.fail_attach == Some(kind) {
            return Err(BackendError::new(format!("media element refused {}", locator)));
        }

        let duration = if kind == SourceKind::Hls {
            f64::INFINITY
        } else {
            script.media_duration
        };
        {
            let mut sink = self.shared.sink.borrow_mut();
            sink.source = Some(locator.to_string());
            sink.time = 0.0;
            sink.playing = false;
            sink.duration = duration;
        }
        if script.respond_immediately {
            self.shared.deliver(MediaEvent::LoadedMetadata { duration });
        }
        Ok(())
    }

    fn clear_source(&mut self) {
        self.shared.record(JournalEntry::Sink(SinkCall::ClearSource));
        let mut sink = self.shared.sink.borrow_mut();
        sink.source = None;
        sink.playing = false;
        sink.time = 0.0;
        sink.duration = 0.0;
    }

    fn listen(&mut self, listener: MediaListener) -> Subscription {
        let id = {
            let mut sink = self.shared.sink.borrow_mut();
            let id = sink.next_listener;
            sink.next_listener += 1;
            sink.listeners.push((id, listener));
            id
        };
        let shared = Rc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.sink.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    fn play(&mut self) {
        self.shared.record(JournalEntry::Sink(SinkCall::Play));
        if !self.has_media() {
            return;
        }
        if !self.shared.play_allowed() {
            self.shared.deliver(MediaEvent::PlayRejected {
                reason: "NotAllowedError: play() failed because the user didn't interact with the document first".to_string(),
            });
            return;
        }
        let was_playing = std::mem::replace(&mut self.shared.sink.borrow_mut().playing, true);
        if !was_playing {
            self.shared.deliver(MediaEvent::Play);
        }
    }

    fn pause(&mut self) {
        self.shared.record(JournalEntry::Sink(SinkCall::Pause));
        let was_playing = std::mem::replace(&mut self.shared.sink.borrow_mut().playing, false);
        if was_playing {
            self.shared.deliver(MediaEvent::Pause);
        }
    }

    fn seek(&mut self, position: f64) {
        self.shared.record(JournalEntry::Sink(SinkCall::Seek(position)));
        self.shared.sink.borrow_mut().time = position;
        if self.has_media() {
            self.shared.deliver(MediaEvent::TimeUpdate(position));
        }
    }

    fn set_volume(&mut self, volume: f64) {
        self.shared.record(JournalEntry::Sink(SinkCall::SetVolume(volume)));
    }

    fn set_muted(&mut self, muted: bool) {
        self.shared.record(JournalEntry::Sink(SinkCall::SetMuted(muted)));
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.shared.record(JournalEntry::Sink(SinkCall::SetRate(rate)));
        self.shared.sink.borrow_mut().rate = rate;
    }

    fn set_preserves_pitch(&mut self, preserve: bool) {
        self.shared.record(JournalEntry::Sink(SinkCall::SetPreservesPitch(preserve)));
    }

    fn current_time(&self) -> f64 {
        self.shared.sink.borrow().time
    }

    fn seekable_end(&self) -> Option<f64> {
        let sink = self.shared.sink.borrow();
        if sink.duration.is_infinite() {
            Some(sink.live_edge.max(sink.time))
        } else if sink.duration > 0.0 {
            Some(sink.duration)
        } else {
            None
        }
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), BackendError> {
        self.shared.record(JournalEntry::Sink(SinkCall::SetFullscreen(fullscreen)));
        if self.shared.script.deny_fullscreen {
            return Err(BackendError::new("fullscreen request denied"));
        }
        self.shared.sink.borrow_mut().fullscreen = fullscreen;
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.shared.sink.borrow().fullscreen
    }
}

/// Headless backend factory
pub struct HeadlessBackends {
    shared: Rc<Shared>,
}

impl HeadlessBackends {
    fn check(&self, kind: SourceKind) -> Result<(), BackendError> {
        if self.shared.script.fail_backend == Some(kind) {
            return Err(BackendError::new(format!("{} backend unavailable", kind)));
        }
        Ok(())
    }

    fn session(&self, kind: SourceKind) -> Box<dyn StreamingSession> {
        let handle = SessionHandle {
            inner: Rc::new(SessionInner {
                kind,
                locator: RefCell::new(None),
                listener: RefCell::new(None),
                captured: RefCell::new(None),
                opened: Cell::new(false),
                destroyed: Cell::new(false),
            }),
        };
        self.shared.sessions.borrow_mut().push(handle.clone());
        Box::new(HeadlessSession {
            shared: self.shared.clone(),
            handle,
        })
    }
}

impl BackendFactory for HeadlessBackends {
    fn supports_hls(&self) -> bool {
        self.shared.script.hls_supported
    }

    fn hls_session(&mut self) -> Result<Box<dyn StreamingSession>, BackendError> {
        self.check(SourceKind::Hls)?;
        Ok(self.session(SourceKind::Hls))
    }

    fn dash_session(&mut self) -> Result<Box<dyn StreamingSession>, BackendError> {
        self.check(SourceKind::Dash)?;
        Ok(self.session(SourceKind::Dash))
    }

    fn remote_player(
        &mut self,
        provider: EmbedProvider,
    ) -> Result<Box<dyn RemotePlayer>, BackendError> {
        self.check(SourceKind::RemoteEmbed)?;
        let handle = RemoteHandle {
            inner: Rc::new(RemoteInner {
                provider,
                video_id: RefCell::new(None),
                listener: RefCell::new(None),
                captured: RefCell::new(None),
                destroyed: Cell::new(false),
                playing: Cell::new(false),
                time: Cell::new(0.0),
                duration: Cell::new(0.0),
            }),
        };
        self.shared.remotes.borrow_mut().push(handle.clone());
        Ok(Box::new(HeadlessRemote {
            shared: self.shared.clone(),
            handle,
        }))
    }
}

struct SessionInner {
    kind: SourceKind,
    locator: RefCell<Option<String>>,
    /// Cleared when the engine unsubscribes
    listener: RefCell<Option<StreamListener>>,
    /// Kept for replaying callbacks that were already in flight
    captured: RefCell<Option<StreamListener>>,
    opened: Cell<bool>,
    destroyed: Cell<bool>,
}

/// Inspection handle for a headless streaming session
#[derive(Clone)]
pub struct SessionHandle {
    inner: Rc<SessionInner>,
}

impl SessionHandle {
    pub fn kind(&self) -> SourceKind {
        self.inner.kind
    }

    pub fn locator(&self) -> Option<String> {
        self.inner.locator.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.opened.get() && !self.inner.destroyed.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Deliver an event as the streaming library would. Nothing is delivered
    /// once the engine has unsubscribed.
    pub fn deliver(&self, event: StreamEvent) {
        let listener = self.inner.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    /// Deliver through the listener captured at open, even after
    /// unsubscription. This is what a callback already in flight looks like.
    pub fn deliver_in_flight(&self, event: StreamEvent) {
        let listener = self.inner.captured.borrow().clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }
}

struct HeadlessSession {
    shared: Rc<Shared>,
    handle: SessionHandle,
}

impl StreamingSession for HeadlessSession {
    fn open(
        &mut self,
        locator: &str,
        _sink: &mut dyn MediaSink,
        listener: StreamListener,
    ) -> Result<Subscription, BackendError> {
        let kind = self.handle.inner.kind;
        if self.shared.script.fail_attach == Some(kind) {
            return Err(BackendError::new(format!("{} session failed to open {}", kind, locator)));
        }

        self.shared.record(JournalEntry::SessionOpened {
            kind,
            locator: locator.to_string(),
        });
        *self.handle.inner.locator.borrow_mut() = Some(locator.to_string());
        *self.handle.inner.listener.borrow_mut() = Some(listener.clone());
        *self.handle.inner.captured.borrow_mut() = Some(listener.clone());
        self.handle.inner.opened.set(true);

        let (live, duration) = match kind {
            SourceKind::Dash if !self.shared.script.dash_live => {
                (false, self.shared.script.media_duration)
            }
            _ => (true, f64::INFINITY),
        };
        {
            let mut sink = self.shared.sink.borrow_mut();
            sink.stream_attached = true;
            sink.time = 0.0;
            sink.playing = false;
            sink.duration = duration;
        }

        if self.shared.script.respond_immediately {
            listener(StreamEvent::ManifestParsed {
                live,
                duration: (!live).then_some(duration),
            });
            self.shared.deliver(MediaEvent::LoadedMetadata { duration });
        }

        debug!(kind = %kind, locator, "Headless session opened");

        let inner = Rc::downgrade(&self.handle.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listener.borrow_mut().take();
            }
        }))
    }

    fn live_edge(&self) -> Option<f64> {
        let sink = self.shared.sink.borrow();
        sink.duration.is_infinite().then(|| sink.live_edge.max(sink.time))
    }

    fn destroy(&mut self) {
        if self.handle.inner.destroyed.replace(true) {
            return;
        }
        if self.handle.inner.locator.borrow().is_some() {
            self.shared.record(JournalEntry::SessionDestroyed {
                kind: self.handle.inner.kind,
            });
        }
        let mut sink = self.shared.sink.borrow_mut();
        sink.stream_attached = false;
        sink.playing = false;
    }
}

struct RemoteInner {
    provider: EmbedProvider,
    video_id: RefCell<Option<String>>,
    listener: RefCell<Option<RemoteListener>>,
    captured: RefCell<Option<RemoteListener>>,
    destroyed: Cell<bool>,
    playing: Cell<bool>,
    time: Cell<f64>,
    duration: Cell<f64>,
}

/// Inspection handle for a headless remote player
#[derive(Clone)]
pub struct RemoteHandle {
    inner: Rc<RemoteInner>,
}

impl RemoteHandle {
    pub fn provider(&self) -> EmbedProvider {
        self.inner.provider
    }

    pub fn video_id(&self) -> Option<String> {
        self.inner.video_id.borrow().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.get()
    }

    pub fn current_time(&self) -> f64 {
        self.inner.time.get()
    }

    /// Deliver an event as the iframe API would
    pub fn deliver(&self, event: RemoteEvent) {
        let listener = self.inner.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    /// Deliver through the listener captured at load, even after
    /// unsubscription
    pub fn deliver_in_flight(&self, event: RemoteEvent) {
        let listener = self.inner.captured.borrow().clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    fn advance(&self, seconds: f64) {
        if self.inner.destroyed.get() || !self.inner.playing.get() {
            return;
        }
        let duration = self.inner.duration.get();
        let time = self.inner.time.get() + seconds;
        if duration > 0.0 && time >= duration {
            self.inner.time.set(duration);
            self.inner.playing.set(false);
            self.deliver(RemoteEvent::StateChange(RemoteState::Ended));
        } else {
            self.inner.time.set(time);
        }
    }
}

struct HeadlessRemote {
    shared: Rc<Shared>,
    handle: RemoteHandle,
}

impl HeadlessRemote {
    fn start(&self) {
        if !self.shared.play_allowed() {
            self.handle.deliver(RemoteEvent::AutoplayBlocked);
            return;
        }
        if !self.handle.inner.playing.replace(true) {
            self.handle.deliver(RemoteEvent::StateChange(RemoteState::Playing));
        }
    }
}

impl RemotePlayer for HeadlessRemote {
    fn load(
        &mut self,
        video_id: &str,
        autoplay: bool,
        listener: RemoteListener,
    ) -> Result<Subscription, BackendError> {
        if self.shared.script.fail_attach == Some(SourceKind::RemoteEmbed) {
            return Err(BackendError::new(format!("iframe player failed to load {}", video_id)));
        }
        self.shared.record(JournalEntry::RemoteLoaded {
            provider: self.handle.inner.provider,
            video_id: video_id.to_string(),
        });
        *self.handle.inner.video_id.borrow_mut() = Some(video_id.to_string());
        *self.handle.inner.listener.borrow_mut() = Some(listener.clone());
        *self.handle.inner.captured.borrow_mut() = Some(listener);
        self.handle.inner.duration.set(self.shared.script.remote_duration);

        if self.shared.script.respond_immediately {
            self.handle.deliver(RemoteEvent::Ready {
                duration: self.shared.script.remote_duration,
            });
            if autoplay {
                self.start();
            }
        }

        let inner = Rc::downgrade(&self.handle.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listener.borrow_mut().take();
            }
        }))
    }

    fn play_video(&mut self) {
        self.shared.record(JournalEntry::Remote(RemoteCall::PlayVideo));
        self.start();
    }

    fn pause_video(&mut self) {
        self.shared.record(JournalEntry::Remote(RemoteCall::PauseVideo));
        if self.handle.inner.playing.replace(false) {
            self.handle.deliver(RemoteEvent::StateChange(RemoteState::Paused));
        }
    }

    fn seek_to(&mut self, seconds: f64, _allow_seek_ahead: bool) {
        self.shared.record(JournalEntry::Remote(RemoteCall::SeekTo(seconds)));
        self.handle.inner.time.set(seconds);
    }

    fn set_volume(&mut self, volume: f64) {
        self.shared.record(JournalEntry::Remote(RemoteCall::SetVolume(volume)));
    }

    fn set_muted(&mut self, muted: bool) {
        self.shared.record(JournalEntry::Remote(RemoteCall::SetMuted(muted)));
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.shared.record(JournalEntry::Remote(RemoteCall::SetPlaybackRate(rate)));
    }

    fn current_time(&self) -> f64 {
        self.handle.inner.time.get()
    }

    fn duration(&self) -> f64 {
        self.handle.inner.duration.get()
    }

    fn destroy(&mut self) {
        if self.handle.inner.destroyed.replace(true) {
            return;
        }
        self.handle.inner.playing.set(false);
        if self.handle.inner.video_id.borrow().is_some() {
            self.shared.record(JournalEntry::RemoteDestroyed {
                provider: self.handle.inner.provider,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_replay() {
        let journal = vec![
            JournalEntry::Sink(SinkCall::SetSource("a.mp4".into())),
            JournalEntry::Sink(SinkCall::ClearSource),
            JournalEntry::SessionOpened { kind: SourceKind::Hls, locator: "b.m3u8".into() },
            JournalEntry::Sink(SinkCall::ClearSource),
            JournalEntry::SessionDestroyed { kind: SourceKind::Hls },
            JournalEntry::RemoteLoaded { provider: EmbedProvider::YouTube, video_id: "x".into() },
        ];
        assert_eq!(replay_attachments(&journal), (1, 1));

        let overlapping = vec![
            JournalEntry::Sink(SinkCall::SetSource("a.mp4".into())),
            JournalEntry::SessionOpened { kind: SourceKind::Dash, locator: "b.mpd".into() },
        ];
        assert_eq!(replay_attachments(&overlapping), (2, 2));
    }

    #[test]
    fn test_sink_play_blocked_until_gesture() {
        let headless = Headless::new(HeadlessScript {
            block_autoplay: true,
            ..Default::default()
        });
        let mut sink = headless.sink();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _sub = sink.listen(Rc::new(move |e| s.borrow_mut().push(e)));

        sink.set_source("clip.mp4").unwrap();
        sink.play();
        headless.grant_gesture();
        sink.play();

        let seen = seen.borrow();
        assert_eq!(seen[0], MediaEvent::LoadedMetadata { duration: 60.0 });
        assert!(matches!(seen[1], MediaEvent::PlayRejected { .. }));
        assert_eq!(seen[2], MediaEvent::Play);
    }

    #[test]
    fn test_advance_reaches_end() {
        let headless = Headless::default();
        let mut sink = headless.sink();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _sub = sink.listen(Rc::new(move |e| s.borrow_mut().push(e)));

        sink.set_source("clip.mp4").unwrap();
        sink.play();
        headless.advance(30.0);
        headless.advance(45.0);

        let seen = seen.borrow();
        assert!(seen.contains(&MediaEvent::TimeUpdate(30.0)));
        assert!(seen.contains(&MediaEvent::TimeUpdate(60.0)));
        assert_eq!(seen.last(), Some(&MediaEvent::Ended));
    }

    #[test]
    fn test_unsubscribe_removes_listener() {
        let headless = Headless::default();
        let mut sink = headless.sink();
        let sub = sink.listen(Rc::new(|_| {}));
        assert_eq!(headless.listener_count(), 1);
        drop(sub);
        assert_eq!(headless.listener_count(), 0);
    }
}

//! DASH engine
//!
//! Wraps a manifest-driven DASH library. Liveness comes from the parsed
//! manifest: dynamic manifests are live, static ones report a duration.

use super::streaming::{delegate_to_stream, LivePolicy, StreamEngine};
use crate::{BackendFactory, Error, EventEmitter, Result, SourceKind};

pub struct DashEngine {
    stream: StreamEngine,
}

impl DashEngine {
    pub fn new(locator: String, emitter: EventEmitter, backends: &mut dyn BackendFactory) -> Result<Self> {
        let session = backends
            .dash_session()
            .map_err(|e| Error::attach(SourceKind::Dash, e.to_string()))?;

        Ok(Self {
            stream: StreamEngine::new(SourceKind::Dash, locator, emitter, Some(session), LivePolicy::Reported),
        })
    }
}

delegate_to_stream!(DashEngine);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlaybackEngine;
    use crate::events::{channel, Envelope};
    use crate::headless::{Headless, HeadlessScript, SinkCall};
    use crate::{EngineEvent, Generation, StreamEvent};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<Envelope>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    #[test]
    fn test_static_manifest_is_vod() {
        let headless = Headless::default();
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, mut rx) = channel();

        let mut engine =
            DashEngine::new("movie.mpd".into(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, false).unwrap();

        assert!(!engine.is_live());
        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::LiveDetected(false)));
        assert!(events.contains(&EngineEvent::DurationKnown(60.0)));

        engine.seek(&mut sink, 12.0);
        engine.set_rate(&mut sink, 1.5);
        let calls = headless.sink_calls();
        assert!(calls.contains(&SinkCall::Seek(12.0)));
        assert!(calls.contains(&SinkCall::SetRate(1.5)));
    }

    #[test]
    fn test_dynamic_manifest_is_live() {
        let headless = Headless::new(HeadlessScript {
            dash_live: true,
            ..Default::default()
        });
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, mut rx) = channel();

        let mut engine =
            DashEngine::new("event.mpd".into(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, false).unwrap();

        assert!(engine.is_live());
        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::LiveDetected(true)));

        engine.seek(&mut sink, 12.0);
        assert!(!headless.sink_calls().contains(&SinkCall::Seek(12.0)));
    }

    #[test]
    fn test_liveness_follows_late_manifest() {
        let headless = Headless::new(HeadlessScript::manual());
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, mut rx) = channel();

        let mut engine =
            DashEngine::new("event.mpd".into(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        engine.attach(&mut sink, false).unwrap();
        assert!(!engine.is_live());
        assert!(drain(&mut rx).is_empty());

        headless.sessions()[0].deliver(StreamEvent::ManifestParsed {
            live: true,
            duration: None,
        });
        assert!(engine.is_live());
        assert_eq!(drain(&mut rx), vec![EngineEvent::LiveDetected(true)]);
    }

    #[test]
    fn test_attach_failure() {
        let headless = Headless::new(HeadlessScript {
            fail_attach: Some(SourceKind::Dash),
            ..Default::default()
        });
        let mut sink = headless.sink();
        let mut backends = headless.backends();
        let (tx, _rx) = channel();

        let mut engine =
            DashEngine::new("movie.mpd".into(), EventEmitter::new(Generation(1), tx, None), &mut backends).unwrap();
        let err = engine.attach(&mut sink, true).unwrap_err();
        assert!(matches!(err, Error::EngineAttachFailure { kind: SourceKind::Dash, .. }));
        assert!(!engine.is_attached());

        engine.detach(&mut sink);
        assert_eq!(headless.listener_count(), 0);
        assert_eq!(headless.active_attachments(), 0);
    }
}

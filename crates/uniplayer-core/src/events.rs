//! Engine events and the generation-tagged emitter
//!
//! Every engine instance gets an emitter bound to the generation it was built
//! for. The controller drops events whose generation is no longer current, so
//! callbacks still in flight from a replaced engine cannot touch the state.

use crate::FatalErrorKind;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tokio::sync::mpsc;
use tracing::trace;

/// Identifies one engine instance within a controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State deltas pushed by engine adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum EngineEvent {
    DurationKnown(f64),
    TimeUpdate(f64),
    PlayStateChanged(bool),
    LiveDetected(bool),
    /// Natural end of stream
    Ended,
    /// `play()` rejected by host policy
    PlayRejected(String),
    FatalError(FatalErrorKind),
}

/// Event tagged with the generation of the engine that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub generation: Generation,
    pub event: EngineEvent,
}

/// Callback invoked after each emitted event, so hosts can schedule a pump
pub type Waker = Rc<dyn Fn()>;

pub(crate) fn channel() -> (mpsc::UnboundedSender<Envelope>, mpsc::UnboundedReceiver<Envelope>) {
    mpsc::unbounded_channel()
}

/// Handle given to engine adapters and their backend listeners
#[derive(Clone)]
pub struct EventEmitter {
    generation: Generation,
    tx: mpsc::UnboundedSender<Envelope>,
    waker: Option<Waker>,
}

impl EventEmitter {
    pub(crate) fn new(
        generation: Generation,
        tx: mpsc::UnboundedSender<Envelope>,
        waker: Option<Waker>,
    ) -> Self {
        Self { generation, tx, waker }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Queue an event for the controller. Never blocks.
    pub fn emit(&self, event: EngineEvent) {
        let envelope = Envelope {
            generation: self.generation,
            event,
        };
        if self.tx.send(envelope).is_err() {
            trace!(generation = %self.generation, "Event queue closed, dropping event");
            return;
        }
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("generation", &self.generation)
            .finish()
    }
}

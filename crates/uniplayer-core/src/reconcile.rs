//! PlaybackState reconciliation
//!
//! [`fold`] is the only writer of [`PlaybackState`]. Engine events and
//! control changes both arrive as an [`Update`]; the controller filters stale
//! engine events before they get here.

use crate::{EngineEvent, PlaybackState, PlayerState, SourceKind, MAX_RATE, MIN_RATE};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Changes made by the controller itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "control", content = "value", rename_all = "snake_case")]
pub enum ControlChange {
    /// A new source replaced the previous one
    SourceChanged(SourceKind),
    Volume(f64),
    Muted(bool),
    Rate(f64),
    PitchPreserved(bool),
    /// Pause requested; folded without waiting for the engine
    Paused,
    /// Seek issued on a bounded timeline
    Seeked(f64),
    Fullscreen(bool),
}

/// Input to [`fold`]
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Engine(EngineEvent),
    Control(ControlChange),
}

impl From<EngineEvent> for Update {
    fn from(event: EngineEvent) -> Self {
        Update::Engine(event)
    }
}

impl From<ControlChange> for Update {
    fn from(change: ControlChange) -> Self {
        Update::Control(change)
    }
}

/// Move the state machine if the transition is legal
fn transition(state: &mut PlaybackState, target: PlayerState) {
    if state.state == target {
        return;
    }
    if state.state.can_transition_to(target) {
        state.state = target;
    } else {
        trace!(from = %state.state, to = %target, "Transition not allowed");
    }
}

/// Apply one update to a snapshot
pub fn fold(mut state: PlaybackState, update: &Update) -> PlaybackState {
    match update {
        Update::Engine(event) => fold_event(&mut state, event),
        Update::Control(change) => fold_control(&mut state, change),
    }
    state
}

fn fold_event(state: &mut PlaybackState, event: &EngineEvent) {
    match event {
        EngineEvent::DurationKnown(duration) => {
            if !state.is_live && duration.is_finite() {
                state.duration = duration.max(0.0);
            }
            if state.state == PlayerState::Loading {
                transition(state, PlayerState::Ready);
            }
        }
        EngineEvent::TimeUpdate(time) => {
            if time.is_finite() {
                state.current_time = time.max(0.0);
            }
        }
        EngineEvent::PlayStateChanged(true) => {
            if state.state.can_transition_to(PlayerState::Playing) || state.state == PlayerState::Playing {
                state.playing = true;
                transition(state, PlayerState::Playing);
            }
        }
        EngineEvent::PlayStateChanged(false) => {
            state.playing = false;
            transition(state, PlayerState::Paused);
        }
        EngineEvent::LiveDetected(live) => {
            state.is_live = *live;
            if *live {
                state.duration = 0.0;
                if state.state == PlayerState::Loading {
                    transition(state, PlayerState::Ready);
                }
            }
        }
        EngineEvent::Ended => {
            if state.is_live {
                trace!("Ignoring end of stream for live source");
                return;
            }
            state.playing = false;
            if state.duration > 0.0 {
                state.current_time = state.duration;
            }
            transition(state, PlayerState::Ended);
        }
        EngineEvent::PlayRejected(_) => {
            state.playing = false;
        }
        EngineEvent::FatalError(kind) => {
            state.playing = false;
            state.error = Some(kind.clone());
            transition(state, PlayerState::Error);
        }
    }
}

fn fold_control(state: &mut PlaybackState, change: &ControlChange) {
    match change {
        ControlChange::SourceChanged(kind) => {
            state.source = Some(*kind);
            state.playing = false;
            state.current_time = 0.0;
            state.duration = 0.0;
            state.is_live = false;
            state.error = None;
            transition(state, PlayerState::Loading);
        }
        ControlChange::Volume(volume) => {
            if volume.is_finite() {
                state.volume = volume.clamp(0.0, 1.0);
            }
        }
        ControlChange::Muted(muted) => state.muted = *muted,
        ControlChange::Rate(rate) => {
            if rate.is_finite() && *rate > 0.0 {
                state.rate = rate.clamp(MIN_RATE, MAX_RATE);
            }
        }
        ControlChange::PitchPreserved(preserve) => state.pitch_preserved = *preserve,
        ControlChange::Paused => {
            state.playing = false;
            transition(state, PlayerState::Paused);
        }
        ControlChange::Seeked(position) => {
            if position.is_finite() && !state.is_live {
                state.current_time = position.max(0.0);
            }
        }
        ControlChange::Fullscreen(fullscreen) => state.is_fullscreen = *fullscreen,
    }
}

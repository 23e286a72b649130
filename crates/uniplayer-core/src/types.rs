//! Core types for Uniplayer

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a controller instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend variant selected for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Progressive file played by the media element itself
    Progressive,
    /// HTTP Live Streaming manifest
    Hls,
    /// MPEG-DASH manifest
    Dash,
    /// Third-party iframe player
    RemoteEmbed,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Progressive => write!(f, "progressive"),
            SourceKind::Hls => write!(f, "hls"),
            SourceKind::Dash => write!(f, "dash"),
            SourceKind::RemoteEmbed => write!(f, "remote_embed"),
        }
    }
}

/// Embed providers with an iframe control API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedProvider {
    YouTube,
    Vimeo,
}

impl std::fmt::Display for EmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbedProvider::YouTube => write!(f, "YouTube"),
            EmbedProvider::Vimeo => write!(f, "Vimeo"),
        }
    }
}

/// Video identified on an embed provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbedTarget {
    pub provider: EmbedProvider,
    pub id: String,
}

/// Classified source. Derived once per source change and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Locator as given by the caller
    pub locator: String,
    /// Selected backend
    pub kind: SourceKind,
    /// Embed target, only for `SourceKind::RemoteEmbed`
    pub remote: Option<EmbedTarget>,
}

impl SourceDescriptor {
    /// Identifier of the remote video, if any
    pub fn remote_id(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.id.as_str())
    }
}

/// Unrecoverable failure reported by an engine mid-playback
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FatalErrorKind {
    /// Network exhausted (segment or manifest fetch, media network error)
    Network,
    /// Media could not be decoded
    Decode,
    /// Sink or backend refused the source format
    SourceNotSupported,
    /// Remote video does not exist or is private
    NotFound,
    /// Remote owner disallows embedded playback
    EmbedNotAllowed,
    /// Anything else the backend flagged as fatal
    Other(String),
}

impl std::fmt::Display for FatalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalErrorKind::Network => write!(f, "network"),
            FatalErrorKind::Decode => write!(f, "decode"),
            FatalErrorKind::SourceNotSupported => write!(f, "source not supported"),
            FatalErrorKind::NotFound => write!(f, "not found"),
            FatalErrorKind::EmbedNotAllowed => write!(f, "embedding not allowed"),
            FatalErrorKind::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Player state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// No source set
    Empty,
    /// Engine attached, waiting for metadata
    Loading,
    /// Metadata known, not started
    Ready,
    /// Engine confirmed playback
    Playing,
    /// Playback paused
    Paused,
    /// Non-live source reached its end
    Ended,
    /// Attach or mid-stream failure
    Error,
}

impl PlayerState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        matches!(
            (self, target),
            // A new source restarts from any state
            (_, Loading) |
            // From Loading
            (Loading, Ready) | (Loading, Playing) | (Loading, Paused) | (Loading, Error) |
            // From Ready
            (Ready, Playing) | (Ready, Paused) | (Ready, Ended) | (Ready, Error) |
            // From Playing
            (Playing, Paused) | (Playing, Ended) | (Playing, Error) |
            // From Paused
            (Paused, Playing) | (Paused, Ended) | (Paused, Error) |
            // From Ended
            (Ended, Playing) | (Ended, Paused) | (Ended, Error)
        )
    }

    /// True once an engine has produced something playable
    pub fn has_started(&self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused | PlayerState::Ended)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Empty => write!(f, "empty"),
            PlayerState::Loading => write!(f, "loading"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Ended => write!(f, "ended"),
            PlayerState::Error => write!(f, "error"),
        }
    }
}

/// Snapshot observed by presentation shells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// State machine position
    pub state: PlayerState,
    /// Engine confirmed that media is playing
    pub playing: bool,
    pub muted: bool,
    /// Volume in [0, 1]
    pub volume: f64,
    /// Playback rate, always > 0
    pub rate: f64,
    /// Keep audio pitch when the rate changes
    pub pitch_preserved: bool,
    /// Position in seconds
    pub current_time: f64,
    /// Duration in seconds; 0 means unknown or live
    pub duration: f64,
    pub is_live: bool,
    pub is_fullscreen: bool,
    /// Backend of the current source
    pub source: Option<SourceKind>,
    /// Last fatal error, cleared on source change
    pub error: Option<FatalErrorKind>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            state: PlayerState::Empty,
            playing: false,
            muted: false,
            volume: 1.0,
            rate: 1.0,
            pitch_preserved: true,
            current_time: 0.0,
            duration: 0.0,
            is_live: false,
            is_fullscreen: false,
            source: None,
            error: None,
        }
    }
}

impl PlaybackState {
    /// Initial snapshot for a controller built with `config`
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            muted: config.initial_muted,
            volume: config.initial_volume,
            rate: config.initial_rate,
            pitch_preserved: config.preserve_pitch,
            ..Default::default()
        }
    }

    /// Fraction of the timeline played, for progress bars. Always 0 for live
    /// or unknown durations.
    pub fn progress(&self) -> f64 {
        if self.is_live || self.duration <= 0.0 {
            0.0
        } else {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        }
    }

    /// Volume level bucket for the volume control icon
    pub fn volume_level(&self) -> VolumeLevel {
        VolumeLevel::from_volume(self.volume, self.muted)
    }
}

/// Lowest playback rate accepted by media elements
pub const MIN_RATE: f64 = 0.0625;
/// Highest playback rate accepted by media elements
pub const MAX_RATE: f64 = 16.0;
/// Rates offered by the settings menu
pub const RATE_PRESETS: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Issue `play()` right after a source is attached
    pub autoplay: bool,
    /// Volume applied before the first source, in [0, 1]
    pub initial_volume: f64,
    /// Start muted
    pub initial_muted: bool,
    /// Playback rate applied to every source
    pub initial_rate: f64,
    /// Keep pitch when playing at a non-unit rate
    pub preserve_pitch: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            initial_volume: 1.0,
            initial_muted: false,
            initial_rate: 1.0,
            preserve_pitch: true,
        }
    }
}

impl PlayerConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::InvalidConfig(format!(
                "initial_volume must be within [0, 1], got {}",
                self.initial_volume
            )));
        }
        if !(MIN_RATE..=MAX_RATE).contains(&self.initial_rate) {
            return Err(Error::InvalidConfig(format!(
                "initial_rate must be within [{}, {}], got {}",
                MIN_RATE, MAX_RATE, self.initial_rate
            )));
        }
        Ok(())
    }
}

/// Per-source options for `set_source`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Overrides `PlayerConfig::autoplay` for this source
    pub autoplay: Option<bool>,
}

/// Volume icon buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeLevel {
    Muted,
    Low,
    Medium,
    High,
}

impl VolumeLevel {
    pub fn from_volume(volume: f64, muted: bool) -> Self {
        if muted || volume <= 0.0 {
            VolumeLevel::Muted
        } else if volume <= 0.33 {
            VolumeLevel::Low
        } else if volume <= 0.66 {
            VolumeLevel::Medium
        } else {
            VolumeLevel::High
        }
    }
}

/// Format seconds as `m:ss` for the time display
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert!(PlayerState::Empty.can_transition_to(PlayerState::Loading));
        assert!(PlayerState::Error.can_transition_to(PlayerState::Loading));
        assert!(PlayerState::Loading.can_transition_to(PlayerState::Ready));
        assert!(PlayerState::Playing.can_transition_to(PlayerState::Paused));
        assert!(PlayerState::Paused.can_transition_to(PlayerState::Playing));
        assert!(PlayerState::Ended.can_transition_to(PlayerState::Playing));

        assert!(!PlayerState::Empty.can_transition_to(PlayerState::Playing));
        assert!(!PlayerState::Error.can_transition_to(PlayerState::Playing));
        assert!(!PlayerState::Playing.can_transition_to(PlayerState::Ready));
        assert!(!PlayerState::Loading.can_transition_to(PlayerState::Ended));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(59.9), "0:59");
        assert_eq!(format_time(61.0), "1:01");
        assert_eq!(format_time(3725.0), "62:05");
        assert_eq!(format_time(f64::INFINITY), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    #[test]
    fn test_volume_level() {
        assert_eq!(VolumeLevel::from_volume(0.8, true), VolumeLevel::Muted);
        assert_eq!(VolumeLevel::from_volume(0.0, false), VolumeLevel::Muted);
        assert_eq!(VolumeLevel::from_volume(0.33, false), VolumeLevel::Low);
        assert_eq!(VolumeLevel::from_volume(0.5, false), VolumeLevel::Medium);
        assert_eq!(VolumeLevel::from_volume(1.0, false), VolumeLevel::High);
    }

    #[test]
    fn test_config_from_json() {
        let config = PlayerConfig::from_json(r#"{"autoplay": false, "initial_volume": 0.4}"#).unwrap();
        assert!(!config.autoplay);
        assert_eq!(config.initial_volume, 0.4);
        assert_eq!(config.initial_rate, 1.0);
        assert!(config.preserve_pitch);

        assert!(matches!(
            PlayerConfig::from_json(r#"{"initial_volume": 3.0}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(PlayerConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_progress() {
        let mut state = PlaybackState {
            current_time: 30.0,
            duration: 120.0,
            ..Default::default()
        };
        assert_eq!(state.progress(), 0.25);

        state.is_live = true;
        assert_eq!(state.progress(), 0.0);
    }
}

//! Output formatting for CLI

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use uniplayer_core::{format_time, PlaybackState, SourceDescriptor};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// One classified locator
#[derive(Debug, Serialize, Tabled)]
pub struct ClassifyRow {
    pub locator: String,
    pub kind: String,
    pub provider: String,
    pub id: String,
    pub error: String,
}

impl ClassifyRow {
    pub fn classified(descriptor: &SourceDescriptor) -> Self {
        Self {
            locator: descriptor.locator.clone(),
            kind: descriptor.kind.to_string(),
            provider: descriptor
                .remote
                .as_ref()
                .map(|r| r.provider.to_string())
                .unwrap_or_default(),
            id: descriptor.remote_id().unwrap_or_default().to_string(),
            error: String::new(),
        }
    }

    pub fn rejected(locator: &str, error: &uniplayer_core::Error) -> Self {
        Self {
            locator: locator.to_string(),
            kind: "-".to_string(),
            provider: String::new(),
            id: String::new(),
            error: format!("{} ({})", error, error.error_code()),
        }
    }
}

/// State after one simulation step
#[derive(Debug, Serialize, Tabled)]
pub struct StepRow {
    pub step: String,
    pub state: String,
    pub playing: bool,
    pub time: String,
    pub duration: String,
    pub live: bool,
    pub volume: String,
    pub muted: bool,
    pub rate: String,
    #[tabled(display_with = "display_error")]
    pub error: Option<String>,
}

fn display_error(error: &Option<String>) -> String {
    error.clone().unwrap_or_default()
}

impl StepRow {
    pub fn new(step: impl Into<String>, state: &PlaybackState) -> Self {
        Self {
            step: step.into(),
            state: state.state.to_string(),
            playing: state.playing,
            time: format_time(state.current_time),
            duration: if state.is_live {
                "live".to_string()
            } else {
                format_time(state.duration)
            },
            live: state.is_live,
            volume: format!("{:.2}", state.volume),
            muted: state.muted,
            rate: format!("{}x", state.rate),
            error: state.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Render rows in the selected format
pub fn render<T: Serialize + Tabled>(rows: &[T], format: OutputFormat, text: impl Fn(&T) -> String) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string()),
        OutputFormat::Table => Table::new(rows).with(Style::rounded()).to_string(),
        OutputFormat::Text => rows.iter().map(text).collect::<Vec<_>>().join("\n"),
    }
}

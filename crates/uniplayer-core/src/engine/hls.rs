//! HLS engine
//!
//! Plays `.m3u8` manifests through a segment-fetching library when the host
//! has one. Otherwise the manifest is assigned to the media element, which
//! plays HLS natively on some platforms. Either way the source is treated as
//! live.

use super::streaming::{delegate_to_stream, LivePolicy, StreamEngine};
use crate::{BackendFactory, Error, EventEmitter, Result, SourceKind};
use tracing::debug;

pub struct HlsEngine {
    stream: StreamEngine,
}

impl HlsEngine {
    pub fn new(locator: String, emitter: EventEmitter, backends: &mut dyn BackendFactory) -> Result<Self> {
        let session = if backends.supports_hls() {
            let session = backends
                .hls_session()
                .map_err(|e| Error::attach(SourceKind::Hls, e.to_string()))?;
            Some(session)
        } else {
            debug!(locator = %locator, "No HLS library available, using native playback");
            None
        };

        Ok(Self {
            stream: StreamEngine::new(SourceKind::Hls, locator, emitter, session, LivePolicy::Always),
        })
    }

    /// Whether the manifest is played by the media element itself
    pub fn is_native(&self) -> bool {
        self.stream.is_native()
    }
}

delegate_to_stream!(HlsEngine);

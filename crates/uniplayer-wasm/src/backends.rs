//! Browser backend factory

use crate::remote::{VimeoRemote, YouTubePlayer};
use crate::streaming::{hls_supported, DashJsSession, HlsJsSession};
use uniplayer_core::{BackendError, BackendFactory, EmbedProvider, RemotePlayer, StreamingSession};
use web_sys::{HtmlElement, HtmlVideoElement};

/// Builds hls.js, dash.js and iframe player bridges for one player
pub struct WebBackends {
    video: HtmlVideoElement,
    container: HtmlElement,
}

impl WebBackends {
    pub fn new(video: HtmlVideoElement, container: HtmlElement) -> Self {
        Self { video, container }
    }
}

impl BackendFactory for WebBackends {
    fn supports_hls(&self) -> bool {
        hls_supported()
    }

    fn hls_session(&mut self) -> Result<Box<dyn StreamingSession>, BackendError> {
        Ok(Box::new(HlsJsSession::new(self.video.clone())))
    }

    fn dash_session(&mut self) -> Result<Box<dyn StreamingSession>, BackendError> {
        Ok(Box::new(DashJsSession::new(self.video.clone())))
    }

    fn remote_player(&mut self, provider: EmbedProvider) -> Result<Box<dyn RemotePlayer>, BackendError> {
        Ok(match provider {
            EmbedProvider::YouTube => Box::new(YouTubePlayer::new(self.container.clone())),
            EmbedProvider::Vimeo => Box::new(VimeoRemote::new(self.container.clone())),
        })
    }
}

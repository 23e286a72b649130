//! Source classification
//!
//! Picks the backend for a locator: embed-provider URLs first, then manifest
//! extensions, then progressive playback.

use crate::{EmbedProvider, EmbedTarget, Error, Result, SourceDescriptor, SourceKind};
use url::Url;

/// HLS manifest suffix
pub const HLS_EXTENSION: &str = ".m3u8";
/// DASH manifest suffix
pub const DASH_EXTENSION: &str = ".mpd";

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];
const YOUTUBE_SHORT_HOST: &str = "youtu.be";
const VIMEO_HOSTS: &[&str] = &["vimeo.com", "www.vimeo.com", "player.vimeo.com"];

/// Classify a locator into a source descriptor.
///
/// Fails only when the locator points at a known embed provider but carries
/// no usable video identifier.
pub fn classify(locator: &str) -> Result<SourceDescriptor> {
    let trimmed = locator.trim();

    if let Some(url) = parse_locator(trimmed) {
        if let Some(provider) = embed_provider(&url) {
            let id = extract_embed_id(provider, &url).ok_or_else(|| {
                Error::UnrecognizedEmbedFormat {
                    locator: locator.to_string(),
                }
            })?;
            return Ok(SourceDescriptor {
                locator: locator.to_string(),
                kind: SourceKind::RemoteEmbed,
                remote: Some(EmbedTarget { provider, id }),
            });
        }
    }

    Ok(SourceDescriptor {
        locator: locator.to_string(),
        kind: detect_stream_kind(trimmed),
        remote: None,
    })
}

/// Detect HLS/DASH/progressive from the locator path
pub fn detect_stream_kind(locator: &str) -> SourceKind {
    let path = locator_path(locator).to_lowercase();
    if path.ends_with(HLS_EXTENSION) {
        SourceKind::Hls
    } else if path.ends_with(DASH_EXTENSION) {
        SourceKind::Dash
    } else {
        SourceKind::Progressive
    }
}

/// Path component of a locator, without query or fragment. Works for
/// relative locators that `Url` rejects.
fn locator_path(locator: &str) -> &str {
    let end = locator.find(['?', '#']).unwrap_or(locator.len());
    &locator[..end]
}

/// Parse absolute locators, retrying scheme-less ones (`youtu.be/ID`) as https
fn parse_locator(locator: &str) -> Option<Url> {
    match Url::parse(locator) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", locator)).ok()
        }
        Err(_) => None,
    }
}

fn embed_provider(url: &Url) -> Option<EmbedProvider> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_lowercase();
    if host == YOUTUBE_SHORT_HOST || YOUTUBE_HOSTS.contains(&host.as_str()) {
        Some(EmbedProvider::YouTube)
    } else if VIMEO_HOSTS.contains(&host.as_str()) {
        Some(EmbedProvider::Vimeo)
    } else {
        None
    }
}

fn extract_embed_id(provider: EmbedProvider, url: &Url) -> Option<String> {
    match provider {
        EmbedProvider::YouTube => youtube_id(url),
        EmbedProvider::Vimeo => vimeo_id(url),
    }
}

fn youtube_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = if url.host_str()? == YOUTUBE_SHORT_HOST {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        }
    };

    candidate.filter(|id| is_youtube_id(id))
}

fn is_youtube_id(id: &str) -> bool {
    id.len() == 11
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn vimeo_id(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(locator: &str) -> SourceKind {
        classify(locator).unwrap().kind
    }

    #[test]
    fn test_detect_hls() {
        assert_eq!(kind("stream.m3u8"), SourceKind::Hls);
        assert_eq!(kind("https://example.com/live/master.m3u8"), SourceKind::Hls);
        assert_eq!(kind("https://example.com/master.M3U8?token=abc"), SourceKind::Hls);
        assert_eq!(kind("/relative/index.m3u8#t=10"), SourceKind::Hls);
    }

    #[test]
    fn test_detect_dash() {
        assert_eq!(kind("https://example.com/manifest.mpd"), SourceKind::Dash);
        assert_eq!(kind("manifest.mpd?session=1"), SourceKind::Dash);
    }

    #[test]
    fn test_detect_progressive() {
        assert_eq!(kind("clip.mp4"), SourceKind::Progressive);
        assert_eq!(
            kind("https://interactive-examples.mdn.mozilla.net/media/cc0-videos/flower.mp4"),
            SourceKind::Progressive
        );
        assert_eq!(kind(""), SourceKind::Progressive);
        assert_eq!(kind("not a url at all"), SourceKind::Progressive);
        // Extension only in the query does not count
        assert_eq!(kind("https://example.com/play?file=a.m3u8"), SourceKind::Progressive);
        assert_eq!(kind("https://example.com/a.mpd.mp4"), SourceKind::Progressive);
    }

    #[test]
    fn test_youtube_forms() {
        let forms = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "youtu.be/dQw4w9WgXcQ",
            "www.youtube.com/watch?v=dQw4w9WgXcQ",
        ];
        for locator in forms {
            let descriptor = classify(locator).unwrap();
            assert_eq!(descriptor.kind, SourceKind::RemoteEmbed, "{}", locator);
            assert_eq!(descriptor.remote_id(), Some("dQw4w9WgXcQ"), "{}", locator);
            assert_eq!(
                descriptor.remote.as_ref().map(|r| r.provider),
                Some(EmbedProvider::YouTube)
            );
        }
    }

    #[test]
    fn test_vimeo_forms() {
        for locator in [
            "https://vimeo.com/76979871",
            "https://player.vimeo.com/video/76979871",
            "https://vimeo.com/channels/staffpicks/76979871",
        ] {
            let descriptor = classify(locator).unwrap();
            assert_eq!(descriptor.kind, SourceKind::RemoteEmbed);
            assert_eq!(descriptor.remote_id(), Some("76979871"));
        }
    }

    #[test]
    fn test_unrecognized_embed() {
        for locator in [
            "https://www.youtube.com/feed/trending",
            "https://www.youtube.com/watch?v=short",
            "https://youtu.be/",
            "https://vimeo.com/channels/staffpicks",
        ] {
            assert!(
                matches!(classify(locator), Err(Error::UnrecognizedEmbedFormat { .. })),
                "{}",
                locator
            );
        }
    }

    #[test]
    fn test_embed_takes_priority() {
        // A manifest-looking path on an embed host is still an embed
        assert!(classify("https://www.youtube.com/embed/video.m3u8").is_err());
    }

    #[test]
    fn test_descriptor_keeps_locator() {
        let descriptor = classify("  clip.mp4 ").unwrap();
        assert_eq!(descriptor.locator, "  clip.mp4 ");
        assert!(descriptor.remote.is_none());
    }
}

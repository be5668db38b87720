pub mod lavalink;
pub mod resolver;
pub mod thumbnail;

use async_trait::async_trait;

use crate::error::AudioResult;

pub use lavalink::LavalinkNode;
pub use resolver::{QueryKind, ResolvedTrack, TrackResolver};

/// Fuente de búsqueda de tracks (Lavalink en producción)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackProvider: Send + Sync {
    /// Resolves an identifier (URL or `prefix:terms`) into candidates,
    /// best match first.
    async fn fetch_tracks(&self, identifier: &str) -> AudioResult<Vec<Track>>;
}

/// Lavalink sources that only mirror metadata; yt-dlp can not extract
/// audio from their URIs.
const MIRRORED_SOURCES: [&str; 6] = ["spotify", "applemusic", "deezer", "yandexmusic", "tidal", "qobuz"];

/// A resolved, playable track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    uri: String,
    author: Option<String>,
    artwork_url: Option<String>,
    /// Lavalink's opaque encoding of the track.
    encoded: Option<String>,
    source_name: Option<String>,
    /// Where the audio is actually pulled from, when not `uri`.
    stream_uri: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
            author: None,
            artwork_url: None,
            encoded: None,
            source_name: None,
            stream_uri: None,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn uri(&self) -> &str {
        &self.uri
    }
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
    pub fn artwork_url(&self) -> Option<&str> {
        self.artwork_url.as_deref()
    }
    pub fn encoded(&self) -> Option<&str> {
        self.encoded.as_deref()
    }
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// URI handed to yt-dlp for playback.
    pub fn stream_uri(&self) -> &str {
        self.stream_uri.as_deref().unwrap_or(&self.uri)
    }

    /// Whether yt-dlp can pull audio from `uri` directly.
    pub fn is_extractable(&self) -> bool {
        !self
            .source_name
            .as_deref()
            .is_some_and(|source| MIRRORED_SOURCES.contains(&source))
    }

    // Setters
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_artwork_url(mut self, artwork_url: impl Into<String>) -> Self {
        self.artwork_url = Some(artwork_url.into());
        self
    }

    pub fn with_encoded(mut self, encoded: impl Into<String>) -> Self {
        self.encoded = Some(encoded.into());
        self
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    pub fn with_stream_uri(mut self, stream_uri: impl Into<String>) -> Self {
        self.stream_uri = Some(stream_uri.into());
        self
    }
}

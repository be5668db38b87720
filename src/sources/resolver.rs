use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::{thumbnail, Track, TrackProvider};
use crate::error::{AudioError, AudioResult};

/// How a user query is sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Absolute URL, passed through verbatim.
    Url,
    /// Free text, prefixed with the provider's search directive.
    Search,
}

impl QueryKind {
    /// A query is a URL when it has both a scheme and a host.
    pub fn classify(query: &str) -> Self {
        match Url::parse(query.trim()) {
            Ok(url) if url.has_host() && !url.scheme().is_empty() => Self::Url,
            _ => Self::Search,
        }
    }

    pub fn source_label(self) -> &'static str {
        match self {
            Self::Url => "Multi-source link",
            Self::Search => "YouTube",
        }
    }
}

/// Result of a resolution: the first candidate plus what the embed needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub track: Track,
    pub kind: QueryKind,
    pub thumbnail: Option<String>,
}

/// Turns a `/play` query into a single track.
pub struct TrackResolver {
    provider: Arc<dyn TrackProvider>,
    search_prefix: String,
}

impl TrackResolver {
    pub fn new(provider: Arc<dyn TrackProvider>, search_prefix: impl Into<String>) -> Self {
        Self {
            provider,
            search_prefix: search_prefix.into(),
        }
    }

    /// Identifier sent to the provider for `query`.
    pub fn identifier(&self, query: &str) -> (QueryKind, String) {
        let query = query.trim();
        match QueryKind::classify(query) {
            QueryKind::Url => (QueryKind::Url, query.to_string()),
            QueryKind::Search => (QueryKind::Search, format!("{}{}", self.search_prefix, query)),
        }
    }

    pub async fn resolve(&self, query: &str) -> AudioResult<ResolvedTrack> {
        let (kind, identifier) = self.identifier(query);
        debug!("🔍 Resolviendo {:?}: {}", kind, identifier);

        let mut track = self
            .first_candidate(&identifier)
            .await?
            .ok_or_else(|| AudioError::NoResults(query.trim().to_string()))?;

        if !track.is_extractable() {
            let mirror = self
                .find_mirror(&track)
                .await?
                .ok_or_else(|| AudioError::NoResults(query.trim().to_string()))?;
            track = track.with_stream_uri(mirror.uri());
        }

        let thumbnail = track
            .artwork_url()
            .map(str::to_string)
            .or_else(|| thumbnail::youtube_thumbnail(track.stream_uri()));

        info!("🎵 Track encontrado: {} ({})", track.title(), track.uri());
        Ok(ResolvedTrack {
            track,
            kind,
            thumbnail,
        })
    }

    async fn first_candidate(&self, identifier: &str) -> AudioResult<Option<Track>> {
        Ok(self.provider.fetch_tracks(identifier).await?.into_iter().next())
    }

    /// Searches for a streamable copy of a track from a metadata-only source.
    async fn find_mirror(&self, track: &Track) -> AudioResult<Option<Track>> {
        let terms = match track.author() {
            Some(author) => format!("{} - {}", author, track.title()),
            None => track.title().to_string(),
        };
        debug!(
            "🔁 {} no es extraíble ({:?}), buscando: {}",
            track.uri(),
            track.source_name(),
            terms
        );

        self.first_candidate(&format!("{}{}", self.search_prefix, terms)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockTrackProvider;
    use pretty_assertions::assert_eq;

    fn resolver_with(provider: MockTrackProvider) -> TrackResolver {
        TrackResolver::new(Arc::new(provider), "ytsearch:")
    }

    #[test]
    fn classifies_urls_and_search_terms() {
        assert_eq!(QueryKind::classify("https://youtu.be/abc123"), QueryKind::Url);
        assert_eq!(QueryKind::classify("lofi beats"), QueryKind::Search);
        assert_eq!(QueryKind::classify("localhost:8080"), QueryKind::Search);
        assert_eq!(QueryKind::classify("mailto:someone@example.com"), QueryKind::Search);
    }

    #[tokio::test]
    async fn search_terms_get_the_prefix() {
        let mut provider = MockTrackProvider::new();
        provider
            .expect_fetch_tracks()
            .withf(|identifier: &str| identifier == "ytsearch:lofi beats")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    Track::new("Lofi Beats", "https://www.youtube.com/watch?v=lofi1"),
                    Track::new("Other", "https://www.youtube.com/watch?v=other"),
                ])
            });

        let resolved = resolver_with(provider).resolve("lofi beats").await.unwrap();

        assert_eq!(resolved.kind, QueryKind::Search);
        assert_eq!(resolved.track.title(), "Lofi Beats");
        assert_eq!(
            resolved.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/lofi1/hqdefault.jpg")
        );
    }

    #[tokio::test]
    async fn urls_pass_through_and_keep_provider_artwork() {
        let mut provider = MockTrackProvider::new();
        provider
            .expect_fetch_tracks()
            .withf(|identifier: &str| identifier == "https://youtu.be/abc123")
            .times(1)
            .returning(|_| {
                Ok(vec![Track::new("Song", "https://youtu.be/abc123")
                    .with_author("Artist")
                    .with_artwork_url("https://cdn.example.com/art.jpg")])
            });

        let resolved = resolver_with(provider)
            .resolve("https://youtu.be/abc123")
            .await
            .unwrap();

        assert_eq!(resolved.kind, QueryKind::Url);
        assert_eq!(resolved.track.author(), Some("Artist"));
        assert_eq!(
            resolved.thumbnail.as_deref(),
            Some("https://cdn.example.com/art.jpg")
        );
    }

    #[tokio::test]
    async fn short_link_without_artwork_derives_thumbnail() {
        let mut provider = MockTrackProvider::new();
        provider
            .expect_fetch_tracks()
            .returning(|_| Ok(vec![Track::new("Song", "https://youtu.be/abc123")]));

        let resolved = resolver_with(provider)
            .resolve("https://youtu.be/abc123")
            .await
            .unwrap();

        assert_eq!(
            resolved.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/abc123/hqdefault.jpg")
        );
    }

    #[tokio::test]
    async fn metadata_only_sources_stream_from_a_search_match() {
        let mut provider = MockTrackProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_fetch_tracks()
            .withf(|identifier: &str| identifier == "https://open.spotify.com/track/4uLU6hMC")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(vec![Track::new("Song", "https://open.spotify.com/track/4uLU6hMC")
                    .with_author("Artist")
                    .with_source_name("spotify")
                    .with_artwork_url("https://i.scdn.co/image/cover")])
            });
        provider
            .expect_fetch_tracks()
            .withf(|identifier: &str| identifier == "ytsearch:Artist - Song")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(vec![Track::new("Artist - Song (Official)", "https://www.youtube.com/watch?v=mirror1")
                    .with_source_name("youtube")])
            });

        let resolved = resolver_with(provider)
            .resolve("https://open.spotify.com/track/4uLU6hMC")
            .await
            .unwrap();

        assert_eq!(resolved.track.title(), "Song");
        assert_eq!(resolved.track.uri(), "https://open.spotify.com/track/4uLU6hMC");
        assert_eq!(resolved.track.stream_uri(), "https://www.youtube.com/watch?v=mirror1");
        assert_eq!(resolved.thumbnail.as_deref(), Some("https://i.scdn.co/image/cover"));
    }

    #[tokio::test]
    async fn metadata_only_source_without_a_match_is_not_found() {
        let mut provider = MockTrackProvider::new();
        provider
            .expect_fetch_tracks()
            .withf(|identifier: &str| identifier.starts_with("https://"))
            .returning(|_| {
                Ok(vec![Track::new("Rare", "https://deezer.com/track/1").with_source_name("deezer")])
            });
        provider
            .expect_fetch_tracks()
            .withf(|identifier: &str| identifier == "ytsearch:Rare")
            .returning(|_| Ok(Vec::new()));

        let err = resolver_with(provider)
            .resolve("https://deezer.com/track/1")
            .await
            .unwrap_err();

        assert!(matches!(err, AudioError::NoResults(_)));
    }

    #[tokio::test]
    async fn extractable_sources_stream_from_their_own_uri() {
        let mut provider = MockTrackProvider::new();
        provider.expect_fetch_tracks().times(1).returning(|_| {
            Ok(vec![Track::new("Set", "https://soundcloud.com/dj/set").with_source_name("soundcloud")])
        });

        let resolved = resolver_with(provider)
            .resolve("https://soundcloud.com/dj/set")
            .await
            .unwrap();

        assert_eq!(resolved.track.stream_uri(), "https://soundcloud.com/dj/set");
    }

    #[tokio::test]
    async fn empty_results_are_not_found() {
        let mut provider = MockTrackProvider::new();
        provider.expect_fetch_tracks().returning(|_| Ok(Vec::new()));

        let err = resolver_with(provider).resolve("nothing here").await.unwrap_err();

        assert!(matches!(err, AudioError::NoResults(query) if query == "nothing here"));
    }

    #[tokio::test]
    async fn provider_outage_is_surfaced() {
        let mut provider = MockTrackProvider::new();
        provider
            .expect_fetch_tracks()
            .returning(|_| Err(AudioError::ProviderUnavailable("node not connected".into())));

        let err = resolver_with(provider).resolve("lofi beats").await.unwrap_err();

        assert!(matches!(err, AudioError::ProviderUnavailable(_)));
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use super::{Track, TrackProvider};
use crate::error::{AudioError, AudioResult};

/// Cliente REST de un nodo Lavalink v4, usado para buscar tracks
pub struct LavalinkNode {
    http: reqwest::Client,
    base_url: Url,
    password: String,
    connected: AtomicBool,
}

impl LavalinkNode {
    pub fn new(base_url: Url, password: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Error al crear cliente HTTP para Lavalink")?;

        Ok(Self {
            http,
            base_url,
            password: password.into(),
            connected: AtomicBool::new(false),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Probes `/version`. Lookups are refused until this succeeds once.
    pub async fn connect(&self) -> Result<String> {
        info!("🎼 Conectando a Lavalink en {}", self.base_url);

        let url = self.base_url.join("version")?;
        let version = self
            .http
            .get(url)
            .header("Authorization", &self.password)
            .send()
            .await
            .context("Lavalink no responde")?
            .error_for_status()
            .context("Lavalink rechazó la conexión")?
            .text()
            .await?;

        self.connected.store(true, Ordering::Release);
        info!("✅ Lavalink conectado (versión {})", version.trim());
        Ok(version)
    }
}

#[async_trait]
impl TrackProvider for LavalinkNode {
    async fn fetch_tracks(&self, identifier: &str) -> AudioResult<Vec<Track>> {
        if !self.is_connected() {
            return Err(AudioError::ProviderUnavailable(
                "Lavalink node is not connected".to_string(),
            ));
        }

        let url = self
            .base_url
            .join("v4/loadtracks")
            .map_err(|e| AudioError::ProviderUnavailable(e.to_string()))?;

        let response = self
            .http
            .get(url)
            .query(&[("identifier", identifier)])
            .header("Authorization", &self.password)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    warn!("🔌 Lavalink desconectado: {}", e);
                    self.connected.store(false, Ordering::Release);
                }
                AudioError::ProviderUnavailable(e.to_string())
            })?;

        let result: LoadResult = response
            .error_for_status()
            .map_err(|e| AudioError::ProviderUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AudioError::Playback(format!("invalid Lavalink response: {}", e)))?;

        result.into_tracks()
    }
}

/// Respuesta de `/v4/loadtracks`
#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
enum LoadResult {
    Track(LavalinkTrack),
    Playlist(PlaylistData),
    Search(Vec<LavalinkTrack>),
    Empty(serde::de::IgnoredAny),
    Error(LoadError),
}

impl LoadResult {
    fn into_tracks(self) -> AudioResult<Vec<Track>> {
        let tracks = match self {
            Self::Track(track) => vec![track],
            Self::Playlist(playlist) => playlist.tracks,
            Self::Search(tracks) => tracks,
            Self::Empty(_) => Vec::new(),
            Self::Error(error) => {
                return Err(AudioError::Playback(
                    error.message.unwrap_or_else(|| "unknown Lavalink error".to_string()),
                ))
            }
        };

        Ok(tracks.into_iter().filter_map(LavalinkTrack::into_track).collect())
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistData {
    tracks: Vec<LavalinkTrack>,
}

#[derive(Debug, Deserialize)]
struct LoadError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LavalinkTrack {
    encoded: Option<String>,
    info: TrackInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackInfo {
    title: String,
    author: Option<String>,
    uri: Option<String>,
    artwork_url: Option<String>,
    source_name: Option<String>,
}

impl LavalinkTrack {
    /// Tracks without a URI can not be streamed and are skipped.
    fn into_track(self) -> Option<Track> {
        let info = self.info;
        let mut track = Track::new(info.title, info.uri?);

        if let Some(author) = info.author.filter(|a| !a.is_empty()) {
            track = track.with_author(author);
        }
        if let Some(artwork) = info.artwork_url {
            track = track.with_artwork_url(artwork);
        }
        if let Some(encoded) = self.encoded {
            track = track.with_encoded(encoded);
        }
        if let Some(source) = info.source_name {
            track = track.with_source_name(source);
        }

        Some(track)
    }
}

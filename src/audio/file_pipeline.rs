//! `/playfile`: download a remote audio file and play it on the direct-file
//! backend.
//!
//! The downloaded copy is a [`TransientAudioFile`]. Once playback has started
//! the file is owned by the backend's finish callback and is deleted there,
//! after the track ends or fails. A failed download deletes it right away.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::backend::{BackendKind, Connection, FinishCallback, Playable};
use super::playback;
use crate::error::{AudioError, AudioResult, InvalidState};

/// Extensiones de audio aceptadas
pub const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "flac", "ogg"];

/// Local copy of a downloaded audio resource. Not `Clone`: whoever holds it
/// is the only one who can delete it.
#[derive(Debug)]
pub struct TransientAudioFile {
    path: PathBuf,
}

impl TransientAudioFile {
    /// Reserves a unique name `temp_<8 hex>_<filename>` in `dir`.
    pub fn new(dir: &Path, filename: &str) -> Self {
        let name = format!("temp_{:08x}_{}", fastrand::u32(..), filename);
        Self {
            path: dir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file. A file that was never written is fine.
    pub fn release(self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("🧹 Archivo temporal eliminado: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "⚠️ No se pudo eliminar archivo temporal {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Returned once a file has started playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedFile {
    pub filename: String,
    pub duration: Option<Duration>,
}

pub struct FilePipeline {
    http: reqwest::Client,
    staging_dir: PathBuf,
}

impl FilePipeline {
    pub fn new(http: reqwest::Client, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            staging_dir: staging_dir.into(),
        }
    }

    /// Checks that `raw` is an absolute URL whose path ends in a supported
    /// audio extension. Query strings (signed CDN links) are ignored.
    pub fn validate(raw: &str) -> AudioResult<Url> {
        let url = Url::parse(raw.trim())
            .ok()
            .filter(|url| url.has_host())
            .ok_or_else(|| AudioError::ValidationFailed(format!("not a URL: {}", raw)))?;

        let extension = Path::new(url.path())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension {
            Some(ext) if AUDIO_EXTENSIONS.contains(&ext.as_str()) => Ok(url),
            _ => Err(AudioError::ValidationFailed(format!(
                "unsupported audio format: {}",
                url.path()
            ))),
        }
    }

    /// Last path segment of the URL, used in the reply and the staged name.
    pub fn filename(url: &Url) -> String {
        url.path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
            .unwrap_or("audio_file")
            .to_string()
    }

    /// Downloads `remote_url` and starts playing it on `connection`.
    ///
    /// Returns as soon as playback has started; the staged file is removed
    /// by the backend's finish callback later.
    pub async fn play_file(&self, connection: &Connection, remote_url: &str) -> AudioResult<StartedFile> {
        if connection.kind() != BackendKind::DirectFile {
            return Err(InvalidState::WrongBackend.into());
        }

        let url = Self::validate(remote_url)?;
        let filename = Self::filename(&url);

        // Detener música actual antes de descargar
        if connection.playback_state().await.is_active() {
            connection.stop().await?;
        }

        let staged = TransientAudioFile::new(&self.staging_dir, &filename);
        let bytes = match self.download(&url, staged.path()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                staged.release();
                return Err(e);
            }
        };
        info!("📥 Descargado {} ({} bytes)", filename, bytes);

        let duration = match probe_duration(staged.path().to_path_buf()).await {
            Ok(duration) => duration,
            Err(e) => {
                staged.release();
                return Err(AudioError::DownloadFailed(format!("not a playable audio file: {}", e)));
            }
        };

        let path = staged.path().to_path_buf();
        let name = filename.clone();
        let on_finish: FinishCallback = Box::new(move |error| {
            if let Some(error) = error {
                warn!("❌ Error al reproducir archivo {}: {}", name, error);
            }
            staged.release();
        });

        playback::play(connection, Playable::File { path, on_finish }).await?;

        Ok(StartedFile { filename, duration })
    }

    /// Streams the response body to `dest` chunk by chunk.
    async fn download(&self, url: &Url, dest: &Path) -> AudioResult<u64> {
        let failed = |e: &dyn std::fmt::Display| AudioError::DownloadFailed(e.to_string());

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(&e))?
            .error_for_status()
            .map_err(|e| failed(&e))?;

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| failed(&e))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(&e))?;
            file.write_all(&chunk).await.map_err(|e| failed(&e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| failed(&e))?;

        Ok(written)
    }
}

/// Probes the container with Symphonia. Fails when no decodable audio track
/// is found; the duration is only known for formats that declare it.
async fn probe_duration(path: PathBuf) -> Result<Option<Duration>, String> {
    tokio::task::spawn_blocking(move || probe_duration_blocking(&path))
        .await
        .map_err(|e| e.to_string())?
}

fn probe_duration_blocking(path: &Path) -> Result<Option<Duration>, String> {
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| e.to_string())?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| "no audio track".to_string())?;
    let params = &track.codec_params;

    Ok(match (params.n_frames, params.time_base) {
        (Some(frames), Some(time_base)) => {
            let time = time_base.calc_time(frames);
            Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
        }
        _ => None,
    })
}

//! Playback controls against whichever backend a guild is connected with.
//!
//! There is no queue: `play` always replaces the current track.

use tracing::info;

use super::backend::{Connection, Playable, PlaybackState};
use crate::error::{AudioResult, InvalidState};

/// Starts `playable`, replacing anything already playing.
///
/// Tracks need a streaming connection and files a direct-file connection.
/// On a mismatch the file's finish callback still runs, so a staged file
/// is never leaked.
pub async fn play(connection: &Connection, playable: Playable) -> AudioResult<()> {
    match (connection, playable) {
        (Connection::Streaming(conn), Playable::Track { track, on_end }) => {
            conn.play_track(&track, on_end).await?;
            info!("🎵 Reproduciendo: {}", track.title());
            Ok(())
        }
        (Connection::DirectFile(conn), Playable::File { path, on_finish }) => {
            info!("🎧 Reproduciendo archivo: {}", path.display());
            conn.play_file(path, on_finish).await
        }
        (_, Playable::File { on_finish, .. }) => {
            on_finish(Some("connection is not a direct-file backend".to_string()));
            Err(InvalidState::WrongBackend.into())
        }
        (_, Playable::Track { .. }) => Err(InvalidState::WrongBackend.into()),
    }
}

/// Pauses the current track. Streaming backend only.
pub async fn pause(connection: &Connection) -> AudioResult<()> {
    let conn = connection.streaming()?;
    if conn.playback_state().await != PlaybackState::Playing {
        return Err(InvalidState::NothingPlaying.into());
    }

    conn.pause().await?;
    info!("⏸️ Reproducción pausada");
    Ok(())
}

/// Resumes a paused track. Streaming backend only.
pub async fn resume(connection: &Connection) -> AudioResult<()> {
    let conn = connection.streaming()?;
    if conn.playback_state().await != PlaybackState::Paused {
        return Err(InvalidState::NothingPaused.into());
    }

    conn.resume().await?;
    info!("▶️ Reproducción reanudada");
    Ok(())
}

/// Stops the current track. Works on both backends; the connection and its
/// kind are left as they are.
pub async fn stop(connection: &Connection) -> AudioResult<()> {
    if !connection.playback_state().await.is_active() {
        return Err(InvalidState::NothingPlaying.into());
    }

    connection.stop().await?;
    info!("⏹️ Reproducción detenida");
    Ok(())
}

//! Voice backends and the connection handle owned by a guild session.
//!
//! A guild is connected through exactly one of two backends:
//!
//! - [`BackendKind::Streaming`]: remote tracks found through the search
//!   provider, with pause/resume support.
//! - [`BackendKind::DirectFile`]: downloaded files decoded locally.
//!
//! The kind is never stored separately from the connection: it is the variant
//! of [`Connection`], so the two can not disagree.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{AudioResult, InvalidState};
use crate::sources::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Streaming,
    DirectFile,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming => f.write_str("streaming"),
            Self::DirectFile => f.write_str("direct-file"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Playing or paused: a track is still attached to the connection.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Called once when a track or file finishes playing, with the error if it
/// failed.
pub type FinishCallback = Box<dyn FnOnce(Option<String>) + Send + 'static>;

/// Holds a [`FinishCallback`] until the first of `fire` or drop.
///
/// Backends share one of these between every event that can end a track
/// (end, error, the track being dropped with the call), so the
/// callback runs exactly once whichever comes first.
pub struct FinishOnce {
    callback: parking_lot::Mutex<Option<FinishCallback>>,
}

impl FinishOnce {
    pub fn new(callback: FinishCallback) -> Self {
        Self {
            callback: parking_lot::Mutex::new(Some(callback)),
        }
    }

    /// Runs the callback if it has not run yet. Returns whether it ran.
    pub fn fire(&self, error: Option<String>) -> bool {
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                callback(error);
                true
            }
            None => false,
        }
    }
}

impl Drop for FinishOnce {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.get_mut().take() {
            callback(Some("track dropped before it finished".to_string()));
        }
    }
}

/// Something a connection can play. Tracks go to the streaming backend,
/// files to the direct-file backend.
pub enum Playable {
    Track {
        track: Track,
        on_end: FinishCallback,
    },
    File {
        path: PathBuf,
        on_finish: FinishCallback,
    },
}

impl Playable {
    /// A track nobody needs to hear back from.
    pub fn track(track: Track) -> Self {
        Self::Track {
            track,
            on_end: Box::new(|_| {}),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Track { .. } => BackendKind::Streaming,
            Self::File { .. } => BackendKind::DirectFile,
        }
    }
}

impl std::fmt::Debug for Playable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Track { track, .. } => f.debug_tuple("Track").field(&track.title()).finish(),
            Self::File { path, .. } => f.debug_struct("File").field("path", path).finish(),
        }
    }
}

/// Operations shared by both backends.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// Whether the underlying voice link is still up. A connection replaced
    /// by a newer one for the same guild reports `false`.
    async fn is_connected(&self) -> bool;

    async fn playback_state(&self) -> PlaybackState;

    /// Stops the current track, if any. The connection stays up.
    async fn stop(&self) -> AudioResult<()>;

    async fn disconnect(&self) -> AudioResult<()>;
}

#[async_trait]
pub trait StreamingConnection: VoiceConnection {
    /// Replaces whatever is playing with `track`.
    ///
    /// `on_end` runs once when the track ends, errors or is replaced. It is
    /// dropped without running if playback can not start.
    async fn play_track(&self, track: &Track, on_end: FinishCallback) -> AudioResult<()>;

    async fn pause(&self) -> AudioResult<()>;

    async fn resume(&self) -> AudioResult<()>;
}

#[async_trait]
pub trait FileConnection: VoiceConnection {
    /// Starts decoding the file at `path`, replacing whatever is playing.
    ///
    /// Implementations must invoke `on_finish` exactly once: when the track
    /// ends, when it errors, or immediately if playback can not start.
    async fn play_file(&self, path: PathBuf, on_finish: FinishCallback) -> AudioResult<()>;
}

/// Opens voice connections for a guild.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        kind: BackendKind,
    ) -> AudioResult<Connection>;
}

/// The active voice connection of a guild, tagged with its backend.
#[derive(Clone)]
pub enum Connection {
    Streaming(Arc<dyn StreamingConnection>),
    DirectFile(Arc<dyn FileConnection>),
}

impl Connection {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Streaming(_) => BackendKind::Streaming,
            Self::DirectFile(_) => BackendKind::DirectFile,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::Streaming(conn) => conn.channel_id(),
            Self::DirectFile(conn) => conn.channel_id(),
        }
    }

    pub async fn is_connected(&self) -> bool {
        match self {
            Self::Streaming(conn) => conn.is_connected().await,
            Self::DirectFile(conn) => conn.is_connected().await,
        }
    }

    pub async fn playback_state(&self) -> PlaybackState {
        match self {
            Self::Streaming(conn) => conn.playback_state().await,
            Self::DirectFile(conn) => conn.playback_state().await,
        }
    }

    pub async fn stop(&self) -> AudioResult<()> {
        match self {
            Self::Streaming(conn) => conn.stop().await,
            Self::DirectFile(conn) => conn.stop().await,
        }
    }

    pub async fn disconnect(&self) -> AudioResult<()> {
        match self {
            Self::Streaming(conn) => conn.disconnect().await,
            Self::DirectFile(conn) => conn.disconnect().await,
        }
    }

    /// The streaming half of the connection, or `WrongBackend`.
    pub fn streaming(&self) -> Result<&Arc<dyn StreamingConnection>, InvalidState> {
        match self {
            Self::Streaming(conn) => Ok(conn),
            Self::DirectFile(_) => Err(InvalidState::WrongBackend),
        }
    }

    /// True when both handles point at the same underlying connection.
    pub fn same_as(&self, other: &Connection) -> bool {
        match (self, other) {
            (Self::Streaming(a), Self::Streaming(b)) => Arc::ptr_eq(a, b),
            (Self::DirectFile(a), Self::DirectFile(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.kind())
            .field("channel_id", &self.channel_id())
            .finish()
    }
}

/// What `ensure_backend` has to do to satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPlan {
    /// The existing connection already has the requested kind.
    Reuse,
    /// No connection yet.
    Connect,
    /// Disconnect the existing connection, then connect the requested kind.
    Replace,
}

pub fn plan_switch(current: Option<BackendKind>, requested: BackendKind) -> SwitchPlan {
    match current {
        None => SwitchPlan::Connect,
        Some(kind) if kind == requested => SwitchPlan::Reuse,
        Some(_) => SwitchPlan::Replace,
    }
}

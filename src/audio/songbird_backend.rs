//! Voice backends on top of Songbird.
//!
//! Both kinds share the same Songbird call; they only differ in the input
//! they feed it. Streaming tracks are pulled through yt-dlp from the track's
//! stream URI, files are decoded from local disk.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::error::JoinError;
use songbird::input::{File as FileInput, Input, YoutubeDl};
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::backend::{
    BackendKind, Connection, FileConnection, FinishCallback, FinishOnce, PlaybackState,
    StreamingConnection, VoiceConnection, VoiceGateway,
};
use crate::error::{AudioError, AudioResult};
use crate::sources::Track;

pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        kind: BackendKind,
    ) -> AudioResult<Connection> {
        info!("🔗 Conectando al canal {} en guild {}", channel_id, guild_id);

        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| AudioError::Voice(format!("join failed: {:?}", e)))?;

        let connection = Arc::new(SongbirdConnection {
            guild_id,
            channel_id,
            manager: self.manager.clone(),
            call,
            http: self.http.clone(),
            current: Mutex::new(None),
        });

        Ok(match kind {
            BackendKind::Streaming => Connection::Streaming(connection),
            BackendKind::DirectFile => Connection::DirectFile(connection),
        })
    }
}

pub struct SongbirdConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    /// Whether Songbird still maps the guild to this exact call.
    fn is_current_call(&self) -> bool {
        self.manager
            .get(self.guild_id)
            .is_some_and(|call| Arc::ptr_eq(&call, &self.call))
    }

    /// Replaces the current track with `input`. `on_finish` runs once on
    /// end, error or replacement, and right away if the track can not start.
    async fn start(&self, input: Input, title: String, on_finish: FinishCallback) -> AudioResult<()> {
        let finish = Arc::new(FinishOnce::new(on_finish));

        // Una llamada reemplazada sigue aceptando tracks que nadie escucha
        if !self.is_current_call() {
            finish.fire(Some("voice connection was replaced".to_string()));
            return Err(AudioError::Voice(format!(
                "connection to channel {} was replaced",
                self.channel_id
            )));
        }

        let handle = {
            let mut call = self.call.lock().await;
            call.stop();
            call.play_input(input)
        };
        *self.current.lock() = Some(handle.clone());

        for event in [TrackEvent::End, TrackEvent::Error] {
            let handler = TrackFinished {
                guild_id: self.guild_id,
                title: title.clone(),
                finish: finish.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), handler) {
                let _ = handle.stop();
                finish.fire(Some(e.to_string()));
                return Err(control_error(e));
            }
        }

        Ok(())
    }

    fn current_track(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }
}

fn control_error(e: impl std::fmt::Display) -> AudioError {
    AudioError::Playback(e.to_string())
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn is_connected(&self) -> bool {
        self.is_current_call() && self.call.lock().await.current_connection().is_some()
    }

    async fn playback_state(&self) -> PlaybackState {
        let Some(track) = self.current_track() else {
            return PlaybackState::Idle;
        };

        match track.get_info().await {
            Ok(state) => match state.playing {
                PlayMode::Play => PlaybackState::Playing,
                PlayMode::Pause => PlaybackState::Paused,
                _ => PlaybackState::Idle,
            },
            // El track ya terminó y fue liberado por el driver
            Err(_) => PlaybackState::Idle,
        }
    }

    async fn stop(&self) -> AudioResult<()> {
        self.call.lock().await.stop();
        self.current.lock().take();
        Ok(())
    }

    async fn disconnect(&self) -> AudioResult<()> {
        self.current.lock().take();

        if !self.is_current_call() {
            debug!("Conexión de guild {} ya reemplazada, nada que cerrar", self.guild_id);
            return Ok(());
        }

        match self.manager.remove(self.guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(AudioError::Voice(format!("leave failed: {:?}", e))),
        }
    }
}

#[async_trait]
impl StreamingConnection for SongbirdConnection {
    async fn play_track(&self, track: &Track, on_end: FinishCallback) -> AudioResult<()> {
        let input: Input = YoutubeDl::new(self.http.clone(), track.stream_uri().to_string()).into();
        self.start(input, track.title().to_string(), on_end).await
    }

    async fn pause(&self) -> AudioResult<()> {
        match self.current_track() {
            Some(track) => track.pause().map_err(control_error),
            None => Ok(()),
        }
    }

    async fn resume(&self) -> AudioResult<()> {
        match self.current_track() {
            Some(track) => track.play().map_err(control_error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FileConnection for SongbirdConnection {
    async fn play_file(&self, path: PathBuf, on_finish: FinishCallback) -> AudioResult<()> {
        let title = path.display().to_string();
        self.start(FileInput::new(path).into(), title, on_finish).await
    }
}

/// Runs the track's finish callback on end or error, whichever comes first.
struct TrackFinished {
    guild_id: GuildId,
    title: String,
    finish: Arc<FinishOnce>,
}

#[async_trait]
impl VoiceEventHandler for TrackFinished {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            }),
            _ => None,
        };

        if let Some(e) = &error {
            error!("❌ Error en track '{}' para guild {}: {}", self.title, self.guild_id, e);
        }
        if self.finish.fire(error) {
            debug!("🎧 '{}' terminado en guild {}", self.title, self.guild_id);
        }
        Some(Event::Cancel)
    }
}

//! Per-guild voice sessions and backend switching.
//!
//! [`SessionManager`] is the only owner of voice connections. Every guild has
//! a slot guarded by its own async mutex. All session work for a guild
//! (connect, switch, play, pause, leave, idle expiry) happens while holding
//! that lock, so no command ever observes or plays on a half-switched
//! session. Different guilds never contend with each other.

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::{plan_switch, BackendKind, Connection, FinishCallback, Playable, SwitchPlan, VoiceGateway};
use super::file_pipeline::{FilePipeline, StartedFile};
use super::idle::{IdleGuard, IdleSupervisor};
use super::playback;
use crate::error::{AudioError, AudioResult, InvalidState};
use crate::sources::Track;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// The active connection of a guild.
#[derive(Debug)]
pub struct VoiceSession {
    id: u64,
    connection: Connection,
    /// Present only for streaming sessions.
    idle: Option<IdleGuard>,
}

/// Lock-protected state of one guild.
#[derive(Debug, Default)]
pub struct GuildSlot {
    session: Option<VoiceSession>,
}

impl GuildSlot {
    pub fn connection(&self) -> Option<&Connection> {
        self.session.as_ref().map(|s| &s.connection)
    }

    /// Identifies the installed session; a reconnect gets a new id.
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    pub(super) fn install(&mut self, connection: Connection, idle: Option<IdleGuard>) {
        self.session = Some(VoiceSession {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            connection,
            idle,
        });
    }

    /// Replaces the idle timer of the current session, cancelling the old one.
    pub(super) fn rearm(&mut self, idle: IdleGuard) {
        if let Some(session) = self.session.as_mut() {
            session.idle = Some(idle);
        }
    }

    /// Drops the session; its idle timer, if any, is cancelled.
    pub(super) fn clear(&mut self) -> Option<Connection> {
        self.session.take().map(|s| s.connection)
    }
}

type SharedSlot = Arc<Mutex<GuildSlot>>;

pub struct SessionManager {
    gateway: Arc<dyn VoiceGateway>,
    slots: DashMap<GuildId, SharedSlot>,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn VoiceGateway>, idle_timeout: Duration) -> Self {
        info!(
            "🎵 Inicializando SessionManager (inactividad: {})",
            humantime::format_duration(idle_timeout)
        );

        Self {
            gateway,
            slots: DashMap::new(),
            idle_timeout,
        }
    }

    /// Slot of the guild, created on first use.
    fn slot(&self, guild_id: GuildId) -> SharedSlot {
        self.slots.entry(guild_id).or_default().clone()
    }

    /// Slot of the guild, only if it ever had a session.
    fn existing_slot(&self, guild_id: GuildId) -> Option<SharedSlot> {
        self.slots.get(&guild_id).map(|slot| slot.clone())
    }

    /// Returns a connection of `kind` for the guild, connecting to
    /// `user_channel` or replacing a connection of the other kind as needed.
    pub async fn ensure_backend(
        &self,
        guild_id: GuildId,
        kind: BackendKind,
        user_channel: Option<ChannelId>,
    ) -> AudioResult<Connection> {
        let channel_id = user_channel.ok_or(AudioError::NotInVoiceChannel)?;

        let slot = self.slot(guild_id);
        let mut state = slot.lock().await;
        self.ensure_locked(guild_id, &slot, &mut state, kind, channel_id).await
    }

    async fn ensure_locked(
        &self,
        guild_id: GuildId,
        slot: &SharedSlot,
        state: &mut GuildSlot,
        kind: BackendKind,
        channel_id: ChannelId,
    ) -> AudioResult<Connection> {
        let current = state.connection().map(Connection::kind);
        match plan_switch(current, kind) {
            SwitchPlan::Reuse => {
                if let Some(connection) = state.connection().cloned() {
                    if connection.is_connected().await {
                        return Ok(connection);
                    }
                }
                warn!("🔌 Conexión {} caída en guild {}, reconectando", kind, guild_id);
                state.clear();
                self.open(guild_id, slot, state, kind, channel_id).await
            }
            SwitchPlan::Connect => self.open(guild_id, slot, state, kind, channel_id).await,
            SwitchPlan::Replace => {
                if let Some(old) = state.clear() {
                    info!("🔄 Cambiando backend {} -> {} en guild {}", old.kind(), kind, guild_id);
                    old.disconnect()
                        .await
                        .map_err(|e| AudioError::BackendSwitchFailure(e.to_string()))?;
                }

                self.open(guild_id, slot, state, kind, channel_id)
                    .await
                    .map_err(|e| AudioError::BackendSwitchFailure(e.to_string()))
            }
        }
    }

    async fn open(
        &self,
        guild_id: GuildId,
        slot: &SharedSlot,
        state: &mut GuildSlot,
        kind: BackendKind,
        channel_id: ChannelId,
    ) -> AudioResult<Connection> {
        let connection = self.gateway.connect(guild_id, channel_id, kind).await?;

        let idle = match kind {
            BackendKind::Streaming => Some(self.arm_idle(guild_id, slot)),
            BackendKind::DirectFile => None,
        };
        state.install(connection.clone(), idle);

        info!("✅ Conectado ({}) al canal {} en guild {}", kind, channel_id, guild_id);
        Ok(connection)
    }

    fn arm_idle(&self, guild_id: GuildId, slot: &SharedSlot) -> IdleGuard {
        IdleSupervisor::arm(guild_id, Arc::downgrade(slot), self.idle_timeout)
    }

    /// Connects the streaming backend if needed and plays `track`, all under
    /// the guild lock. When the track ends on its own a new idle window
    /// starts.
    pub async fn play_track(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
        track: Track,
    ) -> AudioResult<Connection> {
        let channel_id = user_channel.ok_or(AudioError::NotInVoiceChannel)?;

        let slot = self.slot(guild_id);
        let mut state = slot.lock().await;
        let connection = self
            .ensure_locked(guild_id, &slot, &mut state, BackendKind::Streaming, channel_id)
            .await?;

        let playable = match state.session_id() {
            Some(session_id) => Playable::Track {
                track,
                on_end: self.rearm_on_end(guild_id, &slot, session_id),
            },
            None => Playable::track(track),
        };
        playback::play(&connection, playable).await?;

        Ok(connection)
    }

    /// Connects the direct-file backend if needed and runs the file pipeline,
    /// all under the guild lock.
    pub async fn play_file(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
        files: &FilePipeline,
        remote_url: &str,
    ) -> AudioResult<StartedFile> {
        let channel_id = user_channel.ok_or(AudioError::NotInVoiceChannel)?;

        let slot = self.slot(guild_id);
        let mut state = slot.lock().await;
        let connection = self
            .ensure_locked(guild_id, &slot, &mut state, BackendKind::DirectFile, channel_id)
            .await?;

        files.play_file(&connection, remote_url).await
    }

    /// Callback for a streaming track's end: restarts the idle window if the
    /// session that played it is still installed.
    fn rearm_on_end(&self, guild_id: GuildId, slot: &SharedSlot, session_id: u64) -> FinishCallback {
        let slot = Arc::downgrade(slot);
        let timeout = self.idle_timeout;

        Box::new(move |_error| {
            // Sin runtime (apagado) no hay nada que rearmar
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                return;
            };

            runtime.spawn(async move {
                let Some(slot) = slot.upgrade() else {
                    return;
                };
                let mut state = slot.lock().await;
                if state.session_id() != Some(session_id) {
                    return;
                }

                debug!("⏹️ Track terminado en guild {}, reiniciando inactividad", guild_id);
                let idle = IdleSupervisor::arm(guild_id, Arc::downgrade(&slot), timeout);
                state.rearm(idle);
            });
        })
    }

    /// Active connection of the guild, if any.
    pub async fn current(&self, guild_id: GuildId) -> Option<Connection> {
        let slot = self.existing_slot(guild_id)?;
        let state = slot.lock().await;
        state.connection().cloned()
    }

    /// Disconnects and removes the guild's session.
    pub async fn leave(&self, guild_id: GuildId) -> AudioResult<()> {
        let slot = self.existing_slot(guild_id).ok_or(InvalidState::NotConnected)?;
        let mut state = slot.lock().await;

        let connection = state.clear().ok_or(InvalidState::NotConnected)?;
        connection.disconnect().await?;

        info!("👋 Desconectado del guild {}", guild_id);
        Ok(())
    }

    /// Drops the session without talking to the backend, for when Discord
    /// already reported the bot out of the channel.
    pub async fn forget(&self, guild_id: GuildId) {
        let Some(slot) = self.existing_slot(guild_id) else {
            return;
        };

        if slot.lock().await.clear().is_some() {
            info!("🔌 Sesión de voz eliminada en guild {}", guild_id);
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> AudioResult<()> {
        let slot = self.existing_slot(guild_id).ok_or(InvalidState::NotConnected)?;
        let state = slot.lock().await;

        let connection = state.connection().ok_or(InvalidState::NotConnected)?;
        playback::pause(connection).await
    }

    pub async fn resume(&self, guild_id: GuildId) -> AudioResult<()> {
        let slot = self.existing_slot(guild_id).ok_or(InvalidState::NotConnected)?;
        let state = slot.lock().await;

        let connection = state.connection().ok_or(InvalidState::NotConnected)?;
        playback::resume(connection).await
    }

    /// Stops playback. A streaming session gets a fresh idle window, since
    /// the previous one may already have been spent while the track played.
    pub async fn stop(&self, guild_id: GuildId) -> AudioResult<()> {
        let slot = self.existing_slot(guild_id).ok_or(InvalidState::NotConnected)?;
        let mut state = slot.lock().await;

        let connection = state.connection().cloned().ok_or(InvalidState::NotConnected)?;
        playback::stop(&connection).await?;

        if connection.kind() == BackendKind::Streaming {
            state.rearm(self.arm_idle(guild_id, &slot));
        }

        Ok(())
    }
}

//! # Bot Module
//!
//! Discord glue around the voice session core. [`DualDeckBot`] implements
//! Serenity's [`EventHandler`] and:
//!
//! - registers the slash commands and connects the Lavalink node on ready
//! - dispatches slash commands to [`handlers`]
//! - forgets a guild's session when Discord reports the bot left voice
//! - deletes messages posted in the auto-delete channel after a delay

use anyhow::{Context as _, Result};
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Message, Ready, VoiceState},
    async_trait,
    http::{Http, HttpError},
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod profile;

use crate::{
    audio::{FilePipeline, SessionManager, SongbirdGateway},
    config::Config,
    sources::{LavalinkNode, TrackResolver},
};
use profile::RobloxClient;

pub struct DualDeckBot {
    config: Arc<Config>,
    /// Sesiones de voz por guild
    pub sessions: Arc<SessionManager>,
    pub resolver: TrackResolver,
    pub files: FilePipeline,
    pub roblox: RobloxClient,
    lavalink: Arc<LavalinkNode>,
}

impl DualDeckBot {
    pub fn new(config: Config, songbird: Arc<Songbird>) -> Result<Self> {
        let config = Arc::new(config);

        let lavalink_uri = url::Url::parse(&config.lavalink_uri).context("LAVALINK_URI inválida")?;
        let lavalink = Arc::new(LavalinkNode::new(lavalink_uri, config.lavalink_password.clone())?);
        let resolver = TrackResolver::new(lavalink.clone(), config.search_prefix.clone());

        // yt-dlp resuelve el stream; sin timeout global para no cortar tracks largos
        let stream_http = reqwest::Client::new();
        let gateway = Arc::new(SongbirdGateway::new(songbird, stream_http));
        let sessions = Arc::new(SessionManager::new(gateway, config.idle_timeout()));

        let download_http = reqwest::Client::builder()
            .timeout(config.download_timeout())
            .build()
            .context("Error al crear cliente HTTP de descargas")?;
        let files = FilePipeline::new(download_http, config.staging_dir.clone());

        Ok(Self {
            config,
            sessions,
            resolver,
            files,
            roblox: RobloxClient::new()?,
            lavalink,
        })
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        let count = match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?
            }
        };

        info!("🌐 Slash commands sincronizados ({} comandos)", count);
        Ok(())
    }

    async fn connect_lavalink(&self) {
        if self.lavalink.is_connected() {
            return;
        }

        match self.lavalink.connect().await {
            Ok(version) => debug!("🎵 Nodo Lavalink listo (v{})", version.trim()),
            Err(e) => {
                error!("❌ Error al conectar Lavalink: {:?}", e);
                warn!("🔄 /play no funcionará hasta que Lavalink esté disponible");
            }
        }
    }

    fn schedule_auto_delete(&self, http: Arc<Http>, msg: &Message) {
        let Some((channel, after)) = self.config.auto_delete() else {
            return;
        };
        if msg.channel_id.get() != channel {
            return;
        }

        let (channel_id, message_id) = (msg.channel_id, msg.id);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;

            match channel_id.delete_message(&http, message_id).await {
                Ok(()) => debug!("🗑️ Mensaje {} eliminado del canal {}", message_id, channel_id),
                Err(e) if is_gone_or_forbidden(&e) => {}
                Err(e) => warn!("⚠️ No se pudo eliminar el mensaje {}: {:?}", message_id, e),
            }
        });
    }
}

/// Message already deleted, or the bot may not delete it.
fn is_gone_or_forbidden(error: &serenity::Error) -> bool {
    match error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            matches!(response.status_code.as_u16(), 403 | 404)
        }
        _ => false,
    }
}

#[async_trait]
impl EventHandler for DualDeckBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("✅ Bot conectado: {} (ID: {})", ready.user.name, ready.user.id);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        self.connect_lavalink().await;

        if let Err(e) = self.register_commands(&ctx).await {
            error!("⚠️ Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        self.schedule_auto_delete(ctx.http.clone(), &msg);
    }

    /// Forgets the session when the bot is disconnected from voice by
    /// someone else. A leave we triggered ourselves finds nothing to forget.
    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        // Un cambio de backend desconecta y reconecta; no borrar la conexión nueva
        if let Some(connection) = self.sessions.current(guild_id).await {
            if connection.is_connected().await {
                debug!("🔌 Conexión nueva activa en guild {}, se ignora", guild_id);
                return;
            }
        }

        info!("🔌 Bot desconectado en guild {}", guild_id);
        self.sessions.forget(guild_id).await;
    }
}


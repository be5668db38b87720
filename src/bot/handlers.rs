use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
        mention::Mentionable,
    },
    prelude::Context,
};
use tracing::{error, info, warn};

use crate::{
    audio::{BackendKind, FilePipeline},
    bot::DualDeckBot,
    error::AudioError,
    ui::embeds,
};

/// Comandos que responden con `defer` porque hacen I/O lento
const DEFERRED_COMMANDS: [&str; 3] = ["play", "playfile", "roblox"];

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &DualDeckBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let deferred = DEFERRED_COMMANDS.contains(&command.data.name.as_str());
    if deferred {
        command.defer(&ctx.http).await?;
    }

    let result = match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await,
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "playfile" => handle_playfile(ctx, &command, bot, guild_id).await,
        "roblox" => handle_roblox(ctx, &command, bot).await,
        "send" => handle_send(ctx, &command).await,
        _ => respond(ctx, &command, "❌ Unknown command", true).await,
    };

    if let Err(e) = result {
        report_error(ctx, &command, deferred, &e).await?;
    }

    Ok(())
}

/// Turns a failed command into a reply. Session errors carry their own
/// message; anything else is logged and reported generically.
async fn report_error(
    ctx: &Context,
    command: &CommandInteraction,
    deferred: bool,
    error: &anyhow::Error,
) -> Result<()> {
    let message = match error.downcast_ref::<AudioError>() {
        Some(audio_error) => {
            warn!("⚠️ /{} rechazado: {}", command.data.name, audio_error);
            audio_error.user_message()
        }
        None => {
            error!("❌ Error en /{}: {:?}", command.data.name, error);
            "⚠️ Something went wrong, please try again.".to_string()
        }
    };

    if deferred {
        edit(ctx, command, message).await
    } else {
        respond(ctx, command, message, true).await
    }
}

// Handlers específicos para cada comando

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &DualDeckBot,
    guild_id: GuildId,
) -> Result<()> {
    let channel = user_voice_channel(ctx, guild_id, command.user.id);
    let connection = bot
        .sessions
        .ensure_backend(guild_id, BackendKind::Streaming, channel)
        .await?;

    respond(
        ctx,
        command,
        format!("✅ Joined {}", connection.channel_id().mention()),
        false,
    )
    .await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &DualDeckBot,
    guild_id: GuildId,
) -> Result<()> {
    bot.sessions.leave(guild_id).await?;
    respond(ctx, command, "👋 Left the voice channel!", false).await
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &DualDeckBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = string_option(command, "query")?;

    let channel = user_voice_channel(ctx, guild_id, command.user.id);
    if channel.is_none() {
        return Err(AudioError::NotInVoiceChannel.into());
    }

    // Resolver fuera del lock de la guild; Lavalink puede tardar
    let resolved = bot.resolver.resolve(query).await?;
    bot.sessions
        .play_track(guild_id, channel, resolved.track.clone())
        .await?;

    let embed = embeds::now_playing_embed(&resolved, &command.user);
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &DualDeckBot,
    guild_id: GuildId,
) -> Result<()> {
    bot.sessions.pause(guild_id).await?;
    respond(ctx, command, "⏸️ Paused.", false).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &DualDeckBot,
    guild_id: GuildId,
) -> Result<()> {
    bot.sessions.resume(guild_id).await?;
    respond(ctx, command, "▶️ Resumed.", false).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &DualDeckBot,
    guild_id: GuildId,
) -> Result<()> {
    bot.sessions.stop(guild_id).await?;
    respond(ctx, command, "⏹️ Stopped.", false).await
}

async fn handle_playfile(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &DualDeckBot,
    guild_id: GuildId,
) -> Result<()> {
    let url = string_option(command, "url")?;

    // Validar antes de tocar la conexión de voz
    FilePipeline::validate(url)?;

    let channel = user_voice_channel(ctx, guild_id, command.user.id);
    let started = bot
        .sessions
        .play_file(guild_id, channel, &bot.files, url)
        .await?;

    let embed = embeds::file_playing_embed(&started.filename, started.duration, &command.user);
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_roblox(ctx: &Context, command: &CommandInteraction, bot: &DualDeckBot) -> Result<()> {
    let username = string_option(command, "username")?;

    match bot.roblox.lookup(username).await {
        Ok(Some(profile)) => {
            let embed = embeds::roblox_profile_embed(&profile, &command.user);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            Ok(())
        }
        Ok(None) => edit(ctx, command, format!("User **{}** not found", username)).await,
        Err(e) => {
            warn!("⚠️ Error consultando Roblox para '{}': {:?}", username, e);
            edit(ctx, command, "⚠️ Could not reach the Roblox API.").await
        }
    }
}

async fn handle_send(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let is_admin = command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.administrator());

    if !is_admin {
        return respond(ctx, command, "❌ You don't have permission to use this command!", true).await;
    }

    let channel_id = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "channel")
        .and_then(|opt| opt.value.as_channel_id())
        .ok_or_else(|| anyhow::anyhow!("Canal no proporcionado"))?;
    let message = string_option(command, "message")?;

    match channel_id.say(&ctx.http, message).await {
        Ok(_) => {
            info!("📨 Mensaje enviado al canal {} por {}", channel_id, command.user.name);
            respond(ctx, command, format!("✅ Message sent to {}", channel_id.mention()), true).await
        }
        Err(e) => respond(ctx, command, format!("⚠️ Could not send the message: {}", e), true).await,
    }
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Result<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Opción '{}' no proporcionada", name))
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, content: impl Into<String>) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

/// Canal de voz actual del usuario, según la caché de la guild
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

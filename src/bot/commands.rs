use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, channel::ChannelType, id::GuildId, Permissions},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        play_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        playfile_command(),
        roblox_command(),
        send_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<usize> {
    let commands = all_commands();
    let count = commands.len();

    for command in commands {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(count)
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<usize> {
    let registered = guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(registered.len())
}

// Conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Join your voice channel")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leave the voice channel")
}

// Reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play music from YouTube, a link, or a search")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "Song name or YouTube/SoundCloud/Spotify link",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause the current stream")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume the paused stream")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback")
}

fn playfile_command() -> CreateCommand {
    CreateCommand::new("playfile")
        .description("Play an audio file from a URL (.mp3, .wav, .flac, .ogg)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "url", "Direct link to the audio file")
                .required(true),
        )
}

// Utilidades

fn roblox_command() -> CreateCommand {
    CreateCommand::new("roblox")
        .description("Look up a Roblox user")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "username", "Roblox username to look up")
                .required(true),
        )
}

fn send_command() -> CreateCommand {
    CreateCommand::new("send")
        .description("Send a message to a channel")
        .default_member_permissions(Permissions::ADMINISTRATOR)
        .add_option(
            CreateCommandOption::new(CommandOptionType::Channel, "channel", "Channel to send the message to")
                .channel_types(vec![ChannelType::Text, ChannelType::News])
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "message", "Message content")
                .required(true),
        )
}

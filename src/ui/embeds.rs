use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter},
    model::user::User,
};
use std::time::Duration;

use crate::{bot::profile::RobloxProfile, sources::ResolvedTrack};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Embed de `/play`: título enlazado, artista, miniatura y fuente.
pub fn now_playing_embed(resolved: &ResolvedTrack, requester: &User) -> CreateEmbed {
    let track = &resolved.track;

    let mut embed = CreateEmbed::new()
        .title(format!("🎶 Now playing: {}", track.title()))
        .url(track.uri())
        .color(colors::SUCCESS_GREEN)
        .footer(
            CreateEmbedFooter::new(format!(
                "Source: {} | Requested by {}",
                resolved.kind.source_label(),
                requester.name
            ))
            .icon_url(requester.face()),
        );

    if let Some(author) = track.author() {
        embed = embed.author(CreateEmbedAuthor::new(author).url(track.uri()));
    }

    if let Some(thumbnail) = &resolved.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Embed de `/playfile` una vez que el archivo empieza a sonar
pub fn file_playing_embed(filename: &str, duration: Option<Duration>, requester: &User) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("🎧 Playing file")
        .description(format!("**{}**", filename))
        .color(colors::MUSIC_PURPLE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(format!("Requested by {}", requester.name)).icon_url(requester.face()));

    if let Some(duration) = duration {
        embed = embed.field("⏱️ Duration", format_duration(duration), true);
    }

    embed
}

pub fn roblox_profile_embed(profile: &RobloxProfile, requester: &User) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("⭐ Roblox: {}", profile.display_name))
        .url(profile.profile_url())
        .color(colors::INFO_BLUE)
        .field("Username", format!("`{}`", profile.username), true)
        .field("User ID", format!("`{}`", profile.id), true)
        .field("Status", profile.presence.describe(), false)
        .field("Bio", profile.short_bio(), false)
        .footer(CreateEmbedFooter::new(format!("Requested by {}", requester.name)).icon_url(requester.face()));

    if let Some(avatar) = &profile.avatar_url {
        embed = embed.thumbnail(avatar);
    }

    embed
}

/// Formatea una duración como `m:ss` o `h:mm:ss`
fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::profile::Presence;
    use crate::sources::{QueryKind, Track};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn requester() -> User {
        let mut user = User::default();
        user.name = "alice".to_string();
        user
    }

    fn json(embed: &CreateEmbed) -> Value {
        serde_json::to_value(embed).unwrap()
    }

    #[test]
    fn now_playing_embed_shows_source_and_thumbnail() {
        let resolved = ResolvedTrack {
            track: Track::new("Song", "https://www.youtube.com/watch?v=abc123").with_author("Band"),
            kind: QueryKind::Search,
            thumbnail: Some("https://img.youtube.com/vi/abc123/hqdefault.jpg".to_string()),
        };

        let embed = json(&now_playing_embed(&resolved, &requester()));

        assert_eq!(embed["title"], "🎶 Now playing: Song");
        assert_eq!(embed["url"], "https://www.youtube.com/watch?v=abc123");
        assert_eq!(embed["author"]["name"], "Band");
        assert_eq!(embed["thumbnail"]["url"], "https://img.youtube.com/vi/abc123/hqdefault.jpg");
        assert_eq!(embed["footer"]["text"], "Source: YouTube | Requested by alice");
    }

    #[test]
    fn url_queries_are_labelled_multi_source() {
        let resolved = ResolvedTrack {
            track: Track::new("Clip", "https://soundcloud.com/a/b"),
            kind: QueryKind::Url,
            thumbnail: None,
        };

        let embed = json(&now_playing_embed(&resolved, &requester()));

        assert_eq!(embed["footer"]["text"], "Source: Multi-source link | Requested by alice");
        assert!(embed["author"].is_null());
        assert!(embed["thumbnail"].is_null());
    }

    #[test]
    fn roblox_embed_links_the_profile() {
        let profile = RobloxProfile {
            id: 156,
            username: "builderman".to_string(),
            display_name: "Builderman".to_string(),
            bio: String::new(),
            presence: Presence::Website,
            avatar_url: None,
        };

        let embed = json(&roblox_profile_embed(&profile, &requester()));

        assert_eq!(embed["url"], "https://www.roblox.com/users/156/profile");
        assert_eq!(embed["fields"][3]["value"], "No description.");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }
}

//! Roblox profile lookup for `/roblox`.

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USERS_API: &str = "https://users.roblox.com/v1";
const PRESENCE_API: &str = "https://presence.roblox.com/v1/presence/users";
const THUMBNAILS_API: &str = "https://thumbnails.roblox.com/v1/users/avatar-headshot";

/// Máximo de caracteres de la bio mostrados en el embed
pub const BIO_LIMIT: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Offline,
    Website,
    InGame(String),
}

impl Presence {
    /// Maps Roblox's `userPresenceType` (0 offline, 1 website, 2 in game).
    fn from_api(kind: u8, last_location: Option<String>) -> Self {
        match kind {
            1 => Self::Website,
            2 => Self::InGame(last_location.unwrap_or_else(|| "Unknown".to_string())),
            _ => Self::Offline,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Offline => "⚫ Offline".to_string(),
            Self::Website => "🟢 Online on the Roblox website".to_string(),
            Self::InGame(place) => format!("🎮 Playing: **{}**", place),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RobloxProfile {
    pub id: u64,
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub presence: Presence,
    pub avatar_url: Option<String>,
}

impl RobloxProfile {
    pub fn profile_url(&self) -> String {
        format!("https://www.roblox.com/users/{}/profile", self.id)
    }

    pub fn short_bio(&self) -> String {
        truncate_bio(&self.bio, BIO_LIMIT)
    }
}

/// Cuts `bio` to `limit` characters, marking the cut with "...".
pub fn truncate_bio(bio: &str, limit: usize) -> String {
    let bio = bio.trim();
    if bio.is_empty() {
        return "No description.".to_string();
    }

    let mut chars = bio.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[derive(Deserialize)]
struct DataList<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct UserId {
    id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDetails {
    name: Option<String>,
    display_name: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceList {
    user_presences: Vec<UserPresence>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPresence {
    user_presence_type: u8,
    last_location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Headshot {
    image_url: Option<String>,
}

pub struct RobloxClient {
    http: reqwest::Client,
}

impl RobloxClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }

    /// Looks a user up by name. `Ok(None)` when no such user exists.
    pub async fn lookup(&self, username: &str) -> Result<Option<RobloxProfile>> {
        let ids: DataList<UserId> = self
            .http
            .post(format!("{}/usernames/users", USERS_API))
            .json(&serde_json::json!({ "usernames": [username], "excludeBannedUsers": true }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("respuesta inválida de users.roblox.com")?;

        let Some(UserId { id }) = ids.data.into_iter().next() else {
            return Ok(None);
        };
        debug!("🔍 Usuario Roblox '{}' -> {}", username, id);

        let (details, presence, avatar_url) =
            tokio::try_join!(self.details(id), self.presence(id), self.avatar(id))?;

        Ok(Some(RobloxProfile {
            id,
            username: details.name.unwrap_or_else(|| "N/A".to_string()),
            display_name: details.display_name.unwrap_or_else(|| "N/A".to_string()),
            bio: details.description.unwrap_or_default(),
            presence,
            avatar_url,
        }))
    }

    async fn details(&self, id: u64) -> Result<UserDetails> {
        Ok(self
            .http
            .get(format!("{}/users/{}", USERS_API, id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn presence(&self, id: u64) -> Result<Presence> {
        let list: PresenceList = self
            .http
            .post(PRESENCE_API)
            .json(&serde_json::json!({ "userIds": [id] }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(list
            .user_presences
            .into_iter()
            .next()
            .map_or(Presence::Offline, |p| {
                Presence::from_api(p.user_presence_type, p.last_location)
            }))
    }

    async fn avatar(&self, id: u64) -> Result<Option<String>> {
        let id = id.to_string();
        let shots: DataList<Headshot> = self
            .http
            .get(THUMBNAILS_API)
            .query(&[
                ("userIds", id.as_str()),
                ("size", "150x150"),
                ("format", "Png"),
                ("isCircular", "false"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(shots.data.into_iter().next().and_then(|shot| shot.image_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn presence_types() {
        assert_eq!(Presence::from_api(0, None), Presence::Offline);
        assert_eq!(Presence::from_api(1, Some("ignored".into())), Presence::Website);
        assert_eq!(
            Presence::from_api(2, Some("Adopt Me!".into())).describe(),
            "🎮 Playing: **Adopt Me!**"
        );
        assert_eq!(Presence::from_api(3, None), Presence::Offline);
    }

    #[test]
    fn bio_is_cut_on_characters() {
        assert_eq!(truncate_bio("  ", BIO_LIMIT), "No description.");
        assert_eq!(truncate_bio("short bio", BIO_LIMIT), "short bio");

        let exact = "a".repeat(BIO_LIMIT);
        assert_eq!(truncate_bio(&exact, BIO_LIMIT), exact);

        let long = "é".repeat(BIO_LIMIT + 5);
        let cut = truncate_bio(&long, BIO_LIMIT);
        assert_eq!(cut.chars().count(), BIO_LIMIT + 3);
        assert!(cut.ends_with("é..."));
    }

    #[test]
    fn parses_api_payloads() {
        let ids: DataList<UserId> =
            serde_json::from_str(r#"{"data":[{"requestedUsername":"builderman","id":156,"name":"builderman"}]}"#)
                .unwrap();
        assert_eq!(ids.data[0].id, 156);

        let empty: DataList<UserId> = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(empty.data.is_empty());

        let details: UserDetails = serde_json::from_str(
            r#"{"description":"","created":"2006-03-08T00:00:00Z","isBanned":false,"id":156,"name":"builderman","displayName":"Builderman"}"#,
        )
        .unwrap();
        assert_eq!(details.display_name.as_deref(), Some("Builderman"));

        let presence: PresenceList = serde_json::from_str(
            r#"{"userPresences":[{"userPresenceType":2,"lastLocation":"Brookhaven","userId":156}]}"#,
        )
        .unwrap();
        assert_eq!(presence.user_presences[0].user_presence_type, 2);
    }
}

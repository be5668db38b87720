use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Lavalink
    pub lavalink_uri: String,
    pub lavalink_password: String,
    pub search_prefix: String,

    // Sesiones de voz
    pub idle_timeout_secs: u64,

    // Archivos directos
    pub staging_dir: PathBuf,
    pub download_timeout_secs: u64,

    // Auto-delete (0 = desactivado)
    pub auto_delete_channel: u64,
    pub auto_delete_after_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Lavalink
            lavalink_uri: std::env::var("LAVALINK_URI").unwrap_or(defaults.lavalink_uri),
            lavalink_password: std::env::var("LAVALINK_PASSWORD")
                .unwrap_or(defaults.lavalink_password),
            search_prefix: std::env::var("SEARCH_PREFIX").unwrap_or(defaults.search_prefix),

            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,

            staging_dir: std::env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            download_timeout_secs: std::env::var("DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,

            auto_delete_channel: std::env::var("AUTO_DELETE_CHANNEL")
                .unwrap_or_else(|_| "0".to_string())
                .parse()?,
            auto_delete_after_secs: std::env::var("AUTO_DELETE_AFTER_SECS")
                .unwrap_or_else(|_| "1800".to_string()) // 30 minutos
                .parse()?,
        };

        // Validate configuration before returning
        config.validate()?;

        std::fs::create_dir_all(&config.staging_dir)?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - The Discord token must be present
    /// - Timeouts must be greater than zero
    /// - The Lavalink URI must be an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.download_timeout_secs == 0 {
            anyhow::bail!("Download timeout must be greater than 0");
        }

        if self.auto_delete_channel != 0 && self.auto_delete_after_secs == 0 {
            anyhow::bail!("Auto-delete delay must be greater than 0");
        }

        let uri = url::Url::parse(&self.lavalink_uri)
            .map_err(|e| anyhow::anyhow!("Invalid LAVALINK_URI '{}': {}", self.lavalink_uri, e))?;
        if !matches!(uri.scheme(), "http" | "https") {
            anyhow::bail!("LAVALINK_URI must use http or https, got: {}", uri.scheme());
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Canal de auto-delete, si está activado
    pub fn auto_delete(&self) -> Option<(u64, Duration)> {
        (self.auto_delete_channel != 0)
            .then(|| (self.auto_delete_channel, Duration::from_secs(self.auto_delete_after_secs)))
    }

    /// Returns a summary of the current configuration for logging.
    /// Tokens and passwords are left out.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Lavalink: {} (search prefix '{}')\n  \
            Voice: idle timeout {}\n  \
            Files: staging {} (download timeout {})\n  \
            Auto-delete: {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("in guild {}", id)),
            self.lavalink_uri,
            self.search_prefix,
            humantime::format_duration(self.idle_timeout()),
            self.staging_dir.display(),
            humantime::format_duration(self.download_timeout()),
            self.auto_delete().map_or("disabled".to_string(), |(channel, after)| {
                format!("channel {} after {}", channel, humantime::format_duration(after))
            }),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            lavalink_uri: "http://localhost:2333".to_string(),
            lavalink_password: "youshallnotpass".to_string(),
            search_prefix: "ytsearch:".to_string(),

            idle_timeout_secs: 300,

            staging_dir: std::env::temp_dir().join("dualdeck"),
            download_timeout_secs: 120,

            auto_delete_channel: 0,
            auto_delete_after_secs: 1800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid() -> Config {
        Config {
            discord_token: "token".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_are_valid_once_a_token_is_set() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
        assert_eq!(valid().idle_timeout(), Duration::from_secs(300));
        assert_eq!(valid().auto_delete(), None);
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config = Config {
            idle_timeout_secs: 0,
            ..valid()
        };
        assert!(config.validate().is_err());

        let config = Config {
            download_timeout_secs: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn lavalink_uri_must_be_http() {
        for uri in ["not a uri", "ws://localhost:2333"] {
            let config = Config {
                lavalink_uri: uri.to_string(),
                ..valid()
            };
            assert!(config.validate().is_err(), "{}", uri);
        }
    }

    #[test]
    fn summary_hides_secrets() {
        let config = Config {
            discord_token: "super-secret-token".to_string(),
            lavalink_password: "hunter2".to_string(),
            auto_delete_channel: 42,
            ..valid()
        };

        let summary = config.summary();
        assert!(!summary.contains("super-secret-token"));
        assert!(!summary.contains("hunter2"));
        assert!(summary.contains("channel 42 after 30m"));
    }
}

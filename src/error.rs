use thiserror::Error;

/// Why an operation was refused without touching the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidState {
    /// No voice connection exists for the guild.
    NotConnected,
    /// Pause/stop requested but no track is playing.
    NothingPlaying,
    /// Resume requested but no track is paused.
    NothingPaused,
    /// The request needs the other backend (e.g. pausing a file).
    WrongBackend,
}

impl std::fmt::Display for InvalidState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NotConnected => "not connected to a voice channel",
            Self::NothingPlaying => "nothing is playing",
            Self::NothingPaused => "nothing is paused",
            Self::WrongBackend => "not supported by the active backend",
        };
        f.write_str(text)
    }
}

/// Errors raised by the voice session core.
///
/// Every variant maps to a message shown to the user by the command layer,
/// see [`AudioError::user_message`].
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("user is not in a voice channel")]
    NotInVoiceChannel,

    #[error("backend switch failed: {0}")]
    BackendSwitchFailure(String),

    #[error("voice connection error: {0}")]
    Voice(String),

    #[error("no results for `{0}`")]
    NoResults(String),

    #[error("invalid state: {0}")]
    InvalidState(InvalidState),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("search provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("playback error: {0}")]
    Playback(String),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotInVoiceChannel => "❌ You are not in a voice channel!".to_string(),
            Self::BackendSwitchFailure(_) => {
                "⚠️ Could not switch the voice connection, please run the command again.".to_string()
            }
            Self::Voice(_) => "⚠️ Voice connection error, please try again.".to_string(),
            Self::NoResults(_) => "⚠️ No track found.".to_string(),
            Self::InvalidState(InvalidState::NotConnected) => {
                "❌ The bot is not in a voice channel!".to_string()
            }
            Self::InvalidState(InvalidState::NothingPlaying) => {
                "❌ Nothing is playing right now!".to_string()
            }
            Self::InvalidState(InvalidState::NothingPaused) => "❌ Nothing is paused!".to_string(),
            Self::InvalidState(InvalidState::WrongBackend) => {
                "❌ No stream is playing, this only works for /play tracks!".to_string()
            }
            Self::ValidationFailed(_) => {
                "⚠️ Invalid URL or unsupported audio format (.mp3, .wav, .flac, .ogg).".to_string()
            }
            Self::DownloadFailed(_) => "⚠️ Could not download the audio file.".to_string(),
            Self::ProviderUnavailable(_) => {
                "⚠️ The music server is not connected yet, try again in a moment.".to_string()
            }
            Self::Playback(reason) => format!("⚠️ Playback error: {}", reason),
        }
    }
}

impl From<InvalidState> for AudioError {
    fn from(state: InvalidState) -> Self {
        Self::InvalidState(state)
    }
}

pub type AudioResult<T> = std::result::Result<T, AudioError>;

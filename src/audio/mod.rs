//! # Audio Module
//!
//! Voice sessions and playback for the two backends.
//!
//! - [`backend`]: backend kinds, connection handles and the traits a voice
//!   backend implements.
//! - [`session`]: one session per guild, backend switching.
//! - [`idle`]: auto-disconnect of idle streaming sessions.
//! - [`playback`]: play / pause / resume / stop.
//! - [`file_pipeline`]: download, validate and play remote audio files.
//! - [`songbird_backend`]: the Songbird implementation of the backend traits.

pub mod backend;
pub mod file_pipeline;
pub mod idle;
pub mod playback;
pub mod session;
pub mod songbird_backend;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendKind, Connection, PlaybackState, VoiceGateway};
pub use file_pipeline::FilePipeline;
pub use session::SessionManager;
pub use songbird_backend::SongbirdGateway;

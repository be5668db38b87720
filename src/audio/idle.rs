//! Auto-disconnect for streaming sessions that sit idle.
//!
//! Each streaming session owns an [`IdleGuard`]. The guard wraps the
//! cancellation token of a timer task; dropping the session for any reason
//! (leave, backend switch, expiry) cancels the timer, so it can never
//! disconnect a connection it was not armed for.

use serenity::model::id::GuildId;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use super::session::GuildSlot;

/// How a timer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// Something was playing or paused at expiry; nothing was done.
    Disarmed,
    /// Nothing was playing: the session was disconnected and removed.
    Expired,
    /// The session was torn down or replaced before the timer fired.
    Abandoned,
}

/// Keeps a timer alive; dropping it cancels the timer.
pub struct IdleGuard {
    _cancel: DropGuard,
}

impl std::fmt::Debug for IdleGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdleGuard")
    }
}

pub struct IdleSupervisor;

impl IdleSupervisor {
    /// Starts a countdown for the session currently stored in `slot`.
    pub(super) fn arm(guild_id: GuildId, slot: Weak<Mutex<GuildSlot>>, timeout: Duration) -> IdleGuard {
        let token = CancellationToken::new();
        let watched = token.clone();

        debug!(
            "⏲️ Temporizador de inactividad armado en guild {} ({})",
            guild_id,
            humantime::format_duration(timeout)
        );

        tokio::spawn(async move {
            let outcome = watch(guild_id, slot, timeout, watched).await;
            debug!("⏲️ Temporizador de guild {} terminado: {:?}", guild_id, outcome);
        });

        IdleGuard {
            _cancel: token.drop_guard(),
        }
    }
}

async fn watch(
    guild_id: GuildId,
    slot: Weak<Mutex<GuildSlot>>,
    timeout: Duration,
    token: CancellationToken,
) -> IdleOutcome {
    tokio::select! {
        _ = token.cancelled() => return IdleOutcome::Abandoned,
        _ = tokio::time::sleep(timeout) => {}
    }

    let Some(slot) = slot.upgrade() else {
        return IdleOutcome::Abandoned;
    };
    let mut slot = slot.lock().await;

    // The session may have been replaced while we waited for the lock.
    if token.is_cancelled() {
        return IdleOutcome::Abandoned;
    }
    let Some(connection) = slot.connection().cloned() else {
        return IdleOutcome::Abandoned;
    };

    if connection.playback_state().await.is_active() {
        debug!("🎶 Guild {} sigue reproduciendo, no se desconecta", guild_id);
        return IdleOutcome::Disarmed;
    }

    if !connection.is_connected().await {
        return IdleOutcome::Abandoned;
    }

    if let Err(e) = connection.disconnect().await {
        warn!("⚠️ Error al desconectar por inactividad en guild {}: {}", guild_id, e);
    }
    slot.clear();

    info!(
        "🔹 Bot salió del canal de voz en guild {} por inactividad ({})",
        guild_id,
        humantime::format_duration(timeout)
    );
    IdleOutcome::Expired
}

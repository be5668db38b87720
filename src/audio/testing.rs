//! In-memory gateway and connections for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::backend::{
    BackendKind, Connection, FileConnection, FinishCallback, FinishOnce, PlaybackState,
    StreamingConnection, VoiceConnection, VoiceGateway,
};
use crate::error::{AudioError, AudioResult};
use crate::sources::Track;

type EventLog = Arc<Mutex<Vec<String>>>;

/// Records every connect, disconnect and play in order.
#[derive(Default)]
pub struct FakeGateway {
    log: EventLog,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    fail_next: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    max_live: AtomicUsize,
}

impl FakeGateway {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.connections.lock().len()
    }

    /// The `index`-th connection ever opened.
    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        self.connections.lock()[index].clone()
    }

    pub fn fail_next_connect(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Makes every connect take `delay`, like a real voice handshake.
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        *self.connect_delay.lock() = Some(delay);
        self
    }

    /// Most connections that were up at the same time.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
        kind: BackendKind,
    ) -> AudioResult<Connection> {
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AudioError::Voice("channel is full".to_string()));
        }

        let mut connections = self.connections.lock();
        let id = connections.len();
        self.log
            .lock()
            .push(format!("connect #{} {} {}", id, kind, channel_id));

        let connection = Arc::new(FakeConnection::new(id, channel_id, self.log.clone()));
        connections.push(connection.clone());

        let live = connections.iter().filter(|c| c.connected.load(Ordering::SeqCst)).count();
        self.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(match kind {
            BackendKind::Streaming => Connection::Streaming(connection),
            BackendKind::DirectFile => Connection::DirectFile(connection),
        })
    }
}

pub struct FakeConnection {
    id: usize,
    channel_id: ChannelId,
    log: EventLog,
    connected: AtomicBool,
    disconnects: AtomicUsize,
    state: Mutex<PlaybackState>,
    played: Mutex<Vec<String>>,
    pending_finish: Mutex<Option<FinishCallback>>,
}

impl FakeConnection {
    fn new(id: usize, channel_id: ChannelId, log: EventLog) -> Self {
        Self {
            id,
            channel_id,
            log,
            connected: AtomicBool::new(true),
            disconnects: AtomicUsize::new(0),
            state: Mutex::new(PlaybackState::Idle),
            played: Mutex::new(Vec::new()),
            pending_finish: Mutex::new(None),
        }
    }

    pub fn set_state(&self, state: PlaybackState) {
        *self.state.lock() = state;
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Titles of tracks and paths of files, in play order.
    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    /// Simulates Discord dropping the voice link.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Simulates the current track or file reaching its end (or failing).
    pub fn finish_current(&self, error: Option<&str>) {
        self.set_state(PlaybackState::Idle);
        let pending = self.pending_finish.lock().take();
        if let Some(callback) = pending {
            callback(error.map(str::to_string));
        }
    }

    fn end_current(&self) {
        self.finish_current(None);
    }

    /// Mirrors a voice driver that is gone: nothing can be started on it.
    fn start(&self, what: String, on_finish: FinishCallback) -> AudioResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(AudioError::Voice(format!("connection #{} is closed", self.id)));
        }

        self.end_current();
        self.log.lock().push(format!("play #{} {}", self.id, what));
        self.played.lock().push(what);
        *self.pending_finish.lock() = Some(on_finish);
        self.set_state(PlaybackState::Playing);
        Ok(())
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn playback_state(&self) -> PlaybackState {
        self.state()
    }

    async fn stop(&self) -> AudioResult<()> {
        self.end_current();
        Ok(())
    }

    async fn disconnect(&self) -> AudioResult<()> {
        self.end_current();
        self.connected.store(false, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(format!("disconnect #{}", self.id));
        Ok(())
    }
}

#[async_trait]
impl StreamingConnection for FakeConnection {
    async fn play_track(&self, track: &Track, on_end: FinishCallback) -> AudioResult<()> {
        self.start(track.title().to_string(), on_end)
    }

    async fn pause(&self) -> AudioResult<()> {
        self.set_state(PlaybackState::Paused);
        Ok(())
    }

    async fn resume(&self) -> AudioResult<()> {
        self.set_state(PlaybackState::Playing);
        Ok(())
    }
}

#[async_trait]
impl FileConnection for FakeConnection {
    async fn play_file(&self, path: PathBuf, on_finish: FinishCallback) -> AudioResult<()> {
        // The file contract wants the callback even when playback never starts.
        let on_finish = Arc::new(FinishOnce::new(on_finish));
        let pending = on_finish.clone();
        self.start(
            path.display().to_string(),
            Box::new(move |error| {
                pending.fire(error);
            }),
        )
    }
}

/// A valid mono 16-bit PCM WAV file of silence.
pub fn wav_bytes(sample_rate: u32, seconds: u32) -> Vec<u8> {
    let data_len = sample_rate * seconds * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);

    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);

    bytes
}

/// Serves a single HTTP response on a random local port.
pub async fn serve_once(status: &'static str, body: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        let _ = socket.shutdown().await;
    });

    addr
}

//! Background connection supervision.
//!
//! One supervisor task runs per session while a connection exists. It races
//! the receive loop, the heartbeat loop, a write-failure signal and session
//! shutdown; whichever finishes first decides what happens to the link. A
//! lost link is replaced by the reconnection loop inside the same task, so at
//! most one task ever touches the socket.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    sync::{Mutex, watch},
    time::{MissedTickBehavior, interval, sleep, sleep_until, timeout_at},
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
    task::TaskTracker,
};

use super::{
    DisconnectReason,
    Inbound,
    SessionConfig,
    SessionError,
    SessionEvent,
    SessionState,
    config::ServerAddr,
    connector::Connector,
    heartbeat::Heartbeat,
};
use crate::{
    codec::{CodecError, FrameCodec, RecoveryPolicy},
    frame::{Frame, PacketType},
    metrics::{self, Direction},
    queue::DispatchSender,
};

const INITIAL_READ_BUFFER_CAPACITY: usize = 64 * 1024;

pub(super) type FrameReader = FramedRead<OwnedReadHalf, FrameCodec>;
type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

/// Write side of the current connection.
struct Link {
    writer: FrameWriter,
    /// Cancelled when a write fails so the supervisor abandons the link.
    lost: CancellationToken,
}

/// State shared between the [`Session`](super::Session) handle and its
/// supervisor task.
pub(super) struct Shared<K> {
    pub(super) config: SessionConfig,
    pub(super) connector: K,
    pub(super) codec: FrameCodec,
    pub(super) target: Mutex<ServerAddr>,
    pub(super) state: watch::Sender<SessionState>,
    link: Mutex<Option<Link>>,
    pub(super) inbound: DispatchSender<Inbound>,
    pub(super) shutdown: CancellationToken,
    pub(super) tracker: TaskTracker,
    pub(super) heartbeat: Heartbeat,
}

impl<K: Connector> Shared<K> {
    pub(super) fn new(config: SessionConfig, connector: K, inbound: DispatchSender<Inbound>) -> Self {
        let codec = config
            .max_frame_length
            .map_or_else(FrameCodec::new, FrameCodec::with_max_frame_length);
        let target = Mutex::new(config.server.clone());
        Self {
            config,
            connector,
            codec,
            target,
            state: watch::Sender::new(SessionState::Disconnected),
            link: Mutex::new(None),
            inbound,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            heartbeat: Heartbeat::new(),
        }
    }

    /// Move to `next` unless the session is already closed.
    pub(super) fn set_state(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == SessionState::Closed || *current == next {
                return false;
            }
            debug!("session state {current} -> {next}");
            *current = next;
            true
        })
    }

    pub(super) fn emit(&self, event: SessionEvent) {
        if self.inbound.enqueue(Inbound::Event(event)).is_err() {
            debug!("dispatch consumer gone; lifecycle event discarded");
        }
    }

    /// Adopt a freshly connected stream and announce the connection.
    pub(super) async fn install(&self, stream: TcpStream) -> (FrameReader, CancellationToken) {
        let (read, write) = stream.into_split();
        let capacity = self
            .codec
            .max_frame_length()
            .map_or(INITIAL_READ_BUFFER_CAPACITY, |max| max.min(INITIAL_READ_BUFFER_CAPACITY));
        let reader = FramedRead::with_capacity(read, self.codec, capacity);
        let lost = CancellationToken::new();
        *self.link.lock().await = Some(Link {
            writer: FramedWrite::new(write, self.codec),
            lost: lost.clone(),
        });
        self.heartbeat.reset();
        metrics::inc_connections();
        self.set_state(SessionState::Connected);
        self.emit(SessionEvent::Connected);
        (reader, lost)
    }

    /// Release the write half of the current connection, if any.
    pub(super) async fn drop_link(&self) {
        if self.link.lock().await.take().is_some() {
            metrics::dec_connections();
        }
    }

    /// Write one frame to the current connection.
    pub(super) async fn write(&self, frame: Frame) -> Result<(), SessionError> {
        self.codec
            .check_size(frame.total_length())
            .map_err(CodecError::from)?;
        let mut guard = self.link.lock().await;
        let Some(link) = guard.as_mut() else {
            return Err(SessionError::NotConnected);
        };
        let result = select! {
            biased;
            () = self.shutdown.cancelled() => return Err(SessionError::Closed),
            () = link.lost.cancelled() => return Err(SessionError::NotConnected),
            result = link.writer.send(frame) => result,
        };
        match result {
            Ok(()) => {
                metrics::inc_frames(Direction::Outbound);
                Ok(())
            }
            Err(err) => {
                warn!("write failed: {err}");
                link.lost.cancel();
                Err(SessionError::Io(err))
            }
        }
    }
}

/// Drive connections until shutdown, disconnection or exhausted retries.
pub(super) async fn supervise<K: Connector>(
    shared: Arc<Shared<K>>,
    mut reader: FrameReader,
    mut lost: CancellationToken,
) {
    loop {
        let outcome = run_link(&shared, reader, &lost).await;
        shared.drop_link().await;
        let Some(reason) = outcome else {
            debug!("supervisor stopping on shutdown");
            return;
        };
        if !shared.config.reconnect.enabled {
            info!("connection lost ({reason}); reconnection disabled");
            if shared.set_state(SessionState::Disconnected) {
                shared.emit(SessionEvent::Disconnected(reason));
            }
            return;
        }
        warn!("connection lost: {reason}");
        match reconnect(&shared).await {
            Some((next_reader, next_lost)) => {
                reader = next_reader;
                lost = next_lost;
            }
            None => return,
        }
    }
}

/// Run one connection. Returns `None` on shutdown.
async fn run_link<K: Connector>(
    shared: &Shared<K>,
    mut reader: FrameReader,
    lost: &CancellationToken,
) -> Option<DisconnectReason> {
    select! {
        biased;
        () = shared.shutdown.cancelled() => None,
        () = lost.cancelled() => Some(DisconnectReason::Transport),
        reason = receive_loop(shared, &mut reader) => Some(reason),
        reason = heartbeat_loop(shared) => Some(reason),
    }
}

async fn receive_loop<K: Connector>(shared: &Shared<K>, reader: &mut FrameReader) -> DisconnectReason {
    loop {
        let frame = match reader.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                let err = CodecError::from_io(err);
                match err.recovery_policy() {
                    RecoveryPolicy::Disconnect => return classify(err),
                    RecoveryPolicy::Drop => {
                        warn!("skipping frame after {} error: {err}", err.error_type());
                        metrics::inc_dropped_frames();
                        continue;
                    }
                }
            }
            None => return DisconnectReason::ServerClosed,
        };
        metrics::inc_frames(Direction::Inbound);
        if frame.packet_type() == PacketType::Ping {
            shared.heartbeat.observe_pong(frame.payload());
        }
        if shared.inbound.enqueue(Inbound::Frame(frame)).is_err() {
            debug!("dispatch consumer gone; frame discarded");
        }
    }
}

fn classify(err: CodecError) -> DisconnectReason {
    match err {
        CodecError::Framing(err) => {
            error!("closing connection on framing error: {err}");
            DisconnectReason::ProtocolViolation
        }
        CodecError::Eof(err) => {
            warn!("connection closed mid-frame: {err}");
            DisconnectReason::ServerClosed
        }
        CodecError::Io(err) => {
            warn!("read failed: {err}");
            DisconnectReason::Transport
        }
    }
}

async fn heartbeat_loop<K: Connector>(shared: &Shared<K>) -> DisconnectReason {
    let timeout = shared.config.heartbeat_timeout;
    let mut ticker = interval(shared.config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let deadline = shared.heartbeat.deadline(timeout);
        select! {
            biased;
            () = sleep_until(deadline) => {
                if shared.heartbeat.deadline(timeout) <= tokio::time::Instant::now() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let frame = match shared.heartbeat.ping_frame() {
                    Ok(frame) => frame,
                    Err(err) => {
                        error!("failed to encode ping: {err}");
                        return DisconnectReason::Transport;
                    }
                };
                match timeout_at(deadline, shared.write(frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => return DisconnectReason::Transport,
                    Err(_) => break,
                }
            }
        }
    }
    warn!("no heartbeat reply within {timeout:?}");
    metrics::inc_heartbeat_timeouts();
    DisconnectReason::HeartbeatTimeout
}

/// Retry the last target until connected, shut down or out of attempts.
async fn reconnect<K: Connector>(shared: &Shared<K>) -> Option<(FrameReader, CancellationToken)> {
    let policy = shared.config.reconnect;
    let max_attempts = policy.max_attempts;
    if !shared.set_state(SessionState::Reconnecting) {
        return None;
    }
    shared.emit(SessionEvent::Reconnecting {
        attempt: 1,
        max_attempts,
    });
    let target = shared.target.lock().await.clone();

    for attempt in 1..=max_attempts {
        let delay = policy.delay_for(attempt);
        info!("reconnecting to {target} in {delay:?} (attempt {attempt}/{max_attempts})");
        select! {
            biased;
            () = shared.shutdown.cancelled() => return None,
            () = sleep(delay) => {}
        }
        metrics::inc_reconnect_attempts();
        let result = select! {
            biased;
            () = shared.shutdown.cancelled() => return None,
            result = shared.connector.connect(target.clone()) => result,
        };
        match result {
            Ok(stream) => {
                info!("reconnected to {target} on attempt {attempt}");
                return Some(shared.install(stream).await);
            }
            Err(err) => warn!("reconnection attempt {attempt}/{max_attempts} failed: {err}"),
        }
    }

    error!("giving up on {target} after {max_attempts} reconnection attempts");
    if shared.set_state(SessionState::Disconnected) {
        shared.emit(SessionEvent::Disconnected(
            DisconnectReason::ReconnectExhausted {
                attempts: max_attempts,
            },
        ));
    }
    None
}

//! Scriptable game server for exercising clients over real sockets.
//!
//! The server speaks the framed protocol through [`FrameCodec`], records
//! every frame it receives, and reacts according to its [`ServerMode`].
//! [`TestServer::drop_connections`] simulates the server closing sockets
//! mid-session.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use tickwire::{
    codec::FrameCodec,
    envelope::{Envelope, Response},
    frame::{Frame, PacketType},
    messages::{LocationUpdate, LocationUpdatePayload, UserLocation, UserStatus, handler},
    payload::{BincodeCodec, PayloadCodec},
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_util::codec::Framed;

/// How the server treats each connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServerMode {
    /// Echo pings, answer every envelope with a success [`Response`] and
    /// broadcast a [`LocationUpdate`] for every location report.
    #[default]
    Echo,
    /// Read and record frames but never write anything.
    Silent,
}

#[derive(Default)]
struct Recorded {
    frames: Mutex<Vec<Frame>>,
    accepted: AtomicUsize,
}

/// In-process server bound to an ephemeral localhost port.
pub struct TestServer {
    addr: SocketAddr,
    mode: watch::Sender<ServerMode>,
    generation: watch::Sender<u64>,
    recorded: Arc<Recorded>,
    accept_task: JoinHandle<()>,
}

impl TestServer {
    /// Bind a listener and start accepting connections.
    ///
    /// # Errors
    ///
    /// Returns any error from binding the listener.
    pub async fn start(mode: ServerMode) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (mode, _) = watch::channel(mode);
        let (generation, _) = watch::channel(0_u64);
        let recorded = Arc::new(Recorded::default());
        let accept_task = tokio::spawn(accept_loop(
            listener,
            mode.subscribe(),
            generation.subscribe(),
            Arc::clone(&recorded),
        ));
        Ok(Self {
            addr,
            mode,
            generation,
            recorded,
            accept_task,
        })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Port the listener is bound to.
    #[must_use]
    pub fn port(&self) -> u16 { self.addr.port() }

    /// Change the behaviour for connections accepted from now on.
    pub fn set_mode(&self, mode: ServerMode) { self.mode.send_replace(mode); }

    /// Close every open connection.
    pub fn drop_connections(&self) { self.generation.send_modify(|generation| *generation += 1); }

    /// Number of connections accepted so far.
    #[must_use]
    pub fn accepted(&self) -> usize { self.recorded.accepted.load(Ordering::SeqCst) }

    /// Frames received so far, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if a connection task panicked while recording.
    #[must_use]
    pub fn received(&self) -> Vec<Frame> { self.recorded.frames.lock().expect("frames lock").clone() }

    /// Envelopes received so far, skipping frames that are not envelopes.
    #[must_use]
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.received()
            .iter()
            .filter(|frame| frame.packet_type() == PacketType::Normal)
            .filter_map(|frame| BincodeCodec.deserialize(frame.payload()).ok())
            .collect()
    }

    /// Wait until `count` connections have been accepted.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::TimedOut`] if that does not happen within
    /// `within`.
    pub async fn wait_for_accepted(&self, count: usize, within: Duration) -> io::Result<()> {
        timeout(within, async {
            while self.accepted() < count {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        self.accept_task.abort();
        self.drop_connections();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) { self.shutdown(); }
}

async fn accept_loop(
    listener: TcpListener,
    mode: watch::Receiver<ServerMode>,
    generation: watch::Receiver<u64>,
    recorded: Arc<Recorded>,
) {
    while let Ok((stream, _)) = listener.accept().await {
        recorded.accepted.fetch_add(1, Ordering::SeqCst);
        let current = *mode.borrow();
        let mut generation = generation.clone();
        generation.mark_unchanged();
        tokio::spawn(serve(stream, current, generation, Arc::clone(&recorded)));
    }
}

async fn serve(
    stream: TcpStream,
    mode: ServerMode,
    mut generation: watch::Receiver<u64>,
    recorded: Arc<Recorded>,
) {
    let mut framed = Framed::new(stream, FrameCodec::new());
    loop {
        let frame = tokio::select! {
            _ = generation.changed() => return,
            next = framed.next() => match next {
                Some(Ok(frame)) => frame,
                _ => return,
            },
        };
        recorded
            .frames
            .lock()
            .expect("frames lock")
            .push(frame.clone());
        if mode != ServerMode::Echo {
            continue;
        }
        for reply in replies(&frame) {
            if framed.send(reply).await.is_err() {
                return;
            }
        }
    }
}

fn replies(frame: &Frame) -> Vec<Frame> {
    match frame.packet_type() {
        PacketType::Ping => vec![frame.clone()],
        PacketType::Normal => envelope_replies(frame).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn envelope_replies(frame: &Frame) -> Option<Vec<Frame>> {
    let envelope: Envelope = BincodeCodec.deserialize(frame.payload()).ok()?;
    let response = Response::new(envelope.handler_id(), 0, 0, Vec::new());
    let mut out = vec![Frame::new(
        PacketType::Normal,
        BincodeCodec.serialize(&response).ok()?,
    )];
    if envelope.handler_id() == handler::LOCATION_UPDATE {
        let position: LocationUpdatePayload = BincodeCodec.deserialize(envelope.payload()).ok()?;
        let update = LocationUpdate {
            users: vec![UserLocation {
                id: envelope.sender_id().to_owned(),
                player_id: 0,
                x: position.x,
                y: position.y,
                status: UserStatus::Active,
                last_update_time: 0,
            }],
        };
        out.push(Frame::new(
            PacketType::Location,
            BincodeCodec.serialize(&update).ok()?,
        ));
    }
    Some(out)
}

//! Unix-domain-socket session server.
//!
//! One session per client connection, keyed by the server-side socket
//! descriptor.  A session comes into being in one of two ways:
//!
//! - [`UdsServer::add_socket_pair_info`]: the service creates a connected
//!   socket pair, keeps one end and hands the other to the client.
//! - [`UdsServer::run`]: a client connects to the listening socket and
//!   sends `Connect` as its first packet; pid and uid come from the peer
//!   credentials.
//!
//! # Reading (for beginners)
//!
//! Each session has a Tokio task that waits until its socket is readable,
//! then performs at most `max_recv_limit` non-blocking reads before going
//! back to waiting.  The bound keeps one chatty client from starving the
//! others.  Bytes are fed to a [`StreamBuffer`], and every complete packet
//! is decoded and passed to the [`PacketHandler`].  A 0-byte read means the
//! peer closed its end: the session is released.
//!
//! # Writing
//!
//! [`SessionTransmitter::send_msg`] is synchronous: it is called from the
//! input-reader thread in the middle of dispatch.  It writes through a
//! duplicate of the session descriptor with plain non-blocking writes, so it
//! does not depend on the reactor having polled the socket, and briefly
//! retries while the socket buffer is full.  There
//! is no application-level queue; a client that stops reading fills its
//! buffer, sends start failing, and ANR detection takes over.
//!
//! How a retry waits depends on the calling thread:
//!
//! - plain OS thread (the input reader): sleeps for a millisecond;
//! - worker of a multi-thread runtime: sleeps inside
//!   [`tokio::task::block_in_place`] so the worker's other tasks move on;
//! - current-thread runtime: does not wait at all, the send fails at once.
//!
//! A frame is never left half-written: if a send fails after some of its
//! bytes went out, the session is released because the peer can no longer
//! find packet boundaries.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use mmi_core::protocol::{ConnectRequest, StreamBuffer, TokenType};
use mmi_core::{decode_message, MmiMessage, NetPacket, ProtocolError};
use nix::sys::socket::{setsockopt, sockopt};
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, error, info, trace, warn};

use crate::application::session::{
    PacketHandler, SessionId, SessionInfo, SessionLostListener, SessionTransmitter,
};
use crate::infrastructure::storage::config::TransportConfig;

const READ_CHUNK: usize = 4096;
const SEND_RETRY_LIMIT: u32 = 32;
const SEND_RETRY_DELAY: Duration = Duration::from_millis(1);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for session management.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create socket pair: {0}")]
    SocketPair(#[source] io::Error),
    #[error("failed to set socket option {option}: {source}")]
    SetOption {
        option: &'static str,
        #[source]
        source: nix::Error,
    },
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("must be called from within a Tokio runtime")]
    NoRuntime,
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

struct SessionEntry {
    info: SessionInfo,
    writer: Arc<StdUnixStream>,
}

pub struct UdsServer {
    config: TransportConfig,
    sessions: RwLock<BTreeMap<SessionId, SessionEntry>>,
    listeners: RwLock<Vec<Arc<dyn SessionLostListener>>>,
    handler: OnceLock<Arc<dyn PacketHandler>>,
}

impl UdsServer {
    pub fn new(config: TransportConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            sessions: RwLock::new(BTreeMap::new()),
            listeners: RwLock::new(Vec::new()),
            handler: OnceLock::new(),
        })
    }

    /// Installs the handler for inbound requests; only the first call wins.
    pub fn set_packet_handler(&self, handler: Arc<dyn PacketHandler>) -> bool {
        self.handler.set(handler).is_ok()
    }

    pub fn add_session_lost_listener(&self, listener: Arc<dyn SessionLostListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Allocates a connected socket pair for a client and registers the
    /// service end as a new session.
    ///
    /// Returns the session id and the client end.  Must be called from
    /// within a Tokio runtime.
    pub fn add_socket_pair_info(
        self: &Arc<Self>,
        request: ConnectRequest,
        pid: i32,
        uid: i32,
    ) -> Result<(SessionId, StdUnixStream), SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let (server_end, client_end) = StdUnixStream::pair().map_err(SessionError::SocketPair)?;

        let size = self.buffer_size(request.token_type);
        set_buffer_sizes(&server_end, size)?;
        set_buffer_sizes(&client_end, size)?;
        server_end.set_nonblocking(true)?;

        let _guard = runtime.enter();
        let stream = UnixStream::from_std(server_end)?;
        let session = self.register(stream, request, pid, uid, StreamBuffer::new())?;
        Ok((session, client_end))
    }

    /// Binds the listening socket, replacing a stale socket file.
    pub fn bind(path: &Path) -> Result<UnixListener, SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(UnixListener::bind(path)?)
    }

    /// Accepts connections until the listener fails.
    pub async fn run(self: Arc<Self>, listener: UnixListener) {
        info!("session server accepting connections");
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.accept_session(stream).await {
                            warn!(error = %e, "connection rejected");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed; session server stopping");
                    break;
                }
            }
        }
    }

    /// Releases `session`: notifies the listeners and shuts its socket down.
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub fn release_session(&self, session: SessionId) {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
        let Some(entry) = removed else {
            return;
        };
        info!(session, pid = entry.info.pid, program = %entry.info.program_name, "session released");

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_session_lost(session);
        }
        // The reader task owns the other handle; shutting down wakes it with
        // a 0-byte read, and the descriptor closes when its last handle drops.
        if let Err(e) = entry.writer.shutdown(Shutdown::Both) {
            trace!(session, error = %e, "shutdown of released session failed");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn buffer_size(&self, token_type: TokenType) -> usize {
        match token_type {
            TokenType::Native => self.config.native_buffer_size,
            TokenType::Hap | TokenType::Shell => self.config.default_buffer_size,
        }
    }

    async fn accept_session(self: Arc<Self>, stream: UnixStream) -> Result<(), SessionError> {
        let cred = stream.peer_cred()?;
        let pid = cred.pid().unwrap_or(-1);
        let uid = i32::try_from(cred.uid()).unwrap_or(-1);

        let mut buf = StreamBuffer::new();
        let first = tokio::time::timeout(HANDSHAKE_TIMEOUT, read_first_packet(&stream, &mut buf))
            .await
            .map_err(|_| SessionError::Handshake("timed out waiting for Connect".to_string()))??;
        let MmiMessage::Connect(request) = decode_message(first)? else {
            return Err(SessionError::Handshake("first packet is not Connect".to_string()));
        };
        set_buffer_sizes(&stream, self.buffer_size(request.token_type))?;
        self.register(stream, request, pid, uid, buf)?;
        Ok(())
    }

    fn register(
        self: &Arc<Self>,
        stream: UnixStream,
        request: ConnectRequest,
        pid: i32,
        uid: i32,
        buf: StreamBuffer,
    ) -> Result<SessionId, SessionError> {
        let session = stream.as_raw_fd();
        let writer = Arc::new(StdUnixStream::from(stream.as_fd().try_clone_to_owned()?));
        let stream = Arc::new(stream);
        let info = SessionInfo {
            session,
            program_name: request.program_name,
            module_type: request.module_type,
            token_type: request.token_type,
            pid,
            uid,
        };
        info!(session, pid, uid, program = %info.program_name, token_type = ?info.token_type, "session connected");
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, SessionEntry { info, writer });

        let server = Arc::clone(self);
        tokio::spawn(async move {
            server.read_loop(session, stream, buf).await;
        });
        Ok(session)
    }

    async fn read_loop(self: Arc<Self>, session: SessionId, stream: Arc<UnixStream>, mut buf: StreamBuffer) {
        // Bytes that arrived together with the handshake.
        if self.dispatch_packets(session, &mut buf).is_err() {
            self.release_session(session);
            return;
        }

        let mut chunk = vec![0u8; READ_CHUNK];
        'session: loop {
            if let Err(e) = stream.readable().await {
                error!(session, error = %e, "session socket failed");
                break;
            }
            for _ in 0..self.config.max_recv_limit.max(1) {
                match stream.try_read(&mut chunk) {
                    Ok(0) => {
                        debug!(session, "peer closed session socket");
                        break 'session;
                    }
                    Ok(n) => buf.extend(&chunk[..n]),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        error!(session, error = %e, "session read failed");
                        break;
                    }
                }
            }
            if self.dispatch_packets(session, &mut buf).is_err() {
                break;
            }
        }
        self.release_session(session);
    }

    fn dispatch_packets(&self, session: SessionId, buf: &mut StreamBuffer) -> Result<(), ProtocolError> {
        loop {
            let pkt = match buf.next_packet() {
                Ok(Some(pkt)) => pkt,
                Ok(None) => return Ok(()),
                Err(e) => {
                    error!(session, error = %e, "corrupt stream; closing session");
                    return Err(e);
                }
            };
            match decode_message(pkt) {
                Ok(msg) => match self.handler.get() {
                    Some(handler) => handler.on_packet(session, msg),
                    None => warn!(session, msg_id = ?msg.message_id(), "no packet handler installed"),
                },
                Err(e) => warn!(session, error = %e, "undecodable packet dropped"),
            }
        }
    }

    fn writer(&self, session: SessionId) -> Option<Arc<StdUnixStream>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session)
            .map(|e| Arc::clone(&e.writer))
    }
}

impl SessionTransmitter for UdsServer {
    fn send_msg(&self, session: SessionId, pkt: &NetPacket) -> bool {
        let Some(writer) = self.writer(session) else {
            debug!(session, "send to unknown session dropped");
            return false;
        };
        let data = match pkt.make_data() {
            Ok(data) => data,
            Err(e) => {
                warn!(session, error = %e, "packet could not be framed");
                return false;
            }
        };

        match write_frame(&writer, &data) {
            Ok(()) => {
                trace!(session, msg_id = ?pkt.msg_id(), len = data.len(), "packet sent");
                true
            }
            Err((e, 0)) => {
                warn!(session, error = %e, len = data.len(), "send failed");
                false
            }
            Err((e, written)) => {
                error!(session, error = %e, written, len = data.len(), "send failed mid-frame; releasing session");
                self.release_session(session);
                false
            }
        }
    }

    fn session_info(&self, session: SessionId) -> Option<SessionInfo> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session)
            .map(|e| e.info.clone())
    }

    fn session_for_pid(&self, pid: i32) -> Option<SessionId> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|e| e.info.pid == pid)
            .map(|e| e.info.session)
    }
}

async fn read_first_packet(stream: &UnixStream, buf: &mut StreamBuffer) -> Result<NetPacket, SessionError> {
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        if let Some(pkt) = buf.next_packet()? {
            return Ok(pkt);
        }
        stream.readable().await?;
        match stream.try_read(&mut chunk) {
            Ok(0) => return Err(SessionError::Handshake("closed before Connect".to_string())),
            Ok(n) => buf.extend(&chunk[..n]),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

/// Writes all of `data`, waiting out a full socket buffer a bounded number
/// of times.  On failure returns the error and how many bytes went out.
fn write_frame(mut writer: &StdUnixStream, data: &[u8]) -> Result<(), (io::Error, usize)> {
    let mut written = 0;
    let mut retries = 0;
    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => return Err((io::ErrorKind::WriteZero.into(), written)),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock && retries < SEND_RETRY_LIMIT => {
                if !pause_before_retry() {
                    return Err((e, written));
                }
                retries += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err((e, written)),
        }
    }
    Ok(())
}

/// Waits [`SEND_RETRY_DELAY`] without stalling an async worker.
///
/// Returns `false` when the calling thread drives a current-thread runtime,
/// where any wait would also stall the tasks that could drain the socket.
fn pause_before_retry() -> bool {
    match Handle::try_current() {
        Err(_) => std::thread::sleep(SEND_RETRY_DELAY),
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => return false,
        Ok(_) => tokio::task::block_in_place(|| std::thread::sleep(SEND_RETRY_DELAY)),
    }
    true
}

/// Sets both socket buffers of `socket` to `size` bytes.
fn set_buffer_sizes(socket: &impl AsFd, size: usize) -> Result<(), SessionError> {
    setsockopt(socket, sockopt::SndBuf, &size).map_err(|source| SessionError::SetOption {
        option: "SO_SNDBUF",
        source,
    })?;
    setsockopt(socket, sockopt::RcvBuf, &size).map_err(|source| SessionError::SetOption {
        option: "SO_RCVBUF",
        source,
    })
}

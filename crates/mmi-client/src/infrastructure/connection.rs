//! Session socket connection to the service.
//!
//! Architecture:
//! - `MmiConnection` owns the write half of a Unix stream.
//! - A reader task reassembles packets with a [`StreamBuffer`] and decodes
//!   them.  `RequestResult` replies complete the oldest waiting request;
//!   everything else is forwarded on an `mpsc` channel.
//!
//! # Matching replies to requests (for beginners)
//!
//! The service answers requests in the order it receives them and the
//! reply carries only the request's message id, not a sequence number.  So
//! the connection keeps a FIFO of waiting requests.  A request is queued
//! and written while holding the writer lock, which keeps the FIFO order
//! and the wire order identical even when several tasks send at once.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use mmi_core::protocol::{ConnectRequest, StreamBuffer};
use mmi_core::{decode_message, encode_message, MessageId, MmiMessage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::application::sender::{ClientError, MessageSender};
use crate::infrastructure::config::ClientConfig;

const READ_CHUNK: usize = 4096;

type PendingReplies = Arc<Mutex<VecDeque<(MessageId, oneshot::Sender<i32>)>>>;

pub struct MmiConnection {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: PendingReplies,
    request_timeout: Duration,
}

impl MmiConnection {
    /// Connects to the service socket and sends `Connect`.
    ///
    /// Returns the connection and the receiver of every inbound message
    /// that is not a request reply.
    pub async fn connect(config: &ClientConfig) -> Result<(Arc<Self>, mpsc::Receiver<MmiMessage>), ClientError> {
        let stream = UnixStream::connect(&config.socket_path)
            .await
            .map_err(|source| ClientError::ConnectFailed {
                path: config.socket_path.display().to_string(),
                source,
            })?;
        let (conn, rx) = Self::start(stream, config);
        conn.send(&MmiMessage::Connect(ConnectRequest {
            program_name: config.program_name.clone(),
            module_type: config.module_type,
            token_type: config.token_type,
        }))
        .await?;
        info!(socket = %config.socket_path.display(), program = %config.program_name, "connected to MMI service");
        Ok((conn, rx))
    }

    /// Wraps the client end of a socket pair allocated by the service.
    ///
    /// The session already exists, so no `Connect` is sent.  Must be called
    /// from within a Tokio runtime.
    pub fn from_std(
        stream: std::os::unix::net::UnixStream,
        config: &ClientConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<MmiMessage>), ClientError> {
        stream.set_nonblocking(true)?;
        let stream = UnixStream::from_std(stream)?;
        Ok(Self::start(stream, config))
    }

    fn start(stream: UnixStream, config: &ClientConfig) -> (Arc<Self>, mpsc::Receiver<MmiMessage>) {
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let pending: PendingReplies = Arc::new(Mutex::new(VecDeque::new()));
        tokio::spawn(read_loop(reader, tx, Arc::clone(&pending)));
        let conn = Arc::new(Self {
            writer: tokio::sync::Mutex::new(writer),
            pending,
            request_timeout: config.request_timeout,
        });
        (conn, rx)
    }

    /// Requests sent but not yet answered.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl MessageSender for MmiConnection {
    async fn send(&self, msg: &MmiMessage) -> Result<(), ClientError> {
        let bytes = encode_message(msg).make_data()?;
        self.writer.lock().await.write_all(&bytes).await?;
        Ok(())
    }

    async fn request(&self, msg: &MmiMessage) -> Result<(), ClientError> {
        let request = msg.message_id();
        let bytes = encode_message(msg).make_data()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut writer = self.writer.lock().await;
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back((request, reply_tx));
            writer.write_all(&bytes).await?;
        }

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Err(_) => Err(ClientError::Timeout(request)),
            Ok(Err(_)) => Err(ClientError::Closed),
            Ok(Ok(0)) => Ok(()),
            Ok(Ok(code)) => Err(ClientError::Rejected { request, code }),
        }
    }
}

async fn read_loop(mut reader: OwnedReadHalf, tx: mpsc::Sender<MmiMessage>, pending: PendingReplies) {
    let mut buf = StreamBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    'conn: loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                info!("service closed the connection");
                break;
            }
            Ok(n) => buf.extend(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!(error = %e, "read error on session socket");
                break;
            }
        }

        loop {
            let pkt = match buf.next_packet() {
                Ok(Some(pkt)) => pkt,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "corrupt stream from service");
                    break 'conn;
                }
            };
            match decode_message(pkt) {
                Ok(MmiMessage::RequestResult { request, code }) => complete(&pending, request, code),
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        debug!("message receiver dropped; reader stopping");
                        break 'conn;
                    }
                }
                Err(e) => warn!(error = %e, "failed to decode inbound message"),
            }
        }
    }
    // Waiting requests observe `Closed`.
    pending.lock().unwrap_or_else(PoisonError::into_inner).clear();
}

fn complete(pending: &PendingReplies, request: MessageId, code: i32) {
    let waiter = pending.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
    match waiter {
        Some((expected, reply)) => {
            if expected != request {
                warn!(?expected, ?request, "reply does not match the oldest request");
            }
            // The requester may have timed out already.
            let _ = reply.send(code);
        }
        None => warn!(?request, code, "unsolicited reply"),
    }
}

//! Port between the client runtime and the connection to the service.
//!
//! Managers in this layer never touch sockets.  They describe what to send
//! as an [`MmiMessage`] and hand it to a [`MessageSender`]; the
//! infrastructure implementation writes it to the session socket, tests
//! record it.

use async_trait::async_trait;
use mmi_core::{MessageId, MmiMessage, ProtocolError};
use thiserror::Error;

/// Errors surfaced by the client runtime.
///
/// [`ClientError::code`] maps each variant to the negative code reported to
/// callers that only deal in integers.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {path}: {source}")]
    ConnectFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("connection closed by the service")]
    Closed,
    #[error("no reply to {0:?} in time")]
    Timeout(MessageId),
    #[error("service rejected {request:?} with code {code}")]
    Rejected { request: MessageId, code: i32 },
    #[error("no local handler with id {0}")]
    HandlerNotFound(i32),
    #[error("too many local handlers (limit {0})")]
    TooManyHandlers(usize),
    #[error("subscribe id space exhausted")]
    ResourceExhausted,
    #[error("no subscription with id {0}")]
    SubscriptionNotFound(i32),
}

impl ClientError {
    pub fn code(&self) -> i32 {
        match self {
            Self::ConnectFailed { .. } => -1,
            Self::Io(_) => -2,
            Self::Protocol(_) => -3,
            Self::Closed => -4,
            Self::Timeout(_) => -5,
            Self::Rejected { code, .. } => *code,
            Self::HandlerNotFound(_) => -6,
            Self::TooManyHandlers(_) => -7,
            Self::ResourceExhausted => -8,
            Self::SubscriptionNotFound(_) => -9,
        }
    }
}

/// Outbound half of the connection.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends a message the service does not answer.
    async fn send(&self, msg: &MmiMessage) -> Result<(), ClientError>;

    /// Sends a request and waits for its `RequestResult`.
    ///
    /// A non-zero result code becomes [`ClientError::Rejected`].
    async fn request(&self, msg: &MmiMessage) -> Result<(), ClientError>;
}

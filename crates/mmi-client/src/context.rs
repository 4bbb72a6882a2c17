//! Wiring of a connected [`InputManager`].

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::application::input_manager::InputManager;
use crate::application::sender::{ClientError, MessageSender};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::connection::MmiConnection;

/// A running client: the manager plus its message-routing task.
pub struct ClientContext {
    pub manager: Arc<InputManager>,
    pub connection: Arc<MmiConnection>,
    pub router: JoinHandle<()>,
}

impl ClientContext {
    /// Connects to the service socket named in `config`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let (connection, rx) = MmiConnection::connect(config).await?;
        let manager = InputManager::new(Arc::clone(&connection) as Arc<dyn MessageSender>, config);
        let router = tokio::spawn(Arc::clone(&manager).run(rx));
        Ok(Self { manager, connection, router })
    }

    /// Attaches to a session the service already created with a socket pair.
    pub fn attach(stream: std::os::unix::net::UnixStream, config: &ClientConfig) -> Result<Self, ClientError> {
        let (connection, rx) = MmiConnection::from_std(stream, config)?;
        let manager = InputManager::new(Arc::clone(&connection) as Arc<dyn MessageSender>, config);
        let router = tokio::spawn(Arc::clone(&manager).run(rx));
        Ok(Self { manager, connection, router })
    }
}

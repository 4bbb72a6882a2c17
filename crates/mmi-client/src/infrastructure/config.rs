//! Client runtime settings.

use std::path::PathBuf;
use std::time::Duration;

use mmi_core::protocol::TokenType;

use crate::application::anr_handler::DEFAULT_UI_TIMEOUT;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Listening socket of the service.
    pub socket_path: PathBuf,
    /// Name reported in `Connect`; shown in service logs.
    pub program_name: String,
    pub module_type: i32,
    pub token_type: TokenType,
    /// How long a request waits for its `RequestResult`.
    pub request_timeout: Duration,
    /// Must match the service's `anr.ui_timeout_ms`.
    pub ui_timeout: Duration,
    /// Local interceptors (and, separately, monitors) one client may hold.
    pub max_handlers_per_type: usize,
    /// Capacity of the inbound message channel.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/mmi/mmi.sock"),
            program_name: "mmi-client".to_string(),
            module_type: 0,
            token_type: TokenType::Hap,
            request_timeout: Duration::from_secs(2),
            ui_timeout: DEFAULT_UI_TIMEOUT,
            max_handlers_per_type: 16,
            channel_capacity: 256,
        }
    }
}

//! Session transport over Unix-domain sockets.

pub mod uds_server;

pub use uds_server::{SessionError, UdsServer};

//! Infrastructure layer for the client runtime.
//!
//! - **`config`** – [`config::ClientConfig`], plain settings with defaults
//!   matching the service's.
//! - **`connection`** – [`connection::MmiConnection`], the session socket and
//!   its reader task.

pub mod config;
pub mod connection;

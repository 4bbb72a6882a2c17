//! Application layer for the client runtime.
//!
//! # Modules
//!
//! - **`sender`** – The [`sender::MessageSender`] port and the client error
//!   type.  Every manager talks to the service through this port.
//!
//! - **`handler_manager`** – Local interceptors and monitors, aggregated
//!   into one registration per handler type.
//!
//! - **`key_subscription`** – Hot-key subscriptions and subscribe-id
//!   allocation.
//!
//! - **`anr_handler`** – Acknowledges processed events so the service does
//!   not declare this client unresponsive.
//!
//! - **`standardized`** – Semantic event handlers ("copy", "answer call").
//!
//! - **`input_manager`** – The context object that owns all of the above
//!   and routes inbound messages.

pub mod anr_handler;
pub mod handler_manager;
pub mod input_manager;
pub mod key_subscription;
pub mod sender;
pub mod standardized;

//! mmi-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does mmi-client do? (for beginners)
//!
//! Applications do not read input devices themselves.  They connect to the
//! MMI service over a local socket and receive events that the service has
//! already normalized and routed.  This crate is the application side of
//! that socket:
//!
//! 1. Connects and identifies the program (`Connect`).
//! 2. Registers interceptors and monitors.  Any number of local handlers are
//!    folded into a single service-side registration per handler type.
//! 3. Subscribes hot keys (for example Ctrl+C) and semantic "standardized"
//!    events such as copy or answer-call.
//! 4. Receives events and hands them to the matching local handler.
//! 5. Tells the service which events it has processed, so a stuck
//!    application can be detected without blocking everyone else.
//!
//! Start with [`ClientContext::connect`] and use the returned
//! [`InputManager`](application::input_manager::InputManager).

/// Application layer: handler bookkeeping and message routing.
pub mod application;

/// Wiring of a connected client.
pub mod context;

/// Infrastructure layer: configuration and the session socket.
pub mod infrastructure;

pub use context::ClientContext;

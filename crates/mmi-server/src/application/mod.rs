//! Application layer of the MMI service.
//!
//! # What lives here (for beginners)
//!
//! Everything between "a normalized event exists" and "bytes go out on a
//! client socket", plus the handling of client requests.  The code talks to
//! sockets only through the [`session::SessionTransmitter`] trait, so every
//! registry can be tested with a recording double instead of real sockets.
//!
//! # Sub-modules
//!
//! - **`normalize`** – Owns the transform processors and feeds their output
//!   into the pipeline.  Runs on the input-reader thread.
//! - **`pipeline`** – The fixed order: interceptors, monitors, key
//!   subscribers, dispatch.
//! - **`interceptor`** / **`monitor`** / **`key_subscriber`** – Client
//!   registrations that see events before (or instead of) the window.
//! - **`handler`** – The priority-ordered list shared by interceptors and
//!   monitors.
//! - **`dispatch`** – Picks the target window and sends the event to its
//!   session.
//! - **`anr`** – Tracks unacknowledged events per session.
//! - **`devices`** – Device registry and the current display layout.
//! - **`msg_handler`** – Answers client requests.
//! - **`standardized`** – Windows registered for semantic events, and the
//!   device lifecycle notifications sent to them.
//! - **`session`** – Ports to the transport.

pub mod anr;
pub mod devices;
pub mod dispatch;
pub mod handler;
pub mod interceptor;
pub mod key_subscriber;
pub mod monitor;
pub mod msg_handler;
pub mod normalize;
pub mod pipeline;
pub mod session;
pub mod standardized;

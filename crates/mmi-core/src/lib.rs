//! # mmi-core
//!
//! Shared library for the MMI input service containing the wire packet
//! format, the canonical input event model, and key code translation tables.
//!
//! This crate is used by both the service (`mmi-server`) and the client
//! runtime (`mmi-client`).  It has no dependency on sockets, threads, or
//! kernel input APIs.
//!
//! # Architecture overview (for beginners)
//!
//! The MMI service sits between the kernel's input devices and the
//! applications that draw windows.  It reads raw device samples, turns them
//! into normalized events, and routes each event through a fixed pipeline
//! (interceptors, then monitors, then key subscribers, then the focused or
//! hit-tested window).  Applications talk to it over a local socket.
//!
//! This crate (`mmi-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the socket.  Each message is a
//!   [`protocol::NetPacket`]: an 8-byte header followed by typed fields in a
//!   fixed order.  [`protocol::StreamBuffer`] reassembles packets from a
//!   byte stream.
//!
//! - **`domain`** – The canonical event model: [`PointerEvent`] with its
//!   per-contact items, [`KeyEvent`], window/display geometry, and handler
//!   descriptors such as [`domain::MonitorId`].
//!
//! - **`keymap`** – Translation from Linux evdev codes to the logical key
//!   codes and button ids carried on the wire.

pub mod domain;
pub mod keymap;
pub mod protocol;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export the most-used types at the crate root so callers can write
// `mmi_core::PointerEvent` instead of `mmi_core::domain::pointer_event::PointerEvent`.
pub use domain::{
    DisplayGroupInfo, DisplayInfo, KeyAction, KeyEvent, KeyItem, PointerAction, PointerEvent,
    PointerItem, SourceType, WindowInfo,
};
pub use keymap::KeyCode;
pub use protocol::{decode_message, encode_message, MessageId, MmiMessage, NetPacket, ProtocolError};

/// Wall-clock time in microseconds since the Unix epoch.
///
/// Event timestamps and ANR bookkeeping use this clock.  A clock set before
/// 1970 yields `0` rather than an error.
pub fn current_time_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_us_is_positive_and_monotone_enough() {
        let a = current_time_us();
        let b = current_time_us();
        assert!(a > 0);
        assert!(b >= a);
    }
}

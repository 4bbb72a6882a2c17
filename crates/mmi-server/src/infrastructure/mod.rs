//! Infrastructure layer of the MMI service.
//!
//! OS-facing adapters: raw input sources, the Unix-socket session
//! transport, configuration storage, optional device plugins and the
//! renderer side channel.
//!
//! The application layer reaches this code only through traits
//! ([`render::RenderNotifier`], the session ports it defines itself) and the
//! [`input_source::RawInputEvent`] data type.

pub mod input_source;
pub mod plugin;
pub mod render;
pub mod storage;
pub mod transport;

//! Side channel to the render/compositor service.
//!
//! The dispatch handler tells the compositor when a new touch or click
//! starts so it can boost frame scheduling.  The call is fire-and-forget.

use mmi_core::PointerAction;
use tracing::trace;

/// Receives pointer-start notifications for the compositor.
#[cfg_attr(test, mockall::automock)]
pub trait RenderNotifier: Send + Sync {
    fn notify_pointer_event(&self, action: PointerAction, program_name: &str, pid: i32, touch_count: i32);
}

/// Used when no compositor is attached; logs at `trace`.
#[derive(Debug, Default)]
pub struct LoggingRenderNotifier;

impl RenderNotifier for LoggingRenderNotifier {
    fn notify_pointer_event(&self, action: PointerAction, program_name: &str, pid: i32, touch_count: i32) {
        trace!(?action, program_name, pid, touch_count, "pointer event notified to renderer");
    }
}

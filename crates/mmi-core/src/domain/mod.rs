//! Input domain entities: events, display geometry and handler descriptors.

pub mod device;
pub mod display_group;
pub mod handler;
pub mod key_event;
pub mod pointer_event;

pub use device::{InputDevice, KeyOption};
pub use display_group::{DisplayGroupInfo, DisplayInfo, Rect, WindowInfo, WINDOW_FLAG_UNTOUCHABLE};
pub use handler::{AnrEventType, DeviceTags, EventTypeMask, HandlerType, MonitorId};
pub use key_event::{KeyAction, KeyEvent, KeyItem, KEY_CODE_UNKNOWN};
pub use pointer_event::{
    AxisType, DeviceId, PointerAction, PointerEvent, PointerItem, SourceType, ToolType,
};

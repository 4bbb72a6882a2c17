//! Display and window geometry as reported by the window manager.
//!
//! The service does not compute window geometry itself.  A window-manager
//! client pushes a complete [`DisplayGroupInfo`] snapshot whenever windows
//! move, open or close, and the dispatch path only performs hit tests
//! against the latest snapshot.
//!
//! Windows are stored topmost first, so the first window containing a point
//! is the one the user sees under it.

use serde::{Deserialize, Serialize};

/// Window cannot receive pointer input (e.g. a transparent overlay).
pub const WINDOW_FLAG_UNTOUCHABLE: u32 = 0x0000_0001;

/// An axis-aligned rectangle in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rightmost X coordinate (exclusive).
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottommost Y coordinate (exclusive).
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// A window that may receive input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: i32,
    /// Process owning the window; used to find its session.
    pub pid: i32,
    pub uid: i32,
    pub area: Rect,
    /// Window that receives the event on behalf of `id` (usually `id` itself).
    pub agent_window_id: i32,
    pub flags: u32,
}

impl WindowInfo {
    pub fn is_touchable(&self) -> bool {
        self.flags & WINDOW_FLAG_UNTOUCHABLE == 0
    }
}

/// One physical display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub dpi: i32,
    pub name: String,
}

impl DisplayInfo {
    pub fn area(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Complete display/window snapshot.
///
/// Wire order: `width, height, focus_window_id`, then the count-prefixed
/// window records, then the count-prefixed display records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayGroupInfo {
    pub width: i32,
    pub height: i32,
    pub focus_window_id: i32,
    pub windows: Vec<WindowInfo>,
    pub displays: Vec<DisplayInfo>,
}

impl DisplayGroupInfo {
    pub fn window(&self, window_id: i32) -> Option<&WindowInfo> {
        self.windows.iter().find(|w| w.id == window_id)
    }

    /// Topmost touchable window containing the display point, if any.
    pub fn window_at(&self, x: i32, y: i32) -> Option<&WindowInfo> {
        self.windows
            .iter()
            .find(|w| w.is_touchable() && w.area.contains(x, y))
    }

    pub fn focus_window(&self) -> Option<&WindowInfo> {
        self.window(self.focus_window_id)
    }

    pub fn display(&self, display_id: i32) -> Option<&DisplayInfo> {
        self.displays.iter().find(|d| d.id == display_id)
    }

    pub fn first_display(&self) -> Option<&DisplayInfo> {
        self.displays.first()
    }

    /// Display whose area contains the point.
    pub fn display_at(&self, x: i32, y: i32) -> Option<&DisplayInfo> {
        self.displays.iter().find(|d| d.area().contains(x, y))
    }
}

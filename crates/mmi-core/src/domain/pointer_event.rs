//! Canonical pointer event model.
//!
//! A [`PointerEvent`] is one normalized sample from a pointer-class device
//! (mouse, touchscreen, touchpad, joystick or tablet tool).  Transform
//! processors own one instance per device and mutate it in place across
//! calls, so fields such as the pressed-button set and the active button id
//! persist from one raw event to the next within a gesture.
//!
//! # Contacts and items (for beginners)
//!
//! A touchscreen can report several fingers at once.  Each finger is a
//! *contact* and is described by one [`PointerItem`], identified by its
//! `pointer_id`.  The event's own `pointer_id` names the contact that changed
//! in this sample (the *active* item).  A mouse always has exactly one item,
//! with pointer id 0.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Identifies an input device for the lifetime of its connection.
pub type DeviceId = i32;

/// Which class of physical device produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SourceType {
    Unknown = 0,
    Mouse = 1,
    TouchScreen = 2,
    Touchpad = 3,
    Joystick = 4,
}

impl TryFrom<i32> for SourceType {
    type Error = ();
    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Mouse),
            2 => Ok(Self::TouchScreen),
            3 => Ok(Self::Touchpad),
            4 => Ok(Self::Joystick),
            _ => Err(()),
        }
    }
}

/// What happened in this sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PointerAction {
    Unknown = 0,
    Cancel = 1,
    Down = 2,
    Move = 3,
    Up = 4,
    AxisBegin = 5,
    AxisUpdate = 6,
    AxisEnd = 7,
    ButtonDown = 8,
    ButtonUp = 9,
    SwipeBegin = 10,
    SwipeUpdate = 11,
    SwipeEnd = 12,
}

impl PointerAction {
    /// Returns `true` for actions that start a new interaction.
    pub fn is_down_class(self) -> bool {
        matches!(self, Self::Down | Self::ButtonDown)
    }

    /// Returns `true` for actions that end a contact's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Up | Self::Cancel)
    }
}

impl TryFrom<i32> for PointerAction {
    type Error = ();
    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Cancel),
            2 => Ok(Self::Down),
            3 => Ok(Self::Move),
            4 => Ok(Self::Up),
            5 => Ok(Self::AxisBegin),
            6 => Ok(Self::AxisUpdate),
            7 => Ok(Self::AxisEnd),
            8 => Ok(Self::ButtonDown),
            9 => Ok(Self::ButtonUp),
            10 => Ok(Self::SwipeBegin),
            11 => Ok(Self::SwipeUpdate),
            12 => Ok(Self::SwipeEnd),
            _ => Err(()),
        }
    }
}

/// The physical tool touching or pointing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum ToolType {
    #[default]
    Finger = 0,
    Pen = 1,
    Rubber = 2,
    Brush = 3,
    Pencil = 4,
    Airbrush = 5,
    Mouse = 6,
    Lens = 7,
    Knuckle = 8,
    Touchpad = 9,
    Palm = 10,
    Joystick = 11,
}

impl TryFrom<i32> for ToolType {
    type Error = ();
    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(Self::Finger),
            1 => Ok(Self::Pen),
            2 => Ok(Self::Rubber),
            3 => Ok(Self::Brush),
            4 => Ok(Self::Pencil),
            5 => Ok(Self::Airbrush),
            6 => Ok(Self::Mouse),
            7 => Ok(Self::Lens),
            8 => Ok(Self::Knuckle),
            9 => Ok(Self::Touchpad),
            10 => Ok(Self::Palm),
            11 => Ok(Self::Joystick),
            _ => Err(()),
        }
    }
}

/// Continuous values an event can carry besides coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum AxisType {
    ScrollVertical = 0,
    ScrollHorizontal = 1,
    Pinch = 2,
    Rotate = 3,
    AbsX = 4,
    AbsY = 5,
    AbsZ = 6,
    AbsRz = 7,
    AbsGas = 8,
    AbsBrake = 9,
    AbsHat0X = 10,
    AbsHat0Y = 11,
    AbsThrottle = 12,
}

impl TryFrom<i32> for AxisType {
    type Error = ();
    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(Self::ScrollVertical),
            1 => Ok(Self::ScrollHorizontal),
            2 => Ok(Self::Pinch),
            3 => Ok(Self::Rotate),
            4 => Ok(Self::AbsX),
            5 => Ok(Self::AbsY),
            6 => Ok(Self::AbsZ),
            7 => Ok(Self::AbsRz),
            8 => Ok(Self::AbsGas),
            9 => Ok(Self::AbsBrake),
            10 => Ok(Self::AbsHat0X),
            11 => Ok(Self::AbsHat0Y),
            12 => Ok(Self::AbsThrottle),
            _ => Err(()),
        }
    }
}

/// One contact within a [`PointerEvent`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerItem {
    pub pointer_id: i32,
    /// Microseconds; the time this contact went down.
    pub down_time: i64,
    pub pressed: bool,
    pub display_x: i32,
    pub display_y: i32,
    pub window_x: i32,
    pub window_y: i32,
    pub width: i32,
    pub height: i32,
    pub pressure: f64,
    pub tilt_x: f64,
    pub tilt_y: f64,
    pub tool_type: ToolType,
    /// Window this contact is bound to; `-1` until dispatch resolves it.
    pub target_window_id: i32,
    pub device_id: DeviceId,
}

impl PointerItem {
    /// Creates an item for `pointer_id` with no window binding.
    pub fn new(pointer_id: i32) -> Self {
        Self {
            pointer_id,
            target_window_id: -1,
            ..Self::default()
        }
    }
}

/// A normalized pointer-class input sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Event id assigned by the service; `-1` until assigned.
    pub id: i32,
    pub device_id: DeviceId,
    pub source_type: SourceType,
    pub pointer_action: PointerAction,
    /// The contact that changed in this sample.
    pub pointer_id: i32,
    /// The button this sample is about, or [`PointerEvent::BUTTON_NONE`].
    pub button_id: i32,
    pressed_buttons: BTreeSet<i32>,
    items: Vec<PointerItem>,
    axes: BTreeMap<AxisType, f64>,
    pub target_display_id: i32,
    pub target_window_id: i32,
    pub agent_window_id: i32,
    /// Microseconds.
    pub action_time: i64,
    /// Microseconds; when the current gesture started.
    pub action_start_time: i64,
    pub finger_count: i32,
}

impl PointerEvent {
    pub const BUTTON_NONE: i32 = -1;

    pub const MOUSE_BUTTON_LEFT: i32 = 0;
    pub const MOUSE_BUTTON_RIGHT: i32 = 1;
    pub const MOUSE_BUTTON_MIDDLE: i32 = 2;
    pub const MOUSE_BUTTON_SIDE: i32 = 3;
    pub const MOUSE_BUTTON_EXTRA: i32 = 4;
    pub const MOUSE_BUTTON_FORWARD: i32 = 5;
    pub const MOUSE_BUTTON_BACK: i32 = 6;
    pub const MOUSE_BUTTON_TASK: i32 = 7;

    pub const JOYSTICK_BUTTON_TL: i32 = 8;
    pub const JOYSTICK_BUTTON_TR: i32 = 9;
    pub const JOYSTICK_BUTTON_TL2: i32 = 10;
    pub const JOYSTICK_BUTTON_TR2: i32 = 11;
    pub const JOYSTICK_BUTTON_SELECT: i32 = 12;
    pub const JOYSTICK_BUTTON_START: i32 = 13;
    pub const JOYSTICK_BUTTON_MODE: i32 = 14;
    pub const JOYSTICK_BUTTON_THUMBL: i32 = 15;
    pub const JOYSTICK_BUTTON_THUMBR: i32 = 16;
    pub const JOYSTICK_BUTTON_TRIGGER: i32 = 17;
    pub const JOYSTICK_BUTTON_THUMB: i32 = 18;
    pub const JOYSTICK_BUTTON_THUMB2: i32 = 19;
    pub const JOYSTICK_BUTTON_TOP: i32 = 20;
    pub const JOYSTICK_BUTTON_TOP2: i32 = 21;
    pub const JOYSTICK_BUTTON_PINKIE: i32 = 22;
    pub const JOYSTICK_BUTTON_BASE: i32 = 23;
    pub const JOYSTICK_BUTTON_A: i32 = 24;
    pub const JOYSTICK_BUTTON_B: i32 = 25;
    pub const JOYSTICK_BUTTON_C: i32 = 26;
    pub const JOYSTICK_BUTTON_X: i32 = 27;
    pub const JOYSTICK_BUTTON_Y: i32 = 28;
    pub const JOYSTICK_BUTTON_Z: i32 = 29;

    /// Creates an empty event for `source_type`.
    pub fn new(source_type: SourceType) -> Self {
        Self {
            id: -1,
            device_id: -1,
            source_type,
            pointer_action: PointerAction::Unknown,
            pointer_id: -1,
            button_id: Self::BUTTON_NONE,
            pressed_buttons: BTreeSet::new(),
            items: Vec::new(),
            axes: BTreeMap::new(),
            target_display_id: -1,
            target_window_id: -1,
            agent_window_id: -1,
            action_time: 0,
            action_start_time: 0,
            finger_count: 0,
        }
    }

    // ── Pointer items ─────────────────────────────────────────────────────────

    /// Appends `item` without checking for an existing item with the same id.
    pub fn add_pointer_item(&mut self, item: PointerItem) {
        self.items.push(item);
    }

    /// Replaces the item with the same pointer id, or appends it.
    pub fn update_pointer_item(&mut self, item: PointerItem) {
        match self.items.iter_mut().find(|i| i.pointer_id == item.pointer_id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Removes the item for `pointer_id`; returns whether one was present.
    pub fn remove_pointer_item(&mut self, pointer_id: i32) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.pointer_id != pointer_id);
        self.items.len() != before
    }

    /// Removes every item.
    pub fn clear_pointer_items(&mut self) {
        self.items.clear();
    }

    pub fn pointer_item(&self, pointer_id: i32) -> Option<&PointerItem> {
        self.items.iter().find(|i| i.pointer_id == pointer_id)
    }

    pub fn pointer_item_mut(&mut self, pointer_id: i32) -> Option<&mut PointerItem> {
        self.items.iter_mut().find(|i| i.pointer_id == pointer_id)
    }

    pub fn pointer_items(&self) -> &[PointerItem] {
        &self.items
    }

    pub fn pointer_items_mut(&mut self) -> &mut [PointerItem] {
        &mut self.items
    }

    /// Pointer ids in item order.
    pub fn pointer_ids(&self) -> Vec<i32> {
        self.items.iter().map(|i| i.pointer_id).collect()
    }

    /// Keeps only the items for which `keep` returns `true`.
    pub fn retain_pointer_items<F: FnMut(&PointerItem) -> bool>(&mut self, keep: F) {
        self.items.retain(keep);
    }

    // ── Buttons ───────────────────────────────────────────────────────────────

    pub fn set_button_pressed(&mut self, button: i32) {
        self.pressed_buttons.insert(button);
    }

    pub fn delete_released_button(&mut self, button: i32) {
        self.pressed_buttons.remove(&button);
    }

    pub fn is_button_pressed(&self, button: i32) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn pressed_buttons(&self) -> &BTreeSet<i32> {
        &self.pressed_buttons
    }

    pub fn clear_buttons(&mut self) {
        self.pressed_buttons.clear();
    }

    // ── Axes ──────────────────────────────────────────────────────────────────

    pub fn set_axis_value(&mut self, axis: AxisType, value: f64) {
        self.axes.insert(axis, value);
    }

    pub fn axis_value(&self, axis: AxisType) -> Option<f64> {
        self.axes.get(&axis).copied()
    }

    pub fn has_axis(&self, axis: AxisType) -> bool {
        self.axes.contains_key(&axis)
    }

    pub fn axes(&self) -> &BTreeMap<AxisType, f64> {
        &self.axes
    }

    /// Drops every axis value carried over from the previous sample.
    pub fn clear_axis_values(&mut self) {
        self.axes.clear();
    }

    // ── Validation ────────────────────────────────────────────────────────────

    /// Returns `true` if the event is internally consistent and may be dispatched.
    ///
    /// Rules:
    /// - the source type is known and `pointer_id` is non-negative;
    /// - no two items share a pointer id;
    /// - an item exists for `pointer_id`;
    /// - mouse events carry exactly one item, and any referenced button agrees
    ///   with the pressed set (pressed for `BUTTON_DOWN` and drags, released
    ///   for `BUTTON_UP`);
    /// - touch-class `DOWN`/`MOVE` have a pressed active item and `UP` a
    ///   released one.
    pub fn is_valid(&self) -> bool {
        if self.source_type == SourceType::Unknown || self.pointer_id < 0 {
            return false;
        }
        let mut seen = BTreeSet::new();
        if !self.items.iter().all(|i| seen.insert(i.pointer_id)) {
            return false;
        }
        let Some(active) = self.pointer_item(self.pointer_id) else {
            return false;
        };
        match self.source_type {
            SourceType::Mouse => self.is_valid_mouse(),
            SourceType::TouchScreen | SourceType::Touchpad => self.is_valid_touch(active),
            SourceType::Joystick | SourceType::Unknown => true,
        }
    }

    fn is_valid_mouse(&self) -> bool {
        if self.items.len() != 1 {
            return false;
        }
        match self.pointer_action {
            PointerAction::ButtonDown => {
                self.button_id != Self::BUTTON_NONE && self.is_button_pressed(self.button_id)
            }
            PointerAction::ButtonUp => {
                self.button_id != Self::BUTTON_NONE && !self.is_button_pressed(self.button_id)
            }
            _ => self.button_id == Self::BUTTON_NONE || self.is_button_pressed(self.button_id),
        }
    }

    fn is_valid_touch(&self, active: &PointerItem) -> bool {
        match self.pointer_action {
            PointerAction::Down | PointerAction::Move => active.pressed,
            PointerAction::Up => !active.pressed,
            _ => true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

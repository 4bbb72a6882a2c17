//! Final-mile delivery of events to the owning window's session.
//!
//! # Choosing the window (for beginners)
//!
//! - **Touch**: each contact is hit-tested once, when it goes down, and
//!   stays bound to that window until it lifts.  When the contacts on
//!   screen belong to different windows the event is split: each window
//!   gets a copy holding only its own contacts.
//! - **Mouse**: the window under the cursor, except during a drag.  The
//!   window hit by `BUTTON_DOWN` keeps receiving events until the last
//!   button is released.
//! - **Keys, touchpad gestures, joysticks**: the focus window.
//!
//! The window's `pid` leads to the session.  No session for that pid is a
//! normal outcome (the app is not running) and is only logged at `debug`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mmi_core::domain::{AnrEventType, DeviceId, SourceType};
use mmi_core::{current_time_us, DisplayGroupInfo, KeyEvent, MmiMessage, PointerAction, PointerEvent, WindowInfo};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::anr::AnrManager;
use super::session::{send_message, SessionId, SessionTransmitter};
use crate::infrastructure::render::RenderNotifier;

/// Error type for dispatch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no session registered for pid {0}")]
    SessionNotFound(i32),
    #[error("no window to receive the event")]
    NoTargetWindow,
    #[error("session {0} is not responding")]
    NotResponding(SessionId),
    #[error("failed to send to session {0}")]
    SendFailed(SessionId),
}

impl DispatchError {
    pub fn code(&self) -> i32 {
        match self {
            Self::SessionNotFound(_) => -6,
            Self::NoTargetWindow => -7,
            Self::NotResponding(_) => -8,
            Self::SendFailed(_) => -9,
        }
    }
}

/// Returns `true` for events that start a new interaction.
pub fn acquire_enable_mark(event: &PointerEvent) -> bool {
    event.pointer_action.is_down_class()
}

#[derive(Debug, Default)]
struct Bindings {
    /// `(device, pointer id)` → window hit at `DOWN`.
    touch: HashMap<(DeviceId, i32), i32>,
    /// Device → window hit at the first `BUTTON_DOWN` of a drag.
    mouse: HashMap<DeviceId, i32>,
}

pub struct DispatchHandler {
    transmitter: Arc<dyn SessionTransmitter>,
    anr: Arc<AnrManager>,
    render: Arc<dyn RenderNotifier>,
    bindings: Mutex<Bindings>,
}

impl DispatchHandler {
    pub fn new(
        transmitter: Arc<dyn SessionTransmitter>,
        anr: Arc<AnrManager>,
        render: Arc<dyn RenderNotifier>,
    ) -> Self {
        Self {
            transmitter,
            anr,
            render,
            bindings: Mutex::new(Bindings::default()),
        }
    }

    // ── Pointer ───────────────────────────────────────────────────────────────

    pub fn handle_pointer_event(&self, event: &PointerEvent, displays: &DisplayGroupInfo) -> Result<(), DispatchError> {
        match event.source_type {
            SourceType::TouchScreen => self.handle_touch(event, displays),
            SourceType::Mouse => self.handle_mouse(event, displays),
            SourceType::Touchpad | SourceType::Joystick | SourceType::Unknown => {
                let window = displays.focus_window().ok_or(DispatchError::NoTargetWindow)?;
                self.send_pointer(event.clone(), window, displays)
            }
        }
    }

    fn handle_mouse(&self, event: &PointerEvent, displays: &DisplayGroupInfo) -> Result<(), DispatchError> {
        let item = event
            .pointer_item(event.pointer_id)
            .ok_or(DispatchError::NoTargetWindow)?;
        let window = {
            let mut bindings = self.bindings();
            let bound = bindings
                .mouse
                .get(&event.device_id)
                .and_then(|id| displays.window(*id));
            let window = bound
                .or_else(|| displays.window_at(item.display_x, item.display_y))
                .ok_or(DispatchError::NoTargetWindow)?;
            match event.pointer_action {
                PointerAction::ButtonDown if bound.is_none() => {
                    bindings.mouse.insert(event.device_id, window.id);
                }
                PointerAction::ButtonUp if event.pressed_buttons().is_empty() => {
                    bindings.mouse.remove(&event.device_id);
                }
                _ => {}
            }
            window
        };
        self.send_pointer(event.clone(), window, displays)
    }

    fn handle_touch(&self, event: &PointerEvent, displays: &DisplayGroupInfo) -> Result<(), DispatchError> {
        let mut event = event.clone();
        let device = event.device_id;
        let active = event.pointer_id;

        let (active_window, groups) = {
            let mut bindings = self.bindings();
            if event.pointer_action == PointerAction::Down {
                if let Some(item) = event.pointer_item(active) {
                    match displays.window_at(item.display_x, item.display_y) {
                        Some(window) => {
                            bindings.touch.insert((device, active), window.id);
                        }
                        None => debug!(pointer_id = active, "touch down outside every window"),
                    }
                }
            }
            let mut groups: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
            for item in event.pointer_items_mut() {
                if let Some(window_id) = bindings.touch.get(&(device, item.pointer_id)) {
                    item.target_window_id = *window_id;
                    groups.entry(*window_id).or_default().push(item.pointer_id);
                }
            }
            let active_window = bindings.touch.get(&(device, active)).copied();
            if event.pointer_action.is_terminal() {
                bindings.touch.remove(&(device, active));
            }
            (active_window, groups)
        };

        let active_window = active_window
            .and_then(|id| displays.window(id))
            .ok_or(DispatchError::NoTargetWindow)?;
        if groups.len() <= 1 {
            return self.send_pointer(event, active_window, displays);
        }
        self.handle_multi_window_pointer_event(&event, active_window.id, &groups, displays)
    }

    /// Sends one filtered copy of `event` per window.
    ///
    /// Windows that do not own the active contact see the copy as a `MOVE`
    /// of their first contact.
    fn handle_multi_window_pointer_event(
        &self,
        event: &PointerEvent,
        active_window: i32,
        groups: &BTreeMap<i32, Vec<i32>>,
        displays: &DisplayGroupInfo,
    ) -> Result<(), DispatchError> {
        let mut result = Ok(());
        for (window_id, ids) in groups {
            let Some(window) = displays.window(*window_id) else {
                continue;
            };
            let mut copy = event.clone();
            copy.retain_pointer_items(|i| ids.contains(&i.pointer_id));
            if *window_id != active_window {
                copy.pointer_action = PointerAction::Move;
                copy.pointer_id = ids[0];
            }
            trace!(window_id, contacts = ids.len(), "split touch event");
            if let Err(e) = self.send_pointer(copy, window, displays) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Drops contacts the destination must not see.
    ///
    /// Keeps the active contact; of the others, keeps those still pressed
    /// and bound to a window of the same process.
    pub fn filter_invalid_pointer_item(&self, event: &mut PointerEvent, session: SessionId, displays: &DisplayGroupInfo) {
        if event.pointer_items().len() <= 1 {
            return;
        }
        let Some(pid) = self.transmitter.session_info(session).map(|i| i.pid) else {
            return;
        };
        let active = event.pointer_id;
        event.retain_pointer_items(|item| {
            item.pointer_id == active
                || (item.pressed
                    && displays
                        .window(item.target_window_id)
                        .is_some_and(|w| w.pid == pid))
        });
    }

    fn send_pointer(&self, mut event: PointerEvent, window: &WindowInfo, displays: &DisplayGroupInfo) -> Result<(), DispatchError> {
        let session = self.session_for(window.pid)?;
        let now = current_time_us();
        if self.anr.trigger_anr(session, AnrEventType::Dispatch, now) {
            return Err(DispatchError::NotResponding(session));
        }

        event.target_window_id = window.id;
        event.agent_window_id = window.agent_window_id;
        for item in event.pointer_items_mut() {
            item.window_x = item.display_x - window.area.x;
            item.window_y = item.display_y - window.area.y;
            if item.target_window_id < 0 {
                item.target_window_id = window.id;
            }
        }
        self.filter_invalid_pointer_item(&mut event, session, displays);

        let notify = acquire_enable_mark(&event);
        let (action, event_id) = (event.pointer_action, event.id);
        let touch_count = event.pointer_items().iter().filter(|i| i.pressed).count() as i32;
        if !send_message(self.transmitter.as_ref(), session, &MmiMessage::OnPointerEvent(event)) {
            warn!(session, event_id, "failed to dispatch pointer event");
            return Err(DispatchError::SendFailed(session));
        }
        self.anr.record(session, AnrEventType::Dispatch, event_id, now);
        trace!(session, event_id, window_id = window.id, ?action, "pointer event dispatched");

        if notify {
            let program_name = self
                .transmitter
                .session_info(session)
                .map(|i| i.program_name)
                .unwrap_or_default();
            self.render
                .notify_pointer_event(action, &program_name, window.pid, touch_count);
        }
        Ok(())
    }

    // ── Key ───────────────────────────────────────────────────────────────────

    /// Sends a key event to the focus window.
    pub fn handle_key_event(&self, event: &KeyEvent, displays: &DisplayGroupInfo) -> Result<(), DispatchError> {
        let window = displays.focus_window().ok_or(DispatchError::NoTargetWindow)?;
        let mut event = event.clone();
        event.target_window_id = window.id;
        self.dispatch_key_event_pid(window.pid, &event)
    }

    /// Sends a key event to the session of process `pid`.
    pub fn dispatch_key_event_pid(&self, pid: i32, event: &KeyEvent) -> Result<(), DispatchError> {
        let session = self.session_for(pid)?;
        let now = current_time_us();
        if self.anr.trigger_anr(session, AnrEventType::Dispatch, now) {
            return Err(DispatchError::NotResponding(session));
        }
        if !send_message(self.transmitter.as_ref(), session, &MmiMessage::OnKeyEvent(event.clone())) {
            warn!(session, event_id = event.id, "failed to dispatch key event");
            return Err(DispatchError::SendFailed(session));
        }
        self.anr.record(session, AnrEventType::Dispatch, event.id, now);
        trace!(session, event_id = event.id, "key event dispatched");
        Ok(())
    }

    fn session_for(&self, pid: i32) -> Result<SessionId, DispatchError> {
        self.transmitter.session_for_pid(pid).ok_or_else(|| {
            debug!(pid, "no session for target pid");
            DispatchError::SessionNotFound(pid)
        })
    }

    fn bindings(&self) -> MutexGuard<'_, Bindings> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mmi_core::domain::{KeyAction, KeyItem, PointerItem, Rect};
    use mmi_core::DisplayInfo;

    use super::*;
    use crate::application::anr::LoggingAnrObserver;
    use crate::application::session::test_support::RecordingTransmitter;
    use crate::infrastructure::render::{LoggingRenderNotifier, MockRenderNotifier};

    fn window(id: i32, pid: i32, x: i32, width: i32) -> WindowInfo {
        WindowInfo {
            id,
            pid,
            uid: 0,
            area: Rect::new(x, 0, width, 1000),
            agent_window_id: id,
            flags: 0,
        }
    }

    /// Two side-by-side windows: 10 (pid 100) on the left, 20 (pid 200) on the right.
    fn displays() -> DisplayGroupInfo {
        DisplayGroupInfo {
            width: 1000,
            height: 1000,
            focus_window_id: 20,
            windows: vec![window(10, 100, 0, 500), window(20, 200, 500, 500)],
            displays: vec![DisplayInfo {
                id: 0,
                x: 0,
                y: 0,
                width: 1000,
                height: 1000,
                dpi: 160,
                name: "main".to_string(),
            }],
        }
    }

    fn handler_with(render: Arc<dyn RenderNotifier>) -> (DispatchHandler, Arc<RecordingTransmitter>, Arc<AnrManager>) {
        let tx = Arc::new(RecordingTransmitter::with_sessions(&[(1, 100), (2, 200)]));
        let anr = Arc::new(AnrManager::new(Duration::from_secs(5), Arc::new(LoggingAnrObserver)));
        let handler = DispatchHandler::new(
            Arc::clone(&tx) as Arc<dyn SessionTransmitter>,
            Arc::clone(&anr),
            render,
        );
        (handler, tx, anr)
    }

    fn handler() -> (DispatchHandler, Arc<RecordingTransmitter>, Arc<AnrManager>) {
        handler_with(Arc::new(LoggingRenderNotifier))
    }

    /// Touch event with `contacts` as `(pointer id, x, pressed)`.
    fn touch(action: PointerAction, active: i32, contacts: &[(i32, i32, bool)]) -> PointerEvent {
        let mut event = PointerEvent::new(SourceType::TouchScreen);
        event.id = 50;
        event.device_id = 2;
        event.pointer_id = active;
        event.pointer_action = action;
        for &(id, x, pressed) in contacts {
            event.add_pointer_item(PointerItem {
                display_x: x,
                display_y: 100,
                pressed,
                ..PointerItem::new(id)
            });
        }
        event
    }

    fn mouse(action: PointerAction, x: i32, pressed: &[i32], button_id: i32) -> PointerEvent {
        let mut event = PointerEvent::new(SourceType::Mouse);
        event.id = 60;
        event.device_id = 1;
        event.pointer_id = 0;
        event.pointer_action = action;
        event.button_id = button_id;
        for b in pressed {
            event.set_button_pressed(*b);
        }
        event.add_pointer_item(PointerItem {
            display_x: x,
            display_y: 100,
            ..PointerItem::new(0)
        });
        event
    }

    fn pointer_events_to(tx: &RecordingTransmitter, session: SessionId) -> Vec<PointerEvent> {
        tx.sent_to(session)
            .into_iter()
            .filter_map(|m| match m {
                MmiMessage::OnPointerEvent(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_touch_goes_to_hit_window_with_window_coordinates() {
        // Arrange
        let (handler, tx, anr) = handler();

        // Act
        handler
            .handle_pointer_event(&touch(PointerAction::Down, 0, &[(0, 600, true)]), &displays())
            .expect("dispatch");

        // Assert
        let events = pointer_events_to(&tx, 2);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target_window_id, 20);
        assert_eq!(events[0].pointer_item(0).expect("item").window_x, 100);
        assert_eq!(anr.pending_count(2, AnrEventType::Dispatch), 1);
    }

    #[test]
    fn test_touch_stays_bound_to_down_window() {
        let (handler, tx, _) = handler();
        let d = displays();
        handler
            .handle_pointer_event(&touch(PointerAction::Down, 0, &[(0, 100, true)]), &d)
            .expect("down");

        handler
            .handle_pointer_event(&touch(PointerAction::Move, 0, &[(0, 900, true)]), &d)
            .expect("move");

        assert_eq!(pointer_events_to(&tx, 1).len(), 2);
        assert!(pointer_events_to(&tx, 2).is_empty());
    }

    #[test]
    fn test_multi_window_touch_is_split_per_window() {
        // Arrange
        let (handler, tx, _) = handler();
        let d = displays();
        handler
            .handle_pointer_event(&touch(PointerAction::Down, 0, &[(0, 100, true)]), &d)
            .expect("first finger");

        // Act
        handler
            .handle_pointer_event(&touch(PointerAction::Down, 1, &[(0, 100, true), (1, 700, true)]), &d)
            .expect("second finger");

        // Assert
        let left = pointer_events_to(&tx, 1);
        let right = pointer_events_to(&tx, 2);
        assert_eq!(left.len(), 2);
        assert_eq!(left[1].pointer_action, PointerAction::Move);
        assert_eq!(left[1].pointer_ids(), vec![0]);
        assert_eq!(right.len(), 1);
        assert_eq!(right[0].pointer_action, PointerAction::Down);
        assert_eq!(right[0].pointer_ids(), vec![1]);
    }

    #[test]
    fn test_filter_invalid_pointer_item_drops_foreign_and_released_contacts() {
        // Arrange
        let (handler, _, _) = handler();
        let d = displays();
        let mut event = touch(PointerAction::Move, 0, &[(0, 100, true), (1, 200, false), (2, 700, true)]);
        for item in event.pointer_items_mut() {
            item.target_window_id = if item.display_x < 500 { 10 } else { 20 };
        }

        // Act
        handler.filter_invalid_pointer_item(&mut event, 1, &d);

        // Assert
        assert_eq!(event.pointer_ids(), vec![0]);
    }

    #[test]
    fn test_mouse_drag_stays_on_button_down_window() {
        // Arrange
        let (handler, tx, _) = handler();
        let d = displays();
        let left = PointerEvent::MOUSE_BUTTON_LEFT;

        // Act
        handler
            .handle_pointer_event(&mouse(PointerAction::ButtonDown, 100, &[left], left), &d)
            .expect("down");
        handler
            .handle_pointer_event(&mouse(PointerAction::Move, 800, &[left], left), &d)
            .expect("drag");
        handler
            .handle_pointer_event(&mouse(PointerAction::ButtonUp, 800, &[], left), &d)
            .expect("up");
        handler
            .handle_pointer_event(&mouse(PointerAction::Move, 800, &[], PointerEvent::BUTTON_NONE), &d)
            .expect("hover");

        // Assert
        assert_eq!(pointer_events_to(&tx, 1).len(), 3);
        assert_eq!(pointer_events_to(&tx, 2).len(), 1);
    }

    #[test]
    fn test_key_goes_to_focus_window() {
        let (handler, tx, _) = handler();
        let mut event = KeyEvent::new();
        event.id = 4;
        event.key_code = 2017;
        event.key_action = KeyAction::Down;
        event.update_key_item(KeyItem {
            key_code: 2017,
            down_time: 0,
            pressed: true,
            device_id: 1,
        });

        handler.handle_key_event(&event, &displays()).expect("dispatch");

        assert!(matches!(
            tx.sent_to(2).as_slice(),
            [MmiMessage::OnKeyEvent(e)] if e.target_window_id == 20
        ));
    }

    #[test]
    fn test_dispatch_key_event_pid_without_session_is_an_error_code() {
        let (handler, _, _) = handler();

        let result = handler.dispatch_key_event_pid(999, &KeyEvent::new());

        assert_eq!(result, Err(DispatchError::SessionNotFound(999)));
        assert!(result.unwrap_err().code() < 0);
    }

    #[test]
    fn test_unresponsive_window_is_skipped() {
        let (handler, tx, anr) = handler();
        anr.record(2, AnrEventType::Dispatch, 1, 0);

        let result = handler.dispatch_key_event_pid(200, &KeyEvent::new());

        assert_eq!(result, Err(DispatchError::NotResponding(2)));
        assert!(tx.sent().is_empty());
    }

    #[test]
    fn test_acquire_enable_mark_only_for_down_class() {
        assert!(acquire_enable_mark(&touch(PointerAction::Down, 0, &[(0, 1, true)])));
        assert!(!acquire_enable_mark(&touch(PointerAction::Move, 0, &[(0, 1, true)])));
        assert!(acquire_enable_mark(&mouse(PointerAction::ButtonDown, 1, &[0], 0)));
        assert!(!acquire_enable_mark(&mouse(PointerAction::ButtonUp, 1, &[], 0)));
    }

    #[test]
    fn test_render_is_notified_on_down_only() {
        // Arrange
        let mut render = MockRenderNotifier::new();
        render
            .expect_notify_pointer_event()
            .withf(|action, name, pid, count| {
                *action == PointerAction::Down && name == "app-200" && *pid == 200 && *count == 1
            })
            .times(1)
            .return_const(());
        let (handler, _, _) = handler_with(Arc::new(render));
        let d = displays();

        // Act
        handler
            .handle_pointer_event(&touch(PointerAction::Down, 0, &[(0, 700, true)]), &d)
            .expect("down");
        handler
            .handle_pointer_event(&touch(PointerAction::Move, 0, &[(0, 710, true)]), &d)
            .expect("move");
    }
}

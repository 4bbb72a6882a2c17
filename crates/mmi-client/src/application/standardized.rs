//! Standardized (semantic) event subscriptions.
//!
//! Applications register handlers for semantic events such as "copy",
//! "show menu" or "answer call" instead of raw keys.  Message ids fall into
//! fixed ranges, one per [`Category`]:
//!
//! | Category  | Range       | Window-scoped |
//! |-----------|-------------|---------------|
//! | common    | 1000..2000  | no            |
//! | key       | 2000..3000  | yes           |
//! | media     | 3000..4000  | no            |
//! | system    | 4000..5000  | no            |
//! | telephone | 5000..6000  | no            |
//! | touch     | 6000..7000  | yes           |
//! | device    | 7000..8000  | no            |
//!
//! Key and touch handlers only see events for the window they registered
//! with.  Every other category fans out to all of its handlers.  A handler
//! that returns `false` (not consumed) is logged and the fan-out continues.
//!
//! # Registration keys
//!
//! Besides the handler list the manager keeps a set of
//! `"<window_id>,<category>"` keys, one per window and category.  Two
//! handlers of the same window and category share a key, so unregistering
//! either one drops the key.  The key set is coarse on purpose and only
//! answers "is anything of this category registered for this window".

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use mmi_core::domain::DeviceId;
use mmi_core::{KeyEvent, MmiMessage, PointerEvent};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::sender::{ClientError, MessageSender};

/// Ids at or below this value are never valid.
pub const INVALID_MESSAGE_ID: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Common,
    Key,
    Media,
    System,
    Telephone,
    Touch,
    Device,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Self::Common,
        Self::Key,
        Self::Media,
        Self::System,
        Self::Telephone,
        Self::Touch,
        Self::Device,
    ];

    const RANGE: i32 = 1000;

    pub fn begin_id(self) -> i32 {
        match self {
            Self::Common => 1000,
            Self::Key => 2000,
            Self::Media => 3000,
            Self::System => 4000,
            Self::Telephone => 5000,
            Self::Touch => 6000,
            Self::Device => 7000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Key => "key",
            Self::Media => "media",
            Self::System => "system",
            Self::Telephone => "telephone",
            Self::Touch => "touch",
            Self::Device => "device",
        }
    }

    /// Category whose range holds `message_id`.
    pub fn of(message_id: i32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| (c.begin_id()..c.begin_id() + Self::RANGE).contains(&message_id))
    }

    pub fn is_window_scoped(self) -> bool {
        matches!(self, Self::Key | Self::Touch)
    }
}

pub const KEY_MESSAGE_ID: i32 = 2001;
pub const TOUCH_MESSAGE_ID: i32 = 6001;

/// A window-agnostic semantic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardizedEvent {
    ShowMenu,
    Send,
    Copy,
    Paste,
    Cut,
    Undo,
    Refresh,
    StartDrag,
    Cancel,
    Enter,
    Previous,
    Next,
    Back,
    Print,

    Play,
    Pause,
    MediaControl,

    ScreenShot,
    ScreenSplit,
    StartScreenRecord,
    StopScreenRecord,
    GotoDesktop,
    Recent,
    ShowNotification,
    LockScreen,
    Search,
    ClosePage,
    LaunchVoiceAssistant,
    Mute,

    Answer,
    Refuse,
    HangUp,
    TelephoneControl,

    DeviceAdd(DeviceId),
    DeviceRemove(DeviceId),
}

impl StandardizedEvent {
    const WITHOUT_PAYLOAD: [StandardizedEvent; 33] = [
        Self::ShowMenu,
        Self::Send,
        Self::Copy,
        Self::Paste,
        Self::Cut,
        Self::Undo,
        Self::Refresh,
        Self::StartDrag,
        Self::Cancel,
        Self::Enter,
        Self::Previous,
        Self::Next,
        Self::Back,
        Self::Print,
        Self::Play,
        Self::Pause,
        Self::MediaControl,
        Self::ScreenShot,
        Self::ScreenSplit,
        Self::StartScreenRecord,
        Self::StopScreenRecord,
        Self::GotoDesktop,
        Self::Recent,
        Self::ShowNotification,
        Self::LockScreen,
        Self::Search,
        Self::ClosePage,
        Self::LaunchVoiceAssistant,
        Self::Mute,
        Self::Answer,
        Self::Refuse,
        Self::HangUp,
        Self::TelephoneControl,
    ];

    /// Event named by an `OnStandardizedEvent` notification.
    pub fn from_message(message_id: i32, device_id: DeviceId) -> Option<Self> {
        match message_id {
            7001 => Some(Self::DeviceAdd(device_id)),
            7002 => Some(Self::DeviceRemove(device_id)),
            id => Self::WITHOUT_PAYLOAD.into_iter().find(|e| e.message_id() == id),
        }
    }

    pub fn message_id(self) -> i32 {
        match self {
            Self::ShowMenu => 1001,
            Self::Send => 1002,
            Self::Copy => 1003,
            Self::Paste => 1004,
            Self::Cut => 1005,
            Self::Undo => 1006,
            Self::Refresh => 1007,
            Self::StartDrag => 1008,
            Self::Cancel => 1009,
            Self::Enter => 1010,
            Self::Previous => 1011,
            Self::Next => 1012,
            Self::Back => 1013,
            Self::Print => 1014,
            Self::Play => 3001,
            Self::Pause => 3002,
            Self::MediaControl => 3003,
            Self::ScreenShot => 4001,
            Self::ScreenSplit => 4002,
            Self::StartScreenRecord => 4003,
            Self::StopScreenRecord => 4004,
            Self::GotoDesktop => 4005,
            Self::Recent => 4006,
            Self::ShowNotification => 4007,
            Self::LockScreen => 4008,
            Self::Search => 4009,
            Self::ClosePage => 4010,
            Self::LaunchVoiceAssistant => 4011,
            Self::Mute => 4012,
            Self::Answer => 5001,
            Self::Refuse => 5002,
            Self::HangUp => 5003,
            Self::TelephoneControl => 5004,
            Self::DeviceAdd(_) => 7001,
            Self::DeviceRemove(_) => 7002,
        }
    }

    pub fn category(self) -> Category {
        match self.message_id() / Category::RANGE {
            1 => Category::Common,
            3 => Category::Media,
            4 => Category::System,
            5 => Category::Telephone,
            _ => Category::Device,
        }
    }
}

/// Whether `message_id` names an event a handler can register for.
pub fn is_known_message_id(message_id: i32) -> bool {
    match Category::of(message_id) {
        Some(Category::Key) => message_id == KEY_MESSAGE_ID,
        Some(Category::Touch) => message_id == TOUCH_MESSAGE_ID,
        Some(Category::Common) => (1001..=1014).contains(&message_id),
        Some(Category::Media) => (3001..=3003).contains(&message_id),
        Some(Category::System) => (4001..=4012).contains(&message_id),
        Some(Category::Telephone) => (5001..=5004).contains(&message_id),
        Some(Category::Device) => (7001..=7002).contains(&message_id),
        None => false,
    }
}

/// Receives semantic events.  Each method returns whether the event was
/// consumed; the defaults consume nothing.
pub trait StandardizedEventHandler: Send + Sync {
    fn on_key(&self, _event: &KeyEvent) -> bool {
        false
    }

    fn on_touch(&self, _event: &PointerEvent) -> bool {
        false
    }

    fn on_event(&self, _event: StandardizedEvent) -> bool {
        false
    }
}

/// Caller identity for a registration; the nil UUID is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationToken(pub Uuid);

impl RegistrationToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for RegistrationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum StandardizedEventError {
    #[error("registration token is null")]
    NullToken,
    #[error("invalid message id {0}")]
    InvalidMessageId(i32),
    #[error("handler already registered for message {0}")]
    Duplicate(i32),
    #[error("handler not registered for message {0}")]
    NotRegistered(i32),
    #[error("service notification failed: {0}")]
    Notify(#[from] ClientError),
}

impl StandardizedEventError {
    pub fn code(&self) -> i32 {
        match self {
            Self::NullToken => -1,
            Self::InvalidMessageId(_) => -2,
            Self::Duplicate(_) => -3,
            Self::NotRegistered(_) => -4,
            Self::Notify(e) => e.code(),
        }
    }
}

struct Registration {
    token: RegistrationToken,
    window_id: i32,
    message_id: i32,
    handler: Arc<dyn StandardizedEventHandler>,
}

#[derive(Default)]
struct Registry {
    by_category: BTreeMap<Category, Vec<Registration>>,
    keys: BTreeSet<String>,
}

pub struct StandardizedEventManager {
    sender: Arc<dyn MessageSender>,
    registry: Mutex<Registry>,
}

fn registration_key(window_id: i32, category: Category) -> String {
    format!("{window_id},{}", category.name())
}

impl StandardizedEventManager {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self {
            sender,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Registers `handler` for `message_id` in `window_id` and tells the
    /// service about it.
    pub async fn register(
        &self,
        token: RegistrationToken,
        window_id: i32,
        message_id: i32,
        handler: Arc<dyn StandardizedEventHandler>,
    ) -> Result<(), StandardizedEventError> {
        if token.is_null() {
            return Err(StandardizedEventError::NullToken);
        }
        let category = match Category::of(message_id) {
            Some(c) if message_id > INVALID_MESSAGE_ID && is_known_message_id(message_id) => c,
            _ => return Err(StandardizedEventError::InvalidMessageId(message_id)),
        };

        let key = registration_key(window_id, category);
        let inserted_key = {
            let mut registry = self.lock();
            let entries = registry.by_category.entry(category).or_default();
            if entries
                .iter()
                .any(|r| r.message_id == message_id && Arc::ptr_eq(&r.handler, &handler))
            {
                return Err(StandardizedEventError::Duplicate(message_id));
            }
            entries.push(Registration {
                token,
                window_id,
                message_id,
                handler: Arc::clone(&handler),
            });
            registry.keys.insert(key.clone())
        };
        debug!(token = %token.0, window_id, message_id, category = category.name(), "standardized handler registered");

        if let Err(e) = self
            .sender
            .request(&MmiMessage::RegisterStandardizedEvent { window_id, message_id })
            .await
        {
            let mut registry = self.lock();
            if let Some(entries) = registry.by_category.get_mut(&category) {
                entries.retain(|r| !(r.message_id == message_id && Arc::ptr_eq(&r.handler, &handler)));
            }
            if inserted_key {
                registry.keys.remove(&key);
            }
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn unregister(
        &self,
        token: RegistrationToken,
        window_id: i32,
        message_id: i32,
        handler: &Arc<dyn StandardizedEventHandler>,
    ) -> Result<(), StandardizedEventError> {
        if token.is_null() {
            return Err(StandardizedEventError::NullToken);
        }
        let Some(category) = Category::of(message_id) else {
            return Err(StandardizedEventError::InvalidMessageId(message_id));
        };

        {
            let mut registry = self.lock();
            let entries = registry.by_category.entry(category).or_default();
            let Some(pos) = entries.iter().position(|r| {
                r.message_id == message_id && r.window_id == window_id && Arc::ptr_eq(&r.handler, handler)
            }) else {
                return Err(StandardizedEventError::NotRegistered(message_id));
            };
            entries.remove(pos);
            // Coarse key: dropped even if another handler still shares it.
            registry.keys.remove(&registration_key(window_id, category));
        }
        debug!(token = %token.0, window_id, message_id, "standardized handler unregistered");

        self.sender
            .request(&MmiMessage::UnregisterStandardizedEvent { window_id, message_id })
            .await?;
        Ok(())
    }

    /// Delivers a key event to the key handlers of its target window.
    ///
    /// Returns how many handlers were invoked.
    pub fn on_key(&self, event: &KeyEvent) -> usize {
        let handlers = self.window_handlers(Category::Key, event.target_window_id);
        for (token, handler) in &handlers {
            if !handler.on_key(event) {
                warn!(token = %token.0, window_id = event.target_window_id, "key event not consumed");
            }
        }
        handlers.len()
    }

    /// Delivers a touch event to the touch handlers of its target window.
    pub fn on_touch(&self, event: &PointerEvent) -> usize {
        let handlers = self.window_handlers(Category::Touch, event.target_window_id);
        for (token, handler) in &handlers {
            if !handler.on_touch(event) {
                warn!(token = %token.0, window_id = event.target_window_id, "touch event not consumed");
            }
        }
        handlers.len()
    }

    /// Delivers a window-agnostic event to every handler of its category.
    pub fn dispatch(&self, event: StandardizedEvent) -> usize {
        let handlers: Vec<(RegistrationToken, Arc<dyn StandardizedEventHandler>)> = self
            .lock()
            .by_category
            .get(&event.category())
            .map(|entries| entries.iter().map(|r| (r.token, Arc::clone(&r.handler))).collect())
            .unwrap_or_default();
        for (token, handler) in &handlers {
            if !handler.on_event(event) {
                warn!(token = %token.0, ?event, "standardized event not consumed");
            }
        }
        handlers.len()
    }

    pub fn has_registration(&self, window_id: i32, category: Category) -> bool {
        self.lock().keys.contains(&registration_key(window_id, category))
    }

    pub fn handler_count(&self, category: Category) -> usize {
        self.lock().by_category.get(&category).map_or(0, Vec::len)
    }

    fn window_handlers(&self, category: Category, window_id: i32) -> Vec<(RegistrationToken, Arc<dyn StandardizedEventHandler>)> {
        self.lock()
            .by_category
            .get(&category)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|r| r.window_id == window_id)
                    .map(|r| (r.token, Arc::clone(&r.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mmi_core::SourceType;

    use super::*;
    use crate::application::sender::test_support::RecordingSender;

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
        consume: bool,
    }

    impl CountingHandler {
        fn consuming() -> Self {
            Self {
                consume: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.consume
        }
    }

    impl StandardizedEventHandler for CountingHandler {
        fn on_key(&self, _event: &KeyEvent) -> bool {
            self.hit()
        }

        fn on_touch(&self, _event: &PointerEvent) -> bool {
            self.hit()
        }

        fn on_event(&self, _event: StandardizedEvent) -> bool {
            self.hit()
        }
    }

    fn manager() -> (Arc<RecordingSender>, StandardizedEventManager) {
        let sender = Arc::new(RecordingSender::default());
        let manager = StandardizedEventManager::new(Arc::clone(&sender) as Arc<dyn MessageSender>);
        (sender, manager)
    }

    #[test]
    fn test_notification_ids_map_back_to_events() {
        assert_eq!(StandardizedEvent::from_message(7001, 3), Some(StandardizedEvent::DeviceAdd(3)));
        assert_eq!(StandardizedEvent::from_message(7002, 3), Some(StandardizedEvent::DeviceRemove(3)));
        assert_eq!(StandardizedEvent::from_message(1003, -1), Some(StandardizedEvent::Copy));
        assert_eq!(StandardizedEvent::from_message(KEY_MESSAGE_ID, -1), None);
        assert_eq!(StandardizedEvent::from_message(9999, -1), None);
    }

    #[test]
    fn test_categories_follow_id_ranges() {
        assert_eq!(Category::of(1003), Some(Category::Common));
        assert_eq!(Category::of(KEY_MESSAGE_ID), Some(Category::Key));
        assert_eq!(Category::of(7999), Some(Category::Device));
        assert_eq!(Category::of(999), None);
        assert_eq!(Category::of(8000), None);
        assert_eq!(StandardizedEvent::Answer.category(), Category::Telephone);
        assert_eq!(StandardizedEvent::DeviceAdd(3).category(), Category::Device);
        assert_eq!(StandardizedEvent::Mute.category(), Category::System);
        assert!(Category::Touch.is_window_scoped());
        assert!(!Category::Media.is_window_scoped());
    }

    #[tokio::test]
    async fn test_register_validates_token_and_message_id() {
        let (sender, manager) = manager();
        let handler: Arc<dyn StandardizedEventHandler> = Arc::new(CountingHandler::default());

        let null = manager
            .register(RegistrationToken(Uuid::nil()), 1, 1003, Arc::clone(&handler))
            .await;
        let zero = manager.register(RegistrationToken::new(), 1, 0, Arc::clone(&handler)).await;
        let unknown = manager.register(RegistrationToken::new(), 1, 1099, Arc::clone(&handler)).await;

        assert!(matches!(null, Err(StandardizedEventError::NullToken)));
        assert!(matches!(zero, Err(StandardizedEventError::InvalidMessageId(0))));
        assert!(matches!(unknown, Err(StandardizedEventError::InvalidMessageId(1099))));
        assert_eq!(null.unwrap_err().code(), -1);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_exact_duplicate_is_rejected() {
        // Arrange
        let (sender, manager) = manager();
        let handler: Arc<dyn StandardizedEventHandler> = Arc::new(CountingHandler::default());
        let token = RegistrationToken::new();

        // Act
        manager.register(token, 1, 1003, Arc::clone(&handler)).await.expect("first");
        let again = manager.register(token, 1, 1003, Arc::clone(&handler)).await;
        let other_message = manager.register(token, 1, 1004, Arc::clone(&handler)).await;

        // Assert
        assert!(matches!(again, Err(StandardizedEventError::Duplicate(1003))));
        assert!(other_message.is_ok());
        assert_eq!(
            sender.sent()[0],
            MmiMessage::RegisterStandardizedEvent {
                window_id: 1,
                message_id: 1003
            }
        );
        assert_eq!(manager.handler_count(Category::Common), 2);
    }

    #[tokio::test]
    async fn test_key_fan_out_is_window_scoped() {
        // Arrange
        let (_sender, manager) = manager();
        let window_1 = Arc::new(CountingHandler::consuming());
        let window_2 = Arc::new(CountingHandler::consuming());
        let token = RegistrationToken::new();
        manager
            .register(token, 1, KEY_MESSAGE_ID, Arc::clone(&window_1) as Arc<dyn StandardizedEventHandler>)
            .await
            .expect("window 1");
        manager
            .register(token, 2, KEY_MESSAGE_ID, Arc::clone(&window_2) as Arc<dyn StandardizedEventHandler>)
            .await
            .expect("window 2");
        let mut event = KeyEvent::new();
        event.target_window_id = 2;

        // Act
        let invoked = manager.on_key(&event);

        // Assert
        assert_eq!(invoked, 1);
        assert_eq!((window_1.calls(), window_2.calls()), (0, 1));
    }

    #[tokio::test]
    async fn test_touch_fan_out_is_window_scoped() {
        let (_sender, manager) = manager();
        let handler = Arc::new(CountingHandler::consuming());
        manager
            .register(RegistrationToken::new(), 4, TOUCH_MESSAGE_ID, Arc::clone(&handler) as Arc<dyn StandardizedEventHandler>)
            .await
            .expect("register");
        let mut event = PointerEvent::new(SourceType::TouchScreen);
        event.target_window_id = 5;

        assert_eq!(manager.on_touch(&event), 0);
        event.target_window_id = 4;
        assert_eq!(manager.on_touch(&event), 1);
    }

    #[tokio::test]
    async fn test_window_agnostic_fan_out_continues_past_unconsumed() {
        // Arrange
        let (_sender, manager) = manager();
        let declines = Arc::new(CountingHandler::default());
        let consumes = Arc::new(CountingHandler::consuming());
        manager
            .register(RegistrationToken::new(), 1, 1003, Arc::clone(&declines) as Arc<dyn StandardizedEventHandler>)
            .await
            .expect("copy");
        manager
            .register(RegistrationToken::new(), 9, 1001, Arc::clone(&consumes) as Arc<dyn StandardizedEventHandler>)
            .await
            .expect("menu");

        // Act
        let invoked = manager.dispatch(StandardizedEvent::Paste);

        // Assert: every handler of the category, whatever its window.
        assert_eq!(invoked, 2);
        assert_eq!((declines.calls(), consumes.calls()), (1, 1));
        assert_eq!(manager.dispatch(StandardizedEvent::Answer), 0);
    }

    #[tokio::test]
    async fn test_coarse_key_drops_on_first_unregister() {
        // Arrange: two handlers share window 1 and the common category.
        let (sender, manager) = manager();
        let token = RegistrationToken::new();
        let first: Arc<dyn StandardizedEventHandler> = Arc::new(CountingHandler::default());
        let second: Arc<dyn StandardizedEventHandler> = Arc::new(CountingHandler::default());
        manager.register(token, 1, 1003, Arc::clone(&first)).await.expect("first");
        manager.register(token, 1, 1004, Arc::clone(&second)).await.expect("second");
        assert!(manager.has_registration(1, Category::Common));

        // Act
        manager.unregister(token, 1, 1003, &first).await.expect("unregister");

        // Assert
        assert!(!manager.has_registration(1, Category::Common));
        assert_eq!(manager.handler_count(Category::Common), 1);
        assert_eq!(
            sender.sent().last(),
            Some(&MmiMessage::UnregisterStandardizedEvent {
                window_id: 1,
                message_id: 1003
            })
        );
        assert!(matches!(
            manager.unregister(token, 1, 1003, &first).await,
            Err(StandardizedEventError::NotRegistered(1003))
        ));
    }

    #[tokio::test]
    async fn test_rejected_registration_is_rolled_back() {
        let (sender, manager) = manager();
        sender.reply_with(-2);
        let handler: Arc<dyn StandardizedEventHandler> = Arc::new(CountingHandler::consuming());

        let result = manager.register(RegistrationToken::new(), 4, 4001, handler).await;

        assert_eq!(result.map_err(|e| e.code()), Err(-2));
        assert_eq!(manager.handler_count(Category::System), 0);
        assert!(!manager.has_registration(4, Category::System));
    }

    #[tokio::test]
    async fn test_rejection_keeps_key_of_earlier_registration() {
        // Arrange: window 4 already holds a system registration.
        let (sender, manager) = manager();
        let token = RegistrationToken::new();
        let first: Arc<dyn StandardizedEventHandler> = Arc::new(CountingHandler::consuming());
        manager.register(token, 4, 4001, first).await.expect("first");

        // Act
        sender.reply_with(-2);
        let second: Arc<dyn StandardizedEventHandler> = Arc::new(CountingHandler::consuming());
        let result = manager.register(token, 4, 4002, second).await;

        // Assert
        assert!(result.is_err());
        assert!(manager.has_registration(4, Category::System));
        assert_eq!(manager.handler_count(Category::System), 1);
    }
}

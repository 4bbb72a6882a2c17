//! Typed messages exchanged between clients and the service.
//!
//! Each variant of [`MmiMessage`] corresponds to one [`MessageId`]; the
//! codec in [`crate::protocol::codec`] converts between the two forms.

use crate::domain::{
    AnrEventType, DeviceTags, DisplayGroupInfo, EventTypeMask, HandlerType, KeyEvent, KeyOption,
    PointerEvent,
};

use super::message_id::MessageId;

/// Caller privilege class; decides the socket buffer size of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TokenType {
    /// Packaged application.
    Hap = 0,
    /// System service.
    Native = 1,
    Shell = 2,
}

impl TryFrom<i32> for TokenType {
    type Error = ();
    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(Self::Hap),
            1 => Ok(Self::Native),
            2 => Ok(Self::Shell),
            _ => Err(()),
        }
    }
}

/// First message on a freshly accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub program_name: String,
    pub module_type: i32,
    pub token_type: TokenType,
}

/// Interceptor/monitor registration or removal.
///
/// On removal, `event_types` carries the union of the event classes the
/// session still wants after the removal; an empty mask removes the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputHandlerRequest {
    pub handler_type: HandlerType,
    pub event_types: EventTypeMask,
    pub priority: i32,
    pub device_tags: DeviceTags,
}

/// Every message that can travel over a session socket.
#[derive(Debug, Clone, PartialEq)]
pub enum MmiMessage {
    // Client → service
    Connect(ConnectRequest),
    AddInputHandler(InputHandlerRequest),
    RemoveInputHandler(InputHandlerRequest),
    MarkConsumed {
        event_id: i32,
    },
    MarkProcessed {
        anr_type: AnrEventType,
        event_id: i32,
    },
    SubscribeKeyEvent {
        subscribe_id: i32,
        option: KeyOption,
    },
    UnsubscribeKeyEvent {
        subscribe_id: i32,
    },
    InjectKeyEvent(KeyEvent),
    InjectPointerEvent(PointerEvent),
    UpdateDisplayInfo(DisplayGroupInfo),
    RegisterStandardizedEvent {
        window_id: i32,
        message_id: i32,
    },
    UnregisterStandardizedEvent {
        window_id: i32,
        message_id: i32,
    },

    // Service → client
    /// Outcome of a request: `0` on success, a negative error code otherwise.
    RequestResult {
        request: MessageId,
        code: i32,
    },
    /// Event dispatched to the client's window.
    OnKeyEvent(KeyEvent),
    OnPointerEvent(PointerEvent),
    /// Event delivered to the client's interceptor or monitor.
    ReportKeyEvent {
        handler_type: HandlerType,
        event: KeyEvent,
    },
    ReportPointerEvent {
        handler_type: HandlerType,
        event: PointerEvent,
    },
    OnSubscribeKeyEvent {
        subscribe_id: i32,
        event: KeyEvent,
    },
    /// Semantic event for a window registered under `message_id`.
    OnStandardizedEvent {
        window_id: i32,
        message_id: i32,
        device_id: i32,
    },
}

impl MmiMessage {
    /// Returns the header identifier for this message.
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::Connect(_) => MessageId::Connect,
            Self::AddInputHandler(_) => MessageId::AddInputHandler,
            Self::RemoveInputHandler(_) => MessageId::RemoveInputHandler,
            Self::MarkConsumed { .. } => MessageId::MarkConsumed,
            Self::MarkProcessed { .. } => MessageId::MarkProcessed,
            Self::SubscribeKeyEvent { .. } => MessageId::SubscribeKeyEvent,
            Self::UnsubscribeKeyEvent { .. } => MessageId::UnsubscribeKeyEvent,
            Self::InjectKeyEvent(_) => MessageId::InjectKeyEvent,
            Self::InjectPointerEvent(_) => MessageId::InjectPointerEvent,
            Self::UpdateDisplayInfo(_) => MessageId::UpdateDisplayInfo,
            Self::RegisterStandardizedEvent { .. } => MessageId::RegisterStandardizedEvent,
            Self::UnregisterStandardizedEvent { .. } => MessageId::UnregisterStandardizedEvent,
            Self::RequestResult { .. } => MessageId::RequestResult,
            Self::OnKeyEvent(_) => MessageId::OnKeyEvent,
            Self::OnPointerEvent(_) => MessageId::OnPointerEvent,
            Self::ReportKeyEvent { .. } => MessageId::ReportKeyEvent,
            Self::ReportPointerEvent { .. } => MessageId::ReportPointerEvent,
            Self::OnSubscribeKeyEvent { .. } => MessageId::OnSubscribeKeyEvent,
            Self::OnStandardizedEvent { .. } => MessageId::OnStandardizedEvent,
        }
    }
}

//! Message identifiers carried in every packet header.

/// Identifies the payload layout of a [`crate::protocol::NetPacket`].
///
/// Values below `0x0100` are requests from a client to the service; values
/// from `0x0100` are notifications from the service to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageId {
    // Client → service
    Connect = 0x0001,
    AddInputHandler = 0x0010,
    RemoveInputHandler = 0x0011,
    MarkConsumed = 0x0012,
    MarkProcessed = 0x0013,
    SubscribeKeyEvent = 0x0014,
    UnsubscribeKeyEvent = 0x0015,
    InjectKeyEvent = 0x0016,
    InjectPointerEvent = 0x0017,
    UpdateDisplayInfo = 0x0018,
    RegisterStandardizedEvent = 0x0019,
    UnregisterStandardizedEvent = 0x001A,

    // Service → client
    RequestResult = 0x0100,
    OnKeyEvent = 0x0101,
    OnPointerEvent = 0x0102,
    ReportKeyEvent = 0x0103,
    ReportPointerEvent = 0x0104,
    OnSubscribeKeyEvent = 0x0105,
    OnStandardizedEvent = 0x0106,
}

impl MessageId {
    /// Returns `true` for identifiers a client sends to the service.
    pub fn is_request(self) -> bool {
        (self as u16) < 0x0100
    }
}

impl TryFrom<u16> for MessageId {
    type Error = ();
    fn try_from(v: u16) -> Result<Self, ()> {
        match v {
            0x0001 => Ok(Self::Connect),
            0x0010 => Ok(Self::AddInputHandler),
            0x0011 => Ok(Self::RemoveInputHandler),
            0x0012 => Ok(Self::MarkConsumed),
            0x0013 => Ok(Self::MarkProcessed),
            0x0014 => Ok(Self::SubscribeKeyEvent),
            0x0015 => Ok(Self::UnsubscribeKeyEvent),
            0x0016 => Ok(Self::InjectKeyEvent),
            0x0017 => Ok(Self::InjectPointerEvent),
            0x0018 => Ok(Self::UpdateDisplayInfo),
            0x0019 => Ok(Self::RegisterStandardizedEvent),
            0x001A => Ok(Self::UnregisterStandardizedEvent),
            0x0100 => Ok(Self::RequestResult),
            0x0101 => Ok(Self::OnKeyEvent),
            0x0102 => Ok(Self::OnPointerEvent),
            0x0103 => Ok(Self::ReportKeyEvent),
            0x0104 => Ok(Self::ReportPointerEvent),
            0x0105 => Ok(Self::OnSubscribeKeyEvent),
            0x0106 => Ok(Self::OnStandardizedEvent),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_id_converts_back() {
        let all = [
            MessageId::Connect,
            MessageId::AddInputHandler,
            MessageId::RemoveInputHandler,
            MessageId::MarkConsumed,
            MessageId::MarkProcessed,
            MessageId::SubscribeKeyEvent,
            MessageId::UnsubscribeKeyEvent,
            MessageId::InjectKeyEvent,
            MessageId::InjectPointerEvent,
            MessageId::UpdateDisplayInfo,
            MessageId::RegisterStandardizedEvent,
            MessageId::UnregisterStandardizedEvent,
            MessageId::RequestResult,
            MessageId::OnKeyEvent,
            MessageId::OnPointerEvent,
            MessageId::ReportKeyEvent,
            MessageId::ReportPointerEvent,
            MessageId::OnSubscribeKeyEvent,
            MessageId::OnStandardizedEvent,
        ];
        for id in all {
            assert_eq!(MessageId::try_from(id as u16), Ok(id));
        }
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        assert!(MessageId::try_from(0x0000).is_err());
        assert!(MessageId::try_from(0xFFFF).is_err());
    }

    #[test]
    fn test_request_range() {
        assert!(MessageId::MarkProcessed.is_request());
        assert!(!MessageId::OnPointerEvent.is_request());
    }
}

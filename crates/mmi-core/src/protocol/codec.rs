//! Field codecs for events and requests, and the [`MmiMessage`] ↔
//! [`NetPacket`] conversion.
//!
//! Every `write_*` function here has a `read_*` twin that consumes fields in
//! exactly the same order.  Readers stop at the first failed field and
//! return the error; the packet's sticky error flag is set as well.

use thiserror::Error;

use crate::domain::{
    AnrEventType, DeviceTags, DisplayGroupInfo, DisplayInfo, EventTypeMask, HandlerType, KeyEvent,
    KeyItem, KeyOption, PointerEvent, PointerItem, Rect, WindowInfo,
};
use crate::protocol::message_id::MessageId;
use crate::protocol::messages::{ConnectRequest, InputHandlerRequest, MmiMessage};
use crate::protocol::net_packet::NetPacket;

/// Errors that can occur while building or parsing packets.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// Fewer bytes remain than the next field needs.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message id in the header is not a recognized value.
    #[error("unknown message type: 0x{0:04X}")]
    UnknownMessageType(u16),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// A field value is out of range or otherwise unparseable.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A declared length does not fit in the bytes available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The frame exceeds the maximum packet size.
    #[error("packet of {size} bytes exceeds maximum of {max}")]
    PacketTooLarge { size: usize, max: usize },

    /// An earlier access on this packet already failed.
    #[error("packet read/write error flag is set")]
    ReadWriteError,

    /// The payload had bytes left over after the last field.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// A service-to-client message was given where a request was expected,
    /// or the reverse.
    #[error("unexpected message {0:?} in this direction")]
    UnexpectedMessage(MessageId),
}

// Minimum encoded sizes, used to sanity-check array counts before allocating.
const POINTER_ITEM_MIN_SIZE: usize = 73;
const KEY_ITEM_MIN_SIZE: usize = 17;
const WINDOW_MIN_SIZE: usize = 36;
const DISPLAY_MIN_SIZE: usize = 28;
const AXIS_MIN_SIZE: usize = 12;

// ── Public API ────────────────────────────────────────────────────────────────

/// Builds the packet for `msg`.
///
/// Check [`NetPacket::chk_rw_error`] (or call [`NetPacket::make_data`]) before
/// sending: a payload above the size limit sets the error flag.
pub fn encode_message(msg: &MmiMessage) -> NetPacket {
    let mut pkt = NetPacket::new(msg.message_id());
    match msg {
        MmiMessage::Connect(req) => {
            pkt.write_string(&req.program_name);
            pkt.write_i32(req.module_type);
            pkt.write_i32(req.token_type as i32);
        }
        MmiMessage::AddInputHandler(req) | MmiMessage::RemoveInputHandler(req) => {
            write_handler_request(&mut pkt, req);
        }
        MmiMessage::MarkConsumed { event_id } => pkt.write_i32(*event_id),
        MmiMessage::MarkProcessed { anr_type, event_id } => {
            pkt.write_i32(*anr_type as i32);
            pkt.write_i32(*event_id);
        }
        MmiMessage::SubscribeKeyEvent {
            subscribe_id,
            option,
        } => {
            pkt.write_i32(*subscribe_id);
            write_key_option(&mut pkt, option);
        }
        MmiMessage::UnsubscribeKeyEvent { subscribe_id } => pkt.write_i32(*subscribe_id),
        MmiMessage::InjectKeyEvent(event) | MmiMessage::OnKeyEvent(event) => {
            write_key_event(&mut pkt, event);
        }
        MmiMessage::InjectPointerEvent(event) | MmiMessage::OnPointerEvent(event) => {
            write_pointer_event(&mut pkt, event);
        }
        MmiMessage::UpdateDisplayInfo(info) => write_display_group(&mut pkt, info),
        MmiMessage::RegisterStandardizedEvent {
            window_id,
            message_id,
        }
        | MmiMessage::UnregisterStandardizedEvent {
            window_id,
            message_id,
        } => {
            pkt.write_i32(*window_id);
            pkt.write_i32(*message_id);
        }
        MmiMessage::RequestResult { request, code } => {
            pkt.write_u32(u32::from(*request as u16));
            pkt.write_i32(*code);
        }
        MmiMessage::ReportKeyEvent {
            handler_type,
            event,
        } => {
            pkt.write_i32(*handler_type as i32);
            write_key_event(&mut pkt, event);
        }
        MmiMessage::ReportPointerEvent {
            handler_type,
            event,
        } => {
            pkt.write_i32(*handler_type as i32);
            write_pointer_event(&mut pkt, event);
        }
        MmiMessage::OnSubscribeKeyEvent {
            subscribe_id,
            event,
        } => {
            pkt.write_i32(*subscribe_id);
            write_key_event(&mut pkt, event);
        }
        MmiMessage::OnStandardizedEvent {
            window_id,
            message_id,
            device_id,
        } => {
            pkt.write_i32(*window_id);
            pkt.write_i32(*message_id);
            pkt.write_i32(*device_id);
        }
    }
    pkt
}

/// Parses a received packet into a typed message.
///
/// # Errors
///
/// Returns the first field error, or [`ProtocolError::TrailingBytes`] if the
/// payload is longer than the message's fields.
pub fn decode_message(mut pkt: NetPacket) -> Result<MmiMessage, ProtocolError> {
    let msg = match pkt.msg_id() {
        MessageId::Connect => MmiMessage::Connect(ConnectRequest {
            program_name: pkt.read_string()?,
            module_type: pkt.read_i32()?,
            token_type: pkt.read_enum("token type")?,
        }),
        MessageId::AddInputHandler => MmiMessage::AddInputHandler(read_handler_request(&mut pkt)?),
        MessageId::RemoveInputHandler => {
            MmiMessage::RemoveInputHandler(read_handler_request(&mut pkt)?)
        }
        MessageId::MarkConsumed => MmiMessage::MarkConsumed {
            event_id: pkt.read_i32()?,
        },
        MessageId::MarkProcessed => MmiMessage::MarkProcessed {
            anr_type: pkt.read_enum::<AnrEventType>("anr type")?,
            event_id: pkt.read_i32()?,
        },
        MessageId::SubscribeKeyEvent => MmiMessage::SubscribeKeyEvent {
            subscribe_id: pkt.read_i32()?,
            option: read_key_option(&mut pkt)?,
        },
        MessageId::UnsubscribeKeyEvent => MmiMessage::UnsubscribeKeyEvent {
            subscribe_id: pkt.read_i32()?,
        },
        MessageId::InjectKeyEvent => MmiMessage::InjectKeyEvent(read_key_event(&mut pkt)?),
        MessageId::InjectPointerEvent => {
            MmiMessage::InjectPointerEvent(read_pointer_event(&mut pkt)?)
        }
        MessageId::UpdateDisplayInfo => {
            MmiMessage::UpdateDisplayInfo(read_display_group(&mut pkt)?)
        }
        MessageId::RegisterStandardizedEvent => MmiMessage::RegisterStandardizedEvent {
            window_id: pkt.read_i32()?,
            message_id: pkt.read_i32()?,
        },
        MessageId::UnregisterStandardizedEvent => MmiMessage::UnregisterStandardizedEvent {
            window_id: pkt.read_i32()?,
            message_id: pkt.read_i32()?,
        },
        MessageId::RequestResult => {
            let raw = pkt.read_u32()?;
            let request = u16::try_from(raw)
                .ok()
                .and_then(|id| MessageId::try_from(id).ok())
                .ok_or_else(|| {
                    ProtocolError::MalformedPayload(format!("invalid request id: {raw}"))
                })?;
            MmiMessage::RequestResult {
                request,
                code: pkt.read_i32()?,
            }
        }
        MessageId::OnKeyEvent => MmiMessage::OnKeyEvent(read_key_event(&mut pkt)?),
        MessageId::OnPointerEvent => MmiMessage::OnPointerEvent(read_pointer_event(&mut pkt)?),
        MessageId::ReportKeyEvent => MmiMessage::ReportKeyEvent {
            handler_type: pkt.read_enum("handler type")?,
            event: read_key_event(&mut pkt)?,
        },
        MessageId::ReportPointerEvent => MmiMessage::ReportPointerEvent {
            handler_type: pkt.read_enum("handler type")?,
            event: read_pointer_event(&mut pkt)?,
        },
        MessageId::OnSubscribeKeyEvent => MmiMessage::OnSubscribeKeyEvent {
            subscribe_id: pkt.read_i32()?,
            event: read_key_event(&mut pkt)?,
        },
        MessageId::OnStandardizedEvent => MmiMessage::OnStandardizedEvent {
            window_id: pkt.read_i32()?,
            message_id: pkt.read_i32()?,
            device_id: pkt.read_i32()?,
        },
    };
    match pkt.unread() {
        0 => Ok(msg),
        n => Err(ProtocolError::TrailingBytes(n)),
    }
}

// ── Pointer events ────────────────────────────────────────────────────────────

pub fn write_pointer_event(pkt: &mut NetPacket, e: &PointerEvent) {
    pkt.write_i32(e.id);
    pkt.write_i32(e.device_id);
    pkt.write_i32(e.source_type as i32);
    pkt.write_i32(e.pointer_action as i32);
    pkt.write_i32(e.pointer_id);
    pkt.write_i32(e.button_id);
    pkt.write_i32(e.target_display_id);
    pkt.write_i32(e.target_window_id);
    pkt.write_i32(e.agent_window_id);
    pkt.write_i64(e.action_time);
    pkt.write_i64(e.action_start_time);
    pkt.write_i32(e.finger_count);

    pkt.write_count(e.pressed_buttons().len());
    for button in e.pressed_buttons() {
        pkt.write_i32(*button);
    }

    pkt.write_count(e.pointer_items().len());
    for item in e.pointer_items() {
        write_pointer_item(pkt, item);
    }

    pkt.write_count(e.axes().len());
    for (axis, value) in e.axes() {
        pkt.write_i32(*axis as i32);
        pkt.write_f64(*value);
    }
}

pub fn read_pointer_event(pkt: &mut NetPacket) -> Result<PointerEvent, ProtocolError> {
    let id = pkt.read_i32()?;
    let device_id = pkt.read_i32()?;
    let mut e = PointerEvent::new(pkt.read_enum("source type")?);
    e.id = id;
    e.device_id = device_id;
    e.pointer_action = pkt.read_enum("pointer action")?;
    e.pointer_id = pkt.read_i32()?;
    e.button_id = pkt.read_i32()?;
    e.target_display_id = pkt.read_i32()?;
    e.target_window_id = pkt.read_i32()?;
    e.agent_window_id = pkt.read_i32()?;
    e.action_time = pkt.read_i64()?;
    e.action_start_time = pkt.read_i64()?;
    e.finger_count = pkt.read_i32()?;

    let buttons = pkt.read_count(4)?;
    for _ in 0..buttons {
        e.set_button_pressed(pkt.read_i32()?);
    }

    let items = pkt.read_count(POINTER_ITEM_MIN_SIZE)?;
    for _ in 0..items {
        e.add_pointer_item(read_pointer_item(pkt)?);
    }

    let axes = pkt.read_count(AXIS_MIN_SIZE)?;
    for _ in 0..axes {
        let axis = pkt.read_enum("axis type")?;
        e.set_axis_value(axis, pkt.read_f64()?);
    }
    Ok(e)
}

fn write_pointer_item(pkt: &mut NetPacket, item: &PointerItem) {
    pkt.write_i32(item.pointer_id);
    pkt.write_i64(item.down_time);
    pkt.write_bool(item.pressed);
    pkt.write_i32(item.display_x);
    pkt.write_i32(item.display_y);
    pkt.write_i32(item.window_x);
    pkt.write_i32(item.window_y);
    pkt.write_i32(item.width);
    pkt.write_i32(item.height);
    pkt.write_f64(item.pressure);
    pkt.write_f64(item.tilt_x);
    pkt.write_f64(item.tilt_y);
    pkt.write_i32(item.tool_type as i32);
    pkt.write_i32(item.target_window_id);
    pkt.write_i32(item.device_id);
}

fn read_pointer_item(pkt: &mut NetPacket) -> Result<PointerItem, ProtocolError> {
    Ok(PointerItem {
        pointer_id: pkt.read_i32()?,
        down_time: pkt.read_i64()?,
        pressed: pkt.read_bool()?,
        display_x: pkt.read_i32()?,
        display_y: pkt.read_i32()?,
        window_x: pkt.read_i32()?,
        window_y: pkt.read_i32()?,
        width: pkt.read_i32()?,
        height: pkt.read_i32()?,
        pressure: pkt.read_f64()?,
        tilt_x: pkt.read_f64()?,
        tilt_y: pkt.read_f64()?,
        tool_type: pkt.read_enum("tool type")?,
        target_window_id: pkt.read_i32()?,
        device_id: pkt.read_i32()?,
    })
}

// ── Key events ────────────────────────────────────────────────────────────────

pub fn write_key_event(pkt: &mut NetPacket, e: &KeyEvent) {
    pkt.write_i32(e.id);
    pkt.write_i32(e.device_id);
    pkt.write_i32(e.key_code);
    pkt.write_i32(e.key_action as i32);
    pkt.write_i64(e.action_time);
    pkt.write_i32(e.target_window_id);
    pkt.write_count(e.key_items().len());
    for item in e.key_items() {
        pkt.write_i32(item.key_code);
        pkt.write_i64(item.down_time);
        pkt.write_bool(item.pressed);
        pkt.write_i32(item.device_id);
    }
}

pub fn read_key_event(pkt: &mut NetPacket) -> Result<KeyEvent, ProtocolError> {
    let mut e = KeyEvent::new();
    e.id = pkt.read_i32()?;
    e.device_id = pkt.read_i32()?;
    e.key_code = pkt.read_i32()?;
    e.key_action = pkt.read_enum("key action")?;
    e.action_time = pkt.read_i64()?;
    e.target_window_id = pkt.read_i32()?;
    let count = pkt.read_count(KEY_ITEM_MIN_SIZE)?;
    for _ in 0..count {
        e.update_key_item(KeyItem {
            key_code: pkt.read_i32()?,
            down_time: pkt.read_i64()?,
            pressed: pkt.read_bool()?,
            device_id: pkt.read_i32()?,
        });
    }
    Ok(e)
}

// ── Display info ──────────────────────────────────────────────────────────────

pub fn write_display_group(pkt: &mut NetPacket, info: &DisplayGroupInfo) {
    pkt.write_i32(info.width);
    pkt.write_i32(info.height);
    pkt.write_i32(info.focus_window_id);

    pkt.write_count(info.windows.len());
    for w in &info.windows {
        pkt.write_i32(w.id);
        pkt.write_i32(w.pid);
        pkt.write_i32(w.uid);
        pkt.write_i32(w.area.x);
        pkt.write_i32(w.area.y);
        pkt.write_i32(w.area.width);
        pkt.write_i32(w.area.height);
        pkt.write_i32(w.agent_window_id);
        pkt.write_u32(w.flags);
    }

    pkt.write_count(info.displays.len());
    for d in &info.displays {
        pkt.write_i32(d.id);
        pkt.write_i32(d.x);
        pkt.write_i32(d.y);
        pkt.write_i32(d.width);
        pkt.write_i32(d.height);
        pkt.write_i32(d.dpi);
        pkt.write_string(&d.name);
    }
}

pub fn read_display_group(pkt: &mut NetPacket) -> Result<DisplayGroupInfo, ProtocolError> {
    let width = pkt.read_i32()?;
    let height = pkt.read_i32()?;
    let focus_window_id = pkt.read_i32()?;

    let window_count = pkt.read_count(WINDOW_MIN_SIZE)?;
    let mut windows = Vec::with_capacity(window_count);
    for _ in 0..window_count {
        windows.push(WindowInfo {
            id: pkt.read_i32()?,
            pid: pkt.read_i32()?,
            uid: pkt.read_i32()?,
            area: Rect {
                x: pkt.read_i32()?,
                y: pkt.read_i32()?,
                width: pkt.read_i32()?,
                height: pkt.read_i32()?,
            },
            agent_window_id: pkt.read_i32()?,
            flags: pkt.read_u32()?,
        });
    }

    let display_count = pkt.read_count(DISPLAY_MIN_SIZE)?;
    let mut displays = Vec::with_capacity(display_count);
    for _ in 0..display_count {
        displays.push(DisplayInfo {
            id: pkt.read_i32()?,
            x: pkt.read_i32()?,
            y: pkt.read_i32()?,
            width: pkt.read_i32()?,
            height: pkt.read_i32()?,
            dpi: pkt.read_i32()?,
            name: pkt.read_string()?,
        });
    }

    Ok(DisplayGroupInfo {
        width,
        height,
        focus_window_id,
        windows,
        displays,
    })
}

// ── Registration payloads ─────────────────────────────────────────────────────

fn write_handler_request(pkt: &mut NetPacket, req: &InputHandlerRequest) {
    pkt.write_i32(req.handler_type as i32);
    pkt.write_u32(req.event_types.0);
    pkt.write_i32(req.priority);
    pkt.write_u32(req.device_tags.0);
}

fn read_handler_request(pkt: &mut NetPacket) -> Result<InputHandlerRequest, ProtocolError> {
    Ok(InputHandlerRequest {
        handler_type: pkt.read_enum::<HandlerType>("handler type")?,
        event_types: EventTypeMask(pkt.read_u32()?),
        priority: pkt.read_i32()?,
        device_tags: DeviceTags(pkt.read_u32()?),
    })
}

fn write_key_option(pkt: &mut NetPacket, option: &KeyOption) {
    pkt.write_count(option.pre_keys.len());
    for key in &option.pre_keys {
        pkt.write_i32(*key);
    }
    pkt.write_i32(option.final_key);
    pkt.write_bool(option.final_key_down);
}

fn read_key_option(pkt: &mut NetPacket) -> Result<KeyOption, ProtocolError> {
    let count = pkt.read_count(4)?;
    let mut option = KeyOption::default();
    for _ in 0..count {
        option.pre_keys.insert(pkt.read_i32()?);
    }
    option.final_key = pkt.read_i32()?;
    option.final_key_down = pkt.read_bool()?;
    Ok(option)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Wire protocol: packets, framing, message ids and field codecs.

pub mod codec;
pub mod message_id;
pub mod messages;
pub mod net_packet;
pub mod sequence;
pub mod stream_buffer;

pub use codec::{decode_message, encode_message, ProtocolError};
pub use message_id::MessageId;
pub use messages::{ConnectRequest, InputHandlerRequest, MmiMessage, TokenType};
pub use net_packet::{NetPacket, MAX_PACKET_SIZE, PACKET_HEADER_SIZE, PROTOCOL_VERSION};
pub use sequence::{SequenceCounter, INVALID_EVENT_ID};
pub use stream_buffer::StreamBuffer;

//! Receive buffer that turns a byte stream into whole packets.
//!
//! A socket read may return half a packet, or three and a half.  Bytes are
//! appended with [`StreamBuffer::extend`] and complete frames are taken out
//! with [`StreamBuffer::next_packet`]; a trailing partial frame stays in the
//! buffer until the rest arrives.

use super::codec::ProtocolError;
use super::net_packet::{NetPacket, PACKET_HEADER_SIZE};

/// Per-session receive buffer.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    buf: Vec<u8>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Removes and returns the next complete packet, if one is buffered.
    ///
    /// # Errors
    ///
    /// A corrupt header (bad version, unknown id, oversized length) is an
    /// error; the buffer is cleared because the stream can no longer be
    /// re-synchronised.
    pub fn next_packet(&mut self) -> Result<Option<NetPacket>, ProtocolError> {
        if self.buf.len() < PACKET_HEADER_SIZE {
            return Ok(None);
        }
        let (msg_id, payload_len) = match NetPacket::parse_header(&self.buf) {
            Ok(header) => header,
            Err(e) => {
                self.buf.clear();
                return Err(e);
            }
        };
        let total = PACKET_HEADER_SIZE + payload_len;
        if self.buf.len() < total {
            return Ok(None);
        }
        let payload = self.buf[PACKET_HEADER_SIZE..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(NetPacket::from_payload(msg_id, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message_id::MessageId;

    fn frame(id: MessageId, value: i32) -> Vec<u8> {
        let mut pkt = NetPacket::new(id);
        pkt.write_i32(value);
        pkt.make_data().expect("frame")
    }

    #[test]
    fn test_partial_frame_waits_for_rest() {
        // Arrange
        let bytes = frame(MessageId::MarkConsumed, 11);
        let mut buffer = StreamBuffer::new();

        // Act
        buffer.extend(&bytes[..5]);
        let early = buffer.next_packet().expect("no error");
        buffer.extend(&bytes[5..]);
        let late = buffer.next_packet().expect("no error");

        // Assert
        assert!(early.is_none());
        let mut pkt = late.expect("complete packet");
        assert_eq!(pkt.read_i32(), Ok(11));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_several_frames_in_one_read() {
        // Arrange
        let mut bytes = frame(MessageId::MarkConsumed, 1);
        bytes.extend(frame(MessageId::MarkProcessed, 2));
        bytes.extend(&frame(MessageId::MarkConsumed, 3)[..3]);
        let mut buffer = StreamBuffer::new();
        buffer.extend(&bytes);

        // Act
        let first = buffer.next_packet().expect("ok").expect("first");
        let second = buffer.next_packet().expect("ok").expect("second");
        let third = buffer.next_packet().expect("ok");

        // Assert
        assert_eq!(first.msg_id(), MessageId::MarkConsumed);
        assert_eq!(second.msg_id(), MessageId::MarkProcessed);
        assert!(third.is_none());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_corrupt_header_clears_buffer() {
        // Arrange
        let mut buffer = StreamBuffer::new();
        buffer.extend(&[0xFF; 16]);

        // Act
        let result = buffer.next_packet();

        // Assert
        assert!(result.is_err());
        assert!(buffer.is_empty());
    }
}

//! `NetPacket`: the typed field container exchanged over session sockets.
//!
//! Frame layout on the wire:
//! ```text
//! [version:1][reserved:1][msg_id:2][payload_len:4][payload:N]
//! ```
//! Header size is 8 bytes.  All multi-byte integers are big-endian.
//!
//! # Field order (for beginners)
//!
//! The payload carries no field names or type tags.  A producer writes
//! fields in a fixed order (`write_i32`, then `write_string`, ...) and the
//! consumer must read them back in exactly the same order with the matching
//! `read_*` calls.  Arrays are written as a count followed by the elements.
//!
//! # The read/write error flag
//!
//! Every accessor that fails sets a sticky error flag in addition to
//! returning an error.  Once set, later reads fail immediately, so a parser
//! that forgets to check one result still cannot read garbage past the first
//! fault.  Writers set the same flag when the payload would exceed
//! [`MAX_PACKET_SIZE`]; senders check [`NetPacket::chk_rw_error`] before
//! framing.

use super::codec::ProtocolError;
use super::message_id::MessageId;

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Frame header size in bytes.
pub const PACKET_HEADER_SIZE: usize = 8;

/// Largest payload accepted in one frame.
pub const MAX_PACKET_SIZE: usize = 64 * 1024;

/// A message id plus an ordered sequence of encoded fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NetPacket {
    msg_id: MessageId,
    payload: Vec<u8>,
    read_pos: usize,
    rw_error: bool,
}

impl NetPacket {
    /// Creates an empty packet ready for writing.
    pub fn new(msg_id: MessageId) -> Self {
        Self {
            msg_id,
            payload: Vec::new(),
            read_pos: 0,
            rw_error: false,
        }
    }

    /// Wraps a received payload for reading.
    pub fn from_payload(msg_id: MessageId, payload: Vec<u8>) -> Self {
        Self {
            msg_id,
            payload,
            read_pos: 0,
            rw_error: false,
        }
    }

    pub fn msg_id(&self) -> MessageId {
        self.msg_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Bytes left to read.
    pub fn unread(&self) -> usize {
        self.payload.len().saturating_sub(self.read_pos)
    }

    /// Returns `true` once any read or write has failed.
    pub fn chk_rw_error(&self) -> bool {
        self.rw_error
    }

    // ── Writers ───────────────────────────────────────────────────────────────

    fn write_raw(&mut self, bytes: &[u8]) {
        if self.rw_error {
            return;
        }
        if self.payload.len() + bytes.len() > MAX_PACKET_SIZE {
            self.rw_error = true;
            return;
        }
        self.payload.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_raw(&[v]);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_raw(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_raw(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write_raw(&v.to_be_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_raw(&v.to_bits().to_be_bytes());
    }

    /// Writes a `u32` length prefix followed by the UTF-8 bytes.
    pub fn write_string(&mut self, s: &str) {
        match u32::try_from(s.len()) {
            Ok(len) => {
                self.write_u32(len);
                self.write_raw(s.as_bytes());
            }
            Err(_) => self.rw_error = true,
        }
    }

    /// Writes a collection length as a `u32` count prefix.
    pub fn write_count(&mut self, n: usize) {
        match u32::try_from(n) {
            Ok(count) => self.write_u32(count),
            Err(_) => self.rw_error = true,
        }
    }

    // ── Readers ───────────────────────────────────────────────────────────────

    fn read_raw<const N: usize>(&mut self, field: &str) -> Result<[u8; N], ProtocolError> {
        if self.rw_error {
            return Err(ProtocolError::ReadWriteError);
        }
        let available = self.unread();
        if available < N {
            self.rw_error = true;
            tracing::trace!(field, needed = N, available, "packet read past end");
            return Err(ProtocolError::InsufficientData {
                needed: N,
                available,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.payload[self.read_pos..self.read_pos + N]);
        self.read_pos += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_raw::<1>("u8")?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => {
                self.rw_error = true;
                Err(ProtocolError::MalformedPayload(format!(
                    "invalid bool byte 0x{other:02X}"
                )))
            }
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.read_raw("u32")?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.read_raw("i32")?))
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_be_bytes(self.read_raw("i64")?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_raw("f64")?)))
    }

    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u32()? as usize;
        let available = self.unread();
        if available < len {
            self.rw_error = true;
            return Err(ProtocolError::InsufficientData {
                needed: len,
                available,
            });
        }
        let bytes = self.payload[self.read_pos..self.read_pos + len].to_vec();
        self.read_pos += len;
        String::from_utf8(bytes).map_err(|e| {
            self.rw_error = true;
            ProtocolError::MalformedPayload(format!("string is not UTF-8: {e}"))
        })
    }

    /// Reads a `u32` count prefix, rejecting counts that cannot fit in the
    /// remaining payload given a minimum element size.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, ProtocolError> {
        let count = self.read_u32()? as usize;
        let needed = count.saturating_mul(min_element_size.max(1));
        if needed > self.unread() {
            self.rw_error = true;
            return Err(ProtocolError::PayloadLengthMismatch {
                declared: needed,
                available: self.unread(),
            });
        }
        Ok(count)
    }

    /// Decodes an `i32` field into a `#[repr(i32)]` enum via `TryFrom`.
    pub fn read_enum<T: TryFrom<i32>>(&mut self, field: &str) -> Result<T, ProtocolError> {
        let raw = self.read_i32()?;
        T::try_from(raw).map_err(|_| {
            self.rw_error = true;
            ProtocolError::MalformedPayload(format!("invalid {field}: {raw}"))
        })
    }

    // ── Framing ───────────────────────────────────────────────────────────────

    /// Serializes header plus payload into one frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ReadWriteError`] if a write failed while the
    /// packet was being built.
    pub fn make_data(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.rw_error {
            return Err(ProtocolError::ReadWriteError);
        }
        let mut buf = Vec::with_capacity(PACKET_HEADER_SIZE + self.payload.len());
        buf.push(PROTOCOL_VERSION);
        buf.push(0x00); // reserved
        buf.extend_from_slice(&(self.msg_id as u16).to_be_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parses a frame header, returning the message id and payload length.
    ///
    /// # Errors
    ///
    /// Fails on a short header, version mismatch, unknown message id, or a
    /// payload length above [`MAX_PACKET_SIZE`].
    pub fn parse_header(bytes: &[u8]) -> Result<(MessageId, usize), ProtocolError> {
        if bytes.len() < PACKET_HEADER_SIZE {
            return Err(ProtocolError::InsufficientData {
                needed: PACKET_HEADER_SIZE,
                available: bytes.len(),
            });
        }
        if bytes[0] != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(bytes[0]));
        }
        let raw_id = u16::from_be_bytes([bytes[2], bytes[3]]);
        let msg_id =
            MessageId::try_from(raw_id).map_err(|_| ProtocolError::UnknownMessageType(raw_id))?;
        let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        if payload_len > MAX_PACKET_SIZE {
            return Err(ProtocolError::PacketTooLarge {
                size: payload_len,
                max: MAX_PACKET_SIZE,
            });
        }
        Ok((msg_id, payload_len))
    }

    /// Decodes one complete frame from the start of `bytes`.
    ///
    /// Returns the packet and the number of bytes consumed.
    pub fn decode_frame(bytes: &[u8]) -> Result<(NetPacket, usize), ProtocolError> {
        let (msg_id, payload_len) = Self::parse_header(bytes)?;
        let total = PACKET_HEADER_SIZE + payload_len;
        if bytes.len() < total {
            return Err(ProtocolError::PayloadLengthMismatch {
                declared: payload_len,
                available: bytes.len() - PACKET_HEADER_SIZE,
            });
        }
        let payload = bytes[PACKET_HEADER_SIZE..total].to_vec();
        Ok((NetPacket::from_payload(msg_id, payload), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_read_back_in_write_order() {
        // Arrange
        let mut pkt = NetPacket::new(MessageId::MarkProcessed);
        pkt.write_i32(-7);
        pkt.write_string("com.example.app");
        pkt.write_bool(true);
        pkt.write_i64(1_700_000_000_000_000);
        pkt.write_f64(0.25);

        // Act
        let frame = pkt.make_data().expect("frame");
        let (mut decoded, consumed) = NetPacket::decode_frame(&frame).expect("decode");

        // Assert
        assert_eq!(consumed, frame.len());
        assert_eq!(decoded.msg_id(), MessageId::MarkProcessed);
        assert_eq!(decoded.read_i32(), Ok(-7));
        assert_eq!(decoded.read_string(), Ok("com.example.app".to_string()));
        assert_eq!(decoded.read_bool(), Ok(true));
        assert_eq!(decoded.read_i64(), Ok(1_700_000_000_000_000));
        assert_eq!(decoded.read_f64(), Ok(0.25));
        assert_eq!(decoded.unread(), 0);
        assert!(!decoded.chk_rw_error());
    }

    #[test]
    fn test_read_past_end_sets_sticky_error() {
        // Arrange
        let mut pkt = NetPacket::from_payload(MessageId::MarkConsumed, vec![0, 0]);

        // Act
        let first = pkt.read_i32();
        let second = pkt.read_u8();

        // Assert
        assert!(matches!(first, Err(ProtocolError::InsufficientData { .. })));
        assert_eq!(second, Err(ProtocolError::ReadWriteError));
        assert!(pkt.chk_rw_error());
    }

    #[test]
    fn test_oversized_write_sets_error_and_blocks_framing() {
        // Arrange
        let mut pkt = NetPacket::new(MessageId::UpdateDisplayInfo);
        let big = "x".repeat(MAX_PACKET_SIZE);

        // Act
        pkt.write_string(&big);

        // Assert
        assert!(pkt.chk_rw_error());
        assert_eq!(pkt.make_data(), Err(ProtocolError::ReadWriteError));
    }

    #[test]
    fn test_header_rejects_unknown_version_and_id() {
        let mut frame = NetPacket::new(MessageId::Connect).make_data().expect("frame");
        frame[0] = 9;
        assert_eq!(
            NetPacket::parse_header(&frame),
            Err(ProtocolError::UnsupportedVersion(9))
        );

        frame[0] = PROTOCOL_VERSION;
        frame[2] = 0xAB;
        frame[3] = 0xCD;
        assert_eq!(
            NetPacket::parse_header(&frame),
            Err(ProtocolError::UnknownMessageType(0xABCD))
        );
    }

    #[test]
    fn test_header_rejects_oversized_payload_length() {
        let mut frame = NetPacket::new(MessageId::Connect).make_data().expect("frame");
        frame[4..8].copy_from_slice(&((MAX_PACKET_SIZE as u32) + 1).to_be_bytes());
        assert!(matches!(
            NetPacket::parse_header(&frame),
            Err(ProtocolError::PacketTooLarge { .. })
        ));
    }

    #[test]
    fn test_read_count_rejects_impossible_counts() {
        // Arrange – claims 1000 elements but carries none
        let mut pkt = NetPacket::new(MessageId::UpdateDisplayInfo);
        pkt.write_u32(1000);
        let mut reader = NetPacket::from_payload(pkt.msg_id(), pkt.payload().to_vec());

        // Act
        let count = reader.read_count(4);

        // Assert
        assert!(matches!(count, Err(ProtocolError::PayloadLengthMismatch { .. })));
    }

    #[test]
    fn test_invalid_bool_byte_is_malformed() {
        let mut pkt = NetPacket::from_payload(MessageId::MarkConsumed, vec![7]);
        assert!(matches!(pkt.read_bool(), Err(ProtocolError::MalformedPayload(_))));
    }
}

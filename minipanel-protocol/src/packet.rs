//! Packet framing for the legacy ASCII simulator link.
//!
//! Packet format:
//! ```text
//! @<id>/<value>$
//! @<id>/<index>=<value>$
//! ```
//! - `@` starts a packet and discards anything partially received
//! - `$` terminates it
//! - no escaping: payload fields never contain `@`, `/`, `=` or `$`
//!
//! A stream that runs past [`MAX_PACKET_LEN`] without a terminator is
//! dropped and nothing is accepted again until the next `@`.

use core::fmt::Write;
use heapless::{String, Vec};

/// Packet start sentinel
pub const PACKET_START: u8 = b'@';

/// Packet end sentinel
pub const PACKET_END: u8 = b'$';

/// Separator between id and payload
pub const ID_SEPARATOR: u8 = b'/';

/// Separator between index and value
pub const INDEX_SEPARATOR: u8 = b'=';

/// Maximum in-flight packet length, sentinels included
pub const MAX_PACKET_LEN: usize = 32;

/// Maximum body length (bytes between the sentinels)
pub const MAX_BODY_LEN: usize = MAX_PACKET_LEN - 2;

/// Index reported for packets without an index field
pub const NO_INDEX: i16 = -1;

/// Errors when composing outbound packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Composed packet would exceed [`MAX_PACKET_LEN`]
    TooLong,
    /// A field contains a sentinel or separator character
    ReservedChar,
}

/// A complete packet as received, without its sentinels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    body: Vec<u8, MAX_BODY_LEN>,
}

impl Packet {
    /// Build a packet from its body bytes (test and replay helper)
    pub fn from_body(body: &[u8]) -> Result<Self, PacketError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(body)
            .map_err(|_| PacketError::TooLong)?;
        Ok(Self { body: buf })
    }

    /// Raw bytes between `@` and `$`
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    fn text(&self) -> &str {
        core::str::from_utf8(&self.body).unwrap_or("")
    }

    fn find_from(&self, byte: u8, from: usize) -> Option<usize> {
        self.body
            .iter()
            .skip(from)
            .position(|&b| b == byte)
            .map(|p| p + from)
    }

    fn slash(&self) -> Option<usize> {
        // The id is at least one character long
        self.find_from(ID_SEPARATOR, 1)
    }

    fn equals(&self) -> Option<usize> {
        self.find_from(INDEX_SEPARATOR, 2)
    }

    /// Id field, or `""` when malformed
    pub fn id(&self) -> &str {
        match self.slash() {
            Some(end) => self.text().get(..end).unwrap_or(""),
            None => "",
        }
    }

    /// Index field, or `""` when absent or malformed
    pub fn index(&self) -> &str {
        match (self.slash(), self.equals()) {
            (Some(slash), Some(eq)) if slash + 1 < eq => {
                self.text().get(slash + 1..eq).unwrap_or("")
            }
            _ => "",
        }
    }

    /// Value field, or `""` when malformed
    ///
    /// Without an index the value follows the `/` directly.
    pub fn value(&self) -> &str {
        let Some(slash) = self.slash() else {
            return "";
        };
        match self.equals() {
            Some(eq) if eq > slash => self.text().get(eq + 1..).unwrap_or(""),
            Some(_) => "",
            None => self.text().get(slash + 1..).unwrap_or(""),
        }
    }

    /// Id as a number
    pub fn numeric_id(&self) -> Option<u16> {
        self.id().parse().ok()
    }

    /// Index as a number, [`NO_INDEX`] when the packet carries none
    pub fn numeric_index(&self) -> Option<i16> {
        match self.index() {
            "" if self.value_without_index() => Some(NO_INDEX),
            "" => None,
            idx => idx.parse().ok(),
        }
    }

    fn value_without_index(&self) -> bool {
        self.slash().is_some() && self.equals().is_none()
    }

    /// Value as an integer
    ///
    /// Decimal values are truncated toward zero.
    pub fn int_value(&self) -> Option<i32> {
        let value = self.value();
        value
            .parse::<i32>()
            .ok()
            .or_else(|| value.parse::<f32>().ok().map(|f| f as i32))
    }

    /// Value as a float
    pub fn float_value(&self) -> Option<f32> {
        self.value().parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    /// Not accepting: waiting for a start sentinel
    Idle,
    /// Inside a packet
    Accepting,
}

/// Byte-stream framer for simulator packets
#[derive(Debug, Clone)]
pub struct PacketFramer {
    state: FramerState,
    buffer: Vec<u8, MAX_BODY_LEN>,
    overruns: u16,
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketFramer {
    /// Create a new framer waiting for a start sentinel
    pub fn new() -> Self {
        Self {
            state: FramerState::Idle,
            buffer: Vec::new(),
            overruns: 0,
        }
    }

    /// Drop any partial packet and wait for the next start sentinel
    pub fn reset(&mut self) {
        self.state = FramerState::Idle;
        self.buffer.clear();
    }

    /// Number of packets dropped for exceeding the length limit
    pub fn overruns(&self) -> u16 {
        self.overruns
    }

    /// Feed a single byte
    ///
    /// Returns the packet when `byte` completes one.
    pub fn feed(&mut self, byte: u8) -> Option<Packet> {
        if byte == PACKET_START {
            self.state = FramerState::Accepting;
            self.buffer.clear();
            return None;
        }

        match self.state {
            FramerState::Idle => None,
            FramerState::Accepting => {
                if byte == PACKET_END {
                    self.state = FramerState::Idle;
                    let body = core::mem::take(&mut self.buffer);
                    return Some(Packet { body });
                }
                if self.buffer.push(byte).is_err() {
                    self.reset();
                    self.overruns = self.overruns.wrapping_add(1);
                }
                None
            }
        }
    }

    /// Consume bytes from `source` until a packet completes or it runs dry
    ///
    /// Bytes after the terminator stay in `source` for the next call.
    pub fn fetch<I: Iterator<Item = u8>>(&mut self, source: &mut I) -> Option<Packet> {
        for byte in source {
            if let Some(packet) = self.feed(byte) {
                return Some(packet);
            }
        }
        None
    }
}

/// Outbound packet buffer
pub type OutboundPacket = String<MAX_PACKET_LEN>;

fn check_field(field: &str) -> Result<(), PacketError> {
    let reserved = [PACKET_START, PACKET_END, ID_SEPARATOR, INDEX_SEPARATOR];
    if field.bytes().any(|b| reserved.contains(&b)) {
        return Err(PacketError::ReservedChar);
    }
    Ok(())
}

/// Compose `@<id>/$`
pub fn compose_bare(id: u16) -> Result<OutboundPacket, PacketError> {
    let mut out = OutboundPacket::new();
    write!(out, "@{}/$", id).map_err(|_| PacketError::TooLong)?;
    Ok(out)
}

/// Compose `@<id>/<value>$`
pub fn compose(id: u16, value: i32) -> Result<OutboundPacket, PacketError> {
    let mut out = OutboundPacket::new();
    write!(out, "@{}/{}$", id, value).map_err(|_| PacketError::TooLong)?;
    Ok(out)
}

/// Compose `@<id>/<payload>$` from free text fields
pub fn compose_text(id: &str, payload: &str) -> Result<OutboundPacket, PacketError> {
    check_field(id)?;
    check_field(payload)?;
    let mut out = OutboundPacket::new();
    write!(out, "@{}/{}$", id, payload).map_err(|_| PacketError::TooLong)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame_all(framer: &mut PacketFramer, bytes: &[u8]) -> std::vec::Vec<Packet> {
        let mut out = std::vec::Vec::new();
        let mut source = bytes.iter().copied();
        while let Some(p) = framer.fetch(&mut source) {
            out.push(p);
        }
        out
    }

    #[test]
    fn test_field_extraction() {
        let packet = Packet::from_body(b"76/-1=4123").unwrap();
        assert_eq!(packet.id(), "76");
        assert_eq!(packet.index(), "-1");
        assert_eq!(packet.value(), "4123");
        assert_eq!(packet.numeric_id(), Some(76));
        assert_eq!(packet.numeric_index(), Some(-1));
        assert_eq!(packet.int_value(), Some(4123));
    }

    #[test]
    fn test_value_without_index() {
        let packet = Packet::from_body(b"12/2992.5").unwrap();
        assert_eq!(packet.id(), "12");
        assert_eq!(packet.index(), "");
        assert_eq!(packet.value(), "2992.5");
        assert_eq!(packet.numeric_index(), Some(NO_INDEX));
        assert_eq!(packet.float_value(), Some(2992.5));
        assert_eq!(packet.int_value(), Some(2992));
    }

    #[test]
    fn test_malformed_fields_are_empty() {
        // No separators at all
        let packet = Packet::from_body(b"764123").unwrap();
        assert_eq!(packet.id(), "");
        assert_eq!(packet.index(), "");
        assert_eq!(packet.value(), "");
        assert_eq!(packet.numeric_id(), None);

        // Empty id
        let packet = Packet::from_body(b"/1=2").unwrap();
        assert_eq!(packet.id(), "");
        assert_eq!(packet.value(), "");

        // '=' before '/'
        let packet = Packet::from_body(b"7=1/2").unwrap();
        assert_eq!(packet.index(), "");
        assert_eq!(packet.value(), "");

        // Empty packet
        let packet = Packet::from_body(b"").unwrap();
        assert_eq!(packet.id(), "");
        assert_eq!(packet.value(), "");
    }

    #[test]
    fn test_framer_single_packet() {
        let mut framer = PacketFramer::new();
        let packets = frame_all(&mut framer, b"@76/-1=4123$");
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].body(), b"76/-1=4123");
    }

    #[test]
    fn test_framer_stops_after_ready() {
        let mut framer = PacketFramer::new();
        let mut source = b"@1/5$@2/6$".iter().copied();
        let first = framer.fetch(&mut source).unwrap();
        assert_eq!(first.id(), "1");
        // Remaining bytes were not consumed
        assert_eq!(source.clone().count(), 5);
        let second = framer.fetch(&mut source).unwrap();
        assert_eq!(second.id(), "2");
        assert!(framer.fetch(&mut source).is_none());
    }

    #[test]
    fn test_framer_restart_discards_partial() {
        let mut framer = PacketFramer::new();
        let packets = frame_all(&mut framer, b"@76/-1=41@12/3$");
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].body(), b"12/3");
    }

    #[test]
    fn test_framer_overrun_aborts_until_next_start() {
        let mut framer = PacketFramer::new();
        let mut stream = std::vec::Vec::new();
        stream.push(PACKET_START);
        stream.extend(std::iter::repeat(b'9').take(MAX_BODY_LEN + 1));
        // Terminator of the overlong packet must not produce anything
        stream.extend_from_slice(b"$garbage$");
        stream.extend_from_slice(b"@5/1$");

        let packets = frame_all(&mut framer, &stream);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].body(), b"5/1");
        assert_eq!(framer.overruns(), 1);
    }

    #[test]
    fn test_framer_accepts_max_body() {
        let mut framer = PacketFramer::new();
        let mut stream = std::vec::Vec::new();
        stream.push(PACKET_START);
        stream.extend(std::iter::repeat(b'1').take(MAX_BODY_LEN));
        stream.push(PACKET_END);
        assert_eq!(frame_all(&mut framer, &stream).len(), 1);
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose_bare(1023).unwrap().as_str(), "@1023/$");
        assert_eq!(compose(1024, -5).unwrap().as_str(), "@1024/-5$");
        assert_eq!(compose_text("39", "12").unwrap().as_str(), "@39/12$");
        assert_eq!(compose_text("39", "1$2"), Err(PacketError::ReservedChar));
    }

    proptest! {
        #[test]
        fn prop_single_packet_in_noise(
            prefix in proptest::collection::vec(any::<u8>().prop_filter("no start", |b| *b != PACKET_START), 0..40),
            body in proptest::collection::vec(any::<u8>().prop_filter("no sentinel", |b| *b != PACKET_START && *b != PACKET_END), 0..=MAX_BODY_LEN),
            suffix in proptest::collection::vec(any::<u8>().prop_filter("no start", |b| *b != PACKET_START), 0..40),
        ) {
            let mut stream = prefix.clone();
            stream.push(PACKET_START);
            stream.extend_from_slice(&body);
            stream.push(PACKET_END);
            stream.extend_from_slice(&suffix);

            let mut framer = PacketFramer::new();
            let packets = frame_all(&mut framer, &stream);
            prop_assert_eq!(packets.len(), 1);
            prop_assert_eq!(packets[0].body(), &body[..]);
        }

        #[test]
        fn prop_extraction_never_panics(body in proptest::collection::vec(any::<u8>(), 0..=MAX_BODY_LEN)) {
            let packet = Packet::from_body(&body).unwrap();
            let _ = (packet.id(), packet.index(), packet.value());
            let _ = (packet.numeric_id(), packet.numeric_index(), packet.int_value());
        }
    }
}

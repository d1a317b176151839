//! X.690 BER framing: tags, lengths and the encoder.
//!
//! SNMP uses the definite-length subset of BER. Encoding works back to
//! front through [`EncodeBuf`]: content is pushed first, then its length,
//! then the tag, so every length is known when it is written and no
//! second pass is needed.

mod decode;
mod length;

pub use decode::Decoder;
pub use length::{MAX_LENGTH, decode_length, encode_length, length_encoded_len};

use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::value::Value;
use bytes::Bytes;
use smallvec::SmallVec;

/// Tag constants, split by class the way X.690 Section 8.1.2 splits them.
pub mod tag {
    /// Universal class (0b00......).
    pub mod universal {
        pub const BOOLEAN: u8 = 0x01;
        pub const INTEGER: u8 = 0x02;
        pub const OCTET_STRING: u8 = 0x04;
        pub const NULL: u8 = 0x05;
        pub const OBJECT_IDENTIFIER: u8 = 0x06;
        pub const UTF8_STRING: u8 = 0x0C;
        pub const PRINTABLE_STRING: u8 = 0x13;
        pub const T61_STRING: u8 = 0x14;
        pub const IA5_STRING: u8 = 0x16;
        pub const GRAPHIC_STRING: u8 = 0x19;
        pub const VISIBLE_STRING: u8 = 0x1A;
        pub const GENERAL_STRING: u8 = 0x1B;
        pub const BMP_STRING: u8 = 0x1E;
        pub const SEQUENCE: u8 = 0x30;
        pub const SET: u8 = 0x31;
    }

    /// Application class SNMP types (RFC 3416 / SMIv2).
    pub mod application {
        pub const IP_ADDRESS: u8 = 0x40;
        pub const COUNTER32: u8 = 0x41;
        pub const GAUGE32: u8 = 0x42;
        pub const TIMETICKS: u8 = 0x43;
        pub const OPAQUE: u8 = 0x44;
        pub const NSAP_ADDRESS: u8 = 0x45;
        pub const COUNTER64: u8 = 0x46;
    }

    /// Context class varbind sentinels (SNMPv2c/v3).
    pub mod context {
        pub const NO_SUCH_OBJECT: u8 = 0x80;
        pub const NO_SUCH_INSTANCE: u8 = 0x81;
        pub const END_OF_MIB_VIEW: u8 = 0x82;
    }

    /// Context class constructed PDU tags.
    pub mod pdu {
        pub const GET_REQUEST: u8 = 0xA0;
        pub const GET_NEXT_REQUEST: u8 = 0xA1;
        pub const RESPONSE: u8 = 0xA2;
        pub const SET_REQUEST: u8 = 0xA3;
        pub const TRAP_V1: u8 = 0xA4;
        pub const GET_BULK_REQUEST: u8 = 0xA5;
        pub const INFORM_REQUEST: u8 = 0xA6;
        pub const TRAP_V2: u8 = 0xA7;
        pub const REPORT: u8 = 0xA8;
    }
}

/// Tag class per X.690 Section 8.1.2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Class {
    Universal = 0,
    Application = 1,
    Context = 2,
    Private = 3,
}

impl Class {
    /// Extract the class from the top two bits of a tag byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte >> 6 {
            0 => Self::Universal,
            1 => Self::Application,
            2 => Self::Context,
            _ => Self::Private,
        }
    }
}

/// Primitive/constructed flag (bit 6 of the identifier octet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pc {
    Primitive = 0,
    Constructed = 1,
}

/// Decomposed BER identifier octet(s): class, primitive/constructed flag
/// and tag number.
///
/// Tag numbers below 31 pack into a single byte; 31 and above use the long
/// form (low five bits all set, followed by base-128 continuation bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub class: Class,
    pub pc: Pc,
    pub tag: u32,
}

impl TypeInfo {
    /// Construct a TypeInfo.
    pub fn new(class: Class, pc: Pc, tag: u32) -> Self {
        Self { class, pc, tag }
    }

    /// Parse one identifier from the head of `data`, returning it and the
    /// number of bytes consumed.
    pub fn parse(data: &[u8], base_offset: usize) -> Result<(Self, usize)> {
        let first = *data
            .first()
            .ok_or(Error::decode(base_offset, DecodeErrorKind::IncompleteData {
                needed: 1,
                available: 0,
            }))?;

        let class = Class::from_byte(first);
        let pc = if first & 0x20 != 0 {
            Pc::Constructed
        } else {
            Pc::Primitive
        };

        let low = first & 0x1F;
        if low < 0x1F {
            return Ok((Self::new(class, pc, low as u32), 1));
        }

        // Long form: base-128 continuation bytes, high bit set on all but
        // the last.
        let mut tag: u32 = 0;
        let mut consumed = 1;
        loop {
            let byte = *data.get(consumed).ok_or(Error::decode(
                base_offset + consumed,
                DecodeErrorKind::IncompleteData {
                    needed: consumed + 1,
                    available: data.len(),
                },
            ))?;
            consumed += 1;
            if tag > (u32::MAX >> 7) {
                return Err(Error::decode(
                    base_offset + consumed,
                    DecodeErrorKind::InvalidTag,
                ));
            }
            tag = (tag << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                break;
            }
        }
        // X.690 8.1.2.4.2: long form must not encode tags below 31
        if tag < 0x1F {
            return Err(Error::decode(base_offset, DecodeErrorKind::InvalidTag));
        }
        Ok((Self::new(class, pc, tag), consumed))
    }

    /// Encode the identifier octet(s), most significant first.
    pub fn encode(&self) -> SmallVec<[u8; 6]> {
        let mut out = SmallVec::new();
        let head = ((self.class as u8) << 6) | ((self.pc as u8) << 5);
        if self.tag < 0x1F {
            out.push(head | self.tag as u8);
            return out;
        }
        out.push(head | 0x1F);
        let mut groups = SmallVec::<[u8; 5]>::new();
        let mut tag = self.tag;
        loop {
            groups.push((tag & 0x7F) as u8);
            tag >>= 7;
            if tag == 0 {
                break;
            }
        }
        while let Some(group) = groups.pop() {
            let cont = if groups.is_empty() { 0x00 } else { 0x80 };
            out.push(group | cont);
        }
        out
    }

    /// The single identifier byte for short-form tags, `None` for tag >= 31.
    pub fn as_byte(&self) -> Option<u8> {
        if self.tag < 0x1F {
            Some(((self.class as u8) << 6) | ((self.pc as u8) << 5) | self.tag as u8)
        } else {
            None
        }
    }
}

/// Number of content bytes for a minimum-length two's-complement integer.
pub fn integer_content_len(value: i64) -> usize {
    let mut n = 8;
    // Strip redundant leading 0x00/0xFF while preserving the sign bit.
    while n > 1 {
        let top = (value >> ((n - 1) * 8)) as u8;
        let next_msb = (value >> ((n - 2) * 8)) as u8 & 0x80;
        if (top == 0x00 && next_msb == 0) || (top == 0xFF && next_msb != 0) {
            n -= 1;
        } else {
            break;
        }
    }
    n
}

/// Number of content bytes for an unsigned 32-bit value (1-5: a leading
/// zero byte is added when the top bit would read as a sign bit).
pub fn unsigned32_content_len(value: u32) -> usize {
    let significant = (32 - value.leading_zeros() as usize).div_ceil(8).max(1);
    let top = (value >> ((significant - 1) * 8)) as u8;
    if top & 0x80 != 0 {
        significant + 1
    } else {
        significant
    }
}

/// Number of content bytes for an unsigned 64-bit value (1-9).
pub fn unsigned64_content_len(value: u64) -> usize {
    let significant = (64 - value.leading_zeros() as usize).div_ceil(8).max(1);
    let top = (value >> ((significant - 1) * 8)) as u8;
    if top & 0x80 != 0 {
        significant + 1
    } else {
        significant
    }
}

/// Decode one TLV from the head of a buffer, returning the value and the
/// unconsumed remainder.
pub fn pop_tlv(data: Bytes) -> Result<(Value, Bytes)> {
    let mut decoder = Decoder::new(data);
    let value = Value::decode(&mut decoder)?;
    let rest = decoder.split_rest();
    Ok((value, rest))
}

/// Back-to-front BER encoder.
///
/// Bytes are stored in reverse; [`finish`](Self::finish) flips the buffer
/// once. Content is therefore pushed innermost-first and, within a
/// constructed value, in reverse field order.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(128) }
    }

    /// Current number of encoded bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been encoded yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Push a single raw byte.
    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Push raw bytes given in wire order.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().rev());
    }

    /// Push a tag byte.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Push the identifier octets of a [`TypeInfo`].
    pub fn push_type_info(&mut self, info: &TypeInfo) {
        let bytes = info.encode();
        self.buf.extend(bytes.iter().rev());
    }

    /// Push a definite length field.
    pub fn push_length(&mut self, len: usize) {
        let (bytes, n) = encode_length(len);
        // encode_length already yields the bytes reversed for prepending
        self.buf.extend_from_slice(&bytes[..n]);
    }

    /// Push a complete INTEGER TLV (two's complement, minimum length).
    pub fn push_integer(&mut self, value: i64) {
        let n = integer_content_len(value);
        for i in 0..n {
            self.buf.push((value >> (i * 8)) as u8);
        }
        self.push_length(n);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Push an unsigned 32-bit TLV under the given tag (Counter32, Gauge32,
    /// TimeTicks, or INTEGER for USM boots/time).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let n = unsigned32_content_len(value);
        for i in 0..n {
            self.buf.push((value as u64 >> (i * 8)) as u8);
        }
        self.push_length(n);
        self.push_tag(tag);
    }

    /// Push an unsigned 64-bit TLV under the given tag (Counter64).
    pub fn push_unsigned64(&mut self, tag: u8, value: u64) {
        let n = unsigned64_content_len(value);
        for i in 0..n {
            if i < 8 {
                self.buf.push((value >> (i * 8)) as u8);
            } else {
                self.buf.push(0);
            }
        }
        self.push_length(n);
        self.push_tag(tag);
    }

    /// Push a BOOLEAN TLV (0x00 false, 0xFF true).
    pub fn push_boolean(&mut self, value: bool) {
        self.buf.push(if value { 0xFF } else { 0x00 });
        self.push_length(1);
        self.push_tag(tag::universal::BOOLEAN);
    }

    /// Push an OCTET STRING TLV.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    /// Push a NULL TLV.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Push an OBJECT IDENTIFIER TLV.
    pub fn push_oid(&mut self, oid: &Oid) {
        let content = oid.to_ber();
        self.push_bytes(&content);
        self.push_length(content.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    /// Push an IpAddress TLV (APPLICATION 0, four bytes).
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_bytes(&addr);
        self.push_length(4);
        self.push_tag(tag::application::IP_ADDRESS);
    }

    /// Push a SEQUENCE wrapping whatever the closure encodes.
    ///
    /// The closure must push the sequence fields in reverse order.
    pub fn push_sequence(&mut self, f: impl FnOnce(&mut Self)) {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Push a constructed TLV with an arbitrary tag byte.
    pub fn push_constructed(&mut self, tag: u8, f: impl FnOnce(&mut Self)) {
        let mark = self.buf.len();
        f(self);
        let content_len = self.buf.len() - mark;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Flip the buffer into wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_lengths() {
        assert_eq!(integer_content_len(0), 1);
        assert_eq!(integer_content_len(127), 1);
        assert_eq!(integer_content_len(128), 2);
        assert_eq!(integer_content_len(300), 2);
        assert_eq!(integer_content_len(-1), 1);
        assert_eq!(integer_content_len(-129), 2);
        assert_eq!(integer_content_len(i64::MIN), 8);
    }

    #[test]
    fn unsigned_lengths() {
        assert_eq!(unsigned32_content_len(0), 1);
        assert_eq!(unsigned32_content_len(127), 1);
        assert_eq!(unsigned32_content_len(128), 2); // leading zero pad
        assert_eq!(unsigned32_content_len(u32::MAX), 5);
        assert_eq!(unsigned64_content_len(u64::MAX), 9);
    }

    #[test]
    fn encode_integer_wire_bytes() {
        let mut buf = EncodeBuf::new();
        buf.push_integer(300);
        assert_eq!(buf.finish().as_ref(), &[0x02, 0x02, 0x01, 0x2C]);

        let mut buf = EncodeBuf::new();
        buf.push_integer(-1);
        assert_eq!(buf.finish().as_ref(), &[0x02, 0x01, 0xFF]);

        let mut buf = EncodeBuf::new();
        buf.push_integer(0);
        assert_eq!(buf.finish().as_ref(), &[0x02, 0x01, 0x00]);
    }

    #[test]
    fn encode_sequence_nesting() {
        // SEQUENCE { INTEGER 1, INTEGER 2 }
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(2);
            buf.push_integer(1);
        });
        assert_eq!(
            buf.finish().as_ref(),
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn encode_boolean() {
        let mut buf = EncodeBuf::new();
        buf.push_boolean(true);
        assert_eq!(buf.finish().as_ref(), &[0x01, 0x01, 0xFF]);

        let mut buf = EncodeBuf::new();
        buf.push_boolean(false);
        assert_eq!(buf.finish().as_ref(), &[0x01, 0x01, 0x00]);
    }

    #[test]
    fn type_info_short_form() {
        let (info, consumed) = TypeInfo::parse(&[0x30], 0).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(info.class, Class::Universal);
        assert_eq!(info.pc, Pc::Constructed);
        assert_eq!(info.tag, 0x10);
        assert_eq!(info.as_byte(), Some(0x30));
    }

    #[test]
    fn type_info_long_form_roundtrip() {
        // APPLICATION, primitive, tag 1000
        let info = TypeInfo::new(Class::Application, Pc::Primitive, 1000);
        let encoded = info.encode();
        assert_eq!(encoded[0], 0x40 | 0x1F);
        let (parsed, consumed) = TypeInfo::parse(&encoded, 0).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(parsed, info);
    }

    #[test]
    fn type_info_rejects_non_minimal_long_form() {
        // Long form encoding of tag 5 is forbidden
        assert!(TypeInfo::parse(&[0x1F, 0x05], 0).is_err());
    }

    #[test]
    fn push_type_info_matches_push_tag_for_short_form() {
        let info = TypeInfo::new(Class::Context, Pc::Constructed, 2);
        let mut a = EncodeBuf::new();
        a.push_length(0);
        a.push_type_info(&info);
        let mut b = EncodeBuf::new();
        b.push_length(0);
        b.push_tag(0xA2);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn pop_tlv_returns_remainder() {
        let data = Bytes::from_static(&[0x02, 0x01, 0x2A, 0x05, 0x00]);
        let (value, rest) = pop_tlv(data).unwrap();
        assert_eq!(value, Value::Integer(42));
        assert_eq!(rest.as_ref(), &[0x05, 0x00]);

        let (value, rest) = pop_tlv(rest).unwrap();
        assert_eq!(value, Value::Null);
        assert!(rest.is_empty());
    }
}

//! SNMP value types.
//!
//! [`Value`] is a closed sum over every X.690 variant exchanged on the
//! SNMP wire: the universal primitives, the SMIv2 application types, the
//! v2c/v3 varbind sentinels and an [`Value::Unknown`] arm that preserves
//! unrecognized TLVs byte-for-byte.
//!
//! Decoding dispatches through the [type registry](crate::registry), so
//! an unknown `(class, tag)` pair is never fatal.

use crate::ber::{Decoder, EncodeBuf, Pc, TypeInfo, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::registry;
use crate::util::hex;
use bytes::Bytes;
use std::time::Duration;

/// Which universal character-string type a string value carried.
///
/// SNMP agents occasionally emit these instead of plain OCTET STRINGs;
/// the kind is preserved so re-encoding is byte-exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Utf8,
    Printable,
    T61,
    Ia5,
    Graphic,
    Visible,
    General,
    Bmp,
}

impl StringKind {
    /// The universal tag number for this string family.
    pub fn tag(self) -> u8 {
        match self {
            Self::Utf8 => tag::universal::UTF8_STRING,
            Self::Printable => tag::universal::PRINTABLE_STRING,
            Self::T61 => tag::universal::T61_STRING,
            Self::Ia5 => tag::universal::IA5_STRING,
            Self::Graphic => tag::universal::GRAPHIC_STRING,
            Self::Visible => tag::universal::VISIBLE_STRING,
            Self::General => tag::universal::GENERAL_STRING,
            Self::Bmp => tag::universal::BMP_STRING,
        }
    }

    /// Map a universal tag number back to a string family.
    pub fn from_tag(tag_byte: u8) -> Option<Self> {
        match tag_byte {
            tag::universal::UTF8_STRING => Some(Self::Utf8),
            tag::universal::PRINTABLE_STRING => Some(Self::Printable),
            tag::universal::T61_STRING => Some(Self::T61),
            tag::universal::IA5_STRING => Some(Self::Ia5),
            tag::universal::GRAPHIC_STRING => Some(Self::Graphic),
            tag::universal::VISIBLE_STRING => Some(Self::Visible),
            tag::universal::GENERAL_STRING => Some(Self::General),
            tag::universal::BMP_STRING => Some(Self::Bmp),
            _ => None,
        }
    }
}

/// SNMP value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// BOOLEAN (rare on the SNMP wire, part of the BER subset)
    Boolean(bool),

    /// INTEGER (signed, minimum-length two's complement)
    Integer(i64),

    /// OCTET STRING (arbitrary bytes)
    OctetString(Bytes),

    /// NULL
    Null,

    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),

    /// SEQUENCE of nested values
    Sequence(Vec<Value>),

    /// SET of nested values
    Set(Vec<Value>),

    /// One of the universal character-string families
    CharacterString { kind: StringKind, data: Bytes },

    /// IpAddress (APPLICATION 0, four bytes big-endian)
    IpAddress([u8; 4]),

    /// Counter32 (APPLICATION 1, wraps modulo 2^32)
    Counter32(u32),

    /// Gauge32 (APPLICATION 2, saturating)
    Gauge32(u32),

    /// TimeTicks (APPLICATION 3, hundredths of seconds)
    TimeTicks(u32),

    /// Opaque (APPLICATION 4, opaque bytes)
    Opaque(Bytes),

    /// NsapAddress (APPLICATION 5)
    NsapAddress(Bytes),

    /// Counter64 (APPLICATION 6, wraps modulo 2^64; SNMPv2c/v3 only)
    Counter64(u64),

    /// noSuchObject varbind sentinel (context 0)
    NoSuchObject,

    /// noSuchInstance varbind sentinel (context 1)
    NoSuchInstance,

    /// endOfMibView varbind sentinel (context 2); terminates walks
    EndOfMibView,

    /// Unrecognized TLV, preserved raw for forward compatibility
    Unknown { info: TypeInfo, data: Bytes },
}

impl Value {
    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32 (Counter32, Gauge32, TimeTicks, or a
    /// non-negative Integer in range).
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as u64 (any unsigned type or a non-negative Integer).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v as u64),
            Value::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as raw bytes (OctetString, Opaque, NsapAddress or a
    /// character string).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) | Value::NsapAddress(v) => Some(v),
            Value::CharacterString { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Try to get as UTF-8 text.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Try to get as OID.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Try to get as IPv4 address.
    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(bytes) => Some(std::net::Ipv4Addr::from(*bytes)),
            _ => None,
        }
    }

    /// TimeTicks as a [`Duration`] (hundredths of seconds).
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::TimeTicks(v) => Some(Duration::from_millis(*v as u64 * 10)),
            _ => None,
        }
    }

    /// Whether this is one of the v2c/v3 varbind sentinels.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Boolean(v) => buf.push_boolean(*v),
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::Sequence(items) => {
                buf.push_sequence(|buf| {
                    for item in items.iter().rev() {
                        item.encode(buf);
                    }
                });
            }
            Value::Set(items) => {
                buf.push_constructed(tag::universal::SET, |buf| {
                    for item in items.iter().rev() {
                        item.encode(buf);
                    }
                });
            }
            Value::CharacterString { kind, data } => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(kind.tag());
            }
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::application::OPAQUE);
            }
            Value::NsapAddress(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::application::NSAP_ADDRESS);
            }
            Value::Counter64(v) => buf.push_unsigned64(tag::application::COUNTER64, *v),
            Value::NoSuchObject => {
                buf.push_length(0);
                buf.push_tag(tag::context::NO_SUCH_OBJECT);
            }
            Value::NoSuchInstance => {
                buf.push_length(0);
                buf.push_tag(tag::context::NO_SUCH_INSTANCE);
            }
            Value::EndOfMibView => {
                buf.push_length(0);
                buf.push_tag(tag::context::END_OF_MIB_VIEW);
            }
            Value::Unknown { info, data } => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_type_info(info);
            }
        }
    }

    /// Encode to a standalone byte string.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    /// Decode one value from the decoder, dispatching through the type
    /// registry. Unknown `(class, tag)` pairs decode to [`Value::Unknown`].
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let info = decoder.read_type_info()?;
        let len = decoder.read_length()?;
        let content = decoder.read_bytes(len)?;
        registry::decode(info, content)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{s}"),
                Err(_) => write!(f, "0x{}", hex::encode(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{oid}"),
            Value::Sequence(items) => {
                write!(f, "SEQUENCE[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Set(items) => {
                write!(f, "SET[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::CharacterString { data, .. } => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{s}"),
                Err(_) => write!(f, "0x{}", hex::encode(data)),
            },
            Value::IpAddress(a) => write!(f, "{}.{}.{}.{}", a[0], a[1], a[2], a[3]),
            Value::Counter32(v) => write!(f, "{v}"),
            Value::Gauge32(v) => write!(f, "{v}"),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                let days = secs / 86400;
                let hours = (secs % 86400) / 3600;
                let mins = (secs % 3600) / 60;
                let s = secs % 60;
                write!(f, "{days}d {hours}h {mins}m {s}s")
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", hex::encode(data)),
            Value::NsapAddress(data) => write!(f, "NsapAddress(0x{})", hex::encode(data)),
            Value::Counter64(v) => write!(f, "{v}"),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
            Value::Unknown { info, data } => {
                write!(
                    f,
                    "Unknown(class={:?}, tag={}, data=0x{})",
                    info.class,
                    info.tag,
                    hex::encode(data)
                )
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<[u8; 4]> for Value {
    fn from(addr: [u8; 4]) -> Self {
        Value::IpAddress(addr)
    }
}

/// Decode helpers wired into the type registry by
/// [`registry::builtin_table`](crate::registry).
pub(crate) mod decoders {
    use super::*;

    fn content_decoder(data: Bytes) -> Decoder {
        Decoder::new(data)
    }

    pub fn boolean(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        if data.len() != 1 {
            return Err(Error::decode(
                0,
                DecodeErrorKind::InvalidValueLength {
                    expected: 1,
                    actual: data.len(),
                },
            ));
        }
        Ok(Value::Boolean(data[0] != 0))
    }

    pub fn integer(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        let len = data.len();
        let mut dec = content_decoder(data);
        Ok(Value::Integer(dec.read_integer_value(len)?))
    }

    pub fn octet_string(info: TypeInfo, data: Bytes) -> Result<Value> {
        // Constructed OCTET STRING segments are legal BER but never appear
        // in SNMP; rejected rather than silently flattened.
        require_primitive(&info)?;
        Ok(Value::OctetString(data))
    }

    pub fn null(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        if !data.is_empty() {
            return Err(Error::decode(0, DecodeErrorKind::InvalidNull));
        }
        Ok(Value::Null)
    }

    pub fn object_identifier(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        Ok(Value::ObjectIdentifier(Oid::from_ber(&data)?))
    }

    pub fn sequence(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_constructed(&info)?;
        Ok(Value::Sequence(decode_children(data)?))
    }

    pub fn set(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_constructed(&info)?;
        Ok(Value::Set(decode_children(data)?))
    }

    pub fn character_string(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        let kind = StringKind::from_tag(info.tag as u8).ok_or(Error::decode(
            0,
            DecodeErrorKind::InvalidTag,
        ))?;
        Ok(Value::CharacterString { kind, data })
    }

    pub fn ip_address(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        if data.len() != 4 {
            return Err(Error::decode(
                0,
                DecodeErrorKind::InvalidValueLength {
                    expected: 4,
                    actual: data.len(),
                },
            ));
        }
        Ok(Value::IpAddress([data[0], data[1], data[2], data[3]]))
    }

    pub fn counter32(info: TypeInfo, data: Bytes) -> Result<Value> {
        Ok(Value::Counter32(unsigned32(&info, data)?))
    }

    pub fn gauge32(info: TypeInfo, data: Bytes) -> Result<Value> {
        Ok(Value::Gauge32(unsigned32(&info, data)?))
    }

    pub fn timeticks(info: TypeInfo, data: Bytes) -> Result<Value> {
        Ok(Value::TimeTicks(unsigned32(&info, data)?))
    }

    pub fn opaque(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        Ok(Value::Opaque(data))
    }

    pub fn nsap_address(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        Ok(Value::NsapAddress(data))
    }

    pub fn counter64(info: TypeInfo, data: Bytes) -> Result<Value> {
        require_primitive(&info)?;
        let len = data.len();
        let mut dec = content_decoder(data);
        Ok(Value::Counter64(dec.read_unsigned64_value(len)?))
    }

    pub fn no_such_object(_info: TypeInfo, _data: Bytes) -> Result<Value> {
        // Sentinels carry no value; stray content is ignored
        Ok(Value::NoSuchObject)
    }

    pub fn no_such_instance(_info: TypeInfo, _data: Bytes) -> Result<Value> {
        Ok(Value::NoSuchInstance)
    }

    pub fn end_of_mib_view(_info: TypeInfo, _data: Bytes) -> Result<Value> {
        Ok(Value::EndOfMibView)
    }

    fn unsigned32(info: &TypeInfo, data: Bytes) -> Result<u32> {
        require_primitive(info)?;
        let len = data.len();
        let mut dec = content_decoder(data);
        dec.read_unsigned32_value(len)
    }

    fn decode_children(data: Bytes) -> Result<Vec<Value>> {
        let mut dec = content_decoder(data);
        let mut items = Vec::new();
        while !dec.is_empty() {
            items.push(Value::decode(&mut dec)?);
        }
        Ok(items)
    }

    fn require_primitive(info: &TypeInfo) -> Result<()> {
        if info.pc != Pc::Primitive {
            return Err(Error::decode(0, DecodeErrorKind::InvalidTag));
        }
        Ok(())
    }

    fn require_constructed(info: &TypeInfo) -> Result<()> {
        if info.pc != Pc::Constructed {
            return Err(Error::decode(0, DecodeErrorKind::InvalidTag));
        }
        Ok(())
    }
}

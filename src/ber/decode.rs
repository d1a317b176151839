//! BER decoding.
//!
//! [`Decoder`] is an offset cursor over a `Bytes` buffer; sub-decoders
//! share the underlying allocation, so walking nested SEQUENCEs never
//! copies content.

use super::length::decode_length;
use super::{TypeInfo, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// BER decoder reading from a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
}

impl Decoder {
    /// Create a decoder over `data`.
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Current offset into the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Remaining unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether the cursor reached the end.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = self.data.get(self.offset).copied().ok_or_else(|| {
            Error::decode(
                self.offset,
                DecodeErrorKind::IncompleteData {
                    needed: 1,
                    available: 0,
                },
            )
        })?;
        self.offset += 1;
        Ok(byte)
    }

    /// Read a raw tag byte (short-form identifiers only).
    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    /// Read the full identifier octet(s), long form included.
    pub fn read_type_info(&mut self) -> Result<TypeInfo> {
        let (info, consumed) = TypeInfo::parse(&self.data[self.offset..], self.offset)?;
        self.offset += consumed;
        Ok(info)
    }

    /// Read a length field.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset)?;
        self.offset += consumed;
        Ok(len)
    }

    /// Read `len` raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        // saturating_add so a huge len cannot wrap past the bounds check
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::IncompleteData {
                    needed: len,
                    available: self.remaining(),
                },
            ));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read a tag and require it to match, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            tracing::debug!(
                target: "snmpkit::ber",
                offset = self.offset - 1,
                expected,
                actual,
                "unexpected tag"
            );
            return Err(Error::decode(
                self.offset - 1,
                DecodeErrorKind::UnexpectedType { expected, actual },
            ));
        }
        self.read_length()
    }

    /// Read an INTEGER TLV.
    pub fn read_integer(&mut self) -> Result<i64> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read an INTEGER TLV constrained to i32 (PDU header fields).
    pub fn read_integer32(&mut self) -> Result<i32> {
        let value = self.read_integer()?;
        i32::try_from(value)
            .map_err(|_| Error::decode(self.offset, DecodeErrorKind::IntegerOverflow))
    }

    /// Read signed integer content of the given length.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i64> {
        if len == 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 8 {
            return Err(Error::decode(self.offset, DecodeErrorKind::IntegerOverflow));
        }

        let bytes = self.read_bytes(len)?;
        let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &byte in bytes.iter() {
            value = (value << 8) | byte as i64;
        }
        Ok(value)
    }

    /// Read unsigned 32-bit content of the given length.
    ///
    /// Content wider than 32 bits wraps modulo 2^32 and the remainder is
    /// kept; some agents emit five-byte extended counters past the wrap
    /// point and this preserves their modular meaning.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::ZeroLengthInteger));
        }
        let bytes = self.read_bytes(len)?;
        let mut value: u32 = 0;
        for &byte in bytes.iter() {
            value = (value << 8) | byte as u32;
        }
        Ok(value)
    }

    /// Read an unsigned 32-bit TLV with a specific tag.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_value(len)
    }

    /// Read unsigned 64-bit content of the given length (Counter64).
    ///
    /// Wraps modulo 2^64, same policy as the 32-bit reader.
    pub fn read_unsigned64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::ZeroLengthInteger));
        }
        let bytes = self.read_bytes(len)?;
        let mut value: u64 = 0;
        for &byte in bytes.iter() {
            value = (value << 8) | byte as u64;
        }
        Ok(value)
    }

    /// Read a BOOLEAN TLV. Any nonzero content byte decodes as true.
    pub fn read_boolean(&mut self) -> Result<bool> {
        let len = self.expect_tag(tag::universal::BOOLEAN)?;
        if len != 1 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::InvalidValueLength {
                    expected: 1,
                    actual: len,
                },
            ));
        }
        Ok(self.read_byte()? != 0)
    }

    /// Read an OCTET STRING TLV.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL TLV.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER TLV.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    /// Read OID content of the given length.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes)
    }

    /// Read a SEQUENCE, returning a sub-decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed TLV with a specific tag, returning a sub-decoder.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        let content = self.read_bytes(len)?;
        Ok(Decoder::new(content))
    }

    /// Read an IpAddress TLV (APPLICATION 0, exactly four bytes).
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let len = self.expect_tag(tag::application::IP_ADDRESS)?;
        if len != 4 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::InvalidValueLength {
                    expected: 4,
                    actual: len,
                },
            ));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Skip one TLV without interpreting it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        let _ = self.read_type_info()?;
        let len = self.read_length()?;
        let new_offset = self.offset.saturating_add(len);
        if new_offset > self.data.len() {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::IncompleteData {
                    needed: len,
                    available: self.remaining(),
                },
            ));
        }
        self.offset = new_offset;
        Ok(())
    }

    /// Create a sub-decoder over the next `len` bytes.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let content = self.read_bytes(len)?;
        Ok(Decoder::new(content))
    }

    /// Remaining data as a slice (no consumption).
    pub fn remaining_slice(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    /// Consume the decoder, returning the unread tail without copying.
    pub fn split_rest(self) -> Bytes {
        self.data.slice(self.offset..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_integer() {
        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x00]);
        assert_eq!(dec.read_integer().unwrap(), 0);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x7F]);
        assert_eq!(dec.read_integer().unwrap(), 127);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x00, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), 128);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x01, 0x2C]);
        assert_eq!(dec.read_integer().unwrap(), 300);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0xFF]);
        assert_eq!(dec.read_integer().unwrap(), -1);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), -128);
    }

    #[test]
    fn decode_integer_non_minimal_accepted() {
        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x00, 0x01]);
        assert_eq!(dec.read_integer().unwrap(), 1);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0xFF, 0xFF]);
        assert_eq!(dec.read_integer().unwrap(), -1);
    }

    #[test]
    fn decode_zero_length_integer_rejected() {
        let mut dec = Decoder::from_slice(&[0x02, 0x00]);
        assert!(dec.read_integer().is_err());
    }

    #[test]
    fn decode_unsigned32_wraps_modulo() {
        // 2^32 + 40 as a five-byte body: 01 00 00 00 28
        let mut dec = Decoder::from_slice(&[0x41, 0x05, 0x01, 0x00, 0x00, 0x00, 0x28]);
        assert_eq!(dec.read_unsigned32(0x41).unwrap(), 40);
    }

    #[test]
    fn decode_boolean() {
        let mut dec = Decoder::from_slice(&[0x01, 0x01, 0x00]);
        assert!(!dec.read_boolean().unwrap());

        let mut dec = Decoder::from_slice(&[0x01, 0x01, 0xFF]);
        assert!(dec.read_boolean().unwrap());

        // any nonzero decodes as true
        let mut dec = Decoder::from_slice(&[0x01, 0x01, 0x01]);
        assert!(dec.read_boolean().unwrap());
    }

    #[test]
    fn decode_null() {
        let mut dec = Decoder::from_slice(&[0x05, 0x00]);
        dec.read_null().unwrap();

        let mut dec = Decoder::from_slice(&[0x05, 0x01, 0x00]);
        assert!(dec.read_null().is_err());
    }

    #[test]
    fn decode_octet_string() {
        let mut dec = Decoder::from_slice(&[0x04, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(dec.read_octet_string().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn decode_oid() {
        let mut dec = Decoder::from_slice(&[0x06, 0x03, 0x2B, 0x06, 0x01]);
        let oid = dec.read_oid().unwrap();
        assert_eq!(oid.nodes(), &[1, 3, 6, 1]);
    }

    #[test]
    fn decode_sequence() {
        let mut dec = Decoder::from_slice(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
        let mut seq = dec.read_sequence().unwrap();
        assert_eq!(seq.read_integer().unwrap(), 1);
        assert_eq!(seq.read_integer().unwrap(), 2);
        assert!(seq.is_empty());
    }

    #[test]
    fn read_bytes_rejects_oversized_length() {
        let mut dec = Decoder::from_slice(&[0x01, 0x02, 0x03]);
        assert!(dec.read_bytes(100).is_err());
    }

    #[test]
    fn skip_tlv_rejects_truncated() {
        // claims 256 content bytes, provides 3
        let mut dec = Decoder::from_slice(&[0x04, 0x82, 0x01, 0x00, 0xAA, 0xBB, 0xCC]);
        assert!(dec.skip_tlv().is_err());
    }

    #[test]
    fn skip_tlv_advances() {
        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x2A, 0x05, 0x00]);
        dec.skip_tlv().unwrap();
        dec.read_null().unwrap();
        assert!(dec.is_empty());
    }
}

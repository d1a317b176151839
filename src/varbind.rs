//! Variable bindings.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

/// An OID/value pair as carried in every PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The bound value.
    pub value: Value,
}

impl VarBind {
    /// Create a new VarBind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Create a VarBind with a NULL value (request placeholders).
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Encode as `SEQUENCE { oid, value }`.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }

    /// Decode one VarBind.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let oid = seq.read_oid()?;
        let value = Value::decode(&mut seq)?;
        Ok(VarBind { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

impl From<(Oid, Value)> for VarBind {
    fn from((oid, value): (Oid, Value)) -> Self {
        Self::new(oid, value)
    }
}

/// Encode a VarBind list: a SEQUENCE of VarBind SEQUENCEs.
pub fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) {
    buf.push_sequence(|buf| {
        // reverse order for the back-to-front encoder
        for vb in varbinds.iter().rev() {
            vb.encode(buf);
        }
    });
}

/// Decode a VarBind list.
pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut seq = decoder.read_sequence()?;

    let estimated = (seq.remaining() / 16).max(1);
    let mut varbinds = Vec::with_capacity(estimated);

    while !seq.is_empty() {
        varbinds.push(VarBind::decode(&mut seq)?);
    }

    Ok(varbinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use bytes::Bytes;

    #[test]
    fn varbind_roundtrip() {
        let vb = VarBind::new(oid!(1, 3, 6, 1), Value::Integer(42));

        let mut buf = EncodeBuf::new();
        vb.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());

        assert_eq!(VarBind::decode(&mut decoder).unwrap(), vb);
    }

    #[test]
    fn varbind_list_roundtrip() {
        let varbinds = vec![
            VarBind::new(oid!(1, 3, 6, 1), Value::Integer(1)),
            VarBind::new(oid!(1, 3, 6, 2), Value::from("two")),
            VarBind::null(oid!(1, 3, 6, 3)),
        ];

        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &varbinds);
        let mut decoder = Decoder::new(buf.finish());

        assert_eq!(decode_varbind_list(&mut decoder).unwrap(), varbinds);
    }

    #[test]
    fn empty_list_roundtrip() {
        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &[]);
        let data = buf.finish();
        assert_eq!(data.as_ref(), &[0x30, 0x00]);

        let mut decoder = Decoder::new(data);
        assert!(decode_varbind_list(&mut decoder).unwrap().is_empty());
    }

    #[test]
    fn sentinel_varbinds_roundtrip() {
        for value in [
            Value::NoSuchObject,
            Value::NoSuchInstance,
            Value::EndOfMibView,
        ] {
            let vb = VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), value);

            let mut buf = EncodeBuf::new();
            vb.encode(&mut buf);
            let mut decoder = Decoder::new(buf.finish());
            let decoded = VarBind::decode(&mut decoder).unwrap();

            assert_eq!(decoded, vb);
            assert!(decoded.value.is_exception());
        }
    }

    #[test]
    fn varbind_display() {
        let vb = VarBind::new(
            oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
            Value::OctetString(Bytes::from_static(b"router1")),
        );
        assert_eq!(vb.to_string(), "1.3.6.1.2.1.1.5.0 = router1");
    }
}

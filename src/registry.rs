//! Type registry: `(class, tag) -> decoder` dispatch table.
//!
//! The registry maps a BER identifier to the function that turns content
//! bytes into a [`Value`]. Universal tags and the SNMP application/context
//! tags are pre-registered; pairs with no entry decode to
//! [`Value::Unknown`], never an error, so unrecognized types survive a
//! round trip untouched.
//!
//! Applications may add decoders for private-class tags with
//! [`register_extension`] before the first decode. Registering a key twice
//! panics: identifiers are globally unique and a clash is a programming
//! error, not a runtime condition.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use bytes::Bytes;

use crate::ber::{Class, TypeInfo, tag};
use crate::error::Result;
use crate::value::{Value, decoders};

/// A registered decoder: receives the parsed identifier and the content
/// bytes of one TLV.
pub type DecodeFn = fn(TypeInfo, Bytes) -> Result<Value>;

static TABLE: LazyLock<RwLock<HashMap<(Class, u32), DecodeFn>>> =
    LazyLock::new(|| RwLock::new(builtin_table()));

fn builtin_table() -> HashMap<(Class, u32), DecodeFn> {
    let mut table: HashMap<(Class, u32), DecodeFn> = HashMap::new();

    // Universal primitives
    table.insert(
        (Class::Universal, tag::universal::BOOLEAN as u32),
        decoders::boolean,
    );
    table.insert(
        (Class::Universal, tag::universal::INTEGER as u32),
        decoders::integer,
    );
    table.insert(
        (Class::Universal, tag::universal::OCTET_STRING as u32),
        decoders::octet_string,
    );
    table.insert(
        (Class::Universal, tag::universal::NULL as u32),
        decoders::null,
    );
    table.insert(
        (Class::Universal, tag::universal::OBJECT_IDENTIFIER as u32),
        decoders::object_identifier,
    );
    table.insert((Class::Universal, 0x10), decoders::sequence);
    table.insert((Class::Universal, 0x11), decoders::set);

    // Universal character-string families
    for string_tag in [
        tag::universal::UTF8_STRING,
        tag::universal::PRINTABLE_STRING,
        tag::universal::T61_STRING,
        tag::universal::IA5_STRING,
        tag::universal::GRAPHIC_STRING,
        tag::universal::VISIBLE_STRING,
        tag::universal::GENERAL_STRING,
        tag::universal::BMP_STRING,
    ] {
        table.insert(
            (Class::Universal, string_tag as u32),
            decoders::character_string,
        );
    }

    // SNMP application types (APPLICATION 0..6)
    table.insert((Class::Application, 0), decoders::ip_address);
    table.insert((Class::Application, 1), decoders::counter32);
    table.insert((Class::Application, 2), decoders::gauge32);
    table.insert((Class::Application, 3), decoders::timeticks);
    table.insert((Class::Application, 4), decoders::opaque);
    table.insert((Class::Application, 5), decoders::nsap_address);
    table.insert((Class::Application, 6), decoders::counter64);

    // Varbind sentinels (CONTEXT 0..2, primitive)
    table.insert((Class::Context, 0), decoders::no_such_object);
    table.insert((Class::Context, 1), decoders::no_such_instance);
    table.insert((Class::Context, 2), decoders::end_of_mib_view);

    table
}

/// Decode one TLV's content through the registry.
///
/// Constructed context-class tags are left to the PDU layer and decode to
/// `Unknown` here; the sentinel entries only match the primitive forms.
pub fn decode(info: TypeInfo, data: Bytes) -> Result<Value> {
    let decoder = {
        let table = TABLE.read().expect("type registry poisoned");
        // Context sentinels are primitive; a constructed context tag is a
        // PDU, which Value does not model
        if info.class == Class::Context && info.pc == crate::ber::Pc::Constructed {
            None
        } else {
            table.get(&(info.class, info.tag)).copied()
        }
    };

    match decoder {
        Some(f) => f(info, data),
        None => Ok(Value::Unknown { info, data }),
    }
}

/// Register a decoder for an additional `(class, tag)` pair.
///
/// # Panics
///
/// Panics if the pair is already registered. Identifiers are globally
/// unique; call this once, at startup.
pub fn register_extension(class: Class, tag: u32, decoder: DecodeFn) {
    let mut table = TABLE.write().expect("type registry poisoned");
    if table.insert((class, tag), decoder).is_some() {
        panic!("type registry: ({class:?}, {tag}) registered twice");
    }
}

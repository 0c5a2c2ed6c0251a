//! The ASN.1 Basic Encoding Rules value layer.
//!
//! This module maps ASN.1 universal types to Rust values on top of the
//! [`tlv`](crate::tlv) streaming layer. Types implement [`BerEncode`] and
//! [`BerDecode`]; implementations for the standard library and crate
//! types cover every supported UNIVERSAL tag:
//!
//! * `bool` — BOOLEAN
//! * the integer primitives and (with the `bigint` feature)
//!   `num_bigint::BigInt` — INTEGER
//! * [`BitString`](crate::BitString) — BIT STRING
//! * [`OctetString`](crate::OctetString) and `[u8; N]` — OCTET STRING
//! * [`Null`](crate::Null) — NULL
//! * [`Oid`](crate::Oid) / [`RelativeOid`](crate::RelativeOid) — OBJECT
//!   IDENTIFIER and RELATIVE-OID
//! * `f32` / `f64` — REAL
//! * [`Enumerated`](crate::Enumerated) and the
//!   [`ber_enumerated!`](crate::ber_enumerated) macro — ENUMERATED
//! * `String` and the restricted string newtypes — the character string
//!   types
//! * the types of [`crate::time`] — the time types
//! * `Vec<T>` — SEQUENCE OF; `HashSet<T>` / `BTreeSet<T>` — SET OF
//! * structs through the [`ber_sequence!`](crate::ber_sequence) macro —
//!   SEQUENCE
//! * [`AnyValue`], [`RawValue`], [`Flag`] — polymorphic and un-decoded
//!   values
//!
//! CHOICE has no built-in support; implement the codec traits manually
//! for types containing CHOICE components.

mod decode;
mod element;
mod encode;
mod real;
mod sequence;
mod strings;
mod time;
mod types;

pub use decode::{from_bytes, from_bytes_with_params, BerDecode, Decoder};
pub use element::Element;
pub use encode::{to_vec, to_vec_with_params, BerEncode, Encoder, ValueSink};
pub use sequence::{FieldOps, SequenceField, SequenceFields};
pub use strings::StringReader;
pub use types::{AnyValue, Flag, RawValue};

// Engine entry points referenced by the generated code of the macros.
#[doc(hidden)]
pub use decode::decode_value;
#[doc(hidden)]
pub use encode::encoded_value_len;
#[doc(hidden)]
pub use sequence::{decode_fields, decode_flattened, encode_fields, encoded_fields_len};

use std::io::Write;

use crate::error::Error;
use crate::tag::Tag;
use crate::tlv::{Header, Length, END_OF_CONTENTS};

/// Builds the structural error reported when a declared enumerated type
/// receives an undeclared value.
#[doc(hidden)]
pub fn invalid_enumerated<T>(tag: Tag) -> Error {
    decode::structural::<T>(tag, "invalid enumerated value")
}

/// Captures the content of a constructed element as bytes, validating the
/// nested syntax. Constructed children are re-encoded with the
/// indefinite-length format so that tolerated irregularities of the input
/// (such as redundant length octets) cannot invalidate the captured
/// encoding.
pub(crate) fn capture(el: &mut Element<'_>) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut enc = crate::tlv::Encoder::new(&mut out);
    capture_into(el, &mut enc)?;
    drop(enc);
    Ok(out)
}

fn capture_into<W: Write>(
    el: &mut Element<'_>,
    enc: &mut crate::tlv::Encoder<W>,
) -> Result<(), Error> {
    while let Some(h) = el.next_child_header()? {
        let mut child = el.child(h);
        if h.constructed {
            enc.write_header(Header::constructed(h.tag, Length::Indefinite))?;
            capture_into(&mut child, enc)?;
            enc.write_header(END_OF_CONTENTS)?;
        } else {
            let bytes = child.read_all()?;
            let mut w = enc.write_header(Header::primitive(h.tag, bytes.len()))?;
            if let Some(w) = w.as_mut() {
                w.write_all(&bytes).map_err(Error::io_write)?;
            }
        }
        child.close()?;
    }
    Ok(())
}

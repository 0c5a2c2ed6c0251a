//! The descriptor-driven SEQUENCE codec.
//!
//! Rust has no runtime reflection, so a struct that maps to an ASN.1
//! SEQUENCE carries a static table describing its fields: the parameter
//! string and a set of function pointers dispatching into the generic
//! encode/decode engines for the field's type. The
//! [`ber_sequence!`](crate::ber_sequence) macro generates these tables
//! along with the codec trait implementations.

use super::element::Element;
use super::encode::ValueSink;
use crate::error::Error;
use crate::params::FieldParams;
use crate::tag::Tag;
use crate::tlv::{Header, Length};

/// The field table of a SEQUENCE-shaped struct.
pub struct SequenceFields<S: 'static> {
    pub fields: &'static [SequenceField<S>],
    /// An extension marker as the last element: unknown trailing data
    /// values are read, validated, and discarded when decoding.
    pub extensible: bool,
}

impl<S> core::fmt::Debug for SequenceFields<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SequenceFields")
            .field("fields", &self.fields)
            .field("extensible", &self.extensible)
            .finish()
    }
}

/// One field of a SEQUENCE-shaped struct.
pub struct SequenceField<S: 'static> {
    /// The unparsed field parameter string (see
    /// [`FieldParams`](crate::FieldParams)).
    pub params: &'static str,
    pub ops: FieldOps<S>,
}

impl<S> core::fmt::Debug for SequenceField<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SequenceField")
            .field("params", &self.params)
            .finish()
    }
}

impl<S> core::fmt::Debug for FieldOps<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FieldOps::Leaf { .. } => f.write_str("Leaf"),
            FieldOps::Flatten { .. } => f.write_str("Flatten"),
        }
    }
}

/// The operations of one field, dispatching into the engines for the
/// field's concrete type.
pub enum FieldOps<S: 'static> {
    /// An ordinary field holding one data value.
    Leaf {
        decode: fn(&mut S, Tag, &mut Element<'_>, &FieldParams) -> Result<(), Error>,
        encode: fn(&S, &mut ValueSink<'_>, &FieldParams) -> Result<(), Error>,
        encoded_len: fn(&S, &FieldParams) -> Result<Option<Length>, Error>,
    },
    /// A struct-typed field whose own fields are inlined into this
    /// sequence.
    Flatten {
        decode: fn(&mut S, &mut Element<'_>, &mut Option<Header>) -> Result<(), Error>,
        encode: fn(&S, &mut ValueSink<'_>) -> Result<(), Error>,
        encoded_len: fn(&S) -> Result<Length, Error>,
    },
}

/// Decodes the children of `el` into the fields of `s`.
///
/// Fields are processed in declaration order. A field whose tag does not
/// match the next data value is skipped if it is `optional`, and the data
/// value is offered to the next field. With an extension marker, any
/// well-formed trailing data values are read and discarded; otherwise
/// trailing data is an error.
pub fn decode_fields<S>(
    s: &mut S,
    table: &SequenceFields<S>,
    el: &mut Element<'_>,
) -> Result<(), Error> {
    let mut pending = el.next_child_header()?;
    decode_flattened(s, table, el, &mut pending)?;
    if pending.is_some() {
        return Err(super::decode::structural::<S>(el.tag(), "too many values"));
    }
    Ok(())
}

/// The reentrant part of [`decode_fields`], also used for flattened inner
/// structs: consumes data values for the fields of `table`, leaving any
/// unclaimed data value in `pending`.
pub fn decode_flattened<S>(
    s: &mut S,
    table: &SequenceFields<S>,
    el: &mut Element<'_>,
    pending: &mut Option<Header>,
) -> Result<(), Error> {
    for field in table.fields {
        let params = FieldParams::parse(field.params);
        if params.ignore {
            continue;
        }
        match &field.ops {
            FieldOps::Flatten { decode, .. } => decode(s, el, pending)?,
            FieldOps::Leaf { decode, .. } => {
                let Some(h) = *pending else {
                    if params.optional {
                        continue;
                    }
                    return Err(super::decode::structural::<S>(el.tag(), "not enough values"));
                };
                let mut child = el.child(h);
                match decode(s, h.tag, &mut child, &params) {
                    Ok(()) => {
                        child.close()?;
                        *pending = el.next_child_header()?;
                    }
                    Err(e) if e.is_tag_mismatch() => {
                        // the data value stays pending; an optional field
                        // is simply absent
                        if !params.optional {
                            return Err(super::decode::structural::<S>(
                                h.tag,
                                "tag does not match",
                            ));
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
    if table.extensible {
        // tolerate trailing data values, validating their syntax
        while let Some(h) = pending.take() {
            let mut child = el.child(h);
            child.close()?;
            *pending = el.next_child_header()?;
        }
    }
    Ok(())
}

/// Sums the encoded lengths of all fields of `s`. The result is
/// [`Length::Indefinite`] if any field encodes with an indefinite length.
pub fn encoded_fields_len<S>(s: &S, table: &SequenceFields<S>) -> Result<Length, Error> {
    let mut total = Length::Definite(0);
    for field in table.fields {
        let params = FieldParams::parse(field.params);
        if params.ignore {
            continue;
        }
        match &field.ops {
            FieldOps::Leaf { encoded_len, .. } => {
                if let Some(l) = encoded_len(s, &params)? {
                    total = total.combined(l);
                }
            }
            FieldOps::Flatten { encoded_len, .. } => {
                total = total.combined(encoded_len(s)?);
            }
        }
    }
    Ok(total)
}

/// Encodes all fields of `s` into the sink of a constructed encoding.
pub fn encode_fields<S>(
    s: &S,
    table: &SequenceFields<S>,
    sink: &mut ValueSink<'_>,
) -> Result<(), Error> {
    for field in table.fields {
        let params = FieldParams::parse(field.params);
        if params.ignore {
            continue;
        }
        match &field.ops {
            FieldOps::Leaf { encode, .. } => encode(s, sink, &params)?,
            FieldOps::Flatten { encode, .. } => encode(s, sink)?,
        }
    }
    Ok(())
}

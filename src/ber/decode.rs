//! The decode side of the BER value codec.

use std::io::Read;

use super::element::Element;
use crate::error::{Error, StructuralError, SyntaxError};
use crate::params::FieldParams;
use crate::tag::Tag;
use crate::tlv::{self, TlvRead};

/// A type that can decode itself from the content octets of a BER data
/// value.
///
/// Implementations decode in place into a default-initialized destination;
/// a destination that is left untouched keeps its zero value, which is how
/// OPTIONAL fields behave on absence.
///
/// The element `el` reads the content octets only, not the tag and length
/// bytes; at the end of the content it reports end of data even if the
/// stream continues. Content left unread is discarded, and for constructed
/// encodings syntactically validated, after the implementation returns.
pub trait BerDecode {
    /// Whether a data value with this tag plausibly decodes into this
    /// type. Consulted to resolve OPTIONAL fields when no tag override is
    /// given.
    fn ber_match(&self, tag: Tag) -> bool;

    /// Decodes the content octets read by `el` into `self`. The tag is the
    /// one actually found in the stream, which may differ from the
    /// intrinsic tag when an implicit override is in use.
    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error>;
}

/// Builds a structural error for destination type `T`.
pub(crate) fn structural<T>(tag: Tag, msg: &'static str) -> Error {
    Error::Structural(StructuralError::new(tag, core::any::type_name::<T>(), msg))
}

/// The central decoding dispatch: applies the field parameters, then hands
/// the element to the destination's [`BerDecode`] implementation.
///
/// Returns the [`Error::TagMismatch`] sentinel if the data value does not
/// belong to this destination; the sequence codec uses it to offer the
/// value to the next OPTIONAL field.
pub fn decode_value<T: BerDecode + Default>(
    dst: &mut T,
    tag: Tag,
    el: &mut Element<'_>,
    params: &FieldParams,
) -> Result<(), Error> {
    if params.nullable && tag == Tag::NULL {
        if el.constructed() || el.len() != Some(0) {
            return Err(el.syntax("invalid NULL value"));
        }
        *dst = T::default();
        return Ok(());
    }
    if let Some(t) = params.tag {
        if tag != t {
            return Err(Error::TagMismatch);
        }
        if params.explicit {
            return decode_explicit(dst, tag, el);
        }
    } else if !dst.ber_match(tag) {
        return Err(Error::TagMismatch);
    }
    dst.ber_decode(tag, el)
}

/// Unwraps one explicit tagging layer: the element must be a constructed
/// value holding exactly one data value, which carries the intrinsic tag.
fn decode_explicit<T: BerDecode + Default>(
    dst: &mut T,
    tag: Tag,
    el: &mut Element<'_>,
) -> Result<(), Error> {
    if el.len() == Some(0) {
        // a zero-length explicit tag carries no inner value; only types
        // accepting empty content (such as Flag) decode successfully
        return dst.ber_decode(tag, el);
    }
    if !el.constructed() {
        return Err(el.syntax("non-constructed encoding for explicit tag"));
    }
    match el.next_child_header()? {
        None => Err(el.syntax("explicit tag has no value")),
        Some(h) => {
            let mut inner = el.child(h);
            dst.ber_decode(h.tag, &mut inner)?;
            inner.close()?;
            if el.next_child_header()?.is_some() {
                return Err(el.syntax("explicit tag has multiple values"));
            }
            Ok(())
        }
    }
}

/// A streaming decoder for BER-encoded ASN.1 values.
///
/// The decoder reads a stream of top-level data values from a reader,
/// buffering at most the bytes of the value currently being decoded.
#[derive(Debug)]
pub struct Decoder<R> {
    tlv: tlv::Decoder<R>,
}

impl<R: Read> Decoder<R> {
    /// Creates a decoder reading from `r`.
    pub fn new(r: R) -> Decoder<R> {
        Decoder {
            tlv: tlv::Decoder::new(r),
        }
    }

    /// Decodes the next top-level data value into a `T`.
    ///
    /// At a clean end of the stream, [`Error::Eof`] is returned.
    pub fn decode<T: BerDecode + Default>(&mut self) -> Result<T, Error> {
        self.decode_with_params("")
    }

    /// Like [`Decoder::decode`] with field parameters applied to the
    /// top-level data value. The `optional` and `-` parameters have no
    /// effect here.
    pub fn decode_with_params<T: BerDecode + Default>(
        &mut self,
        params: &str,
    ) -> Result<T, Error> {
        let fp = FieldParams::parse(params);
        // discard the remainder of a value a previous call failed on, so
        // that decoding resumes at a top-level boundary
        while self.tlv.stack_depth() > 0 {
            self.tlv.skip()?;
        }
        let h = TlvRead::next_header(&mut self.tlv)?;
        let mut el = Element::new(&mut self.tlv, h);
        let mut val = T::default();
        match decode_value(&mut val, h.tag, &mut el, &fp) {
            Ok(()) => {
                el.close()?;
                Ok(val)
            }
            Err(e) if e.is_tag_mismatch() => Err(structural::<T>(h.tag, "tag does not match")),
            Err(e) => Err(e),
        }
    }

    /// Decodes all top-level data values of the stream as if they were the
    /// content of a single constructed value, into a sequence-shaped `T`.
    ///
    /// This blocks until the underlying reader reports end of stream.
    pub fn decode_all<T: BerDecode + Default>(&mut self) -> Result<T, Error> {
        let mut root = Element::stream(&mut self.tlv);
        let mut val = T::default();
        val.ber_decode(Tag::SEQUENCE, &mut root)?;
        root.close()?;
        Ok(val)
    }

    /// Reads the next TLV header and returns a reader for the value's
    /// content, for callers that want to work below the typed layer.
    ///
    /// At a clean end of the stream, [`Error::Eof`] is returned.
    pub fn next_element(&mut self) -> Result<(tlv::Header, Element<'_>), Error> {
        let h = TlvRead::next_header(&mut self.tlv)?;
        Ok((h, Element::new(&mut self.tlv, h)))
    }

    /// The current input byte offset.
    pub fn input_offset(&self) -> u64 {
        self.tlv.input_offset()
    }
}

/// Decodes a single BER data value from a byte slice.
///
/// Trailing bytes after the data value are an error.
pub fn from_bytes<T: BerDecode + Default>(b: &[u8]) -> Result<T, Error> {
    from_bytes_with_params(b, "")
}

/// Like [`from_bytes`] with field parameters applied to the top-level data
/// value.
pub fn from_bytes_with_params<T: BerDecode + Default>(b: &[u8], params: &str) -> Result<T, Error> {
    let mut d = Decoder::new(b);
    let val = d.decode_with_params(params)?;
    match d.tlv.peek_header() {
        Err(Error::Eof) => Ok(val),
        Ok(_) => Err(Error::Syntax(SyntaxError::new(
            Tag::END_OF_CONTENTS,
            d.tlv.input_offset(),
            "trailing data after top-level data value",
        ))),
        Err(e) => Err(e),
    }
}

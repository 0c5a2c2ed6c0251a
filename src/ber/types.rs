//! Codec implementations for the ASN.1 universal types.

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

use super::decode::{decode_value, structural, BerDecode};
use super::element::Element;
use super::encode::{encode_error, encoded_value_len, BerEncode, ValueSink};
use super::strings::StringReader;
use crate::error::Error;
use crate::oid::{Oid, RelativeOid};
use crate::params::FieldParams;
use crate::tag::Tag;
use crate::tlv::{Header, Length};
use crate::types::{
    is_ia5, is_numeric, is_printable, is_visible, BitString, BmpString, Enumerated, Ia5String,
    Null, NumericString, OctetString, PrintableString, UniversalString, VisibleString,
};
use crate::vlq;

//------------ [UNIVERSAL 1] BOOLEAN -----------------------------------------

impl BerEncode for bool {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(Tag::BOOLEAN, 1))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        w.write_byte(if *self { 0xff } else { 0x00 })
    }

    fn ber_is_zero(&self) -> bool {
        !*self
    }
}

impl BerDecode for bool {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::BOOLEAN
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        if el.constructed() || el.len() != Some(1) {
            return Err(el.syntax("invalid boolean"));
        }
        match el.read_byte()? {
            Some(b) => {
                *self = b != 0;
                Ok(())
            }
            None => Err(el.syntax("invalid boolean")),
        }
    }
}

//------------ [UNIVERSAL 2] INTEGER and [UNIVERSAL 10] ENUMERATED -----------

/// The minimal two's-complement content octets of a signed integer.
pub(crate) fn signed_int_content(v: i64) -> ([u8; 8], usize) {
    let bs = v.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bs[start] == 0x00 && bs[start + 1] & 0x80 == 0)
            || (bs[start] == 0xff && bs[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    (bs, start)
}

/// The minimal content octets of an unsigned integer, with a leading zero
/// byte when the top bit is set.
pub(crate) fn unsigned_int_content(v: u64) -> ([u8; 9], usize) {
    let mut bs = [0u8; 9];
    bs[1..].copy_from_slice(&v.to_be_bytes());
    let mut start = 1;
    while start < 8 && bs[start] == 0 && bs[start + 1] & 0x80 == 0 {
        start += 1;
    }
    if bs[start] & 0x80 != 0 {
        start -= 1;
    }
    (bs, start)
}

/// Reads the content of an INTEGER or ENUMERATED into a sign-extended
/// value, enforcing minimal encoding and the destination width in bytes.
fn decode_int<T>(
    el: &mut Element<'_>,
    tag: Tag,
    signed: bool,
    width: usize,
) -> Result<i64, Error> {
    let Some(b0) = el.read_byte()? else {
        return Err(el.syntax("empty integer"));
    };
    if b0 & 0x80 != 0 && !signed {
        return Err(structural::<T>(tag, "negative integer"));
    }
    let mut val = u64::from(b0);
    let mut read = 1;
    let mut width = width;
    while el.len() != Some(0) && read < width {
        let Some(b) = el.read_byte()? else { break };
        read += 1;
        val = val << 8 | u64::from(b);
        if read == 2 {
            if val & 0xff80 == 0 || val & 0xff80 == 0xff80 {
                return Err(el.syntax("integer is not minimally encoded"));
            }
            if val & 0xff80 == 0x0080 && !signed {
                // an unsigned value may carry one leading zero octet
                width += 1;
            }
        }
    }
    if el.len() != Some(0) {
        return Err(structural::<T>(tag, "integer too large"));
    }
    if signed {
        let shift = 64 - read as u32 * 8;
        Ok(((val << shift) as i64) >> shift)
    } else {
        Ok(val as i64)
    }
}

macro_rules! int_codec {
    ($($t:ty => $signed:literal),+ $(,)?) => {$(
        impl BerEncode for $t {
            fn ber_header(&self) -> Result<Header, Error> {
                let len = if $signed {
                    let (_, start) = signed_int_content(*self as i64);
                    8 - start
                } else {
                    let (_, start) = unsigned_int_content(*self as u64);
                    9 - start
                };
                Ok(Header::primitive(Tag::INTEGER, len))
            }

            fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
                if $signed {
                    let (bs, start) = signed_int_content(*self as i64);
                    w.write_all(&bs[start..])
                } else {
                    let (bs, start) = unsigned_int_content(*self as u64);
                    w.write_all(&bs[start..])
                }
            }

            fn ber_is_zero(&self) -> bool {
                *self == 0
            }
        }

        impl BerDecode for $t {
            fn ber_match(&self, tag: Tag) -> bool {
                tag == Tag::INTEGER
            }

            fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
                let v = decode_int::<$t>(el, tag, $signed, core::mem::size_of::<$t>())?;
                *self = v as $t;
                Ok(())
            }
        }
    )+};
}

int_codec!(
    i8 => true,
    i16 => true,
    i32 => true,
    i64 => true,
    isize => true,
    u8 => false,
    u16 => false,
    u32 => false,
    u64 => false,
    usize => false,
);

impl BerEncode for Enumerated {
    fn ber_header(&self) -> Result<Header, Error> {
        let (_, start) = signed_int_content(self.0);
        Ok(Header::primitive(Tag::ENUMERATED, 8 - start))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        let (bs, start) = signed_int_content(self.0);
        w.write_all(&bs[start..])
    }

    fn ber_is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl BerDecode for Enumerated {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::ENUMERATED
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        self.0 = decode_int::<Enumerated>(el, tag, true, 8)?;
        Ok(())
    }
}

//------------ [UNIVERSAL 2] INTEGER, arbitrary precision --------------------

#[cfg(feature = "bigint")]
mod bigint {
    use super::*;
    use num_bigint::{BigInt, Sign};

    /// The content octets of a big integer: sign-prefix byte (if needed)
    /// plus magnitude bytes.
    fn bigint_content(v: &BigInt) -> (Option<u8>, Vec<u8>) {
        match v.sign() {
            // zero is a single zero octet rather than no octets
            Sign::NoSign => (None, vec![0]),
            Sign::Plus => {
                let bs = v.to_bytes_be().1;
                if bs[0] & 0x80 != 0 {
                    (Some(0x00), bs)
                } else {
                    (None, bs)
                }
            }
            Sign::Minus => {
                // two's complement: invert the magnitude of -v - 1
                let mut bs = (-(v.clone() + 1i32)).to_bytes_be().1;
                for b in bs.iter_mut() {
                    *b = !*b;
                }
                if bs.is_empty() || bs[0] & 0x80 == 0 {
                    (Some(0xff), bs)
                } else {
                    (None, bs)
                }
            }
        }
    }

    impl BerEncode for BigInt {
        fn ber_header(&self) -> Result<Header, Error> {
            let (prefix, bs) = bigint_content(self);
            Ok(Header::primitive(
                Tag::INTEGER,
                bs.len() + usize::from(prefix.is_some()),
            ))
        }

        fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
            let (prefix, bs) = bigint_content(self);
            if let Some(b) = prefix {
                w.write_byte(b)?;
            }
            w.write_all(&bs)
        }

        fn ber_is_zero(&self) -> bool {
            self.sign() == Sign::NoSign
        }
    }

    impl BerDecode for BigInt {
        fn ber_match(&self, tag: Tag) -> bool {
            tag == Tag::INTEGER
        }

        fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
            let bs = el.read_all()?;
            match bs.as_slice() {
                [] => return Err(el.syntax("empty integer")),
                [0x00, b1, ..] if b1 & 0x80 == 0 => {
                    return Err(el.syntax("integer is not minimally encoded"))
                }
                [0xff, b1, ..] if b1 & 0x80 != 0 => {
                    return Err(el.syntax("integer is not minimally encoded"))
                }
                _ => {}
            }
            if bs[0] & 0x80 != 0 {
                let inverted: Vec<u8> = bs.iter().map(|b| !b).collect();
                *self = -(BigInt::from_bytes_be(Sign::Plus, &inverted) + 1i32);
            } else {
                *self = BigInt::from_bytes_be(Sign::Plus, &bs);
            }
            Ok(())
        }
    }
}

//------------ [UNIVERSAL 3] BIT STRING --------------------------------------

impl BerEncode for BitString {
    fn ber_header(&self) -> Result<Header, Error> {
        if !self.is_valid() {
            return Err(encode_error::<BitString>("not enough bytes for the bit length"));
        }
        Ok(Header::primitive(Tag::BIT_STRING, (self.bit_length + 7) / 8 + 1))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        let padding = self.padding_bits();
        w.write_byte(padding)?;
        let len = (self.bit_length + 7) / 8;
        if len == 0 {
            return Ok(());
        }
        w.write_all(&self.bytes[..len - 1])?;
        // padding bits are always transmitted as zero
        let mask = !(((1u32 << padding) - 1) as u8);
        w.write_byte(self.bytes[len - 1] & mask)
    }

    fn ber_is_zero(&self) -> bool {
        self.bit_length == 0
    }
}

impl BerDecode for BitString {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::BIT_STRING
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        let mut bytes = Vec::with_capacity(el.len().unwrap_or(0));
        let mut padding = 0u8;
        let mut sr = StringReader::new(tag, el);
        sr.for_each_leaf(&mut |leaf| {
            if padding != 0 {
                return Err(leaf.syntax("non-zero padding bits in non-terminal segment"));
            }
            let Some(p) = leaf.read_byte()? else {
                return Err(leaf.syntax("zero length BIT STRING"));
            };
            padding = p;
            if padding > 7 || (leaf.len() == Some(0) && padding > 0) {
                return Err(leaf.syntax("invalid padding bits in BIT STRING"));
            }
            bytes.append(&mut leaf.read_all()?);
            Ok(())
        })?;
        let bit_length = bytes.len() * 8 - usize::from(padding);
        if let Some(last) = bytes.last_mut() {
            *last &= !(((1u32 << padding) - 1) as u8);
        }
        *self = BitString { bytes, bit_length };
        Ok(())
    }
}

//------------ [UNIVERSAL 4] OCTET STRING ------------------------------------

impl BerEncode for OctetString {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(Tag::OCTET_STRING, self.0.len()))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        w.write_all(&self.0)
    }

    fn ber_is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl BerDecode for OctetString {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::OCTET_STRING
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        self.0 = StringReader::new(tag, el).bytes()?;
        Ok(())
    }
}

impl<const N: usize> BerEncode for [u8; N] {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(Tag::OCTET_STRING, N))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        w.write_all(self)
    }

    fn ber_is_zero(&self) -> bool {
        self.iter().all(|&b| b == 0)
    }
}

impl<const N: usize> BerDecode for [u8; N] {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::OCTET_STRING
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        let bytes = StringReader::new(tag, el).bytes()?;
        if bytes.len() > N {
            return Err(structural::<[u8; N]>(tag, "too many bytes"));
        }
        if bytes.len() < N {
            return Err(structural::<[u8; N]>(tag, "not enough bytes"));
        }
        self.copy_from_slice(&bytes);
        Ok(())
    }
}

//------------ [UNIVERSAL 5] NULL --------------------------------------------

impl BerEncode for Null {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(Tag::NULL, 0))
    }

    fn ber_write_value(&self, _w: &mut ValueSink<'_>) -> Result<(), Error> {
        Ok(())
    }

    fn ber_is_zero(&self) -> bool {
        true
    }
}

impl BerDecode for Null {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::NULL
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        if el.constructed() || el.len() != Some(0) {
            return Err(el.syntax("invalid NULL value"));
        }
        Ok(())
    }
}

//------------ [UNIVERSAL 6] OBJECT IDENTIFIER and [UNIVERSAL 13] RELATIVE-OID ---

/// Decodes base-128 arcs from the content octets in `bs`.
fn decode_arcs(el: &Element<'_>, bs: &[u8]) -> Result<Vec<u64>, Error> {
    let mut arcs = Vec::new();
    let mut rest = bs;
    while !rest.is_empty() {
        let (arc, used) = vlq::decode(rest, 64).map_err(|e| match e {
            vlq::VlqError::NotMinimal => el.syntax("OID arc is not minimally encoded"),
            vlq::VlqError::Overflow => el.syntax("OID arc too large"),
            vlq::VlqError::Truncated => el.syntax("truncated OID arc"),
        })?;
        arcs.push(arc);
        rest = &rest[used..];
    }
    Ok(arcs)
}

fn arcs_encoded_len(arcs: &[u64]) -> usize {
    arcs.iter().map(|&a| vlq::encoded_len(a)).sum()
}

fn write_arcs(w: &mut ValueSink<'_>, arcs: &[u64]) -> Result<(), Error> {
    for &arc in arcs {
        vlq::encode(arc, |b| w.write_byte(b))?;
    }
    Ok(())
}

impl BerEncode for Oid {
    fn ber_header(&self) -> Result<Header, Error> {
        if !self.is_valid() {
            return Err(encode_error::<Oid>("invalid object identifier"));
        }
        let arcs = self.arcs();
        let first = arcs[0] * 40 + arcs[1];
        Ok(Header::primitive(
            Tag::OID,
            vlq::encoded_len(first) + arcs_encoded_len(&arcs[2..]),
        ))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        let arcs = self.arcs();
        vlq::encode(arcs[0] * 40 + arcs[1], |b| w.write_byte(b))?;
        write_arcs(w, &arcs[2..])
    }

    fn ber_is_zero(&self) -> bool {
        self.arcs().is_empty()
    }
}

impl BerDecode for Oid {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::OID
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        if el.constructed() {
            return Err(el.syntax("constructed OBJECT IDENTIFIER"));
        }
        if el.len() == Some(0) {
            return Err(el.syntax("zero length OBJECT IDENTIFIER"));
        }
        let bs = el.read_all()?;
        let raw = decode_arcs(el, &bs)?;
        // the first octets encode 40·arc₀ + arc₁
        let mut arcs = Vec::with_capacity(raw.len() + 1);
        if raw[0] < 80 {
            arcs.push(raw[0] / 40);
            arcs.push(raw[0] % 40);
        } else {
            arcs.push(2);
            arcs.push(raw[0] - 80);
        }
        arcs.extend_from_slice(&raw[1..]);
        *self = Oid::from_arcs(&arcs);
        Ok(())
    }
}

impl BerEncode for RelativeOid {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(
            Tag::RELATIVE_OID,
            arcs_encoded_len(self.arcs()),
        ))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        write_arcs(w, self.arcs())
    }

    fn ber_is_zero(&self) -> bool {
        self.arcs().is_empty()
    }
}

impl BerDecode for RelativeOid {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::RELATIVE_OID
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        if el.constructed() {
            return Err(el.syntax("constructed RELATIVE-OID"));
        }
        let bs = el.read_all()?;
        *self = RelativeOid::from_arcs(&decode_arcs(el, &bs)?);
        Ok(())
    }
}

//------------ [UNIVERSAL 12] UTF8String and the restricted character strings ---

impl BerEncode for String {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(Tag::UTF8_STRING, self.len()))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        w.write_all(self.as_bytes())
    }

    fn ber_is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl BerDecode for String {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::UTF8_STRING
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        *self = StringReader::new(tag, el).string()?;
        Ok(())
    }
}

macro_rules! restricted_string_codec {
    ($($t:ident => ($tag:expr, $pred:expr)),+ $(,)?) => {$(
        impl BerEncode for $t {
            fn ber_header(&self) -> Result<Header, Error> {
                if !self.is_valid() {
                    return Err(encode_error::<$t>("string contains invalid characters"));
                }
                Ok(Header::primitive($tag, self.0.len()))
            }

            fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
                w.write_all(self.0.as_bytes())
            }

            fn ber_is_zero(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl BerDecode for $t {
            fn ber_match(&self, tag: Tag) -> bool {
                tag == $tag
            }

            fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
                let offset = el.offset();
                let bytes = StringReader::new(tag, el).bytes()?;
                let pred: fn(u8) -> bool = $pred;
                if !bytes.iter().all(|&b| pred(b)) {
                    return Err(Error::Syntax(crate::error::SyntaxError::new(
                        tag,
                        offset,
                        "string contains invalid characters",
                    )));
                }
                // the character sets are all ASCII subsets
                self.0 = String::from_utf8_lossy(&bytes).into_owned();
                Ok(())
            }
        }
    )+};
}

restricted_string_codec!(
    NumericString => (Tag::NUMERIC_STRING, is_numeric),
    PrintableString => (Tag::PRINTABLE_STRING, is_printable),
    Ia5String => (Tag::IA5_STRING, is_ia5),
    VisibleString => (Tag::VISIBLE_STRING, is_visible),
);

//------------ [UNIVERSAL 28] UniversalString --------------------------------

impl BerEncode for UniversalString {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(
            Tag::UNIVERSAL_STRING,
            4 * self.0.chars().count(),
        ))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        for c in self.0.chars() {
            w.write_all(&(c as u32).to_be_bytes())?;
        }
        Ok(())
    }

    fn ber_is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl BerDecode for UniversalString {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::UNIVERSAL_STRING
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        let mut out = String::with_capacity(el.len().unwrap_or(0) / 4);
        let mut sr = StringReader::new(tag, el);
        sr.for_each_leaf(&mut |leaf| {
            if leaf.len().unwrap_or(0) % 4 != 0 {
                return Err(leaf.syntax("length of UniversalString is no multiple of 4"));
            }
            let bs = leaf.read_all()?;
            for quad in bs.chunks_exact(4) {
                let x = u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]]);
                match char::from_u32(x) {
                    Some(c) => out.push(c),
                    None => {
                        return Err(leaf.syntax("UniversalString contains invalid characters"))
                    }
                }
            }
            Ok(())
        })?;
        self.0 = out;
        Ok(())
    }
}

//------------ [UNIVERSAL 30] BMPString --------------------------------------

impl BerEncode for BmpString {
    fn ber_header(&self) -> Result<Header, Error> {
        if !self.is_valid() {
            return Err(encode_error::<BmpString>("string contains invalid characters"));
        }
        Ok(Header::primitive(Tag::BMP_STRING, 2 * self.0.chars().count()))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        for c in self.0.chars() {
            w.write_all(&(c as u16).to_be_bytes())?;
        }
        Ok(())
    }

    fn ber_is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl BerDecode for BmpString {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::BMP_STRING
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        let mut out = String::with_capacity(el.len().unwrap_or(0) / 2);
        let mut sr = StringReader::new(tag, el);
        sr.for_each_leaf(&mut |leaf| {
            if leaf.len().unwrap_or(0) % 2 != 0 {
                return Err(leaf.syntax("odd-length BMP string"));
            }
            let bs = leaf.read_all()?;
            for pair in bs.chunks_exact(2) {
                let x = u32::from(u16::from_be_bytes([pair[0], pair[1]]));
                match char::from_u32(x) {
                    Some(c) => out.push(c),
                    None => return Err(leaf.syntax("BMPString contains invalid characters")),
                }
            }
            Ok(())
        })?;
        self.0 = out;
        Ok(())
    }
}

//------------ SEQUENCE OF and SET OF ----------------------------------------

impl<T: BerEncode> BerEncode for Vec<T> {
    fn ber_header(&self) -> Result<Header, Error> {
        let mut total = Length::Definite(0);
        for item in self {
            if let Some(l) = encoded_value_len(item, &FieldParams::NONE)? {
                total = total.combined(l);
            }
        }
        Ok(Header::constructed(Tag::SEQUENCE, total))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        for item in self {
            w.encode_value(item, &FieldParams::NONE)?;
        }
        Ok(())
    }

    fn ber_is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: BerDecode + Default> BerDecode for Vec<T> {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::SEQUENCE || tag == Tag::SET
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        self.clear();
        while let Some(h) = el.next_child_header()? {
            let mut child = el.child(h);
            let mut item = T::default();
            match decode_value(&mut item, h.tag, &mut child, &FieldParams::NONE) {
                Ok(()) => {}
                Err(e) if e.is_tag_mismatch() => {
                    return Err(structural::<Vec<T>>(h.tag, "tag does not match"))
                }
                Err(e) => return Err(e),
            }
            child.close()?;
            self.push(item);
        }
        Ok(())
    }
}

macro_rules! set_codec {
    ($set:ident, $($bound:path),+) => {
        impl<T: BerEncode $(+ $bound)+> BerEncode for $set<T> {
            fn ber_header(&self) -> Result<Header, Error> {
                let mut total = Length::Definite(0);
                for item in self {
                    if let Some(l) = encoded_value_len(item, &FieldParams::NONE)? {
                        total = total.combined(l);
                    }
                }
                Ok(Header::constructed(Tag::SET, total))
            }

            fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
                for item in self {
                    w.encode_value(item, &FieldParams::NONE)?;
                }
                Ok(())
            }

            fn ber_is_zero(&self) -> bool {
                self.is_empty()
            }
        }

        impl<T: BerDecode + Default $(+ $bound)+> BerDecode for $set<T> {
            fn ber_match(&self, tag: Tag) -> bool {
                tag == Tag::SET
            }

            fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
                self.clear();
                while let Some(h) = el.next_child_header()? {
                    let mut child = el.child(h);
                    let mut item = T::default();
                    match decode_value(&mut item, h.tag, &mut child, &FieldParams::NONE) {
                        Ok(()) => {}
                        Err(e) if e.is_tag_mismatch() => {
                            return Err(structural::<$set<T>>(h.tag, "tag does not match"))
                        }
                        Err(e) => return Err(e),
                    }
                    child.close()?;
                    self.insert(item);
                }
                Ok(())
            }
        }
    };
}

set_codec!(HashSet, Eq, Hash);
set_codec!(BTreeSet, Ord);

//------------ Option --------------------------------------------------------

impl<T: BerEncode> BerEncode for Option<T> {
    fn ber_header(&self) -> Result<Header, Error> {
        match self {
            Some(v) => v.ber_header(),
            None => Err(Error::UnsupportedType(core::any::type_name::<Option<T>>())),
        }
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        match self {
            Some(v) => v.ber_write_value(w),
            None => Err(Error::UnsupportedType(core::any::type_name::<Option<T>>())),
        }
    }

    fn ber_is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<T: BerDecode + Default> BerDecode for Option<T> {
    fn ber_match(&self, tag: Tag) -> bool {
        match self {
            Some(v) => v.ber_match(tag),
            None => T::default().ber_match(tag),
        }
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        let mut v = self.take().unwrap_or_default();
        v.ber_decode(tag, el)?;
        *self = Some(v);
        Ok(())
    }
}

//------------ Flag, RawValue and AnyValue -----------------------------------

/// A decode-only type that accepts any data value and records its
/// presence. Typically used on optional fields, and the one type that
/// tolerates an empty explicit tag. A `Flag` cannot be encoded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flag(pub bool);

impl BerDecode for Flag {
    fn ber_match(&self, _tag: Tag) -> bool {
        true
    }

    fn ber_decode(&mut self, _tag: Tag, _el: &mut Element<'_>) -> Result<(), Error> {
        self.0 = true;
        Ok(())
    }
}

impl BerEncode for Flag {
    fn ber_header(&self) -> Result<Header, Error> {
        Err(encode_error::<Flag>("a Flag cannot be encoded"))
    }

    fn ber_write_value(&self, _w: &mut ValueSink<'_>) -> Result<(), Error> {
        Err(encode_error::<Flag>("a Flag cannot be encoded"))
    }

    fn ber_is_zero(&self) -> bool {
        !self.0
    }
}

/// An un-decoded data value.
///
/// When decoding, the nested syntax of a constructed value is validated
/// and its content is captured re-encoded in canonical form (nested
/// values keep their structure; constructed children use the
/// indefinite-length encoding). When encoding, the bytes are replayed
/// through the encoder, which validates their TLV structure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawValue {
    pub tag: Tag,
    pub constructed: bool,
    pub bytes: Vec<u8>,
}

impl BerEncode for RawValue {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header {
            tag: self.tag,
            constructed: self.constructed,
            length: Length::Definite(self.bytes.len()),
        })
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        if self.constructed {
            w.write_raw_values(&self.bytes)
        } else {
            w.write_all(&self.bytes)
        }
    }

    fn ber_is_zero(&self) -> bool {
        self.tag == Tag::END_OF_CONTENTS && self.bytes.is_empty()
    }
}

impl BerDecode for RawValue {
    fn ber_match(&self, tag: Tag) -> bool {
        // a pre-set tag restricts what the raw value accepts
        self.tag == Tag::END_OF_CONTENTS || self.tag == tag
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        self.tag = tag;
        self.constructed = el.constructed();
        if !el.constructed() {
            self.bytes = el.read_all()?;
            return Ok(());
        }
        self.bytes = super::capture(el)?;
        Ok(())
    }
}

/// A polymorphic decoding target mapping known universal tags to their
/// natural Rust values. Unrecognized tags, including SEQUENCE and SET,
/// decode as [`RawValue`].
#[derive(Debug, Default, Clone, PartialEq)]
pub enum AnyValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    BitString(BitString),
    OctetString(OctetString),
    Oid(Oid),
    Real(f64),
    Enumerated(Enumerated),
    Utf8String(String),
    RelativeOid(RelativeOid),
    Time(crate::time::Time),
    NumericString(NumericString),
    PrintableString(PrintableString),
    Ia5String(Ia5String),
    UtcTime(crate::time::UtcTime),
    GeneralizedTime(crate::time::GeneralizedTime),
    VisibleString(VisibleString),
    UniversalString(UniversalString),
    BmpString(BmpString),
    Date(crate::time::Date),
    TimeOfDay(crate::time::TimeOfDay),
    DateTime(crate::time::DateTime),
    Duration(crate::time::Duration),
    Raw(RawValue),
}

macro_rules! decode_any {
    ($tag:expr, $el:expr, $t:ty, $variant:expr) => {{
        let mut v = <$t>::default();
        v.ber_decode($tag, $el)?;
        $variant(v)
    }};
}

impl BerDecode for AnyValue {
    fn ber_match(&self, _tag: Tag) -> bool {
        true
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        *self = match tag {
            Tag::BOOLEAN => decode_any!(tag, el, bool, AnyValue::Bool),
            Tag::INTEGER => decode_any!(tag, el, i64, AnyValue::Integer),
            Tag::BIT_STRING => decode_any!(tag, el, BitString, AnyValue::BitString),
            Tag::OCTET_STRING => decode_any!(tag, el, OctetString, AnyValue::OctetString),
            Tag::NULL => {
                let mut v = Null;
                v.ber_decode(tag, el)?;
                AnyValue::Null
            }
            Tag::OID => decode_any!(tag, el, Oid, AnyValue::Oid),
            Tag::REAL => decode_any!(tag, el, f64, AnyValue::Real),
            Tag::ENUMERATED => decode_any!(tag, el, Enumerated, AnyValue::Enumerated),
            Tag::UTF8_STRING => decode_any!(tag, el, String, AnyValue::Utf8String),
            Tag::RELATIVE_OID => decode_any!(tag, el, RelativeOid, AnyValue::RelativeOid),
            Tag::TIME => decode_any!(tag, el, crate::time::Time, AnyValue::Time),
            Tag::NUMERIC_STRING => decode_any!(tag, el, NumericString, AnyValue::NumericString),
            Tag::PRINTABLE_STRING => {
                decode_any!(tag, el, PrintableString, AnyValue::PrintableString)
            }
            Tag::IA5_STRING => decode_any!(tag, el, Ia5String, AnyValue::Ia5String),
            Tag::UTC_TIME => decode_any!(tag, el, crate::time::UtcTime, AnyValue::UtcTime),
            Tag::GENERALIZED_TIME => {
                decode_any!(tag, el, crate::time::GeneralizedTime, AnyValue::GeneralizedTime)
            }
            Tag::VISIBLE_STRING => decode_any!(tag, el, VisibleString, AnyValue::VisibleString),
            Tag::UNIVERSAL_STRING => {
                decode_any!(tag, el, UniversalString, AnyValue::UniversalString)
            }
            Tag::BMP_STRING => decode_any!(tag, el, BmpString, AnyValue::BmpString),
            Tag::DATE => decode_any!(tag, el, crate::time::Date, AnyValue::Date),
            Tag::TIME_OF_DAY => decode_any!(tag, el, crate::time::TimeOfDay, AnyValue::TimeOfDay),
            Tag::DATE_TIME => decode_any!(tag, el, crate::time::DateTime, AnyValue::DateTime),
            Tag::DURATION => decode_any!(tag, el, crate::time::Duration, AnyValue::Duration),
            _ => decode_any!(tag, el, RawValue, AnyValue::Raw),
        };
        Ok(())
    }
}

impl BerEncode for AnyValue {
    fn ber_header(&self) -> Result<Header, Error> {
        match self {
            AnyValue::Null => Null.ber_header(),
            AnyValue::Bool(v) => v.ber_header(),
            AnyValue::Integer(v) => v.ber_header(),
            AnyValue::BitString(v) => v.ber_header(),
            AnyValue::OctetString(v) => v.ber_header(),
            AnyValue::Oid(v) => v.ber_header(),
            AnyValue::Real(v) => v.ber_header(),
            AnyValue::Enumerated(v) => v.ber_header(),
            AnyValue::Utf8String(v) => v.ber_header(),
            AnyValue::RelativeOid(v) => v.ber_header(),
            AnyValue::Time(v) => v.ber_header(),
            AnyValue::NumericString(v) => v.ber_header(),
            AnyValue::PrintableString(v) => v.ber_header(),
            AnyValue::Ia5String(v) => v.ber_header(),
            AnyValue::UtcTime(v) => v.ber_header(),
            AnyValue::GeneralizedTime(v) => v.ber_header(),
            AnyValue::VisibleString(v) => v.ber_header(),
            AnyValue::UniversalString(v) => v.ber_header(),
            AnyValue::BmpString(v) => v.ber_header(),
            AnyValue::Date(v) => v.ber_header(),
            AnyValue::TimeOfDay(v) => v.ber_header(),
            AnyValue::DateTime(v) => v.ber_header(),
            AnyValue::Duration(v) => v.ber_header(),
            AnyValue::Raw(v) => v.ber_header(),
        }
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        match self {
            AnyValue::Null => Null.ber_write_value(w),
            AnyValue::Bool(v) => v.ber_write_value(w),
            AnyValue::Integer(v) => v.ber_write_value(w),
            AnyValue::BitString(v) => v.ber_write_value(w),
            AnyValue::OctetString(v) => v.ber_write_value(w),
            AnyValue::Oid(v) => v.ber_write_value(w),
            AnyValue::Real(v) => v.ber_write_value(w),
            AnyValue::Enumerated(v) => v.ber_write_value(w),
            AnyValue::Utf8String(v) => v.ber_write_value(w),
            AnyValue::RelativeOid(v) => v.ber_write_value(w),
            AnyValue::Time(v) => v.ber_write_value(w),
            AnyValue::NumericString(v) => v.ber_write_value(w),
            AnyValue::PrintableString(v) => v.ber_write_value(w),
            AnyValue::Ia5String(v) => v.ber_write_value(w),
            AnyValue::UtcTime(v) => v.ber_write_value(w),
            AnyValue::GeneralizedTime(v) => v.ber_write_value(w),
            AnyValue::VisibleString(v) => v.ber_write_value(w),
            AnyValue::UniversalString(v) => v.ber_write_value(w),
            AnyValue::BmpString(v) => v.ber_write_value(w),
            AnyValue::Date(v) => v.ber_write_value(w),
            AnyValue::TimeOfDay(v) => v.ber_write_value(w),
            AnyValue::DateTime(v) => v.ber_write_value(w),
            AnyValue::Duration(v) => v.ber_write_value(w),
            AnyValue::Raw(v) => v.ber_write_value(w),
        }
    }

    fn ber_is_zero(&self) -> bool {
        *self == AnyValue::Null
    }
}

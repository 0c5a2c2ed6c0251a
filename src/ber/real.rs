//! The ASN.1 REAL codec for `f32` and `f64`.
//!
//! REAL values use one of three disjoint content encodings, keyed on the
//! first content octet (X.690 8.5): special values, the binary form, and
//! the decimal forms NR1 through NR3 of ISO 6093. The encoder emits the
//! base-2 binary form only; the decoder accepts bases 2, 8 and 16 as well
//! as the decimal forms.

use super::decode::BerDecode;
use super::element::Element;
use super::encode::{BerEncode, ValueSink};
use crate::error::Error;
use crate::tag::Tag;
use crate::tlv::Header;

const SPECIAL_PLUS_INF: u8 = 0b0100_0000;
const SPECIAL_MINUS_INF: u8 = 0b0100_0001;
const SPECIAL_NAN: u8 = 0b0100_0010;
const SPECIAL_MINUS_ZERO: u8 = 0b0100_0011;

/// The binary-form content octets of a non-zero, finite double: the
/// leading information octet, the exponent octets, and the mantissa
/// octets.
fn binary_content(v: f64) -> (u8, [u8; 2], usize, [u8; 8], usize) {
    let bits = v.to_bits();
    // normalize to an odd mantissa so the encoding is minimal
    let mut m = (1u64 << 52) | (bits & !(0xfffu64 << 52));
    let mut e = -52 + ((bits >> 52) & 0x7ff) as i64 - 1023;
    let shift = m.trailing_zeros();
    m >>= shift;
    e += i64::from(shift);

    // an IEEE 754 double exponent needs one or two octets, so the octet
    // count always fits the two low bits of the information octet
    let ebits = 64 - e.max(-e - 1).leading_zeros() as usize + 1;
    let el = (ebits + 7) / 8;
    let ml = (64 - m.leading_zeros() as usize + 7) / 8;

    let s = (bits >> 63) as u8;
    let info = 0b1000_0000 | (s << 6) | (el as u8 - 1);
    let mut eb = [0u8; 2];
    for (i, b) in eb.iter_mut().take(el).enumerate() {
        *b = (e >> (8 * (el - 1 - i))) as u8;
    }
    let mut mb = [0u8; 8];
    for (i, b) in mb.iter_mut().take(ml).enumerate() {
        *b = (m >> (8 * (ml - 1 - i))) as u8;
    }
    (info, eb, el, mb, ml)
}

impl BerEncode for f64 {
    fn ber_header(&self) -> Result<Header, Error> {
        let len = if *self == 0.0 && !self.is_sign_negative() {
            0
        } else if *self == 0.0 || self.is_infinite() || self.is_nan() {
            1
        } else {
            let (_, _, el, _, ml) = binary_content(*self);
            1 + el + ml
        };
        Ok(Header::primitive(Tag::REAL, len))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        if *self == 0.0 {
            if self.is_sign_negative() {
                return w.write_byte(SPECIAL_MINUS_ZERO);
            }
            // positive zero has no content octets
            return Ok(());
        }
        if self.is_infinite() {
            return w.write_byte(if *self > 0.0 {
                SPECIAL_PLUS_INF
            } else {
                SPECIAL_MINUS_INF
            });
        }
        if self.is_nan() {
            return w.write_byte(SPECIAL_NAN);
        }
        let (info, eb, el, mb, ml) = binary_content(*self);
        w.write_byte(info)?;
        w.write_all(&eb[..el])?;
        w.write_all(&mb[..ml])
    }

    fn ber_is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl BerDecode for f64 {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::REAL
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        *self = decode_real(el)?;
        Ok(())
    }
}

impl BerEncode for f32 {
    fn ber_header(&self) -> Result<Header, Error> {
        f64::from(*self).ber_header()
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        f64::from(*self).ber_write_value(w)
    }

    fn ber_is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl BerDecode for f32 {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::REAL
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        let v = decode_real(el)?;
        if v.is_finite() && v.abs() > f64::from(f32::MAX) {
            return Err(el.syntax("value overflows an f32"));
        }
        *self = v as f32;
        Ok(())
    }
}

fn need_byte(el: &mut Element<'_>) -> Result<u8, Error> {
    match el.read_byte()? {
        Some(b) => Ok(b),
        None => Err(el.syntax("unexpected end of value")),
    }
}

fn decode_real(el: &mut Element<'_>) -> Result<f64, Error> {
    if el.constructed() {
        return Err(el.syntax("constructed REAL"));
    }
    if el.len() == Some(0) {
        return Ok(0.0);
    }
    let b0 = match el.read_byte()? {
        Some(b) => b,
        None => return Ok(0.0),
    };
    if b0 & 0xc0 == 0x40 {
        // special value
        let v = match b0 {
            SPECIAL_PLUS_INF => f64::INFINITY,
            SPECIAL_MINUS_INF => f64::NEG_INFINITY,
            SPECIAL_NAN => f64::NAN,
            SPECIAL_MINUS_ZERO => -0.0,
            _ => return Err(el.syntax("invalid special REAL value")),
        };
        return Ok(v);
    }
    if b0 & 0x80 != 0 {
        decode_binary(el, b0)
    } else {
        decode_decimal(el, b0)
    }
}

/// Parses the sign and the scaled exponent of the binary form. The raw
/// exponent is adjusted for the base (2, 8, or 16) and the binary scaling
/// factor F (X.690 8.5.7).
fn parse_exponent(el: &mut Element<'_>, b0: u8) -> Result<(u8, i64), Error> {
    let s = (b0 & 0x40) >> 6;
    let base = (b0 & 0x30) >> 4;
    if base > 2 {
        return Err(el.syntax("invalid REAL base"));
    }
    let f = (b0 & 0x0c) >> 2;
    let mut es = usize::from(1 + (b0 & 0x03));
    if es >= 4 {
        let b = need_byte(el)?;
        if b == 0 {
            return Err(el.syntax("invalid exponent size"));
        }
        es = 3 + usize::from(b);
    }
    let mut e: i64 = 0;
    for i in 0..es {
        if i == 8 {
            return Err(el.syntax("exponent too large"));
        }
        let b = need_byte(el)?;
        e = e << 8 | i64::from(b);
        if i == 1 && (e & 0xff80 == 0xff80 || e & 0xff80 == 0) {
            return Err(el.syntax("non-minimal exponent"));
        }
    }
    // sign extend
    let shift = 64 - (es.min(8) as u32) * 8;
    e = (e << shift) >> shift;

    // f64 is base 2: scale the exponent for bases 8 and 16 and apply the
    // scaling factor
    e = (e << base) + e * i64::from(base & 0b01);
    e += i64::from(f);
    Ok((s, e))
}

fn decode_binary(el: &mut Element<'_>, b0: u8) -> Result<f64, Error> {
    let (s, mut e) = parse_exponent(el, b0)?;

    let mut m: u64 = 0;
    while let Some(b) = el.read_byte()? {
        if m & (0xff << 56) != 0 {
            if m & 0xff == 0 && e < i64::MAX - 8 {
                m >>= 8;
                e += 8;
            } else {
                return Err(el.syntax("mantissa too large"));
            }
        }
        m = m << 8 | u64::from(b);
    }
    if m == 0 {
        return Err(el.syntax("zero mantissa"));
    }

    // normalize the mantissa to 53 bits
    let zeros = m.leading_zeros() as i64;
    if zeros >= 11 {
        m <<= zeros - 11;
    } else if i64::from(m.trailing_zeros()) >= 11 - zeros {
        m >>= 11 - zeros;
    } else {
        return Err(el.syntax("not enough precision"));
    }
    e += 11 - zeros;

    e += 52;
    if !(-1022..=1023).contains(&e) {
        return Err(el.syntax("not enough precision"));
    }
    e += 1023;
    Ok(f64::from_bits(
        u64::from(s) << 63 | (e as u64) << 52 | (m & !(1 << 52)),
    ))
}

fn decode_decimal(el: &mut Element<'_>, b0: u8) -> Result<f64, Error> {
    let nr = b0 & 0x3f;
    if nr == 0 || nr > 3 {
        return Err(el.syntax("invalid decimal number representation"));
    }
    let bytes = el.read_all()?;
    let s = match core::str::from_utf8(&bytes) {
        Ok(s) => s,
        Err(_) => return Err(el.syntax("invalid decimal number")),
    };
    let s = s.trim_start_matches(' ').replacen(',', ".", 1);
    if !validate_decimal(&s, nr) {
        return Err(el.syntax("invalid decimal number"));
    }
    s.parse::<f64>()
        .map_err(|_| el.syntax("invalid decimal number"))
}

/// Validates `s` against the ISO 6093 number representation `nr` (1, 2 or
/// 3). Notably, a minus-signed zero mantissa is invalid, and an NR3 zero
/// exponent requires an explicit plus sign.
fn validate_decimal(s: &str, nr: u8) -> bool {
    let b = s.as_bytes();
    let mut i = 0;
    let neg = b.first() == Some(&b'-');
    if matches!(b.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let start = i;
    let mut zero = true;
    while i < b.len() && b[i].is_ascii_digit() {
        if b[i] != b'0' {
            zero = false;
        }
        i += 1;
    }
    if i == start {
        return false;
    }
    if nr == 1 || i == b.len() {
        return i == b.len() && !(neg && zero);
    }
    if b[i] == b'.' {
        i += 1;
        while i < b.len() && b[i].is_ascii_digit() {
            if b[i] != b'0' {
                zero = false;
            }
            i += 1;
        }
    }
    if nr == 2 || i == b.len() {
        return i == b.len() && !(neg && zero);
    }
    if b[i] != b'e' && b[i] != b'E' {
        return false;
    }
    i += 1;
    let plus = b.get(i) == Some(&b'+');
    if matches!(b.get(i), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let estart = i;
    let mut ezero = true;
    while i < b.len() && b[i].is_ascii_digit() {
        if b[i] != b'0' {
            ezero = false;
        }
        i += 1;
    }
    if i == estart || i != b.len() {
        return false;
    }
    if ezero && !plus {
        return false;
    }
    !(neg && zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::{from_bytes, to_vec};

    #[test]
    fn encode_special_values() {
        assert_eq!(to_vec(&0.0f64).unwrap(), [0x09, 0x00]);
        assert_eq!(to_vec(&(-0.0f64)).unwrap(), [0x09, 0x01, 0x43]);
        assert_eq!(to_vec(&f64::INFINITY).unwrap(), [0x09, 0x01, 0x40]);
        assert_eq!(to_vec(&f64::NEG_INFINITY).unwrap(), [0x09, 0x01, 0x41]);
        assert_eq!(to_vec(&f64::NAN).unwrap(), [0x09, 0x01, 0x42]);
    }

    #[test]
    fn encode_binary_form() {
        // 10.0 = 5 · 2¹
        assert_eq!(to_vec(&10.0f64).unwrap(), [0x09, 0x03, 0x80, 0x01, 0x05]);
        // 0.15625 = 5 · 2⁻⁵
        assert_eq!(to_vec(&0.15625f64).unwrap(), [0x09, 0x03, 0x80, 0xfb, 0x05]);
        assert_eq!(to_vec(&-10.0f64).unwrap(), [0x09, 0x03, 0xc0, 0x01, 0x05]);
    }

    #[test]
    fn binary_round_trip() {
        for v in [
            1.0f64,
            -1.0,
            10.0,
            0.1,
            core::f64::consts::PI,
            f64::MAX,
            f64::MIN_POSITIVE,
            1.5e-300,
        ] {
            let bytes = to_vec(&v).unwrap();
            let back: f64 = from_bytes(&bytes).unwrap();
            assert_eq!(back, v, "round trip of {v}");
        }
    }

    #[test]
    fn special_values_round_trip() {
        let nan: f64 = from_bytes(&[0x09, 0x01, 0x42]).unwrap();
        assert!(nan.is_nan());
        let neg_zero: f64 = from_bytes(&[0x09, 0x01, 0x43]).unwrap();
        assert_eq!(neg_zero, 0.0);
        assert!(neg_zero.is_sign_negative());
        let zero: f64 = from_bytes(&[0x09, 0x00]).unwrap();
        assert!(!zero.is_sign_negative());
    }

    #[test]
    fn decodes_base_8_and_16() {
        // 8 = 1 · 8¹
        let v: f64 = from_bytes(&[0x09, 0x03, 0x90, 0x01, 0x01]).unwrap();
        assert_eq!(v, 8.0);
        // 256 = 1 · 16²
        let v: f64 = from_bytes(&[0x09, 0x03, 0xa0, 0x02, 0x01]).unwrap();
        assert_eq!(v, 256.0);
    }

    #[test]
    fn rejects_invalid_binary_forms() {
        // zero mantissa
        assert!(from_bytes::<f64>(&[0x09, 0x02, 0x80, 0x01]).is_err());
        // base bits 0b11
        assert!(from_bytes::<f64>(&[0x09, 0x03, 0xb0, 0x01, 0x05]).is_err());
        // invalid special value
        assert!(from_bytes::<f64>(&[0x09, 0x01, 0x44]).is_err());
    }

    #[test]
    fn decodes_decimal_forms() {
        // NR1 "15"
        let v: f64 = from_bytes(&[0x09, 0x03, 0x01, 0x31, 0x35]).unwrap();
        assert_eq!(v, 15.0);
        // NR2 "3,14"
        let v: f64 = from_bytes(&[0x09, 0x05, 0x02, 0x33, 0x2c, 0x31, 0x34]).unwrap();
        assert_eq!(v, 3.14);
        // NR3 "15E-1"
        let v: f64 = from_bytes(&[0x09, 0x06, 0x03, 0x31, 0x35, 0x45, 0x2d, 0x31]).unwrap();
        assert_eq!(v, 1.5);
    }

    #[test]
    fn rejects_invalid_decimal_forms() {
        // NR3 zero exponent without a plus sign: "1E0"
        assert!(from_bytes::<f64>(&[0x09, 0x04, 0x03, 0x31, 0x45, 0x30]).is_err());
        // minus zero mantissa: "-0"
        assert!(from_bytes::<f64>(&[0x09, 0x03, 0x01, 0x2d, 0x30]).is_err());
        // NR1 with a fraction
        assert!(from_bytes::<f64>(&[0x09, 0x04, 0x01, 0x31, 0x2e, 0x35]).is_err());
    }

    #[test]
    fn f32_overflow_is_rejected() {
        let bytes = to_vec(&f64::MAX).unwrap();
        assert!(from_bytes::<f32>(&bytes).is_err());
        let bytes = to_vec(&1.5f64).unwrap();
        assert_eq!(from_bytes::<f32>(&bytes).unwrap(), 1.5f32);
    }
}

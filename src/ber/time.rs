//! Codecs for the ASN.1 time types.
//!
//! All time types are encoded as ASCII strings (X.680 section 38, 46 and
//! 47). Decoding parses the formats with nom combinators and validates
//! calendar plausibility by constructing chrono values; a date like
//! February 30 fails the construction and is rejected.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use nom::branch::alt;
use nom::bytes::complete::{take, take_while1};
use nom::character::complete::{char, one_of};
use nom::combinator::{eof, map, map_res, opt};
use nom::sequence::{preceded, tuple};
use nom::IResult;

use super::decode::BerDecode;
use super::element::Element;
use super::encode::{encode_error, BerEncode, ValueSink};
use super::strings::StringReader;
use crate::error::Error;
use crate::tag::Tag;
use crate::time::{Date, DateTime, Duration, GeneralizedTime, Time, TimeOfDay, UtcTime};
use crate::tlv::Header;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Parses exactly `n` ASCII digits into a number.
fn digits_to_u32(b: &[u8]) -> Result<u32, ()> {
    let mut v: u32 = 0;
    for &c in b {
        if !c.is_ascii_digit() {
            return Err(());
        }
        v = v * 10 + u32::from(c - b'0');
    }
    Ok(v)
}

fn num(n: usize) -> impl FnMut(&[u8]) -> IResult<&[u8], u32> {
    move |input: &[u8]| map_res(take(n), digits_to_u32)(input)
}

fn make_offset(sign: char, hours: u32, minutes: u32) -> Result<FixedOffset, ()> {
    let secs = (hours * 3600 + minutes * 60) as i32;
    let offset = if sign == '-' {
        FixedOffset::west_opt(secs)
    } else {
        FixedOffset::east_opt(secs)
    };
    offset.ok_or(())
}

/// `Z` or `±HHMM`.
fn numeric_offset(i: &[u8]) -> IResult<&[u8], FixedOffset> {
    alt((
        map(char('Z'), |_| Utc.fix()),
        map_res(tuple((one_of("+-"), num(2), num(2))), |(s, h, m)| {
            make_offset(s, h, m)
        }),
    ))(i)
}

/// Fractional digits after `.` or `,`.
fn fraction(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(one_of(".,"), take_while1(|c: u8| c.is_ascii_digit()))(i)
}

/// Accumulates fractional digits of the given unit into nanoseconds.
/// Precision below one nanosecond is discarded.
fn fraction_nanos(digits: &[u8], unit_nanos: i64) -> i64 {
    let mut unit = unit_nanos;
    let mut nanos = 0;
    for &d in digits {
        unit /= 10;
        nanos += i64::from(d - b'0') * unit;
    }
    nanos
}

fn hms_nanos(h: u32, mi: u32, s: u32) -> Result<i64, ()> {
    if h > 23 || mi > 59 || s > 59 {
        return Err(());
    }
    Ok((i64::from(h) * 3600 + i64::from(mi) * 60 + i64::from(s)) * NANOS_PER_SEC)
}

fn at_nanos_of_day(date: NaiveDate, nanos: i64) -> Result<NaiveDateTime, ()> {
    date.and_hms_opt(0, 0, 0)
        .ok_or(())?
        .checked_add_signed(chrono::Duration::nanoseconds(nanos))
        .ok_or(())
}

//------------ [UNIVERSAL 23] UTCTime ----------------------------------------

fn parse_utc_time(i: &[u8]) -> IResult<&[u8], UtcTime> {
    map_res(
        tuple((
            num(2),
            num(2),
            num(2),
            num(2),
            num(2),
            opt(num(2)),
            numeric_offset,
            eof,
        )),
        |(yy, mo, d, h, mi, sec, offset, _)| {
            // two-digit years 00-49 map to 20xx, 50-99 to 19xx
            let year = if yy <= 49 { 2000 + yy } else { 1900 + yy };
            let date = NaiveDate::from_ymd_opt(year as i32, mo, d).ok_or(())?;
            let time = NaiveTime::from_hms_opt(h, mi, sec.unwrap_or(0)).ok_or(())?;
            Ok::<_, ()>(UtcTime::new(date.and_time(time), offset))
        },
    )(i)
}

impl BerEncode for UtcTime {
    fn ber_header(&self) -> Result<Header, Error> {
        if !self.is_valid() {
            return Err(encode_error::<UtcTime>("cannot represent time as UTCTime"));
        }
        Ok(Header::primitive(Tag::UTC_TIME, self.to_string().len()))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        w.write_all(self.to_string().as_bytes())
    }

    fn ber_is_zero(&self) -> bool {
        *self == UtcTime::default()
    }
}

impl BerDecode for UtcTime {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::UTC_TIME
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        let err = el.syntax("invalid UTCTime");
        let bytes = StringReader::new(tag, el).bytes()?;
        match parse_utc_time(&bytes) {
            Ok((_, t)) => {
                *self = t;
                Ok(())
            }
            Err(_) => Err(err),
        }
    }
}

//------------ [UNIVERSAL 24] GeneralizedTime --------------------------------

fn parse_generalized_time(i: &[u8]) -> IResult<&[u8], GeneralizedTime> {
    map_res(
        tuple((
            num(4),
            num(2),
            num(2),
            num(2),
            opt(tuple((num(2), opt(num(2))))),
            opt(fraction),
            opt(numeric_offset),
            eof,
        )),
        |(y, mo, d, h, min_sec, frac, offset, _)| {
            let date = NaiveDate::from_ymd_opt(y as i32, mo, d).ok_or(())?;
            let (mi, sec) = match min_sec {
                Some((mi, sec)) => (mi, sec),
                None => (0, None),
            };
            // the fraction applies to the smallest unit actually present
            let unit = match min_sec {
                None => 3600 * NANOS_PER_SEC,
                Some((_, None)) => 60 * NANOS_PER_SEC,
                Some((_, Some(_))) => NANOS_PER_SEC,
            };
            let mut nanos = hms_nanos(h, mi, sec.unwrap_or(0))?;
            if let Some(digits) = frac {
                nanos += fraction_nanos(digits, unit);
            }
            Ok::<_, ()>(GeneralizedTime::new(at_nanos_of_day(date, nanos)?, offset))
        },
    )(i)
}

impl BerEncode for GeneralizedTime {
    fn ber_header(&self) -> Result<Header, Error> {
        if !self.is_valid() {
            return Err(encode_error::<GeneralizedTime>(
                "cannot represent time as GeneralizedTime",
            ));
        }
        Ok(Header::primitive(
            Tag::GENERALIZED_TIME,
            self.to_string().len(),
        ))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        w.write_all(self.to_string().as_bytes())
    }

    fn ber_is_zero(&self) -> bool {
        *self == GeneralizedTime::default()
    }
}

impl BerDecode for GeneralizedTime {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::GENERALIZED_TIME
    }

    fn ber_decode(&mut self, tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        let err = el.syntax("invalid GeneralizedTime");
        let bytes = StringReader::new(tag, el).bytes()?;
        match parse_generalized_time(&bytes) {
            Ok((_, t)) => {
                *self = t;
                Ok(())
            }
            Err(_) => Err(err),
        }
    }
}

//------------ [UNIVERSAL 14] TIME -------------------------------------------

/// The date part of a TIME value: calendar or ordinal, basic or extended.
/// Returns the date and whether the extended format was used.
fn parse_iso_date(b: &[u8]) -> Result<(NaiveDate, bool), ()> {
    fn n(b: &[u8]) -> Result<u32, ()> {
        let mut v = 0;
        for &c in b {
            if !c.is_ascii_digit() {
                return Err(());
            }
            v = v * 10 + u32::from(c - b'0');
        }
        Ok(v)
    }
    match b.len() {
        7 => {
            // YYYYDDD
            let date = NaiveDate::from_yo_opt(n(&b[..4])? as i32, n(&b[4..])?).ok_or(())?;
            Ok((date, false))
        }
        8 if b[4] == b'-' => {
            // YYYY-DDD
            let date = NaiveDate::from_yo_opt(n(&b[..4])? as i32, n(&b[5..])?).ok_or(())?;
            Ok((date, true))
        }
        8 => {
            let date = NaiveDate::from_ymd_opt(n(&b[..4])? as i32, n(&b[4..6])?, n(&b[6..])?)
                .ok_or(())?;
            Ok((date, false))
        }
        10 => {
            if b[4] != b'-' || b[7] != b'-' {
                return Err(());
            }
            let date = NaiveDate::from_ymd_opt(n(&b[..4])? as i32, n(&b[5..7])?, n(&b[8..])?)
                .ok_or(())?;
            Ok((date, true))
        }
        _ => Err(()),
    }
}

/// Parses exactly two digits at the start of `s`.
fn two_digits(s: &[u8]) -> Result<u32, ()> {
    if s.len() < 2 || !s[0].is_ascii_digit() || !s[1].is_ascii_digit() {
        return Err(());
    }
    Ok(u32::from(s[0] - b'0') * 10 + u32::from(s[1] - b'0'))
}

/// The time-of-day part of a TIME value in the given format variant:
/// `HH[:MM[:SS]][.f…][Z|±HH[:]MM]`, with colons iff `ext`.
fn parse_iso_time(b: &[u8], ext: bool) -> Result<(i64, Option<FixedOffset>), ()> {
    let sep = usize::from(ext);
    let mut s = b;
    let h = two_digits(s)?;
    s = &s[2..];

    let more = |s: &[u8]| {
        s.len() >= 2 + sep && (!ext || s[0] == b':') && s[sep].is_ascii_digit()
    };
    let mut mi = None;
    let mut sec = None;
    if more(s) {
        mi = Some(two_digits(&s[sep..])?);
        s = &s[2 + sep..];
        if more(s) {
            sec = Some(two_digits(&s[sep..])?);
            s = &s[2 + sep..];
        }
    }

    let unit = match (mi, sec) {
        (None, _) => 3600 * NANOS_PER_SEC,
        (Some(_), None) => 60 * NANOS_PER_SEC,
        (Some(_), Some(_)) => NANOS_PER_SEC,
    };
    let mut nanos = hms_nanos(h, mi.unwrap_or(0), sec.unwrap_or(0))?;

    if let [b'.' | b',', rest @ ..] = s {
        let digits = rest.iter().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(());
        }
        nanos += fraction_nanos(&rest[..digits], unit);
        s = &rest[digits..];
    }

    let offset = match s {
        [] => None,
        [b'Z'] => Some(Utc.fix()),
        [sign @ (b'+' | b'-'), rest @ ..] => {
            let oh = two_digits(rest)?;
            let rest = &rest[2..];
            let rest = match (ext, rest) {
                (true, [b':', r @ ..]) => r,
                (true, _) => return Err(()),
                (false, r) => r,
            };
            let om = two_digits(rest)?;
            if rest.len() != 2 {
                return Err(());
            }
            Some(make_offset(char::from(*sign), oh, om)?)
        }
        _ => return Err(()),
    };
    Ok((nanos, offset))
}

fn parse_time(b: &[u8]) -> Result<Time, ()> {
    let (date_part, time_part) = match b.iter().position(|&c| c == b'T') {
        Some(p) => (&b[..p], Some(&b[p + 1..])),
        None => (b, None),
    };
    let (date, ext) = parse_iso_date(date_part)?;
    let (nanos, offset) = match time_part {
        Some(t) => parse_iso_time(t, ext)?,
        None => (0, None),
    };
    Ok(Time::new(at_nanos_of_day(date, nanos)?, offset))
}

impl BerEncode for Time {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(Tag::TIME, self.to_string().len()))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        w.write_all(self.to_string().as_bytes())
    }

    fn ber_is_zero(&self) -> bool {
        *self == Time::default()
    }
}

impl BerDecode for Time {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::TIME
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        if el.constructed() {
            return Err(el.syntax("constructed TIME"));
        }
        let err = el.syntax("invalid TIME");
        let bytes = el.read_all()?;
        match parse_time(&bytes) {
            Ok(t) => {
                *self = t;
                Ok(())
            }
            Err(()) => Err(err),
        }
    }
}

//------------ [UNIVERSAL 31] DATE, [UNIVERSAL 32] TIME-OF-DAY, [UNIVERSAL 33] DATE-TIME ---

fn parse_date(b: &[u8]) -> Result<NaiveDate, ()> {
    let (i, (y, mo, d)) = match b.len() {
        8 => tuple((num(4), num(2), num(2)))(b).map_err(|_| ())?,
        10 => {
            let mut p = tuple((
                num(4),
                preceded(char('-'), num(2)),
                preceded(char('-'), num(2)),
            ));
            p(b).map_err(|_| ())?
        }
        _ => return Err(()),
    };
    if !i.is_empty() {
        return Err(());
    }
    NaiveDate::from_ymd_opt(y as i32, mo, d).ok_or(())
}

fn parse_time_of_day(b: &[u8]) -> Result<NaiveTime, ()> {
    let (i, (h, mi, s)) = match b.len() {
        6 => tuple((num(2), num(2), num(2)))(b).map_err(|_| ())?,
        8 => {
            let mut p = tuple((
                num(2),
                preceded(char(':'), num(2)),
                preceded(char(':'), num(2)),
            ));
            p(b).map_err(|_| ())?
        }
        _ => return Err(()),
    };
    if !i.is_empty() {
        return Err(());
    }
    NaiveTime::from_hms_opt(h, mi, s).ok_or(())
}

fn parse_date_time(b: &[u8]) -> Result<NaiveDateTime, ()> {
    let (date_part, time_part) = match b.len() {
        15 if b[8] == b'T' => (&b[..8], &b[9..]),
        19 if b[10] == b'T' => (&b[..10], &b[11..]),
        _ => return Err(()),
    };
    let date = parse_date(date_part)?;
    let time = parse_time_of_day(time_part)?;
    Ok(date.and_time(time))
}

macro_rules! ascii_time_codec {
    ($($t:ident => ($tag:expr, $parse:expr, $wrap:expr, $msg:literal)),+ $(,)?) => {$(
        impl BerEncode for $t {
            fn ber_header(&self) -> Result<Header, Error> {
                Ok(Header::primitive($tag, self.to_string().len()))
            }

            fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
                w.write_all(self.to_string().as_bytes())
            }

            fn ber_is_zero(&self) -> bool {
                *self == $t::default()
            }
        }

        impl BerDecode for $t {
            fn ber_match(&self, tag: Tag) -> bool {
                tag == $tag
            }

            fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
                if el.constructed() {
                    return Err(el.syntax(concat!("constructed ", $msg)));
                }
                let err = el.syntax(concat!("invalid ", $msg));
                let bytes = el.read_all()?;
                match $parse(&bytes) {
                    Ok(v) => {
                        *self = $wrap(v);
                        Ok(())
                    }
                    Err(()) => Err(err),
                }
            }
        }
    )+};
}

ascii_time_codec!(
    Date => (Tag::DATE, parse_date, Date, "DATE"),
    TimeOfDay => (Tag::TIME_OF_DAY, parse_time_of_day, TimeOfDay, "TIME-OF-DAY"),
    DateTime => (Tag::DATE_TIME, parse_date_time, DateTime, "DATE-TIME"),
);

//------------ [UNIVERSAL 34] DURATION ---------------------------------------

/// Parses `[-]PT[nH][nM][n[.f…]S]`. Units must appear in strictly
/// decreasing order and only the final unit may carry a fraction.
fn parse_duration(b: &[u8]) -> Result<chrono::Duration, ()> {
    let mut s = b;
    let mut sign = 1i64;
    if let Some(&c) = s.first() {
        if c == b'+' || c == b'-' {
            if c == b'-' {
                sign = -1;
            }
            s = &s[1..];
        }
    }
    if !s.starts_with(b"PT") {
        return Err(());
    }
    s = &s[2..];

    const UNIT_HOUR: i64 = 3600 * NANOS_PER_SEC;
    const UNIT_MINUTE: i64 = 60 * NANOS_PER_SEC;
    let mut max_unit = i64::MAX;
    let mut total: i64 = 0;
    let mut fractional = false;
    while !s.is_empty() {
        if fractional {
            // only the final unit may be fractional
            return Err(());
        }
        let mut n: i64 = 0;
        let mut i = 0;
        while i < s.len() && s[i].is_ascii_digit() {
            n = n.checked_mul(10).ok_or(())?;
            n += i64::from(s[i] - b'0');
            i += 1;
        }
        if i == 0 {
            return Err(());
        }
        let mut frac: &[u8] = &[];
        if i < s.len() && (s[i] == b'.' || s[i] == b',') {
            let start = i + 1;
            i = start;
            while i < s.len() && s[i].is_ascii_digit() {
                i += 1;
            }
            if i == start {
                return Err(());
            }
            frac = &s[start..i];
            fractional = true;
        }
        if i >= s.len() {
            return Err(());
        }
        let unit = match s[i] {
            b'H' => UNIT_HOUR,
            b'M' => UNIT_MINUTE,
            b'S' => NANOS_PER_SEC,
            _ => return Err(()),
        };
        if unit >= max_unit {
            return Err(());
        }
        max_unit = unit;
        total = total.checked_add(n.checked_mul(unit).ok_or(())?).ok_or(())?;
        total = total.checked_add(fraction_nanos(frac, unit)).ok_or(())?;
        s = &s[i + 1..];
    }
    Ok(chrono::Duration::nanoseconds(sign * total))
}

impl BerEncode for Duration {
    fn ber_header(&self) -> Result<Header, Error> {
        Ok(Header::primitive(Tag::DURATION, self.to_string().len()))
    }

    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error> {
        w.write_all(self.to_string().as_bytes())
    }

    fn ber_is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl BerDecode for Duration {
    fn ber_match(&self, tag: Tag) -> bool {
        tag == Tag::DURATION
    }

    fn ber_decode(&mut self, _tag: Tag, el: &mut Element<'_>) -> Result<(), Error> {
        if el.constructed() {
            return Err(el.syntax("constructed DURATION"));
        }
        let err = el.syntax("invalid DURATION");
        let bytes = el.read_all()?;
        match parse_duration(&bytes) {
            Ok(d) => {
                *self = Duration(d);
                Ok(())
            }
            Err(()) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn utc_time_formats() {
        let (_, t) = parse_utc_time(b"191215190210Z").unwrap();
        assert_eq!(t.time.to_string(), "2019-12-15 19:02:10");
        let (_, t) = parse_utc_time(b"9112061907Z").unwrap();
        assert_eq!(t.time.to_string(), "1991-12-06 19:07:00");
        let (_, t) = parse_utc_time(b"910506234540-0700").unwrap();
        assert_eq!(t.offset, FixedOffset::west_opt(7 * 3600).unwrap());
        assert!(parse_utc_time(b"9105062345401234").is_err());
        assert!(parse_utc_time(b"910506234540").is_err()); // offset required
        assert!(parse_utc_time(b"910230120000Z").is_err()); // Feb 30
    }

    #[test]
    fn generalized_time_formats() {
        let (_, t) = parse_generalized_time(b"20191215190210Z").unwrap();
        assert_eq!(t.time.to_string(), "2019-12-15 19:02:10");
        assert_eq!(t.offset, Some(Utc.fix()));
        let (_, t) = parse_generalized_time(b"2019121519").unwrap();
        assert_eq!(t.offset, None);
        assert_eq!(t.time.hour(), 19);
        // fractional hours propagate down
        let (_, t) = parse_generalized_time(b"2019121519.5Z").unwrap();
        assert_eq!(t.time.minute(), 30);
        let (_, t) = parse_generalized_time(b"20191215190210.123Z").unwrap();
        assert_eq!(t.time.nanosecond(), 123_000_000);
        assert!(parse_generalized_time(b"201912151902105").is_err());
    }

    #[test]
    fn time_formats() {
        let t = parse_time(b"2019-12-15T19:02:10Z").unwrap();
        assert_eq!(t.time.to_string(), "2019-12-15 19:02:10");
        let t = parse_time(b"20191215T190210").unwrap();
        assert_eq!(t.offset, None);
        // ordinal dates
        let t = parse_time(b"2019349").unwrap();
        assert_eq!(t.time.to_string(), "2019-12-15 00:00:00");
        // format variants must not be mixed
        assert!(parse_time(b"2019-12-15T190210").is_err());
        assert!(parse_time(b"20191215T19:02:10").is_err());
    }

    #[test]
    fn duration_formats() {
        assert_eq!(parse_duration(b"PT0S").unwrap(), chrono::Duration::zero());
        assert_eq!(
            parse_duration(b"PT1M30S").unwrap(),
            chrono::Duration::seconds(90)
        );
        assert_eq!(
            parse_duration(b"-PT1H").unwrap(),
            chrono::Duration::hours(-1)
        );
        assert_eq!(
            parse_duration(b"PT0.5S").unwrap(),
            chrono::Duration::milliseconds(500)
        );
        assert_eq!(
            parse_duration(b"PT1.5M").unwrap(),
            chrono::Duration::seconds(90)
        );
        // units out of order
        assert!(parse_duration(b"PT30S1M").is_err());
        // fraction before the final unit
        assert!(parse_duration(b"PT1.5M30S").is_err());
        assert!(parse_duration(b"P1D").is_err());
    }

    #[test]
    fn date_and_time_of_day() {
        assert_eq!(
            parse_date(b"2023-07-04").unwrap(),
            NaiveDate::from_ymd_opt(2023, 7, 4).unwrap()
        );
        assert_eq!(
            parse_date(b"20230704").unwrap(),
            NaiveDate::from_ymd_opt(2023, 7, 4).unwrap()
        );
        assert!(parse_date(b"2023-02-30").is_err());
        assert_eq!(
            parse_time_of_day(b"08:05:00").unwrap(),
            NaiveTime::from_hms_opt(8, 5, 0).unwrap()
        );
        assert!(parse_time_of_day(b"25:00:00").is_err());
        assert_eq!(
            parse_date_time(b"2023-07-04T08:05:00").unwrap(),
            NaiveDate::from_ymd_opt(2023, 7, 4)
                .unwrap()
                .and_hms_opt(8, 5, 0)
                .unwrap()
        );
    }
}

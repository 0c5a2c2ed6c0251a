//! Rust value types for the ASN.1 time types.
//!
//! All types are thin wrappers around chrono values. Types that may carry
//! a UTC offset represent "local time" (no offset information on the wire)
//! as an absent offset rather than consulting the environment's time zone.

use core::fmt;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc};

/// Writes the fractional-second part of `nanos` with trailing zeros
/// removed, including the leading dot, or nothing for zero.
fn write_fraction(f: &mut fmt::Formatter<'_>, nanos: u32) -> fmt::Result {
    if nanos == 0 {
        return Ok(());
    }
    let mut digits = format!("{:09}", nanos);
    while digits.ends_with('0') {
        digits.pop();
    }
    write!(f, ".{}", digits)
}

/// Writes a numeric UTC offset as `Z` or `±HHMM` (`±HH:MM` if `extended`).
fn write_offset(f: &mut fmt::Formatter<'_>, offset: FixedOffset, extended: bool) -> fmt::Result {
    let secs = offset.local_minus_utc();
    if secs == 0 {
        return f.write_str("Z");
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    if extended {
        write!(f, "{}{:02}:{:02}", sign, abs / 3600, abs % 3600 / 60)
    } else {
        write!(f, "{}{:02}{:02}", sign, abs / 3600, abs % 3600 / 60)
    }
}

/// The ASN.1 UTCTime type. Only dates from 1950 through 2049 can be
/// represented; the wire format carries a two-digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcTime {
    /// The moment in time, in the timescale of `offset`.
    pub time: NaiveDateTime,
    /// The UTC offset. UTCTime always carries one on the wire.
    pub offset: FixedOffset,
}

impl UtcTime {
    pub fn new(time: NaiveDateTime, offset: FixedOffset) -> UtcTime {
        UtcTime { time, offset }
    }

    /// Whether the year lies in the representable window 1950..=2049.
    pub fn is_valid(&self) -> bool {
        (1950..2050).contains(&self.time.year())
    }
}

impl Default for UtcTime {
    fn default() -> UtcTime {
        UtcTime {
            time: NaiveDateTime::default(),
            offset: Utc.fix(),
        }
    }
}

impl fmt::Display for UtcTime {
    /// Formats the time as `YYMMDDHHMMSSZ` or `YYMMDDHHMMSS±HHMM`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.time;
        write!(
            f,
            "{:02}{:02}{:02}{:02}{:02}{:02}",
            t.year().rem_euclid(100),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        )?;
        write_offset(f, self.offset, false)
    }
}

/// The ASN.1 GeneralizedTime type, covering years 1 through 9999 with
/// optional fractional seconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeneralizedTime {
    /// The moment in time, in the timescale of `offset` (or local time).
    pub time: NaiveDateTime,
    /// The UTC offset; `None` stands for local time without offset
    /// information.
    pub offset: Option<FixedOffset>,
}

impl GeneralizedTime {
    pub fn new(time: NaiveDateTime, offset: Option<FixedOffset>) -> GeneralizedTime {
        GeneralizedTime { time, offset }
    }

    /// Whether the year lies in the representable window 1..=9999.
    pub fn is_valid(&self) -> bool {
        (1..=9999).contains(&self.time.year())
    }
}

impl fmt::Display for GeneralizedTime {
    /// Formats the time as `YYYYMMDDHHMMSS[.f…][Z|±HHMM]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.time;
        write!(
            f,
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            t.year().rem_euclid(10000),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        )?;
        write_fraction(f, t.nanosecond() % 1_000_000_000)?;
        match self.offset {
            Some(offset) => write_offset(f, offset, false),
            None => Ok(()),
        }
    }
}

/// The ASN.1 TIME type (tag 14). Only time points are supported, not
/// intervals or recurrences.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    /// The moment in time, in the timescale of `offset` (or local time).
    pub time: NaiveDateTime,
    /// The UTC offset; `None` stands for local time.
    pub offset: Option<FixedOffset>,
}

impl Time {
    pub fn new(time: NaiveDateTime, offset: Option<FixedOffset>) -> Time {
        Time { time, offset }
    }
}

impl fmt::Display for Time {
    /// Formats the time in the extended ISO 8601 format,
    /// `YYYY-MM-DDTHH:MM:SS[.f…][Z|±HH:MM]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.time;
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            t.year().rem_euclid(10000),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        )?;
        write_fraction(f, t.nanosecond() % 1_000_000_000)?;
        match self.offset {
            Some(offset) => write_offset(f, offset, true),
            None => Ok(()),
        }
    }
}

/// The ASN.1 DATE type: a calendar date without time or offset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Date(pub NaiveDate);

impl fmt::Display for Date {
    /// Formats the date as `YYYY-MM-DD`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year().rem_euclid(10000),
            self.0.month(),
            self.0.day()
        )
    }
}

/// The ASN.1 TIME-OF-DAY type: a wall-clock time without date or offset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay(pub NaiveTime);

impl fmt::Display for TimeOfDay {
    /// Formats the time as `HH:MM:SS`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )
    }
}

/// The ASN.1 DATE-TIME type: a date and time without offset information.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateTime(pub NaiveDateTime);

impl fmt::Display for DateTime {
    /// Formats the value as `YYYY-MM-DDTHH:MM:SS`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.0;
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            t.year().rem_euclid(10000),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        )
    }
}

/// The ASN.1 DURATION type, restricted to durations expressible in hours,
/// minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(pub chrono::Duration);

impl Default for Duration {
    fn default() -> Duration {
        Duration(chrono::Duration::zero())
    }
}

impl fmt::Display for Duration {
    /// Formats the duration as `[-]PT[nH][nM][n[.f…]S]`, using the highest
    /// units possible and putting any fraction on the final unit.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = self.0;
        if d.is_zero() {
            return f.write_str("PT0S");
        }
        if d < chrono::Duration::zero() {
            f.write_str("-PT")?;
            d = -d;
        } else {
            f.write_str("PT")?;
        }
        let hours = d.num_hours();
        if hours != 0 {
            write!(f, "{}H", hours)?;
            d = d - chrono::Duration::hours(hours);
        }
        let minutes = d.num_minutes();
        if minutes != 0 {
            write!(f, "{}M", minutes)?;
            d = d - chrono::Duration::minutes(minutes);
        }
        let seconds = d.num_seconds();
        let nanos = (d - chrono::Duration::seconds(seconds)).num_nanoseconds();
        let nanos = nanos.unwrap_or(0) as u32;
        if seconds != 0 || nanos != 0 {
            write!(f, "{}", seconds)?;
            write_fraction(f, nanos)?;
            f.write_str("S")?;
        }
        Ok(())
    }
}

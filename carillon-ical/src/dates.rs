//! RFC 5545 date, date-time and duration values.
//!
//! Date-times come in four flavours: UTC (`...Z`), floating, floating
//! with a TZID parameter, and bare dates. Time-range evaluation works in
//! UTC; floating and TZID values are read as UTC, which is what the
//! query engine can honestly promise without a full VTIMEZONE
//! interpreter. Bare dates map to midnight and are flagged so callers
//! can apply day granularity.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case};
use nom::character::complete as nomchar;
use nom::combinator::{map, map_opt, opt, value};
use nom::sequence::{pair, tuple};
use nom::IResult;

use crate::parser::Property;

pub const UTC_DATETIME_FMT: &str = "%Y%m%dT%H%M%SZ";
pub const FLOATING_DATETIME_FMT: &str = "%Y%m%dT%H%M%S";
pub const DATE_FMT: &str = "%Y%m%d";

/// A resolved point in time, with the granularity it was written at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcalTime {
    pub utc: DateTime<Utc>,
    pub is_date: bool,
}

impl IcalTime {
    /// End of the span this value covers: +1 day for bare dates,
    /// the instant itself otherwise.
    pub fn span_end(&self) -> DateTime<Utc> {
        if self.is_date {
            self.utc + TimeDelta::try_days(1).unwrap()
        } else {
            self.utc
        }
    }
}

/// Parse a raw DATE or DATE-TIME value.
pub fn date_or_datetime(raw: &str) -> Option<IcalTime> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FMT) {
        let utc = date.and_hms_opt(0, 0, 0)?.and_utc();
        return Some(IcalTime { utc, is_date: true });
    }
    let tmpl = match raw.chars().last() {
        Some('Z') => UTC_DATETIME_FMT,
        Some(_) => {
            tracing::trace!(raw_time = raw, "reading a floating datetime as UTC");
            FLOATING_DATETIME_FMT
        }
        None => return None,
    };
    NaiveDateTime::parse_from_str(raw, tmpl)
        .ok()
        .map(|v| IcalTime {
            utc: v.and_utc(),
            is_date: false,
        })
}

/// Read a property carrying a DATE/DATE-TIME value (DTSTART, DUE, ...).
pub fn prop_time(prop: &Property) -> Option<IcalTime> {
    date_or_datetime(prop.value.as_str())
}

/// Read the named property of a component as a point in time.
pub fn comp_time(comp: &crate::parser::Component, name: &str) -> Option<IcalTime> {
    comp.prop(name).and_then(prop_time)
}

/// A comma separated list of DATE/DATE-TIME values (RDATE, EXDATE).
pub fn prop_time_list(prop: &Property) -> Vec<IcalTime> {
    prop.value
        .split(',')
        .filter_map(date_or_datetime)
        .collect()
}

/// RFC 5545 §3.3.6 Duration Value
///
/// ```abnf
/// dur-value  = (["+"] / "-") "P" (dur-date / dur-time / dur-week)
/// dur-date   = dur-day [dur-time]
/// dur-time   = "T" (dur-hour / dur-minute / dur-second)
/// dur-week   = 1*DIGIT "W"
/// dur-hour   = 1*DIGIT "H" [dur-minute]
/// dur-minute = 1*DIGIT "M" [dur-second]
/// dur-second = 1*DIGIT "S"
/// dur-day    = 1*DIGIT "D"
/// ```
pub fn dur_value(text: &str) -> IResult<&str, TimeDelta> {
    map_opt(
        tuple((
            dur_sign,
            tag_no_case("P"),
            alt((dur_date, dur_time, dur_week)),
        )),
        |(sign, _, delta)| delta.checked_mul(sign),
    )(text)
}

/// Duration carried by a property, if it parses.
pub fn prop_duration(prop: &Property) -> Option<TimeDelta> {
    dur_value(prop.value.trim()).ok().map(|(_, d)| d)
}

fn dur_sign(text: &str) -> IResult<&str, i32> {
    map(opt(alt((value(1, tag("+")), value(-1, tag("-"))))), |x| {
        x.unwrap_or(1)
    })(text)
}
fn dur_date(text: &str) -> IResult<&str, TimeDelta> {
    map(pair(dur_day, opt(dur_time)), |(day, time)| {
        day + time.unwrap_or(TimeDelta::zero())
    })(text)
}
fn dur_time(text: &str) -> IResult<&str, TimeDelta> {
    map(
        pair(tag_no_case("T"), alt((dur_hour, dur_minute, dur_second))),
        |(_, x)| x,
    )(text)
}
fn dur_week(text: &str) -> IResult<&str, TimeDelta> {
    map_opt(pair(nomchar::i64, tag_no_case("W")), |(i, _)| {
        TimeDelta::try_weeks(i)
    })(text)
}
fn dur_day(text: &str) -> IResult<&str, TimeDelta> {
    map_opt(pair(nomchar::i64, tag_no_case("D")), |(i, _)| {
        TimeDelta::try_days(i)
    })(text)
}
fn dur_hour(text: &str) -> IResult<&str, TimeDelta> {
    map_opt(
        tuple((nomchar::i64, tag_no_case("H"), opt(dur_minute))),
        |(i, _, mm)| TimeDelta::try_hours(i).map(|hours| hours + mm.unwrap_or(TimeDelta::zero())),
    )(text)
}
fn dur_minute(text: &str) -> IResult<&str, TimeDelta> {
    map_opt(
        tuple((nomchar::i64, tag_no_case("M"), opt(dur_second))),
        |(i, _, ms)| TimeDelta::try_minutes(i).map(|min| min + ms.unwrap_or(TimeDelta::zero())),
    )(text)
}
fn dur_second(text: &str) -> IResult<&str, TimeDelta> {
    map_opt(pair(nomchar::i64, tag_no_case("S")), |(i, _)| {
        TimeDelta::try_seconds(i)
    })(text)
}

/// RFC 5545 §3.3.9 period: `start/end` or `start/duration`
pub fn period(raw: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let (start_raw, end_raw) = raw.split_once('/')?;
    let start = date_or_datetime(start_raw)?;
    if let Some(end) = date_or_datetime(end_raw) {
        return Some((start.utc, end.utc));
    }
    let (_, delta) = dur_value(end_raw).ok()?;
    Some((start.utc, start.utc + delta))
}

/// The value list of a FREEBUSY property.
pub fn prop_periods(prop: &Property) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    prop.value.split(',').filter_map(period).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn utc_datetime() {
        let t = date_or_datetime("20240115T120000Z").unwrap();
        assert_eq!(t.utc, Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
        assert!(!t.is_date);
    }

    #[test]
    fn bare_date() {
        let t = date_or_datetime("20240115").unwrap();
        assert!(t.is_date);
        assert_eq!(t.utc, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(
            t.span_end(),
            Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn rfc5545_duration_example1() {
        // A duration of 15 days, 5 hours, and 20 seconds would be:
        let to_parse = "P15DT5H0M20S";
        let (_, time_delta) = dur_value(to_parse).unwrap();
        assert_eq!(
            time_delta,
            TimeDelta::try_days(15).unwrap()
                + TimeDelta::try_hours(5).unwrap()
                + TimeDelta::try_seconds(20).unwrap()
        );
    }

    #[test]
    fn rfc5545_duration_example2() {
        // A duration of 7 weeks would be:
        let to_parse = "P7W";
        let (_, time_delta) = dur_value(to_parse).unwrap();
        assert_eq!(time_delta, TimeDelta::try_weeks(7).unwrap());
    }

    #[test]
    fn rfc4791_duration_example1() {
        // 10 minutes before
        let to_parse = "-PT10M";
        let (_, time_delta) = dur_value(to_parse).unwrap();
        assert_eq!(time_delta, TimeDelta::try_minutes(-10).unwrap());
    }

    #[test]
    fn period_with_duration() {
        let (start, end) = period("19970101T180000Z/PT5H30M").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(1997, 1, 1, 18, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(1997, 1, 1, 23, 30, 0).unwrap());
    }
}

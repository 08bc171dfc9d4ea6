//! Recurrence expansion over a bounded window.
//!
//! RRULE instance generation is delegated to the `rrule` crate; RDATE
//! union, EXDATE subtraction and RECURRENCE-ID override substitution are
//! layered on top, because the wire format mixes them freely inside one
//! component group.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rrule::RRuleSet;

use crate::dates::{comp_time, prop_time_list, UTC_DATETIME_FMT};
use crate::parser::Component;

/// Expansion cap for open-ended queries. RFC 4791 lets the server bound
/// what it is willing to expand; everything after this instant does not
/// exist as far as queries are concerned.
pub fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap()
}

/// Hard cap on generated occurrences per component group.
const MAX_INSTANCES: u16 = 4096;

/// One concrete occurrence of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance<'a> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub comp: &'a Component,
}

/// RFC 4791 §9.9 overlap: half-open ranges, except that zero length
/// instants match when they sit exactly on the range start.
pub fn overlaps(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> bool {
    if end > start {
        start < range_end && end > range_start
    } else {
        range_start <= start && range_end > start
    }
}

/// Effective duration of one occurrence of `comp`.
fn occurrence_duration(comp: &Component) -> TimeDelta {
    let dtstart = comp_time(comp, "DTSTART");
    if let (Some(start), Some(end)) = (dtstart, comp_time(comp, "DTEND").or_else(|| comp_time(comp, "DUE"))) {
        return end.span_end() - start.utc;
    }
    if let Some(dur) = comp.prop("DURATION").and_then(crate::dates::prop_duration) {
        return dur;
    }
    match dtstart {
        Some(t) if t.is_date => TimeDelta::try_days(1).unwrap(),
        _ => TimeDelta::zero(),
    }
}

/// Expand one component group (master + RECURRENCE-ID overrides) over
/// `[window_start, window_end)`. Always finite: the window is clamped to
/// the far-future sentinel and the occurrence count to `MAX_INSTANCES`.
pub fn expand_group<'a>(
    master: &'a Component,
    overrides: &[&'a Component],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Instance<'a>> {
    let window_end = window_end.min(far_future());
    let duration = occurrence_duration(master);

    let dtstart = match comp_time(master, "DTSTART") {
        Some(t) => t,
        None => return Vec::new(),
    };

    // 1. candidate occurrence starts from RRULE (or the single DTSTART)
    let mut starts: Vec<DateTime<Utc>> = match master.prop("RRULE") {
        Some(rule) => rrule_occurrences(dtstart.utc, &rule.value, window_start - duration, window_end),
        None => vec![dtstart.utc],
    };

    // 2. RDATE union
    for rdate in master.props("RDATE") {
        for t in prop_time_list(rdate) {
            if !starts.contains(&t.utc) {
                starts.push(t.utc);
            }
        }
    }

    // 3. EXDATE subtraction
    for exdate in master.props("EXDATE") {
        for t in prop_time_list(exdate) {
            starts.retain(|s| *s != t.utc);
        }
    }

    // 4. RECURRENCE-ID overrides replace their original occurrence
    let mut out: Vec<Instance<'a>> = Vec::new();
    for over in overrides.iter().copied() {
        let Some(rid) = comp_time(over, "RECURRENCE-ID") else {
            continue;
        };
        starts.retain(|s| *s != rid.utc);
        let Some(ostart) = comp_time(over, "DTSTART") else {
            continue;
        };
        let oend = ostart.utc + occurrence_duration(over);
        if overlaps(ostart.utc, oend, window_start, window_end) {
            out.push(Instance {
                start: ostart.utc,
                end: oend,
                comp: over,
            });
        }
    }

    for s in starts {
        let e = s + duration;
        if overlaps(s, e, window_start, window_end) {
            out.push(Instance {
                start: s,
                end: e,
                comp: master,
            });
        }
    }

    out.sort_by_key(|i| i.start);
    out
}

/// All instances of `kind` components inside a parsed VCALENDAR.
pub fn instances<'a>(
    cal: &'a Component,
    kind: &'a str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Instance<'a>> {
    let masters: Vec<&Component> = cal
        .comps(kind)
        .filter(|c| c.prop("RECURRENCE-ID").is_none())
        .collect();
    let overrides: Vec<&Component> = cal
        .comps(kind)
        .filter(|c| c.prop("RECURRENCE-ID").is_some())
        .collect();

    let mut out = Vec::new();
    for master in masters {
        out.extend(expand_group(master, &overrides, window_start, window_end));
    }
    // orphan overrides still describe real occurrences
    if out.is_empty() {
        for over in overrides {
            if let Some(start) = comp_time(over, "DTSTART") {
                let end = start.utc + occurrence_duration(over);
                if overlaps(start.utc, end, window_start, window_end) {
                    out.push(Instance {
                        start: start.utc,
                        end,
                        comp: over,
                    });
                }
            }
        }
    }
    out.sort_by_key(|i| i.start);
    out
}

fn rrule_occurrences(
    dtstart: DateTime<Utc>,
    rule: &str,
    search_from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let source = format!(
        "DTSTART:{}\nRRULE:{}",
        dtstart.format(UTC_DATETIME_FMT),
        rule
    );
    let rrule_set: RRuleSet = match source.parse() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(rule = rule, err = %e, "unparseable RRULE, treating as non-recurring");
            return vec![dtstart];
        }
    };

    let tz = rrule_set.get_dt_start().timezone();
    let search_start = search_from
        .with_timezone(&tz)
        .checked_sub_signed(TimeDelta::try_seconds(1).unwrap())
        .unwrap_or(search_from.with_timezone(&tz));

    rrule_set
        .after(search_start)
        .all(MAX_INSTANCES)
        .dates
        .into_iter()
        .map(|d| d.with_timezone(&Utc))
        .take_while(|d| *d < until)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_calendar;

    fn window(y1: i32, m1: u32, d1: u32, y2: i32, m2: u32, d2: u32) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(y1, m1, d1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(y2, m2, d2, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn single_event() {
        let cal = parse_calendar(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240115T120000Z\r\nDTEND:20240115T130000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap();
        let (ws, we) = window(2024, 1, 1, 2024, 2, 1);
        let got = instances(&cal, "VEVENT", ws, we);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].start, Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
        assert_eq!(got[0].end, Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap());
    }

    #[test]
    fn daily_count() {
        let cal = parse_calendar(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T100000Z\r\nDURATION:PT1H\r\nRRULE:FREQ=DAILY;COUNT=3\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap();
        let (ws, we) = window(2024, 1, 1, 2024, 2, 1);
        let got = instances(&cal, "VEVENT", ws, we);
        assert_eq!(got.len(), 3);
        assert_eq!(got[1].start, Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());
    }

    #[test]
    fn window_clips_infinite_rule() {
        let cal = parse_calendar(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T100000Z\r\nRRULE:FREQ=WEEKLY\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap();
        let (ws, we) = window(2024, 1, 8, 2024, 1, 22);
        let got = instances(&cal, "VEVENT", ws, we);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].start, Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap());
        assert_eq!(got[1].start, Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());
    }

    #[test]
    fn exdate_removes_instance() {
        let cal = parse_calendar(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T100000Z\r\nRRULE:FREQ=DAILY;COUNT=3\r\nEXDATE:20240102T100000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap();
        let (ws, we) = window(2024, 1, 1, 2024, 2, 1);
        let got = instances(&cal, "VEVENT", ws, we);
        assert_eq!(got.len(), 2);
        assert!(got
            .iter()
            .all(|i| i.start != Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()));
    }

    #[test]
    fn rdate_adds_instance() {
        let cal = parse_calendar(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T100000Z\r\nDURATION:PT30M\r\nRDATE:20240110T100000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap();
        let (ws, we) = window(2024, 1, 1, 2024, 2, 1);
        let got = instances(&cal, "VEVENT", ws, we);
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].start, Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap());
    }

    #[test]
    fn override_replaces_occurrence() {
        let cal = parse_calendar(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T100000Z\r\nDURATION:PT1H\r\nRRULE:FREQ=DAILY;COUNT=2\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:a\r\nRECURRENCE-ID:20240102T100000Z\r\nDTSTART:20240102T180000Z\r\nDURATION:PT1H\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap();
        let (ws, we) = window(2024, 1, 1, 2024, 2, 1);
        let got = instances(&cal, "VEVENT", ws, we);
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].start, Utc.with_ymd_and_hms(2024, 1, 2, 18, 0, 0).unwrap());
    }

    #[test]
    fn all_day_event_spans_a_day() {
        let cal = parse_calendar(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART;VALUE=DATE:20240115\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap();
        let (ws, we) = window(2024, 1, 15, 2024, 1, 16);
        let got = instances(&cal, "VEVENT", ws, we);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].end - got[0].start, TimeDelta::try_days(1).unwrap());
    }

    #[test]
    fn open_ended_window_terminates() {
        let cal = parse_calendar(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T100000Z\r\nRRULE:FREQ=YEARLY\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap();
        let got = instances(
            &cal,
            "VEVENT",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            DateTime::<Utc>::MAX_UTC,
        );
        // clipped at the sentinel: 2024..=2099
        assert_eq!(got.len(), 76);
    }
}

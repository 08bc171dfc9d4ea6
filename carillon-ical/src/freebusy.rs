//! Free-busy synthesis (RFC 4791 §7.10) with RFC 7953 availability.
//!
//! Busy time comes from three sources: opaque non-cancelled VEVENT
//! instances, stored VFREEBUSY components, and VAVAILABILITY components
//! resolved in priority order with AVAILABLE subcomponents carving free
//! holes inside their parent's span.

use chrono::{DateTime, Utc};

use crate::dates::{comp_time, prop_duration, prop_periods, UTC_DATETIME_FMT};
use crate::parser::Component;
use crate::recur;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FbType {
    Free,
    Busy,
    BusyUnavailable,
    BusyTentative,
}

impl FbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Busy => "BUSY",
            Self::BusyUnavailable => "BUSY-UNAVAILABLE",
            Self::BusyTentative => "BUSY-TENTATIVE",
        }
    }

    fn from_value(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FREE" => Self::Free,
            "BUSY-UNAVAILABLE" => Self::BusyUnavailable,
            "BUSY-TENTATIVE" => Self::BusyTentative,
            _ => Self::Busy,
        }
    }

    /// RFC 7953 §4.4 ordering at equal priority:
    /// BUSY > BUSY-UNAVAILABLE > BUSY-TENTATIVE > FREE
    fn precedence(&self) -> u8 {
        match self {
            Self::Busy => 3,
            Self::BusyUnavailable => 2,
            Self::BusyTentative => 1,
            Self::Free => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FbPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: FbType,
}

/// Free-busy periods of a set of calendar objects over `[start, end)`.
pub fn collection_freebusy<'a>(
    objects: impl IntoIterator<Item = &'a Component>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<FbPeriod> {
    let mut periods: Vec<FbPeriod> = Vec::new();
    let mut availabilities: Vec<&Component> = Vec::new();

    for cal in objects {
        // 1. expanded opaque events
        for instance in recur::instances(cal, "VEVENT", start, end) {
            let transparent = instance
                .comp
                .prop("TRANSP")
                .map(|p| p.value.trim().eq_ignore_ascii_case("TRANSPARENT"))
                .unwrap_or(false);
            let cancelled = instance
                .comp
                .prop("STATUS")
                .map(|p| p.value.trim().eq_ignore_ascii_case("CANCELLED"))
                .unwrap_or(false);
            if transparent || cancelled {
                continue;
            }
            periods.push(FbPeriod {
                start: instance.start.max(start),
                end: instance.end.min(end),
                kind: FbType::Busy,
            });
        }

        // 2. stored VFREEBUSY periods
        for fb in cal.comps("VFREEBUSY") {
            for prop in fb.props("FREEBUSY") {
                let kind = prop
                    .param("FBTYPE")
                    .map(FbType::from_value)
                    .unwrap_or(FbType::Busy);
                if kind == FbType::Free {
                    continue;
                }
                for (ps, pe) in prop_periods(prop) {
                    if recur::overlaps(ps, pe, start, end) {
                        periods.push(FbPeriod {
                            start: ps.max(start),
                            end: pe.min(end),
                            kind,
                        });
                    }
                }
            }
        }

        availabilities.extend(cal.comps("VAVAILABILITY"));
    }

    // 3. availability timeline, free segments dropped
    periods.extend(availability_busy(&availabilities, start, end));

    merge(periods)
}

/// Resolve VAVAILABILITY components into busy segments.
fn availability_busy(
    availabilities: &[&Component],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<FbPeriod> {
    let mut ordered: Vec<&Component> = availabilities.to_vec();
    // lowest priority painted first, highest last so it wins; at equal
    // priority the higher-precedence busy type is painted last
    ordered.sort_by_key(|c| {
        let busytype = c
            .prop("BUSYTYPE")
            .map(|p| FbType::from_value(&p.value))
            .unwrap_or(FbType::BusyUnavailable);
        (std::cmp::Reverse(effective_priority(c)), busytype.precedence())
    });

    let mut timeline: Vec<FbPeriod> = Vec::new();
    for avail in ordered {
        let span_start = comp_time(avail, "DTSTART")
            .map(|t| t.utc)
            .unwrap_or(window_start)
            .max(window_start);
        let span_end = comp_time(avail, "DTEND")
            .map(|t| t.span_end())
            .or_else(|| {
                avail
                    .prop("DURATION")
                    .and_then(prop_duration)
                    .and_then(|d| comp_time(avail, "DTSTART").map(|t| t.utc + d))
            })
            .unwrap_or(window_end)
            .min(window_end);
        if span_start >= span_end {
            continue;
        }

        let busytype = avail
            .prop("BUSYTYPE")
            .map(|p| FbType::from_value(&p.value))
            .unwrap_or(FbType::BusyUnavailable);
        paint(
            &mut timeline,
            FbPeriod {
                start: span_start,
                end: span_end,
                kind: busytype,
            },
        );

        // AVAILABLE subcomponents punch free holes, recurrence honoured
        for available in avail.comps("AVAILABLE") {
            for instance in recur::expand_group(available, &[], span_start, span_end) {
                let hole_start = instance.start.max(span_start);
                let hole_end = instance.end.min(span_end);
                if hole_start < hole_end {
                    paint(
                        &mut timeline,
                        FbPeriod {
                            start: hole_start,
                            end: hole_end,
                            kind: FbType::Free,
                        },
                    );
                }
            }
        }
    }

    timeline.retain(|p| p.kind != FbType::Free);
    timeline
}

fn effective_priority(comp: &Component) -> u8 {
    match comp.prop("PRIORITY").and_then(|p| p.value.trim().parse::<u8>().ok()) {
        Some(0) | None => 10,
        Some(p) => p.min(10),
    }
}

/// Overwrite `new` onto a disjoint, sorted timeline.
fn paint(timeline: &mut Vec<FbPeriod>, new: FbPeriod) {
    let mut next: Vec<FbPeriod> = Vec::with_capacity(timeline.len() + 2);
    for seg in timeline.drain(..) {
        if seg.end <= new.start || seg.start >= new.end {
            next.push(seg);
            continue;
        }
        if seg.start < new.start {
            next.push(FbPeriod {
                start: seg.start,
                end: new.start,
                kind: seg.kind,
            });
        }
        if seg.end > new.end {
            next.push(FbPeriod {
                start: new.end,
                end: seg.end,
                kind: seg.kind,
            });
        }
    }
    next.push(new);
    next.sort_by_key(|p| p.start);
    *timeline = next;
}

/// Merge overlapping or adjacent periods of equal type.
fn merge(mut periods: Vec<FbPeriod>) -> Vec<FbPeriod> {
    periods.sort_by_key(|p| (p.kind.precedence(), p.start));
    let mut out: Vec<FbPeriod> = Vec::with_capacity(periods.len());
    for p in periods {
        if p.start >= p.end {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.kind == p.kind && p.start <= last.end => {
                last.end = last.end.max(p.end);
            }
            _ => out.push(p),
        }
    }
    out.sort_by_key(|p| p.start);
    out
}

/// Build the synthetic VFREEBUSY reply object.
pub fn assemble_vfreebusy(
    periods: &[FbPeriod],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Component {
    let mut fb = Component::new("VFREEBUSY");
    fb.push_prop("DTSTAMP", &now.format(UTC_DATETIME_FMT).to_string());
    fb.push_prop("DTSTART", &start.format(UTC_DATETIME_FMT).to_string());
    fb.push_prop("DTEND", &end.format(UTC_DATETIME_FMT).to_string());

    for kind in [FbType::Busy, FbType::BusyUnavailable, FbType::BusyTentative] {
        let values: Vec<String> = periods
            .iter()
            .filter(|p| p.kind == kind)
            .map(|p| {
                format!(
                    "{}/{}",
                    p.start.format(UTC_DATETIME_FMT),
                    p.end.format(UTC_DATETIME_FMT)
                )
            })
            .collect();
        if values.is_empty() {
            continue;
        }
        let mut prop = crate::parser::Property {
            group: None,
            name: "FREEBUSY".into(),
            params: vec![crate::parser::Param {
                key: "FBTYPE".into(),
                values: vec![kind.as_str().into()],
            }],
            value: values.join(","),
        };
        // plain BUSY omits the default FBTYPE parameter
        if kind == FbType::Busy {
            prop.params.clear();
        }
        fb.properties.push(prop);
    }

    let mut cal = Component::new("VCALENDAR");
    cal.push_prop("VERSION", "2.0");
    cal.push_prop("PRODID", "-//carillon//freebusy//EN");
    cal.components.push(fb);
    cal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_calendar;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn busy_from_events_merges_overlap() {
        let a = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240102T100000Z\r\nDTEND:20240102T120000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();
        let b = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:b\r\nDTSTART:20240102T110000Z\r\nDTEND:20240102T130000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();

        let (ws, we) = window();
        let got = collection_freebusy([&a, &b], ws, we);
        assert_eq!(
            got,
            vec![FbPeriod {
                start: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 1, 2, 13, 0, 0).unwrap(),
                kind: FbType::Busy,
            }]
        );
    }

    #[test]
    fn transparent_and_cancelled_are_skipped() {
        let a = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240102T100000Z\r\nDTEND:20240102T120000Z\r\nTRANSP:TRANSPARENT\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();
        let b = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:b\r\nDTSTART:20240103T100000Z\r\nDTEND:20240103T120000Z\r\nSTATUS:CANCELLED\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();

        let (ws, we) = window();
        assert!(collection_freebusy([&a, &b], ws, we).is_empty());
    }

    #[test]
    fn availability_with_free_hole() {
        // unavailable all week, except a 9-17 working window on the 2nd
        let avail = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VAVAILABILITY\r\nUID:av\r\nDTSTART:20240101T000000Z\r\nDTEND:20240108T000000Z\r\nBEGIN:AVAILABLE\r\nUID:av-1\r\nDTSTART:20240102T090000Z\r\nDTEND:20240102T170000Z\r\nEND:AVAILABLE\r\nEND:VAVAILABILITY\r\nEND:VCALENDAR\r\n").unwrap();

        let (ws, we) = window();
        let got = collection_freebusy([&avail], ws, we);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].kind, FbType::BusyUnavailable);
        assert_eq!(
            got[0].end,
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
        );
        assert_eq!(
            got[1].start,
            Utc.with_ymd_and_hms(2024, 1, 2, 17, 0, 0).unwrap()
        );
    }

    #[test]
    fn priority_resolution() {
        // low priority busy-tentative everywhere, high priority free-ish
        // span in the middle of the week via a nested AVAILABLE
        let low = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VAVAILABILITY\r\nUID:low\r\nPRIORITY:9\r\nBUSYTYPE:BUSY-TENTATIVE\r\nDTSTART:20240101T000000Z\r\nDTEND:20240108T000000Z\r\nEND:VAVAILABILITY\r\nEND:VCALENDAR\r\n").unwrap();
        let high = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VAVAILABILITY\r\nUID:high\r\nPRIORITY:1\r\nBUSYTYPE:BUSY\r\nDTSTART:20240103T000000Z\r\nDTEND:20240104T000000Z\r\nEND:VAVAILABILITY\r\nEND:VCALENDAR\r\n").unwrap();

        let (ws, we) = window();
        let got = collection_freebusy([&low, &high], ws, we);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].kind, FbType::BusyTentative);
        assert_eq!(got[1].kind, FbType::Busy);
        assert_eq!(
            got[1].start,
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()
        );
        assert_eq!(got[2].kind, FbType::BusyTentative);
    }

    #[test]
    fn vfreebusy_assembly() {
        let (ws, we) = window();
        let periods = vec![FbPeriod {
            start: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap(),
            kind: FbType::Busy,
        }];
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let cal = assemble_vfreebusy(&periods, ws, we, now);
        let text = cal.to_string();
        assert!(text.contains("BEGIN:VFREEBUSY"));
        assert!(text.contains("FREEBUSY:20240102T100000Z/20240102T120000Z"));
        assert!(text.contains("DTSTART:20240101T000000Z"));
    }
}

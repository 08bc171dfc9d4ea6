//! Filter evaluation for calendar-query (RFC 4791 §9.7) and
//! addressbook-query (RFC 6352 §10.5).
//!
//! Evaluation is conjunctive top-down; `is-not-defined` short-circuits.
//! Time-range checks on recurring events go through the expansion engine
//! so that an event matches iff one of its instances overlaps the range.

use carillon_dav::caltypes as cal;
use carillon_dav::cardtypes as card;
use chrono::{DateTime, TimeDelta, Utc};

use crate::dates::{comp_time, prop_duration, prop_periods, prop_time};
use crate::parser::{Component, Property};
use crate::recur;

/// Entry point for calendar-query: `root` is the parsed VCALENDAR.
pub fn calendar_matches(root: &Component, filter: &cal::Filter) -> bool {
    let candidates = [root];
    component_matches(root, &candidates, &filter.0)
}

fn component_matches(root: &Component, candidates: &[&Component], filter: &cal::CompFilter) -> bool {
    let found: Vec<&Component> = candidates
        .iter()
        .copied()
        .filter(|c| c.name.eq_ignore_ascii_case(filter.name.as_str()))
        .collect();

    match (&filter.additional_rules, found.is_empty()) {
        (None, false) => true,
        (None, true) => false,
        (Some(cal::CompFilterRules::IsNotDefined), empty) => empty,
        (Some(cal::CompFilterRules::Matches(_)), true) => false,
        (Some(cal::CompFilterRules::Matches(matcher)), false) => found.iter().any(|comp| {
            // time range first: for recurring components it is the only
            // check that needs the surrounding group
            if let Some(time_range) = &matcher.time_range {
                if !is_in_time_range(root, comp, time_range) {
                    return false;
                }
            }

            if !matcher
                .prop_filter
                .iter()
                .all(|pf| prop_filter_matches(comp, pf))
            {
                return false;
            }

            matcher.comp_filter.iter().all(|inner| {
                let children: Vec<&Component> = comp.components.iter().collect();
                component_matches(comp, &children, inner)
            })
        }),
    }
}

fn is_in_time_range(parent: &Component, comp: &Component, time_range: &cal::TimeRange) -> bool {
    let (start, end) = time_range.bounds();

    match cal::Component::new(comp.name.clone()) {
        cal::Component::VEvent => {
            if comp.prop("RECURRENCE-ID").is_some() {
                // an override candidate stands for its single occurrence
                return single_occurrence_overlaps(comp, start, end);
            }
            let overrides: Vec<&Component> = parent
                .comps(&comp.name)
                .filter(|c| c.prop("RECURRENCE-ID").is_some())
                .collect();
            !recur::expand_group(comp, &overrides, start, end).is_empty()
        }
        cal::Component::VTodo => todo_in_range(comp, start, end),
        cal::Component::VJournal => {
            // RFC 4791 §9.9: DTSTART day granularity
            match comp_time(comp, "DTSTART") {
                Some(t) => recur::overlaps(t.utc, t.span_end(), start, end),
                None => false,
            }
        }
        cal::Component::VFreeBusy => comp
            .props("FREEBUSY")
            .flat_map(prop_periods)
            .any(|(ps, pe)| recur::overlaps(ps, pe, start, end)),
        cal::Component::VAlarm => match resolve_trigger(parent, comp) {
            //  (start <= trigger-time) AND (end > trigger-time)
            Some(trigger) => start <= trigger && end > trigger,
            None => false,
        },
        _ => false,
    }
}

fn single_occurrence_overlaps(comp: &Component, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    match comp_time(comp, "DTSTART") {
        Some(t) => {
            let comp_end = comp_time(comp, "DTEND")
                .map(|e| e.span_end())
                .or_else(|| prop_duration_of(comp).map(|d| t.utc + d))
                .unwrap_or(t.span_end());
            recur::overlaps(t.utc, comp_end, start, end)
        }
        None => false,
    }
}

fn prop_duration_of(comp: &Component) -> Option<TimeDelta> {
    comp.prop("DURATION").and_then(prop_duration)
}

/// RFC 4791 §9.9, the VTODO row table.
fn todo_in_range(comp: &Component, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let dtstart = comp_time(comp, "DTSTART").map(|t| t.utc);
    let duration = prop_duration_of(comp);
    let due = comp_time(comp, "DUE").map(|t| t.utc);
    let completed = comp_time(comp, "COMPLETED").map(|t| t.utc);
    let created = comp_time(comp, "CREATED").map(|t| t.utc);

    match (dtstart, duration, due, completed, created) {
        //    | Y | Y | N | * | * | (start  <= DTSTART+DURATION)  AND             |
        //    |   |   |   |   |   | ((end   >  DTSTART)  OR                       |
        //    |   |   |   |   |   |  (end   >= DTSTART+DURATION))                 |
        (Some(dtstart), Some(duration), None, _, _) => {
            start <= dtstart + duration && (end > dtstart || end >= dtstart + duration)
        }
        //    | Y | N | Y | * | * | ((start <  DUE)      OR  (start <= DTSTART))  |
        //    |   |   |   |   |   | AND                                           |
        //    |   |   |   |   |   | ((end   >  DTSTART)  OR  (end   >= DUE))      |
        (Some(dtstart), None, Some(due), _, _) => {
            (start < due || start <= dtstart) && (end > dtstart || end >= due)
        }
        //    | Y | N | N | * | * | (start  <= DTSTART)  AND (end >  DTSTART)     |
        (Some(dtstart), None, None, _, _) => start <= dtstart && end > dtstart,
        //    | N | N | Y | * | * | (start  <  DUE)      AND (end >= DUE)         |
        (None, None, Some(due), _, _) => start < due && end >= due,
        //    | N | N | N | Y | Y | ((start <= CREATED)  OR  (start <= COMPLETED))|
        //    |   |   |   |   |   | AND                                           |
        //    |   |   |   |   |   | ((end   >= CREATED)  OR  (end   >= COMPLETED))|
        (None, None, None, Some(completed), Some(created)) => {
            (start <= created || start <= completed) && (end >= created || end >= completed)
        }
        //    | N | N | N | Y | N | (start  <= COMPLETED) AND (end  >= COMPLETED) |
        (None, None, None, Some(completed), None) => start <= completed && end >= completed,
        //    | N | N | N | N | Y | (end    >  CREATED)                           |
        (None, None, None, None, Some(created)) => end > created,
        //    | N | N | N | N | N | TRUE                                          |
        _ => true,
    }
}

/// VALARM trigger resolution: absolute, or relative to the parent's
/// start/end reference point.
fn resolve_trigger(parent: &Component, alarm: &Component) -> Option<DateTime<Utc>> {
    let trigger = alarm.prop("TRIGGER")?;

    let is_absolute = trigger
        .param("VALUE")
        .map(|v| v.eq_ignore_ascii_case("DATE-TIME"))
        .unwrap_or(false);
    if is_absolute {
        return prop_time(trigger).map(|t| t.utc);
    }

    let delta = prop_duration(trigger)?;
    let related_field = match trigger.param("RELATED") {
        Some("END") => match parent.name.as_str() {
            "VTODO" => "DUE",
            _ => "DTEND",
        },
        _ => "DTSTART",
    };
    let anchor = comp_time(parent, related_field)?;
    Some(anchor.utc + delta)
}

fn prop_filter_matches(comp: &Component, filter: &cal::PropFilter) -> bool {
    let props: Vec<&Property> = comp.props(&filter.name.0).collect();

    match (&filter.additional_rules, props.is_empty()) {
        (None, empty) => !empty,
        (Some(cal::PropFilterRules::IsNotDefined), empty) => empty,
        (Some(cal::PropFilterRules::Match(_)), true) => false,
        (Some(cal::PropFilterRules::Match(matcher)), false) => props.iter().any(|prop| {
            if let Some(time_or_text) = &matcher.time_or_text {
                let ok = match time_or_text {
                    cal::TimeOrText::Time(range) => match prop_time(prop) {
                        // value-level ranges are inclusive
                        Some(t) => {
                            let (start, end) = range.bounds();
                            t.utc >= start && t.utc <= end
                        }
                        None => false,
                    },
                    cal::TimeOrText::Text(tm) => match_text(
                        tm.collation.as_ref(),
                        tm.match_type.as_ref(),
                        tm.negate_condition,
                        &tm.text,
                        &prop.value_unescaped(),
                    ),
                };
                if !ok {
                    return false;
                }
            }

            matcher
                .param_filter
                .iter()
                .all(|pf| param_filter_matches(prop, pf))
        }),
    }
}

fn param_filter_matches(prop: &Property, filter: &cal::ParamFilter) -> bool {
    let param = prop
        .params
        .iter()
        .find(|p| p.key.eq_ignore_ascii_case(filter.name.as_str()));

    match (&filter.additional_rules, param) {
        (None, found) => found.is_some(),
        (Some(cal::ParamFilterMatch::IsNotDefined), found) => found.is_none(),
        (Some(cal::ParamFilterMatch::Match(_)), None) => false,
        (Some(cal::ParamFilterMatch::Match(tm)), Some(param)) => {
            let value = param.values.first().map(|v| v.as_str()).unwrap_or("");
            match_text(
                tm.collation.as_ref(),
                tm.match_type.as_ref(),
                tm.negate_condition,
                &tm.text,
                value,
            )
        }
    }
}

/// Shared text-match core: collation then match-type, then negation.
pub fn match_text(
    collation: Option<&cal::Collation>,
    match_type: Option<&cal::MatchType>,
    negate: Option<bool>,
    pattern: &str,
    value: &str,
) -> bool {
    let (pattern, value) = match collation.unwrap_or(&cal::Collation::AsciiCaseMap) {
        cal::Collation::Octet => (pattern.to_string(), value.to_string()),
        // i;ascii-casemap; unknown collations degrade to it rather than
        // silently matching nothing
        _ => (pattern.to_ascii_lowercase(), value.to_ascii_lowercase()),
    };

    let matched = match match_type.unwrap_or(&cal::MatchType::Contains) {
        cal::MatchType::Contains => value.contains(&pattern),
        cal::MatchType::Equals => value == pattern,
        cal::MatchType::StartsWith => value.starts_with(&pattern),
        cal::MatchType::EndsWith => value.ends_with(&pattern),
    };

    match negate {
        Some(true) => !matched,
        _ => matched,
    }
}

// ---- CardDAV ----

/// Entry point for addressbook-query: `vcard` is the parsed VCARD.
pub fn vcard_matches(vcard: &Component, filter: &card::Filter) -> bool {
    if filter.prop_filters.is_empty() {
        return true;
    }
    let mut results = filter
        .prop_filters
        .iter()
        .map(|pf| card_prop_matches(vcard, pf));
    match filter.test.unwrap_or_default() {
        card::FilterTest::AnyOf => results.any(|r| r),
        card::FilterTest::AllOf => results.all(|r| r),
    }
}

fn card_prop_matches(vcard: &Component, filter: &card::PropFilter) -> bool {
    let props: Vec<&Property> = vcard.props(&filter.name).collect();

    match (&filter.additional_rules, props.is_empty()) {
        (None, empty) => !empty,
        (Some(card::PropFilterRules::IsNotDefined), empty) => empty,
        (Some(card::PropFilterRules::Match(_)), true) => false,
        (Some(card::PropFilterRules::Match(matcher)), false) => props.iter().any(|prop| {
            let text_results = || {
                matcher.text_match.iter().map(|tm| {
                    match_text(
                        tm.collation.as_ref(),
                        tm.match_type.as_ref(),
                        tm.negate_condition,
                        &tm.text,
                        &prop.value_unescaped(),
                    )
                })
            };
            let text_ok = if matcher.text_match.is_empty() {
                true
            } else {
                match filter.test.unwrap_or_default() {
                    card::FilterTest::AnyOf => text_results().any(|r| r),
                    card::FilterTest::AllOf => text_results().all(|r| r),
                }
            };
            if !text_ok {
                return false;
            }

            matcher
                .param_filter
                .iter()
                .all(|pf| card_param_filter_matches(prop, pf))
        }),
    }
}

fn card_param_filter_matches(prop: &Property, filter: &card::ParamFilter) -> bool {
    let param = prop
        .params
        .iter()
        .find(|p| p.key.eq_ignore_ascii_case(&filter.name));

    match (&filter.additional_rules, param) {
        (None, found) => found.is_some(),
        (Some(card::ParamFilterMatch::IsNotDefined), found) => found.is_none(),
        (Some(card::ParamFilterMatch::Match(_)), None) => false,
        (Some(card::ParamFilterMatch::Match(tm)), Some(param)) => {
            let value = param.values.first().map(|v| v.as_str()).unwrap_or("");
            match_text(
                tm.collation.as_ref(),
                tm.match_type.as_ref(),
                tm.negate_condition,
                &tm.text,
                value,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_calendar, parse_vcard};
    use chrono::TimeZone;

    fn vevent_time_range_filter(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> cal::Filter {
        cal::Filter(cal::CompFilter {
            name: cal::Component::VCalendar,
            additional_rules: Some(cal::CompFilterRules::Matches(cal::CompFilterMatch {
                time_range: None,
                prop_filter: vec![],
                comp_filter: vec![cal::CompFilter {
                    name: cal::Component::VEvent,
                    additional_rules: Some(cal::CompFilterRules::Matches(cal::CompFilterMatch {
                        time_range: Some(cal::TimeRange::FullRange(start, end)),
                        prop_filter: vec![],
                        comp_filter: vec![],
                    })),
                }],
            })),
        })
    }

    #[test]
    fn time_range_selects_january_event() {
        let january = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:jan\r\nDTSTART:20240115T120000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();
        let february = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:feb\r\nDTSTART:20240215T120000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();

        let filter = vevent_time_range_filter(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        );

        assert!(calendar_matches(&january, &filter));
        assert!(!calendar_matches(&february, &filter));
    }

    #[test]
    fn time_range_expands_recurrence() {
        // starts in December but repeats into the January window
        let cal = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:rec\r\nDTSTART:20231215T120000Z\r\nRRULE:FREQ=MONTHLY\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();

        let filter = vevent_time_range_filter(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        );
        assert!(calendar_matches(&cal, &filter));
    }

    #[test]
    fn comp_presence_and_is_not_defined() {
        let cal = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();

        let present = cal::Filter(cal::CompFilter {
            name: cal::Component::VCalendar,
            additional_rules: Some(cal::CompFilterRules::Matches(cal::CompFilterMatch {
                time_range: None,
                prop_filter: vec![],
                comp_filter: vec![cal::CompFilter {
                    name: cal::Component::VTodo,
                    additional_rules: Some(cal::CompFilterRules::IsNotDefined),
                }],
            })),
        });
        assert!(calendar_matches(&cal, &present));
    }

    #[test]
    fn prop_text_match_negate() {
        let cal = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VTODO\r\nUID:t\r\nSTATUS:NEEDS-ACTION\r\nEND:VTODO\r\nEND:VCALENDAR\r\n").unwrap();

        let filter = cal::Filter(cal::CompFilter {
            name: cal::Component::VCalendar,
            additional_rules: Some(cal::CompFilterRules::Matches(cal::CompFilterMatch {
                time_range: None,
                prop_filter: vec![],
                comp_filter: vec![cal::CompFilter {
                    name: cal::Component::VTodo,
                    additional_rules: Some(cal::CompFilterRules::Matches(cal::CompFilterMatch {
                        time_range: None,
                        prop_filter: vec![cal::PropFilter {
                            name: cal::ComponentProperty("STATUS".into()),
                            additional_rules: Some(cal::PropFilterRules::Match(
                                cal::PropFilterMatch {
                                    time_or_text: Some(cal::TimeOrText::Text(cal::TextMatch {
                                        collation: None,
                                        negate_condition: Some(true),
                                        match_type: None,
                                        text: "CANCELLED".into(),
                                    })),
                                    param_filter: vec![],
                                },
                            )),
                        }],
                        comp_filter: vec![],
                    })),
                }],
            })),
        });
        assert!(calendar_matches(&cal, &filter));
    }

    #[test]
    fn match_types() {
        assert!(match_text(None, Some(&cal::MatchType::Equals), None, "Week Sync", "week sync"));
        assert!(match_text(None, Some(&cal::MatchType::StartsWith), None, "week", "Week Sync"));
        assert!(match_text(None, Some(&cal::MatchType::EndsWith), None, "sync", "Week Sync"));
        assert!(!match_text(
            Some(&cal::Collation::Octet),
            Some(&cal::MatchType::Equals),
            None,
            "Week Sync",
            "week sync"
        ));
    }

    #[test]
    fn param_filter() {
        let cal = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nATTENDEE;PARTSTAT=DECLINED:mailto:x@y.tld\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();
        let evt = cal.comps("VEVENT").next().unwrap();

        let pf = cal::PropFilter {
            name: cal::ComponentProperty("ATTENDEE".into()),
            additional_rules: Some(cal::PropFilterRules::Match(cal::PropFilterMatch {
                time_or_text: None,
                param_filter: vec![cal::ParamFilter {
                    name: cal::PropertyParameter("PARTSTAT".into()),
                    additional_rules: Some(cal::ParamFilterMatch::Match(cal::TextMatch {
                        collation: None,
                        negate_condition: None,
                        match_type: None,
                        text: "declined".into(),
                    })),
                }],
            })),
        };
        assert!(prop_filter_matches(evt, &pf));
    }

    #[test]
    fn vcard_nickname_equals() {
        let vcf = parse_vcard("BEGIN:VCARD\r\nVERSION:3.0\r\nUID:c\r\nFN:Jane\r\nNICKNAME:me\r\nEND:VCARD\r\n").unwrap();

        let filter = card::Filter {
            test: None,
            prop_filters: vec![card::PropFilter {
                name: "NICKNAME".into(),
                test: None,
                additional_rules: Some(card::PropFilterRules::Match(card::PropFilterMatch {
                    text_match: vec![card::TextMatch {
                        collation: None,
                        negate_condition: None,
                        match_type: Some(cal::MatchType::Equals),
                        text: "me".into(),
                    }],
                    param_filter: vec![],
                })),
            }],
        };
        assert!(vcard_matches(&vcf, &filter));
    }

    #[test]
    fn vcard_allof_vs_anyof() {
        let vcf = parse_vcard("BEGIN:VCARD\r\nVERSION:3.0\r\nUID:c\r\nFN:Jane Doe\r\nEND:VCARD\r\n").unwrap();

        let fn_match = card::PropFilter {
            name: "FN".into(),
            test: None,
            additional_rules: None,
        };
        let org_match = card::PropFilter {
            name: "ORG".into(),
            test: None,
            additional_rules: None,
        };

        let anyof = card::Filter {
            test: Some(card::FilterTest::AnyOf),
            prop_filters: vec![fn_match.clone(), org_match.clone()],
        };
        let allof = card::Filter {
            test: Some(card::FilterTest::AllOf),
            prop_filters: vec![fn_match, org_match],
        };
        assert!(vcard_matches(&vcf, &anyof));
        assert!(!vcard_matches(&vcf, &allof));
    }
}

//! Index-assisted filter evaluation.
//!
//! An index entry maps path-shaped keys (`C=VCALENDAR/C=VEVENT/P=DTSTART`)
//! to the raw property values found at that path. Keys are derived from a
//! filter with [`required_keys_cal`]/[`required_keys_card`]; checking a
//! filter against indexed values is three-valued: `Some(true)`,
//! `Some(false)`, or `None` when the values cannot decide (recurrence
//! involved, parameters requested, several components in one object).
//! `None` means "fetch the body and run the full evaluation".

use std::collections::HashMap;

use carillon_dav::caltypes as cal;
use carillon_dav::cardtypes as card;

use crate::dates::{date_or_datetime, dur_value};
use crate::parser::{unescape, Component};
use crate::query::match_text;
use crate::recur;
use crate::validate::ItemKind;

pub type IndexKey = String;

/// Values extracted for one object, keyed by index key. Presence keys
/// store one empty marker per matching component.
pub type IndexValues = HashMap<IndexKey, Vec<String>>;

/// Properties consulted by a time-range check, indexed alongside it.
const TIME_RANGE_PROPS: &[&str] = &[
    "DTSTART",
    "DTEND",
    "DURATION",
    "DUE",
    "COMPLETED",
    "CREATED",
    "FREEBUSY",
    "RRULE",
    "RDATE",
    "EXDATE",
    "RECURRENCE-ID",
];

/// The keys a store needs to enforce UID uniqueness per collection kind.
pub fn uid_keys(kind: ItemKind) -> Vec<IndexKey> {
    match kind {
        ItemKind::Calendar => ["VEVENT", "VTODO", "VJOURNAL", "VFREEBUSY"]
            .iter()
            .map(|c| format!("C=VCALENDAR/C={}/P=UID", c))
            .collect(),
        ItemKind::Addressbook => vec!["C=VCARD/P=UID".to_string()],
    }
}

// ---- key derivation ----

pub fn required_keys_cal(filter: &cal::Filter) -> Vec<IndexKey> {
    let mut keys = Vec::new();
    comp_keys(&filter.0, "", &mut keys);
    keys.sort();
    keys.dedup();
    keys
}

fn comp_keys(filter: &cal::CompFilter, prefix: &str, keys: &mut Vec<IndexKey>) {
    let path = match prefix.is_empty() {
        true => format!("C={}", filter.name.as_str()),
        false => format!("{}/C={}", prefix, filter.name.as_str()),
    };
    keys.push(path.clone());

    if let Some(cal::CompFilterRules::Matches(matcher)) = &filter.additional_rules {
        if matcher.time_range.is_some() {
            for prop in TIME_RANGE_PROPS {
                keys.push(format!("{}/P={}", path, prop));
            }
        }
        for pf in matcher.prop_filter.iter() {
            keys.push(format!("{}/P={}", path, pf.name.0.to_ascii_uppercase()));
        }
        for inner in matcher.comp_filter.iter() {
            comp_keys(inner, &path, keys);
        }
    }
}

pub fn required_keys_card(filter: &card::Filter) -> Vec<IndexKey> {
    let mut keys = vec!["C=VCARD".to_string()];
    for pf in filter.prop_filters.iter() {
        keys.push(format!("C=VCARD/P={}", pf.name.to_ascii_uppercase()));
    }
    keys.sort();
    keys.dedup();
    keys
}

// ---- extraction ----

/// Compute the values of `keys` for a parsed object. Every requested key
/// gets an entry, so a missing key in a cached map means the cache was
/// built for a different key set.
pub fn extract(root: &Component, keys: &[IndexKey]) -> IndexValues {
    let mut out = IndexValues::new();
    for key in keys {
        out.insert(key.clone(), extract_one(root, key));
    }
    out
}

fn extract_one(root: &Component, key: &str) -> Vec<String> {
    let mut comps: Vec<&Component> = Vec::new();
    let mut prop: Option<&str> = None;

    for (i, seg) in key.split('/').enumerate() {
        if let Some(name) = seg.strip_prefix("C=") {
            if i == 0 {
                if root.name.eq_ignore_ascii_case(name) {
                    comps.push(root);
                }
            } else {
                let mut next = Vec::new();
                for c in comps.iter() {
                    next.extend(c.comps(name));
                }
                comps = next;
            }
        } else if let Some(name) = seg.strip_prefix("P=") {
            prop = Some(name);
            break;
        }
    }

    match prop {
        None => comps.iter().map(|_| String::new()).collect(),
        Some(name) => comps
            .iter()
            .flat_map(|c| c.props(name))
            .map(|p| p.value.clone())
            .collect(),
    }
}

// ---- three-valued checking ----

fn and3(acc: Option<bool>, item: Option<bool>) -> Option<bool> {
    match (acc, item) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (None, _) | (_, None) => None,
        (Some(true), Some(true)) => Some(true),
    }
}

fn or3(acc: Option<bool>, item: Option<bool>) -> Option<bool> {
    match (acc, item) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (None, _) | (_, None) => None,
        (Some(false), Some(false)) => Some(false),
    }
}

pub fn check_cal(filter: &cal::Filter, values: &IndexValues) -> Option<bool> {
    check_comp(&filter.0, "", values)
}

fn check_comp(filter: &cal::CompFilter, prefix: &str, values: &IndexValues) -> Option<bool> {
    let path = match prefix.is_empty() {
        true => format!("C={}", filter.name.as_str()),
        false => format!("{}/C={}", prefix, filter.name.as_str()),
    };
    let present = values.get(&path)?;
    let count = present.len();

    match &filter.additional_rules {
        None => Some(count > 0),
        Some(cal::CompFilterRules::IsNotDefined) => Some(count == 0),
        Some(cal::CompFilterRules::Matches(_)) if count == 0 => Some(false),
        Some(cal::CompFilterRules::Matches(matcher)) => {
            // Conjunctions across several sibling components cannot be
            // paired up from flattened value lists.
            let multi = count > 1;
            if multi && (matcher.prop_filter.len() + matcher.comp_filter.len()) > 1 {
                return None;
            }

            let mut acc = Some(true);
            if let Some(range) = &matcher.time_range {
                if multi {
                    return None;
                }
                acc = and3(acc, check_time_range(&filter.name, range, &path, values));
            }
            for pf in matcher.prop_filter.iter() {
                acc = and3(acc, check_prop(pf, &path, values));
                if acc == Some(false) {
                    return acc;
                }
            }
            for inner in matcher.comp_filter.iter() {
                acc = and3(acc, check_comp(inner, &path, values));
                if acc == Some(false) {
                    return acc;
                }
            }
            acc
        }
    }
}

fn check_time_range(
    comp: &cal::Component,
    range: &cal::TimeRange,
    path: &str,
    values: &IndexValues,
) -> Option<bool> {
    let get = |p: &str| values.get(&format!("{}/P={}", path, p));

    // any recurrence machinery and the index cannot answer
    let recurs = ["RRULE", "RDATE", "EXDATE", "RECURRENCE-ID"]
        .iter()
        .any(|p| get(p).map(|v| !v.is_empty()).unwrap_or(true));
    if recurs {
        return None;
    }

    let (start, end) = range.bounds();
    match comp {
        cal::Component::VEvent => {
            let dtstart_vals = get("DTSTART")?;
            if dtstart_vals.len() != 1 {
                return None;
            }
            let dtstart = date_or_datetime(&dtstart_vals[0])?;
            let comp_end = match get("DTEND")?.first() {
                Some(raw) => date_or_datetime(raw)?.span_end(),
                None => match get("DURATION")?.first() {
                    Some(raw) => dtstart.utc + dur_value(raw.trim()).ok()?.1,
                    None => dtstart.span_end(),
                },
            };
            Some(recur::overlaps(dtstart.utc, comp_end, start, end))
        }
        // the VTODO/VJOURNAL/VFREEBUSY tables involve more fields than
        // are worth mirroring here; let the full parse decide
        _ => None,
    }
}

fn check_prop(filter: &cal::PropFilter, path: &str, values: &IndexValues) -> Option<bool> {
    let key = format!("{}/P={}", path, filter.name.0.to_ascii_uppercase());
    let vals = values.get(&key)?;

    match &filter.additional_rules {
        None => Some(!vals.is_empty()),
        Some(cal::PropFilterRules::IsNotDefined) => Some(vals.is_empty()),
        Some(cal::PropFilterRules::Match(_)) if vals.is_empty() => Some(false),
        Some(cal::PropFilterRules::Match(matcher)) => {
            if !matcher.param_filter.is_empty() {
                // parameters are not indexed
                return None;
            }
            match &matcher.time_or_text {
                None => Some(true),
                Some(cal::TimeOrText::Text(tm)) => Some(vals.iter().any(|raw| {
                    match_text(
                        tm.collation.as_ref(),
                        tm.match_type.as_ref(),
                        tm.negate_condition,
                        &tm.text,
                        &unescape(raw),
                    )
                })),
                Some(cal::TimeOrText::Time(range)) => {
                    let (start, end) = range.bounds();
                    let mut any = Some(false);
                    for raw in vals.iter() {
                        match date_or_datetime(raw) {
                            Some(t) => {
                                any = or3(any, Some(t.utc >= start && t.utc <= end));
                            }
                            None => any = or3(any, None),
                        }
                    }
                    any
                }
            }
        }
    }
}

pub fn check_card(filter: &card::Filter, values: &IndexValues) -> Option<bool> {
    let present = values.get("C=VCARD")?;
    if present.is_empty() {
        return Some(false);
    }
    if filter.prop_filters.is_empty() {
        return Some(true);
    }

    let mut acc = match filter.test.unwrap_or_default() {
        card::FilterTest::AnyOf => Some(false),
        card::FilterTest::AllOf => Some(true),
    };
    for pf in filter.prop_filters.iter() {
        let item = check_card_prop(pf, values);
        acc = match filter.test.unwrap_or_default() {
            card::FilterTest::AnyOf => or3(acc, item),
            card::FilterTest::AllOf => and3(acc, item),
        };
    }
    acc
}

fn check_card_prop(filter: &card::PropFilter, values: &IndexValues) -> Option<bool> {
    let key = format!("C=VCARD/P={}", filter.name.to_ascii_uppercase());
    let vals = values.get(&key)?;

    match &filter.additional_rules {
        None => Some(!vals.is_empty()),
        Some(card::PropFilterRules::IsNotDefined) => Some(vals.is_empty()),
        Some(card::PropFilterRules::Match(_)) if vals.is_empty() => Some(false),
        Some(card::PropFilterRules::Match(matcher)) => {
            if !matcher.param_filter.is_empty() {
                return None;
            }
            if matcher.text_match.is_empty() {
                return Some(true);
            }
            let per_text = |tm: &card::TextMatch| {
                vals.iter().any(|raw| {
                    match_text(
                        tm.collation.as_ref(),
                        tm.match_type.as_ref(),
                        tm.negate_condition,
                        &tm.text,
                        &unescape(raw),
                    )
                })
            };
            let ok = match filter.test.unwrap_or_default() {
                card::FilterTest::AnyOf => matcher.text_match.iter().any(|tm| per_text(tm)),
                card::FilterTest::AllOf => matcher.text_match.iter().all(|tm| per_text(tm)),
            };
            Some(ok)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_calendar;
    use crate::query;
    use chrono::{TimeZone, Utc};

    fn time_range_filter(start_day: u32, end_day: u32) -> cal::Filter {
        cal::Filter(cal::CompFilter {
            name: cal::Component::VCalendar,
            additional_rules: Some(cal::CompFilterRules::Matches(cal::CompFilterMatch {
                time_range: None,
                prop_filter: vec![],
                comp_filter: vec![cal::CompFilter {
                    name: cal::Component::VEvent,
                    additional_rules: Some(cal::CompFilterRules::Matches(cal::CompFilterMatch {
                        time_range: Some(cal::TimeRange::FullRange(
                            Utc.with_ymd_and_hms(2024, 1, start_day, 0, 0, 0).unwrap(),
                            Utc.with_ymd_and_hms(2024, 1, end_day, 0, 0, 0).unwrap(),
                        )),
                        prop_filter: vec![],
                        comp_filter: vec![],
                    })),
                }],
            })),
        })
    }

    #[test]
    fn index_decides_plain_event() {
        let cal = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240115T120000Z\r\nDTEND:20240115T130000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();

        let hit = time_range_filter(10, 20);
        let miss = time_range_filter(20, 25);

        for filter in [&hit, &miss] {
            let keys = required_keys_cal(filter);
            let values = extract(&cal, &keys);
            let indexed = check_cal(filter, &values);
            let full = query::calendar_matches(&cal, filter);
            // the invariant: a decided index answer equals the full parse
            assert_eq!(indexed, Some(full));
        }
    }

    #[test]
    fn recurrence_defers_to_full_parse() {
        let cal = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20231215T120000Z\r\nRRULE:FREQ=MONTHLY\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();

        let filter = time_range_filter(10, 20);
        let keys = required_keys_cal(&filter);
        let values = extract(&cal, &keys);
        assert_eq!(check_cal(&filter, &values), None);
        // and the full parse does find the January instance
        assert!(query::calendar_matches(&cal, &filter));
    }

    #[test]
    fn presence_keys() {
        let cal = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VTODO\r\nUID:t\r\nSUMMARY:x\r\nEND:VTODO\r\nEND:VCALENDAR\r\n").unwrap();
        let values = extract(
            &cal,
            &[
                "C=VCALENDAR/C=VTODO".to_string(),
                "C=VCALENDAR/C=VEVENT".to_string(),
                "C=VCALENDAR/C=VTODO/P=SUMMARY".to_string(),
            ],
        );
        assert_eq!(values["C=VCALENDAR/C=VTODO"].len(), 1);
        assert!(values["C=VCALENDAR/C=VEVENT"].is_empty());
        assert_eq!(values["C=VCALENDAR/C=VTODO/P=SUMMARY"], vec!["x".to_string()]);
    }

    #[test]
    fn uid_keys_extract() {
        let cal = parse_calendar("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n").unwrap();
        let keys = uid_keys(ItemKind::Calendar);
        let values = extract(&cal, &keys);
        let uids: Vec<&String> = values.values().flatten().collect();
        assert_eq!(uids, vec!["evt-1"]);
    }

    #[test]
    fn missing_key_is_unknown() {
        let filter = time_range_filter(10, 20);
        let values = IndexValues::new();
        assert_eq!(check_cal(&filter, &values), None);
    }
}

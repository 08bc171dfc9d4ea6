//! Content-line parser shared by iCalendar (RFC 5545 §3.1) and vCard
//! (RFC 6350 §3.3): both formats use the same
//! `NAME;PARAM=value:value CRLF` line grammar with folding, so a single
//! tree covers `.ics` and `.vcf` bodies.
//!
//! The tree keeps property order, raw (still escaped) values and raw
//! parameter values, so serialising it back yields the original bytes
//! modulo unfolding and CRLF normalisation.

use std::fmt;

use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::IResult;

use crate::IcalError;

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// vCard 4.0 property group (`item1.TEL` has group `item1`)
    pub group: Option<String>,
    pub name: String,
    pub params: Vec<Param>,
    /// Raw value, escape sequences untouched
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub key: String,
    /// Raw values, quoting stripped
    pub values: Vec<String>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn prop(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn props<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Property> + 'a {
        self.properties
            .iter()
            .filter(move |p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn comps<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Component> + 'a {
        self.components
            .iter()
            .filter(move |c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn push_prop(&mut self, name: &str, value: &str) {
        self.properties.push(Property {
            group: None,
            name: name.to_string(),
            params: Vec::new(),
            value: value.to_string(),
        });
    }
}

impl Property {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(key))
            .and_then(|p| p.values.first())
            .map(|v| v.as_str())
    }

    /// Value with RFC 5545 §3.3.11 TEXT escapes resolved
    pub fn value_unescaped(&self) -> String {
        unescape(&self.value)
    }
}

pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => (),
            other => out.push(other),
        }
    }
    out
}

// ---- line grammar (nom) ----

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char)(input)
}

fn quoted_value(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_while(|c| c != '"'), char('"'))(input)
}

fn raw_param_value(input: &str) -> IResult<&str, &str> {
    take_while(|c| !matches!(c, ';' | ':' | ',' | '"'))(input)
}

fn param_value(input: &str) -> IResult<&str, &str> {
    alt((quoted_value, raw_param_value))(input)
}

fn param(input: &str) -> IResult<&str, Param> {
    map(
        separated_pair(name, char('='), separated_list1(char(','), param_value)),
        |(key, values)| Param {
            key: key.to_string(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        },
    )(input)
}

/// An unfolded content line: `[group.]NAME;PARAM=a,b:value`
fn content_line(input: &str) -> IResult<&str, Property> {
    map(
        pair(
            pair(opt(nom::sequence::terminated(name, char('.'))), name),
            pair(many0(preceded(char(';'), param)), preceded(char(':'), nom::combinator::rest)),
        ),
        |((group, prop_name), (params, value))| Property {
            group: group.map(|g| g.to_string()),
            name: prop_name.to_string(),
            params,
            value: value.to_string(),
        },
    )(input)
}

/// Undo RFC 5545 §3.1 line folding and normalise line endings.
fn unfold(src: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    for (no, raw) in src.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = line.strip_prefix(' ').or_else(|| line.strip_prefix('\t')) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if !line.is_empty() {
            lines.push((no + 1, line.to_string()));
        }
    }
    lines
}

/// Parse a complete object (the outermost BEGIN/END pair).
pub fn parse(src: &str) -> Result<Component, IcalError> {
    let lines = unfold(src);
    let mut stack: Vec<Component> = Vec::new();
    let mut root: Option<Component> = None;

    for (no, line) in lines {
        let prop = match content_line(&line) {
            Ok(("", prop)) => prop,
            _ => return Err(IcalError::Syntax(no, line)),
        };

        if prop.name.eq_ignore_ascii_case("BEGIN") {
            stack.push(Component::new(prop.value.trim().to_ascii_uppercase()));
        } else if prop.name.eq_ignore_ascii_case("END") {
            let done = stack.pop().ok_or_else(|| IcalError::Syntax(no, line.clone()))?;
            let end_name = prop.value.trim().to_ascii_uppercase();
            if done.name != end_name {
                return Err(IcalError::MismatchedEnd {
                    expected: done.name,
                    got: end_name,
                });
            }
            match stack.last_mut() {
                Some(parent) => parent.components.push(done),
                None => {
                    root = Some(done);
                    break;
                }
            }
        } else {
            match stack.last_mut() {
                Some(current) => current.properties.push(prop),
                None => return Err(IcalError::Syntax(no, line)),
            }
        }
    }

    if let Some(open) = stack.pop() {
        return Err(IcalError::UnterminatedComponent(open.name));
    }
    root.ok_or(IcalError::Empty)
}

/// Parse and check the object is an iCalendar stream.
pub fn parse_calendar(src: &str) -> Result<Component, IcalError> {
    let root = parse(src)?;
    match root.name.as_str() {
        "VCALENDAR" => Ok(root),
        _ => Err(IcalError::WrongObjectKind("VCALENDAR")),
    }
}

/// Parse and check the object is a vCard.
pub fn parse_vcard(src: &str) -> Result<Component, IcalError> {
    let root = parse(src)?;
    match root.name.as_str() {
        "VCARD" => Ok(root),
        _ => Err(IcalError::WrongObjectKind("VCARD")),
    }
}

// ---- serialization ----

/// Fold a logical line at 75 octets, on char boundaries (RFC 5545 §3.1).
fn fold_into(out: &mut String, line: &str) {
    let mut budget = 75;
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > budget {
            out.push_str("\r\n ");
            width = 0;
            budget = 74;
        }
        out.push(c);
        width += len;
    }
    out.push_str("\r\n");
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.key)?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            // re-quote when the raw value contains separators
            if v.contains([';', ':', ',']) {
                write!(f, "\"{}\"", v)?;
            } else {
                write!(f, "{}", v)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(group) = &self.group {
            write!(f, "{}.", group)?;
        }
        write!(f, "{}", self.name)?;
        for p in self.params.iter() {
            write!(f, ";{}", p)?;
        }
        write!(f, ":{}", self.value)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_into(&mut out);
        f.write_str(&out)
    }
}

impl Component {
    fn write_into(&self, out: &mut String) {
        fold_into(out, &format!("BEGIN:{}", self.name));
        for prop in self.properties.iter() {
            fold_into(out, &prop.to_string());
        }
        for comp in self.components.iter() {
            comp.write_into(out);
        }
        fold_into(out, &format!("END:{}", self.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_EVENT: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Example//Test//EN\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nDTSTART:20240115T120000Z\r\nDTEND:20240115T130000Z\r\nSUMMARY:Lunch with Noor\\, downtown\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    #[test]
    fn parse_simple_event() {
        let cal = parse_calendar(SIMPLE_EVENT).unwrap();
        assert_eq!(cal.name, "VCALENDAR");
        assert_eq!(cal.properties.len(), 2);
        let evt = cal.comps("VEVENT").next().unwrap();
        assert_eq!(evt.prop("UID").unwrap().value, "evt-1");
        assert_eq!(
            evt.prop("SUMMARY").unwrap().value_unescaped(),
            "Lunch with Noor, downtown"
        );
    }

    #[test]
    fn roundtrip_bytes() {
        let cal = parse_calendar(SIMPLE_EVENT).unwrap();
        assert_eq!(cal.to_string(), SIMPLE_EVENT);
    }

    #[test]
    fn unfold_and_lf_only_input() {
        let src = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:evt-2\nSUMMARY:a very long line that will have been\n  folded by some client\nEND:VEVENT\nEND:VCALENDAR\n";
        let cal = parse_calendar(src).unwrap();
        let evt = cal.comps("VEVENT").next().unwrap();
        assert_eq!(
            evt.prop("SUMMARY").unwrap().value,
            "a very long line that will have been folded by some client"
        );
    }

    #[test]
    fn parameters() {
        let src = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:evt-3\r\nDTSTART;TZID=Europe/Paris;VALUE=DATE-TIME:20240115T120000\r\nATTENDEE;CN=\"Doe; John\";PARTSTAT=ACCEPTED:mailto:john@example.org\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let cal = parse_calendar(src).unwrap();
        let evt = cal.comps("VEVENT").next().unwrap();
        let dtstart = evt.prop("DTSTART").unwrap();
        assert_eq!(dtstart.param("TZID"), Some("Europe/Paris"));
        assert_eq!(dtstart.param("VALUE"), Some("DATE-TIME"));
        let att = evt.prop("ATTENDEE").unwrap();
        assert_eq!(att.param("CN"), Some("Doe; John"));
        assert_eq!(att.value, "mailto:john@example.org");
    }

    #[test]
    fn vcard_with_group() {
        let src = "BEGIN:VCARD\r\nVERSION:4.0\r\nUID:card-1\r\nFN:Ada Lovelace\r\nitem1.TEL;TYPE=home:+33 1 23 45 67 89\r\nEND:VCARD\r\n";
        let card = parse_vcard(src).unwrap();
        let tel = card.prop("TEL").unwrap();
        assert_eq!(tel.group.as_deref(), Some("item1"));
        assert_eq!(card.to_string(), src);
    }

    #[test]
    fn long_line_folding() {
        let mut cal = Component::new("VCALENDAR");
        cal.push_prop("DESCRIPTION", &"x".repeat(200));
        let text = cal.to_string();
        for line in text.split("\r\n") {
            assert!(line.len() <= 75, "line too long: {}", line.len());
        }
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.prop("DESCRIPTION").unwrap().value, "x".repeat(200));
    }

    #[test]
    fn mismatched_end() {
        let src = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nEND:VTODO\r\nEND:VCALENDAR\r\n";
        assert!(matches!(
            parse(src),
            Err(IcalError::MismatchedEnd { .. })
        ));
    }
}

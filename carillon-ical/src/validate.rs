//! Import validation: what a collection accepts before committing bytes.
//!
//! A calendar object resource holds exactly one component group (all
//! components of the same kind, VTIMEZONE aside) sharing a single UID;
//! an addressbook resource holds exactly one vCard with a UID.

use crate::parser::{self, Component};
use crate::IcalError;

/// What kind of payloads a collection stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Calendar,
    Addressbook,
}

impl ItemKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Calendar => "text/calendar; charset=utf-8",
            Self::Addressbook => "text/vcard; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Calendar => "ics",
            Self::Addressbook => "vcf",
        }
    }
}

/// The result of a successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub uid: String,
    /// Component kind for calendars (VEVENT, VTODO, ...), "VCARD" for cards
    pub component: String,
    pub parsed: Component,
}

pub fn validate(kind: ItemKind, raw: &str) -> Result<Validated, IcalError> {
    match kind {
        ItemKind::Calendar => validate_calendar(raw),
        ItemKind::Addressbook => validate_vcard(raw),
    }
}

pub fn validate_calendar(raw: &str) -> Result<Validated, IcalError> {
    let cal = parser::parse_calendar(raw)?;

    let mut uid: Option<String> = None;
    let mut component: Option<String> = None;
    for comp in cal.components.iter() {
        if comp.name == "VTIMEZONE" {
            continue;
        }
        match &component {
            None => component = Some(comp.name.clone()),
            Some(kind) if *kind == comp.name => (),
            Some(kind) => {
                return Err(IcalError::MixedComponentKinds(
                    kind.clone(),
                    comp.name.clone(),
                ))
            }
        }
        let comp_uid = comp
            .prop("UID")
            .map(|p| p.value_unescaped())
            .ok_or(IcalError::MissingUid)?;
        match &uid {
            None => uid = Some(comp_uid),
            Some(known) if *known == comp_uid => (),
            Some(known) => return Err(IcalError::InconsistentUid(known.clone(), comp_uid)),
        }
    }

    match (uid, component) {
        (Some(uid), Some(component)) => Ok(Validated {
            uid,
            component,
            parsed: cal,
        }),
        _ => Err(IcalError::Empty),
    }
}

pub fn validate_vcard(raw: &str) -> Result<Validated, IcalError> {
    let card = parser::parse_vcard(raw)?;
    let uid = card
        .prop("UID")
        .map(|p| p.value_unescaped())
        .ok_or(IcalError::MissingUid)?;
    Ok(Validated {
        uid,
        component: "VCARD".into(),
        parsed: card,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_event() {
        let raw = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T000000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let v = validate(ItemKind::Calendar, raw).unwrap();
        assert_eq!(v.uid, "a");
        assert_eq!(v.component, "VEVENT");
    }

    #[test]
    fn accepts_recurring_event_with_override() {
        // master + overridden instance share the UID: one group
        let raw = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T000000Z\r\nRRULE:FREQ=DAILY\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:a\r\nRECURRENCE-ID:20240102T000000Z\r\nDTSTART:20240102T060000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(validate(ItemKind::Calendar, raw).is_ok());
    }

    #[test]
    fn rejects_missing_uid() {
        let raw = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nDTSTART:20240101T000000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(matches!(
            validate(ItemKind::Calendar, raw),
            Err(IcalError::MissingUid)
        ));
    }

    #[test]
    fn rejects_mixed_uids() {
        let raw = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:b\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(matches!(
            validate(ItemKind::Calendar, raw),
            Err(IcalError::InconsistentUid(_, _))
        ));
    }

    #[test]
    fn rejects_vcard_in_calendar() {
        let raw = "BEGIN:VCARD\r\nUID:c\r\nFN:X\r\nEND:VCARD\r\n";
        assert!(validate(ItemKind::Calendar, raw).is_err());
    }

    #[test]
    fn accepts_vcard() {
        let raw = "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:card-7\r\nFN:Grace Hopper\r\nEND:VCARD\r\n";
        let v = validate(ItemKind::Addressbook, raw).unwrap();
        assert_eq!(v.uid, "card-7");
        assert_eq!(v.component, "VCARD");
    }

    #[test]
    fn timezone_needs_no_uid() {
        let raw = "BEGIN:VCALENDAR\r\nBEGIN:VTIMEZONE\r\nTZID:Europe/Paris\r\nEND:VTIMEZONE\r\nBEGIN:VEVENT\r\nUID:a\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(validate(ItemKind::Calendar, raw).is_ok());
    }
}

#![allow(dead_code)]

use super::caltypes::{CalendarSelector, Collation, MatchType};
use super::types as dav;
use super::versioningtypes as vers;

// ----- Root elements -----

/// RFC 6352 §8.6 addressbook-query
///
/// <!ELEMENT addressbook-query ((DAV:allprop |
///                               DAV:propname |
///                               DAV:prop)?, filter, limit?)>
#[derive(Debug, PartialEq, Clone)]
pub struct AddressbookQuery<E: dav::Extension> {
    pub selector: Option<CalendarSelector<E>>,
    pub filter: Filter,
    pub limit: Option<vers::Limit>,
}

/// RFC 6352 §8.7 addressbook-multiget
///
/// <!ELEMENT addressbook-multiget ((DAV:allprop |
///                                  DAV:propname |
///                                  DAV:prop)?, DAV:href+)>
#[derive(Debug, PartialEq, Clone)]
pub struct AddressbookMultiget<E: dav::Extension> {
    pub selector: Option<CalendarSelector<E>>,
    pub href: Vec<dav::Href>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ReportType<E: dav::Extension> {
    Query(AddressbookQuery<E>),
    Multiget(AddressbookMultiget<E>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ReportTypeName {
    Query,
    Multiget,
}

// ----- Hooks -----
#[derive(Debug, PartialEq, Clone)]
pub enum ResourceType {
    Addressbook,
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyRequest {
    AddressbookHomeSet,
    AddressbookDescription,
    SupportedAddressData,
    MaxResourceSize,
    AddressData(AddressDataRequest),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Property {
    /// RFC 6352 §7.1.1
    ///
    /// <!ELEMENT addressbook-home-set (DAV:href*)>
    AddressbookHomeSet(dav::Href),

    /// RFC 6352 §6.2.1
    ///
    /// <!ELEMENT addressbook-description (#PCDATA)>
    AddressbookDescription {
        lang: Option<String>,
        text: String,
    },

    /// RFC 6352 §6.2.2
    ///
    /// <!ELEMENT supported-address-data (address-data-type+)>
    SupportedAddressData(Vec<AddressDataType>),

    /// RFC 6352 §6.2.3
    MaxResourceSize(u64),

    /// vCard body payload, as returned inside propstat
    AddressData(AddressDataPayload),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Violation {
    /// (CARDDAV) supported-address-data
    SupportedAddressData,

    /// (CARDDAV) valid-address-data
    ValidAddressData,

    /// (CARDDAV) no-uid-conflict: the vCard UID is already claimed by
    /// another resource of the addressbook.
    ///
    /// <!ELEMENT no-uid-conflict (DAV:href)>
    NoUidConflict(dav::Href),

    /// (CARDDAV) addressbook-collection-location-ok
    AddressbookCollectionLocationOk,

    /// (CARDDAV) max-resource-size
    MaxResourceSize,

    /// (CARDDAV) supported-collation
    SupportedCollation,

    /// (CARDDAV) supported-filter
    SupportedFilter,
}

// ----- Inner XML elements -----

/// RFC 6352 §10.4 address-data, request side
///
/// <!ELEMENT address-data (allprop | prop*)>
#[derive(Debug, PartialEq, Clone, Default)]
pub struct AddressDataRequest {
    pub mime: Option<AddressDataType>,
    pub prop: Vec<CardProp>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct AddressDataPayload {
    pub mime: Option<AddressDataType>,
    pub payload: String,
}

/// content-type/version attribute pair, also the address-data-type element
/// of supported-address-data
#[derive(Debug, PartialEq, Clone)]
pub struct AddressDataType {
    pub content_type: String,
    pub version: String,
}

/// prop as it appears inside address-data
///
/// <!ELEMENT prop EMPTY>
/// <!ATTLIST prop name CDATA #REQUIRED
///                novalue (yes | no) "no">
#[derive(Debug, PartialEq, Clone)]
pub struct CardProp {
    pub name: String,
    pub novalue: Option<bool>,
}

/// RFC 6352 §10.5 filter
///
/// <!ELEMENT filter (prop-filter*)>
/// <!ATTLIST filter test (anyof | allof) "anyof">
///
/// Unlike CalDAV there is no component level: vCards are flat.
#[derive(Debug, PartialEq, Clone)]
pub struct Filter {
    pub test: Option<FilterTest>,
    pub prop_filters: Vec<PropFilter>,
}

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum FilterTest {
    #[default]
    AnyOf,
    AllOf,
}
impl FilterTest {
    pub fn new(txt: &str) -> Option<Self> {
        match txt {
            "anyof" => Some(Self::AnyOf),
            "allof" => Some(Self::AllOf),
            _ => None,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnyOf => "anyof",
            Self::AllOf => "allof",
        }
    }
}

/// RFC 6352 §10.5.1 prop-filter
///
/// <!ELEMENT prop-filter (is-not-defined |
///                        (text-match*, param-filter*))>
/// <!ATTLIST prop-filter name CDATA #REQUIRED
///                       test (anyof | allof) "anyof">
#[derive(Debug, PartialEq, Clone)]
pub struct PropFilter {
    pub name: String,
    pub test: Option<FilterTest>,
    pub additional_rules: Option<PropFilterRules>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropFilterRules {
    IsNotDefined,
    Match(PropFilterMatch),
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropFilterMatch {
    pub text_match: Vec<TextMatch>,
    pub param_filter: Vec<ParamFilter>,
}

/// RFC 6352 §10.5.2 param-filter
///
/// <!ELEMENT param-filter (is-not-defined | text-match)?>
/// <!ATTLIST param-filter name CDATA #REQUIRED>
#[derive(Debug, PartialEq, Clone)]
pub struct ParamFilter {
    pub name: String,
    pub additional_rules: Option<ParamFilterMatch>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ParamFilterMatch {
    IsNotDefined,
    Match(TextMatch),
}

/// RFC 6352 §10.5.4 text-match
///
/// <!ELEMENT text-match (#PCDATA)>
/// <!ATTLIST text-match collation        CDATA "i;unicode-casemap"
///                      negate-condition (yes | no) "no"
///                      match-type (equals|contains|starts-with|ends-with)
///                                 "contains">
#[derive(Debug, PartialEq, Clone)]
pub struct TextMatch {
    pub collation: Option<Collation>,
    pub negate_condition: Option<bool>,
    pub match_type: Option<MatchType>,
    pub text: String,
}

#![allow(dead_code)]

use chrono::{DateTime, Utc};

use super::types as dav;

pub const FLOATING_DATETIME_FMT: &str = "%Y%m%dT%H%M%S";
pub const UTC_DATETIME_FMT: &str = "%Y%m%dT%H%M%SZ";
pub const ICAL_DATETIME_FMT: &str = "%Y%m%dT%H%M%SZ";
pub const ICAL_DATE_FMT: &str = "%Y%m%d";

// ----- Root elements -----

/// RFC 4791 §5.3.1
///
/// If a request body is included, it MUST be a CALDAV:mkcalendar XML
/// element.  Instructions MUST either all be executed or none executed.
///
/// <!ELEMENT mkcalendar (DAV:set)>
#[derive(Debug, PartialEq, Clone)]
pub struct MkCalendar<E: dav::Extension>(pub dav::Set<E>);

/// If a response body for a successful request is included, it MUST
/// be a CALDAV:mkcalendar-response XML element.
///
/// <!ELEMENT mkcalendar-response ANY>
///
/// Tightened to the RFC 5689 mkcol-response definition:
/// <!ELEMENT mkcol-response (propstat+)>
#[derive(Debug, PartialEq, Clone)]
pub struct MkCalendarResponse<E: dav::Extension>(pub Vec<dav::PropStat<E>>);

// --- (REPORT PART) ---

/// Name:  calendar-query
///
/// <!ELEMENT calendar-query ((DAV:allprop |
///                            DAV:propname |
///                            DAV:prop)?, filter, timezone?)>
#[derive(Debug, PartialEq, Clone)]
pub struct CalendarQuery<E: dav::Extension> {
    pub selector: Option<CalendarSelector<E>>,
    pub filter: Filter,
    pub timezone: Option<TimeZone>,
}

/// Name:  calendar-multiget
///
/// <!ELEMENT calendar-multiget ((DAV:allprop |
///                               DAV:propname |
///                               DAV:prop)?, DAV:href+)>
#[derive(Debug, PartialEq, Clone)]
pub struct CalendarMultiget<E: dav::Extension> {
    pub selector: Option<CalendarSelector<E>>,
    pub href: Vec<dav::Href>,
}

/// Name:  free-busy-query
///
/// Purpose:  CalDAV report used to generate a VFREEBUSY to determine
/// busy time over a specific time range.
///
/// <!ELEMENT free-busy-query (time-range)>
#[derive(Debug, PartialEq, Clone)]
pub struct FreeBusyQuery(pub TimeRange);

#[derive(Debug, PartialEq, Clone)]
pub enum ReportType<E: dav::Extension> {
    Query(CalendarQuery<E>),
    Multiget(CalendarMultiget<E>),
    FreeBusy(FreeBusyQuery),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ReportTypeName {
    Query,
    Multiget,
    FreeBusy,
}

// ----- Hooks -----
#[derive(Debug, PartialEq, Clone)]
pub enum ResourceType {
    Calendar,
    /// RFC 6638 §2.2, discovery only
    ScheduleInbox,
    /// RFC 6638 §2.1, discovery only
    ScheduleOutbox,
    /// Webcal subscription, carries a source URL in its properties
    Subscribed,
}

/// Check the matching Property object for documentation
#[derive(Debug, PartialEq, Clone)]
pub enum PropertyRequest {
    CalendarHomeSet,
    CalendarDescription,
    CalendarTimezone,
    SupportedCalendarComponentSet,
    SupportedCalendarData,
    MaxResourceSize,
    MinDateTime,
    MaxDateTime,
    MaxInstances,
    MaxAttendeesPerInstance,
    SupportedCollationSet,
    CalendarData(CalendarDataRequest),
    ScheduleInboxUrl,
    ScheduleOutboxUrl,
    CalendarUserAddressSet,
    Source,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Property {
    /// RFC 4791 §6.2.1, the collections that contain calendars owned by
    /// the principal.
    ///
    /// <!ELEMENT calendar-home-set (DAV:href*)>
    CalendarHomeSet(dav::Href),

    /// RFC 4791 §5.2.1
    ///
    /// <!ELEMENT calendar-description (#PCDATA)>
    CalendarDescription {
        lang: Option<String>,
        text: String,
    },

    /// RFC 4791 §5.2.2
    ///
    /// The time zone the server relies on to resolve "date" and floating
    /// "date with local time" values during time-range evaluation.
    ///
    /// <!ELEMENT calendar-timezone (#PCDATA)>
    /// PCDATA value: an iCalendar object with exactly one VTIMEZONE
    CalendarTimezone(String),

    /// RFC 4791 §5.2.3
    ///
    /// <!ELEMENT supported-calendar-component-set (comp+)>
    SupportedCalendarComponentSet(Vec<CompSupport>),

    /// RFC 4791 §5.2.4
    ///
    /// <!ELEMENT supported-calendar-data (calendar-data+)>
    SupportedCalendarData(Vec<CalendarDataEmpty>),

    /// RFC 4791 §5.2.5
    ///
    /// <!ELEMENT max-resource-size (#PCDATA)>
    MaxResourceSize(u64),

    /// RFC 4791 §5.2.6
    MinDateTime(DateTime<Utc>),

    /// RFC 4791 §5.2.7
    MaxDateTime(DateTime<Utc>),

    /// RFC 4791 §5.2.8
    MaxInstances(u64),

    /// RFC 4791 §5.2.9
    MaxAttendeesPerInstance(u64),

    /// RFC 4791 §7.5.1
    ///
    /// <!ELEMENT supported-collation-set (supported-collation*)>
    SupportedCollationSet(Vec<SupportedCollation>),

    /// Calendar body payload, as returned inside propstat
    CalendarData(CalendarDataPayload),

    /// RFC 6638 §2.2.1
    ///
    /// <!ELEMENT schedule-inbox-URL (DAV:href)>
    ScheduleInboxUrl(dav::Href),

    /// RFC 6638 §2.1.1
    ///
    /// <!ELEMENT schedule-outbox-URL (DAV:href)>
    ScheduleOutboxUrl(dav::Href),

    /// RFC 6638 §2.4.1
    ///
    /// <!ELEMENT calendar-user-address-set (DAV:href*)>
    CalendarUserAddressSet(Vec<dav::Href>),

    /// Webcal subscription source (calendarserver extension, served in the
    /// CalDAV namespace by several servers)
    Source(dav::Href),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Violation {
    /// (DAV) resource-must-be-null: a resource MUST NOT exist at the
    /// Request-URI; used with 403.
    ResourceMustBeNull,

    /// (CALDAV) calendar-collection-location-ok
    CalendarCollectionLocationOk,

    /// (CALDAV) valid-calendar-data: the body must be a valid iCalendar
    /// object.
    ValidCalendarData,

    /// (CALDAV) valid-calendar-object-resource: single component group,
    /// one UID.
    ValidCalendarObjectResource,

    /// (CALDAV) supported-calendar-data
    SupportedCalendarData,

    /// (CALDAV) supported-calendar-component
    SupportedCalendarComponent,

    /// (CALDAV) no-uid-conflict: the UID is already claimed by another
    /// resource of the collection; the href designates it.
    ///
    /// <!ELEMENT no-uid-conflict (DAV:href)>
    NoUidConflict(dav::Href),

    /// (CALDAV) max-resource-size
    MaxResourceSize,

    /// (CALDAV) min-date-time
    MinDateTime,

    /// (CALDAV) max-date-time
    MaxDateTime,

    /// (CALDAV) max-instances
    MaxInstances,

    /// (CALDAV) max-attendees-per-instance
    MaxAttendeesPerInstance,

    /// (CALDAV) valid-filter
    ValidFilter,

    /// (CALDAV) supported-filter: the filter references components,
    /// properties or parameters the server does not index.
    ///
    /// <!ELEMENT supported-filter (comp-filter*, prop-filter*, param-filter*)>
    SupportedFilter {
        comp: Vec<CompFilter>,
        prop: Vec<PropFilter>,
        param: Vec<ParamFilter>,
    },

    /// (DAV) number-of-matches-within-limits
    NumberOfMatchesWithinLimits,
}

// ----- Inner XML elements -----

/// RFC 4791 §9.6 calendar-data, as a request for a (possibly pruned or
/// expanded) calendar body.
///
/// <!ELEMENT calendar-data (comp?, (expand | limit-recurrence-set)?,
///                          limit-freebusy-set?)>
#[derive(Debug, PartialEq, Clone, Default)]
pub struct CalendarDataRequest {
    pub mime: Option<CalendarDataSupport>,
    pub comp: Option<Comp>,
    pub recurrence: Option<RecurrenceModifier>,
    pub limit_freebusy_set: Option<LimitFreebusySet>,
}

/// calendar-data carrying an actual iCalendar payload (response side)
#[derive(Debug, PartialEq, Clone)]
pub struct CalendarDataPayload {
    pub mime: Option<CalendarDataSupport>,
    pub payload: String,
}

/// calendar-data as it appears inside supported-calendar-data
///
/// <!ELEMENT calendar-data EMPTY>
#[derive(Debug, PartialEq, Clone)]
pub struct CalendarDataEmpty(pub Option<CalendarDataSupport>);

/// content-type and version attributes of calendar-data
#[derive(Debug, PartialEq, Clone)]
pub struct CalendarDataSupport {
    pub content_type: String,
    pub version: String,
}

/// RFC 4791 §9.6.1 comp
///
/// <!ELEMENT comp ((allprop | prop*), (allcomp | comp*))>
/// <!ATTLIST comp name CDATA #REQUIRED>
#[derive(Debug, PartialEq, Clone)]
pub struct Comp {
    pub name: Component,
    pub prop_kind: Option<PropKind>,
    pub comp_kind: Option<CompKind>,
}

/// comp as it appears inside supported-calendar-component-set
#[derive(Debug, PartialEq, Clone)]
pub struct CompSupport(pub Component);

#[derive(Debug, PartialEq, Clone)]
pub enum CompKind {
    AllComp,
    Comp(Vec<Comp>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropKind {
    AllProp,
    Prop(Vec<CalProp>),
}

/// prop as it appears inside calendar-data/comp
///
/// <!ELEMENT prop EMPTY>
/// <!ATTLIST prop name CDATA #REQUIRED
///                novalue (yes | no) "no">
#[derive(Debug, PartialEq, Clone)]
pub struct CalProp {
    pub name: ComponentProperty,
    pub novalue: Option<bool>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RecurrenceModifier {
    Expand(Expand),
    LimitRecurrenceSet(LimitRecurrenceSet),
}

/// RFC 4791 §9.6.5 expand
///
/// <!ELEMENT expand EMPTY>
/// <!ATTLIST expand start CDATA #REQUIRED
///                  end   CDATA #REQUIRED>
#[derive(Debug, PartialEq, Clone)]
pub struct Expand(pub DateTime<Utc>, pub DateTime<Utc>);

/// RFC 4791 §9.6.6 limit-recurrence-set
#[derive(Debug, PartialEq, Clone)]
pub struct LimitRecurrenceSet(pub DateTime<Utc>, pub DateTime<Utc>);

/// RFC 4791 §9.6.7 limit-freebusy-set
#[derive(Debug, PartialEq, Clone)]
pub struct LimitFreebusySet(pub DateTime<Utc>, pub DateTime<Utc>);

/// Prop selector of the CalDAV reports
#[derive(Debug, PartialEq, Clone)]
pub enum CalendarSelector<E: dav::Extension> {
    AllProp,
    PropName,
    Prop(dav::PropName<E>),
}

/// RFC 4791 §9.7.1 comp-filter
///
/// <!ELEMENT comp-filter (is-not-defined | (time-range?,
///                        prop-filter*, comp-filter*))>
/// <!ATTLIST comp-filter name CDATA #REQUIRED>
#[derive(Debug, PartialEq, Clone)]
pub struct CompFilter {
    pub name: Component,
    // Option 1 = None, empty, component exists
    // Option 2 = Some(IsNotDefined), component does not exist
    // Option 3 = Some(Matches(_)), component exists and matches
    pub additional_rules: Option<CompFilterRules>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum CompFilterRules {
    IsNotDefined,
    Matches(CompFilterMatch),
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompFilterMatch {
    pub time_range: Option<TimeRange>,
    pub prop_filter: Vec<PropFilter>,
    pub comp_filter: Vec<CompFilter>,
}

/// RFC 4791 §9.7.2 prop-filter
///
/// <!ELEMENT prop-filter (is-not-defined |
///                        ((time-range | text-match)?, param-filter*))>
/// <!ATTLIST prop-filter name CDATA #REQUIRED>
#[derive(Debug, PartialEq, Clone)]
pub struct PropFilter {
    pub name: ComponentProperty,
    pub additional_rules: Option<PropFilterRules>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropFilterRules {
    IsNotDefined,
    Match(PropFilterMatch),
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropFilterMatch {
    pub time_or_text: Option<TimeOrText>,
    pub param_filter: Vec<ParamFilter>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TimeOrText {
    Time(TimeRange),
    Text(TextMatch),
}

/// RFC 4791 §9.7.5 / RFC 6352 §10.5.4 text-match
///
/// <!ELEMENT text-match (#PCDATA)>
/// <!ATTLIST text-match collation        CDATA "i;ascii-casemap"
///                      negate-condition (yes | no) "no"
///                      match-type CDATA "contains">
///
/// match-type is a CardDAV attribute; some calendar clients send it too,
/// so it is accepted on both sides.
#[derive(Debug, PartialEq, Clone)]
pub struct TextMatch {
    pub collation: Option<Collation>,
    pub negate_condition: Option<bool>,
    pub match_type: Option<MatchType>,
    pub text: String,
}

#[derive(Debug, PartialEq, Clone)]
pub enum MatchType {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
}
impl MatchType {
    pub fn new(txt: &str) -> Option<Self> {
        match txt {
            "contains" => Some(Self::Contains),
            "equals" => Some(Self::Equals),
            "starts-with" => Some(Self::StartsWith),
            "ends-with" => Some(Self::EndsWith),
            _ => None,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::StartsWith => "starts-with",
            Self::EndsWith => "ends-with",
        }
    }
}

/// RFC 4791 §9.7.3 param-filter
///
/// <!ELEMENT param-filter (is-not-defined | text-match?)>
/// <!ATTLIST param-filter name CDATA #REQUIRED>
#[derive(Debug, PartialEq, Clone)]
pub struct ParamFilter {
    pub name: PropertyParameter,
    pub additional_rules: Option<ParamFilterMatch>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ParamFilterMatch {
    IsNotDefined,
    Match(TextMatch),
}

/// RFC 4791 §9.8 timezone
///
/// <!ELEMENT timezone (#PCDATA)>
/// PCDATA value: an iCalendar object with exactly one VTIMEZONE
#[derive(Debug, PartialEq, Clone)]
pub struct TimeZone(pub String);

/// RFC 4791 §9.7 filter
///
/// <!ELEMENT filter (comp-filter)>
#[derive(Debug, PartialEq, Clone)]
pub struct Filter(pub CompFilter);

/// RFC 4791 §9.9 time-range
///
/// <!ELEMENT time-range EMPTY>
/// <!ATTLIST time-range start CDATA #IMPLIED
///                      end   CDATA #IMPLIED>
///
/// Start and end are UTC; an undefined bound means open-ended.
#[derive(Debug, PartialEq, Clone)]
pub enum TimeRange {
    OnlyStart(DateTime<Utc>),
    OnlyEnd(DateTime<Utc>),
    FullRange(DateTime<Utc>, DateTime<Utc>),
}
impl TimeRange {
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            Self::OnlyStart(start) => (*start, DateTime::<Utc>::MAX_UTC),
            Self::OnlyEnd(end) => (DateTime::<Utc>::MIN_UTC, *end),
            Self::FullRange(start, end) => (*start, *end),
        }
    }
}

/// A component kind, by name. Unknown names are carried verbatim so that
/// filters against experimental components still evaluate.
#[derive(Debug, PartialEq, Clone)]
pub enum Component {
    VCalendar,
    VJournal,
    VFreeBusy,
    VEvent,
    VTodo,
    VAlarm,
    VTimeZone,
    VAvailability,
    Available,
    Unknown(String),
}
impl Component {
    pub fn new(v: String) -> Self {
        match v.as_str() {
            "VCALENDAR" => Self::VCalendar,
            "VJOURNAL" => Self::VJournal,
            "VFREEBUSY" => Self::VFreeBusy,
            "VEVENT" => Self::VEvent,
            "VTODO" => Self::VTodo,
            "VALARM" => Self::VAlarm,
            "VTIMEZONE" => Self::VTimeZone,
            "VAVAILABILITY" => Self::VAvailability,
            "AVAILABLE" => Self::Available,
            _ => Self::Unknown(v),
        }
    }
    pub fn as_str(&self) -> &str {
        match self {
            Self::VCalendar => "VCALENDAR",
            Self::VJournal => "VJOURNAL",
            Self::VFreeBusy => "VFREEBUSY",
            Self::VEvent => "VEVENT",
            Self::VTodo => "VTODO",
            Self::VAlarm => "VALARM",
            Self::VTimeZone => "VTIMEZONE",
            Self::VAvailability => "VAVAILABILITY",
            Self::Available => "AVAILABLE",
            Self::Unknown(c) => c,
        }
    }
}

/// name of a property of a component, like SUMMARY or DTSTART
#[derive(Debug, PartialEq, Clone)]
pub struct ComponentProperty(pub String);

/// like TZID or PARTSTAT
#[derive(Debug, PartialEq, Clone)]
pub struct PropertyParameter(pub String);
impl PropertyParameter {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// RFC 4790 collation identifiers. Only the two the RFC requires are
/// understood; anything else round-trips as Unknown and fails queries
/// with CALDAV:supported-collation.
#[derive(Default, Debug, PartialEq, Clone)]
pub enum Collation {
    #[default]
    AsciiCaseMap,
    Octet,
    Unknown(String),
}
impl Collation {
    pub fn new(v: String) -> Self {
        match v.as_str() {
            "i;ascii-casemap" => Self::AsciiCaseMap,
            "i;octet" => Self::Octet,
            _ => Self::Unknown(v),
        }
    }
    pub fn as_str(&self) -> &str {
        match self {
            Self::AsciiCaseMap => "i;ascii-casemap",
            Self::Octet => "i;octet",
            Self::Unknown(c) => c,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct SupportedCollation(pub Collation);

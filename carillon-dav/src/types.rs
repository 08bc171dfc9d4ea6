use std::fmt::Debug;

use chrono::{DateTime, FixedOffset};

use super::xml;

/// How a WebDAV extension plugs into the base element set.
///
/// Every extension point of RFC 4918 (error condition codes, property
/// names, property values, resource types, REPORT bodies) is an associated
/// type; `realization` combines the concrete namespaces into a single type
/// usable by the protocol layer.
pub trait Extension: Debug + PartialEq + Clone {
    type Error: xml::Node<Self::Error>;
    type Property: xml::Node<Self::Property>;
    type PropertyRequest: xml::Node<Self::PropertyRequest>;
    type ResourceType: xml::Node<Self::ResourceType>;
    type ReportType: xml::Node<Self::ReportType>;
    type ReportTypeName: xml::Node<Self::ReportTypeName>;
    type MultistatusExtension: xml::Node<Self::MultistatusExtension>;
}

/// 14.4 depth XML Element
///
/// Value:   "0" | "1" | "infinity"
///
/// <!ELEMENT depth (#PCDATA) >
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

/// 14.5 error XML Element
///
/// Description:   Contains at least one XML element, and MUST NOT
/// contain text or mixed content.  Any element that is a child of the
/// 'error' element is considered to be a precondition or
/// postcondition code.
///
/// <!ELEMENT error ANY >
#[derive(Debug, PartialEq, Clone)]
pub struct Error<E: Extension>(pub Vec<Violation<E>>);

#[derive(Debug, PartialEq, Clone)]
pub enum Violation<E: Extension> {
    /// Name:  no-external-entities
    ///
    /// Use with:  403 Forbidden
    ///
    /// Purpose:  (precondition) -- If the server rejects a client request
    /// because the request body contains an external entity, the server
    /// SHOULD use this error.
    NoExternalEntities,

    /// Name:  propfind-finite-depth
    ///
    /// Use with:  403 Forbidden
    ///
    /// Purpose:  (precondition) -- This server does not allow infinite-depth
    /// PROPFIND requests on collections.
    PropfindFiniteDepth,

    /// Name:  cannot-modify-protected-property
    ///
    /// Use with:  403 Forbidden
    ///
    /// Purpose:  (precondition) -- The client attempted to set a protected
    /// property in a PROPPATCH (such as DAV:getetag).
    CannotModifyProtectedProperty,

    /// Extension defined conditions (CalDAV, CardDAV, sync)
    Extension(E::Error),
}

/// 14.7.  href XML Element
///
/// Purpose:   MUST contain a URI or a relative reference.
///
/// <!ELEMENT href (#PCDATA)>
#[derive(Debug, PartialEq, Clone)]
pub struct Href(pub String);

/// 14.8.  include XML Element
///
/// Purpose:   Any child element represents the name of a property to be
/// included in the PROPFIND response.
///
/// <!ELEMENT include ANY >
#[derive(Debug, PartialEq, Clone)]
pub struct Include<E: Extension>(pub Vec<PropertyRequest<E>>);

/// 14.9.  location XML Element
///
/// Purpose:   When a status code in a 'multistatus' element would carry a
/// Location header, the 'location' element provides the value.
///
/// <!ELEMENT location (href)>
#[derive(Debug, PartialEq, Clone)]
pub struct Location(pub Href);

/// 14.16.  multistatus XML Element
///
/// <!ELEMENT multistatus (response*, responsedescription?)  >
///
/// RFC 6578 extends multistatus with a trailing sync-token element; the
/// extension slot carries it.
#[derive(Debug, PartialEq, Clone)]
pub struct Multistatus<E: Extension> {
    pub responses: Vec<Response<E>>,
    pub responsedescription: Option<ResponseDescription>,
    pub extension: Option<E::MultistatusExtension>,
}

/// 14.18.  prop XML Element
///
/// Purpose:   Contains properties related to a resource.
///
/// <!ELEMENT prop ANY >
#[derive(Debug, PartialEq, Clone)]
pub struct PropName<E: Extension>(pub Vec<PropertyRequest<E>>);

#[derive(Debug, PartialEq, Clone)]
pub struct PropValue<E: Extension>(pub Vec<Property<E>>);

#[derive(Debug, PartialEq, Clone)]
pub struct AnyProp<E: Extension>(pub Vec<AnyProperty<E>>);

/// 14.19.  propertyupdate XML Element
///
/// <!ELEMENT propertyupdate (remove | set)+ >
#[derive(Debug, PartialEq, Clone)]
pub struct PropertyUpdate<E: Extension>(pub Vec<PropertyUpdateItem<E>>);

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyUpdateItem<E: Extension> {
    Remove(Remove<E>),
    Set(Set<E>),
}

/// 14.20.  propfind XML Element
///
/// <!ELEMENT propfind ( propname | (allprop, include?) | prop ) >
#[derive(Debug, PartialEq, Clone)]
pub enum PropFind<E: Extension> {
    PropName,
    AllProp(Option<Include<E>>),
    Prop(PropName<E>),
}

/// 14.22 propstat XML Element
///
/// <!ELEMENT propstat (prop, status, error?, responsedescription?) >
#[derive(Debug, PartialEq, Clone)]
pub struct PropStat<E: Extension> {
    pub prop: AnyProp<E>,
    pub status: Status,
    pub error: Option<Error<E>>,
    pub responsedescription: Option<ResponseDescription>,
}

/// 14.23.  remove XML Element
///
/// Description:   Specifying the removal of a property that does
/// not exist is not an error.
///
/// <!ELEMENT remove (prop) >
#[derive(Debug, PartialEq, Clone)]
pub struct Remove<E: Extension>(pub PropName<E>);

/// 14.24.  response XML Element
///
/// <!ELEMENT response (href, ((href*, status)|(propstat+)),
///                     error?, responsedescription? , location?) >
#[derive(Debug, PartialEq, Clone)]
pub enum StatusOrPropstat<E: Extension> {
    // One status, multiple hrefs...
    Status(Vec<Href>, Status),
    // A single href, multiple properties...
    PropStat(Href, Vec<PropStat<E>>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Response<E: Extension> {
    pub status_or_propstat: StatusOrPropstat<E>,
    pub error: Option<Error<E>>,
    pub responsedescription: Option<ResponseDescription>,
    pub location: Option<Location>,
}

/// 14.25.  responsedescription XML Element
///
/// <!ELEMENT responsedescription (#PCDATA) >
#[derive(Debug, PartialEq, Clone)]
pub struct ResponseDescription(pub String);

/// 14.26.  set XML Element
///
/// <!ELEMENT set (prop) >
#[derive(Debug, PartialEq, Clone)]
pub struct Set<E: Extension>(pub PropValue<E>);

/// 14.28.  status XML Element
///
/// Value:   status-line (defined in Section 6.1 of [RFC2616])
///
/// <!ELEMENT status (#PCDATA) >
#[derive(Debug, PartialEq, Clone)]
pub struct Status(pub http::status::StatusCode);

/// RFC 5689 §5.1 mkcol XML element
///
/// <!ELEMENT mkcol (set+)>
///
/// Extended MKCOL: the collection and its initial properties are created
/// atomically, or not at all.
#[derive(Debug, PartialEq, Clone)]
pub struct Mkcol<E: Extension>(pub Vec<Set<E>>);

/// RFC 5689 §5.2 mkcol-response XML element
///
/// <!ELEMENT mkcol-response (propstat+)>
#[derive(Debug, PartialEq, Clone)]
pub struct MkcolResponse<E: Extension>(pub Vec<PropStat<E>>);

/// 15.  DAV Properties
///
/// A property name request (empty element) as found in propfind/prop,
/// include, or proppatch/remove bodies.
#[derive(Debug, PartialEq, Clone)]
pub enum AnyProperty<E: Extension> {
    Request(PropertyRequest<E>),
    Value(Property<E>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyRequest<E: Extension> {
    CreationDate,
    DisplayName,
    GetContentLanguage,
    GetContentLength,
    GetContentType,
    GetEtag,
    GetLastModified,
    LockDiscovery,
    ResourceType,
    SupportedLock,
    Extension(E::PropertyRequest),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Property<E: Extension> {
    /// 15.1.  creationdate Property
    ///
    /// Value:   date-time (defined in [RFC3339])
    ///
    /// <!ELEMENT creationdate (#PCDATA) >
    CreationDate(DateTime<FixedOffset>),

    /// 15.2.  displayname Property
    ///
    /// Purpose:   Provides a name for the resource that is suitable for
    /// presentation to a user.
    ///
    /// <!ELEMENT displayname (#PCDATA) >
    DisplayName(String),

    /// 15.3.  getcontentlanguage Property
    ///
    /// <!ELEMENT getcontentlanguage (#PCDATA) >
    GetContentLanguage(String),

    /// 15.4.  getcontentlength Property
    ///
    /// Protected:   This property is computed, therefore protected.
    ///
    /// <!ELEMENT getcontentlength (#PCDATA) >
    GetContentLength(u64),

    /// 15.5.  getcontenttype Property
    ///
    /// Value:   media-type (defined in Section 3.7 of [RFC2616])
    ///
    /// <!ELEMENT getcontenttype (#PCDATA) >
    GetContentType(String),

    /// 15.6.  getetag Property
    ///
    /// Protected:  MUST be protected because this value is created and
    /// controlled by the server.
    ///
    /// <!ELEMENT getetag (#PCDATA) >
    GetEtag(String),

    /// 15.7.  getlastmodified Property
    ///
    /// Value:   rfc1123-date (defined in Section 3.3.1 of [RFC2616])
    ///
    /// <!ELEMENT getlastmodified (#PCDATA) >
    GetLastModified(DateTime<FixedOffset>),

    /// 15.8.  lockdiscovery Property
    ///
    /// <!ELEMENT lockdiscovery (activelock)* >
    ///
    /// Locking is not implemented; the property is always served empty so
    /// clients know no lock is ever held.
    LockDiscovery,

    /// 15.9.  resourcetype Property
    ///
    /// Description:   MUST be defined on all DAV-compliant resources.  Each
    /// child element identifies a specific type the resource belongs to.
    ResourceType(Vec<ResourceType<E>>),

    /// 15.10.  supportedlock Property
    ///
    /// <!ELEMENT supportedlock (lockentry)* >
    ///
    /// Always served empty: no lock capability is offered.
    SupportedLock,

    /// Any extension
    Extension(E::Property),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResourceType<E: Extension> {
    Collection,
    Extension(E::ResourceType),
}

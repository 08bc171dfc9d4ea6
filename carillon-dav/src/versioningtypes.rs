use super::types as dav;

// RFC 3253 subset. REPORT itself comes from the versioning extension and
// both CalDAV (section 7.1) and WebDAV sync re-use it, together with
// DAV:supported-report-set and DAV:limit/DAV:nresults.

/// The root element of a REPORT request body. The concrete report set is
/// provided by the extension realization.
#[derive(Debug, PartialEq, Clone)]
pub enum Report<E: dav::Extension> {
    /// RFC 3253 §3.8 expand-property REPORT
    ExpandProperty(ExpandProperty),
    Extension(E::ReportType),
}

/// RFC 3253 §3.8
///
/// <!ELEMENT expand-property (property*)>
/// <!ELEMENT property (property*)>
/// <!ATTLIST property name NMTOKEN #REQUIRED>
/// <!ATTLIST property namespace NMTOKEN "DAV:">
#[derive(Debug, PartialEq, Clone)]
pub struct ExpandProperty(pub Vec<PropertyExpansion>);

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyExpansion {
    pub name: String,
    pub namespace: Option<String>,
    pub nested: Vec<PropertyExpansion>,
}

/// This property identifies the reports that are supported by the
/// resource.
///
/// <!ELEMENT supported-report-set (supported-report*)>
/// <!ELEMENT supported-report report>
/// <!ELEMENT report ANY>
#[derive(Debug, PartialEq, Clone)]
pub struct SupportedReport<E: dav::Extension>(pub ReportName<E>);

#[derive(Debug, PartialEq, Clone)]
pub enum ReportName<E: dav::Extension> {
    ExpandProperty,
    Extension(E::ReportTypeName),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Property<E: dav::Extension> {
    SupportedReportSet(Vec<SupportedReport<E>>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyRequest {
    SupportedReportSet,
}

/// Limit
/// <!ELEMENT limit (nresults) >
#[derive(Debug, PartialEq, Clone)]
pub struct Limit(pub NResults);

/// NResults
/// <!ELEMENT nresults (#PCDATA) >
#[derive(Debug, PartialEq, Clone)]
pub struct NResults(pub u64);

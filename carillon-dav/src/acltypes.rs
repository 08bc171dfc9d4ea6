use super::types as dav;

// RFC covered: RFC3744 (ACL core, principals subset) + RFC5397 (Current
// Principal Extension). Only the discovery surface is implemented: the
// server never evaluates ACEs, it only tells clients who they are and
// where their principal lives.

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyRequest {
    Owner,
    CurrentUserPrincipal,
    PrincipalUrl,
    GroupMembership,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Property {
    /// RFC 3744 §5.1
    ///
    /// <!ELEMENT owner (href)>
    Owner(dav::Href),

    /// RFC 5397 §3
    ///
    /// <!ELEMENT current-user-principal (unauthenticated | href)>
    CurrentUserPrincipal(User),

    /// RFC 3744 §4.2
    ///
    /// <!ELEMENT principal-URL (href)>
    PrincipalUrl(dav::Href),

    /// RFC 3744 §4.4, always empty here (groups are not modelled)
    ///
    /// <!ELEMENT group-membership (href*)>
    GroupMembership(Vec<dav::Href>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResourceType {
    Principal,
}

#[derive(Debug, PartialEq, Clone)]
pub enum User {
    Unauthenticated,
    Authenticated(dav::Href),
}

/// RFC 3744 §9.3 principal-match REPORT
///
/// <!ELEMENT principal-match ((principal-property | self), prop?)>
///
/// Only the `self` form is answered meaningfully; the handler is a stub
/// that matches the authenticated principal.
#[derive(Debug, PartialEq, Clone)]
pub enum PrincipalMatch {
    Selph,
    PrincipalProperty(String),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ReportTypeName {
    PrincipalMatch,
}

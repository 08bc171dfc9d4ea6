use super::types as dav;
use super::versioningtypes as vers;

// RFC 6578
// https://datatracker.ietf.org/doc/html/rfc6578

/// Name:  sync-collection
///
/// Purpose:  WebDAV report used to synchronize data between client and
/// server.
///
/// <!ELEMENT sync-collection (sync-token, sync-level, limit?, prop)>
///
/// <!-- DAV:limit defined in RFC 5323, Section 5.17 -->
/// <!-- DAV:prop defined in RFC 4918, Section 14.18 -->
#[derive(Debug, PartialEq, Clone)]
pub struct SyncCollection<E: dav::Extension> {
    pub sync_token: SyncTokenRequest,
    pub sync_level: SyncLevel,
    pub limit: Option<vers::Limit>,
    pub prop: dav::PropName<E>,
}

/// Name:  sync-token
///
/// Purpose:  The synchronization token provided by the server and
/// returned by the client.
///
/// <!ELEMENT sync-token CDATA>
///
/// <!-- Text MUST be a URI -->
/// Used by multistatus
#[derive(Debug, PartialEq, Clone)]
pub struct SyncToken(pub String);

/// Used by propfind and report sync-collection
#[derive(Debug, PartialEq, Clone)]
pub enum SyncTokenRequest {
    InitialSync,
    IncrementalSync(String),
}

/// Name:  sync-level
///
/// Purpose:  Indicates the "scope" of the synchronization report
/// request.
#[derive(Debug, PartialEq, Clone)]
pub enum SyncLevel {
    One,
    Infinite,
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyRequest {
    SyncToken,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Property {
    SyncToken(SyncToken),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ReportTypeName {
    SyncCollection,
}

/// The sync-token element appended to a sync-collection multistatus
/// (RFC 6578 §6.2). Omitted when the result set was truncated by the
/// client's limit so that the client falls back to a full resync.
#[derive(Debug, PartialEq, Clone)]
pub struct Multistatus {
    pub sync_token: SyncToken,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Violation {
    /// RFC 6578 §3.2 precondition: the sync token is no longer valid,
    /// answered with 403 and this error element.
    ValidSyncToken,
    NumberOfMatchesWithinLimits,
}

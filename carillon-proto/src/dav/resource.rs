//! Live property contracts per resource kind.
//!
//! The property surface is the typed realization from carillon-dav; this
//! module decides which names each resource kind answers, computes the
//! values, and applies PROPPATCH to the collection metadata sidecar.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use http::status::StatusCode;

use carillon_dav::acltypes as acl;
use carillon_dav::caltypes as cal;
use carillon_dav::cardtypes as card;
use carillon_dav::cs;
use carillon_dav::realization::{self as all, All};
use carillon_dav::synctypes as sync;
use carillon_dav::types as dav;
use carillon_dav::versioningtypes as vers;
use carillon_ical::parser;
use carillon_store::{CollectionKind, StoreError};

use super::node::{ColNode, ItemNode, Node};
use super::Context;

/// Largest object a collection accepts, advertised and enforced.
pub(crate) const MAX_RESOURCE_SIZE: u64 = 10_000_000;

/// The sync token wire scheme: an opaque URI whose payload is the commit
/// identity.
pub(crate) const SYNC_TOKEN_PREFIX: &str = "carillon-sync:";

pub(crate) fn format_sync_token(id: carillon_store::ObjectId) -> String {
    format!("{}{}", SYNC_TOKEN_PREFIX, id.hex())
}

pub(crate) fn parse_sync_token(raw: &str) -> Option<carillon_store::ObjectId> {
    carillon_store::ObjectId::from_hex(raw.strip_prefix(SYNC_TOKEN_PREFIX)?)
}

fn quoted(etag: &str) -> String {
    format!("\"{}\"", etag)
}

fn principal_href(ctx: &Context, segments: &[String]) -> Option<String> {
    segments
        .first()
        .map(|p| format!("{}/{}/", ctx.config.route_prefix, p))
}

fn ts_to_fixed(ts: i64) -> DateTime<FixedOffset> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
        .fixed_offset()
}

/// The names a resource would report for PROPFIND propname / allprop.
pub(crate) fn supported_properties(node: &Node) -> dav::PropName<All> {
    use dav::PropertyRequest as Req;

    let mut names = vec![
        Req::DisplayName,
        Req::ResourceType,
        Req::Extension(all::PropertyRequest::Acl(
            acl::PropertyRequest::CurrentUserPrincipal,
        )),
    ];

    match node {
        Node::Root => (),
        Node::Collection(c) => {
            names.push(Req::GetContentType);
            names.push(Req::SupportedLock);
            names.push(Req::Extension(all::PropertyRequest::Acl(
                acl::PropertyRequest::Owner,
            )));
            names.push(Req::Extension(all::PropertyRequest::Sync(
                sync::PropertyRequest::SyncToken,
            )));
            names.push(Req::Extension(all::PropertyRequest::Vers(
                vers::PropertyRequest::SupportedReportSet,
            )));
            names.push(Req::Extension(all::PropertyRequest::Cs(
                cs::PropertyRequest::GetCtag,
            )));
            match c.col.kind() {
                CollectionKind::Principal => {
                    names.push(Req::Extension(all::PropertyRequest::Acl(
                        acl::PropertyRequest::PrincipalUrl,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Acl(
                        acl::PropertyRequest::GroupMembership,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::CalendarHomeSet,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Card(
                        card::PropertyRequest::AddressbookHomeSet,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::CalendarUserAddressSet,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::ScheduleInboxUrl,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::ScheduleOutboxUrl,
                    )));
                }
                CollectionKind::Calendar | CollectionKind::Subscription => {
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::CalendarDescription,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::CalendarTimezone,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::SupportedCalendarComponentSet,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::SupportedCalendarData,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::SupportedCollationSet,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::MaxResourceSize,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cs(
                        cs::PropertyRequest::CalendarColor,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Cs(
                        cs::PropertyRequest::CalendarOrder,
                    )));
                }
                CollectionKind::Addressbook => {
                    names.push(Req::Extension(all::PropertyRequest::Card(
                        card::PropertyRequest::AddressbookDescription,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Card(
                        card::PropertyRequest::SupportedAddressData,
                    )));
                    names.push(Req::Extension(all::PropertyRequest::Card(
                        card::PropertyRequest::MaxResourceSize,
                    )));
                }
                _ => (),
            }
        }
        Node::Item(i) => {
            names.push(Req::GetContentType);
            names.push(Req::GetContentLength);
            names.push(Req::GetEtag);
            names.push(Req::GetLastModified);
            names.push(Req::CreationDate);
            names.push(Req::SupportedLock);
            names.push(Req::LockDiscovery);
            match i.col.kind() {
                CollectionKind::Addressbook => {
                    names.push(Req::Extension(all::PropertyRequest::Card(
                        card::PropertyRequest::AddressData(Default::default()),
                    )));
                }
                _ => {
                    names.push(Req::Extension(all::PropertyRequest::Cal(
                        cal::PropertyRequest::CalendarData(Default::default()),
                    )));
                }
            }
        }
        Node::Missing(_) => (),
    }

    dav::PropName(names)
}

/// Compute property values; returns (found, not-found).
pub(crate) async fn properties(
    ctx: &Context,
    node: &Node,
    props: &dav::PropName<All>,
) -> (Vec<dav::Property<All>>, Vec<dav::PropertyRequest<All>>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for req in props.0.iter() {
        match property_value(ctx, node, req).await {
            Ok(Some(value)) => found.push(value),
            Ok(None) => missing.push(req.clone()),
            Err(e) => {
                tracing::warn!(err = %e, "property read failed");
                missing.push(req.clone());
            }
        }
    }
    (found, missing)
}

async fn property_value(
    ctx: &Context,
    node: &Node,
    req: &dav::PropertyRequest<All>,
) -> Result<Option<dav::Property<All>>, StoreError> {
    use dav::Property as P;
    use dav::PropertyRequest as Req;

    // properties every resource answers the same way
    match req {
        Req::LockDiscovery => return Ok(Some(P::LockDiscovery)),
        Req::SupportedLock => return Ok(Some(P::SupportedLock)),
        Req::Extension(all::PropertyRequest::Acl(acl::PropertyRequest::CurrentUserPrincipal)) => {
            let user = match &ctx.principal {
                Some(p) => acl::User::Authenticated(dav::Href(format!(
                    "{}/{}/",
                    ctx.config.route_prefix, p
                ))),
                None => acl::User::Unauthenticated,
            };
            return Ok(Some(P::Extension(all::Property::Acl(
                acl::Property::CurrentUserPrincipal(user),
            ))));
        }
        _ => (),
    }

    match node {
        Node::Root => Ok(root_property(req)),
        Node::Collection(c) => collection_property(ctx, c, req),
        Node::Item(i) => item_property(ctx, i, req).await,
        Node::Missing(_) => Ok(None),
    }
}

fn root_property(req: &dav::PropertyRequest<All>) -> Option<dav::Property<All>> {
    use dav::Property as P;
    use dav::PropertyRequest as Req;

    match req {
        Req::DisplayName => Some(P::DisplayName("dav root".into())),
        Req::ResourceType => Some(P::ResourceType(vec![dav::ResourceType::Collection])),
        Req::GetContentType => Some(P::GetContentType("httpd/unix-directory".into())),
        _ => None,
    }
}

fn collection_property(
    ctx: &Context,
    node: &ColNode,
    req: &dav::PropertyRequest<All>,
) -> Result<Option<dav::Property<All>>, StoreError> {
    use dav::Property as P;
    use dav::PropertyRequest as Req;

    let meta = node.col.meta();
    let kind = meta.kind;

    let value = match req {
        // unset names read as 404, so a PROPPATCH remove round-trips
        Req::DisplayName => meta.displayname.clone().map(P::DisplayName),
        Req::ResourceType => {
            let mut types = vec![dav::ResourceType::Collection];
            match kind {
                CollectionKind::Principal => types.push(dav::ResourceType::Extension(
                    all::ResourceType::Acl(acl::ResourceType::Principal),
                )),
                CollectionKind::Calendar => types.push(dav::ResourceType::Extension(
                    all::ResourceType::Cal(cal::ResourceType::Calendar),
                )),
                CollectionKind::Addressbook => types.push(dav::ResourceType::Extension(
                    all::ResourceType::Card(card::ResourceType::Addressbook),
                )),
                CollectionKind::ScheduleInbox => types.push(dav::ResourceType::Extension(
                    all::ResourceType::Cal(cal::ResourceType::ScheduleInbox),
                )),
                CollectionKind::ScheduleOutbox => types.push(dav::ResourceType::Extension(
                    all::ResourceType::Cal(cal::ResourceType::ScheduleOutbox),
                )),
                CollectionKind::Subscription => {
                    types.push(dav::ResourceType::Extension(all::ResourceType::Cal(
                        cal::ResourceType::Calendar,
                    )));
                    types.push(dav::ResourceType::Extension(all::ResourceType::Cal(
                        cal::ResourceType::Subscribed,
                    )));
                }
                CollectionKind::Plain => (),
            }
            Some(P::ResourceType(types))
        }
        //@FIXME seems wrong but it is what calendar clients expect
        Req::GetContentType => Some(P::GetContentType(match kind {
            CollectionKind::Calendar | CollectionKind::Subscription => "text/calendar".into(),
            CollectionKind::Addressbook => "text/vcard".into(),
            _ => "httpd/unix-directory".into(),
        })),
        Req::Extension(all::PropertyRequest::Acl(acl)) => {
            acl_collection_property(ctx, node, kind, acl)
        }
        Req::Extension(all::PropertyRequest::Sync(sync::PropertyRequest::SyncToken)) => {
            let token = node.col.sync_token()?;
            Some(P::Extension(all::Property::Sync(sync::Property::SyncToken(
                sync::SyncToken(format_sync_token(token)),
            ))))
        }
        Req::Extension(all::PropertyRequest::Cs(cs::PropertyRequest::GetCtag)) => {
            let ctag = node.col.ctag()?;
            Some(P::Extension(all::Property::Cs(cs::Property::GetCtag(
                format!("carillon-ctag:{}", ctag.hex()),
            ))))
        }
        Req::Extension(all::PropertyRequest::Cs(cs::PropertyRequest::CalendarColor)) => meta
            .color
            .clone()
            .map(|c| P::Extension(all::Property::Cs(cs::Property::CalendarColor(c)))),
        Req::Extension(all::PropertyRequest::Cs(cs::PropertyRequest::CalendarOrder)) => meta
            .order
            .map(|o| P::Extension(all::Property::Cs(cs::Property::CalendarOrder(o)))),
        Req::Extension(all::PropertyRequest::Vers(vers::PropertyRequest::SupportedReportSet)) => {
            Some(P::Extension(all::Property::Vers(supported_report_set(kind))))
        }
        Req::Extension(all::PropertyRequest::Cal(calreq)) => {
            cal_collection_property(ctx, node, &meta, calreq)
        }
        Req::Extension(all::PropertyRequest::Card(cardreq)) => {
            card_collection_property(ctx, node, &meta, cardreq)
        }
        _ => None,
    };
    Ok(value)
}

fn acl_collection_property(
    ctx: &Context,
    node: &ColNode,
    kind: CollectionKind,
    req: &acl::PropertyRequest,
) -> Option<dav::Property<All>> {
    use dav::Property as P;

    match req {
        acl::PropertyRequest::Owner => principal_href(ctx, &node.segments)
            .map(|href| P::Extension(all::Property::Acl(acl::Property::Owner(dav::Href(href))))),
        acl::PropertyRequest::PrincipalUrl if matches!(kind, CollectionKind::Principal) => {
            Some(P::Extension(all::Property::Acl(acl::Property::PrincipalUrl(
                dav::Href(node_href(ctx, &node.segments, true)),
            ))))
        }
        acl::PropertyRequest::GroupMembership if matches!(kind, CollectionKind::Principal) => {
            Some(P::Extension(all::Property::Acl(
                acl::Property::GroupMembership(vec![]),
            )))
        }
        _ => None,
    }
}

fn cal_collection_property(
    ctx: &Context,
    node: &ColNode,
    meta: &carillon_store::CollectionMeta,
    req: &cal::PropertyRequest,
) -> Option<dav::Property<All>> {
    use dav::Property as P;

    let kind = meta.kind;
    let is_cal = matches!(
        kind,
        CollectionKind::Calendar | CollectionKind::Subscription
    );
    let is_principal = matches!(kind, CollectionKind::Principal);

    match req {
        cal::PropertyRequest::CalendarHomeSet if is_principal => {
            Some(P::Extension(all::Property::Cal(
                cal::Property::CalendarHomeSet(dav::Href(format!(
                    "{}calendars/",
                    node_href(ctx, &node.segments, true)
                ))),
            )))
        }
        cal::PropertyRequest::CalendarUserAddressSet if is_principal => {
            Some(P::Extension(all::Property::Cal(
                cal::Property::CalendarUserAddressSet(vec![dav::Href(node_href(
                    ctx,
                    &node.segments,
                    true,
                ))]),
            )))
        }
        cal::PropertyRequest::ScheduleInboxUrl if is_principal => {
            // discovery only, and only once the collection exists
            child_collection_exists(ctx, &node.segments, "inbox").then(|| {
                P::Extension(all::Property::Cal(cal::Property::ScheduleInboxUrl(
                    dav::Href(format!("{}inbox/", node_href(ctx, &node.segments, true))),
                )))
            })
        }
        cal::PropertyRequest::ScheduleOutboxUrl if is_principal => {
            child_collection_exists(ctx, &node.segments, "outbox").then(|| {
                P::Extension(all::Property::Cal(cal::Property::ScheduleOutboxUrl(
                    dav::Href(format!("{}outbox/", node_href(ctx, &node.segments, true))),
                )))
            })
        }
        cal::PropertyRequest::CalendarDescription if is_cal => {
            meta.description.clone().map(|text| {
                P::Extension(all::Property::Cal(cal::Property::CalendarDescription {
                    lang: None,
                    text,
                }))
            })
        }
        cal::PropertyRequest::CalendarTimezone if is_cal => meta
            .timezone
            .clone()
            .map(|tz| P::Extension(all::Property::Cal(cal::Property::CalendarTimezone(tz)))),
        cal::PropertyRequest::SupportedCalendarComponentSet if is_cal => {
            let comps = if meta.components.is_empty() {
                vec!["VEVENT", "VTODO", "VJOURNAL", "VFREEBUSY"]
                    .into_iter()
                    .map(String::from)
                    .collect()
            } else {
                meta.components.clone()
            };
            Some(P::Extension(all::Property::Cal(
                cal::Property::SupportedCalendarComponentSet(
                    comps
                        .into_iter()
                        .map(|c| cal::CompSupport(cal::Component::new(c)))
                        .collect(),
                ),
            )))
        }
        cal::PropertyRequest::SupportedCalendarData if is_cal => {
            Some(P::Extension(all::Property::Cal(
                cal::Property::SupportedCalendarData(vec![cal::CalendarDataEmpty(Some(
                    cal::CalendarDataSupport {
                        content_type: "text/calendar".into(),
                        version: "2.0".into(),
                    },
                ))]),
            )))
        }
        cal::PropertyRequest::SupportedCollationSet if is_cal => {
            Some(P::Extension(all::Property::Cal(
                cal::Property::SupportedCollationSet(vec![
                    cal::SupportedCollation(cal::Collation::AsciiCaseMap),
                    cal::SupportedCollation(cal::Collation::Octet),
                ]),
            )))
        }
        cal::PropertyRequest::MaxResourceSize if is_cal => Some(P::Extension(
            all::Property::Cal(cal::Property::MaxResourceSize(MAX_RESOURCE_SIZE)),
        )),
        cal::PropertyRequest::Source if matches!(kind, CollectionKind::Subscription) => meta
            .source
            .clone()
            .map(|s| P::Extension(all::Property::Cal(cal::Property::Source(dav::Href(s))))),
        _ => None,
    }
}

fn card_collection_property(
    ctx: &Context,
    node: &ColNode,
    meta: &carillon_store::CollectionMeta,
    req: &card::PropertyRequest,
) -> Option<dav::Property<All>> {
    use dav::Property as P;

    let kind = meta.kind;
    match req {
        card::PropertyRequest::AddressbookHomeSet
            if matches!(kind, CollectionKind::Principal) =>
        {
            Some(P::Extension(all::Property::Card(
                card::Property::AddressbookHomeSet(dav::Href(format!(
                    "{}contacts/",
                    node_href(ctx, &node.segments, true)
                ))),
            )))
        }
        card::PropertyRequest::AddressbookDescription
            if matches!(kind, CollectionKind::Addressbook) =>
        {
            meta.description.clone().map(|text| {
                P::Extension(all::Property::Card(
                    card::Property::AddressbookDescription { lang: None, text },
                ))
            })
        }
        card::PropertyRequest::SupportedAddressData
            if matches!(kind, CollectionKind::Addressbook) =>
        {
            Some(P::Extension(all::Property::Card(
                card::Property::SupportedAddressData(vec![
                    card::AddressDataType {
                        content_type: "text/vcard".into(),
                        version: "3.0".into(),
                    },
                    card::AddressDataType {
                        content_type: "text/vcard".into(),
                        version: "4.0".into(),
                    },
                ]),
            )))
        }
        card::PropertyRequest::MaxResourceSize if matches!(kind, CollectionKind::Addressbook) => {
            Some(P::Extension(all::Property::Card(
                card::Property::MaxResourceSize(MAX_RESOURCE_SIZE),
            )))
        }
        _ => None,
    }
}

fn supported_report_set(kind: CollectionKind) -> vers::Property<All> {
    let mut reports = vec![
        vers::SupportedReport(vers::ReportName::ExpandProperty),
        vers::SupportedReport(vers::ReportName::Extension(all::ReportTypeName::Sync(
            sync::ReportTypeName::SyncCollection,
        ))),
        vers::SupportedReport(vers::ReportName::Extension(all::ReportTypeName::Acl(
            acl::ReportTypeName::PrincipalMatch,
        ))),
    ];
    match kind {
        CollectionKind::Addressbook => {
            reports.push(vers::SupportedReport(vers::ReportName::Extension(
                all::ReportTypeName::Card(card::ReportTypeName::Query),
            )));
            reports.push(vers::SupportedReport(vers::ReportName::Extension(
                all::ReportTypeName::Card(card::ReportTypeName::Multiget),
            )));
        }
        _ => {
            reports.push(vers::SupportedReport(vers::ReportName::Extension(
                all::ReportTypeName::Cal(cal::ReportTypeName::Query),
            )));
            reports.push(vers::SupportedReport(vers::ReportName::Extension(
                all::ReportTypeName::Cal(cal::ReportTypeName::Multiget),
            )));
            reports.push(vers::SupportedReport(vers::ReportName::Extension(
                all::ReportTypeName::Cal(cal::ReportTypeName::FreeBusy),
            )));
        }
    }
    vers::Property::SupportedReportSet(reports)
}

async fn item_property(
    ctx: &Context,
    node: &ItemNode,
    req: &dav::PropertyRequest<All>,
) -> Result<Option<dav::Property<All>>, StoreError> {
    use dav::Property as P;
    use dav::PropertyRequest as Req;

    let value = match req {
        Req::DisplayName => Some(P::DisplayName(node.name.clone())),
        Req::ResourceType => Some(P::ResourceType(vec![])),
        Req::GetContentType => Some(P::GetContentType(node.col.content_type(&node.name).into())),
        Req::GetEtag => Some(P::GetEtag(quoted(&node.col.etag(&node.name)?))),
        Req::GetContentLength => {
            let (bytes, _) = node.col.get(&node.name)?;
            Some(P::GetContentLength(bytes.len() as u64))
        }
        Req::GetLastModified => {
            let (_, modified) = node.col.timestamps(&node.name)?;
            Some(P::GetLastModified(ts_to_fixed(modified)))
        }
        Req::CreationDate => {
            let (created, _) = node.col.timestamps(&node.name)?;
            Some(P::CreationDate(ts_to_fixed(created)))
        }
        Req::Extension(all::PropertyRequest::Cal(cal::PropertyRequest::CalendarData(data_req)))
            if node.col.item_kind() == Some(carillon_ical::validate::ItemKind::Calendar) =>
        {
            let (bytes, _) = node.col.get(&node.name)?;
            let payload = String::from_utf8(bytes)
                .map_err(|_| StoreError::Corrupt("stored item is not UTF-8".into()))?;
            let payload = match &data_req.comp {
                None => payload,
                Some(comp) => prune_calendar(&payload, comp).unwrap_or(payload),
            };
            Some(P::Extension(all::Property::Cal(cal::Property::CalendarData(
                cal::CalendarDataPayload {
                    mime: None,
                    payload,
                },
            ))))
        }
        Req::Extension(all::PropertyRequest::Card(card::PropertyRequest::AddressData(_)))
            if node.col.item_kind() == Some(carillon_ical::validate::ItemKind::Addressbook) =>
        {
            let (bytes, _) = node.col.get(&node.name)?;
            let payload = String::from_utf8(bytes)
                .map_err(|_| StoreError::Corrupt("stored item is not UTF-8".into()))?;
            Some(P::Extension(all::Property::Card(
                card::Property::AddressData(card::AddressDataPayload {
                    mime: None,
                    payload,
                }),
            )))
        }
        Req::Extension(all::PropertyRequest::Acl(acl::PropertyRequest::Owner)) => {
            principal_href(ctx, &node.segments).map(|href| {
                P::Extension(all::Property::Acl(acl::Property::Owner(dav::Href(href))))
            })
        }
        _ => None,
    };
    Ok(value)
}

/// RFC 4791 §9.6.1 calendar-data pruning: keep only the components and
/// properties the client asked for.
fn prune_calendar(payload: &str, selector: &cal::Comp) -> Option<String> {
    let parsed = parser::parse_calendar(payload).ok()?;
    if !parsed.name.eq_ignore_ascii_case(selector.name.as_str()) {
        return None;
    }
    Some(prune_component(&parsed, selector).to_string())
}

fn prune_component(comp: &parser::Component, selector: &cal::Comp) -> parser::Component {
    let mut out = parser::Component::new(comp.name.clone());

    out.properties = match &selector.prop_kind {
        None | Some(cal::PropKind::AllProp) => comp.properties.clone(),
        Some(cal::PropKind::Prop(named)) => comp
            .properties
            .iter()
            .filter(|p| named.iter().any(|n| p.name.eq_ignore_ascii_case(&n.name.0)))
            .cloned()
            .collect(),
    };

    out.components = match &selector.comp_kind {
        None | Some(cal::CompKind::AllComp) => comp.components.clone(),
        Some(cal::CompKind::Comp(selectors)) => comp
            .components
            .iter()
            .filter_map(|child| {
                selectors
                    .iter()
                    .find(|s| child.name.eq_ignore_ascii_case(s.name.as_str()))
                    .map(|s| prune_component(child, s))
            })
            .collect(),
    };

    out
}

fn child_collection_exists(ctx: &Context, segments: &[String], child: &str) -> bool {
    let mut path: Vec<&str> = segments.iter().map(String::as_str).collect();
    path.push(child);
    ctx.store.is_collection(&path).unwrap_or(false)
}

fn node_href(ctx: &Context, segments: &[String], collection: bool) -> String {
    let mut out = String::new();
    out.push_str(&ctx.config.route_prefix);
    for seg in segments {
        out.push('/');
        out.push_str(seg);
    }
    if collection {
        out.push('/');
    }
    out
}

// ---- PROPPATCH ----

pub(crate) enum PatchItem {
    Set(dav::Property<All>),
    Remove(dav::PropertyRequest<All>),
}

/// Apply a property update atomically: if any instruction is refused,
/// nothing is written and accepted instructions answer 424.
pub(crate) fn patch_properties(
    node: &Node,
    items: Vec<PatchItem>,
) -> Result<Vec<(dav::AnyProperty<All>, StatusCode)>, StoreError> {
    let col = match node {
        Node::Collection(c) => Some(&c.col),
        _ => None,
    };

    // first pass: decide each instruction
    let decided: Vec<(&PatchItem, bool)> = items
        .iter()
        .map(|item| {
            let writable = col.is_some()
                && match item {
                    PatchItem::Set(prop) => settable(prop),
                    PatchItem::Remove(req) => removable(req),
                };
            (item, writable)
        })
        .collect();
    let all_ok = decided.iter().all(|(_, ok)| *ok);

    // second pass: apply only when everything was accepted
    if all_ok {
        if let Some(col) = col {
            col.update_meta(|meta| {
                for item in items.iter() {
                    apply_patch(meta, item);
                }
            })?;
        }
    }

    let outcomes = decided
        .into_iter()
        .map(|(item, ok)| {
            let status = match (ok, all_ok) {
                (true, true) => StatusCode::OK,
                (true, false) => StatusCode::FAILED_DEPENDENCY,
                (false, _) => StatusCode::FORBIDDEN,
            };
            (echo(item), status)
        })
        .collect();
    Ok(outcomes)
}

fn settable(prop: &dav::Property<All>) -> bool {
    matches!(
        prop,
        dav::Property::DisplayName(_)
            | dav::Property::Extension(all::Property::Cal(
                cal::Property::CalendarDescription { .. }
            ))
            | dav::Property::Extension(all::Property::Cal(cal::Property::CalendarTimezone(_)))
            | dav::Property::Extension(all::Property::Card(
                card::Property::AddressbookDescription { .. }
            ))
            | dav::Property::Extension(all::Property::Cs(cs::Property::CalendarColor(_)))
            | dav::Property::Extension(all::Property::Cs(cs::Property::CalendarOrder(_)))
    )
}

fn removable(req: &dav::PropertyRequest<All>) -> bool {
    matches!(
        req,
        dav::PropertyRequest::DisplayName
            | dav::PropertyRequest::Extension(all::PropertyRequest::Cal(
                cal::PropertyRequest::CalendarDescription
            ))
            | dav::PropertyRequest::Extension(all::PropertyRequest::Cal(
                cal::PropertyRequest::CalendarTimezone
            ))
            | dav::PropertyRequest::Extension(all::PropertyRequest::Card(
                card::PropertyRequest::AddressbookDescription
            ))
            | dav::PropertyRequest::Extension(all::PropertyRequest::Cs(
                cs::PropertyRequest::CalendarColor
            ))
            | dav::PropertyRequest::Extension(all::PropertyRequest::Cs(
                cs::PropertyRequest::CalendarOrder
            ))
    )
}

fn apply_patch(meta: &mut carillon_store::CollectionMeta, item: &PatchItem) {
    match item {
        PatchItem::Set(dav::Property::DisplayName(name)) => {
            meta.displayname = Some(name.clone());
        }
        PatchItem::Set(dav::Property::Extension(all::Property::Cal(
            cal::Property::CalendarDescription { text, .. },
        ))) => {
            meta.description = Some(text.clone());
        }
        PatchItem::Set(dav::Property::Extension(all::Property::Cal(
            cal::Property::CalendarTimezone(tz),
        ))) => {
            meta.timezone = Some(tz.clone());
        }
        PatchItem::Set(dav::Property::Extension(all::Property::Card(
            card::Property::AddressbookDescription { text, .. },
        ))) => {
            meta.description = Some(text.clone());
        }
        PatchItem::Set(dav::Property::Extension(all::Property::Cs(
            cs::Property::CalendarColor(color),
        ))) => {
            meta.color = Some(color.clone());
        }
        PatchItem::Set(dav::Property::Extension(all::Property::Cs(
            cs::Property::CalendarOrder(order),
        ))) => {
            meta.order = Some(*order);
        }
        PatchItem::Remove(dav::PropertyRequest::DisplayName) => meta.displayname = None,
        PatchItem::Remove(dav::PropertyRequest::Extension(all::PropertyRequest::Cal(
            cal::PropertyRequest::CalendarDescription,
        ))) => meta.description = None,
        PatchItem::Remove(dav::PropertyRequest::Extension(all::PropertyRequest::Cal(
            cal::PropertyRequest::CalendarTimezone,
        ))) => meta.timezone = None,
        PatchItem::Remove(dav::PropertyRequest::Extension(all::PropertyRequest::Card(
            card::PropertyRequest::AddressbookDescription,
        ))) => meta.description = None,
        PatchItem::Remove(dav::PropertyRequest::Extension(all::PropertyRequest::Cs(
            cs::PropertyRequest::CalendarColor,
        ))) => meta.color = None,
        PatchItem::Remove(dav::PropertyRequest::Extension(all::PropertyRequest::Cs(
            cs::PropertyRequest::CalendarOrder,
        ))) => meta.order = None,
        _ => (),
    }
}

fn echo(item: &PatchItem) -> dav::AnyProperty<All> {
    match item {
        PatchItem::Remove(req) => dav::AnyProperty::Request(req.clone()),
        PatchItem::Set(prop) => match request_of(prop) {
            Some(req) => dav::AnyProperty::Request(req),
            None => dav::AnyProperty::Value(prop.clone()),
        },
    }
}

/// Name-only form of a property value, for echoing in propstat.
fn request_of(prop: &dav::Property<All>) -> Option<dav::PropertyRequest<All>> {
    use dav::Property as P;
    use dav::PropertyRequest as Req;

    let req = match prop {
        P::DisplayName(_) => Req::DisplayName,
        P::GetContentType(_) => Req::GetContentType,
        P::GetEtag(_) => Req::GetEtag,
        P::Extension(all::Property::Cal(cal::Property::CalendarDescription { .. })) => {
            Req::Extension(all::PropertyRequest::Cal(
                cal::PropertyRequest::CalendarDescription,
            ))
        }
        P::Extension(all::Property::Cal(cal::Property::CalendarTimezone(_))) => Req::Extension(
            all::PropertyRequest::Cal(cal::PropertyRequest::CalendarTimezone),
        ),
        P::Extension(all::Property::Card(card::Property::AddressbookDescription { .. })) => {
            Req::Extension(all::PropertyRequest::Card(
                card::PropertyRequest::AddressbookDescription,
            ))
        }
        P::Extension(all::Property::Cs(cs::Property::CalendarColor(_))) => {
            Req::Extension(all::PropertyRequest::Cs(cs::PropertyRequest::CalendarColor))
        }
        P::Extension(all::Property::Cs(cs::Property::CalendarOrder(_))) => {
            Req::Extension(all::PropertyRequest::Cs(cs::PropertyRequest::CalendarOrder))
        }
        P::Extension(all::Property::Unknown { ns, local }) => Req::Extension(
            all::PropertyRequest::Raw {
                ns: ns.clone(),
                local: local.clone(),
            },
        ),
        _ => return None,
    };
    Some(req)
}

// ---- multistatus helpers ----

pub(crate) fn response_props(
    href: String,
    found: Vec<dav::Property<All>>,
    missing: Vec<dav::PropertyRequest<All>>,
) -> dav::Response<All> {
    let mut propstats = Vec::new();
    if !found.is_empty() {
        propstats.push(dav::PropStat {
            prop: dav::AnyProp(found.into_iter().map(dav::AnyProperty::Value).collect()),
            status: dav::Status(StatusCode::OK),
            error: None,
            responsedescription: None,
        });
    }
    if !missing.is_empty() {
        propstats.push(dav::PropStat {
            prop: dav::AnyProp(missing.into_iter().map(dav::AnyProperty::Request).collect()),
            status: dav::Status(StatusCode::NOT_FOUND),
            error: None,
            responsedescription: None,
        });
    }
    if propstats.is_empty() {
        // RFC 4918 wants at least one propstat per response
        propstats.push(dav::PropStat {
            prop: dav::AnyProp(vec![]),
            status: dav::Status(StatusCode::OK),
            error: None,
            responsedescription: None,
        });
    }

    dav::Response {
        status_or_propstat: dav::StatusOrPropstat::PropStat(dav::Href(href), propstats),
        error: None,
        responsedescription: None,
        location: None,
    }
}

pub(crate) fn response_propname(
    ctx: &Context,
    node: &Node,
) -> dav::Response<All> {
    let names = supported_properties(node);
    dav::Response {
        status_or_propstat: dav::StatusOrPropstat::PropStat(
            dav::Href(node.href(ctx)),
            vec![dav::PropStat {
                prop: dav::AnyProp(
                    names
                        .0
                        .into_iter()
                        .map(dav::AnyProperty::Request)
                        .collect(),
                ),
                status: dav::Status(StatusCode::OK),
                error: None,
                responsedescription: None,
            }],
        ),
        error: None,
        responsedescription: None,
        location: None,
    }
}

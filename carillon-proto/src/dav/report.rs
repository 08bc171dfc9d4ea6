//! REPORT handlers: the named queries of CalDAV, CardDAV, versioning and
//! WebDAV sync, dispatched by root element name.

use anyhow::Result;
use http::status::StatusCode;

use carillon_dav::acltypes as acl;
use carillon_dav::caltypes as cal;
use carillon_dav::cardtypes as card;
use carillon_dav::realization::{self as all, All};
use carillon_dav::synctypes as sync;
use carillon_dav::types as dav;
use carillon_dav::versioningtypes as vers;
use carillon_ical::validate::ItemKind;
use carillon_ical::{freebusy, index, parser, query, recur};
use carillon_store::{ChangeKind, CollectionKind, StoreError};

use super::codec::{self, serialize, text_body, HttpResponse};
use super::node::{self, ColNode, ItemNode, Node};
use super::resource;
use super::Context;

const MULTISTATUS: StatusCode = StatusCode::MULTI_STATUS;

fn selector_props(
    selector: Option<cal::CalendarSelector<All>>,
    node: &Node,
) -> Option<dav::PropName<All>> {
    match selector {
        None | Some(cal::CalendarSelector::AllProp) => Some(resource::supported_properties(node)),
        Some(cal::CalendarSelector::PropName) => None,
        Some(cal::CalendarSelector::Prop(inner)) => Some(inner),
    }
}

/// Build the multistatus response of one stored item.
async fn item_response(
    ctx: &Context,
    parent: &ColNode,
    name: &str,
    props: &Option<dav::PropName<All>>,
) -> dav::Response<All> {
    let mut segments = parent.segments.clone();
    segments.push(name.to_string());
    let item = Node::Item(ItemNode {
        segments,
        col: parent.col.clone(),
        name: name.to_string(),
    });
    match props {
        None => resource::response_propname(ctx, &item),
        Some(props) => {
            let (found, missing) = resource::properties(ctx, &item, props).await;
            resource::response_props(item.href(ctx), found, missing)
        }
    }
}

fn multistatus(
    responses: Vec<dav::Response<All>>,
    extension: Option<all::Multistatus>,
) -> dav::Multistatus<All> {
    dav::Multistatus {
        responses,
        responsedescription: None,
        extension,
    }
}

fn expect_collection<'a>(
    node: &'a Node,
    accepted: &[CollectionKind],
) -> Result<&'a ColNode, HttpResponse> {
    match node {
        Node::Collection(c) if accepted.contains(&c.col.kind()) => Ok(c),
        Node::Collection(_) => Err(codec::status_response(
            403,
            "report not supported on this collection",
        )),
        _ => Err(codec::status_response(400, "report requires a collection")),
    }
}

// ---- calendar-query ----

pub(super) async fn calendar_query(
    ctx: &Context,
    target: &Node,
    report: cal::CalendarQuery<All>,
) -> Result<HttpResponse> {
    let col_node = match expect_collection(
        target,
        &[CollectionKind::Calendar, CollectionKind::Subscription],
    ) {
        Ok(c) => c,
        Err(resp) => return Ok(resp),
    };
    let props = selector_props(report.selector.clone(), target);

    let matched = match matching_members(ctx, col_node, &report.filter) {
        Ok(v) => v,
        Err(e) => return Ok(super::controller::store_error_response(e)),
    };

    let mut responses = Vec::with_capacity(matched.len());
    for name in matched {
        responses.push(item_response(ctx, col_node, &name, &props).await);
    }
    serialize(MULTISTATUS, multistatus(responses, None))
}

/// Index-assisted filter pass over the collection members.
fn matching_members(
    ctx: &Context,
    col_node: &ColNode,
    filter: &cal::Filter,
) -> Result<Vec<String>, StoreError> {
    let col = &col_node.col;
    let members = col.list()?;
    let mut matched = Vec::new();

    let index_values = if members.len() >= ctx.config.index_threshold {
        let keys = index::required_keys_cal(filter);
        let tree = col.ctag()?;
        match col
            .index()
            .get_index(col.db(), tree, ItemKind::Calendar, &keys)
        {
            Ok(values) => Some(values),
            Err(e) => {
                tracing::warn!(err = %e, "index unavailable, falling back to full parse");
                None
            }
        }
    } else {
        None
    };

    for (name, _etag) in members {
        let indexed = index_values
            .as_ref()
            .and_then(|values| values.get(&name))
            .and_then(|values| index::check_cal(filter, values));
        let is_match = match indexed {
            Some(decided) => decided,
            None => {
                let (bytes, _) = col.get(&name)?;
                match std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(|text| parser::parse_calendar(text).ok())
                {
                    Some(parsed) => query::calendar_matches(&parsed, filter),
                    None => {
                        tracing::warn!(name = %name, "unparseable member skipped by query");
                        false
                    }
                }
            }
        };
        if is_match {
            matched.push(name);
        }
    }
    Ok(matched)
}

// ---- calendar-multiget / addressbook-multiget ----

pub(super) async fn multiget(
    ctx: &Context,
    hrefs: Vec<dav::Href>,
    selector: Option<cal::CalendarSelector<All>>,
) -> Result<HttpResponse> {
    let mut responses = Vec::new();
    let mut not_found = Vec::new();

    for href in hrefs {
        let resolved = match node::path_segments(&ctx.config, &href.0) {
            Some(segments) => {
                let segs: Vec<&str> = segments.iter().map(String::as_str).collect();
                node::resolve(ctx, &segs).await.ok()
            }
            None => None,
        };
        match resolved {
            Some(target @ Node::Item(_)) => {
                let props = selector_props(selector.clone(), &target);
                let item = match &target {
                    Node::Item(i) => i,
                    _ => unreachable!(),
                };
                let parent = ColNode {
                    segments: item.segments[..item.segments.len() - 1].to_vec(),
                    col: item.col.clone(),
                };
                responses.push(item_response(ctx, &parent, &item.name, &props).await);
            }
            _ => not_found.push(href),
        }
    }

    if !not_found.is_empty() {
        responses.push(dav::Response {
            status_or_propstat: dav::StatusOrPropstat::Status(
                not_found,
                dav::Status(StatusCode::NOT_FOUND),
            ),
            error: None,
            responsedescription: None,
            location: None,
        });
    }

    serialize(MULTISTATUS, multistatus(responses, None))
}

// ---- free-busy-query ----

pub(super) async fn free_busy_query(
    ctx: &Context,
    target: &Node,
    report: cal::FreeBusyQuery,
) -> Result<HttpResponse> {
    let col_node = match expect_collection(
        target,
        &[CollectionKind::Calendar, CollectionKind::Subscription],
    ) {
        Ok(c) => c,
        Err(resp) => return Ok(resp),
    };
    let _ = ctx;

    let (start, end) = report.0.bounds();
    let end = end.min(recur::far_future());

    let col = &col_node.col;
    let members = match col.list() {
        Ok(v) => v,
        Err(e) => return Ok(super::controller::store_error_response(e)),
    };
    let mut parsed_members = Vec::new();
    for (name, _) in members {
        let (bytes, _) = match col.get(&name) {
            Ok(v) => v,
            Err(e) => return Ok(super::controller::store_error_response(e)),
        };
        if let Some(parsed) = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|t| parser::parse_calendar(t).ok())
        {
            parsed_members.push(parsed);
        }
    }

    let periods = freebusy::collection_freebusy(parsed_members.iter(), start, end);
    let reply = freebusy::assemble_vfreebusy(&periods, start, end, chrono::Utc::now());

    Ok(hyper::Response::builder()
        .status(200)
        .header("content-type", "text/calendar; charset=utf-8")
        .body(text_body(reply.to_string()))?)
}

// ---- addressbook-query ----

pub(super) async fn addressbook_query(
    ctx: &Context,
    target: &Node,
    report: card::AddressbookQuery<All>,
) -> Result<HttpResponse> {
    let col_node = match expect_collection(target, &[CollectionKind::Addressbook]) {
        Ok(c) => c,
        Err(resp) => return Ok(resp),
    };
    let props = selector_props(report.selector.clone(), target);

    let col = &col_node.col;
    let members = match col.list() {
        Ok(v) => v,
        Err(e) => return Ok(super::controller::store_error_response(e)),
    };

    let index_values = if members.len() >= ctx.config.index_threshold {
        let keys = index::required_keys_card(&report.filter);
        col.ctag()
            .ok()
            .and_then(|tree| {
                col.index()
                    .get_index(col.db(), tree, ItemKind::Addressbook, &keys)
                    .ok()
            })
    } else {
        None
    };

    let mut matched = Vec::new();
    for (name, _etag) in members {
        let indexed = index_values
            .as_ref()
            .and_then(|values| values.get(&name))
            .and_then(|values| index::check_card(&report.filter, values));
        let is_match = match indexed {
            Some(decided) => decided,
            None => {
                let (bytes, _) = match col.get(&name) {
                    Ok(v) => v,
                    Err(e) => return Ok(super::controller::store_error_response(e)),
                };
                match std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(|text| parser::parse_vcard(text).ok())
                {
                    Some(parsed) => query::vcard_matches(&parsed, &report.filter),
                    None => false,
                }
            }
        };
        if is_match {
            matched.push(name);
        }
    }

    // client-requested result bound; no sync-token here, a truncated
    // answer is simply shorter
    if let Some(vers::Limit(vers::NResults(n))) = report.limit {
        matched.truncate(n as usize);
    }

    let mut responses = Vec::with_capacity(matched.len());
    for name in matched {
        responses.push(item_response(ctx, col_node, &name, &props).await);
    }
    serialize(MULTISTATUS, multistatus(responses, None))
}

// ---- sync-collection ----

pub(super) async fn sync_collection(
    ctx: &Context,
    target: &Node,
    report: sync::SyncCollection<All>,
) -> Result<HttpResponse> {
    let col_node = match expect_collection(
        target,
        &[
            CollectionKind::Calendar,
            CollectionKind::Addressbook,
            CollectionKind::Subscription,
            CollectionKind::Plain,
        ],
    ) {
        Ok(c) => c,
        Err(resp) => return Ok(resp),
    };
    if matches!(report.sync_level, sync::SyncLevel::Infinite) {
        tracing::debug!("carillon collections do not nest, sync-level infinite behaves as 1");
    }

    let col = &col_node.col;
    let head = match col.sync_token() {
        Ok(v) => v,
        Err(e) => return Ok(super::controller::store_error_response(e)),
    };

    let old = match &report.sync_token {
        sync::SyncTokenRequest::InitialSync => None,
        sync::SyncTokenRequest::IncrementalSync(raw) => {
            match resource::parse_sync_token(raw) {
                Some(id) => Some(id),
                None => return Ok(stale_token_response()),
            }
        }
    };

    let changes = match old {
        None => match col.list() {
            Ok(members) => members
                .into_iter()
                .map(|(name, etag)| carillon_store::Change {
                    name,
                    kind: ChangeKind::Added,
                    etag: Some(etag),
                })
                .collect(),
            Err(e) => return Ok(super::controller::store_error_response(e)),
        },
        Some(old_id) => match col.iter_changes(Some(old_id), head) {
            Ok(v) => v,
            Err(StoreError::TokenStale) => return Ok(stale_token_response()),
            Err(e) => return Ok(super::controller::store_error_response(e)),
        },
    };

    let limit = report
        .limit
        .as_ref()
        .map(|vers::Limit(vers::NResults(n))| *n as usize);
    let truncated = limit.map(|n| changes.len() > n).unwrap_or(false);
    let changes: Vec<_> = match limit {
        Some(n) => changes.into_iter().take(n).collect(),
        None => changes.into_iter().collect(),
    };

    let props = Some(report.prop.clone());
    let mut responses = Vec::with_capacity(changes.len());
    for change in changes {
        match change.kind {
            ChangeKind::Deleted => {
                // tombstone: a plain 404 status, no propstat
                let mut segments = col_node.segments.clone();
                segments.push(change.name.clone());
                let href = Node::Missing(super::node::MissingNode {
                    segments,
                    parent: None,
                    name: change.name.clone(),
                })
                .href(ctx);
                responses.push(dav::Response {
                    status_or_propstat: dav::StatusOrPropstat::Status(
                        vec![dav::Href(href)],
                        dav::Status(StatusCode::NOT_FOUND),
                    ),
                    error: None,
                    responsedescription: None,
                    location: None,
                });
            }
            ChangeKind::Added | ChangeKind::Modified => {
                responses.push(item_response(ctx, col_node, &change.name, &props).await);
            }
        }
    }

    // a truncated delta omits the token: the client must ask again
    let extension = match truncated {
        true => None,
        false => Some(all::Multistatus::Sync(sync::Multistatus {
            sync_token: sync::SyncToken(resource::format_sync_token(head)),
        })),
    };

    serialize(MULTISTATUS, multistatus(responses, extension))
}

fn stale_token_response() -> HttpResponse {
    // RFC 6578 §3.2: 403 with DAV:valid-sync-token
    codec::error_response(
        StatusCode::FORBIDDEN,
        dav::Violation::Extension(all::Violation::Sync(sync::Violation::ValidSyncToken)),
    )
}

// ---- expand-property ----

/// Resolve one `property` selector of an expand-property report into a
/// typed request, by running the element through the regular decoder.
async fn named_request(ns: Option<&str>, name: &str) -> Option<dav::PropertyRequest<All>> {
    let ns = ns.unwrap_or("DAV:");
    let source = format!(r#"<prop xmlns="DAV:"><x:{} xmlns:x="{}"/></prop>"#, name, ns);
    let mut rdr = carillon_dav::xml::Reader::new(quick_xml::reader::NsReader::from_reader(
        source.as_bytes(),
    ))
    .await
    .ok()?;
    let parsed: dav::PropName<All> = rdr.find().await.ok()?;
    parsed.0.into_iter().next()
}

fn hrefs_of(prop: &dav::Property<All>) -> Vec<String> {
    use dav::Property as P;
    match prop {
        P::Extension(all::Property::Cal(cal::Property::CalendarHomeSet(h))) => vec![h.0.clone()],
        P::Extension(all::Property::Cal(cal::Property::ScheduleInboxUrl(h))) => vec![h.0.clone()],
        P::Extension(all::Property::Cal(cal::Property::ScheduleOutboxUrl(h))) => vec![h.0.clone()],
        P::Extension(all::Property::Cal(cal::Property::CalendarUserAddressSet(hs))) => {
            hs.iter().map(|h| h.0.clone()).collect()
        }
        P::Extension(all::Property::Card(card::Property::AddressbookHomeSet(h))) => {
            vec![h.0.clone()]
        }
        P::Extension(all::Property::Acl(acl::Property::Owner(h))) => vec![h.0.clone()],
        P::Extension(all::Property::Acl(acl::Property::PrincipalUrl(h))) => vec![h.0.clone()],
        P::Extension(all::Property::Acl(acl::Property::CurrentUserPrincipal(
            acl::User::Authenticated(h),
        ))) => vec![h.0.clone()],
        _ => vec![],
    }
}

pub(super) async fn expand_property(
    ctx: &Context,
    target: &Node,
    report: vers::ExpandProperty,
) -> Result<HttpResponse> {
    let mut requested = Vec::new();
    let mut nested: Vec<(dav::PropertyRequest<All>, Vec<vers::PropertyExpansion>)> = Vec::new();
    for expansion in report.0.iter() {
        if let Some(req) = named_request(expansion.namespace.as_deref(), &expansion.name).await {
            if !expansion.nested.is_empty() {
                nested.push((req.clone(), expansion.nested.clone()));
            }
            requested.push(req);
        }
    }

    let props = dav::PropName(requested);
    let (found, missing) = resource::properties(ctx, target, &props).await;
    let mut responses = vec![resource::response_props(
        target.href(ctx),
        found.clone(),
        missing,
    )];

    // expand href-valued properties into responses of their own
    for (req, inner) in nested {
        let matching = found
            .iter()
            .filter(|p| resource_matches_request(p, &req))
            .flat_map(hrefs_of);
        for href in matching {
            let Some(segments) = node::path_segments(&ctx.config, &href) else {
                continue;
            };
            let segs: Vec<&str> = segments.iter().map(String::as_str).collect();
            let Ok(child) = node::resolve(ctx, &segs).await else {
                continue;
            };
            if !child.exists() {
                continue;
            }
            let mut inner_reqs = Vec::new();
            for expansion in inner.iter() {
                if let Some(r) =
                    named_request(expansion.namespace.as_deref(), &expansion.name).await
                {
                    inner_reqs.push(r);
                }
            }
            let inner_props = dav::PropName(inner_reqs);
            let (found, missing) = resource::properties(ctx, &child, &inner_props).await;
            responses.push(resource::response_props(child.href(ctx), found, missing));
        }
    }

    serialize(MULTISTATUS, multistatus(responses, None))
}

fn resource_matches_request(
    prop: &dav::Property<All>,
    req: &dav::PropertyRequest<All>,
) -> bool {
    use dav::Property as P;
    use dav::PropertyRequest as Req;
    matches!(
        (prop, req),
        (
            P::Extension(all::Property::Cal(cal::Property::CalendarHomeSet(_))),
            Req::Extension(all::PropertyRequest::Cal(cal::PropertyRequest::CalendarHomeSet)),
        ) | (
            P::Extension(all::Property::Card(card::Property::AddressbookHomeSet(_))),
            Req::Extension(all::PropertyRequest::Card(
                card::PropertyRequest::AddressbookHomeSet
            )),
        ) | (
            P::Extension(all::Property::Acl(acl::Property::CurrentUserPrincipal(_))),
            Req::Extension(all::PropertyRequest::Acl(
                acl::PropertyRequest::CurrentUserPrincipal
            )),
        ) | (
            P::Extension(all::Property::Acl(acl::Property::PrincipalUrl(_))),
            Req::Extension(all::PropertyRequest::Acl(acl::PropertyRequest::PrincipalUrl)),
        ) | (
            P::Extension(all::Property::Acl(acl::Property::Owner(_))),
            Req::Extension(all::PropertyRequest::Acl(acl::PropertyRequest::Owner)),
        )
    )
}

// ---- principal-match (stub) ----

pub(super) async fn principal_match(
    ctx: &Context,
    _target: &Node,
    _report: acl::PrincipalMatch,
) -> Result<HttpResponse> {
    // the only principal the server can vouch for is the requester
    let mut responses = Vec::new();
    if let Some(principal) = &ctx.principal {
        let segments = vec![principal.clone()];
        let segs: Vec<&str> = segments.iter().map(String::as_str).collect();
        if let Ok(target @ Node::Collection(_)) = node::resolve(ctx, &segs).await {
            responses.push(dav::Response {
                status_or_propstat: dav::StatusOrPropstat::Status(
                    vec![dav::Href(target.href(ctx))],
                    dav::Status(StatusCode::OK),
                ),
                error: None,
                responsedescription: None,
                location: None,
            });
        }
    }
    serialize(MULTISTATUS, multistatus(responses, None))
}

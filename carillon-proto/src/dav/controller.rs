//! Per-verb protocol handlers.

use anyhow::Result;
use http::status::StatusCode;
use hyper::{Request, Response};

use carillon_dav::caltypes as cal;
use carillon_dav::cardtypes as card;
use carillon_dav::realization::{self as all, All};
use carillon_dav::types as dav;
use carillon_dav::versioningtypes as vers;
use carillon_store::{CollectionKind, CollectionMeta, Preconditions, StoreError};

use super::codec::{self, deserialize, serialize, text_body, Conditions, EtagList, HttpBody, HttpResponse};
use super::node::{self, ColNode, MissingNode, Node};
use super::report;
use super::resource::{self, PatchItem};
use super::Context;

const DAV_CAPABILITIES: &str =
    "1, 3, access-control, calendar-access, addressbook, extended-mkcol, calendar-schedule";

pub struct Controller {
    ctx: Context,
    node: Node,
    req: Request<HttpBody>,
}

impl Controller {
    pub async fn route(ctx: Context, req: Request<HttpBody>) -> Result<HttpResponse> {
        let method = req.method().as_str().to_uppercase();

        if ctx.principal.is_none() && method != "OPTIONS" {
            return Ok(Response::builder()
                .status(401)
                .header("WWW-Authenticate", "Basic realm=\"carillon\"")
                .body(text_body("Authentication required"))?);
        }

        if let Some(principal) = &ctx.principal {
            if let Err(e) = node::ensure_principal(&ctx, principal) {
                tracing::error!(err = %e, "principal autocreate failed");
            }
        }

        let segments = match node::path_segments(&ctx.config, req.uri().path()) {
            Some(v) => v,
            None => return Ok(codec::status_response(404, "Resource not found")),
        };
        let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

        let node = match node::resolve(&ctx, &segs).await {
            Ok(v) => v,
            Err(StoreError::NotFound) | Err(StoreError::BadName(_)) => {
                // creation verbs care about the missing intermediate
                let status = match method.as_str() {
                    "PUT" | "MKCOL" | "MKCALENDAR" | "COPY" | "MOVE" => 409,
                    _ => 404,
                };
                return Ok(codec::status_response(status, "Resource not found"));
            }
            Err(e) => return Ok(store_error_response(e)),
        };

        let ctrl = Self { ctx, node, req };

        match method.as_str() {
            "OPTIONS" => ctrl.options(),
            "GET" => ctrl.get(false).await,
            "HEAD" => ctrl.get(true).await,
            "PUT" => ctrl.put().await,
            "DELETE" => ctrl.delete().await,
            "PROPFIND" => ctrl.propfind().await,
            "PROPPATCH" => ctrl.proppatch().await,
            "MKCOL" => ctrl.mkcol(None).await,
            "MKCALENDAR" => ctrl.mkcalendar().await,
            "COPY" => ctrl.copy_move(false).await,
            "MOVE" => ctrl.copy_move(true).await,
            "POST" => ctrl.post().await,
            "REPORT" => ctrl.report().await,
            // advertised but unimplemented, as promised
            "LOCK" | "UNLOCK" => Ok(codec::status_response(501, "Locking is not implemented")),
            _ => Ok(codec::status_response(501, "HTTP method not implemented")),
        }
    }

    fn options(self) -> Result<HttpResponse> {
        Ok(Response::builder()
            .status(200)
            .header("DAV", DAV_CAPABILITIES)
            .header("Allow", self.node.allow())
            .body(text_body(""))?)
    }

    async fn get(self, head_only: bool) -> Result<HttpResponse> {
        match &self.node {
            Node::Item(item) => {
                let (bytes, etag) = match item.col.get(&item.name) {
                    Ok(v) => v,
                    Err(e) => return Ok(store_error_response(e)),
                };
                let builder = Response::builder()
                    .status(200)
                    .header("Content-Type", item.col.content_type(&item.name))
                    .header("Content-Length", bytes.len().to_string())
                    .header("ETag", format!("\"{}\"", etag));
                let body = match head_only {
                    true => text_body(""),
                    false => text_body(bytes),
                };
                Ok(builder.body(body)?)
            }
            Node::Missing(_) => Ok(codec::status_response(404, "Resource not found")),
            _ => Ok(Response::builder()
                .status(405)
                .header("Allow", self.node.allow())
                .body(text_body("GET is for stored resources"))?),
        }
    }

    async fn put(self) -> Result<HttpResponse> {
        let conditions = match codec::conditions(&self.req) {
            Ok(v) => v,
            Err(resp) => return Ok(resp),
        };

        let (col, name, existing) = match &self.node {
            Node::Item(item) => {
                let etag = item.col.etag(&item.name).ok();
                (item.col.clone(), item.name.clone(), etag)
            }
            Node::Missing(missing) => match &missing.parent {
                Some(col) => (col.clone(), missing.name.clone(), None),
                None => return Ok(codec::status_response(409, "no parent collection")),
            },
            _ => {
                return Ok(Response::builder()
                    .status(405)
                    .header("Allow", self.node.allow())
                    .body(text_body("PUT is for resources"))?)
            }
        };

        if let Some(resp) = check_content_type(&self.ctx, &self.req, &col) {
            return Ok(resp);
        }
        if conditions.check(existing.as_deref()).is_err() {
            return Ok(codec::status_response(412, "Precondition failed"));
        }

        let author = self.ctx.principal.clone().unwrap_or_default();
        let bytes = match codec::body_bytes(self.req).await {
            Ok(v) => v,
            Err(resp) => return Ok(resp),
        };

        let pre = store_preconditions(&conditions);
        match col.put(&name, &bytes, &pre, &author).await {
            Ok(outcome) => {
                let status = if outcome.created { 201 } else { 204 };
                Ok(Response::builder()
                    .status(status)
                    .header("ETag", format!("\"{}\"", outcome.etag))
                    .body(text_body(""))?)
            }
            Err(e) => Ok(put_error_response(&self.ctx, &col, e)),
        }
    }

    async fn delete(self) -> Result<HttpResponse> {
        let conditions = match codec::conditions(&self.req) {
            Ok(v) => v,
            Err(resp) => return Ok(resp),
        };

        match &self.node {
            Node::Item(item) => {
                let author = self.ctx.principal.clone().unwrap_or_default();
                let pre = store_preconditions(&conditions);
                match item.col.delete(&item.name, &pre, &author).await {
                    Ok(()) => Ok(codec::status_response(204, "")),
                    Err(e) => Ok(store_error_response(e)),
                }
            }
            Node::Collection(c) => {
                let segs: Vec<&str> = c.segments.iter().map(String::as_str).collect();
                match self.ctx.store.delete_collection(&segs) {
                    Ok(()) => Ok(codec::status_response(204, "")),
                    Err(e) => Ok(store_error_response(e)),
                }
            }
            Node::Missing(_) => Ok(codec::status_response(404, "Resource not found")),
            Node::Root => Ok(codec::status_response(403, "the root stays")),
        }
    }

    async fn propfind(self) -> Result<HttpResponse> {
        if !self.node.exists() {
            return Ok(codec::status_response(404, "Resource not found"));
        }
        let depth = codec::depth(&self.req);

        // A client may choose not to submit a request body.  An empty
        // PROPFIND request body MUST be treated as an allprop request.
        let propfind = deserialize::<dav::PropFind<All>>(self.req)
            .await
            .unwrap_or_else(|_| dav::PropFind::<All>::AllProp(None));
        tracing::debug!(recv=?propfind, "inferred propfind request");

        let mut nodes = vec![self.node.clone()];
        match depth {
            dav::Depth::Zero => (),
            dav::Depth::One => {
                nodes.extend(children(&self.ctx, &self.node).await);
            }
            dav::Depth::Infinity => {
                let mut queue = children(&self.ctx, &self.node).await;
                while let Some(next) = queue.pop() {
                    queue.extend(children(&self.ctx, &next).await);
                    nodes.push(next);
                }
            }
        }

        let propname = match propfind {
            dav::PropFind::PropName => None,
            dav::PropFind::AllProp(None) => Some(AllpropSource::PerNode),
            dav::PropFind::AllProp(Some(dav::Include(include))) => {
                Some(AllpropSource::PerNodePlus(include))
            }
            dav::PropFind::Prop(inner) => Some(AllpropSource::Fixed(inner)),
        };

        let mut responses = Vec::with_capacity(nodes.len());
        for target in nodes {
            match &propname {
                None => responses.push(resource::response_propname(&self.ctx, &target)),
                Some(source) => {
                    let props = match source {
                        AllpropSource::Fixed(inner) => inner.clone(),
                        AllpropSource::PerNode => resource::supported_properties(&target),
                        AllpropSource::PerNodePlus(include) => {
                            let mut props = resource::supported_properties(&target);
                            props.0.extend(include.iter().cloned());
                            props
                        }
                    };
                    let (found, missing) = resource::properties(&self.ctx, &target, &props).await;
                    responses.push(resource::response_props(
                        target.href(&self.ctx),
                        found,
                        missing,
                    ));
                }
            }
        }

        serialize(
            StatusCode::MULTI_STATUS,
            dav::Multistatus::<All> {
                responses,
                responsedescription: None,
                extension: None,
            },
        )
    }

    async fn proppatch(self) -> Result<HttpResponse> {
        if !self.node.exists() {
            return Ok(codec::status_response(404, "Resource not found"));
        }
        let href = self.node.href(&self.ctx);
        let update = match deserialize::<dav::PropertyUpdate<All>>(self.req).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(err=?e, "unable to decode PROPPATCH body");
                return Ok(codec::status_response(400, "Bad request"));
            }
        };

        let mut items = Vec::new();
        for instruction in update.0 {
            match instruction {
                dav::PropertyUpdateItem::Set(dav::Set(dav::PropValue(props))) => {
                    items.extend(props.into_iter().map(PatchItem::Set));
                }
                dav::PropertyUpdateItem::Remove(dav::Remove(dav::PropName(reqs))) => {
                    items.extend(reqs.into_iter().map(PatchItem::Remove));
                }
            }
        }

        let outcomes = match resource::patch_properties(&self.node, items) {
            Ok(v) => v,
            Err(e) => return Ok(store_error_response(e)),
        };

        // one propstat per distinct status
        let mut propstats: Vec<dav::PropStat<All>> = Vec::new();
        for (echo, status) in outcomes {
            match propstats.iter_mut().find(|ps| ps.status.0 == status) {
                Some(ps) => ps.prop.0.push(echo),
                None => propstats.push(dav::PropStat {
                    prop: dav::AnyProp(vec![echo]),
                    status: dav::Status(status),
                    error: None,
                    responsedescription: None,
                }),
            }
        }
        if propstats.is_empty() {
            propstats.push(dav::PropStat {
                prop: dav::AnyProp(vec![]),
                status: dav::Status(StatusCode::OK),
                error: None,
                responsedescription: None,
            });
        }

        serialize(
            StatusCode::MULTI_STATUS,
            dav::Multistatus::<All> {
                responses: vec![dav::Response {
                    status_or_propstat: dav::StatusOrPropstat::PropStat(dav::Href(href), propstats),
                    error: None,
                    responsedescription: None,
                    location: None,
                }],
                responsedescription: None,
                extension: None,
            },
        )
    }

    async fn mkcol(self, forced_kind: Option<CollectionKind>) -> Result<HttpResponse> {
        let missing = match &self.node {
            Node::Missing(m) => m.clone(),
            _ => {
                return Ok(Response::builder()
                    .status(405)
                    .header("Allow", self.node.allow())
                    .body(text_body("collection exists"))?)
            }
        };
        if let Some(parent) = &missing.parent {
            if parent.item_kind().is_some() {
                // a calendar contains only items, never subcollections
                return Ok(codec::status_response(405, "collections do not nest here"));
            }
        }

        // Extended MKCOL: an optional body carries the initial properties
        let ctx = self.ctx;
        let body = deserialize::<dav::Mkcol<All>>(self.req).await.ok();
        let mut items: Vec<PatchItem> = Vec::new();
        let mut kind = forced_kind.unwrap_or(CollectionKind::Plain);
        if let Some(dav::Mkcol(sets)) = body {
            for dav::Set(dav::PropValue(props)) in sets {
                for prop in props {
                    if let dav::Property::ResourceType(types) = &prop {
                        kind = kind_of_resourcetypes(types).unwrap_or(kind);
                        continue;
                    }
                    items.push(PatchItem::Set(prop));
                }
            }
        }

        let segs: Vec<&str> = missing.segments.iter().map(String::as_str).collect();
        let created = match ctx.store.create_collection(&segs, CollectionMeta::new(kind)) {
            Ok(col) => col,
            Err(e) => return Ok(store_error_response(e)),
        };

        // initial property set is atomic with the creation: on refusal
        // the collection is rolled back
        if !items.is_empty() {
            let col_node = Node::Collection(ColNode {
                segments: missing.segments.clone(),
                col: created,
            });
            let outcomes = resource::patch_properties(&col_node, items);
            let failed = match &outcomes {
                Ok(list) => list.iter().any(|(_, s)| *s != StatusCode::OK),
                Err(_) => true,
            };
            if failed {
                let _ = ctx.store.delete_collection(&segs);
                return Ok(codec::status_response(403, "initial property set refused"));
            }
        }

        Ok(codec::status_response(201, ""))
    }

    async fn mkcalendar(self) -> Result<HttpResponse> {
        let missing = match &self.node {
            Node::Missing(m) => m.clone(),
            _ => {
                return Ok(Response::builder()
                    .status(405)
                    .header("Allow", self.node.allow())
                    .body(text_body("collection exists"))?)
            }
        };
        if let Some(parent) = &missing.parent {
            if parent.item_kind().is_some() {
                return Ok(codec::status_response(405, "calendars do not nest"));
            }
        }

        let ctx = self.ctx;
        let body = deserialize::<cal::MkCalendar<All>>(self.req).await.ok();
        let mut items: Vec<PatchItem> = Vec::new();
        if let Some(cal::MkCalendar(dav::Set(dav::PropValue(props)))) = body {
            for prop in props {
                if matches!(prop, dav::Property::ResourceType(_)) {
                    continue;
                }
                items.push(PatchItem::Set(prop));
            }
        }

        let segs: Vec<&str> = missing.segments.iter().map(String::as_str).collect();
        let created = match ctx
            .store
            .create_collection(&segs, CollectionMeta::new(CollectionKind::Calendar))
        {
            Ok(col) => col,
            Err(e) => return Ok(store_error_response(e)),
        };

        if !items.is_empty() {
            let col_node = Node::Collection(ColNode {
                segments: missing.segments.clone(),
                col: created,
            });
            let outcomes = resource::patch_properties(&col_node, items);
            let failed = match &outcomes {
                Ok(list) => list.iter().any(|(_, s)| *s != StatusCode::OK),
                Err(_) => true,
            };
            if failed {
                let _ = ctx.store.delete_collection(&segs);
                return Ok(codec::status_response(403, "initial property set refused"));
            }
        }

        Ok(codec::status_response(201, ""))
    }

    async fn copy_move(self, is_move: bool) -> Result<HttpResponse> {
        let source = match &self.node {
            Node::Item(item) => item.clone(),
            Node::Missing(_) => return Ok(codec::status_response(404, "Resource not found")),
            _ => {
                return Ok(codec::status_response(
                    403,
                    "COPY/MOVE is implemented for resources",
                ))
            }
        };

        let destination = match self
            .req
            .headers()
            .get("Destination")
            .and_then(|v| v.to_str().ok())
        {
            Some(v) => v.to_string(),
            None => return Ok(codec::status_response(400, "Destination header required")),
        };
        let overwrite = !matches!(
            self.req
                .headers()
                .get("Overwrite")
                .and_then(|v| v.to_str().ok()),
            Some("F") | Some("f")
        );

        let dest_path = strip_authority(&destination);
        let dest_segments = match node::path_segments(&self.ctx.config, dest_path) {
            Some(v) => v,
            None => return Ok(codec::status_response(400, "bad Destination")),
        };
        let dest_segs: Vec<&str> = dest_segments.iter().map(String::as_str).collect();
        let dest = match node::resolve(&self.ctx, &dest_segs).await {
            Ok(v) => v,
            Err(StoreError::NotFound) => {
                return Ok(codec::status_response(409, "destination parent is missing"))
            }
            Err(e) => return Ok(store_error_response(e)),
        };

        let (dest_col, dest_name, dest_exists) = match &dest {
            Node::Item(item) => (item.col.clone(), item.name.clone(), true),
            Node::Missing(MissingNode {
                parent: Some(col),
                name,
                ..
            }) => (col.clone(), name.clone(), false),
            _ => return Ok(codec::status_response(409, "bad destination")),
        };
        if dest_exists && !overwrite {
            return Ok(codec::status_response(409, "destination exists"));
        }

        let (bytes, _etag) = match source.col.get(&source.name) {
            Ok(v) => v,
            Err(e) => return Ok(store_error_response(e)),
        };
        let author = self.ctx.principal.clone().unwrap_or_default();

        // same-name move within one collection is a no-op
        let same_target = std::sync::Arc::ptr_eq(&source.col, &dest_col) && source.name == dest_name;
        if same_target {
            return Ok(codec::status_response(403, "source and destination are one"));
        }

        if is_move && std::sync::Arc::ptr_eq(&source.col, &dest_col) {
            // same-collection move: delete first so the UID is free for
            // the destination name; both steps are separate commits
            if let Err(e) = source
                .col
                .delete(&source.name, &Preconditions::default(), &author)
                .await
            {
                return Ok(store_error_response(e));
            }
            if let Err(e) = dest_col
                .put(&dest_name, &bytes, &Preconditions::default(), &author)
                .await
            {
                return Ok(put_error_response(&self.ctx, &dest_col, e));
            }
        } else {
            // cross-collection: destination add, then source delete; the
            // pair is not atomic and a reader may observe both members
            if let Err(e) = dest_col
                .put(&dest_name, &bytes, &Preconditions::default(), &author)
                .await
            {
                return Ok(put_error_response(&self.ctx, &dest_col, e));
            }
            if is_move {
                if let Err(e) = source
                    .col
                    .delete(&source.name, &Preconditions::default(), &author)
                    .await
                {
                    return Ok(store_error_response(e));
                }
            }
        }

        let status = if dest_exists { 204 } else { 201 };
        Ok(codec::status_response(status, ""))
    }

    /// RFC 5995 add-member: POST to a collection stores the body under a
    /// server-chosen name.
    async fn post(self) -> Result<HttpResponse> {
        let col_node = match &self.node {
            Node::Collection(c) if c.col.kind().accepts_members() => c.clone(),
            Node::Collection(_) => {
                return Ok(codec::status_response(403, "collection is read-only"))
            }
            _ => return Ok(codec::status_response(405, "POST is for collections")),
        };

        let ctx = self.ctx;
        if let Some(resp) = check_content_type(&ctx, &self.req, &col_node.col) {
            return Ok(resp);
        }
        let bytes = match codec::body_bytes(self.req).await {
            Ok(v) => v,
            Err(resp) => return Ok(resp),
        };
        let author = ctx.principal.clone().unwrap_or_default();

        let extension = col_node
            .col
            .item_kind()
            .map(|k| k.extension())
            .unwrap_or("bin");
        let create_only = Preconditions {
            if_match: None,
            if_none_match_star: true,
        };

        // prefer a name derived from the body's UID, fall back to a
        // fresh UUID when it is unusable or taken
        let mut candidates = Vec::new();
        if let Some(uid) = uid_of(&col_node, &bytes) {
            let safe: String = uid
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
                .collect();
            if !safe.is_empty() && !safe.starts_with('.') {
                candidates.push(format!("{}.{}", safe, extension));
            }
        }
        candidates.push(format!("{}.{}", uuid::Uuid::new_v4(), extension));

        for name in candidates {
            match col_node.col.put(&name, &bytes, &create_only, &author).await {
                Ok(outcome) => {
                    let mut segments = col_node.segments.clone();
                    segments.push(name.clone());
                    let href = Node::Item(super::node::ItemNode {
                        segments,
                        col: col_node.col.clone(),
                        name,
                    })
                    .href(&ctx);
                    return Ok(Response::builder()
                        .status(201)
                        .header("Location", href)
                        .header("ETag", format!("\"{}\"", outcome.etag))
                        .body(text_body(""))?);
                }
                Err(StoreError::PreconditionFailed) | Err(StoreError::BadName(_)) => continue,
                Err(e) => return Ok(put_error_response(&ctx, &col_node.col, e)),
            }
        }
        Ok(codec::status_response(500, "could not allocate a member name"))
    }

    /// REPORT has been first described in the "Versioning Extension" of
    /// WebDAV; the request body's root element names the query.
    async fn report(self) -> Result<HttpResponse> {
        if !self.node.exists() {
            return Ok(codec::status_response(404, "Resource not found"));
        }
        let ctx = self.ctx;
        let target = self.node;
        let body = match deserialize::<vers::Report<All>>(self.req).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(err=?e, "unable to decode REPORT body");
                return Ok(codec::status_response(400, "Bad request"));
            }
        };

        match body {
            vers::Report::ExpandProperty(ep) => report::expand_property(&ctx, &target, ep).await,
            vers::Report::Extension(all::ReportType::Cal(cal::ReportType::Query(q))) => {
                report::calendar_query(&ctx, &target, q).await
            }
            vers::Report::Extension(all::ReportType::Cal(cal::ReportType::Multiget(m))) => {
                report::multiget(&ctx, m.href, m.selector).await
            }
            vers::Report::Extension(all::ReportType::Cal(cal::ReportType::FreeBusy(q))) => {
                report::free_busy_query(&ctx, &target, q).await
            }
            vers::Report::Extension(all::ReportType::Card(card::ReportType::Query(q))) => {
                report::addressbook_query(&ctx, &target, q).await
            }
            vers::Report::Extension(all::ReportType::Card(card::ReportType::Multiget(m))) => {
                report::multiget(&ctx, m.href, m.selector).await
            }
            vers::Report::Extension(all::ReportType::Sync(sc)) => {
                report::sync_collection(&ctx, &target, sc).await
            }
            vers::Report::Extension(all::ReportType::Acl(pm)) => {
                report::principal_match(&ctx, &target, pm).await
            }
        }
    }
}

enum AllpropSource {
    PerNode,
    PerNodePlus(Vec<dav::PropertyRequest<All>>),
    Fixed(dav::PropName<All>),
}

/// Children of a node for PROPFIND traversal: child collections plus
/// stored members.
async fn children(ctx: &Context, target: &Node) -> Vec<Node> {
    let mut out = Vec::new();
    let (segments, col) = match target {
        Node::Root => (Vec::new(), None),
        Node::Collection(c) => (c.segments.clone(), Some(c.col.clone())),
        _ => return out,
    };

    let segs: Vec<&str> = segments.iter().map(String::as_str).collect();
    if let Ok(names) = ctx.store.children(&segs) {
        for name in names {
            let mut child_segments = segments.clone();
            child_segments.push(name.clone());
            let child_segs: Vec<&str> = child_segments.iter().map(String::as_str).collect();
            if let Ok(Some(child)) = ctx.store.open_collection(&child_segs) {
                out.push(Node::Collection(ColNode {
                    segments: child_segments,
                    col: child,
                }));
            }
        }
    }

    if let Some(col) = col {
        if let Ok(members) = col.list() {
            for (name, _etag) in members {
                let mut child_segments = segments.clone();
                child_segments.push(name.clone());
                out.push(Node::Item(super::node::ItemNode {
                    segments: child_segments,
                    col: col.clone(),
                    name,
                }));
            }
        }
    }
    out
}

fn kind_of_resourcetypes(types: &[dav::ResourceType<All>]) -> Option<CollectionKind> {
    for t in types {
        match t {
            dav::ResourceType::Extension(all::ResourceType::Cal(cal::ResourceType::Calendar)) => {
                return Some(CollectionKind::Calendar)
            }
            dav::ResourceType::Extension(all::ResourceType::Card(
                card::ResourceType::Addressbook,
            )) => return Some(CollectionKind::Addressbook),
            dav::ResourceType::Extension(all::ResourceType::Acl(
                carillon_dav::acltypes::ResourceType::Principal,
            )) => return Some(CollectionKind::Principal),
            dav::ResourceType::Extension(all::ResourceType::Cal(
                cal::ResourceType::Subscribed,
            )) => return Some(CollectionKind::Subscription),
            _ => (),
        }
    }
    None
}

/// A Destination header may be an absolute URI; routing only needs the
/// path part.
fn strip_authority(dest: &str) -> &str {
    match dest.find("://") {
        Some(idx) => match dest[idx + 3..].find('/') {
            Some(slash) => &dest[idx + 3 + slash..],
            None => "/",
        },
        None => dest,
    }
}

fn store_preconditions(conditions: &Conditions) -> Preconditions {
    Preconditions {
        if_match: match &conditions.if_match {
            Some(EtagList::Tags(tags)) => tags.first().cloned(),
            _ => None,
        },
        if_none_match_star: matches!(conditions.if_none_match, Some(EtagList::Star)),
    }
}

/// PUT to a typed collection must carry the matching media type; with
/// `strict` off a missing Content-Type is tolerated.
fn check_content_type(
    ctx: &Context,
    req: &Request<HttpBody>,
    col: &carillon_store::Collection,
) -> Option<HttpResponse> {
    let expected = match col.item_kind() {
        Some(carillon_ical::validate::ItemKind::Calendar) => "text/calendar",
        Some(carillon_ical::validate::ItemKind::Addressbook) => "text/vcard",
        None => return None,
    };
    match req
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
    {
        Some(value) => {
            // text/directory is the legacy vCard 3 media type
            let ok = value.starts_with(expected)
                || (expected == "text/vcard" && value.starts_with("text/directory"));
            match ok {
                true => None,
                false => Some(codec::status_response(415, "unsupported media type")),
            }
        }
        None => match ctx.config.strict {
            true => Some(codec::status_response(415, "Content-Type required")),
            false => None,
        },
    }
}

fn uid_of(col_node: &ColNode, bytes: &[u8]) -> Option<String> {
    let kind = col_node.col.item_kind()?;
    let text = std::str::from_utf8(bytes).ok()?;
    carillon_ical::validate::validate(kind, text)
        .ok()
        .map(|v| v.uid)
}

/// PUT/POST errors with their RFC-defined condition elements.
fn put_error_response(
    ctx: &Context,
    col: &carillon_store::Collection,
    e: StoreError,
) -> HttpResponse {
    match e {
        StoreError::UidConflict { existing } => {
            let href = dav::Href(format!(
                "{}{}",
                ctx.config.route_prefix,
                existing_href_path(col, &existing, ctx)
            ));
            let violation = match col.item_kind() {
                Some(carillon_ical::validate::ItemKind::Addressbook) => dav::Violation::Extension(
                    all::Violation::Card(card::Violation::NoUidConflict(href)),
                ),
                _ => dav::Violation::Extension(all::Violation::Cal(
                    cal::Violation::NoUidConflict(href),
                )),
            };
            codec::error_response(StatusCode::CONFLICT, violation)
        }
        StoreError::Invalid(reason) => {
            tracing::warn!(err = %reason, "invalid payload refused");
            let violation = match col.item_kind() {
                Some(carillon_ical::validate::ItemKind::Addressbook) => {
                    dav::Violation::Extension(all::Violation::Card(
                        card::Violation::ValidAddressData,
                    ))
                }
                _ => dav::Violation::Extension(all::Violation::Cal(
                    cal::Violation::ValidCalendarData,
                )),
            };
            codec::error_response(StatusCode::BAD_REQUEST, violation)
        }
        other => store_error_response(other),
    }
}

fn existing_href_path(col: &carillon_store::Collection, name: &str, ctx: &Context) -> String {
    // reconstruct the collection path from its directory relative to the
    // store root
    let rel = col
        .dir()
        .strip_prefix(ctx.store.root())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    format!("/{}/{}", rel, name)
}

pub(super) fn store_error_response(e: StoreError) -> HttpResponse {
    match e {
        StoreError::NotFound => codec::status_response(404, "Not found"),
        StoreError::PreconditionFailed => codec::status_response(412, "Precondition failed"),
        StoreError::Invalid(reason) => {
            codec::status_response(400, format!("Invalid payload: {}", reason))
        }
        StoreError::UidConflict { .. } => codec::status_response(409, "UID conflict"),
        StoreError::Forbidden => codec::status_response(403, "Forbidden"),
        StoreError::TokenStale => codec::status_response(403, "Stale token"),
        StoreError::BadName(_) => codec::status_response(400, "Bad member name"),
        StoreError::AlreadyExists => codec::status_response(405, "Already exists"),
        StoreError::Storage(e) => {
            let correlation = uuid::Uuid::new_v4();
            tracing::error!(%correlation, err = %e, "storage failure");
            codec::status_response(500, format!("Internal error ({})", correlation))
        }
        StoreError::Corrupt(reason) => {
            let correlation = uuid::Uuid::new_v4();
            tracing::error!(%correlation, reason = %reason, "corrupt object store");
            codec::status_response(500, format!("Internal error ({})", correlation))
        }
    }
}

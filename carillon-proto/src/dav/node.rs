//! The resource graph: URI paths mapped onto store objects.
//!
//! Resource kinds are tagged variants sharing inherent methods rather
//! than trait objects; each verb handler matches on the variant it can
//! serve.

use std::sync::Arc;

use carillon_store::meta::{META_DIR, META_FILE};
use carillon_store::{Collection, CollectionKind, CollectionMeta, StoreError};

use super::Context;

#[derive(Clone)]
pub(crate) enum Node {
    /// The store root: its children are principals.
    Root,
    /// Any collection directory, principal homes included.
    Collection(ColNode),
    /// A stored resource inside a collection.
    Item(ItemNode),
    /// A path whose parent exists but which itself does not; PUT, MKCOL
    /// and MKCALENDAR create through it.
    Missing(MissingNode),
}

#[derive(Clone)]
pub(crate) struct ColNode {
    pub segments: Vec<String>,
    pub col: Arc<Collection>,
}

#[derive(Clone)]
pub(crate) struct ItemNode {
    pub segments: Vec<String>,
    pub col: Arc<Collection>,
    pub name: String,
}

#[derive(Clone)]
pub(crate) struct MissingNode {
    /// Path of the missing target itself
    pub segments: Vec<String>,
    /// Parent collection when there is one (PUT/POST need it; a MKCOL
    /// directly under the root has none)
    pub parent: Option<Arc<Collection>>,
    pub name: String,
}

impl Node {
    /// Href of this resource, route prefix applied, collections with a
    /// trailing slash.
    pub fn href(&self, ctx: &Context) -> String {
        let (segments, collection) = match self {
            Node::Root => return format!("{}/", ctx.config.route_prefix),
            Node::Collection(c) => (&c.segments, true),
            Node::Item(i) => (&i.segments, false),
            Node::Missing(m) => (&m.segments, false),
        };
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

    pub fn exists(&self) -> bool {
        !matches!(self, Node::Missing(_))
    }

    /// Methods the resource answers, for OPTIONS and 405 responses.
    pub fn allow(&self) -> &'static str {
        match self {
            Node::Root => "OPTIONS, PROPFIND, REPORT",
            Node::Collection(_) => {
                "OPTIONS, PROPFIND, PROPPATCH, REPORT, DELETE, MKCOL, MKCALENDAR, POST"
            }
            Node::Item(_) => "OPTIONS, GET, HEAD, PUT, DELETE, PROPFIND, PROPPATCH, COPY, MOVE",
            Node::Missing(_) => "OPTIONS, PUT, MKCOL, MKCALENDAR",
        }
    }
}

/// Resolve path segments against the store hierarchy.
pub(crate) async fn resolve(ctx: &Context, segments: &[&str]) -> Result<Node, StoreError> {
    if segments.is_empty() {
        return Ok(Node::Root);
    }
    if segments
        .iter()
        .any(|s| *s == META_DIR || *s == META_FILE)
    {
        return Err(StoreError::NotFound);
    }

    if let Some(col) = ctx.store.open_collection(segments)? {
        return Ok(Node::Collection(ColNode {
            segments: own(segments),
            col,
        }));
    }

    let (name, parent_segments) = match segments.split_last() {
        Some((name, rest)) => (*name, rest),
        None => return Ok(Node::Root),
    };

    let parent = ctx.store.open_collection(parent_segments)?;
    if let Some(parent_col) = &parent {
        if parent_col.etag(name).is_ok() {
            return Ok(Node::Item(ItemNode {
                segments: own(segments),
                col: parent_col.clone(),
                name: name.to_string(),
            }));
        }
    }

    // a missing node needs every intermediate segment to exist
    if !parent_segments.is_empty()
        && parent.is_none()
        && !ctx.store.dir_exists(parent_segments)?
    {
        return Err(StoreError::NotFound);
    }

    Ok(Node::Missing(MissingNode {
        segments: own(segments),
        parent,
        name: name.to_string(),
    }))
}

fn own(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

/// Normalise a request path into segments: fragment stripped (RFC 3986
/// §3.5), route prefix removed, `%XX` decoded per segment, dot segments
/// refused.
pub(crate) fn path_segments(config: &super::DavConfig, raw: &str) -> Option<Vec<String>> {
    let path = raw.split(['#', '?']).next().unwrap_or("");
    let path = match config.route_prefix.is_empty() {
        true => path,
        false => path.strip_prefix(config.route_prefix.as_str())?,
    };

    let mut out = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() {
            continue;
        }
        let decoded = percent_encoding::percent_decode_str(seg)
            .decode_utf8()
            .ok()?
            .to_string();
        if decoded == "." || decoded == ".." {
            return None;
        }
        out.push(decoded);
    }
    Some(out)
}

/// Idempotent principal provisioning, driven by the `autocreate` policy.
pub(crate) fn ensure_principal(ctx: &Context, principal: &str) -> Result<(), StoreError> {
    use super::Autocreate;

    if matches!(ctx.config.autocreate, Autocreate::None) {
        return Ok(());
    }
    let segments: Vec<&str> = principal.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Ok(());
    }

    if !ctx.store.is_collection(&segments)? {
        let mut meta = CollectionMeta::new(CollectionKind::Principal);
        meta.displayname = Some(segments.join("/"));
        ctx.store.create_collection(&segments, meta)?;
        tracing::info!(principal = principal, "autocreated principal");
    }

    if matches!(ctx.config.autocreate, Autocreate::Defaults) {
        for (home, leaf, kind) in [
            ("calendars", "calendar", CollectionKind::Calendar),
            ("contacts", "addressbook", CollectionKind::Addressbook),
        ] {
            let mut home_path = segments.clone();
            home_path.push(home);
            if !ctx.store.is_collection(&home_path)? {
                ctx.store
                    .create_collection(&home_path, CollectionMeta::new(CollectionKind::Plain))?;
            }
            let mut leaf_path = home_path.clone();
            leaf_path.push(leaf);
            if !ctx.store.is_collection(&leaf_path)? {
                let mut meta = CollectionMeta::new(kind);
                meta.displayname = Some(leaf.to_string());
                ctx.store.create_collection(&leaf_path, meta)?;
            }
        }
    }

    Ok(())
}

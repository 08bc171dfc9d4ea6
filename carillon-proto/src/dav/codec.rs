//! Body and header plumbing between hyper and the XML codecs.

use anyhow::Result;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use futures::stream::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use http_body_util::BodyStream;
use http_body_util::Full;
use http_body_util::StreamBody;
use hyper::body::Frame;
use hyper::{body::Bytes, Request, Response};
use std::io::{Error, ErrorKind};
use tokio_util::io::{CopyToBytes, SinkWriter};
use tokio_util::sync::PollSender;

use carillon_dav::types as dav;
use carillon_dav::xml as dxml;

/// The body type every handler speaks; hyper's `Incoming` is converted
/// at the server edge so tests can drive the controller with plain
/// buffers.
pub type HttpBody = UnsyncBoxBody<Bytes, std::io::Error>;
pub type HttpResponse = Response<HttpBody>;

pub(crate) fn text_body(txt: impl Into<Bytes>) -> HttpBody {
    UnsyncBoxBody::new(Full::new(txt.into()).map_err(|e| match e {}))
}

pub(crate) fn depth(req: &Request<impl hyper::body::Body>) -> dav::Depth {
    match req
        .headers()
        .get("Depth")
        .map(hyper::header::HeaderValue::to_str)
    {
        Some(Ok("0")) => dav::Depth::Zero,
        Some(Ok("1")) => dav::Depth::One,
        Some(Ok("infinity")) | Some(Ok("Infinity")) => dav::Depth::Infinity,
        _ => dav::Depth::Zero,
    }
}

/// Serialize an XML tree into a streaming response body.
pub(crate) fn serialize<T: dxml::QWrite + Send + 'static>(
    status_ok: hyper::StatusCode,
    elem: T,
) -> Result<HttpResponse> {
    let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(1);

    // Build the writer
    tokio::task::spawn(async move {
        let sink = PollSender::new(tx).sink_map_err(|_| Error::from(ErrorKind::BrokenPipe));
        let mut writer = SinkWriter::new(CopyToBytes::new(sink));
        let q = quick_xml::writer::Writer::new_with_indent(&mut writer, b' ', 4);
        let ns_to_apply = vec![
            ("xmlns:D".into(), "DAV:".into()),
            ("xmlns:C".into(), "urn:ietf:params:xml:ns:caldav".into()),
            ("xmlns:CR".into(), "urn:ietf:params:xml:ns:carddav".into()),
            ("xmlns:CS".into(), "http://calendarserver.org/ns/".into()),
            ("xmlns:A".into(), "http://apple.com/ns/ical/".into()),
        ];
        let mut qwriter = dxml::Writer { q, ns_to_apply };
        let decl = quick_xml::events::BytesDecl::from_start(
            quick_xml::events::BytesStart::from_content("xml version=\"1.0\" encoding=\"utf-8\"", 0),
        );
        match qwriter
            .q
            .write_event_async(quick_xml::events::Event::Decl(decl))
            .await
        {
            Ok(_) => (),
            Err(e) => tracing::error!(err=?e, "unable to write XML declaration <?xml ... >"),
        }
        match elem.qwrite(&mut qwriter).await {
            Ok(_) => tracing::debug!("fully serialized object"),
            Err(e) => tracing::error!(err=?e, "failed to serialize object"),
        }
    });

    // Build the reader
    let recv = tokio_stream::wrappers::ReceiverStream::new(rx);
    let stream = StreamBody::new(recv.map(|v| Ok(Frame::data(v))));
    let boxed_body = UnsyncBoxBody::new(stream);

    let response = Response::builder()
        .status(status_ok)
        .header("content-type", "application/xml; charset=\"utf-8\"")
        .body(boxed_body)?;

    Ok(response)
}

/// Deserialize a request body into an XML request tree.
pub(crate) async fn deserialize<T: dxml::Node<T>>(req: Request<HttpBody>) -> Result<T> {
    let stream_of_frames = BodyStream::new(req.into_body());
    let stream_of_bytes = stream_of_frames
        .map_ok(|frame| frame.into_data())
        .map(|obj| match obj {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(_)) => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "conversion error",
            )),
            Err(err) => Err(std::io::Error::new(std::io::ErrorKind::Other, err)),
        });
    let async_read = tokio_util::io::StreamReader::new(stream_of_bytes);
    let async_read = std::pin::pin!(async_read);
    let mut rdr = dxml::Reader::new(quick_xml::reader::NsReader::from_reader(async_read)).await?;
    let parsed = rdr.find::<T>().await?;
    Ok(parsed)
}

/// Collect a request body into memory, bounded by the resource size cap.
pub(crate) async fn body_bytes(req: Request<HttpBody>) -> Result<Bytes, HttpResponse> {
    match http_body_util::Limited::new(
        req.into_body(),
        super::resource::MAX_RESOURCE_SIZE as usize,
    )
    .collect()
    .await
    {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(_) => Err(Response::builder()
            .status(413)
            .body(text_body("Payload too large"))
            .unwrap()),
    }
}

/// Conditional request headers, reduced to entity tag lists.
#[derive(Debug, Default, Clone)]
pub(crate) struct Conditions {
    pub if_match: Option<EtagList>,
    pub if_none_match: Option<EtagList>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EtagList {
    Star,
    Tags(Vec<String>),
}

/// Strip the weak marker and quotes: the store compares raw hashes.
fn normalize_etag(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    raw.trim_matches('"').to_string()
}

fn parse_etag_list(raw: &str) -> EtagList {
    if raw.trim() == "*" {
        return EtagList::Star;
    }
    EtagList::Tags(
        raw.split(',')
            .map(normalize_etag)
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

/// Extract conditional headers. The tagged-list `If` header is not
/// interpreted; its presence yields 412 as announced.
pub(crate) fn conditions(
    req: &Request<impl hyper::body::Body>,
) -> Result<Conditions, HttpResponse> {
    if req.headers().contains_key("If") {
        return Err(Response::builder()
            .status(412)
            .body(text_body("If header lists are not supported"))
            .unwrap());
    }

    let mut out = Conditions::default();
    if let Some(v) = req.headers().get("If-Match").and_then(|v| v.to_str().ok()) {
        out.if_match = Some(parse_etag_list(v));
    }
    if let Some(v) = req
        .headers()
        .get("If-None-Match")
        .and_then(|v| v.to_str().ok())
    {
        out.if_none_match = Some(parse_etag_list(v));
    }
    Ok(out)
}

impl Conditions {
    /// Reduce against the current state of the target. `existing` is the
    /// raw etag when the resource exists.
    pub fn check(&self, existing: Option<&str>) -> Result<(), ()> {
        match (&self.if_match, existing) {
            (Some(EtagList::Star), None) => return Err(()),
            (Some(EtagList::Tags(tags)), Some(etag)) => {
                if !tags.iter().any(|t| t == etag) {
                    return Err(());
                }
            }
            (Some(EtagList::Tags(_)), None) => return Err(()),
            _ => (),
        }
        match (&self.if_none_match, existing) {
            (Some(EtagList::Star), Some(_)) => return Err(()),
            (Some(EtagList::Tags(tags)), Some(etag)) => {
                if tags.iter().any(|t| t == etag) {
                    return Err(());
                }
            }
            _ => (),
        }
        Ok(())
    }
}

pub(crate) fn status_response(status: u16, msg: impl Into<Bytes>) -> HttpResponse {
    Response::builder()
        .status(status)
        .body(text_body(msg))
        .unwrap()
}

/// A small XML error document carrying a DAV:error condition element.
pub(crate) fn error_response(
    status: hyper::StatusCode,
    violation: dav::Violation<carillon_dav::realization::All>,
) -> HttpResponse {
    match serialize(status, dav::Error::<carillon_dav::realization::All>(vec![violation])) {
        Ok(r) => r,
        Err(_) => status_response(status.as_u16(), "error"),
    }
}

//! End-to-end behaviour through the controller, without sockets: each
//! scenario drives the verb handlers against a temporary store.

use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Request;

use carillon_proto::dav::{Autocreate, Context, Controller, DavConfig, HttpBody, HttpResponse};
use carillon_store::Store;

const EVT_JAN: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nDTSTART:20240115T120000Z\r\nDTEND:20240115T130000Z\r\nSUMMARY:january\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
const EVT_JAN_EDITED: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nDTSTART:20240115T150000Z\r\nSUMMARY:january moved\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
const EVT_FEB: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:evt-2\r\nDTSTART:20240215T120000Z\r\nSUMMARY:february\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
const EVT_MAR: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:evt-3\r\nDTSTART:20240315T120000Z\r\nSUMMARY:march\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
const EVT_APR: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:evt-4\r\nDTSTART:20240415T120000Z\r\nSUMMARY:april\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
const EVT_UID_COPY: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nDTSTART:20240301T120000Z\r\nSUMMARY:impostor\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<Store>,
    config: Arc<DavConfig>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path(), 64));
        let config = Arc::new(DavConfig {
            route_prefix: String::new(),
            autocreate: Autocreate::Defaults,
            current_user_principal: Some("/alice/".into()),
            strict: false,
            index_threshold: 2,
        });
        Self {
            _dir: dir,
            store,
            config,
        }
    }

    async fn request(&self, method: &str, path: &str, body: &str) -> HttpResponse {
        self.request_with(method, path, body, &[]).await
    }

    async fn request_with(
        &self,
        method: &str,
        path: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> HttpResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let body: HttpBody =
            BodyExt::boxed_unsync(Full::new(Bytes::from(body.to_string())).map_err(|e| match e {}));
        let req = builder.body(body).unwrap();

        let ctx = Context {
            store: self.store.clone(),
            config: self.config.clone(),
            principal: Some("alice".into()),
        };
        Controller::route(ctx, req).await.unwrap()
    }
}

async fn body_string(resp: HttpResponse) -> String {
    let collected = resp.into_body().collect().await.unwrap();
    String::from_utf8(collected.to_bytes().to_vec()).unwrap()
}

fn header<'a>(resp: &'a HttpResponse, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Scenario: empty PROPFIND at depth 0 on the auto-created calendar.
#[tokio::test]
async fn propfind_depth_zero_on_calendar() {
    let h = Harness::new();
    let resp = h
        .request_with(
            "PROPFIND",
            "/alice/calendars/calendar/",
            r#"<propfind xmlns="DAV:"><prop><displayname/><resourcetype/></prop></propfind>"#,
            &[("Depth", "0")],
        )
        .await;
    assert_eq!(resp.status(), 207);

    let body = body_string(resp).await;
    assert_eq!(body.matches("<D:response>").count(), 1);
    assert!(body.contains("<D:displayname>calendar</D:displayname>"), "{}", body);
    assert!(body.contains("<D:collection/>"), "{}", body);
    assert!(body.contains("<C:calendar/>"), "{}", body);
}

/// Scenario: PUT then conditional PUT with a wrong tag.
#[tokio::test]
async fn conditional_put() {
    let h = Harness::new();
    let resp = h
        .request("PUT", "/alice/calendars/calendar/evt-1.ics", EVT_JAN)
        .await;
    assert_eq!(resp.status(), 201);
    let etag = header(&resp, "ETag").unwrap().to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    // wrong If-Match: refused, nothing changed
    let resp = h
        .request_with(
            "PUT",
            "/alice/calendars/calendar/evt-1.ics",
            EVT_JAN_EDITED,
            &[("If-Match", "\"0000000000000000\"")],
        )
        .await;
    assert_eq!(resp.status(), 412);

    let resp = h
        .request("GET", "/alice/calendars/calendar/evt-1.ics", "")
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(header(&resp, "ETag"), Some(etag.as_str()));
    assert_eq!(body_string(resp).await, EVT_JAN);

    // correct If-Match: accepted
    let resp = h
        .request_with(
            "PUT",
            "/alice/calendars/calendar/evt-1.ics",
            EVT_JAN_EDITED,
            &[("If-Match", etag.as_str())],
        )
        .await;
    assert_eq!(resp.status(), 204);
}

/// Scenario: a second resource claiming an existing UID is refused with
/// the CalDAV condition element.
#[tokio::test]
async fn uid_uniqueness() {
    let h = Harness::new();
    let resp = h
        .request("PUT", "/alice/calendars/calendar/evt-1.ics", EVT_JAN)
        .await;
    assert_eq!(resp.status(), 201);

    let resp = h
        .request("PUT", "/alice/calendars/calendar/copy.ics", EVT_UID_COPY)
        .await;
    assert_eq!(resp.status(), 409);
    let body = body_string(resp).await;
    assert!(body.contains("no-uid-conflict"), "{}", body);
    assert!(body.contains("evt-1.ics"), "{}", body);

    // the impostor was not stored
    let resp = h
        .request("GET", "/alice/calendars/calendar/copy.ics", "")
        .await;
    assert_eq!(resp.status(), 404);
}

/// Scenario: calendar-query with a January time range matches only the
/// January event.
#[tokio::test]
async fn calendar_query_time_range() {
    let h = Harness::new();
    for (name, body) in [("evt-1.ics", EVT_JAN), ("evt-2.ics", EVT_FEB)] {
        let path = format!("/alice/calendars/calendar/{}", name);
        assert_eq!(h.request("PUT", &path, body).await.status(), 201);
    }

    let report = r#"<?xml version="1.0" encoding="utf-8" ?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop><D:getetag/></D:prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:time-range start="20240101T000000Z" end="20240201T000000Z"/>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#;

    let resp = h
        .request("REPORT", "/alice/calendars/calendar/", report)
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;
    assert!(body.contains("evt-1.ics"), "{}", body);
    assert!(!body.contains("evt-2.ics"), "{}", body);
}

/// Scenario: initial and incremental sync-collection.
#[tokio::test]
async fn sync_collection_delta() {
    let h = Harness::new();
    for (name, body) in [
        ("evt-1.ics", EVT_JAN),
        ("evt-2.ics", EVT_FEB),
        ("evt-3.ics", EVT_MAR),
    ] {
        let path = format!("/alice/calendars/calendar/{}", name);
        assert_eq!(h.request("PUT", &path, body).await.status(), 201);
    }

    let initial = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:sync-collection xmlns:D="DAV:">
    <D:sync-token/>
    <D:sync-level>1</D:sync-level>
    <D:prop><D:getetag/></D:prop>
</D:sync-collection>"#;

    let resp = h
        .request("REPORT", "/alice/calendars/calendar/", initial)
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;
    assert_eq!(body.matches("<D:response>").count(), 3, "{}", body);
    let token_start = body.find("carillon-sync:").expect("token in body");
    let s1: String = body[token_start..]
        .chars()
        .take_while(|c| *c != '<')
        .collect();

    // one addition, one deletion
    assert_eq!(
        h.request("PUT", "/alice/calendars/calendar/evt-4.ics", EVT_APR)
            .await
            .status(),
        201
    );
    assert_eq!(
        h.request("DELETE", "/alice/calendars/calendar/evt-2.ics", "")
            .await
            .status(),
        204
    );

    let incremental = format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<D:sync-collection xmlns:D="DAV:">
    <D:sync-token>{}</D:sync-token>
    <D:sync-level>1</D:sync-level>
    <D:prop><D:getetag/></D:prop>
</D:sync-collection>"#,
        s1
    );
    let resp = h
        .request("REPORT", "/alice/calendars/calendar/", &incremental)
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;

    assert_eq!(body.matches("<D:response>").count(), 2, "{}", body);
    assert!(body.contains("evt-4.ics"), "{}", body);
    assert!(body.contains("evt-2.ics"), "{}", body);
    assert!(body.contains("404"), "{}", body);

    let token_start = body.find("carillon-sync:").expect("token in body");
    let s2: String = body[token_start..]
        .chars()
        .take_while(|c| *c != '<')
        .collect();
    assert_ne!(s1, s2);

    // a token from another universe is refused with the precondition
    let bogus = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:sync-collection xmlns:D="DAV:">
    <D:sync-token>carillon-sync:0000000000000000000000000000000000000000000000000000000000000000</D:sync-token>
    <D:sync-level>1</D:sync-level>
    <D:prop><D:getetag/></D:prop>
</D:sync-collection>"#;
    let resp = h
        .request("REPORT", "/alice/calendars/calendar/", bogus)
        .await;
    assert_eq!(resp.status(), 403);
    let body = body_string(resp).await;
    assert!(body.contains("valid-sync-token"), "{}", body);
}

/// Scenario: autocreate=defaults provisions the principal tree.
#[tokio::test]
async fn autocreate_defaults() {
    let h = Harness::new();
    let resp = h.request("OPTIONS", "/alice/", "").await;
    assert_eq!(resp.status(), 200);
    assert!(header(&resp, "DAV").unwrap().contains("calendar-access"));

    let resp = h
        .request_with("PROPFIND", "/alice/", "", &[("Depth", "1")])
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;
    assert!(body.contains("/alice/calendars/"), "{}", body);
    assert!(body.contains("/alice/contacts/"), "{}", body);

    let resp = h
        .request_with("PROPFIND", "/alice/calendars/", "", &[("Depth", "1")])
        .await;
    let body = body_string(resp).await;
    assert!(body.contains("/alice/calendars/calendar/"), "{}", body);

    let resp = h
        .request_with("PROPFIND", "/alice/contacts/", "", &[("Depth", "1")])
        .await;
    let body = body_string(resp).await;
    assert!(body.contains("/alice/contacts/addressbook/"), "{}", body);
}

/// PROPPATCH set-then-get and remove-then-404.
#[tokio::test]
async fn proppatch_roundtrip() {
    let h = Harness::new();
    // provision
    h.request("OPTIONS", "/alice/", "").await;

    let set = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propertyupdate xmlns:D="DAV:">
    <D:set><D:prop><D:displayname>Wichtige Termine</D:displayname></D:prop></D:set>
</D:propertyupdate>"#;
    let resp = h
        .request("PROPPATCH", "/alice/calendars/calendar/", set)
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;
    assert!(body.contains("200 OK"), "{}", body);

    let resp = h
        .request_with(
            "PROPFIND",
            "/alice/calendars/calendar/",
            r#"<propfind xmlns="DAV:"><prop><displayname/></prop></propfind>"#,
            &[("Depth", "0")],
        )
        .await;
    let body = body_string(resp).await;
    assert!(body.contains("Wichtige Termine"), "{}", body);

    let remove = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propertyupdate xmlns:D="DAV:">
    <D:remove><D:prop><D:displayname/></D:prop></D:remove>
</D:propertyupdate>"#;
    let resp = h
        .request("PROPPATCH", "/alice/calendars/calendar/", remove)
        .await;
    assert_eq!(resp.status(), 207);

    // a removed property reads back as 404
    let resp = h
        .request_with(
            "PROPFIND",
            "/alice/calendars/calendar/",
            r#"<propfind xmlns="DAV:"><prop><displayname/></prop></propfind>"#,
            &[("Depth", "0")],
        )
        .await;
    let body = body_string(resp).await;
    assert!(body.contains("404"), "{}", body);
    assert!(body.contains("<D:displayname/>"), "{}", body);
}

/// Writing a property the server does not model answers 403.
#[tokio::test]
async fn proppatch_unknown_property_is_forbidden() {
    let h = Harness::new();
    h.request("OPTIONS", "/alice/", "").await;

    let set = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:example:custom">
    <D:set><D:prop><Z:mood>pensive</Z:mood></D:prop></D:set>
</D:propertyupdate>"#;
    let resp = h
        .request("PROPPATCH", "/alice/calendars/calendar/", set)
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;
    assert!(body.contains("403 Forbidden"), "{}", body);
}

/// COPY then MOVE between the two auto-created calendars' namespace.
#[tokio::test]
async fn copy_and_move() {
    let h = Harness::new();
    assert_eq!(
        h.request("PUT", "/alice/calendars/calendar/evt-1.ics", EVT_JAN)
            .await
            .status(),
        201
    );
    // a second calendar next to the default one
    assert_eq!(
        h.request("MKCALENDAR", "/alice/calendars/archive/", "")
            .await
            .status(),
        201
    );

    let resp = h
        .request_with(
            "COPY",
            "/alice/calendars/calendar/evt-1.ics",
            "",
            &[(
                "Destination",
                "/alice/calendars/archive/evt-1.ics",
            )],
        )
        .await;
    assert_eq!(resp.status(), 201);
    assert_eq!(
        h.request("GET", "/alice/calendars/archive/evt-1.ics", "")
            .await
            .status(),
        200
    );

    // move away and the source is gone
    let resp = h
        .request_with(
            "MOVE",
            "/alice/calendars/calendar/evt-1.ics",
            "",
            &[(
                "Destination",
                "/alice/calendars/calendar/renamed.ics",
            )],
        )
        .await;
    assert_eq!(resp.status(), 201);
    assert_eq!(
        h.request("GET", "/alice/calendars/calendar/evt-1.ics", "")
            .await
            .status(),
        404
    );
    assert_eq!(
        h.request("GET", "/alice/calendars/calendar/renamed.ics", "")
            .await
            .status(),
        200
    );
}

/// RFC 5995 POST to a collection allocates a fresh name.
#[tokio::test]
async fn post_add_member() {
    let h = Harness::new();
    h.request("OPTIONS", "/alice/", "").await;

    let resp = h
        .request("POST", "/alice/calendars/calendar/", EVT_JAN)
        .await;
    assert_eq!(resp.status(), 201);
    let location = header(&resp, "Location").unwrap().to_string();
    assert!(location.starts_with("/alice/calendars/calendar/"), "{}", location);

    let resp = h.request("GET", &location, "").await;
    assert_eq!(resp.status(), 200);
}

/// LOCK is advertised as unimplemented.
#[tokio::test]
async fn lock_answers_501() {
    let h = Harness::new();
    h.request("OPTIONS", "/alice/", "").await;
    let resp = h.request("LOCK", "/alice/calendars/calendar/", "").await;
    assert_eq!(resp.status(), 501);
}

/// addressbook-query matches on vCard properties.
#[tokio::test]
async fn addressbook_query() {
    let h = Harness::new();
    let card = "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:card-1\r\nFN:Ada Lovelace\r\nNICKNAME:ada\r\nEND:VCARD\r\n";
    let other = "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:card-2\r\nFN:Charles Babbage\r\nEND:VCARD\r\n";
    assert_eq!(
        h.request("PUT", "/alice/contacts/addressbook/card-1.vcf", card)
            .await
            .status(),
        201
    );
    assert_eq!(
        h.request("PUT", "/alice/contacts/addressbook/card-2.vcf", other)
            .await
            .status(),
        201
    );

    let report = r#"<?xml version="1.0" encoding="utf-8" ?>
<CR:addressbook-query xmlns:D="DAV:" xmlns:CR="urn:ietf:params:xml:ns:carddav">
    <D:prop><D:getetag/><CR:address-data/></D:prop>
    <CR:filter>
        <CR:prop-filter name="NICKNAME">
            <CR:text-match match-type="equals">ada</CR:text-match>
        </CR:prop-filter>
    </CR:filter>
</CR:addressbook-query>"#;

    let resp = h
        .request("REPORT", "/alice/contacts/addressbook/", report)
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;
    assert!(body.contains("card-1.vcf"), "{}", body);
    assert!(!body.contains("card-2.vcf"), "{}", body);
    assert!(body.contains("Ada Lovelace"), "{}", body);
}

/// free-busy-query synthesises a VFREEBUSY reply.
#[tokio::test]
async fn free_busy_query() {
    let h = Harness::new();
    assert_eq!(
        h.request("PUT", "/alice/calendars/calendar/evt-1.ics", EVT_JAN)
            .await
            .status(),
        201
    );

    let report = r#"<?xml version="1.0" encoding="utf-8" ?>
<C:free-busy-query xmlns:C="urn:ietf:params:xml:ns:caldav">
    <C:time-range start="20240101T000000Z" end="20240201T000000Z"/>
</C:free-busy-query>"#;

    let resp = h
        .request("REPORT", "/alice/calendars/calendar/", report)
        .await;
    assert_eq!(resp.status(), 200);
    assert!(header(&resp, "content-type").unwrap().starts_with("text/calendar"));
    let body = body_string(resp).await;
    assert!(body.contains("BEGIN:VFREEBUSY"), "{}", body);
    assert!(body.contains("FREEBUSY:20240115T120000Z/20240115T130000Z"), "{}", body);
}

/// calendar-multiget returns found items and tombstones the rest.
#[tokio::test]
async fn calendar_multiget() {
    let h = Harness::new();
    assert_eq!(
        h.request("PUT", "/alice/calendars/calendar/evt-1.ics", EVT_JAN)
            .await
            .status(),
        201
    );

    let report = r#"<?xml version="1.0" encoding="utf-8" ?>
<C:calendar-multiget xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop><D:getetag/><C:calendar-data/></D:prop>
    <D:href>/alice/calendars/calendar/evt-1.ics</D:href>
    <D:href>/alice/calendars/calendar/ghost.ics</D:href>
</C:calendar-multiget>"#;

    let resp = h
        .request("REPORT", "/alice/calendars/calendar/", report)
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;
    assert!(body.contains("evt-1.ics"), "{}", body);
    assert!(body.contains("SUMMARY:january"), "{}", body);
    assert!(body.contains("ghost.ics"), "{}", body);
    assert!(body.contains("404"), "{}", body);
}

/// Unknown properties come back in a 404 propstat with their name.
#[tokio::test]
async fn propfind_unknown_property() {
    let h = Harness::new();
    h.request("OPTIONS", "/alice/", "").await;

    let resp = h
        .request_with(
            "PROPFIND",
            "/alice/calendars/calendar/",
            r#"<propfind xmlns="DAV:" xmlns:Z="urn:example:custom"><prop><displayname/><Z:mood/></prop></propfind>"#,
            &[("Depth", "0")],
        )
        .await;
    assert_eq!(resp.status(), 207);
    let body = body_string(resp).await;
    assert!(body.contains("404"), "{}", body);
    assert!(body.contains("mood"), "{}", body);
    assert!(body.contains("<D:displayname>calendar</D:displayname>"), "{}", body);
}

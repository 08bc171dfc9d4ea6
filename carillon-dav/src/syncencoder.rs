use quick_xml::events::{BytesText, Event};
use quick_xml::Error as QError;

use super::synctypes::*;
use super::types as dav;
use super::xml::{IWrite, QWrite, Writer};

impl QWrite for Property {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::SyncToken(token) => token.qwrite(xml).await,
        }
    }
}

impl QWrite for PropertyRequest {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::SyncToken => {
                let empty_tag = xml.create_dav_element("sync-token");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
        }
    }
}

impl QWrite for ReportTypeName {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::SyncCollection => {
                let empty_tag = xml.create_dav_element("sync-collection");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
        }
    }
}

impl QWrite for Multistatus {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        self.sync_token.qwrite(xml).await
    }
}

impl QWrite for Violation {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::ValidSyncToken => {
                let empty_tag = xml.create_dav_element("valid-sync-token");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
            Self::NumberOfMatchesWithinLimits => {
                let empty_tag = xml.create_dav_element("number-of-matches-within-limits");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
        }
    }
}

impl<E: dav::Extension> QWrite for SyncCollection<E> {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("sync-collection");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        self.sync_token.qwrite(xml).await?;
        self.sync_level.qwrite(xml).await?;
        if let Some(limit) = &self.limit {
            limit.qwrite(xml).await?;
        }
        self.prop.qwrite(xml).await?;
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for SyncTokenRequest {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("sync-token");

        match self {
            Self::InitialSync => xml.q.write_event_async(Event::Empty(start)).await,
            Self::IncrementalSync(uri) => {
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                xml.q
                    .write_event_async(Event::Text(BytesText::new(uri.as_str())))
                    .await?;
                xml.q.write_event_async(Event::End(end)).await
            }
        }
    }
}

impl QWrite for SyncToken {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("sync-token");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        xml.q
            .write_event_async(Event::Text(BytesText::new(self.0.as_str())))
            .await?;
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for SyncLevel {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("sync-level");
        let end = start.to_end();
        let text = match self {
            Self::One => "1",
            Self::Infinite => "infinite",
        };

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        xml.q
            .write_event_async(Event::Text(BytesText::new(text)))
            .await?;
        xml.q.write_event_async(Event::End(end)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn serialize(elem: &impl QWrite) -> String {
        let mut buffer = Vec::new();
        let mut tokio_buffer = tokio::io::BufWriter::new(&mut buffer);
        let q = quick_xml::writer::Writer::new_with_indent(&mut tokio_buffer, b' ', 4);
        let ns_to_apply = vec![("xmlns:D".into(), "DAV:".into())];
        let mut writer = Writer { q, ns_to_apply };

        elem.qwrite(&mut writer).await.expect("xml serialization");
        tokio_buffer.flush().await.expect("tokio buffer flush");
        std::str::from_utf8(buffer.as_slice()).unwrap().into()
    }

    #[tokio::test]
    async fn sync_token() {
        let got = serialize(&SyncToken("carillon-sync:deadbeef".into())).await;
        let expected = r#"<D:sync-token xmlns:D="DAV:">carillon-sync:deadbeef</D:sync-token>"#;
        assert_eq!(&got, expected, "\n---GOT---\n{got}\n---EXP---\n{expected}\n");
    }

    #[tokio::test]
    async fn valid_sync_token_error() {
        let got = serialize(&Violation::ValidSyncToken).await;
        let expected = r#"<D:valid-sync-token xmlns:D="DAV:"/>"#;
        assert_eq!(&got, expected, "\n---GOT---\n{got}\n---EXP---\n{expected}\n");
    }
}

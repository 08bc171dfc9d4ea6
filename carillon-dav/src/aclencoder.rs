use quick_xml::events::Event;
use quick_xml::Error as QError;

use super::acltypes::*;
use super::xml::{IWrite, QWrite, Writer};

impl QWrite for PropertyRequest {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut atom = async |c| {
            let empty_tag = xml.create_dav_element(c);
            xml.q.write_event_async(Event::Empty(empty_tag)).await
        };

        match self {
            Self::Owner => atom("owner").await,
            Self::CurrentUserPrincipal => atom("current-user-principal").await,
            Self::PrincipalUrl => atom("principal-URL").await,
            Self::GroupMembership => atom("group-membership").await,
        }
    }
}

impl QWrite for Property {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::Owner(href) => {
                let start = xml.create_dav_element("owner");
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                href.qwrite(xml).await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::CurrentUserPrincipal(user) => {
                let start = xml.create_dav_element("current-user-principal");
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                user.qwrite(xml).await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::PrincipalUrl(href) => {
                let start = xml.create_dav_element("principal-URL");
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                href.qwrite(xml).await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::GroupMembership(hrefs) => {
                let start = xml.create_dav_element("group-membership");
                if hrefs.is_empty() {
                    return xml.q.write_event_async(Event::Empty(start)).await;
                }
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                for href in hrefs.iter() {
                    href.qwrite(xml).await?;
                }
                xml.q.write_event_async(Event::End(end)).await
            }
        }
    }
}

impl QWrite for ResourceType {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::Principal => {
                let empty_tag = xml.create_dav_element("principal");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
        }
    }
}

impl QWrite for User {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::Unauthenticated => {
                let empty_tag = xml.create_dav_element("unauthenticated");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
            Self::Authenticated(href) => href.qwrite(xml).await,
        }
    }
}

impl QWrite for PrincipalMatch {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("principal-match");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        match self {
            Self::Selph => {
                let empty_tag = xml.create_dav_element("self");
                xml.q.write_event_async(Event::Empty(empty_tag)).await?;
            }
            Self::PrincipalProperty(name) => {
                let outer = xml.create_dav_element("principal-property");
                let outer_end = outer.to_end();
                xml.q.write_event_async(Event::Start(outer.clone())).await?;
                let inner = xml.create_dav_element(name.as_str());
                xml.q.write_event_async(Event::Empty(inner)).await?;
                xml.q.write_event_async(Event::End(outer_end)).await?;
            }
        }
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for ReportTypeName {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::PrincipalMatch => {
                let empty_tag = xml.create_dav_element("principal-match");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Href;
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
    async fn current_user_principal() {
        let got = serialize(&Property::CurrentUserPrincipal(User::Authenticated(Href(
            "/alice/".into(),
        ))))
        .await;

        let expected = r#"<D:current-user-principal xmlns:D="DAV:">
    <D:href>/alice/</D:href>
</D:current-user-principal>"#;

        assert_eq!(&got, expected, "\n---GOT---\n{got}\n---EXP---\n{expected}\n");
    }
}

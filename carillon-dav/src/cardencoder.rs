use quick_xml::events::{BytesText, Event};
use quick_xml::Error as QError;

use super::cardtypes::*;
use super::types as dav;
use super::xml::{IWrite, QWrite, Writer};

// ----------------------- REPORT METHOD -------------------------------------
impl<E: dav::Extension> QWrite for ReportType<E> {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::Query(v) => v.qwrite(xml).await,
            Self::Multiget(v) => v.qwrite(xml).await,
        }
    }
}

impl QWrite for ReportTypeName {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut atom = async |c| {
            let empty_tag = xml.create_card_element(c);
            xml.q.write_event_async(Event::Empty(empty_tag)).await
        };

        match self {
            Self::Query => atom("addressbook-query").await,
            Self::Multiget => atom("addressbook-multiget").await,
        }
    }
}

impl<E: dav::Extension> QWrite for AddressbookQuery<E> {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_card_element("addressbook-query");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        if let Some(selector) = &self.selector {
            selector.qwrite(xml).await?;
        }
        self.filter.qwrite(xml).await?;
        if let Some(limit) = &self.limit {
            limit.qwrite(xml).await?;
        }
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl<E: dav::Extension> QWrite for AddressbookMultiget<E> {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_card_element("addressbook-multiget");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        if let Some(selector) = &self.selector {
            selector.qwrite(xml).await?;
        }
        for href in self.href.iter() {
            href.qwrite(xml).await?;
        }
        xml.q.write_event_async(Event::End(end)).await
    }
}

// -------------------------- DAV::prop --------------------------------------
impl QWrite for PropertyRequest {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut atom = async |c| {
            let empty_tag = xml.create_card_element(c);
            xml.q.write_event_async(Event::Empty(empty_tag)).await
        };

        match self {
            Self::AddressbookHomeSet => atom("addressbook-home-set").await,
            Self::AddressbookDescription => atom("addressbook-description").await,
            Self::SupportedAddressData => atom("supported-address-data").await,
            Self::MaxResourceSize => atom("max-resource-size").await,
            Self::AddressData(req) => req.qwrite(xml).await,
        }
    }
}

impl QWrite for Property {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::AddressbookHomeSet(href) => {
                let start = xml.create_card_element("addressbook-home-set");
                let end = start.to_end();

                xml.q.write_event_async(Event::Start(start.clone())).await?;
                href.qwrite(xml).await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::AddressbookDescription { lang, text } => {
                let mut start = xml.create_card_element("addressbook-description");
                if let Some(the_lang) = lang {
                    start.push_attribute(("xml:lang", the_lang.as_str()));
                }
                let end = start.to_end();

                xml.q.write_event_async(Event::Start(start.clone())).await?;
                xml.q
                    .write_event_async(Event::Text(BytesText::new(text)))
                    .await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::SupportedAddressData(types) => {
                let start = xml.create_card_element("supported-address-data");
                let end = start.to_end();

                xml.q.write_event_async(Event::Start(start.clone())).await?;
                for t in types.iter() {
                    t.qwrite(xml).await?;
                }
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::MaxResourceSize(sz) => {
                let start = xml.create_card_element("max-resource-size");
                let end = start.to_end();

                xml.q.write_event_async(Event::Start(start.clone())).await?;
                xml.q
                    .write_event_async(Event::Text(BytesText::new(sz.to_string().as_str())))
                    .await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::AddressData(payload) => payload.qwrite(xml).await,
        }
    }
}

impl QWrite for ResourceType {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::Addressbook => {
                let empty_tag = xml.create_card_element("addressbook");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
        }
    }
}

impl QWrite for Violation {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut atom = async |c| {
            let empty_tag = xml.create_card_element(c);
            xml.q.write_event_async(Event::Empty(empty_tag)).await
        };

        match self {
            Self::SupportedAddressData => atom("supported-address-data").await,
            Self::ValidAddressData => atom("valid-address-data").await,
            Self::NoUidConflict(href) => {
                let start = xml.create_card_element("no-uid-conflict");
                let end = start.to_end();

                xml.q.write_event_async(Event::Start(start.clone())).await?;
                href.qwrite(xml).await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::AddressbookCollectionLocationOk => {
                atom("addressbook-collection-location-ok").await
            }
            Self::MaxResourceSize => atom("max-resource-size").await,
            Self::SupportedCollation => atom("supported-collation").await,
            Self::SupportedFilter => atom("supported-filter").await,
        }
    }
}

// ---------------------------- Inner XML ------------------------------------
impl QWrite for AddressDataRequest {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut start = xml.create_card_element("address-data");
        if let Some(mime) = &self.mime {
            start.push_attribute(("content-type", mime.content_type.as_str()));
            start.push_attribute(("version", mime.version.as_str()));
        }

        if self.prop.is_empty() {
            return xml.q.write_event_async(Event::Empty(start)).await;
        }

        let end = start.to_end();
        xml.q.write_event_async(Event::Start(start.clone())).await?;
        for prop in self.prop.iter() {
            prop.qwrite(xml).await?;
        }
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for AddressDataPayload {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut start = xml.create_card_element("address-data");
        if let Some(mime) = &self.mime {
            start.push_attribute(("content-type", mime.content_type.as_str()));
            start.push_attribute(("version", mime.version.as_str()));
        }
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        xml.q
            .write_event_async(Event::Text(BytesText::new(self.payload.as_str())))
            .await?;
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for AddressDataType {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut empty = xml.create_card_element("address-data-type");
        empty.push_attribute(("content-type", self.content_type.as_str()));
        empty.push_attribute(("version", self.version.as_str()));
        xml.q.write_event_async(Event::Empty(empty)).await
    }
}

impl QWrite for CardProp {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut empty = xml.create_card_element("prop");
        empty.push_attribute(("name", self.name.as_str()));
        match self.novalue {
            None => (),
            Some(true) => empty.push_attribute(("novalue", "yes")),
            Some(false) => empty.push_attribute(("novalue", "no")),
        }
        xml.q.write_event_async(Event::Empty(empty)).await
    }
}

impl QWrite for Filter {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut start = xml.create_card_element("filter");
        if let Some(test) = &self.test {
            start.push_attribute(("test", test.as_str()));
        }
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        for pf in self.prop_filters.iter() {
            pf.qwrite(xml).await?;
        }
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for PropFilter {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut start = xml.create_card_element("prop-filter");
        start.push_attribute(("name", self.name.as_str()));
        if let Some(test) = &self.test {
            start.push_attribute(("test", test.as_str()));
        }

        match &self.additional_rules {
            None => xml.q.write_event_async(Event::Empty(start)).await,
            Some(rules) => {
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                rules.qwrite(xml).await?;
                xml.q.write_event_async(Event::End(end)).await
            }
        }
    }
}

impl QWrite for PropFilterRules {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::IsNotDefined => {
                let empty_tag = xml.create_card_element("is-not-defined");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
            Self::Match(prop_match) => prop_match.qwrite(xml).await,
        }
    }
}

impl QWrite for PropFilterMatch {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        for tm in self.text_match.iter() {
            tm.qwrite(xml).await?;
        }
        for param_item in self.param_filter.iter() {
            param_item.qwrite(xml).await?;
        }
        Ok(())
    }
}

impl QWrite for ParamFilter {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut start = xml.create_card_element("param-filter");
        start.push_attribute(("name", self.name.as_str()));

        match &self.additional_rules {
            None => xml.q.write_event_async(Event::Empty(start)).await,
            Some(rules) => {
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                rules.qwrite(xml).await?;
                xml.q.write_event_async(Event::End(end)).await
            }
        }
    }
}

impl QWrite for ParamFilterMatch {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::IsNotDefined => {
                let empty_tag = xml.create_card_element("is-not-defined");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
            Self::Match(tm) => tm.qwrite(xml).await,
        }
    }
}

impl QWrite for TextMatch {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut start = xml.create_card_element("text-match");
        if let Some(collation) = &self.collation {
            start.push_attribute(("collation", collation.as_str()));
        }
        match self.negate_condition {
            None => (),
            Some(true) => start.push_attribute(("negate-condition", "yes")),
            Some(false) => start.push_attribute(("negate-condition", "no")),
        }
        if let Some(match_type) = &self.match_type {
            start.push_attribute(("match-type", match_type.as_str()));
        }
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        xml.q
            .write_event_async(Event::Text(BytesText::new(self.text.as_str())))
            .await?;
        xml.q.write_event_async(Event::End(end)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realization::All;
    use tokio::io::AsyncWriteExt;

    async fn serialize(elem: &impl QWrite) -> String {
        let mut buffer = Vec::new();
        let mut tokio_buffer = tokio::io::BufWriter::new(&mut buffer);
        let q = quick_xml::writer::Writer::new_with_indent(&mut tokio_buffer, b' ', 4);
        let ns_to_apply = vec![
            ("xmlns:D".into(), "DAV:".into()),
            ("xmlns:CR".into(), "urn:ietf:params:xml:ns:carddav".into()),
        ];
        let mut writer = Writer { q, ns_to_apply };

        elem.qwrite(&mut writer).await.expect("xml serialization");
        tokio_buffer.flush().await.expect("tokio buffer flush");
        let got = std::str::from_utf8(buffer.as_slice()).unwrap();

        return got.into();
    }

    #[tokio::test]
    async fn addressbook_query_roundtripish() {
        let query = AddressbookQuery::<All> {
            selector: None,
            filter: Filter {
                test: None,
                prop_filters: vec![PropFilter {
                    name: "FN".into(),
                    test: None,
                    additional_rules: Some(PropFilterRules::Match(PropFilterMatch {
                        text_match: vec![TextMatch {
                            collation: None,
                            negate_condition: None,
                            match_type: None,
                            text: "daboville".into(),
                        }],
                        param_filter: vec![],
                    })),
                }],
            },
            limit: None,
        };
        let got = serialize(&query).await;

        let expected = r#"<CR:addressbook-query xmlns:D="DAV:" xmlns:CR="urn:ietf:params:xml:ns:carddav">
    <CR:filter>
        <CR:prop-filter name="FN">
            <CR:text-match>daboville</CR:text-match>
        </CR:prop-filter>
    </CR:filter>
</CR:addressbook-query>"#;

        assert_eq!(&got, expected, "\n---GOT---\n{got}\n---EXP---\n{expected}\n");
    }

    #[tokio::test]
    async fn addressbook_resourcetype() {
        let got = serialize(&ResourceType::Addressbook).await;
        let expected =
            r#"<CR:addressbook xmlns:D="DAV:" xmlns:CR="urn:ietf:params:xml:ns:carddav"/>"#;
        assert_eq!(&got, expected, "\n---GOT---\n{got}\n---EXP---\n{expected}\n");
    }
}

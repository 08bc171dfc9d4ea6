use quick_xml::events::Event;

use super::caltypes::{Collation, MatchType};
use super::cardtypes::*;
use super::error::ParsingError;
use super::types as dav;
use super::xml::{IRead, QRead, Reader, CARD_URN};

// ---- ROOT ELEMENTS ---
impl<E: dav::Extension> QRead<ReportType<E>> for ReportType<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        match AddressbookQuery::<E>::qread(xml).await {
            Err(ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Self::Query),
        }

        AddressbookMultiget::<E>::qread(xml).await.map(Self::Multiget)
    }
}

impl QRead<ReportTypeName> for ReportTypeName {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml
            .maybe_open(CARD_URN, "addressbook-query")
            .await?
            .is_some()
        {
            xml.close().await?;
            return Ok(Self::Query);
        }
        if xml
            .maybe_open(CARD_URN, "addressbook-multiget")
            .await?
            .is_some()
        {
            xml.close().await?;
            return Ok(Self::Multiget);
        }
        Err(ParsingError::Recoverable)
    }
}

impl<E: dav::Extension> QRead<AddressbookQuery<E>> for AddressbookQuery<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "addressbook-query").await?;
        let (mut selector, mut filter, mut limit) = (None, None, None);
        loop {
            let mut dirty = false;
            xml.maybe_read(&mut selector, &mut dirty).await?;
            xml.maybe_read(&mut filter, &mut dirty).await?;
            xml.maybe_read(&mut limit, &mut dirty).await?;

            if !dirty {
                match xml.peek() {
                    Event::End(_) => break,
                    _ => xml.skip().await?,
                };
            }
        }
        xml.close().await?;

        match filter {
            Some(filter) => Ok(AddressbookQuery {
                selector,
                filter,
                limit,
            }),
            _ => Err(ParsingError::MissingChild),
        }
    }
}

impl<E: dav::Extension> QRead<AddressbookMultiget<E>> for AddressbookMultiget<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "addressbook-multiget").await?;
        let mut selector = None;
        let mut href = Vec::new();

        loop {
            let mut dirty = false;
            xml.maybe_read(&mut selector, &mut dirty).await?;
            xml.maybe_push(&mut href, &mut dirty).await?;

            if !dirty {
                match xml.peek() {
                    Event::End(_) => break,
                    _ => xml.skip().await?,
                };
            }
        }

        xml.close().await?;
        Ok(AddressbookMultiget { selector, href })
    }
}

// ---- EXTENSIONS ---
impl QRead<Violation> for Violation {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml
            .maybe_open(CARD_URN, "supported-address-data")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Self::SupportedAddressData)
        } else if xml
            .maybe_open(CARD_URN, "valid-address-data")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Self::ValidAddressData)
        } else if xml.maybe_open(CARD_URN, "no-uid-conflict").await?.is_some() {
            let href = xml.find().await?;
            xml.close().await?;
            Ok(Self::NoUidConflict(href))
        } else if xml
            .maybe_open(CARD_URN, "addressbook-collection-location-ok")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Self::AddressbookCollectionLocationOk)
        } else if xml
            .maybe_open(CARD_URN, "max-resource-size")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Self::MaxResourceSize)
        } else if xml
            .maybe_open(CARD_URN, "supported-collation")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Self::SupportedCollation)
        } else if xml
            .maybe_open(CARD_URN, "supported-filter")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Self::SupportedFilter)
        } else {
            Err(ParsingError::Recoverable)
        }
    }
}

impl QRead<Property> for Property {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml
            .maybe_open_start(CARD_URN, "addressbook-home-set")
            .await?
            .is_some()
        {
            let href = xml.find().await?;
            xml.close().await?;
            return Ok(Property::AddressbookHomeSet(href));
        }
        if xml
            .maybe_open_start(CARD_URN, "addressbook-description")
            .await?
            .is_some()
        {
            let lang = xml.prev_attr("xml:lang");
            let text = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Property::AddressbookDescription { lang, text });
        }
        if xml
            .maybe_open_start(CARD_URN, "supported-address-data")
            .await?
            .is_some()
        {
            let types = xml.collect().await?;
            xml.close().await?;
            return Ok(Property::SupportedAddressData(types));
        }
        if xml
            .maybe_open_start(CARD_URN, "max-resource-size")
            .await?
            .is_some()
        {
            let sz = xml.tag_string().await?.parse::<u64>()?;
            xml.close().await?;
            return Ok(Property::MaxResourceSize(sz));
        }

        let mut dirty = false;
        let mut m_adr = None;
        xml.maybe_read(&mut m_adr, &mut dirty).await?;
        m_adr
            .ok_or(ParsingError::Recoverable)
            .map(Property::AddressData)
    }
}

impl QRead<PropertyRequest> for PropertyRequest {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        let maybe = if xml
            .maybe_open(CARD_URN, "addressbook-home-set")
            .await?
            .is_some()
        {
            Some(Self::AddressbookHomeSet)
        } else if xml
            .maybe_open(CARD_URN, "addressbook-description")
            .await?
            .is_some()
        {
            Some(Self::AddressbookDescription)
        } else if xml
            .maybe_open(CARD_URN, "supported-address-data")
            .await?
            .is_some()
        {
            Some(Self::SupportedAddressData)
        } else if xml
            .maybe_open(CARD_URN, "max-resource-size")
            .await?
            .is_some()
        {
            Some(Self::MaxResourceSize)
        } else {
            None
        };

        if let Some(pr) = maybe {
            xml.close().await?;
            return Ok(pr);
        }

        let mut dirty = false;
        let mut m_adr = None;
        xml.maybe_read(&mut m_adr, &mut dirty).await?;
        m_adr
            .ok_or(ParsingError::Recoverable)
            .map(Self::AddressData)
    }
}

impl QRead<ResourceType> for ResourceType {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(CARD_URN, "addressbook").await?.is_some() {
            xml.close().await?;
            return Ok(Self::Addressbook);
        }
        Err(ParsingError::Recoverable)
    }
}

// ---- INNER XML ----
impl QRead<AddressDataRequest> for AddressDataRequest {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "address-data").await?;
        let mime = AddressDataType::from_attrs(xml);
        let prop = xml.collect().await?;
        xml.close().await?;
        Ok(Self { mime, prop })
    }
}

impl QRead<AddressDataPayload> for AddressDataPayload {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "address-data").await?;
        let mime = AddressDataType::from_attrs(xml);
        let payload = xml.tag_string().await?;
        xml.close().await?;
        Ok(Self { mime, payload })
    }
}

impl AddressDataType {
    fn from_attrs(xml: &mut Reader<impl IRead>) -> Option<Self> {
        let ct = xml.prev_attr("content-type");
        let vs = xml.prev_attr("version");
        match (ct, vs) {
            (Some(content_type), Some(version)) => Some(Self {
                content_type,
                version,
            }),
            _ => None,
        }
    }
}

impl QRead<AddressDataType> for AddressDataType {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "address-data-type").await?;
        let item = Self::from_attrs(xml).ok_or(ParsingError::MissingAttribute)?;
        xml.close().await?;
        Ok(item)
    }
}

impl QRead<CardProp> for CardProp {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "prop").await?;
        let name = xml
            .prev_attr("name")
            .ok_or(ParsingError::MissingAttribute)?;
        let novalue = match xml.prev_attr("novalue").as_deref() {
            Some("yes") => Some(true),
            Some("no") => Some(false),
            _ => None,
        };
        xml.close().await?;
        Ok(Self { name, novalue })
    }
}

impl QRead<Filter> for Filter {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "filter").await?;
        let test = xml
            .prev_attr("test")
            .and_then(|t| FilterTest::new(t.as_str()));
        let prop_filters = xml.collect().await?;
        xml.close().await?;
        Ok(Filter { test, prop_filters })
    }
}

impl QRead<PropFilter> for PropFilter {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "prop-filter").await?;
        let name = xml
            .prev_attr("name")
            .ok_or(ParsingError::MissingAttribute)?;
        let test = xml
            .prev_attr("test")
            .and_then(|t| FilterTest::new(t.as_str()));
        let additional_rules = xml.maybe_find().await?;
        xml.close().await?;
        Ok(Self {
            name,
            test,
            additional_rules,
        })
    }
}

impl QRead<PropFilterRules> for PropFilterRules {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        let mut text_match = Vec::new();
        let mut param_filter = Vec::new();

        loop {
            let mut dirty = false;

            if xml.maybe_open(CARD_URN, "is-not-defined").await?.is_some() {
                xml.close().await?;
                return Ok(Self::IsNotDefined);
            }

            xml.maybe_push(&mut text_match, &mut dirty).await?;
            xml.maybe_push(&mut param_filter, &mut dirty).await?;

            if !dirty {
                match xml.peek() {
                    Event::End(_) => break,
                    _ => xml.skip().await?,
                };
            }
        }

        match (&text_match[..], &param_filter[..]) {
            ([], []) => Err(ParsingError::Recoverable),
            _ => Ok(Self::Match(PropFilterMatch {
                text_match,
                param_filter,
            })),
        }
    }
}

impl QRead<PropFilterMatch> for PropFilterMatch {
    async fn qread(_xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        unreachable!();
    }
}

impl QRead<ParamFilter> for ParamFilter {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "param-filter").await?;
        let name = xml
            .prev_attr("name")
            .ok_or(ParsingError::MissingAttribute)?;
        let additional_rules = xml.maybe_find().await?;
        xml.close().await?;
        Ok(Self {
            name,
            additional_rules,
        })
    }
}

impl QRead<ParamFilterMatch> for ParamFilterMatch {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(CARD_URN, "is-not-defined").await?.is_some() {
            xml.close().await?;
            return Ok(Self::IsNotDefined);
        }
        TextMatch::qread(xml).await.map(Self::Match)
    }
}

impl QRead<TextMatch> for TextMatch {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(CARD_URN, "text-match").await?;
        let collation = xml.prev_attr("collation").map(Collation::new);
        let negate_condition = match xml.prev_attr("negate-condition").as_deref() {
            Some("yes") => Some(true),
            Some("no") => Some(false),
            _ => None,
        };
        let match_type = xml
            .prev_attr("match-type")
            .and_then(|mt| MatchType::new(mt.as_str()));
        let text = xml.tag_string().await?;
        xml.close().await?;
        Ok(Self {
            collation,
            negate_condition,
            match_type,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realization::All;
    use quick_xml::reader::NsReader;

    async fn deserialize<T: crate::xml::Node<T>>(src: &str) -> T {
        let mut rdr = Reader::new(NsReader::from_reader(src.as_bytes()))
            .await
            .unwrap();
        rdr.find().await.unwrap()
    }

    #[tokio::test]
    async fn rfc_addressbook_query() {
        let src = r#"<?xml version="1.0" encoding="utf-8" ?>
<C:addressbook-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav">
    <D:prop>
        <D:getetag/>
        <C:address-data/>
    </D:prop>
    <C:filter>
        <C:prop-filter name="NICKNAME">
            <C:text-match collation="i;unicode-casemap" match-type="equals">me</C:text-match>
        </C:prop-filter>
    </C:filter>
</C:addressbook-query>"#;

        let got = deserialize::<AddressbookQuery<All>>(src).await;
        assert_eq!(got.filter.test, None);
        assert_eq!(got.filter.prop_filters.len(), 1);
        assert_eq!(got.filter.prop_filters[0].name, "NICKNAME");
        assert_eq!(
            got.filter.prop_filters[0].additional_rules,
            Some(PropFilterRules::Match(PropFilterMatch {
                text_match: vec![TextMatch {
                    collation: Some(Collation::Unknown("i;unicode-casemap".into())),
                    negate_condition: None,
                    match_type: Some(MatchType::Equals),
                    text: "me".into(),
                }],
                param_filter: vec![],
            }))
        );
    }

    #[tokio::test]
    async fn rfc_addressbook_multiget() {
        let src = r#"<?xml version="1.0" encoding="utf-8" ?>
<C:addressbook-multiget xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav">
    <D:prop>
        <D:getetag/>
        <C:address-data/>
    </D:prop>
    <D:href>/home/bernard/addressbook/vcf102.vcf</D:href>
    <D:href>/home/bernard/addressbook/vcf1.vcf</D:href>
</C:addressbook-multiget>"#;

        let got = deserialize::<AddressbookMultiget<All>>(src).await;
        assert_eq!(
            got.href,
            vec![
                crate::types::Href("/home/bernard/addressbook/vcf102.vcf".into()),
                crate::types::Href("/home/bernard/addressbook/vcf1.vcf".into()),
            ]
        );
    }

    #[tokio::test]
    async fn filter_allof_is_not_defined() {
        let src = r#"<?xml version="1.0" encoding="utf-8" ?>
<C:filter xmlns:C="urn:ietf:params:xml:ns:carddav" test="allof">
    <C:prop-filter name="ORG">
        <C:is-not-defined/>
    </C:prop-filter>
</C:filter>"#;

        let got = deserialize::<Filter>(src).await;
        assert_eq!(got.test, Some(FilterTest::AllOf));
        assert_eq!(
            got.prop_filters[0].additional_rules,
            Some(PropFilterRules::IsNotDefined)
        );
    }
}

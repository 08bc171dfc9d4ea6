//! De-facto namespaces every mainstream client expects: the
//! calendarserver.org ctag and the Apple iCal color/order properties.
//! They predate the RFCs and have no formal definition, so types and
//! codecs live together in this single module.

use quick_xml::events::{BytesText, Event};
use quick_xml::Error as QError;

use super::error::ParsingError;
use super::xml::{IRead, IWrite, QRead, QWrite, Reader, Writer, APPLE_URN, CS_URN};

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyRequest {
    GetCtag,
    CalendarColor,
    CalendarOrder,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Property {
    /// CS:getctag, an opaque token that changes whenever the collection
    /// content changes. Same contract as DAV:sync-token, kept for clients
    /// that predate RFC 6578.
    GetCtag(String),

    /// A:calendar-color, an #RRGGBBAA string chosen by the client
    CalendarColor(String),

    /// A:calendar-order, the position of the calendar in the client list
    CalendarOrder(u64),
}

impl QRead<PropertyRequest> for PropertyRequest {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(CS_URN, "getctag").await?.is_some() {
            xml.close().await?;
            return Ok(Self::GetCtag);
        }
        if xml.maybe_open(APPLE_URN, "calendar-color").await?.is_some() {
            xml.close().await?;
            return Ok(Self::CalendarColor);
        }
        if xml.maybe_open(APPLE_URN, "calendar-order").await?.is_some() {
            xml.close().await?;
            return Ok(Self::CalendarOrder);
        }
        Err(ParsingError::Recoverable)
    }
}

impl QRead<Property> for Property {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open_start(CS_URN, "getctag").await?.is_some() {
            let tag = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Self::GetCtag(tag));
        }
        if xml
            .maybe_open_start(APPLE_URN, "calendar-color")
            .await?
            .is_some()
        {
            let color = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Self::CalendarColor(color));
        }
        if xml
            .maybe_open_start(APPLE_URN, "calendar-order")
            .await?
            .is_some()
        {
            let order = xml.tag_string().await?.trim().parse::<u64>()?;
            xml.close().await?;
            return Ok(Self::CalendarOrder(order));
        }
        Err(ParsingError::Recoverable)
    }
}

impl QWrite for PropertyRequest {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::GetCtag => {
                let empty_tag = xml.create_cs_element("getctag");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
            Self::CalendarColor => {
                let empty_tag = xml.create_apple_element("calendar-color");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
            Self::CalendarOrder => {
                let empty_tag = xml.create_apple_element("calendar-order");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
        }
    }
}

impl QWrite for Property {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::GetCtag(tag) => {
                let start = xml.create_cs_element("getctag");
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                xml.q
                    .write_event_async(Event::Text(BytesText::new(tag.as_str())))
                    .await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::CalendarColor(color) => {
                let start = xml.create_apple_element("calendar-color");
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                xml.q
                    .write_event_async(Event::Text(BytesText::new(color.as_str())))
                    .await?;
                xml.q.write_event_async(Event::End(end)).await
            }
            Self::CalendarOrder(order) => {
                let start = xml.create_apple_element("calendar-order");
                let end = start.to_end();
                xml.q.write_event_async(Event::Start(start.clone())).await?;
                xml.q
                    .write_event_async(Event::Text(BytesText::new(
                        order.to_string().as_str(),
                    )))
                    .await?;
                xml.q.write_event_async(Event::End(end)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn getctag_roundtrip() {
        let prop = Property::GetCtag("carillon-ctag:0011aabb".into());

        let mut buffer = Vec::new();
        let mut tokio_buffer = tokio::io::BufWriter::new(&mut buffer);
        let q = quick_xml::writer::Writer::new(&mut tokio_buffer);
        let ns_to_apply = vec![(
            "xmlns:CS".to_string(),
            "http://calendarserver.org/ns/".to_string(),
        )];
        let mut writer = Writer { q, ns_to_apply };
        prop.qwrite(&mut writer).await.unwrap();
        tokio_buffer.flush().await.unwrap();

        let src = String::from_utf8(buffer).unwrap();
        let mut rdr = Reader::new(quick_xml::NsReader::from_reader(src.as_bytes()))
            .await
            .unwrap();
        let got = rdr.find::<Property>().await.unwrap();
        assert_eq!(got, prop);
    }
}

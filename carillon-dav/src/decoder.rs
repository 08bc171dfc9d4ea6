use chrono::DateTime;
use quick_xml::events::Event;

use super::error::ParsingError;
use super::types::*;
use super::xml::{IRead, QRead, Reader, DAV_URN};

// ---- ROOT ----

/// Propfind request
impl<E: Extension> QRead<PropFind<E>> for PropFind<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "propfind").await?;
        let propfind: PropFind<E> = loop {
            // allprop
            if let Some(_) = xml.maybe_open(DAV_URN, "allprop").await? {
                xml.close().await?;
                let includ = xml.maybe_find::<Include<E>>().await?;
                break PropFind::AllProp(includ);
            }

            // propname
            if let Some(_) = xml.maybe_open(DAV_URN, "propname").await? {
                xml.close().await?;
                break PropFind::PropName;
            }

            // prop
            let (mut maybe_prop, mut dirty) = (None, false);
            xml.maybe_read::<PropName<E>>(&mut maybe_prop, &mut dirty)
                .await?;
            if let Some(prop) = maybe_prop {
                break PropFind::Prop(prop);
            }

            // not found, skipping
            xml.skip().await?;
        };
        xml.close().await?;

        Ok(propfind)
    }
}

/// PROPPATCH request
impl<E: Extension> QRead<PropertyUpdate<E>> for PropertyUpdate<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "propertyupdate").await?;
        let collected_items = xml.collect::<PropertyUpdateItem<E>>().await?;
        xml.close().await?;
        Ok(PropertyUpdate(collected_items))
    }
}

/// Extended MKCOL request (RFC 5689)
impl<E: Extension> QRead<Mkcol<E>> for Mkcol<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "mkcol").await?;
        let set = xml.collect::<Set<E>>().await?;
        xml.close().await?;
        Ok(Mkcol(set))
    }
}

impl<E: Extension> QRead<MkcolResponse<E>> for MkcolResponse<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "mkcol-response").await?;
        let propstats = xml.collect::<PropStat<E>>().await?;
        xml.close().await?;
        Ok(MkcolResponse(propstats))
    }
}

/// Generic response
impl<E: Extension> QRead<Multistatus<E>> for Multistatus<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "multistatus").await?;
        let mut responses = Vec::new();
        let mut responsedescription = None;
        let mut extension = None;

        loop {
            let mut dirty = false;
            xml.maybe_push(&mut responses, &mut dirty).await?;
            xml.maybe_read(&mut responsedescription, &mut dirty).await?;
            xml.maybe_read(&mut extension, &mut dirty).await?;
            if !dirty {
                match xml.peek() {
                    Event::End(_) => break,
                    _ => xml.skip().await?,
                };
            }
        }

        xml.close().await?;
        Ok(Multistatus {
            responses,
            responsedescription,
            extension,
        })
    }
}

impl<E: Extension> QRead<PropValue<E>> for PropValue<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "prop").await?;
        let acc = xml.collect::<Property<E>>().await?;
        xml.close().await?;
        Ok(PropValue(acc))
    }
}

/// Error response
impl<E: Extension> QRead<Error<E>> for Error<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "error").await?;
        let violations = xml.collect::<Violation<E>>().await?;
        xml.close().await?;
        Ok(Error(violations))
    }
}

// ---- INNER XML
impl<E: Extension> QRead<Response<E>> for Response<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "response").await?;
        let (mut status, mut error, mut responsedescription, mut location) =
            (None, None, None, None);
        let mut href = Vec::new();
        let mut propstat = Vec::new();

        loop {
            let mut dirty = false;
            xml.maybe_read::<Status>(&mut status, &mut dirty).await?;
            xml.maybe_push::<Href>(&mut href, &mut dirty).await?;
            xml.maybe_push::<PropStat<E>>(&mut propstat, &mut dirty)
                .await?;
            xml.maybe_read::<Error<E>>(&mut error, &mut dirty).await?;
            xml.maybe_read::<ResponseDescription>(&mut responsedescription, &mut dirty)
                .await?;
            xml.maybe_read::<Location>(&mut location, &mut dirty)
                .await?;

            if !dirty {
                match xml.peek() {
                    Event::End(_) => break,
                    _ => xml.skip().await?,
                };
            }
        }

        xml.close().await?;
        match (status, &propstat[..], &href[..]) {
            (Some(status), &[], &[_, ..]) => Ok(Response {
                status_or_propstat: StatusOrPropstat::Status(href, status),
                error,
                responsedescription,
                location,
            }),
            (None, &[_, ..], &[_, ..]) => Ok(Response {
                status_or_propstat: StatusOrPropstat::PropStat(
                    href.into_iter().next().unwrap(),
                    propstat,
                ),
                error,
                responsedescription,
                location,
            }),
            (Some(_), &[_, ..], _) => Err(ParsingError::InvalidValue),
            _ => Err(ParsingError::MissingChild),
        }
    }
}

impl<E: Extension> QRead<PropStat<E>> for PropStat<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "propstat").await?;

        let (mut m_any_prop, mut m_status, mut error, mut responsedescription) =
            (None, None, None, None);

        loop {
            let mut dirty = false;
            xml.maybe_read::<AnyProp<E>>(&mut m_any_prop, &mut dirty)
                .await?;
            xml.maybe_read::<Status>(&mut m_status, &mut dirty).await?;
            xml.maybe_read::<Error<E>>(&mut error, &mut dirty).await?;
            xml.maybe_read::<ResponseDescription>(&mut responsedescription, &mut dirty)
                .await?;

            if !dirty {
                match xml.peek() {
                    Event::End(_) => break,
                    _ => xml.skip().await?,
                };
            }
        }

        xml.close().await?;
        match (m_any_prop, m_status) {
            (Some(prop), Some(status)) => Ok(PropStat {
                prop,
                status,
                error,
                responsedescription,
            }),
            _ => Err(ParsingError::MissingChild),
        }
    }
}

impl QRead<Status> for Status {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "status").await?;
        let fullcode = xml.tag_string().await?;
        let txtcode = fullcode
            .splitn(3, ' ')
            .nth(1)
            .ok_or(ParsingError::InvalidValue)?;
        let code = http::status::StatusCode::from_bytes(txtcode.as_bytes())
            .or(Err(ParsingError::InvalidValue))?;
        xml.close().await?;
        Ok(Status(code))
    }
}

impl QRead<ResponseDescription> for ResponseDescription {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "responsedescription").await?;
        let cnt = xml.tag_string().await?;
        xml.close().await?;
        Ok(ResponseDescription(cnt))
    }
}

impl QRead<Location> for Location {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "location").await?;
        let href = xml.find::<Href>().await?;
        xml.close().await?;
        Ok(Location(href))
    }
}

impl<E: Extension> QRead<PropertyUpdateItem<E>> for PropertyUpdateItem<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        match Remove::qread(xml).await {
            Err(ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(PropertyUpdateItem::Remove),
        }
        Set::qread(xml).await.map(PropertyUpdateItem::Set)
    }
}

impl<E: Extension> QRead<Remove<E>> for Remove<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "remove").await?;
        let propname = xml.find::<PropName<E>>().await?;
        xml.close().await?;
        Ok(Remove(propname))
    }
}

impl<E: Extension> QRead<Set<E>> for Set<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "set").await?;
        let propvalue = xml.find::<PropValue<E>>().await?;
        xml.close().await?;
        Ok(Set(propvalue))
    }
}

impl<E: Extension> QRead<Violation<E>> for Violation<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml
            .maybe_open(DAV_URN, "no-external-entities")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Violation::NoExternalEntities)
        } else if xml
            .maybe_open(DAV_URN, "propfind-finite-depth")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Violation::PropfindFiniteDepth)
        } else if xml
            .maybe_open(DAV_URN, "cannot-modify-protected-property")
            .await?
            .is_some()
        {
            xml.close().await?;
            Ok(Violation::CannotModifyProtectedProperty)
        } else {
            E::Error::qread(xml).await.map(Violation::Extension)
        }
    }
}

impl<E: Extension> QRead<Include<E>> for Include<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "include").await?;
        let acc = xml.collect::<PropertyRequest<E>>().await?;
        xml.close().await?;
        Ok(Include(acc))
    }
}

impl<E: Extension> QRead<PropName<E>> for PropName<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "prop").await?;
        let acc = xml.collect::<PropertyRequest<E>>().await?;
        xml.close().await?;
        Ok(PropName(acc))
    }
}

impl<E: Extension> QRead<AnyProp<E>> for AnyProp<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "prop").await?;
        let acc = xml.collect::<AnyProperty<E>>().await?;
        xml.close().await?;
        Ok(AnyProp(acc))
    }
}

impl<E: Extension> QRead<AnyProperty<E>> for AnyProperty<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        match Property::qread(xml).await {
            Err(ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Self::Value),
        }
        PropertyRequest::qread(xml).await.map(Self::Request)
    }
}

impl<E: Extension> QRead<PropertyRequest<E>> for PropertyRequest<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        let maybe = if xml.maybe_open(DAV_URN, "creationdate").await?.is_some() {
            Some(PropertyRequest::CreationDate)
        } else if xml.maybe_open(DAV_URN, "displayname").await?.is_some() {
            Some(PropertyRequest::DisplayName)
        } else if xml
            .maybe_open(DAV_URN, "getcontentlanguage")
            .await?
            .is_some()
        {
            Some(PropertyRequest::GetContentLanguage)
        } else if xml.maybe_open(DAV_URN, "getcontentlength").await?.is_some() {
            Some(PropertyRequest::GetContentLength)
        } else if xml.maybe_open(DAV_URN, "getcontenttype").await?.is_some() {
            Some(PropertyRequest::GetContentType)
        } else if xml.maybe_open(DAV_URN, "getetag").await?.is_some() {
            Some(PropertyRequest::GetEtag)
        } else if xml.maybe_open(DAV_URN, "getlastmodified").await?.is_some() {
            Some(PropertyRequest::GetLastModified)
        } else if xml.maybe_open(DAV_URN, "lockdiscovery").await?.is_some() {
            Some(PropertyRequest::LockDiscovery)
        } else if xml.maybe_open(DAV_URN, "resourcetype").await?.is_some() {
            Some(PropertyRequest::ResourceType)
        } else if xml.maybe_open(DAV_URN, "supportedlock").await?.is_some() {
            Some(PropertyRequest::SupportedLock)
        } else {
            None
        };

        match maybe {
            Some(pr) => {
                xml.close().await?;
                Ok(pr)
            }
            None => E::PropertyRequest::qread(xml)
                .await
                .map(PropertyRequest::Extension),
        }
    }
}

impl<E: Extension> QRead<Property<E>> for Property<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        // Core WebDAV properties
        if xml
            .maybe_open_start(DAV_URN, "creationdate")
            .await?
            .is_some()
        {
            let datestr = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Property::CreationDate(DateTime::parse_from_rfc3339(
                datestr.as_str(),
            )?));
        } else if xml
            .maybe_open_start(DAV_URN, "displayname")
            .await?
            .is_some()
        {
            let name = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Property::DisplayName(name));
        } else if xml
            .maybe_open_start(DAV_URN, "getcontentlanguage")
            .await?
            .is_some()
        {
            let lang = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Property::GetContentLanguage(lang));
        } else if xml
            .maybe_open_start(DAV_URN, "getcontentlength")
            .await?
            .is_some()
        {
            let cl = xml.tag_string().await?.parse::<u64>()?;
            xml.close().await?;
            return Ok(Property::GetContentLength(cl));
        } else if xml
            .maybe_open_start(DAV_URN, "getcontenttype")
            .await?
            .is_some()
        {
            let ct = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Property::GetContentType(ct));
        } else if xml.maybe_open_start(DAV_URN, "getetag").await?.is_some() {
            let etag = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Property::GetEtag(etag));
        } else if xml
            .maybe_open_start(DAV_URN, "getlastmodified")
            .await?
            .is_some()
        {
            let datestr = xml.tag_string().await?;
            xml.close().await?;
            return Ok(Property::GetLastModified(DateTime::parse_from_rfc2822(
                datestr.as_str(),
            )?));
        } else if xml
            .maybe_open_start(DAV_URN, "lockdiscovery")
            .await?
            .is_some()
        {
            xml.close().await?;
            return Ok(Property::LockDiscovery);
        } else if xml
            .maybe_open_start(DAV_URN, "resourcetype")
            .await?
            .is_some()
        {
            let acc = xml.collect::<ResourceType<E>>().await?;
            xml.close().await?;
            return Ok(Property::ResourceType(acc));
        } else if xml
            .maybe_open_start(DAV_URN, "supportedlock")
            .await?
            .is_some()
        {
            xml.close().await?;
            return Ok(Property::SupportedLock);
        }

        // Option 2: an extension property, delegating
        E::Property::qread(xml).await.map(Property::Extension)
    }
}

impl QRead<Depth> for Depth {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "depth").await?;
        let depth_str = xml.tag_string().await?;
        xml.close().await?;
        match depth_str.as_str() {
            "0" => Ok(Depth::Zero),
            "1" => Ok(Depth::One),
            "infinity" => Ok(Depth::Infinity),
            _ => Err(ParsingError::WrongToken),
        }
    }
}

impl<E: Extension> QRead<ResourceType<E>> for ResourceType<E> {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(DAV_URN, "collection").await?.is_some() {
            xml.close().await?;
            return Ok(ResourceType::Collection);
        }

        E::ResourceType::qread(xml)
            .await
            .map(ResourceType::Extension)
    }
}

impl QRead<Href> for Href {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "href").await?;
        let url = xml.tag_string().await?;
        xml.close().await?;
        Ok(Href(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realization::Core;
    use quick_xml::reader::NsReader;

    async fn deserialize<T: crate::xml::Node<T>>(src: &str) -> T {
        let mut rdr = Reader::new(NsReader::from_reader(src.as_bytes()))
            .await
            .unwrap();
        rdr.find().await.unwrap()
    }

    #[tokio::test]
    async fn basic_propfind_propname() {
        let src = r#"<?xml version="1.0" encoding="utf-8" ?>
<rando/>
<garbage><old/></garbage>
<D:propfind xmlns:D="DAV:">
    <D:propname/>
</D:propfind>
"#;

        let got = deserialize::<PropFind<Core>>(src).await;
        assert_eq!(got, PropFind::<Core>::PropName);
    }

    #[tokio::test]
    async fn basic_propfind_prop() {
        let src = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:displayname/>
        <D:getcontentlength/>
        <D:getcontenttype/>
        <D:getetag/>
        <D:getlastmodified/>
        <D:resourcetype/>
        <D:supportedlock/>
    </D:prop>
</D:propfind>
"#;

        let got = deserialize::<PropFind<Core>>(src).await;
        assert_eq!(
            got,
            PropFind::Prop(PropName(vec![
                PropertyRequest::DisplayName,
                PropertyRequest::GetContentLength,
                PropertyRequest::GetContentType,
                PropertyRequest::GetEtag,
                PropertyRequest::GetLastModified,
                PropertyRequest::ResourceType,
                PropertyRequest::SupportedLock,
            ]))
        );
    }

    #[tokio::test]
    async fn rfc_propertyupdate() {
        let src = r#"<?xml version="1.0" encoding="utf-8" ?>
     <D:propertyupdate xmlns:D="DAV:">
       <D:set>
         <D:prop>
           <D:displayname>pending tasks</D:displayname>
         </D:prop>
       </D:set>
       <D:remove>
         <D:prop><D:getcontentlanguage/></D:prop>
       </D:remove>
     </D:propertyupdate>"#;

        let got = deserialize::<PropertyUpdate<Core>>(src).await;
        assert_eq!(
            got,
            PropertyUpdate(vec![
                PropertyUpdateItem::Set(Set(PropValue(vec![Property::DisplayName(
                    "pending tasks".into()
                )]))),
                PropertyUpdateItem::Remove(Remove(PropName(vec![
                    PropertyRequest::GetContentLanguage
                ]))),
            ])
        );
    }

    #[tokio::test]
    async fn extended_mkcol() {
        let src = r#"<?xml version="1.0" encoding="utf-8" ?>
    <D:mkcol xmlns:D="DAV:">
      <D:set>
        <D:prop>
          <D:displayname>Lisa's Contacts</D:displayname>
        </D:prop>
      </D:set>
    </D:mkcol>"#;

        let got = deserialize::<Mkcol<Core>>(src).await;
        assert_eq!(
            got,
            Mkcol(vec![Set(PropValue(vec![Property::DisplayName(
                "Lisa's Contacts".into()
            )]))])
        );
    }

    #[tokio::test]
    async fn rfc_multistatus_value() {
        let src = r#"
     <?xml version="1.0" encoding="utf-8" ?>
     <D:multistatus xmlns:D="DAV:">
       <D:response>
         <D:href>/container/front.html</D:href>
         <D:propstat>
           <D:prop>
             <D:displayname>Example HTML resource</D:displayname>
             <D:getcontentlength>4525</D:getcontentlength>
             <D:getcontenttype>text/html</D:getcontenttype>
             <D:getetag>"zzyzx"</D:getetag>
             <D:supportedlock/>
           </D:prop>
           <D:status>HTTP/1.1 200 OK</D:status>
         </D:propstat>
       </D:response>
     </D:multistatus>"#;

        let got = deserialize::<Multistatus<Core>>(src).await;
        assert_eq!(
            got,
            Multistatus {
                responses: vec![Response {
                    status_or_propstat: StatusOrPropstat::PropStat(
                        Href("/container/front.html".into()),
                        vec![PropStat {
                            prop: AnyProp(vec![
                                AnyProperty::Value(Property::DisplayName(
                                    "Example HTML resource".into()
                                )),
                                AnyProperty::Value(Property::GetContentLength(4525)),
                                AnyProperty::Value(Property::GetContentType("text/html".into())),
                                AnyProperty::Value(Property::GetEtag(r#""zzyzx""#.into())),
                                // an empty value cannot be told apart from a
                                // property name request, so it decodes as one
                                AnyProperty::Request(PropertyRequest::SupportedLock),
                            ]),
                            status: Status(http::status::StatusCode::OK),
                            error: None,
                            responsedescription: None,
                        }],
                    ),
                    error: None,
                    responsedescription: None,
                    location: None,
                }],
                responsedescription: None,
                extension: None,
            }
        );
    }
}

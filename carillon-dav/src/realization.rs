use quick_xml::events::{BytesStart, Event};

use super::acltypes as acl;
use super::caltypes as cal;
use super::cardtypes as card;
use super::cs;
use super::error;
use super::synctypes as sync;
use super::types as dav;
use super::versioningtypes as vers;
use super::xml;

#[derive(Debug, PartialEq, Clone)]
pub struct Disabled(());
impl xml::QRead<Disabled> for Disabled {
    async fn qread(_xml: &mut xml::Reader<impl xml::IRead>) -> Result<Self, error::ParsingError> {
        Err(error::ParsingError::Recoverable)
    }
}
impl xml::QWrite for Disabled {
    async fn qwrite(
        &self,
        _xml: &mut xml::Writer<impl xml::IWrite>,
    ) -> Result<(), quick_xml::Error> {
        unreachable!()
    }
}

/// The base WebDAV
///
/// Any extension is disabled through an object we can't build
/// due to a private inner element.
#[derive(Debug, PartialEq, Clone)]
pub struct Core {}
impl dav::Extension for Core {
    type Error = Disabled;
    type Property = Disabled;
    type PropertyRequest = Disabled;
    type ResourceType = Disabled;
    type ReportType = Disabled;
    type ReportTypeName = Disabled;
    type MultistatusExtension = Disabled;
}

/// WebDAV with the base Calendar implementation (RFC4791)
#[derive(Debug, PartialEq, Clone)]
pub struct Calendar {}
impl dav::Extension for Calendar {
    type Error = cal::Violation;
    type Property = cal::Property;
    type PropertyRequest = cal::PropertyRequest;
    type ResourceType = cal::ResourceType;
    type ReportType = cal::ReportType<Calendar>;
    type ReportTypeName = cal::ReportTypeName;
    type MultistatusExtension = Disabled;
}

/// All merged: what the server actually speaks
#[derive(Debug, PartialEq, Clone)]
pub struct All {}
impl dav::Extension for All {
    type Error = Violation;
    type Property = Property<All>;
    type PropertyRequest = PropertyRequest;
    type ResourceType = ResourceType;
    type ReportType = ReportType<All>;
    type ReportTypeName = ReportTypeName;
    type MultistatusExtension = Multistatus;
}

#[derive(Debug, PartialEq, Clone)]
pub enum Violation {
    Cal(cal::Violation),
    Card(card::Violation),
    Sync(sync::Violation),
}
impl xml::QRead<Violation> for Violation {
    async fn qread(xml: &mut xml::Reader<impl xml::IRead>) -> Result<Self, error::ParsingError> {
        match cal::Violation::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Violation::Cal),
        }
        match card::Violation::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Violation::Card),
        }
        sync::Violation::qread(xml).await.map(Violation::Sync)
    }
}
impl xml::QWrite for Violation {
    async fn qwrite(
        &self,
        xml: &mut xml::Writer<impl xml::IWrite>,
    ) -> Result<(), quick_xml::Error> {
        match self {
            Self::Cal(c) => c.qwrite(xml).await,
            Self::Card(c) => c.qwrite(xml).await,
            Self::Sync(s) => s.qwrite(xml).await,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Property<E: dav::Extension> {
    Cal(cal::Property),
    Card(card::Property),
    Acl(acl::Property),
    Sync(sync::Property),
    Vers(vers::Property<E>),
    Cs(cs::Property),
    /// A property value the server has no type for. Only non-empty
    /// elements land here so that name-only requests keep decoding as
    /// `PropertyRequest`. The content is discarded; the name is enough to
    /// answer 403 on PROPPATCH.
    Unknown {
        ns: Option<String>,
        local: String,
    },
}
impl<E: dav::Extension> xml::QRead<Property<E>> for Property<E> {
    async fn qread(xml: &mut xml::Reader<impl xml::IRead>) -> Result<Self, error::ParsingError> {
        match cal::Property::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Property::<E>::Cal),
        }
        match card::Property::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Property::Card),
        }
        match acl::Property::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Property::Acl),
        }
        match sync::Property::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Property::Sync),
        }
        match vers::Property::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Property::Vers),
        }
        match cs::Property::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(Property::Cs),
        }

        // catch-all, must stay last
        match xml.peek() {
            Event::Start(_) => {
                let (ns, local) = xml.open_any().await?;
                xml.close().await?;
                Ok(Property::Unknown { ns, local })
            }
            _ => Err(error::ParsingError::Recoverable),
        }
    }
}
impl<E: dav::Extension> xml::QWrite for Property<E> {
    async fn qwrite(
        &self,
        xml: &mut xml::Writer<impl xml::IWrite>,
    ) -> Result<(), quick_xml::Error> {
        match self {
            Self::Cal(c) => c.qwrite(xml).await,
            Self::Card(c) => c.qwrite(xml).await,
            Self::Acl(a) => a.qwrite(xml).await,
            Self::Sync(s) => s.qwrite(xml).await,
            Self::Vers(v) => v.qwrite(xml).await,
            Self::Cs(c) => c.qwrite(xml).await,
            Self::Unknown { ns, local } => write_unknown(xml, ns.as_deref(), local).await,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyRequest {
    Cal(cal::PropertyRequest),
    Card(card::PropertyRequest),
    Acl(acl::PropertyRequest),
    Sync(sync::PropertyRequest),
    Vers(vers::PropertyRequest),
    Cs(cs::PropertyRequest),
    /// Any property name the server does not implement, kept so PROPFIND
    /// can echo it with 404 Not Found (RFC 4918 §9.1.1).
    Raw {
        ns: Option<String>,
        local: String,
    },
}
impl xml::QRead<PropertyRequest> for PropertyRequest {
    async fn qread(xml: &mut xml::Reader<impl xml::IRead>) -> Result<Self, error::ParsingError> {
        match cal::PropertyRequest::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(PropertyRequest::Cal),
        }
        match card::PropertyRequest::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(PropertyRequest::Card),
        }
        match acl::PropertyRequest::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(PropertyRequest::Acl),
        }
        match sync::PropertyRequest::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(PropertyRequest::Sync),
        }
        match vers::PropertyRequest::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(PropertyRequest::Vers),
        }
        match cs::PropertyRequest::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(PropertyRequest::Cs),
        }

        // catch-all, must stay last
        let (ns, local) = xml.open_any().await?;
        xml.close().await?;
        Ok(PropertyRequest::Raw { ns, local })
    }
}
impl xml::QWrite for PropertyRequest {
    async fn qwrite(
        &self,
        xml: &mut xml::Writer<impl xml::IWrite>,
    ) -> Result<(), quick_xml::Error> {
        match self {
            Self::Cal(c) => c.qwrite(xml).await,
            Self::Card(c) => c.qwrite(xml).await,
            Self::Acl(a) => a.qwrite(xml).await,
            Self::Sync(s) => s.qwrite(xml).await,
            Self::Vers(v) => v.qwrite(xml).await,
            Self::Cs(c) => c.qwrite(xml).await,
            Self::Raw { ns, local } => write_unknown(xml, ns.as_deref(), local).await,
        }
    }
}

async fn write_unknown(
    xml: &mut xml::Writer<impl xml::IWrite>,
    ns: Option<&str>,
    local: &str,
) -> Result<(), quick_xml::Error> {
    let mut empty = BytesStart::new(local);
    if let Some(ns) = ns {
        empty.push_attribute(("xmlns", ns));
    }
    xml.q.write_event_async(Event::Empty(empty)).await
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResourceType {
    Cal(cal::ResourceType),
    Card(card::ResourceType),
    Acl(acl::ResourceType),
}
impl xml::QRead<ResourceType> for ResourceType {
    async fn qread(xml: &mut xml::Reader<impl xml::IRead>) -> Result<Self, error::ParsingError> {
        match cal::ResourceType::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(ResourceType::Cal),
        }
        match card::ResourceType::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(ResourceType::Card),
        }
        acl::ResourceType::qread(xml).await.map(ResourceType::Acl)
    }
}
impl xml::QWrite for ResourceType {
    async fn qwrite(
        &self,
        xml: &mut xml::Writer<impl xml::IWrite>,
    ) -> Result<(), quick_xml::Error> {
        match self {
            Self::Cal(c) => c.qwrite(xml).await,
            Self::Card(c) => c.qwrite(xml).await,
            Self::Acl(a) => a.qwrite(xml).await,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ReportType<E: dav::Extension> {
    Cal(cal::ReportType<E>),
    Card(card::ReportType<E>),
    Sync(sync::SyncCollection<E>),
    Acl(acl::PrincipalMatch),
}
impl<E: dav::Extension> xml::QRead<ReportType<E>> for ReportType<E> {
    async fn qread(
        xml: &mut xml::Reader<impl xml::IRead>,
    ) -> Result<ReportType<E>, error::ParsingError> {
        match cal::ReportType::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(ReportType::Cal),
        }
        match card::ReportType::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(ReportType::Card),
        }
        match sync::SyncCollection::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(ReportType::Sync),
        }
        acl::PrincipalMatch::qread(xml).await.map(ReportType::Acl)
    }
}
impl<E: dav::Extension> xml::QWrite for ReportType<E> {
    async fn qwrite(
        &self,
        xml: &mut xml::Writer<impl xml::IWrite>,
    ) -> Result<(), quick_xml::Error> {
        match self {
            Self::Cal(c) => c.qwrite(xml).await,
            Self::Card(c) => c.qwrite(xml).await,
            Self::Sync(s) => s.qwrite(xml).await,
            Self::Acl(a) => a.qwrite(xml).await,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ReportTypeName {
    Cal(cal::ReportTypeName),
    Card(card::ReportTypeName),
    Sync(sync::ReportTypeName),
    Acl(acl::ReportTypeName),
}
impl xml::QRead<ReportTypeName> for ReportTypeName {
    async fn qread(xml: &mut xml::Reader<impl xml::IRead>) -> Result<Self, error::ParsingError> {
        match cal::ReportTypeName::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(ReportTypeName::Cal),
        }
        match card::ReportTypeName::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(ReportTypeName::Card),
        }
        match sync::ReportTypeName::qread(xml).await {
            Err(error::ParsingError::Recoverable) => (),
            otherwise => return otherwise.map(ReportTypeName::Sync),
        }
        acl::ReportTypeName::qread(xml)
            .await
            .map(ReportTypeName::Acl)
    }
}
impl xml::QWrite for ReportTypeName {
    async fn qwrite(
        &self,
        xml: &mut xml::Writer<impl xml::IWrite>,
    ) -> Result<(), quick_xml::Error> {
        match self {
            Self::Cal(c) => c.qwrite(xml).await,
            Self::Card(c) => c.qwrite(xml).await,
            Self::Sync(s) => s.qwrite(xml).await,
            Self::Acl(a) => a.qwrite(xml).await,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Multistatus {
    Sync(sync::Multistatus),
}
impl xml::QRead<Multistatus> for Multistatus {
    async fn qread(xml: &mut xml::Reader<impl xml::IRead>) -> Result<Self, error::ParsingError> {
        sync::Multistatus::qread(xml).await.map(Multistatus::Sync)
    }
}
impl xml::QWrite for Multistatus {
    async fn qwrite(
        &self,
        xml: &mut xml::Writer<impl xml::IWrite>,
    ) -> Result<(), quick_xml::Error> {
        match self {
            Self::Sync(s) => s.qwrite(xml).await,
        }
    }
}

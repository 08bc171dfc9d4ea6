use super::acltypes::*;
use super::error::ParsingError;
use super::types as dav;
use super::xml::{IRead, QRead, Reader, DAV_URN};

impl QRead<PropertyRequest> for PropertyRequest {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(DAV_URN, "owner").await?.is_some() {
            xml.close().await?;
            return Ok(Self::Owner);
        }
        if xml
            .maybe_open(DAV_URN, "current-user-principal")
            .await?
            .is_some()
        {
            xml.close().await?;
            return Ok(Self::CurrentUserPrincipal);
        }
        if xml.maybe_open(DAV_URN, "principal-URL").await?.is_some() {
            xml.close().await?;
            return Ok(Self::PrincipalUrl);
        }
        if xml.maybe_open(DAV_URN, "group-membership").await?.is_some() {
            xml.close().await?;
            return Ok(Self::GroupMembership);
        }
        Err(ParsingError::Recoverable)
    }
}

impl QRead<Property> for Property {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open_start(DAV_URN, "owner").await?.is_some() {
            let href = xml.find().await?;
            xml.close().await?;
            return Ok(Self::Owner(href));
        }
        if xml
            .maybe_open_start(DAV_URN, "current-user-principal")
            .await?
            .is_some()
        {
            let user = xml.find().await?;
            xml.close().await?;
            return Ok(Self::CurrentUserPrincipal(user));
        }
        if xml
            .maybe_open_start(DAV_URN, "principal-URL")
            .await?
            .is_some()
        {
            let href = xml.find().await?;
            xml.close().await?;
            return Ok(Self::PrincipalUrl(href));
        }
        if xml
            .maybe_open_start(DAV_URN, "group-membership")
            .await?
            .is_some()
        {
            let hrefs = xml.collect().await?;
            xml.close().await?;
            return Ok(Self::GroupMembership(hrefs));
        }
        Err(ParsingError::Recoverable)
    }
}

impl QRead<ResourceType> for ResourceType {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(DAV_URN, "principal").await?.is_some() {
            xml.close().await?;
            return Ok(Self::Principal);
        }
        Err(ParsingError::Recoverable)
    }
}

impl QRead<User> for User {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(DAV_URN, "unauthenticated").await?.is_some() {
            xml.close().await?;
            return Ok(Self::Unauthenticated);
        }
        dav::Href::qread(xml).await.map(Self::Authenticated)
    }
}

impl QRead<PrincipalMatch> for PrincipalMatch {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "principal-match").await?;

        let inner = loop {
            if xml.maybe_open(DAV_URN, "self").await?.is_some() {
                xml.close().await?;
                break PrincipalMatch::Selph;
            }
            if xml
                .maybe_open(DAV_URN, "principal-property")
                .await?
                .is_some()
            {
                // whatever single child element is inside names the property
                let (_ns, local) = match xml.open_any().await {
                    Ok(v) => v,
                    Err(ParsingError::Recoverable) => {
                        xml.close().await?;
                        break PrincipalMatch::PrincipalProperty(String::new());
                    }
                    Err(e) => return Err(e),
                };
                xml.close().await?;
                xml.close().await?;
                break PrincipalMatch::PrincipalProperty(local);
            }
            xml.skip().await?;
        };

        xml.close().await?;
        Ok(inner)
    }
}

impl QRead<ReportTypeName> for ReportTypeName {
    async fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(DAV_URN, "principal-match").await?.is_some() {
            xml.close().await?;
            return Ok(Self::PrincipalMatch);
        }
        Err(ParsingError::Recoverable)
    }
}

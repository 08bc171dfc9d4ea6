use quick_xml::events::{BytesText, Event};
use quick_xml::Error as QError;

use super::types as dav;
use super::versioningtypes::*;
use super::xml::{IWrite, QWrite, Writer};

impl<E: dav::Extension> QWrite for Report<E> {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::ExpandProperty(inner) => inner.qwrite(xml).await,
            Self::Extension(inner) => inner.qwrite(xml).await,
        }
    }
}

impl QWrite for ExpandProperty {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("expand-property");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        for prop in self.0.iter() {
            prop.qwrite(xml).await?;
        }
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for PropertyExpansion {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let mut start = xml.create_dav_element("property");
        start.push_attribute(("name", self.name.as_str()));
        if let Some(ns) = &self.namespace {
            start.push_attribute(("namespace", ns.as_str()));
        }

        if self.nested.is_empty() {
            return xml.q.write_event_async(Event::Empty(start)).await;
        }

        let end = start.to_end();
        xml.q.write_event_async(Event::Start(start.clone())).await?;
        for prop in self.nested.iter() {
            // Required: recursion in an async fn requires boxing
            // rustc --explain E0733
            fn recurse<'a>(
                prop: &'a PropertyExpansion,
                xml: &'a mut Writer<impl IWrite>,
            ) -> futures::future::BoxFuture<'a, Result<(), QError>> {
                Box::pin(prop.qwrite(xml))
            }
            recurse(prop, xml).await?;
        }
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl<E: dav::Extension> QWrite for Property<E> {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::SupportedReportSet(many_reports) => {
                let start = xml.create_dav_element("supported-report-set");
                let end = start.to_end();

                xml.q.write_event_async(Event::Start(start.clone())).await?;
                for report in many_reports.iter() {
                    report.qwrite(xml).await?;
                }
                xml.q.write_event_async(Event::End(end)).await
            }
        }
    }
}

impl QWrite for PropertyRequest {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        match self {
            Self::SupportedReportSet => {
                let empty_tag = xml.create_dav_element("supported-report-set");
                xml.q.write_event_async(Event::Empty(empty_tag)).await
            }
        }
    }
}

impl<E: dav::Extension> QWrite for SupportedReport<E> {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("supported-report");
        let end = start.to_end();
        xml.q.write_event_async(Event::Start(start.clone())).await?;
        self.0.qwrite(xml).await?;
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl<E: dav::Extension> QWrite for ReportName<E> {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("report");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        match self {
            Self::ExpandProperty => {
                let empty_tag = xml.create_dav_element("expand-property");
                xml.q.write_event_async(Event::Empty(empty_tag)).await?;
            }
            Self::Extension(ext) => ext.qwrite(xml).await?,
        };
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for Limit {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("limit");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        self.0.qwrite(xml).await?;
        xml.q.write_event_async(Event::End(end)).await
    }
}

impl QWrite for NResults {
    async fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("nresults");
        let end = start.to_end();

        xml.q.write_event_async(Event::Start(start.clone())).await?;
        xml.q
            .write_event_async(Event::Text(BytesText::new(&format!("{}", self.0))))
            .await?;
        xml.q.write_event_async(Event::End(end)).await
    }
}

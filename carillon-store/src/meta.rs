//! Collection type and presentation properties, persisted as a TOML
//! sidecar under the reserved metadata directory. The sidecar is not part
//! of the content tree: changing a display name moves neither the ctag
//! nor the sync token.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::StoreError;

pub const META_DIR: &str = ".carillon";
pub const META_FILE: &str = "meta.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionKind {
    Principal,
    Calendar,
    Addressbook,
    ScheduleInbox,
    ScheduleOutbox,
    Subscription,
    Plain,
}

impl CollectionKind {
    /// The payload validation this collection performs on PUT.
    pub fn item_kind(&self) -> Option<carillon_ical::validate::ItemKind> {
        match self {
            Self::Calendar | Self::ScheduleInbox | Self::ScheduleOutbox | Self::Subscription => {
                Some(carillon_ical::validate::ItemKind::Calendar)
            }
            Self::Addressbook => Some(carillon_ical::validate::ItemKind::Addressbook),
            Self::Principal | Self::Plain => None,
        }
    }

    /// May members be created below this collection by clients?
    pub fn accepts_members(&self) -> bool {
        matches!(
            self,
            Self::Calendar | Self::Addressbook | Self::ScheduleInbox | Self::Plain
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub kind: CollectionKind,
    pub displayname: Option<String>,
    pub description: Option<String>,
    /// #RRGGBBAA, client-chosen
    pub color: Option<String>,
    pub order: Option<u64>,
    /// iCalendar object holding a single VTIMEZONE
    pub timezone: Option<String>,
    /// Subscription source URL
    pub source: Option<String>,
    /// Subscription refresh hint (an iCalendar duration)
    pub refresh_rate: Option<String>,
    /// Calendar component restriction (VEVENT, VTODO, ...); empty means
    /// everything is accepted
    #[serde(default)]
    pub components: Vec<String>,
}

impl CollectionMeta {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            displayname: None,
            description: None,
            color: None,
            order: None,
            timezone: None,
            source: None,
            refresh_rate: None,
            components: Vec::new(),
        }
    }

    pub fn load(collection_dir: &Path) -> Result<Self, StoreError> {
        let path = collection_dir.join(META_DIR).join(META_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&raw).map_err(|e| StoreError::Corrupt(format!("meta sidecar: {}", e)))
    }

    pub fn save(&self, collection_dir: &Path) -> Result<(), StoreError> {
        let dir = collection_dir.join(META_DIR);
        std::fs::create_dir_all(&dir)?;
        let raw = toml::to_string(self).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = dir.join(format!("{}.tmp", META_FILE));
        std::fs::write(&tmp, raw)?;
        std::fs::rename(tmp, dir.join(META_FILE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut meta = CollectionMeta::new(CollectionKind::Calendar);
        meta.displayname = Some("calendar".into());
        meta.color = Some("#BADA55FF".into());
        meta.components = vec!["VEVENT".into(), "VTODO".into()];
        meta.save(dir.path()).unwrap();

        let loaded = CollectionMeta::load(dir.path()).unwrap();
        assert_eq!(loaded, meta);
    }

    #[test]
    fn missing_sidecar_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CollectionMeta::load(dir.path()),
            Err(StoreError::NotFound)
        ));
    }
}

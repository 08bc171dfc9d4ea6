//! The per-collection store: named resources over the object database,
//! one commit per mutation, strong ETags, UID injectivity, change
//! enumeration between two commits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use carillon_ical::validate::{self, ItemKind};
use carillon_ical::IcalError;

use crate::index::IndexCache;
use crate::meta::{CollectionKind, CollectionMeta, META_DIR, META_FILE};
use crate::objdb::{Commit, FsDb, ObjectDb, ObjectId, Tree};
use crate::StoreError;

/// Conditional-request inputs of a mutating operation, already reduced
/// to raw entity tags by the protocol layer.
#[derive(Debug, Default, Clone)]
pub struct Preconditions {
    pub if_match: Option<String>,
    pub if_none_match_star: bool,
}

impl Preconditions {
    fn check(&self, existing: Option<&str>) -> Result<(), StoreError> {
        if self.if_none_match_star && existing.is_some() {
            return Err(StoreError::PreconditionFailed);
        }
        if let Some(expected) = &self.if_match {
            match existing {
                Some(etag) if etag == expected => (),
                _ => return Err(StoreError::PreconditionFailed),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutOutcome {
    pub etag: String,
    pub ctag: String,
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub name: String,
    pub kind: ChangeKind,
    pub etag: Option<String>,
}

pub struct Collection {
    dir: PathBuf,
    db: Arc<dyn ObjectDb>,
    meta: RwLock<CollectionMeta>,
    // one writer per collection; readers snapshot HEAD without waiting
    write_lock: tokio::sync::Mutex<()>,
    index: Arc<IndexCache>,
}

impl Collection {
    pub fn open(dir: impl Into<PathBuf>, index: Arc<IndexCache>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let meta = CollectionMeta::load(&dir)?;
        let db = Arc::new(FsDb::open(dir.join(META_DIR))?);
        let col = Self {
            dir,
            db,
            meta: RwLock::new(meta),
            write_lock: tokio::sync::Mutex::new(()),
            index,
        };
        col.ensure_initialized()?;
        Ok(col)
    }

    pub fn create(
        dir: impl Into<PathBuf>,
        meta: CollectionMeta,
        index: Arc<IndexCache>,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        if dir.join(META_DIR).join(META_FILE).exists() {
            return Err(StoreError::AlreadyExists);
        }
        std::fs::create_dir_all(&dir)?;
        meta.save(&dir)?;
        Self::open(dir, index)
    }

    /// Every collection carries at least the empty state so that ctags
    /// and sync tokens exist from the start.
    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.db.head()?.is_some() {
            return Ok(());
        }
        let tree = self.db.put_tree(&Tree::default())?;
        let commit = self.db.put_commit(&Commit {
            tree,
            parent: None,
            author: "carillon".into(),
            message: "initialize collection".into(),
            timestamp: chrono::Utc::now().timestamp(),
        })?;
        self.db.set_head(commit)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> CollectionMeta {
        self.meta.read().unwrap().clone()
    }

    pub fn kind(&self) -> CollectionKind {
        self.meta.read().unwrap().kind
    }

    pub fn item_kind(&self) -> Option<ItemKind> {
        self.kind().item_kind()
    }

    /// Presentation properties live in the sidecar: no commit, no ctag
    /// movement.
    pub fn update_meta(
        &self,
        apply: impl FnOnce(&mut CollectionMeta),
    ) -> Result<CollectionMeta, StoreError> {
        let mut guard = self.meta.write().unwrap();
        apply(&mut guard);
        guard.save(&self.dir)?;
        Ok(guard.clone())
    }

    fn head(&self) -> Result<(ObjectId, Commit), StoreError> {
        let id = self
            .db
            .head()?
            .ok_or_else(|| StoreError::Corrupt("missing HEAD".into()))?;
        let commit = self.db.read_commit(id)?;
        Ok((id, commit))
    }

    /// Tree identity: changes iff the member set or any member changes.
    pub fn ctag(&self) -> Result<ObjectId, StoreError> {
        Ok(self.head()?.1.tree)
    }

    /// Commit identity: advances with every mutation.
    pub fn sync_token(&self) -> Result<ObjectId, StoreError> {
        Ok(self.head()?.0)
    }

    pub fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        let tree = self.db.read_tree(self.head()?.1.tree)?;
        Ok(tree
            .entries
            .iter()
            .map(|e| (e.name.clone(), e.blob.hex()))
            .collect())
    }

    pub fn get(&self, name: &str) -> Result<(Vec<u8>, String), StoreError> {
        let tree = self.db.read_tree(self.head()?.1.tree)?;
        let entry = tree.get(name).ok_or(StoreError::NotFound)?;
        Ok((self.db.read_blob(entry.blob)?, entry.blob.hex()))
    }

    pub fn etag(&self, name: &str) -> Result<String, StoreError> {
        let tree = self.db.read_tree(self.head()?.1.tree)?;
        Ok(tree.get(name).ok_or(StoreError::NotFound)?.blob.hex())
    }

    pub fn content_type(&self, _name: &str) -> &'static str {
        match self.item_kind() {
            Some(kind) => kind.content_type(),
            None => "application/octet-stream",
        }
    }

    /// The timestamps a resource derives from commit metadata: creation
    /// is the first commit mentioning the name, last-modified the first
    /// commit where the current blob appeared.
    pub fn timestamps(&self, name: &str) -> Result<(i64, i64), StoreError> {
        let (head_id, head) = self.head()?;
        let current = self
            .db
            .read_tree(head.tree)?
            .get(name)
            .ok_or(StoreError::NotFound)?
            .blob;

        let mut created = head.timestamp;
        let mut modified = head.timestamp;
        for (_, commit) in self.db.log(head_id)? {
            let tree = self.db.read_tree(commit.tree)?;
            match tree.get(name) {
                Some(entry) => {
                    created = commit.timestamp;
                    if entry.blob == current {
                        modified = commit.timestamp;
                    }
                }
                None => break,
            }
        }
        Ok((created, modified))
    }

    pub async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        pre: &Preconditions,
        author: &str,
    ) -> Result<PutOutcome, StoreError> {
        check_member_name(name)?;
        let _guard = self.write_lock.lock().await;

        let meta = self.meta();
        if matches!(meta.kind, CollectionKind::Subscription) {
            return Err(StoreError::Forbidden);
        }

        let (head_id, head) = self.head()?;
        let mut tree = self.db.read_tree(head.tree)?;
        let existing = tree.get(name).map(|e| e.blob.hex());
        pre.check(existing.as_deref())?;

        if let Some(item_kind) = meta.kind.item_kind() {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| IcalError::Syntax(0, "payload is not valid UTF-8".into()))?;
            let validated = validate::validate(item_kind, text)?;

            if !meta.components.is_empty()
                && validated.component != "VCARD"
                && !meta.components.iter().any(|c| *c == validated.component)
            {
                return Err(IcalError::UnsupportedComponent(validated.component).into());
            }

            let uids = self.index.uid_map(self.db.as_ref(), head.tree, item_kind)?;
            if let Some(existing_name) = uids.get(&validated.uid) {
                if existing_name != name {
                    return Err(StoreError::UidConflict {
                        existing: existing_name.clone(),
                    });
                }
            }
        }

        let blob = self.db.put_blob(bytes)?;
        tree.insert(name.to_string(), blob);
        let tree_id = self.db.put_tree(&tree)?;
        let commit = self.db.put_commit(&Commit {
            tree: tree_id,
            parent: Some(head_id),
            author: author.to_string(),
            message: format!("put {}", name),
            timestamp: chrono::Utc::now().timestamp(),
        })?;
        self.db.set_head(commit)?;

        Ok(PutOutcome {
            etag: blob.hex(),
            ctag: tree_id.hex(),
            created: existing.is_none(),
        })
    }

    pub async fn delete(
        &self,
        name: &str,
        pre: &Preconditions,
        author: &str,
    ) -> Result<(), StoreError> {
        check_member_name(name)?;
        let _guard = self.write_lock.lock().await;

        let (head_id, head) = self.head()?;
        let mut tree = self.db.read_tree(head.tree)?;
        let existing = tree.get(name).map(|e| e.blob.hex());
        if existing.is_none() {
            return Err(StoreError::NotFound);
        }
        pre.check(existing.as_deref())?;

        tree.remove(name);
        let tree_id = self.db.put_tree(&tree)?;
        let commit = self.db.put_commit(&Commit {
            tree: tree_id,
            parent: Some(head_id),
            author: author.to_string(),
            message: format!("delete {}", name),
            timestamp: chrono::Utc::now().timestamp(),
        })?;
        self.db.set_head(commit)
    }

    /// The exact member delta between two tokens. `old = None` reports
    /// the full current state as additions.
    pub fn iter_changes(
        &self,
        old: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<Vec<Change>, StoreError> {
        let new_commit = self
            .db
            .read_commit(new)
            .map_err(|_| StoreError::TokenStale)?;
        let new_map = self.db.read_tree(new_commit.tree)?.as_map();

        let old_tree = match old {
            None => None,
            Some(old_id) => {
                // the old token must be reachable from the new head
                let mut cursor = new_commit.parent;
                let mut found = None;
                while let Some(id) = cursor {
                    let commit = self
                        .db
                        .read_commit(id)
                        .map_err(|_| StoreError::TokenStale)?;
                    if id == old_id {
                        found = Some(commit.tree);
                        break;
                    }
                    cursor = commit.parent;
                }
                match (found, old_id == new) {
                    (_, true) => Some(new_commit.tree),
                    (Some(tree), _) => Some(tree),
                    (None, _) => return Err(StoreError::TokenStale),
                }
            }
        };

        let old_map = match old_tree {
            Some(tree) => self.db.read_tree(tree)?.as_map(),
            None => HashMap::new(),
        };

        let mut changes = Vec::new();
        for (name, blob) in new_map.iter() {
            match old_map.get(name) {
                None => changes.push(Change {
                    name: name.clone(),
                    kind: ChangeKind::Added,
                    etag: Some(blob.hex()),
                }),
                Some(old_blob) if old_blob != blob => changes.push(Change {
                    name: name.clone(),
                    kind: ChangeKind::Modified,
                    etag: Some(blob.hex()),
                }),
                Some(_) => (),
            }
        }
        for name in old_map.keys() {
            if !new_map.contains_key(name) {
                changes.push(Change {
                    name: name.clone(),
                    kind: ChangeKind::Deleted,
                    etag: None,
                });
            }
        }
        changes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(changes)
    }

    pub fn db(&self) -> &dyn ObjectDb {
        self.db.as_ref()
    }

    pub fn index(&self) -> &IndexCache {
        &self.index
    }
}

fn check_member_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(StoreError::BadName(name.to_string()));
    }
    Ok(())
}

/// A filesystem root holding the collection hierarchy. Keeps one live
/// `Collection` per directory so the per-collection write lock actually
/// serialises writers across requests.
pub struct Store {
    root: PathBuf,
    index: Arc<IndexCache>,
    open: Mutex<HashMap<PathBuf, Arc<Collection>>>,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>, index_capacity: usize) -> Self {
        Self {
            root: root.into(),
            index: Arc::new(IndexCache::new(index_capacity)),
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> Arc<IndexCache> {
        self.index.clone()
    }

    /// Map URI path segments to a directory, refusing escapes and the
    /// reserved metadata namespace.
    pub fn resolve(&self, segments: &[&str]) -> Result<PathBuf, StoreError> {
        let mut dir = self.root.clone();
        for seg in segments {
            check_member_name(seg)?;
            dir.push(seg);
        }
        Ok(dir)
    }

    pub fn is_collection(&self, segments: &[&str]) -> Result<bool, StoreError> {
        let dir = self.resolve(segments)?;
        Ok(dir.join(META_DIR).join(META_FILE).exists())
    }

    pub fn dir_exists(&self, segments: &[&str]) -> Result<bool, StoreError> {
        Ok(self.resolve(segments)?.is_dir())
    }

    pub fn open_collection(&self, segments: &[&str]) -> Result<Option<Arc<Collection>>, StoreError> {
        let dir = self.resolve(segments)?;
        if !dir.join(META_DIR).join(META_FILE).exists() {
            return Ok(None);
        }
        let mut open = self.open.lock().unwrap();
        if let Some(col) = open.get(&dir) {
            return Ok(Some(col.clone()));
        }
        let col = Arc::new(Collection::open(&dir, self.index.clone())?);
        open.insert(dir, col.clone());
        Ok(Some(col))
    }

    pub fn create_collection(
        &self,
        segments: &[&str],
        meta: CollectionMeta,
    ) -> Result<Arc<Collection>, StoreError> {
        let dir = self.resolve(segments)?;
        let col = Arc::new(Collection::create(&dir, meta, self.index.clone())?);
        self.open.lock().unwrap().insert(dir, col.clone());
        Ok(col)
    }

    /// DELETE on a collection destroys it and everything below it.
    pub fn delete_collection(&self, segments: &[&str]) -> Result<(), StoreError> {
        if segments.is_empty() {
            return Err(StoreError::Forbidden);
        }
        let dir = self.resolve(segments)?;
        if !dir.join(META_DIR).join(META_FILE).exists() {
            return Err(StoreError::NotFound);
        }
        let mut open = self.open.lock().unwrap();
        open.retain(|path, _| !path.starts_with(&dir));
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    /// Child collections of a directory, by name.
    pub fn children(&self, segments: &[&str]) -> Result<Vec<String>, StoreError> {
        let dir = self.resolve(segments)?;
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if entry.path().join(META_DIR).join(META_FILE).exists() {
                out.push(name);
            }
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVT1: &[u8] = b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nDTSTART:20240115T120000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    const EVT1_EDITED: &[u8] = b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nDTSTART:20240115T140000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    const EVT2: &[u8] = b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:evt-2\r\nDTSTART:20240116T120000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    const EVT1_COPY: &[u8] = b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nDTSTART:20240117T120000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    fn calendar() -> (tempfile::TempDir, Collection) {
        let dir = tempfile::tempdir().unwrap();
        let col = Collection::create(
            dir.path().join("calendar"),
            CollectionMeta::new(CollectionKind::Calendar),
            Arc::new(IndexCache::new(64)),
        )
        .unwrap();
        (dir, col)
    }

    #[tokio::test]
    async fn put_get_roundtrip_and_etag() {
        let (_dir, col) = calendar();
        let out = col
            .put("evt-1.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();
        assert!(out.created);

        let (bytes, etag) = col.get("evt-1.ics").unwrap();
        assert_eq!(bytes, EVT1);
        assert_eq!(etag, out.etag);
        // strong etag: hash of the content, stable across reads
        assert_eq!(col.etag("evt-1.ics").unwrap(), out.etag);
    }

    #[tokio::test]
    async fn ctag_moves_iff_content_changes() {
        let (_dir, col) = calendar();
        let before = col.ctag().unwrap();

        col.put("evt-1.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();
        let after_put = col.ctag().unwrap();
        assert_ne!(before, after_put);

        // same bytes again: tree identical, ctag identical
        col.put("evt-1.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();
        assert_eq!(col.ctag().unwrap(), after_put);

        // metadata does not move the ctag
        col.update_meta(|m| m.displayname = Some("work".into()))
            .unwrap();
        assert_eq!(col.ctag().unwrap(), after_put);
    }

    #[tokio::test]
    async fn sync_token_advances_monotonically() {
        let (_dir, col) = calendar();
        let t0 = col.sync_token().unwrap();
        col.put("evt-1.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();
        let t1 = col.sync_token().unwrap();
        assert_ne!(t0, t1);

        // even a no-op put is one commit
        col.put("evt-1.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();
        assert_ne!(col.sync_token().unwrap(), t1);
    }

    #[tokio::test]
    async fn uid_conflict_leaves_state_unchanged() {
        let (_dir, col) = calendar();
        col.put("evt-1.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();
        let token = col.sync_token().unwrap();

        let err = col
            .put("copy.ics", EVT1_COPY, &Preconditions::default(), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UidConflict { existing } if existing == "evt-1.ics"));

        assert_eq!(col.sync_token().unwrap(), token);
        assert_eq!(col.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn conditional_put() {
        let (_dir, col) = calendar();
        let out = col
            .put("evt-1.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();

        // wrong If-Match leaves state untouched
        let wrong = Preconditions {
            if_match: Some("0".repeat(64)),
            if_none_match_star: false,
        };
        assert!(matches!(
            col.put("evt-1.ics", EVT1_EDITED, &wrong, "alice").await,
            Err(StoreError::PreconditionFailed)
        ));
        assert_eq!(col.get("evt-1.ics").unwrap().0, EVT1);

        // create-only on an existing resource fails
        let create_only = Preconditions {
            if_match: None,
            if_none_match_star: true,
        };
        assert!(matches!(
            col.put("evt-1.ics", EVT1_EDITED, &create_only, "alice").await,
            Err(StoreError::PreconditionFailed)
        ));

        // correct If-Match goes through
        let right = Preconditions {
            if_match: Some(out.etag),
            if_none_match_star: false,
        };
        col.put("evt-1.ics", EVT1_EDITED, &right, "alice")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_invalid_payloads() {
        let (_dir, col) = calendar();
        assert!(matches!(
            col.put("x.ics", b"not a calendar", &Preconditions::default(), "a")
                .await,
            Err(StoreError::Invalid(_))
        ));
        assert!(matches!(
            col.put(
                "x.ics",
                b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
                &Preconditions::default(),
                "a"
            )
            .await,
            Err(StoreError::Invalid(IcalError::MissingUid))
        ));
    }

    #[tokio::test]
    async fn change_enumeration_between_tokens() {
        let (_dir, col) = calendar();
        for (name, bytes) in [("a.ics", EVT1), ("b.ics", EVT2)] {
            col.put(name, bytes, &Preconditions::default(), "alice")
                .await
                .unwrap();
        }
        let t1 = col.sync_token().unwrap();

        col.put("a.ics", EVT1_EDITED, &Preconditions::default(), "alice")
            .await
            .unwrap();
        col.delete("b.ics", &Preconditions::default(), "alice")
            .await
            .unwrap();
        let c = col
            .put(
                "c.ics",
                b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:evt-3\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
                &Preconditions::default(),
                "alice",
            )
            .await
            .unwrap();
        let t2 = col.sync_token().unwrap();

        let changes = col.iter_changes(Some(t1), t2).unwrap();
        assert_eq!(
            changes,
            vec![
                Change {
                    name: "a.ics".into(),
                    kind: ChangeKind::Modified,
                    etag: Some(col.etag("a.ics").unwrap()),
                },
                Change {
                    name: "b.ics".into(),
                    kind: ChangeKind::Deleted,
                    etag: None,
                },
                Change {
                    name: "c.ics".into(),
                    kind: ChangeKind::Added,
                    etag: Some(c.etag),
                },
            ]
        );

        // applying the delta to the snapshot at t1 yields the snapshot at t2:
        // nothing else changed
        assert_eq!(col.list().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_token_is_stale() {
        let (_dir, col) = calendar();
        col.put("a.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();
        let head = col.sync_token().unwrap();
        let bogus = ObjectId::digest("commit", b"never committed");
        assert!(matches!(
            col.iter_changes(Some(bogus), head),
            Err(StoreError::TokenStale)
        ));
    }

    #[tokio::test]
    async fn metadata_namespace_is_invisible() {
        let (_dir, col) = calendar();
        col.put("a.ics", EVT1, &Preconditions::default(), "alice")
            .await
            .unwrap();
        let names: Vec<String> = col.list().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.ics"]);

        // and it cannot be addressed as a member either
        assert!(matches!(
            col.get(".carillon"),
            Err(StoreError::NotFound) | Err(StoreError::BadName(_))
        ));
        assert!(matches!(
            col.put(".hidden", EVT2, &Preconditions::default(), "a").await,
            Err(StoreError::BadName(_))
        ));
    }

    #[tokio::test]
    async fn subscription_collections_are_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let col = Collection::create(
            dir.path().join("feed"),
            CollectionMeta::new(CollectionKind::Subscription),
            Arc::new(IndexCache::new(8)),
        )
        .unwrap();
        assert!(matches!(
            col.put("a.ics", EVT1, &Preconditions::default(), "a").await,
            Err(StoreError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn store_hierarchy() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path(), 64);

        store
            .create_collection(&["alice"], CollectionMeta::new(CollectionKind::Principal))
            .unwrap();
        store
            .create_collection(&["alice", "calendars"], CollectionMeta::new(CollectionKind::Plain))
            .unwrap();
        store
            .create_collection(
                &["alice", "calendars", "calendar"],
                CollectionMeta::new(CollectionKind::Calendar),
            )
            .unwrap();

        assert_eq!(store.children(&["alice"]).unwrap(), vec!["calendars"]);
        let col = store
            .open_collection(&["alice", "calendars", "calendar"])
            .unwrap()
            .unwrap();
        assert_eq!(col.kind(), CollectionKind::Calendar);

        // same Arc for the same path: the write lock is shared
        let again = store
            .open_collection(&["alice", "calendars", "calendar"])
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&col, &again));

        store.delete_collection(&["alice"]).unwrap();
        assert!(store
            .open_collection(&["alice", "calendars", "calendar"])
            .unwrap()
            .is_none());
    }
}

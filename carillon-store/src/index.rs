//! Process-global index cache, keyed by tree identity.
//!
//! A tree id names an immutable collection state, so an index computed
//! for it never goes stale; after a write the new tree simply hashes to a
//! new key and the old entry ages out of the LRU.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use carillon_ical::index::{extract, IndexKey, IndexValues};
use carillon_ical::parser;
use carillon_ical::validate::ItemKind;
use lru::LruCache;

use crate::objdb::{ObjectDb, ObjectId};
use crate::StoreError;

type CollectionIndex = HashMap<String, IndexValues>;

pub struct IndexCache {
    inner: Mutex<LruCache<(ObjectId, u64), Arc<CollectionIndex>>>,
}

impl IndexCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Values of `keys` for every member of the tree. Members that fail
    /// to parse get an empty value map, which the three-valued check
    /// reads as "unknown": the caller then falls back to the full body.
    pub fn get_index(
        &self,
        db: &dyn ObjectDb,
        tree_id: ObjectId,
        kind: ItemKind,
        keys: &[IndexKey],
    ) -> Result<Arc<CollectionIndex>, StoreError> {
        let cache_key = (tree_id, fingerprint(keys));
        if let Some(hit) = self.inner.lock().unwrap().get(&cache_key) {
            return Ok(hit.clone());
        }

        let tree = db.read_tree(tree_id)?;
        let mut computed = CollectionIndex::with_capacity(tree.entries.len());
        for entry in tree.entries.iter() {
            let raw = db.read_blob(entry.blob)?;
            let values = match std::str::from_utf8(&raw).ok().and_then(|text| match kind {
                ItemKind::Calendar => parser::parse_calendar(text).ok(),
                ItemKind::Addressbook => parser::parse_vcard(text).ok(),
            }) {
                Some(parsed) => extract(&parsed, keys),
                None => {
                    tracing::warn!(name = %entry.name, "unparseable member while indexing");
                    IndexValues::new()
                }
            };
            computed.insert(entry.name.clone(), values);
        }

        let shared = Arc::new(computed);
        self.inner
            .lock()
            .unwrap()
            .put(cache_key, shared.clone());
        Ok(shared)
    }

    /// The UID → member-name mapping of a tree, used to enforce UID
    /// injectivity on writes.
    pub fn uid_map(
        &self,
        db: &dyn ObjectDb,
        tree_id: ObjectId,
        kind: ItemKind,
    ) -> Result<HashMap<String, String>, StoreError> {
        let keys = carillon_ical::index::uid_keys(kind);
        let index = self.get_index(db, tree_id, kind, &keys)?;

        let mut out = HashMap::with_capacity(index.len());
        for (name, values) in index.iter() {
            if let Some(uid) = values.values().flatten().next() {
                out.insert(parser::unescape(uid), name.clone());
            }
        }
        Ok(out)
    }
}

fn fingerprint(keys: &[IndexKey]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for key in keys {
        key.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objdb::{FsDb, Tree};

    #[test]
    fn cache_hits_by_tree_identity() {
        let dir = tempfile::tempdir().unwrap();
        let db = FsDb::open(dir.path()).unwrap();

        let blob = db
            .put_blob(b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240115T120000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n")
            .unwrap();
        let mut tree = Tree::default();
        tree.insert("a.ics".into(), blob);
        let tree_id = db.put_tree(&tree).unwrap();

        let cache = IndexCache::new(8);
        let keys = vec!["C=VCALENDAR/C=VEVENT/P=DTSTART".to_string()];
        let first = cache
            .get_index(&db, tree_id, ItemKind::Calendar, &keys)
            .unwrap();
        let second = cache
            .get_index(&db, tree_id, ItemKind::Calendar, &keys)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            first["a.ics"]["C=VCALENDAR/C=VEVENT/P=DTSTART"],
            vec!["20240115T120000Z".to_string()]
        );
    }

    #[test]
    fn uid_map_reads_all_component_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let db = FsDb::open(dir.path()).unwrap();

        let evt = db
            .put_blob(b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n")
            .unwrap();
        let todo = db
            .put_blob(b"BEGIN:VCALENDAR\r\nBEGIN:VTODO\r\nUID:todo-1\r\nEND:VTODO\r\nEND:VCALENDAR\r\n")
            .unwrap();
        let mut tree = Tree::default();
        tree.insert("evt-1.ics".into(), evt);
        tree.insert("todo-1.ics".into(), todo);
        let tree_id = db.put_tree(&tree).unwrap();

        let cache = IndexCache::new(8);
        let uids = cache.uid_map(&db, tree_id, ItemKind::Calendar).unwrap();
        assert_eq!(uids.get("evt-1").map(String::as_str), Some("evt-1.ics"));
        assert_eq!(uids.get("todo-1").map(String::as_str), Some("todo-1.ics"));
    }
}

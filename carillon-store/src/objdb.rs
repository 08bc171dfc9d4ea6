//! The object database capability: content-addressed, immutable blobs,
//! trees and commits, plus a single mutable HEAD reference per database.
//!
//! Identity is the SHA-256 of the encoded object, prefixed with the
//! object kind so a blob can never collide with a tree of the same
//! bytes. Trees and commits are encoded with MessagePack, which is
//! deterministic for a given value.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::StoreError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    pub fn digest(kind: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(payload);
        ObjectId(hasher.finalize().into())
    }

    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(raw: &str) -> Option<Self> {
        let bytes = hex::decode(raw.trim()).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(ObjectId(arr))
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.hex())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex())
    }
}

/// One named member of a collection state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub blob: ObjectId,
}

/// A full collection state: entries sorted by name so that equal states
/// hash equally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn insert(&mut self, name: String, blob: ObjectId) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.blob = blob,
            None => {
                self.entries.push(TreeEntry { name, blob });
                self.entries.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    pub fn as_map(&self) -> HashMap<String, ObjectId> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.blob))
            .collect()
    }
}

/// One step of the linear per-collection history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: ObjectId,
    pub parent: Option<ObjectId>,
    pub author: String,
    pub message: String,
    pub timestamp: i64,
}

/// What the collection store consumes. Implementations must be
/// content-addressed and immutable apart from HEAD.
pub trait ObjectDb: Send + Sync {
    fn put_blob(&self, bytes: &[u8]) -> Result<ObjectId, StoreError>;
    fn read_blob(&self, id: ObjectId) -> Result<Vec<u8>, StoreError>;

    fn put_tree(&self, tree: &Tree) -> Result<ObjectId, StoreError>;
    fn read_tree(&self, id: ObjectId) -> Result<Tree, StoreError>;

    fn put_commit(&self, commit: &Commit) -> Result<ObjectId, StoreError>;
    fn read_commit(&self, id: ObjectId) -> Result<Commit, StoreError>;

    fn head(&self) -> Result<Option<ObjectId>, StoreError>;
    fn set_head(&self, id: ObjectId) -> Result<(), StoreError>;

    /// Commit history from `from`, most recent first.
    fn log(&self, from: ObjectId) -> Result<Vec<(ObjectId, Commit)>, StoreError> {
        let mut out = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let commit = self.read_commit(id)?;
            cursor = commit.parent;
            out.push((id, commit));
        }
        Ok(out)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    rmp_serde::to_vec(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, StoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Loose-object, file-backed database: one database per collection under
/// its reserved metadata directory.
///
/// ```text
/// <collection>/.carillon/objects/ab/cdef....   (immutable objects)
/// <collection>/.carillon/HEAD                  (hex commit id)
/// ```
pub struct FsDb {
    root: PathBuf,
    // serialises HEAD updates; object writes are idempotent by identity
    head_lock: Mutex<()>,
}

impl FsDb {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("objects"))?;
        Ok(Self {
            root,
            head_lock: Mutex::new(()),
        })
    }

    fn object_path(&self, id: ObjectId) -> PathBuf {
        let hex = id.hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    fn write_object(&self, id: ObjectId, payload: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(id);
        if path.exists() {
            // content-addressed: identical id means identical bytes
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.root.join(format!("tmp-{}", id.hex()));
        {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(payload)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read_object(&self, id: ObjectId) -> Result<Vec<u8>, StoreError> {
        match std::fs::read(self.object_path(id)) {
            Ok(v) => Ok(v),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

impl ObjectDb for FsDb {
    fn put_blob(&self, bytes: &[u8]) -> Result<ObjectId, StoreError> {
        let id = ObjectId::digest("blob", bytes);
        self.write_object(id, bytes)?;
        Ok(id)
    }

    fn read_blob(&self, id: ObjectId) -> Result<Vec<u8>, StoreError> {
        self.read_object(id)
    }

    fn put_tree(&self, tree: &Tree) -> Result<ObjectId, StoreError> {
        let payload = encode(tree)?;
        let id = ObjectId::digest("tree", &payload);
        self.write_object(id, &payload)?;
        Ok(id)
    }

    fn read_tree(&self, id: ObjectId) -> Result<Tree, StoreError> {
        decode(&self.read_object(id)?)
    }

    fn put_commit(&self, commit: &Commit) -> Result<ObjectId, StoreError> {
        let payload = encode(commit)?;
        let id = ObjectId::digest("commit", &payload);
        self.write_object(id, &payload)?;
        Ok(id)
    }

    fn read_commit(&self, id: ObjectId) -> Result<Commit, StoreError> {
        decode(&self.read_object(id)?)
    }

    fn head(&self) -> Result<Option<ObjectId>, StoreError> {
        match std::fs::read_to_string(self.root.join("HEAD")) {
            Ok(raw) => Ok(ObjectId::from_hex(&raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_head(&self, id: ObjectId) -> Result<(), StoreError> {
        let _guard = self.head_lock.lock().unwrap();
        let tmp = self.root.join("HEAD.tmp");
        std::fs::write(&tmp, id.hex())?;
        std::fs::rename(&tmp, self.root.join("HEAD"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> (tempfile::TempDir, FsDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = FsDb::open(dir.path().join(".carillon")).unwrap();
        (dir, db)
    }

    #[test]
    fn blob_identity_is_stable() {
        let (_dir, db) = db();
        let a = db.put_blob(b"BEGIN:VCALENDAR").unwrap();
        let b = db.put_blob(b"BEGIN:VCALENDAR").unwrap();
        assert_eq!(a, b);
        assert_eq!(db.read_blob(a).unwrap(), b"BEGIN:VCALENDAR");
    }

    #[test]
    fn blob_and_tree_never_collide() {
        let (_dir, db) = db();
        let blob = db.put_blob(b"x").unwrap();
        let tree = db.put_tree(&Tree::default()).unwrap();
        assert_ne!(blob, tree);
    }

    #[test]
    fn equal_trees_hash_equal() {
        let (_dir, db) = db();
        let blob = db.put_blob(b"x").unwrap();

        let mut t1 = Tree::default();
        t1.insert("b.ics".into(), blob);
        t1.insert("a.ics".into(), blob);
        let mut t2 = Tree::default();
        t2.insert("a.ics".into(), blob);
        t2.insert("b.ics".into(), blob);

        assert_eq!(db.put_tree(&t1).unwrap(), db.put_tree(&t2).unwrap());
    }

    #[test]
    fn commit_log_walks_parents() {
        let (_dir, db) = db();
        let tree = db.put_tree(&Tree::default()).unwrap();
        let c1 = db
            .put_commit(&Commit {
                tree,
                parent: None,
                author: "alice".into(),
                message: "init".into(),
                timestamp: 1,
            })
            .unwrap();
        let c2 = db
            .put_commit(&Commit {
                tree,
                parent: Some(c1),
                author: "alice".into(),
                message: "noop".into(),
                timestamp: 2,
            })
            .unwrap();
        db.set_head(c2).unwrap();

        let log = db.log(c2).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, c2);
        assert_eq!(log[1].0, c1);
        assert_eq!(db.head().unwrap(), Some(c2));
    }

    #[test]
    fn hex_roundtrip() {
        let id = ObjectId::digest("blob", b"hello");
        assert_eq!(ObjectId::from_hex(&id.hex()), Some(id));
        assert_eq!(ObjectId::from_hex("zz"), None);
    }
}

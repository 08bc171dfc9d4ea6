pub mod collection;
pub mod index;
pub mod meta;
pub mod objdb;

pub use collection::{Change, ChangeKind, Collection, Preconditions, PutOutcome, Store};
pub use index::IndexCache;
pub use meta::{CollectionKind, CollectionMeta};
pub use objdb::{Commit, FsDb, ObjectDb, ObjectId, Tree, TreeEntry};

/// Store failures, mapped by the protocol layer onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("invalid payload: {0}")]
    Invalid(#[from] carillon_ical::IcalError),
    #[error("uid already claimed by {existing}")]
    UidConflict { existing: String },
    #[error("collection is read-only")]
    Forbidden,
    #[error("unknown or pruned sync token")]
    TokenStale,
    #[error("invalid member name {0:?}")]
    BadName(String),
    #[error("collection already exists")]
    AlreadyExists,
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    #[error("corrupt object store: {0}")]
    Corrupt(String),
}

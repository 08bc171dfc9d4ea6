pub mod dates;
pub mod freebusy;
pub mod index;
pub mod parser;
pub mod query;
pub mod recur;
pub mod validate;

#[derive(Debug, thiserror::Error)]
pub enum IcalError {
    #[error("syntax error on line {0}: {1}")]
    Syntax(usize, String),
    #[error("unterminated component {0}")]
    UnterminatedComponent(String),
    #[error("mismatched END: expected {expected}, got {got}")]
    MismatchedEnd { expected: String, got: String },
    #[error("expected a {0} object")]
    WrongObjectKind(&'static str),
    #[error("missing UID")]
    MissingUid,
    #[error("conflicting UIDs in a single object: {0} and {1}")]
    InconsistentUid(String, String),
    #[error("conflicting component kinds in a single object: {0} and {1}")]
    MixedComponentKinds(String, String),
    #[error("empty object")]
    Empty,
    #[error("component {0} not accepted by this collection")]
    UnsupportedComponent(String),
}

// utils
pub mod error;
pub mod xml;

// webdav
pub mod decoder;
pub mod encoder;
pub mod types;

// calendar (rfc4791 + rfc6638 discovery properties)
pub mod caldecoder;
pub mod calencoder;
pub mod caltypes;

// contacts (rfc6352)
pub mod carddecoder;
pub mod cardencoder;
pub mod cardtypes;

// acl subset (rfc3744 + rfc5397)
pub mod acldecoder;
pub mod aclencoder;
pub mod acltypes;

// report plumbing (rfc3253 subset)
pub mod versioningdecoder;
pub mod versioningencoder;
pub mod versioningtypes;

// sync (rfc6578)
pub mod syncdecoder;
pub mod syncencoder;
pub mod synctypes;

// de-facto namespaces (calendarserver ctag, apple color/order)
pub mod cs;

// final type
pub mod realization;

//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Field names are snake_case.

pub mod ballot;
pub mod comment;
pub mod option;
pub mod poll;
pub mod user;

//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//!
//! Each entity comes as a `*Core` (no ID, used for insertion) and a full
//! type carrying its `_id`, which derefs to the core.

pub mod admin;
pub mod candidate;
pub mod party;
pub mod position;
pub mod settings;
pub mod vote;
pub mod voter;

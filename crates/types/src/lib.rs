//! Shared data model for the survey intake pipeline.
//!
//! Records travel through three shapes:
//!
//! - [`RawRecord`]: the field set of one remote list item, keyed by whatever
//!   identifiers the remote service uses (possibly encoded).
//! - [`CanonicalRow`]: the same record after field names are decoded and the
//!   expected columns are guaranteed to exist.
//! - [`Dataset`]: an immutable, ordered snapshot of canonical rows.
//!
//! Resolution of human-readable site/list names produces a
//! [`ResourceHandle`]; the full set of parameters that identifies a snapshot is
//! a [`ResourceKey`].

pub mod columns;
mod dataset;
mod resource;

pub use dataset::{CanonicalRow, Dataset, RawRecord};
pub use resource::{ResourceHandle, ResourceKey};

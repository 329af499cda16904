//! Foundation types for Keepsake.
//!
//! This crate provides the addressing and mode types shared by every other
//! Keepsake crate. It has no logic beyond value semantics.
//!
//! # Key Types
//!
//! - [`Location`] -- Two-part address (chunk id, object id) of one record
//! - [`SaveMode`] -- Which side effects a load/save performs
//! - [`chunk`] -- Well-known chunk identifiers, including the unassigned sentinel

pub mod chunk;
pub mod location;
pub mod mode;

pub use chunk::{ASSETS_CHUNK, DEFAULT_CHUNK, PREFABS_CHUNK, UNASSIGNED_CHUNK};
pub use location::Location;
pub use mode::SaveMode;

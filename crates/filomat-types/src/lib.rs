//! Foundation types for Filomat.
//!
//! This crate provides the records shared by every other Filomat crate: the
//! canonical [`Item`] (a filament spool), the [`Container`] that holds items,
//! and the [`FilamentMetadata`] descriptor carried on NFC tags.
//!
//! # Key Types
//!
//! - [`ItemId`] / [`ContainerId`]: opaque stable identifiers (UUID v7 for
//!   user-created records, fixed strings for the standard containers)
//! - [`Item`]: canonical item record
//! - [`Container`]: container record with a derived item view
//! - [`FilamentMetadata`]: the tag payload schema
//! - [`Timestamp`]: creation time in epoch milliseconds

pub mod container;
pub mod error;
pub mod identity;
pub mod item;
pub mod metadata;
pub mod temporal;

pub use container::{Container, StandardContainer};
pub use error::TypeError;
pub use identity::{ContainerId, ItemId};
pub use item::{Item, ENTERED_ITEM_NAME, SCANNED_ITEM_NAME};
pub use metadata::{FilamentMetadata, DEFAULT_PROTOCOL, DEFAULT_VERSION};
pub use temporal::Timestamp;

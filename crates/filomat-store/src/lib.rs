//! Persistent inventory store for Filomat.
//!
//! Keeps two representations of the same item facts consistent: the
//! canonical item collection, and a cached copy of each container's items
//! inside the container record. The cache exists for layout compatibility
//! only. Canonical items are the single writable copy and every container
//! view is rebuilt from them on read and before each commit.
//!
//! # Storage Backends
//!
//! All backends implement the [`KvArea`] trait:
//!
//! - [`InMemoryArea`] -- `BTreeMap`-based area for tests and embedding
//! - [`FileArea`] -- one checksummed JSON document, replaced atomically
//!
//! # Design Rules
//!
//! 1. One logical writer; each operation is a single atomic commit.
//! 2. Readers see either the state before a commit or after it, never between.
//! 3. Corrupt persisted data degrades to empty collections plus a diagnostic.
//! 4. Standard containers are seeded once and can never be deleted.

pub mod error;
pub mod file;
pub mod invariants;
pub mod memory;
pub mod state;
pub mod store;
pub mod traits;

pub use error::{Diagnostic, EntityKind, StoreError, StoreResult};
pub use file::FileArea;
pub use invariants::Violation;
pub use memory::InMemoryArea;
pub use state::InventoryState;
pub use store::{ContainerRemoval, InventoryStore, ItemInsert, KEY_CONTAINERS, KEY_ITEMS, KEY_SEEDED};
pub use traits::KvArea;

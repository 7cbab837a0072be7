use std::path::Path;
use std::sync::RwLock;

use filomat_types::{Container, ContainerId, Item, ItemId, StandardContainer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Diagnostic, EntityKind, StoreError, StoreResult};
use crate::file::FileArea;
use crate::invariants::{self, Violation};
use crate::memory::InMemoryArea;
use crate::state::InventoryState;
use crate::traits::KvArea;

/// Key of the container collection.
pub const KEY_CONTAINERS: &str = "containers";
/// Key of the canonical item collection.
pub const KEY_ITEMS: &str = "items";
/// Set to `"true"` once the standard containers have been seeded.
pub const KEY_SEEDED: &str = "standard_containers_initialized";

/// Outcome of [`InventoryStore::add_item`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemInsert {
    Created(Item),
    /// Another item is already bound to the same tag; nothing was inserted.
    AlreadyBound(Item),
}

impl ItemInsert {
    /// The stored item, new or pre-existing.
    pub fn item(&self) -> &Item {
        match self {
            Self::Created(item) | Self::AlreadyBound(item) => item,
        }
    }

    pub fn into_item(self) -> Item {
        match self {
            Self::Created(item) | Self::AlreadyBound(item) => item,
        }
    }
}

/// Outcome of [`InventoryStore::remove_container`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerRemoval {
    /// The container was deleted. `reassigned` lists the items moved to
    /// Loose.
    Removed { reassigned: Vec<ItemId> },
    /// Standard containers cannot be deleted; nothing changed.
    Protected,
}

enum Change<T> {
    Commit(T),
    Skip(T),
}

/// The inventory: canonical items plus containers with reconciled views.
///
/// There is one logical writer. Every mutation holds the write lock while it
/// computes the next state from a copy, persists it, and publishes it. Readers
/// clone the published state under the read lock and never see a
/// half-applied change.
pub struct InventoryStore {
    area: Box<dyn KvArea>,
    state: RwLock<InventoryState>,
    diagnostics: Vec<Diagnostic>,
}

impl InventoryStore {
    /// Load the inventory from `area`, seeding the standard containers on
    /// first use.
    pub fn open(area: impl KvArea + 'static) -> StoreResult<Self> {
        let area: Box<dyn KvArea> = Box::new(area);
        let mut diagnostics = area.diagnostics();

        let containers: Vec<Container> = load_collection(area.as_ref(), KEY_CONTAINERS, &mut diagnostics)?;
        let items: Vec<Item> = load_collection(area.as_ref(), KEY_ITEMS, &mut diagnostics)?;
        let mut state = InventoryState { containers, items };

        let seeded = area.get(KEY_SEEDED)?.as_deref() == Some("true");
        // Anything but a bad item collection may have taken the standard
        // containers with it.
        let containers_lost = diagnostics.iter().any(|d| d.location != KEY_ITEMS);
        let needs_seed = !seeded || containers_lost;

        let mut seeded_now = false;
        if needs_seed {
            for which in StandardContainer::ALL {
                if state.container(&which.id()).is_none() {
                    state.containers.push(which.to_container());
                    seeded_now = true;
                }
            }
        }
        state.reconcile();

        let store = Self {
            area,
            state: RwLock::new(state),
            diagnostics,
        };
        if needs_seed {
            let snapshot = store.state.read().expect("lock poisoned").clone();
            store.persist(&snapshot, true)?;
            if seeded_now {
                info!("seeded standard containers");
            }
        }
        Ok(store)
    }

    /// Open a store persisted in a single file.
    pub fn open_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(FileArea::open(path)?)
    }

    /// A fresh, non-persistent store.
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(InMemoryArea::new())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Both collections from one consistent read, with views rebuilt.
    pub fn snapshot(&self) -> InventoryState {
        self.state.read().expect("lock poisoned").reconciled()
    }

    pub fn containers(&self) -> Vec<Container> {
        self.snapshot().containers
    }

    pub fn items(&self) -> Vec<Item> {
        self.state.read().expect("lock poisoned").items.clone()
    }

    pub fn container(&self, id: &ContainerId) -> Option<Container> {
        self.snapshot().container(id).cloned()
    }

    pub fn item(&self, id: &ItemId) -> Option<Item> {
        self.state.read().expect("lock poisoned").item(id).cloned()
    }

    /// Canonical items assigned to `container`.
    pub fn items_of(&self, container: &ContainerId) -> Vec<Item> {
        self.state.read().expect("lock poisoned").items_of(container)
    }

    /// Items not assigned to any container.
    pub fn loose_items(&self) -> Vec<Item> {
        self.state
            .read()
            .expect("lock poisoned")
            .items
            .iter()
            .filter(|i| i.container_id.is_none())
            .cloned()
            .collect()
    }

    pub fn find_container_by_tag(&self, tag: &str) -> Option<Container> {
        let state = self.snapshot();
        state.container_by_tag(tag).cloned()
    }

    pub fn find_item_by_tag(&self, tag: &str) -> Option<Item> {
        self.state.read().expect("lock poisoned").item_by_tag(tag).cloned()
    }

    /// Consistency violations in the stored state.
    pub fn check_invariants(&self) -> Vec<Violation> {
        invariants::check(&self.state.read().expect("lock poisoned"))
    }

    /// Corrupt data discarded while loading.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    /// Append a container. Its view is derived from the canonical items; any
    /// supplied `items` are ignored. Only the standard ids can carry the
    /// standard flag.
    pub fn add_container(&self, mut container: Container) -> StoreResult<()> {
        self.transact("add_container", |state| {
            if state.container(&container.id).is_some() {
                return Err(StoreError::AlreadyExists {
                    kind: EntityKind::Container,
                    id: container.id.to_string(),
                });
            }
            let standard = StandardContainer::from_id(&container.id).is_some();
            if container.is_standard && !standard {
                debug!(container = %container.id, "clearing standard flag");
            }
            container.is_standard = standard;
            container.items.clear();
            state.containers.push(container);
            Ok(Change::Commit(()))
        })
    }

    /// Replace a container's fields. The stored standard flag and the
    /// derived view are kept.
    pub fn update_container(&self, container: Container) -> StoreResult<()> {
        self.transact("update_container", |state| {
            let stored = state
                .container_mut(&container.id)
                .ok_or_else(|| StoreError::container_not_found(&container.id))?;
            let is_standard = stored.is_standard;
            let view = std::mem::take(&mut stored.items);
            *stored = Container {
                is_standard,
                items: view,
                ..container
            };
            Ok(Change::Commit(()))
        })
    }

    /// Delete a non-standard container, reassigning its items to Loose.
    pub fn remove_container(&self, id: &ContainerId) -> StoreResult<ContainerRemoval> {
        self.transact("remove_container", |state| {
            let target = state
                .container(id)
                .ok_or_else(|| StoreError::container_not_found(id))?;
            if target.is_standard {
                warn!(container = %id, "refusing to delete standard container");
                return Ok(Change::Skip(ContainerRemoval::Protected));
            }

            let loose_id = StandardContainer::Loose.id();
            let loose_exists = state.container(&loose_id).is_some();
            let new_home = loose_exists.then(|| loose_id.clone());
            if !loose_exists {
                warn!(container = %id, "Loose container missing; items become unassigned");
            }

            let mut reassigned = Vec::new();
            for item in state.items.iter_mut() {
                if item.container_id.as_ref() == Some(id) {
                    item.container_id = new_home.clone();
                    reassigned.push(item.id.clone());
                }
            }

            let index = state
                .containers
                .iter()
                .position(|c| &c.id == id)
                .ok_or_else(|| StoreError::container_not_found(id))?;
            let removed = state.containers.remove(index);

            if let Some(loose) = state.container_mut(&loose_id) {
                for mut stub in removed.items {
                    if loose.contains(&stub.id) {
                        continue;
                    }
                    stub.container_id = Some(loose_id.clone());
                    loose.items.push(stub);
                }
            }

            Ok(Change::Commit(ContainerRemoval::Removed { reassigned }))
        })
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Insert an item unless another item is already bound to the same
    /// non-blank tag.
    pub fn add_item(&self, item: Item) -> StoreResult<ItemInsert> {
        self.transact("add_item", |state| {
            if let Some(existing) = state.item_by_tag(&item.tag_id) {
                debug!(tag = %item.tag_id, item = %existing.id, "tag already bound");
                return Ok(Change::Skip(ItemInsert::AlreadyBound(existing.clone())));
            }
            if state.item(&item.id).is_some() {
                return Err(StoreError::AlreadyExists {
                    kind: EntityKind::Item,
                    id: item.id.to_string(),
                });
            }
            if let Some(container) = &item.container_id {
                if state.container(container).is_none() {
                    return Err(StoreError::container_not_found(container));
                }
            }

            state.items.push(item.clone());
            if let Some(container) = &item.container_id {
                let cached = state
                    .container(container)
                    .is_some_and(|c| c.contains(&item.id));
                if !cached {
                    state.cache_in(container, item.clone());
                }
            }
            Ok(Change::Commit(ItemInsert::Created(item)))
        })
    }

    /// Replace an item's fields. The stored container assignment is kept;
    /// use the move operations to change it.
    pub fn update_item(&self, item: Item) -> StoreResult<Item> {
        self.transact("update_item", |state| {
            let stored = state
                .item_mut(&item.id)
                .ok_or_else(|| StoreError::item_not_found(&item.id))?;
            let container_id = stored.container_id.clone();
            *stored = Item {
                container_id,
                ..item
            };
            let fresh = stored.clone();

            for container in state.containers.iter_mut() {
                for cached in container.items.iter_mut() {
                    if cached.id == fresh.id {
                        *cached = fresh.clone();
                    }
                }
            }
            Ok(Change::Commit(fresh))
        })
    }

    /// Delete an item and every cached copy of it.
    pub fn remove_item(&self, id: &ItemId) -> StoreResult<Item> {
        self.transact("remove_item", |state| {
            let index = state
                .items
                .iter()
                .position(|i| &i.id == id)
                .ok_or_else(|| StoreError::item_not_found(id))?;
            let removed = state.items.remove(index);
            state.uncache_everywhere(id);
            Ok(Change::Commit(removed))
        })
    }

    /// Assign an item to a container, removing it from any other view.
    pub fn add_item_to_container(&self, item_id: &ItemId, container_id: &ContainerId) -> StoreResult<Item> {
        self.transact("add_item_to_container", |state| {
            if state.container(container_id).is_none() {
                return Err(StoreError::container_not_found(container_id));
            }
            let item = state
                .item_mut(item_id)
                .ok_or_else(|| StoreError::item_not_found(item_id))?;
            item.container_id = Some(container_id.clone());
            let canonical = item.clone();

            state.cache_in(container_id, canonical.clone());
            for container in state.containers.iter_mut() {
                if &container.id != container_id {
                    container.items.retain(|i| &i.id != item_id);
                }
            }
            Ok(Change::Commit(canonical))
        })
    }

    /// Move an item out of `from` (every container when `None` or unknown)
    /// and into `to`, in one commit.
    pub fn move_item_to_container(
        &self,
        item_id: &ItemId,
        from: Option<&ContainerId>,
        to: &ContainerId,
    ) -> StoreResult<Item> {
        self.transact("move_item_to_container", |state| {
            if state.container(to).is_none() {
                return Err(StoreError::container_not_found(to));
            }
            let item = state
                .item_mut(item_id)
                .ok_or_else(|| StoreError::item_not_found(item_id))?;
            item.container_id = Some(to.clone());
            let canonical = item.clone();

            match from.and_then(|f| state.container_mut(f)) {
                Some(source) => source.items.retain(|i| &i.id != item_id),
                None => state.uncache_everywhere(item_id),
            }
            state.cache_in(to, canonical.clone());
            Ok(Change::Commit(canonical))
        })
    }

    /// Unassign an item and drop it from `container_id`'s view.
    pub fn remove_item_from_container(
        &self,
        item_id: &ItemId,
        container_id: &ContainerId,
    ) -> StoreResult<Item> {
        self.transact("remove_item_from_container", |state| {
            let container = state
                .container_mut(container_id)
                .ok_or_else(|| StoreError::container_not_found(container_id))?;
            container.items.retain(|i| &i.id != item_id);

            let item = state
                .item_mut(item_id)
                .ok_or_else(|| StoreError::item_not_found(item_id))?;
            item.container_id = None;
            Ok(Change::Commit(item.clone()))
        })
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    fn transact<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut InventoryState) -> StoreResult<Change<T>>,
    ) -> StoreResult<T> {
        let mut published = self.state.write().expect("lock poisoned");
        let mut next = published.clone();
        match f(&mut next)? {
            Change::Skip(out) => {
                debug!(op, "no change");
                Ok(out)
            }
            Change::Commit(out) => {
                next.reconcile();
                self.persist(&next, false)?;
                *published = next;
                debug!(op, "committed");
                Ok(out)
            }
        }
    }

    fn persist(&self, state: &InventoryState, mark_seeded: bool) -> StoreResult<()> {
        let mut batch = vec![
            (KEY_CONTAINERS.to_string(), to_json(&state.containers)?),
            (KEY_ITEMS.to_string(), to_json(&state.items)?),
        ];
        if mark_seeded {
            batch.push((KEY_SEEDED.to_string(), "true".to_string()));
        }
        self.area.put_batch(batch)
    }
}

impl std::fmt::Debug for InventoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("InventoryStore")
            .field("containers", &state.containers.len())
            .field("items", &state.items.len())
            .finish()
    }
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn load_collection<T: DeserializeOwned>(
    area: &dyn KvArea,
    key: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> StoreResult<Vec<T>> {
    let Some(raw) = area.get(key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(values) => Ok(values),
        Err(e) => {
            warn!(key, error = %e, "discarding malformed collection");
            diagnostics.push(Diagnostic::malformed(key, e.to_string()));
            Ok(Vec::new())
        }
    }
}

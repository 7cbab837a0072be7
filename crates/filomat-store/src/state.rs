//! In-memory inventory state and container view reconciliation.

use std::collections::{HashMap, HashSet};

use filomat_types::{Container, ContainerId, Item, ItemId};

/// Both collections, as read in one consistent step.
///
/// `items` is the canonical collection. Each container's `items` is a cached
/// view that [`InventoryState::reconcile`] rebuilds from it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InventoryState {
    pub containers: Vec<Container>,
    pub items: Vec<Item>,
}

impl InventoryState {
    pub fn container(&self, id: &ContainerId) -> Option<&Container> {
        self.containers.iter().find(|c| &c.id == id)
    }

    pub fn container_mut(&mut self, id: &ContainerId) -> Option<&mut Container> {
        self.containers.iter_mut().find(|c| &c.id == id)
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn item_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| &i.id == id)
    }

    /// First item bound to `tag`. Blank tags never match.
    pub fn item_by_tag(&self, tag: &str) -> Option<&Item> {
        if tag.trim().is_empty() {
            return None;
        }
        self.items.iter().find(|i| i.tag_id == tag)
    }

    /// First container bound to `tag`. Blank tags never match.
    pub fn container_by_tag(&self, tag: &str) -> Option<&Container> {
        if tag.trim().is_empty() {
            return None;
        }
        self.containers.iter().find(|c| c.tag_id == tag)
    }

    /// Canonical items assigned to `container`, in canonical order.
    pub fn items_of(&self, container: &ContainerId) -> Vec<Item> {
        self.items
            .iter()
            .filter(|i| i.container_id.as_ref() == Some(container))
            .cloned()
            .collect()
    }

    /// Drop every cached copy of `item` from every container.
    pub(crate) fn uncache_everywhere(&mut self, item: &ItemId) {
        for container in &mut self.containers {
            container.items.retain(|i| &i.id != item);
        }
    }

    /// Replace any cached copy of `item` in `container` by appending a fresh
    /// copy at the end.
    pub(crate) fn cache_in(&mut self, container: &ContainerId, item: Item) {
        if let Some(c) = self.container_mut(container) {
            c.items.retain(|i| i.id != item.id);
            c.items.push(item);
        }
    }

    /// Rebuild every container view from the canonical items.
    ///
    /// For each container, in cached order:
    /// - a stub whose canonical item names this container is replaced by the
    ///   canonical copy;
    /// - a stub whose canonical item names another container (or none) is
    ///   dropped;
    /// - a stub with no canonical item is kept as is;
    /// - repeated stubs collapse to the first occurrence.
    ///
    /// Canonical items assigned to the container but missing from the view
    /// are then appended in canonical order.
    pub fn reconcile(&mut self) {
        let canonical: HashMap<&ItemId, &Item> = self.items.iter().map(|i| (&i.id, i)).collect();

        for container in &mut self.containers {
            let mut seen: HashSet<ItemId> = HashSet::new();
            let mut view = Vec::with_capacity(container.items.len());

            for stub in container.items.drain(..) {
                if !seen.insert(stub.id.clone()) {
                    continue;
                }
                match canonical.get(&stub.id) {
                    Some(item) if item.container_id.as_ref() == Some(&container.id) => {
                        view.push((*item).clone());
                    }
                    Some(_) => {
                        seen.remove(&stub.id);
                    }
                    None => view.push(stub),
                }
            }

            for item in &self.items {
                if item.container_id.as_ref() == Some(&container.id) && !seen.contains(&item.id) {
                    seen.insert(item.id.clone());
                    view.push(item.clone());
                }
            }

            container.items = view;
        }
    }

    /// A copy with every view rebuilt.
    pub fn reconciled(&self) -> Self {
        let mut next = self.clone();
        next.reconcile();
        next
    }
}

//! Two-step scan workflows.
//!
//! ```text
//!   Idle --arm--> AwaitingFirst --tag--> AwaitingSecond --tag--> Resolved --commit--> Idle
//!                                              |    ^
//!                                              v    | cancel
//!                                       ConfirmationPending --confirm--> Resolved
//! ```

use std::fmt;

use filomat_store::InventoryStore;
use filomat_tag::DecodedTag;
use filomat_types::{Container, ContainerId, Item};
use tracing::{debug, info};

use crate::error::{ScanError, ScanResult};

/// Which two-step workflow the session drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanMode {
    /// Scan a container, then an item to put into it.
    AddToContainer,
    /// Scan an item, then the container to take it out of.
    RemoveFromContainer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    AwaitingFirst,
    AwaitingSecond,
    /// Both tags resolved; ready to commit.
    Resolved,
    /// The item belongs to another container; waiting for the user to
    /// confirm or cancel the move.
    ConfirmationPending,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingFirst => "awaiting the first tag",
            Self::AwaitingSecond => "awaiting the second tag",
            Self::Resolved => "resolved",
            Self::ConfirmationPending => "awaiting confirmation",
        };
        f.write_str(s)
    }
}

/// A non-fatal condition; the session stays where it was.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanWarning {
    /// Add mode: the item is already in the scanned container.
    AlreadyInContainer { item: Item },
    /// Remove mode: the item is not in the scanned container.
    NotInContainer { item: Item, container: Container },
}

/// What a handled tag did to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    ContainerResolved(Container),
    /// `created` is `true` when the tag was unknown and the item was created.
    ItemResolved { item: Item, created: bool },
    /// The item is assigned to `current`; confirm or cancel the move.
    ConfirmationRequired { item: Item, current: ContainerId },
    Warning(ScanWarning),
}

/// What [`ScanSession::commit`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Added { item: Item, container: ContainerId },
    Moved { item: Item, from: ContainerId, to: ContainerId },
    Removed { item: Item, container: ContainerId },
}

/// A two-step scan workflow over an [`InventoryStore`].
#[derive(Clone, Debug)]
pub struct ScanSession {
    mode: ScanMode,
    state: ScanState,
    container: Option<Container>,
    item: Option<Item>,
}

impl ScanSession {
    pub fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            state: ScanState::Idle,
            container: None,
            item: None,
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    pub fn item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    /// Switch workflow. Always resets to `Idle`.
    pub fn set_mode(&mut self, mode: ScanMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.state = ScanState::Idle;
        self.container = None;
        self.item = None;
    }

    /// Start waiting for the first tag.
    pub fn arm(&mut self) -> ScanResult<()> {
        self.expect_state(ScanState::Idle, "arm")?;
        self.transition(ScanState::AwaitingFirst);
        Ok(())
    }

    /// Resolve a scanned tag against the store and advance.
    ///
    /// An unknown container tag is an error and leaves the state unchanged.
    /// An unknown item tag creates the item.
    pub fn handle_tag(&mut self, tag: &DecodedTag, store: &InventoryStore) -> ScanResult<ScanEvent> {
        match (self.mode, self.state) {
            (ScanMode::AddToContainer, ScanState::AwaitingFirst) => {
                let container = resolve_container(tag, store)?;
                self.container = Some(container.clone());
                self.transition(ScanState::AwaitingSecond);
                Ok(ScanEvent::ContainerResolved(container))
            }
            (ScanMode::AddToContainer, ScanState::AwaitingSecond) => {
                let target = self.held_container("handle a tag")?.id.clone();
                let (item, created) = resolve_item(tag, store)?;
                match item.container_id.clone() {
                    Some(current) if current == target => {
                        Ok(ScanEvent::Warning(ScanWarning::AlreadyInContainer { item }))
                    }
                    Some(current) => {
                        self.item = Some(item.clone());
                        self.transition(ScanState::ConfirmationPending);
                        Ok(ScanEvent::ConfirmationRequired { item, current })
                    }
                    None => {
                        self.item = Some(item.clone());
                        self.transition(ScanState::Resolved);
                        Ok(ScanEvent::ItemResolved { item, created })
                    }
                }
            }
            (ScanMode::RemoveFromContainer, ScanState::AwaitingFirst) => {
                let (item, created) = resolve_item(tag, store)?;
                self.item = Some(item.clone());
                self.transition(ScanState::AwaitingSecond);
                Ok(ScanEvent::ItemResolved { item, created })
            }
            (ScanMode::RemoveFromContainer, ScanState::AwaitingSecond) => {
                let container = resolve_container(tag, store)?;
                let held = self
                    .item
                    .as_ref()
                    .ok_or(ScanError::InvalidState {
                        action: "handle a tag",
                        state: self.state,
                    })?;
                // Re-read: the item may have moved since the first scan.
                let item = store.item(&held.id).unwrap_or_else(|| held.clone());
                if item.container_id.as_ref() != Some(&container.id) {
                    return Ok(ScanEvent::Warning(ScanWarning::NotInContainer { item, container }));
                }
                self.item = Some(item);
                self.container = Some(container.clone());
                self.transition(ScanState::Resolved);
                Ok(ScanEvent::ContainerResolved(container))
            }
            (_, state) => Err(ScanError::InvalidState {
                action: "handle a tag",
                state,
            }),
        }
    }

    /// Accept the pending cross-container move.
    pub fn confirm(&mut self) -> ScanResult<()> {
        self.expect_state(ScanState::ConfirmationPending, "confirm")?;
        self.transition(ScanState::Resolved);
        Ok(())
    }

    /// Reject the pending move and wait for another item.
    pub fn cancel(&mut self) -> ScanResult<()> {
        self.expect_state(ScanState::ConfirmationPending, "cancel")?;
        self.item = None;
        self.transition(ScanState::AwaitingSecond);
        Ok(())
    }

    /// Apply the resolved action to the store and return to `Idle`.
    ///
    /// If the store rejects the change the session stays `Resolved` with
    /// both records held, so the commit can be retried or the session reset.
    pub fn commit(&mut self, store: &InventoryStore) -> ScanResult<ScanOutcome> {
        self.expect_state(ScanState::Resolved, "commit")?;
        let Some((item, container)) = self.item.as_ref().zip(self.container.as_ref()) else {
            self.reset();
            return Err(ScanError::InvalidState {
                action: "commit",
                state: ScanState::Resolved,
            });
        };

        let outcome = match self.mode {
            ScanMode::RemoveFromContainer => {
                let item = store.remove_item_from_container(&item.id, &container.id)?;
                ScanOutcome::Removed {
                    item,
                    container: container.id.clone(),
                }
            }
            ScanMode::AddToContainer => match &item.container_id {
                Some(from) if *from != container.id => {
                    let moved = store.move_item_to_container(&item.id, Some(from), &container.id)?;
                    ScanOutcome::Moved {
                        item: moved,
                        from: from.clone(),
                        to: container.id.clone(),
                    }
                }
                _ => {
                    let item = store.add_item_to_container(&item.id, &container.id)?;
                    ScanOutcome::Added {
                        item,
                        container: container.id.clone(),
                    }
                }
            },
        };
        info!(mode = ?self.mode, "scan committed");
        self.reset();
        Ok(outcome)
    }

    fn held_container(&self, action: &'static str) -> ScanResult<&Container> {
        self.container.as_ref().ok_or(ScanError::InvalidState {
            action,
            state: self.state,
        })
    }

    fn expect_state(&self, expected: ScanState, action: &'static str) -> ScanResult<()> {
        if self.state != expected {
            return Err(ScanError::InvalidState {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: ScanState) {
        debug!(from = %self.state, to = %next, "scan state");
        self.state = next;
    }
}

fn resolve_container(tag: &DecodedTag, store: &InventoryStore) -> ScanResult<Container> {
    store
        .find_container_by_tag(&tag.identifier)
        .ok_or_else(|| ScanError::UnknownContainer {
            tag: tag.identifier.clone(),
        })
}

/// Find the item bound to the tag, creating it from the tag's metadata if
/// there is none.
fn resolve_item(tag: &DecodedTag, store: &InventoryStore) -> ScanResult<(Item, bool)> {
    if let Some(item) = store.find_item_by_tag(&tag.identifier) {
        return Ok((item, false));
    }
    let fresh = Item::from_scan(tag.identifier.clone(), tag.metadata().cloned());
    let inserted = store.add_item(fresh)?;
    let created = matches!(inserted, filomat_store::ItemInsert::Created(_));
    if created {
        info!(tag = %tag.identifier, "created item from scan");
    }
    Ok((inserted.into_item(), created))
}

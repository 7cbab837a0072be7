//! Consistency checks over a stored state.

use std::fmt;

use filomat_types::{ContainerId, ItemId, StandardContainer};

use crate::state::InventoryState;

/// One way in which the two collections disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// An assigned item is absent from its container's view.
    MissingFromView { item: ItemId, container: ContainerId },
    /// A view holds an item assigned elsewhere, or unassigned.
    StrayInView { item: ItemId, container: ContainerId },
    /// A view holds the same item more than once.
    DuplicateInView { item: ItemId, container: ContainerId },
    /// A cached copy differs from the canonical record.
    StaleCopy { item: ItemId, container: ContainerId },
    /// An item names a container that does not exist.
    DanglingContainer { item: ItemId, container: ContainerId },
    /// A standard container is missing or has lost its standard flag.
    MissingStandard(StandardContainer),
    /// A container outside the standard set carries the standard flag.
    UnexpectedStandard(ContainerId),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFromView { item, container } => {
                write!(f, "item {item} assigned to {container} but missing from its view")
            }
            Self::StrayInView { item, container } => {
                write!(f, "item {item} cached in {container} but assigned elsewhere")
            }
            Self::DuplicateInView { item, container } => {
                write!(f, "item {item} cached more than once in {container}")
            }
            Self::StaleCopy { item, container } => {
                write!(f, "cached copy of {item} in {container} is stale")
            }
            Self::DanglingContainer { item, container } => {
                write!(f, "item {item} references missing container {container}")
            }
            Self::MissingStandard(which) => {
                write!(f, "standard container {} is missing", which.id())
            }
            Self::UnexpectedStandard(container) => {
                write!(f, "container {container} is flagged standard but is not one")
            }
        }
    }
}

/// Check membership, freshness, and standard containers. Returns every
/// violation found, empty when consistent.
///
/// Cached stubs whose canonical item no longer exists are not violations;
/// they are the fallback view.
pub fn check(state: &InventoryState) -> Vec<Violation> {
    let mut violations = Vec::new();

    for which in StandardContainer::ALL {
        let present = state
            .container(&which.id())
            .is_some_and(|c| c.is_standard);
        if !present {
            violations.push(Violation::MissingStandard(which));
        }
    }
    for container in &state.containers {
        if container.is_standard && StandardContainer::from_id(&container.id).is_none() {
            violations.push(Violation::UnexpectedStandard(container.id.clone()));
        }
    }

    for item in &state.items {
        let Some(container_id) = &item.container_id else {
            continue;
        };
        match state.container(container_id) {
            None => violations.push(Violation::DanglingContainer {
                item: item.id.clone(),
                container: container_id.clone(),
            }),
            Some(c) if !c.contains(&item.id) => violations.push(Violation::MissingFromView {
                item: item.id.clone(),
                container: container_id.clone(),
            }),
            Some(_) => {}
        }
    }

    for container in &state.containers {
        let mut seen = Vec::new();
        for cached in &container.items {
            if seen.contains(&&cached.id) {
                violations.push(Violation::DuplicateInView {
                    item: cached.id.clone(),
                    container: container.id.clone(),
                });
                continue;
            }
            seen.push(&cached.id);

            let Some(canonical) = state.item(&cached.id) else {
                continue;
            };
            if canonical.container_id.as_ref() != Some(&container.id) {
                violations.push(Violation::StrayInView {
                    item: cached.id.clone(),
                    container: container.id.clone(),
                });
            } else if canonical != cached {
                violations.push(Violation::StaleCopy {
                    item: cached.id.clone(),
                    container: container.id.clone(),
                });
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use filomat_types::{Container, Item};

    fn make_seeded() -> InventoryState {
        InventoryState {
            containers: StandardContainer::ALL
                .iter()
                .map(StandardContainer::to_container)
                .collect(),
            items: vec![],
        }
    }

    fn loose() -> ContainerId {
        StandardContainer::Loose.id()
    }

    #[test]
    fn seeded_state_is_consistent() {
        assert!(check(&make_seeded()).is_empty());
    }

    #[test]
    fn missing_standard_reported() {
        let state = InventoryState::default();
        let v = check(&state);
        assert!(v.contains(&Violation::MissingStandard(StandardContainer::Printer)));
        assert!(v.contains(&Violation::MissingStandard(StandardContainer::Loose)));
    }

    #[test]
    fn extra_standard_reported() {
        let mut state = make_seeded();
        let mut fake = Container::new("FAKE", "Fake");
        fake.is_standard = true;
        let id = fake.id.clone();
        state.containers.push(fake);
        assert_eq!(check(&state), vec![Violation::UnexpectedStandard(id)]);
    }

    #[test]
    fn missing_and_stale_and_stray_reported() {
        let mut state = make_seeded();
        let item = Item::new("T1", "spool").in_container(loose());
        state.items.push(item.clone());
        assert_eq!(
            check(&state),
            vec![Violation::MissingFromView {
                item: item.id.clone(),
                container: loose()
            }]
        );

        let mut stale = item.clone();
        stale.name = "old".into();
        state.container_mut(&loose()).unwrap().items.push(stale);
        assert!(matches!(check(&state)[0], Violation::StaleCopy { .. }));

        state.container_mut(&loose()).unwrap().items[0] = item.clone();
        state
            .container_mut(&StandardContainer::Printer.id())
            .unwrap()
            .items
            .push(item.clone());
        assert!(matches!(check(&state)[0], Violation::StrayInView { .. }));

        state.reconcile();
        assert!(check(&state).is_empty());
    }

    #[test]
    fn dangling_reference_reported() {
        let mut state = make_seeded();
        let item = Item::new("T1", "spool").in_container(ContainerId::from("gone"));
        state.items.push(item);
        assert!(matches!(check(&state)[0], Violation::DanglingContainer { .. }));
    }

    #[test]
    fn orphan_stub_is_not_a_violation() {
        let mut state = make_seeded();
        let mut shelf = Container::new("S", "Shelf");
        shelf.items.push(Item::new("ghost", "ghost"));
        state.containers.push(shelf);
        assert!(check(&state).is_empty());
    }
}

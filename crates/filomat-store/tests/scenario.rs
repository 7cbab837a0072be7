//! End-to-end inventory flows against the file backend, plus randomized
//! operation sequences against the in-memory one.

use filomat_store::{
    ContainerRemoval, FileArea, InventoryStore, ItemInsert, KvArea, Violation, KEY_CONTAINERS,
    KEY_ITEMS, KEY_SEEDED,
};
use filomat_types::{Container, ContainerId, FilamentMetadata, Item, ItemId, StandardContainer};
use proptest::prelude::*;
use tempfile::TempDir;

#[test]
fn box_deletion_moves_scanned_item_to_loose() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filomat.json");

    {
        let store = InventoryStore::open_file(&path).unwrap();
        let ids: Vec<_> = store.containers().into_iter().map(|c| c.id).collect();
        assert!(ids.contains(&ContainerId::from("std_printer")));
        assert!(ids.contains(&ContainerId::from("std_loose")));

        let box1 = Container::new("BOX1", "Box1");
        let box1_id = box1.id.clone();
        store.add_container(box1).unwrap();

        // Scan of an unknown tag creates the item.
        assert!(store.find_item_by_tag("AA11").is_none());
        let meta = FilamentMetadata {
            brand: Some("Elegoo".into()),
            material: Some("PLA".into()),
            ..Default::default()
        };
        let created = store.add_item(Item::from_scan("AA11", Some(meta))).unwrap();
        let ItemInsert::Created(item) = created else {
            panic!("expected a new item");
        };
        assert_eq!(item.name, "Elegoo PLA");

        store.add_item_to_container(&item.id, &box1_id).unwrap();
        let outcome = store.remove_container(&box1_id).unwrap();
        assert!(matches!(outcome, ContainerRemoval::Removed { .. }));
    }

    // Everything above survived a reopen.
    let store = InventoryStore::open_file(&path).unwrap();
    assert!(store.diagnostics().is_empty());
    assert_eq!(store.containers().len(), 2);

    let item = store.find_item_by_tag("AA11").unwrap();
    let loose = StandardContainer::Loose.id();
    assert_eq!(item.container_id, Some(loose.clone()));
    assert!(store.container(&loose).unwrap().contains(&item.id));
    assert!(store.check_invariants().is_empty());
}

#[test]
fn reopening_does_not_reseed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filomat.json");
    let first = InventoryStore::open_file(&path).unwrap();
    let mut printer = first.container(&StandardContainer::Printer.id()).unwrap();
    printer.name = "MK4".into();
    first.update_container(printer).unwrap();
    drop(first);

    let store = InventoryStore::open_file(&path).unwrap();
    assert_eq!(store.containers().len(), 2);
    assert_eq!(
        store.container(&StandardContainer::Printer.id()).unwrap().name,
        "MK4"
    );
}

#[test]
fn corrupt_file_recovers_to_seeded_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filomat.json");
    std::fs::write(&path, "garbage").unwrap();

    let store = InventoryStore::open_file(&path).unwrap();
    assert_eq!(store.diagnostics().len(), 1);
    assert_eq!(store.containers().len(), 2);
    assert!(store.check_invariants().is_empty());
}

#[test]
fn stale_layout_is_healed_on_load() {
    // A cache that disagrees with the canonical records, as older writers
    // could leave behind.
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filomat.json");
    let loose = StandardContainer::Loose.id();

    let item = Item::new("T1", "renamed").in_container(loose.clone());
    let mut stale = item.clone();
    stale.name = "old name".into();
    let mut loose_record = StandardContainer::Loose.to_container();
    loose_record.items = vec![stale.clone(), stale];
    let printer = StandardContainer::Printer.to_container();

    let area = FileArea::open(&path).unwrap();
    area.put_batch(vec![
        (KEY_SEEDED.into(), "true".into()),
        (KEY_CONTAINERS.into(), serde_json::to_string(&vec![printer, loose_record]).unwrap()),
        (KEY_ITEMS.into(), serde_json::to_string(&vec![item.clone()]).unwrap()),
    ])
    .unwrap();

    let store = InventoryStore::open(area).unwrap();
    assert!(store.check_invariants().is_empty());
    assert_eq!(store.container(&loose).unwrap().items, vec![item]);
}

// ---------------------------------------------------------------------------
// Randomized operation sequences
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Op {
    AddItem { tag: u8, container: Option<u8> },
    AddToContainer { item: u8, container: u8 },
    Move { item: u8, from: Option<u8>, to: u8 },
    Unassign { item: u8, container: u8 },
    Update { item: u8, brand: String },
    RemoveItem { item: u8 },
    RemoveContainer { container: u8 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, proptest::option::of(0u8..5)).prop_map(|(tag, container)| Op::AddItem { tag, container }),
        (0u8..8, 0u8..5).prop_map(|(item, container)| Op::AddToContainer { item, container }),
        (0u8..8, proptest::option::of(0u8..5), 0u8..5).prop_map(|(item, from, to)| Op::Move { item, from, to }),
        (0u8..8, 0u8..5).prop_map(|(item, container)| Op::Unassign { item, container }),
        (0u8..8, "[a-z]{1,6}").prop_map(|(item, brand)| Op::Update { item, brand }),
        (0u8..8).prop_map(|item| Op::RemoveItem { item }),
        (0u8..5).prop_map(|container| Op::RemoveContainer { container }),
    ]
}

/// Two standard containers plus three boxes.
fn container_ids(store: &InventoryStore) -> Vec<ContainerId> {
    let mut ids: Vec<ContainerId> = StandardContainer::ALL.iter().map(|s| s.id()).collect();
    for name in ["A", "B", "C"] {
        let c = Container::new(format!("TAG-{name}"), name);
        ids.push(c.id.clone());
        store.add_container(c).unwrap();
    }
    ids
}

fn pick<T: Clone>(values: &[T], index: u8) -> Option<T> {
    if values.is_empty() {
        None
    } else {
        Some(values[index as usize % values.len()].clone())
    }
}

fn apply(store: &InventoryStore, containers: &[ContainerId], op: Op) {
    let items: Vec<ItemId> = store.items().into_iter().map(|i| i.id).collect();
    let container = |i: u8| containers[i as usize % containers.len()].clone();

    // Operations may fail on ids removed earlier in the sequence; the
    // invariants must hold either way.
    match op {
        Op::AddItem { tag, container: c } => {
            let mut item = Item::new(format!("TAG{tag}"), "spool");
            item.container_id = c.map(container);
            let _ = store.add_item(item);
        }
        Op::AddToContainer { item, container: c } => {
            if let Some(id) = pick(&items, item) {
                let _ = store.add_item_to_container(&id, &container(c));
            }
        }
        Op::Move { item, from, to } => {
            if let Some(id) = pick(&items, item) {
                let from = from.map(container);
                let _ = store.move_item_to_container(&id, from.as_ref(), &container(to));
            }
        }
        Op::Unassign { item, container: c } => {
            if let Some(id) = pick(&items, item) {
                let _ = store.remove_item_from_container(&id, &container(c));
            }
        }
        Op::Update { item, brand } => {
            if let Some(id) = pick(&items, item) {
                if let Some(current) = store.item(&id) {
                    let meta = FilamentMetadata {
                        brand: Some(brand),
                        ..Default::default()
                    };
                    store.update_item(current.with_metadata(meta)).unwrap();
                }
            }
        }
        Op::RemoveItem { item } => {
            if let Some(id) = pick(&items, item) {
                store.remove_item(&id).unwrap();
            }
        }
        Op::RemoveContainer { container: c } => {
            let _ = store.remove_container(&container(c));
        }
    }
}

proptest! {
    #[test]
    fn views_always_match_membership(ops in proptest::collection::vec(arb_op(), 1..40)) {
        let store = InventoryStore::in_memory().unwrap();
        let containers = container_ids(&store);

        for op in ops {
            apply(&store, &containers, op);
            let violations: Vec<Violation> = store.check_invariants();
            prop_assert!(violations.is_empty(), "{:?}", violations);
        }

        // Every item appears in at most one view, and in exactly its own.
        let snapshot = store.snapshot();
        for item in &snapshot.items {
            let holders: Vec<&ContainerId> = snapshot
                .containers
                .iter()
                .filter(|c| c.contains(&item.id))
                .map(|c| &c.id)
                .collect();
            match &item.container_id {
                Some(id) => prop_assert_eq!(holders, vec![id]),
                None => prop_assert!(holders.is_empty()),
            }
        }
    }

    #[test]
    fn tags_stay_unique(tags in proptest::collection::vec(0u8..4, 1..20)) {
        let store = InventoryStore::in_memory().unwrap();
        for tag in &tags {
            store.add_item(Item::new(format!("T{tag}"), "x")).unwrap();
        }
        let mut distinct = tags.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(store.items().len(), distinct.len());
    }
}

//! Department restructuring through the public hierarchy API.

use crm_api::hierarchy::{build_tree, HierarchyError, HierarchyManager, MemoryDepartmentStore};

#[tokio::test]
async fn reorganization_keeps_levels_and_positions_consistent() {
    let mut store = MemoryDepartmentStore::new();
    let manager = HierarchyManager::default();

    let company = manager.create(&mut store, None, None, &()).await.unwrap();
    let sales = manager.create(&mut store, Some(company.id), None, &()).await.unwrap();
    let support = manager.create(&mut store, Some(company.id), None, &()).await.unwrap();
    let inside = manager.create(&mut store, Some(sales.id), None, &()).await.unwrap();
    assert_eq!(inside.level, 2);

    // Support becomes part of Sales, placed first
    let moved = manager
        .move_node(&mut store, support.id, Some(sales.id), Some(0))
        .await
        .unwrap();
    assert_eq!((moved.level, moved.position), (2, 0));
    assert_eq!(store.get(inside.id).unwrap().position, 1);

    // Sales moves to the root; its whole subtree goes up one level
    manager.move_node(&mut store, sales.id, None, None).await.unwrap();
    assert_eq!(store.get(sales.id).unwrap().level, 0);
    assert_eq!(store.get(support.id).unwrap().level, 1);
    assert_eq!(store.get(inside.id).unwrap().level, 1);
    assert_eq!(store.get(sales.id).unwrap().position, 1);

    let forest = build_tree(store.nodes().cloned().collect());
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].item.id, company.id);
    assert!(forest[0].children.is_empty());
    let under_sales: Vec<_> = forest[1].children.iter().map(|c| c.item.id).collect();
    assert_eq!(under_sales, vec![support.id, inside.id]);
}

#[tokio::test]
async fn cannot_move_a_department_below_itself() {
    let mut store = MemoryDepartmentStore::new();
    let manager = HierarchyManager::default();

    let top = manager.create(&mut store, None, None, &()).await.unwrap();
    let mid = manager.create(&mut store, Some(top.id), None, &()).await.unwrap();
    let leaf = manager.create(&mut store, Some(mid.id), None, &()).await.unwrap();

    for target in [top.id, leaf.id] {
        let err = manager.move_node(&mut store, top.id, Some(target), None).await;
        assert!(matches!(err, Err(HierarchyError::InvalidMove(_))));
    }
    assert_eq!(store.get(top.id).unwrap().parent_id, None);
}

#[tokio::test]
async fn only_empty_leaves_can_be_removed() {
    let mut store = MemoryDepartmentStore::new();
    let manager = HierarchyManager::default();

    let parent = manager.create(&mut store, None, None, &()).await.unwrap();
    let first = manager.create(&mut store, Some(parent.id), None, &()).await.unwrap();
    let staffed = manager.create(&mut store, Some(parent.id), None, &()).await.unwrap();
    let last = manager.create(&mut store, Some(parent.id), None, &()).await.unwrap();
    let user = store.add_user();
    store.add_member(user, staffed.id);

    assert!(matches!(
        manager.remove(&mut store, parent.id).await,
        Err(HierarchyError::PreconditionFailed(_))
    ));
    assert!(matches!(
        manager.remove(&mut store, staffed.id).await,
        Err(HierarchyError::PreconditionFailed(_))
    ));

    manager.remove(&mut store, first.id).await.unwrap();
    assert!(store.get(first.id).is_none());
    assert_eq!(store.get(staffed.id).unwrap().position, 0);
    assert_eq!(store.get(last.id).unwrap().position, 1);
}

//! Board-style scenarios against the public reorder API.

use crm_api::ordering::{GapPolicy, MemoryOrderedStore, OrderingError, Reorderer};

type Cards = MemoryOrderedStore<&'static str, &'static str>;

fn two_columns() -> Cards {
    let mut cards = Cards::new("card");
    cards.add_scope("todo");
    cards.add_scope("done");
    for (i, id) in ["write", "review", "ship"].into_iter().enumerate() {
        cards.put(id, "todo", i as i32);
    }
    cards.put("plan", "done", 0);
    cards
}

fn ids(cards: &Cards, column: &'static str) -> Vec<&'static str> {
    cards.ordered(&column).into_iter().map(|(id, _)| id).collect()
}

#[tokio::test]
async fn card_moved_across_columns_leaves_both_dense() {
    let mut cards = two_columns();
    let engine = Reorderer::default();

    let slot = engine.move_across(&mut cards, &"review", &"done", 0).await.unwrap();
    assert_eq!((slot.scope, slot.position), ("done", 0));

    assert_eq!(ids(&cards, "todo"), vec!["write", "ship"]);
    assert_eq!(ids(&cards, "done"), vec!["review", "plan"]);
    assert!(cards.is_dense(&"todo"));
    assert!(cards.is_dense(&"done"));
}

#[tokio::test]
async fn create_move_delete_sequence_stays_dense() {
    let mut cards = two_columns();
    let engine = Reorderer::default();

    let reserved = engine.insert_at(&mut cards, &"todo", 1).await.unwrap();
    cards.put("test", "todo", reserved);
    engine.move_within(&mut cards, &"ship", 0).await.unwrap();
    engine.remove(&mut cards, &"write").await.unwrap();

    assert_eq!(ids(&cards, "todo"), vec!["ship", "test", "review"]);
    assert!(cards.is_dense(&"todo"));
}

#[tokio::test]
async fn append_to_other_column_without_position() {
    let mut cards = two_columns();
    let engine = Reorderer::default();

    let slot = engine.move_or_append(&mut cards, &"write", &"done", None).await.unwrap();
    assert_eq!(slot.position, 1);
    assert_eq!(ids(&cards, "done"), vec!["plan", "write"]);

    // Same column and no position: nothing moves
    let unchanged = engine.move_or_append(&mut cards, &"ship", &"todo", None).await.unwrap();
    assert_eq!(unchanged.position, 1);
    assert_eq!(ids(&cards, "todo"), vec!["review", "ship"]);
}

#[tokio::test]
async fn errors_surface_as_typed_variants() {
    let mut cards = two_columns();
    let engine = Reorderer::default();

    assert!(matches!(
        engine.move_within(&mut cards, &"write", -1).await,
        Err(OrderingError::InvalidPosition(-1))
    ));
    assert!(matches!(
        engine.move_across(&mut cards, &"write", &"archive", 0).await,
        Err(OrderingError::NotFound(_))
    ));
    assert!(matches!(
        engine.remove(&mut cards, &"missing").await,
        Err(OrderingError::NotFound(_))
    ));
}

#[tokio::test]
async fn allow_policy_keeps_requested_positions() {
    let mut cards = two_columns();
    let engine = Reorderer::new(GapPolicy::Allow);

    let reserved = engine.insert_at(&mut cards, &"done", 5).await.unwrap();
    assert_eq!(reserved, 5);
    cards.put("later", "done", reserved);
    assert!(!cards.is_dense(&"done"));
}

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use super::DepartmentNode;

/// Anything that sits in a parent/child forest with a sibling position
pub trait TreeItem {
    fn id(&self) -> Uuid;
    fn parent_id(&self) -> Option<Uuid>;
    fn position(&self) -> i32;
}

impl TreeItem for DepartmentNode {
    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn position(&self) -> i32 {
        self.position
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub item: T,
    pub children: Vec<TreeNode<T>>,
}

/// Nest a flat list into trees, siblings ordered by position.
///
/// Items whose parent is absent from the list become roots, so a filtered
/// subset still renders. Items caught in a parent cycle are unreachable from
/// any root and are left out.
pub fn build_tree<T: TreeItem>(items: Vec<T>) -> Vec<TreeNode<T>> {
    let present: HashSet<Uuid> = items.iter().map(TreeItem::id).collect();

    let mut by_parent: HashMap<Option<Uuid>, Vec<T>> = HashMap::new();
    for item in items {
        let parent = item.parent_id().filter(|p| present.contains(p) && *p != item.id());
        by_parent.entry(parent).or_default().push(item);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|item| (item.position(), item.id()));
    }

    // Explicit worklist instead of recursion. Each bucket is removed as it is
    // consumed, so a cycle in the input ends the walk.
    let mut arena: Vec<(Option<T>, Vec<usize>)> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut worklist: Vec<(Option<usize>, Option<Uuid>)> = vec![(None, None)];
    while let Some((owner, key)) = worklist.pop() {
        let Some(siblings) = by_parent.remove(&key) else {
            continue;
        };
        for item in siblings {
            let index = arena.len();
            worklist.push((Some(index), Some(item.id())));
            arena.push((Some(item), Vec::new()));
            match owner {
                Some(owner) => arena[owner].1.push(index),
                None => roots.push(index),
            }
        }
    }

    // Children always sit after their parent in the arena
    let mut built: Vec<Option<TreeNode<T>>> = (0..arena.len()).map(|_| None).collect();
    for index in (0..arena.len()).rev() {
        let (item, child_indexes) = &mut arena[index];
        let children = child_indexes.iter().filter_map(|child| built[*child].take()).collect();
        if let Some(item) = item.take() {
            built[index] = Some(TreeNode { item, children });
        }
    }
    roots.into_iter().filter_map(|root| built[root].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u128, parent: Option<u128>, position: i32) -> DepartmentNode {
        DepartmentNode {
            id: Uuid::from_u128(id),
            parent_id: parent.map(Uuid::from_u128),
            level: 0,
            position,
        }
    }

    #[test]
    fn nests_children_in_position_order() {
        let items = vec![
            node(3, Some(1), 1),
            node(1, None, 0),
            node(2, Some(1), 0),
            node(4, Some(2), 0),
            node(5, None, 1),
        ];

        let forest = build_tree(items);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].item.id, Uuid::from_u128(1));
        let kids: Vec<Uuid> = forest[0].children.iter().map(|c| c.item.id).collect();
        assert_eq!(kids, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);
        assert_eq!(forest[0].children[0].children[0].item.id, Uuid::from_u128(4));
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn deep_chains_nest_without_recursion() {
        let depth = 2_000u128;
        let items: Vec<DepartmentNode> = (0..depth).map(|i| node(i + 1, if i == 0 { None } else { Some(i) }, 0)).collect();

        let forest = build_tree(items);

        let mut level = 0;
        let mut cursor = &forest;
        while let Some(first) = cursor.first() {
            level += 1;
            cursor = &first.children;
        }
        assert_eq!(level, depth);
    }

    #[test]
    fn parent_cycles_are_left_out() {
        let forest = build_tree(vec![node(1, None, 0), node(2, Some(3), 0), node(3, Some(2), 0)]);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn orphans_become_roots() {
        let forest = build_tree(vec![node(7, Some(99), 0)]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].item.id, Uuid::from_u128(7));
    }

    #[test]
    fn serializes_item_fields_beside_children() {
        let forest = build_tree(vec![node(1, None, 0)]);
        let json = serde_json::to_value(&forest).unwrap();
        assert_eq!(json[0]["position"], 0);
        assert!(json[0]["children"].as_array().unwrap().is_empty());
    }
}

//! Ready-queue backends

use crate::scheduler::{
    NodeTable, Priority, PriorityReadyQueue, ReadyQueue, SimpleReadyQueue, SmpNode, ThreadId,
};
use crate::chain::NodeIndex;

fn add(nodes: &mut NodeTable, owner: u32, level: u32) -> NodeIndex {
    nodes.insert(SmpNode::new(ThreadId(owner), Priority::from_level(level), false))
}

fn owners<Q: ReadyQueue>(queue: &Q, nodes: &NodeTable) -> Vec<u32> {
    queue.iter_order(nodes).into_iter().map(|index| nodes[index].owner().0).collect()
}

/// Levels 3, 1, 3 (appended), 2, 3 (prepended), 1 (appended).
fn fill<Q: ReadyQueue>() -> (NodeTable, Q, Vec<NodeIndex>) {
    let mut nodes = NodeTable::new();
    let mut queue = Q::new(&mut nodes);
    let mut indices = Vec::new();

    for (owner, level, append) in [(1, 3, true), (2, 1, true), (3, 3, true), (4, 2, true), (5, 3, false), (6, 1, true)] {
        let index = add(&mut nodes, owner, level);
        let priority = Priority::from_level(level);
        queue.insert(&mut nodes, index, if append { priority.append() } else { priority });
        indices.push(index);
    }
    (nodes, queue, indices)
}

fn check_order<Q: ReadyQueue>() {
    let (mut nodes, mut queue, indices) = fill::<Q>();
    assert_eq!(owners(&queue, &nodes), vec![2, 6, 4, 5, 1, 3]);
    assert_eq!(queue.highest(&nodes), Some(indices[1]));

    queue.extract(&mut nodes, indices[1]);
    queue.extract(&mut nodes, indices[5]);
    assert_eq!(queue.highest(&nodes), Some(indices[3]));

    queue.extract(&mut nodes, indices[3]);
    assert_eq!(owners(&queue, &nodes), vec![5, 1, 3]);

    for index in [indices[0], indices[2], indices[4]] {
        queue.extract(&mut nodes, index);
    }
    assert!(queue.is_empty(&nodes));
    assert_eq!(queue.highest(&nodes), None);
}

#[test]
fn test_simple_queue_order() {
    check_order::<SimpleReadyQueue>();
}

#[test]
fn test_priority_queue_order() {
    check_order::<PriorityReadyQueue>();
}

fn check_update<Q: ReadyQueue>() {
    let (mut nodes, mut queue, indices) = fill::<Q>();
    let moved = indices[0];

    queue.extract(&mut nodes, moved);
    queue.update(&mut nodes, moved, Priority::from_level(0).append());
    assert_eq!(nodes[moved].priority(), Priority::from_level(0));

    queue.insert(&mut nodes, moved, Priority::from_level(0).append());
    assert_eq!(queue.highest(&nodes), Some(moved));
}

#[test]
fn test_update_stores_purified_priority() {
    check_update::<SimpleReadyQueue>();
    check_update::<PriorityReadyQueue>();
}

#[test]
fn test_priority_queue_spans_bitmap_words() {
    let mut nodes = NodeTable::new();
    let mut queue = PriorityReadyQueue::new(&mut nodes);

    let low = add(&mut nodes, 1, 200);
    let high = add(&mut nodes, 2, 70);
    queue.insert(&mut nodes, low, Priority::from_level(200).append());
    queue.insert(&mut nodes, high, Priority::from_level(70).append());
    assert_eq!(queue.highest(&nodes), Some(high));

    queue.extract(&mut nodes, high);
    assert_eq!(queue.highest(&nodes), Some(low));
}

//! Iterator registry tests
//!
//! A registered iterator must never yield an extracted node and must keep
//! walking from the right neighbor after its own position is extracted.

use crate::chain::{Chain, ChainArena, Direction, IteratorRegistry, NodeIndex};

fn filled(count: usize) -> (ChainArena, Chain, Vec<NodeIndex>) {
    let (mut arena, chain) = ChainArena::with_chain();
    let nodes: Vec<NodeIndex> = (0..count).map(|_| arena.alloc_node()).collect();
    for &node in &nodes {
        arena.append(&chain, node);
    }
    (arena, chain, nodes)
}

#[test]
fn test_register_starts_at_sentinel() {
    let (arena, chain, n) = filled(3);
    let mut registry = IteratorRegistry::new();
    let forward = registry.register(&chain, Direction::Forward);
    let backward = registry.register(&chain, Direction::Backward);

    assert_eq!(registry.position(forward), Some(chain.head()));
    assert_eq!(registry.position(backward), Some(chain.tail()));
    assert_eq!(registry.next(&arena, forward), Some(n[0]));
    assert_eq!(registry.next(&arena, backward), Some(n[2]));
    assert_eq!(registry.live(), 2);
}

#[test]
fn test_next_peeks_until_committed() {
    let (arena, chain, n) = filled(2);
    let mut registry = IteratorRegistry::new();
    let it = registry.register(&chain, Direction::Forward);

    assert_eq!(registry.next(&arena, it), Some(n[0]));
    assert_eq!(registry.next(&arena, it), Some(n[0]));
    registry.set_position(it, n[0]);
    assert_eq!(registry.next(&arena, it), Some(n[1]));
    registry.set_position(it, n[1]);
    assert_eq!(registry.next(&arena, it), None);
}

#[test]
fn test_forward_iterator_survives_extraction_of_position() {
    let (mut arena, chain, n) = filled(4);
    let mut registry = IteratorRegistry::new();
    let it = registry.register(&chain, Direction::Forward);

    registry.set_position(it, n[1]);
    arena.extract_tracked(&mut registry, n[1]);

    assert_eq!(registry.position(it), Some(n[0]));
    assert_eq!(registry.next(&arena, it), Some(n[2]));
}

#[test]
fn test_backward_iterator_survives_extraction_of_position() {
    let (mut arena, chain, n) = filled(4);
    let mut registry = IteratorRegistry::new();
    let it = registry.register(&chain, Direction::Backward);

    registry.set_position(it, n[2]);
    arena.extract_tracked(&mut registry, n[2]);

    assert_eq!(registry.position(it), Some(n[3]));
    assert_eq!(registry.next(&arena, it), Some(n[1]));
}

#[test]
fn test_extracting_while_walking_visits_each_survivor_once() {
    let (mut arena, chain, n) = filled(6);
    let mut registry = IteratorRegistry::new();
    let it = registry.register(&chain, Direction::Forward);
    let mut visited = Vec::new();

    while let Some(node) = registry.next(&arena, it) {
        registry.set_position(it, node);
        visited.push(node);
        // Drop every even node right after visiting it.
        if node.as_usize() % 2 == 0 {
            arena.extract_tracked(&mut registry, node);
        }
    }

    assert_eq!(visited, n);
    let remaining: Vec<NodeIndex> = arena.iter(&chain).collect();
    assert!(remaining.iter().all(|node| node.as_usize() % 2 == 1));
}

#[test]
fn test_never_observes_extracted_node() {
    let (mut arena, chain, n) = filled(5);
    let mut registry = IteratorRegistry::new();
    let it = registry.register(&chain, Direction::Forward);
    let mut extracted = Vec::new();

    registry.set_position(it, n[0]);
    // Remove nodes ahead of the iterator, then the position itself.
    for &victim in &[n[1], n[0], n[3]] {
        arena.extract_tracked(&mut registry, victim);
        extracted.push(victim);
    }

    let mut seen = Vec::new();
    while let Some(node) = registry.next(&arena, it) {
        assert!(!extracted.contains(&node));
        registry.set_position(it, node);
        seen.push(node);
    }
    assert_eq!(seen, vec![n[2], n[4]]);
}

#[test]
fn test_multiple_iterators_are_repaired() {
    let (mut arena, chain, n) = filled(3);
    let mut registry = IteratorRegistry::new();
    let a = registry.register(&chain, Direction::Forward);
    let b = registry.register(&chain, Direction::Backward);
    registry.set_position(a, n[1]);
    registry.set_position(b, n[1]);

    arena.extract_tracked(&mut registry, n[1]);

    assert_eq!(registry.next(&arena, a), Some(n[2]));
    assert_eq!(registry.next(&arena, b), Some(n[0]));
}

#[test]
fn test_unregister_reuses_slot() {
    let (arena, chain, _) = filled(1);
    let mut registry = IteratorRegistry::new();
    let a = registry.register(&chain, Direction::Forward);
    registry.unregister(a);
    assert_eq!(registry.live(), 0);
    assert_eq!(registry.next(&arena, a), None);

    let b = registry.register(&chain, Direction::Backward);
    assert_eq!(a, b);
    assert_eq!(registry.live(), 1);
}

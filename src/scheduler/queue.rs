//! Ready-queue backends.
//!
//! The SMP algorithm is generic over [`ReadyQueue`]; a backend only decides
//! how ready nodes of real threads are ordered. Idle nodes never enter a
//! ready queue, they sit in the instance's idle pool.

use alloc::vec::Vec;

use crate::chain::{Chain, NodeIndex};

use super::node::{priority_less_equal, NodeTable};
use super::types::{Priority, PRIORITY_LEVELS};

pub trait ReadyQueue {
    /// Allocates the queue's sentinels in `nodes`.
    fn new(nodes: &mut NodeTable) -> Self
    where
        Self: Sized;

    fn is_empty(&self, nodes: &NodeTable) -> bool;

    /// Most urgent ready node.
    fn highest(&self, nodes: &NodeTable) -> Option<NodeIndex>;

    /// Inserts `node`. An append insert priority queues it behind its
    /// equal-priority peers, otherwise in front of them.
    fn insert(&mut self, nodes: &mut NodeTable, node: NodeIndex, insert_priority: Priority);

    fn extract(&mut self, nodes: &mut NodeTable, node: NodeIndex);

    /// Changes the cached priority of an extracted node.
    fn update(&mut self, nodes: &mut NodeTable, node: NodeIndex, priority: Priority) {
        nodes[node].priority = priority.purify();
    }

    /// Ready nodes from most to least urgent.
    fn iter_order(&self, nodes: &NodeTable) -> Vec<NodeIndex>;
}

// ============================================================================
// Simple: one ordered chain
// ============================================================================

pub struct SimpleReadyQueue {
    ready: Chain,
}

impl ReadyQueue for SimpleReadyQueue {
    fn new(nodes: &mut NodeTable) -> Self {
        Self {
            ready: nodes.new_chain(),
        }
    }

    fn is_empty(&self, nodes: &NodeTable) -> bool {
        nodes.links.is_empty(&self.ready)
    }

    fn highest(&self, nodes: &NodeTable) -> Option<NodeIndex> {
        nodes.links.first_node(&self.ready)
    }

    fn insert(&mut self, nodes: &mut NodeTable, node: NodeIndex, insert_priority: Priority) {
        nodes.insert_ordered(&self.ready, node, insert_priority, priority_less_equal);
    }

    fn extract(&mut self, nodes: &mut NodeTable, node: NodeIndex) {
        nodes.links.extract(node);
    }

    fn iter_order(&self, nodes: &NodeTable) -> Vec<NodeIndex> {
        nodes.iter(&self.ready).collect()
    }
}

// ============================================================================
// Priority: one FIFO chain per level plus an occupancy bitmap
// ============================================================================

const BITMAP_WORDS: usize = PRIORITY_LEVELS / 64;

pub struct PriorityReadyQueue {
    levels: Vec<Chain>,
    bitmap: [u64; BITMAP_WORDS],
}

impl PriorityReadyQueue {
    fn set_bit(&mut self, level: usize) {
        self.bitmap[level / 64] |= 1 << (level % 64);
    }

    fn clear_bit(&mut self, level: usize) {
        self.bitmap[level / 64] &= !(1 << (level % 64));
    }

    fn highest_level(&self) -> Option<usize> {
        self.bitmap
            .iter()
            .enumerate()
            .find(|(_, word)| **word != 0)
            .map(|(index, word)| index * 64 + word.trailing_zeros() as usize)
    }

    fn level_of(priority: Priority) -> usize {
        (priority.level() as usize).min(PRIORITY_LEVELS - 1)
    }
}

impl ReadyQueue for PriorityReadyQueue {
    fn new(nodes: &mut NodeTable) -> Self {
        Self {
            levels: (0..PRIORITY_LEVELS).map(|_| nodes.new_chain()).collect(),
            bitmap: [0; BITMAP_WORDS],
        }
    }

    fn is_empty(&self, _nodes: &NodeTable) -> bool {
        self.bitmap.iter().all(|word| *word == 0)
    }

    fn highest(&self, nodes: &NodeTable) -> Option<NodeIndex> {
        let level = self.highest_level()?;
        nodes.links.first_node(&self.levels[level])
    }

    fn insert(&mut self, nodes: &mut NodeTable, node: NodeIndex, insert_priority: Priority) {
        let level = Self::level_of(insert_priority);
        let chain = self.levels[level];
        if insert_priority.is_append() {
            nodes.links.append(&chain, node);
        } else {
            nodes.links.prepend(&chain, node);
        }
        self.set_bit(level);
    }

    fn extract(&mut self, nodes: &mut NodeTable, node: NodeIndex) {
        let level = Self::level_of(nodes[node].priority);
        nodes.links.extract(node);
        if nodes.links.is_empty(&self.levels[level]) {
            self.clear_bit(level);
        }
    }

    fn iter_order(&self, nodes: &NodeTable) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        for (level, chain) in self.levels.iter().enumerate() {
            if self.bitmap[level / 64] & (1 << (level % 64)) != 0 {
                order.extend(nodes.iter(chain));
            }
        }
        order
    }
}

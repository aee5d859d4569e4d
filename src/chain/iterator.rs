//! Iterators that stay valid while the chain is modified.
//!
//! A registered iterator remembers its last committed position. Extraction
//! of that node moves the position one step backwards relative to the
//! iteration direction, so the following [`IteratorRegistry::next`] still
//! yields the extracted node's successor. The repair is a linear pass over
//! all live iterators on every tracked extraction.

use alloc::vec::Vec;

use super::{Chain, ChainArena, NodeIndex};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Handle to a registered iterator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainIterator(usize);

#[derive(Clone, Copy, Debug)]
struct IteratorRecord {
    chain: Chain,
    direction: Direction,
    position: NodeIndex,
}

#[derive(Default)]
pub struct IteratorRegistry {
    records: Vec<Option<IteratorRecord>>,
}

impl IteratorRegistry {
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Registers an iterator parked on the head (forward) or tail (backward)
    /// sentinel of `chain`.
    pub fn register(&mut self, chain: &Chain, direction: Direction) -> ChainIterator {
        let position = match direction {
            Direction::Forward => chain.head(),
            Direction::Backward => chain.tail(),
        };
        let record = IteratorRecord {
            chain: *chain,
            direction,
            position,
        };

        if let Some(slot) = self.records.iter().position(|slot| slot.is_none()) {
            self.records[slot] = Some(record);
            ChainIterator(slot)
        } else {
            self.records.push(Some(record));
            ChainIterator(self.records.len() - 1)
        }
    }

    /// Peeks the node after the current position without committing.
    /// Returns `None` at the end of the chain.
    pub fn next(&self, arena: &ChainArena, iterator: ChainIterator) -> Option<NodeIndex> {
        let record = self.record(iterator)?;
        let (node, end) = match record.direction {
            Direction::Forward => (arena.next(record.position), record.chain.tail()),
            Direction::Backward => (arena.previous(record.position), record.chain.head()),
        };
        (node != end).then_some(node)
    }

    /// Commits `node` as the current position.
    pub fn set_position(&mut self, iterator: ChainIterator, node: NodeIndex) {
        if let Some(Some(record)) = self.records.get_mut(iterator.0) {
            record.position = node;
        }
    }

    pub fn position(&self, iterator: ChainIterator) -> Option<NodeIndex> {
        self.record(iterator).map(|record| record.position)
    }

    pub fn unregister(&mut self, iterator: ChainIterator) {
        if let Some(slot) = self.records.get_mut(iterator.0) {
            *slot = None;
        }
    }

    pub fn live(&self) -> usize {
        self.records.iter().filter(|slot| slot.is_some()).count()
    }

    /// Must run before `node` is unlinked.
    pub fn on_extract(&mut self, arena: &ChainArena, node: NodeIndex) {
        for record in self.records.iter_mut().flatten() {
            if record.position != node {
                continue;
            }
            record.position = match record.direction {
                Direction::Forward => arena.previous(node),
                Direction::Backward => arena.next(node),
            };
        }
    }

    fn record(&self, iterator: ChainIterator) -> Option<&IteratorRecord> {
        self.records.get(iterator.0).and_then(|slot| slot.as_ref())
    }
}

//! Sentinel-based doubly linked chains stored in an index arena.
//!
//! Every chain owns two permanent sentinel slots, a head and a tail, so
//! insertion and extraction never branch on emptiness:
//!
//! ```text
//!   head  <->  n0  <->  n1  <->  ...  <->  tail
//!   previous(head) == NULL                 next(tail) == NULL
//! ```
//!
//! Nodes are addressed by [`NodeIndex`]. A node is either off-chain (both
//! links `NULL`) or linked into exactly one chain of its arena. Several chains
//! may share one arena; a node moves between them with `extract` followed by
//! an insertion.
//!
//! ## Module Organization
//!
//! - `mod.rs`: [`NodeIndex`], [`Chain`], [`ChainArena`] and the O(1) link operations
//! - `iterator.rs`: [`IteratorRegistry`], iterators that survive extraction

mod iterator;

pub use iterator::{ChainIterator, Direction, IteratorRegistry};

use alloc::vec::Vec;

/// Stable handle of a slot in a [`ChainArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(u32);

impl NodeIndex {
    pub const NULL: Self = Self(u32::MAX);

    pub const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Link {
    next: NodeIndex,
    previous: NodeIndex,
}

impl Link {
    const OFF_CHAIN: Link = Link {
        next: NodeIndex::NULL,
        previous: NodeIndex::NULL,
    };
}

/// A chain is just its two sentinel slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chain {
    head: NodeIndex,
    tail: NodeIndex,
}

impl Chain {
    pub const fn head(&self) -> NodeIndex {
        self.head
    }

    pub const fn tail(&self) -> NodeIndex {
        self.tail
    }

    pub fn is_sentinel(&self, node: NodeIndex) -> bool {
        node == self.head || node == self.tail
    }
}

pub struct ChainArena {
    links: Vec<Link>,
}

impl ChainArena {
    pub const fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Creates an arena whose first chain uses the fixed slots 0 and 1.
    pub fn with_chain() -> (Self, Chain) {
        let mut arena = Self::new();
        let chain = arena.new_chain();
        debug_assert_eq!(chain.head, NodeIndex::new(0));
        debug_assert_eq!(chain.tail, NodeIndex::new(1));
        (arena, chain)
    }

    pub fn slot_count(&self) -> usize {
        self.links.len()
    }

    /// Allocates an off-chain node slot.
    pub fn alloc_node(&mut self) -> NodeIndex {
        let index = NodeIndex::new(self.links.len());
        self.links.push(Link::OFF_CHAIN);
        index
    }

    /// Allocates the two sentinels of a new, empty chain.
    pub fn new_chain(&mut self) -> Chain {
        let head = self.alloc_node();
        let tail = self.alloc_node();
        self.links[head.as_usize()].next = tail;
        self.links[tail.as_usize()].previous = head;
        Chain { head, tail }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    #[inline]
    pub fn next(&self, node: NodeIndex) -> NodeIndex {
        self.links[node.as_usize()].next
    }

    #[inline]
    pub fn previous(&self, node: NodeIndex) -> NodeIndex {
        self.links[node.as_usize()].previous
    }

    /// First node, or the tail sentinel when empty.
    #[inline]
    pub fn first(&self, chain: &Chain) -> NodeIndex {
        self.next(chain.head)
    }

    /// Last node, or the head sentinel when empty.
    #[inline]
    pub fn last(&self, chain: &Chain) -> NodeIndex {
        self.previous(chain.tail)
    }

    pub fn first_node(&self, chain: &Chain) -> Option<NodeIndex> {
        let first = self.first(chain);
        (first != chain.tail).then_some(first)
    }

    pub fn last_node(&self, chain: &Chain) -> Option<NodeIndex> {
        let last = self.last(chain);
        (last != chain.head).then_some(last)
    }

    #[inline]
    pub fn is_empty(&self, chain: &Chain) -> bool {
        self.first(chain) == chain.tail
    }

    /// True when exactly one node is linked.
    pub fn has_only_one_node(&self, chain: &Chain) -> bool {
        let first = self.first(chain);
        first != chain.tail && self.next(first) == chain.tail
    }

    pub fn is_off_chain(&self, node: NodeIndex) -> bool {
        self.links[node.as_usize()] == Link::OFF_CHAIN
    }

    pub fn len(&self, chain: &Chain) -> usize {
        self.iter(chain).count()
    }

    pub fn iter<'a>(&'a self, chain: &Chain) -> Iter<'a> {
        Iter {
            arena: self,
            current: self.first(chain),
            end: chain.tail,
        }
    }

    pub fn iter_rev<'a>(&'a self, chain: &Chain) -> IterRev<'a> {
        IterRev {
            arena: self,
            current: self.last(chain),
            end: chain.head,
        }
    }

    // =========================================================================
    // Linking
    // =========================================================================

    /// Links `node` directly behind `after`, which may be a head sentinel.
    pub fn insert_after(&mut self, after: NodeIndex, node: NodeIndex) {
        debug_assert!(self.is_off_chain(node), "inserting node {:?} that is on a chain", node);
        let before = self.next(after);
        self.links[node.as_usize()] = Link {
            next: before,
            previous: after,
        };
        self.links[after.as_usize()].next = node;
        self.links[before.as_usize()].previous = node;
    }

    pub fn append(&mut self, chain: &Chain, node: NodeIndex) {
        let last = self.last(chain);
        self.insert_after(last, node);
    }

    pub fn prepend(&mut self, chain: &Chain, node: NodeIndex) {
        self.insert_after(chain.head, node);
    }

    /// Unlinks `node`. Callers holding a registry must use
    /// [`ChainArena::extract_tracked`] instead.
    pub fn extract(&mut self, node: NodeIndex) {
        debug_assert!(!self.is_off_chain(node), "extracting node {:?} twice", node);
        let Link { next, previous } = self.links[node.as_usize()];
        self.links[next.as_usize()].previous = previous;
        self.links[previous.as_usize()].next = next;

        #[cfg(debug_assertions)]
        {
            self.links[node.as_usize()] = Link::OFF_CHAIN;
        }
    }

    /// Repairs every iterator parked on `node`, then unlinks it.
    pub fn extract_tracked(&mut self, registry: &mut IteratorRegistry, node: NodeIndex) {
        registry.on_extract(self, node);
        self.extract(node);
    }

    /// Removes and returns the first node.
    pub fn get_first(&mut self, chain: &Chain) -> Option<NodeIndex> {
        let first = self.first_node(chain)?;
        self.extract(first);
        Some(first)
    }

    /// Inserts `node` in front of the first node for which `order` holds,
    /// or at the end when there is none.
    ///
    /// `order(candidate)` answers "does the new node belong in front of
    /// `candidate`". With `key <= candidate.key` equal keys end up behind
    /// the new node (LIFO); with `key < candidate.key` in front of it (FIFO).
    pub fn insert_ordered(
        &mut self,
        chain: &Chain,
        node: NodeIndex,
        mut order: impl FnMut(NodeIndex) -> bool,
    ) {
        let mut next = self.first(chain);
        while next != chain.tail && !order(next) {
            next = self.next(next);
        }
        let after = self.previous(next);
        self.insert_after(after, node);
    }
}

impl Default for ChainArena {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a> {
    arena: &'a ChainArena,
    current: NodeIndex,
    end: NodeIndex,
}

impl Iterator for Iter<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        if self.current == self.end {
            return None;
        }
        let node = self.current;
        self.current = self.arena.next(node);
        Some(node)
    }
}

pub struct IterRev<'a> {
    arena: &'a ChainArena,
    current: NodeIndex,
    end: NodeIndex,
}

impl Iterator for IterRev<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        if self.current == self.end {
            return None;
        }
        let node = self.current;
        self.current = self.arena.previous(node);
        Some(node)
    }
}

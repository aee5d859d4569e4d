//! Scheduler nodes and the per-instance node arena.

use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use crate::chain::{Chain, ChainArena, NodeIndex};

use super::types::{NodeState, Priority, ThreadId};

/// Participation of one thread in one scheduler instance.
///
/// `owner` is fixed. `user` is the thread that runs when the node holds a
/// processor: the owner, or a thread being helped. `idle` is set while an
/// idle thread keeps the node's processor on behalf of a user that cannot
/// run.
#[derive(Clone, Debug)]
pub struct SmpNode {
    owner: ThreadId,
    pub(crate) user: ThreadId,
    pub(crate) idle: Option<ThreadId>,
    pub(crate) priority: Priority,
    state: NodeState,
    pub(crate) sticky_level: u32,
    owner_is_idle: bool,
    transitions: u64,
}

impl SmpNode {
    pub(crate) fn new(owner: ThreadId, priority: Priority, owner_is_idle: bool) -> Self {
        Self {
            owner,
            user: owner,
            idle: None,
            priority: priority.purify(),
            state: NodeState::Blocked,
            sticky_level: 0,
            owner_is_idle,
            transitions: 0,
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn user(&self) -> ThreadId {
        self.user
    }

    pub fn idle(&self) -> Option<ThreadId> {
        self.idle
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn sticky_level(&self) -> u32 {
        self.sticky_level
    }

    pub fn is_idle_node(&self) -> bool {
        self.owner_is_idle
    }

    /// Number of state transitions taken so far.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Thread currently bound to the node's processor.
    pub fn running(&self) -> ThreadId {
        self.idle.unwrap_or(self.user)
    }

    /// A node keeps competing for a processor while its owner wants one or
    /// while it is lent to another thread.
    pub fn wants_processor(&self) -> bool {
        self.owner_is_idle || self.sticky_level > 0 || self.user != self.owner
    }

    pub(crate) fn change_state(&mut self, new_state: NodeState) {
        if self.state == new_state {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(new_state),
            "illegal node transition {} -> {}",
            self.state.as_str(),
            new_state.as_str()
        );
        crate::ktrace!(
            "node of {}: {} -> {}",
            self.owner,
            self.state.as_str(),
            new_state.as_str()
        );
        self.state = new_state;
        self.transitions += 1;
    }
}

/// Arena holding the chain links and node payloads of one instance.
///
/// Slots 0 and 1 are the sentinels of the Scheduled chain, 2 and 3 those of
/// the idle pool. Ready-queue backends allocate their sentinels next.
pub struct NodeTable {
    pub(crate) links: ChainArena,
    slots: Vec<Option<SmpNode>>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self {
            links: ChainArena::new(),
            slots: Vec::new(),
        }
    }

    pub fn new_chain(&mut self) -> Chain {
        let chain = self.links.new_chain();
        self.sync_slots();
        chain
    }

    pub fn insert(&mut self, node: SmpNode) -> NodeIndex {
        let index = self.links.alloc_node();
        self.sync_slots();
        self.slots[index.as_usize()] = Some(node);
        index
    }

    pub fn get(&self, index: NodeIndex) -> Option<&SmpNode> {
        self.slots.get(index.as_usize()).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, index: NodeIndex) -> Option<&mut SmpNode> {
        self.slots.get_mut(index.as_usize()).and_then(|slot| slot.as_mut())
    }

    pub fn links(&self) -> &ChainArena {
        &self.links
    }

    pub fn iter(&self, chain: &Chain) -> impl Iterator<Item = NodeIndex> + '_ {
        self.links.iter(chain)
    }

    /// Ordered insertion keyed on the cached node priorities.
    pub fn insert_ordered(
        &mut self,
        chain: &Chain,
        node: NodeIndex,
        key: Priority,
        order: fn(Priority, &SmpNode) -> bool,
    ) {
        let slots = &self.slots;
        self.links.insert_ordered(chain, node, |candidate| {
            order(key, node_at(slots, candidate))
        });
    }

    fn sync_slots(&mut self) {
        self.slots.resize(self.links.slot_count(), None);
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// `key <= candidate`: the single ordering predicate of every queue.
pub fn priority_less_equal(key: Priority, candidate: &SmpNode) -> bool {
    key <= candidate.priority
}

fn node_at(slots: &[Option<SmpNode>], index: NodeIndex) -> &SmpNode {
    match slots.get(index.as_usize()).and_then(|slot| slot.as_ref()) {
        Some(node) => node,
        None => invalid_node(index),
    }
}

#[cold]
#[inline(never)]
fn invalid_node(index: NodeIndex) -> ! {
    crate::kfatal!("scheduler: slot {:?} is not a scheduler node", index);
    panic!("scheduler: slot {:?} is not a scheduler node", index);
}

impl Index<NodeIndex> for NodeTable {
    type Output = SmpNode;

    fn index(&self, index: NodeIndex) -> &SmpNode {
        node_at(&self.slots, index)
    }
}

impl IndexMut<NodeIndex> for NodeTable {
    fn index_mut(&mut self, index: NodeIndex) -> &mut SmpNode {
        match self.slots.get_mut(index.as_usize()).and_then(|slot| slot.as_mut()) {
            Some(node) => node,
            None => invalid_node(index),
        }
    }
}

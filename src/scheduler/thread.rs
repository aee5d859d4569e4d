//! Thread records as seen by the scheduler.
//!
//! Only the scheduling-relevant part of a thread lives here: its home node,
//! the node it currently runs on, its processor and the threads offering
//! it help.

use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use super::types::{CpuIndex, NodeRef, ThreadId, ThreadSchedulerState};

#[derive(Clone, Debug)]
pub struct Thread {
    id: ThreadId,
    is_idle: bool,
    home: NodeRef,                     // Own node in the home instance
    pub(crate) node: NodeRef,          // Node lending the processor (home unless helped)
    pub(crate) state: ThreadSchedulerState,
    pub(crate) cpu: CpuIndex,          // Processor last assigned
    pub(crate) helpers: Vec<ThreadId>, // Threads offering their nodes, in offer order
}

impl Thread {
    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    pub fn home(&self) -> NodeRef {
        self.home
    }

    pub fn node(&self) -> NodeRef {
        self.node
    }

    pub fn state(&self) -> ThreadSchedulerState {
        self.state
    }

    pub fn cpu(&self) -> CpuIndex {
        self.cpu
    }

    pub fn helpers(&self) -> &[ThreadId] {
        &self.helpers
    }

    pub fn is_helped(&self) -> bool {
        self.node != self.home
    }
}

#[derive(Default)]
pub struct ThreadTable {
    threads: Vec<Thread>,
}

impl ThreadTable {
    pub const fn new() -> Self {
        Self {
            threads: Vec::new(),
        }
    }

    /// Id the next [`ThreadTable::create`] call will hand out.
    pub fn next_id(&self) -> ThreadId {
        ThreadId(self.threads.len() as u32)
    }

    pub fn create(&mut self, is_idle: bool, home: NodeRef, cpu: CpuIndex) -> ThreadId {
        let id = self.next_id();
        self.threads.push(Thread {
            id,
            is_idle,
            home,
            node: home,
            state: ThreadSchedulerState::Blocked,
            cpu,
            helpers: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id.as_usize())
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }

    pub fn get_node(&self, id: ThreadId) -> NodeRef {
        self[id].home
    }

    pub fn get_cpu(&self, id: ThreadId) -> CpuIndex {
        self[id].cpu
    }

    /// Returns true when the thread changed processors.
    pub fn set_cpu(&mut self, id: ThreadId, cpu: CpuIndex) -> bool {
        let thread = &mut self[id];
        let migrated = thread.cpu != cpu;
        thread.cpu = cpu;
        migrated
    }

    pub fn is_ready(&self, id: ThreadId) -> bool {
        self[id].state == ThreadSchedulerState::Ready
    }
}

impl Index<ThreadId> for ThreadTable {
    type Output = Thread;

    fn index(&self, id: ThreadId) -> &Thread {
        &self.threads[id.as_usize()]
    }
}

impl IndexMut<ThreadId> for ThreadTable {
    fn index_mut(&mut self, id: ThreadId) -> &mut Thread {
        &mut self.threads[id.as_usize()]
    }
}

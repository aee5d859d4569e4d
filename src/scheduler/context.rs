//! Scheduler instance context.
//!
//! One [`SmpScheduler`] per partition. It owns the node arena with two
//! fixed chains, the Scheduled list and the idle pool, plus a ready queue
//! backend. The Scheduled list is ordered from most to least urgent and
//! always holds one node per owned processor.

use alloc::string::String;
use alloc::vec::Vec;

use crate::chain::{Chain, NodeIndex};
use crate::config::{AllocationPolicy, InstanceConfig, TieBreak};

use super::node::{priority_less_equal, NodeTable, SmpNode};
use super::percpu::ProcessorTable;
use super::queue::ReadyQueue;
use super::stats::SchedulerStats;
use super::thread::ThreadTable;
use super::types::{Priority, SchedulerId, ThreadId, ThreadSchedulerState};

/// Collaborators every operation works on, borrowed from the [`super::System`].
pub struct SchedEnv<'a> {
    pub threads: &'a mut ThreadTable,
    pub cpus: &'a mut ProcessorTable,
}

pub struct SmpScheduler<Q: ReadyQueue> {
    pub(super) id: SchedulerId,
    pub(super) name: String,
    pub(super) nodes: NodeTable,
    pub(super) scheduled: Chain,
    pub(super) idle_pool: Chain,
    pub(super) ready: Q,
    pub(super) ready_count: usize,
    pub(super) processor_count: usize,
    pub(super) tie_break: TieBreak,
    pub(super) allocation: AllocationPolicy,
    pub(super) stats: SchedulerStats,
}

impl<Q: ReadyQueue> SmpScheduler<Q> {
    pub fn new(id: SchedulerId, config: &InstanceConfig) -> Self {
        let mut nodes = NodeTable::new();
        let scheduled = nodes.new_chain();
        let idle_pool = nodes.new_chain();
        let ready = Q::new(&mut nodes);

        Self {
            id,
            name: config.name.clone(),
            nodes,
            scheduled,
            idle_pool,
            ready,
            ready_count: 0,
            processor_count: config.processors.len(),
            tie_break: config.tie_break,
            allocation: config.allocation,
            stats: SchedulerStats::default(),
        }
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub(super) fn add_node(&mut self, owner: ThreadId, priority: Priority, is_idle: bool) -> NodeIndex {
        self.nodes.insert(SmpNode::new(owner, priority, is_idle))
    }

    /// Insert priority for a node entering the ready set after an unblock.
    pub(super) fn unblock_insert_priority(&self, node: NodeIndex) -> Priority {
        let priority = self.nodes[node].priority;
        match self.tie_break {
            TieBreak::Fifo => priority.append(),
            TieBreak::Lifo => priority,
        }
    }

    // ========================================================================
    // Scheduled list
    // ========================================================================

    pub(super) fn lowest_scheduled(&self) -> Option<NodeIndex> {
        self.nodes.links.last_node(&self.scheduled)
    }

    pub(super) fn insert_scheduled(&mut self, node: NodeIndex, insert_priority: Priority) {
        let scheduled = self.scheduled;
        self.nodes
            .insert_ordered(&scheduled, node, insert_priority, priority_less_equal);
        debug_assert!(self.nodes.links.len(&self.scheduled) <= self.processor_count);
    }

    pub(super) fn extract_from_scheduled(&mut self, node: NodeIndex) {
        self.nodes.links.extract(node);
    }

    // ========================================================================
    // Ready set: ready queue for real threads, idle pool for idle threads
    // ========================================================================

    /// Most urgent ready node. The idle pool ranks below every real node.
    pub(super) fn highest_ready(&self) -> Option<NodeIndex> {
        self.ready
            .highest(&self.nodes)
            .or_else(|| self.nodes.links.first_node(&self.idle_pool))
    }

    pub(super) fn insert_ready(&mut self, node: NodeIndex, insert_priority: Priority) {
        if self.nodes[node].is_idle_node() {
            let pool = self.idle_pool;
            self.nodes.links.prepend(&pool, node);
        } else {
            self.ready.insert(&mut self.nodes, node, insert_priority);
            self.ready_count += 1;
        }
    }

    pub(super) fn extract_from_ready(&mut self, node: NodeIndex) {
        if self.nodes[node].is_idle_node() {
            self.nodes.links.extract(node);
        } else {
            self.ready.extract(&mut self.nodes, node);
            self.ready_count -= 1;
        }
    }

    /// A preempted node re-enters in front of its equal-priority peers.
    pub(super) fn move_from_scheduled_to_ready(&mut self, node: NodeIndex) {
        let insert_priority = self.nodes[node].priority;
        self.extract_from_scheduled(node);
        self.insert_ready(node, insert_priority);
    }

    pub(super) fn move_from_ready_to_scheduled(&mut self, node: NodeIndex) {
        let insert_priority = self.nodes[node].priority.append();
        self.extract_from_ready(node);
        self.insert_scheduled(node, insert_priority);
    }

    // ========================================================================
    // Idle placeholders
    // ========================================================================

    /// Takes the first idle thread out of the pool.
    pub(super) fn get_idle_thread(&mut self) -> ThreadId {
        let pool = self.idle_pool;
        match self.nodes.links.get_first(&pool) {
            Some(node) => self.nodes[node].owner(),
            None => idle_pool_exhausted(&self.name),
        }
    }

    /// Returns an idle thread to the front of the pool.
    pub(super) fn release_idle_thread(&mut self, env: &mut SchedEnv<'_>, idle: ThreadId) {
        let home = env.threads[idle].home();
        debug_assert_eq!(home.scheduler, self.id);
        env.threads[idle].state = ThreadSchedulerState::Ready;
        let pool = self.idle_pool;
        self.nodes.links.prepend(&pool, home.index);
    }

    /// Lends an idle thread to `node`, which keeps its processor.
    pub(super) fn use_idle_thread(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> ThreadId {
        let idle = self.restore_idle_thread(env, node);
        self.stats.idle_uses += 1;
        crate::ktrace!("{}: idle {} keeps processor of {}", self.name, idle, self.nodes[node].owner());
        idle
    }

    /// Gives `node` back the placeholder it released a moment ago. Not
    /// counted as a new use.
    pub(super) fn restore_idle_thread(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> ThreadId {
        debug_assert!(self.nodes[node].idle.is_none());
        let idle = self.get_idle_thread();
        env.threads[idle].state = ThreadSchedulerState::Scheduled;
        self.nodes[node].idle = Some(idle);
        idle
    }

    pub(super) fn release_idle_thread_if_necessary(
        &mut self,
        env: &mut SchedEnv<'_>,
        node: NodeIndex,
    ) -> Option<ThreadId> {
        let idle = self.nodes[node].idle.take()?;
        self.release_idle_thread(env, idle);
        Some(idle)
    }

    /// Hands the processor of the idle placeholder in `node` to `thread`.
    pub(super) fn discard_idle_thread(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex) {
        let Some(idle) = self.release_idle_thread_if_necessary(env, node) else {
            return;
        };
        let cpu = env.threads[idle].cpu();
        self.move_thread_to(env, thread, cpu);
        env.cpus.update_heir(cpu, thread);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn scheduled_order(&self) -> Vec<NodeIndex> {
        self.nodes.iter(&self.scheduled).collect()
    }

    pub fn idle_order(&self) -> Vec<NodeIndex> {
        self.nodes.iter(&self.idle_pool).collect()
    }
}

#[cold]
#[inline(never)]
fn idle_pool_exhausted(name: &str) -> ! {
    crate::kfatal!("scheduler {}: idle pool exhausted", name);
    panic!("scheduler {}: idle pool exhausted", name);
}

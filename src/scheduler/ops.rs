//! Object-safe face of a scheduler instance.
//!
//! [`SmpScheduler`] is generic over its ready queue; the [`super::System`]
//! keeps instances of different backends side by side as
//! `Box<dyn SchedulerOps>`.

use alloc::vec::Vec;

use crate::chain::NodeIndex;

use super::context::{SchedEnv, SmpScheduler};
use super::node::SmpNode;
use super::queue::ReadyQueue;
use super::stats::SchedulerStats;
use super::types::{CpuIndex, NodeState, Priority, SchedulerId, ThreadId};

pub trait SchedulerOps: Send {
    fn id(&self) -> SchedulerId;
    fn name(&self) -> &str;
    fn processor_count(&self) -> usize;
    fn node(&self, index: NodeIndex) -> Option<&SmpNode>;

    fn node_initialize(&mut self, owner: ThreadId, priority: Priority) -> NodeIndex;
    fn idle_node_initialize(&mut self, idle: ThreadId) -> NodeIndex;
    fn start_idle(&mut self, env: &mut SchedEnv<'_>, idle: ThreadId, node: NodeIndex, cpu: CpuIndex);

    fn block(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex);
    fn unblock(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex) -> Option<ThreadId>;
    fn update_priority(
        &mut self,
        env: &mut SchedEnv<'_>,
        node: NodeIndex,
        priority: Priority,
        prepend: bool,
    ) -> Option<ThreadId>;
    fn yield_processor(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> Option<ThreadId>;

    fn ask_for_help(&mut self, env: &mut SchedEnv<'_>, offers_help: ThreadId, needs_help: ThreadId) -> Option<ThreadId>;
    fn withdraw_help(&mut self, env: &mut SchedEnv<'_>, offers_help: ThreadId, needs_help: ThreadId) -> Option<ThreadId>;
    fn reconsider_help_request(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex);
    fn make_sticky(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> Option<ThreadId>;
    fn clean_sticky(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex);

    /// Scheduled nodes, most urgent first.
    fn scheduled(&self) -> Vec<NodeIndex>;
    /// Ready nodes of real threads, most urgent first.
    fn ready(&self) -> Vec<NodeIndex>;
    fn idle_pool(&self) -> Vec<NodeIndex>;
    fn stats(&self) -> &SchedulerStats;
    fn check_invariants(&self) -> Result<(), &'static str>;
}

impl<Q: ReadyQueue + Send> SchedulerOps for SmpScheduler<Q> {
    fn id(&self) -> SchedulerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn processor_count(&self) -> usize {
        self.processor_count
    }

    fn node(&self, index: NodeIndex) -> Option<&SmpNode> {
        self.nodes.get(index)
    }

    fn node_initialize(&mut self, owner: ThreadId, priority: Priority) -> NodeIndex {
        SmpScheduler::node_initialize(self, owner, priority)
    }

    fn idle_node_initialize(&mut self, idle: ThreadId) -> NodeIndex {
        self.add_node(idle, Priority::IDLE, true)
    }

    fn start_idle(&mut self, env: &mut SchedEnv<'_>, idle: ThreadId, node: NodeIndex, cpu: CpuIndex) {
        SmpScheduler::start_idle(self, env, idle, node, cpu)
    }

    fn block(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex) {
        SmpScheduler::block(self, env, thread, node)
    }

    fn unblock(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex) -> Option<ThreadId> {
        SmpScheduler::unblock(self, env, thread, node)
    }

    fn update_priority(
        &mut self,
        env: &mut SchedEnv<'_>,
        node: NodeIndex,
        priority: Priority,
        prepend: bool,
    ) -> Option<ThreadId> {
        SmpScheduler::update_priority(self, env, node, priority, prepend)
    }

    fn yield_processor(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> Option<ThreadId> {
        SmpScheduler::yield_processor(self, env, node)
    }

    fn ask_for_help(&mut self, env: &mut SchedEnv<'_>, offers_help: ThreadId, needs_help: ThreadId) -> Option<ThreadId> {
        SmpScheduler::ask_for_help(self, env, offers_help, needs_help)
    }

    fn withdraw_help(&mut self, env: &mut SchedEnv<'_>, offers_help: ThreadId, needs_help: ThreadId) -> Option<ThreadId> {
        SmpScheduler::withdraw_help(self, env, offers_help, needs_help)
    }

    fn reconsider_help_request(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex) {
        SmpScheduler::reconsider_help_request(self, env, thread, node)
    }

    fn make_sticky(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> Option<ThreadId> {
        SmpScheduler::make_sticky(self, env, node)
    }

    fn clean_sticky(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) {
        SmpScheduler::clean_sticky(self, env, node)
    }

    fn scheduled(&self) -> Vec<NodeIndex> {
        self.scheduled_order()
    }

    fn ready(&self) -> Vec<NodeIndex> {
        self.ready.iter_order(&self.nodes)
    }

    fn idle_pool(&self) -> Vec<NodeIndex> {
        self.idle_order()
    }

    fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    fn check_invariants(&self) -> Result<(), &'static str> {
        let links = self.nodes.links();
        for chain in [&self.scheduled, &self.idle_pool] {
            if !links.previous(chain.head()).is_null() || !links.next(chain.tail()).is_null() {
                return Err("sentinel link not null");
            }
            let mut previous = chain.head();
            for node in links.iter(chain) {
                if links.previous(node) != previous {
                    return Err("broken previous link");
                }
                previous = node;
            }
        }

        let scheduled = self.scheduled_order();
        if scheduled.len() != self.processor_count {
            return Err("Scheduled list does not match processor count");
        }
        check_ordered(&self.nodes, &scheduled, NodeState::Scheduled)?;

        let ready = self.ready.iter_order(&self.nodes);
        if ready.len() != self.ready_count {
            return Err("ready count out of sync");
        }
        check_ordered(&self.nodes, &ready, NodeState::Ready)?;

        for node in self.idle_order() {
            if !self.nodes[node].is_idle_node() || self.nodes[node].state() != NodeState::Ready {
                return Err("idle pool holds a non-idle or non-ready node");
            }
        }
        Ok(())
    }
}

fn check_ordered(
    nodes: &super::node::NodeTable,
    order: &[NodeIndex],
    state: NodeState,
) -> Result<(), &'static str> {
    for pair in order.windows(2) {
        if nodes[pair[0]].priority() > nodes[pair[1]].priority() {
            return Err("nodes out of priority order");
        }
    }
    if order.iter().any(|&n| nodes[n].state() != state) {
        return Err("node state does not match its list");
    }
    Ok(())
}

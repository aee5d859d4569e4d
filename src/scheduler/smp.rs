//! Core SMP scheduling algorithm.
//!
//! Operations move nodes between Blocked, Ready and Scheduled while keeping
//! one Scheduled node per owned processor. Whenever a thread loses its
//! processor and should look for help elsewhere, the operation returns it
//! as `needs_help`; routing that thread is the caller's job.
//!
//! ## Loops
//!
//! `enqueue_scheduled` and `schedule_highest_ready` walk the ready set until
//! `try_to_schedule` accepts a node. Every rejected node is removed from the
//! ready set and idle nodes are always accepted, so a walk takes at most
//! `ready_count + 1` rounds.

use crate::chain::NodeIndex;

use super::context::{SchedEnv, SmpScheduler};
use super::queue::ReadyQueue;
use super::types::{
    CpuIndex, NodeRef, NodeState, Priority, SchedAction, ThreadId, ThreadSchedulerState,
};

impl<Q: ReadyQueue> SmpScheduler<Q> {
    // ========================================================================
    // Node set-up
    // ========================================================================

    pub(super) fn node_initialize(&mut self, owner: ThreadId, priority: Priority) -> NodeIndex {
        self.add_node(owner, priority, false)
    }

    /// Installs the idle thread of `cpu` as its first Scheduled node.
    pub(super) fn start_idle(&mut self, env: &mut SchedEnv<'_>, idle: ThreadId, node: NodeIndex, cpu: CpuIndex) {
        self.nodes[node].sticky_level = 1;
        self.nodes[node].change_state(NodeState::Scheduled);
        self.insert_scheduled(node, Priority::IDLE.append());

        env.threads[idle].state = ThreadSchedulerState::Scheduled;
        env.threads.set_cpu(idle, cpu);
        env.cpus.bind(cpu, idle);
        crate::kdebug!("{}: idle {} started on cpu{}", self.name, idle, cpu);
    }

    // ========================================================================
    // Building blocks
    // ========================================================================

    /// Decides whether `node` may take a processor.
    ///
    /// A Ready user is scheduled. A helped user that is no longer Ready is
    /// dropped in favor of the owner. Otherwise the node either keeps the
    /// processor through an idle placeholder (sticky) or is blocked.
    pub(super) fn try_to_schedule(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> SchedAction {
        debug_assert!(self.nodes[node].idle.is_none());
        let owner = self.nodes[node].owner();
        let mut user = self.nodes[node].user;

        if user != owner && !env.threads.is_ready(user) {
            self.nodes[node].user = owner;
            user = owner;
        }

        let user_state = env.threads[user].state();
        if user_state == ThreadSchedulerState::Ready {
            env.threads[user].state = ThreadSchedulerState::Scheduled;
            env.threads[user].node = NodeRef {
                scheduler: self.id,
                index: node,
            };
            return SchedAction::DoSchedule;
        }

        let sticky_level = self.nodes[node].sticky_level;
        if (user_state == ThreadSchedulerState::Scheduled && sticky_level <= 1) || sticky_level == 0 {
            self.nodes[node].change_state(NodeState::Blocked);
            self.stats.discarded += 1;
            return SchedAction::DoNotSchedule;
        }

        self.use_idle_thread(env, node);
        SchedAction::DoSchedule
    }

    /// `scheduled` takes the processor of `victim`, which becomes Ready.
    /// Returns the victim's user if it is a real thread that lost its
    /// processor.
    fn preempt(
        &mut self,
        env: &mut SchedEnv<'_>,
        scheduled: NodeIndex,
        victim: NodeIndex,
        victim_idle: Option<ThreadId>,
    ) -> Option<ThreadId> {
        self.nodes[victim].change_state(NodeState::Ready);
        self.stats.preemptions += 1;

        let (cpu, needs_help) = match victim_idle {
            Some(idle) => (env.threads.get_cpu(idle), None),
            None => {
                let user = self.nodes[victim].user;
                // An idle victim may already serve as the placeholder of `scheduled`.
                let reused = self.nodes[scheduled].idle == Some(user);
                let thread = &mut env.threads[user];
                let mut needs_help = None;
                if thread.state == ThreadSchedulerState::Scheduled && !reused {
                    thread.state = ThreadSchedulerState::Ready;
                    thread.node = thread.home();
                    if !thread.is_idle() {
                        needs_help = Some(user);
                    }
                }
                (thread.cpu(), needs_help)
            }
        };

        self.allocate_processor(env, scheduled, cpu);
        needs_help
    }

    // ========================================================================
    // Enqueue
    // ========================================================================

    /// Enqueues a node that does not hold a processor.
    pub(super) fn enqueue(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex, insert_priority: Priority) -> Option<ThreadId> {
        self.stats.enqueues += 1;

        if let Some(lowest) = self.lowest_scheduled() {
            if insert_priority <= self.nodes[lowest].priority {
                return self.enqueue_to_scheduled(env, node, insert_priority, lowest);
            }
        }

        self.nodes[node].change_state(NodeState::Ready);
        self.insert_ready(node, insert_priority);
        let user = self.nodes[node].user;
        (!env.threads[user].is_idle()).then_some(user)
    }

    fn enqueue_to_scheduled(
        &mut self,
        env: &mut SchedEnv<'_>,
        node: NodeIndex,
        insert_priority: Priority,
        lowest: NodeIndex,
    ) -> Option<ThreadId> {
        let lowest_idle = self.release_idle_thread_if_necessary(env, lowest);
        self.move_from_scheduled_to_ready(lowest);

        match self.try_to_schedule(env, node) {
            SchedAction::DoSchedule => {
                let needs_help = self.preempt(env, node, lowest, lowest_idle);
                self.insert_scheduled(node, insert_priority);
                needs_help
            }
            SchedAction::DoNotSchedule => {
                // Undo: the displaced node keeps its processor.
                if let Some(idle) = lowest_idle {
                    let restored = self.restore_idle_thread(env, lowest);
                    debug_assert_eq!(restored, idle);
                }
                self.move_from_ready_to_scheduled(lowest);
                None
            }
        }
    }

    /// Re-enqueues a node that was extracted from the Scheduled list while
    /// still holding its processor.
    pub(super) fn enqueue_scheduled(
        &mut self,
        env: &mut SchedEnv<'_>,
        node: NodeIndex,
        insert_priority: Priority,
    ) -> Option<ThreadId> {
        let node_idle = self.release_idle_thread_if_necessary(env, node);
        let mut rounds = 0usize;
        let bound = self.ready_count + 1;

        loop {
            rounds += 1;
            debug_assert!(rounds <= bound, "enqueue_scheduled exceeded {} rounds", bound);

            let highest = self.highest_ready();
            let keeps_processor = match highest {
                None => true,
                Some(highest) => {
                    self.nodes[node].wants_processor() && insert_priority <= self.nodes[highest].priority
                }
            };

            if keeps_processor {
                if let Some(idle) = node_idle {
                    self.reclaim_from_idle(env, node, idle);
                }
                self.insert_scheduled(node, insert_priority);
                return None;
            }

            let Some(highest) = highest else {
                return None;
            };
            match self.try_to_schedule(env, highest) {
                SchedAction::DoSchedule => {
                    let needs_help = self.preempt(env, highest, node, node_idle);
                    self.move_from_ready_to_scheduled(highest);
                    self.insert_ready(node, insert_priority);
                    return needs_help;
                }
                SchedAction::DoNotSchedule => self.extract_from_ready(highest),
            }
        }
    }

    /// `node` keeps the processor its placeholder `idle` was running on:
    /// the user takes it over if Ready, otherwise the placeholder stays.
    fn reclaim_from_idle(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex, idle: ThreadId) {
        let owner = self.nodes[node].owner();
        let mut user = self.nodes[node].user;
        if user != owner && !env.threads.is_ready(user) {
            self.nodes[node].user = owner;
            user = owner;
        }

        if env.threads.is_ready(user) {
            let cpu = env.threads.get_cpu(idle);
            env.threads[user].state = ThreadSchedulerState::Scheduled;
            env.threads[user].node = NodeRef {
                scheduler: self.id,
                index: node,
            };
            self.move_thread_to(env, user, cpu);
            env.cpus.update_heir(cpu, user);
        } else {
            let restored = self.restore_idle_thread(env, node);
            debug_assert_eq!(restored, idle);
        }
    }

    /// Gives the processor of `victim`, which leaves the Scheduled list as
    /// Blocked, to the most urgent ready node.
    pub(super) fn schedule_highest_ready(&mut self, env: &mut SchedEnv<'_>, victim: NodeIndex, cpu: CpuIndex) {
        self.nodes[victim].change_state(NodeState::Blocked);
        self.extract_from_scheduled(victim);

        let mut rounds = 0usize;
        let bound = self.ready_count + 1;
        loop {
            rounds += 1;
            debug_assert!(rounds <= bound, "schedule_highest_ready exceeded {} rounds", bound);

            let Some(highest) = self.highest_ready() else {
                no_ready_node(&self.name);
            };
            match self.try_to_schedule(env, highest) {
                SchedAction::DoSchedule => {
                    self.allocate_processor(env, highest, cpu);
                    self.move_from_ready_to_scheduled(highest);
                    return;
                }
                SchedAction::DoNotSchedule => self.extract_from_ready(highest),
            }
        }
    }

    // ========================================================================
    // Thread operations
    // ========================================================================

    pub(super) fn block(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex) {
        self.stats.blocks += 1;
        debug_assert_eq!(self.nodes[node].owner(), thread);
        debug_assert!(self.nodes[node].sticky_level > 0, "block of {} without unblock", thread);

        let node_ref = &mut self.nodes[node];
        node_ref.sticky_level = node_ref.sticky_level.saturating_sub(1);
        let sticky_level = node_ref.sticky_level;
        let state = node_ref.state();
        let lent = node_ref.user != thread;
        let mut cpu = env.threads.get_cpu(thread);
        env.threads[thread].state = ThreadSchedulerState::Blocked;
        crate::ktrace!("{}: block {} (node {})", self.name, thread, state.as_str());

        // The node runs a helped thread; it stays where it is.
        if lent {
            return;
        }

        if sticky_level > 0 {
            if state == NodeState::Scheduled && self.nodes[node].idle.is_none() {
                let idle = self.use_idle_thread(env, node);
                self.move_thread_to(env, idle, cpu);
                env.cpus.update_heir(cpu, idle);
            }
            return;
        }

        match state {
            NodeState::Scheduled => {
                if let Some(idle) = self.release_idle_thread_if_necessary(env, node) {
                    cpu = env.threads.get_cpu(idle);
                }
                self.schedule_highest_ready(env, node, cpu);
            }
            NodeState::Ready => {
                self.nodes[node].change_state(NodeState::Blocked);
                self.extract_from_ready(node);
            }
            NodeState::Blocked => {}
        }
    }

    pub(super) fn unblock(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex) -> Option<ThreadId> {
        self.stats.unblocks += 1;
        debug_assert_eq!(self.nodes[node].owner(), thread);

        self.nodes[node].sticky_level += 1;
        let state = self.nodes[node].state();
        crate::ktrace!("{}: unblock {} (node {})", self.name, thread, state.as_str());

        match state {
            NodeState::Scheduled => {
                if self.nodes[node].user != thread {
                    // Lent to a helped thread, the owner has to find help.
                    env.threads[thread].state = ThreadSchedulerState::Ready;
                    return Some(thread);
                }
                if self.nodes[node].idle.is_some() {
                    env.threads[thread].state = ThreadSchedulerState::Scheduled;
                    env.threads[thread].node = NodeRef {
                        scheduler: self.id,
                        index: node,
                    };
                    self.discard_idle_thread(env, thread, node);
                    return None;
                }
                // Still running here, for example an unblock racing the block.
                env.threads[thread].state = ThreadSchedulerState::Scheduled;
                None
            }
            NodeState::Ready => {
                env.threads[thread].state = ThreadSchedulerState::Ready;
                Some(thread)
            }
            NodeState::Blocked => {
                env.threads[thread].state = ThreadSchedulerState::Ready;
                self.nodes[node].user = thread;
                let insert_priority = self.unblock_insert_priority(node);
                self.enqueue(env, node, insert_priority)
            }
        }
    }

    /// Changes the priority of `node`. `prepend` places it in front of its
    /// new equal-priority peers.
    pub(super) fn update_priority(
        &mut self,
        env: &mut SchedEnv<'_>,
        node: NodeIndex,
        priority: Priority,
        prepend: bool,
    ) -> Option<ThreadId> {
        let priority = priority.purify();
        if priority == self.nodes[node].priority {
            return None;
        }
        self.stats.priority_changes += 1;
        let insert_priority = if prepend { priority } else { priority.append() };

        match self.nodes[node].state() {
            NodeState::Scheduled => {
                self.extract_from_scheduled(node);
                self.ready.update(&mut self.nodes, node, priority);
                self.enqueue_scheduled(env, node, insert_priority)
            }
            NodeState::Ready => {
                self.extract_from_ready(node);
                self.ready.update(&mut self.nodes, node, priority);
                self.enqueue(env, node, insert_priority)
            }
            NodeState::Blocked => {
                self.ready.update(&mut self.nodes, node, priority);
                None
            }
        }
    }

    /// Moves `node` behind its equal-priority peers.
    pub(super) fn yield_processor(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> Option<ThreadId> {
        self.stats.yields += 1;
        let insert_priority = self.nodes[node].priority.append();

        match self.nodes[node].state() {
            NodeState::Scheduled => {
                self.extract_from_scheduled(node);
                self.enqueue_scheduled(env, node, insert_priority)
            }
            NodeState::Ready => {
                self.extract_from_ready(node);
                self.enqueue(env, node, insert_priority)
            }
            NodeState::Blocked => None,
        }
    }
}

#[cold]
#[inline(never)]
fn no_ready_node(name: &str) -> ! {
    crate::kfatal!("scheduler {}: processor left without a ready node", name);
    panic!("scheduler {}: processor left without a ready node", name);
}

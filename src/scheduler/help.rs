//! Help protocol and sticky nodes.
//!
//! A thread that owns a resource wanted by threads of other instances may
//! run on their nodes. The waiting thread *offers* its node, the resource
//! owner *needs* help. Each instance call handles one node; chained effects
//! come back as the next thread needing help and are driven by the work
//! list in [`super::System`].

use super::context::{SchedEnv, SmpScheduler};
use super::queue::ReadyQueue;
use super::types::{NodeRef, NodeState, ThreadId, ThreadSchedulerState};
use crate::chain::NodeIndex;

impl<Q: ReadyQueue> SmpScheduler<Q> {
    /// Offers the home node of `offers_help` in this instance to `needs_help`.
    ///
    /// - Ready node: it now accepts `needs_help` as its user.
    /// - Scheduled node: `needs_help` takes its processor over from the owner
    ///   or its idle placeholder. A node already lent to another helped
    ///   thread is left alone, so two helped threads never trade it back
    ///   and forth.
    /// - Blocked node: becomes Ready with `needs_help` as user and is
    ///   enqueued, which may displace another thread.
    pub(super) fn ask_for_help(
        &mut self,
        env: &mut SchedEnv<'_>,
        offers_help: ThreadId,
        needs_help: ThreadId,
    ) -> Option<ThreadId> {
        let home = env.threads[offers_help].home();
        debug_assert_eq!(home.scheduler, self.id);
        let node = home.index;

        if !env.threads.is_ready(needs_help) {
            return None;
        }
        let owner = self.nodes[node].owner();
        let user = self.nodes[node].user;
        let state = self.nodes[node].state();
        if state != NodeState::Blocked {
            if user == needs_help {
                return None;
            }
            // A lent node stays with its helped thread until withdrawn; a
            // Ready one may only change hands between helped threads.
            if user != owner && (needs_help == owner || state == NodeState::Scheduled) {
                return None;
            }
        }

        self.stats.help_requests += 1;
        crate::ktrace!(
            "{}: {} offers node ({}) to {}",
            self.name,
            offers_help,
            state.as_str(),
            needs_help
        );

        match state {
            NodeState::Ready => {
                self.nodes[node].user = needs_help;
                None
            }
            NodeState::Scheduled => {
                debug_assert_eq!(user, owner);
                let cpu = match self.release_idle_thread_if_necessary(env, node) {
                    Some(idle) => env.threads.get_cpu(idle),
                    None => {
                        let previous = &mut env.threads[owner];
                        if previous.state == ThreadSchedulerState::Scheduled {
                            previous.state = ThreadSchedulerState::Ready;
                        }
                        previous.node = previous.home();
                        previous.cpu()
                    }
                };

                self.nodes[node].user = needs_help;
                env.threads[needs_help].state = ThreadSchedulerState::Scheduled;
                env.threads[needs_help].node = NodeRef {
                    scheduler: self.id,
                    index: node,
                };
                self.move_thread_to(env, needs_help, cpu);
                env.cpus.update_heir(cpu, needs_help);
                self.stats.help_accepted += 1;
                crate::kdebug!("{}: {} runs on cpu{} for {}", self.name, needs_help, cpu, owner);
                None
            }
            NodeState::Blocked => {
                self.nodes[node].user = needs_help;
                self.nodes[node].change_state(NodeState::Ready);
                let insert_priority = self.nodes[node].priority.append();
                let next = self.enqueue(env, node, insert_priority);
                if env.threads[needs_help].state() == ThreadSchedulerState::Scheduled {
                    self.stats.help_accepted += 1;
                }
                next
            }
        }
    }

    /// Stops lending the home node of `offers_help` to `needs_help`.
    ///
    /// If `needs_help` was running on it, the processor goes to the owner
    /// when Ready, to an idle placeholder when the node is sticky and to
    /// the most urgent ready node otherwise. Returns `needs_help` when it
    /// lost its processor.
    pub(super) fn withdraw_help(
        &mut self,
        env: &mut SchedEnv<'_>,
        offers_help: ThreadId,
        needs_help: ThreadId,
    ) -> Option<ThreadId> {
        let node = env.threads[offers_help].home().index;
        if self.nodes[node].user != needs_help {
            return None;
        }
        self.nodes[node].user = offers_help;
        crate::ktrace!("{}: {} withdraws help from {}", self.name, offers_help, needs_help);

        match self.nodes[node].state() {
            NodeState::Scheduled => {
                let node_ref = NodeRef {
                    scheduler: self.id,
                    index: node,
                };
                let idle = self.nodes[node].idle;
                let cpu = match idle {
                    Some(idle) => env.threads.get_cpu(idle),
                    None => env.threads.get_cpu(needs_help),
                };

                let mut displaced = None;
                if idle.is_none() && env.threads[needs_help].node == node_ref {
                    let helped = &mut env.threads[needs_help];
                    if helped.state == ThreadSchedulerState::Scheduled {
                        helped.state = ThreadSchedulerState::Ready;
                        displaced = Some(needs_help);
                    }
                    helped.node = helped.home();
                }

                if env.threads.is_ready(offers_help) {
                    self.release_idle_thread_if_necessary(env, node);
                    env.threads[offers_help].state = ThreadSchedulerState::Scheduled;
                    env.threads[offers_help].node = node_ref;
                    self.move_thread_to(env, offers_help, cpu);
                    env.cpus.update_heir(cpu, offers_help);
                } else if idle.is_none() {
                    if self.nodes[node].sticky_level > 0 {
                        let idle = self.use_idle_thread(env, node);
                        self.move_thread_to(env, idle, cpu);
                        env.cpus.update_heir(cpu, idle);
                    } else {
                        self.schedule_highest_ready(env, node, cpu);
                    }
                }
                displaced
            }
            NodeState::Ready => {
                if !env.threads.is_ready(offers_help) && self.nodes[node].sticky_level == 0 {
                    self.nodes[node].change_state(NodeState::Blocked);
                    self.extract_from_ready(node);
                }
                None
            }
            NodeState::Blocked => None,
        }
    }

    /// Drops the Ready home node of a thread that got a processor elsewhere.
    pub(super) fn reconsider_help_request(&mut self, env: &mut SchedEnv<'_>, thread: ThreadId, node: NodeIndex) {
        if env.threads[thread].state() == ThreadSchedulerState::Scheduled
            && self.nodes[node].state() == NodeState::Ready
            && self.nodes[node].user == thread
            && self.nodes[node].sticky_level == 1
        {
            self.nodes[node].change_state(NodeState::Blocked);
            self.extract_from_ready(node);
        }
    }

    /// Reserves a processor for `node` even while its owner is blocked.
    pub(super) fn make_sticky(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) -> Option<ThreadId> {
        self.nodes[node].sticky_level += 1;
        if self.nodes[node].state() != NodeState::Blocked {
            return None;
        }
        let insert_priority = self.nodes[node].priority.append();
        self.enqueue(env, node, insert_priority)
    }

    /// Releases a reservation taken by [`SmpScheduler::make_sticky`].
    pub(super) fn clean_sticky(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex) {
        debug_assert!(self.nodes[node].sticky_level > 0);
        let node_ref = &mut self.nodes[node];
        node_ref.sticky_level = node_ref.sticky_level.saturating_sub(1);
        if node_ref.sticky_level > 0 {
            return;
        }

        match self.nodes[node].state() {
            NodeState::Scheduled => {
                if let Some(idle) = self.release_idle_thread_if_necessary(env, node) {
                    let cpu = env.threads.get_cpu(idle);
                    self.schedule_highest_ready(env, node, cpu);
                }
            }
            NodeState::Ready => {
                let user = self.nodes[node].user;
                if !env.threads.is_ready(user) {
                    self.nodes[node].change_state(NodeState::Blocked);
                    self.extract_from_ready(node);
                }
            }
            NodeState::Blocked => {}
        }
    }
}

//! The set of scheduler instances plus their collaborators.
//!
//! `System` plays the roles the scheduler core expects from the rest of
//! the kernel: it owns the thread and processor tables, routes each
//! operation to the right instance and drives help propagation with an
//! explicit work list, so no instance ever calls into another.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::config::{QueueKind, SystemConfig};

use super::context::{SchedEnv, SmpScheduler};
use super::node::SmpNode;
use super::ops::SchedulerOps;
use super::percpu::ProcessorTable;
use super::queue::{PriorityReadyQueue, SimpleReadyQueue};
use super::stats;
use super::thread::{Thread, ThreadTable};
use super::types::{
    CpuIndex, NodeRef, Priority, SchedulerId, ThreadId, ThreadSchedulerState, PRIORITY_IDLE,
};

pub struct System {
    config: SystemConfig,
    instances: Vec<Box<dyn SchedulerOps>>,
    threads: ThreadTable,
    cpus: ProcessorTable,
}

impl System {
    /// Builds every instance and starts one idle thread per owned processor.
    pub fn new(config: SystemConfig) -> Result<Self, &'static str> {
        config.validate()?;

        let mut cpus = ProcessorTable::new(config.processor_count);
        let mut threads = ThreadTable::new();
        let mut instances: Vec<Box<dyn SchedulerOps>> = Vec::with_capacity(config.instances.len());

        for (index, instance_config) in config.instances.iter().enumerate() {
            let id = SchedulerId(index as u16);
            let mut instance: Box<dyn SchedulerOps> = match instance_config.queue {
                QueueKind::Simple => Box::new(SmpScheduler::<SimpleReadyQueue>::new(id, instance_config)),
                QueueKind::Priority => Box::new(SmpScheduler::<PriorityReadyQueue>::new(id, instance_config)),
            };

            for &cpu in &instance_config.processors {
                cpus.set_owner(cpu, id);
                let node = instance.idle_node_initialize(threads.next_id());
                let idle = threads.create(true, NodeRef { scheduler: id, index: node }, cpu);
                let mut env = SchedEnv {
                    threads: &mut threads,
                    cpus: &mut cpus,
                };
                instance.start_idle(&mut env, idle, node, cpu);
            }

            crate::kinfo!(
                "sched: instance {} '{}' ({:?}, {:?}, {:?}) owns cpus {:?}",
                index,
                instance_config.name,
                instance_config.queue,
                instance_config.tie_break,
                instance_config.allocation,
                instance_config.processors
            );
            instances.push(instance);
        }

        Ok(Self {
            config,
            instances,
            threads,
            cpus,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    pub fn thread(&self, thread: ThreadId) -> &Thread {
        &self.threads[thread]
    }

    pub fn cpus(&self) -> &ProcessorTable {
        &self.cpus
    }

    pub fn cpus_mut(&mut self) -> &mut ProcessorTable {
        &mut self.cpus
    }

    pub fn instance(&self, id: SchedulerId) -> Option<&dyn SchedulerOps> {
        self.instances.get(id.as_usize()).map(|instance| instance.as_ref())
    }

    pub fn instances(&self) -> impl Iterator<Item = &dyn SchedulerOps> {
        self.instances.iter().map(|instance| instance.as_ref())
    }

    pub fn find_instance(&self, name: &str) -> Option<SchedulerId> {
        self.instances
            .iter()
            .find(|instance| instance.name() == name)
            .map(|instance| instance.id())
    }

    /// Home node of `thread`.
    pub fn home_node(&self, thread: ThreadId) -> Option<&SmpNode> {
        self.node(self.threads[thread].home())
    }

    pub fn node(&self, node: NodeRef) -> Option<&SmpNode> {
        self.instance(node.scheduler)?.node(node.index)
    }

    pub fn heir(&self, cpu: CpuIndex) -> Option<ThreadId> {
        self.cpus.heir(cpu)
    }

    pub fn executing(&self, cpu: CpuIndex) -> Option<ThreadId> {
        self.cpus.executing(cpu)
    }

    /// Threads of `id` in Scheduled order, showing the thread each node runs.
    pub fn scheduled_threads(&self, id: SchedulerId) -> Vec<ThreadId> {
        self.instance_threads(id, |instance| instance.scheduled())
    }

    /// Users of the ready nodes of `id`, most urgent first.
    pub fn ready_threads(&self, id: SchedulerId) -> Vec<ThreadId> {
        self.instance_threads(id, |instance| instance.ready())
    }

    fn instance_threads(
        &self,
        id: SchedulerId,
        order: impl Fn(&dyn SchedulerOps) -> Vec<crate::chain::NodeIndex>,
    ) -> Vec<ThreadId> {
        let Some(instance) = self.instance(id) else {
            return Vec::new();
        };
        order(instance)
            .into_iter()
            .filter_map(|index| instance.node(index).map(|node| node.running()))
            .collect()
    }

    // ========================================================================
    // Thread operations
    // ========================================================================

    /// Creates a Blocked thread with its home node in `scheduler`.
    pub fn create_thread(&mut self, scheduler: SchedulerId, level: u32) -> Result<ThreadId, &'static str> {
        if level >= PRIORITY_IDLE {
            return Err("priority level reserved for idle threads");
        }
        let first_cpu = self
            .config
            .instances
            .get(scheduler.as_usize())
            .and_then(|instance| instance.processors.first().copied())
            .ok_or("unknown scheduler instance")?;

        let id = self.threads.next_id();
        let index = self.instances[scheduler.as_usize()].node_initialize(id, Priority::from_level(level));
        let thread = self.threads.create(false, NodeRef { scheduler, index }, first_cpu);
        crate::kdebug!("sched: created {} in instance {} at level {}", thread, scheduler.0, level);
        Ok(thread)
    }

    /// Makes `thread` eligible to run. Returns the thread the home instance
    /// reported as needing help; it has already been routed.
    pub fn unblock(&mut self, thread: ThreadId) -> Option<ThreadId> {
        if self.threads[thread].state() != ThreadSchedulerState::Blocked {
            return None;
        }
        let home = self.threads[thread].home();
        let needs_help = self.with_instance(home.scheduler, |instance, env| {
            instance.unblock(env, thread, home.index)
        });
        self.route_help(needs_help);
        needs_help
    }

    /// Blocks `thread` in its home instance and drops every help relation
    /// it holds. Nodes lent to it go back to their owners.
    pub fn block(&mut self, thread: ThreadId) {
        if self.threads[thread].state() == ThreadSchedulerState::Blocked {
            return;
        }

        let home = self.threads[thread].home();
        let current = self.threads[thread].node();

        // Blocked before any node is withdrawn, so no instance hands it a
        // processor again while the helpers are released.
        self.threads[thread].state = ThreadSchedulerState::Blocked;
        self.threads[thread].node = home;
        self.with_instance(home.scheduler, |instance, env| {
            instance.block(env, thread, home.index)
        });

        let mut lenders = core::mem::take(&mut self.threads[thread].helpers);
        if current != home {
            if let Some(owner) = self.node(current).map(|node| node.owner()) {
                if !lenders.contains(&owner) {
                    lenders.push(owner);
                }
            }
        }
        for helper in lenders {
            let scheduler = self.threads[helper].home().scheduler;
            let displaced = self.with_instance(scheduler, |instance, env| {
                instance.withdraw_help(env, helper, thread)
            });
            debug_assert!(displaced.is_none());
        }
        crate::ktrace!("sched: {} blocked, help relations dropped", thread);
    }

    /// Changes the priority level of `thread`'s home node.
    pub fn set_priority(&mut self, thread: ThreadId, level: u32, prepend: bool) -> Result<Option<ThreadId>, &'static str> {
        if level >= PRIORITY_IDLE {
            return Err("priority level reserved for idle threads");
        }
        let home = self.threads[thread].home();
        let needs_help = self.with_instance(home.scheduler, |instance, env| {
            instance.update_priority(env, home.index, Priority::from_level(level), prepend)
        });
        self.route_help(needs_help);
        Ok(needs_help)
    }

    /// Yields the node `thread` currently runs on.
    pub fn yield_thread(&mut self, thread: ThreadId) -> Option<ThreadId> {
        let node = self.threads[thread].node();
        let needs_help = self.with_instance(node.scheduler, |instance, env| {
            instance.yield_processor(env, node.index)
        });
        self.route_help(needs_help);
        needs_help
    }

    pub fn make_sticky(&mut self, thread: ThreadId) {
        let home = self.threads[thread].home();
        let needs_help = self.with_instance(home.scheduler, |instance, env| {
            instance.make_sticky(env, home.index)
        });
        self.route_help(needs_help);
    }

    pub fn clean_sticky(&mut self, thread: ThreadId) {
        let home = self.threads[thread].home();
        self.with_instance(home.scheduler, |instance, env| {
            instance.clean_sticky(env, home.index)
        });
    }

    // ========================================================================
    // Help protocol
    // ========================================================================

    /// One help step: offers the home node of `offers_help` to `needs_help`.
    /// Returns the next thread needing help, which is routed before return.
    pub fn ask_for_help(&mut self, offers_help: ThreadId, needs_help: ThreadId) -> Option<ThreadId> {
        let scheduler = self.threads[offers_help].home().scheduler;
        let next = self.with_instance(scheduler, |instance, env| {
            instance.ask_for_help(env, offers_help, needs_help)
        });
        self.reconsider(needs_help);
        if next != Some(needs_help) {
            self.route_help(next);
        }
        next
    }

    /// Registers `offers_help` as a helper of `needs_help` and asks for help.
    pub fn offer_help(&mut self, offers_help: ThreadId, needs_help: ThreadId) -> Option<ThreadId> {
        debug_assert_ne!(offers_help, needs_help);
        let helpers = &mut self.threads[needs_help].helpers;
        if !helpers.contains(&offers_help) {
            helpers.push(offers_help);
        }
        self.ask_for_help(offers_help, needs_help)
    }

    /// Ends a help relation. A thread that lost its processor is re-routed.
    pub fn withdraw_help(&mut self, offers_help: ThreadId, needs_help: ThreadId) {
        self.threads[needs_help].helpers.retain(|&helper| helper != offers_help);
        let scheduler = self.threads[offers_help].home().scheduler;
        let displaced = self.with_instance(scheduler, |instance, env| {
            instance.withdraw_help(env, offers_help, needs_help)
        });
        self.route_help(displaced);
    }

    /// Drives help propagation for `first` and everything it displaces.
    ///
    /// Each round offers the thread its own home node, then every helper in
    /// offer order. The number of rounds is bounded by the configured help
    /// round limit.
    fn route_help(&mut self, first: Option<ThreadId>) {
        let Some(first) = first else {
            return;
        };

        let mut pending = VecDeque::new();
        pending.push_back(first);
        let mut rounds = 0usize;

        while let Some(needs_help) = pending.pop_front() {
            if rounds == self.config.help_round_limit {
                crate::kwarn!(
                    "sched: help propagation stopped after {} rounds, {} threads left waiting",
                    rounds,
                    pending.len() + 1
                );
                break;
            }
            rounds += 1;

            let mut offers = Vec::with_capacity(1 + self.threads[needs_help].helpers().len());
            offers.push(needs_help);
            offers.extend_from_slice(self.threads[needs_help].helpers());

            for offers_help in offers {
                if !self.threads.is_ready(needs_help) {
                    break;
                }
                let scheduler = self.threads[offers_help].home().scheduler;
                let next = self.with_instance(scheduler, |instance, env| {
                    instance.ask_for_help(env, offers_help, needs_help)
                });
                if let Some(next) = next {
                    if next != needs_help && !pending.contains(&next) {
                        pending.push_back(next);
                    }
                }
            }
            self.reconsider(needs_help);
        }
    }

    fn reconsider(&mut self, thread: ThreadId) {
        let home = self.threads[thread].home();
        if self.threads[thread].node() == home {
            return;
        }
        self.with_instance(home.scheduler, |instance, env| {
            instance.reconsider_help_request(env, thread, home.index)
        });
    }

    // ========================================================================
    // Dispatch and diagnostics
    // ========================================================================

    /// Performs the pending context switch of `cpu`.
    pub fn dispatch(&mut self, cpu: CpuIndex) -> Option<ThreadId> {
        self.cpus.dispatch(cpu)
    }

    pub fn dispatch_all(&mut self) -> usize {
        self.cpus.dispatch_all()
    }

    pub fn dump(&self) {
        for instance in self.instances() {
            stats::dump_instance(instance);
        }
        stats::dump_processors(&self.cpus);
    }

    /// Checks every instance plus the processor bindings.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        for instance in self.instances() {
            instance.check_invariants()?;
        }

        for cpu in self.cpus.iter() {
            if cpu.owner().is_none() {
                continue;
            }
            let heir = cpu.heir().ok_or("owned processor without heir")?;
            let thread = &self.threads[heir];
            if thread.cpu() != cpu.index() {
                return Err("heir assigned to a different processor");
            }
            if thread.state() != ThreadSchedulerState::Scheduled {
                return Err("heir is not scheduled");
            }
        }

        for thread in self.threads.iter() {
            if thread.state() == ThreadSchedulerState::Scheduled && self.cpus.heir(thread.cpu()) != Some(thread.id()) {
                return Err("scheduled thread is not the heir of its processor");
            }
        }
        Ok(())
    }

    fn with_instance<R>(
        &mut self,
        id: SchedulerId,
        f: impl FnOnce(&mut dyn SchedulerOps, &mut SchedEnv<'_>) -> R,
    ) -> R {
        let mut env = SchedEnv {
            threads: &mut self.threads,
            cpus: &mut self.cpus,
        };
        f(self.instances[id.as_usize()].as_mut(), &mut env)
    }
}

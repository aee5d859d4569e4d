//! Processor allocation.
//!
//! A node that just won a processor gets the processor of the node it
//! displaced. The lazy policy avoids a migration when the winner is still
//! executing on another processor of the same instance: the winner stays
//! and the heir of that processor moves to the freed one instead.

use super::context::{SchedEnv, SmpScheduler};
use super::queue::ReadyQueue;
use super::types::{CpuIndex, NodeState, ThreadId};
use crate::chain::NodeIndex;
use crate::config::AllocationPolicy;

impl<Q: ReadyQueue> SmpScheduler<Q> {
    /// Binds `node` to `cpu` (the victim's processor) and marks it Scheduled.
    pub(super) fn allocate_processor(&mut self, env: &mut SchedEnv<'_>, node: NodeIndex, cpu: CpuIndex) {
        self.nodes[node].change_state(NodeState::Scheduled);
        let thread = self.nodes[node].running();
        match self.allocation {
            AllocationPolicy::Lazy => self.allocate_processor_lazy(env, thread, cpu),
            AllocationPolicy::Exact => self.allocate_processor_exact(env, thread, cpu),
        }
    }

    fn allocate_processor_lazy(&mut self, env: &mut SchedEnv<'_>, scheduled: ThreadId, victim_cpu: CpuIndex) {
        let scheduled_cpu = env.threads.get_cpu(scheduled);

        if victim_cpu == scheduled_cpu {
            env.cpus.update_heir(victim_cpu, scheduled);
            return;
        }

        let still_executing = env.cpus.executing(scheduled_cpu) == Some(scheduled);
        if still_executing && env.cpus.owner(scheduled_cpu) == Some(self.id) {
            if let Some(heir) = env.cpus.heir(scheduled_cpu) {
                crate::ktrace!(
                    "{}: {} stays on cpu{}, {} moves to cpu{}",
                    self.name,
                    scheduled,
                    scheduled_cpu,
                    heir,
                    victim_cpu
                );
                env.cpus.update_heir(scheduled_cpu, scheduled);
                self.move_thread_to(env, heir, victim_cpu);
                env.cpus.update_heir(victim_cpu, heir);
                return;
            }
        }

        self.allocate_processor_exact(env, scheduled, victim_cpu);
    }

    fn allocate_processor_exact(&mut self, env: &mut SchedEnv<'_>, scheduled: ThreadId, cpu: CpuIndex) {
        self.move_thread_to(env, scheduled, cpu);
        env.cpus.update_heir(cpu, scheduled);
    }

    /// Assigns `cpu` to `thread`, counting a migration when it changes.
    pub(super) fn move_thread_to(&self, env: &mut SchedEnv<'_>, thread: ThreadId, cpu: CpuIndex) {
        let from = env.threads.get_cpu(thread);
        if env.threads.set_cpu(thread, cpu) {
            env.cpus.record_migration(from, cpu);
        }
    }
}

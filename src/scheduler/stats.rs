//! Scheduler statistics and debugging functions

use super::percpu::ProcessorTable;
use super::SchedulerOps;

/// Per-instance counters, updated inside the instance's critical section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub enqueues: u64,
    pub blocks: u64,
    pub unblocks: u64,
    pub preemptions: u64,
    pub yields: u64,
    pub priority_changes: u64,
    pub idle_uses: u64,
    pub help_requests: u64,
    pub help_accepted: u64,
    pub discarded: u64, // Ready nodes dropped by try_to_schedule
}

/// Logs the Scheduled list, the ready order and the idle pool of an instance.
pub fn dump_instance(instance: &dyn SchedulerOps) {
    crate::kinfo!(
        "=== Scheduler {} ({} cpus) ===",
        instance.name(),
        instance.processor_count()
    );
    crate::kinfo!("{:<6} {:<10} {:<6} {:<6} {:<5} {:<6}", "Slot", "State", "Owner", "User", "Prio", "Sticky");

    let sections = [
        ("S", instance.scheduled()),
        ("R", instance.ready()),
        ("I", instance.idle_pool()),
    ];
    for (tag, nodes) in sections.iter() {
        for &index in nodes.iter() {
            let Some(node) = instance.node(index) else {
                continue;
            };
            crate::kinfo!(
                "{}{:<5} {:<10} {:<6} {:<6} {:<5} {:<6}",
                tag,
                index.as_usize(),
                node.state().as_str(),
                node.owner(),
                node.running(),
                node.priority().level(),
                node.sticky_level()
            );
        }
    }

    let stats = instance.stats();
    crate::kinfo!(
        "enqueues={} blocks={} unblocks={} preemptions={} yields={}",
        stats.enqueues,
        stats.blocks,
        stats.unblocks,
        stats.preemptions,
        stats.yields
    );
    crate::kinfo!(
        "idle_uses={} help_requests={} help_accepted={} discarded={}",
        stats.idle_uses,
        stats.help_requests,
        stats.help_accepted,
        stats.discarded
    );
}

/// Logs every processor binding.
pub fn dump_processors(cpus: &ProcessorTable) {
    use core::sync::atomic::Ordering;

    crate::kinfo!("=== Processors ===");
    for cpu in cpus.iter() {
        crate::kinfo!(
            "cpu{}: owner={:?} heir={:?} executing={:?} heir_updates={} migrations in/out={}/{}",
            cpu.index(),
            cpu.owner().map(|id| id.0),
            cpu.heir(),
            cpu.executing(),
            cpu.heir_updates.load(Ordering::Relaxed),
            cpu.migrations_in.load(Ordering::Relaxed),
            cpu.migrations_out.load(Ordering::Relaxed)
        );
    }
}

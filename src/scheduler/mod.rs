//! Scheduler subsystem
//!
//! This module implements partitioned SMP scheduling. Each scheduler
//! instance owns a fixed set of processors and keeps exactly one Scheduled
//! node per processor: a real thread, or an idle thread when nothing else
//! can run.
//!
//! ## Node states
//!
//! - **Blocked**: the node does not compete for a processor
//! - **Ready**: the node competes but holds no processor
//! - **Scheduled**: the node is bound to one of the instance's processors
//!
//! ## Help protocol
//!
//! A thread blocked on a resource owned by a thread of another instance
//! may offer its own node to the owner. The owner then runs on that node's
//! processor, which implements priority inheritance across partitions.
//! Operations that displace a thread return it as `needs_help`; the
//! [`System`] feeds such threads through a bounded work list.
//!
//! ## Module Organization
//!
//! - `types`: Identifiers, priority encoding, state tags
//! - `node`: Scheduler nodes and the per-instance node arena
//! - `thread`: Thread records (home node, processor, helpers)
//! - `percpu`: Processor table (heir, executing, per-CPU counters)
//! - `queue`: Ready-queue trait and its simple and priority backends
//! - `context`: Instance context, ready set and idle pool handling
//! - `smp`: Enqueue, block, unblock, priority change and yield
//! - `allocate`: Lazy and exact processor allocation
//! - `help`: Ask for help, withdraw help, sticky nodes
//! - `ops`: Object-safe instance interface
//! - `system`: Instances plus collaborators, help work list
//! - `stats`: Statistics and debugging functions

mod allocate;
mod context;
mod help;
mod node;
mod ops;
pub mod percpu;
mod queue;
mod smp;
mod stats;
mod system;
mod thread;
mod types;

pub use context::{SchedEnv, SmpScheduler};
pub use node::{priority_less_equal, NodeTable, SmpNode};
pub use ops::SchedulerOps;
pub use percpu::{HeirObserver, PerCpu, ProcessorTable};
pub use queue::{PriorityReadyQueue, ReadyQueue, SimpleReadyQueue};
pub use stats::SchedulerStats;
pub use system::System;
pub use thread::{Thread, ThreadTable};
pub use types::{
    CpuIndex, NodeRef, NodeState, Priority, SchedAction, SchedulerId, ThreadId,
    ThreadSchedulerState, PRIORITY_IDLE, PRIORITY_LEVELS,
};

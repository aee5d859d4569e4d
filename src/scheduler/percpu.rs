//! Per-CPU dispatch state
//!
//! The [`ProcessorTable`] is the only place processor bindings live. It is
//! passed into every scheduler operation; nothing here is global.
//!
//! ## Heir and executing
//!
//! - `heir`: thread the processor must run next, decided by the scheduler
//! - `executing`: thread the processor runs right now
//!
//! The two differ between a scheduling decision and the following context
//! switch ([`ProcessorTable::dispatch`]). `dispatch_necessary` flags that gap.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::types::{CpuIndex, SchedulerId, ThreadId};

/// Called whenever the heir of a processor changes: `(cpu, old, new)`.
pub type HeirObserver = fn(CpuIndex, Option<ThreadId>, ThreadId);

pub struct PerCpu {
    index: CpuIndex,
    owner: Option<SchedulerId>,
    heir: Option<ThreadId>,
    executing: Option<ThreadId>,

    /// Heir differs from executing and a context switch is pending
    dispatch_necessary: AtomicBool,

    /// Number of heir changes
    pub heir_updates: AtomicU64,

    /// Number of context switches performed by `dispatch`
    pub dispatches: AtomicU64,

    /// Threads that left this CPU for another one
    pub migrations_out: AtomicU64,

    /// Threads that arrived from another CPU
    pub migrations_in: AtomicU64,
}

impl PerCpu {
    const fn new(index: CpuIndex) -> Self {
        Self {
            index,
            owner: None,
            heir: None,
            executing: None,
            dispatch_necessary: AtomicBool::new(false),
            heir_updates: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            migrations_out: AtomicU64::new(0),
            migrations_in: AtomicU64::new(0),
        }
    }

    pub fn index(&self) -> CpuIndex {
        self.index
    }

    pub fn owner(&self) -> Option<SchedulerId> {
        self.owner
    }

    pub fn heir(&self) -> Option<ThreadId> {
        self.heir
    }

    pub fn executing(&self) -> Option<ThreadId> {
        self.executing
    }

    pub fn dispatch_necessary(&self) -> bool {
        self.dispatch_necessary.load(Ordering::Acquire)
    }
}

pub struct ProcessorTable {
    cpus: Vec<PerCpu>,
    cpu_self: CpuIndex,
    observer: Option<HeirObserver>,
}

impl ProcessorTable {
    pub fn new(count: usize) -> Self {
        Self {
            cpus: (0..count).map(PerCpu::new).collect(),
            cpu_self: 0,
            observer: None,
        }
    }

    pub fn count(&self) -> usize {
        self.cpus.len()
    }

    pub fn get(&self, cpu: CpuIndex) -> Option<&PerCpu> {
        self.cpus.get(cpu)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerCpu> {
        self.cpus.iter()
    }

    pub fn set_observer(&mut self, observer: Option<HeirObserver>) {
        self.observer = observer;
    }

    /// Processor performing the current operation.
    pub fn cpu_self(&self) -> CpuIndex {
        self.cpu_self
    }

    pub fn set_cpu_self(&mut self, cpu: CpuIndex) {
        debug_assert!(cpu < self.cpus.len());
        self.cpu_self = cpu;
    }

    pub(crate) fn set_owner(&mut self, cpu: CpuIndex, owner: SchedulerId) {
        self.cpus[cpu].owner = Some(owner);
    }

    pub fn owner(&self, cpu: CpuIndex) -> Option<SchedulerId> {
        self.cpus.get(cpu).and_then(|c| c.owner)
    }

    pub fn heir(&self, cpu: CpuIndex) -> Option<ThreadId> {
        self.cpus.get(cpu).and_then(|c| c.heir)
    }

    pub fn executing(&self, cpu: CpuIndex) -> Option<ThreadId> {
        self.cpus.get(cpu).and_then(|c| c.executing)
    }

    /// True when `thread` is the executing thread of some processor.
    pub fn is_executing(&self, thread: ThreadId) -> bool {
        self.cpus.iter().any(|c| c.executing == Some(thread))
    }

    /// Makes `thread` the heir of `cpu` and notifies the observer.
    pub fn update_heir(&mut self, cpu: CpuIndex, thread: ThreadId) {
        let observer = self.observer;
        let per_cpu = &mut self.cpus[cpu];
        let old = per_cpu.heir;
        if old == Some(thread) {
            return;
        }

        per_cpu.heir = Some(thread);
        per_cpu.heir_updates.fetch_add(1, Ordering::Relaxed);
        if per_cpu.executing != Some(thread) {
            per_cpu.dispatch_necessary.store(true, Ordering::Release);
        }
        crate::ktrace!("cpu{}: heir {:?} -> {}", cpu, old, thread);

        if let Some(observer) = observer {
            observer(cpu, old, thread);
        }
    }

    /// Start-up binding: heir and executing at once.
    pub(crate) fn bind(&mut self, cpu: CpuIndex, thread: ThreadId) {
        let per_cpu = &mut self.cpus[cpu];
        per_cpu.heir = Some(thread);
        per_cpu.executing = Some(thread);
        per_cpu.dispatch_necessary.store(false, Ordering::Release);
    }

    pub(crate) fn record_migration(&self, from: CpuIndex, to: CpuIndex) {
        self.cpus[from].migrations_out.fetch_add(1, Ordering::Relaxed);
        self.cpus[to].migrations_in.fetch_add(1, Ordering::Relaxed);
    }

    /// Performs the pending context switch of `cpu`. Returns the new
    /// executing thread if it changed.
    pub fn dispatch(&mut self, cpu: CpuIndex) -> Option<ThreadId> {
        let per_cpu = &mut self.cpus[cpu];
        if !per_cpu.dispatch_necessary.swap(false, Ordering::AcqRel) {
            return None;
        }
        if per_cpu.executing == per_cpu.heir {
            return None;
        }
        per_cpu.executing = per_cpu.heir;
        per_cpu.dispatches.fetch_add(1, Ordering::Relaxed);
        per_cpu.executing
    }

    pub fn dispatch_all(&mut self) -> usize {
        (0..self.cpus.len())
            .filter(|&cpu| self.dispatch(cpu).is_some())
            .count()
    }
}

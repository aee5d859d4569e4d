//! Lazy and exact processor allocation

use super::{assert_consistent, start, with_config, BACKENDS};
use crate::config::{AllocationPolicy, InstanceConfig, QueueKind, SystemConfig, DEFAULT_HELP_ROUND_LIMIT};
use crate::scheduler::{SchedulerId, System, ThreadId};
use core::sync::atomic::Ordering;

const DEFAULT: SchedulerId = SchedulerId(0);

fn two_cpus(queue: QueueKind, allocation: AllocationPolicy) -> System {
    with_config(SystemConfig {
        processor_count: 2,
        instances: vec![InstanceConfig::new("default", queue, &[0, 1]).with_allocation(allocation)],
        help_round_limit: DEFAULT_HELP_ROUND_LIMIT,
    })
}

/// A runs on cpu1, B on cpu0, then C preempts A without a dispatch in
/// between, so A is still executing on cpu1 when B blocks.
fn preempt_then_block(sys: &mut System) -> (ThreadId, ThreadId) {
    let a = start(sys, DEFAULT, 5);
    let b = start(sys, DEFAULT, 3);
    sys.dispatch_all();
    assert_eq!((sys.executing(1), sys.executing(0)), (Some(a), Some(b)));

    let c = start(sys, DEFAULT, 1);
    assert_eq!(sys.heir(1), Some(c));
    assert_eq!(sys.executing(1), Some(a));

    sys.block(b);
    (a, c)
}

#[test]
fn test_lazy_keeps_executing_thread_in_place() {
    for queue in BACKENDS {
        let mut sys = two_cpus(queue, AllocationPolicy::Lazy);
        let (a, c) = preempt_then_block(&mut sys);

        assert_eq!(sys.heir(1), Some(a));
        assert_eq!(sys.heir(0), Some(c));
        assert_eq!(sys.thread(c).cpu(), 0);
        assert_consistent(&sys);

        // cpu1 never switched away from A
        sys.dispatch_all();
        assert_eq!(sys.executing(1), Some(a));
        assert_eq!(sys.cpus().get(1).unwrap().dispatches.load(Ordering::Relaxed), 1);
    }
}

#[test]
fn test_exact_moves_winner_to_victim_processor() {
    for queue in BACKENDS {
        let mut sys = two_cpus(queue, AllocationPolicy::Exact);
        let (a, c) = preempt_then_block(&mut sys);

        assert_eq!(sys.heir(0), Some(a));
        assert_eq!(sys.heir(1), Some(c));
        assert_eq!(sys.thread(a).cpu(), 0);
        assert_consistent(&sys);
    }
}

#[test]
fn test_migrations_are_counted() {
    let mut sys = two_cpus(QueueKind::Simple, AllocationPolicy::Exact);
    let (a, _) = preempt_then_block(&mut sys);
    assert_eq!(sys.thread(a).cpu(), 0);

    let cpus = sys.cpus();
    let out_of_1 = cpus.get(1).unwrap().migrations_out.load(Ordering::Relaxed);
    let into_0 = cpus.get(0).unwrap().migrations_in.load(Ordering::Relaxed);
    assert!(out_of_1 >= 1);
    assert!(into_0 >= 1);
}

#[test]
fn test_heir_observer_sees_every_change() {
    use std::sync::Mutex;

    static CHANGES: Mutex<Vec<(usize, u32)>> = Mutex::new(Vec::new());

    fn observe(cpu: usize, _old: Option<ThreadId>, new: ThreadId) {
        CHANGES.lock().unwrap().push((cpu, new.0));
    }

    let mut sys = with_config(SystemConfig::single(1, QueueKind::Simple));
    sys.cpus_mut().set_observer(Some(observe));

    let a = start(&mut sys, DEFAULT, 2);
    let b = start(&mut sys, DEFAULT, 1);
    sys.block(b);

    let changes = CHANGES.lock().unwrap().clone();
    assert_eq!(changes, vec![(0, a.0), (0, b.0), (0, a.0)]);
    assert_eq!(sys.cpus().get(0).unwrap().heir_updates.load(Ordering::Relaxed), 3);
}

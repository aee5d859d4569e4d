//! Sticky nodes keep their processor through an idle placeholder

use super::{assert_consistent, partitioned, single, spawn, start, state, BACKENDS};
use crate::scheduler::{NodeState, SchedulerId, ThreadSchedulerState};

const DEFAULT: SchedulerId = SchedulerId(0);

#[test]
fn test_blocked_sticky_thread_keeps_processor() {
    for queue in BACKENDS {
        let mut sys = single(1, queue);
        let a = start(&mut sys, DEFAULT, 5);
        let b = start(&mut sys, DEFAULT, 7);

        sys.make_sticky(a);
        sys.block(a);

        let idle = sys.heir(0).unwrap();
        assert!(sys.thread(idle).is_idle());
        assert_eq!(state(&sys, a), ThreadSchedulerState::Blocked);
        let node = sys.home_node(a).unwrap();
        assert_eq!(node.state(), NodeState::Scheduled);
        assert_eq!(node.idle(), Some(idle));
        assert_eq!(sys.ready_threads(DEFAULT), vec![b]);
        assert_consistent(&sys);

        sys.clean_sticky(a);
        assert_eq!(sys.heir(0), Some(b));
        assert_eq!(sys.home_node(a).unwrap().state(), NodeState::Blocked);
        assert_eq!(sys.instance(DEFAULT).unwrap().idle_pool().len(), 1);
        assert_consistent(&sys);
    }
}

#[test]
fn test_unblock_takes_processor_back_from_placeholder() {
    for queue in BACKENDS {
        let mut sys = single(1, queue);
        let a = start(&mut sys, DEFAULT, 5);
        let _b = start(&mut sys, DEFAULT, 7);

        sys.make_sticky(a);
        sys.block(a);
        assert_eq!(sys.unblock(a), None);

        assert_eq!(sys.heir(0), Some(a));
        assert_eq!(sys.home_node(a).unwrap().idle(), None);
        assert_eq!(sys.home_node(a).unwrap().sticky_level(), 2);
        assert_consistent(&sys);

        sys.clean_sticky(a);
        assert_eq!(sys.heir(0), Some(a));
        assert_consistent(&sys);
    }
}

#[test]
fn test_sticky_blocked_thread_claims_processor() {
    let mut sys = single(2, crate::config::QueueKind::Simple);
    let a = spawn(&mut sys, DEFAULT, 4);
    let b = start(&mut sys, DEFAULT, 6);

    // Blocked node with a reservation enters the ready set and wins a processor
    sys.make_sticky(a);
    let node = sys.home_node(a).unwrap();
    assert_eq!(node.state(), NodeState::Scheduled);
    assert_eq!(state(&sys, a), ThreadSchedulerState::Blocked);
    let placeholder = node.idle().unwrap();
    assert_eq!(sys.heir(sys.thread(placeholder).cpu()), Some(placeholder));
    assert_eq!(state(&sys, b), ThreadSchedulerState::Scheduled);
    assert_consistent(&sys);

    sys.clean_sticky(a);
    assert_eq!(sys.home_node(a).unwrap().state(), NodeState::Blocked);
    assert_consistent(&sys);
}

#[test]
fn test_sticky_node_preempted_returns_placeholder() {
    for queue in BACKENDS {
        let mut sys = single(1, queue);
        let a = start(&mut sys, DEFAULT, 5);
        sys.make_sticky(a);
        sys.block(a);
        assert!(sys.instance(DEFAULT).unwrap().idle_pool().is_empty());

        // A more urgent thread takes the processor; the placeholder returns to the pool
        let c = start(&mut sys, DEFAULT, 1);
        assert_eq!(sys.heir(0), Some(c));
        assert_eq!(sys.home_node(a).unwrap().state(), NodeState::Ready);
        assert_eq!(sys.home_node(a).unwrap().idle(), None);
        assert_eq!(sys.instance(DEFAULT).unwrap().idle_pool().len(), 1);
        assert_consistent(&sys);

        // The reserved node wins again and keeps the processor through a placeholder
        sys.block(c);
        assert_consistent(&sys);
        let heir = sys.heir(0).unwrap();
        assert!(sys.thread(heir).is_idle());
        assert_eq!(sys.home_node(a).unwrap().state(), NodeState::Scheduled);
        assert_eq!(sys.home_node(a).unwrap().idle(), Some(heir));
    }
}

#[test]
fn test_rejected_enqueue_restores_placeholder_without_new_use() {
    for queue in BACKENDS {
        let (mut sys, a, b) = partitioned(queue);
        let s = start(&mut sys, a, 3);
        sys.make_sticky(s);
        sys.block(s);
        let placeholder = sys.heir(0).unwrap();
        assert!(sys.thread(placeholder).is_idle());
        assert_eq!(sys.instance(a).unwrap().stats().idle_uses, 1);

        // M lends its ready node to W, then W runs at home and M blocks
        let m = start(&mut sys, a, 5);
        let w = start(&mut sys, b, 2);
        let x = start(&mut sys, b, 1);
        assert_eq!(sys.offer_help(m, w), None);
        sys.block(x);
        assert_eq!(sys.heir(1), Some(w));
        sys.block(m);
        assert_eq!(sys.home_node(m).unwrap().state(), NodeState::Ready);
        assert_consistent(&sys);

        // The boosted node would win cpu0 but has no ready user and is dropped
        let discarded = sys.instance(a).unwrap().stats().discarded;
        assert_eq!(sys.set_priority(m, 0, false), Ok(None));
        assert_eq!(sys.home_node(m).unwrap().state(), NodeState::Blocked);
        assert_eq!(sys.heir(0), Some(placeholder));
        assert_eq!(sys.home_node(s).unwrap().state(), NodeState::Scheduled);
        assert_eq!(sys.home_node(s).unwrap().idle(), Some(placeholder));

        let stats = sys.instance(a).unwrap().stats();
        assert_eq!(stats.discarded, discarded + 1);
        assert_eq!(stats.idle_uses, 1);
        assert_consistent(&sys);
    }
}

//! Priority encoding and node state machine

use crate::scheduler::{NodeState, Priority, SmpNode, ThreadId, PRIORITY_IDLE};

#[test]
fn test_priority_encoding() {
    let p = Priority::from_level(7);
    assert_eq!(p.raw(), 14);
    assert_eq!(p.level(), 7);
    assert!(!p.is_append());

    let appended = p.append();
    assert_eq!(appended.raw(), 15);
    assert!(appended.is_append());
    assert_eq!(appended.level(), 7);
    assert_eq!(appended.purify(), p);
    assert_eq!(Priority::IDLE.level(), PRIORITY_IDLE);
}

#[test]
fn test_insert_priority_against_cached_priority() {
    let cached = Priority::from_level(4);

    // Append flag: behind equal peers, still ahead of less urgent ones
    assert!(!(cached.append() <= cached));
    assert!(cached.append() <= Priority::from_level(5));

    // Prepend: in front of equal peers
    assert!(cached <= cached);
    assert!(!(Priority::from_level(5) <= cached));
}

#[test]
fn test_state_machine_closure() {
    use NodeState::*;
    let states = [Blocked, Ready, Scheduled];
    for from in states {
        for to in states {
            assert_eq!(from.can_transition_to(to), from != to, "{:?} -> {:?}", from, to);
        }
    }
}

#[test]
fn test_change_state_counts_transitions_only() {
    let mut node = SmpNode::new(ThreadId(3), Priority::from_level(1), false);
    assert_eq!(node.state(), NodeState::Blocked);

    node.change_state(NodeState::Blocked);
    assert_eq!(node.transitions(), 0);

    node.change_state(NodeState::Ready);
    node.change_state(NodeState::Scheduled);
    node.change_state(NodeState::Scheduled);
    node.change_state(NodeState::Blocked);
    assert_eq!(node.transitions(), 3);
    assert_eq!(node.state(), NodeState::Blocked);
}

#[test]
fn test_fresh_node_runs_its_owner() {
    let node = SmpNode::new(ThreadId(9), Priority::from_level(2), false);
    assert_eq!(node.owner(), ThreadId(9));
    assert_eq!(node.user(), ThreadId(9));
    assert_eq!(node.running(), ThreadId(9));
    assert_eq!(node.idle(), None);
    assert_eq!(node.sticky_level(), 0);
    assert!(!node.wants_processor());

    let idle = SmpNode::new(ThreadId(0), Priority::IDLE, true);
    assert!(idle.is_idle_node());
    assert!(idle.wants_processor());
}

#[test]
fn test_thread_id_display() {
    assert_eq!(format!("{}", ThreadId(12)), "T12");
    assert_eq!(format!("{}", Priority::from_level(3).append()), "3");
}

//! Scheduler type definitions
//!
//! Identifiers, the priority encoding and the state tags shared by every
//! scheduler instance.

use core::fmt;

use crate::chain::NodeIndex;

/// Index of a physical processor.
pub type CpuIndex = usize;

/// Number of priority levels (0 = most urgent, 255 = least urgent)
pub const PRIORITY_LEVELS: usize = 256;

/// Level of the idle threads, below every real thread
pub const PRIORITY_IDLE: u32 = (PRIORITY_LEVELS - 1) as u32;

/// Identifier of a thread in the [`super::ThreadTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Index of a scheduler instance inside the [`super::System`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchedulerId(pub u16);

impl SchedulerId {
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A scheduler node, qualified by the instance that stores it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeRef {
    pub scheduler: SchedulerId,
    pub index: NodeIndex,
}

/// Encoded priority: the level shifted left by one, bit 0 is the append flag.
///
/// A cached node priority never carries the append flag. An *insert*
/// priority may: with the flag the node queues behind equal-priority peers,
/// without it in front of them. Comparing with `<=` against a cached
/// priority gives exactly that behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u64);

impl Priority {
    pub const IDLE: Priority = Priority::from_level(PRIORITY_IDLE);

    pub const fn from_level(level: u32) -> Self {
        Self((level as u64) << 1)
    }

    pub const fn level(self) -> u32 {
        (self.0 >> 1) as u32
    }

    /// Insert priority that queues behind equal-priority peers.
    pub const fn append(self) -> Self {
        Self(self.0 | 1)
    }

    pub const fn purify(self) -> Self {
        Self(self.0 & !1)
    }

    pub const fn is_append(self) -> bool {
        self.0 & 1 != 0
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// State of a scheduler node within its instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Blocked,   // Not contending for a processor
    Ready,     // Contending, in the ready set or idle pool
    Scheduled, // In the Scheduled list, bound to a processor
}

impl NodeState {
    /// Transition table. Re-asserting the current state is not a
    /// transition and is not covered here.
    pub const fn can_transition_to(self, to: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, to),
            (Blocked, Scheduled)
                | (Blocked, Ready)
                | (Scheduled, Ready)
                | (Ready, Scheduled)
                | (Scheduled, Blocked)
                | (Ready, Blocked)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            NodeState::Blocked => "Blocked",
            NodeState::Ready => "Ready",
            NodeState::Scheduled => "Scheduled",
        }
    }
}

/// Scheduling state of a thread, independent of which node it uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadSchedulerState {
    Blocked,
    Ready,
    Scheduled,
}

/// Verdict of `try_to_schedule` for a candidate node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedAction {
    DoSchedule,
    DoNotSchedule,
}

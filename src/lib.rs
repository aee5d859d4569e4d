#![no_std]

//! NexaOS SMP scheduling core.
//!
//! Partitioned scheduler instances, each owning a fixed set of processors,
//! decide which thread runs where. Idle threads act as placeholders for
//! processors without real work, and the help protocol lets a thread from
//! one instance borrow a processor of another.
//!
//! The hosting kernel keeps a single [`scheduler::System`] inside an
//! [`critical::IsrLock`] and calls into it from its dispatch path.

extern crate alloc;

pub mod chain;
pub mod config;
pub mod critical;
pub mod logger;
pub mod scheduler;

pub use config::{AllocationPolicy, InstanceConfig, QueueKind, SystemConfig, TieBreak};
pub use scheduler::{System, ThreadId};

/// The scheduler state as the hosting kernel shares it between processors.
pub type SharedSystem = critical::IsrLock<System>;

#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::logger::log($level, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::FATAL, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::ERROR, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::WARN, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::INFO, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::DEBUG, $($arg)*);
    }};
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::TRACE, $($arg)*);
    }};
}

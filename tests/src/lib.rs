//! NexaOS Scheduler Test Suite
//!
//! This crate tests the scheduler core by directly including its source
//! files. This bypasses no_std restrictions while testing the real code.
//!
//! # How it works
//! 1. We define stub macros (kinfo!, ktrace!, etc.) that map to eprintln! or no-op
//! 2. We use `#[path = "..."]` to include the scheduler sources directly
//! 3. The `core::` and `alloc::` references work because std re-exports them

// Re-export alloc crate for code that uses alloc::vec, alloc::string, etc.
extern crate alloc;

// ===========================================================================
// Logging macro stubs
// ===========================================================================

/// Stub for kinfo! - prints to stderr in tests
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        eprintln!("[INFO] {}", format_args!($($arg)*));
    }};
}

/// Stub for ktrace! - no-op in tests (too verbose)
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{}};
}

/// Stub for kwarn! - prints to stderr in tests
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        eprintln!("[WARN] {}", format_args!($($arg)*));
    }};
}

/// Stub for kerror! - prints to stderr in tests
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        eprintln!("[ERROR] {}", format_args!($($arg)*));
    }};
}

/// Stub for kfatal! - prints to stderr in tests
#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        eprintln!("[FATAL] {}", format_args!($($arg)*));
    }};
}

/// Stub for kdebug! - no-op in tests
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{}};
}

// ===========================================================================
// Import scheduler source files directly using #[path]
// ===========================================================================

#[path = "../../src/logger.rs"]
pub mod logger;

#[path = "../../src/critical.rs"]
pub mod critical;

#[path = "../../src/config.rs"]
pub mod config;

// Chain arena and iterator registry
#[path = "../../src/chain/mod.rs"]
pub mod chain;

// Scheduler instances, processor table, System
#[path = "../../src/scheduler/mod.rs"]
pub mod scheduler;

// ===========================================================================
// Test modules
// ===========================================================================

#[cfg(test)]
mod chain_tests;

#[cfg(test)]
mod config_tests;

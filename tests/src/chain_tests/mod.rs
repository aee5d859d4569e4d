//! Chain Test Suite
//!
//! - Sentinel invariants and O(1) link operations
//! - Ordered insertion with FIFO and LIFO tie-breaking
//! - Iterator registry repair on extraction

mod iterator;

//! Property-based tests for tree and diff invariants

mod tree_invariants;

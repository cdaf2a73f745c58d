//! Integration tests for the notes synchronization engine

mod config_layers;
mod sync_scenarios;
mod test_utils;
mod tree_determinism;

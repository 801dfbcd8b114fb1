//! Hypercert marketplace transaction orchestration engine
//!
//! This library is the core behind a hypercert marketplace front-end: it
//! sequences the multi-step external-call flows (buy, list, mint, split,
//! burn, transfer, allowlists, hyperboards, attestations) against a wallet,
//! a marketplace exchange, a Safe, and a backend API, and reports per-step
//! progress that a dialog can subscribe to.
//!
//! ## Architecture
//!
//! - **steps**: pure step state machine with the single-active-step invariant
//! - **progress**: observable handle over a run, plus cooperative cancellation
//! - **strategies**: buy execution plans for EOA and Safe custody
//! - **mutations**: the flow template applied to every state-changing action
//! - **clients**: async trait seams for all external collaborators
//! - **allowlist**: parsing and the exact-sum supply invariant
//! - **errors**: precondition / step-local / validation taxonomy

pub mod allowlist;
pub mod clients;
pub mod config;
pub mod errors;
pub mod mutations;
pub mod observability;
pub mod progress;
pub mod steps;
pub mod strategies;
pub mod types;

// Mock clients for tests and downstream test suites (feature-gated inside)
pub mod test_utils;

// Re-export the EVM primitive types used across the public API
pub use alloy_primitives::{Address, Bytes, B256, U256};

#[cfg(test)]
mod tests {
    mod mutation_flow_tests;
    mod step_property_tests;
    mod strategy_divergence_tests;
}

//! Application layer orchestrating the ledger's use cases.
//!
//! Services here enforce authorization and validation, then hand each mutation
//! to the store as one atomic operation. `WalletEngine` is the facade callers use.

pub mod commission;
pub mod engine;
pub mod reports;
pub mod wallets;
pub mod webhook;
pub mod workflow;

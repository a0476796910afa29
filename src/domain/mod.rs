//! Ledger entities, value objects and the storage ports they persist through.

pub mod actor;
pub mod approval;
pub mod donation;
pub mod ids;
pub mod member;
pub mod money;
pub mod ports;
pub mod transaction;
pub mod wallet;

//! Department wallets for fellowship finances: donations, commissions,
//! sequential withdrawal approvals and payment webhook ingestion.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;

//! Driving adapters: CSV files in, wallet report out.

pub mod csv;
pub mod runner;

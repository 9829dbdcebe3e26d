//! Core modules for provergate's validation gate and prover orchestration.
//!
//! Fingerprinting, the validation ledger, gate policy, process execution,
//! verdict extraction and reporting all live here. Tool surfaces in
//! `crate::plugins` compose them.

pub mod audit;
pub mod checks;
pub mod config;
pub mod digest;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod parser;
pub mod process;
pub mod report;
pub mod store;
pub mod time;
pub mod verdict;
pub mod workspace;

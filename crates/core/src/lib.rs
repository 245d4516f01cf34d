//! Core business logic for Tally.
//!
//! This crate contains pure business logic with no web or database dependencies.
//!
//! # Modules
//!
//! - `ledger` - Per-currency balancing and auto-balancing of journal entries
//! - `reports` - Memoization of derived financial reports
//!
//! Persistence goes through [`reports::ReportCacheBackend`], implemented by
//! the db crate.

pub mod ledger;
pub mod reports;

//! Application layer orchestrating the buy flow.
//!
//! `BuyTransactionEngine` is the entry point: it builds pending transactions,
//! validates them and drives the backend order through its lifecycle.
//! `CachingLimitsService` puts a TTL cache in front of limits lookups.

pub mod engine;
pub mod limits_cache;

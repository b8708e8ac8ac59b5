//! # IA-01 Resource Cache
//!
//! Remembers ledger resources (schemas, credential definitions) once they
//! exist so each is created at most once per process.
//!
//! ```text
//!  caller A ─┐                        ┌─ Ready(id) ──→ return id
//!  caller B ─┼─ get_or_create(key) ──→┤
//!  caller C ─┘                        └─ absent ──→ A creates, B and C wait
//!                                                     │
//!                                    Ok  → store, all receive id
//!                                    Err → drop, all receive err
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cache;
pub mod ledger;

pub use cache::{CacheStats, CacheStatsSnapshot, ResourceCache};
pub use ledger::{CacheKey, LedgerAuthor, LedgerError, LedgerResources};

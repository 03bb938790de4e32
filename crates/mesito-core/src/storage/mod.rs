//! # Storage Module
//!
//! Persistent machine registry and machine-state log using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions (each operation is one write transaction)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)

mod redb_store;

pub use redb_store::RedbStore;

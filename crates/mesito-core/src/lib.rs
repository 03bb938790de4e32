//! # mesito-core
//!
//! The logic of mesito, a minimalist Manufacturing Execution System.
//!
//! - [`model`]: machines, machine conditions and machine states
//! - [`valid`]: validation of request bodies from the outside world
//! - [`error`]: rejections reported to clients and storage failures
//! - [`operation`]: the rules a machine-state upsert must pass
//! - [`out`]: shapes sent back to clients and broadcast to observers
//! - [`storage`]: the redb-backed store
//!
//! This crate is synchronous and network-free; the server lives in
//! `apps/mesito`.

pub mod error;
pub mod model;
pub mod operation;
pub mod out;
pub mod storage;
pub mod valid;

pub use error::{Error, Rejection, Result, StoreError};
pub use model::{Machine, MachineCondition, MachineId, MachineState, MachineStateId, Timestamp};
pub use out::{Emission, MachineOut};
pub use storage::RedbStore;
pub use valid::{MachinePatch, MachinePost, MachinePut, MachineStatePut};

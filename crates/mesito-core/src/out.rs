//! # Output Module
//!
//! Shapes sent to clients: query results and the change emissions
//! broadcast to observers.

use crate::model::{Machine, MachineId};
use serde::{Deserialize, Serialize};

/// A machine as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineOut {
    pub id: MachineId,
    pub name: String,
    pub version: u64,
}

impl From<&Machine> for MachineOut {
    fn from(machine: &Machine) -> Self {
        Self {
            id: machine.id,
            name: machine.name.clone(),
            version: machine.version,
        }
    }
}

impl From<Machine> for MachineOut {
    fn from(machine: Machine) -> Self {
        Self {
            id: machine.id,
            name: machine.name,
            version: machine.version,
        }
    }
}

/// A change notification for observers.
///
/// Serializes as `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Emission {
    /// A machine was created, upserted or patched.
    PutMachine(MachineOut),

    /// A machine was deleted.
    DeleteMachine { id: MachineId },

    /// A client-originated change relayed verbatim to every observer.
    MachineChange(serde_json::Value),
}

impl Emission {
    /// Emission for a created or updated machine.
    #[must_use]
    pub fn put_machine(id: MachineId, name: impl Into<String>, version: u64) -> Self {
        Emission::PutMachine(MachineOut {
            id,
            name: name.into(),
            version,
        })
    }

    /// Emission for a deleted machine.
    #[must_use]
    pub fn delete_machine(id: MachineId) -> Self {
        Emission::DeleteMachine { id }
    }

    /// Event name on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Emission::PutMachine(_) => "put_machine",
            Emission::DeleteMachine { .. } => "delete_machine",
            Emission::MachineChange(_) => "machine_change",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! # Model Module
//!
//! Shop-floor entities: machines and the states they go through.
//!
//! A machine state covers one contiguous time range `[start, stop]` during
//! which the machine stayed in a single [`MachineCondition`]. States of the
//! same machine never overlap and are keyed by `(machine_id, start)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a machine.
pub type MachineId = u64;

/// Identifier of a machine state.
pub type MachineStateId = u64;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

// =============================================================================
// MACHINE
// =============================================================================

/// A machine on the shop floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    /// Unique across all machines.
    pub name: String,
    /// Starts at 1, incremented on every rename.
    pub version: u64,
}

impl Machine {
    /// Create a machine at its first version.
    #[must_use]
    pub fn new(id: MachineId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: 1,
        }
    }

    /// Rename the machine and bump its version.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.version = self.version.saturating_add(1);
    }
}

// =============================================================================
// MACHINE CONDITION
// =============================================================================

/// Condition of a machine during a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineCondition {
    Off,
    Idle,
    Working,
    Retooling,
    Broken,
}

impl MachineCondition {
    /// All conditions in declaration order.
    pub const ALL: [MachineCondition; 5] = [
        MachineCondition::Off,
        MachineCondition::Idle,
        MachineCondition::Working,
        MachineCondition::Retooling,
        MachineCondition::Broken,
    ];

    /// The wire name of the condition.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineCondition::Off => "off",
            MachineCondition::Idle => "idle",
            MachineCondition::Working => "working",
            MachineCondition::Retooling => "retooling",
            MachineCondition::Broken => "broken",
        }
    }
}

impl fmt::Display for MachineCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MACHINE STATE
// =============================================================================

/// A single work period of a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub id: MachineStateId,
    pub machine_id: MachineId,
    pub start: Timestamp,
    pub stop: Timestamp,
    pub condition: MachineCondition,
    pub min_power_consumption: Option<f64>,
    pub max_power_consumption: Option<f64>,
    pub avg_power_consumption: Option<f64>,
    pub total_energy: Option<f64>,
    /// Pieces produced in the time range.
    pub pieces: Option<u64>,
}

impl MachineState {
    /// Whether the state's time range intersects `[start, stop)`.
    ///
    /// Ranges that only touch (`self.stop == start`) do not overlap.
    #[must_use]
    pub fn overlaps(&self, start: Timestamp, stop: Timestamp) -> bool {
        self.start < stop && self.stop > start
    }
}

// =============================================================================
// TESTS
// =============================================================================

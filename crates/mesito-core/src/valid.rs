//! # Validation Module
//!
//! Validate request bodies coming from the outside world and cast them
//! into typed requests.
//!
//! Only data-local constraints are checked here. Rules that depend on the
//! stored data (does the machine exist, does the state overlap) are
//! checked by the store inside its write transaction.

use crate::error::Rejection;
use crate::model::{MachineCondition, MachineId, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// A request to create a new machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachinePost {
    /// Machine name.
    pub name: String,
}

/// A request to upsert a machine.
///
/// Without `id` a new machine is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachinePut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MachineId>,
    pub name: String,
}

/// A request to patch a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachinePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MachinePatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}

/// A request to upsert the state of a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatePut {
    pub machine_id: MachineId,
    pub start: Timestamp,
    pub stop: Timestamp,
    pub condition: MachineCondition,
    /// Minimum power consumption in the time range.
    pub min_power_consumption: Option<f64>,
    /// Maximum power consumption in the time range.
    pub max_power_consumption: Option<f64>,
    /// Average power consumption in the time range.
    pub avg_power_consumption: Option<f64>,
    /// Total energy used in the time range.
    pub total_energy: Option<f64>,
    /// Total amount of pieces produced in the time range.
    pub pieces: Option<u64>,
}

impl MachineStatePut {
    /// A request with the mandatory fields only.
    #[must_use]
    pub fn new(
        machine_id: MachineId,
        start: Timestamp,
        stop: Timestamp,
        condition: MachineCondition,
    ) -> Self {
        Self {
            machine_id,
            start,
            stop,
            condition,
            min_power_consumption: None,
            max_power_consumption: None,
            avg_power_consumption: None,
            total_energy: None,
            pieces: None,
        }
    }
}

// =============================================================================
// VALIDATORS
// =============================================================================

/// Validate a request to create a machine.
pub fn machine_post(body: &[u8]) -> Result<MachinePost, Rejection> {
    cast(object(body)?)
}

/// Validate a request to upsert a machine.
pub fn machine_put(body: &[u8]) -> Result<MachinePut, Rejection> {
    cast(object(body)?)
}

/// Validate a request to patch a machine.
pub fn machine_patch(body: &[u8]) -> Result<MachinePatch, Rejection> {
    let patch: MachinePatch = cast(object(body)?)?;

    if patch.is_empty() {
        return Err(Rejection::constraint_violation("Empty patch"));
    }

    Ok(patch)
}

/// Validate a request to upsert a machine state.
pub fn machine_state_put(body: &[u8]) -> Result<MachineStatePut, Rejection> {
    let data: MachineStatePut = cast(object(body)?)?;

    if data.total_energy.is_some_and(|energy| energy < 0.0) {
        return Err(Rejection::schema_violation(
            "total_energy must be bigger than or equal to 0",
        ));
    }

    if data.start > data.stop {
        return Err(Rejection::constraint_violation("stop before start"));
    }

    Ok(data)
}

// =============================================================================
// HELPERS
// =============================================================================

/// Parse the body as a JSON object whose members are all non-null.
fn object(body: &[u8]) -> Result<Map<String, Value>, Rejection> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| Rejection::schema_violation(format!("invalid JSON: {err}")))?;

    let Value::Object(map) = value else {
        return Err(Rejection::schema_violation("data must be object"));
    };

    if let Some((key, _)) = map.iter().find(|(_, v)| v.is_null()) {
        return Err(Rejection::schema_violation(format!("{key} must not be null")));
    }

    Ok(map)
}

fn cast<T: DeserializeOwned>(map: Map<String, Value>) -> Result<T, Rejection> {
    serde_json::from_value(Value::Object(map))
        .map_err(|err| Rejection::schema_violation(err.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

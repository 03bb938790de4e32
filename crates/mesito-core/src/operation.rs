//! # Operation Rules
//!
//! The semantic checks a machine-state upsert must pass, independent of
//! where the states are stored.
//!
//! The store feeds these functions from inside its write transaction, so
//! the checks and the write observe the same snapshot.

use crate::error::Rejection;
use crate::model::{MachineState, MachineStateId, Timestamp};
use crate::valid::MachineStatePut;

/// An existing state must keep its condition.
pub fn check_condition(
    existing: Option<&MachineState>,
    data: &MachineStatePut,
) -> Result<(), Rejection> {
    match existing {
        Some(state) if state.condition != data.condition => {
            Err(Rejection::MachineStateConditionChanged {
                old: state.condition,
                new: data.condition,
            })
        }
        _ => Ok(()),
    }
}

/// Find the first stored state that conflicts with `[start, stop]`.
///
/// `states` must be the states of a single machine. A state with the same
/// `start` is the one being upserted: it conflicts only when it would be
/// shortened, whatever the length of the new range. Any other state
/// conflicts when it intersects `[start, stop]`. The conflicting state with
/// the earliest start is returned.
pub fn find_overlap<'a, I>(states: I, start: Timestamp, stop: Timestamp) -> Option<&'a MachineState>
where
    I: IntoIterator<Item = &'a MachineState>,
{
    states
        .into_iter()
        .filter(|state| conflicts(state, start, stop))
        .min_by_key(|state| state.start)
}

fn conflicts(state: &MachineState, start: Timestamp, stop: Timestamp) -> bool {
    if state.start == start {
        state.stop > stop
    } else {
        state.overlaps(start, stop)
    }
}

/// Reject the upsert if it overlaps a stored state.
pub fn check_overlap<'a, I>(states: I, data: &MachineStatePut) -> Result<(), Rejection>
where
    I: IntoIterator<Item = &'a MachineState>,
{
    match find_overlap(states, data.start, data.stop) {
        Some(other) => Err(Rejection::MachineStateOverlap {
            start: other.start,
            stop: other.stop,
            machine_id: data.machine_id,
        }),
        None => Ok(()),
    }
}

/// Build the state to store from the request.
///
/// An existing state keeps its id; `id` is used for a new one.
#[must_use]
pub fn upserted_state(
    existing: Option<&MachineState>,
    id: MachineStateId,
    data: &MachineStatePut,
) -> MachineState {
    MachineState {
        id: existing.map(|state| state.id).unwrap_or(id),
        machine_id: data.machine_id,
        start: data.start,
        stop: data.stop,
        condition: data.condition,
        min_power_consumption: data.min_power_consumption,
        max_power_consumption: data.max_power_consumption,
        avg_power_consumption: data.avg_power_consumption,
        total_energy: data.total_energy,
        pieces: data.pieces,
    }
}

// =============================================================================
// TESTS
// =============================================================================

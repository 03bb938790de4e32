//! Request handlers of the `/api/v1` routes.
//!
//! Bodies are taken as raw bytes and validated by `mesito_core::valid`, so
//! a malformed body yields a `SchemaViolation` rather than axum's own
//! rejection.

use super::{ApiError, AppState};
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use mesito_core::{Emission, MachineId, MachineOut, MachineStateId, Rejection, valid};

/// Post a new machine.
pub async fn post_machine(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MachineId>, ApiError> {
    let data = valid::machine_post(&body)?;
    let machine = state.store.create_machine(&data)?;

    state.emit(Emission::PutMachine(MachineOut::from(&machine)));

    Ok(Json(machine.id))
}

/// Upsert a machine.
pub async fn put_machine(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MachineId>, ApiError> {
    let data = valid::machine_put(&body)?;
    let machine = state.store.put_machine(&data)?;

    // Observers always get the id, also for a machine that was just created.
    state.emit(Emission::PutMachine(MachineOut::from(&machine)));

    Ok(Json(machine.id))
}

/// Patch a machine; responds with its new version.
pub async fn patch_machine(
    State(state): State<AppState>,
    id: Result<Path<MachineId>, PathRejection>,
    body: Bytes,
) -> Result<Json<u64>, ApiError> {
    let id = machine_id(id)?;
    let data = valid::machine_patch(&body)?;
    let machine = state.store.patch_machine(id, &data)?;

    state.emit(Emission::PutMachine(MachineOut::from(&machine)));

    Ok(Json(machine.version))
}

/// Delete a machine.
pub async fn delete_machine(
    State(state): State<AppState>,
    id: Result<Path<MachineId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = machine_id(id)?;
    if state.store.delete_machine(id)? {
        state.emit(Emission::delete_machine(id));
    }

    Ok(StatusCode::OK)
}

/// Serve the list of all machines.
pub async fn machines(State(state): State<AppState>) -> Result<Json<Vec<MachineOut>>, ApiError> {
    let machines = state.store.machines()?;

    Ok(Json(machines.into_iter().map(MachineOut::from).collect()))
}

/// Upsert the state of a machine.
pub async fn put_machine_state(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MachineStateId>, ApiError> {
    let data = valid::machine_state_put(&body)?;
    let id = state.store.put_machine_state(&data)?;

    Ok(Json(id))
}

/// The machine id of the URL; a malformed one is a schema violation.
fn machine_id(path: Result<Path<MachineId>, PathRejection>) -> Result<MachineId, Rejection> {
    path.map(|Path(id)| id).map_err(|err| Rejection::schema_violation(err.body_text()))
}

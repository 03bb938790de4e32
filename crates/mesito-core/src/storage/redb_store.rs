//! redb-backed store.
//!
//! Tables:
//! - `machine`: machine id -> postcard-encoded [`Machine`]
//! - `machine_name`: machine name -> machine id (uniqueness index)
//! - `machine_state`: (machine id, start) -> postcard-encoded [`MachineState`]
//! - `sequence`: sequence name -> last allocated id

use crate::error::{Rejection, Result, StoreError};
use crate::model::{Machine, MachineId, MachineState, MachineStateId, Timestamp};
use crate::operation;
use crate::valid::{MachinePatch, MachinePost, MachinePut, MachineStatePut};
use redb::backends::InMemoryBackend;
use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, TableError, WriteTransaction,
};
use std::ops::RangeBounds;
use std::path::Path;

const MACHINES: TableDefinition<MachineId, &[u8]> = TableDefinition::new("machine");
const MACHINE_NAMES: TableDefinition<&str, MachineId> = TableDefinition::new("machine_name");
const MACHINE_STATES: TableDefinition<(MachineId, Timestamp), &[u8]> =
    TableDefinition::new("machine_state");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequence");

const MACHINE_SEQUENCE: &str = "machine";
const MACHINE_STATE_SEQUENCE: &str = "machine_state";

/// Machine registry and machine-state log on top of a redb database.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Create a new database file with all tables.
    ///
    /// Fails if the file exists, unless `force` is set, in which case the
    /// existing file is replaced.
    pub fn create(path: &Path, force: bool) -> std::result::Result<Self, StoreError> {
        if path.exists() {
            if !force {
                return Err(StoreError::AlreadyExists(path.display().to_string()));
            }
            tracing::warn!(path = %path.display(), "Replacing existing database");
            std::fs::remove_file(path)?;
        }

        let db = Database::create(path)?;
        let store = Self::initialize(db)?;
        tracing::info!(path = %path.display(), "Database tables created");
        Ok(store)
    }

    /// Open a database previously created with [`RedbStore::create`].
    pub fn open(path: &Path) -> std::result::Result<Self, StoreError> {
        let not_initialized = || StoreError::NotInitialized(path.display().to_string());

        if !path.exists() {
            return Err(not_initialized());
        }

        let db = Database::open(path)?;
        let store = Self { db };

        let read_txn = store.db.begin_read()?;
        for result in [
            read_txn.open_table(MACHINES).map(drop),
            read_txn.open_table(MACHINE_NAMES).map(drop),
            read_txn.open_table(MACHINE_STATES).map(drop),
            read_txn.open_table(SEQUENCES).map(drop),
        ] {
            match result {
                Ok(()) => {}
                Err(TableError::TableDoesNotExist(_)) => return Err(not_initialized()),
                Err(err) => return Err(err.into()),
            }
        }
        drop(read_txn);

        tracing::debug!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create a database that lives in memory only.
    pub fn in_memory() -> std::result::Result<Self, StoreError> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::initialize(db)
    }

    fn initialize(db: Database) -> std::result::Result<Self, StoreError> {
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(MACHINES)?;
            write_txn.open_table(MACHINE_NAMES)?;
            write_txn.open_table(MACHINE_STATES)?;
            write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // MACHINES
    // =========================================================================

    /// Insert a new machine. Its version is 1.
    pub fn create_machine(&self, data: &MachinePost) -> Result<Machine> {
        let write_txn = self.db.begin_write()?;
        let machine = {
            let mut names = write_txn.open_table(MACHINE_NAMES)?;
            if names.get(data.name.as_str())?.is_some() {
                return Err(Rejection::MachineNameTaken {
                    name: data.name.clone(),
                }
                .into());
            }

            let id = next_id(&write_txn, MACHINE_SEQUENCE)?;
            let machine = Machine::new(id, data.name.as_str());

            let mut machines = write_txn.open_table(MACHINES)?;
            machines.insert(id, postcard::to_allocvec(&machine)?.as_slice())?;
            names.insert(machine.name.as_str(), id)?;
            machine
        };
        write_txn.commit()?;

        tracing::debug!(id = machine.id, name = %machine.name, "Machine created");
        Ok(machine)
    }

    /// Upsert a machine.
    ///
    /// Without an id a new machine is created; with an id the machine is
    /// renamed and its version bumped.
    pub fn put_machine(&self, data: &MachinePut) -> Result<Machine> {
        let Some(id) = data.id else {
            return self.create_machine(&MachinePost {
                name: data.name.clone(),
            });
        };

        let write_txn = self.db.begin_write()?;
        let machine = rename_machine(&write_txn, id, &data.name)?;
        write_txn.commit()?;

        Ok(machine)
    }

    /// Apply a patch to an existing machine.
    pub fn patch_machine(&self, id: MachineId, patch: &MachinePatch) -> Result<Machine> {
        let Some(name) = patch.name.as_deref() else {
            return self
                .machine(id)?
                .ok_or_else(|| Rejection::MachineNotFound { machine_id: id }.into());
        };

        let write_txn = self.db.begin_write()?;
        let machine = rename_machine(&write_txn, id, name)?;
        write_txn.commit()?;

        Ok(machine)
    }

    /// Delete a machine together with its states.
    ///
    /// Returns whether a machine was deleted.
    pub fn delete_machine(&self, id: MachineId) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut machines = write_txn.open_table(MACHINES)?;
            let removed: Option<Machine> = match machines.remove(id)? {
                Some(guard) => Some(postcard::from_bytes(guard.value())?),
                None => None,
            };

            match removed {
                Some(machine) => {
                    let mut names = write_txn.open_table(MACHINE_NAMES)?;
                    names.remove(machine.name.as_str())?;

                    let mut states = write_txn.open_table(MACHINE_STATES)?;
                    let keys: Vec<_> =
                        collect_states(&states, (id, Timestamp::MIN)..=(id, Timestamp::MAX))?
                            .into_iter()
                            .map(|state| (state.machine_id, state.start))
                            .collect();
                    for key in &keys {
                        states.remove(key)?;
                    }

                    tracing::debug!(id, states = keys.len(), "Machine deleted");
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;

        Ok(deleted)
    }

    /// Retrieve a machine by id.
    pub fn machine(&self, id: MachineId) -> Result<Option<Machine>> {
        let read_txn = self.db.begin_read()?;
        let machines = read_txn.open_table(MACHINES)?;

        match machines.get(id)? {
            Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    /// All machines ordered by name.
    pub fn machines(&self) -> Result<Vec<Machine>> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(MACHINE_NAMES)?;
        let machines = read_txn.open_table(MACHINES)?;

        let mut result = Vec::new();
        for entry in names.iter()? {
            let (_name, id) = entry?;
            if let Some(guard) = machines.get(id.value())? {
                result.push(postcard::from_bytes(guard.value())?);
            }
        }

        Ok(result)
    }

    // =========================================================================
    // MACHINE STATES
    // =========================================================================

    /// Retrieve the machine state given its key (machine id, start).
    pub fn find_machine_state(
        &self,
        machine_id: MachineId,
        start: Timestamp,
    ) -> Result<Option<MachineState>> {
        let read_txn = self.db.begin_read()?;
        let states = read_txn.open_table(MACHINE_STATES)?;

        match states.get((machine_id, start))? {
            Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    /// All states of a machine ordered by start.
    pub fn machine_states(&self, machine_id: MachineId) -> Result<Vec<MachineState>> {
        let read_txn = self.db.begin_read()?;
        let states = read_txn.open_table(MACHINE_STATES)?;

        collect_states(
            &states,
            (machine_id, Timestamp::MIN)..=(machine_id, Timestamp::MAX),
        )
    }

    /// Upsert the state of a machine.
    ///
    /// The state is identified by (machine id, start). The machine must
    /// exist, an existing state must keep its condition, and the state must
    /// not overlap any other state of the machine.
    pub fn put_machine_state(&self, data: &MachineStatePut) -> Result<MachineStateId> {
        let write_txn = self.db.begin_write()?;
        let id = {
            let machines = write_txn.open_table(MACHINES)?;
            if machines.get(data.machine_id)?.is_none() {
                return Err(Rejection::MachineNotFound {
                    machine_id: data.machine_id,
                }
                .into());
            }

            let mut states = write_txn.open_table(MACHINE_STATES)?;
            let existing: Option<MachineState> = match states.get((data.machine_id, data.start))? {
                Some(guard) => Some(postcard::from_bytes(guard.value())?),
                None => None,
            };

            operation::check_condition(existing.as_ref(), data)?;

            // States starting after the new stop cannot conflict. The bound is
            // inclusive so an instant keeps its same-start state in view.
            let candidates = collect_states(
                &states,
                (data.machine_id, Timestamp::MIN)..=(data.machine_id, data.stop),
            )?;
            operation::check_overlap(&candidates, data)?;

            let id = match &existing {
                Some(state) => state.id,
                None => next_id(&write_txn, MACHINE_STATE_SEQUENCE)?,
            };
            let state = operation::upserted_state(existing.as_ref(), id, data);

            states.insert(
                (state.machine_id, state.start),
                postcard::to_allocvec(&state)?.as_slice(),
            )?;
            id
        };
        write_txn.commit()?;

        tracing::debug!(
            id,
            machine_id = data.machine_id,
            start = data.start,
            stop = data.stop,
            condition = %data.condition,
            "Machine state stored"
        );
        Ok(id)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Allocate the next id of a sequence. Ids start at 1.
fn next_id(write_txn: &WriteTransaction, sequence: &'static str) -> Result<u64> {
    let mut sequences = write_txn.open_table(SEQUENCES)?;
    let last = sequences.get(sequence)?.map(|guard| guard.value()).unwrap_or(0);
    let next = last
        .checked_add(1)
        .ok_or(StoreError::SequenceExhausted(sequence))?;
    sequences.insert(sequence, next)?;
    Ok(next)
}

/// Rename a machine inside a write transaction, keeping the name index
/// consistent.
fn rename_machine(write_txn: &WriteTransaction, id: MachineId, name: &str) -> Result<Machine> {
    let mut machines = write_txn.open_table(MACHINES)?;
    let mut machine: Machine = match machines.get(id)? {
        Some(guard) => postcard::from_bytes(guard.value())?,
        None => return Err(Rejection::MachineNotFound { machine_id: id }.into()),
    };

    let mut names = write_txn.open_table(MACHINE_NAMES)?;
    let owner = names.get(name)?.map(|guard| guard.value());
    if owner.is_some_and(|owner| owner != id) {
        return Err(Rejection::MachineNameTaken {
            name: name.to_string(),
        }
        .into());
    }

    names.remove(machine.name.as_str())?;
    machine.rename(name);
    names.insert(machine.name.as_str(), id)?;
    machines.insert(id, postcard::to_allocvec(&machine)?.as_slice())?;

    tracing::debug!(id, name, version = machine.version, "Machine renamed");
    Ok(machine)
}

fn collect_states<T, R>(states: &T, range: R) -> Result<Vec<MachineState>>
where
    T: ReadableTable<(MachineId, Timestamp), &'static [u8]>,
    R: RangeBounds<(MachineId, Timestamp)> + 'static,
{
    let mut result = Vec::new();
    for entry in states.range(range)? {
        let (_key, value) = entry?;
        result.push(postcard::from_bytes(value.value())?);
    }
    Ok(result)
}

// =============================================================================
// TESTS
// =============================================================================

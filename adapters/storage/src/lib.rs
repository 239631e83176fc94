#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Durable storage for Geocoin session state.
//!
//! The persisted state is a single named JSON record. Decoding is tolerant:
//! every pit or inventory entry is parsed on its own, and entries that do not
//! match the expected layout are reported as [`CorruptRecord`] values instead
//! of failing the whole load.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use geocoin_core::{
    CoinRecord, CorruptRecord, PersistedState, PitRecord, Position, RecordError, RecordSection,
};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Name of the record used when none is configured.
pub const DEFAULT_RECORD_NAME: &str = "geocoin-state";

/// Errors raised by a [`StateStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be read, written or removed.
    #[error("could not access {}: {source}", path.display())]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Persisted state recovered from a store, with the entries that were skipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedState {
    /// Entries that decoded successfully.
    pub state: PersistedState,
    /// Entries that were skipped while decoding.
    pub corrupt: Vec<CorruptRecord>,
}

/// Durable home of the single persisted state record.
pub trait StateStore {
    /// Reads the persisted record, returning `None` when nothing was saved yet.
    fn load(&mut self) -> Result<Option<LoadedState>, StoreError>;

    /// Replaces the persisted record with `state`.
    fn save(&mut self, state: &PersistedState) -> Result<(), StoreError>;

    /// Removes the persisted record.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Encodes the persisted state into its JSON document.
#[must_use]
pub fn encode(state: &PersistedState) -> String {
    serde_json::to_string_pretty(state).expect("persisted state serialization never fails")
}

/// Decodes a JSON document, skipping every entry that does not fit the layout.
#[must_use]
pub fn decode(text: &str) -> LoadedState {
    let mut loaded = LoadedState::default();
    let document: Value = match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) => {
            loaded.corrupt.push(malformed(
                RecordSection::Document,
                0,
                "document is not an object",
            ));
            log_corrupt(&loaded.corrupt);
            return loaded;
        }
        Err(error) => {
            loaded
                .corrupt
                .push(malformed(RecordSection::Document, 0, &error.to_string()));
            log_corrupt(&loaded.corrupt);
            return loaded;
        }
    };

    loaded.state.pits = decode_sequence::<PitRecord>(
        document.get("pits"),
        RecordSection::Pit,
        &mut loaded.corrupt,
    );
    loaded.state.inventory = decode_sequence::<CoinRecord>(
        document.get("inventory"),
        RecordSection::Inventory,
        &mut loaded.corrupt,
    );
    loaded.state.score =
        decode_scalar::<i64>(document.get("score"), RecordSection::Score, &mut loaded.corrupt)
            .unwrap_or(0);
    loaded.state.player = decode_scalar::<Position>(
        document.get("player"),
        RecordSection::Player,
        &mut loaded.corrupt,
    );

    log_corrupt(&loaded.corrupt);
    loaded
}

fn decode_sequence<T: DeserializeOwned>(
    value: Option<&Value>,
    section: RecordSection,
    corrupt: &mut Vec<CorruptRecord>,
) -> Vec<T> {
    let entries = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            corrupt.push(malformed(section, 0, "section is not a sequence"));
            return Vec::new();
        }
    };

    let mut decoded = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match T::deserialize(entry) {
            Ok(record) => decoded.push(record),
            Err(error) => corrupt.push(malformed(section, index, &error.to_string())),
        }
    }
    decoded
}

fn decode_scalar<T: DeserializeOwned>(
    value: Option<&Value>,
    section: RecordSection,
    corrupt: &mut Vec<CorruptRecord>,
) -> Option<T> {
    let value = value.filter(|value| !value.is_null())?;
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(error) => {
            corrupt.push(malformed(section, 0, &error.to_string()));
            None
        }
    }
}

fn malformed(section: RecordSection, index: usize, message: &str) -> CorruptRecord {
    CorruptRecord::new(section, index, RecordError::Malformed(message.to_owned()))
}

fn log_corrupt(corrupt: &[CorruptRecord]) {
    for record in corrupt {
        warn!("{record}");
    }
}

/// Store keeping the record as a JSON file inside a directory.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store for the record `name` inside `directory`.
    #[must_use]
    pub fn new(directory: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: directory.as_ref().join(format!("{name}.json")),
        }
    }

    /// Creates a store backed by an explicit file path.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File holding the record.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file that keeps the last record which failed to decode cleanly.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    fn keep_damaged(&self, text: &str) -> Result<(), StoreError> {
        let backup = self.backup_path();
        fs::write(&backup, text).map_err(|source| StoreError::Io {
            path: backup.clone(),
            source,
        })?;
        warn!(
            "kept damaged record from {} at {}",
            self.path.display(),
            backup.display()
        );
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<LoadedState>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let loaded = decode(&text);
                if !loaded.corrupt.is_empty() {
                    self.keep_damaged(&text)?;
                }
                Ok(Some(loaded))
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(self.io_error(error)),
        }
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| self.io_error(error))?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encode(state)).map_err(|error| self.io_error(error))?;
        fs::rename(&staging, &self.path).map_err(|error| self.io_error(error))?;
        debug!("saved {} pits to {}", state.pits.len(), self.path.display());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.io_error(error)),
        }
    }
}

/// Store keeping the encoded record in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    record: Option<String>,
    saves: usize,
}

impl MemoryStore {
    /// Creates a store pre-populated with a raw document.
    #[must_use]
    pub fn with_contents(document: impl Into<String>) -> Self {
        Self {
            record: Some(document.into()),
            saves: 0,
        }
    }

    /// Raw document currently held, if any.
    #[must_use]
    pub fn contents(&self) -> Option<&str> {
        self.record.as_deref()
    }

    /// Number of successful saves since creation.
    #[must_use]
    pub const fn save_count(&self) -> usize {
        self.saves
    }
}

impl StateStore for MemoryStore {
    fn load(&mut self) -> Result<Option<LoadedState>, StoreError> {
        Ok(self.record.as_deref().map(decode))
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), StoreError> {
        self.record = Some(encode(state));
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.record = None;
        Ok(())
    }
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn load(&mut self) -> Result<Option<LoadedState>, StoreError> {
        (**self).load()
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), StoreError> {
        (**self).save(state)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

//! Snapshot files for `InMemoryEngine`.
//!
//! One file per database, `<dir>/<encoded-name>.vkv`, holding the version and
//! every collection as a bincode document. Writes go through a temp file and
//! a rename so a crash never leaves a half-written snapshot behind.

use super::memory::DatabaseState;
use crate::domain::errors::EngineError;
use crate::domain::types::{CollectionName, DatabaseName, Key, SchemaVersion, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SNAPSHOT_EXTENSION: &str = "vkv";
const FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format: u16,
    version: SchemaVersion,
    collections: BTreeMap<&'a CollectionName, &'a BTreeMap<Key, Value>>,
}

#[derive(Deserialize)]
struct Snapshot {
    format: u16,
    version: SchemaVersion,
    collections: BTreeMap<CollectionName, BTreeMap<Key, Value>>,
}

fn io_error(err: std::io::Error) -> EngineError {
    EngineError::Io(err.to_string())
}

/// Database names may hold any character; file names may not.
fn encode_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

pub fn snapshot_path(dir: &Path, database: &DatabaseName) -> PathBuf {
    dir.join(format!(
        "{}.{SNAPSHOT_EXTENSION}",
        encode_name(database.as_str())
    ))
}

/// Write `state` for `database`, replacing any previous snapshot.
pub(crate) fn save(
    dir: &Path,
    database: &DatabaseName,
    state: &DatabaseState,
) -> Result<(), EngineError> {
    std::fs::create_dir_all(dir).map_err(io_error)?;

    let snapshot = SnapshotRef {
        format: FORMAT_VERSION,
        version: state.version,
        collections: state
            .collections
            .iter()
            .map(|(name, entries)| (name, entries.as_ref()))
            .collect(),
    };
    let bytes =
        bincode::serialize(&snapshot).map_err(|e| EngineError::Serialization(e.to_string()))?;

    let path = snapshot_path(dir, database);
    let temp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&temp_path).map_err(io_error)?;
    file.write_all(&bytes).map_err(io_error)?;
    file.sync_all().map_err(io_error)?;
    std::fs::rename(&temp_path, &path).map_err(io_error)?;

    tracing::trace!(database = %database, bytes = bytes.len(), "snapshot written");
    Ok(())
}

/// Read the snapshot for `database`. `None` if there is none.
pub(crate) fn load(
    dir: &Path,
    database: &DatabaseName,
) -> Result<Option<DatabaseState>, EngineError> {
    let path = snapshot_path(dir, database);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(err)),
    };

    let snapshot: Snapshot =
        bincode::deserialize(&bytes).map_err(|e| EngineError::Serialization(e.to_string()))?;
    if snapshot.format != FORMAT_VERSION {
        return Err(EngineError::Serialization(format!(
            "unsupported snapshot format {} in {}",
            snapshot.format,
            path.display()
        )));
    }

    tracing::debug!(
        database = %database,
        version = %snapshot.version,
        collections = snapshot.collections.len(),
        "snapshot loaded"
    );

    Ok(Some(DatabaseState {
        version: snapshot.version,
        collections: snapshot
            .collections
            .into_iter()
            .map(|(name, entries)| (name, Arc::new(entries)))
            .collect(),
    }))
}

/// Remove the snapshot for `database`, if any.
pub fn remove(dir: &Path, database: &DatabaseName) -> Result<(), EngineError> {
    match std::fs::remove_file(snapshot_path(dir, database)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(err)),
    }
}

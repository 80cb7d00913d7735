//! Process-lifetime, read-only store of order records keyed by tracking number

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::OrderRecord;
use crate::error::DataError;

/// Records read from a source file, in file order, plus what was skipped.
/// `sources[i]` is the untouched JSON object `records[i]` was parsed from.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<OrderRecord>,
    pub sources: Vec<Value>,
    pub rejected: Vec<DataError>,
}

/// Read and validate a record source. Bad entries are reported, not fatal;
/// only an unreadable file or a document that is not an array fails.
pub fn read_records(path: &Path) -> Result<LoadedRecords, DataError> {
    let raw = fs::read_to_string(path).map_err(|source| DataError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&raw)
}

pub fn parse_records(raw: &str) -> Result<LoadedRecords, DataError> {
    let entries: Vec<Value> = serde_json::from_str(raw)?;
    let mut loaded = LoadedRecords::default();
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let record = match OrderRecord::deserialize(&entry) {
            Ok(record) => record,
            Err(e) => {
                loaded.rejected.push(DataError::InvalidRecord { index, message: e.to_string() });
                continue;
            }
        };

        let key = record.tracking_number.as_str();
        if key.is_empty() {
            loaded.rejected.push(DataError::InvalidRecord {
                index,
                message: "missing tracking_number".to_string(),
            });
            continue;
        }
        if seen.contains_key(key) {
            loaded.rejected.push(DataError::DuplicateKey {
                index,
                tracking_number: key.to_string(),
            });
            continue;
        }

        seen.insert(key.to_string(), index);
        loaded.records.push(record);
        loaded.sources.push(entry);
    }

    for problem in &loaded.rejected {
        warn!("Skipping order: {}", problem);
    }
    Ok(loaded)
}

/// Exact-key lookup over the full record set. Never mutated after construction,
/// so it can be shared behind an `Arc` without locking.
#[derive(Debug)]
pub struct RecordStore {
    records: Vec<OrderRecord>,
    sources: Vec<Value>,
    by_tracking_number: HashMap<String, usize>,
}

impl RecordStore {
    /// Load the record source once. Fails when nothing usable remains.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let loaded = read_records(path)?;
        let store = Self::from_sources(loaded.records, loaded.sources)?;
        info!(
            "Loaded {} orders from {} ({} skipped)",
            store.len(),
            path.display(),
            loaded.rejected.len()
        );
        Ok(store)
    }

    /// Store built from typed records alone; their serialised form stands in
    /// for the source objects.
    pub fn from_records(records: Vec<OrderRecord>) -> Result<Self, DataError> {
        let sources = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_sources(records, sources)
    }

    pub fn from_sources(records: Vec<OrderRecord>, sources: Vec<Value>) -> Result<Self, DataError> {
        if records.is_empty() {
            return Err(DataError::Empty);
        }
        if sources.len() != records.len() {
            return Err(DataError::InvalidRecord {
                index: sources.len().min(records.len()),
                message: format!("{} records but {} source objects", records.len(), sources.len()),
            });
        }

        let mut by_tracking_number = HashMap::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let key = record.tracking_number.clone();
            if by_tracking_number.insert(key.clone(), index).is_some() {
                return Err(DataError::DuplicateKey { index, tracking_number: key });
            }
        }

        Ok(Self { records, sources, by_tracking_number })
    }

    pub fn get(&self, tracking_number: &str) -> Option<&OrderRecord> {
        self.by_tracking_number
            .get(tracking_number)
            .map(|&index| &self.records[index])
    }

    pub fn contains(&self, tracking_number: &str) -> bool {
        self.by_tracking_number.contains_key(tracking_number)
    }

    /// All records in source order.
    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    /// Source objects, parallel to `records()`.
    pub fn sources(&self) -> &[Value] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

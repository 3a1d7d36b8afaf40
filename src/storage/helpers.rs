//! Shared storage helper functions.
//!
//! Row encoding rules and batch validation used by every backend.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};

use super::{Result, StorageError};
use crate::envelope::{EventEnvelope, Metadata};
use crate::persistence_id::PersistenceId;

/// Render a timestamp the way every backend stores it: RFC 3339, UTC,
/// microsecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| StorageError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

/// Encode metadata for the nullable `metadata` column. Empty maps are stored
/// as NULL.
pub fn encode_metadata(metadata: &Metadata) -> Result<Option<String>> {
    if metadata.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(metadata)
        .map(Some)
        .map_err(StorageError::InvalidMetadata)
}

/// Decode the `metadata` column. NULL reads back as an empty map.
pub fn decode_metadata(value: Option<&str>) -> Result<Metadata> {
    match value {
        Some(json) => serde_json::from_str(json).map_err(StorageError::InvalidMetadata),
        None => Ok(Metadata::new()),
    }
}

/// Reject non-positive sequence numbers before anything is written.
pub fn validate_sequences<P>(id: &PersistenceId, events: &[EventEnvelope<P>]) -> Result<()> {
    match events.iter().find(|e| e.sequence_nr <= 0) {
        Some(event) => Err(StorageError::InvalidSequence {
            persistence_id: id.clone(),
            sequence_nr: event.sequence_nr,
        }),
        None => Ok(()),
    }
}

/// Reject durable state versions below 1.
pub fn validate_version(id: &PersistenceId, version: i64) -> Result<()> {
    if version < 1 {
        return Err(StorageError::InvalidVersion {
            persistence_id: id.clone(),
            version,
        });
    }
    Ok(())
}

/// Lowest sequence number that appears more than once in a batch.
pub fn lowest_batch_duplicate(sequences: &[i64]) -> Option<i64> {
    let mut seen = HashSet::with_capacity(sequences.len());
    sequences
        .iter()
        .filter(|seq| !seen.insert(**seq))
        .copied()
        .min()
}

/// Sequence number reported for a rejected batch: the lowest among the
/// insert the engine refused, the lowest already-stored sequence of the batch
/// and the lowest in-batch duplicate.
pub fn lowest_conflict(sequences: &[i64], rejected: i64, lowest_stored: Option<i64>) -> i64 {
    [Some(rejected), lowest_stored, lowest_batch_duplicate(sequences)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rejected)
}

/// Whether a database error is a primary key / unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

//! Queued local mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{MutationId, RecordId, TableName};
use crate::record::{overlay, Record};

/// Kind of local write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "CREATE",
            MutationKind::Update => "UPDATE",
            MutationKind::Delete => "DELETE",
        }
    }
}

impl core::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync status of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    /// Waiting to be replayed.
    #[default]
    Pending,
    /// Replay found a true conflict; waiting for an operator decision.
    Conflicted,
    /// Last replay attempt failed; will be retried on the next sync.
    Failed,
}

impl MutationStatus {
    /// Whether the next replay should pick this mutation up.
    pub fn is_replayable(&self) -> bool {
        matches!(self, MutationStatus::Pending | MutationStatus::Failed)
    }
}

/// A locally recorded intent to change a record, awaiting sync.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMutation {
    pub id: MutationId,
    pub table: TableName,
    pub record_id: RecordId,
    pub kind: MutationKind,
    /// Proposed new field values (partial for updates).
    pub data: Record,
    /// Snapshot of the record before the local write.
    pub original_data: Record,
    pub created_at: DateTime<Utc>,
    pub status: MutationStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl QueuedMutation {
    /// Build a new pending mutation, validating the payload shape for its kind.
    pub fn new(
        table: TableName,
        record_id: RecordId,
        kind: MutationKind,
        data: Record,
        original_data: Record,
    ) -> DomainResult<Self> {
        match kind {
            MutationKind::Create | MutationKind::Update if data.is_empty() => {
                return Err(DomainError::validation(format!(
                    "{kind} mutation on {table} requires non-empty data"
                )));
            }
            MutationKind::Create if !original_data.is_empty() => {
                return Err(DomainError::validation(format!(
                    "CREATE mutation on {table} cannot carry original data"
                )));
            }
            _ => {}
        }

        let data = if kind == MutationKind::Delete {
            Record::new()
        } else {
            data
        };

        Ok(Self {
            id: MutationId::new(),
            table,
            record_id,
            kind,
            data,
            original_data,
            created_at: Utc::now(),
            status: MutationStatus::Pending,
            attempts: 0,
            last_error: None,
        })
    }

    /// The full record the local side wants: the original overlaid with `data`.
    pub fn local_proposed(&self) -> Record {
        overlay(&self.original_data, &self.data)
    }

    /// Queue ordering key: creation time, then the time-ordered id.
    pub fn queue_key(&self) -> (DateTime<Utc>, MutationId) {
        (self.created_at, self.id)
    }
}

//! Boundary DTOs (persisted and wire shapes).
//!
//! Raw JSON rows are parsed into these shapes exactly once and converted into
//! domain types. Domain code never handles the raw shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, DomainResult};
use crate::id::{MutationId, RecordId, TableName};
use crate::mutation::{MutationKind, MutationStatus, QueuedMutation};
use crate::record::{record_from_value, Record};

/// Persisted form of a [`QueuedMutation`].
///
/// `status`, `attempts` and `lastError` are optional so records written by
/// older clients still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutationDto {
    pub id: String,
    pub table: String,
    pub record_id: String,
    #[serde(rename = "type")]
    pub kind: MutationKind,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub original_data: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: MutationStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TryFrom<QueuedMutationDto> for QueuedMutation {
    type Error = DomainError;

    fn try_from(dto: QueuedMutationDto) -> DomainResult<Self> {
        let id: MutationId = dto.id.parse()?;
        let record_id: RecordId = dto.record_id.parse()?;
        let table = TableName::new(dto.table)?;

        let data = match dto.kind {
            MutationKind::Delete => Record::new(),
            _ => record_from_value(dto.data)
                .map_err(|e| DomainError::validation(format!("mutation {id} data: {e}")))?,
        };
        let original_data = record_from_value(dto.original_data)
            .map_err(|e| DomainError::validation(format!("mutation {id} originalData: {e}")))?;

        Ok(QueuedMutation {
            id,
            table,
            record_id,
            kind: dto.kind,
            data,
            original_data,
            created_at: dto.created_at,
            status: dto.status,
            attempts: dto.attempts,
            last_error: dto.last_error,
        })
    }
}

impl From<&QueuedMutation> for QueuedMutationDto {
    fn from(m: &QueuedMutation) -> Self {
        Self {
            id: m.id.to_string(),
            table: m.table.to_string(),
            record_id: m.record_id.to_string(),
            kind: m.kind,
            data: Value::Object(m.data.clone()),
            original_data: Value::Object(m.original_data.clone()),
            created_at: m.created_at,
            status: m.status,
            attempts: m.attempts,
            last_error: m.last_error.clone(),
        }
    }
}

/// Parse a raw persisted JSON value straight into a domain mutation.
pub fn mutation_from_json(value: Value) -> DomainResult<QueuedMutation> {
    let dto: QueuedMutationDto = serde_json::from_value(value)
        .map_err(|e| DomainError::validation(format!("malformed queued mutation: {e}")))?;
    QueuedMutation::try_from(dto)
}

/// Serialize a domain mutation into its persisted JSON form.
pub fn mutation_to_json(mutation: &QueuedMutation) -> Value {
    // Serializing a struct of strings, maps and enums cannot fail.
    serde_json::to_value(QueuedMutationDto::from(mutation)).unwrap_or(Value::Null)
}

//! Shared sync types.

use fabricsync_core::{ConflictAnalysis, MutationId, QueuedMutation, Record};
use serde::{Deserialize, Serialize};

/// A queued mutation whose replay hit a true conflict, together with the
/// three records the analysis was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConflict {
    #[serde(skip)]
    pub mutation: QueuedMutation,
    pub mutation_id: MutationId,
    pub local: Record,
    pub server: Record,
    pub analysis: ConflictAnalysis,
}

impl PendingConflict {
    pub fn new(mutation: QueuedMutation, server: Record, analysis: ConflictAnalysis) -> Self {
        Self {
            mutation_id: mutation.id,
            local: mutation.local_proposed(),
            mutation,
            server,
            analysis,
        }
    }

    pub fn original(&self) -> &Record {
        &self.mutation.original_data
    }
}

/// Operator decision for one conflicted mutation.
///
/// Serialized as `{"resolution": "local"}`, `{"resolution": "server"}` or
/// `{"resolution": "merge", "mergedData": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resolution", content = "mergedData", rename_all = "lowercase")]
pub enum Resolution {
    /// Push the local-proposed record over the server one.
    Local,
    /// Discard the local mutation.
    Server,
    /// Push an operator-merged record.
    Merge(Record),
}

impl Resolution {
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Local => "local",
            Resolution::Server => "server",
            Resolution::Merge(_) => "merge",
        }
    }
}

/// A mutation whose replay failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMutation {
    pub id: MutationId,
    pub error: String,
}

/// Result of one replay pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Mutations pushed and dequeued, in replay order.
    pub synced: Vec<MutationId>,
    /// New true conflicts found in this pass.
    pub conflicts: Vec<PendingConflict>,
    pub failed: Vec<FailedMutation>,
    /// Mutations skipped because an earlier mutation on the same record is
    /// unresolved or failed.
    pub held_back: Vec<MutationId>,
    /// The pass stopped early because the backend became unreachable.
    pub interrupted: bool,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.failed.is_empty() && !self.interrupted
    }
}

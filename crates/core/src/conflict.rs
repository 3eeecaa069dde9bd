//! Three-way conflict analysis.
//!
//! Given the record as it was when a mutation was queued (`original`), the
//! record the local side wants (`local`) and the record currently on the
//! server (`server`), classify each top-level field:
//!
//! - **conflict**: local and server both changed it, to different values
//! - **auto-mergeable**: only one side changed it, or both converged
//! - **unchanged**: neither side touched it
//!
//! A field missing from a record is its own value ("absent"), distinct from
//! `null`. Values are compared structurally as a whole; nested objects and
//! arrays are never diffed recursively.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::Record;

/// Which side of a conflict wins a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Server,
}

impl core::fmt::Display for Side {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Side::Local => f.write_str("local"),
            Side::Server => f.write_str("server"),
        }
    }
}

/// Per-field operator choices: field name to winning side.
pub type ResolutionMap = BTreeMap<String, Side>;

/// A field that both sides changed incompatibly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub field: String,
    pub original_value: Option<Value>,
    pub local_value: Option<Value>,
    pub server_value: Option<Value>,
}

impl ConflictInfo {
    /// The value a given side proposes for this field.
    pub fn value_for(&self, side: Side) -> Option<&Value> {
        match side {
            Side::Local => self.local_value.as_ref(),
            Side::Server => self.server_value.as_ref(),
        }
    }
}

/// A field that can be merged without operator input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMerge {
    pub field: String,
    pub resolution: Side,
}

/// Classification of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Unchanged,
    Conflict,
    AutoMerge(Side),
}

/// Output of [`analyze`]; both lists are ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictAnalysis {
    pub conflicts: Vec<ConflictInfo>,
    pub auto_mergeable: Vec<AutoMerge>,
}

impl ConflictAnalysis {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn is_conflict(&self, field: &str) -> bool {
        self.conflicts.iter().any(|c| c.field == field)
    }

    pub fn conflict_fields(&self) -> impl Iterator<Item = &str> {
        self.conflicts.iter().map(|c| c.field.as_str())
    }

    /// Winning side for an auto-mergeable field, if it is one.
    pub fn auto_resolution(&self, field: &str) -> Option<Side> {
        self.auto_mergeable
            .iter()
            .find(|a| a.field == field)
            .map(|a| a.resolution)
    }

    /// Conflicting fields not covered by `resolutions`.
    pub fn unresolved(&self, resolutions: &ResolutionMap) -> Vec<String> {
        self.conflict_fields()
            .filter(|f| !resolutions.contains_key(*f))
            .map(str::to_string)
            .collect()
    }
}

/// Classify one field from its three values (`None` = absent).
pub fn classify(
    original: Option<&Value>,
    local: Option<&Value>,
    server: Option<&Value>,
) -> FieldClass {
    let local_changed = local != original;
    let server_changed = server != original;

    match (local_changed, server_changed) {
        (false, false) => FieldClass::Unchanged,
        (true, false) => FieldClass::AutoMerge(Side::Local),
        (false, true) => FieldClass::AutoMerge(Side::Server),
        // Both sides converged on the same new value.
        (true, true) if local == server => FieldClass::AutoMerge(Side::Server),
        (true, true) => FieldClass::Conflict,
    }
}

/// Run the three-way analysis over the union of field names.
pub fn analyze(original: &Record, local: &Record, server: &Record) -> ConflictAnalysis {
    let fields: BTreeSet<&String> = original
        .keys()
        .chain(local.keys())
        .chain(server.keys())
        .collect();

    let mut analysis = ConflictAnalysis::default();

    for field in fields {
        let o = original.get(field);
        let l = local.get(field);
        let s = server.get(field);

        match classify(o, l, s) {
            FieldClass::Unchanged => {}
            FieldClass::Conflict => analysis.conflicts.push(ConflictInfo {
                field: field.clone(),
                original_value: o.cloned(),
                local_value: l.cloned(),
                server_value: s.cloned(),
            }),
            FieldClass::AutoMerge(side) => analysis.auto_mergeable.push(AutoMerge {
                field: field.clone(),
                resolution: side,
            }),
        }
    }

    tracing::trace!(
        conflicts = analysis.conflicts.len(),
        auto_mergeable = analysis.auto_mergeable.len(),
        "three-way analysis complete"
    );

    analysis
}

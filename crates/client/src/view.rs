//! Read-only presentations of a pending conflict.
//!
//! Both views are derived from the same analyzer output and never touch the
//! session's resolution state.

use std::collections::BTreeSet;
use std::fmt;

use fabricsync_core::{classify, FieldClass, Record, ResolutionMap, Side};
use serde::Serialize;
use serde_json::Value;

use crate::types::PendingConflict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "side")]
pub enum FieldState {
    Unchanged,
    Conflict,
    AutoMerged(Side),
}

/// One row of the side-by-side table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRow {
    pub field: String,
    pub original: Option<Value>,
    pub local: Option<Value>,
    pub server: Option<Value>,
    pub state: FieldState,
    /// Operator choice, for conflict rows only.
    pub chosen: Option<Side>,
}

/// One line of the unified diff.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffLine {
    Context { field: String, value: Option<Value> },
    Removed { field: String, value: Option<Value> },
    Local { field: String, value: Option<Value> },
    Server { field: String, value: Option<Value> },
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (marker, field, value, suffix) = match self {
            DiffLine::Context { field, value } => (' ', field, value, ""),
            DiffLine::Removed { field, value } => ('-', field, value, ""),
            DiffLine::Local { field, value } => ('+', field, value, "  (local)"),
            DiffLine::Server { field, value } => ('+', field, value, "  (server)"),
        };
        write!(f, "{marker} {field}: {}{suffix}", display_value(value.as_ref()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConflictView {
    SideBySide(Vec<FieldRow>),
    Unified(Vec<DiffLine>),
}

pub fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(absent)".to_string(),
    }
}

fn fields<'a>(original: &'a Record, local: &'a Record, server: &'a Record) -> BTreeSet<&'a String> {
    original.keys().chain(local.keys()).chain(server.keys()).collect()
}

/// Every field of the three records with its classification.
pub fn side_by_side(conflict: &PendingConflict, resolutions: &ResolutionMap) -> Vec<FieldRow> {
    let original = conflict.original();
    let (local, server) = (&conflict.local, &conflict.server);

    fields(original, local, server)
        .into_iter()
        .map(|field| {
            let (o, l, s) = (original.get(field), local.get(field), server.get(field));
            let state = match classify(o, l, s) {
                FieldClass::Unchanged => FieldState::Unchanged,
                FieldClass::Conflict => FieldState::Conflict,
                FieldClass::AutoMerge(side) => FieldState::AutoMerged(side),
            };
            FieldRow {
                field: field.clone(),
                original: o.cloned(),
                local: l.cloned(),
                server: s.cloned(),
                chosen: match state {
                    FieldState::Conflict => resolutions.get(field.as_str()).copied(),
                    _ => None,
                },
                state,
            }
        })
        .collect()
}

/// Unified diff: unchanged fields as context, changed ones as removal of the
/// original followed by the proposed value(s).
pub fn unified(conflict: &PendingConflict) -> Vec<DiffLine> {
    let original = conflict.original();
    let (local, server) = (&conflict.local, &conflict.server);
    let mut lines = Vec::new();

    for field in fields(original, local, server) {
        let (o, l, s) = (original.get(field), local.get(field), server.get(field));
        let field = field.clone();

        match classify(o, l, s) {
            FieldClass::Unchanged => lines.push(DiffLine::Context {
                field,
                value: o.cloned(),
            }),
            class => {
                lines.push(DiffLine::Removed {
                    field: field.clone(),
                    value: o.cloned(),
                });
                if class != FieldClass::AutoMerge(Side::Server) {
                    lines.push(DiffLine::Local {
                        field: field.clone(),
                        value: l.cloned(),
                    });
                }
                if class != FieldClass::AutoMerge(Side::Local) {
                    lines.push(DiffLine::Server {
                        field,
                        value: s.cloned(),
                    });
                }
            }
        }
    }

    lines
}

//! Conflict resolution session.
//!
//! Walks a list of pending conflicts one at a time. For the current conflict
//! the operator keeps the local record, keeps the server record, or picks a
//! side per conflicting field and merges. Each decision advances to the next
//! conflict; deciding the last one closes the session.

use fabricsync_core::{apply_with_analysis, DomainError, DomainResult, MutationId, ResolutionMap, Side};
use serde::{Deserialize, Serialize};

use crate::sync_manager::{ResolveHandler, SyncError};
use crate::types::{PendingConflict, Resolution};
use crate::view::{self, ConflictView};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    #[default]
    SideBySide,
    Unified,
}

/// A decision to hand to the resolve callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub mutation_id: MutationId,
    pub resolution: Resolution,
}

impl Decision {
    pub async fn submit(self, handler: &dyn ResolveHandler) -> Result<(), SyncError> {
        handler.on_resolve(self.mutation_id, self.resolution).await
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionSession {
    conflicts: Vec<PendingConflict>,
    index: usize,
    view_mode: ViewMode,
    resolutions: ResolutionMap,
    closed: bool,
}

impl ResolutionSession {
    pub fn new(conflicts: Vec<PendingConflict>) -> Self {
        Self {
            closed: conflicts.is_empty(),
            conflicts,
            index: 0,
            view_mode: ViewMode::default(),
            resolutions: ResolutionMap::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn current(&self) -> Option<&PendingConflict> {
        if self.closed {
            return None;
        }
        self.conflicts.get(self.index)
    }

    /// `(n, m)` for "conflict n of m", 1-based.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.current().map(|_| (self.index + 1, self.conflicts.len()))
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn resolutions(&self) -> &ResolutionMap {
        &self.resolutions
    }

    /// Pick the winning side for one conflicting field.
    pub fn choose(&mut self, field: &str, side: Side) -> DomainResult<()> {
        let conflict = self.require_current()?;
        if !conflict.analysis.is_conflict(field) {
            return Err(DomainError::validation(format!(
                "field '{field}' is not in conflict"
            )));
        }
        self.resolutions.insert(field.to_string(), side);
        Ok(())
    }

    /// Pick the same side for every conflicting field.
    pub fn choose_all(&mut self, side: Side) -> DomainResult<()> {
        let fields: Vec<String> = self
            .require_current()?
            .analysis
            .conflict_fields()
            .map(str::to_string)
            .collect();
        for field in fields {
            self.resolutions.insert(field, side);
        }
        Ok(())
    }

    /// Conflicting fields of the current conflict still lacking a choice.
    pub fn unresolved(&self) -> Vec<String> {
        self.current()
            .map(|c| c.analysis.unresolved(&self.resolutions))
            .unwrap_or_default()
    }

    pub fn can_merge(&self) -> bool {
        self.current().is_some() && self.unresolved().is_empty()
    }

    pub fn keep_local(&mut self) -> DomainResult<Decision> {
        self.decide(Resolution::Local)
    }

    pub fn keep_server(&mut self) -> DomainResult<Decision> {
        self.decide(Resolution::Server)
    }

    /// Merge the current conflict with the chosen per-field sides.
    pub fn merge(&mut self) -> DomainResult<Decision> {
        let conflict = self.require_current()?;
        let merged = apply_with_analysis(
            &conflict.analysis,
            &conflict.local,
            &conflict.server,
            &self.resolutions,
        )?;
        self.decide(Resolution::Merge(merged))
    }

    /// Move back one conflict; no-op on the first.
    pub fn prev(&mut self) {
        if self.closed || self.index == 0 {
            return;
        }
        self.index -= 1;
        self.resolutions.clear();
    }

    /// Skip to the next conflict without deciding; no-op on the last.
    pub fn next(&mut self) {
        if self.closed || self.index + 1 >= self.conflicts.len() {
            return;
        }
        self.index += 1;
        self.resolutions.clear();
    }

    /// Render the current conflict in the active view mode.
    pub fn render(&self) -> Option<ConflictView> {
        let conflict = self.current()?;
        Some(match self.view_mode {
            ViewMode::SideBySide => {
                ConflictView::SideBySide(view::side_by_side(conflict, &self.resolutions))
            }
            ViewMode::Unified => ConflictView::Unified(view::unified(conflict)),
        })
    }

    fn require_current(&self) -> DomainResult<&PendingConflict> {
        self.current()
            .ok_or_else(|| DomainError::validation("resolution session is closed"))
    }

    fn decide(&mut self, resolution: Resolution) -> DomainResult<Decision> {
        let mutation_id = self.require_current()?.mutation_id;
        tracing::debug!(%mutation_id, resolution = resolution.label(), "conflict decided");

        self.resolutions.clear();
        if self.index + 1 < self.conflicts.len() {
            self.index += 1;
        } else {
            self.closed = true;
        }

        Ok(Decision {
            mutation_id,
            resolution,
        })
    }
}

//! `fabricsync-core`: sync domain building blocks.
//!
//! This crate contains **pure domain** logic (no IO): identifiers, queued
//! mutations, boundary DTOs, three-way conflict analysis and merging.

pub mod conflict;
pub mod dto;
pub mod error;
pub mod id;
pub mod merge;
pub mod mutation;
pub mod record;

pub use conflict::{analyze, classify, AutoMerge, ConflictAnalysis, ConflictInfo, FieldClass, ResolutionMap, Side};
pub use dto::{mutation_from_json, mutation_to_json, QueuedMutationDto};
pub use error::{DomainError, DomainResult};
pub use id::{MutationId, RecordId, TableName};
pub use merge::{apply_resolutions, apply_with_analysis, auto_merge};
pub use mutation::{MutationKind, MutationStatus, QueuedMutation};
pub use record::{overlay, record_from_value, Record};

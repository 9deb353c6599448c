//! Typed error hierarchy for the board engine.
//!
//! Three enums cover the three boundaries:
//! - `RemoteRecordError`: a raw gateway record that cannot be normalized
//! - `GatewayError`: a persistence call that failed
//! - `StoreError`: what `OptimisticStore` operations return

use std::path::PathBuf;

use thiserror::Error;

use crate::board::entity::Violation;
use crate::board::gateway::GatewayOp;
use crate::board::models::{EntityKind, EntityRef, RemoteId};

/// A raw record the gateway returned that cannot become an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteRecordError {
    #[error("remote {kind} record is missing '{field}'")]
    MissingField {
        kind: EntityKind,
        field: &'static str,
    },

    #[error("remote timestamp '{field}' is not a valid date: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// Failures at the remote persistence boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{op} rejected by gateway: {message}")]
    Rejected { op: GatewayOp, message: String },

    #[error("{kind} {id} not found on gateway")]
    NotFound { kind: EntityKind, id: String },

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Gateway I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Gateway snapshot is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by `OptimisticStore` operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} rejected: {}", join_violations(.violations))]
    Invalid {
        kind: EntityKind,
        violations: Vec<Violation>,
    },

    #[error("{kind} {id} has not been confirmed by the gateway yet")]
    Unconfirmed { kind: EntityKind, id: EntityRef },

    #[error("Persistence failed: {0}")]
    Persistence(#[from] GatewayError),

    #[error("Gateway returned a malformed record: {0}")]
    Remote(#[from] RemoteRecordError),

    /// The move was applied locally but some position updates never landed.
    /// Local state is kept as moved; the gateway may now disagree with it.
    #[error(
        "Move of card {card} partially applied: {} of {attempted} position updates failed",
        .failures.len()
    )]
    PartialMove {
        card: EntityRef,
        attempted: usize,
        failures: Vec<(RemoteId, GatewayError)>,
    },

    /// The draft was removed locally while its create call was in flight.
    /// The record the gateway created for it has been deleted again.
    #[error("{kind} {draft} was removed before the gateway confirmed it")]
    Withdrawn { kind: EntityKind, draft: EntityRef },

    /// Like `Withdrawn`, but deleting the gateway record failed as well, so
    /// the gateway still holds an entity the board no longer shows.
    #[error("{kind} {draft} was removed locally but gateway record {remote} survived: {source}")]
    Orphaned {
        kind: EntityKind,
        draft: EntityRef,
        remote: RemoteId,
        #[source]
        source: GatewayError,
    },

    #[error("Board state lock poisoned")]
    LockPoisoned,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

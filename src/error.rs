//! Error types for the collision core
//!
//! Only API-level failures surface here. Numeric trouble inside a step is
//! handled locally (discarded hits, abandoned splits) and never aborts it.

use thiserror::Error;

use crate::physics::{BallId, ColliderId, ItemId, MechanismId};

/// Recoverable errors returned by the public API
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// No ball with this id is in the world
    #[error("Unknown ball {0:?}")]
    UnknownBall(BallId),

    /// Collider id outside the baked collider table
    #[error("Unknown collider {0:?}")]
    UnknownCollider(ColliderId),

    /// Mechanism id outside its kind's state table
    #[error("Unknown {kind} mechanism {id:?}")]
    UnknownMechanism {
        /// Mechanism kind ("flipper", "gate", ...)
        kind: &'static str,
        /// Offending id
        id: MechanismId,
    },

    /// No collider belongs to this item
    #[error("Unknown item {0:?}")]
    UnknownItem(ItemId),

    /// A ball with this id already exists
    #[error("Duplicate ball {0:?}")]
    DuplicateBall(BallId),

    /// Configuration value out of range
    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting {
        /// Field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Configuration could not be parsed
    #[error("Malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read
    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for the collision core
pub type Result<T> = std::result::Result<T, PhysicsError>;

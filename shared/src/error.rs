//! Error types surfaced by the simulation core.
//!
//! Nothing in here is fatal: every error either becomes a user-facing notice,
//! a skipped sync cycle, or a dropped piece of world data.

use thiserror::Error;

use crate::ids::StructureId;

/// Client-side raid rejections. These never reach the network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RaidError {
    #[error("a raid is already in progress")]
    AlreadyActive,

    #[error("{0} is not loaded")]
    UnknownStructure(StructureId),

    #[error("you cannot raid your own house")]
    OwnStructure,

    #[error("target is too far away ({distance:.1} > {range:.1})")]
    OutOfRange { distance: f32, range: f32 },

    #[error("no house nearby")]
    NoTarget,

    #[error("the session has ended")]
    SessionEnded,
}

/// I/O failures reported by the host for a request it carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Failed(String),

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Invalid obstacle, vehicle or structure data. The offending item is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("{what} has a non-finite coordinate")]
    NonFinite { what: &'static str },

    #[error("{what} has a non-positive extent ({value})")]
    NonPositiveExtent { what: &'static str, value: f32 },
}

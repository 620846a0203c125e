use std::path::PathBuf;

use thiserror::Error;

use crate::g6::G6Error;
use crate::kneissler::FamilyType;
use crate::store::ArtifactKey;

/// Errors raised while building or reading Kneissler bases and matrices.
#[derive(Debug, Error)]
pub enum KneisslerError {
    #[error("graph6 codec error: {0}")]
    Codec(#[from] G6Error),

    #[error("unknown Kneissler family type {0} (expected 0, 1, 2 or 3)")]
    UnknownFamilyType(u8),

    #[error("family type {0} has no outgoing contraction differential")]
    NoDifferential(FamilyType),

    #[error("loop order {0} is not supported (expected 5..=32)")]
    InvalidLoopOrder(u8),

    #[error("required artifact {key} has not been built")]
    MissingArtifact { key: ArtifactKey },

    #[error("malformed file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("invalid graph {g6}: {reason}")]
    InvalidGraph { g6: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KneisslerError>;

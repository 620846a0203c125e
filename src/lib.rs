//! Bases and edge-contraction differentials of the Kneissler graph complexes.
//!
//! For a loop order `L`, a family type and an edge-sign convention,
//! [`KneisslerGVS::build_basis`] enumerates the graphs of the family, drops
//! the graphs which vanish because of an orientation-reversing automorphism
//! and stores the sorted canonical forms of the rest.
//! [`KneisslerContract::build_matrix`] then assembles the signed matrix of
//! edge contractions into the relations space of the same loop order.

pub mod canon;
pub mod densegraph;
pub mod error;
pub mod g6;
pub mod gc_graph;
pub mod helpers;
pub mod kneissler;
pub mod kneissler_gc;
pub mod store;
pub mod validate;

pub use canon::{CanonicalFormOracle, SearchCanonizer};
pub use error::{KneisslerError, Result};
pub use kneissler::FamilyType;
pub use kneissler_gc::{BuildOutcome, KneisslerContract, KneisslerGVS};
pub use store::{ArtifactKey, ArtifactKind, ArtifactStore, FileStore, MemoryStore};
pub use validate::{check_basis_against_reference, check_matrix_against_reference, ValidationReport};

use std::fmt;

use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::canon::CanonicalFormOracle;
use crate::error::Result;
use crate::gc_graph::Graph;
use crate::helpers::{make_basis_dict, SparseMatrix};
use crate::kneissler_gc::{KneisslerContract, KneisslerGVS};
use crate::store::ArtifactStore;

/// Differences between a built artifact and its reference. Reference graphs may
/// come in any labeling and order, so they are canonicalized again and matrix
/// entries are realigned with the relabeling signs. Only unreadable data is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub subject: String,
    pub discrepancies: Vec<String>,
}

impl ValidationReport {
    fn new(subject: impl fmt::Display) -> Self {
        ValidationReport {
            subject: subject.to_string(),
            discrepancies: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.discrepancies.is_empty()
    }

    fn push(&mut self, discrepancy: String) {
        self.discrepancies.push(discrepancy);
    }

    /// Logs the outcome: one warning per discrepancy, or a single info line.
    pub fn log(&self) {
        if self.is_ok() {
            info!("{}: matches reference", self.subject);
            return;
        }
        for d in &self.discrepancies {
            warn!("{}: {}", self.subject, d);
        }
        warn!(
            "{}: {} discrepancies with reference",
            self.subject,
            self.discrepancies.len()
        );
    }
}

/// Compares the basis of `gvs` with its reference basis as sets of isomorphism classes.
pub fn check_basis_against_reference<O, S>(gvs: &KneisslerGVS, oracle: &O, store: &S) -> Result<ValidationReport>
where
    O: CanonicalFormOracle,
    S: ArtifactStore,
{
    let mut report = ValidationReport::new(gvs);
    let basis = gvs.basis(store)?;
    let reference = store.load_basis(&gvs.key().reference())?;

    if basis.len() != reference.len() {
        report.push(format!(
            "dimension {} differs from reference dimension {}",
            basis.len(),
            reference.len()
        ));
    }

    let ours: FxHashSet<&String> = basis.iter().collect();
    let mut theirs = FxHashSet::default();
    for g6 in &reference {
        theirs.insert(Graph::from_g6(g6)?.to_canon_g6(oracle)?);
    }
    if theirs.len() != reference.len() {
        report.push(format!(
            "reference lists {} graphs but only {} isomorphism classes",
            reference.len(),
            theirs.len()
        ));
    }

    for g6 in &basis {
        if !theirs.contains(g6) {
            report.push(format!("{} is missing from the reference", g6));
        }
    }
    for g6 in &theirs {
        if !ours.contains(g6) {
            report.push(format!("reference graph {} is missing from the basis", g6));
        }
    }
    report.log();
    Ok(report)
}

/// For every reference graph, its index in `basis` and the sign relating the
/// two orientations. `None` if the graph is not in `basis`.
fn align<O: CanonicalFormOracle>(
    reference: &[String],
    basis: &[String],
    oracle: &O,
    even_edges: bool,
) -> Result<Vec<Option<(usize, i32)>>> {
    let index = make_basis_dict(basis);
    reference
        .iter()
        .map(|g6| -> Result<Option<(usize, i32)>> {
            let (canon, sign) = Graph::from_g6(g6)?.to_canon_g6_sgn(oracle, even_edges)?;
            Ok(index.get(&canon).map(|&i| (i, sign)))
        })
        .collect()
}

/// Compares the matrix of `op` with its reference matrix after translating
/// the reference rows and columns into the built bases.
pub fn check_matrix_against_reference<O, S>(op: &KneisslerContract, oracle: &O, store: &S) -> Result<ValidationReport>
where
    O: CanonicalFormOracle,
    S: ArtifactStore,
{
    let mut report = ValidationReport::new(op);
    let even_edges = op.domain().even_edges();

    let matrix = op.matrix(store)?;
    let reference = store.load_matrix(&op.key().reference())?;
    let in_basis = op.domain().basis(store)?;
    let out_basis = op.target().basis(store)?;
    let ref_in_basis = store.load_basis(&op.domain().key().reference())?;
    let ref_out_basis = store.load_basis(&op.target().key().reference())?;

    if (matrix.nrows, matrix.ncols) != (reference.nrows, reference.ncols) {
        report.push(format!(
            "shape {}x{} differs from reference shape {}x{}",
            matrix.nrows, matrix.ncols, reference.nrows, reference.ncols
        ));
    }
    if (reference.nrows, reference.ncols) != (ref_in_basis.len(), ref_out_basis.len()) {
        report.push(format!(
            "reference matrix is {}x{} but the reference bases have dimensions {} and {}",
            reference.nrows,
            reference.ncols,
            ref_in_basis.len(),
            ref_out_basis.len()
        ));
    }

    let in_perm = align(&ref_in_basis, &in_basis, oracle, even_edges)?;
    let out_perm = align(&ref_out_basis, &out_basis, oracle, even_edges)?;
    for (i, slot) in in_perm.iter().enumerate() {
        if slot.is_none() {
            report.push(format!("reference row {} ({}) is not in the domain basis", i + 1, ref_in_basis[i]));
        }
    }
    for (j, slot) in out_perm.iter().enumerate() {
        if slot.is_none() {
            report.push(format!("reference column {} ({}) is not in the target basis", j + 1, ref_out_basis[j]));
        }
    }

    let mut corrected = SparseMatrix::new(matrix.nrows, matrix.ncols);
    for (&(row, col), &value) in &reference.entries {
        let aligned = (
            in_perm.get(row).copied().flatten(),
            out_perm.get(col).copied().flatten(),
        );
        match aligned {
            (Some((r, in_sgn)), Some((c, out_sgn))) => corrected.add(r, c, value * in_sgn * out_sgn),
            _ => report.push(format!(
                "reference entry ({}, {}) = {} cannot be aligned",
                row + 1,
                col + 1,
                value
            )),
        }
    }
    corrected.prune_zeros();

    let positions: FxHashSet<(usize, usize)> = matrix
        .entries
        .keys()
        .chain(corrected.entries.keys())
        .copied()
        .collect();
    let mut positions: Vec<_> = positions.into_iter().collect();
    positions.sort();
    for (row, col) in positions {
        let (ours, theirs) = (matrix.get(row, col), corrected.get(row, col));
        if ours != theirs {
            report.push(format!(
                "entry ({}, {}) is {} but the reference has {}",
                row + 1,
                col + 1,
                ours,
                theirs
            ));
        }
    }

    report.log();
    Ok(report)
}

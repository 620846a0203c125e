use crate::densegraph::DenseGraph;

/// Canonical labeling and automorphism groups. The builders only need these
/// two queries, so a nauty or bliss binding can be dropped in without touching them.
pub trait CanonicalFormOracle {
    /// Returns the canonically relabeled graph and the labeling producing it:
    /// vertex `v` of `g` becomes vertex `perm[v]` of the canonical graph.
    fn canonicalize(&self, g: &DenseGraph) -> (DenseGraph, Vec<u8>);

    /// A generating set of the automorphism group of `g` as labeled,
    /// each automorphism given as a vertex permutation.
    fn automorphism_generators(&self, g: &DenseGraph) -> Vec<Vec<u8>>;
}

/// Pure Rust backend: exhaustive individualization-refinement search on
/// [`DenseGraph`]. It reports the whole automorphism group, which is in
/// particular a generating set.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchCanonizer;

impl CanonicalFormOracle for SearchCanonizer {
    fn canonicalize(&self, g: &DenseGraph) -> (DenseGraph, Vec<u8>) {
        g.canonical_label()
    }

    fn automorphism_generators(&self, g: &DenseGraph) -> Vec<Vec<u8>> {
        g.automorphisms()
    }
}

impl<O: CanonicalFormOracle + ?Sized> CanonicalFormOracle for &O {
    fn canonicalize(&self, g: &DenseGraph) -> (DenseGraph, Vec<u8>) {
        (**self).canonicalize(g)
    }

    fn automorphism_generators(&self, g: &DenseGraph) -> Vec<Vec<u8>> {
        (**self).automorphism_generators(g)
    }
}

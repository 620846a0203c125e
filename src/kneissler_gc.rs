use std::fmt;

use indicatif::ProgressBar;
use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::canon::CanonicalFormOracle;
use crate::error::{KneisslerError, Result};
use crate::gc_graph::Graph;
use crate::helpers::{get_progress_bar, make_basis_dict, SparseMatrix};
use crate::kneissler::*;
use crate::store::{get_type_string, ArtifactKey, ArtifactStore};

pub const MIN_LOOPS: u8 = 5;
pub const MAX_LOOPS: u8 = 32;

/// What a build call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The artifact already existed and was left alone.
    Cached,
    /// The artifact was (re)computed; `size` is the basis dimension or the
    /// number of nonzero matrix entries.
    Built { size: usize },
}

/// The graph vector space spanned by one Kneissler family at a given loop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KneisslerGVS {
    num_loops: u8,
    family: FamilyType,
    even_edges: bool,
}

impl KneisslerGVS {
    pub fn new(num_loops: u8, family: FamilyType, even_edges: bool) -> Result<Self> {
        if !(MIN_LOOPS..=MAX_LOOPS).contains(&num_loops) {
            return Err(KneisslerError::InvalidLoopOrder(num_loops));
        }
        Ok(KneisslerGVS {
            num_loops,
            family,
            even_edges,
        })
    }

    pub fn num_loops(&self) -> u8 {
        self.num_loops
    }

    pub fn family(&self) -> FamilyType {
        self.family
    }

    pub fn even_edges(&self) -> bool {
        self.even_edges
    }

    pub fn k(&self) -> usize {
        self.num_loops as usize - 1
    }

    pub fn num_vertices(&self) -> u8 {
        2 * (self.num_loops - 1) - self.family.defect() as u8
    }

    pub fn num_edges(&self) -> usize {
        3 * self.k() - self.family.defect()
    }

    /// Vertex and edge count shared by every graph in the space.
    pub fn dimension(&self) -> (u8, usize) {
        (self.num_vertices(), self.num_edges())
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::basis(self.num_loops, self.family, self.even_edges)
    }

    fn with_family(&self, family: FamilyType) -> KneisslerGVS {
        KneisslerGVS { family, ..*self }
    }

    /// Loads the basis, which must have been built before.
    pub fn basis<S: ArtifactStore>(&self, store: &S) -> Result<Vec<String>> {
        store.load_basis(&self.key())
    }

    /// Candidate graphs contributed by the permutation `p`.
    fn candidates(&self, p: &[usize]) -> Vec<Graph> {
        let k = self.k();
        let mut graphs = Vec::with_capacity(3);
        match self.family {
            FamilyType::Generators => graphs.push(barrel_graph(k, p)),
            FamilyType::Relations => {
                graphs.push(tbarrel_graph(k, p));
                if p[k - 2] != k - 2 {
                    graphs.push(xtbarrel_graph(k, p));
                }
            }
            FamilyType::AllTrivalent => {
                graphs.push(barrel_graph(k, p));
                graphs.push(triangle_graph(k, p));
                if p[k - 2] > 0 {
                    graphs.push(hgraph(k, p));
                }
            }
            FamilyType::Complement => {}
        }
        graphs
    }

    /// Builds and stores the basis unless it exists and `overwrite` is false.
    pub fn build_basis<O, S>(&self, oracle: &O, store: &S, overwrite: bool) -> Result<BuildOutcome>
    where
        O: CanonicalFormOracle,
        S: ArtifactStore,
    {
        let key = self.key();
        if !overwrite && store.exists(&key) {
            debug!("{} exists, skipping", key);
            return Ok(BuildOutcome::Cached);
        }
        info!("Building basis for {}", self);

        let basis = match self.family {
            FamilyType::Complement => self.complement_basis(store)?,
            _ => self.generated_basis(oracle)?,
        };
        store.save_basis(&key, &basis)?;

        info!("Basis of {} has dimension {}", self, basis.len());
        Ok(BuildOutcome::Built { size: basis.len() })
    }

    fn generated_basis<O: CanonicalFormOracle>(&self, oracle: &O) -> Result<Vec<String>> {
        let k = self.k();
        let defect = self.family.defect();
        let pb = self.progress_bar();

        let mut g6s = FxHashSet::default();
        let mut num_candidates = 0usize;
        for p in all_permutations(k - 1) {
            for g in self.candidates(&p) {
                g.check_valid(defect)?;
                num_candidates += 1;
                if !g.has_odd_automorphism(oracle, self.even_edges) {
                    g6s.insert(g.to_canon_g6(oracle)?);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        debug!(
            "{}: {} candidates, {} nonzero isomorphism classes",
            self,
            num_candidates,
            g6s.len()
        );

        let mut basis: Vec<String> = g6s.into_iter().collect();
        basis.sort();
        Ok(basis)
    }

    /// One tick per permutation. Falls back to a spinner once `(k-1)!` no
    /// longer fits into a `usize`.
    fn progress_bar(&self) -> ProgressBar {
        match num_permutations(self.k() - 1) {
            Some(num_perms) => get_progress_bar(num_perms),
            None => ProgressBar::new_spinner(),
        }
    }

    /// Basis of type 2 minus basis of type 0; both must exist.
    fn complement_basis<S: ArtifactStore>(&self, store: &S) -> Result<Vec<String>> {
        let generators: FxHashSet<String> = self
            .with_family(FamilyType::Generators)
            .basis(store)?
            .into_iter()
            .collect();
        let mut basis: Vec<String> = self
            .with_family(FamilyType::AllTrivalent)
            .basis(store)?
            .into_iter()
            .filter(|g6| !generators.contains(g6))
            .collect();
        basis.sort();
        basis.dedup();
        Ok(basis)
    }
}

impl fmt::Display for KneisslerGVS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KneisslerGVS({}, {}, {})",
            self.num_loops,
            self.family,
            get_type_string(self.even_edges)
        )
    }
}

/// Edge contraction from a trivalent Kneissler space to the relations space
/// of the same loop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KneisslerContract {
    domain: KneisslerGVS,
    target: KneisslerGVS,
}

impl KneisslerContract {
    pub fn new(num_loops: u8, family: FamilyType, even_edges: bool) -> Result<Self> {
        if !family.has_differential() {
            return Err(KneisslerError::NoDifferential(family));
        }
        Ok(KneisslerContract {
            domain: KneisslerGVS::new(num_loops, family, even_edges)?,
            target: KneisslerGVS::new(num_loops, FamilyType::Relations, even_edges)?,
        })
    }

    pub fn domain(&self) -> KneisslerGVS {
        self.domain
    }

    pub fn target(&self) -> KneisslerGVS {
        self.target
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::matrix(self.domain.num_loops, self.domain.family, self.domain.even_edges)
    }

    pub fn matrix<S: ArtifactStore>(&self, store: &S) -> Result<SparseMatrix> {
        store.load_matrix(&self.key())
    }

    /// Builds and stores the matrix of the differential, one row per domain
    /// basis element and one column per target basis element.
    /// Both bases must exist already.
    pub fn build_matrix<O, S>(&self, oracle: &O, store: &S, overwrite: bool) -> Result<BuildOutcome>
    where
        O: CanonicalFormOracle,
        S: ArtifactStore,
    {
        let key = self.key();
        if !overwrite && store.exists(&key) {
            debug!("{} exists, skipping", key);
            return Ok(BuildOutcome::Cached);
        }
        info!("Building matrix for {}", self);

        let even_edges = self.domain.even_edges;
        let in_basis = self.domain.basis(store)?;
        let out_basis = self.target.basis(store)?;
        let out_basis_map = make_basis_dict(&out_basis);

        let mut matrix = SparseMatrix::new(in_basis.len(), out_basis.len());
        let pb = get_progress_bar(in_basis.len());
        for (row, g6) in in_basis.iter().enumerate() {
            let g = Graph::from_g6(g6)?;
            for (g1, sign) in g.get_contractions_with_sign(even_edges) {
                let (g1s, sign2) = g1.to_canon_g6_sgn(oracle, even_edges)?;
                if let Some(&col) = out_basis_map.get(&g1s) {
                    matrix.add(row, col, sign * sign2);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        matrix.prune_zeros();

        store.save_matrix(&key, &matrix)?;
        info!(
            "Matrix of {} is {}x{} with {} nonzero entries",
            self,
            matrix.nrows,
            matrix.ncols,
            matrix.nnz()
        );
        Ok(BuildOutcome::Built { size: matrix.nnz() })
    }
}

impl fmt::Display for KneisslerContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KneisslerContract({}, {}, {})",
            self.domain.num_loops,
            self.domain.family,
            get_type_string(self.domain.even_edges)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::SearchCanonizer;
    use crate::store::MemoryStore;
    use rand::seq::SliceRandom;
    use rustc_hash::FxHashMap;

    const GENERATED: [FamilyType; 3] = [
        FamilyType::Generators,
        FamilyType::Relations,
        FamilyType::AllTrivalent,
    ];

    fn build_all(store: &MemoryStore, num_loops: u8, even_edges: bool) {
        let oracle = SearchCanonizer;
        for family in FamilyType::ALL {
            KneisslerGVS::new(num_loops, family, even_edges)
                .unwrap()
                .build_basis(&oracle, store, false)
                .unwrap();
        }
    }

    /// Image of `g` under the differential, by target index.
    fn contraction_row(g: &Graph, out_basis: &[String], even_edges: bool) -> FxHashMap<usize, i32> {
        let out_map = make_basis_dict(out_basis);
        let mut row = FxHashMap::default();
        for (g1, sign) in g.get_contractions_with_sign(even_edges) {
            let (g1s, sign2) = g1.to_canon_g6_sgn(&SearchCanonizer, even_edges).unwrap();
            if let Some(&col) = out_map.get(&g1s) {
                *row.entry(col).or_insert(0) += sign * sign2;
            }
        }
        row.retain(|_, v| *v != 0);
        row
    }

    #[test]
    fn test_parameter_validation() {
        assert!(matches!(
            KneisslerGVS::new(4, FamilyType::Generators, true),
            Err(KneisslerError::InvalidLoopOrder(4))
        ));
        assert!(matches!(
            KneisslerGVS::new(33, FamilyType::Generators, true),
            Err(KneisslerError::InvalidLoopOrder(33))
        ));
        assert!(KneisslerGVS::new(5, FamilyType::Generators, true).is_ok());
        assert!(matches!(
            KneisslerContract::new(6, FamilyType::Relations, true),
            Err(KneisslerError::NoDifferential(FamilyType::Relations))
        ));
        let c = KneisslerContract::new(6, FamilyType::Complement, false).unwrap();
        assert_eq!(c.target().family(), FamilyType::Relations);
        assert_eq!(c.domain().family(), FamilyType::Complement);
        assert_eq!(c.to_string(), "KneisslerContract(6, 3, odd_edges)");

        let gvs = KneisslerGVS::new(9, FamilyType::AllTrivalent, false).unwrap();
        assert_eq!(
            (gvs.num_loops(), gvs.family(), gvs.even_edges()),
            (9, FamilyType::AllTrivalent, false)
        );
    }

    #[test]
    fn test_progress_bar_for_every_loop_order() {
        // (L-2)! overflows a u64 from L = 23 on
        for num_loops in MIN_LOOPS..=MAX_LOOPS {
            let gvs = KneisslerGVS::new(num_loops, FamilyType::Generators, true).unwrap();
            let pb = gvs.progress_bar();
            pb.inc(1);
            pb.finish_and_clear();
        }
        let gvs = KneisslerGVS::new(23, FamilyType::Relations, false).unwrap();
        assert_eq!(num_permutations(gvs.k() - 1), None);
        gvs.progress_bar().finish_and_clear();
    }

    #[test]
    fn test_dimensions() {
        let gvs = KneisslerGVS::new(6, FamilyType::Generators, true).unwrap();
        assert_eq!(gvs.dimension(), (10, 15));
        let gvs = KneisslerGVS::new(6, FamilyType::Relations, true).unwrap();
        assert_eq!(gvs.dimension(), (9, 14));
        assert_eq!(gvs.to_string(), "KneisslerGVS(6, 1, even_edges)");
    }

    #[test]
    fn test_basis_is_sorted_canonical_and_nonzero() {
        let oracle = SearchCanonizer;
        for num_loops in [5, 6] {
            for even_edges in [true, false] {
                let store = MemoryStore::new();
                for family in GENERATED {
                    let gvs = KneisslerGVS::new(num_loops, family, even_edges).unwrap();
                    let outcome = gvs.build_basis(&oracle, &store, false).unwrap();
                    let basis = gvs.basis(&store).unwrap();
                    assert_eq!(outcome, BuildOutcome::Built { size: basis.len() });

                    // strictly increasing, hence free of duplicates
                    assert!(basis.windows(2).all(|w| w[0] < w[1]));
                    for g6 in &basis {
                        let g = Graph::from_g6(g6).unwrap();
                        assert_eq!((g.num_vertices(), g.num_edges()), gvs.dimension());
                        g.check_valid(family.defect()).unwrap();
                        assert!(!g.has_odd_automorphism(&oracle, even_edges));
                        assert_eq!(&g.to_canon_g6(&oracle).unwrap(), g6);
                    }
                }
            }
        }
    }

    #[test]
    fn test_basis_covers_all_nonzero_candidates() {
        let oracle = SearchCanonizer;
        let store = MemoryStore::new();
        let gvs = KneisslerGVS::new(6, FamilyType::AllTrivalent, true).unwrap();
        gvs.build_basis(&oracle, &store, false).unwrap();
        let basis: FxHashSet<String> = gvs.basis(&store).unwrap().into_iter().collect();

        let k = gvs.k();
        for p in all_permutations(k - 1) {
            for g in gvs.candidates(&p) {
                let canon = g.to_canon_g6(&oracle).unwrap();
                let zero = g.has_odd_automorphism(&oracle, true);
                assert_eq!(basis.contains(&canon), !zero);
            }
        }
    }

    #[test]
    fn test_build_is_deterministic_and_cached() {
        let oracle = SearchCanonizer;
        let store = MemoryStore::new();
        let gvs = KneisslerGVS::new(6, FamilyType::Relations, false).unwrap();

        let first = gvs.build_basis(&oracle, &store, false).unwrap();
        let basis = gvs.basis(&store).unwrap();
        assert_eq!(gvs.build_basis(&oracle, &store, false).unwrap(), BuildOutcome::Cached);

        // a stale artifact is replaced only when overwriting
        store.save_basis(&gvs.key(), &[]).unwrap();
        assert_eq!(gvs.build_basis(&oracle, &store, false).unwrap(), BuildOutcome::Cached);
        assert!(gvs.basis(&store).unwrap().is_empty());
        assert_eq!(gvs.build_basis(&oracle, &store, true).unwrap(), first);
        assert_eq!(gvs.basis(&store).unwrap(), basis);
    }

    #[test]
    fn test_complement_is_set_difference() {
        let oracle = SearchCanonizer;
        for even_edges in [true, false] {
            let store = MemoryStore::new();
            let gvs3 = KneisslerGVS::new(6, FamilyType::Complement, even_edges).unwrap();
            assert!(matches!(
                gvs3.build_basis(&oracle, &store, false),
                Err(KneisslerError::MissingArtifact { .. })
            ));
            assert!(!store.exists(&gvs3.key()));

            build_all(&store, 6, even_edges);
            let b0: FxHashSet<String> = gvs3
                .with_family(FamilyType::Generators)
                .basis(&store)
                .unwrap()
                .into_iter()
                .collect();
            let b2 = gvs3.with_family(FamilyType::AllTrivalent).basis(&store).unwrap();
            let b3 = gvs3.basis(&store).unwrap();

            // every barrel is a trivalent graph
            assert!(b0.iter().all(|g6| b2.contains(g6)));
            let expected: Vec<String> = b2.into_iter().filter(|g6| !b0.contains(g6)).collect();
            assert_eq!(b3, expected);
        }
    }

    #[test]
    fn test_matrix_rows_match_recomputation() {
        let oracle = SearchCanonizer;
        for even_edges in [true, false] {
            let store = MemoryStore::new();
            build_all(&store, 6, even_edges);
            for family in [FamilyType::Generators, FamilyType::AllTrivalent, FamilyType::Complement] {
                let op = KneisslerContract::new(6, family, even_edges).unwrap();
                op.build_matrix(&oracle, &store, false).unwrap();
                let matrix = op.matrix(&store).unwrap();
                let in_basis = op.domain().basis(&store).unwrap();
                let out_basis = op.target().basis(&store).unwrap();
                assert_eq!((matrix.nrows, matrix.ncols), (in_basis.len(), out_basis.len()));
                assert!(matrix.entries.values().all(|&v| v != 0));

                for (row, g6) in in_basis.iter().enumerate() {
                    let expected = contraction_row(&Graph::from_g6(g6).unwrap(), &out_basis, even_edges);
                    for col in 0..out_basis.len() {
                        assert_eq!(matrix.get(row, col), expected.get(&col).copied().unwrap_or(0));
                    }
                }
            }
        }
    }

    #[test]
    fn test_differential_is_independent_of_labeling() {
        // relabeling a domain graph by p changes its image by perm_sign(p)
        let mut rng = rand::rng();
        for even_edges in [true, false] {
            let store = MemoryStore::new();
            build_all(&store, 6, even_edges);
            let op = KneisslerContract::new(6, FamilyType::AllTrivalent, even_edges).unwrap();
            let out_basis = op.target().basis(&store).unwrap();
            for g6 in op.domain().basis(&store).unwrap() {
                let g = Graph::from_g6(&g6).unwrap();
                let mut p: Vec<u8> = (0..g.num_vertices()).collect();
                p.shuffle(&mut rng);
                let h = g.relabeled(&p);
                let sign = g.perm_sign(&p, even_edges);

                let row_g = contraction_row(&g, &out_basis, even_edges);
                let row_h: FxHashMap<usize, i32> = contraction_row(&h, &out_basis, even_edges)
                    .into_iter()
                    .map(|(col, v)| (col, v * sign))
                    .collect();
                assert_eq!(row_g, row_h);
            }
        }
    }

    #[test]
    fn test_matrix_requires_bases() {
        let oracle = SearchCanonizer;
        let store = MemoryStore::new();
        let op = KneisslerContract::new(5, FamilyType::Generators, true).unwrap();
        op.domain().build_basis(&oracle, &store, false).unwrap();
        match op.build_matrix(&oracle, &store, false) {
            Err(KneisslerError::MissingArtifact { key }) => assert_eq!(key, op.target().key()),
            other => panic!("unexpected {:?}", other),
        }
        op.target().build_basis(&oracle, &store, false).unwrap();
        assert!(matches!(
            op.build_matrix(&oracle, &store, false),
            Ok(BuildOutcome::Built { .. })
        ));
        assert_eq!(op.build_matrix(&oracle, &store, false).unwrap(), BuildOutcome::Cached);
    }
}

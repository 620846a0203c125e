use std::collections::BTreeMap;

use crate::g6::{self, G6Error};
use crate::helpers::{compose_permutations, inverse_permutation};

type HashType = usize;

/// Relabeled adjacency rows; the lexicographically smallest score over all
/// search leaves defines the canonical form.
type GraphScore = Vec<u64>;

/// Simple graph with bit-packed adjacency rows, used for canonical labeling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenseGraph {
    pub num_vertices: u8,
    pub edges: Vec<(u8, u8)>,
    pub adj: Vec<u64>,
}

impl DenseGraph {
    pub fn new(num_vertices: u8, edges: Vec<(u8, u8)>) -> Self {
        let mut adj = vec![0u64; num_vertices as usize];
        for &(u, v) in &edges {
            adj[u as usize] |= 1u64 << v;
            adj[v as usize] |= 1u64 << u;
        }
        DenseGraph {
            num_vertices,
            edges,
            adj,
        }
    }

    pub fn from_g6(g6: &str) -> Result<DenseGraph, G6Error> {
        let (n, edges) = g6::decode(g6)?;
        Ok(DenseGraph::new(n, edges))
    }

    pub fn to_g6(&self) -> Result<String, G6Error> {
        g6::encode(self.num_vertices, self.edges.iter().copied())
    }

    /// Returns a vector `res` such that `res[i]` is the number of vertices
    /// at graph distance exactly `i` from vertex `v`.
    pub fn distance_histogram(&self, v: u8) -> Vec<usize> {
        let n = self.num_vertices as usize;
        let mut res = vec![0usize; n + 1];

        let mut frontier: u64 = 1u64 << v;
        let mut seen: u64 = frontier;
        let mut dist = 0usize;

        while frontier != 0 {
            res[dist] = frontier.count_ones() as usize;

            let mut nbrs: u64 = 0;
            let mut mm = frontier;
            while mm != 0 {
                let u = mm.trailing_zeros() as usize;
                nbrs |= self.adj[u];
                mm &= mm - 1;
            }
            frontier = nbrs & !seen;
            seen |= frontier;
            dist += 1;
        }

        res.truncate(dist);
        res
    }

    /// One integer per vertex summarizing its distance histogram.
    fn distance_histogram_keys(&self) -> Vec<HashType> {
        let weight_factor = self.num_vertices as usize;
        (0..self.num_vertices)
            .map(|v| {
                let mut sum: HashType = 0;
                let mut factor: HashType = 1;
                for &count in self.distance_histogram(v).iter().rev() {
                    sum = sum.wrapping_add(count.wrapping_mul(factor));
                    factor = factor.wrapping_mul(weight_factor);
                }
                sum
            })
            .collect()
    }

    /// Relabels vertex `v` as `perm[v]`.
    pub fn permute(&self, perm: &[u8]) -> DenseGraph {
        let mut edges: Vec<(u8, u8)> = self
            .edges
            .iter()
            .map(|&(u, v)| {
                let (a, b) = (perm[u as usize], perm[v as usize]);
                if a < b { (a, b) } else { (b, a) }
            })
            .collect();
        edges.sort();
        DenseGraph::new(self.num_vertices, edges)
    }

    /// Canonical form and one canonical labeling `perm` (vertex `v` gets label `perm[v]`).
    #[inline(always)]
    pub fn canonical_label(&self) -> (DenseGraph, Vec<u8>) {
        let (g, mut perms) = self.canonical_labels();
        (g, perms.swap_remove(0))
    }

    /// Canonical form together with all labelings producing it.
    /// Any two of these labelings differ by an automorphism.
    pub fn canonical_labels(&self) -> (DenseGraph, Vec<Vec<u8>>) {
        let n = self.num_vertices as usize;
        if n == 0 {
            return (self.clone(), vec![Vec::new()]);
        }
        let all = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
        let classes: Vec<u64> = vec![all];

        // initial coloring by a relatively strong vertex invariant
        let hash = self.distance_histogram_keys();
        let mut classes = self.refined_coloring(&classes, &hash);
        self.refine(&mut classes);

        let mut best: Option<(GraphScore, Vec<Vec<u8>>)> = None;
        self.search_multi_bm(&classes, &mut best);

        // the search always reaches at least one leaf for n > 0
        let perms = best.map(|(_, perms)| perms).unwrap_or_else(|| {
            vec![(0..self.num_vertices).collect()]
        });
        let gcanon = self.permute(&perms[0]);
        (gcanon, perms)
    }

    /// All automorphisms of the labeled graph, as vertex permutations.
    pub fn automorphisms(&self) -> Vec<Vec<u8>> {
        let (_canon, best_perms) = self.canonical_labels();
        let Some(base) = best_perms.first() else {
            return vec![];
        };
        best_perms
            .iter()
            .map(|p| compose_permutations(base, &inverse_permutation(p)))
            .collect()
    }

    /// Splits every class of `orig_classes` by the given per-vertex hash values.
    /// The new subclasses are sorted by hash value.
    #[inline(always)]
    fn refined_coloring(&self, orig_classes: &[u64], hashes: &[HashType]) -> Vec<u64> {
        let mut new_classes = Vec::with_capacity(self.num_vertices as usize);
        for &class_mask in orig_classes {
            if class_mask.count_ones() <= 1 {
                new_classes.push(class_mask);
                continue;
            }
            let mut hash_map: BTreeMap<HashType, u64> = BTreeMap::new();
            let mut mm = class_mask;
            while mm != 0 {
                let v = mm.trailing_zeros() as usize;
                mm &= mm - 1;
                *hash_map.entry(hashes[v]).or_default() |= 1u64 << v;
            }
            new_classes.extend(hash_map.into_values());
        }
        new_classes
    }

    /// Refines a partition of the vertices (one bitmask per class) until it is
    /// equitable, splitting classes by their neighbour counts in every class.
    fn refine(&self, classes: &mut Vec<u64>) {
        let n = self.num_vertices as usize;
        let mut sigs: Vec<(usize, u8)> = Vec::with_capacity(n);

        loop {
            let mut changed = false;

            for i in 0..classes.len() {
                let class_mask = classes[i];
                if class_mask.count_ones() <= 1 {
                    continue;
                }

                sigs.clear();
                let mut mm = class_mask;
                while mm != 0 {
                    let v = mm.trailing_zeros() as usize;
                    mm &= mm - 1;

                    let mut h: usize = 0;
                    for (j, &cm) in classes.iter().enumerate() {
                        let cnt = (self.adj[v] & cm).count_ones() as usize;
                        // 257 is a small prime
                        h = h.wrapping_mul(257).wrapping_add(cnt + j * 17);
                    }
                    sigs.push((h, v as u8));
                }

                sigs.sort_unstable_by_key(|x| x.0);

                let mut new_parts: Vec<u64> = Vec::with_capacity(n);
                let mut cur_mask = 0u64;
                let mut cur_sig = sigs[0].0;
                for &(sig, v) in &sigs {
                    if sig != cur_sig {
                        new_parts.push(cur_mask);
                        cur_mask = 0;
                        cur_sig = sig;
                    }
                    cur_mask |= 1u64 << v;
                }
                new_parts.push(cur_mask);

                if new_parts.len() > 1 {
                    classes.splice(i..=i, new_parts);
                    changed = true;
                    // indices moved, restart
                    break;
                }
            }

            if !changed {
                break;
            }
        }
    }

    #[inline(always)]
    fn graph_score(&self, perm: &[u8]) -> GraphScore {
        let mut adj = vec![0u64; self.num_vertices as usize];
        for &(u, v) in &self.edges {
            let a = perm[u as usize] as usize;
            let b = perm[v as usize] as usize;
            adj[a] |= 1u64 << b;
            adj[b] |= 1u64 << a;
        }
        adj
    }

    fn search_multi_bm(&self, classes: &[u64], best: &mut Option<(GraphScore, Vec<Vec<u8>>)>) {
        let Some(class_pos) = classes.iter().position(|cls| cls.count_ones() > 1) else {
            // discrete partition: a leaf
            let mut perm = vec![0u8; self.num_vertices as usize];
            for (idx, cls) in classes.iter().enumerate() {
                perm[cls.trailing_zeros() as usize] = idx as u8;
            }
            let score = self.graph_score(&perm);
            match best {
                Some((best_score, perms)) if score == *best_score => perms.push(perm),
                Some((best_score, _)) if score > *best_score => {}
                _ => *best = Some((score, vec![perm])),
            }
            return;
        };

        let class = classes[class_pos];
        let mut mm = class;
        while mm != 0 {
            let v = mm.trailing_zeros();
            mm &= mm - 1;

            // individualize v in front of the rest of its class
            let mut refined = Vec::with_capacity(classes.len() + 1);
            for (i, &cls) in classes.iter().enumerate() {
                if i == class_pos {
                    refined.push(cls & !(1u64 << v));
                    refined.push(1u64 << v);
                } else {
                    refined.push(cls);
                }
            }
            self.refine(&mut refined);
            self.search_multi_bm(&refined, best);
        }
    }
}

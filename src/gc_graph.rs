use std::collections::BTreeSet;

use crate::canon::CanonicalFormOracle;
use crate::densegraph::DenseGraph;
use crate::error::{KneisslerError, Result};
use crate::g6;
use crate::helpers::*;

/// An edge `u < v` with a tag. Edges compare by endpoints only.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub u: u8,
    pub v: u8,
    pub data: i32,
}

impl Edge {
    fn new(u: u8, v: u8, data: i32) -> Self {
        Edge { u, v, data }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        (self.u, self.v) == (other.u, other.v)
    }
}

impl Eq for Edge {}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.u, self.v).cmp(&(other.u, other.v))
    }
}

#[derive(Debug, Clone)]
pub struct Graph {
    num_vertices: u8,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new(num_vertices: u8) -> Self {
        Graph {
            num_vertices,
            edges: Vec::new(),
        }
    }

    fn with_edges(num_vertices: u8, edges: Vec<Edge>) -> Self {
        Graph { num_vertices, edges }
    }

    pub fn add_edge(&mut self, u: u8, v: u8) {
        let (u, v) = if u < v { (u, v) } else { (v, u) };
        self.edges.push(Edge::new(u, v, 0));
    }

    pub fn num_vertices(&self) -> u8 {
        self.num_vertices
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_pairs(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.edges.iter().map(|e| (e.u, e.v))
    }

    pub fn from_g6(g6: &str) -> Result<Self> {
        let (n, pairs) = g6::decode(g6)?;
        let edges = pairs.into_iter().map(|(u, v)| Edge::new(u, v, 0)).collect();
        Ok(Graph::with_edges(n, edges))
    }

    pub fn to_g6(&self) -> Result<String> {
        Ok(g6::encode(self.num_vertices, self.edge_pairs())?)
    }

    pub fn to_densegraph(&self) -> DenseGraph {
        DenseGraph::new(self.num_vertices, self.edge_pairs().collect())
    }

    fn sort_edges(&mut self) {
        self.edges.sort();
    }

    /// Relabels vertex `v` as `new_labels[v]`; tags travel with their edges.
    fn relabel(&mut self, new_labels: &[u8]) {
        for e in &mut self.edges {
            e.u = new_labels[e.u as usize];
            e.v = new_labels[e.v as usize];
            if e.u > e.v {
                std::mem::swap(&mut e.u, &mut e.v);
            }
        }
        self.sort_edges();
    }

    /// Copy of the graph with vertex `v` renamed to `new_labels[v]`.
    pub fn relabeled(&self, new_labels: &[u8]) -> Graph {
        let mut g = self.clone();
        g.relabel(new_labels);
        g
    }

    /// Tags every edge with its position in sorted order.
    fn number_edges(&mut self) {
        self.sort_edges();
        for (i, e) in self.edges.iter_mut().enumerate() {
            e.data = i as i32;
        }
    }

    /// Merges `v` into `u` for the edge `(u, v)` at `eidx`. Vertices above `v`
    /// shift down by one and parallel edges created by the merge collapse.
    pub fn contract_edge(&self, eidx: usize) -> Graph {
        let Edge { u, v, .. } = self.edges[eidx];
        let shift = |a: u8| if a < v { a } else if a == v { u } else { a - 1 };
        let mut edge_set = BTreeSet::new();
        for (i, edge) in self.edges.iter().enumerate() {
            if i == eidx {
                continue;
            }
            let (aa, bb) = (shift(edge.u), shift(edge.v));
            if aa != bb {
                // first insertion wins, keeping the tag of the lower original edge
                edge_set.insert(Edge::new(aa.min(bb), aa.max(bb), edge.data));
            }
        }
        Graph::with_edges(self.num_vertices - 1, edge_set.into_iter().collect())
    }

    /// Sign picked up by the orientation when relabeling vertex `v` as `p[v]`.
    ///
    /// Even edges: vertices are odd objects and edges carry a direction, so
    /// the sign is the vertex permutation parity times -1 for each edge whose
    /// direction (smaller endpoint first) is reversed. Odd edges: the parity
    /// of the induced permutation of the edges.
    pub fn perm_sign(&self, p: &[u8], even_edges: bool) -> i32 {
        if even_edges {
            let mut sign = permutation_sign(p);
            for e in &self.edges {
                if p[e.u as usize] > p[e.v as usize] {
                    sign *= -1;
                }
            }
            sign
        } else {
            let mut g1 = self.clone();
            g1.number_edges();
            g1.relabel(p);
            let perm: Vec<i32> = g1.edges.iter().map(|e| e.data).collect();
            permutation_sign(&perm)
        }
    }

    /// Contracts edge `eidx` and returns the result with its sign in the
    /// differential, or `None` if the contraction would create a multiple edge.
    pub fn contract_edge_with_sign(&self, eidx: usize, even_edges: bool) -> Option<(Graph, i32)> {
        let Edge { u, v, .. } = self.edges[eidx];
        let pp = permute_to_left(u, v, self.num_vertices);
        let mut sgn = self.perm_sign(&pp, even_edges);
        let mut g1 = self.clone();
        g1.relabel(&pp);
        // the contracted edge (0, 1) is now first and gets tag 0
        g1.number_edges();
        let prev_size = g1.edges.len();
        let mut g1 = g1.contract_edge(0);
        if prev_size - g1.edges.len() != 1 {
            return None;
        }
        if even_edges {
            sgn *= -1;
        } else {
            g1.sort_edges();
            let p: Vec<i32> = g1.edges.iter().map(|e| e.data - 1).collect();
            sgn *= permutation_sign(&p);
        }
        Some((g1, sgn))
    }

    pub fn get_contractions_with_sign(&self, even_edges: bool) -> Vec<(Graph, i32)> {
        (0..self.edges.len())
            .filter_map(|i| self.contract_edge_with_sign(i, even_edges))
            .collect()
    }

    /// True if some automorphism acts with sign -1, i.e. the graph is zero in
    /// the graph complex.
    pub fn has_odd_automorphism<O: CanonicalFormOracle>(&self, oracle: &O, even_edges: bool) -> bool {
        oracle
            .automorphism_generators(&self.to_densegraph())
            .iter()
            .any(|p| self.perm_sign(p, even_edges) == -1)
    }

    pub fn to_canon_g6<O: CanonicalFormOracle>(&self, oracle: &O) -> Result<String> {
        let (canon, _) = oracle.canonicalize(&self.to_densegraph());
        Ok(canon.to_g6()?)
    }

    /// Canonical form and the sign of the canonical relabeling.
    pub fn to_canon_g6_sgn<O: CanonicalFormOracle>(&self, oracle: &O, even_edges: bool) -> Result<(String, i32)> {
        let (canon, perm) = oracle.canonicalize(&self.to_densegraph());
        let sign = self.perm_sign(&perm, even_edges);
        Ok((canon.to_g6()?, sign))
    }

    /// Checks that the graph is simple, connected, has minimum degree 3 and
    /// `2|E| - 3|V| == defect`.
    pub fn check_valid(&self, defect: usize) -> Result<()> {
        let invalid = |reason: String| {
            let g6 = self.to_g6().unwrap_or_else(|_| format!("<{} vertices>", self.num_vertices));
            Err(KneisslerError::InvalidGraph { g6, reason })
        };
        let n = self.num_vertices as usize;

        let mut sorted = self.edges.clone();
        sorted.sort();
        for (i, e) in sorted.iter().enumerate() {
            if e.u as usize >= n || e.v as usize >= n {
                return invalid(format!("edge ({}, {}) has a vertex index >= {}", e.u, e.v, n));
            }
            if e.u == e.v {
                return invalid(format!("self-edge at {}", e.u));
            }
            if e.u > e.v {
                return invalid(format!("wrongly ordered edge ({}, {})", e.u, e.v));
            }
            if i > 0 && sorted[i - 1] == *e {
                return invalid(format!("multiple edge ({}, {})", e.u, e.v));
            }
        }

        let mut degree = vec![0usize; n];
        for e in &self.edges {
            degree[e.u as usize] += 1;
            degree[e.v as usize] += 1;
        }
        if let Some(v) = degree.iter().position(|&d| d < 3) {
            return invalid(format!("vertex {} has degree {}", v, degree[v]));
        }

        let dg = self.to_densegraph();
        if n > 0 && dg.distance_histogram(0).iter().sum::<usize>() != n {
            return invalid("not connected".to_string());
        }

        if 2 * self.edges.len() != 3 * n + defect {
            let true_defect = 2 * self.edges.len() as i64 - 3 * n as i64;
            return invalid(format!("defect {} (not {})", true_defect, defect));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::SearchCanonizer;

    fn graph(n: u8, edges: &[(u8, u8)]) -> Graph {
        let mut g = Graph::new(n);
        for &(u, v) in edges {
            g.add_edge(u, v);
        }
        g
    }

    fn k4() -> Graph {
        graph(4, &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)])
    }

    /// Triangular prism: two triangles 0-1-2 and 3-4-5 joined by 0-3, 1-4, 2-5.
    fn prism() -> Graph {
        graph(6, &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (0, 3), (1, 4), (2, 5)])
    }

    /// K_{3,3}
    fn k33() -> Graph {
        let mut edges = vec![];
        for a in 0..3 {
            for b in 3..6 {
                edges.push((a, b));
            }
        }
        graph(6, &edges)
    }

    #[test]
    fn test_contract_edge_collapses_duplicates() {
        // contracting a triangle edge of K4 creates a double edge
        let g = k4();
        let c = g.contract_edge(0);
        assert_eq!(c.num_vertices(), 3);
        assert_eq!(c.num_edges(), 3);
        assert!(g.contract_edge_with_sign(0, true).is_none());
        assert!(g.get_contractions_with_sign(false).is_empty());

        // in K33 there are no triangles, all nine contractions survive
        let g = k33();
        let contractions = g.get_contractions_with_sign(true);
        assert_eq!(contractions.len(), 9);
        for (c, sgn) in &contractions {
            assert_eq!(c.num_vertices(), 5);
            assert_eq!(c.num_edges(), 8);
            assert!(*sgn == 1 || *sgn == -1);
        }
    }

    #[test]
    fn test_contract_edge_relabels_densely() {
        let g = graph(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let c = g.contract_edge(1);
        let mut pairs: Vec<_> = c.edge_pairs().collect();
        pairs.sort();
        assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_perm_sign_transposition() {
        let g = k4();
        let swap01 = [1, 0, 2, 3];
        // even edges: odd vertex transposition, edge (0,1) reversed
        assert_eq!(g.perm_sign(&swap01, true), 1);
        // odd edges: (0,2)<->(1,2), (0,3)<->(1,3), two transpositions
        assert_eq!(g.perm_sign(&swap01, false), 1);

        let path = graph(3, &[(0, 1), (1, 2)]);
        let flip = [2, 1, 0];
        // one vertex transposition, both edges reversed
        assert_eq!(path.perm_sign(&flip, true), -1);
        // the two edges are swapped
        assert_eq!(path.perm_sign(&flip, false), -1);
        assert_eq!(path.perm_sign(&[0, 1, 2], true), 1);
    }

    #[test]
    fn test_odd_automorphisms() {
        let oracle = SearchCanonizer;
        // every automorphism of K4 is even in both conventions
        assert!(!k4().has_odd_automorphism(&oracle, true));
        assert!(!k4().has_odd_automorphism(&oracle, false));
        // swapping two vertices of one side of K33 is odd in both
        assert!(k33().has_odd_automorphism(&oracle, true));
        assert!(k33().has_odd_automorphism(&oracle, false));
        // swapping the two triangles of the prism permutes three pairs of edges
        assert!(!prism().has_odd_automorphism(&oracle, true));
        assert!(prism().has_odd_automorphism(&oracle, false));
    }

    #[test]
    fn test_canonical_sign_is_consistent() {
        // relabeling a graph changes its canonical sign by the sign of the relabeling
        let oracle = SearchCanonizer;
        let g = graph(
            8,
            &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 4), (1, 5), (2, 6), (3, 7), (4, 5), (5, 6), (6, 7), (4, 7), (4, 6)],
        );
        let p = [3u8, 0, 6, 1, 7, 2, 5, 4];
        let mut h = g.clone();
        h.relabel(&p);
        for even_edges in [true, false] {
            let (cg, sg) = g.to_canon_g6_sgn(&oracle, even_edges).unwrap();
            let (ch, sh) = h.to_canon_g6_sgn(&oracle, even_edges).unwrap();
            assert_eq!(cg, ch);
            if !g.has_odd_automorphism(&oracle, even_edges) {
                assert_eq!(sg, sh * g.perm_sign(&p, even_edges));
            }
        }
    }

    #[test]
    fn test_check_valid() {
        assert!(k4().check_valid(0).is_ok());
        assert!(k33().check_valid(0).is_ok());
        assert!(k4().check_valid(1).is_err());
        let path = graph(3, &[(0, 1), (1, 2)]);
        assert!(matches!(path.check_valid(0), Err(KneisslerError::InvalidGraph { .. })));
        let doubled = graph(4, &[(0, 1), (0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert!(doubled.check_valid(1).is_err());
        let two_k4 = graph(
            8,
            &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3), (4, 5), (4, 6), (4, 7), (5, 6), (5, 7), (6, 7)],
        );
        assert!(two_k4.check_valid(0).is_err());
    }
}

use std::fmt;

use itertools::Itertools;

use crate::error::KneisslerError;
use crate::gc_graph::Graph;

/// The four graph vector spaces attached to a loop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FamilyType {
    /// Trivalent generators: barrel graphs.
    Generators,
    /// Relation generators: tbarrel and xtbarrel graphs, one vertex fewer.
    Relations,
    /// All trivalent graphs: barrels, triangles and H-graphs.
    AllTrivalent,
    /// Trivalent graphs of type 2 which are not of type 0.
    Complement,
}

impl FamilyType {
    pub const ALL: [FamilyType; 4] = [
        FamilyType::Generators,
        FamilyType::Relations,
        FamilyType::AllTrivalent,
        FamilyType::Complement,
    ];

    pub fn index(self) -> u8 {
        match self {
            FamilyType::Generators => 0,
            FamilyType::Relations => 1,
            FamilyType::AllTrivalent => 2,
            FamilyType::Complement => 3,
        }
    }

    /// Whether the contraction differential starts in this space.
    pub fn has_differential(self) -> bool {
        self != FamilyType::Relations
    }

    /// Excess of `2|E|` over `3|V|` for graphs of this type.
    pub fn defect(self) -> usize {
        match self {
            FamilyType::Relations => 1,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for FamilyType {
    type Error = KneisslerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FamilyType::Generators),
            1 => Ok(FamilyType::Relations),
            2 => Ok(FamilyType::AllTrivalent),
            3 => Ok(FamilyType::Complement),
            other => Err(KneisslerError::UnknownFamilyType(other)),
        }
    }
}

impl fmt::Display for FamilyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// All permutations of `0..n` in lexicographic order.
pub fn all_permutations(n: usize) -> impl Iterator<Item = Vec<usize>> {
    (0..n).permutations(n)
}

/// `n!`, or `None` if it does not fit into a `usize`.
pub fn num_permutations(n: usize) -> Option<usize> {
    (1..=n).try_fold(1usize, |acc, i| acc.checked_mul(i))
}

// The constructors below take `k = loops - 1` and a permutation `p` of
// `{0, ..., k-2}` which determines how the spokes join the two rims.

pub fn barrel_graph(k: usize, p: &[usize]) -> Graph {
    let k = k as u8;
    let mut g = Graph::new(2 * k);

    // rims
    for j in 0..k {
        g.add_edge(j, (j + 1) % k);
        g.add_edge(k + j, k + (j + 1) % k);
    }

    // spokes
    g.add_edge(k - 1, 2 * k - 1);
    for (i, &j) in p.iter().enumerate() {
        g.add_edge(i as u8, k + j as u8);
    }
    g
}

pub fn all_barrel_graphs(k: usize) -> impl Iterator<Item = Graph> {
    all_permutations(k - 1).map(move |p| barrel_graph(k, &p))
}

pub fn tbarrel_graph(k: usize, p: &[usize]) -> Graph {
    let k = k as u8;
    let mut g = Graph::new(2 * k - 1);
    // one rim of length k ...
    for j in 0..k {
        g.add_edge(j, (j + 1) % k);
    }
    // ... the other of length k - 1
    for j in 0..k - 1 {
        g.add_edge(k + j, k + (j + 1) % (k - 1));
    }
    g.add_edge(k - 1, 2 * k - 2);

    for (i, &j) in p.iter().enumerate() {
        g.add_edge(i as u8, k + j as u8);
    }
    g
}

pub fn all_tbarrel_graphs(k: usize) -> impl Iterator<Item = Graph> {
    all_permutations(k - 1).map(move |p| tbarrel_graph(k, &p))
}

pub fn xtbarrel_graph(k: usize, p: &[usize]) -> Graph {
    let k = k as u8;
    let mut g = Graph::new(2 * k - 1);
    for j in 0..k - 1 {
        g.add_edge(j, (j + 1) % (k - 1));
        g.add_edge(k + j, k + (j + 1) % (k - 1));
    }
    g.add_edge(k - 1, 2 * k - 2);
    g.add_edge(k - 1, k - 2);
    for (i, &j) in p.iter().enumerate() {
        let j = j as u8;
        if j + 2 < k {
            g.add_edge(i as u8, k + j);
        } else {
            g.add_edge(i as u8, k - 1);
        }
    }
    g
}

pub fn all_xtbarrel_graphs(k: usize) -> impl Iterator<Item = Graph> {
    all_permutations(k - 1).map(move |p| xtbarrel_graph(k, &p))
}

pub fn triangle_graph(k: usize, p: &[usize]) -> Graph {
    let k = k as u8;
    let mut g = Graph::new(2 * k);
    for j in 0..k {
        g.add_edge(j, (j + 1) % k);
    }
    for j in 0..k - 1 {
        g.add_edge(k + 1 + j, k + 1 + (j + 1) % (k - 1));
    }
    g.add_edge(k - 1, k);
    g.add_edge(k, 2 * k - 1);
    for (i, &j) in p.iter().enumerate() {
        let j = j as u8;
        if j + 2 < k {
            g.add_edge(i as u8, k + 1 + j);
        } else {
            g.add_edge(i as u8, k);
        }
    }
    g
}

pub fn all_triangle_graphs(k: usize) -> impl Iterator<Item = Graph> {
    all_permutations(k - 1).map(move |p| triangle_graph(k, &p))
}

pub fn hgraph(k: usize, p: &[usize]) -> Graph {
    let k = k as u8;
    let mut g = Graph::new(2 * k);
    for j in 0..k - 1 {
        g.add_edge(j, (j + 1) % (k - 1));
        g.add_edge(k + 1 + j, k + 1 + (j + 1) % (k - 1));
    }
    g.add_edge(k - 2, k - 1);
    g.add_edge(k - 1, 2 * k - 1);
    g.add_edge(k - 1, k);
    for (i, &j) in p.iter().enumerate() {
        let (i, j) = (i as u8, j as u8);
        if i + 2 < k {
            g.add_edge(i, k + j);
        } else if j > 0 {
            g.add_edge(k, k + j);
        }
    }
    g
}

/// H-graphs for all permutations not ending in 0; those would lose an edge.
pub fn all_hgraph_graphs(k: usize) -> impl Iterator<Item = Graph> {
    all_permutations(k - 1)
        .filter(move |p| p[k - 2] > 0)
        .map(move |p| hgraph(k, &p))
}

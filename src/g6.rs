use thiserror::Error;

// only the one-byte vertex count header is supported
pub const MAX_VERTICES: u8 = 62;

const OFFSET: u8 = 63;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum G6Error {
    #[error("this encoder only supports graphs with at most 62 vertices, got {0}")]
    TooManyVertices(usize),
    #[error("graphs without vertices have no graph6 encoding")]
    NoVertices,
    #[error("edge ({0}, {1}) is a self-loop or has an endpoint out of range")]
    InvalidEdge(u8, u8),
    #[error("empty graph6 string")]
    Empty,
    #[error("invalid graph6 header byte {0}")]
    InvalidHeader(u8),
    #[error("invalid graph6 data byte {byte} at position {pos}")]
    InvalidData { byte: u8, pos: usize },
    #[error("graph6 string has {found} data bytes, expected {expected}")]
    WrongLength { expected: usize, found: usize },
    #[error("graph6 string has nonzero padding bits")]
    NonzeroPadding,
}

/// Number of bits in the upper triangle of an `n x n` adjacency matrix.
#[inline]
fn num_bits(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Position of the bit for the pair `i < j`, in the order (0,1), (0,2), (1,2), (0,3), ...
#[inline]
fn bit_index(i: usize, j: usize) -> usize {
    j * (j - 1) / 2 + i
}

pub fn encode(num_vertices: u8, edges: impl IntoIterator<Item = (u8, u8)>) -> Result<String, G6Error> {
    if num_vertices == 0 {
        return Err(G6Error::NoVertices);
    }
    if num_vertices > MAX_VERTICES {
        return Err(G6Error::TooManyVertices(num_vertices as usize));
    }
    let n = num_vertices as usize;
    let total = num_bits(n);
    // pad with zeros to a multiple of 6
    let mut bitvec = vec![0u8; total.div_ceil(6) * 6];
    for (u, v) in edges {
        if u == v || u >= num_vertices || v >= num_vertices {
            return Err(G6Error::InvalidEdge(u, v));
        }
        let (i, j) = if u < v { (u, v) } else { (v, u) };
        bitvec[bit_index(i as usize, j as usize)] = 1;
    }

    let mut result = String::with_capacity(1 + bitvec.len() / 6);
    result.push((num_vertices + OFFSET) as char);
    for chunk in bitvec.chunks(6) {
        let mut value = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            value |= bit << (5 - i);
        }
        result.push((value + OFFSET) as char);
    }
    Ok(result)
}

/// Decodes a graph6 string into its vertex count and edge list.
/// Edges come out sorted by (larger endpoint, smaller endpoint), smaller endpoint first.
pub fn decode(g6: &str) -> Result<(u8, Vec<(u8, u8)>), G6Error> {
    let bytes = g6.as_bytes();
    let (&first, data) = bytes.split_first().ok_or(G6Error::Empty)?;
    if !(OFFSET + 1..=OFFSET + MAX_VERTICES).contains(&first) {
        return Err(G6Error::InvalidHeader(first));
    }
    let n = first - OFFSET;

    let total = num_bits(n as usize);
    let expected = total.div_ceil(6);
    if data.len() != expected {
        return Err(G6Error::WrongLength { expected, found: data.len() });
    }

    let mut bits = Vec::with_capacity(expected * 6);
    for (pos, &byte) in data.iter().enumerate() {
        if !(OFFSET..=OFFSET + 63).contains(&byte) {
            return Err(G6Error::InvalidData { byte, pos: pos + 1 });
        }
        let val = byte - OFFSET;
        for i in (0..6).rev() {
            bits.push((val >> i) & 1);
        }
    }
    if bits[total..].contains(&1) {
        return Err(G6Error::NonzeroPadding);
    }
    bits.truncate(total);

    let mut edges = Vec::new();
    let mut k = 0;
    for j in 1..n {
        for i in 0..j {
            if bits[k] == 1 {
                edges.push((i, j));
            }
            k += 1;
        }
    }
    Ok((n, edges))
}

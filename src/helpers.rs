use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{KneisslerError, Result};

pub const ZSTD_EXTENSION: &str = ".zst";

const BUF_SIZE: usize = 8 * 1024 * 1024;

/// Loops shorter than this run without a progress bar.
const PROGRESS_THRESHOLD: usize = 10_000;

/// Sign of a sequence of distinct values, read as a permutation of their sorted order.
pub fn permutation_sign<T: Ord>(p: &[T]) -> i32 {
    let mut sign = 1;
    for i in 0..p.len() {
        for j in (i + 1)..p.len() {
            if p[i] > p[j] {
                sign *= -1;
            }
        }
    }
    sign
}

pub fn inverse_permutation(p: &[u8]) -> Vec<u8> {
    let mut inv = vec![0; p.len()];
    for (i, &pi) in p.iter().enumerate() {
        inv[pi as usize] = i as u8;
    }
    inv
}

/// `i -> b[a[i]]`
pub fn compose_permutations(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().map(|&x| b[x as usize]).collect()
}

/// Relabeling that moves `u` to 0 and `v` to 1, keeping the order of all other vertices.
pub fn permute_to_left(u: u8, v: u8, n: u8) -> Vec<u8> {
    let mut p = Vec::with_capacity(n as usize);
    p.push(u);
    p.push(v);
    p.extend((0..n).filter(|&j| j != u && j != v));
    inverse_permutation(&p)
}

pub fn make_basis_dict(basis: &[String]) -> FxHashMap<String, usize> {
    basis.iter().enumerate().map(|(i, g6)| (g6.clone(), i)).collect()
}

pub fn get_progress_bar(total: usize) -> ProgressBar {
    if total < PROGRESS_THRESHOLD {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(get_progress_bar_style());
    bar
}

pub fn get_progress_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) Remaining: {eta_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-")
}

fn format_error(path: &Path, reason: impl Into<String>) -> KneisslerError {
    KneisslerError::Format {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

pub fn with_zstd_extension(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(ZSTD_EXTENSION);
    PathBuf::from(s)
}

/// The file to read for `path`: the plain file if present, otherwise its `.zst` variant.
pub fn resolve_existing(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }
    let zst = with_zstd_extension(path);
    zst.exists().then_some(zst)
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.to_string_lossy().ends_with(ZSTD_EXTENSION) {
        let decoder = zstd::stream::read::Decoder::new(file)?;
        Ok(Box::new(BufReader::with_capacity(BUF_SIZE, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUF_SIZE, file)))
    }
}

/// Writes `path`, or `path.zst` when `compression_level > 0`. Returns the path written.
fn write_with<F>(path: &Path, compression_level: i32, body: F) -> Result<PathBuf>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let (path, other) = if compression_level > 0 {
        (with_zstd_extension(path), path.to_path_buf())
    } else {
        (path.to_path_buf(), with_zstd_extension(path))
    };
    // readers prefer the plain file, so a stale variant must not survive
    if other.exists() {
        std::fs::remove_file(&other)?;
        debug!("Removed stale {}", other.display());
    }
    if let Some(folder) = path.parent() {
        std::fs::create_dir_all(folder)?;
    }
    let file = File::create(&path)?;
    if compression_level > 0 {
        let encoder = zstd::stream::write::Encoder::new(file, compression_level)?;
        let mut writer = BufWriter::with_capacity(BUF_SIZE, encoder);
        body(&mut writer)?;
        writer.flush()?;
        // finishing writes the zstd footer
        writer.into_inner().map_err(|e| e.into_error())?.finish()?;
    } else {
        let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
        body(&mut writer)?;
        writer.flush()?;
    }
    Ok(path)
}

pub fn load_g6_file(path: &Path) -> Result<Vec<String>> {
    let resolved = resolve_existing(path).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )
    })?;
    debug!("Loading g6 file: {}", resolved.display());
    read_g6_list(open_reader(&resolved)?, &resolved)
}

/// Reads a count header followed by one graph per line. Empty lines are skipped.
pub fn read_g6_list<R: BufRead>(reader: R, path: &Path) -> Result<Vec<String>> {
    let mut lines = reader.lines();
    let first_line = lines
        .next()
        .ok_or_else(|| format_error(path, "empty file"))??;
    let num_graphs: usize = first_line
        .trim()
        .parse()
        .map_err(|_| format_error(path, format!("invalid header line {first_line:?}")))?;

    let mut g6_list = Vec::with_capacity(num_graphs);
    for line in lines {
        let line = line?;
        let g6 = line.trim();
        if !g6.is_empty() {
            g6_list.push(g6.to_string());
        }
    }
    if g6_list.len() != num_graphs {
        return Err(format_error(
            path,
            format!(
                "header announces {} graphs, found {}",
                num_graphs,
                g6_list.len()
            ),
        ));
    }
    Ok(g6_list)
}

pub fn save_g6_file(g6_list: &[String], path: &Path, compression_level: i32) -> Result<PathBuf> {
    let written = write_with(path, compression_level, |w| write_g6_list(g6_list, w))?;
    debug!("Saved {} graphs to {}", g6_list.len(), written.display());
    Ok(written)
}

pub fn write_g6_list<W: Write + ?Sized>(g6_list: &[String], writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "{}", g6_list.len())?;
    for g6 in g6_list {
        writeln!(writer, "{}", g6)?;
    }
    Ok(())
}

/// Sparse integer matrix, entries keyed by 0-based (row, column).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMatrix {
    pub nrows: usize,
    pub ncols: usize,
    pub entries: BTreeMap<(usize, usize), i32>,
}

impl SparseMatrix {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        SparseMatrix {
            nrows,
            ncols,
            entries: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, row: usize, col: usize, value: i32) {
        *self.entries.entry((row, col)).or_insert(0) += value;
    }

    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.entries.get(&(row, col)).copied().unwrap_or(0)
    }

    /// Drops entries whose contributions cancelled.
    pub fn prune_zeros(&mut self) {
        self.entries.retain(|_, v| *v != 0);
    }

    pub fn nnz(&self) -> usize {
        self.entries.values().filter(|&&v| v != 0).count()
    }
}

pub fn load_matrix_from_sms_file(path: &Path) -> Result<SparseMatrix> {
    let resolved = resolve_existing(path).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )
    })?;
    debug!("Loading matrix from file: {}", resolved.display());
    read_sms(open_reader(&resolved)?, &resolved)
}

pub fn read_sms<R: BufRead>(reader: R, path: &Path) -> Result<SparseMatrix> {
    let mut lines = reader.lines();
    let first_line = lines
        .next()
        .ok_or_else(|| format_error(path, "empty file"))??;
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(format_error(path, format!("invalid header line {first_line:?}")));
    }
    let nrows: usize = parts[0]
        .parse()
        .map_err(|_| format_error(path, "invalid row count"))?;
    let ncols: usize = parts[1]
        .parse()
        .map_err(|_| format_error(path, "invalid column count"))?;
    let num_entries: usize = parts[2]
        .parse()
        .map_err(|_| format_error(path, "invalid entry count"))?;

    let mut matrix = SparseMatrix::new(nrows, ncols);
    let mut entries_read = 0usize;
    let mut terminated = false;
    for line in lines {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if parts.len() < 3 {
            return Err(format_error(path, format!("invalid entry line {line:?}")));
        }
        let parse = |s: &str| -> Result<i64> {
            s.parse()
                .map_err(|_| format_error(path, format!("invalid number {s:?} in line {line:?}")))
        };
        let (row, col, val) = (parse(parts[0])?, parse(parts[1])?, parse(parts[2])?);

        if row == 0 && col == 0 && val == 0 {
            terminated = true;
            break;
        }
        if row <= 0 || col <= 0 || row as usize > nrows || col as usize > ncols {
            return Err(format_error(path, format!("entry index out of range in line {line:?}")));
        }
        let val = i32::try_from(val)
            .map_err(|_| format_error(path, format!("value out of range in line {line:?}")))?;
        matrix.add(row as usize - 1, col as usize - 1, val);
        entries_read += 1;
    }
    if !terminated {
        return Err(format_error(path, "missing terminating line \"0 0 0\""));
    }
    if entries_read != num_entries {
        return Err(format_error(
            path,
            format!("header announces {} entries, found {}", num_entries, entries_read),
        ));
    }
    Ok(matrix)
}

pub fn save_matrix_to_sms_file(matrix: &SparseMatrix, path: &Path, compression_level: i32) -> Result<PathBuf> {
    let written = write_with(path, compression_level, |w| write_sms(matrix, w))?;
    debug!(
        "Saved {}x{} matrix with {} entries to {}",
        matrix.nrows,
        matrix.ncols,
        matrix.nnz(),
        written.display()
    );
    Ok(written)
}

pub fn write_sms<W: Write + ?Sized>(matrix: &SparseMatrix, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "{} {} {}", matrix.nrows, matrix.ncols, matrix.nnz())?;
    for (&(row, col), &value) in &matrix.entries {
        if value == 0 {
            continue;
        }
        // sms files are 1-based
        writeln!(writer, "{} {} {}", row + 1, col + 1, value)?;
    }
    writeln!(writer, "0 0 0")?;
    Ok(())
}

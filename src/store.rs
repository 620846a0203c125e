use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{KneisslerError, Result};
use crate::helpers::{
    load_g6_file, load_matrix_from_sms_file, resolve_existing, save_g6_file, save_matrix_to_sms_file,
    with_zstd_extension, SparseMatrix,
};
use crate::kneissler::FamilyType;

pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Basis,
    Matrix,
    ReferenceBasis,
    ReferenceMatrix,
}

impl ArtifactKind {
    pub fn is_matrix(self) -> bool {
        matches!(self, ArtifactKind::Matrix | ArtifactKind::ReferenceMatrix)
    }

    pub fn is_reference(self) -> bool {
        matches!(self, ArtifactKind::ReferenceBasis | ArtifactKind::ReferenceMatrix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub kind: ArtifactKind,
    pub num_loops: u8,
    pub family: FamilyType,
    pub even_edges: bool,
}

impl ArtifactKey {
    pub fn basis(num_loops: u8, family: FamilyType, even_edges: bool) -> Self {
        ArtifactKey {
            kind: ArtifactKind::Basis,
            num_loops,
            family,
            even_edges,
        }
    }

    pub fn matrix(num_loops: u8, family: FamilyType, even_edges: bool) -> Self {
        ArtifactKey {
            kind: ArtifactKind::Matrix,
            num_loops,
            family,
            even_edges,
        }
    }

    /// The golden counterpart of a built artifact.
    pub fn reference(self) -> Self {
        let kind = match self.kind {
            ArtifactKind::Basis | ArtifactKind::ReferenceBasis => ArtifactKind::ReferenceBasis,
            ArtifactKind::Matrix | ArtifactKind::ReferenceMatrix => ArtifactKind::ReferenceMatrix,
        };
        ArtifactKey { kind, ..self }
    }
}

pub fn get_type_string(even_edges: bool) -> &'static str {
    if even_edges { "even_edges" } else { "odd_edges" }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            ArtifactKind::Basis => "basis",
            ArtifactKind::Matrix => "contraction matrix",
            ArtifactKind::ReferenceBasis => "reference basis",
            ArtifactKind::ReferenceMatrix => "reference contraction matrix",
        };
        write!(
            f,
            "{} (loops {}, type {}, {})",
            what,
            self.num_loops,
            self.family,
            get_type_string(self.even_edges)
        )
    }
}

/// Storage backend for bases (lists of canonical graph6 strings) and matrices.
///
/// Loading an artifact that does not exist fails with
/// [`KneisslerError::MissingArtifact`].
pub trait ArtifactStore {
    fn exists(&self, key: &ArtifactKey) -> bool;

    fn load_basis(&self, key: &ArtifactKey) -> Result<Vec<String>>;

    fn save_basis(&self, key: &ArtifactKey, basis: &[String]) -> Result<()>;

    fn load_matrix(&self, key: &ArtifactKey) -> Result<SparseMatrix>;

    fn save_matrix(&self, key: &ArtifactKey, matrix: &SparseMatrix) -> Result<()>;

    /// Deletes the artifact. Returns false if there was nothing to delete.
    fn remove(&self, key: &ArtifactKey) -> Result<bool>;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for &S {
    fn exists(&self, key: &ArtifactKey) -> bool {
        (**self).exists(key)
    }

    fn load_basis(&self, key: &ArtifactKey) -> Result<Vec<String>> {
        (**self).load_basis(key)
    }

    fn save_basis(&self, key: &ArtifactKey, basis: &[String]) -> Result<()> {
        (**self).save_basis(key, basis)
    }

    fn load_matrix(&self, key: &ArtifactKey) -> Result<SparseMatrix> {
        (**self).load_matrix(key)
    }

    fn save_matrix(&self, key: &ArtifactKey, matrix: &SparseMatrix) -> Result<()> {
        (**self).save_matrix(key, matrix)
    }

    fn remove(&self, key: &ArtifactKey) -> Result<bool> {
        (**self).remove(key)
    }
}

/// Artifacts as text files below a data directory, optionally zstd compressed.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    compression_level: i32,
}

impl Default for FileStore {
    fn default() -> Self {
        FileStore::new(DEFAULT_DATA_DIR)
    }
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore {
            root: root.into(),
            compression_level: 0,
        }
    }

    /// New files are written as `<path>.zst` when `level > 0`.
    pub fn with_compression(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the uncompressed file for `key`.
    pub fn path(&self, key: &ArtifactKey) -> PathBuf {
        let mut path = self.root.join("kneissler");
        if key.kind.is_reference() {
            path.push("ref");
        }
        path.push(get_type_string(key.even_edges));
        let file_name = if key.kind.is_matrix() {
            format!("contractD{}_{}.txt", key.num_loops, key.family)
        } else {
            format!("gra{}_{}.g6", key.num_loops, key.family)
        };
        path.push(file_name);
        path
    }

    fn existing_path(&self, key: &ArtifactKey) -> Result<PathBuf> {
        resolve_existing(&self.path(key)).ok_or(KneisslerError::MissingArtifact { key: *key })
    }
}

impl ArtifactStore for FileStore {
    fn exists(&self, key: &ArtifactKey) -> bool {
        resolve_existing(&self.path(key)).is_some()
    }

    fn load_basis(&self, key: &ArtifactKey) -> Result<Vec<String>> {
        load_g6_file(&self.existing_path(key)?)
    }

    fn save_basis(&self, key: &ArtifactKey, basis: &[String]) -> Result<()> {
        save_g6_file(basis, &self.path(key), self.compression_level)?;
        Ok(())
    }

    fn load_matrix(&self, key: &ArtifactKey) -> Result<SparseMatrix> {
        load_matrix_from_sms_file(&self.existing_path(key)?)
    }

    fn save_matrix(&self, key: &ArtifactKey, matrix: &SparseMatrix) -> Result<()> {
        save_matrix_to_sms_file(matrix, &self.path(key), self.compression_level)?;
        Ok(())
    }

    fn remove(&self, key: &ArtifactKey) -> Result<bool> {
        let plain = self.path(key);
        let mut removed = false;
        for path in [with_zstd_extension(&plain), plain] {
            if path.exists() {
                std::fs::remove_file(&path)?;
                debug!("Removed {}", path.display());
                removed = true;
            }
        }
        Ok(removed)
    }
}

#[derive(Debug, Clone)]
enum Artifact {
    Basis(Vec<String>),
    Matrix(SparseMatrix),
}

/// Keeps artifacts in memory; used for tests and throwaway computations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: RefCell<FxHashMap<ArtifactKey, Artifact>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.borrow().is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, key: &ArtifactKey) -> bool {
        self.artifacts.borrow().contains_key(key)
    }

    fn load_basis(&self, key: &ArtifactKey) -> Result<Vec<String>> {
        match self.artifacts.borrow().get(key) {
            Some(Artifact::Basis(basis)) => Ok(basis.clone()),
            _ => Err(KneisslerError::MissingArtifact { key: *key }),
        }
    }

    fn save_basis(&self, key: &ArtifactKey, basis: &[String]) -> Result<()> {
        self.artifacts
            .borrow_mut()
            .insert(*key, Artifact::Basis(basis.to_vec()));
        Ok(())
    }

    fn load_matrix(&self, key: &ArtifactKey) -> Result<SparseMatrix> {
        match self.artifacts.borrow().get(key) {
            Some(Artifact::Matrix(matrix)) => Ok(matrix.clone()),
            _ => Err(KneisslerError::MissingArtifact { key: *key }),
        }
    }

    fn save_matrix(&self, key: &ArtifactKey, matrix: &SparseMatrix) -> Result<()> {
        let mut matrix = matrix.clone();
        // the file format does not keep cancelled entries either
        matrix.prune_zeros();
        self.artifacts.borrow_mut().insert(*key, Artifact::Matrix(matrix));
        Ok(())
    }

    fn remove(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.artifacts.borrow_mut().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> SparseMatrix {
        let mut m = SparseMatrix::new(3, 2);
        m.add(0, 0, 1);
        m.add(2, 1, -2);
        m
    }

    fn exercise_store<S: ArtifactStore>(store: &S) {
        let basis_key = ArtifactKey::basis(6, FamilyType::AllTrivalent, true);
        let matrix_key = ArtifactKey::matrix(6, FamilyType::AllTrivalent, true);

        assert!(!store.exists(&basis_key));
        assert!(matches!(
            store.load_basis(&basis_key),
            Err(KneisslerError::MissingArtifact { key }) if key == basis_key
        ));

        let basis = vec!["I?ABCDEFG".to_string(), "I?ABCDEFH".to_string()];
        store.save_basis(&basis_key, &basis).unwrap();
        assert!(store.exists(&basis_key));
        assert_eq!(store.load_basis(&basis_key).unwrap(), basis);
        // same parameters, other convention
        assert!(!store.exists(&ArtifactKey::basis(6, FamilyType::AllTrivalent, false)));

        store.save_matrix(&matrix_key, &sample_matrix()).unwrap();
        assert_eq!(store.load_matrix(&matrix_key).unwrap(), sample_matrix());

        assert!(store.remove(&basis_key).unwrap());
        assert!(!store.remove(&basis_key).unwrap());
        assert!(!store.exists(&basis_key));
        assert!(store.exists(&matrix_key));
    }

    #[test]
    fn test_memory_store() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise_store(&FileStore::new(dir.path()));
    }

    #[test]
    fn test_compressed_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).with_compression(3);
        let key = ArtifactKey::basis(7, FamilyType::Generators, false);
        store.save_basis(&key, &["Bw".to_string()]).unwrap();

        assert!(!store.path(&key).exists());
        assert!(with_zstd_extension(&store.path(&key)).exists());
        assert!(store.exists(&key));
        assert_eq!(store.load_basis(&key).unwrap(), vec!["Bw".to_string()]);

        // a plain store reads compressed files too
        let plain = FileStore::new(dir.path());
        assert_eq!(plain.load_basis(&key).unwrap(), vec!["Bw".to_string()]);
        assert!(plain.remove(&key).unwrap());
        assert!(!store.exists(&key));

        exercise_store(&FileStore::new(dir.path().join("other")).with_compression(1));
    }

    #[test]
    fn test_switching_compression_replaces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let plain = FileStore::new(dir.path());
        let compressed = FileStore::new(dir.path()).with_compression(3);
        let key = ArtifactKey::basis(8, FamilyType::AllTrivalent, true);

        plain.save_basis(&key, &["Bw".to_string()]).unwrap();
        compressed.save_basis(&key, &["Cr".to_string(), "Cs".to_string()]).unwrap();
        assert!(!plain.path(&key).exists());
        assert_eq!(plain.load_basis(&key).unwrap(), vec!["Cr".to_string(), "Cs".to_string()]);

        plain.save_basis(&key, &["Bw".to_string()]).unwrap();
        assert!(!with_zstd_extension(&plain.path(&key)).exists());
        assert_eq!(compressed.load_basis(&key).unwrap(), vec!["Bw".to_string()]);

        let key = ArtifactKey::matrix(8, FamilyType::AllTrivalent, true);
        let mut old = SparseMatrix::new(2, 2);
        old.add(0, 0, 1);
        plain.save_matrix(&key, &old).unwrap();
        let mut new = SparseMatrix::new(3, 1);
        new.add(2, 0, -2);
        compressed.save_matrix(&key, &new).unwrap();
        let loaded = plain.load_matrix(&key).unwrap();
        assert_eq!((loaded.nrows, loaded.ncols), (3, 1));
        assert_eq!(loaded.get(2, 0), -2);
        assert_eq!(loaded.nnz(), 1);
    }

    #[test]
    fn test_file_store_paths() {
        let store = FileStore::new("data");
        let key = ArtifactKey::basis(10, FamilyType::Relations, true);
        assert_eq!(store.path(&key), Path::new("data/kneissler/even_edges/gra10_1.g6"));
        let key = ArtifactKey::matrix(9, FamilyType::Complement, false);
        assert_eq!(
            store.path(&key),
            Path::new("data/kneissler/odd_edges/contractD9_3.txt")
        );
        assert_eq!(
            store.path(&key.reference()),
            Path::new("data/kneissler/ref/odd_edges/contractD9_3.txt")
        );
        let key = ArtifactKey::basis(10, FamilyType::Generators, true).reference();
        assert_eq!(store.path(&key), Path::new("data/kneissler/ref/even_edges/gra10_0.g6"));
    }

    #[test]
    fn test_malformed_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let key = ArtifactKey::basis(6, FamilyType::Generators, true);
        let path = store.path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "3\nBw\n").unwrap();
        assert!(matches!(store.load_basis(&key), Err(KneisslerError::Format { .. })));
    }
}

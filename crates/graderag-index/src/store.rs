use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use graderag_core::config::index_location;
use graderag_core::error::{Error, Result};
use graderag_core::traits::IndexBackend;
use graderag_core::types::DocumentChunk;

use crate::catalog::{IndexCatalog, CATALOG_FILE};

/// Result of handing a finished build to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    Published,
    /// Another build of the same category was published first; ours was discarded.
    Superseded,
}

/// A reopened, complete category index.
pub struct LoadedIndex<H> {
    pub catalog: IndexCatalog,
    pub handle: H,
}

/// Per-category on-disk layout under `databases_dir`:
///
/// ```text
/// <databases_dir>/<grade>_vector_db/
///     chunks.lance/      backend artifact
///     docstore.json      catalog, written last
/// ```
pub struct CategoryIndexStore<B> {
    databases_dir: PathBuf,
    backend: B,
}

impl<B: IndexBackend> CategoryIndexStore<B> {
    pub fn new(databases_dir: impl Into<PathBuf>, backend: B) -> Self {
        Self { databases_dir: databases_dir.into(), backend }
    }

    pub fn databases_dir(&self) -> &Path {
        &self.databases_dir
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn location(&self, grade: &str) -> PathBuf {
        index_location(&self.databases_dir, grade)
    }

    /// True only when the catalog marker exists; a bare directory is not enough.
    pub fn is_complete(&self, grade: &str) -> bool {
        self.location(grade).join(CATALOG_FILE).is_file()
    }

    pub fn catalog(&self, grade: &str) -> Result<Option<IndexCatalog>> {
        if !self.is_complete(grade) {
            return Ok(None);
        }
        IndexCatalog::read(&self.location(grade)).map(Some)
    }

    /// Persists a finished build into a staging directory, writes the catalog
    /// and renames the directory into place. Any failure leaves no marker behind.
    pub fn publish(
        &self,
        catalog: &IndexCatalog,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<Publication> {
        let grade = catalog.grade.as_str();
        let dbs = &self.databases_dir;
        fs::create_dir_all(dbs).map_err(|e| Error::io(dbs, e))?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{grade}_vector_db."))
            .tempdir_in(&self.databases_dir)
            .map_err(|e| Error::io(&self.databases_dir, e))?;
        debug!(grade, "Staging build in {}", staging.path().display());

        self.backend
            .persist(staging.path(), chunks, embeddings, catalog.dim)
            .map_err(Error::Storage)?;
        catalog.write_atomic(staging.path())?;

        let location = self.location(grade);
        if location.exists() {
            let mut aside = staging.path().as_os_str().to_owned();
            aside.push(".stale");
            let aside = PathBuf::from(aside);
            if let Some(publication) = self.retire(grade, &location, &aside)? {
                return Ok(publication);
            }
        }
        // `staging` still owns the path; its drop is a no-op once the rename succeeds.
        match fs::rename(staging.path(), &location) {
            Ok(()) => {
                info!(grade, "Published index at {}", location.display());
                Ok(Publication::Published)
            }
            Err(_) if self.is_complete(grade) => {
                info!(grade, "Index published concurrently; discarding this build");
                Ok(Publication::Superseded)
            }
            Err(e) => Err(Error::io(&location, e)),
        }
    }

    /// Moves whatever sits at `location` to the private path `aside`. A moved
    /// directory carrying a marker is a finished build: it is put back and
    /// `Superseded` returned. Anything else is deleted.
    fn retire(&self, grade: &str, location: &Path, aside: &Path) -> Result<Option<Publication>> {
        match fs::rename(location, aside) {
            Ok(()) => {}
            // another build cleared it first
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(location, e)),
        }
        if !aside.join(CATALOG_FILE).is_file() {
            warn!(grade, "Removing incomplete index at {}", location.display());
            remove_any(aside)?;
            return Ok(None);
        }

        info!(grade, "Index published concurrently; discarding this build");
        match fs::rename(aside, location) {
            Ok(()) => Ok(Some(Publication::Superseded)),
            Err(_) if self.is_complete(grade) => {
                remove_any(aside)?;
                Ok(Some(Publication::Superseded))
            }
            Err(e) => Err(Error::io(location, e)),
        }
    }

    pub fn load_index(&self, grade: &str) -> Result<LoadedIndex<B::Handle>> {
        if !self.is_complete(grade) {
            return Err(Error::IndexNotFound(grade.to_string()));
        }
        let location = self.location(grade);
        let catalog = IndexCatalog::read(&location)?;
        let handle = self.backend.open(&location).map_err(Error::Storage)?;
        debug!(
            grade,
            chunks = catalog.chunk_count,
            "Loaded index from {}",
            location.display()
        );
        Ok(LoadedIndex { catalog, handle })
    }
}

fn remove_any(path: &Path) -> Result<()> {
    let removed = if path.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    removed.map_err(|e| Error::io(path, e))
}

//! Suffix-keyed mesh file readers.
//!
//! Four file suffixes are recognized, one per grid flavour plus the legacy
//! format. A [`ReaderRegistry`] maps each suffix to a [`MeshReader`]; only
//! the ASCII legacy reader ships with this crate, XML readers are supplied
//! by the caller through [`ReaderRegistry::register`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use cf_mesh::{Mesh, MeshKind};
use mesh_common::{Dataset, MeshError, MeshResult};

use crate::convert::mesh_to_dataset;
use crate::legacy::LegacyVtkReader;

/// Mesh file formats, keyed by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshFormat {
    /// `.vti` image data.
    ImageData,
    /// `.vtr` rectilinear grid.
    RectilinearGrid,
    /// `.vts` structured grid.
    StructuredGrid,
    /// `.vtk` legacy file of any grid flavour.
    Legacy,
}

impl MeshFormat {
    pub const ALL: [MeshFormat; 4] = [
        MeshFormat::ImageData,
        MeshFormat::RectilinearGrid,
        MeshFormat::StructuredGrid,
        MeshFormat::Legacy,
    ];

    /// File suffix including the leading dot.
    pub fn suffix(&self) -> &'static str {
        match self {
            MeshFormat::ImageData => ".vti",
            MeshFormat::RectilinearGrid => ".vtr",
            MeshFormat::StructuredGrid => ".vts",
            MeshFormat::Legacy => ".vtk",
        }
    }

    /// Parse a suffix with or without the leading dot (case-insensitive).
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let suffix = suffix.trim_start_matches('.').to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.suffix()[1..] == suffix)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_suffix)
    }

    /// Grid flavour stored by this format. Legacy files may hold any.
    pub fn mesh_kind(&self) -> Option<MeshKind> {
        match self {
            MeshFormat::ImageData => Some(MeshKind::Uniform),
            MeshFormat::RectilinearGrid => Some(MeshKind::Rectilinear),
            MeshFormat::StructuredGrid => Some(MeshKind::Structured),
            MeshFormat::Legacy => None,
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Reads one mesh file format.
pub trait MeshReader: Send + Sync {
    fn format(&self) -> MeshFormat;

    fn read(&self, path: &Path) -> MeshResult<Mesh>;
}

/// Readers keyed by format.
#[derive(Clone)]
pub struct ReaderRegistry {
    readers: HashMap<MeshFormat, Arc<dyn MeshReader>>,
}

impl ReaderRegistry {
    /// A registry with no readers.
    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// A registry holding the built-in legacy reader.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(LegacyVtkReader));
        registry
    }

    /// Register a reader, replacing any previous reader for its format.
    pub fn register(&mut self, reader: Arc<dyn MeshReader>) {
        self.readers.insert(reader.format(), reader);
    }

    pub fn reader(&self, format: MeshFormat) -> Option<Arc<dyn MeshReader>> {
        self.readers.get(&format).cloned()
    }

    /// Formats with a registered reader, in suffix order.
    pub fn formats(&self) -> Vec<MeshFormat> {
        MeshFormat::ALL
            .into_iter()
            .filter(|format| self.readers.contains_key(format))
            .collect()
    }

    /// Whether a registered reader handles this path's suffix.
    pub fn guess_can_open(&self, path: &Path) -> bool {
        MeshFormat::from_path(path).is_some_and(|format| self.readers.contains_key(&format))
    }

    /// Read a mesh with the reader registered for the path's suffix.
    pub fn read(&self, path: &Path) -> MeshResult<Mesh> {
        let format = MeshFormat::from_path(path).ok_or_else(|| {
            MeshError::UnsupportedFileFormat(format!("unknown suffix: {}", path.display()))
        })?;
        let reader = self.reader(format).ok_or_else(|| {
            MeshError::UnsupportedFileFormat(format!("no reader registered for {}", format))
        })?;

        tracing::debug!(path = %path.display(), format = %format, "Reading mesh file");
        let mesh = reader.read(path)?;
        if let Some(kind) = format.mesh_kind() {
            if mesh.kind() != kind {
                return Err(MeshError::malformed_file(format!(
                    "{} reader returned a {} grid",
                    format,
                    mesh.kind()
                )));
            }
        }
        Ok(mesh)
    }

    /// Read a mesh file and convert it into a dataset.
    pub fn open_dataset(&self, path: &Path) -> MeshResult<Dataset> {
        mesh_to_dataset(&self.read(path)?)
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

/// Whether the path has one of the four mesh file suffixes.
pub fn guess_can_open(path: impl AsRef<Path>) -> bool {
    MeshFormat::from_path(path.as_ref()).is_some()
}

/// Open a mesh file with the default registry and convert it into a dataset.
pub fn open_dataset(path: impl AsRef<Path>) -> MeshResult<Dataset> {
    ReaderRegistry::new().open_dataset(path.as_ref())
}

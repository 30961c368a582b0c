//! Error types for mesh generation and dataset conversion.

use thiserror::Error;

/// Result type alias using MeshError.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors raised while classifying coordinates, generating meshes or
/// converting meshes back into labeled arrays.
#[derive(Debug, Error)]
pub enum MeshError {
    // === Metadata Errors ===
    /// `formula_terms` could not be split into `key: variable` pairs.
    #[error("Invalid key/value pairing in formula_terms: {0}")]
    InvalidFormulaTerms(String),

    /// A parametric formula was found but its terms could not be bound.
    #[error("No formula for '{formula}' with given terms: {message}")]
    FormulaBinding { formula: String, message: String },

    /// A variable referenced by name does not exist in the dataset.
    #[error("Variable not found: {0}")]
    MissingVariable(String),

    /// An output array cannot be addressed through (i, j, k).
    #[error("No index mapping for '{name}' with dimensions {dims:?}")]
    UnsupportedIndexMapping { name: String, dims: Vec<String> },

    #[error("Invalid dataset metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid slice for '{name}': {message}")]
    InvalidSlice { name: String, message: String },

    // === Topology Errors ===
    /// A known topology branch that is deliberately left unimplemented.
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error(
        "Dimensional mismatch between specified X, Y, Z coords and dimensionality of DataArray ({axes} vs {rank}). \
         Too many coordinate dimensions specified leave out Y and/or Z."
    )]
    TooManyAxes { axes: usize, rank: usize },

    #[error(
        "Dimensional mismatch between specified X, Y, Z coords and dimensionality of DataArray ({axes} vs {rank}). \
         Too few coordinate dimensions specified. Be sure to specify Y and/or Z or reduce the dimensionality \
         of the DataArray by indexing along non-spatial coordinates like Time."
    )]
    TooFewAxes { axes: usize, rank: usize },

    // === File Errors ===
    #[error("Unsupported mesh file format: {0}")]
    UnsupportedFileFormat(String),

    #[error("Malformed mesh file: {0}")]
    MalformedFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),
}

impl MeshError {
    /// Create a FormulaBinding error.
    pub fn formula_binding(formula: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FormulaBinding {
            formula: formula.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidSlice error.
    pub fn invalid_slice(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSlice {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a MalformedFile error.
    pub fn malformed_file(msg: impl Into<String>) -> Self {
        Self::MalformedFile(msg.into())
    }

    /// Create a NotSupported error.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Build the dimensional-mismatch error matching the direction of the mismatch.
    pub fn dimension_mismatch(axes: usize, rank: usize) -> Self {
        if axes > rank {
            Self::TooManyAxes { axes, rank }
        } else {
            Self::TooFewAxes { axes, rank }
        }
    }

    /// Stable identifier for this error, suitable for logs and UI routing.
    pub fn code(&self) -> &'static str {
        match self {
            MeshError::InvalidFormulaTerms(_) => "InvalidFormulaTerms",
            MeshError::FormulaBinding { .. } => "FormulaBinding",
            MeshError::MissingVariable(_) => "MissingVariable",
            MeshError::UnsupportedIndexMapping { .. } => "UnsupportedIndexMapping",
            MeshError::InvalidMetadata(_) => "InvalidMetadata",
            MeshError::InvalidSlice { .. } => "InvalidSlice",
            MeshError::NotSupported(_) => "NotSupported",
            MeshError::TooManyAxes { .. } | MeshError::TooFewAxes { .. } => "DimensionalMismatch",
            MeshError::UnsupportedFileFormat(_) => "UnsupportedFileFormat",
            MeshError::MalformedFile(_) => "MalformedFile",
            MeshError::Io(_) => "Io",
            MeshError::Json(_) => "Json",
        }
    }

    /// Whether the error comes from dataset metadata rather than from the request.
    pub fn is_metadata_error(&self) -> bool {
        matches!(
            self,
            MeshError::InvalidFormulaTerms(_)
                | MeshError::FormulaBinding { .. }
                | MeshError::MissingVariable(_)
                | MeshError::UnsupportedIndexMapping { .. }
                | MeshError::InvalidMetadata(_)
        )
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Json(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MeshError {
    fn from(err: ndarray::ShapeError) -> Self {
        MeshError::InvalidMetadata(format!("shape error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_direction() {
        let too_many = MeshError::dimension_mismatch(3, 2);
        assert!(matches!(too_many, MeshError::TooManyAxes { axes: 3, rank: 2 }));
        assert!(too_many.to_string().contains("Too many coordinate dimensions"));

        let too_few = MeshError::dimension_mismatch(1, 3);
        assert!(matches!(too_few, MeshError::TooFewAxes { axes: 1, rank: 3 }));
        assert!(too_few.to_string().contains("Too few coordinate dimensions"));
        assert!(too_few.to_string().contains("like Time"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(MeshError::not_supported("bounds").code(), "NotSupported");
        assert_eq!(
            MeshError::dimension_mismatch(2, 1).code(),
            MeshError::dimension_mismatch(1, 2).code()
        );
        assert!(MeshError::InvalidFormulaTerms("a:".into()).is_metadata_error());
        assert!(!MeshError::UnsupportedFileFormat(".nc".into()).is_metadata_error());
    }
}

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid structure for molecule '{name}': {details}")]
    InvalidStructure { name: String, details: String },

    #[error("conformer shape mismatch: expected {expected} coordinates, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("rigid alignment failed: {details}")]
    Alignment { details: String },
}

impl Error {
    pub fn invalid_structure(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidStructure {
            name: name.into(),
            details: details.into(),
        }
    }

    pub fn shape_mismatch(expected: usize, found: usize) -> Self {
        Self::ShapeMismatch { expected, found }
    }

    pub fn alignment(details: impl Into<String>) -> Self {
        Self::Alignment {
            details: details.into(),
        }
    }
}

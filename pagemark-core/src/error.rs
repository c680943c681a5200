use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HighlightError {
    #[error("highlight id {0:?} already exists in this document")]
    DuplicateId(String),

    #[error("highlight id {0:?} not found in the active document")]
    NotFound(String),

    #[error("highlight {id:?} would span pages {expected} and {found}")]
    PageMismatch {
        id: String,
        expected: u32,
        found: u32,
    },

    #[error("invalid viewport: {0}")]
    InvalidViewport(String),
}

pub type HighlightResult<T> = std::result::Result<T, HighlightError>;

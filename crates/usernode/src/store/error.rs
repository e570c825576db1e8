/// Failure reported by a [`DocumentStore`](super::DocumentStore).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A write would violate a unique index.
    #[error("duplicate key on index {index}")]
    Duplicate { index: String },

    /// A document or value could not be translated to or from the backend's
    /// representation.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Connection, I/O or any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend<E: core::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

//! Error types for the EdgeStack core.

/// Core error type for EdgeStack infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A reference key does not follow the `/namespace/name` path format.
    #[error("invalid reference key: {key} ({reason})")]
    InvalidReferenceKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

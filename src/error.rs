//! Error types for section access and material resolution

use thiserror::Error;

/// Errors reported by the section-facing API.
///
/// Index-based *mutators* never fail: an out-of-range index is a no-op,
/// matching the permissive semantics of the section API. Only the few
/// accessors that must produce a value report errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeformMeshError {
    /// The slot exists but holds no geometry (cleared or never created).
    #[error("section {index} has no geometry")]
    NullGeometry { index: usize },

    /// The index is beyond the current section list.
    #[error("section index {index} out of range (section count {len})")]
    OutOfRange { index: usize, len: usize },
}

pub type DeformMeshResult<T> = Result<T, DeformMeshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = DeformMeshError::NullGeometry { index: 3 };
        assert_eq!(err.to_string(), "section 3 has no geometry");

        let err = DeformMeshError::OutOfRange { index: 7, len: 2 };
        assert_eq!(
            err.to_string(),
            "section index 7 out of range (section count 2)"
        );
    }
}

//! Error types for sculpting operations.

use tracing::error;

use crate::types::VertexId;

/// Errors that can occur while building or editing a mesh.
#[derive(Debug, thiserror::Error)]
pub enum SculptError {
    #[error("Face {face} references vertex {vertex} but the mesh has {vertex_count} vertices")]
    FaceIndexOutOfRange {
        face: usize,
        vertex: u32,
        vertex_count: usize,
    },

    #[error("Face {0} uses the same vertex twice")]
    DegenerateFace(usize),

    #[error("Face {face} has no corner {corner}")]
    InvalidCorner { face: usize, corner: usize },

    #[error("{buffer} buffer has {actual} entries, expected {expected}")]
    BufferLengthMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{collaborator} returned vertex {vertex} but the mesh has {vertex_count} vertices")]
    IdOutOfRange {
        collaborator: &'static str,
        vertex: u32,
        vertex_count: usize,
    },
}

/// Check ids handed back by an external collaborator against the vertex count.
///
/// An out-of-range id means the collaborator is out of sync with the committed
/// geometry, which is a caller bug: debug builds panic, release builds return
/// the error.
pub(crate) fn check_vertex_ids(
    collaborator: &'static str,
    ids: &[VertexId],
    vertex_count: usize,
) -> Result<(), SculptError> {
    let Some(bad) = ids.iter().find(|id| id.index() >= vertex_count) else {
        return Ok(());
    };

    error!(
        "{} returned vertex {} outside the mesh ({} vertices)",
        collaborator, bad.0, vertex_count
    );
    #[cfg(debug_assertions)]
    panic!(
        "{} returned vertex {} out of range ({} vertices)",
        collaborator, bad.0, vertex_count
    );
    #[cfg(not(debug_assertions))]
    Err(SculptError::IdOutOfRange {
        collaborator,
        vertex: bad.0,
        vertex_count,
    })
}

pub(crate) fn check_len(
    buffer: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), SculptError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SculptError::BufferLengthMismatch {
            buffer,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_in_range_pass() {
        assert!(check_vertex_ids("remesher", &[VertexId(0), VertexId(2)], 3).is_ok());
        assert!(check_vertex_ids("remesher", &[], 0).is_ok());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "out of range"))]
    fn test_ids_out_of_range_are_fatal() {
        let result = check_vertex_ids("spatial index", &[VertexId(5)], 3);
        assert!(matches!(
            result,
            Err(SculptError::IdOutOfRange { vertex: 5, vertex_count: 3, .. })
        ));
    }

    #[test]
    fn test_length_mismatch_message() {
        let err = check_len("colors", 4, 3).unwrap_err();
        assert_eq!(err.to_string(), "colors buffer has 3 entries, expected 4");
    }
}

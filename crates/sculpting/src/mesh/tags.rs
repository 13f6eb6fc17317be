//! Generation tags for O(touched) set de-duplication.
//!
//! Each pass takes a fresh generation number and stamps the elements it
//! visits; an element is "already seen" when its stamp equals the current
//! generation. The stamp arrays are sized once with the mesh and never
//! cleared between passes.

use crate::types::{FaceId, VertexId};

#[derive(Debug, Clone, Default)]
pub struct TagStamps {
    generation: u32,
    vertex_tags: Vec<u32>,
    face_tags: Vec<u32>,
}

impl TagStamps {
    pub fn new(vertex_count: usize, face_count: usize) -> Self {
        Self {
            generation: 0,
            vertex_tags: vec![0; vertex_count],
            face_tags: vec![0; face_count],
        }
    }

    /// Start a new pass and return its generation.
    pub fn next_generation(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // Wrapped: stale stamps could alias the new generation
            self.vertex_tags.fill(0);
            self.face_tags.fill(0);
            self.generation = 1;
        }
        self.generation
    }

    /// Stamp a vertex; returns true the first time it is seen in `generation`.
    #[inline]
    pub fn tag_vertex(&mut self, vertex: VertexId, generation: u32) -> bool {
        let slot = &mut self.vertex_tags[vertex.index()];
        if *slot == generation {
            return false;
        }
        *slot = generation;
        true
    }

    /// Whether a vertex was stamped in `generation`.
    #[inline]
    pub fn is_vertex_tagged(&self, vertex: VertexId, generation: u32) -> bool {
        self.vertex_tags[vertex.index()] == generation
    }

    /// Stamp a face; returns true the first time it is seen in `generation`.
    #[inline]
    pub fn tag_face(&mut self, face: FaceId, generation: u32) -> bool {
        let slot = &mut self.face_tags[face.index()];
        if *slot == generation {
            return false;
        }
        *slot = generation;
        true
    }

    #[cfg(test)]
    pub(crate) fn set_generation(&mut self, generation: u32) {
        self.generation = generation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_dedupe_within_generation() {
        let mut tags = TagStamps::new(4, 2);
        let generation = tags.next_generation();
        assert!(tags.tag_vertex(VertexId(1), generation));
        assert!(!tags.tag_vertex(VertexId(1), generation));
        assert!(tags.tag_face(FaceId(0), generation));

        let next = tags.next_generation();
        assert!(tags.tag_vertex(VertexId(1), next));
        assert!(tags.tag_face(FaceId(0), next));
    }

    #[test]
    fn test_wraparound_resets_stamps() {
        let mut tags = TagStamps::new(2, 1);
        tags.set_generation(u32::MAX - 1);
        let last = tags.next_generation();
        assert_eq!(last, u32::MAX);
        assert!(tags.tag_vertex(VertexId(0), last));

        let wrapped = tags.next_generation();
        assert_eq!(wrapped, 1);
        assert!(tags.tag_vertex(VertexId(0), wrapped));
        assert!(tags.tag_vertex(VertexId(1), wrapped));
    }
}

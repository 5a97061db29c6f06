//! Full-screen quad geometry shared by every post-process pass.

/// Four corners of the `[-1, 1]²` square and the two triangles covering it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FullscreenQuad {
    /// Clip-space corners, counter-clockwise from bottom-left.
    pub vertices: [[f32; 2]; 4],
    /// Two counter-clockwise triangles.
    pub indices: [u16; 6],
}

impl FullscreenQuad {
    /// The quad used by every filter pass.
    pub const UNIT: FullscreenQuad = FullscreenQuad {
        vertices: [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]],
        indices: [0, 1, 2, 2, 3, 0],
    };

    /// Number of indices drawn per pass.
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

impl Default for FullscreenQuad {
    fn default() -> Self {
        Self::UNIT
    }
}

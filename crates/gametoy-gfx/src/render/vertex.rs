use bytemuck::{Pod, Zeroable};

use crate::device::VertexAttrib;

/// Fixed vertex layout shared by every shader.
pub const VERTEX_FORMAT: &[VertexAttrib] = &[
    VertexAttrib { name: "a_pos", size: 2 },
    VertexAttrib { name: "a_uv", size: 2 },
    VertexAttrib { name: "a_color", size: 4 },
];

/// Two triangles over corners ordered bottom-left, top-left, top-right,
/// bottom-right.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 3, 1, 2, 3];

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    #[inline]
    pub const fn new(pos: [f32; 2], uv: [f32; 2], color: [f32; 4]) -> Self {
        Self { pos, uv, color }
    }
}

//! Batched submission of vertex data.
//!
//! Convention:
//! - Vertices arrive already transformed to NDC.
//! - One GPU draw call is issued per run of submissions that share a
//!   primitive, texture, shader and uniform set.

mod batch;
mod vertex;

pub use batch::BatchRenderer;
pub use vertex::{Vertex, QUAD_INDICES, VERTEX_FORMAT};

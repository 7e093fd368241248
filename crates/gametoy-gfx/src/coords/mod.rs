//! Coordinate and geometry types shared by the draw pipeline and the GPU layer.
//!
//! Canonical CPU space:
//! - Screen pixels
//! - Origin top-left
//! - +X right, +Y down
//!
//! The draw pipeline converts screen pixels to NDC on the CPU before vertices
//! reach the batch renderer.

mod color;
mod mat4;
mod quad;
mod rect;
mod vec2;

pub use color::Color;
pub use mat4::Mat4;
pub use quad::Quad;
pub use rect::ViewportRect;
pub use vec2::Vec2;

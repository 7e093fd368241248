//! GPU resources built on the bind-stack context.
//!
//! Each constructor pushes the bindings it needs and pops them before
//! returning, so creating a resource never changes what the caller has bound.

mod framebuffer;
mod mesh;
mod shader;
mod texture;
mod uniform;

pub use crate::device::{TexFilter, TexWrap};
pub use framebuffer::FrameBuffer;
pub use mesh::Mesh;
pub use shader::{Shader, ShaderSource, DEF_FRAG, DEF_VERT, FRAG_TEMPLATE, VERT_TEMPLATE};
pub use texture::{Texture, TextureOpt};
pub use uniform::{UniformKind, UniformValue, Uniforms};

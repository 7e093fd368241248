//! GPU command layer.
//!
//! [`Backend`] is the GL-style command set the renderer is written against.
//! [`GpuCtx`] wraps a backend with binding stacks and resource tracking.
//! [`gpu::WgpuBackend`] drives a real window surface; [`RecordingBackend`]
//! records calls for tests and headless use.

mod backend;
mod ctx;
mod recording;
mod stack;

pub mod gpu;

pub use backend::{
    vertex_stride, Backend, BufferData, BufferId, BufferTarget, BufferUsage, FramebufferId,
    LinkError, Primitive, ProgramId, RenderbufferId, TexFilter, TexWrap, TextureId, VertexAttrib,
};
pub use ctx::{CtxOptions, GpuCtx, Resource};
pub use recording::{Call, RecordingBackend};
pub use stack::BindStack;

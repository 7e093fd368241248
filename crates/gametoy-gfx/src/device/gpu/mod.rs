//! wgpu implementation of [`Backend`](super::Backend).
//!
//! Shader stages are WGSL, validated with naga before module creation so that
//! compile errors carry a source line. Uniform blocks are laid out by
//! reflecting the validated module.

mod backend;
mod init;
mod reflect;

pub use backend::WgpuBackend;
pub use init::{GpuInit, SurfaceErrorAction};
pub use reflect::UniformLayout;

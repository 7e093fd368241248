//! gametoy graphics core.
//!
//! A batched 2D sprite renderer: sprites are packed into texture atlases,
//! quads are accumulated into a single vertex/index buffer per batch key, and
//! every frame is drawn offscreen before being blitted to the window.
//!
//! [`Gfx`] is the entry point for game code. It is generic over a
//! [`device::Backend`]; [`device::gpu::WgpuBackend`] renders to a window and
//! [`device::RecordingBackend`] records calls for tests.

pub mod atlas;
pub mod config;
pub mod coords;
pub mod core;
pub mod device;
pub mod draw;
pub mod error;
pub mod logging;
pub mod render;
pub mod resources;
pub mod window;

pub use config::GfxConfig;
pub use draw::Gfx;
pub use error::{GfxError, Result};

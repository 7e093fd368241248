//! Window + runtime loop.
//!
//! Owns the `winit` event loop and window, and drives a [`Gfx`](crate::draw::Gfx)
//! on the wgpu backend.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};

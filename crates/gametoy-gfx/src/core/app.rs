use winit::event::WindowEvent;

use crate::device::Backend;
use crate::draw::Gfx;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Game code driven by [`Runtime`](crate::window::Runtime).
///
/// Methods are generic over the backend so an app can also be driven
/// headless, e.g. against a [`RecordingBackend`](crate::device::RecordingBackend).
pub trait App {
    /// Called once after the graphics context exists, before the first frame.
    /// Load sprites and shaders here.
    fn on_start<B: Backend>(&mut self, gfx: &mut Gfx<B>) -> anyhow::Result<()> {
        let _ = gfx;
        Ok(())
    }

    /// Called for window events before the runtime handles them.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called once per redraw.
    fn on_frame<B: Backend>(&mut self, ctx: &mut FrameCtx<'_, B>) -> anyhow::Result<AppControl>;
}

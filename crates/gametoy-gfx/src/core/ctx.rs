use crate::device::Backend;
use crate::draw::Gfx;
use crate::error::Result;

use super::clock::FrameTime;

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
pub struct FrameCtx<'a, B: Backend> {
    pub gfx: &'a mut Gfx<B>,
    pub time: FrameTime,
}

impl<'a, B: Backend> FrameCtx<'a, B> {
    pub fn new(gfx: &'a mut Gfx<B>, time: FrameTime) -> Self {
        Self { gfx, time }
    }

    #[inline]
    pub fn dt(&self) -> f32 {
        self.time.dt
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.time.elapsed
    }

    /// Runs `draw` between [`Gfx::frame_start`] and [`Gfx::frame_end`].
    ///
    /// The frame is ended even when `draw` fails, so the surface is always
    /// presented; the draw error wins over a frame-end error.
    pub fn render<R>(&mut self, draw: impl FnOnce(&mut Gfx<B>) -> Result<R>) -> Result<R> {
        self.gfx.frame_start()?;
        let res = draw(self.gfx);
        let end = self.gfx.frame_end();
        let value = res?;
        end?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GfxConfig;
    use crate::coords::Color;
    use crate::core::FrameClock;
    use crate::device::{Call, RecordingBackend};
    use crate::error::GfxError;

    fn gfx() -> Gfx<RecordingBackend> {
        let config = GfxConfig { background: Some(Color::black()), ..GfxConfig::default() };
        Gfx::new(RecordingBackend::new(64, 64), config).unwrap()
    }

    #[test]
    fn render_wraps_frame_start_and_end() {
        let mut gfx = gfx();
        let time = FrameClock::new().tick();
        let mut ctx = FrameCtx::new(&mut gfx, time);

        let out = ctx.render(|_| Ok(7)).unwrap();
        assert_eq!(out, 7);
        assert_eq!(gfx.ctx().backend().calls().last(), Some(&Call::Present));
    }

    #[test]
    fn failed_draw_still_presents() {
        let mut gfx = gfx();
        let time = FrameClock::new().tick();
        let mut ctx = FrameCtx::new(&mut gfx, time);

        let err = ctx
            .render(|_| -> Result<()> { Err(GfxError::MissingDimension { op: "draw_uv_quad" }) })
            .unwrap_err();
        assert!(matches!(err, GfxError::MissingDimension { .. }));
        assert_eq!(gfx.ctx().backend().calls().last(), Some(&Call::Present));
    }
}

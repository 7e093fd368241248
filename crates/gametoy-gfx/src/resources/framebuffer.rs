use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use crate::coords::ViewportRect;
use crate::device::{Backend, FramebufferId, GpuCtx, RenderbufferId, Resource};
use crate::error::{GfxError, Result};

use super::texture::{Texture, TextureOpt};

/// Offscreen render target: a color texture plus a depth/stencil
/// renderbuffer, attached to one framebuffer object.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    tex: Texture,
    framebuffer: FramebufferId,
    renderbuffer: RenderbufferId,
}

impl FrameBuffer {
    pub fn new<B: Backend>(
        ctx: &mut GpuCtx<B>,
        width: u32,
        height: u32,
        opt: TextureOpt,
    ) -> Result<Self> {
        let tex = Texture::new(ctx, width, height, opt)?;

        let framebuffer = ctx.backend_mut().create_framebuffer()?;
        ctx.track(Resource::Framebuffer(framebuffer));
        let renderbuffer = ctx.backend_mut().create_renderbuffer()?;
        ctx.track(Resource::Renderbuffer(renderbuffer));

        let fb = Self { tex, framebuffer, renderbuffer };

        fb.bind(ctx);
        let res = ctx.backend_mut().renderbuffer_storage(width, height);
        if res.is_ok() {
            ctx.backend_mut().framebuffer_texture(fb.tex.id());
            ctx.backend_mut().framebuffer_renderbuffer(renderbuffer);
        }
        fb.unbind(ctx);
        res?;

        log::debug!("created frame buffer {framebuffer:?} {width}x{height}");
        Ok(fb)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.tex.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.tex.height()
    }

    /// Color attachment.
    #[inline]
    pub fn tex(&self) -> &Texture {
        &self.tex
    }

    #[inline]
    pub fn id(&self) -> FramebufferId {
        self.framebuffer
    }

    /// Binds the framebuffer, its renderbuffer and a full-size viewport.
    pub fn bind<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.push_framebuffer(self.framebuffer);
        ctx.push_renderbuffer(self.renderbuffer);
        ctx.push_viewport(ViewportRect::full(self.width(), self.height()));
    }

    pub fn unbind<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.pop_framebuffer();
        ctx.pop_renderbuffer();
        ctx.pop_viewport();
    }

    /// Runs `action` with this target bound and unbinds afterwards, whatever
    /// `action` returned.
    pub fn draw<B: Backend, R>(
        &self,
        ctx: &mut GpuCtx<B>,
        action: impl FnOnce(&mut GpuCtx<B>) -> R,
    ) -> R {
        self.bind(ctx);
        let out = action(ctx);
        self.unbind(ctx);
        out
    }

    /// Clears the color attachment.
    pub fn clear<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        self.draw(ctx, |ctx| ctx.backend_mut().clear());
    }

    /// Reads the color attachment back as a top-down RGBA image.
    pub fn to_image<B: Backend>(&self, ctx: &mut GpuCtx<B>) -> Result<RgbaImage> {
        let (w, h) = (self.width(), self.height());
        let data = self.draw(ctx, |ctx| ctx.backend_mut().read_pixels(0, 0, w, h))?;

        let mut img = RgbaImage::from_raw(w, h, data).ok_or_else(|| {
            GfxError::Readback(format!("readback size does not match {w}x{h}"))
        })?;

        // Readback rows arrive bottom-up.
        image::imageops::flip_vertical_in_place(&mut img);
        Ok(img)
    }

    /// Encodes the current contents as PNG.
    pub fn to_png<B: Backend>(&self, ctx: &mut GpuCtx<B>) -> Result<Vec<u8>> {
        let img = self.to_image(ctx)?;
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Releases the framebuffer, the renderbuffer and the color texture.
    pub fn free<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.release(Resource::Framebuffer(self.framebuffer));
        ctx.release(Resource::Renderbuffer(self.renderbuffer));
        self.tex.free(ctx);
    }
}

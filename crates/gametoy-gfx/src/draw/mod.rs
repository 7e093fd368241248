//! High-level 2D drawing on top of the GPU context.
//!
//! [`Gfx`] renders each frame into an offscreen frame buffer at the logical
//! resolution, then blits it to the surface through an optional post-process
//! shader.

mod anchor;
mod quad;
mod sprite;
mod transform;

pub use anchor::Anchor;
pub use quad::{DrawSpriteOpt, DrawTextureOpt, DrawUvQuadOpt, RawVertex, RenderProps};
pub use sprite::{LoadSpriteOpt, LoadSpritesAnimOpt, Sprite, SpriteAnim, SpriteAnims, SpriteFrame};
pub use transform::TransformStack;

use image::{Rgba, RgbaImage};

use crate::atlas::TexPacker;
use crate::config::{BG_GRID_SIZE, GfxConfig};
use crate::coords::{Color, Mat4, Quad, Vec2, ViewportRect};
use crate::device::{Backend, CtxOptions, GpuCtx};
use crate::error::Result;
use crate::render::BatchRenderer;
use crate::resources::{FrameBuffer, Shader, TexFilter, TexWrap, Texture, TextureOpt, Uniforms};

/// The 2D renderer.
///
/// Owns the GPU context and every resource created through it; dropping the
/// `Gfx` tears them down.
pub struct Gfx<B: Backend> {
    ctx: GpuCtx<B>,

    renderer: BatchRenderer,
    packer: TexPacker,
    transform: TransformStack,

    def_shader: Shader,
    def_tex: Texture,
    bg_tex: Texture,
    frame_buffer: FrameBuffer,

    post_shader: Option<Shader>,
    post_uniforms: Uniforms,

    bg_color: Option<Color>,
    fixed_size: Option<(u32, u32)>,
    /// Logical size used for screen to NDC conversion.
    width: f32,
    height: f32,
    /// Blit destination on the surface, top-left origin.
    viewport: ViewportRect,
    uv_pad: f32,
    last_draw_calls: usize,
}

impl<B: Backend> Gfx<B> {
    pub fn new(backend: B, config: GfxConfig) -> Result<Self> {
        let mut ctx = GpuCtx::new(backend, CtxOptions { tex_filter: config.tex_filter });

        let def_shader = Shader::new(&mut ctx, None, None)?;
        let def_tex = Texture::from_image(
            &mut ctx,
            RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255])),
            TextureOpt::default(),
        )?;

        let (dw, dh) = ctx.drawing_buffer_size();
        let fixed_size = config.fixed_size();
        let (fw, fh) = fixed_size.unwrap_or((dw, dh));
        let frame_buffer = FrameBuffer::new(&mut ctx, fw, fh, TextureOpt::default())?;

        let clear = match config.background {
            Some(c) => c.with_alpha(config.background_alpha),
            None => [0.0, 0.0, 0.0, 0.0],
        };
        ctx.backend_mut().set_clear_color(clear);

        let quads = config.max_batched_quads;
        let renderer = BatchRenderer::new(&mut ctx, quads * 4, quads * 6)?;

        let bg_tex = Texture::from_image(
            &mut ctx,
            checker_image(),
            TextureOpt { filter: Some(TexFilter::Nearest), wrap: Some(TexWrap::Repeat) },
        )?;

        let packer = TexPacker::new(
            &mut ctx,
            config.atlas_width,
            config.atlas_height,
            TextureOpt::default(),
        )?;

        log::debug!("gfx ready: logical {fw}x{fh}, drawing buffer {dw}x{dh}");

        Ok(Self {
            ctx,
            renderer,
            packer,
            transform: TransformStack::new(),
            def_shader,
            def_tex,
            bg_tex,
            frame_buffer,
            post_shader: None,
            post_uniforms: Uniforms::new(),
            bg_color: config.background,
            fixed_size,
            width: fw as f32,
            height: fh as f32,
            viewport: blit_viewport((dw, dh), fixed_size),
            uv_pad: config.uv_pad,
            last_draw_calls: 0,
        })
    }

    // ── frame ──

    /// Clears the surface and the frame buffer and starts recording into the
    /// frame buffer.
    pub fn frame_start(&mut self) -> Result<()> {
        self.ctx.backend_mut().clear();
        self.frame_buffer.bind(&mut self.ctx);
        self.ctx.backend_mut().clear();

        if self.bg_color.is_none() {
            let bg = self.bg_tex.clone();
            self.draw_unscaled(|gfx| {
                let (w, h) = (gfx.width, gfx.height);
                gfx.draw_uv_quad(&DrawUvQuadOpt {
                    width: Some(w),
                    height: Some(h),
                    tex: Some(&bg),
                    quad: Quad::new(0.0, 0.0, w / BG_GRID_SIZE, h / BG_GRID_SIZE),
                    ..Default::default()
                })
            })?;
        }

        self.renderer.reset_draws();
        self.transform.reset();
        Ok(())
    }

    /// Flushes pending draws, blits the frame buffer onto the surface and
    /// presents it.
    pub fn frame_end(&mut self) -> Result<()> {
        let flushed = self.flush();
        self.last_draw_calls = self.renderer.num_draws();
        self.frame_buffer.unbind(&mut self.ctx);
        self.ctx.apply_viewport();
        flushed?;

        let fb_tex = self.frame_buffer.tex().clone();
        let vp = self.viewport;
        let post_shader = self.post_shader;
        let post_uniforms = self.post_uniforms.clone();

        let saved = std::mem::take(&mut self.transform);
        let res = self.draw_unscaled(|gfx| {
            gfx.draw_texture(&DrawTextureOpt {
                flip_y: true,
                width: Some(vp.width as f32),
                height: Some(vp.height as f32),
                props: RenderProps {
                    pos: Vec2::new(vp.x as f32, vp.y as f32),
                    shader: post_shader,
                    uniforms: Some(&post_uniforms),
                    ..RenderProps::default()
                },
                ..DrawTextureOpt::new(&fb_tex)
            })
        });
        self.transform = saved;
        res?;

        self.ctx.backend_mut().present();
        Ok(())
    }

    /// Runs `f` with the logical size set to the drawing-buffer size, so
    /// coordinates inside are physical pixels. Pending draws are flushed on
    /// both sides.
    pub fn draw_unscaled<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.flush()?;
        let saved = (self.width, self.height);
        let (dw, dh) = self.ctx.drawing_buffer_size();
        self.width = dw as f32;
        self.height = dh as f32;

        let out = f(self);
        let flushed = self.flush();
        (self.width, self.height) = saved;

        let out = out?;
        flushed?;
        Ok(out)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.renderer.flush(&mut self.ctx)
    }

    // ── transform ──

    pub fn push_transform(&mut self) {
        self.transform.push();
    }

    pub fn pop_transform(&mut self) {
        self.transform.pop();
    }

    pub fn push_translate(&mut self, p: Vec2) {
        self.transform.translate(p);
    }

    pub fn push_scale(&mut self, s: Vec2) {
        self.transform.scale(s);
    }

    /// Rotates by `deg` degrees.
    pub fn push_rotate(&mut self, deg: f32) {
        self.transform.rotate(deg);
    }

    pub fn transform(&self) -> &Mat4 {
        self.transform.current()
    }

    // ── surface ──

    /// Follows a surface resize. A zero-sized surface (minimized window) is
    /// ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.ctx.backend_mut().resize(width, height);
        self.ctx.set_default_viewport(ViewportRect::full(width, height));
        self.viewport = blit_viewport((width, height), self.fixed_size);

        if self.fixed_size.is_none() {
            let fb = FrameBuffer::new(&mut self.ctx, width, height, TextureOpt::default())?;
            let old = std::mem::replace(&mut self.frame_buffer, fb);
            old.free(&mut self.ctx);
            self.width = width as f32;
            self.height = height as f32;
        }

        log::debug!("gfx resized to {width}x{height}");
        Ok(())
    }

    /// Where on the surface the frame is blitted, in drawing-buffer pixels.
    pub fn set_viewport(&mut self, rect: ViewportRect) {
        self.viewport = rect;
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    /// Shader and uniforms used when blitting the frame buffer to the
    /// surface. `None` restores the default shader.
    pub fn set_post_shader(&mut self, shader: Option<Shader>, uniforms: Uniforms) {
        self.post_shader = shader;
        self.post_uniforms = uniforms;
    }

    pub fn create_shader(&mut self, vert: Option<&str>, frag: Option<&str>) -> Result<Shader> {
        Shader::new(&mut self.ctx, vert, frag)
    }

    /// Reads back the last rendered frame at the logical resolution.
    pub fn screenshot(&mut self) -> Result<RgbaImage> {
        self.frame_buffer.to_image(&mut self.ctx)
    }

    /// PNG-encoded [`screenshot`](Self::screenshot).
    pub fn screenshot_png(&mut self) -> Result<Vec<u8>> {
        self.frame_buffer.to_png(&mut self.ctx)
    }

    // ── accessors ──

    /// Logical width.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Logical height.
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Draw calls issued by the last completed frame, blit excluded.
    pub fn last_draw_calls(&self) -> usize {
        self.last_draw_calls
    }

    pub fn default_texture(&self) -> &Texture {
        &self.def_tex
    }

    pub fn default_shader(&self) -> Shader {
        self.def_shader
    }

    pub fn renderer(&self) -> &BatchRenderer {
        &self.renderer
    }

    pub fn packer(&self) -> &TexPacker {
        &self.packer
    }

    pub fn ctx(&self) -> &GpuCtx<B> {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut GpuCtx<B> {
        &mut self.ctx
    }

    /// Releases every GPU resource. Further draws are invalid.
    pub fn destroy(&mut self) {
        self.ctx.destroy();
    }
}

/// 2x2 dark/light checker cell, repeated across the frame.
fn checker_image() -> RgbaImage {
    let dark = Rgba([128, 128, 128, 255]);
    let light = Rgba([190, 190, 190, 255]);
    RgbaImage::from_fn(2, 2, |x, y| if (x + y) % 2 == 0 { dark } else { light })
}

fn blit_viewport(surface: (u32, u32), fixed: Option<(u32, u32)>) -> ViewportRect {
    match fixed {
        Some(content) => ViewportRect::letterbox(surface, content),
        None => ViewportRect::full(surface.0, surface.1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Call, RecordingBackend};
    use crate::error::GfxError;

    fn gfx_with(cfg: GfxConfig) -> Gfx<RecordingBackend> {
        let cfg = GfxConfig { atlas_width: 64, atlas_height: 64, ..cfg };
        Gfx::new(RecordingBackend::new(320, 240), cfg).unwrap()
    }

    fn solid_bg() -> GfxConfig {
        GfxConfig { background: Some(Color::black()), ..GfxConfig::default() }
    }

    fn sprite(gfx: &mut Gfx<RecordingBackend>) -> Sprite {
        gfx.load_sprite_image(&RgbaImage::new(16, 16), &LoadSpriteOpt::default())
            .unwrap()
    }

    // ── frame lifecycle ──

    #[test]
    fn one_batch_frame_with_solid_background() {
        let mut gfx = gfx_with(solid_bg());
        let s = sprite(&mut gfx);
        gfx.ctx_mut().backend_mut().take_calls();

        gfx.frame_start().unwrap();
        for i in 0..10 {
            gfx.draw_sprite(&DrawSpriteOpt {
                props: RenderProps { pos: Vec2::new(i as f32 * 8.0, 0.0), ..Default::default() },
                ..DrawSpriteOpt::new(&s)
            })
            .unwrap();
        }
        gfx.frame_end().unwrap();

        assert_eq!(gfx.last_draw_calls(), 1);
        // sprite batch + blit
        assert_eq!(gfx.ctx().backend().draw_count(), 2);
        assert_eq!(gfx.ctx().backend().calls().last(), Some(&Call::Present));
    }

    #[test]
    fn checker_is_drawn_without_background_color() {
        let mut gfx = gfx_with(GfxConfig::default());
        let s = sprite(&mut gfx);
        gfx.ctx_mut().backend_mut().take_calls();

        gfx.frame_start().unwrap();
        gfx.draw_sprite(&DrawSpriteOpt::new(&s)).unwrap();
        gfx.frame_end().unwrap();

        assert_eq!(gfx.last_draw_calls(), 1);
        // checker + sprite batch + blit
        assert_eq!(gfx.ctx().backend().draw_count(), 3);
    }

    #[test]
    fn frame_draws_target_frame_buffer_and_blit_targets_surface() {
        let mut gfx = gfx_with(solid_bg());
        let fb = gfx.frame_buffer.id();
        gfx.ctx_mut().backend_mut().take_calls();

        gfx.frame_start().unwrap();
        gfx.draw_uv_quad(&DrawUvQuadOpt {
            width: Some(10.0),
            height: Some(10.0),
            ..Default::default()
        })
        .unwrap();
        gfx.frame_end().unwrap();

        let targets: Vec<_> = gfx
            .ctx()
            .backend()
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::DrawElements { framebuffer, .. } => Some(*framebuffer),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec![Some(fb), None]);
        assert_eq!(gfx.ctx().backend().bound_framebuffer(), None);
    }

    #[test]
    fn post_shader_is_used_for_blit() {
        let mut gfx = gfx_with(solid_bg());
        let post = gfx.create_shader(None, None).unwrap();
        gfx.set_post_shader(Some(post), Uniforms::new().with("u_time", 1.0_f32));
        gfx.ctx_mut().backend_mut().take_calls();

        gfx.frame_start().unwrap();
        gfx.frame_end().unwrap();

        let calls = gfx.ctx().backend().calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            Call::DrawElements { program: Some(p), framebuffer: None, .. } if *p == post.id()
        )));
        assert!(calls.iter().any(|c| matches!(c, Call::Uniform { name, .. } if name == "u_time")));
    }

    #[test]
    fn frame_start_resets_transform() {
        let mut gfx = gfx_with(solid_bg());
        gfx.push_transform();
        gfx.push_translate(Vec2::new(4.0, 4.0));
        gfx.frame_start().unwrap();
        assert_eq!(*gfx.transform(), Mat4::identity());
        assert_eq!(gfx.transform.depth(), 0);
    }

    #[test]
    fn failed_draw_leaves_frame_usable() {
        let mut gfx = gfx_with(solid_bg());
        gfx.frame_start().unwrap();
        let err = gfx.draw_uv_quad(&DrawUvQuadOpt::default()).unwrap_err();
        assert!(matches!(err, GfxError::MissingDimension { .. }));
        gfx.frame_end().unwrap();
        assert_eq!(gfx.last_draw_calls(), 0);
    }

    // ── unscaled ──

    #[test]
    fn draw_unscaled_restores_logical_size() {
        let mut gfx = gfx_with(GfxConfig { width: Some(160), height: Some(120), ..solid_bg() });
        assert_eq!((gfx.width(), gfx.height()), (160.0, 120.0));

        let inner = gfx.draw_unscaled(|g| Ok((g.width(), g.height()))).unwrap();
        assert_eq!(inner, (320.0, 240.0));
        assert_eq!((gfx.width(), gfx.height()), (160.0, 120.0));
    }

    // ── resize ──

    #[test]
    fn resize_recreates_frame_buffer_without_fixed_size() {
        let mut gfx = gfx_with(solid_bg());
        let old = gfx.frame_buffer.id();

        gfx.resize(640, 480).unwrap();
        assert_ne!(gfx.frame_buffer.id(), old);
        assert_eq!(gfx.frame_buffer.width(), 640);
        assert_eq!((gfx.width(), gfx.height()), (640.0, 480.0));
        assert_eq!(gfx.viewport(), ViewportRect::full(640, 480));
        assert!(gfx.ctx().backend().calls().contains(&Call::DeleteFramebuffer(old)));
    }

    #[test]
    fn resize_letterboxes_fixed_size() {
        let mut gfx = gfx_with(GfxConfig { width: Some(100), height: Some(100), ..solid_bg() });
        let fb = gfx.frame_buffer.id();

        gfx.resize(300, 200).unwrap();
        assert_eq!(gfx.frame_buffer.id(), fb);
        assert_eq!((gfx.width(), gfx.height()), (100.0, 100.0));
        assert_eq!(gfx.viewport(), ViewportRect::new(50, 0, 200, 200));
    }

    #[test]
    fn zero_resize_is_ignored() {
        let mut gfx = gfx_with(solid_bg());
        gfx.resize(0, 0).unwrap();
        assert_eq!((gfx.width(), gfx.height()), (320.0, 240.0));
    }

    // ── readback ──

    #[test]
    fn screenshot_reads_frame_buffer() {
        let mut gfx = gfx_with(GfxConfig { width: Some(4), height: Some(2), ..solid_bg() });
        let img = gfx.screenshot().unwrap();
        assert_eq!(img.dimensions(), (4, 2));
    }

    #[test]
    fn destroy_tears_down_once() {
        let mut gfx = gfx_with(solid_bg());
        gfx.destroy();
        gfx.destroy();
        let lost = gfx
            .ctx()
            .backend()
            .calls()
            .iter()
            .filter(|c| **c == Call::LoseContext)
            .count();
        assert_eq!(lost, 1);
    }
}

use crate::coords::{Color, Quad, Vec2};
use crate::device::Backend;
use crate::error::{GfxError, Result};
use crate::render::{QUAD_INDICES, Vertex};
use crate::resources::{Shader, Texture, Uniforms};

use super::Gfx;
use super::anchor::Anchor;
use super::sprite::Sprite;

/// Placement and tint shared by every quad draw.
#[derive(Debug, Copy, Clone)]
pub struct RenderProps<'a> {
    pub pos: Vec2,
    pub scale: Vec2,
    /// Degrees, clockwise on screen.
    pub angle: f32,
    pub color: Color,
    pub opacity: f32,
    pub shader: Option<Shader>,
    pub uniforms: Option<&'a Uniforms>,
}

impl Default for RenderProps<'_> {
    fn default() -> Self {
        Self {
            pos: Vec2::zero(),
            scale: Vec2::one(),
            angle: 0.0,
            color: Color::white(),
            opacity: 1.0,
            shader: None,
            uniforms: None,
        }
    }
}

/// One vertex in screen space, before transform and NDC conversion.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RawVertex {
    pub pos: Vec2,
    pub uv: Vec2,
    pub color: Color,
    pub opacity: f32,
}

#[derive(Debug, Clone, Default)]
pub struct DrawUvQuadOpt<'a> {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub tex: Option<&'a Texture>,
    /// UV sub-rectangle of `tex`.
    pub quad: Quad,
    pub anchor: Anchor,
    pub flip_x: bool,
    pub flip_y: bool,
    pub props: RenderProps<'a>,
}

#[derive(Debug, Clone)]
pub struct DrawTextureOpt<'a> {
    pub tex: &'a Texture,
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Repeat the texture to cover `width` x `height` instead of stretching.
    pub tiled: bool,
    pub quad: Quad,
    pub anchor: Anchor,
    pub flip_x: bool,
    pub flip_y: bool,
    pub props: RenderProps<'a>,
}

impl<'a> DrawTextureOpt<'a> {
    pub fn new(tex: &'a Texture) -> Self {
        Self {
            tex,
            width: None,
            height: None,
            tiled: false,
            quad: Quad::full(),
            anchor: Anchor::default(),
            flip_x: false,
            flip_y: false,
            props: RenderProps::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrawSpriteOpt<'a> {
    pub sprite: &'a Sprite,
    pub frame: usize,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub tiled: bool,
    /// Sub-rectangle of the frame, relative to the frame's quad.
    pub quad: Quad,
    pub anchor: Anchor,
    pub flip_x: bool,
    pub flip_y: bool,
    pub props: RenderProps<'a>,
}

impl<'a> DrawSpriteOpt<'a> {
    pub fn new(sprite: &'a Sprite) -> Self {
        Self {
            sprite,
            frame: 0,
            width: None,
            height: None,
            tiled: false,
            quad: Quad::full(),
            anchor: Anchor::default(),
            flip_x: false,
            flip_y: false,
            props: RenderProps::default(),
        }
    }
}

/// Corners of a `w` x `h` quad relative to its anchor point, in
/// [`QUAD_INDICES`] order.
pub(crate) fn quad_corners(w: f32, h: f32, anchor: Anchor) -> [Vec2; 4] {
    let offset = anchor.point().scale(Vec2::new(w, h)) * -0.5;
    let (hw, hh) = (w / 2.0, h / 2.0);
    [
        Vec2::new(-hw, hh) + offset,
        Vec2::new(-hw, -hh) + offset,
        Vec2::new(hw, -hh) + offset,
        Vec2::new(hw, hh) + offset,
    ]
}

#[inline]
fn screen_to_ndc(p: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new(p.x / width * 2.0 - 1.0, -p.y / height * 2.0 + 1.0)
}

impl<B: Backend> Gfx<B> {
    /// Queues triangles given in screen space. The current transform is
    /// applied to every vertex. Defaults to the white texture and the default
    /// shader.
    pub fn draw_raw(
        &mut self,
        vertices: &[RawVertex],
        indices: &[u16],
        tex: Option<&Texture>,
        shader: Option<Shader>,
        uniforms: Option<&Uniforms>,
    ) -> Result<()> {
        let (w, h) = (self.width, self.height);
        let verts: Vec<Vertex> = vertices
            .iter()
            .map(|v| {
                let p = screen_to_ndc(self.transform.apply(v.pos), w, h);
                Vertex::new([p.x, p.y], [v.uv.x, v.uv.y], v.color.with_alpha(v.opacity))
            })
            .collect();

        let empty = Uniforms::new();
        self.renderer.push(
            &mut self.ctx,
            crate::device::Primitive::Triangles,
            &verts,
            indices,
            shader.unwrap_or(self.def_shader),
            Some(tex.unwrap_or(&self.def_tex)),
            uniforms.unwrap_or(&empty),
        )
    }

    /// Draws one textured quad of an explicit size.
    pub fn draw_uv_quad(&mut self, opt: &DrawUvQuadOpt<'_>) -> Result<()> {
        let (Some(w), Some(h)) = (opt.width, opt.height) else {
            return Err(GfxError::MissingDimension { op: "draw_uv_quad" });
        };
        if w <= 0.0 || h <= 0.0 {
            return Ok(());
        }

        let (pad_x, pad_y) = match opt.tex {
            Some(t) if t.width() > 0 && t.height() > 0 => (
                self.uv_pad / t.width() as f32,
                self.uv_pad / t.height() as f32,
            ),
            _ => (0.0, 0.0),
        };
        let q = opt.quad;
        let (qx, qy) = (q.x + pad_x, q.y + pad_y);
        let (qw, qh) = (q.w - pad_x * 2.0, q.h - pad_y * 2.0);

        let (u0, u1) = if opt.flip_x { (qx + qw, qx) } else { (qx, qx + qw) };
        let (v0, v1) = if opt.flip_y { (qy + qh, qy) } else { (qy, qy + qh) };

        let props = &opt.props;
        let corners = quad_corners(w, h, opt.anchor);
        let uvs = [
            Vec2::new(u0, v1),
            Vec2::new(u0, v0),
            Vec2::new(u1, v0),
            Vec2::new(u1, v1),
        ];
        let verts: [RawVertex; 4] = std::array::from_fn(|i| RawVertex {
            pos: corners[i],
            uv: uvs[i],
            color: props.color,
            opacity: props.opacity,
        });

        self.transform.push();
        self.transform.translate(props.pos);
        self.transform.rotate(props.angle);
        self.transform.scale(props.scale);
        let res = self.draw_raw(&verts, &QUAD_INDICES, opt.tex, props.shader, props.uniforms);
        self.transform.pop();
        res
    }

    /// Draws a texture (or a sub-quad of it) stretched or tiled to the
    /// requested size.
    pub fn draw_texture(&mut self, opt: &DrawTextureOpt<'_>) -> Result<()> {
        let q = opt.quad;
        let w = opt.tex.width() as f32 * q.w;
        let h = opt.tex.height() as f32 * q.h;
        if w <= 0.0 || h <= 0.0 {
            return Ok(());
        }

        if opt.tiled {
            let want_w = opt.width.filter(|v| *v > 0.0).unwrap_or(w);
            let want_h = opt.height.filter(|v| *v > 0.0).unwrap_or(h);
            let rep_x = (want_w / w).ceil() as usize;
            let rep_y = (want_h / h).ceil() as usize;

            let anchor = (opt.anchor.point() + Vec2::one()) * 0.5;
            let offset = anchor.scale(Vec2::new(rep_x as f32 * w, rep_y as f32 * h));

            for i in 0..rep_x {
                for j in 0..rep_y {
                    let pos = opt.props.pos + Vec2::new(w * i as f32, h * j as f32) - offset;
                    self.draw_uv_quad(&DrawUvQuadOpt {
                        width: Some(w),
                        height: Some(h),
                        tex: Some(opt.tex),
                        quad: q,
                        anchor: Anchor::TopLeft,
                        flip_x: opt.flip_x,
                        flip_y: opt.flip_y,
                        props: RenderProps { pos, ..opt.props },
                    })?;
                }
            }
            return Ok(());
        }

        let scale = match (opt.width, opt.height) {
            (Some(tw), Some(th)) => Vec2::new(tw / w, th / h),
            (Some(tw), None) => Vec2::splat(tw / w),
            (None, Some(th)) => Vec2::splat(th / h),
            (None, None) => Vec2::one(),
        };

        self.draw_uv_quad(&DrawUvQuadOpt {
            width: Some(w),
            height: Some(h),
            tex: Some(opt.tex),
            quad: q,
            anchor: opt.anchor,
            flip_x: opt.flip_x,
            flip_y: opt.flip_y,
            props: RenderProps {
                scale: scale.scale(opt.props.scale),
                ..opt.props
            },
        })
    }

    /// Draws one frame of a sprite.
    pub fn draw_sprite(&mut self, opt: &DrawSpriteOpt<'_>) -> Result<()> {
        let frame = opt
            .sprite
            .frame(opt.frame)
            .ok_or(GfxError::FrameNotFound { index: opt.frame })?;

        self.draw_texture(&DrawTextureOpt {
            tex: &frame.tex,
            width: opt.width,
            height: opt.height,
            tiled: opt.tiled,
            quad: frame.quad.scale(opt.quad),
            anchor: opt.anchor,
            flip_x: opt.flip_x,
            flip_y: opt.flip_y,
            props: opt.props,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GfxConfig;
    use crate::device::{Call, RecordingBackend};
    use crate::draw::sprite::SpriteFrame;

    fn gfx() -> Gfx<RecordingBackend> {
        let cfg = GfxConfig { atlas_width: 64, atlas_height: 64, ..GfxConfig::default() };
        Gfx::new(RecordingBackend::new(200, 100), cfg).unwrap()
    }

    fn tex(gfx: &mut Gfx<RecordingBackend>, w: u32, h: u32) -> Texture {
        let img = image::RgbaImage::new(w, h);
        Texture::from_image(gfx.ctx_mut(), img, Default::default()).unwrap()
    }

    /// Vertex positions of the last flushed batch.
    fn flushed_positions(gfx: &Gfx<RecordingBackend>) -> Vec<[f32; 2]> {
        let data = gfx
            .ctx()
            .backend()
            .calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::BufferSubData { target: crate::device::BufferTarget::Array, data, .. } => {
                    Some(data.clone())
                }
                _ => None,
            })
            .unwrap();
        bytemuck::pod_collect_to_vec::<u8, Vertex>(data.as_slice())
            .iter()
            .map(|v| v.pos)
            .collect()
    }

    // ── corners ──

    #[test]
    fn center_anchor_corners_are_symmetric() {
        let c = quad_corners(20.0, 10.0, Anchor::Center);
        assert_eq!(c[0], Vec2::new(-10.0, 5.0));
        assert_eq!(c[1], Vec2::new(-10.0, -5.0));
        assert_eq!(c[2], Vec2::new(10.0, -5.0));
        assert_eq!(c[3], Vec2::new(10.0, 5.0));
    }

    #[test]
    fn topleft_anchor_puts_origin_at_corner() {
        let c = quad_corners(20.0, 10.0, Anchor::TopLeft);
        assert_eq!(c[1], Vec2::zero());
        assert_eq!(c[3], Vec2::new(20.0, 10.0));
    }

    // ── uv quads ──

    #[test]
    fn uv_quad_maps_screen_to_ndc() {
        let mut gfx = gfx();
        gfx.draw_uv_quad(&DrawUvQuadOpt {
            width: Some(100.0),
            height: Some(50.0),
            ..Default::default()
        })
        .unwrap();
        gfx.flush().unwrap();

        let pos = flushed_positions(&gfx);
        assert_eq!(pos.len(), 4);
        assert_eq!(pos[1], [-1.0, 1.0]);
        assert_eq!(pos[3], [0.0, 0.0]);
    }

    #[test]
    fn missing_dimension_enqueues_nothing() {
        let mut gfx = gfx();
        let err = gfx
            .draw_uv_quad(&DrawUvQuadOpt { width: Some(10.0), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, GfxError::MissingDimension { op: "draw_uv_quad" }));
        assert_eq!(gfx.renderer().pending_vertices(), 0);
    }

    #[test]
    fn non_positive_size_draws_nothing() {
        let mut gfx = gfx();
        gfx.draw_uv_quad(&DrawUvQuadOpt {
            width: Some(0.0),
            height: Some(10.0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(gfx.renderer().pending_vertices(), 0);
    }

    #[test]
    fn transform_is_balanced_after_draw() {
        let mut gfx = gfx();
        gfx.push_translate(Vec2::new(5.0, 5.0));
        gfx.draw_uv_quad(&DrawUvQuadOpt {
            width: Some(10.0),
            height: Some(10.0),
            props: RenderProps { pos: Vec2::new(3.0, 3.0), angle: 45.0, ..Default::default() },
            ..Default::default()
        })
        .unwrap();
        assert_eq!(gfx.transform.depth(), 0);
        assert_eq!(gfx.transform.apply(Vec2::zero()), Vec2::new(5.0, 5.0));
    }

    // ── textures ──

    #[test]
    fn tiling_covers_area_with_whole_tiles() {
        let mut gfx = gfx();
        let t = tex(&mut gfx, 16, 16);
        gfx.draw_texture(&DrawTextureOpt {
            width: Some(40.0),
            height: Some(20.0),
            tiled: true,
            ..DrawTextureOpt::new(&t)
        })
        .unwrap();
        // ceil(40/16) * ceil(20/16) = 3 * 2 quads, one batch.
        assert_eq!(gfx.renderer().pending_vertices(), 6 * 4);
        assert_eq!(gfx.renderer().pending_indices(), 6 * 6);
    }

    #[test]
    fn single_dimension_scales_uniformly() {
        let mut gfx = gfx();
        let t = tex(&mut gfx, 10, 20);
        gfx.draw_texture(&DrawTextureOpt { width: Some(50.0), ..DrawTextureOpt::new(&t) })
            .unwrap();
        gfx.flush().unwrap();

        // 10x20 scaled 5x -> 50x100 from the top-left corner.
        let pos = flushed_positions(&gfx);
        assert_eq!(pos[1], [-1.0, 1.0]);
        assert_eq!(pos[3], [-0.5, -1.0]);
    }

    // ── sprites ──

    #[test]
    fn missing_frame_is_reported() {
        let mut gfx = gfx();
        let t = tex(&mut gfx, 8, 8);
        let sprite = Sprite {
            frames: vec![SpriteFrame { tex: t, quad: Quad::full() }],
            anims: Default::default(),
        };
        let err = gfx
            .draw_sprite(&DrawSpriteOpt { frame: 3, ..DrawSpriteOpt::new(&sprite) })
            .unwrap_err();
        assert!(matches!(err, GfxError::FrameNotFound { index: 3 }));
        assert_eq!(gfx.renderer().pending_vertices(), 0);
    }
}

use image::{GenericImageView, RgbaImage};

use crate::coords::Quad;
use crate::device::{Backend, GpuCtx};
use crate::error::Result;
use crate::resources::{Texture, TextureOpt};

/// Shelf packer that places images into fixed-size atlas textures.
///
/// Images are placed left to right on the current shelf; a full shelf starts
/// a new one below it, and a full atlas starts a new atlas texture. Placed
/// images never move. Images larger than the atlas get a texture of their
/// own.
pub struct TexPacker {
    textures: Vec<Texture>,
    big_textures: Vec<Texture>,
    canvas: RgbaImage,
    opt: TextureOpt,
    x: u32,
    y: u32,
    cur_height: u32,
}

impl TexPacker {
    pub fn new<B: Backend>(
        ctx: &mut GpuCtx<B>,
        width: u32,
        height: u32,
        opt: TextureOpt,
    ) -> Result<Self> {
        let canvas = RgbaImage::new(width, height);
        let first = new_page(ctx, &canvas, opt)?;
        Ok(Self {
            textures: vec![first],
            big_textures: Vec::new(),
            canvas,
            opt,
            x: 0,
            y: 0,
            cur_height: 0,
        })
    }

    #[inline]
    pub fn atlas_size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// Atlas pages, oldest first. The last one receives new images.
    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    /// Dedicated textures for images larger than the atlas.
    pub fn big_textures(&self) -> &[Texture] {
        &self.big_textures
    }

    /// Packs `img` and returns the texture holding it plus its normalized
    /// UV quad.
    pub fn add<B: Backend>(
        &mut self,
        ctx: &mut GpuCtx<B>,
        img: &RgbaImage,
    ) -> Result<(Texture, Quad)> {
        let (aw, ah) = self.canvas.dimensions();
        let (w, h) = img.dimensions();

        if w > aw || h > ah {
            let tex = Texture::from_image(ctx, img.clone(), self.opt)?;
            log::debug!("image {w}x{h} exceeds {aw}x{ah} atlas; using a dedicated texture");
            self.big_textures.push(tex.clone());
            return Ok((tex, Quad::full()));
        }

        // next shelf
        if self.x + w > aw {
            self.x = 0;
            self.y += self.cur_height;
            self.cur_height = 0;
        }

        // next atlas page
        if self.y + h > ah {
            self.canvas.fill(0);
            let page = new_page(ctx, &self.canvas, self.opt)?;
            self.textures.push(page);
            self.x = 0;
            self.y = 0;
            self.cur_height = 0;
            log::info!("sprite atlas full; started page {}", self.textures.len());
        }

        let (x, y) = (self.x, self.y);
        image::imageops::replace(&mut self.canvas, img, x as i64, y as i64);

        let Some(cur) = self.textures.last() else {
            unreachable!("packer always holds at least one atlas page");
        };
        let region = self.canvas.view(x, y, w, h).to_image();
        cur.update(ctx, &region, x, y)?;

        self.x += w;
        self.cur_height = self.cur_height.max(h);

        Ok((
            cur.clone(),
            Quad::new(
                x as f32 / aw as f32,
                y as f32 / ah as f32,
                w as f32 / aw as f32,
                h as f32 / ah as f32,
            ),
        ))
    }

    /// Releases every atlas page and dedicated texture.
    pub fn free<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        for tex in self.textures.iter().chain(&self.big_textures) {
            tex.free(ctx);
        }
    }
}

fn new_page<B: Backend>(ctx: &mut GpuCtx<B>, canvas: &RgbaImage, opt: TextureOpt) -> Result<Texture> {
    let (w, h) = canvas.dimensions();
    let tex = Texture::new(ctx, w, h, opt)?;
    tex.update(ctx, canvas, 0, 0)?;
    Ok(tex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Call, CtxOptions, RecordingBackend};

    fn ctx() -> GpuCtx<RecordingBackend> {
        GpuCtx::new(RecordingBackend::new(64, 64), CtxOptions::default())
    }

    fn img(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn three_tiles_in_small_atlas() {
        let mut ctx = ctx();
        let mut packer = TexPacker::new(&mut ctx, 32, 32, TextureOpt::default()).unwrap();

        let quads: Vec<Quad> = (0..3)
            .map(|_| packer.add(&mut ctx, &img(16, 16)).unwrap().1)
            .collect();

        assert_eq!(
            quads,
            vec![
                Quad::new(0.0, 0.0, 0.5, 0.5),
                Quad::new(0.5, 0.0, 0.5, 0.5),
                Quad::new(0.0, 0.5, 0.5, 0.5),
            ]
        );
        assert_eq!(packer.textures().len(), 1);
    }

    #[test]
    fn uploads_only_the_placed_region() {
        let mut ctx = ctx();
        let mut packer = TexPacker::new(&mut ctx, 32, 32, TextureOpt::default()).unwrap();
        packer.add(&mut ctx, &img(16, 16)).unwrap();
        ctx.backend_mut().take_calls();

        let (tex, _) = packer.add(&mut ctx, &img(8, 4)).unwrap();
        assert!(ctx.backend().calls().contains(&Call::TexSubImage {
            texture: Some(tex.id()),
            x: 16,
            y: 0,
            width: 8,
            height: 4,
        }));
    }

    #[test]
    fn oversized_image_gets_dedicated_texture() {
        let mut ctx = ctx();
        let mut packer = TexPacker::new(&mut ctx, 32, 32, TextureOpt::default()).unwrap();

        let (tex, quad) = packer.add(&mut ctx, &img(33, 8)).unwrap();
        assert_eq!(quad, Quad::full());
        assert_eq!((tex.width(), tex.height()), (33, 8));
        assert_eq!(packer.big_textures().len(), 1);

        // The shelf cursor is untouched.
        let (_, next) = packer.add(&mut ctx, &img(4, 4)).unwrap();
        assert_eq!((next.x, next.y), (0.0, 0.0));
    }

    #[test]
    fn full_atlas_starts_new_page() {
        let mut ctx = ctx();
        let mut packer = TexPacker::new(&mut ctx, 32, 32, TextureOpt::default()).unwrap();

        let placed: Vec<_> = (0..5)
            .map(|_| packer.add(&mut ctx, &img(16, 16)).unwrap())
            .collect();

        assert_eq!(packer.textures().len(), 2);
        assert_eq!(placed[3].0, packer.textures()[0]);
        assert_eq!(placed[4].0, packer.textures()[1]);
        assert_eq!(placed[4].1, Quad::new(0.0, 0.0, 0.5, 0.5));
    }

    #[test]
    fn packed_rects_are_contained_and_disjoint() {
        let mut ctx = ctx();
        let (aw, ah) = (64u32, 64u32);
        let mut packer = TexPacker::new(&mut ctx, aw, ah, TextureOpt::default()).unwrap();

        // Deterministic LCG for image sizes in 1..=40.
        let mut seed = 0x2545_f491_u32;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) % 40 + 1
        };

        let mut placed: Vec<(Texture, [u32; 4])> = Vec::new();
        for _ in 0..200 {
            let (w, h) = (next(), next());
            let (tex, q) = packer.add(&mut ctx, &img(w, h)).unwrap();

            assert!(q.x >= 0.0 && q.y >= 0.0 && q.x + q.w <= 1.0 && q.y + q.h <= 1.0);

            let rect = [
                (q.x * aw as f32) as u32,
                (q.y * ah as f32) as u32,
                (q.w * aw as f32) as u32,
                (q.h * ah as f32) as u32,
            ];
            assert_eq!((rect[2], rect[3]), (w, h));
            assert!(rect[0] + rect[2] <= aw && rect[1] + rect[3] <= ah);
            placed.push((tex, rect));
        }

        for (i, (ta, a)) in placed.iter().enumerate() {
            for (tb, b) in &placed[i + 1..] {
                if ta != tb {
                    continue;
                }
                let disjoint = a[0] + a[2] <= b[0]
                    || b[0] + b[2] <= a[0]
                    || a[1] + a[3] <= b[1]
                    || b[1] + b[3] <= a[1];
                assert!(disjoint, "{a:?} overlaps {b:?}");
            }
        }
        assert!(packer.textures().len() > 1);
    }

    #[test]
    fn free_releases_pages_and_big_textures() {
        let mut ctx = ctx();
        let mut packer = TexPacker::new(&mut ctx, 16, 16, TextureOpt::default()).unwrap();
        let (big, _) = packer.add(&mut ctx, &img(20, 20)).unwrap();
        ctx.backend_mut().take_calls();

        packer.free(&mut ctx);
        let calls = ctx.backend().calls();
        assert!(calls.contains(&Call::DeleteTexture(packer.textures()[0].id())));
        assert!(calls.contains(&Call::DeleteTexture(big.id())));
    }
}

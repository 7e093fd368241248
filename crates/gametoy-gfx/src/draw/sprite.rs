use std::collections::BTreeMap;
use std::path::Path;

use image::RgbaImage;

use crate::coords::Quad;
use crate::device::Backend;
use crate::error::Result;
use crate::resources::Texture;

use super::Gfx;

/// One drawable frame: a texture and the UV quad inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteFrame {
    pub tex: Texture,
    pub quad: Quad,
}

/// Named animation over a sprite's frames.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SpriteAnim {
    Frame(usize),
    Range {
        from: usize,
        to: usize,
        looping: bool,
        pingpong: bool,
        /// Frames per second; the player's default when unset.
        speed: Option<f32>,
    },
}

impl SpriteAnim {
    pub fn first_frame(&self) -> usize {
        match *self {
            SpriteAnim::Frame(i) => i,
            SpriteAnim::Range { from, .. } => from,
        }
    }

    pub fn last_frame(&self) -> usize {
        match *self {
            SpriteAnim::Frame(i) => i,
            SpriteAnim::Range { to, .. } => to,
        }
    }
}

pub type SpriteAnims = BTreeMap<String, SpriteAnim>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sprite {
    pub frames: Vec<SpriteFrame>,
    pub anims: SpriteAnims,
}

impl Sprite {
    pub fn frame(&self, index: usize) -> Option<&SpriteFrame> {
        self.frames.get(index)
    }

    pub fn anim(&self, name: &str) -> Option<&SpriteAnim> {
        self.anims.get(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// How a loaded image is cut into frames.
///
/// `frames`, when set, lists frame quads relative to the whole image and
/// takes precedence over the `slice_x` x `slice_y` grid.
#[derive(Debug, Clone)]
pub struct LoadSpriteOpt {
    pub slice_x: u32,
    pub slice_y: u32,
    pub frames: Option<Vec<Quad>>,
    pub anims: SpriteAnims,
}

impl Default for LoadSpriteOpt {
    fn default() -> Self {
        Self { slice_x: 1, slice_y: 1, frames: None, anims: SpriteAnims::new() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadSpritesAnimOpt {
    pub anims: SpriteAnims,
}

impl<B: Backend> Gfx<B> {
    /// Decodes an image file and packs it into the sprite atlas.
    pub fn load_sprite(&mut self, path: impl AsRef<Path>, opt: &LoadSpriteOpt) -> Result<Sprite> {
        let path = path.as_ref();
        let img = image::open(path)?.to_rgba8();
        log::debug!("loaded sprite image {}", path.display());
        self.load_sprite_image(&img, opt)
    }

    pub fn load_sprite_image(&mut self, img: &RgbaImage, opt: &LoadSpriteOpt) -> Result<Sprite> {
        let (tex, quad) = self.packer.add(&mut self.ctx, img)?;

        let quads = match &opt.frames {
            Some(frames) => frames.iter().map(|f| quad.scale(*f)).collect(),
            None => quad.slice(opt.slice_x.max(1), opt.slice_y.max(1)),
        };

        Ok(Sprite {
            frames: quads
                .into_iter()
                .map(|quad| SpriteFrame { tex: tex.clone(), quad })
                .collect(),
            anims: opt.anims.clone(),
        })
    }

    /// One frame per image file, in order. Every file is decoded before any
    /// of them is packed.
    pub fn load_sprites_anim<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        opt: &LoadSpritesAnimOpt,
    ) -> Result<Sprite> {
        let imgs = paths
            .iter()
            .map(|p| Ok(image::open(p.as_ref())?.to_rgba8()))
            .collect::<Result<Vec<_>>>()?;
        self.load_sprites_anim_images(&imgs, opt)
    }

    pub fn load_sprites_anim_images(
        &mut self,
        imgs: &[RgbaImage],
        opt: &LoadSpritesAnimOpt,
    ) -> Result<Sprite> {
        let mut frames = Vec::with_capacity(imgs.len());
        for img in imgs {
            let (tex, quad) = self.packer.add(&mut self.ctx, img)?;
            frames.push(SpriteFrame { tex, quad });
        }
        Ok(Sprite { frames, anims: opt.anims.clone() })
    }
}

use std::rc::Rc;

use image::RgbaImage;

use crate::device::{Backend, GpuCtx, Resource, TexFilter, TexWrap, TextureId};
use crate::error::Result;

/// Texture creation options. Unset fields fall back to the context default
/// filter and clamp-to-edge wrapping.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TextureOpt {
    pub filter: Option<TexFilter>,
    pub wrap: Option<TexWrap>,
}

impl TextureOpt {
    pub fn filter(filter: TexFilter) -> Self {
        Self { filter: Some(filter), ..Self::default() }
    }
}

/// Handle to one GPU texture plus its metadata.
///
/// Cloning copies the handle, not the GPU object. Two textures are equal when
/// they refer to the same GPU object.
#[derive(Debug, Clone)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    filter: TexFilter,
    wrap: TexWrap,
    src: Option<Rc<RgbaImage>>,
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Texture {}

impl Texture {
    /// Allocates a `width` x `height` RGBA texture. Storage allocation is
    /// skipped when either dimension is zero.
    pub fn new<B: Backend>(
        ctx: &mut GpuCtx<B>,
        width: u32,
        height: u32,
        opt: TextureOpt,
    ) -> Result<Self> {
        let id = ctx.backend_mut().create_texture()?;
        ctx.track(Resource::Texture(id));

        let filter = opt.filter.unwrap_or(ctx.opts().tex_filter);
        let wrap = opt.wrap.unwrap_or_default();

        ctx.push_texture(id);
        let res = if width > 0 && height > 0 {
            ctx.backend_mut().tex_image(width, height)
        } else {
            Ok(())
        };
        if res.is_ok() {
            ctx.backend_mut().tex_parameters(filter, wrap);
        }
        ctx.pop_texture();
        res?;

        log::debug!("created texture {id:?} {width}x{height} {filter:?}/{wrap:?}");

        Ok(Self { id, width, height, filter, wrap, src: None })
    }

    /// Creates a texture sized to `img` and uploads it, keeping the image as
    /// the texture's source.
    pub fn from_image<B: Backend>(
        ctx: &mut GpuCtx<B>,
        img: impl Into<Rc<RgbaImage>>,
        opt: TextureOpt,
    ) -> Result<Self> {
        let img = img.into();
        let mut tex = Self::new(ctx, img.width(), img.height(), opt)?;
        tex.update(ctx, &img, 0, 0)?;
        tex.src = Some(img);
        Ok(tex)
    }

    /// Uploads `img` into the sub-rectangle starting at `(x, y)`.
    pub fn update<B: Backend>(
        &self,
        ctx: &mut GpuCtx<B>,
        img: &RgbaImage,
        x: u32,
        y: u32,
    ) -> Result<()> {
        self.bind(ctx);
        let res = ctx
            .backend_mut()
            .tex_sub_image(x, y, img.width(), img.height(), img.as_raw());
        self.unbind(ctx);
        res
    }

    #[inline]
    pub fn bind<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.push_texture(self.id);
    }

    #[inline]
    pub fn unbind<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.pop_texture();
    }

    /// Releases the GPU object. Later calls are no-ops.
    pub fn free<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.release(Resource::Texture(self.id));
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn filter(&self) -> TexFilter {
        self.filter
    }

    #[inline]
    pub fn wrap(&self) -> TexWrap {
        self.wrap
    }

    /// CPU-side image the texture was created from, if any.
    pub fn src(&self) -> Option<&RgbaImage> {
        self.src.as_deref()
    }
}

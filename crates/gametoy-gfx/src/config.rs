use crate::coords::Color;
use crate::resources::TexFilter;

/// Sprite atlas page size used when nothing else is configured.
pub const DEFAULT_ATLAS_SIZE: u32 = 2048;

/// Quads per batch before a forced flush.
pub const DEFAULT_MAX_BATCHED_QUADS: usize = 2048;

/// Inset, in texels, applied to UV quads to avoid bleeding at atlas seams.
pub const DEFAULT_UV_PAD: f32 = 0.1;

/// Side of one checkerboard cell drawn when no background color is set.
pub const BG_GRID_SIZE: f32 = 64.0;

/// Configuration for [`crate::draw::Gfx`].
///
/// Keep this structure small; every field maps to an observable behavior of
/// the draw pipeline.
#[derive(Debug, Clone)]
pub struct GfxConfig {
    /// Fixed logical width. When unset, the drawing-buffer width is used and
    /// the offscreen frame follows window resizes.
    pub width: Option<u32>,

    /// Fixed logical height. See `width`.
    pub height: Option<u32>,

    /// Solid clear color. When unset, a checkerboard placeholder is drawn
    /// under every frame.
    pub background: Option<Color>,

    /// Alpha used together with `background`.
    pub background_alpha: f32,

    /// Default filter for textures created without an explicit one.
    pub tex_filter: TexFilter,

    /// Sprite atlas page size in pixels.
    pub atlas_width: u32,
    pub atlas_height: u32,

    /// Batch capacity in quads (4 vertices, 6 indices each).
    pub max_batched_quads: usize,

    /// UV inset in texels.
    pub uv_pad: f32,
}

impl Default for GfxConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            background: None,
            background_alpha: 1.0,
            tex_filter: TexFilter::Nearest,
            atlas_width: DEFAULT_ATLAS_SIZE,
            atlas_height: DEFAULT_ATLAS_SIZE,
            max_batched_quads: DEFAULT_MAX_BATCHED_QUADS,
            uv_pad: DEFAULT_UV_PAD,
        }
    }
}

impl GfxConfig {
    /// Fixed logical size, if both dimensions are configured.
    pub fn fixed_size(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

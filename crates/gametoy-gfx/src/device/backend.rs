use crate::coords::ViewportRect;
use crate::error::{Result, ShaderStage};
use crate::resources::UniformValue;

macro_rules! gpu_id {
    ($($(#[$meta:meta])* $name:ident;)*) => {$(
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a backend-allocated handle.
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    )*};
}

gpu_id! {
    /// Handle to a 2D RGBA texture.
    TextureId;
    /// Handle to a vertex or index buffer.
    BufferId;
    /// Handle to an offscreen render target.
    FramebufferId;
    /// Handle to a depth/stencil attachment.
    RenderbufferId;
    /// Handle to a linked shader program.
    ProgramId;
}

/// Sampling filter applied to both minification and magnification.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TexFilter {
    #[default]
    Nearest,
    Linear,
}

/// Texture addressing mode for both axes.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TexWrap {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Primitive {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

/// Buffer binding point.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    Array,
    Element,
}

/// Update frequency hint for buffer storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

/// Initial buffer contents: either a zeroed allocation or uploaded bytes.
#[derive(Debug, Copy, Clone)]
pub enum BufferData<'a> {
    Size(usize),
    Bytes(&'a [u8]),
}

impl BufferData<'_> {
    pub fn len(&self) -> usize {
        match self {
            BufferData::Size(n) => *n,
            BufferData::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One float vertex attribute; `size` is the component count.
///
/// Attributes are bound to locations positionally.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttrib {
    pub name: &'static str,
    pub size: u32,
}

/// Byte stride of a tightly packed float vertex format.
pub fn vertex_stride(format: &[VertexAttrib]) -> u64 {
    format.iter().map(|a| a.size as u64 * 4).sum()
}

/// Program link failure as reported by a backend.
///
/// `line` is 1-based within the full stage source, before any template
/// correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    pub stage: ShaderStage,
    pub line: Option<u32>,
    pub message: String,
}

/// GL-style GPU command set the rendering core is written against.
///
/// Every object operation acts on whatever is currently bound to the matching
/// binding point. Callers are expected to go through
/// [`GpuCtx`](super::GpuCtx), which pairs each bind with a restore.
pub trait Backend {
    /// Size of the visible surface in physical pixels.
    fn drawing_buffer_size(&self) -> (u32, u32);

    /// Resizes the visible surface.
    fn resize(&mut self, width: u32, height: u32);

    // textures (act on the bound texture)
    fn create_texture(&mut self) -> Result<TextureId>;
    fn tex_image(&mut self, width: u32, height: u32) -> Result<()>;
    fn tex_parameters(&mut self, filter: TexFilter, wrap: TexWrap);
    fn tex_sub_image(&mut self, x: u32, y: u32, width: u32, height: u32, rgba: &[u8]) -> Result<()>;
    fn delete_texture(&mut self, id: TextureId);

    // buffers (act on the buffer bound to `target`)
    fn create_buffer(&mut self) -> Result<BufferId>;
    fn buffer_data(&mut self, target: BufferTarget, data: BufferData<'_>, usage: BufferUsage)
        -> Result<()>;
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: u64, data: &[u8]);
    fn delete_buffer(&mut self, id: BufferId);

    // render targets (act on the bound framebuffer / renderbuffer)
    fn create_framebuffer(&mut self) -> Result<FramebufferId>;
    fn create_renderbuffer(&mut self) -> Result<RenderbufferId>;
    fn renderbuffer_storage(&mut self, width: u32, height: u32) -> Result<()>;
    fn framebuffer_texture(&mut self, texture: TextureId);
    fn framebuffer_renderbuffer(&mut self, renderbuffer: RenderbufferId);
    fn delete_framebuffer(&mut self, id: FramebufferId);
    fn delete_renderbuffer(&mut self, id: RenderbufferId);

    // programs
    fn link_program(
        &mut self,
        vert: &str,
        frag: &str,
        attribs: &'static [VertexAttrib],
    ) -> std::result::Result<ProgramId, LinkError>;
    fn delete_program(&mut self, id: ProgramId);

    /// Sets a uniform on the program in use. Unknown names are ignored.
    fn uniform(&mut self, name: &str, value: &UniformValue) -> Result<()>;

    // binding points; `None` restores the default binding
    fn bind_texture(&mut self, id: Option<TextureId>);
    fn bind_array_buffer(&mut self, id: Option<BufferId>);
    fn bind_element_buffer(&mut self, id: Option<BufferId>);
    fn bind_framebuffer(&mut self, id: Option<FramebufferId>);
    fn bind_renderbuffer(&mut self, id: Option<RenderbufferId>);
    fn use_program(&mut self, id: Option<ProgramId>);
    fn set_viewport(&mut self, rect: ViewportRect);

    /// Describes how the bound array buffer is laid out.
    fn vertex_attrib_layout(&mut self, format: &'static [VertexAttrib]);

    fn set_clear_color(&mut self, rgba: [f32; 4]);

    /// Clears the color of the bound target.
    fn clear(&mut self);

    /// Draws `count` `u16` indices from the bound element buffer.
    fn draw_elements(&mut self, primitive: Primitive, count: u32);

    /// Reads RGBA8 rows from the bound target, bottom row first.
    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>>;

    /// Shows what was drawn to the visible surface.
    fn present(&mut self) {}

    /// Releases the underlying context. Called once by [`GpuCtx::destroy`](super::GpuCtx::destroy).
    fn lose_context(&mut self) {}
}

//! In-memory backend that records every command.
//!
//! Used by the crate's own tests and available to downstream code that wants
//! to assert on draw-call structure without a GPU.

use std::collections::HashMap;

use crate::coords::ViewportRect;
use crate::error::{GfxError, Result};
use crate::resources::{UniformKind, UniformValue};

use super::backend::{
    Backend, BufferData, BufferId, BufferTarget, BufferUsage, FramebufferId, LinkError,
    Primitive, ProgramId, RenderbufferId, TexFilter, TexWrap, TextureId, VertexAttrib,
};

/// One recorded backend command.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTexture(TextureId),
    TexImage { texture: Option<TextureId>, width: u32, height: u32 },
    TexParameters { texture: Option<TextureId>, filter: TexFilter, wrap: TexWrap },
    TexSubImage { texture: Option<TextureId>, x: u32, y: u32, width: u32, height: u32 },
    DeleteTexture(TextureId),

    CreateBuffer(BufferId),
    BufferData { target: BufferTarget, buffer: Option<BufferId>, len: usize, usage: BufferUsage },
    BufferSubData { target: BufferTarget, buffer: Option<BufferId>, offset: u64, data: Vec<u8> },
    DeleteBuffer(BufferId),

    CreateFramebuffer(FramebufferId),
    CreateRenderbuffer(RenderbufferId),
    RenderbufferStorage { width: u32, height: u32 },
    FramebufferTexture(TextureId),
    FramebufferRenderbuffer(RenderbufferId),
    DeleteFramebuffer(FramebufferId),
    DeleteRenderbuffer(RenderbufferId),

    LinkProgram(ProgramId),
    DeleteProgram(ProgramId),
    Uniform { program: Option<ProgramId>, name: String, value: UniformValue },

    BindTexture(Option<TextureId>),
    BindArrayBuffer(Option<BufferId>),
    BindElementBuffer(Option<BufferId>),
    BindFramebuffer(Option<FramebufferId>),
    BindRenderbuffer(Option<RenderbufferId>),
    UseProgram(Option<ProgramId>),
    Viewport(ViewportRect),
    VertexAttribLayout(&'static [VertexAttrib]),

    ClearColor([f32; 4]),
    Clear { framebuffer: Option<FramebufferId> },
    DrawElements {
        primitive: Primitive,
        count: u32,
        texture: Option<TextureId>,
        program: Option<ProgramId>,
        framebuffer: Option<FramebufferId>,
    },
    ReadPixels { x: u32, y: u32, width: u32, height: u32 },

    Present,
    LoseContext,
}

/// Backend that allocates sequential ids and records calls instead of
/// talking to a GPU.
///
/// `read_pixels` returns pixels whose red/green channels hold their `x`/`y`
/// coordinates (bottom row first) unless explicit data was queued with
/// [`set_read_pixels`](Self::set_read_pixels).
#[derive(Debug)]
pub struct RecordingBackend {
    size: (u32, u32),
    next_id: u32,
    calls: Vec<Call>,

    texture: Option<TextureId>,
    array_buffer: Option<BufferId>,
    element_buffer: Option<BufferId>,
    framebuffer: Option<FramebufferId>,
    program: Option<ProgramId>,
    viewport: ViewportRect,

    link_error: Option<LinkError>,
    fail_alloc: bool,
    read_pixels: Option<Vec<u8>>,
    declared_uniforms: HashMap<String, UniformKind>,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            next_id: 1,
            calls: Vec::new(),
            texture: None,
            array_buffer: None,
            element_buffer: None,
            framebuffer: None,
            program: None,
            viewport: ViewportRect::full(width, height),
            link_error: None,
            fail_alloc: false,
            read_pixels: None,
            declared_uniforms: HashMap::new(),
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Drains the recorded calls.
    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    /// Number of recorded `draw_elements` calls.
    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::DrawElements { .. }))
            .count()
    }

    pub fn bound_texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    pub fn bound_program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    /// Makes the next `link_program` fail with `err`.
    pub fn fail_next_link(&mut self, err: LinkError) {
        self.link_error = Some(err);
    }

    /// Makes every subsequent `create_*` call fail.
    pub fn set_fail_alloc(&mut self, fail: bool) {
        self.fail_alloc = fail;
    }

    /// Data returned by the next `read_pixels`.
    pub fn set_read_pixels(&mut self, data: Vec<u8>) {
        self.read_pixels = Some(data);
    }

    /// Declares a uniform so mismatched values are rejected like a real
    /// program would.
    pub fn declare_uniform(&mut self, name: impl Into<String>, kind: UniformKind) {
        self.declared_uniforms.insert(name.into(), kind);
    }

    fn alloc(&mut self, kind: &'static str) -> Result<u32> {
        if self.fail_alloc {
            return Err(GfxError::ResourceAllocation { kind });
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }
}

impl Backend for RecordingBackend {
    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn create_texture(&mut self) -> Result<TextureId> {
        let id = TextureId::from_raw(self.alloc("texture")?);
        self.calls.push(Call::CreateTexture(id));
        Ok(id)
    }

    fn tex_image(&mut self, width: u32, height: u32) -> Result<()> {
        self.calls.push(Call::TexImage { texture: self.texture, width, height });
        Ok(())
    }

    fn tex_parameters(&mut self, filter: TexFilter, wrap: TexWrap) {
        self.calls.push(Call::TexParameters { texture: self.texture, filter, wrap });
    }

    fn tex_sub_image(&mut self, x: u32, y: u32, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        self.calls.push(Call::TexSubImage { texture: self.texture, x, y, width, height });
        Ok(())
    }

    fn delete_texture(&mut self, id: TextureId) {
        self.calls.push(Call::DeleteTexture(id));
    }

    fn create_buffer(&mut self) -> Result<BufferId> {
        let id = BufferId::from_raw(self.alloc("buffer")?);
        self.calls.push(Call::CreateBuffer(id));
        Ok(id)
    }

    fn buffer_data(
        &mut self,
        target: BufferTarget,
        data: BufferData<'_>,
        usage: BufferUsage,
    ) -> Result<()> {
        let buffer = match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::Element => self.element_buffer,
        };
        self.calls.push(Call::BufferData { target, buffer, len: data.len(), usage });
        Ok(())
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: u64, data: &[u8]) {
        let buffer = match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::Element => self.element_buffer,
        };
        self.calls.push(Call::BufferSubData { target, buffer, offset, data: data.to_vec() });
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.calls.push(Call::DeleteBuffer(id));
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId> {
        let id = FramebufferId::from_raw(self.alloc("framebuffer")?);
        self.calls.push(Call::CreateFramebuffer(id));
        Ok(id)
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId> {
        let id = RenderbufferId::from_raw(self.alloc("renderbuffer")?);
        self.calls.push(Call::CreateRenderbuffer(id));
        Ok(id)
    }

    fn renderbuffer_storage(&mut self, width: u32, height: u32) -> Result<()> {
        self.calls.push(Call::RenderbufferStorage { width, height });
        Ok(())
    }

    fn framebuffer_texture(&mut self, texture: TextureId) {
        self.calls.push(Call::FramebufferTexture(texture));
    }

    fn framebuffer_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.calls.push(Call::FramebufferRenderbuffer(renderbuffer));
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        self.calls.push(Call::DeleteFramebuffer(id));
    }

    fn delete_renderbuffer(&mut self, id: RenderbufferId) {
        self.calls.push(Call::DeleteRenderbuffer(id));
    }

    fn link_program(
        &mut self,
        _vert: &str,
        _frag: &str,
        _attribs: &'static [VertexAttrib],
    ) -> std::result::Result<ProgramId, LinkError> {
        if let Some(err) = self.link_error.take() {
            return Err(err);
        }
        let raw = self.alloc("program").map_err(|e| LinkError {
            stage: crate::error::ShaderStage::Vertex,
            line: None,
            message: e.to_string(),
        })?;
        let id = ProgramId::from_raw(raw);
        self.calls.push(Call::LinkProgram(id));
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.calls.push(Call::DeleteProgram(id));
    }

    fn uniform(&mut self, name: &str, value: &UniformValue) -> Result<()> {
        if let Some(kind) = self.declared_uniforms.get(name) {
            if *kind != value.kind() {
                return Err(GfxError::UnsupportedUniformType { name: name.to_string() });
            }
        }
        self.calls.push(Call::Uniform {
            program: self.program,
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn bind_texture(&mut self, id: Option<TextureId>) {
        self.texture = id;
        self.calls.push(Call::BindTexture(id));
    }

    fn bind_array_buffer(&mut self, id: Option<BufferId>) {
        self.array_buffer = id;
        self.calls.push(Call::BindArrayBuffer(id));
    }

    fn bind_element_buffer(&mut self, id: Option<BufferId>) {
        self.element_buffer = id;
        self.calls.push(Call::BindElementBuffer(id));
    }

    fn bind_framebuffer(&mut self, id: Option<FramebufferId>) {
        self.framebuffer = id;
        self.calls.push(Call::BindFramebuffer(id));
    }

    fn bind_renderbuffer(&mut self, id: Option<RenderbufferId>) {
        self.calls.push(Call::BindRenderbuffer(id));
    }

    fn use_program(&mut self, id: Option<ProgramId>) {
        self.program = id;
        self.calls.push(Call::UseProgram(id));
    }

    fn set_viewport(&mut self, rect: ViewportRect) {
        self.viewport = rect;
        self.calls.push(Call::Viewport(rect));
    }

    fn vertex_attrib_layout(&mut self, format: &'static [VertexAttrib]) {
        self.calls.push(Call::VertexAttribLayout(format));
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.calls.push(Call::ClearColor(rgba));
    }

    fn clear(&mut self) {
        self.calls.push(Call::Clear { framebuffer: self.framebuffer });
    }

    fn draw_elements(&mut self, primitive: Primitive, count: u32) {
        self.calls.push(Call::DrawElements {
            primitive,
            count,
            texture: self.texture,
            program: self.program,
            framebuffer: self.framebuffer,
        });
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        self.calls.push(Call::ReadPixels { x, y, width, height });
        if let Some(data) = self.read_pixels.take() {
            return Ok(data);
        }
        let mut out = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            for col in 0..width {
                out.extend_from_slice(&[(x + col) as u8, (y + row) as u8, 0, 255]);
            }
        }
        Ok(out)
    }

    fn present(&mut self) {
        self.calls.push(Call::Present);
    }

    fn lose_context(&mut self) {
        self.calls.push(Call::LoseContext);
    }
}

use crate::device::{
    Backend, BufferData, BufferId, BufferTarget, BufferUsage, GpuCtx, Primitive, Resource,
    TextureId,
};
use crate::error::Result;
use crate::resources::{Shader, Texture, Uniforms};

use super::vertex::{Vertex, VERTEX_FORMAT};

// Indices are u16.
const MAX_ADDRESSABLE_VERTICES: usize = u16::MAX as usize + 1;

/// Render state shared by every vertex in the pending batch.
#[derive(Debug, Clone, PartialEq)]
struct BatchKey {
    primitive: Primitive,
    texture: Option<TextureId>,
    shader: Shader,
    uniforms: Uniforms,
}

impl BatchKey {
    fn matches(
        &self,
        primitive: Primitive,
        texture: Option<TextureId>,
        shader: Shader,
        uniforms: &Uniforms,
    ) -> bool {
        self.primitive == primitive
            && self.texture == texture
            && self.shader == shader
            && self.uniforms == *uniforms
    }
}

/// Accumulates vertices for consecutive submissions that share render state
/// and issues one draw call per run.
///
/// GPU buffers are sized to capacity up front and refreshed with sub-range
/// uploads on every flush.
pub struct BatchRenderer {
    vbuf: BufferId,
    ibuf: BufferId,

    max_vertices: usize,
    max_indices: usize,

    vqueue: Vec<Vertex>,
    iqueue: Vec<u16>,
    key: Option<BatchKey>,

    num_draws: usize,
}

impl BatchRenderer {
    pub fn new<B: Backend>(
        ctx: &mut GpuCtx<B>,
        max_vertices: usize,
        max_indices: usize,
    ) -> Result<Self> {
        let max_vertices = if max_vertices > MAX_ADDRESSABLE_VERTICES {
            log::warn!(
                "batch capacity of {max_vertices} vertices exceeds u16 indexing; clamped to {MAX_ADDRESSABLE_VERTICES}"
            );
            MAX_ADDRESSABLE_VERTICES
        } else {
            max_vertices
        };

        let vbuf = ctx.backend_mut().create_buffer()?;
        ctx.track(Resource::Buffer(vbuf));
        ctx.push_array_buffer(vbuf);
        let res = ctx.backend_mut().buffer_data(
            BufferTarget::Array,
            BufferData::Size(max_vertices * std::mem::size_of::<Vertex>()),
            BufferUsage::Dynamic,
        );
        ctx.pop_array_buffer();
        res?;

        let ibuf = ctx.backend_mut().create_buffer()?;
        ctx.track(Resource::Buffer(ibuf));
        ctx.push_element_buffer(ibuf);
        let res = ctx.backend_mut().buffer_data(
            BufferTarget::Element,
            BufferData::Size(max_indices * std::mem::size_of::<u16>()),
            BufferUsage::Dynamic,
        );
        ctx.pop_element_buffer();
        res?;

        Ok(Self {
            vbuf,
            ibuf,
            max_vertices,
            max_indices,
            vqueue: Vec::with_capacity(max_vertices),
            iqueue: Vec::with_capacity(max_indices),
            key: None,
            num_draws: 0,
        })
    }

    /// Queues one submission. `indices` are relative to `vertices`.
    ///
    /// Flushes first if the render state differs from the pending batch or
    /// if the submission would overflow capacity.
    #[allow(clippy::too_many_arguments)]
    pub fn push<B: Backend>(
        &mut self,
        ctx: &mut GpuCtx<B>,
        primitive: Primitive,
        vertices: &[Vertex],
        indices: &[u16],
        shader: Shader,
        texture: Option<&Texture>,
        uniforms: &Uniforms,
    ) -> Result<()> {
        if vertices.len() > self.max_vertices || indices.len() > self.max_indices {
            log::warn!(
                "dropping submission of {} vertices / {} indices: larger than batch capacity",
                vertices.len(),
                indices.len()
            );
            return Ok(());
        }

        let texture = texture.map(Texture::id);
        let same_state = self
            .key
            .as_ref()
            .is_some_and(|k| k.matches(primitive, texture, shader, uniforms));
        let overflow = self.vqueue.len() + vertices.len() > self.max_vertices
            || self.iqueue.len() + indices.len() > self.max_indices;

        if !same_state || overflow {
            self.flush(ctx)?;
        }

        let base = self.vqueue.len() as u16;
        self.vqueue.extend_from_slice(vertices);
        self.iqueue.extend(indices.iter().map(|i| i + base));

        if !same_state {
            self.key = Some(BatchKey {
                primitive,
                texture,
                shader,
                uniforms: uniforms.clone(),
            });
        }
        Ok(())
    }

    /// Uploads the queued data and issues one draw call. No-op when nothing
    /// is queued.
    ///
    /// Bindings are restored and the queues cleared even if sending the
    /// uniforms fails.
    pub fn flush<B: Backend>(&mut self, ctx: &mut GpuCtx<B>) -> Result<()> {
        let Some(key) = self.key.as_ref() else {
            return Ok(());
        };
        if self.vqueue.is_empty() || self.iqueue.is_empty() {
            return Ok(());
        }

        ctx.push_array_buffer(self.vbuf);
        ctx.backend_mut()
            .buffer_sub_data(BufferTarget::Array, 0, bytemuck::cast_slice(&self.vqueue));
        ctx.push_element_buffer(self.ibuf);
        ctx.backend_mut()
            .buffer_sub_data(BufferTarget::Element, 0, bytemuck::cast_slice(&self.iqueue));
        ctx.set_vertex_format(VERTEX_FORMAT);

        key.shader.bind(ctx);
        let sent = key.shader.send(ctx, &key.uniforms);
        if sent.is_ok() {
            if let Some(tex) = key.texture {
                ctx.push_texture(tex);
            }
            ctx.backend_mut()
                .draw_elements(key.primitive, self.iqueue.len() as u32);
            if key.texture.is_some() {
                ctx.pop_texture();
            }
        }
        key.shader.unbind(ctx);

        ctx.pop_array_buffer();
        ctx.pop_element_buffer();

        self.vqueue.clear();
        self.iqueue.clear();

        sent?;
        self.num_draws += 1;
        Ok(())
    }

    /// Draw calls issued since the last [`reset_draws`](Self::reset_draws).
    #[inline]
    pub fn num_draws(&self) -> usize {
        self.num_draws
    }

    #[inline]
    pub fn reset_draws(&mut self) {
        self.num_draws = 0;
    }

    #[inline]
    pub fn pending_vertices(&self) -> usize {
        self.vqueue.len()
    }

    #[inline]
    pub fn pending_indices(&self) -> usize {
        self.iqueue.len()
    }

    pub fn free<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.release(Resource::Buffer(self.vbuf));
        ctx.release(Resource::Buffer(self.ibuf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Call, CtxOptions, RecordingBackend};
    use crate::error::GfxError;
    use crate::render::QUAD_INDICES;
    use crate::resources::{TextureOpt, UniformKind};

    struct Fixture {
        ctx: GpuCtx<RecordingBackend>,
        renderer: BatchRenderer,
        shader: Shader,
    }

    fn fixture(max_quads: usize) -> Fixture {
        let mut ctx = GpuCtx::new(RecordingBackend::new(64, 64), CtxOptions::default());
        let renderer = BatchRenderer::new(&mut ctx, max_quads * 4, max_quads * 6).unwrap();
        let shader = Shader::new(&mut ctx, None, None).unwrap();
        Fixture { ctx, renderer, shader }
    }

    fn quad() -> [Vertex; 4] {
        [Vertex::default(); 4]
    }

    fn tex(ctx: &mut GpuCtx<RecordingBackend>) -> Texture {
        Texture::new(ctx, 4, 4, TextureOpt::default()).unwrap()
    }

    impl Fixture {
        fn push(&mut self, texture: Option<&Texture>, uniforms: &Uniforms) -> Result<()> {
            self.renderer.push(
                &mut self.ctx,
                Primitive::Triangles,
                &quad(),
                &QUAD_INDICES,
                self.shader,
                texture,
                uniforms,
            )
        }
    }

    #[test]
    fn identical_state_coalesces_into_one_draw() {
        let mut f = fixture(64);
        let t = tex(&mut f.ctx);
        for _ in 0..10 {
            f.push(Some(&t), &Uniforms::new()).unwrap();
        }
        f.renderer.flush(&mut f.ctx).unwrap();

        assert_eq!(f.renderer.num_draws(), 1);
        assert_eq!(f.ctx.backend().draw_count(), 1);
    }

    #[test]
    fn texture_change_splits_batches() {
        let mut f = fixture(64);
        let textures: Vec<_> = (0..5).map(|_| tex(&mut f.ctx)).collect();
        for t in &textures {
            f.push(Some(t), &Uniforms::new()).unwrap();
        }
        f.renderer.flush(&mut f.ctx).unwrap();

        assert_eq!(f.renderer.num_draws(), 5);
    }

    #[test]
    fn uniform_change_splits_batches() {
        let mut f = fixture(64);
        let a = Uniforms::new().with("u_time", 1.0_f32);
        let b = Uniforms::new().with("u_time", 2.0_f32);
        f.push(None, &a).unwrap();
        f.push(None, &a.clone()).unwrap();
        f.push(None, &b).unwrap();
        f.renderer.flush(&mut f.ctx).unwrap();

        assert_eq!(f.renderer.num_draws(), 2);
    }

    #[test]
    fn capacity_overflow_forces_exactly_one_flush() {
        let mut f = fixture(2);
        f.push(None, &Uniforms::new()).unwrap();
        f.push(None, &Uniforms::new()).unwrap();
        assert_eq!(f.renderer.num_draws(), 0);

        f.push(None, &Uniforms::new()).unwrap();
        assert_eq!(f.renderer.num_draws(), 1);
        assert_eq!(f.renderer.pending_vertices(), 4);
    }

    #[test]
    fn indices_are_offset_by_queued_vertices() {
        let mut f = fixture(8);
        f.push(None, &Uniforms::new()).unwrap();
        f.push(None, &Uniforms::new()).unwrap();
        f.ctx.backend_mut().take_calls();
        f.renderer.flush(&mut f.ctx).unwrap();

        let uploaded = f.ctx.backend().calls().iter().find_map(|c| match c {
            Call::BufferSubData { target: BufferTarget::Element, data, .. } => Some(data.clone()),
            _ => None,
        });
        let data = uploaded.unwrap();
        let indices: Vec<u16> = bytemuck::pod_collect_to_vec(data.as_slice());
        assert_eq!(indices, vec![0, 1, 3, 1, 2, 3, 4, 5, 7, 5, 6, 7]);
    }

    #[test]
    fn flush_restores_bindings() {
        let mut f = fixture(8);
        let t = tex(&mut f.ctx);
        f.push(Some(&t), &Uniforms::new()).unwrap();
        f.renderer.flush(&mut f.ctx).unwrap();

        let draw = f.ctx.backend().calls().iter().find_map(|c| match c {
            Call::DrawElements { texture, program, count, .. } => Some((*texture, *program, *count)),
            _ => None,
        });
        assert_eq!(draw, Some((Some(t.id()), Some(f.shader.id()), 6)));
        assert_eq!(f.ctx.backend().bound_texture(), None);
        assert_eq!(f.ctx.backend().bound_program(), None);
        assert_eq!(f.ctx.current_array_buffer(), None);
    }

    #[test]
    fn empty_flush_is_noop() {
        let mut f = fixture(8);
        f.ctx.backend_mut().take_calls();
        f.renderer.flush(&mut f.ctx).unwrap();
        assert!(f.ctx.backend().calls().is_empty());
        assert_eq!(f.renderer.num_draws(), 0);
    }

    #[test]
    fn oversized_submission_is_dropped() {
        let mut f = fixture(1);
        let verts = [Vertex::default(); 8];
        f.renderer
            .push(
                &mut f.ctx,
                Primitive::Triangles,
                &verts,
                &[0, 1, 2],
                f.shader,
                None,
                &Uniforms::new(),
            )
            .unwrap();
        assert_eq!(f.renderer.pending_vertices(), 0);
    }

    #[test]
    fn failed_uniform_send_still_clears_and_unbinds() {
        let mut f = fixture(8);
        f.ctx.backend_mut().declare_uniform("u_time", UniformKind::Scalar);
        let bad = Uniforms::new().with("u_time", crate::coords::Color::white());
        f.push(None, &bad).unwrap();

        let err = f.renderer.flush(&mut f.ctx).unwrap_err();
        assert!(matches!(err, GfxError::UnsupportedUniformType { .. }));
        assert_eq!(f.renderer.pending_vertices(), 0);
        assert_eq!(f.renderer.num_draws(), 0);
        assert_eq!(f.ctx.backend().bound_program(), None);
    }
}

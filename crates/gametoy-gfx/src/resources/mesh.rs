use crate::device::{
    Backend, BufferData, BufferId, BufferTarget, BufferUsage, GpuCtx, Primitive, Resource,
    VertexAttrib,
};
use crate::error::Result;

/// Upload-once vertex/index buffer pair for a fixed shape.
#[derive(Debug, Clone)]
pub struct Mesh {
    vbuf: BufferId,
    ibuf: BufferId,
    format: &'static [VertexAttrib],
    count: u32,
}

impl Mesh {
    pub fn new<B: Backend>(
        ctx: &mut GpuCtx<B>,
        format: &'static [VertexAttrib],
        vertices: &[f32],
        indices: &[u16],
    ) -> Result<Self> {
        let vbuf = ctx.backend_mut().create_buffer()?;
        ctx.track(Resource::Buffer(vbuf));
        ctx.push_array_buffer(vbuf);
        let res = ctx.backend_mut().buffer_data(
            BufferTarget::Array,
            BufferData::Bytes(bytemuck::cast_slice(vertices)),
            BufferUsage::Static,
        );
        ctx.pop_array_buffer();
        res?;

        let ibuf = ctx.backend_mut().create_buffer()?;
        ctx.track(Resource::Buffer(ibuf));
        ctx.push_element_buffer(ibuf);
        let res = ctx.backend_mut().buffer_data(
            BufferTarget::Element,
            BufferData::Bytes(bytemuck::cast_slice(indices)),
            BufferUsage::Static,
        );
        ctx.pop_element_buffer();
        res?;

        Ok(Self { vbuf, ibuf, format, count: indices.len() as u32 })
    }

    /// Issues one indexed draw with whatever program and texture are bound.
    pub fn draw<B: Backend>(&self, ctx: &mut GpuCtx<B>, primitive: Primitive) {
        ctx.push_array_buffer(self.vbuf);
        ctx.push_element_buffer(self.ibuf);
        ctx.set_vertex_format(self.format);
        ctx.backend_mut().draw_elements(primitive, self.count);
        ctx.pop_array_buffer();
        ctx.pop_element_buffer();
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.count
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
    use crate::render::VERTEX_FORMAT;

    #[test]
    fn draw_is_one_indexed_call() {
        let mut ctx = GpuCtx::new(RecordingBackend::new(10, 10), CtxOptions::default());
        let verts = [0.0f32; 8 * 3];
        let mesh = Mesh::new(&mut ctx, VERTEX_FORMAT, &verts, &[0, 1, 2]).unwrap();

        ctx.backend_mut().take_calls();
        mesh.draw(&mut ctx, Primitive::Triangles);

        assert_eq!(ctx.backend().draw_count(), 1);
        assert!(ctx.backend().calls().iter().any(|c| matches!(
            c,
            Call::DrawElements { primitive: Primitive::Triangles, count: 3, .. }
        )));
        assert_eq!(ctx.current_array_buffer(), None);
    }
}

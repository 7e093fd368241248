use std::collections::HashSet;

use crate::coords::ViewportRect;

use super::backend::{
    Backend, BufferId, FramebufferId, ProgramId, RenderbufferId, TexFilter, TextureId,
    VertexAttrib,
};
use super::stack::BindStack;

/// Context-wide defaults for resources created through it.
#[derive(Debug, Copy, Clone, Default)]
pub struct CtxOptions {
    pub tex_filter: TexFilter,
}

/// A GPU object owned by the context's teardown list.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Resource {
    Texture(TextureId),
    Buffer(BufferId),
    Framebuffer(FramebufferId),
    Renderbuffer(RenderbufferId),
    Program(ProgramId),
}

enum Teardown<B> {
    Resource(Resource),
    Callback(Box<dyn FnOnce(&mut B)>),
}

/// Owns the backend, the teardown list and one bind stack per binding point.
///
/// Every `push_*` binds and remembers the previous binding; the matching
/// `pop_*` restores it. Each call issues exactly one backend bind.
pub struct GpuCtx<B: Backend> {
    backend: B,
    opts: CtxOptions,

    textures: BindStack<TextureId>,
    array_buffers: BindStack<BufferId>,
    element_buffers: BindStack<BufferId>,
    framebuffers: BindStack<FramebufferId>,
    renderbuffers: BindStack<RenderbufferId>,
    programs: BindStack<ProgramId>,
    viewports: BindStack<ViewportRect>,

    vertex_format: Option<&'static [VertexAttrib]>,

    teardown: Vec<Teardown<B>>,
    released: HashSet<Resource>,
    destroyed: bool,
}

macro_rules! bind_stack_ops {
    ($($push:ident, $pop:ident, $current:ident: $field:ident, $id:ty => $bind:ident;)*) => {$(
        pub fn $push(&mut self, id: $id) {
            self.$field.push(id);
            self.backend.$bind(Some(id));
        }

        pub fn $pop(&mut self) {
            let top = self.$field.pop();
            self.backend.$bind(top);
        }

        #[inline]
        pub fn $current(&self) -> Option<$id> {
            self.$field.top()
        }
    )*};
}

impl<B: Backend> GpuCtx<B> {
    /// Wraps `backend` and applies the full-surface viewport.
    pub fn new(backend: B, opts: CtxOptions) -> Self {
        let (w, h) = backend.drawing_buffer_size();
        let mut ctx = Self {
            backend,
            opts,
            textures: BindStack::new(),
            array_buffers: BindStack::new(),
            element_buffers: BindStack::new(),
            framebuffers: BindStack::new(),
            renderbuffers: BindStack::new(),
            programs: BindStack::new(),
            viewports: BindStack::new(),
            vertex_format: None,
            teardown: Vec::new(),
            released: HashSet::new(),
            destroyed: false,
        };
        ctx.push_viewport(ViewportRect::full(w, h));
        ctx
    }

    #[inline]
    pub fn opts(&self) -> CtxOptions {
        self.opts
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        self.backend.drawing_buffer_size()
    }

    bind_stack_ops! {
        push_texture, pop_texture, current_texture: textures, TextureId => bind_texture;
        push_array_buffer, pop_array_buffer, current_array_buffer: array_buffers, BufferId => bind_array_buffer;
        push_element_buffer, pop_element_buffer, current_element_buffer: element_buffers, BufferId => bind_element_buffer;
        push_framebuffer, pop_framebuffer, current_framebuffer: framebuffers, FramebufferId => bind_framebuffer;
        push_renderbuffer, pop_renderbuffer, current_renderbuffer: renderbuffers, RenderbufferId => bind_renderbuffer;
        push_program, pop_program, current_program: programs, ProgramId => use_program;
    }

    pub fn push_viewport(&mut self, rect: ViewportRect) {
        self.viewports.push(rect);
        self.backend.set_viewport(rect);
    }

    /// Restores the previous viewport. The full-surface base entry is never
    /// removed.
    pub fn pop_viewport(&mut self) {
        if self.viewports.len() > 1 {
            self.viewports.pop();
        }
        let rect = self.current_viewport();
        self.backend.set_viewport(rect);
    }

    pub fn current_viewport(&self) -> ViewportRect {
        self.viewports.top().unwrap_or_else(|| {
            let (w, h) = self.backend.drawing_buffer_size();
            ViewportRect::full(w, h)
        })
    }

    /// Replaces the base viewport entry, e.g. after the surface was resized.
    pub fn set_default_viewport(&mut self, rect: ViewportRect) {
        self.viewports.set_base(rect);
        if self.viewports.len() == 1 {
            self.backend.set_viewport(rect);
        }
    }

    /// Re-issues the viewport at the top of the stack.
    pub fn apply_viewport(&mut self) {
        let rect = self.current_viewport();
        self.backend.set_viewport(rect);
    }

    /// Describes the bound array buffer layout, skipping the call when the
    /// format matches the last one applied.
    pub fn set_vertex_format(&mut self, format: &'static [VertexAttrib]) {
        if self.vertex_format == Some(format) {
            return;
        }
        self.vertex_format = Some(format);
        self.backend.vertex_attrib_layout(format);
    }

    /// Registers a GPU object for release on [`destroy`](Self::destroy).
    pub fn track(&mut self, resource: Resource) {
        self.teardown.push(Teardown::Resource(resource));
    }

    /// Registers an arbitrary cleanup action, run once on destroy.
    pub fn on_destroy(&mut self, f: impl FnOnce(&mut B) + 'static) {
        self.teardown.push(Teardown::Callback(Box::new(f)));
    }

    /// Deletes a GPU object. Releasing the same object twice is a no-op.
    pub fn release(&mut self, resource: Resource) {
        if !self.released.insert(resource) {
            return;
        }
        log::debug!("releasing {resource:?}");
        match resource {
            Resource::Texture(id) => self.backend.delete_texture(id),
            Resource::Buffer(id) => self.backend.delete_buffer(id),
            Resource::Framebuffer(id) => self.backend.delete_framebuffer(id),
            Resource::Renderbuffer(id) => self.backend.delete_renderbuffer(id),
            Resource::Program(id) => self.backend.delete_program(id),
        }
    }

    #[inline]
    pub fn is_released(&self, resource: Resource) -> bool {
        self.released.contains(&resource)
    }

    /// Runs the teardown list in registration order, then loses the context.
    ///
    /// Idempotent; also runs on drop.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let entries = std::mem::take(&mut self.teardown);
        log::debug!("destroying GPU context ({} teardown entries)", entries.len());
        for entry in entries {
            match entry {
                Teardown::Resource(r) => self.release(r),
                Teardown::Callback(f) => f(&mut self.backend),
            }
        }

        self.backend.lose_context();
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl<B: Backend> Drop for GpuCtx<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Call, RecordingBackend};

    fn ctx() -> GpuCtx<RecordingBackend> {
        GpuCtx::new(RecordingBackend::new(320, 240), CtxOptions::default())
    }

    #[test]
    fn push_pop_restores_previous_binding() {
        let mut ctx = ctx();
        let a = TextureId::from_raw(1);
        let b = TextureId::from_raw(2);

        ctx.push_texture(a);
        ctx.push_texture(b);
        assert_eq!(ctx.backend().bound_texture(), Some(b));
        ctx.pop_texture();
        assert_eq!(ctx.backend().bound_texture(), Some(a));
        ctx.pop_texture();
        assert_eq!(ctx.backend().bound_texture(), None);
    }

    #[test]
    fn each_push_and_pop_issues_one_bind() {
        let mut ctx = ctx();
        ctx.backend_mut().take_calls();

        ctx.push_program(ProgramId::from_raw(4));
        ctx.pop_program();

        assert_eq!(
            ctx.backend_mut().take_calls(),
            vec![
                Call::UseProgram(Some(ProgramId::from_raw(4))),
                Call::UseProgram(None)
            ]
        );
    }

    #[test]
    fn viewport_base_survives_extra_pops() {
        let mut ctx = ctx();
        ctx.push_viewport(ViewportRect::full(16, 16));
        ctx.pop_viewport();
        ctx.pop_viewport();
        assert_eq!(ctx.current_viewport(), ViewportRect::full(320, 240));
        assert_eq!(ctx.backend().viewport(), ViewportRect::full(320, 240));
    }

    #[test]
    fn default_viewport_replaced_under_pushed_entry() {
        let mut ctx = ctx();
        ctx.push_viewport(ViewportRect::full(16, 16));
        ctx.set_default_viewport(ViewportRect::full(800, 600));
        assert_eq!(ctx.backend().viewport(), ViewportRect::full(16, 16));
        ctx.pop_viewport();
        assert_eq!(ctx.backend().viewport(), ViewportRect::full(800, 600));
    }

    #[test]
    fn redundant_vertex_format_is_filtered() {
        static FMT_A: [VertexAttrib; 1] = [VertexAttrib { name: "a_pos", size: 2 }];
        static FMT_B: [VertexAttrib; 1] = [VertexAttrib { name: "a_pos", size: 3 }];

        let mut ctx = ctx();
        ctx.backend_mut().take_calls();
        ctx.set_vertex_format(&FMT_A);
        ctx.set_vertex_format(&FMT_A);
        ctx.set_vertex_format(&FMT_B);

        let layouts = ctx
            .backend_mut()
            .take_calls()
            .into_iter()
            .filter(|c| matches!(c, Call::VertexAttribLayout(_)))
            .count();
        assert_eq!(layouts, 2);
    }

    #[test]
    fn destroy_runs_teardown_in_order_once() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut ctx = ctx();
        let order = Rc::new(RefCell::new(Vec::new()));

        let tex = ctx.backend_mut().create_texture().unwrap();
        ctx.track(Resource::Texture(tex));
        let o = order.clone();
        ctx.on_destroy(move |_| o.borrow_mut().push("callback"));
        let buf = ctx.backend_mut().create_buffer().unwrap();
        ctx.track(Resource::Buffer(buf));

        ctx.backend_mut().take_calls();
        ctx.destroy();
        ctx.destroy();

        assert_eq!(*order.borrow(), vec!["callback"]);
        assert_eq!(
            ctx.backend_mut().take_calls(),
            vec![Call::DeleteTexture(tex), Call::DeleteBuffer(buf), Call::LoseContext]
        );
    }

    #[test]
    fn release_is_at_most_once() {
        let mut ctx = ctx();
        let tex = ctx.backend_mut().create_texture().unwrap();
        ctx.track(Resource::Texture(tex));

        ctx.release(Resource::Texture(tex));
        ctx.release(Resource::Texture(tex));
        ctx.destroy();

        let deletes = ctx
            .backend()
            .calls()
            .iter()
            .filter(|c| **c == Call::DeleteTexture(tex))
            .count();
        assert_eq!(deletes, 1);
        assert!(ctx.is_released(Resource::Texture(tex)));
    }
}

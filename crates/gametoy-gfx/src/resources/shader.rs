use crate::device::{Backend, GpuCtx, LinkError, ProgramId, Resource};
use crate::error::{GfxError, Result, ShaderStage};
use crate::render::VERTEX_FORMAT;

use super::uniform::Uniforms;

/// Vertex stage template. User code replaces `{{user}}` and must define
/// `vert(pos, uv, color) -> vec4<f32>`.
pub const VERT_TEMPLATE: &str = r#"struct TargetInfo {
    flip_y: vec4<f32>,
}

@group(0) @binding(0) var<uniform> target_info: TargetInfo;

struct VertexInput {
    @location(0) a_pos: vec2<f32>,
    @location(1) a_uv: vec2<f32>,
    @location(2) a_color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) v_pos: vec2<f32>,
    @location(1) v_uv: vec2<f32>,
    @location(2) v_color: vec4<f32>,
}

fn def_vert(pos: vec2<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32> {
    return vec4<f32>(pos, 0.0, 1.0);
}

{{user}}

@group(0) @binding(3) var<uniform> u: Uniforms;

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let p = vert(in.a_pos, in.a_uv, in.a_color);
    out.clip = vec4<f32>(p.x, p.y * target_info.flip_y.x, p.z, p.w);
    out.v_pos = in.a_pos;
    out.v_uv = in.a_uv;
    out.v_color = in.a_color;
    return out;
}
"#;

/// Fragment stage template. User code replaces `{{user}}` and must define
/// `frag(pos, uv, color) -> vec4<f32>`; the bound texture is `u_tex`
/// sampled through `u_sampler`. Fully transparent output is discarded.
pub const FRAG_TEMPLATE: &str = r#"struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) v_pos: vec2<f32>,
    @location(1) v_uv: vec2<f32>,
    @location(2) v_color: vec4<f32>,
}

@group(0) @binding(1) var u_tex: texture_2d<f32>;
@group(0) @binding(2) var u_sampler: sampler;

fn def_frag(pos: vec2<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32> {
    return color * textureSample(u_tex, u_sampler, uv);
}

{{user}}

@group(0) @binding(4) var<uniform> u: Uniforms;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = frag(in.v_pos, in.v_uv, in.v_color);
    if (c.a == 0.0) {
        discard;
    }
    return c;
}
"#;

pub const DEF_VERT: &str = r#"fn vert(pos: vec2<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32> {
    return def_vert(pos, uv, color);
}
"#;

pub const DEF_FRAG: &str = r#"fn frag(pos: vec2<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32> {
    return def_frag(pos, uv, color);
}
"#;

const USER_MARKER: &str = "{{user}}";

// Placeholder for stages that declare no uniforms of their own.
const EMPTY_UNIFORMS: &str = "struct Uniforms {\n    _unused: f32,\n}\n";

/// Full source of one stage, with enough bookkeeping to map compiler line
/// numbers back onto the user snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    pub code: String,
    /// Lines of template preceding the user snippet.
    pub line_offset: u32,
    /// Lines in the user snippet.
    pub user_lines: u32,
}

impl ShaderSource {
    pub fn vertex(user: &str) -> Self {
        Self::splice(ShaderStage::Vertex, VERT_TEMPLATE, user)
    }

    pub fn fragment(user: &str) -> Self {
        Self::splice(ShaderStage::Fragment, FRAG_TEMPLATE, user)
    }

    fn splice(stage: ShaderStage, template: &str, user: &str) -> Self {
        let line_offset = template
            .find(USER_MARKER)
            .map(|at| template[..at].matches('\n').count() as u32)
            .unwrap_or(0);

        let mut snippet = user.to_string();
        if !declares_uniforms(user) {
            if !snippet.ends_with('\n') {
                snippet.push('\n');
            }
            snippet.push_str(EMPTY_UNIFORMS);
        }

        Self {
            stage,
            code: template.replacen(USER_MARKER, &snippet, 1),
            line_offset,
            user_lines: user.lines().count() as u32,
        }
    }

    /// Converts a 1-based line of `code` into a 1-based line of the user
    /// snippet. Lines outside the snippet map to `None`.
    pub fn user_line(&self, line: u32) -> Option<u32> {
        let rel = line.checked_sub(self.line_offset)?;
        (1..=self.user_lines).contains(&rel).then_some(rel)
    }

    fn compile_error(&self, err: LinkError) -> GfxError {
        let message = err.message.trim().to_string();
        match err.line.and_then(|l| self.user_line(l)) {
            Some(line) => GfxError::ShaderCompile { stage: self.stage, line, message },
            None => GfxError::ShaderLink { stage: self.stage, message },
        }
    }
}

fn declares_uniforms(code: &str) -> bool {
    code.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .collect::<Vec<_>>()
        .windows(2)
        .any(|w| w[0] == "struct" && w[1] == "Uniforms")
}

/// A linked program over the fixed vertex format.
///
/// Copyable handle; the program itself is owned by the context's teardown
/// list.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Shader {
    program: ProgramId,
}

impl Shader {
    /// Splices `vert`/`frag` (or the defaults) into the stage templates and
    /// links them.
    pub fn new<B: Backend>(
        ctx: &mut GpuCtx<B>,
        vert: Option<&str>,
        frag: Option<&str>,
    ) -> Result<Self> {
        let vsrc = ShaderSource::vertex(vert.unwrap_or(DEF_VERT));
        let fsrc = ShaderSource::fragment(frag.unwrap_or(DEF_FRAG));

        let program = ctx
            .backend_mut()
            .link_program(&vsrc.code, &fsrc.code, VERTEX_FORMAT)
            .map_err(|err| match err.stage {
                ShaderStage::Vertex => vsrc.compile_error(err),
                ShaderStage::Fragment => fsrc.compile_error(err),
            })?;
        ctx.track(Resource::Program(program));

        log::debug!("linked shader program {program:?}");
        Ok(Self { program })
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.program
    }

    #[inline]
    pub fn bind<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.push_program(self.program);
    }

    #[inline]
    pub fn unbind<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.pop_program();
    }

    /// Sends every value in `uniforms` to the program. The program must be
    /// bound.
    pub fn send<B: Backend>(&self, ctx: &mut GpuCtx<B>, uniforms: &Uniforms) -> Result<()> {
        debug_assert_eq!(ctx.current_program(), Some(self.program));
        for (name, value) in uniforms.iter() {
            ctx.backend_mut().uniform(name, value)?;
        }
        Ok(())
    }

    pub fn free<B: Backend>(&self, ctx: &mut GpuCtx<B>) {
        ctx.release(Resource::Program(self.program));
    }
}

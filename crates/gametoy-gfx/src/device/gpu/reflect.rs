//! WGSL validation and uniform block reflection through naga.

use std::collections::HashMap;

use naga::{ArraySize, TypeInner, VectorSize};

use crate::device::LinkError;
use crate::error::{GfxError, Result, ShaderStage};
use crate::resources::UniformValue;

/// Name of the uniform block variable in both stage templates.
pub(crate) const UNIFORM_VAR: &str = "u";

/// Parses and validates one stage. Errors carry the 1-based line within
/// `src` when naga reports a location.
pub(crate) fn compile_stage(
    stage: ShaderStage,
    src: &str,
) -> std::result::Result<naga::Module, LinkError> {
    let module = naga::front::wgsl::parse_str(src).map_err(|err| LinkError {
        stage,
        line: err.location(src).map(|loc| loc.line_number),
        message: err.message().to_string(),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|err| LinkError {
        stage,
        line: err.location(src).map(|loc| loc.line_number),
        message: err.as_inner().to_string(),
    })?;

    Ok(module)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FieldType {
    /// `f32` or `vecN<f32>`.
    Float { components: u32 },
    Mat4,
    Array { components: u32, len: u32, stride: u32 },
    Unsupported,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Field {
    offset: u32,
    ty: FieldType,
}

/// Byte layout of a stage's `u: Uniforms` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformLayout {
    size: u32,
    fields: HashMap<String, Field>,
}

impl UniformLayout {
    pub fn reflect(module: &naga::Module) -> Self {
        let var = module
            .global_variables
            .iter()
            .map(|(_, var)| var)
            .find(|var| {
                var.space == naga::AddressSpace::Uniform && var.name.as_deref() == Some(UNIFORM_VAR)
            });
        let Some(var) = var else {
            return Self::default();
        };
        let TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
            return Self::default();
        };

        let fields = members
            .iter()
            .filter_map(|m| {
                let name = m.name.clone()?;
                Some((name, Field { offset: m.offset, ty: field_type(module, m.ty) }))
            })
            .collect();

        Self { size: *span, fields }
    }

    /// Buffer size to allocate: the block size rounded up to 16 bytes, at
    /// least 16.
    pub fn buffer_size(&self) -> u64 {
        (self.size.max(16) as u64).next_multiple_of(16)
    }

    pub fn offset(&self, name: &str) -> Option<u32> {
        self.fields.get(name).map(|f| f.offset)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Writes `value` into `buf` at the field's offset. Names the block does
    /// not declare are ignored.
    ///
    /// Array fields may use `vec4<f32>` elements for scalar, `vec2` and color
    /// values to satisfy uniform array stride rules; the extra components are
    /// left untouched.
    pub fn write(&self, buf: &mut [u8], name: &str, value: &UniformValue) -> Result<()> {
        let Some(field) = self.fields.get(name) else {
            return Ok(());
        };
        let kind = value.kind();
        let want = kind.components();
        let mismatch = || GfxError::UnsupportedUniformType { name: name.to_string() };

        let (stride, len) = match field.ty {
            FieldType::Float { components } if !kind.is_array() && components == want => (0, 1),
            FieldType::Mat4 if want == 16 => (0, 1),
            FieldType::Array { components, len, stride }
                if kind.is_array() && (components == want || components == 4) =>
            {
                (stride, len)
            }
            _ => return Err(mismatch()),
        };

        for (i, elem) in value.elements().iter().take(len as usize).enumerate() {
            let start = (field.offset + stride * i as u32) as usize;
            let bytes: &[u8] = bytemuck::cast_slice(elem);
            let dst = buf.get_mut(start..start + bytes.len()).ok_or_else(mismatch)?;
            dst.copy_from_slice(bytes);
        }
        Ok(())
    }
}

fn float_components(inner: &TypeInner) -> Option<u32> {
    match *inner {
        TypeInner::Scalar(s) if s == naga::Scalar::F32 => Some(1),
        TypeInner::Vector { size, scalar } if scalar == naga::Scalar::F32 => Some(match size {
            VectorSize::Bi => 2,
            VectorSize::Tri => 3,
            VectorSize::Quad => 4,
        }),
        _ => None,
    }
}

fn field_type(module: &naga::Module, ty: naga::Handle<naga::Type>) -> FieldType {
    let inner = &module.types[ty].inner;
    if let Some(components) = float_components(inner) {
        return FieldType::Float { components };
    }
    match *inner {
        TypeInner::Matrix { columns: VectorSize::Quad, rows: VectorSize::Quad, scalar }
            if scalar == naga::Scalar::F32 =>
        {
            FieldType::Mat4
        }
        TypeInner::Array { base, size: ArraySize::Constant(len), stride } => {
            match float_components(&module.types[base].inner) {
                Some(components) => FieldType::Array { components, len: len.get(), stride },
                None => FieldType::Unsupported,
            }
        }
        _ => FieldType::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Color, Vec2};
    use crate::resources::{DEF_FRAG, DEF_VERT, ShaderSource};

    const USER_FRAG: &str = r#"struct Uniforms {
    u_time: f32,
    u_offset: vec2<f32>,
    u_tint: vec3<f32>,
    u_mat: mat4x4<f32>,
    u_weights: array<vec4<f32>, 4>,
}

fn frag(pos: vec2<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32> {
    let c = def_frag(pos, uv + u.u_offset, color);
    return c * vec4<f32>(u.u_tint, 1.0) * u.u_weights[0].x + vec4<f32>(u.u_time) * u.u_mat[0][0];
}
"#;

    fn user_layout() -> UniformLayout {
        let src = ShaderSource::fragment(USER_FRAG);
        let module = compile_stage(ShaderStage::Fragment, &src.code).unwrap();
        UniformLayout::reflect(&module)
    }

    fn f32_at(buf: &[u8], offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&buf[offset..offset + 4])
    }

    // ── validation ──

    #[test]
    fn default_stages_validate() {
        compile_stage(ShaderStage::Vertex, &ShaderSource::vertex(DEF_VERT).code).unwrap();
        compile_stage(ShaderStage::Fragment, &ShaderSource::fragment(DEF_FRAG).code).unwrap();
    }

    #[test]
    fn syntax_error_maps_to_user_line() {
        let user = "fn frag(pos: vec2<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32> {\n    return color +;\n}\n";
        let src = ShaderSource::fragment(user);
        let err = compile_stage(ShaderStage::Fragment, &src.code).unwrap_err();
        assert_eq!(err.stage, ShaderStage::Fragment);
        assert_eq!(err.line.and_then(|l| src.user_line(l)), Some(2));
    }

    #[test]
    fn missing_entry_function_fails() {
        let src = ShaderSource::fragment("fn not_frag() {}\n");
        assert!(compile_stage(ShaderStage::Fragment, &src.code).is_err());
    }

    // ── reflection ──

    #[test]
    fn reflects_std140_style_offsets() {
        let layout = user_layout();
        assert_eq!(layout.offset("u_time"), Some(0));
        assert_eq!(layout.offset("u_offset"), Some(8));
        assert_eq!(layout.offset("u_tint"), Some(16));
        assert_eq!(layout.offset("u_mat"), Some(32));
        assert_eq!(layout.offset("u_weights"), Some(96));
        assert_eq!(layout.buffer_size(), 160);
    }

    #[test]
    fn placeholder_block_is_padded() {
        let src = ShaderSource::vertex(DEF_VERT);
        let module = compile_stage(ShaderStage::Vertex, &src.code).unwrap();
        let layout = UniformLayout::reflect(&module);
        assert!(layout.contains("_unused"));
        assert_eq!(layout.buffer_size(), 16);
    }

    // ── packing ──

    #[test]
    fn writes_values_at_offsets() {
        let layout = user_layout();
        let mut buf = vec![0u8; layout.buffer_size() as usize];

        layout.write(&mut buf, "u_time", &UniformValue::Scalar(1.5)).unwrap();
        layout
            .write(&mut buf, "u_offset", &UniformValue::Vector2(Vec2::new(2.0, 3.0)))
            .unwrap();
        layout
            .write(&mut buf, "u_tint", &UniformValue::Color(Color::new(0.25, 0.5, 0.75)))
            .unwrap();

        assert_eq!(f32_at(&buf, 0), 1.5);
        assert_eq!((f32_at(&buf, 8), f32_at(&buf, 12)), (2.0, 3.0));
        assert_eq!((f32_at(&buf, 16), f32_at(&buf, 20), f32_at(&buf, 24)), (0.25, 0.5, 0.75));
    }

    #[test]
    fn scalar_array_uses_vec4_stride() {
        let layout = user_layout();
        let mut buf = vec![0u8; layout.buffer_size() as usize];

        let weights = UniformValue::ScalarArray(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        layout.write(&mut buf, "u_weights", &weights).unwrap();

        assert_eq!(f32_at(&buf, 96), 1.0);
        assert_eq!(f32_at(&buf, 112), 2.0);
        assert_eq!(f32_at(&buf, 144), 4.0);
        // y of the first element untouched
        assert_eq!(f32_at(&buf, 100), 0.0);
    }

    #[test]
    fn mismatched_kind_is_rejected() {
        let layout = user_layout();
        let mut buf = vec![0u8; layout.buffer_size() as usize];

        let err = layout
            .write(&mut buf, "u_time", &UniformValue::Vector2(Vec2::new(1.0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, GfxError::UnsupportedUniformType { ref name } if name == "u_time"));
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn unknown_name_is_ignored() {
        let layout = user_layout();
        let mut buf = vec![0u8; layout.buffer_size() as usize];
        layout.write(&mut buf, "u_missing", &UniformValue::Scalar(1.0)).unwrap();
        assert!(buf.iter().all(|b| *b == 0));
    }
}

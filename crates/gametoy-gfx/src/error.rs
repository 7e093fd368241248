use std::fmt;

/// Shader pipeline stage, as reported in compile errors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors raised by the rendering core.
///
/// None of these leave the renderer in a corrupted state: a failed draw
/// enqueues nothing and a failed flush still restores its bindings.
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("failed to create GPU context: {0}")]
    ContextCreationFailed(String),

    #[error("failed to allocate {kind}")]
    ResourceAllocation { kind: &'static str },

    #[error("{stage} shader line {line}: {message}")]
    ShaderCompile {
        stage: ShaderStage,
        line: u32,
        message: String,
    },

    #[error("{stage} shader: {message}")]
    ShaderLink { stage: ShaderStage, message: String },

    #[error("unsupported uniform data type for \"{name}\"")]
    UnsupportedUniformType { name: String },

    #[error("{op}() requires \"width\" and \"height\"")]
    MissingDimension { op: &'static str },

    #[error("frame not found: {index}")]
    FrameNotFound { index: usize },

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = GfxError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_compile_message_names_stage_and_line() {
        let err = GfxError::ShaderCompile {
            stage: ShaderStage::Fragment,
            line: 3,
            message: "unknown identifier `colr`".to_string(),
        };
        assert_eq!(err.to_string(), "fragment shader line 3: unknown identifier `colr`");
    }

    #[test]
    fn frame_not_found_message() {
        assert_eq!(GfxError::FrameNotFound { index: 7 }.to_string(), "frame not found: 7");
    }
}

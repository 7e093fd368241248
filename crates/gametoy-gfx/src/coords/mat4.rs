use super::Vec2;

/// 4x4 transform matrix, column-major.
///
/// `translate`, `scale` and `rotate` post-multiply in place, so the most
/// recently applied operation is the first one a point goes through.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4 {
    pub m: [f32; 16],
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, //
        ],
    };

    #[inline]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn from_translation(p: Vec2) -> Self {
        let mut out = Self::IDENTITY;
        out.m[12] = p.x;
        out.m[13] = p.y;
        out
    }

    pub fn from_scale(s: Vec2) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0] = s.x;
        out.m[5] = s.y;
        out
    }

    /// Rotation around the Z axis, in degrees.
    pub fn from_rotation(deg: f32) -> Self {
        let (sin, cos) = deg.to_radians().sin_cos();
        let mut out = Self::IDENTITY;
        out.m[0] = cos;
        out.m[1] = sin;
        out.m[4] = -sin;
        out.m[5] = cos;
        out
    }

    /// Returns `self * other`.
    pub fn mult(&self, other: &Mat4) -> Mat4 {
        let a = &self.m;
        let b = &other.m;
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
            }
        }
        Mat4 { m: out }
    }

    pub fn translate(&mut self, p: Vec2) {
        *self = self.mult(&Mat4::from_translation(p));
    }

    pub fn scale(&mut self, s: Vec2) {
        *self = self.mult(&Mat4::from_scale(s));
    }

    pub fn rotate(&mut self, deg: f32) {
        *self = self.mult(&Mat4::from_rotation(deg));
    }

    /// Transforms a point (z = 0, w = 1).
    #[inline]
    pub fn mult_vec2(&self, p: Vec2) -> Vec2 {
        let m = &self.m;
        Vec2::new(
            m[0] * p.x + m[4] * p.y + m[12],
            m[1] * p.x + m[5] * p.y + m[13],
        )
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

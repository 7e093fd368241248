use crate::coords::{Mat4, Vec2};

/// Current model matrix plus the saved matrices below it.
#[derive(Debug, Clone, Default)]
pub struct TransformStack {
    current: Mat4,
    saved: Vec<Mat4>,
}

impl TransformStack {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> &Mat4 {
        &self.current
    }

    /// Number of saved matrices.
    #[inline]
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn push(&mut self) {
        self.saved.push(self.current);
    }

    /// Restores the last saved matrix. Popping an empty stack leaves the
    /// current matrix as is.
    pub fn pop(&mut self) {
        match self.saved.pop() {
            Some(m) => self.current = m,
            None => log::warn!("pop_transform without matching push_transform"),
        }
    }

    pub fn translate(&mut self, p: Vec2) {
        if p != Vec2::zero() {
            self.current.translate(p);
        }
    }

    pub fn scale(&mut self, s: Vec2) {
        if s != Vec2::one() {
            self.current.scale(s);
        }
    }

    pub fn rotate(&mut self, deg: f32) {
        if deg != 0.0 {
            self.current.rotate(deg);
        }
    }

    /// Back to identity with nothing saved.
    pub fn reset(&mut self) {
        self.current = Mat4::identity();
        self.saved.clear();
    }

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        self.current.mult_vec2(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_restores() {
        let mut t = TransformStack::new();
        t.translate(Vec2::new(10.0, 0.0));
        t.push();
        t.scale(Vec2::splat(2.0));
        assert_eq!(t.apply(Vec2::new(1.0, 1.0)), Vec2::new(12.0, 2.0));

        t.pop();
        assert_eq!(t.apply(Vec2::new(1.0, 1.0)), Vec2::new(11.0, 1.0));
        assert_eq!(t.depth(), 0);
    }

    #[test]
    fn identity_ops_are_skipped() {
        let mut t = TransformStack::new();
        t.translate(Vec2::zero());
        t.scale(Vec2::one());
        t.rotate(0.0);
        assert_eq!(*t.current(), Mat4::identity());
    }

    #[test]
    fn unbalanced_pop_keeps_current() {
        let mut t = TransformStack::new();
        t.translate(Vec2::new(3.0, 4.0));
        t.pop();
        assert_eq!(t.apply(Vec2::zero()), Vec2::new(3.0, 4.0));
    }

    #[test]
    fn reset_clears_saved() {
        let mut t = TransformStack::new();
        t.push();
        t.push();
        t.rotate(90.0);
        t.reset();
        assert_eq!(t.depth(), 0);
        assert_eq!(*t.current(), Mat4::identity());
    }
}

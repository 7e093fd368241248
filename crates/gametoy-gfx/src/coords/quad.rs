/// Normalized `(x, y, w, h)` rectangle identifying a sub-region of a texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Quad {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// The whole texture.
    #[inline]
    pub const fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Maps `other`, expressed relative to this quad, into this quad's space.
    pub fn scale(self, other: Quad) -> Quad {
        Quad::new(
            self.x + other.x * self.w,
            self.y + other.y * self.h,
            other.w * self.w,
            other.h * self.h,
        )
    }

    /// Splits this quad into an `x` by `y` grid, row-major.
    pub fn slice(self, x: u32, y: u32) -> Vec<Quad> {
        let x = x.max(1);
        let y = y.max(1);
        let qw = self.w / x as f32;
        let qh = self.h / y as f32;
        let mut frames = Vec::with_capacity((x * y) as usize);
        for j in 0..y {
            for i in 0..x {
                frames.push(Quad::new(
                    self.x + i as f32 * qw,
                    self.y + j as f32 * qh,
                    qw,
                    qh,
                ));
            }
        }
        frames
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_maps_into_parent() {
        let parent = Quad::new(0.5, 0.0, 0.5, 0.5);
        let q = parent.scale(Quad::new(0.5, 0.5, 0.5, 0.5));
        assert_eq!(q, Quad::new(0.75, 0.25, 0.25, 0.25));
    }

    #[test]
    fn scale_by_full_is_identity() {
        let q = Quad::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(q.scale(Quad::full()), q);
    }

    #[test]
    fn slice_is_row_major() {
        let frames = Quad::new(0.0, 0.5, 1.0, 0.5).slice(2, 2);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], Quad::new(0.0, 0.5, 0.5, 0.25));
        assert_eq!(frames[1], Quad::new(0.5, 0.5, 0.5, 0.25));
        assert_eq!(frames[2], Quad::new(0.0, 0.75, 0.5, 0.25));
    }

    #[test]
    fn slice_clamps_zero_counts() {
        assert_eq!(Quad::full().slice(0, 0), vec![Quad::full()]);
    }
}

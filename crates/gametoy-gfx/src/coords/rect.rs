/// Pixel rectangle used for GPU viewports.
///
/// For GPU viewports `y` counts from the bottom edge of the bound target. The
/// draw pipeline's blit rectangle uses screen coordinates (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ViewportRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole `width` x `height` target.
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Largest rectangle with the aspect ratio of `content`, centered inside
    /// a `canvas`-sized target.
    pub fn letterbox(canvas: (u32, u32), content: (u32, u32)) -> Self {
        let (cw, ch) = canvas;
        let (w, h) = content;
        if w == 0 || h == 0 || cw == 0 || ch == 0 {
            return Self::full(cw, ch);
        }

        let canvas_ratio = cw as f32 / ch as f32;
        let content_ratio = w as f32 / h as f32;

        if canvas_ratio > content_ratio {
            let width = (ch as f32 * content_ratio).round() as u32;
            Self::new((cw - width.min(cw)) / 2, 0, width.min(cw), ch)
        } else {
            let height = (cw as f32 / content_ratio).round() as u32;
            Self::new(0, (ch - height.min(ch)) / 2, cw, height.min(ch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_starts_at_origin() {
        assert_eq!(ViewportRect::full(640, 480), ViewportRect::new(0, 0, 640, 480));
    }

    #[test]
    fn is_empty_zero_size() {
        assert!(ViewportRect::new(0, 0, 0, 5).is_empty());
        assert!(ViewportRect::new(0, 0, 5, 0).is_empty());
        assert!(!ViewportRect::new(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn letterbox_wide_canvas_pillarboxes() {
        let r = ViewportRect::letterbox((1000, 500), (100, 100));
        assert_eq!(r, ViewportRect::new(250, 0, 500, 500));
    }

    #[test]
    fn letterbox_tall_canvas_letterboxes() {
        let r = ViewportRect::letterbox((400, 800), (200, 100));
        assert_eq!(r, ViewportRect::new(0, 300, 400, 200));
    }

    #[test]
    fn letterbox_matching_ratio_fills() {
        assert_eq!(
            ViewportRect::letterbox((1280, 720), (640, 360)),
            ViewportRect::full(1280, 720)
        );
    }

    #[test]
    fn letterbox_degenerate_content_fills() {
        assert_eq!(ViewportRect::letterbox((10, 10), (0, 3)), ViewportRect::full(10, 10));
    }
}

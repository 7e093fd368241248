use crate::coords::Vec2;

/// Which point of a quad sits at its draw position.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub enum Anchor {
    #[default]
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BotLeft,
    Bot,
    BotRight,
    /// Custom point in `-1..=1` on both axes; `(0, 0)` is the center.
    Offset(Vec2),
}

impl Anchor {
    /// Anchor point in `-1..=1` space, y growing downwards.
    pub fn point(self) -> Vec2 {
        match self {
            Anchor::TopLeft => Vec2::new(-1.0, -1.0),
            Anchor::Top => Vec2::new(0.0, -1.0),
            Anchor::TopRight => Vec2::new(1.0, -1.0),
            Anchor::Left => Vec2::new(-1.0, 0.0),
            Anchor::Center => Vec2::new(0.0, 0.0),
            Anchor::Right => Vec2::new(1.0, 0.0),
            Anchor::BotLeft => Vec2::new(-1.0, 1.0),
            Anchor::Bot => Vec2::new(0.0, 1.0),
            Anchor::BotRight => Vec2::new(1.0, 1.0),
            Anchor::Offset(p) => p,
        }
    }

    /// Parses the lowercase names used in asset metadata (`"topleft"`,
    /// `"center"`, `"botright"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "topleft" => Anchor::TopLeft,
            "top" => Anchor::Top,
            "topright" => Anchor::TopRight,
            "left" => Anchor::Left,
            "center" => Anchor::Center,
            "right" => Anchor::Right,
            "botleft" => Anchor::BotLeft,
            "bot" => Anchor::Bot,
            "botright" => Anchor::BotRight,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_points() {
        assert_eq!(Anchor::TopLeft.point(), Vec2::new(-1.0, -1.0));
        assert_eq!(Anchor::Center.point(), Vec2::zero());
        assert_eq!(Anchor::BotRight.point(), Vec2::new(1.0, 1.0));
        assert_eq!(Anchor::Offset(Vec2::new(0.5, -0.25)).point(), Vec2::new(0.5, -0.25));
    }

    #[test]
    fn names() {
        assert_eq!(Anchor::from_name("bot"), Some(Anchor::Bot));
        assert_eq!(Anchor::from_name("middle"), None);
    }
}

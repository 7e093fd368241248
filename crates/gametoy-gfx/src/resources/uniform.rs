use std::collections::BTreeMap;

use crate::coords::{Color, Mat4, Vec2};

/// A value that can be bound to a named shader uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Vector2(Vec2),
    /// Sent as a 3-component vector.
    Color(Color),
    Matrix4(Mat4),
    ScalarArray(Vec<f32>),
    Vector2Array(Vec<Vec2>),
    ColorArray(Vec<Color>),
}

/// Discriminant of [`UniformValue`], used for type checks against a
/// program's declared uniforms.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    Scalar,
    Vector2,
    Color,
    Matrix4,
    ScalarArray,
    Vector2Array,
    ColorArray,
}

impl UniformKind {
    /// Float components per element.
    pub fn components(self) -> u32 {
        match self {
            UniformKind::Scalar | UniformKind::ScalarArray => 1,
            UniformKind::Vector2 | UniformKind::Vector2Array => 2,
            UniformKind::Color | UniformKind::ColorArray => 3,
            UniformKind::Matrix4 => 16,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            UniformKind::ScalarArray | UniformKind::Vector2Array | UniformKind::ColorArray
        )
    }
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Scalar(_) => UniformKind::Scalar,
            UniformValue::Vector2(_) => UniformKind::Vector2,
            UniformValue::Color(_) => UniformKind::Color,
            UniformValue::Matrix4(_) => UniformKind::Matrix4,
            UniformValue::ScalarArray(_) => UniformKind::ScalarArray,
            UniformValue::Vector2Array(_) => UniformKind::Vector2Array,
            UniformValue::ColorArray(_) => UniformKind::ColorArray,
        }
    }

    /// Element-by-element float components.
    pub fn elements(&self) -> Vec<Vec<f32>> {
        match self {
            UniformValue::Scalar(v) => vec![vec![*v]],
            UniformValue::Vector2(v) => vec![vec![v.x, v.y]],
            UniformValue::Color(c) => vec![vec![c.r, c.g, c.b]],
            UniformValue::Matrix4(m) => vec![m.m.to_vec()],
            UniformValue::ScalarArray(vs) => vs.iter().map(|v| vec![*v]).collect(),
            UniformValue::Vector2Array(vs) => vs.iter().map(|v| vec![v.x, v.y]).collect(),
            UniformValue::ColorArray(cs) => cs.iter().map(|c| vec![c.r, c.g, c.b]).collect(),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Scalar(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vector2(v)
    }
}

impl From<Color> for UniformValue {
    fn from(v: Color) -> Self {
        UniformValue::Color(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Matrix4(v)
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(v: Vec<f32>) -> Self {
        UniformValue::ScalarArray(v)
    }
}

impl From<Vec<Vec2>> for UniformValue {
    fn from(v: Vec<Vec2>) -> Self {
        UniformValue::Vector2Array(v)
    }
}

impl From<Vec<Color>> for UniformValue {
    fn from(v: Vec<Color>) -> Self {
        UniformValue::ColorArray(v)
    }
}

/// Named uniform values, ordered by name.
///
/// Two sets compare equal when they hold the same names with equal values;
/// the batch renderer relies on this to decide flush boundaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Uniforms(BTreeMap<String, UniformValue>);

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_deep_and_order_independent() {
        let a = Uniforms::new().with("u_time", 1.0_f32).with("u_tint", Color::white());
        let b = Uniforms::new().with("u_tint", Color::white()).with("u_time", 1.0_f32);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with("u_time", 2.0_f32));
    }

    #[test]
    fn color_sends_three_components() {
        let v = UniformValue::from(Color::new(0.1, 0.2, 0.3));
        assert_eq!(v.elements(), vec![vec![0.1, 0.2, 0.3]]);
        assert_eq!(v.kind().components(), 3);
    }

    #[test]
    fn arrays_split_per_element() {
        let v = UniformValue::from(vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)]);
        assert!(v.kind().is_array());
        assert_eq!(v.elements(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }
}

//! Field values of the asset graph.
//!
//! Every block in the graph is a [`Compound`]: an ordered list of named
//! [`Value`]s. Typed getters mirror the behaviour of the asset store the viewer
//! reads from: a missing or mistyped field yields the type's zero value rather
//! than an error, so callers can read optional fields without branching.

use glam::{Mat3, Vec2, Vec3, Vec4};

/// Identity of a block inside the asset graph (its block number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    /// Unsigned integral value (flags, enums, counts, indices).
    Count(u64),
    /// Signed integral value.
    Int(i64),
    Float(f32),
    String(String),
    /// Packed file version (e.g. `0x14020007`).
    FileVersion(u32),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Color3(Vec3),
    Color4(Vec4),
    Matrix33(Mat3),
    Triangle([u32; 3]),
    ByteArray(Vec<u8>),
    /// Owning reference to another block (a child link).
    Link(Option<BlockId>),
    /// Non-owning back reference to another block.
    Ptr(Option<BlockId>),
    Array(Vec<Value>),
    Compound(Compound),
}

impl Value {
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Integral interpretation; booleans and signed values count too.
    #[must_use]
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Bool(b) => Some(u64::from(*b)),
            Self::Count(c) => Some(*c),
            Self::Int(i) => Some(*i as u64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_file_version(&self) -> Option<u32> {
        match self {
            Self::FileVersion(v) => Some(*v),
            _ => None,
        }
    }

    /// Link target for both owning and back references.
    #[must_use]
    pub fn as_link(&self) -> Option<BlockId> {
        match self {
            Self::Link(l) | Self::Ptr(l) => *l,
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Self::Compound(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Self::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    /// Three-component vectors and RGB colours; four-component values are
    /// truncated.
    #[must_use]
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vector3(v) | Self::Color3(v) => Some(*v),
            Self::Vector4(v) | Self::Color4(v) => Some(v.truncate()),
            _ => None,
        }
    }

    /// RGBA colour; an RGB colour gets an opaque alpha.
    #[must_use]
    pub fn as_color4(&self) -> Option<Vec4> {
        match self {
            Self::Color4(v) | Self::Vector4(v) => Some(*v),
            Self::Color3(v) => Some(v.extend(1.0)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_triangle(&self) -> Option<[u32; 3]> {
        match self {
            Self::Triangle(t) => Some(*t),
            _ => None,
        }
    }

    /// Collects every owning link found in this value, depth first.
    pub fn collect_child_links(&self, out: &mut Vec<BlockId>) {
        match self {
            Self::Link(Some(id)) => out.push(*id),
            Self::Array(items) => items.iter().for_each(|v| v.collect_child_links(out)),
            Self::Compound(c) => c.collect_child_links(out),
            _ => {}
        }
    }
}

/// An ordered set of named fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    fields: Vec<(String, Value)>,
}

impl Compound {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Inserts or replaces a field.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Looks up a field. `/` separates nested compound names.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('/');
        let first = parts.next()?;
        let mut value = self.direct(first)?;
        for part in parts {
            value = value.as_compound()?.direct(part)?;
        }
        Some(value)
    }

    fn direct(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    // ========================================================================
    // Typed getters (zero on absence)
    // ========================================================================

    #[must_use]
    pub fn get_bool(&self, path: &str) -> bool {
        self.get_u32(path) != 0
    }

    #[must_use]
    pub fn get_u32(&self, path: &str) -> u32 {
        self.get(path).and_then(Value::as_count).unwrap_or(0) as u32
    }

    #[must_use]
    pub fn get_i32(&self, path: &str) -> i32 {
        self.get(path).and_then(Value::as_count).unwrap_or(0) as i32
    }

    #[must_use]
    pub fn get_f32(&self, path: &str) -> f32 {
        self.get(path).and_then(Value::as_float).unwrap_or(0.0)
    }

    #[must_use]
    pub fn get_str(&self, path: &str) -> &str {
        self.get(path).and_then(Value::as_str).unwrap_or("")
    }

    #[must_use]
    pub fn get_vec2(&self, path: &str) -> Vec2 {
        self.get(path).and_then(Value::as_vec2).unwrap_or(Vec2::ZERO)
    }

    #[must_use]
    pub fn get_vec3(&self, path: &str) -> Vec3 {
        self.get(path).and_then(Value::as_vec3).unwrap_or(Vec3::ZERO)
    }

    #[must_use]
    pub fn get_color3(&self, path: &str) -> Vec3 {
        self.get_vec3(path)
    }

    #[must_use]
    pub fn get_color4(&self, path: &str) -> Vec4 {
        self.get(path).and_then(Value::as_color4).unwrap_or(Vec4::ZERO)
    }

    #[must_use]
    pub fn get_mat3(&self, path: &str) -> Option<Mat3> {
        match self.get(path)? {
            Value::Matrix33(m) => Some(*m),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_link(&self, path: &str) -> Option<BlockId> {
        self.get(path).and_then(Value::as_link)
    }

    #[must_use]
    pub fn get_bytes(&self, path: &str) -> &[u8] {
        match self.get(path) {
            Some(Value::ByteArray(b)) => b,
            _ => &[],
        }
    }

    #[must_use]
    pub fn get_array(&self, path: &str) -> &[Value] {
        self.get(path).and_then(Value::as_array).unwrap_or(&[])
    }

    #[must_use]
    pub fn get_compound(&self, path: &str) -> Option<&Compound> {
        self.get(path).and_then(Value::as_compound)
    }

    /// Number of rows of an array field.
    #[must_use]
    pub fn row_count(&self, path: &str) -> usize {
        self.get_array(path).len()
    }

    #[must_use]
    pub fn get_vec2_array(&self, path: &str) -> Vec<Vec2> {
        self.get_array(path).iter().filter_map(Value::as_vec2).collect()
    }

    #[must_use]
    pub fn get_vec3_array(&self, path: &str) -> Vec<Vec3> {
        self.get_array(path).iter().filter_map(Value::as_vec3).collect()
    }

    #[must_use]
    pub fn get_color4_array(&self, path: &str) -> Vec<Vec4> {
        self.get_array(path).iter().filter_map(Value::as_color4).collect()
    }

    #[must_use]
    pub fn get_u32_array(&self, path: &str) -> Vec<u32> {
        self.get_array(path)
            .iter()
            .filter_map(Value::as_count)
            .map(|c| c as u32)
            .collect()
    }

    #[must_use]
    pub fn get_triangle_array(&self, path: &str) -> Vec<[u32; 3]> {
        self.get_array(path).iter().filter_map(Value::as_triangle).collect()
    }

    #[must_use]
    pub fn get_string_array(&self, path: &str) -> Vec<String> {
        self.get_array(path)
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_owned())
            .collect()
    }

    /// Link targets of an array of links, skipping null links.
    #[must_use]
    pub fn get_link_array(&self, path: &str) -> Vec<BlockId> {
        self.get_array(path).iter().filter_map(Value::as_link).collect()
    }

    pub fn collect_child_links(&self, out: &mut Vec<BlockId>) {
        for (_, value) in &self.fields {
            value.collect_child_links(out);
        }
    }
}

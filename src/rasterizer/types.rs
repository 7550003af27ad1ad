//! Core types for the pipeline

use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

use super::math::{Vec2, Vec3, Vec4};

/// Maximum number of bone matrices a palette can address
pub const MAX_BONES: usize = 128;

/// RGBA color (0-255 per channel)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };
    pub const MAGENTA: Color = Color { r: 255, g: 0, b: 255, a: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Convert to [u8; 4] for the pixel buffer
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Pack into a u32 as 0xRRGGBBAA
    pub fn to_u32(self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8) | (self.a as u32)
    }

    pub fn from_u32(packed: u32) -> Self {
        Self {
            r: (packed >> 24) as u8,
            g: (packed >> 16) as u8,
            b: (packed >> 8) as u8,
            a: packed as u8,
        }
    }
}

/// Floating point color, channels nominally in 0.0-1.0
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl LinearColor {
    pub const BLACK: LinearColor = LinearColor { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: LinearColor = LinearColor { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const GREEN: LinearColor = LinearColor { r: 0.0, g: 1.0, b: 0.0, a: 1.0 };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Quantize to 8 bits per channel, saturating out-of-range values
    pub fn to_color(self) -> Color {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color::with_alpha(q(self.r), q(self.g), q(self.b), q(self.a))
    }
}

impl From<Color> for LinearColor {
    fn from(c: Color) -> Self {
        Self {
            r: c.r as f32 / 255.0,
            g: c.g as f32 / 255.0,
            b: c.b as f32 / 255.0,
            a: c.a as f32 / 255.0,
        }
    }
}

impl Add for LinearColor {
    type Output = LinearColor;
    fn add(self, other: LinearColor) -> LinearColor {
        LinearColor {
            r: self.r + other.r,
            g: self.g + other.g,
            b: self.b + other.b,
            a: self.a + other.a,
        }
    }
}

impl Mul<f32> for LinearColor {
    type Output = LinearColor;
    fn mul(self, s: f32) -> LinearColor {
        LinearColor {
            r: self.r * s,
            g: self.g * s,
            b: self.b * s,
            a: self.a * s,
        }
    }
}

/// A vertex flowing through the pipeline
///
/// `position` is homogeneous: object space on input, clip space after the
/// vertex shader, NDC after normalization and pixel space x/y while filling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Vec4,
    pub tex_coord: Vec2,
    pub normal: Vec3,
    pub binormal: Vec3,
    pub tangent: Vec3,
    pub bone_indices: [u32; 4],
    pub bone_weights: Vec4,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec4::W,
            tex_coord: Vec2::ZERO,
            normal: Vec3::ZERO,
            binormal: Vec3::ZERO,
            tangent: Vec3::ZERO,
            bone_indices: [0; 4],
            bone_weights: Vec4::ZERO,
        }
    }
}

impl Vertex {
    pub fn new(pos: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self {
            position: pos.extend(1.0),
            tex_coord: uv,
            normal,
            ..Default::default()
        }
    }

    pub fn from_pos(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vec4::new(x, y, z, 1.0),
            ..Default::default()
        }
    }

    /// Bind this vertex fully to a single bone
    pub fn with_bone(mut self, bone: u32) -> Self {
        self.bone_indices = [bone, 0, 0, 0];
        self.bone_weights = Vec4::X;
        self
    }

    /// Linearly interpolate every shading attribute; skinning data comes from `self`
    pub fn lerp(&self, other: &Vertex, t: f32) -> Vertex {
        Vertex {
            position: self.position.lerp(other.position, t),
            tex_coord: self.tex_coord.lerp(other.tex_coord, t),
            normal: self.normal.lerp(other.normal, t),
            binormal: self.binormal.lerp(other.binormal, t),
            tangent: self.tangent.lerp(other.tangent, t),
            bone_indices: self.bone_indices,
            bone_weights: self.bone_weights,
        }
    }
}

/// Line primitive
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Line {
    pub v0: Vertex,
    pub v1: Vertex,
}

impl Line {
    pub fn new(v0: Vertex, v1: Vertex) -> Self {
        Self { v0, v1 }
    }
}

/// Winding of a triangle in NDC space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    Clockwise,
    CounterClockwise,
    /// Zero area (collinear vertices)
    #[default]
    Coplanar,
}

/// Triangle primitive with its classified winding
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Triangle {
    pub v0: Vertex,
    pub v1: Vertex,
    pub v2: Vertex,
    pub orientation: Orientation,
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            v0,
            v1,
            v2,
            orientation: Orientation::Coplanar,
        }
    }
}

/// How an index buffer is grouped into primitives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    PointList,
    LineList,
    TriangleList,
    /// Declared, not assembled
    LineStrip,
    /// Declared, not assembled
    TriangleStrip,
    #[default]
    Undefined,
}

impl Topology {
    /// Indices consumed per primitive, None for topologies that are not assembled
    pub fn stride(self) -> Option<usize> {
        match self {
            Topology::PointList => Some(1),
            Topology::LineList => Some(2),
            Topology::TriangleList => Some(3),
            Topology::LineStrip | Topology::TriangleStrip | Topology::Undefined => None,
        }
    }
}

/// Which triangle winding gets discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CullMode {
    None,
    /// Discard counter-clockwise triangles, keep clockwise
    Front,
    /// Discard clockwise triangles, keep counter-clockwise
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMode {
    Solid,
    Wireframe,
}

/// Depth comparison between an incoming fragment and the stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl ComparisonFunc {
    pub fn passes(self, incoming: f32, stored: f32) -> bool {
        match self {
            ComparisonFunc::Never => false,
            ComparisonFunc::Less => incoming < stored,
            ComparisonFunc::Equal => incoming == stored,
            ComparisonFunc::LessEqual => incoming <= stored,
            ComparisonFunc::Greater => incoming > stored,
            ComparisonFunc::NotEqual => incoming != stored,
            ComparisonFunc::GreaterEqual => incoming >= stored,
            ComparisonFunc::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFilter {
    #[default]
    Point,
    Linear,
}

/// How UVs outside [0, 1] are folded back in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressMode {
    #[default]
    Clamp,
    Wrap,
    Mirror,
    MirrorOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureFormat {
    R8G8B8A8Unorm,
    R32Float,
    R8Unorm,
    /// Allocates no storage
    Unknown,
}

impl TextureFormat {
    pub fn bits_per_pixel(self) -> usize {
        match self {
            TextureFormat::R8G8B8A8Unorm | TextureFormat::R32Float => 32,
            TextureFormat::R8Unorm => 8,
            TextureFormat::Unknown => 0,
        }
    }
}

/// Rasterizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterSettings {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    /// Test fragments against the bound depth texture
    pub depth_enable: bool,
    /// Store passing fragment depth
    pub depth_write: bool,
    pub depth_func: ComparisonFunc,
    /// Filter handed to the reference diffuse shader
    pub sample_filter: SampleFilter,
    /// Draw triangle edges instead of filling
    pub wireframe: bool,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            depth_enable: false,
            depth_write: true,
            depth_func: ComparisonFunc::Less,
            sample_filter: SampleFilter::Point,
            wireframe: false,
        }
    }
}

impl RasterSettings {
    pub fn draws_wireframe(&self) -> bool {
        self.wireframe || self.fill_mode == FillMode::Wireframe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_u32_roundtrip() {
        let c = Color::with_alpha(1, 2, 3, 4);
        assert_eq!(c.to_u32(), 0x01020304);
        assert_eq!(Color::from_u32(0x01020304), c);
    }

    #[test]
    fn test_linear_color_saturates() {
        let c = LinearColor::new(2.0, -1.0, 0.5, 1.0).to_color();
        assert_eq!(c, Color::with_alpha(255, 0, 128, 255));
    }

    #[test]
    fn test_vertex_lerp_keeps_bones() {
        let a = Vertex::from_pos(0.0, 0.0, 0.0).with_bone(3);
        let mut b = Vertex::from_pos(10.0, 0.0, 0.0);
        b.tex_coord = Vec2::new(1.0, 1.0);
        let mid = a.lerp(&b, 0.5);
        assert!((mid.position.x - 5.0).abs() < 0.0001);
        assert!((mid.tex_coord.x - 0.5).abs() < 0.0001);
        assert_eq!(mid.bone_indices[0], 3);
    }

    #[test]
    fn test_topology_stride() {
        assert_eq!(Topology::PointList.stride(), Some(1));
        assert_eq!(Topology::LineList.stride(), Some(2));
        assert_eq!(Topology::TriangleList.stride(), Some(3));
        assert_eq!(Topology::TriangleStrip.stride(), None);
        assert_eq!(Topology::Undefined.stride(), None);
    }

    #[test]
    fn test_comparison_funcs() {
        assert!(ComparisonFunc::Less.passes(0.2, 0.5));
        assert!(!ComparisonFunc::Less.passes(0.5, 0.5));
        assert!(ComparisonFunc::LessEqual.passes(0.5, 0.5));
        assert!(!ComparisonFunc::Never.passes(0.0, 1.0));
        assert!(ComparisonFunc::Always.passes(9.0, 1.0));
    }
}

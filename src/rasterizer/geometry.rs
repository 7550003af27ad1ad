//! Geometry stage: vertex shading, clip-to-NDC normalization and primitive assembly

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rayon::prelude::*;

use super::math::{Mat4, Vec4};
use super::types::{Line, Orientation, Topology, Triangle, Vertex, MAX_BONES};

/// Per-draw matrices handed to the vertex shader
#[derive(Debug, Clone)]
pub struct GeometryConstantBuffer {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    /// Skinning palette addressed by bone index
    pub bones: Vec<Mat4>,
}

impl Default for GeometryConstantBuffer {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            bones: vec![Mat4::IDENTITY; MAX_BONES],
        }
    }
}

impl GeometryConstantBuffer {
    /// Copy a palette in, leaving slots past its end untouched
    pub fn set_bones(&mut self, bones: &[Mat4]) {
        let n = bones.len().min(self.bones.len());
        self.bones[..n].copy_from_slice(&bones[..n]);
    }
}

/// Caller-supplied vertex transform: object space in, clip space out
pub type VertexShader = Arc<dyn Fn(&Vertex, &GeometryConstantBuffer) -> Vertex + Send + Sync>;

/// Divide a homogeneous position by w so that w becomes exactly 1.0
///
/// A vertex with w == 0 has no finite projection and is returned untouched.
pub fn clip_to_ndc(mut vertex: Vertex) -> Vertex {
    let w = vertex.position.w;
    if w != 0.0 {
        vertex.position = Vec4::new(
            vertex.position.x / w,
            vertex.position.y / w,
            vertex.position.z / w,
            1.0,
        );
    }
    vertex
}

/// Classify winding by the sign of the 2D cross product of the NDC edges
pub fn triangle_orientation(v0: Vec4, v1: Vec4, v2: Vec4) -> Orientation {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let cross = e1.x * e2.y - e1.y * e2.x;

    if cross > 0.0 {
        Orientation::Clockwise
    } else if cross < 0.0 {
        Orientation::CounterClockwise
    } else {
        Orientation::Coplanar
    }
}

/// Turns bound index/vertex data into shaded, normalized primitive lists
pub struct GeometryStage {
    vertex_buffer: Option<Arc<Vec<Vertex>>>,
    index_buffer: Option<Arc<Vec<u32>>>,
    constant_buffer: Option<Weak<RwLock<GeometryConstantBuffer>>>,
    shader: Option<VertexShader>,
    topology: Topology,

    points: Arc<RwLock<Vec<Vertex>>>,
    lines: Arc<RwLock<Vec<Line>>>,
    triangles: Arc<RwLock<Vec<Triangle>>>,
}

impl Default for GeometryStage {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryStage {
    pub fn new() -> Self {
        Self {
            vertex_buffer: None,
            index_buffer: None,
            constant_buffer: None,
            shader: None,
            topology: Topology::Undefined,
            points: Arc::new(RwLock::new(Vec::new())),
            lines: Arc::new(RwLock::new(Vec::new())),
            triangles: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn set_vertex_buffer(&mut self, vertices: Arc<Vec<Vertex>>) {
        self.vertex_buffer = Some(vertices);
    }

    pub fn set_index_buffer(&mut self, indices: Arc<Vec<u32>>) {
        self.index_buffer = Some(indices);
    }

    pub fn set_constant_buffer(&mut self, constants: &Arc<RwLock<GeometryConstantBuffer>>) {
        self.constant_buffer = Some(Arc::downgrade(constants));
    }

    pub fn set_shader(&mut self, shader: VertexShader) {
        self.shader = Some(shader);
    }

    pub fn set_topology(&mut self, topology: Topology) {
        self.topology = topology;
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn points(&self) -> Weak<RwLock<Vec<Vertex>>> {
        Arc::downgrade(&self.points)
    }

    pub fn lines(&self) -> Weak<RwLock<Vec<Line>>> {
        Arc::downgrade(&self.lines)
    }

    pub fn triangles(&self) -> Weak<RwLock<Vec<Triangle>>> {
        Arc::downgrade(&self.triangles)
    }

    /// Shade and assemble the bound buffers
    ///
    /// Output lists are always cleared first. With a binding missing nothing
    /// else happens. Vertex/index buffers and topology are unbound afterwards.
    pub fn execute(&mut self) {
        self.points.write().clear();
        self.lines.write().clear();
        self.triangles.write().clear();

        let constants = self.constant_buffer.as_ref().and_then(Weak::upgrade);
        let (Some(shader), Some(vertices), Some(indices), Some(constants)) = (
            self.shader.clone(),
            self.vertex_buffer.take(),
            self.index_buffer.take(),
            constants,
        ) else {
            log::debug!("Geometry stage skipped: missing binding");
            self.topology = Topology::Undefined;
            return;
        };
        let topology = std::mem::take(&mut self.topology);
        let Some(stride) = topology.stride() else {
            log::debug!("Topology {:?} is not assembled", topology);
            return;
        };
        if indices.len() % stride != 0 {
            log::debug!("{} trailing indices ignored", indices.len() % stride);
        }

        let guard = constants.read();
        let constants: &GeometryConstantBuffer = &guard;
        let shade = |v: &Vertex| clip_to_ndc(shader(v, constants));

        match topology {
            Topology::PointList => {
                let out = assemble::<1>(&vertices, &indices, &shade);
                self.points.write().extend(out.into_iter().map(|[v]| v));
            }
            Topology::LineList => {
                let out = assemble::<2>(&vertices, &indices, &shade);
                self.lines
                    .write()
                    .extend(out.into_iter().map(|[v0, v1]| Line::new(v0, v1)));
            }
            Topology::TriangleList => {
                let out = assemble::<3>(&vertices, &indices, &shade);
                self.triangles.write().extend(out.into_iter().map(|[v0, v1, v2]| {
                    let mut tri = Triangle::new(v0, v1, v2);
                    tri.orientation = triangle_orientation(v0.position, v1.position, v2.position);
                    tri
                }));
            }
            Topology::LineStrip | Topology::TriangleStrip | Topology::Undefined => {}
        }
    }
}

/// Fetch and shade N indices per primitive in parallel, keeping index order
///
/// Primitives that reference a vertex past the end of the buffer are dropped.
fn assemble<const N: usize>(
    vertices: &[Vertex],
    indices: &[u32],
    shade: &(dyn Fn(&Vertex) -> Vertex + Sync),
) -> Vec<[Vertex; N]> {
    indices
        .par_chunks_exact(N)
        .filter_map(|chunk| {
            let mut out = [Vertex::default(); N];
            for (slot, &index) in out.iter_mut().zip(chunk) {
                let Some(v) = vertices.get(index as usize) else {
                    log::warn!(
                        "Index {} out of range ({} vertices), primitive skipped",
                        index,
                        vertices.len()
                    );
                    return None;
                };
                *slot = shade(v);
            }
            Some(out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::math::Vec3;

    fn passthrough() -> VertexShader {
        Arc::new(|v: &Vertex, _: &GeometryConstantBuffer| *v)
    }

    fn bound_stage(vertices: Vec<Vertex>, indices: Vec<u32>, topology: Topology) -> (GeometryStage, Arc<RwLock<GeometryConstantBuffer>>) {
        let constants = Arc::new(RwLock::new(GeometryConstantBuffer::default()));
        let mut stage = GeometryStage::new();
        stage.set_vertex_buffer(Arc::new(vertices));
        stage.set_index_buffer(Arc::new(indices));
        stage.set_constant_buffer(&constants);
        stage.set_shader(passthrough());
        stage.set_topology(topology);
        (stage, constants)
    }

    #[test]
    fn test_clip_to_ndc_sets_w_to_one() {
        let mut v = Vertex::default();
        v.position = Vec4::new(2.0, -4.0, 1.0, 2.0);
        let n = clip_to_ndc(v);
        assert_eq!(n.position, Vec4::new(1.0, -2.0, 0.5, 1.0));

        v.position = Vec4::new(1.0, 1.0, 1.0, -0.5);
        assert_eq!(clip_to_ndc(v).position.w, 1.0);
    }

    #[test]
    fn test_clip_to_ndc_zero_w_untouched() {
        let mut v = Vertex::default();
        v.position = Vec4::new(1.0, 2.0, 3.0, 0.0);
        assert_eq!(clip_to_ndc(v).position, v.position);
    }

    #[test]
    fn test_orientation_literals() {
        let p = |x: f32, y: f32| Vec4::new(x, y, 0.0, 1.0);
        assert_eq!(triangle_orientation(p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)), Orientation::Clockwise);
        assert_eq!(
            triangle_orientation(p(0.0, 0.0), p(0.0, 1.0), p(1.0, 0.0)),
            Orientation::CounterClockwise
        );
        assert_eq!(triangle_orientation(p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0)), Orientation::Coplanar);
    }

    #[test]
    fn test_triangle_list_assembly() {
        let vertices = vec![
            Vertex::from_pos(0.0, 0.0, 0.0),
            Vertex::from_pos(0.0, 1.0, 0.0),
            Vertex::from_pos(1.0, 0.0, 0.0),
            Vertex::from_pos(1.0, 1.0, 0.0),
        ];
        let (mut stage, _constants) = bound_stage(vertices, vec![0, 1, 2, 2, 1, 3], Topology::TriangleList);
        stage.execute();

        let tris = stage.triangles().upgrade().unwrap();
        let tris = tris.read();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[0].orientation, Orientation::CounterClockwise);
        assert_eq!(tris[1].v2.position, Vec4::new(1.0, 1.0, 0.0, 1.0));
        assert_eq!(stage.topology(), Topology::Undefined);
    }

    #[test]
    fn test_shader_sees_constants() {
        let (mut stage, constants) =
            bound_stage(vec![Vertex::from_pos(1.0, 0.0, 0.0)], vec![0], Topology::PointList);
        constants.write().world = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        stage.set_shader(Arc::new(|v: &Vertex, cb: &GeometryConstantBuffer| {
            let mut out = *v;
            out.position = cb.world * v.position * 2.0;
            out
        }));
        stage.execute();

        let points = stage.points().upgrade().unwrap();
        let p = points.read()[0].position;
        assert!((p.x - 1.0).abs() < 0.001);
        assert!((p.y - 2.0).abs() < 0.001);
        assert_eq!(p.w, 1.0);
    }

    #[test]
    fn test_out_of_range_index_skips_primitive() {
        let vertices = vec![Vertex::from_pos(0.0, 0.0, 0.0), Vertex::from_pos(1.0, 0.0, 0.0)];
        let (mut stage, _constants) = bound_stage(vertices, vec![0, 1, 0, 9], Topology::LineList);
        stage.execute();
        assert_eq!(stage.lines().upgrade().unwrap().read().len(), 1);
    }

    #[test]
    fn test_missing_binding_clears_output() {
        let vertices = vec![Vertex::from_pos(0.0, 0.0, 0.0)];
        let (mut stage, _constants) = bound_stage(vertices.clone(), vec![0], Topology::PointList);
        stage.execute();
        assert_eq!(stage.points().upgrade().unwrap().read().len(), 1);

        // Buffers were unbound by the previous execute
        stage.set_topology(Topology::PointList);
        stage.execute();
        assert!(stage.points().upgrade().unwrap().read().is_empty());
    }

    #[test]
    fn test_expired_constant_buffer_is_missing() {
        let (mut stage, constants) =
            bound_stage(vec![Vertex::from_pos(0.0, 0.0, 0.0)], vec![0], Topology::PointList);
        drop(constants);
        stage.execute();
        assert!(stage.points().upgrade().unwrap().read().is_empty());
    }

    #[test]
    fn test_strip_topology_produces_nothing() {
        let vertices = vec![Vertex::from_pos(0.0, 0.0, 0.0); 4];
        let (mut stage, _constants) = bound_stage(vertices, vec![0, 1, 2, 3], Topology::TriangleStrip);
        stage.execute();
        assert!(stage.triangles().upgrade().unwrap().read().is_empty());
        assert!(stage.lines().upgrade().unwrap().read().is_empty());
        assert!(stage.points().upgrade().unwrap().read().is_empty());
    }
}

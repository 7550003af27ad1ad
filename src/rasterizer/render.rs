//! Rasterizer stage
//! Viewport mapping, culling, scanline fill, clipped Bresenham lines and points

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rayon::prelude::*;

use super::math::{clip_line, clip_to_pixel, BresenhamLine, IVec2};
use super::texture::{Material, Texture};
use super::types::{CullMode, LinearColor, Line, Orientation, RasterSettings, Triangle, Vertex};

/// Per-draw rasterizer parameters, reserved for future use
#[derive(Debug, Clone, Default)]
pub struct RasterizerConstantBuffer {}

/// Caller-supplied pixel shading function
pub type PixelShader =
    Arc<dyn Fn(&Vertex, Option<&Material>, &RasterizerConstantBuffer) -> LinearColor + Send + Sync>;

/// A shaded pixel waiting to be written
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub position: IVec2,
    pub depth: f32,
    pub color: LinearColor,
}

/// Read-only state shared by every primitive of one execute call
struct ShadeContext<'a> {
    width: i32,
    height: i32,
    shader: &'a PixelShader,
    material: Option<&'a Material>,
    constants: &'a RasterizerConstantBuffer,
    settings: &'a RasterSettings,
}

impl ShadeContext<'_> {
    fn shade(&self, mut v: Vertex, xy: IVec2) -> Fragment {
        v.position.x = xy.x as f32;
        v.position.y = xy.y as f32;
        Fragment {
            position: xy,
            depth: v.position.z,
            color: (self.shader)(&v, self.material, self.constants),
        }
    }

    fn to_pixel(&self, v: &Vertex) -> Vertex {
        let p = clip_to_pixel(v.position, self.width, self.height);
        let mut out = *v;
        out.position.x = p.x as f32;
        out.position.y = p.y as f32;
        out
    }

    fn survives_cull(&self, orientation: Orientation) -> bool {
        match self.settings.cull_mode {
            CullMode::None => true,
            CullMode::Front => orientation == Orientation::Clockwise,
            CullMode::Back => orientation == Orientation::CounterClockwise,
        }
    }

    fn point(&self, v: &Vertex) -> Vec<Fragment> {
        let p = clip_to_pixel(v.position, self.width, self.height);
        if p.x < 0 || p.y < 0 || p.x >= self.width || p.y >= self.height {
            return Vec::new();
        }
        vec![self.shade(*v, p)]
    }

    fn line(&self, v0: &Vertex, v1: &Vertex) -> Vec<Fragment> {
        let mut out = Vec::new();
        self.draw_line(v0, v1, &mut out);
        out
    }

    fn draw_line(&self, v0: &Vertex, v1: &Vertex, out: &mut Vec<Fragment>) {
        let p0 = clip_to_pixel(v0.position, self.width, self.height);
        let p1 = clip_to_pixel(v1.position, self.width, self.height);
        let max = IVec2::new(self.width - 1, self.height - 1);
        let Some((c0, c1)) = clip_line(p0, p1, IVec2::ZERO, max) else {
            return;
        };

        // Attributes follow the unclipped segment; endpoints may sit near the i32 limits
        let origin = p0.as_vec2();
        let dir = p1.as_vec2() - origin;
        let len_sq = dir.length_squared();
        for p in BresenhamLine::new(c0, c1) {
            let t = if len_sq > 0.0 {
                ((p.as_vec2() - origin).dot(dir) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            out.push(self.shade(v0.lerp(v1, t), p));
        }
    }

    fn triangle(&self, tri: &Triangle) -> Vec<Fragment> {
        let mut out = Vec::new();
        if !self.survives_cull(tri.orientation) {
            return out;
        }

        if self.settings.draws_wireframe() {
            self.draw_line(&tri.v0, &tri.v1, &mut out);
            self.draw_line(&tri.v1, &tri.v2, &mut out);
            self.draw_line(&tri.v2, &tri.v0, &mut out);
            return out;
        }

        let mut v1 = self.to_pixel(&tri.v0);
        let mut v2 = self.to_pixel(&tri.v1);
        let mut v3 = self.to_pixel(&tri.v2);

        // Sort ascending by y
        if v1.position.y > v2.position.y {
            std::mem::swap(&mut v1, &mut v2);
        }
        if v2.position.y > v3.position.y {
            std::mem::swap(&mut v2, &mut v3);
        }
        if v1.position.y > v2.position.y {
            std::mem::swap(&mut v1, &mut v2);
        }

        if v2.position.y == v3.position.y {
            self.fill_flat_bottom(&v1, &v2, &v3, &mut out);
        } else if v1.position.y == v2.position.y {
            self.fill_flat_top(&v1, &v2, &v3, &mut out);
        } else {
            let t = (v2.position.y - v1.position.y) / (v3.position.y - v1.position.y);
            let mut split = v1.lerp(&v3, t);
            split.position.x = split.position.x.round();
            split.position.y = v2.position.y;
            self.fill_flat_bottom(&v1, &v2, &split, &mut out);
            self.fill_flat_top(&v2, &split, &v3, &mut out);
        }
        out
    }

    /// Apex on top, horizontal edge `b1`-`b2` at the bottom
    fn fill_flat_bottom(&self, apex: &Vertex, b1: &Vertex, b2: &Vertex, out: &mut Vec<Fragment>) {
        let height = b1.position.y - apex.position.y;
        let y0 = (apex.position.y as i32).max(0);
        let y1 = (b1.position.y as i32).min(self.height - 1);

        for y in y0..=y1 {
            let t = if height > 0.0 { (y as f32 - apex.position.y) / height } else { 1.0 };
            self.fill_span(y, &apex.lerp(b1, t), &apex.lerp(b2, t), out);
        }
    }

    /// Horizontal edge `t1`-`t2` on top, apex at the bottom
    fn fill_flat_top(&self, t1: &Vertex, t2: &Vertex, apex: &Vertex, out: &mut Vec<Fragment>) {
        let height = apex.position.y - t1.position.y;
        let y0 = (t1.position.y as i32).max(0);
        let y1 = (apex.position.y as i32).min(self.height - 1);

        for y in y0..=y1 {
            let t = if height > 0.0 { (y as f32 - t1.position.y) / height } else { 0.0 };
            self.fill_span(y, &t1.lerp(apex, t), &t2.lerp(apex, t), out);
        }
    }

    fn fill_span(&self, y: i32, a: &Vertex, b: &Vertex, out: &mut Vec<Fragment>) {
        let (left, right) = if a.position.x <= b.position.x { (a, b) } else { (b, a) };
        let xl = left.position.x;
        let xr = right.position.x;
        let width = xr - xl;

        let x_start = (xl.round() as i32).max(0);
        let x_end = (xr.round() as i32).min(self.width - 1);
        for x in x_start..=x_end {
            let s = if width > 0.0 {
                ((x as f32 - xl) / width).clamp(0.0, 1.0)
            } else {
                0.0
            };
            out.push(self.shade(left.lerp(right, s), IVec2::new(x, y)));
        }
    }
}

/// Converts bound primitive lists into pixels on the bound target
#[derive(Default)]
pub struct RasterizerStage {
    triangles: Option<Weak<RwLock<Vec<Triangle>>>>,
    lines: Option<Weak<RwLock<Vec<Line>>>>,
    points: Option<Weak<RwLock<Vec<Vertex>>>>,
    render_target: Option<Weak<RwLock<Texture>>>,
    depth: Option<Weak<RwLock<Texture>>>,
    material: Weak<Material>,
    constant_buffer: Option<Weak<RwLock<RasterizerConstantBuffer>>>,
    shader: Option<PixelShader>,
    pub settings: RasterSettings,
}

impl RasterizerStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_triangles(&mut self, triangles: Weak<RwLock<Vec<Triangle>>>) {
        self.triangles = Some(triangles);
    }

    pub fn set_lines(&mut self, lines: Weak<RwLock<Vec<Line>>>) {
        self.lines = Some(lines);
    }

    pub fn set_points(&mut self, points: Weak<RwLock<Vec<Vertex>>>) {
        self.points = Some(points);
    }

    /// Bind all three output lists of a geometry stage
    pub fn bind_geometry(&mut self, geometry: &super::geometry::GeometryStage) {
        self.set_triangles(geometry.triangles());
        self.set_lines(geometry.lines());
        self.set_points(geometry.points());
    }

    pub fn set_render_target(&mut self, target: &Arc<RwLock<Texture>>) {
        self.render_target = Some(Arc::downgrade(target));
    }

    pub fn set_depth_texture(&mut self, depth: &Arc<RwLock<Texture>>) {
        self.depth = Some(Arc::downgrade(depth));
    }

    pub fn unbind_depth_texture(&mut self) {
        self.depth = None;
    }

    pub fn set_material(&mut self, material: Weak<Material>) {
        self.material = material;
    }

    pub fn set_constant_buffer(&mut self, constants: &Arc<RwLock<RasterizerConstantBuffer>>) {
        self.constant_buffer = Some(Arc::downgrade(constants));
    }

    pub fn set_shader(&mut self, shader: PixelShader) {
        self.shader = Some(shader);
    }

    pub fn set_settings(&mut self, settings: RasterSettings) {
        self.settings = settings;
    }

    /// Draw every bound primitive into the bound target
    ///
    /// Primitives are shaded in parallel, then written in list order
    /// (triangles, lines, points) so overlapping output is deterministic.
    pub fn execute(&self) {
        let target = self.render_target.as_ref().and_then(Weak::upgrade);
        let mut depth = self.depth.as_ref().and_then(Weak::upgrade);

        if let (Some(t), Some(d)) = (&target, &depth) {
            if Arc::ptr_eq(t, d) {
                log::warn!("Render target is also bound as depth, depth ignored");
                depth = None;
            }
        }

        let (width, height) = match (&target, &depth) {
            (Some(t), Some(d)) => {
                let (t, d) = (t.read(), d.read());
                if t.width() != d.width() || t.height() != d.height() {
                    log::warn!(
                        "Render target {}x{} does not match depth {}x{}, nothing drawn",
                        t.width(),
                        t.height(),
                        d.width(),
                        d.height()
                    );
                    return;
                }
                (d.width(), d.height())
            }
            (None, Some(d)) => {
                let d = d.read();
                (d.width(), d.height())
            }
            (Some(t), None) => {
                let t = t.read();
                (t.width(), t.height())
            }
            (None, None) => {
                log::debug!("Rasterizer skipped: no render target or depth texture");
                return;
            }
        };

        let Some(shader) = &self.shader else {
            log::debug!("Rasterizer skipped: no pixel shader");
            return;
        };

        let material = self.material.upgrade();
        let constants = match self.constant_buffer.as_ref().and_then(Weak::upgrade) {
            Some(c) => c.read().clone(),
            None => RasterizerConstantBuffer::default(),
        };

        let ctx = ShadeContext {
            width: width as i32,
            height: height as i32,
            shader,
            material: material.as_deref(),
            constants: &constants,
            settings: &self.settings,
        };

        let mut batches: Vec<Vec<Fragment>> = Vec::new();
        let mut counts = [0usize; 3];

        if let Some(tris) = self.triangles.as_ref().and_then(Weak::upgrade) {
            let tris = tris.read();
            counts[0] = tris.len();
            batches.par_extend(tris.par_iter().map(|t| ctx.triangle(t)));
        }
        if let Some(lines) = self.lines.as_ref().and_then(Weak::upgrade) {
            let lines = lines.read();
            counts[1] = lines.len();
            batches.par_extend(lines.par_iter().map(|l| ctx.line(&l.v0, &l.v1)));
        }
        if let Some(points) = self.points.as_ref().and_then(Weak::upgrade) {
            let points = points.read();
            counts[2] = points.len();
            batches.par_extend(points.par_iter().map(|p| ctx.point(p)));
        }

        let mut target = target.as_ref().map(|t| t.write());
        let mut depth = depth.as_ref().map(|d| d.write());
        for frag in batches.iter().flatten() {
            self.write_fragment(frag, target.as_deref_mut(), depth.as_deref_mut());
        }

        log::debug!(
            "Rasterized {} triangles, {} lines, {} points",
            counts[0],
            counts[1],
            counts[2]
        );
    }

    fn write_fragment(&self, frag: &Fragment, target: Option<&mut Texture>, depth: Option<&mut Texture>) {
        if let Some(depth) = depth {
            if self.settings.depth_enable {
                let stored = depth.read_data(frag.position);
                if !self.settings.depth_func.passes(frag.depth, stored) {
                    return;
                }
                if self.settings.depth_write {
                    depth.write_data(frag.position, frag.depth);
                }
            }
        }
        if let Some(target) = target {
            target.write_color(frag.position, frag.color);
        }
    }
}

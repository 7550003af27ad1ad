//! Math for the pipeline: glam types plus viewport mapping and line helpers

pub use glam::{IVec2, Mat4, Quat, Vec2, Vec3, Vec4};

/// Region code bits for Cohen-Sutherland clipping
pub const REGION_INSIDE: u8 = 0;
pub const REGION_LEFT: u8 = 1;
pub const REGION_RIGHT: u8 = 2;
pub const REGION_BOTTOM: u8 = 4;
pub const REGION_TOP: u8 = 8;

/// Map a normalized clip position to UV space (top-left origin, Y flipped)
pub fn clip_to_uv(clip: Vec4) -> Vec2 {
    Vec2::new(0.5 * (clip.x + 1.0), 0.5 * (1.0 - clip.y))
}

/// Map UV to integer pixel coordinates: `uv * (size - 1)`, truncated
pub fn uv_to_pixel(uv: Vec2, width: i32, height: i32) -> IVec2 {
    IVec2::new(
        (uv.x * (width - 1) as f32) as i32,
        (uv.y * (height - 1) as f32) as i32,
    )
}

/// Map a normalized clip position straight to pixel coordinates
pub fn clip_to_pixel(clip: Vec4, width: i32, height: i32) -> IVec2 {
    uv_to_pixel(clip_to_uv(clip), width, height)
}

/// Compute the region code of a point against the rectangle [min, max]
pub fn region_code(p: IVec2, min: IVec2, max: IVec2) -> u8 {
    let mut code = REGION_INSIDE;

    if p.x < min.x {
        code |= REGION_LEFT;
    } else if p.x > max.x {
        code |= REGION_RIGHT;
    }

    if p.y < min.y {
        code |= REGION_BOTTOM;
    } else if p.y > max.y {
        code |= REGION_TOP;
    }

    code
}

/// Clip a line segment against the inclusive rectangle [min, max]
///
/// Returns the clipped endpoints, or None when the segment lies entirely
/// outside. Endpoints already inside come back unchanged.
pub fn clip_line(mut p0: IVec2, mut p1: IVec2, min: IVec2, max: IVec2) -> Option<(IVec2, IVec2)> {
    let mut code0 = region_code(p0, min, max);
    let mut code1 = region_code(p1, min, max);

    loop {
        if code0 | code1 == REGION_INSIDE {
            return Some((p0, p1));
        }
        if code0 & code1 != 0 {
            return None;
        }

        let code_out = if code0 != REGION_INSIDE { code0 } else { code1 };

        // i64 keeps the products from overflowing on far off-screen endpoints
        let (x0, y0) = (p0.x as i64, p0.y as i64);
        let (x1, y1) = (p1.x as i64, p1.y as i64);

        let (x, y) = if code_out & REGION_TOP != 0 {
            let y = max.y as i64;
            (x0 + (x1 - x0) * (y - y0) / (y1 - y0), y)
        } else if code_out & REGION_BOTTOM != 0 {
            let y = min.y as i64;
            (x0 + (x1 - x0) * (y - y0) / (y1 - y0), y)
        } else if code_out & REGION_LEFT != 0 {
            let x = min.x as i64;
            (x, y0 + (y1 - y0) * (x - x0) / (x1 - x0))
        } else {
            let x = max.x as i64;
            (x, y0 + (y1 - y0) * (x - x0) / (x1 - x0))
        };

        let clipped = IVec2::new(x as i32, y as i32);
        if code_out == code0 {
            p0 = clipped;
            code0 = region_code(p0, min, max);
        } else {
            p1 = clipped;
            code1 = region_code(p1, min, max);
        }
    }
}

/// Integer Bresenham walk from `from` to `to`, both endpoints included
#[derive(Debug, Clone)]
pub struct BresenhamLine {
    x: i32,
    y: i32,
    x1: i32,
    y1: i32,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    done: bool,
}

impl BresenhamLine {
    pub fn new(from: IVec2, to: IVec2) -> Self {
        let dx = (to.x - from.x).abs();
        let dy = -(to.y - from.y).abs();
        Self {
            x: from.x,
            y: from.y,
            x1: to.x,
            y1: to.y,
            dx,
            dy,
            sx: if from.x < to.x { 1 } else { -1 },
            sy: if from.y < to.y { 1 } else { -1 },
            err: dx + dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = IVec2;

    fn next(&mut self) -> Option<IVec2> {
        if self.done {
            return None;
        }

        let current = IVec2::new(self.x, self.y);

        if self.x == self.x1 && self.y == self.y1 {
            self.done = true;
            return Some(current);
        }

        let e2 = 2 * self.err;
        if e2 >= self.dy {
            self.err += self.dy;
            self.x += self.sx;
        }
        if e2 <= self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }

        Some(current)
    }
}

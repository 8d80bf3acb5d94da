//! Edge equations, triangle setup and barycentric coordinates in NDC space.

use glam::Vec2;

/// Line equation `E(x, y) = a·x + b·y + c`.
///
/// Built from two vertices so that points left of the directed edge (the
/// counter-clockwise interior) evaluate negative.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Line2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl Line2 {
    pub fn from_points(va: Vec2, vb: Vec2) -> Self {
        Self {
            a: vb.y - va.y,
            b: va.x - vb.x,
            c: va.y * vb.x - va.x * vb.y,
        }
    }

    pub fn eval(&self, p: Vec2) -> f32 {
        self.a * p.x + self.b * p.y + self.c
    }
}

/// A triangle with its three precomputed edge equations.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Triangle2 {
    pub va: Vec2,
    pub vb: Vec2,
    pub vc: Vec2,
    pub ab: Line2,
    pub bc: Line2,
    pub ca: Line2,
}

impl Triangle2 {
    pub fn new(va: Vec2, vb: Vec2, vc: Vec2) -> Self {
        Self {
            va,
            vb,
            vc,
            ab: Line2::from_points(va, vb),
            bc: Line2::from_points(vb, vc),
            ca: Line2::from_points(vc, va),
        }
    }

    /// Strict interior test: all three edges evaluate negative. Points on an
    /// edge and triangles wound clockwise never pass.
    pub fn contains(&self, p: Vec2) -> bool {
        self.ab.eval(p) < 0.0 && self.bc.eval(p) < 0.0 && self.ca.eval(p) < 0.0
    }

    /// Barycentric weights of `p`: the ratios of each edge evaluation at `p`
    /// to its evaluation at the opposite vertex. They sum to 1 up to
    /// floating point and reconstruct any per-vertex attribute affinely.
    pub fn barycentric(&self, p: Vec2) -> Barycentric {
        Barycentric {
            u: self.bc.eval(p) / self.bc.eval(self.va),
            v: self.ca.eval(p) / self.ca.eval(self.vb),
            w: self.ab.eval(p) / self.ab.eval(self.vc),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Barycentric {
    pub u: f32,
    pub v: f32,
    pub w: f32,
}

/// Axis-aligned bounding box on (x, y).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb2 {
    pub fn from_points(points: [Vec2; 3]) -> Self {
        Self {
            min: points[0].min(points[1]).min(points[2]),
            max: points[0].max(points[1]).max(points[2]),
        }
    }

    pub fn clamp(&self, min: Vec2, max: Vec2) -> Self {
        Self {
            min: self.min.clamp(min, max),
            max: self.max.clamp(min, max),
        }
    }
}

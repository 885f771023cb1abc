// src/intersection.rs

use glam::Vec3;

use crate::config::PORTAL_HALF_DEPTH;
use crate::geometry::{Aabb, Basis};

/// Result of clipping a segment against a box, in segment fractions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxHit {
    pub enter: f32,
    pub exit: f32,
    /// Normal of the face the segment enters through. Zero when it starts inside.
    pub normal: Vec3,
    pub start_inside: bool,
}

/// Slab test of the segment `start..end` against `[mins, maxs]` grown by `tolerance`.
///
/// Starting on a face and moving away from the box is not a hit.
pub fn intersect_segment_with_box(start: Vec3, end: Vec3, mins: Vec3, maxs: Vec3, tolerance: f32) -> Option<BoxHit> {
    let delta = end - start;
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let s = start[axis];
        let d = delta[axis];
        let lo = mins[axis] - tolerance;
        let hi = maxs[axis] + tolerance;

        if d.abs() < 1e-8 {
            if s < lo || s > hi {
                return None;
            }
            continue;
        }

        let (mut t1, mut t2) = ((lo - s) / d, (hi - s) / d);
        let mut face = Vec3::ZERO;
        face[axis] = if d > 0.0 { -1.0 } else { 1.0 };
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_enter {
            t_enter = t1;
            normal = face;
        }
        t_exit = t_exit.min(t2);
        if t_enter > t_exit {
            return None;
        }
    }

    if t_enter > 1.0 || t_exit <= 0.0 {
        return None;
    }

    let start_inside = t_enter < 0.0;
    Some(BoxHit {
        enter: t_enter.max(0.0),
        exit: t_exit,
        normal: if start_inside { Vec3::ZERO } else { normal },
        start_inside,
    })
}

/// Oriented box as center, unit axes and half extents along each axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obb {
    pub center: Vec3,
    pub axes: [Vec3; 3],
    pub half_extents: Vec3,
}

impl Obb {
    /// Box given in the local frame of `origin`/`basis` (x forward, y left, z up).
    pub fn from_local_bounds(origin: Vec3, basis: &Basis, mins: Vec3, maxs: Vec3) -> Self {
        let local_center = (mins + maxs) * 0.5;
        Self {
            center: origin + basis.to_world_direction(local_center),
            axes: basis.local_axes(),
            half_extents: (maxs - mins) * 0.5,
        }
    }

    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            axes: [Vec3::X, Vec3::Y, Vec3::Z],
            half_extents: aabb.extents(),
        }
    }

    fn project_radius(&self, axis: Vec3) -> f32 {
        self.axes
            .iter()
            .zip(self.half_extents.to_array())
            .map(|(a, e)| a.dot(axis).abs() * e)
            .sum()
    }
}

/// Separating axis test. Boxes closer than `tolerance` count as intersecting.
pub fn obb_intersects_obb(a: &Obb, b: &Obb, tolerance: f32) -> bool {
    let between = b.center - a.center;

    let mut candidates = Vec::with_capacity(15);
    candidates.extend_from_slice(&a.axes);
    candidates.extend_from_slice(&b.axes);
    for ea in a.axes {
        for eb in b.axes {
            let cross = ea.cross(eb);
            // Parallel edges produce no new axis.
            if cross.length_squared() > 1e-6 {
                candidates.push(cross.normalize());
            }
        }
    }

    candidates.into_iter().all(|axis| {
        let distance = between.dot(axis).abs();
        distance <= a.project_radius(axis) + b.project_radius(axis) + tolerance
    })
}

/// The volume a portal claims on its surface: half depth along forward, half size in plane.
pub fn portal_hole_obb(origin: Vec3, basis: &Basis, half_width: f32, half_height: f32) -> Obb {
    let extents = Vec3::new(PORTAL_HALF_DEPTH, half_width, half_height);
    Obb::from_local_bounds(origin, basis, -extents, extents)
}

pub fn is_box_intersecting_portal(aabb: &Aabb, origin: Vec3, basis: &Basis, half_width: f32, half_height: f32) -> bool {
    let portal = portal_hole_obb(origin, basis, half_width, half_height);
    obb_intersects_obb(&Obb::from_aabb(aabb), &portal, 0.0)
}

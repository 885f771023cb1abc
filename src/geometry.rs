// src/geometry.rs

use glam::Vec3;

/// Orthonormal frame of a portal. `forward` is the outward surface normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Basis {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Basis {
    pub fn from_angles(angles: Vec3) -> Self {
        let (forward, right, up) = angle_vectors(angles);
        Self {
            forward: forward.normalize_or_zero(),
            right: right.normalize_or_zero(),
            up: up.normalize_or_zero(),
        }
    }

    /// Entity-space axes: x forward, y left, z up.
    pub fn local_axes(&self) -> [Vec3; 3] {
        [self.forward, -self.right, self.up]
    }

    pub fn to_local(&self, origin: Vec3, point: Vec3) -> Vec3 {
        let d = point - origin;
        let [x, y, z] = self.local_axes();
        Vec3::new(d.dot(x), d.dot(y), d.dot(z))
    }

    pub fn to_world_direction(&self, local: Vec3) -> Vec3 {
        let [x, y, z] = self.local_axes();
        x * local.x + y * local.y + z * local.z
    }
}

/// Pitch/yaw/roll (degrees) to forward, right, up.
pub fn angle_vectors(angles: Vec3) -> (Vec3, Vec3, Vec3) {
    let (sp, cp) = angles.x.to_radians().sin_cos();
    let (sy, cy) = angles.y.to_radians().sin_cos();
    let (sr, cr) = angles.z.to_radians().sin_cos();

    let forward = Vec3::new(cp * cy, cp * sy, -sp);
    let right = Vec3::new(
        -sr * sp * cy + cr * sy,
        -sr * sp * sy - cr * cy,
        -sr * cp,
    );
    let up = Vec3::new(
        cr * sp * cy + sr * sy,
        cr * sp * sy - sr * cy,
        cr * cp,
    );
    (forward, right, up)
}

/// Inverse of [`angle_vectors`] for a forward vector and an up hint.
pub fn vector_angles(forward: Vec3, pseudo_up: Vec3) -> Vec3 {
    let left = pseudo_up.cross(forward).normalize_or_zero();
    let xy_dist = (forward.x * forward.x + forward.y * forward.y).sqrt();

    if xy_dist > 0.001 {
        let yaw = forward.y.atan2(forward.x).to_degrees();
        let pitch = (-forward.z).atan2(xy_dist).to_degrees();
        let up_z = left.y * forward.x - left.x * forward.y;
        let roll = left.z.atan2(up_z).to_degrees();
        Vec3::new(pitch, yaw, roll)
    } else {
        // Forward is (anti)parallel to z, so yaw comes from the left vector.
        let yaw = (-left.x).atan2(left.y).to_degrees();
        let pitch = (-forward.z).atan2(xy_dist).to_degrees();
        Vec3::new(pitch, yaw, 0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Aabb {
    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self {
            mins: mins.min(maxs),
            maxs: mins.max(maxs),
        }
    }

    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self::new(center - extents, center + extents)
    }

    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        (self.maxs - self.mins) * 0.5
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.mins).all() && point.cmple(self.maxs).all()
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.mins.cmple(other.maxs).all() && other.mins.cmple(self.maxs).all()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
}

impl Plane {
    pub fn through_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            dist: normal.dot(point),
        }
    }
}

/// Perpendicular distance from `point` to the infinite line through `a` and `b`.
pub fn distance_to_line(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let dir = b - a;
    let len_sqr = dir.length_squared();
    if len_sqr <= f32::EPSILON {
        return point.distance(a);
    }
    let t = (point - a).dot(dir) / len_sqr;
    point.distance(a + dir * t)
}

/// Closest points between line p1-p2 and line p3-p4, with their parameters.
pub struct LineClosestPoints {
    pub on_first: Vec3,
    pub on_second: Vec3,
    pub t1: f32,
    pub t2: f32,
}

/// Returns `None` if either line is degenerate or the lines are parallel.
pub fn line_to_line_closest_points(p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3) -> Option<LineClosestPoints> {
    const EQUAL_EPSILON: f32 = 0.001;

    let p13 = p1 - p3;
    let p43 = p4 - p3;
    if p43.length_squared() < EQUAL_EPSILON * EQUAL_EPSILON {
        return None;
    }
    let p21 = p2 - p1;
    if p21.length_squared() < EQUAL_EPSILON * EQUAL_EPSILON {
        return None;
    }

    let d1343 = p13.dot(p43);
    let d4321 = p43.dot(p21);
    let d1321 = p13.dot(p21);
    let d4343 = p43.dot(p43);
    let d2121 = p21.dot(p21);

    let denom = d2121 * d4343 - d4321 * d4321;
    if denom.abs() < EQUAL_EPSILON {
        return None;
    }
    let numer = d1343 * d4321 - d1321 * d4343;

    let t1 = numer / denom;
    let t2 = (d1343 + d4321 * t1) / d4343;

    Some(LineClosestPoints {
        on_first: p1 + p21 * t1,
        on_second: p3 + p43 * t2,
        t1,
        t2,
    })
}

/// Real roots of `a*x^2 + b*x + c = 0`, smaller root first.
pub fn solve_quadratic(a: f32, b: f32, c: f32) -> Option<(f32, f32)> {
    if a.abs() < 1e-12 {
        if b.abs() < 1e-12 {
            return None;
        }
        let root = -c / b;
        return Some((root, root));
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    // Numerically stable form, avoids cancellation when b^2 >> 4ac.
    let sqrt_d = discriminant.sqrt();
    let q = -0.5 * (b + b.signum() * sqrt_d);
    let (r1, r2) = if q.abs() < 1e-12 {
        (0.0, 0.0)
    } else {
        (q / a, c / q)
    };
    Some((r1.min(r2), r1.max(r2)))
}

/// Angle between two unit vectors in radians, tolerant of dot products slightly outside [-1, 1].
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-4)
    }

    #[test]
    fn zero_angles_face_positive_x() {
        let (f, r, u) = angle_vectors(Vec3::ZERO);
        assert!(approx(f, Vec3::X));
        assert!(approx(r, -Vec3::Y));
        assert!(approx(u, Vec3::Z));
    }

    #[test]
    fn basis_is_orthonormal_for_arbitrary_angles() {
        let b = Basis::from_angles(Vec3::new(23.0, 141.0, -37.0));
        assert!((b.forward.dot(b.right)).abs() < 1e-5);
        assert!((b.forward.dot(b.up)).abs() < 1e-5);
        assert!((b.right.dot(b.up)).abs() < 1e-5);
        // right-handed: forward x left = up
        assert!(approx(b.forward.cross(-b.right), b.up));
    }

    #[test]
    fn vector_angles_round_trips_wall_and_floor() {
        for (forward, up) in [
            (Vec3::Y, Vec3::Z),
            (Vec3::new(1.0, 1.0, 0.0).normalize(), Vec3::Z),
            (Vec3::Z, Vec3::X),
            (-Vec3::Z, Vec3::Y),
        ] {
            let b = Basis::from_angles(vector_angles(forward, up));
            assert!(approx(b.forward, forward), "forward {forward:?} -> {:?}", b.forward);
            assert!(b.up.dot(up) > 0.0);
        }
    }

    #[test]
    fn distance_to_line_is_perpendicular() {
        let d = distance_to_line(Vec3::new(3.0, 4.0, 0.0), Vec3::ZERO, Vec3::X);
        assert!((d - 4.0).abs() < 1e-6);
    }

    #[test]
    fn skew_lines_closest_points() {
        let r = line_to_line_closest_points(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(5.0, -1.0, 2.0),
            Vec3::new(5.0, 1.0, 2.0),
        )
        .unwrap();
        assert!(approx(r.on_first, Vec3::new(5.0, 0.0, 0.0)));
        assert!(approx(r.on_second, Vec3::new(5.0, 0.0, 2.0)));
    }

    #[test]
    fn parallel_lines_have_no_closest_points() {
        assert!(line_to_line_closest_points(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Y + Vec3::X).is_none());
    }

    #[test]
    fn quadratic_roots_are_ordered() {
        let (a, b) = solve_quadratic(1.0, -3.0, 2.0).unwrap();
        assert!((a - 1.0).abs() < 1e-6 && (b - 2.0).abs() < 1e-6);
        assert!(solve_quadratic(1.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn aabb_overlap_includes_touching() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::X, Vec3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&Aabb::new(Vec3::splat(1.5), Vec3::splat(2.0))));
    }
}

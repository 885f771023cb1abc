// src/placement/fit.rs
//
// Iterative solver that slides a portal rectangle across its surface until none of its
// corners are blocked. Each pass traces the corners that aren't already known to be
// blocked, then picks a correction from the number of blocked corners.

use std::f32::consts::PI;

use glam::Vec3;

use crate::config::{BUMP_FORGIVENESS, DEBUG_DRAW_DURATION, MAX_FIT_DEPTH};
use crate::debug_overlay::BLUE;
use crate::geometry::{angle_between, distance_to_line, line_to_line_closest_points, Basis};
use crate::trace::Trace;

use super::{Blocker, CornerTracer, FitState};

const ANTI_PARALLEL_PAIR_DOT: f32 = -0.9;
const PARALLEL_PAIR_DOT: f32 = 0.9;
const ANTI_PARALLEL_TRIPLE_DOT: f32 = -0.99;
const PARALLEL_TRIPLE_DOT: f32 = 0.99;
const TRIANGLE_ANGLE_SLACK: f32 = 0.01;
const PERPENDICULAR_DOT: f32 = 0.0001;
const COLINEAR_DOT: f32 = 0.9999;
const DEBUG_LINE_HALF_LENGTH: f32 = 32.0;

/// Half extents of the rectangle being fitted, as world-space offsets from its center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PortalEdges {
    pub top: Vec3,
    pub right: Vec3,
}

impl PortalEdges {
    /// Edges of a `half_width` x `half_height` portal, pulled in by `inset` on every side.
    pub fn inset(basis: &Basis, half_width: f32, half_height: f32, inset: f32) -> Self {
        Self {
            top: basis.up * (half_height - inset),
            right: basis.right * (half_width - inset),
        }
    }

    /// Top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self, origin: Vec3) -> [Vec3; 4] {
        [
            origin + self.top - self.right,
            origin + self.top + self.right,
            origin - self.top - self.right,
            origin - self.top + self.right,
        ]
    }
}

/// A blocked corner and the line that blocks it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerConstraint {
    pub corner: Vec3,
    pub point: Vec3,
    /// Runs along the blocking edge.
    pub direction: Vec3,
    /// Moves the rectangle away from the blocking edge.
    pub bump: Vec3,
}

impl CornerConstraint {
    /// Distance the rectangle has to move along `bump` for the corner to clear the line.
    fn clearing_distance(&self) -> f32 {
        distance_to_line(self.corner, self.point, self.point + self.direction) + BUMP_FORGIVENESS
    }
}

#[derive(Clone, Debug)]
struct CornerFitData {
    trace: Trace,
    point: Vec3,
    direction: Vec3,
    bump: Vec3,
    intersecting: bool,
    soft: bool,
    blocker: Option<Blocker>,
}

impl Default for CornerFitData {
    fn default() -> Self {
        Self {
            trace: Trace::clear(Vec3::ZERO, Vec3::ZERO),
            point: Vec3::ZERO,
            direction: Vec3::ZERO,
            bump: Vec3::ZERO,
            intersecting: false,
            soft: false,
            blocker: None,
        }
    }
}

impl CornerFitData {
    fn constraint(&self, corner: Vec3) -> CornerConstraint {
        CornerConstraint {
            corner,
            point: self.point,
            direction: self.direction,
            bump: self.bump,
        }
    }

    fn clearing_distance_from(&self, corner: Vec3) -> f32 {
        self.constraint(corner).clearing_distance()
    }
}

/// Moves `origin` until every corner of the rectangle clears its blockers. Returns `false` when
/// the rectangle is boxed in or the pass budget runs out.
pub fn fit_portal_on_surface(tracer: &CornerTracer<'_>, state: &mut FitState, origin: &mut Vec3, basis: &Basis, edges: &PortalEdges, half_width: f32) -> bool {
    let ctx = tracer.context();
    let forward = tracer.forward();

    let mut fit: [CornerFitData; 4] = Default::default();
    let mut index = [0usize; 4];
    let mut count = 0usize;

    for depth in 0..MAX_FIT_DEPTH {
        let corners = edges.corners(*origin);
        let old_count = count;

        let mut no_normal_min = Vec3::ZERO;
        let mut no_normal_max = Vec3::ZERO;
        let mut no_normal_sum = Vec3::ZERO;
        let mut new_hit = [false; 4];

        for i in 0..4 {
            if count >= 4 {
                break;
            }
            if fit[i].intersecting {
                // Already-known corners can't be hit again this pass.
                fit[i].trace.fraction = 1.0;
                continue;
            }

            match tracer.trace_corner(state, *origin, corners[i]) {
                Some(hit) => {
                    let data = &mut fit[i];
                    data.point = *origin + (corners[i] - *origin) * hit.trace.fraction;
                    data.trace = hit.trace;
                    data.soft = hit.soft;
                    data.blocker = hit.blocker;
                    data.intersecting = true;

                    if data.trace.plane.normal == Vec3::ZERO {
                        let push = data.point - corners[i];
                        no_normal_min = no_normal_min.min(push);
                        no_normal_max = no_normal_max.max(push);
                        no_normal_sum += push;
                    }

                    new_hit[i] = true;
                    index[count] = i;
                    count += 1;
                }
                None => {
                    fit[i].soft = false;
                    fit[i].blocker = None;
                }
            }
        }

        // Corners that came back without a normal share one pushed the way they agree on.
        let consensus = no_normal_sum.min(no_normal_max).max(no_normal_min).normalize_or_zero();

        for i in (0..4).filter(|&i| new_hit[i]) {
            let data = &mut fit[i];
            if data.trace.plane.normal == Vec3::ZERO {
                let normal = if consensus == Vec3::ZERO {
                    (*origin - corners[i]).normalize_or_zero()
                } else {
                    consensus
                };
                data.trace.plane.normal = normal;
                data.trace.plane.dist = normal.dot(data.point);
            }
            data.trace.plane.normal = data.trace.plane.normal.normalize_or_zero();
            data.direction = data.trace.plane.normal.cross(forward).normalize_or_zero();
            data.bump = forward.cross(data.direction).normalize_or_zero();

            if ctx.config.debug {
                ctx.overlay.draw_line(
                    data.point - data.direction * DEBUG_LINE_HALF_LENGTH,
                    data.point + data.direction * DEBUG_LINE_HALF_LENGTH,
                    BLUE,
                    DEBUG_DRAW_DURATION,
                );
            }
        }

        for data in &fit {
            if let (true, Some(blocker)) = (data.soft, data.blocker) {
                state.remember_bump(blocker);
            }
        }

        if count == old_count {
            if fit.iter().all(|data| !data.intersecting) {
                return true;
            }
            // Corners still flagged from earlier passes were not retraced after the last bump.
            count = 0;
            for data in fit.iter_mut() {
                data.intersecting = false;
            }
            continue;
        }
        log::trace!("fit pass {depth}: {count} blocked corner(s) at {origin}");

        match count {
            1 => {
                let a = index[0];
                *origin += fit[a].bump * fit[a].clearing_distance_from(corners[a]);
            }
            2 => {
                let (a, b) = (index[0], index[1]);
                if fit[a].point == fit[b].point {
                    return false;
                }

                let dot = fit[a].bump.dot(fit[b].bump);
                if dot < ANTI_PARALLEL_PAIR_DOT {
                    match squeeze_offset(tracer, state, *origin, fit[a].direction, half_width) {
                        Some(offset) => *origin += offset,
                        None => return false,
                    }
                    count = 0;
                    fit[a].intersecting = false;
                    fit[b].intersecting = false;
                } else if dot > PARALLEL_PAIR_DOT {
                    let pair = [a, b];
                    let closest = if origin.distance(fit[a].point) < origin.distance(fit[b].point) { 0 } else { 1 };
                    let c = pair[closest];
                    let bumps = [
                        fit[c].clearing_distance_from(corners[a]),
                        fit[c].clearing_distance_from(corners[b]),
                    ];
                    let largest = if bumps[0] > bumps[1] { 0 } else { 1 };

                    *origin += fit[c].bump * bumps[largest];

                    if bumps[0] == bumps[1] {
                        // Both corners sit on the blocking line; retest both.
                        fit[a].intersecting = false;
                        fit[b].intersecting = false;
                        count = 0;
                    } else {
                        if largest != closest {
                            fit[pair[largest]] = fit[c].clone();
                        }
                        fit[pair[1 - largest]].intersecting = false;
                        index[0] = pair[largest];
                        count = 1;
                    }
                } else {
                    let bump = find_bump_vector_in_corner(&fit[a].constraint(corners[a]), &fit[b].constraint(corners[b]));
                    match bump {
                        Some(bump) => *origin += bump,
                        None => return false,
                    }
                }
            }
            3 => {
                let ids = [index[0], index[1], index[2]];

                match classify_three_corners(ids.map(|i| fit[i].bump)) {
                    ThreeCorners::Squeezed(k) => {
                        match squeeze_offset(tracer, state, *origin, fit[ids[k]].direction, half_width) {
                            Some(offset) => *origin += offset,
                            None => return false,
                        }
                        count = 0;
                        for &i in &ids {
                            fit[i].intersecting = false;
                        }
                        continue;
                    }
                    ThreeCorners::Pocket => {
                        // Walled in on three sides. Only soft blockers might still give way.
                        if ids.iter().any(|&i| fit[i].soft) {
                            count = 0;
                            for &i in &ids {
                                fit[i].intersecting = false;
                            }
                            continue;
                        }
                        return false;
                    }
                    ThreeCorners::Mixed => {}
                    ThreeCorners::SameEdge => {
                        let mut closest = 0;
                        let mut closest_distance = origin.distance(fit[ids[0]].point);
                        for (k, &i) in ids.iter().enumerate().skip(1) {
                            let distance = origin.distance(fit[i].point);
                            if closest_distance > distance {
                                closest = k;
                                closest_distance = distance;
                            }
                        }

                        let c = ids[closest];
                        let bumps = ids.map(|i| fit[c].clearing_distance_from(corners[i]));
                        let mut largest = if bumps[0] > bumps[1] { 0 } else { 1 };
                        largest = if bumps[largest] > bumps[2] { largest } else { 2 };

                        *origin += fit[c].bump * bumps[largest];

                        let closest_data = fit[c].clone();
                        let mut still = 0;
                        for (k, &i) in ids.iter().enumerate() {
                            if bumps[k] != bumps[largest] {
                                fit[i].intersecting = false;
                                count -= 1;
                            } else {
                                fit[i] = closest_data.clone();
                                index[still] = i;
                                still += 1;
                            }
                        }
                        continue;
                    }
                }

                let mut longest = 0.0;
                let mut longest_k = 0;
                for k in 0..3 {
                    let distance = corners[ids[k]].distance(corners[ids[(k + 1) % 3]]);
                    if longest < distance {
                        longest = distance;
                        longest_k = k;
                    }
                }
                let (p, q, r) = match longest_k {
                    0 => (ids[0], ids[1], ids[2]),
                    1 => (ids[1], ids[2], ids[0]),
                    _ => (ids[2], ids[0], ids[1]),
                };

                let corner_dot = fit[p].direction.dot(fit[q].direction);
                let portal_dot = fit[p].direction.dot(basis.right);
                if corner_dot.abs() < PERPENDICULAR_DOT && (portal_dot.abs() < PERPENDICULAR_DOT || portal_dot.abs() > COLINEAR_DOT) {
                    // Square corner lined up with the rectangle: clear each wall on its own.
                    *origin += fit[p].bump * fit[p].clearing_distance_from(corners[p]);
                    *origin += fit[q].bump * fit[q].clearing_distance_from(corners[q]);
                    count = 0;
                    for i in [p, q, r] {
                        fit[i].intersecting = false;
                    }
                    continue;
                }

                match find_bump_vector_in_corner(&fit[p].constraint(corners[p]), &fit[q].constraint(corners[q])) {
                    Some(bump) => *origin += bump,
                    None => return false,
                }
                count = 0;
                fit[r].intersecting = false;
            }
            _ => {
                if !index.iter().any(|&i| fit[i].soft) {
                    log::debug!("all four corners blocked by hard blockers");
                    return false;
                }
                count = 0;
                for data in fit.iter_mut() {
                    data.intersecting = false;
                }
            }
        }
    }

    log::debug!("portal fit gave up after {MAX_FIT_DEPTH} passes");
    false
}

/// How the bump directions of three blocked corners relate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ThreeCorners {
    /// Corners `k` and `k + 1` are pushed from opposite sides.
    Squeezed(usize),
    /// All three directions differ and close a triangle.
    Pocket,
    /// All three corners sit against the same edge.
    SameEdge,
    Mixed,
}

fn classify_three_corners(bumps: [Vec3; 3]) -> ThreeCorners {
    let dots = [bumps[0].dot(bumps[1]), bumps[1].dot(bumps[2]), bumps[2].dot(bumps[0])];

    if let Some(k) = dots.iter().position(|&d| d < ANTI_PARALLEL_TRIPLE_DOT) {
        return ThreeCorners::Squeezed(k);
    }
    let similar = dots.iter().filter(|&&d| d > PARALLEL_TRIPLE_DOT).count();

    if similar == 0 {
        let total: f32 = dots.iter().map(|d| d.clamp(-1.0, 1.0).acos()).sum();
        if (total - PI).abs() < TRIANGLE_ANGLE_SLACK {
            return ThreeCorners::Pocket;
        }
    }
    if similar == 3 {
        return ThreeCorners::SameEdge;
    }
    ThreeCorners::Mixed
}

/// Offset that moves a rectangle squeezed between two facing walls toward the open side, or
/// `None` when hard blockers sit on both sides.
fn squeeze_offset(tracer: &CornerTracer<'_>, state: &mut FitState, origin: Vec3, direction: Vec3, half_width: f32) -> Option<Vec3> {
    let positive = tracer.trace_corner(state, origin, origin + direction * half_width * 2.0);
    let negative = tracer.trace_corner(state, origin, origin - direction * half_width * 2.0);

    let toward_negative = match (positive, negative) {
        (Some(p), Some(n)) => {
            if p.soft {
                false
            } else if n.soft {
                true
            } else {
                return None;
            }
        }
        (None, Some(_)) => false,
        _ => true,
    };

    Some(if toward_negative { -direction * half_width } else { direction * half_width })
}

/// Translation that slides the edge between two blocked corners into the wedge formed by their
/// blocking lines.
///
/// The two intersection points and the apex where the blocking lines meet form a small
/// triangle; a similar triangle whose base is the real corner-to-corner edge gives the
/// position the first corner has to reach. Returns `Some(ZERO)` when the triangle collapses
/// and `None` when no similar triangle exists.
pub fn find_bump_vector_in_corner(first: &CornerConstraint, second: &CornerConstraint) -> Option<Vec3> {
    let Some(closest) = line_to_line_closest_points(first.point, first.point + first.direction, second.point, second.point + second.direction) else {
        return Some(Vec3::ZERO);
    };
    let apex = (closest.on_first + closest.on_second) * 0.5;

    let short_leg = first.point - apex;
    let short_leg2 = second.point - apex;
    let short_leg_length = short_leg.length();
    let short_leg2_length = short_leg2.length();
    if short_leg_length <= f32::EPSILON || short_leg2_length <= f32::EPSILON {
        return Some(Vec3::ZERO);
    }
    let short_leg = short_leg / short_leg_length;
    let short_leg2 = short_leg2 / short_leg2_length;

    let edge = (second.corner - first.corner).normalize_or_zero();
    if edge.dot(short_leg).abs() > COLINEAR_DOT || edge.dot(short_leg2).abs() > COLINEAR_DOT {
        return Some(first.bump * first.clearing_distance() + second.bump * second.clearing_distance());
    }

    let long_base_length = first.corner.distance(second.corner);
    let short_leg2_angle = angle_between(edge, -short_leg);
    let short_base_angle = angle_between(short_leg, short_leg2);
    let short_leg_angle = PI - short_base_angle - short_leg2_angle;

    let sin_short_leg = short_leg_angle.sin();
    if sin_short_leg == 0.0 {
        return None;
    }
    let short_base_length = short_base_angle.sin() * (short_leg_length / sin_short_leg);
    if short_base_length == 0.0 {
        return Some(Vec3::ZERO);
    }

    let long_leg_length = long_base_length * (short_leg_length / short_base_length);
    let new_corner = apex + short_leg * long_leg_length;
    let bump = new_corner - first.corner;
    bump.is_finite().then_some(bump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementConfig;
    use crate::demo_scene::DemoWorld;
    use crate::placement::{PlacedBy, PlacementContext, PlacementRequest};
    use crate::registry::PortalRegistry;
    use crate::trace::{BlockingKind, PhysicalMaterial, Surface};
    use rand::Rng;

    fn fit_with_state(world: &DemoWorld, state: &mut FitState, origin: Vec3, roll: f32) -> (bool, Vec3) {
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let request = PlacementRequest::new(origin, Vec3::new(0.0, 0.0, roll), PlacedBy::Player);
        let basis = request.basis();
        let tracer = CornerTracer::new(PlacementContext::new(world, &config), &registry, &request);
        let edges = PortalEdges::inset(&basis, 32.0, 56.0, BUMP_FORGIVENESS);
        let mut fitted = origin;
        let ok = fit_portal_on_surface(&tracer, state, &mut fitted, &basis, &edges, 32.0);
        (ok, fitted)
    }

    fn fit_rolled(world: &DemoWorld, origin: Vec3, roll: f32) -> (bool, Vec3) {
        fit_with_state(world, &mut FitState::new(), origin, roll)
    }

    fn fit_once(world: &DemoWorld, origin: Vec3) -> (bool, Vec3) {
        fit_rolled(world, origin, 0.0)
    }

    fn block() -> Surface {
        Surface::new("concrete/block", PhysicalMaterial::Concrete)
    }

    /// The wall with a floor under it and a pillar standing on the floor at y = 100.
    fn floor_and_pillar() -> DemoWorld {
        let mut world = DemoWorld::portal_wall();
        world.add_brush(Vec3::new(-16.0, -512.0, -16.0), Vec3::new(512.0, 512.0, 0.0), block());
        world.add_brush(Vec3::new(0.0, 100.0, 0.0), Vec3::new(200.0, 116.0, 300.0), block());
        world
    }

    #[test]
    fn corners_follow_top_left_order() {
        let basis = Basis::from_angles(Vec3::ZERO);
        let edges = PortalEdges::inset(&basis, 32.0, 56.0, 2.0);
        let [tl, tr, bl, br] = edges.corners(Vec3::ZERO);
        assert!(tl.abs_diff_eq(Vec3::new(0.0, 30.0, 54.0), 1e-4));
        assert!(tr.abs_diff_eq(Vec3::new(0.0, -30.0, 54.0), 1e-4));
        assert!(bl.abs_diff_eq(Vec3::new(0.0, 30.0, -54.0), 1e-4));
        assert!(br.abs_diff_eq(Vec3::new(0.0, -30.0, -54.0), 1e-4));
    }

    #[test]
    fn one_blocked_corner_bumps_by_distance_plus_forgiveness() {
        let mut world = DemoWorld::portal_wall();
        world.add_brush(Vec3::new(0.0, 100.0, 0.0), Vec3::new(200.0, 116.0, 100.0), block());
        let (ok, fitted) = fit_once(&world, Vec3::new(0.0, 80.0, 128.0));
        assert!(ok);
        assert!(fitted.abs_diff_eq(Vec3::new(0.0, 68.0, 128.0), 1e-3), "{fitted}");
    }

    #[test]
    fn fitted_origin_is_stable() {
        let mut world = DemoWorld::portal_wall();
        world.add_brush(Vec3::new(0.0, 100.0, 0.0), Vec3::new(200.0, 116.0, 100.0), block());
        let (_, fitted) = fit_once(&world, Vec3::new(0.0, 80.0, 128.0));
        let (ok, refitted) = fit_once(&world, fitted);
        assert!(ok);
        assert_eq!(refitted, fitted);
    }

    #[test]
    fn ledge_under_both_bottom_corners_lifts_once() {
        let mut world = DemoWorld::portal_wall();
        world.add_brush(Vec3::new(0.0, -200.0, 0.0), Vec3::new(50.0, 200.0, 100.0), block());
        let (ok, fitted) = fit_once(&world, Vec3::new(0.0, 0.0, 128.0));
        assert!(ok);
        assert!(fitted.abs_diff_eq(Vec3::new(0.0, 0.0, 156.0), 1e-3), "{fitted}");
    }

    #[test]
    fn closet_smaller_than_portal_cannot_fit() {
        let mut world = DemoWorld::portal_wall();
        world.add_brush(Vec3::new(0.0, 20.0, 0.0), Vec3::new(100.0, 60.0, 300.0), block());
        world.add_brush(Vec3::new(0.0, -60.0, 0.0), Vec3::new(100.0, -20.0, 300.0), block());
        world.add_brush(Vec3::new(0.0, -60.0, 168.0), Vec3::new(100.0, 60.0, 200.0), block());
        world.add_brush(Vec3::new(0.0, -60.0, 56.0), Vec3::new(100.0, 60.0, 88.0), block());
        let (ok, _) = fit_once(&world, Vec3::new(0.0, 0.0, 128.0));
        assert!(!ok);
    }

    #[test]
    fn soft_blockers_on_all_corners_get_another_pass() {
        let mut world = DemoWorld::portal_wall();
        for (mins, maxs) in [
            (Vec3::new(0.0, 20.0, 0.0), Vec3::new(100.0, 60.0, 300.0)),
            (Vec3::new(0.0, -60.0, 0.0), Vec3::new(100.0, -20.0, 300.0)),
            (Vec3::new(0.0, -60.0, 168.0), Vec3::new(100.0, 60.0, 200.0)),
            (Vec3::new(0.0, -60.0, 56.0), Vec3::new(100.0, 60.0, 88.0)),
        ] {
            world.add_entity(BlockingKind::SoftBumper, mins, maxs);
        }
        let (ok, fitted) = fit_once(&world, Vec3::new(0.0, 0.0, 128.0));
        assert!(ok);
        assert_eq!(fitted, Vec3::new(0.0, 0.0, 128.0));
    }

    #[test]
    fn rolled_fits_do_not_move_when_fitted_again() {
        let world = floor_and_pillar();
        let mut fitted_count = 0;
        for roll in [17.0, 45.0, -30.0] {
            for y in (-60..=140).step_by(10) {
                for z in (10..=190).step_by(12) {
                    let origin = Vec3::new(0.0, y as f32, z as f32);
                    let (ok, fitted) = fit_rolled(&world, origin, roll);
                    if !ok {
                        continue;
                    }
                    fitted_count += 1;
                    let (ok, refitted) = fit_rolled(&world, fitted, roll);
                    assert!(ok, "{origin} roll {roll}: refit of {fitted} failed");
                    assert_eq!(refitted, fitted, "{origin} roll {roll}");
                }
            }
        }
        assert!(fitted_count > 0);
    }

    #[test]
    fn square_corner_clears_floor_and_pillar() {
        // Both left corners hit the pillar and the bottom right corner hits the floor.
        let world = floor_and_pillar();
        let (ok, fitted) = fit_once(&world, Vec3::new(0.0, 80.0, 50.0));
        assert!(ok);
        assert!(fitted.abs_diff_eq(Vec3::new(0.0, 68.0, 56.0), 1e-3), "{fitted}");
    }

    #[test]
    fn rolled_portal_in_a_corner_ends_clear_of_both_walls() {
        // Rolled 17 degrees, three corners are blocked and the two far apart meet different walls.
        let world = floor_and_pillar();
        let (ok, fitted) = fit_rolled(&world, Vec3::new(0.0, 90.0, 50.0), 17.0);
        assert!(ok);

        let basis = Basis::from_angles(Vec3::new(0.0, 0.0, 17.0));
        let edges = PortalEdges::inset(&basis, 32.0, 56.0, BUMP_FORGIVENESS);
        for corner in edges.corners(fitted) {
            assert!(corner.z >= -1e-3, "{fitted}: {corner}");
            assert!(corner.y <= 100.0 + 1e-3, "{fitted}: {corner}");
        }

        let (ok, refitted) = fit_rolled(&world, fitted, 17.0);
        assert!(ok);
        assert_eq!(refitted, fitted);
    }

    #[test]
    fn soft_bumper_is_ignored_after_its_first_push() {
        // The bumper lifts the portal into the ceiling, which pushes it back down into the bumper.
        let mut world = DemoWorld::portal_wall();
        let bumper = world.add_entity(BlockingKind::SoftBumper, Vec3::new(0.0, -200.0, 0.0), Vec3::new(50.0, 200.0, 100.0));
        world.add_brush(Vec3::new(0.0, -512.0, 205.0), Vec3::new(200.0, 512.0, 300.0), block());

        let mut state = FitState::new();
        let (ok, fitted) = fit_with_state(&world, &mut state, Vec3::new(0.0, 0.0, 128.0), 0.0);
        assert!(ok);
        assert!(fitted.abs_diff_eq(Vec3::new(0.0, 0.0, 149.0), 1e-3), "{fitted}");
        assert!(state.has_bumped(Blocker::Entity(bumper)));
    }

    #[test]
    fn three_corner_shapes() {
        let diagonal = Vec3::new(0.0, -1.0, 1.0).normalize();
        assert_eq!(classify_three_corners([Vec3::Z, Vec3::NEG_Y, diagonal]), ThreeCorners::Pocket);
        assert_eq!(classify_three_corners([Vec3::Z, Vec3::Z, Vec3::Z]), ThreeCorners::SameEdge);
        assert_eq!(classify_three_corners([Vec3::Z, Vec3::NEG_Z, Vec3::Y]), ThreeCorners::Squeezed(0));
        assert_eq!(classify_three_corners([Vec3::Y, Vec3::Z, Vec3::NEG_Z]), ThreeCorners::Squeezed(1));
        assert_eq!(classify_three_corners([Vec3::Z, Vec3::Z, Vec3::NEG_Y]), ThreeCorners::Mixed);
        assert_eq!(classify_three_corners([Vec3::Z, Vec3::NEG_Y, (Vec3::Y + Vec3::Z).normalize()]), ThreeCorners::Mixed);
    }

    fn constraint(corner: Vec3, point: Vec3, direction: Vec3, forward: Vec3) -> CornerConstraint {
        let direction = direction.normalize();
        CornerConstraint {
            corner,
            point,
            direction,
            bump: forward.cross(direction).normalize(),
        }
    }

    #[test]
    fn wedge_bump_puts_edge_on_both_lines() {
        // A 90 degree V opening upward with its apex at the origin, in the x = 0 plane.
        let first = constraint(Vec3::new(0.0, -3.0, 4.0), Vec3::new(0.0, -2.0, 2.0), Vec3::new(0.0, -1.0, 1.0), Vec3::X);
        let second = constraint(Vec3::new(0.0, 7.0, 4.0), Vec3::new(0.0, 3.0, 3.0), Vec3::new(0.0, 1.0, 1.0), Vec3::X);
        let bump = find_bump_vector_in_corner(&first, &second).unwrap();
        assert!(bump.abs_diff_eq(Vec3::new(0.0, -2.0, 1.0), 1e-3), "{bump}");

        let moved_first = first.corner + bump;
        let moved_second = second.corner + bump;
        assert!(distance_to_line(moved_first, first.point, first.point + first.direction) < 1e-3);
        assert!(distance_to_line(moved_second, second.point, second.point + second.direction) < 1e-3);
    }

    #[test]
    fn coincident_intersections_give_zero() {
        let point = Vec3::new(0.0, 4.0, 4.0);
        let first = constraint(Vec3::new(0.0, 0.0, 0.0), point, Vec3::new(0.0, 1.0, 1.0), Vec3::X);
        let second = constraint(Vec3::new(0.0, 10.0, 0.0), point, Vec3::new(0.0, -1.0, 2.0), Vec3::X);
        assert_eq!(find_bump_vector_in_corner(&first, &second), Some(Vec3::ZERO));
    }

    #[test]
    fn parallel_lines_give_zero() {
        let first = constraint(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0), Vec3::Y, Vec3::X);
        let second = constraint(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 10.0, 5.0), Vec3::Y, Vec3::X);
        assert_eq!(find_bump_vector_in_corner(&first, &second), Some(Vec3::ZERO));
    }

    #[test]
    fn edge_square_to_both_legs_has_no_solution() {
        // The corner-to-corner edge runs out of the surface, so no similar triangle exists.
        let first = constraint(Vec3::ZERO, Vec3::new(0.0, -2.0, 0.0), Vec3::Z, Vec3::X);
        let second = constraint(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 3.0), Vec3::Y, Vec3::X);
        assert_eq!(find_bump_vector_in_corner(&first, &second), None);
    }

    #[test]
    fn near_coincident_inputs_never_produce_non_finite_bumps() {
        let mut rng = rand::thread_rng();
        for _ in 0..2000 {
            let base = Vec3::new(0.0, rng.gen_range(-64.0..64.0), rng.gen_range(-64.0..64.0));
            let jitter = Vec3::new(0.0, rng.gen_range(-1e-3..1e-3), rng.gen_range(-1e-3..1e-3));
            let dir1 = Vec3::new(0.0, rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let dir2 = Vec3::new(0.0, rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            if dir1.length_squared() < 1e-4 || dir2.length_squared() < 1e-4 {
                continue;
            }
            let first = constraint(base + Vec3::new(0.0, -30.0, -54.0), base, dir1, Vec3::X);
            let second = constraint(base + Vec3::new(0.0, 30.0, -54.0), base + jitter, dir2, Vec3::X);
            if let Some(bump) = find_bump_vector_in_corner(&first, &second) {
                assert!(bump.is_finite(), "{first:?} {second:?} -> {bump}");
            }
        }
    }
}

// src/placement/corner.rs
//
// Finds the nearest thing that keeps one corner of a candidate portal from reaching the
// corner point: the edge of the surface, a wall standing on it, another portal, a bumping
// entity, or a change to a material that can't hold portals.

use glam::Vec3;

use crate::config::{NO_PORTAL_VOLUME_CLEARANCE, SAME_FACE_DOT, SOLID_ESCAPE_STEP, SURFACE_OFFSET};
use crate::geometry::Plane;
use crate::intersection::intersect_segment_with_box;
use crate::registry::{PlayerId, PortalId, PortalRegistry};
use crate::surface::is_no_portal_material;
use crate::trace::{BlockingKind, ContentsMask, EntityId, Trace, TraceFilter};

use super::{Blocker, FitState, PlacedBy, PlacementContext, PlacementRequest};

/// Slack used when testing a corner ray against another portal's box.
const PORTAL_BOX_TOLERANCE: f32 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct CornerHit {
    pub trace: Trace,
    /// Soft blockers push a portal once and never forbid it.
    pub soft: bool,
    pub blocker: Option<Blocker>,
}

impl CornerHit {
    pub fn entity(&self) -> Option<EntityId> {
        match self.blocker {
            Some(Blocker::Entity(id)) => Some(id),
            _ => None,
        }
    }
}

/// Corner tracing for one portal orientation.
pub struct CornerTracer<'a> {
    ctx: PlacementContext<'a>,
    registry: &'a PortalRegistry,
    ignore_portal: Option<PortalId>,
    fired_by: Option<PlayerId>,
    placed_by: PlacedBy,
    filter: TraceFilter,
    forward: Vec3,
}

impl<'a> CornerTracer<'a> {
    pub fn new(ctx: PlacementContext<'a>, registry: &'a PortalRegistry, request: &PlacementRequest) -> Self {
        Self {
            ctx,
            registry,
            ignore_portal: request.portal,
            fired_by: request.fired_by,
            placed_by: request.placed_by,
            filter: request.trace_filter(),
            forward: request.basis().forward,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn context(&self) -> PlacementContext<'a> {
        self.ctx
    }

    pub fn filter(&self) -> &TraceFilter {
        &self.filter
    }

    /// Nearest blocker between `origin` and `corner`, or `None` if the corner is clear.
    pub fn trace_corner(&self, state: &mut FitState, origin: Vec3, corner: Vec3) -> Option<CornerHit> {
        let forward = self.forward * SURFACE_OFFSET;

        let edge = self.trace_surface_edge(origin, corner);

        let mut wall = self.ctx.world.trace_ray(
            origin + forward,
            corner + forward,
            ContentsMask::SOLID_BRUSH_ONLY | ContentsMask::MONSTER | ContentsMask::WATER | ContentsMask::SLIME,
            &self.filter,
        );
        if edge.fraction < wall.fraction {
            wall.fraction = edge.fraction;
            wall.plane.normal = edge.plane.normal;
        }

        let (portal, portal_id) = if self.placed_by != PlacedBy::Fixed {
            self.trace_portals(origin + forward, corner + forward)
        } else {
            (Trace::clear(origin + forward, corner + forward), None)
        };

        let (bumper, bumper_soft) = self.trace_bumping_entities(state, origin + forward, corner + forward);

        if wall.fraction >= 1.0 && portal.fraction >= 1.0 && bumper.fraction >= 1.0 {
            return self.find_material_transition(origin, corner).map(|trace| CornerHit {
                trace,
                soft: false,
                blocker: None,
            });
        }

        if wall.fraction <= portal.fraction && wall.fraction <= bumper.fraction {
            return Some(CornerHit {
                trace: wall,
                soft: false,
                blocker: None,
            });
        }

        if let Some(pid) = portal_id {
            if portal.fraction <= wall.fraction && portal.fraction <= bumper.fraction && !state.has_bumped(Blocker::Portal(pid)) {
                let own = self.registry.get(pid).is_some_and(|p| p.fired_by == self.fired_by);
                if own {
                    state.bumped_by_linked_portal = true;
                }
                return Some(CornerHit {
                    trace: portal,
                    soft: !own,
                    blocker: Some(Blocker::Portal(pid)),
                });
            }
        }

        if !bumper.start_solid && bumper.fraction <= wall.fraction && bumper.fraction <= portal.fraction {
            let blocker = bumper.entity.map(Blocker::Entity);
            return Some(CornerHit {
                trace: bumper,
                soft: bumper_soft,
                blocker,
            });
        }

        None
    }

    /// Walks the corner ray just behind the surface. Where it leaves solid the surface ends.
    fn trace_surface_edge(&self, origin: Vec3, corner: Vec3) -> Trace {
        let world = self.ctx.world;
        let behind = self.forward * SURFACE_OFFSET;
        let to_corner = corner - origin;

        let mut edge = world.trace_ray(
            origin - behind,
            corner - behind,
            ContentsMask::SHOT_PORTAL | ContentsMask::WATER | ContentsMask::SLIME,
            &self.filter,
        );
        if !edge.start_solid {
            edge.fraction = 1.0;
            return edge;
        }

        let mut total = edge.fraction_left_solid;
        while edge.start_solid && edge.fraction_left_solid > 0.0 && total < 1.0 {
            let step = to_corner * (total + SOLID_ESCAPE_STEP);
            edge = world.trace_ray(origin + step - behind, corner + step - behind, ContentsMask::SHOT_PORTAL, &self.filter);
            if edge.start_solid {
                total += edge.fraction_left_solid + SOLID_ESCAPE_STEP;
            }
        }

        if total >= 1.0 {
            edge.fraction = 1.0;
            return edge;
        }

        // Look back from outside the surface to find the face of its edge.
        let outside = origin + to_corner * (total + SOLID_ESCAPE_STEP) - behind;
        edge = world.trace_ray(outside, origin - behind, ContentsMask::SHOT_PORTAL, &self.filter);
        if edge.start_solid {
            edge.fraction = 1.0;
        } else {
            edge.fraction = total;
            edge.plane.normal = -edge.plane.normal;
        }
        edge
    }

    /// Nearest active portal on the same face that the segment runs into.
    pub fn trace_portals(&self, start: Vec3, end: Vec3) -> (Trace, Option<PortalId>) {
        let mut best = Trace::clear(start, end);
        let mut best_id = None;

        for other in self.registry.all_active_portals() {
            if Some(other.id) == self.ignore_portal {
                continue;
            }
            let basis = other.basis();
            if self.forward.dot(basis.forward) < SAME_FACE_DOT {
                continue;
            }

            let (mins, maxs) = other.local_bounds();
            let local_start = basis.to_local(other.origin, start);
            let local_end = basis.to_local(other.origin, end);
            let Some(hit) = intersect_segment_with_box(local_start, local_end, mins, maxs, PORTAL_BOX_TOLERANCE) else {
                continue;
            };

            if hit.enter < 1.0 && hit.enter < best.fraction {
                let normal = basis.to_world_direction(hit.normal);
                best.set_fraction(hit.enter, start, end);
                best.start_solid = hit.start_inside;
                best.plane = Plane::through_point(normal, best.end);
                best_id = Some(other.id);
            }
        }

        (best, best_id)
    }

    /// Nearest bumper, cleanser, no-portal volume or rotating door along the segment. The flag
    /// says whether that nearest hit is a soft bumper.
    pub fn trace_bumping_entities(&self, state: &FitState, start: Vec3, end: Vec3) -> (Trace, bool) {
        let world = self.ctx.world;
        let mut best = Trace::clear(start, end);
        let mut best_soft = false;

        for entity in world.entities_along_ray(start, end) {
            let (mut tr, soft) = match entity.kind {
                BlockingKind::SoftBumper | BlockingKind::Cleanser if entity.active => {
                    let mut tr = world.clip_ray_to_entity(entity.id, start, end);
                    if tr.start_solid {
                        tr.fraction = 1.0;
                    }
                    (tr, entity.kind == BlockingKind::SoftBumper)
                }
                BlockingKind::NoPortalVolume if entity.active => {
                    let mut tr = world.clip_ray_to_entity(entity.id, start, end);
                    if tr.fraction < 1.0 || tr.start_solid {
                        keep_clear_of_volume(&mut tr, start, end);
                    }
                    (tr, false)
                }
                BlockingKind::RotatingDoor => (world.clip_ray_to_entity(entity.id, start, end), false),
                _ => continue,
            };

            if tr.fraction < best.fraction && (!soft || !state.has_bumped(Blocker::Entity(entity.id))) {
                tr.entity = Some(entity.id);
                best = tr;
                best_soft = soft;
            }
        }

        (best, best_soft)
    }

    fn is_good_surface(&self, tr: &Trace) -> bool {
        tr.did_hit() && !is_no_portal_material(self.ctx.config, tr)
    }

    fn trace_into_surface(&self, spot: Vec3) -> Trace {
        self.ctx
            .world
            .trace_ray(spot, spot - self.forward * SURFACE_OFFSET, ContentsMask::SHOT_PORTAL, &self.filter)
    }

    /// Binary search along origin->corner for where the surface turns into a material that
    /// can't hold portals, then recovers the boundary's normal by a second search over angles.
    pub fn find_material_transition(&self, origin: Vec3, corner: Vec3) -> Option<Trace> {
        let tuning = self.ctx.config.search;

        let corner_trace = self.trace_into_surface(corner);
        if !(corner_trace.did_hit() && is_no_portal_material(self.ctx.config, &corner_trace)) {
            return None;
        }

        let full_length = (corner - origin).length();
        let direction = (corner - origin).normalize_or_zero();
        let mut bad_length = full_length;
        let mut good_length = 0.0;
        let mut last = corner_trace;
        let mut iterations = 0;

        while bad_length - good_length >= tuning.material_tolerance && iterations < tuning.material_max_iterations {
            let test_length = (bad_length + good_length) * 0.5;
            last = self.trace_into_surface(origin + direction * test_length);
            if self.is_good_surface(&last) {
                good_length = test_length;
            } else {
                bad_length = test_length;
            }
            iterations += 1;
        }
        if iterations > tuning.material_max_iterations / 2 {
            log::warn!("material transition search took {iterations} iterations");
        }

        let good_spot = origin + direction * good_length;
        let probe = tuning.material_tolerance * tuning.normal_probe_scale;
        let mut impact_normal = Vec3::ZERO;

        let mut side = self.forward.cross(direction);
        if !self.is_good_surface(&self.trace_into_surface(good_spot + side * probe)) {
            side = -side;
        }
        last = self.trace_into_surface(good_spot + side * probe);
        if self.is_good_surface(&last) {
            let mut bad_angle = 0.0_f32;
            let mut good_angle = 90.0_f32;
            for _ in 0..tuning.normal_iterations {
                let test_angle = (bad_angle + good_angle) * 0.5;
                let (sin, cos) = test_angle.to_radians().sin_cos();
                last = self.trace_into_surface(good_spot + (direction * cos + side * sin) * probe);
                if self.is_good_surface(&last) {
                    good_angle = test_angle;
                } else {
                    bad_angle = test_angle;
                }
            }

            let (sin, cos) = good_angle.to_radians().sin_cos();
            let along_boundary = direction * cos + side * sin;
            impact_normal = self.forward.cross(along_boundary);
            if impact_normal.dot(direction) > 0.0 {
                impact_normal = -impact_normal;
            }
        }
        log::trace!("material transition at {good_length:.3} of {full_length:.3}, normal {impact_normal}");

        let mut tr = last;
        tr.start = origin;
        tr.end = good_spot;
        tr.fraction = if full_length > 0.0 { good_length / full_length } else { 0.0 };
        tr.fraction_left_solid = 1.0;
        tr.plane = Plane::through_point(impact_normal, good_spot);
        Some(tr)
    }
}

/// Pulls a no-portal volume hit back so the portal stops short of touching it.
fn keep_clear_of_volume(tr: &mut Trace, start: Vec3, end: Vec3) {
    let ray_length = (end - start).length();
    if ray_length <= 0.0 {
        return;
    }
    let travelled = tr.end - start;
    let length = (travelled.length() - NO_PORTAL_VOLUME_CLEARANCE).max(0.0);
    tr.fraction = length / ray_length;
    tr.end = start + travelled.normalize_or_zero() * length;
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementConfig;
    use crate::demo_scene::DemoWorld;
    use crate::trace::{PhysicalMaterial, Surface, SurfaceFlags};
    use rand::Rng;

    fn request_at(origin: Vec3) -> PlacementRequest {
        PlacementRequest::new(origin, Vec3::ZERO, PlacedBy::Player)
    }

    // Bottom-left corner of a default portal at `origin` on the x = 0 wall, with the 2 unit inset.
    fn bottom_left(origin: Vec3) -> Vec3 {
        origin + Vec3::new(0.0, 30.0, -54.0)
    }

    #[test]
    fn open_wall_has_no_blockers() {
        let world = DemoWorld::portal_wall();
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let origin = Vec3::new(0.0, 0.0, 128.0);
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request_at(origin));
        let mut state = FitState::new();
        assert!(tracer.trace_corner(&mut state, origin, bottom_left(origin)).is_none());
    }

    #[test]
    fn wall_on_the_surface_blocks_the_corner() {
        let mut world = DemoWorld::portal_wall();
        world.add_brush(Vec3::new(0.0, 100.0, 0.0), Vec3::new(200.0, 116.0, 100.0), Surface::new("concrete/block", PhysicalMaterial::Concrete));
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let origin = Vec3::new(0.0, 80.0, 128.0);
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request_at(origin));
        let mut state = FitState::new();

        let hit = tracer.trace_corner(&mut state, origin, bottom_left(origin)).unwrap();
        assert!(!hit.soft);
        assert!((hit.trace.fraction - 2.0 / 3.0).abs() < 1e-4);
        assert!(hit.trace.plane.normal.abs_diff_eq(-Vec3::Y, 1e-5));
    }

    #[test]
    fn end_of_surface_blocks_with_inward_normal() {
        let mut world = DemoWorld::new();
        world.add_brush(Vec3::new(-16.0, -512.0, -512.0), Vec3::new(0.0, 100.0, 512.0), Surface::new("concrete/wall", PhysicalMaterial::Concrete));
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let origin = Vec3::new(0.0, 80.0, 128.0);
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request_at(origin));
        let mut state = FitState::new();

        let hit = tracer.trace_corner(&mut state, origin, bottom_left(origin)).unwrap();
        assert!((hit.trace.fraction - 2.0 / 3.0).abs() < 1e-4);
        assert!(hit.trace.plane.normal.abs_diff_eq(-Vec3::Y, 1e-5));
    }

    #[test]
    fn material_transition_is_found_by_search() {
        let mut world = DemoWorld::new();
        world.add_brush(Vec3::new(-16.0, -512.0, -512.0), Vec3::new(0.0, 100.0, 512.0), Surface::new("concrete/wall", PhysicalMaterial::Concrete));
        world.add_brush(
            Vec3::new(-16.0, 100.0, -512.0),
            Vec3::new(0.0, 512.0, 512.0),
            Surface::new("metal/black_wall", PhysicalMaterial::Metal).with_flags(SurfaceFlags::NO_PORTAL),
        );
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let origin = Vec3::new(0.0, 80.0, 128.0);
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request_at(origin));
        let mut state = FitState::new();

        let hit = tracer.trace_corner(&mut state, origin, bottom_left(origin)).unwrap();
        assert!(!hit.soft);
        assert!((hit.trace.fraction - 2.0 / 3.0).abs() < 1e-3);
        assert!(hit.trace.end.y <= 100.0001 && hit.trace.end.y > 99.98);
        assert!(hit.trace.plane.normal.dot(-Vec3::Y) > 0.99);
    }

    #[test]
    fn material_search_converges_on_random_boundaries() {
        let mut rng = rand::thread_rng();
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let origin = Vec3::new(0.0, 80.0, 128.0);

        for _ in 0..25 {
            let boundary: f32 = rng.gen_range(82.0..108.0);
            let mut world = DemoWorld::new();
            world.add_brush(Vec3::new(-16.0, -512.0, -512.0), Vec3::new(0.0, boundary, 512.0), Surface::new("concrete/wall", PhysicalMaterial::Concrete));
            world.add_brush(
                Vec3::new(-16.0, boundary, -512.0),
                Vec3::new(0.0, 512.0, 512.0),
                Surface::new("glass/window", PhysicalMaterial::Glass),
            );
            let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request_at(origin));

            let tr = tracer.find_material_transition(origin, bottom_left(origin)).unwrap();
            assert!(tr.end.y <= boundary + 1e-3 && tr.end.y > boundary - 0.02, "{boundary} -> {}", tr.end);
            assert!(tr.plane.normal.is_finite());
        }
    }

    #[test]
    fn soft_bumper_applies_once() {
        let mut world = DemoWorld::portal_wall();
        let bumper = world.add_entity(BlockingKind::SoftBumper, Vec3::new(0.0, 100.0, 0.0), Vec3::new(50.0, 116.0, 100.0));
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let origin = Vec3::new(0.0, 80.0, 128.0);
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request_at(origin));
        let mut state = FitState::new();

        let hit = tracer.trace_corner(&mut state, origin, bottom_left(origin)).unwrap();
        assert!(hit.soft);
        assert_eq!(hit.entity(), Some(bumper));

        state.remember_bump(Blocker::Entity(bumper));
        assert!(tracer.trace_corner(&mut state, origin, bottom_left(origin)).is_none());
    }

    #[test]
    fn inactive_bumpers_are_ignored() {
        let mut world = DemoWorld::portal_wall();
        let cleanser = world.add_entity(BlockingKind::Cleanser, Vec3::new(0.0, 100.0, 0.0), Vec3::new(50.0, 116.0, 100.0));
        world.set_entity_active(cleanser, false);
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let origin = Vec3::new(0.0, 80.0, 128.0);
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request_at(origin));
        assert!(tracer.trace_corner(&mut FitState::new(), origin, bottom_left(origin)).is_none());
    }

    #[test]
    fn no_portal_volume_hit_keeps_clearance() {
        let mut world = DemoWorld::portal_wall();
        world.add_no_portal_volume(Vec3::new(-8.0, 100.0, -512.0), Vec3::new(8.0, 512.0, 512.0));
        let config = PlacementConfig::default();
        let registry = PortalRegistry::new();
        let origin = Vec3::new(0.0, 80.0, 128.0);
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request_at(origin));

        let start = origin + Vec3::X;
        let end = start + Vec3::Y * 40.0;
        let (tr, soft) = tracer.trace_bumping_entities(&FitState::new(), start, end);
        assert!(!soft);
        assert!((tr.fraction - 18.0 / 40.0).abs() < 1e-4);
    }

    #[test]
    fn partner_portal_is_soft_and_own_portal_sets_linked_flag() {
        let world = DemoWorld::portal_wall();
        let config = PlacementConfig::default();
        let mut registry = PortalRegistry::new();
        let own = registry.spawn(0, false, 32.0, 56.0, Some(PlayerId(1)));
        let other = registry.spawn(0, true, 32.0, 56.0, Some(PlayerId(1)));
        let partner = registry.spawn(1, true, 32.0, 56.0, Some(PlayerId(2)));
        registry.activate(other, Vec3::new(0.0, 140.0, 128.0), Vec3::ZERO).unwrap();

        let origin = Vec3::new(0.0, 80.0, 128.0);
        let mut request = request_at(origin);
        request.portal = Some(own);
        request.fired_by = Some(PlayerId(1));
        let corner = origin + Vec3::new(0.0, 30.0, 0.0);

        {
            let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request);
            let mut state = FitState::new();
            let hit = tracer.trace_corner(&mut state, origin, corner).unwrap();
            assert!(!hit.soft);
            assert_eq!(hit.blocker, Some(Blocker::Portal(other)));
            assert!(state.bumped_by_linked_portal);
        }

        registry.fizzle(other).unwrap();
        registry.activate(partner, Vec3::new(0.0, 140.0, 128.0), Vec3::ZERO).unwrap();
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request);
        let mut state = FitState::new();
        let hit = tracer.trace_corner(&mut state, origin, corner).unwrap();
        assert!(hit.soft);
        assert!(!state.bumped_by_linked_portal);
    }

    #[test]
    fn fixed_placement_ignores_other_portals() {
        let world = DemoWorld::portal_wall();
        let config = PlacementConfig::default();
        let mut registry = PortalRegistry::new();
        let other = registry.spawn(0, true, 32.0, 56.0, None);
        registry.activate(other, Vec3::new(0.0, 140.0, 128.0), Vec3::ZERO).unwrap();

        let origin = Vec3::new(0.0, 80.0, 128.0);
        let request = PlacementRequest::new(origin, Vec3::ZERO, PlacedBy::Fixed);
        let tracer = CornerTracer::new(PlacementContext::new(&world, &config), &registry, &request);
        assert!(tracer.trace_corner(&mut FitState::new(), origin, origin + Vec3::new(0.0, 30.0, 0.0)).is_none());
    }
}

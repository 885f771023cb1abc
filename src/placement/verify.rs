// src/placement/verify.rs

use glam::Vec3;

use crate::config::{
    max_bump_distance_sqr, GameMode, PlacementConfig, BUMP_FORGIVENESS, DEBUG_DRAW_DURATION, FLOOR_MOVE_FORWARD_Z, FLOOR_SNAP_FORWARD_NUDGE,
    FLOOR_SNAP_MIN_UP_Z, FLOOR_SNAP_REACH, FLOOR_SNAP_VERIFY_INSET, SAME_FACE_DOT, SURFACE_OFFSET,
};
use crate::debug_overlay::{BLUE, GREEN, RED};
use crate::geometry::{Aabb, Basis};
use crate::intersection::{is_box_intersecting_portal, obb_intersects_obb, Obb};
use crate::registry::{PortalId, PortalRegistry};
use crate::surface::{is_no_portal_material, is_pass_through_material};
use crate::trace::{BlockingKind, ContentsMask, TraceFilter};

use super::{fit_portal_on_surface, CornerTracer, FitState, PlacedBy, PlacementContext, PlacementRequest, PlacementResult, PortalEdges};

/// The valid-surface probes sit this much further in than the fitted corners.
const SURFACE_PROBE_INSET: f32 = BUMP_FORGIVENESS * 1.1;
/// A portal whose bottom edge is this close to the floor already rests on it.
const FLOOR_REST_TOLERANCE: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlappingPortal {
    pub id: PortalId,
    /// Belongs to the same player (always, outside multiplayer) rather than a partner.
    pub linked: bool,
}

fn draw_candidate(ctx: &PlacementContext<'_>, origin: Vec3, basis: &Basis, half_width: f32, half_height: f32) {
    if ctx.config.debug {
        ctx.overlay
            .draw_oriented_rect(origin, basis, half_width, half_height, BLUE, DEBUG_DRAW_DURATION);
    }
}

/// Checks a candidate placement and bumps `request.origin` onto the nearest spot that fits.
pub fn verify_portal_placement(ctx: &PlacementContext<'_>, registry: &PortalRegistry, request: &mut PlacementRequest) -> PlacementResult {
    let world = ctx.world;
    let config = ctx.config;
    let original_origin = request.origin;
    let basis = request.basis();
    let (half_width, half_height) = (request.half_width, request.half_height);
    let filter = request.trace_filter();
    let forward = basis.forward * SURFACE_OFFSET;

    let center = world.trace_ray(
        request.origin + forward,
        request.origin - forward,
        ContentsMask::SHOT_PORTAL,
        &filter,
    );
    if center.fraction == 1.0 {
        draw_candidate(ctx, request.origin, &basis, half_width, half_height);
        log::debug!("portal center has no surface behind it");
        return PlacementResult::InvalidSurface;
    }

    if !config.allow_mobile_portals && center.entity.is_some_and(|e| world.is_entity_moving(e)) {
        log::debug!("portal was on a moving surface");
        return PlacementResult::InvalidSurface;
    }

    if is_pass_through_material(config, &center.surface) {
        draw_candidate(ctx, request.origin, &basis, half_width, half_height);
        log::debug!("portal placed on a pass through material");
        return PlacementResult::PassthroughSurface;
    }

    if is_no_portal_material(config, &center) {
        draw_candidate(ctx, request.origin, &basis, half_width, half_height);
        log::debug!("portal placed on a no portal material");
        return PlacementResult::InvalidSurface;
    }

    if request.placed_by == PlacedBy::Player && !config.never_bump {
        request.origin = fit_portal_around_other_portals(registry, request, &basis);
    }

    let tracer = CornerTracer::new(*ctx, registry, request);
    let mut state = FitState::new();

    if !config.never_bump {
        let mut origin = request.origin;
        let edges = PortalEdges::inset(&basis, half_width, half_height, BUMP_FORGIVENESS);
        let fitted = fit_portal_on_surface(&tracer, &mut state, &mut origin, &basis, &edges, half_width);
        request.origin = origin;

        if !fitted {
            if state.bumped_by_linked_portal {
                return PlacementResult::OverlapLinked;
            }
            draw_candidate(ctx, request.origin, &basis, half_width, half_height);
            log::debug!("portal was unable to fit on surface");
            return PlacementResult::CantFit;
        }

        if request.origin.distance_squared(original_origin) > max_bump_distance_sqr(half_width, half_height) {
            draw_candidate(ctx, request.origin, &basis, half_width, half_height);
            log::debug!("portal adjusted too far from its original location");
            return PlacementResult::CantFit;
        }

        if basis.up.z > FLOOR_SNAP_MIN_UP_Z {
            let snapped = snap_to_floor(ctx, &filter, request.origin, &basis, half_height);
            // Settling must not push a corner into whatever it landed on.
            if snapped != request.origin && are_corners_clear(&tracer, &mut state, snapped, &edges) {
                request.origin = snapped;
            }
        }
    }

    if is_portal_intersecting_no_portal_volume(ctx, request.origin, &basis, half_width, half_height) {
        return PlacementResult::InvalidVolume;
    }

    let overlaps = find_overlapping_portals(config, registry, request);
    if let Some(first) = overlaps.first() {
        if ctx.config.debug {
            ctx.overlay
                .draw_oriented_rect(request.origin, &basis, half_width, half_height, BLUE, DEBUG_DRAW_DURATION);
            if let Some(other) = registry.get(first.id) {
                ctx.overlay
                    .draw_oriented_rect(other.origin, &other.basis(), other.half_width, other.half_height, RED, DEBUG_DRAW_DURATION);
            }
        }
        log::debug!("portal overlapped {} other portal(s)", overlaps.len());
        return overlap_result(&overlaps);
    }

    if !is_portal_on_valid_surface(&tracer, &state, request.origin, &basis, half_width, half_height) {
        draw_candidate(ctx, request.origin, &basis, half_width, half_height);
        return PlacementResult::InvalidSurface;
    }

    if is_floor_move_blocked_by_player(ctx, registry, request, &basis) {
        log::debug!("player is standing in the floor portal being moved");
        return PlacementResult::OverlapLinked;
    }

    if request.origin == original_origin {
        PlacementResult::Success
    } else {
        PlacementResult::Bumped
    }
}

/// Runs [`verify_portal_placement`] and, when policy allows, fizzles the portals that block it
/// and tries once more.
pub fn verify_portal_placement_and_fizzle_blocking_portals(ctx: &PlacementContext<'_>, registry: &mut PortalRegistry, request: &mut PlacementRequest) -> PlacementResult {
    let result = verify_portal_placement(ctx, registry, request);

    let fizzle_linked = match (request.placed_by, result) {
        (PlacedBy::Fixed, PlacementResult::OverlapLinked) => true,
        (PlacedBy::Player, PlacementResult::OverlapPartner) => {
            if ctx.config.game_mode == GameMode::Versus {
                return result;
            }
            false
        }
        _ => return result,
    };

    for overlap in find_overlapping_portals(ctx.config, registry, request) {
        if fizzle_linked || !overlap.linked {
            if let Err(err) = registry.fizzle(overlap.id) {
                log::warn!("could not fizzle blocking portal: {err}");
            }
        }
    }

    verify_portal_placement(ctx, registry, request)
}

/// Every active portal on the same face whose box overlaps the requested one.
pub fn find_overlapping_portals(config: &PlacementConfig, registry: &PortalRegistry, request: &PlacementRequest) -> Vec<OverlappingPortal> {
    let basis = request.basis();
    let mine = Obb::from_local_bounds(
        request.origin,
        &basis,
        Vec3::new(0.0, -request.half_width, -request.half_height),
        Vec3::new(1.0, request.half_width, request.half_height),
    );

    registry
        .all_active_portals()
        .filter(|other| Some(other.id) != request.portal)
        .filter_map(|other| {
            let other_basis = other.basis();
            if basis.forward.dot(other_basis.forward) < SAME_FACE_DOT {
                return None;
            }
            let (mins, maxs) = other.local_bounds();
            let theirs = Obb::from_local_bounds(other.origin, &other_basis, mins, maxs);
            obb_intersects_obb(&mine, &theirs, 0.0).then(|| OverlappingPortal {
                id: other.id,
                linked: !config.game_mode.is_multiplayer() || other.fired_by == request.fired_by,
            })
        })
        .collect()
}

fn overlap_result(overlaps: &[OverlappingPortal]) -> PlacementResult {
    if overlaps.iter().any(|o| o.linked) {
        PlacementResult::OverlapLinked
    } else if overlaps.is_empty() {
        PlacementResult::Success
    } else {
        PlacementResult::OverlapPartner
    }
}

/// Coarse pass that slides the portal sideways off any same-plane portal it sits on top of.
fn fit_portal_around_other_portals(registry: &PortalRegistry, request: &PlacementRequest, basis: &Basis) -> Vec3 {
    let mut origin = request.origin;
    let (half_width, half_height) = (request.half_width, request.half_height);

    for other in registry.all_active_portals() {
        if Some(other.id) == request.portal {
            continue;
        }
        let other_forward = other.forward();
        if basis.forward.dot(other_forward) < SAME_FACE_DOT || (origin.dot(basis.forward) - other.origin.dot(other_forward)).abs() > 1.0 {
            continue;
        }

        let diff = origin - other.origin;
        let right_length = diff.dot(basis.right).abs();
        let up_length = diff.dot(basis.up).abs();
        let away = if right_length < 1.0 {
            basis.right
        } else {
            (basis.right * diff.dot(basis.right)).normalize_or_zero()
        };

        if up_length < half_height * 2.0 && right_length < half_width * 2.0 {
            origin += away * (half_width * 2.0 - right_length + 1.0);
            log::trace!("moved off portal {} to {origin}", other.id);
        }
    }

    origin
}

fn are_corners_clear(tracer: &CornerTracer<'_>, state: &mut FitState, origin: Vec3, edges: &PortalEdges) -> bool {
    edges
        .corners(origin)
        .into_iter()
        .all(|corner| tracer.trace_corner(state, origin, corner).is_none())
}

fn snap_to_floor(ctx: &PlacementContext<'_>, filter: &TraceFilter, origin: Vec3, basis: &Basis, half_height: f32) -> Vec3 {
    let nudge = basis.forward * FLOOR_SNAP_FORWARD_NUDGE;
    let start = origin + nudge;

    let floor = ctx.world.trace_ray(
        start,
        start - basis.up * (half_height + FLOOR_SNAP_REACH),
        ContentsMask::SOLID_BRUSH_ONLY,
        filter,
    );
    if floor.fraction >= 1.0 {
        return origin;
    }
    if ((floor.end - start).length() - half_height).abs() <= FLOOR_REST_TOLERANCE {
        return origin;
    }

    let inside = ctx.world.trace_ray(
        start,
        start - basis.up * (half_height - FLOOR_SNAP_VERIFY_INSET),
        ContentsMask::SOLID_BRUSH_ONLY,
        filter,
    );
    if inside.fraction == 1.0 {
        log::trace!("snapping portal bottom onto floor at {}", floor.end);
        floor.end + basis.up * half_height - nudge
    } else {
        origin
    }
}

fn is_portal_intersecting_no_portal_volume(ctx: &PlacementContext<'_>, origin: Vec3, basis: &Basis, half_width: f32, half_height: f32) -> bool {
    for volume in ctx.world.no_portal_volumes() {
        if !volume.active {
            continue;
        }

        let mut extents = volume.bounds.extents();
        for axis in 0..3 {
            // Flush contact along the surface is forgiven; depth along the normal is not.
            if basis.forward[axis].abs() <= 0.5 {
                extents[axis] = (extents[axis] - BUMP_FORGIVENESS).max(0.0);
            }
        }
        let shrunk = Aabb::from_center_extents(volume.bounds.center(), extents);

        if is_box_intersecting_portal(&shrunk, origin, basis, half_width, half_height) {
            if ctx.config.debug {
                ctx.overlay
                    .draw_box(volume.bounds.mins, volume.bounds.maxs, GREEN, DEBUG_DRAW_DURATION);
                ctx.overlay
                    .draw_oriented_rect(origin, basis, half_width, half_height, BLUE, DEBUG_DRAW_DURATION);
            }
            log::debug!("portal placed in no portal volume");
            return true;
        }
    }
    false
}

/// Probes the center and four slightly inset corners for a surface that can hold a portal.
fn is_portal_on_valid_surface(tracer: &CornerTracer<'_>, state: &FitState, origin: Vec3, basis: &Basis, half_width: f32, half_height: f32) -> bool {
    let ctx = tracer.context();
    let up = basis.up * (half_height - SURFACE_PROBE_INSET);
    let right = basis.right * (half_width - SURFACE_PROBE_INSET);
    let forward = basis.forward * SURFACE_OFFSET;

    let probes = [origin + up - right, origin + up + right, origin - up - right, origin - up + right, origin];
    for point in probes {
        let mut tr = ctx
            .world
            .trace_ray(point + forward, point - forward, ContentsMask::SOLID_BRUSH_ONLY, tracer.filter());

        if tr.start_solid {
            log::debug!("portal center or corner placed inside solid");
            return false;
        }

        if tr.fraction == 1.0 {
            // A bumper can stand in for the surface.
            tr = tracer.trace_bumping_entities(state, point + forward, point - forward).0;
            if tr.fraction == 1.0 {
                log::debug!("portal corner has no surface behind it");
                return false;
            }
        }

        if tr.entity.is_some_and(|e| ctx.world.entity_kind(e) == BlockingKind::Door) {
            log::debug!("portal placed on a door");
            return false;
        }

        if is_pass_through_material(ctx.config, &tr.surface) {
            log::debug!("portal placed on a pass through material");
            return false;
        }

        if is_no_portal_material(ctx.config, &tr) {
            log::debug!("portal placed on a no portal material");
            return false;
        }
    }
    true
}

/// Moving a floor portal a short way while a player stands in it lets the player hop
/// through it repeatedly.
fn is_floor_move_blocked_by_player(ctx: &PlacementContext<'_>, registry: &PortalRegistry, request: &PlacementRequest, basis: &Basis) -> bool {
    let Some(portal) = request.portal.and_then(|id| registry.get(id)) else {
        return false;
    };
    if !portal.is_floor_portal() || basis.forward.z <= FLOOR_MOVE_FORWARD_Z {
        return false;
    }

    let (half_width, half_height) = (request.half_width, request.half_height);
    if portal.origin.distance_squared(request.origin) >= half_width * half_width + half_height * half_height {
        return false;
    }
    if !portal.is_active() || portal.linked().is_none() {
        return false;
    }

    let portal_basis = portal.basis();
    ctx.world
        .player_bounds()
        .iter()
        .any(|bounds| is_box_intersecting_portal(bounds, portal.origin, &portal_basis, portal.half_width, portal.half_height))
}

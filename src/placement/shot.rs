// src/placement/shot.rs
//
// A portal gun shot: find where the bolt lands, orient the portal to the surface, and run it
// through verification with placement helpers taking precedence.

use glam::Vec3;

use crate::config::{DEFAULT_HALF_HEIGHT, DEFAULT_HALF_WIDTH, SAME_FACE_DOT};
use crate::error::RegistryError;
use crate::geometry::{vector_angles, Basis};
use crate::registry::{PlayerId, Portal, PortalId, PortalRegistry};
use crate::trace::{BlockingKind, ContentsMask, TraceFilter};

use super::{verify_portal_placement_and_fizzle_blocking_portals, PlacedBy, PlacementContext, PlacementRequest, PlacementResult};

#[derive(Clone, Debug, PartialEq)]
pub struct PortalShot {
    pub portal: Option<PortalId>,
    pub fired_by: Option<PlayerId>,
    pub start: Vec3,
    pub end: Vec3,
    /// Roll reference for the landed portal.
    pub up_hint: Vec3,
    pub half_width: f32,
    pub half_height: f32,
}

impl PortalShot {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self {
            portal: None,
            fired_by: None,
            start,
            end,
            up_hint: Vec3::Z,
            half_width: DEFAULT_HALF_WIDTH,
            half_height: DEFAULT_HALF_HEIGHT,
        }
    }

    /// A shot along the view direction of `eye_angles`, keeping the shooter's up as the hint.
    pub fn from_eye(eye: Vec3, eye_angles: Vec3, range: f32) -> Self {
        let basis = Basis::from_angles(eye_angles);
        Self {
            up_hint: basis.up,
            ..Self::new(eye, eye + basis.forward * range)
        }
    }

    pub fn for_portal(mut self, portal: &Portal) -> Self {
        self.portal = Some(portal.id);
        self.fired_by = portal.fired_by;
        self.half_width = portal.half_width;
        self.half_height = portal.half_height;
        self
    }
}

/// Map-placed attractor. A shot landing within `radius` on the same face snaps to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementHelper {
    pub origin: Vec3,
    pub radius: f32,
    pub normal: Vec3,
    /// Orientation forced on the portal; the surface orientation is used when unset.
    pub target_angles: Option<Vec3>,
}

impl PlacementHelper {
    fn attracts(&self, point: Vec3, normal: Vec3) -> bool {
        self.origin.distance_squared(point) <= self.radius * self.radius && self.normal.dot(normal) > SAME_FACE_DOT
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShotOutcome {
    pub result: PlacementResult,
    pub origin: Vec3,
    pub angles: Vec3,
}

/// Fires `shot` and, when the placement succeeds and the shot carries a portal, activates that
/// portal where it landed.
pub fn fire_portal_shot(ctx: &PlacementContext<'_>, registry: &mut PortalRegistry, shot: &PortalShot, helpers: &[PlacementHelper]) -> Result<ShotOutcome, RegistryError> {
    let world = ctx.world;
    let tr = world.trace_ray(shot.start, shot.end, ContentsMask::SHOT_PORTAL, &TraceFilter::default());

    let mut outcome = ShotOutcome {
        result: PlacementResult::InvalidSurface,
        origin: tr.end,
        angles: Vec3::ZERO,
    };

    for entity in world.entities_along_ray(shot.start, tr.end) {
        match entity.kind {
            BlockingKind::Cleanser if entity.active => {
                let clip = world.clip_ray_to_entity(entity.id, shot.start, tr.end);
                if clip.fraction < 1.0 {
                    log::debug!("portal shot was eaten by cleanser at {}", clip.end);
                    outcome.result = PlacementResult::Cleanser;
                    outcome.origin = clip.end;
                    return Ok(outcome);
                }
            }
            BlockingKind::RotatingDoor => {
                let clip = world.clip_ray_to_entity(entity.id, shot.start, tr.end);
                if clip.fraction < 1.0 {
                    outcome.result = PlacementResult::CantFit;
                    outcome.origin = clip.end;
                    return Ok(outcome);
                }
            }
            _ => {}
        }
    }

    if tr.fraction >= 1.0 {
        log::debug!("portal shot hit nothing");
        return Ok(outcome);
    }

    let normal = tr.plane.normal;
    outcome.angles = vector_angles(normal, shot.up_hint);

    let request_at = |origin: Vec3, angles: Vec3| PlacementRequest {
        portal: shot.portal,
        fired_by: shot.fired_by,
        ..PlacementRequest::new(origin, angles, PlacedBy::Player).with_size(shot.half_width, shot.half_height)
    };

    if let Some(helper) = helpers.iter().find(|h| h.attracts(tr.end, normal)) {
        let mut request = request_at(helper.origin, helper.target_angles.unwrap_or(outcome.angles));
        let result = verify_portal_placement_and_fizzle_blocking_portals(ctx, registry, &mut request);
        if result.succeeded() {
            log::debug!("portal shot used placement helper at {}", helper.origin);
            outcome = ShotOutcome {
                result: PlacementResult::UsedHelper,
                origin: request.origin,
                angles: request.angles,
            };
            activate_shot_portal(registry, shot, &outcome)?;
            return Ok(outcome);
        }
    }

    let mut request = request_at(tr.end, outcome.angles);
    outcome.result = verify_portal_placement_and_fizzle_blocking_portals(ctx, registry, &mut request);
    outcome.origin = request.origin;
    if outcome.result.succeeded() {
        activate_shot_portal(registry, shot, &outcome)?;
    }
    log::info!("portal shot {}", outcome.result);
    Ok(outcome)
}

fn activate_shot_portal(registry: &mut PortalRegistry, shot: &PortalShot, outcome: &ShotOutcome) -> Result<(), RegistryError> {
    match shot.portal {
        Some(id) => registry.activate(id, outcome.origin, outcome.angles),
        None => Ok(()),
    }
}

// src/placement/mod.rs
pub mod corner;
pub mod fit;
pub mod result;
pub mod shot;
pub mod verify;

use glam::Vec3;

use crate::config::{PlacementConfig, DEFAULT_HALF_HEIGHT, DEFAULT_HALF_WIDTH};
use crate::debug_overlay::{DebugOverlay, NullOverlay};
use crate::geometry::Basis;
use crate::registry::{PlayerId, Portal, PortalId};
use crate::trace::{CollisionWorld, EntityId, TraceFilter};

pub use corner::{CornerHit, CornerTracer};
pub use fit::{find_bump_vector_in_corner, fit_portal_on_surface, CornerConstraint, PortalEdges};
pub use result::PlacementResult;
pub use shot::{fire_portal_shot, PlacementHelper, PortalShot, ShotOutcome};
pub use verify::{
    find_overlapping_portals, verify_portal_placement, verify_portal_placement_and_fizzle_blocking_portals, OverlappingPortal,
};

/// Who is asking for the placement. Changes which overlap checks and fizzle rules apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacedBy {
    /// Map logic; may fizzle whatever it overlaps.
    Fixed,
    Pedestal,
    Player,
}

/// The engine-side collaborators one placement call talks to.
#[derive(Clone, Copy)]
pub struct PlacementContext<'a> {
    pub world: &'a dyn CollisionWorld,
    pub config: &'a PlacementConfig,
    pub overlay: &'a dyn DebugOverlay,
}

impl<'a> PlacementContext<'a> {
    pub fn new(world: &'a dyn CollisionWorld, config: &'a PlacementConfig) -> Self {
        Self {
            world,
            config,
            overlay: &NullOverlay,
        }
    }

    pub fn with_overlay(mut self, overlay: &'a dyn DebugOverlay) -> Self {
        self.overlay = overlay;
        self
    }
}

/// One placement attempt. `origin` and `angles` are rewritten in place when the portal is bumped.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementRequest {
    /// The portal being placed. It never blocks itself.
    pub portal: Option<PortalId>,
    pub fired_by: Option<PlayerId>,
    pub origin: Vec3,
    pub angles: Vec3,
    pub half_width: f32,
    pub half_height: f32,
    pub placed_by: PlacedBy,
    /// Entities every placement trace passes through.
    pub ignore_entities: Vec<EntityId>,
}

impl PlacementRequest {
    pub fn new(origin: Vec3, angles: Vec3, placed_by: PlacedBy) -> Self {
        Self {
            portal: None,
            fired_by: None,
            origin,
            angles,
            half_width: DEFAULT_HALF_WIDTH,
            half_height: DEFAULT_HALF_HEIGHT,
            placed_by,
            ignore_entities: Vec::new(),
        }
    }

    pub fn for_portal(portal: &Portal, origin: Vec3, angles: Vec3, placed_by: PlacedBy) -> Self {
        Self {
            portal: Some(portal.id),
            fired_by: portal.fired_by,
            half_width: portal.half_width,
            half_height: portal.half_height,
            ..Self::new(origin, angles, placed_by)
        }
    }

    pub fn with_size(mut self, half_width: f32, half_height: f32) -> Self {
        self.half_width = half_width;
        self.half_height = half_height;
        self
    }

    pub fn basis(&self) -> Basis {
        Basis::from_angles(self.angles)
    }

    pub fn trace_filter(&self) -> TraceFilter {
        TraceFilter::new(self.ignore_entities.clone())
    }
}

/// Something that pushed a corner during fitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Blocker {
    Entity(EntityId),
    Portal(PortalId),
}

/// Bookkeeping shared by every corner trace of one verification call.
#[derive(Clone, Debug, Default)]
pub struct FitState {
    /// Soft blockers that already bumped the portal once.
    pub bumped: Vec<Blocker>,
    pub bumped_by_linked_portal: bool,
}

impl FitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_bumped(&self, blocker: Blocker) -> bool {
        self.bumped.contains(&blocker)
    }

    pub fn remember_bump(&mut self, blocker: Blocker) {
        if !self.has_bumped(blocker) {
            self.bumped.push(blocker);
        }
    }
}

// src/trace.rs
//
// Everything the placement core needs from the surrounding engine: ray casts against the
// world, the entities that can block a portal, and the surfaces those rays land on.

use bitflags::bitflags;
use glam::Vec3;

use crate::geometry::{Aabb, Plane};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ContentsMask: u32 {
        const SOLID = 1 << 0;
        const WINDOW = 1 << 1;
        const GRATE = 1 << 3;
        const SLIME = 1 << 4;
        const WATER = 1 << 5;
        const MOVEABLE = 1 << 14;
        const MONSTER_CLIP = 1 << 17;
        const MONSTER = 1 << 25;
        const DEBRIS = 1 << 26;
        const HITBOX = 1 << 30;

        const SOLID_BRUSH_ONLY = Self::SOLID.bits() | Self::MOVEABLE.bits() | Self::WINDOW.bits() | Self::GRATE.bits();
        const SHOT_PORTAL = Self::SOLID.bits() | Self::MOVEABLE.bits() | Self::WINDOW.bits() | Self::MONSTER.bits();
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SurfaceFlags: u32 {
        const SKY = 1 << 2;
        const NO_PORTAL = 1 << 5;
        const PAINTABLE = 1 << 11;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PhysicalMaterial {
    #[default]
    Concrete,
    Metal,
    Glass,
    Plastic,
    Wood,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PaintPower {
    Bounce,
    Reflect,
    Speed,
    Portal,
    #[default]
    NoPower,
}

/// What a trace landed on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Surface {
    pub name: String,
    pub flags: SurfaceFlags,
    pub material: PhysicalMaterial,
    /// Paint the engine found at the hit point, already resolved to a power.
    pub paint: PaintPower,
}

impl Surface {
    pub fn new(name: impl Into<String>, material: PhysicalMaterial) -> Self {
        Self {
            name: name.into(),
            flags: SurfaceFlags::empty(),
            material,
            paint: PaintPower::NoPower,
        }
    }

    pub fn with_flags(mut self, flags: SurfaceFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_paint(mut self, paint: PaintPower) -> Self {
        self.flags |= SurfaceFlags::PAINTABLE;
        self.paint = paint;
        self
    }

    pub fn empty() -> Self {
        Self::new("**empty**", PhysicalMaterial::Concrete)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

/// Capability of an entity found along a corner ray, resolved by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockingKind {
    /// Pushes a portal once, never forbids it.
    SoftBumper,
    Cleanser,
    NoPortalVolume,
    RotatingDoor,
    /// Sliding brush door; portals may never rest on it.
    Door,
    Generic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockingEntity {
    pub id: EntityId,
    pub kind: BlockingKind,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoPortalVolume {
    pub bounds: Aabb,
    pub active: bool,
}

/// A swept-ray query result. `fraction` is the portion of `start..end` travelled.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub start: Vec3,
    pub end: Vec3,
    pub fraction: f32,
    pub fraction_left_solid: f32,
    pub start_solid: bool,
    pub all_solid: bool,
    pub plane: Plane,
    pub surface: Surface,
    pub entity: Option<EntityId>,
}

impl Trace {
    /// A trace that hit nothing.
    pub fn clear(start: Vec3, end: Vec3) -> Self {
        Self {
            start,
            end,
            fraction: 1.0,
            fraction_left_solid: 0.0,
            start_solid: false,
            all_solid: false,
            plane: Plane::default(),
            surface: Surface::empty(),
            entity: None,
        }
    }

    pub fn did_hit(&self) -> bool {
        self.fraction < 1.0 || self.all_solid || self.start_solid
    }

    /// Sets the fraction and moves the end point to match.
    pub fn set_fraction(&mut self, fraction: f32, ray_start: Vec3, ray_end: Vec3) {
        self.fraction = fraction;
        self.end = ray_start + (ray_end - ray_start) * fraction;
    }
}

/// Entities a trace should pass through.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TraceFilter {
    pub ignored: Vec<EntityId>,
}

impl TraceFilter {
    pub fn new(ignored: Vec<EntityId>) -> Self {
        Self { ignored }
    }

    pub fn should_hit(&self, entity: EntityId) -> bool {
        !self.ignored.contains(&entity)
    }
}

/// The engine services the placement core calls into. All queries are synchronous and
/// side-effect free.
pub trait CollisionWorld {
    fn trace_ray(&self, start: Vec3, end: Vec3, mask: ContentsMask, filter: &TraceFilter) -> Trace;

    /// Broad phase: entities whose bounds the segment touches.
    fn entities_along_ray(&self, start: Vec3, end: Vec3) -> Vec<BlockingEntity>;

    /// Precise test of the segment against one entity's collision shape.
    fn clip_ray_to_entity(&self, entity: EntityId, start: Vec3, end: Vec3) -> Trace;

    fn entity_kind(&self, entity: EntityId) -> BlockingKind;

    fn is_entity_moving(&self, entity: EntityId) -> bool;

    fn no_portal_volumes(&self) -> Vec<NoPortalVolume>;

    /// Bounds of every player avatar in the world.
    fn player_bounds(&self) -> Vec<Aabb>;
}

// src/demo_scene.rs
//
// An axis-aligned brush world with a handful of entities. Backs the demo binary, the tests
// and the benchmark with a `CollisionWorld` that needs no engine.

use glam::Vec3;

use crate::geometry::{solve_quadratic, Aabb, Plane};
use crate::intersection::intersect_segment_with_box;
use crate::trace::{
    BlockingEntity, BlockingKind, CollisionWorld, ContentsMask, EntityId, NoPortalVolume, PhysicalMaterial, Surface, SurfaceFlags, Trace,
    TraceFilter,
};

/// Entity id reported for static world brushes.
pub const WORLD: EntityId = EntityId(0);

const WALL_THICKNESS: f32 = 16.0;
const CHAMBER_HALF_SIZE: f32 = 512.0;
/// Where the test chamber's white wall gives way to black metal.
const METAL_PANEL_EDGE: f32 = -300.0;

#[derive(Clone, Debug)]
struct Brush {
    bounds: Aabb,
    contents: ContentsMask,
    surface: Surface,
}

#[derive(Clone, Debug)]
struct DemoEntity {
    id: EntityId,
    kind: BlockingKind,
    bounds: Aabb,
    active: bool,
    moving: bool,
    surface: Surface,
}

impl DemoEntity {
    fn contents(&self) -> ContentsMask {
        match self.kind {
            BlockingKind::Door | BlockingKind::RotatingDoor | BlockingKind::Generic => ContentsMask::SOLID,
            BlockingKind::SoftBumper | BlockingKind::Cleanser | BlockingKind::NoPortalVolume => ContentsMask::empty(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DemoWorld {
    brushes: Vec<Brush>,
    entities: Vec<DemoEntity>,
    players: Vec<Aabb>,
}

impl DemoWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// One large concrete wall whose face is the x = 0 plane, facing +x.
    pub fn portal_wall() -> Self {
        let mut world = Self::new();
        world.add_brush(
            Vec3::new(-WALL_THICKNESS, -CHAMBER_HALF_SIZE, -CHAMBER_HALF_SIZE),
            Vec3::new(0.0, CHAMBER_HALF_SIZE, CHAMBER_HALF_SIZE),
            Surface::new("concrete/wall_white", PhysicalMaterial::Concrete),
        );
        world
    }

    /// The portal wall standing on a floor, with the usual clutter: a pillar, a black metal
    /// panel, a ledge bumper, a no-portal strip and an emancipation grill.
    pub fn test_chamber() -> Self {
        let mut world = Self::new();
        world.add_brush(
            Vec3::new(-WALL_THICKNESS, METAL_PANEL_EDGE, -CHAMBER_HALF_SIZE),
            Vec3::new(0.0, CHAMBER_HALF_SIZE, CHAMBER_HALF_SIZE),
            Surface::new("concrete/wall_white", PhysicalMaterial::Concrete),
        );
        world.add_brush(
            Vec3::new(-WALL_THICKNESS, -CHAMBER_HALF_SIZE, -WALL_THICKNESS),
            Vec3::new(CHAMBER_HALF_SIZE, CHAMBER_HALF_SIZE, 0.0),
            Surface::new("concrete/floor", PhysicalMaterial::Concrete),
        );
        world.add_brush(
            Vec3::new(0.0, 100.0, 0.0),
            Vec3::new(200.0, 116.0, 100.0),
            Surface::new("concrete/pillar", PhysicalMaterial::Concrete),
        );
        world.add_brush(
            Vec3::new(-WALL_THICKNESS, -CHAMBER_HALF_SIZE, -CHAMBER_HALF_SIZE),
            Vec3::new(0.0, METAL_PANEL_EDGE, CHAMBER_HALF_SIZE),
            Surface::new("metal/black_wall_metal", PhysicalMaterial::Metal).with_flags(SurfaceFlags::NO_PORTAL),
        );
        world.add_entity(BlockingKind::SoftBumper, Vec3::new(0.0, 200.0, 0.0), Vec3::new(48.0, 400.0, 100.0));
        world.add_no_portal_volume(Vec3::new(-8.0, -200.0, 0.0), Vec3::new(8.0, -180.0, CHAMBER_HALF_SIZE));
        world.add_entity(BlockingKind::Cleanser, Vec3::new(300.0, -CHAMBER_HALF_SIZE, 0.0), Vec3::new(304.0, -250.0, 256.0));
        world
    }

    pub fn add_brush(&mut self, mins: Vec3, maxs: Vec3, surface: Surface) {
        self.add_brush_with_contents(mins, maxs, ContentsMask::SOLID, surface);
    }

    pub fn add_brush_with_contents(&mut self, mins: Vec3, maxs: Vec3, contents: ContentsMask, surface: Surface) {
        self.brushes.push(Brush {
            bounds: Aabb::new(mins, maxs),
            contents,
            surface,
        });
    }

    /// Adds an active, stationary entity. Ids start at 1; 0 is the world.
    pub fn add_entity(&mut self, kind: BlockingKind, mins: Vec3, maxs: Vec3) -> EntityId {
        let id = EntityId(self.entities.len() as u32 + 1);
        self.entities.push(DemoEntity {
            id,
            kind,
            bounds: Aabb::new(mins, maxs),
            active: true,
            moving: false,
            surface: Surface::new("metal/entity_panel", PhysicalMaterial::Metal),
        });
        id
    }

    pub fn add_no_portal_volume(&mut self, mins: Vec3, maxs: Vec3) -> EntityId {
        self.add_entity(BlockingKind::NoPortalVolume, mins, maxs)
    }

    pub fn add_player(&mut self, bounds: Aabb) {
        self.players.push(bounds);
    }

    pub fn set_entity_active(&mut self, id: EntityId, active: bool) {
        if let Some(entity) = self.entity_mut(id) {
            entity.active = active;
        }
    }

    pub fn set_entity_moving(&mut self, id: EntityId, moving: bool) {
        if let Some(entity) = self.entity_mut(id) {
            entity.moving = moving;
        }
    }

    pub fn set_entity_surface(&mut self, id: EntityId, surface: Surface) {
        if let Some(entity) = self.entity_mut(id) {
            entity.surface = surface;
        }
    }

    fn entity(&self, id: EntityId) -> Option<&DemoEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut DemoEntity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Every solid the ray may collide with as (bounds, surface, owning entity).
    fn solids(&self, mask: ContentsMask, filter: &TraceFilter) -> Vec<(Aabb, &Surface, EntityId)> {
        let mut solids = Vec::new();
        if filter.should_hit(WORLD) {
            solids.extend(
                self.brushes
                    .iter()
                    .filter(|b| b.contents.intersects(mask))
                    .map(|b| (b.bounds, &b.surface, WORLD)),
            );
        }
        solids.extend(
            self.entities
                .iter()
                .filter(|e| e.contents().intersects(mask) && filter.should_hit(e.id))
                .map(|e| (e.bounds, &e.surface, e.id)),
        );
        solids
    }
}

impl CollisionWorld for DemoWorld {
    fn trace_ray(&self, start: Vec3, end: Vec3, mask: ContentsMask, filter: &TraceFilter) -> Trace {
        let mut tr = Trace::clear(start, end);
        let mut nearest: Option<(f32, Vec3, &Surface, EntityId)> = None;
        let mut inside: Option<(&Surface, EntityId)> = None;

        for (bounds, surface, entity) in self.solids(mask, filter) {
            let Some(hit) = intersect_segment_with_box(start, end, bounds.mins, bounds.maxs, 0.0) else {
                continue;
            };

            if hit.start_inside {
                let left = hit.exit.min(1.0);
                if !tr.start_solid || left > tr.fraction_left_solid {
                    tr.fraction_left_solid = left;
                    inside = Some((surface, entity));
                }
                tr.start_solid = true;
                if hit.exit >= 1.0 {
                    tr.all_solid = true;
                }
            } else if nearest.map_or(true, |(enter, ..)| hit.enter < enter) {
                nearest = Some((hit.enter, hit.normal, surface, entity));
            }
        }

        if tr.all_solid {
            tr.set_fraction(0.0, start, end);
            if let Some((surface, entity)) = inside {
                tr.surface = surface.clone();
                tr.entity = Some(entity);
            }
            return tr;
        }

        match nearest {
            Some((enter, normal, surface, entity)) => {
                tr.set_fraction(enter, start, end);
                tr.plane = Plane::through_point(normal, tr.end);
                tr.surface = surface.clone();
                tr.entity = Some(entity);
            }
            None => {
                if let Some((surface, entity)) = inside {
                    tr.surface = surface.clone();
                    tr.entity = Some(entity);
                }
            }
        }
        tr
    }

    fn entities_along_ray(&self, start: Vec3, end: Vec3) -> Vec<BlockingEntity> {
        let delta = end - start;
        let mut found: Vec<(f32, BlockingEntity)> = self
            .entities
            .iter()
            .filter_map(|e| {
                // Bounding sphere of the box against the infinite line, clipped to the segment.
                let center = e.bounds.center();
                let radius = e.bounds.extents().length();
                let to_start = start - center;
                let (t0, t1) = solve_quadratic(delta.dot(delta), 2.0 * delta.dot(to_start), to_start.dot(to_start) - radius * radius)?;
                (t1 >= 0.0 && t0 <= 1.0).then(|| {
                    (
                        t0.max(0.0),
                        BlockingEntity {
                            id: e.id,
                            kind: e.kind,
                            active: e.active,
                        },
                    )
                })
            })
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, e)| e).collect()
    }

    fn clip_ray_to_entity(&self, entity: EntityId, start: Vec3, end: Vec3) -> Trace {
        let mut tr = Trace::clear(start, end);
        let Some(e) = self.entity(entity) else {
            return tr;
        };
        let Some(hit) = intersect_segment_with_box(start, end, e.bounds.mins, e.bounds.maxs, 0.0) else {
            return tr;
        };

        tr.entity = Some(entity);
        tr.surface = e.surface.clone();
        if hit.start_inside {
            tr.start_solid = true;
            tr.all_solid = hit.exit >= 1.0;
            tr.fraction_left_solid = hit.exit.min(1.0);
            tr.set_fraction(0.0, start, end);
        } else {
            tr.set_fraction(hit.enter, start, end);
            tr.plane = Plane::through_point(hit.normal, tr.end);
        }
        tr
    }

    fn entity_kind(&self, entity: EntityId) -> BlockingKind {
        self.entity(entity).map_or(BlockingKind::Generic, |e| e.kind)
    }

    fn is_entity_moving(&self, entity: EntityId) -> bool {
        self.entity(entity).is_some_and(|e| e.moving)
    }

    fn no_portal_volumes(&self) -> Vec<NoPortalVolume> {
        self.entities
            .iter()
            .filter(|e| e.kind == BlockingKind::NoPortalVolume)
            .map(|e| NoPortalVolume {
                bounds: e.bounds,
                active: e.active,
            })
            .collect()
    }

    fn player_bounds(&self) -> Vec<Aabb> {
        self.players.clone()
    }
}

// src/main.rs

use glam::Vec3;

use portal_placement::debug_overlay::RecordingOverlay;
use portal_placement::demo_scene::DemoWorld;
use portal_placement::placement::{fire_portal_shot, PlacementContext, PlacementHelper, PortalShot};
use portal_placement::registry::{PlayerId, PortalRegistry};
use portal_placement::PlacementConfig;

const SHOT_RANGE: f32 = 4096.0;
/// Yaw that looks down -x at the portal wall.
const FACING_WALL: Vec3 = Vec3::new(0.0, 180.0, 0.0);

fn main() {
    env_logger::init();

    let world = DemoWorld::test_chamber();
    let config = PlacementConfig {
        debug: std::env::var_os("PORTAL_DEBUG").is_some(),
        ..PlacementConfig::default()
    };
    let overlay = RecordingOverlay::new();
    let ctx = PlacementContext::new(&world, &config).with_overlay(&overlay);

    let mut registry = PortalRegistry::new();
    let player = Some(PlayerId(1));
    let blue = registry.spawn(0, false, 32.0, 56.0, player);
    let orange = registry.spawn(0, true, 32.0, 56.0, player);

    let helpers = [PlacementHelper {
        origin: Vec3::new(0.0, -100.0, 300.0),
        radius: 48.0,
        normal: Vec3::X,
        target_angles: None,
    }];

    let shots = [
        ("open wall", blue, Vec3::new(256.0, 0.0, 128.0)),
        ("beside the pillar", orange, Vec3::new(256.0, 80.0, 160.0)),
        ("just above the floor", blue, Vec3::new(256.0, -40.0, 57.0)),
        ("near the helper", orange, Vec3::new(256.0, -90.0, 280.0)),
        ("on top of the other portal", blue, Vec3::new(256.0, -100.0, 300.0)),
        ("black metal", orange, Vec3::new(256.0, -400.0, 128.0)),
        ("through the grill", blue, Vec3::new(400.0, -400.0, 128.0)),
        ("into the no-portal strip", orange, Vec3::new(256.0, -190.0, 160.0)),
    ];

    for (label, portal, eye) in shots {
        let Some(portal) = registry.get(portal) else {
            log::error!("portal {portal} disappeared from the registry");
            return;
        };
        let shot = PortalShot::from_eye(eye, FACING_WALL, SHOT_RANGE).for_portal(portal);

        match fire_portal_shot(&ctx, &mut registry, &shot, &helpers) {
            Ok(outcome) => log::info!("{label}: {} at {:.2}", outcome.result, outcome.origin),
            Err(err) => log::error!("{label}: {err}"),
        }
    }

    for portal in registry.all_active_portals() {
        log::info!("portal {} active at {:.2}, linked to {:?}", portal.id, portal.origin, portal.linked());
    }
    if config.debug {
        log::info!("recorded {} debug lines", overlay.line_count());
    }
}

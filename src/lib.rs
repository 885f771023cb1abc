// src/lib.rs

pub mod config;
pub mod debug_overlay;
pub mod demo_scene;
pub mod error;
pub mod geometry;
pub mod intersection;
pub mod placement;
pub mod registry;
pub mod surface;
pub mod trace;

pub use config::PlacementConfig;
pub use placement::{verify_portal_placement, verify_portal_placement_and_fizzle_blocking_portals, PlacementResult};
pub use registry::PortalRegistry;

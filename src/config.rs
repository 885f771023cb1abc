// src/config.rs

use crate::trace::PaintPower;

/// Inset kept between the fitted rectangle and whatever blocks it.
pub const BUMP_FORGIVENESS: f32 = 2.0;
/// Solver iterations before a fit is declared impossible.
pub const MAX_FIT_DEPTH: u32 = 6;
/// Portals whose forward vectors agree at least this much are on the same face.
pub const SAME_FACE_DOT: f32 = 0.95;
/// Distance in front of / behind the surface used by the corner traces.
pub const SURFACE_OFFSET: f32 = 1.0;
/// Half thickness of the box a placed portal occupies along its normal.
pub const PORTAL_HALF_DEPTH: f32 = 2.0;
/// Clearance kept from no-portal volumes when they bump a corner. Kept equal to
/// [`BUMP_FORGIVENESS`], which is what the volume overlap test shrinks by.
pub const NO_PORTAL_VOLUME_CLEARANCE: f32 = BUMP_FORGIVENESS;
/// Step taken past a solid region while walking a corner ray out of it.
pub const SOLID_ESCAPE_STEP: f32 = 0.05;

/// Wall portals whose up vector points at least this far upward get settled onto the floor.
pub const FLOOR_SNAP_MIN_UP_Z: f32 = 0.7;
/// Distance the snapped portal is pulled back off the surface.
pub const FLOOR_SNAP_FORWARD_NUDGE: f32 = 0.05;
/// How far past the bottom edge the snap looks for a floor.
pub const FLOOR_SNAP_REACH: f32 = 1.5;
/// The snap is skipped when solid starts within this distance of the bottom edge.
pub const FLOOR_SNAP_VERIFY_INSET: f32 = 0.1;

/// A portal whose normal z is above this lies on a floor.
pub const FLOOR_PORTAL_NORMAL_Z: f32 = 0.99;
/// Floor portals are kept from shifting under a standing player when the new forward z is above this.
pub const FLOOR_MOVE_FORWARD_Z: f32 = 0.8;

/// Half width of a portal spawned without an explicit size.
pub const DEFAULT_HALF_WIDTH: f32 = 32.0;
/// Half height of a portal spawned without an explicit size.
pub const DEFAULT_HALF_HEIGHT: f32 = 56.0;

/// Seconds debug geometry stays on screen.
pub const DEBUG_DRAW_DURATION: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    SinglePlayer,
    Cooperative,
    Versus,
}

impl GameMode {
    pub fn is_multiplayer(self) -> bool {
        !matches!(self, GameMode::SinglePlayer)
    }
}

/// Precision knobs of the two binary searches used for material transitions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchTuning {
    pub material_max_iterations: u32,
    /// Search stops once the good/bad bracket is narrower than this (world units).
    pub material_tolerance: f32,
    /// Halvings of the 90 degree bracket used to recover the impact normal.
    pub normal_iterations: u32,
    /// Distance of the normal probes from the transition, in multiples of the tolerance.
    pub normal_probe_scale: f32,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            material_max_iterations: 100,
            material_tolerance: 0.01,
            normal_iterations: 10,
            normal_probe_scale: 4.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacementConfig {
    pub debug: bool,
    pub never_bump: bool,
    pub allow_mobile_portals: bool,
    pub placement_on_paint: bool,
    pub portal_paint_power: PaintPower,
    /// Lower-case substrings; a surface whose name contains one is see-through.
    pub pass_through_materials: Vec<String>,
    pub game_mode: GameMode,
    pub search: SearchTuning,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            debug: false,
            never_bump: false,
            allow_mobile_portals: false,
            placement_on_paint: true,
            portal_paint_power: PaintPower::Portal,
            pass_through_materials: vec!["lights/light_orange001".to_string()],
            game_mode: GameMode::SinglePlayer,
            search: SearchTuning::default(),
        }
    }
}

/// Largest squared distance a fitted portal may end up from where it was requested.
pub fn max_bump_distance_sqr(half_width: f32, half_height: f32) -> f32 {
    let w = half_width * 2.0;
    let h = half_height * 2.0;
    (w * w + h * h) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_budget_for_default_portal() {
        assert_eq!(max_bump_distance_sqr(DEFAULT_HALF_WIDTH, DEFAULT_HALF_HEIGHT), 8320.0);
    }

    #[test]
    fn volume_clearance_matches_bump_forgiveness() {
        assert_eq!(NO_PORTAL_VOLUME_CLEARANCE, BUMP_FORGIVENESS);
    }

    #[test]
    fn only_single_player_is_not_multiplayer() {
        assert!(!GameMode::SinglePlayer.is_multiplayer());
        assert!(GameMode::Cooperative.is_multiplayer());
        assert!(GameMode::Versus.is_multiplayer());
    }
}

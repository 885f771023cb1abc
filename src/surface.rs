// src/surface.rs

use crate::config::PlacementConfig;
use crate::trace::{PhysicalMaterial, Surface, SurfaceFlags, Trace};

const STUDIO_MODEL_PREFIX: &str = "**studio**";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortalSurface {
    Paint,
    Valid,
    Invalid,
}

pub fn is_on_portal_paint(config: &PlacementConfig, tr: &Trace) -> bool {
    config.placement_on_paint
        && tr.entity.is_some()
        && tr.surface.flags.contains(SurfaceFlags::PAINTABLE)
        && tr.surface.paint == config.portal_paint_power
}

pub fn classify_surface(config: &PlacementConfig, tr: &Trace) -> PortalSurface {
    if is_on_portal_paint(config, tr) {
        return PortalSurface::Paint;
    }

    let surface = &tr.surface;
    if surface.flags.contains(SurfaceFlags::NO_PORTAL)
        || surface.material == PhysicalMaterial::Glass
        || surface.name.starts_with(STUDIO_MODEL_PREFIX)
    {
        return PortalSurface::Invalid;
    }

    PortalSurface::Valid
}

pub fn is_no_portal_material(config: &PlacementConfig, tr: &Trace) -> bool {
    classify_surface(config, tr) == PortalSurface::Invalid
}

pub fn is_pass_through_material(config: &PlacementConfig, surface: &Surface) -> bool {
    if surface.flags.contains(SurfaceFlags::SKY) {
        return true;
    }
    let name = surface.name.to_lowercase();
    config
        .pass_through_materials
        .iter()
        .any(|material| name.contains(material.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{EntityId, PaintPower};
    use glam::Vec3;

    fn hit_on(surface: Surface) -> Trace {
        Trace {
            fraction: 0.5,
            surface,
            entity: Some(EntityId(0)),
            ..Trace::clear(Vec3::ZERO, Vec3::X)
        }
    }

    #[test]
    fn plain_concrete_is_valid() {
        let tr = hit_on(Surface::new("concrete/wall01", PhysicalMaterial::Concrete));
        assert_eq!(classify_surface(&PlacementConfig::default(), &tr), PortalSurface::Valid);
    }

    #[test]
    fn portal_paint_overrides_no_portal_flag() {
        let surface = Surface::new("metal/black_wall", PhysicalMaterial::Metal)
            .with_flags(SurfaceFlags::NO_PORTAL)
            .with_paint(PaintPower::Portal);
        let tr = hit_on(surface);
        let config = PlacementConfig::default();
        assert_eq!(classify_surface(&config, &tr), PortalSurface::Paint);

        let no_paint = PlacementConfig { placement_on_paint: false, ..config };
        assert_eq!(classify_surface(&no_paint, &tr), PortalSurface::Invalid);
    }

    #[test]
    fn other_paint_does_not_help() {
        let surface = Surface::new("metal/black_wall", PhysicalMaterial::Metal)
            .with_flags(SurfaceFlags::NO_PORTAL)
            .with_paint(PaintPower::Bounce);
        assert!(is_no_portal_material(&PlacementConfig::default(), &hit_on(surface)));
    }

    #[test]
    fn glass_and_studio_models_are_invalid() {
        let config = PlacementConfig::default();
        assert!(is_no_portal_material(&config, &hit_on(Surface::new("glass/window", PhysicalMaterial::Glass))));
        assert!(is_no_portal_material(&config, &hit_on(Surface::new("**studio**", PhysicalMaterial::Metal))));
    }

    #[test]
    fn sky_and_listed_materials_pass_through() {
        let config = PlacementConfig::default();
        let sky = Surface::new("tools/toolsskybox", PhysicalMaterial::Concrete).with_flags(SurfaceFlags::SKY);
        assert!(is_pass_through_material(&config, &sky));
        assert!(is_pass_through_material(&config, &Surface::new("LIGHTS/Light_Orange001", PhysicalMaterial::Glass)));
        assert!(!is_pass_through_material(&config, &Surface::new("concrete/wall01", PhysicalMaterial::Concrete)));
    }
}

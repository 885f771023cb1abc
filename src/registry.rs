// src/registry.rs

use std::collections::BTreeMap;
use std::fmt;

use glam::Vec3;

use crate::config::{DEFAULT_HALF_HEIGHT, DEFAULT_HALF_WIDTH, FLOOR_PORTAL_NORMAL_Z};
use crate::error::RegistryError;
use crate::geometry::Basis;

pub const LINKAGE_GROUP_COUNT: usize = 256;
/// Portals in this group never link.
pub const UNLINKED_GROUP: u8 = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalId(pub u32);

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub struct Portal {
    pub id: PortalId,
    pub origin: Vec3,
    pub angles: Vec3,
    pub half_width: f32,
    pub half_height: f32,
    pub is_portal2: bool,
    pub fired_by: Option<PlayerId>,
    linkage_group: u8,
    active: bool,
    linked: Option<PortalId>,
}

impl Portal {
    pub fn linkage_group(&self) -> u8 {
        self.linkage_group
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn linked(&self) -> Option<PortalId> {
        self.linked
    }

    pub fn basis(&self) -> Basis {
        Basis::from_angles(self.angles)
    }

    pub fn forward(&self) -> Vec3 {
        self.basis().forward
    }

    pub fn is_floor_portal(&self) -> bool {
        self.forward().z > FLOOR_PORTAL_NORMAL_Z
    }

    /// Collision bounds in portal space (x forward, y left, z up).
    pub fn local_bounds(&self) -> (Vec3, Vec3) {
        (
            Vec3::new(0.0, -self.half_width, -self.half_height),
            Vec3::new(1.0, self.half_width, self.half_height),
        )
    }
}

/// Every portal in the simulation, bucketed by linkage group. Within a group at most one
/// primary and one secondary portal are active at a time; those two are linked.
#[derive(Debug)]
pub struct PortalRegistry {
    portals: BTreeMap<PortalId, Portal>,
    groups: Vec<Vec<PortalId>>,
    next_id: u32,
    best_guess_unused_group: u8,
}

impl Default for PortalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalRegistry {
    pub fn new() -> Self {
        Self {
            portals: BTreeMap::new(),
            groups: vec![Vec::new(); LINKAGE_GROUP_COUNT],
            next_id: 0,
            best_guess_unused_group: 0,
        }
    }

    /// Creates an inactive portal in `group`.
    pub fn spawn(&mut self, group: u8, is_portal2: bool, half_width: f32, half_height: f32, fired_by: Option<PlayerId>) -> PortalId {
        let id = PortalId(self.next_id);
        self.next_id += 1;
        self.portals.insert(
            id,
            Portal {
                id,
                origin: Vec3::ZERO,
                angles: Vec3::ZERO,
                half_width,
                half_height,
                is_portal2,
                fired_by,
                linkage_group: group,
                active: false,
                linked: None,
            },
        );
        self.groups[group as usize].push(id);
        log::trace!("spawned portal {id} in linkage group {group}");
        id
    }

    pub fn get(&self, id: PortalId) -> Option<&Portal> {
        self.portals.get(&id)
    }

    pub fn portal(&self, id: PortalId) -> Result<&Portal, RegistryError> {
        self.portals.get(&id).ok_or(RegistryError::UnknownPortal(id))
    }

    fn portal_mut(&mut self, id: PortalId) -> Result<&mut Portal, RegistryError> {
        self.portals.get_mut(&id).ok_or(RegistryError::UnknownPortal(id))
    }

    pub fn remove(&mut self, id: PortalId) -> Result<Portal, RegistryError> {
        self.fizzle(id)?;
        let portal = self.portals.remove(&id).ok_or(RegistryError::UnknownPortal(id))?;
        self.groups[portal.linkage_group as usize].retain(|&p| p != id);
        Ok(portal)
    }

    pub fn portals_in_linkage_group(&self, group: u8) -> &[PortalId] {
        &self.groups[group as usize]
    }

    pub fn all_portals(&self) -> impl Iterator<Item = &Portal> {
        self.portals.values()
    }

    pub fn all_active_portals(&self) -> impl Iterator<Item = &Portal> {
        self.portals.values().filter(|p| p.active)
    }

    /// Finds the primary or secondary portal of a group, optionally creating it.
    pub fn find_portal(&mut self, group: u8, is_portal2: bool, create_if_missing: bool) -> Option<PortalId> {
        let found = self.groups[group as usize]
            .iter()
            .copied()
            .find(|id| self.portals.get(id).is_some_and(|p| p.is_portal2 == is_portal2));

        match found {
            Some(id) => Some(id),
            None if create_if_missing => Some(self.spawn(group, is_portal2, DEFAULT_HALF_WIDTH, DEFAULT_HALF_HEIGHT, None)),
            None => None,
        }
    }

    pub fn change_linkage_group(&mut self, id: PortalId, new_group: u8) -> Result<(), RegistryError> {
        let (old_group, was_active) = {
            let portal = self.portal(id)?;
            (portal.linkage_group, portal.active)
        };
        if old_group == new_group {
            return Ok(());
        }
        if was_active {
            let is_portal2 = self.portal(id)?.is_portal2;
            self.ensure_slot_free(new_group, is_portal2, id)?;
        }

        self.unlink(id)?;
        self.groups[old_group as usize].retain(|&p| p != id);
        self.groups[new_group as usize].push(id);
        self.portal_mut(id)?.linkage_group = new_group;
        self.update_linkage(id)
    }

    /// A group with no portals in it, searched from the last one handed out.
    pub fn next_unused_linkage_id(&mut self) -> Result<u8, RegistryError> {
        let usable = UNLINKED_GROUP as usize;
        let start = self.best_guess_unused_group as usize % usable;
        for offset in 0..usable {
            let group = (start + offset) % usable;
            if self.groups[group].is_empty() {
                self.best_guess_unused_group = ((group + 1) % usable) as u8;
                return Ok(group as u8);
            }
        }

        log::error!("more than {} linked portal pairs exist, no linkage group is free", usable);
        debug_assert!(false, "linkage groups exhausted");
        Err(RegistryError::LinkageGroupsExhausted)
    }

    /// Moves a portal into the world and links it with its counterpart, if any.
    pub fn activate(&mut self, id: PortalId, origin: Vec3, angles: Vec3) -> Result<(), RegistryError> {
        let (group, is_portal2) = {
            let portal = self.portal(id)?;
            (portal.linkage_group, portal.is_portal2)
        };
        self.ensure_slot_free(group, is_portal2, id)?;

        let portal = self.portal_mut(id)?;
        portal.origin = origin;
        portal.angles = angles;
        portal.active = true;
        self.update_linkage(id)
    }

    /// Removes a portal from the world, breaking its link. Returns whether it was active.
    pub fn fizzle(&mut self, id: PortalId) -> Result<bool, RegistryError> {
        let was_active = std::mem::replace(&mut self.portal_mut(id)?.active, false);
        self.unlink(id)?;
        if was_active {
            log::debug!("portal {id} fizzled");
        }
        Ok(was_active)
    }

    /// Pairs an active portal with the active opposite-polarity portal of its group.
    pub fn update_linkage(&mut self, id: PortalId) -> Result<(), RegistryError> {
        let portal = self.portal(id)?;
        if !portal.active || portal.linkage_group == UNLINKED_GROUP {
            return self.unlink(id);
        }

        let partner = self.groups[portal.linkage_group as usize].iter().copied().find(|&other| {
            other != id
                && self
                    .portals
                    .get(&other)
                    .is_some_and(|p| p.active && p.is_portal2 != portal.is_portal2)
        });

        match partner {
            Some(partner) => {
                self.portal_mut(id)?.linked = Some(partner);
                self.portal_mut(partner)?.linked = Some(id);
                Ok(())
            }
            None => self.unlink(id),
        }
    }

    fn unlink(&mut self, id: PortalId) -> Result<(), RegistryError> {
        if let Some(partner) = self.portal_mut(id)?.linked.take() {
            if let Some(p) = self.portals.get_mut(&partner) {
                p.linked = None;
            }
        }
        Ok(())
    }

    fn ensure_slot_free(&self, group: u8, is_portal2: bool, id: PortalId) -> Result<(), RegistryError> {
        let occupied = self.groups[group as usize].iter().any(|&other| {
            other != id
                && self
                    .portals
                    .get(&other)
                    .is_some_and(|p| p.active && p.is_portal2 == is_portal2)
        });
        if occupied {
            Err(RegistryError::SlotOccupied { group, is_portal2 })
        } else {
            Ok(())
        }
    }
}

// src/error.rs

use thiserror::Error;

use crate::registry::PortalId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("portal {0} is not registered")]
    UnknownPortal(PortalId),
    #[error("linkage group {group} already has an active {} portal", polarity(.is_portal2))]
    SlotOccupied { group: u8, is_portal2: bool },
    #[error("every linkage group is in use")]
    LinkageGroupsExhausted,
}

fn polarity(is_portal2: &bool) -> &'static str {
    if *is_portal2 {
        "secondary"
    } else {
        "primary"
    }
}

// src/placement/result.rs

use std::fmt;

/// Outcome of one placement attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementResult {
    Success,
    UsedHelper,
    Bumped,
    CantFit,
    Cleanser,
    OverlapLinked,
    OverlapPartner,
    InvalidVolume,
    InvalidSurface,
    PassthroughSurface,
}

impl PlacementResult {
    pub fn succeeded(self) -> bool {
        matches!(self, PlacementResult::Success | PlacementResult::UsedHelper | PlacementResult::Bumped)
    }
}

impl fmt::Display for PlacementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PlacementResult::Success => "placed",
            PlacementResult::UsedHelper => "placed using a placement helper",
            PlacementResult::Bumped => "placed after bumping",
            PlacementResult::CantFit => "can't fit on surface",
            PlacementResult::Cleanser => "blocked by a cleanser",
            PlacementResult::OverlapLinked => "overlaps the linked portal",
            PlacementResult::OverlapPartner => "overlaps a partner's portal",
            PlacementResult::InvalidVolume => "inside a no-portal volume",
            PlacementResult::InvalidSurface => "invalid surface",
            PlacementResult::PassthroughSurface => "pass-through surface",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_three_results_succeed() {
        let all = [
            PlacementResult::Success,
            PlacementResult::UsedHelper,
            PlacementResult::Bumped,
            PlacementResult::CantFit,
            PlacementResult::Cleanser,
            PlacementResult::OverlapLinked,
            PlacementResult::OverlapPartner,
            PlacementResult::InvalidVolume,
            PlacementResult::InvalidSurface,
            PlacementResult::PassthroughSurface,
        ];
        assert_eq!(all.iter().filter(|r| r.succeeded()).count(), 3);
        assert_eq!(PlacementResult::CantFit.to_string(), "can't fit on surface");
    }
}

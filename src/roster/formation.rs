//! Lane-constrained formation positions.
//!
//! Each position is a tiny state machine, `Empty <-> Occupied(asset)`, driven by
//! [`Formation::assign`]. An asset id occupies at most one position: assigning it elsewhere moves
//! it, assigning it to its own position clears it. Capacity limits come from a
//! [`FormationPolicy`]; a transition that would break them is rejected and leaves the formation
//! untouched.

use serde::{Deserialize, Serialize};

use crate::catalog::asset::Asset;
use crate::foundation::error::{RosterError, RosterResult};

/// Formation lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Rear lane.
    Back,
    /// Middle lane.
    Mid,
    /// Front lane.
    Front,
}

impl Lane {
    /// Lanes in position order.
    pub const ALL: [Lane; 3] = [Lane::Back, Lane::Mid, Lane::Front];

    /// Index into [`Lane::ALL`].
    pub fn index(self) -> usize {
        match self {
            Lane::Back => 0,
            Lane::Mid => 1,
            Lane::Front => 2,
        }
    }

    /// Lane of `position` in an `N`-position formation.
    ///
    /// Positions are split evenly and in order across the three lanes, so a 6-position formation
    /// maps `0..2` to back, `2..4` to mid, `4..6` to front, and a 3-position one maps one position
    /// to each lane.
    pub fn of_position<const N: usize>(position: usize) -> Lane {
        Lane::ALL[(position * Lane::ALL.len() / N).min(Lane::ALL.len() - 1)]
    }
}

/// Capacity limits checked before a position goes from empty to occupied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationPolicy {
    /// Maximum occupied positions overall.
    pub max_total: Option<usize>,
    /// Maximum occupied positions within one lane.
    pub max_per_lane: Option<usize>,
}

impl FormationPolicy {
    /// No limits beyond uniqueness.
    pub const UNBOUNDED: FormationPolicy = FormationPolicy {
        max_total: None,
        max_per_lane: None,
    };

    /// Character formation limits: 5 overall, 2 per lane.
    pub const CHARACTER: FormationPolicy = FormationPolicy {
        max_total: Some(5),
        max_per_lane: Some(2),
    };
}

/// Why an assignment was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Overall capacity reached.
    FormationFull,
    /// Target lane already at capacity.
    LaneFull(Lane),
}

/// Observable state of one position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionState<'a> {
    /// Nothing placed.
    Empty,
    /// Holds this asset.
    Occupied(&'a Asset),
}

/// Result of [`Formation::assign`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Empty position became occupied by an asset not previously placed.
    Placed,
    /// Asset left `from` and now occupies the target.
    Moved {
        /// Vacated position.
        from: usize,
        /// Asset that held the target before and was dropped, if any.
        previous: Option<Asset>,
    },
    /// Target was occupied by another asset, which is dropped.
    Replaced {
        /// Asset that held the position before.
        previous: Asset,
    },
    /// Asset already held the target; the position is now empty.
    ToggledOff,
    /// Position was explicitly cleared.
    Cleared,
    /// Policy refused the assignment; nothing changed.
    Rejected(PolicyViolation),
}

impl Transition {
    /// Whether the formation changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Transition::Rejected(_))
    }
}

/// `N` lane-mapped positions holding at most one asset each.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formation<const N: usize> {
    positions: [Option<Asset>; N],
    policy: FormationPolicy,
}

/// Six-position character formation with [`FormationPolicy::CHARACTER`].
pub type CharacterFormation = Formation<6>;
/// Three-position pet formation, one position per lane, no capacity limits.
pub type PetFormation = Formation<3>;

impl CharacterFormation {
    /// Empty character formation.
    pub fn characters() -> Self {
        Self::new(FormationPolicy::CHARACTER)
    }
}

impl PetFormation {
    /// Empty pet formation.
    pub fn pets() -> Self {
        Self::new(FormationPolicy::UNBOUNDED)
    }
}

impl<const N: usize> Formation<N> {
    /// Empty formation governed by `policy`.
    pub fn new(policy: FormationPolicy) -> Self {
        Self {
            positions: std::array::from_fn(|_| None),
            policy,
        }
    }

    /// Number of positions.
    pub const fn len(&self) -> usize {
        N
    }

    /// Always `false`; formations have a fixed, non-zero size.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Governing policy.
    pub fn policy(&self) -> FormationPolicy {
        self.policy
    }

    /// Position contents in order.
    pub fn positions(&self) -> &[Option<Asset>; N] {
        &self.positions
    }

    /// Asset at `position`, if any. Out-of-range positions read as empty.
    pub fn get(&self, position: usize) -> Option<&Asset> {
        self.positions.get(position).and_then(Option::as_ref)
    }

    /// State of `position`.
    pub fn state(&self, position: usize) -> RosterResult<PositionState<'_>> {
        self.check_position(position)?;
        Ok(match &self.positions[position] {
            Some(a) => PositionState::Occupied(a),
            None => PositionState::Empty,
        })
    }

    /// Position currently holding `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions
            .iter()
            .position(|p| p.as_ref().is_some_and(|a| a.id == id))
    }

    /// Occupied positions overall.
    pub fn occupied(&self) -> usize {
        self.positions.iter().filter(|p| p.is_some()).count()
    }

    /// Occupied positions within `lane`.
    pub fn lane_occupancy(&self, lane: Lane) -> usize {
        self.positions
            .iter()
            .enumerate()
            .filter(|(i, p)| p.is_some() && Lane::of_position::<N>(*i) == lane)
            .count()
    }

    /// Empty every position.
    pub fn clear_all(&mut self) {
        for p in &mut self.positions {
            *p = None;
        }
    }

    /// Apply one assignment.
    ///
    /// `None` clears `position` unconditionally. `Some(asset)` toggles the asset off when it
    /// already holds `position`, otherwise vacates its old position (if any) and places it, unless
    /// the policy refuses: filling an empty position must keep overall and per-lane occupancy
    /// (counted after the vacated position is freed) within limits. Replacing an occupant never
    /// changes occupancy and is always allowed.
    ///
    /// Only an out-of-range `position` is an error.
    pub fn assign(&mut self, position: usize, asset: Option<Asset>) -> RosterResult<Transition> {
        self.check_position(position)?;

        let Some(asset) = asset else {
            self.positions[position] = None;
            return Ok(Transition::Cleared);
        };

        let existing = self.position_of(&asset.id);
        if existing == Some(position) {
            self.positions[position] = None;
            return Ok(Transition::ToggledOff);
        }

        if self.positions[position].is_none()
            && let Some(violation) = self.check_capacity(position, existing)
        {
            tracing::debug!(
                position,
                asset = %asset.id,
                ?violation,
                "formation assignment rejected"
            );
            return Ok(Transition::Rejected(violation));
        }

        if let Some(from) = existing {
            self.positions[from] = None;
        }
        let previous = self.positions[position].replace(asset);
        Ok(match (existing, previous) {
            (Some(from), previous) => Transition::Moved { from, previous },
            (None, Some(previous)) => Transition::Replaced { previous },
            (None, None) => Transition::Placed,
        })
    }

    fn check_capacity(&self, target: usize, vacated: Option<usize>) -> Option<PolicyViolation> {
        let lane = Lane::of_position::<N>(target);
        let freed_total = usize::from(vacated.is_some());
        let freed_lane = usize::from(vacated.is_some_and(|v| Lane::of_position::<N>(v) == lane));

        let total = self.occupied() - freed_total;
        if self.policy.max_total.is_some_and(|max| total + 1 > max) {
            return Some(PolicyViolation::FormationFull);
        }
        let in_lane = self.lane_occupancy(lane) - freed_lane;
        if self.policy.max_per_lane.is_some_and(|max| in_lane + 1 > max) {
            return Some(PolicyViolation::LaneFull(lane));
        }
        None
    }

    fn check_position(&self, position: usize) -> RosterResult<()> {
        if position >= N {
            return Err(RosterError::validation(format!(
                "formation position {position} out of range (0..{N})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/roster/formation.rs"]
mod tests;

//! Defensive Structures
//!
//! Each side defends one structure per lane: two guards on the flanks and a
//! king in the center. A destroyed structure stays destroyed until the match
//! is reset.

use serde::{Serialize, Deserialize};

use crate::game::map::{Lane, Side};
use crate::game::unit::scale_by_level;

/// Base stats for a structure, before level scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructureStats {
    /// Hit points
    pub hp: i32,
    /// Counter-attack strength
    pub attack: i32,
    /// Defense
    pub defense: i32,
    /// Crit chance in percent (not level scaled)
    pub crit_chance: u32,
}

/// Flank guard base stats.
pub const GUARD_STATS: StructureStats = StructureStats {
    hp: 1000,
    attack: 300,
    defense: 100,
    crit_chance: 5,
};

/// Center king base stats.
pub const KING_STATS: StructureStats = StructureStats {
    hp: 2000,
    attack: 500,
    defense: 300,
    crit_chance: 10,
};

/// A side's structure in one lane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    /// Defending side
    pub owner: Side,
    /// Lane it guards
    pub lane: Lane,
    /// Current hit points, never below 0
    pub hp: i32,
    /// Hit points at spawn
    pub max_hp: i32,
    /// Counter-attack strength
    pub attack: i32,
    /// Defense
    pub defense: i32,
    /// Crit chance in percent
    pub crit_chance: u32,
}

impl Structure {
    /// Build a level-scaled structure for a lane.
    pub fn new(owner: Side, lane: Lane, level: u32) -> Self {
        let base = if lane.is_flank() { GUARD_STATS } else { KING_STATS };
        let hp = scale_by_level(base.hp, level);
        Self {
            owner,
            lane,
            hp,
            max_hp: hp,
            attack: scale_by_level(base.attack, level),
            defense: scale_by_level(base.defense, level),
            crit_chance: base.crit_chance,
        }
    }

    /// Is the structure still standing?
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Apply damage, clamping at 0.
    pub fn take_damage(&mut self, amount: i32) {
        self.hp = (self.hp - amount).max(0);
    }

    /// Restore hp up to max. Returns the amount actually healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount).min(self.max_hp);
        self.hp - before
    }
}

/// One side's three structures, indexed by lane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fortress {
    /// Left, Center, Right
    pub structures: [Structure; 3],
}

impl Fortress {
    /// Fresh structures for a side at the given level.
    pub fn new(owner: Side, level: u32) -> Self {
        Self {
            structures: Lane::ALL.map(|lane| Structure::new(owner, lane, level)),
        }
    }

    /// Structure guarding a lane.
    #[inline]
    pub fn get(&self, lane: Lane) -> &Structure {
        &self.structures[lane_index(lane)]
    }

    /// Mutable structure guarding a lane.
    #[inline]
    pub fn get_mut(&mut self, lane: Lane) -> &mut Structure {
        &mut self.structures[lane_index(lane)]
    }

    /// Has the king fallen?
    pub fn king_destroyed(&self) -> bool {
        !self.get(Lane::Center).is_alive()
    }

    /// Number of destroyed structures.
    pub fn destroyed_count(&self) -> usize {
        self.structures.iter().filter(|s| !s.is_alive()).count()
    }

    /// Alive structure with the lowest current hp (first in lane order on ties).
    pub fn weakest_alive_mut(&mut self) -> Option<&mut Structure> {
        self.structures
            .iter_mut()
            .filter(|s| s.is_alive())
            .min_by_key(|s| s.hp)
    }

    /// Where an attacker is sent after the structure in its lane falls.
    ///
    /// Both flanks down means the center; otherwise the surviving flank.
    pub fn reroute_lane(&self) -> Lane {
        let left = self.get(Lane::Left).is_alive();
        let right = self.get(Lane::Right).is_alive();
        match (left, right) {
            (false, false) => Lane::Center,
            (true, _) => Lane::Left,
            (false, true) => Lane::Right,
        }
    }
}

#[inline]
fn lane_index(lane: Lane) -> usize {
    match lane {
        Lane::Left => 0,
        Lane::Center => 1,
        Lane::Right => 2,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_scaling() {
        let guard = Structure::new(Side::P1, Lane::Left, 1);
        assert_eq!(guard.hp, 1100);
        assert_eq!(guard.max_hp, 1100);
        assert_eq!(guard.attack, 330);
        assert_eq!(guard.defense, 110);
        assert_eq!(guard.crit_chance, 5);

        let king = Structure::new(Side::P2, Lane::Center, 0);
        assert_eq!(king.hp, 2000);
        assert_eq!(king.crit_chance, 10);
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut guard = Structure::new(Side::P1, Lane::Right, 0);
        guard.take_damage(5000);
        assert_eq!(guard.hp, 0);
        assert!(!guard.is_alive());
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut king = Structure::new(Side::P1, Lane::Center, 0);
        king.take_damage(100);
        assert_eq!(king.heal(300), 100);
        assert_eq!(king.hp, king.max_hp);
    }

    #[test]
    fn test_weakest_alive() {
        let mut fortress = Fortress::new(Side::P1, 0);
        fortress.get_mut(Lane::Left).take_damage(1000);
        fortress.get_mut(Lane::Right).take_damage(200);

        let weakest = fortress.weakest_alive_mut().unwrap();
        assert_eq!(weakest.lane, Lane::Right);
    }

    #[test]
    fn test_reroute_lane() {
        let mut fortress = Fortress::new(Side::P2, 0);
        fortress.get_mut(Lane::Left).take_damage(1000);
        assert_eq!(fortress.reroute_lane(), Lane::Right);

        fortress.get_mut(Lane::Right).take_damage(1000);
        assert_eq!(fortress.reroute_lane(), Lane::Center);
        assert_eq!(fortress.destroyed_count(), 2);
        assert!(!fortress.king_destroyed());
    }
}

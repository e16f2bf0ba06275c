//! Unit Roster and Runtime State
//!
//! The roster is a closed enum. Each kind carries a fixed stat record and an
//! ability that decides what happens when the unit reaches the enemy line.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::game::map::{Lane, Side, FAR_POSITION};

/// Scale a base stat by a participant level: `base × (1 + 0.1 × level)`, floored.
#[inline]
pub const fn scale_by_level(base: i32, level: u32) -> i32 {
    ((base as i64 * (10 + level as i64)) / 10) as i32
}

// =============================================================================
// ROSTER
// =============================================================================

/// What a unit does when it acts at the enemy line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ability {
    /// Trade blows with the opposing structure.
    Strike,
    /// Heal the weakest friendly structure by the given amount, then vanish.
    Heal(i32),
}

/// Base stats of a unit kind, before level scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitStats {
    /// Hit points
    pub hp: i32,
    /// Attack
    pub attack: i32,
    /// Defense
    pub defense: i32,
    /// Mana cost to deploy
    pub cost: u32,
    /// Arrival behaviour
    pub ability: Ability,
}

/// Deployable unit kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnitKind {
    /// Cheap and fragile
    Pawn = 0,
    /// Light skirmisher
    Bishop = 1,
    /// Sturdy wall
    Rook = 2,
    /// Hard hitter
    Knight = 3,
    /// Heavy, expensive
    Prince = 4,
    /// Support: heals a friendly structure on arrival
    Queen = 5,
}

impl UnitKind {
    /// Full roster in menu order.
    pub const ALL: [UnitKind; 6] = [
        UnitKind::Pawn,
        UnitKind::Bishop,
        UnitKind::Rook,
        UnitKind::Knight,
        UnitKind::Prince,
        UnitKind::Queen,
    ];

    /// Base stat record.
    pub const fn stats(self) -> UnitStats {
        match self {
            UnitKind::Pawn => UnitStats { hp: 50, attack: 150, defense: 100, cost: 3, ability: Ability::Strike },
            UnitKind::Bishop => UnitStats { hp: 100, attack: 200, defense: 150, cost: 4, ability: Ability::Strike },
            UnitKind::Rook => UnitStats { hp: 250, attack: 200, defense: 200, cost: 5, ability: Ability::Strike },
            UnitKind::Knight => UnitStats { hp: 200, attack: 300, defense: 150, cost: 5, ability: Ability::Strike },
            UnitKind::Prince => UnitStats { hp: 500, attack: 400, defense: 300, cost: 6, ability: Ability::Strike },
            UnitKind::Queen => UnitStats { hp: 150, attack: 0, defense: 100, cost: 5, ability: Ability::Heal(300) },
        }
    }

    /// Mana cost.
    #[inline]
    pub const fn cost(self) -> u32 {
        self.stats().cost
    }

    /// Lowercase name used on the wire.
    pub const fn name(self) -> &'static str {
        match self {
            UnitKind::Pawn => "pawn",
            UnitKind::Bishop => "bishop",
            UnitKind::Rook => "rook",
            UnitKind::Knight => "knight",
            UnitKind::Prince => "prince",
            UnitKind::Queen => "queen",
        }
    }

    /// Single-letter board symbol.
    pub const fn symbol(self) -> char {
        match self {
            UnitKind::Pawn => 'P',
            UnitKind::Bishop => 'B',
            UnitKind::Rook => 'R',
            UnitKind::Knight => 'K',
            UnitKind::Prince => 'X',
            UnitKind::Queen => 'Q',
        }
    }

    /// Get kind from 1-based menu index.
    pub fn from_menu_index(index: usize) -> Option<Self> {
        index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnitKind {
    type Err = ();

    /// Accepts a roster name or its 1-based menu index, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_menu_index(index).ok_or(());
        }
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

// =============================================================================
// UNIT
// =============================================================================

/// A deployed combatant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Monotonic id within the match
    pub id: u32,
    /// Deploying side
    pub owner: Side,
    /// Roster kind
    pub kind: UnitKind,
    /// Current lane (changes only when rerouted)
    pub lane: Lane,
    /// Steps left before the enemy structure (0 = sieging)
    pub position: u8,
    /// Ticks since spawn
    pub age: u32,
    /// Still on the board?
    pub alive: bool,
    /// Current hit points
    pub hp: i32,
    /// Attack, scaled at spawn
    pub attack: i32,
    /// Defense, scaled at spawn
    pub defense: i32,
}

impl Unit {
    /// Spawn a unit at the far end of a lane with stats scaled by the owner's level.
    pub fn spawn(id: u32, owner: Side, kind: UnitKind, lane: Lane, level: u32) -> Self {
        let stats = kind.stats();
        Self {
            id,
            owner,
            kind,
            lane,
            position: FAR_POSITION,
            age: 0,
            alive: true,
            hp: scale_by_level(stats.hp, level),
            attack: scale_by_level(stats.attack, level),
            defense: scale_by_level(stats.defense, level),
        }
    }

    /// Arrival behaviour of this unit's kind.
    #[inline]
    pub fn ability(&self) -> Ability {
        self.kind.stats().ability
    }

    /// Apply damage; the unit dies at 0 hp or below.
    pub fn take_damage(&mut self, amount: i32) {
        self.hp -= amount;
        if self.hp <= 0 {
            self.alive = false;
        }
    }

    /// Does the age parity gate let this unit act on the current tick?
    #[inline]
    pub fn can_act(&self) -> bool {
        self.age % 2 == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Game Events
//!
//! Events generated during simulation for logging and replay inspection.

use serde::{Serialize, Deserialize};

use crate::game::map::{Lane, Side};
use crate::game::state::MatchOutcome;
use crate::game::unit::UnitKind;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A unit entered the board
    UnitDeployed {
        unit_id: u32,
        kind: UnitKind,
        lane: Lane,
        mana_left: u32,
    },

    /// Two opposing units traded blows
    UnitsClashed {
        attacker_id: u32,
        defender_id: u32,
        dealt: i32,
        received: i32,
    },

    /// A unit died
    UnitDied {
        unit_id: u32,
    },

    /// A unit and a structure traded blows
    StructureHit {
        unit_id: u32,
        lane: Lane,
        dealt: i32,
        received: i32,
        hp_left: i32,
    },

    /// A structure reached 0 hp
    StructureDestroyed {
        lane: Lane,
    },

    /// A support unit healed a friendly structure and vanished
    StructureHealed {
        unit_id: u32,
        lane: Lane,
        amount: i32,
    },

    /// A unit was sent to another lane after its target fell
    UnitRerouted {
        unit_id: u32,
        from: Lane,
        to: Lane,
    },

    /// Match ended
    MatchEnded {
        outcome: MatchOutcome,
    },
}

/// A game event with its tick and the side it concerns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Side that owns the acting unit or the affected structure
    pub side: Option<Side>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, side: Option<Side>, data: GameEventData) -> Self {
        Self { tick, side, data }
    }

    /// Create unit deployed event.
    pub fn unit_deployed(tick: u32, side: Side, unit_id: u32, kind: UnitKind, lane: Lane, mana_left: u32) -> Self {
        Self::new(
            tick,
            Some(side),
            GameEventData::UnitDeployed {
                unit_id,
                kind,
                lane,
                mana_left,
            },
        )
    }

    /// Create structure destroyed event. `side` is the structure's owner.
    pub fn structure_destroyed(tick: u32, side: Side, lane: Lane) -> Self {
        Self::new(tick, Some(side), GameEventData::StructureDestroyed { lane })
    }

    /// Create match ended event.
    pub fn match_ended(tick: u32, outcome: MatchOutcome) -> Self {
        Self::new(tick, outcome.winner, GameEventData::MatchEnded { outcome })
    }
}

// =============================================================================
// TESTS
// =============================================================================

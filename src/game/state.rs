//! Game State Definitions
//!
//! All state a session mutates: both fortresses, both mana pools, the live
//! units, the clock and the outcome. Only the session loop writes it.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::game::events::GameEvent;
use crate::game::map::{Lane, Side};
use crate::game::structure::Fortress;
use crate::game::unit::{Unit, UnitKind};

// =============================================================================
// OUTCOME
// =============================================================================

/// Why a match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// A center structure fell
    StructureDestroyed,
    /// The clock ran out
    Timeout,
    /// A participant's connection went away
    Disconnect,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::StructureDestroyed => write!(f, "king destroyed"),
            EndReason::Timeout => write!(f, "time limit reached"),
            EndReason::Disconnect => write!(f, "opponent disconnected"),
        }
    }
}

/// Final result of a match. `winner == None` is a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Winning side, if any
    pub winner: Option<Side>,
    /// Termination reason
    pub reason: EndReason,
}

impl MatchOutcome {
    /// The opponent of `disconnected` wins.
    pub fn disconnect(disconnected: Side) -> Self {
        Self {
            winner: Some(disconnected.opponent()),
            reason: EndReason::Disconnect,
        }
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum MatchPhase {
    /// Active gameplay
    #[default]
    Playing,
    /// Match ended
    Ended(MatchOutcome),
}

// =============================================================================
// SIDE STATE
// =============================================================================

/// Per-side resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideState {
    /// Participant level at match start (scales new units)
    pub level: u32,
    /// Current mana
    pub mana: u32,
    /// This side's structures
    pub fortress: Fortress,
}

impl SideState {
    fn new(side: Side, level: u32) -> Self {
        Self {
            level,
            mana: 0,
            fortress: Fortress::new(side, level),
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Session identifier
    pub session_id: [u8; 16],

    /// Ticks elapsed since the match (re)started
    pub elapsed_ticks: u32,

    /// Current match phase
    pub phase: MatchPhase,

    /// RNG seed (for reproduction)
    pub rng_seed: u64,

    /// Deterministic RNG state
    #[serde(skip)]
    pub rng: DeterministicRng,

    /// P1 and P2 resources
    pub sides: [SideState; 2],

    /// Live units in deployment order
    pub units: Vec<Unit>,

    /// Next unit ID (monotonic counter)
    pub next_unit_id: u32,

    /// Events generated since the last drain
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a new match state with structures scaled to each side's level.
    pub fn new(session_id: [u8; 16], rng_seed: u64, levels: [u32; 2]) -> Self {
        Self {
            session_id,
            elapsed_ticks: 0,
            phase: MatchPhase::Playing,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            sides: [
                SideState::new(Side::P1, levels[0]),
                SideState::new(Side::P2, levels[1]),
            ],
            units: Vec::new(),
            next_unit_id: 0,
            pending_events: Vec::new(),
        }
    }

    /// Restore a fresh match for a replay, keeping the RNG stream.
    pub fn reset(&mut self, levels: [u32; 2]) {
        self.elapsed_ticks = 0;
        self.phase = MatchPhase::Playing;
        self.sides = [
            SideState::new(Side::P1, levels[0]),
            SideState::new(Side::P2, levels[1]),
        ];
        self.units.clear();
        self.pending_events.clear();
    }

    /// Per-side state.
    #[inline]
    pub fn side(&self, side: Side) -> &SideState {
        &self.sides[side.index()]
    }

    /// Mutable per-side state.
    #[inline]
    pub fn side_mut(&mut self, side: Side) -> &mut SideState {
        &mut self.sides[side.index()]
    }

    /// Current mana of a side.
    #[inline]
    pub fn mana(&self, side: Side) -> u32 {
        self.side(side).mana
    }

    /// Credit mana to both sides, capped.
    pub fn credit_mana(&mut self, amount: u32, cap: u32) {
        for side in &mut self.sides {
            side.mana = (side.mana + amount).min(cap);
        }
    }

    /// Append a new unit at the far end of a lane. Returns its id.
    pub fn spawn_unit(&mut self, owner: Side, kind: UnitKind, lane: Lane) -> u32 {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        let level = self.side(owner).level;
        self.units.push(Unit::spawn(id, owner, kind, lane, level));
        id
    }

    /// Check if match has ended.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended(_))
    }

    /// Outcome, once ended.
    pub fn outcome(&self) -> Option<MatchOutcome> {
        match self.phase {
            MatchPhase::Ended(outcome) => Some(outcome),
            MatchPhase::Playing => None,
        }
    }

    /// End the match. A second call keeps the first outcome.
    pub fn end_match(&mut self, outcome: MatchOutcome) {
        if self.is_ended() {
            return;
        }
        self.phase = MatchPhase::Ended(outcome);
        self.push_event(GameEvent::match_ended(self.elapsed_ticks, outcome));
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::FAR_POSITION;

    #[test]
    fn test_new_state_is_fresh() {
        let state = MatchState::new([0; 16], 1, [0, 3]);
        assert_eq!(state.mana(Side::P1), 0);
        assert_eq!(state.mana(Side::P2), 0);
        assert!(state.units.is_empty());
        assert_eq!(state.side(Side::P1).fortress.get(Lane::Center).hp, 2000);
        assert_eq!(state.side(Side::P2).fortress.get(Lane::Center).hp, 2600);
        assert!(!state.is_ended());
    }

    #[test]
    fn test_credit_mana_caps() {
        let mut state = MatchState::new([0; 16], 1, [0, 0]);
        for _ in 0..15 {
            state.credit_mana(1, 10);
        }
        assert_eq!(state.mana(Side::P1), 10);
        assert_eq!(state.mana(Side::P2), 10);
    }

    #[test]
    fn test_spawn_unit_uses_owner_level() {
        let mut state = MatchState::new([0; 16], 1, [1, 0]);
        let a = state.spawn_unit(Side::P1, UnitKind::Pawn, Lane::Left);
        let b = state.spawn_unit(Side::P2, UnitKind::Pawn, Lane::Left);
        assert_ne!(a, b);
        assert_eq!(state.units[0].hp, 55);
        assert_eq!(state.units[1].hp, 50);
        assert_eq!(state.units[0].position, FAR_POSITION);
        assert_eq!(state.units.iter().filter(|u| u.owner == Side::P2).count(), 1);
    }

    #[test]
    fn test_end_match_is_sticky() {
        let mut state = MatchState::new([0; 16], 1, [0, 0]);
        state.end_match(MatchOutcome::disconnect(Side::P1));
        state.end_match(MatchOutcome { winner: None, reason: EndReason::Timeout });
        assert_eq!(state.outcome(), Some(MatchOutcome::disconnect(Side::P1)));
        assert_eq!(state.outcome().unwrap().winner, Some(Side::P2));
        assert_eq!(state.take_events().len(), 1);
    }

    #[test]
    fn test_reset_restores_initial_values() {
        let mut state = MatchState::new([0; 16], 1, [0, 0]);
        state.credit_mana(7, 10);
        state.spawn_unit(Side::P1, UnitKind::Rook, Lane::Right);
        state.side_mut(Side::P2).fortress.get_mut(Lane::Left).take_damage(400);
        state.elapsed_ticks = 55;
        state.end_match(MatchOutcome::disconnect(Side::P2));

        state.reset([2, 0]);

        assert_eq!(state.elapsed_ticks, 0);
        assert_eq!(state.phase, MatchPhase::Playing);
        assert!(state.units.is_empty());
        assert_eq!(state.mana(Side::P1), 0);
        assert_eq!(state.side(Side::P2).fortress.get(Lane::Left).hp, 1000);
        assert_eq!(state.side(Side::P1).fortress.get(Lane::Left).hp, 1200);
    }
}

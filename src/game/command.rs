//! Command Processor
//!
//! Parses participant text commands and applies deployments to the match.
//! A rejected command never mutates state.

use thiserror::Error;

use crate::game::events::GameEvent;
use crate::game::map::{Lane, Side};
use crate::game::state::MatchState;
use crate::game::unit::UnitKind;

/// Why a command was rejected. Rendered back to the sender only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("invalid command, use <type>-<lane> (e.g. pawn-L or 1-L)")]
    Malformed,
    #[error("unknown unit type: {0}")]
    UnknownUnit(String),
    #[error("invalid lane: {0} (use L, C or R)")]
    UnknownLane(String),
    #[error("not enough mana (need {need}, have {have})")]
    NotEnoughMana { need: u32, have: u32 },
    #[error("match is not in progress")]
    MatchNotActive,
}

/// A parsed deploy request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployCommand {
    pub kind: UnitKind,
    pub lane: Lane,
}

impl DeployCommand {
    /// Wire form understood by [`parse_deploy`].
    pub fn to_line(self) -> String {
        format!("{}-{}", self.kind.name(), self.lane.code())
    }
}

/// Result of a successful deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployReceipt {
    pub unit_id: u32,
    pub kind: UnitKind,
    pub lane: Lane,
    pub mana_left: u32,
}

/// Parse `<type>-<lane>`, case-insensitive.
pub fn parse_deploy(raw: &str) -> Result<DeployCommand, CommandError> {
    let (kind, lane) = raw.trim().split_once('-').ok_or(CommandError::Malformed)?;
    if kind.is_empty() || lane.is_empty() || lane.contains('-') {
        return Err(CommandError::Malformed);
    }

    let kind = kind
        .parse::<UnitKind>()
        .map_err(|_| CommandError::UnknownUnit(kind.trim().to_string()))?;
    let lane = lane
        .parse::<Lane>()
        .map_err(|_| CommandError::UnknownLane(lane.trim().to_string()))?;

    Ok(DeployCommand { kind, lane })
}

/// Validate and apply a deploy command for `side`.
///
/// On success mana is debited and a unit is placed at the far end of the lane.
pub fn apply_deploy(state: &mut MatchState, side: Side, raw: &str) -> Result<DeployReceipt, CommandError> {
    if state.is_ended() {
        return Err(CommandError::MatchNotActive);
    }

    let DeployCommand { kind, lane } = parse_deploy(raw)?;

    let have = state.mana(side);
    let need = kind.cost();
    if have < need {
        return Err(CommandError::NotEnoughMana { need, have });
    }

    state.side_mut(side).mana = have - need;
    let unit_id = state.spawn_unit(side, kind, lane);
    let mana_left = state.mana(side);
    let tick = state.elapsed_ticks;
    state.push_event(GameEvent::unit_deployed(tick, side, unit_id, kind, lane, mana_left));

    Ok(DeployReceipt {
        unit_id,
        kind,
        lane,
        mana_left,
    })
}

/// Parse a replay answer. `None` means the answer was neither Y nor N.
pub fn parse_replay_answer(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "Y" | "YES" => Some(true),
        "N" | "NO" => Some(false),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

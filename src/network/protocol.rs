//! Protocol Messages
//!
//! Wire format for server-to-participant traffic. The connection boundary is
//! line-delimited text, so every message renders itself through `Display`;
//! the serde form is kept for structured logging and tooling.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::game::map::{Lane, Side};
use crate::game::state::{EndReason, MatchOutcome};
use crate::game::unit::UnitKind;

// =============================================================================
// SERVER -> PARTICIPANT MESSAGES
// =============================================================================

/// Messages sent from server to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Profile summary after the username line.
    Welcome(ProfileSummary),

    /// Mode choice prompt.
    ModeMenu,

    /// Bot difficulty prompt.
    DifficultyMenu,

    /// Queued for a PvP opponent.
    Waiting,

    /// Match (re)started.
    MatchStart(MatchStartInfo),

    /// Deploy accepted.
    Deployed {
        kind: UnitKind,
        lane: Lane,
        mana_left: u32,
    },

    /// Command rejected; reason goes to the sender only.
    Rejected { reason: String },

    /// Per-tick state update.
    State(StateUpdate),

    /// Match result from the recipient's point of view.
    MatchEnd(MatchEndInfo),

    /// Experience credited after a win.
    ExperienceGained(ProfileSummary),

    /// Level threshold crossed.
    LevelUp { level: u32 },

    /// Replay question.
    ReplayPrompt,

    /// Replay answer accepted as yes.
    ReplayAccepted,

    /// Replay answer accepted as no.
    ReplayDeclined,

    /// Replay answer was neither Y nor N.
    InvalidReplayAnswer,

    /// No replay answer within the bound.
    ReplayTimeout,

    /// Session is over.
    Goodbye,

    /// Error message (handshake failures).
    Error { message: String },

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Level and experience, as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// Current level.
    pub level: u32,
    /// Experience toward the next level.
    pub exp: u32,
    /// Experience the next level requires.
    pub exp_needed: u32,
}

/// Match start info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStartInfo {
    /// Recipient's seat.
    pub side: Side,
    /// Opponent's display name.
    pub opponent: String,
    /// True when this follows an accepted replay.
    pub rematch: bool,
}

/// Per-tick snapshot for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Recipient's seat.
    pub side: Side,
    /// Recipient's mana.
    pub mana: u32,
    /// Ticks elapsed (seconds at the default clock).
    pub elapsed: u32,
    /// Rendered board.
    pub board: String,
}

/// Result from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Win,
    Loss,
    Draw,
}

/// Match end info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEndInfo {
    /// Win, loss or draw for the recipient.
    pub result: MatchResult,
    /// Why the match ended.
    pub reason: EndReason,
}

impl MatchEndInfo {
    /// View an outcome from one seat.
    pub fn for_side(outcome: MatchOutcome, side: Side) -> Self {
        let result = match outcome.winner {
            None => MatchResult::Draw,
            Some(winner) if winner == side => MatchResult::Win,
            Some(_) => MatchResult::Loss,
        };
        Self {
            result,
            reason: outcome.reason,
        }
    }
}

// =============================================================================
// TEXT RENDERING
// =============================================================================

const COMMAND_HELP: &str = "Deploy with <type>-<lane>, e.g. pawn-L or 1-L.\n\
Types: 1 pawn(3) 2 bishop(4) 3 rook(5) 4 knight(5) 5 prince(6) 6 queen(5)\n\
Lanes: L C R";

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Welcome(p) => write!(f, "Welcome! Level: {}, EXP: {}/{}", p.level, p.exp, p.exp_needed),
            ServerMessage::ModeMenu => write!(f, "Choose mode:\n1. Play vs Bot\n2. Play vs Player"),
            ServerMessage::DifficultyMenu => write!(f, "Choose difficulty:\n1. Easy\n2. Medium\n3. Hard"),
            ServerMessage::Waiting => write!(f, "Waiting for another player..."),
            ServerMessage::MatchStart(info) => {
                if info.rematch {
                    writeln!(f, "Starting new game!")?;
                } else {
                    writeln!(f, "Game started! You are {} vs {}.", info.side, info.opponent)?;
                }
                write!(f, "{}", COMMAND_HELP)
            }
            ServerMessage::Deployed { kind, lane, mana_left } => {
                write!(f, "Deployed {} to {} lane (mana left: {})", kind, lane, mana_left)
            }
            ServerMessage::Rejected { reason } => write!(f, "Rejected: {}", reason),
            ServerMessage::State(s) => write!(f, "Mana: {} | Time: {}s\n{}", s.mana, s.elapsed, s.board),
            ServerMessage::MatchEnd(info) => match info.result {
                MatchResult::Win => write!(f, "GAME OVER! You win ({})!", info.reason),
                MatchResult::Loss => write!(f, "GAME OVER! You lose ({}).", info.reason),
                MatchResult::Draw => write!(f, "GAME OVER! Draw ({}).", info.reason),
            },
            ServerMessage::ExperienceGained(p) => {
                write!(f, "You gained experience! Level: {}, EXP: {}/{}", p.level, p.exp, p.exp_needed)
            }
            ServerMessage::LevelUp { level } => write!(f, "=== LEVEL UP! You've reached LEVEL {}! ===", level),
            ServerMessage::ReplayPrompt => write!(f, "Play again? (Y/N)"),
            ServerMessage::ReplayAccepted => write!(f, "Ready for next game!"),
            ServerMessage::ReplayDeclined => write!(f, "Ending session. Goodbye!"),
            ServerMessage::InvalidReplayAnswer => write!(f, "Invalid response. Please type Y or N."),
            ServerMessage::ReplayTimeout => write!(f, "Replay response timeout."),
            ServerMessage::Goodbye => write!(f, "Thanks for playing! Goodbye!"),
            ServerMessage::Error { message } => write!(f, "Error: {}", message),
            ServerMessage::Shutdown { reason } => write!(f, "Server shutting down: {}", reason),
        }
    }
}

impl ServerMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// TESTS
// =============================================================================

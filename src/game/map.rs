//! Lane Topology
//!
//! Two sides face each other across three parallel lanes of five cells.
//! Every position is stored in its owner's frame: the number of steps left
//! before the unit reaches the enemy structure.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

/// Number of discrete positions per lane.
pub const LANE_LENGTH: u8 = 5;

/// Spawn position, adjacent to the deploying side's own structure.
pub const FAR_POSITION: u8 = LANE_LENGTH - 1;

/// Position adjacent to the enemy structure.
pub const SIEGE_POSITION: u8 = 0;

/// Mirror a position into the opposing side's frame.
///
/// Two opposing units share a cell exactly when one's position is the
/// mirror of the other's.
#[inline]
pub const fn mirrored_position(position: u8) -> u8 {
    FAR_POSITION - position
}

// =============================================================================
// SIDE
// =============================================================================

/// One of the two seats in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// First seat
    P1,
    /// Second seat
    P2,
}

impl Side {
    /// Both seats in order.
    pub const ALL: [Side; 2] = [Side::P1, Side::P2];

    /// Seat index (0 or 1).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Side::P1 => 0,
            Side::P2 => 1,
        }
    }

    /// The opposing seat.
    #[inline]
    pub const fn opponent(self) -> Side {
        match self {
            Side::P1 => Side::P2,
            Side::P2 => Side::P1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::P1 => write!(f, "Player 1"),
            Side::P2 => write!(f, "Player 2"),
        }
    }
}

// =============================================================================
// LANE
// =============================================================================

/// One of the three parallel lanes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Lane {
    /// Left flank
    Left,
    /// Center lane, guarded by the king structure
    Center,
    /// Right flank
    Right,
}

impl Lane {
    /// All lanes, top to bottom.
    pub const ALL: [Lane; 3] = [Lane::Left, Lane::Center, Lane::Right];

    /// Is this a flank lane?
    #[inline]
    pub const fn is_flank(self) -> bool {
        !matches!(self, Lane::Center)
    }

    /// Single-letter code used on the wire.
    pub const fn code(self) -> char {
        match self {
            Lane::Left => 'L',
            Lane::Center => 'C',
            Lane::Right => 'R',
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Left => write!(f, "Left"),
            Lane::Center => write!(f, "Center"),
            Lane::Right => write!(f, "Right"),
        }
    }
}

impl FromStr for Lane {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LEFT" => Ok(Lane::Left),
            "C" | "CENTER" => Ok(Lane::Center),
            "R" | "RIGHT" => Ok(Lane::Right),
            _ => Err(()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Text Board
//!
//! Renders the three lanes from P1's point of view: P1's structures on the
//! left, P2's on the right. P2 positions are already counted from P1's
//! structures, P1 positions are mirrored.

use std::fmt::Write;

use crate::game::map::{mirrored_position, Lane, Side, LANE_LENGTH};
use crate::game::state::MatchState;
use crate::game::structure::Structure;

const LANE_SEPARATOR: &str = "                          --- --- --- --- ---";

/// Render the board as multi-line text. Destroyed structures show as `X`.
pub fn render_board(state: &MatchState) -> String {
    let mut cells: [[String; LANE_LENGTH as usize]; 3] =
        std::array::from_fn(|_| std::array::from_fn(|_| String::from(" ")));

    for unit in state.units.iter().filter(|u| u.alive && u.position < LANE_LENGTH) {
        let column = match unit.owner {
            Side::P1 => mirrored_position(unit.position),
            Side::P2 => unit.position,
        } as usize;
        let row = Lane::ALL.iter().position(|l| *l == unit.lane).unwrap_or(0);
        // Two units in one cell show the later deployment
        cells[row][column] = format!("{}{}", unit.kind.symbol(), unit.owner.index() + 1);
    }

    let mut out = String::new();
    let _ = writeln!(out, "+---------------------------- LANE CLASH ----------------------------+");
    for (row, lane) in Lane::ALL.iter().enumerate() {
        let p1 = state.side(Side::P1).fortress.get(*lane);
        let p2 = state.side(Side::P2).fortress.get(*lane);
        let name = if lane.is_flank() { format!("Guard{}", lane.code()) } else { "King  ".to_string() };
        let _ = writeln!(
            out,
            "[P1 {} {:>5}] => |{}| <= [P2 {} {:>5}]",
            name,
            hp_label(p1),
            cells[row].iter().map(|c| format!("{:^3}", c)).collect::<Vec<_>>().join("|"),
            name,
            hp_label(p2),
        );
        if row + 1 < Lane::ALL.len() {
            let _ = writeln!(out, "{}", LANE_SEPARATOR);
        }
    }
    let _ = write!(out, "+--------------------------------------------------------------------+");
    out
}

fn hp_label(structure: &Structure) -> String {
    if structure.is_alive() {
        structure.hp.to_string()
    } else {
        "X".to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================

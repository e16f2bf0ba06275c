//! Damage Resolution
//!
//! All exchanges are simultaneous: both sides' damage is computed from the
//! pre-exchange stats, then applied.

use crate::core::rng::DeterministicRng;

/// Crit multiplier numerator over [`CRIT_DENOMINATOR`] (1.2x).
pub const CRIT_NUMERATOR: i32 = 12;
/// Crit multiplier denominator.
pub const CRIT_DENOMINATOR: i32 = 10;

/// Compute damage dealt by `attack` against `defense`.
///
/// `max(0, floor(attack × (crit ? 1.2 : 1.0)) − defense)`
#[inline]
pub fn compute_damage(attack: i32, defense: i32, crit: bool) -> i32 {
    let effective = if crit {
        attack * CRIT_NUMERATOR / CRIT_DENOMINATOR
    } else {
        attack
    };
    (effective - defense).max(0)
}

/// Roll a crit for an attacker with the given chance and compute damage.
///
/// Units attack with chance 0, which never touches the RNG.
#[inline]
pub fn roll_damage(rng: &mut DeterministicRng, attack: i32, defense: i32, crit_chance: u32) -> i32 {
    let crit = rng.roll_percent(crit_chance);
    compute_damage(attack, defense, crit)
}

// =============================================================================
// TESTS
// =============================================================================

//! Authoritative Simulation Tick
//!
//! One call advances the match by one clock period: mana is credited, every
//! unit ages and (on even ages) moves, clashes or sieges, dead units are
//! purged, and the end conditions are checked.

use std::collections::BTreeSet;

use crate::{MANA_CAP, MANA_PER_TICK, MATCH_DURATION_TICKS};
use crate::game::combat::{compute_damage, roll_damage};
use crate::game::command::apply_deploy;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::map::{mirrored_position, Side, FAR_POSITION, SIEGE_POSITION};
use crate::game::state::{EndReason, MatchOutcome, MatchState};
use crate::game::unit::Ability;

/// Result of a tick.
#[derive(Debug)]
#[derive(Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether match ended this tick
    pub match_ended: bool,
    /// Outcome (if match ended)
    pub outcome: Option<MatchOutcome>,
}

/// Configuration for match simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchConfig {
    /// Mana ceiling per side
    pub mana_cap: u32,
    /// Mana credited to each side per tick
    pub mana_per_tick: u32,
    /// Match length in ticks before the timeout rule applies
    pub duration_ticks: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mana_cap: MANA_CAP,
            mana_per_tick: MANA_PER_TICK,
            duration_ticks: MATCH_DURATION_TICKS,
        }
    }
}

/// Run one simulation tick.
///
/// Does nothing once the match has ended. All randomness is drawn from
/// `state.rng`, so identical states and command streams produce identical
/// results.
pub fn tick(state: &mut MatchState, config: &MatchConfig) -> TickResult {
    let mut result = TickResult::default();

    if let Some(outcome) = state.outcome() {
        result.match_ended = true;
        result.outcome = Some(outcome);
        return result;
    }

    // 0. Advance clock
    state.elapsed_ticks += 1;

    // 1. Credit mana
    state.credit_mana(config.mana_per_tick, config.mana_cap);

    // 2. Age, move, clash, siege
    advance_units(state);

    // 3. Remove the dead
    purge_dead_units(state);

    // 4. Check end conditions
    check_end_conditions(state, config, &mut result);

    // Collect events
    result.events = state.take_events();

    result
}

/// Process every unit once, in deployment order.
///
/// A unit sent to another lane stays at the far end until the next tick,
/// even when its own turn comes after the reroute.
fn advance_units(state: &mut MatchState) {
    let mut rerouted = BTreeSet::new();

    for i in 0..state.units.len() {
        if !state.units[i].alive {
            continue;
        }

        state.units[i].age += 1;
        if !state.units[i].can_act() || rerouted.contains(&state.units[i].id) {
            continue;
        }

        if state.units[i].position == SIEGE_POSITION {
            engage_structure(state, i, &mut rerouted);
        } else {
            advance_or_clash(state, i);
        }
    }
}

/// Unit `i` is away from the enemy line: fight whoever shares its cell, or step forward.
fn advance_or_clash(state: &mut MatchState, i: usize) {
    let tick = state.elapsed_ticks;
    let (owner, lane, position) = {
        let unit = &state.units[i];
        (unit.owner, unit.lane, unit.position)
    };
    let target_position = mirrored_position(position);

    let opponent = state.units.iter().position(|u| {
        u.alive && u.owner != owner && u.lane == lane && u.position == target_position
    });

    let Some(j) = opponent else {
        state.units[i].position -= 1;
        return;
    };

    let dealt = compute_damage(state.units[i].attack, state.units[j].defense, false);
    let received = compute_damage(state.units[j].attack, state.units[i].defense, false);
    state.units[j].take_damage(dealt);
    state.units[i].take_damage(received);

    let (attacker_id, defender_id) = (state.units[i].id, state.units[j].id);
    state.push_event(GameEvent::new(
        tick,
        Some(owner),
        GameEventData::UnitsClashed { attacker_id, defender_id, dealt, received },
    ));

    for k in [i, j] {
        if !state.units[k].alive {
            let (unit_id, side) = (state.units[k].id, state.units[k].owner);
            state.push_event(GameEvent::new(tick, Some(side), GameEventData::UnitDied { unit_id }));
        }
    }
}

/// Unit `i` stands at the enemy line: heal, or strike (rerouting first if its target is gone).
fn engage_structure(state: &mut MatchState, i: usize, rerouted: &mut BTreeSet<u32>) {
    let tick = state.elapsed_ticks;
    let (owner, lane, unit_id) = {
        let unit = &state.units[i];
        (unit.owner, unit.lane, unit.id)
    };
    let enemy = owner.opponent();

    // Healers never need a live target
    if matches!(state.units[i].ability(), Ability::Strike) && !state.side(enemy).fortress.get(lane).is_alive() {
        reroute(state, i, enemy, rerouted);
        return;
    }

    match state.units[i].ability() {
        Ability::Heal(amount) => {
            let healed = state
                .side_mut(owner)
                .fortress
                .weakest_alive_mut()
                .map(|s| (s.lane, s.heal(amount)));
            if let Some((healed_lane, amount)) = healed {
                state.push_event(GameEvent::new(
                    tick,
                    Some(owner),
                    GameEventData::StructureHealed { unit_id, lane: healed_lane, amount },
                ));
            }
            state.units[i].alive = false;
        }
        Ability::Strike => {
            let (attack, defense, crit_chance) = {
                let s = state.side(enemy).fortress.get(lane);
                (s.attack, s.defense, s.crit_chance)
            };
            let dealt = compute_damage(state.units[i].attack, defense, false);
            let received = roll_damage(&mut state.rng, attack, state.units[i].defense, crit_chance);

            let structure = state.side_mut(enemy).fortress.get_mut(lane);
            structure.take_damage(dealt);
            let hp_left = structure.hp;
            state.units[i].take_damage(received);

            state.push_event(GameEvent::new(
                tick,
                Some(owner),
                GameEventData::StructureHit { unit_id, lane, dealt, received, hp_left },
            ));
            if !state.units[i].alive {
                state.push_event(GameEvent::new(tick, Some(owner), GameEventData::UnitDied { unit_id }));
            }

            if hp_left == 0 {
                state.push_event(GameEvent::structure_destroyed(tick, enemy, lane));
                if lane.is_flank() {
                    let sieging: Vec<usize> = state
                        .units
                        .iter()
                        .enumerate()
                        .filter(|(_, u)| {
                            u.alive
                                && u.owner == owner
                                && u.lane == lane
                                && u.position == SIEGE_POSITION
                                && matches!(u.ability(), Ability::Strike)
                        })
                        .map(|(k, _)| k)
                        .collect();
                    for k in sieging {
                        reroute(state, k, enemy, rerouted);
                    }
                }
            }
        }
    }
}

/// Send unit `i` to the far end of the lane picked by the defender's remaining flanks.
fn reroute(state: &mut MatchState, i: usize, defender: Side, rerouted: &mut BTreeSet<u32>) {
    let to = state.side(defender).fortress.reroute_lane();
    let tick = state.elapsed_ticks;

    let unit = &mut state.units[i];
    let from = unit.lane;
    unit.lane = to;
    unit.position = FAR_POSITION;

    let (unit_id, owner) = (unit.id, unit.owner);
    rerouted.insert(unit_id);
    state.push_event(GameEvent::new(tick, Some(owner), GameEventData::UnitRerouted { unit_id, from, to }));
}

fn purge_dead_units(state: &mut MatchState) {
    state.units.retain(|u| u.alive);
}

/// Check if match should end.
fn check_end_conditions(state: &mut MatchState, config: &MatchConfig, result: &mut TickResult) {
    let p1_fallen = state.side(Side::P1).fortress.king_destroyed();
    let p2_fallen = state.side(Side::P2).fortress.king_destroyed();

    let outcome = match (p1_fallen, p2_fallen) {
        (true, true) => Some(MatchOutcome { winner: None, reason: EndReason::StructureDestroyed }),
        (true, false) => Some(MatchOutcome { winner: Some(Side::P2), reason: EndReason::StructureDestroyed }),
        (false, true) => Some(MatchOutcome { winner: Some(Side::P1), reason: EndReason::StructureDestroyed }),
        (false, false) if state.elapsed_ticks >= config.duration_ticks => {
            Some(MatchOutcome { winner: timeout_winner(state), reason: EndReason::Timeout })
        }
        (false, false) => None,
    };

    if let Some(outcome) = outcome {
        state.end_match(outcome);
        result.match_ended = true;
        result.outcome = Some(outcome);
    }
}

/// The side that destroyed more enemy structures; `None` on a tie.
fn timeout_winner(state: &MatchState) -> Option<Side> {
    // P1's score is what it destroyed on P2's side, and vice versa
    let p1_score = state.side(Side::P2).fortress.destroyed_count();
    let p2_score = state.side(Side::P1).fortress.destroyed_count();
    match p1_score.cmp(&p2_score) {
        std::cmp::Ordering::Greater => Some(Side::P1),
        std::cmp::Ordering::Less => Some(Side::P2),
        std::cmp::Ordering::Equal => None,
    }
}

// =============================================================================
// REPLAY
// =============================================================================

/// A command as received, stamped with the tick count when it was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedCommand {
    /// `elapsed_ticks` at the moment the command was applied
    pub tick: u32,
    /// Sender
    pub side: Side,
    /// Raw line
    pub line: String,
}

/// Replay a match from a command log.
///
/// Commands are applied before the tick that follows their stamp, in log
/// order. Rejected commands are skipped exactly as they were live.
pub fn replay_match(
    initial_state: MatchState,
    log: &[LoggedCommand],
    tick_count: u32,
    config: &MatchConfig,
) -> (MatchState, Vec<GameEvent>) {
    let mut state = initial_state;
    let mut all_events = Vec::new();
    let mut pending = log.iter().peekable();

    for _ in 0..tick_count {
        while let Some(cmd) = pending.next_if(|c| c.tick <= state.elapsed_ticks) {
            let _ = apply_deploy(&mut state, cmd.side, &cmd.line);
        }
        all_events.extend(state.take_events());

        let result = tick(&mut state, config);
        all_events.extend(result.events);

        if result.match_ended {
            break;
        }
    }

    (state, all_events)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::Lane;
    use crate::game::unit::UnitKind;

    fn fresh() -> MatchState {
        MatchState::new([0; 16], 12345, [0, 0])
    }

    /// Place a unit directly, bypassing mana.
    fn place(state: &mut MatchState, side: Side, kind: UnitKind, lane: Lane, position: u8) -> u32 {
        let id = state.spawn_unit(side, kind, lane);
        let unit = state.units.last_mut().unwrap();
        unit.position = position;
        id
    }

    fn unit(state: &MatchState, id: u32) -> Option<&crate::game::unit::Unit> {
        state.units.iter().find(|u| u.id == id)
    }

    #[test]
    fn test_mana_credited_each_tick() {
        let mut state = fresh();
        let config = MatchConfig::default();
        for _ in 0..3 {
            tick(&mut state, &config);
        }
        assert_eq!(state.mana(Side::P1), 3);
        assert_eq!(state.mana(Side::P2), 3);
        assert_eq!(state.elapsed_ticks, 3);
    }

    #[test]
    fn test_unit_moves_on_even_ages_only() {
        let mut state = fresh();
        let config = MatchConfig::default();
        let id = place(&mut state, Side::P1, UnitKind::Pawn, Lane::Left, FAR_POSITION);

        tick(&mut state, &config); // age 1: idle
        assert_eq!(unit(&state, id).unwrap().position, 4);
        tick(&mut state, &config); // age 2: moves
        assert_eq!(unit(&state, id).unwrap().position, 3);
        tick(&mut state, &config);
        assert_eq!(unit(&state, id).unwrap().position, 3);
        tick(&mut state, &config);
        assert_eq!(unit(&state, id).unwrap().position, 2);
    }

    #[test]
    fn test_mirrored_equal_units_trade_and_both_die() {
        let mut state = fresh();
        let config = MatchConfig::default();
        // Knight vs knight: 300 - 150 = 150 damage each, hp 200 -> 50
        let a = place(&mut state, Side::P1, UnitKind::Knight, Lane::Center, 2);
        let b = place(&mut state, Side::P2, UnitKind::Knight, Lane::Center, 2);
        state.units.iter_mut().for_each(|u| u.age = 1);

        tick(&mut state, &config);
        // Each unit gets its own eligible turn: two exchanges in one tick
        assert!(unit(&state, a).is_none());
        assert!(unit(&state, b).is_none());
    }

    #[test]
    fn test_single_exchange_is_symmetric() {
        let mut state = fresh();
        let config = MatchConfig::default();
        let a = place(&mut state, Side::P1, UnitKind::Prince, Lane::Right, 2);
        let b = place(&mut state, Side::P2, UnitKind::Prince, Lane::Right, 2);
        // Only the P1 prince is eligible this tick
        state.units[0].age = 1;
        state.units[1].age = 0;

        tick(&mut state, &config);
        // 400 - 300 = 100 each way
        assert_eq!(unit(&state, a).unwrap().hp, 400);
        assert_eq!(unit(&state, b).unwrap().hp, 400);
        assert_eq!(unit(&state, a).unwrap().position, 2);
    }

    #[test]
    fn test_unit_damages_center_every_eligible_tick() {
        let mut state = fresh();
        let config = MatchConfig::default();
        place(&mut state, Side::P1, UnitKind::Prince, Lane::Center, SIEGE_POSITION);
        state.units[0].age = 1;

        tick(&mut state, &config);
        // 400 - 300 = 100
        assert_eq!(state.side(Side::P2).fortress.get(Lane::Center).hp, 1900);
        tick(&mut state, &config);
        assert_eq!(state.side(Side::P2).fortress.get(Lane::Center).hp, 1900);
        tick(&mut state, &config);
        assert_eq!(state.side(Side::P2).fortress.get(Lane::Center).hp, 1800);
    }

    #[test]
    fn test_queen_heals_weakest_and_vanishes() {
        let mut state = fresh();
        let config = MatchConfig::default();
        state.side_mut(Side::P1).fortress.get_mut(Lane::Right).take_damage(500);
        state.side_mut(Side::P1).fortress.get_mut(Lane::Center).take_damage(100);
        place(&mut state, Side::P1, UnitKind::Queen, Lane::Left, SIEGE_POSITION);
        state.units[0].age = 1;

        tick(&mut state, &config);
        assert_eq!(state.side(Side::P1).fortress.get(Lane::Right).hp, 800);
        assert_eq!(state.side(Side::P2).fortress.get(Lane::Left).hp, 1000);
        assert!(state.units.is_empty());
    }

    #[test]
    fn test_queen_heals_even_when_lane_structure_is_down() {
        let mut state = fresh();
        let config = MatchConfig::default();
        state.side_mut(Side::P2).fortress.get_mut(Lane::Left).hp = 0;
        state.side_mut(Side::P1).fortress.get_mut(Lane::Right).take_damage(500);
        place(&mut state, Side::P1, UnitKind::Queen, Lane::Left, SIEGE_POSITION);
        state.units[0].age = 1;

        let result = tick(&mut state, &config);
        assert_eq!(state.side(Side::P1).fortress.get(Lane::Right).hp, 800);
        assert!(state.units.is_empty());
        assert!(!result.events.iter().any(|e| matches!(e.data, GameEventData::UnitRerouted { .. })));
    }

    #[test]
    fn test_flank_destroyed_reroutes_attackers() {
        let mut state = fresh();
        let config = MatchConfig::default();
        state.side_mut(Side::P2).fortress.get_mut(Lane::Left).hp = 50;
        let a = place(&mut state, Side::P1, UnitKind::Prince, Lane::Left, SIEGE_POSITION);
        let b = place(&mut state, Side::P1, UnitKind::Rook, Lane::Left, SIEGE_POSITION);
        state.units[0].age = 1;
        state.units[1].age = 0;

        tick(&mut state, &config);
        assert_eq!(state.side(Side::P2).fortress.get(Lane::Left).hp, 0);
        for id in [a, b] {
            let u = unit(&state, id).unwrap();
            assert_eq!(u.lane, Lane::Right);
            assert_eq!(u.position, FAR_POSITION);
        }
    }

    #[test]
    fn test_both_flanks_down_routes_to_center() {
        let mut state = fresh();
        let config = MatchConfig::default();
        state.side_mut(Side::P2).fortress.get_mut(Lane::Right).hp = 0;
        state.side_mut(Side::P2).fortress.get_mut(Lane::Left).hp = 10;
        let a = place(&mut state, Side::P1, UnitKind::Prince, Lane::Left, SIEGE_POSITION);
        state.units[0].age = 1;

        tick(&mut state, &config);
        let u = unit(&state, a).unwrap();
        assert_eq!(u.lane, Lane::Center);
        assert_eq!(u.position, FAR_POSITION);
    }

    #[test]
    fn test_rerouted_units_hold_far_position_this_tick() {
        let mut state = fresh();
        let config = MatchConfig::default();
        state.side_mut(Side::P2).fortress.get_mut(Lane::Right).hp = 0;
        state.side_mut(Side::P2).fortress.get_mut(Lane::Left).hp = 10;
        let a = place(&mut state, Side::P1, UnitKind::Prince, Lane::Left, SIEGE_POSITION);
        let b = place(&mut state, Side::P1, UnitKind::Rook, Lane::Left, SIEGE_POSITION);
        state.units[0].age = 1;
        state.units[1].age = 1;

        tick(&mut state, &config);
        for id in [a, b] {
            let u = unit(&state, id).unwrap();
            assert_eq!(u.lane, Lane::Center);
            assert_eq!(u.position, FAR_POSITION);
        }
    }

    #[test]
    fn test_unit_at_destroyed_structure_reroutes_without_attacking() {
        let mut state = fresh();
        let config = MatchConfig::default();
        state.side_mut(Side::P2).fortress.get_mut(Lane::Right).hp = 0;
        let a = place(&mut state, Side::P1, UnitKind::Pawn, Lane::Right, SIEGE_POSITION);
        state.units[0].age = 1;

        tick(&mut state, &config);
        let u = unit(&state, a).unwrap();
        assert_eq!(u.lane, Lane::Left);
        assert_eq!(u.hp, 50);
    }

    #[test]
    fn test_center_destroyed_ends_match() {
        let mut state = fresh();
        let config = MatchConfig::default();
        state.side_mut(Side::P2).fortress.get_mut(Lane::Center).hp = 1;
        place(&mut state, Side::P1, UnitKind::Prince, Lane::Center, SIEGE_POSITION);
        state.units[0].age = 1;

        let result = tick(&mut state, &config);
        assert!(result.match_ended);
        assert_eq!(
            result.outcome,
            Some(MatchOutcome { winner: Some(Side::P1), reason: EndReason::StructureDestroyed })
        );
        assert_eq!(state.side(Side::P2).fortress.get(Lane::Center).hp, 0);

        // Further ticks are no-ops
        let elapsed = state.elapsed_ticks;
        assert!(tick(&mut state, &config).match_ended);
        assert_eq!(state.elapsed_ticks, elapsed);
    }

    #[test]
    fn test_both_centers_destroyed_is_draw() {
        let mut state = fresh();
        let config = MatchConfig::default();
        state.side_mut(Side::P1).fortress.get_mut(Lane::Center).hp = 1;
        state.side_mut(Side::P2).fortress.get_mut(Lane::Center).hp = 1;
        place(&mut state, Side::P1, UnitKind::Prince, Lane::Center, SIEGE_POSITION);
        place(&mut state, Side::P2, UnitKind::Prince, Lane::Center, SIEGE_POSITION);
        state.units.iter_mut().for_each(|u| u.age = 1);

        let result = tick(&mut state, &config);
        assert_eq!(result.outcome.unwrap().winner, None);
    }

    #[test]
    fn test_timeout_winner_by_destroyed_count() {
        let mut state = fresh();
        let config = MatchConfig { duration_ticks: 2, ..MatchConfig::default() };
        state.side_mut(Side::P1).fortress.get_mut(Lane::Left).hp = 0;

        assert!(!tick(&mut state, &config).match_ended);
        let result = tick(&mut state, &config);
        assert_eq!(
            result.outcome,
            Some(MatchOutcome { winner: Some(Side::P2), reason: EndReason::Timeout })
        );
    }

    #[test]
    fn test_timeout_draw() {
        let mut state = fresh();
        let config = MatchConfig { duration_ticks: 1, ..MatchConfig::default() };
        let result = tick(&mut state, &config);
        assert_eq!(result.outcome, Some(MatchOutcome { winner: None, reason: EndReason::Timeout }));
    }

    #[test]
    fn test_replay_determinism() {
        let config = MatchConfig::default();
        let log = vec![
            LoggedCommand { tick: 5, side: Side::P1, line: "knight-L".into() },
            LoggedCommand { tick: 6, side: Side::P2, line: "prince-L".into() },
            LoggedCommand { tick: 12, side: Side::P1, line: "queen-C".into() },
            LoggedCommand { tick: 20, side: Side::P2, line: "bogus".into() },
        ];

        let (final1, events1) = replay_match(MatchState::new([7; 16], 99, [1, 2]), &log, 120, &config);
        let (final2, events2) = replay_match(MatchState::new([7; 16], 99, [1, 2]), &log, 120, &config);

        assert_eq!(events1, events2);
        assert_eq!(final1.sides, final2.sides);
        assert_eq!(final1.rng.state(), final2.rng.state());
        assert!(events1.iter().any(|e| matches!(e.data, GameEventData::UnitDeployed { .. })));
    }
}

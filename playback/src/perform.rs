//! How each action is carried out against a `GameState`.
//!
//! An action becomes a short script of `Op`s. Running an op mutates the state
//! and either pauses at a wait point, carries straight on, splices more ops in
//! front of the rest of the script, or ends the action early.

use std::collections::VecDeque;

use awbw_integrations::Log;
use awbw_replay::actions::{AttackUnitAction, EndTurnAction, GameOverAction, MoveUnitAction, PowerAction};
use awbw_replay::{ReplayAction, ReplayBuilding, ReplayUnit};

use crate::board::GameState;
use crate::errors::PlaybackError;
use crate::types::WaitPoint;

/// Who swings first in an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeOrder {
    AttackerFirst,
    DefenderFirst,
}

/// The defender strikes first only when its side has an attack-first power and
/// the attacker's side doesn't; if both or neither do, the attacker goes first.
pub fn strike_order(attacker_first: bool, defender_first: bool) -> StrikeOrder {
    match (attacker_first, defender_first) {
        (false, true) => StrikeOrder::DefenderFirst,
        _ => StrikeOrder::AttackerFirst,
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Op {
    Move(MoveUnitAction),

    /// Works out strike order against the current state, then expands into the
    /// strike sequence.
    Combat(AttackUnitAction),

    Strike {
        striker: i64,
        target: i64,
    },

    /// Applies the target's post-combat stats. If that kills it, the striker's
    /// stats are applied too and the action ends.
    ApplyFirstStrike {
        striker: ReplayUnit,
        target: ReplayUnit,
    },

    CounterStrike {
        striker: i64,
        target: i64,
    },

    ApplyCounterStrike {
        striker: ReplayUnit,
    },

    SetBuilding(ReplayBuilding),
    Build(ReplayUnit),
    Delete(i64),
    Power(PowerAction),
    EndTurn(EndTurnAction),
    Eliminate(i64),
    GameOver(GameOverAction),
}

pub(crate) enum OpResult {
    Wait(WaitPoint),
    Continue,
    Expand(Vec<Op>),

    /// Pause, then drop whatever is left of the action.
    Finish(WaitPoint),
}

/// The ops that carry out `action`, in order.
pub(crate) fn script(action: &ReplayAction) -> VecDeque<Op> {
    let mut ops = VecDeque::new();

    match action {
        ReplayAction::Move(movement) => ops.push_back(Op::Move(movement.clone())),
        ReplayAction::Fire(attack) => ops.push_back(Op::Combat(attack.clone())),

        ReplayAction::Capture(capture) => {
            if let Some(movement) = &capture.move_unit {
                ops.push_back(Op::Move(movement.clone()));
            }

            ops.push_back(Op::SetBuilding(capture.building.clone()));
        },

        ReplayAction::Build(build) => ops.push_back(Op::Build(build.unit.clone())),
        ReplayAction::Delete(delete) => ops.push_back(Op::Delete(delete.unit_id)),
        ReplayAction::Power(power) => ops.push_back(Op::Power(power.clone())),
        ReplayAction::EndTurn(end) => ops.push_back(Op::EndTurn(end.clone())),

        ReplayAction::Eliminated(eliminated) => {
            ops.push_back(Op::Eliminate(eliminated.eliminated_player_id));

            if let Some(game_over) = &eliminated.game_over {
                ops.push_back(Op::GameOver(game_over.clone()));
            }
        },

        ReplayAction::GameOver(game_over) => ops.push_back(Op::GameOver(game_over.clone())),
    }

    ops
}

fn owner_of<S: GameState + ?Sized>(state: &S, unit_id: i64) -> Result<i64, PlaybackError> {
    state
        .unit_owner(unit_id)?
        .ok_or(PlaybackError::UndeterminedOwner(unit_id))
}

/// Resolves both sides of a fight and lays out the strike sequence.
fn plan_combat<S: GameState + ?Sized>(state: &S, attack: AttackUnitAction) -> Result<Vec<Op>, PlaybackError> {
    let attacker_owner = owner_of(state, attack.attacker.id)?;
    let defender_owner = owner_of(state, attack.defender.id)?;

    let order = strike_order(state.attacks_first(attacker_owner), state.attacks_first(defender_owner));

    let (striker, target) = match order {
        StrikeOrder::AttackerFirst => (attack.attacker, attack.defender),
        StrikeOrder::DefenderFirst => (attack.defender, attack.attacker),
    };

    tracing::debug!(
        target: Log::Playback,
        striker = striker.id,
        target = target.id,
        ?order,
        "Planned combat"
    );

    let mut ops = Vec::with_capacity(5);

    if let Some(movement) = attack.move_unit {
        ops.push(Op::Move(movement));
    }

    let (striker_id, target_id) = (striker.id, target.id);

    ops.push(Op::Strike {
        striker: striker_id,
        target: target_id,
    });
    ops.push(Op::ApplyFirstStrike {
        striker: striker.clone(),
        target,
    });
    ops.push(Op::CounterStrike {
        striker: striker_id,
        target: target_id,
    });
    ops.push(Op::ApplyCounterStrike { striker });

    Ok(ops)
}

fn is_dead<S: GameState + ?Sized>(state: &S, unit_id: i64) -> Result<bool, PlaybackError> {
    Ok(state.unit_hit_points(unit_id)? <= 0.0)
}

/// Runs a single op.
pub(crate) fn run<S: GameState + ?Sized>(op: Op, state: &mut S) -> Result<OpResult, PlaybackError> {
    let result = match op {
        Op::Move(movement) => {
            let to = movement.destination();
            state.move_unit(&movement.unit, to)?;

            OpResult::Wait(WaitPoint::UnitMoved {
                unit_id: movement.unit.id,
                to,
            })
        },

        Op::Combat(attack) => OpResult::Expand(plan_combat(state, attack)?),

        Op::Strike { striker, target } => OpResult::Wait(WaitPoint::Strike { striker, target }),

        Op::ApplyFirstStrike { striker, target } => {
            state.update_unit(&target)?;

            if is_dead(state, target.id)? {
                state.update_unit(&striker)?;
                state.remove_unit(target.id)?;

                return Ok(OpResult::Finish(WaitPoint::UnitDestroyed { unit_id: target.id }));
            }

            OpResult::Continue
        },

        Op::CounterStrike { striker, target } => {
            state.spend_ammo(striker)?;

            OpResult::Wait(WaitPoint::Strike {
                striker: target,
                target: striker,
            })
        },

        Op::ApplyCounterStrike { striker } => {
            state.update_unit(&striker)?;

            match is_dead(state, striker.id)? {
                true => {
                    state.remove_unit(striker.id)?;
                    OpResult::Wait(WaitPoint::UnitDestroyed { unit_id: striker.id })
                },

                false => OpResult::Continue,
            }
        },

        Op::SetBuilding(building) => {
            state.set_building(&building)?;

            OpResult::Wait(WaitPoint::BuildingUpdated {
                building_id: building.id,
                position: building.position(),
            })
        },

        Op::Build(unit) => {
            state.spawn_unit(&unit)?;
            OpResult::Wait(WaitPoint::UnitBuilt { unit_id: unit.id })
        },

        Op::Delete(unit_id) => {
            state.remove_unit(unit_id)?;
            OpResult::Wait(WaitPoint::UnitDeleted { unit_id })
        },

        Op::Power(power) => {
            state.activate_power(&power)?;

            OpResult::Wait(WaitPoint::PowerActivated {
                player_id: power.player_id,
                kind: power.kind,
            })
        },

        Op::EndTurn(end) => {
            state.end_turn(&end)?;

            OpResult::Wait(WaitPoint::TurnEnded {
                next_player_id: end.next_player_id,
            })
        },

        Op::Eliminate(player_id) => {
            state.eliminate_player(player_id)?;
            OpResult::Wait(WaitPoint::PlayerEliminated { player_id })
        },

        Op::GameOver(game_over) => {
            state.finish_game(&game_over)?;

            OpResult::Wait(WaitPoint::GameOver {
                winners: game_over.winners,
            })
        },
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use awbw_replay::actions::{AttackCopChanges, CopChange, PowerKind};

    use super::*;
    use crate::board::{Board, BoardPlayer, BoardUnit};

    fn unit(id: i64, hit_points: f32) -> ReplayUnit {
        ReplayUnit {
            id,
            player_id: None,
            name: None,
            x: None,
            y: None,
            hit_points: Some(hit_points),
            ammo: None,
            fuel: None,
        }
    }

    fn seat(id: i64) -> BoardPlayer {
        BoardPlayer {
            id,
            team: id.to_string(),
            funds: None,
            eliminated: false,
            active_power: None,
        }
    }

    fn placed(id: i64, owner: Option<i64>) -> BoardUnit {
        BoardUnit {
            id,
            owner,
            name: None,
            position: None,
            hit_points: 10.0,
            ammo: Some(5),
            fuel: None,
            can_move: true,
        }
    }

    fn two_player_board() -> Board {
        let mut board = Board::default().with_unit(placed(1, Some(10))).with_unit(placed(2, Some(20)));
        board.players.insert(10, seat(10));
        board.players.insert(20, seat(20));
        board
    }

    fn attack(attacker: ReplayUnit, defender: ReplayUnit) -> AttackUnitAction {
        let cop = |player_id| CopChange {
            player_id,
            cop_value: 0,
            tag_value: None,
        };

        AttackUnitAction {
            move_unit: None,
            attacker,
            defender,
            cop_changes: AttackCopChanges {
                attacker: cop(10),
                defender: cop(20),
            },
        }
    }

    fn first_strike(ops: &[Op]) -> (i64, i64) {
        ops.iter()
            .find_map(|op| match op {
                Op::Strike { striker, target } => Some((*striker, *target)),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn defender_strikes_first_only_with_an_exclusive_power() {
        assert_eq!(strike_order(false, false), StrikeOrder::AttackerFirst);
        assert_eq!(strike_order(true, false), StrikeOrder::AttackerFirst);
        assert_eq!(strike_order(true, true), StrikeOrder::AttackerFirst);
        assert_eq!(strike_order(false, true), StrikeOrder::DefenderFirst);
    }

    #[test]
    fn sonja_super_power_swaps_the_exchange() {
        let mut board = two_player_board();
        board
            .activate_power(&PowerAction {
                player_id: 20,
                co_name: "Sonja".into(),
                kind: PowerKind::SuperPower,
                power_name: "Counter Break".into(),
            })
            .unwrap();

        let ops = plan_combat(&board, attack(unit(1, 7.0), unit(2, 4.0))).unwrap();
        assert_eq!(first_strike(&ops), (2, 1));

        let ops = plan_combat(&two_player_board(), attack(unit(1, 7.0), unit(2, 4.0))).unwrap();
        assert_eq!(first_strike(&ops), (1, 2));
    }

    #[test]
    fn unowned_combatants_are_an_error() {
        let board = two_player_board().with_unit(placed(3, None));

        let result = plan_combat(&board, attack(unit(1, 7.0), unit(3, 4.0)));
        assert_eq!(result.err(), Some(PlaybackError::UndeterminedOwner(3)));

        let result = plan_combat(&board, attack(unit(9, 7.0), unit(2, 4.0)));
        assert_eq!(result.err(), Some(PlaybackError::UnitNotFound(9)));
    }

    #[test]
    fn killing_blow_skips_the_counter() {
        let mut board = two_player_board();
        let mut script: VecDeque<Op> = plan_combat(&board, attack(unit(1, 9.0), unit(2, 0.0)))
            .unwrap()
            .into();

        let mut waits = Vec::new();
        while let Some(op) = script.pop_front() {
            match run(op, &mut board).unwrap() {
                OpResult::Wait(wait) => waits.push(wait),
                OpResult::Finish(wait) => {
                    waits.push(wait);
                    script.clear();
                },
                OpResult::Continue | OpResult::Expand(_) => {},
            }
        }

        assert_eq!(
            waits,
            vec![
                WaitPoint::Strike { striker: 1, target: 2 },
                WaitPoint::UnitDestroyed { unit_id: 2 },
            ]
        );
        assert!(!board.units.contains_key(&2));
        assert_eq!(board.units[&1].hit_points, 9.0);
        assert_eq!(board.units[&1].ammo, Some(5));
    }
}

use serde_json::{Map, Value};

use super::{Fragment, GameOverAction, ReplayAction};
use crate::errors::DecodeError;
use crate::model::{ReplayContext, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "Eliminated";

/// A player dropping out of the match, possibly ending it.
#[derive(Debug, Clone, PartialEq)]
pub struct EliminatedAction {
    pub eliminated_player_id: i64,
    pub caused_by_player_id: i64,
    pub message: String,
    pub game_over: Option<GameOverAction>,
}

fn into_game_over(action: ReplayAction) -> Result<GameOverAction, ReplayAction> {
    match action {
        ReplayAction::GameOver(game_over) => Ok(game_over),
        other => Err(other),
    }
}

pub(super) fn decode(
    registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    replay: &ReplayContext,
    turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let fragment = Fragment::new(CODE, fragment, &["eliminatedByPId", "playerId", "message"], &["GameOver"])?;

    let game_over = fragment.nested("GameOver", super::game_over::CODE, registry, replay, turn, into_game_over)?;

    Ok(ReplayAction::Eliminated(EliminatedAction {
        eliminated_player_id: fragment.known_player(replay, fragment.value("playerId")?)?,
        caused_by_player_id: fragment.known_player(replay, fragment.value("eliminatedByPId")?)?,
        message: fragment.value("message")?,
        game_over,
    }))
}

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{Fragment, ReplayAction};
use crate::date_parser;
use crate::errors::DecodeError;
use crate::model::{ReplayContext, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "GameOver";

#[derive(Debug, Clone, PartialEq)]
pub struct GameOverAction {
    pub day: u32,
    pub end_date: DateTime<Utc>,
    pub message: Option<String>,
    pub winners: Vec<i64>,
    pub losers: Vec<i64>,
}

pub(super) fn decode(
    _registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    replay: &ReplayContext,
    _turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let fragment = Fragment::new(CODE, fragment, &["day", "gameEndDate", "winners", "losers"], &["message"])?;

    let end_date = date_parser::parse_value(fragment.require("gameEndDate")?)
        .ok_or_else(|| fragment.invalid("gameEndDate", "not a recognised date"))?;

    let winners: Vec<i64> = fragment.value("winners")?;
    let losers: Vec<i64> = fragment.value("losers")?;

    for player_id in winners.iter().chain(losers.iter()) {
        fragment.known_player(replay, *player_id)?;
    }

    Ok(ReplayAction::GameOver(GameOverAction {
        day: fragment.value("day")?,
        end_date,
        message: fragment.optional("message")?,
        winners,
        losers,
    }))
}

use serde_json::{Map, Value};

use super::{Fragment, ReplayAction};
use crate::errors::DecodeError;
use crate::model::{ReplayContext, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "End";

/// Hands the turn to the next player.
#[derive(Debug, Clone, PartialEq)]
pub struct EndTurnAction {
    pub next_player_id: i64,

    /// The next player's funds, if the viewer is allowed to know them.
    pub next_funds: Option<i64>,
    pub day: u32,
}

pub(super) fn decode(
    _registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    replay: &ReplayContext,
    turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let fragment = Fragment::new(CODE, fragment, &["updatedInfo"], &[])?;
    let info = fragment.child(
        "updatedInfo",
        &["event", "nextPId", "day"],
        &["nextFunds", "nextTimer", "nextWeather", "supplied", "repaired"],
    )?;

    let event: String = info.value("event")?;
    if event != "NextTurn" {
        return Err(info.invalid("event", format!("unexpected event `{event}`")));
    }

    let next_player_id = info.known_player(replay, info.value("nextPId")?)?;

    // Funds are hidden from other players in fog, which shows up as a missing
    // view or an explicit `null`.
    let next_funds = match info.get("nextFunds") {
        None | Some(Value::Null) => None,
        Some(_) => match info.player_view("nextFunds", turn) {
            Ok(value) => info.parse::<Option<i64>>("nextFunds", value)?,
            Err(DecodeError::MissingPlayerView { .. }) => None,
            Err(error) => return Err(error),
        },
    };

    Ok(ReplayAction::EndTurn(EndTurnAction {
        next_player_id,
        next_funds,
        day: info.value("day")?,
    }))
}

use serde_json::{Map, Value};

use super::{Fragment, ReplayAction};
use crate::errors::DecodeError;
use crate::model::{ReplayContext, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "Power";

/// Which tier of CO power was activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerKind {
    CoPower,
    SuperPower,
}

impl PowerKind {
    /// Reads the single letter the server uses: `Y` for a CO power, `S` for a super.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Y" => Some(Self::CoPower),
            "S" => Some(Self::SuperPower),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerAction {
    pub player_id: i64,
    pub co_name: String,
    pub kind: PowerKind,
    pub power_name: String,
}

pub(super) fn decode(
    _registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    replay: &ReplayContext,
    _turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let fragment = Fragment::new(
        CODE,
        fragment,
        &["playerID", "coName", "coPower", "powerName"],
        &["playersCOP", "weather"],
    )?;

    let player_id = fragment.known_player(replay, fragment.value("playerID")?)?;

    let code: String = fragment.value("coPower")?;
    let kind = PowerKind::from_code(&code)
        .ok_or_else(|| fragment.invalid("coPower", format!("unknown power tier `{code}`")))?;

    Ok(ReplayAction::Power(PowerAction {
        player_id,
        co_name: fragment.value("coName")?,
        kind,
        power_name: fragment.value("powerName")?,
    }))
}

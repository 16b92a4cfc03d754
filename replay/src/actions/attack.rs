use serde_json::{Map, Value};

use super::{move_unit, Fragment, MoveUnitAction, ReplayAction};
use crate::errors::DecodeError;
use crate::model::{ReplayContext, ReplayUnit, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "Fire";

/// One unit attacking another, optionally after moving.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackUnitAction {
    pub move_unit: Option<MoveUnitAction>,

    /// Attacker stats after the exchange.
    pub attacker: ReplayUnit,

    /// Defender stats after the exchange.
    pub defender: ReplayUnit,

    pub cop_changes: AttackCopChanges,
}

/// Power meter values for both sides after combat.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackCopChanges {
    pub attacker: CopChange,
    pub defender: CopChange,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct CopChange {
    #[serde(rename = "playerId")]
    pub player_id: i64,

    #[serde(rename = "copValue")]
    pub cop_value: i64,

    #[serde(rename = "tagValue", default)]
    pub tag_value: Option<i64>,
}

pub(super) fn decode(
    registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    replay: &ReplayContext,
    turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let fragment = Fragment::new(CODE, fragment, &["Fire"], &["Move"])?;

    let move_unit = fragment.nested("Move", move_unit::CODE, registry, replay, turn, move_unit::into_move)?;

    let fire = fragment.child("Fire", &["combatInfoVision", "copValues"], &["action"])?;

    // Only the view that belongs to whoever is acting this turn matters; if they
    // couldn't see the fight there is nothing trustworthy to replay.
    let vision = fire.wrap(
        "combatInfoVision",
        fire.player_view("combatInfoVision", turn)?,
        &["hasVision"],
        &["combatInfo"],
    )?;

    let has_vision: bool = vision.value("hasVision")?;
    if !has_vision {
        return Err(DecodeError::MissingVision {
            code: CODE.into(),
            player_id: turn.active_player_id,
        });
    }

    let combat = vision.child("combatInfo", &["attacker", "defender"], &[])?;

    // The server sends "?" for an attacker the viewer lost track of mid-fight,
    // which only happens when the attacker died; fall back to the moved unit.
    let attacker = match combat.require("attacker")? {
        Value::String(_) => {
            tracing::debug!(target: awbw_integrations::Log::Replay, "Attack has no attacker details, using moved unit");

            let mut unit = move_unit
                .as_ref()
                .map(|movement| movement.unit.clone())
                .ok_or_else(|| combat.invalid("attacker", "attacker is hidden and no move was recorded"))?;
            unit.hit_points = Some(0.0);
            unit
        },

        value => combat.parse("attacker", value)?,
    };

    let defender = combat.value("defender")?;

    let cop_values = fire.child("copValues", &["attacker", "defender"], &[])?;
    let cop_changes = AttackCopChanges {
        attacker: cop_values.value("attacker")?,
        defender: cop_values.value("defender")?,
    };

    Ok(ReplayAction::Fire(AttackUnitAction {
        move_unit,
        attacker,
        defender,
        cop_changes,
    }))
}

use serde_json::{Map, Value};

use super::{move_unit, Fragment, MoveUnitAction, ReplayAction};
use crate::errors::DecodeError;
use crate::model::{ReplayBuilding, ReplayContext, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "Capt";

/// A unit (optionally after moving) working on capturing a building.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureAction {
    pub move_unit: Option<MoveUnitAction>,
    pub building: ReplayBuilding,
}

pub(super) fn decode(
    registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    replay: &ReplayContext,
    turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    // `income` is only populated once the building flips, and is re-derived from
    // the board anyway.
    let fragment = Fragment::new(CODE, fragment, &["buildingInfo"], &["Move", "income"])?;

    let move_unit = fragment.nested("Move", move_unit::CODE, registry, replay, turn, move_unit::into_move)?;

    Ok(ReplayAction::Capture(CaptureAction {
        move_unit,
        building: fragment.value("buildingInfo")?,
    }))
}

use serde_json::{Map, Value};

use super::{Fragment, ReplayAction};
use crate::errors::DecodeError;
use crate::model::{ReplayContext, ReplayUnit, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "Build";

#[derive(Debug, Clone, PartialEq)]
pub struct BuildUnitAction {
    pub unit: ReplayUnit,
}

pub(super) fn decode(
    _registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    _replay: &ReplayContext,
    turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let fragment = Fragment::new(CODE, fragment, &["newUnit"], &["discovered"])?;
    let unit = fragment.parse("newUnit", fragment.player_view("newUnit", turn)?)?;

    Ok(ReplayAction::Build(BuildUnitAction { unit }))
}

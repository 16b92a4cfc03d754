use serde_json::{Map, Value};

use super::{Fragment, ReplayAction};
use crate::errors::DecodeError;
use crate::model::{ReplayContext, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "Delete";

/// A player scrapping one of their own units.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteUnitAction {
    pub unit_id: i64,
}

pub(super) fn decode(
    _registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    _replay: &ReplayContext,
    turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let fragment = Fragment::new(CODE, fragment, &["Delete"], &[])?;
    let delete = fragment.child("Delete", &["unitId"], &["action"])?;
    let unit_id = delete.parse("unitId", delete.player_view("unitId", turn)?)?;

    Ok(ReplayAction::Delete(DeleteUnitAction { unit_id }))
}

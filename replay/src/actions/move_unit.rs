use serde_json::{Map, Value};

use super::{Fragment, ReplayAction};
use crate::errors::DecodeError;
use crate::model::{Position, ReplayContext, ReplayUnit, TurnContext};
use crate::registry::ActionRegistry;

pub const CODE: &str = "Move";

/// A unit walking a path. Also embedded in attacks and captures that happen
/// after moving.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveUnitAction {
    /// The unit's stats once it has arrived.
    pub unit: ReplayUnit,
    pub path: Vec<PathNode>,
    pub distance: u32,

    /// Whether the move was cut short by a hidden enemy.
    pub trapped: bool,
}

impl MoveUnitAction {
    /// Where the unit ends up: the last path node, or the unit's reported position.
    pub fn destination(&self) -> Option<Position> {
        self.path
            .last()
            .map(|node| Position::new(node.x, node.y))
            .or_else(|| self.unit.position())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct PathNode {
    pub x: i32,
    pub y: i32,

    #[serde(default = "visible_by_default")]
    pub unit_visible: bool,
}

fn visible_by_default() -> bool {
    true
}

/// Accepts only `ReplayAction::Move`, for use with `Fragment::nested`.
pub(crate) fn into_move(action: ReplayAction) -> Result<MoveUnitAction, ReplayAction> {
    match action {
        ReplayAction::Move(movement) => Ok(movement),
        other => Err(other),
    }
}

pub(super) fn decode(
    _registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    _replay: &ReplayContext,
    turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let fragment = Fragment::new(CODE, fragment, &["unit", "paths", "dist"], &["trapped", "discovered"])?;

    let unit = fragment.parse("unit", fragment.player_view("unit", turn)?)?;
    let path = fragment.parse("paths", fragment.player_view("paths", turn)?)?;

    Ok(ReplayAction::Move(MoveUnitAction {
        unit,
        path,
        distance: fragment.value("dist")?,
        trapped: fragment.optional("trapped")?.unwrap_or(false),
    }))
}

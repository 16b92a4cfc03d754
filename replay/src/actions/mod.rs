//! Typed actions and the decoders that produce them.
//!
//! Each submodule owns one action code: its record type, its `CODE`, and a
//! `decode` function matching `registry::DecodeFn`. Decoders are strict about
//! the keys they accept so that new server fields surface as errors instead of
//! being silently dropped.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::DecodeError;
use crate::model::{ReplayContext, TurnContext};
use crate::registry::{ActionRegistry, DecodeFn};

mod attack;
mod build;
mod capture;
mod delete;
mod eliminated;
mod end_turn;
mod game_over;
mod move_unit;
mod power;

pub use attack::{AttackCopChanges, AttackUnitAction, CopChange};
pub use build::BuildUnitAction;
pub use capture::CaptureAction;
pub use delete::DeleteUnitAction;
pub use eliminated::EliminatedAction;
pub use end_turn::EndTurnAction;
pub use game_over::GameOverAction;
pub use move_unit::{MoveUnitAction, PathNode};
pub use power::{PowerAction, PowerKind};

/// Key that every fragment stores its action code under.
pub const ACTION_KEY: &str = "action";

/// Decoders that `ActionRegistry::with_default_actions` installs.
pub(crate) const BUILTIN_DECODERS: &[(&str, DecodeFn)] = &[
    (attack::CODE, attack::decode),
    (build::CODE, build::decode),
    (capture::CODE, capture::decode),
    (delete::CODE, delete::decode),
    (eliminated::CODE, eliminated::decode),
    (end_turn::CODE, end_turn::decode),
    (game_over::CODE, game_over::decode),
    (move_unit::CODE, move_unit::decode),
    (power::CODE, power::decode),
];

/// One atomic game event. The set is closed: every code the registry knows about
/// decodes into exactly one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayAction {
    Move(MoveUnitAction),
    Fire(AttackUnitAction),
    Capture(CaptureAction),
    Build(BuildUnitAction),
    Delete(DeleteUnitAction),
    Power(PowerAction),
    EndTurn(EndTurnAction),
    Eliminated(EliminatedAction),
    GameOver(GameOverAction),
}

impl ReplayAction {
    /// The action code this variant was decoded from.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Move(_) => move_unit::CODE,
            Self::Fire(_) => attack::CODE,
            Self::Capture(_) => capture::CODE,
            Self::Build(_) => build::CODE,
            Self::Delete(_) => delete::CODE,
            Self::Power(_) => power::CODE,
            Self::EndTurn(_) => end_turn::CODE,
            Self::Eliminated(_) => eliminated::CODE,
            Self::GameOver(_) => game_over::CODE,
        }
    }
}

/// Describes a JSON value's type for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A view over one JSON object that enforces the key allow-list for an action
/// and produces errors with the action code and field path filled in.
pub(crate) struct Fragment<'a> {
    code: &'static str,
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fragment<'a> {
    /// Wraps a top-level fragment. The `"action"` key is always allowed.
    pub fn new(
        code: &'static str,
        map: &'a Map<String, Value>,
        required: &[&str],
        optional: &[&str],
    ) -> Result<Self, DecodeError> {
        Self::checked(code, String::new(), map, required, optional)
    }

    fn checked(
        code: &'static str,
        path: String,
        map: &'a Map<String, Value>,
        required: &[&str],
        optional: &[&str],
    ) -> Result<Self, DecodeError> {
        let fragment = Self { code, path, map };

        for key in map.keys() {
            let key = key.as_str();
            if key != ACTION_KEY && !required.contains(&key) && !optional.contains(&key) {
                return Err(DecodeError::UnknownField {
                    code: code.into(),
                    field: fragment.field(key),
                });
            }
        }

        for key in required {
            if !map.contains_key(*key) {
                return Err(fragment.missing(key));
            }
        }

        Ok(fragment)
    }

    fn field(&self, key: &str) -> String {
        match self.path.is_empty() {
            true => key.to_string(),
            false => format!("{}.{}", self.path, key),
        }
    }

    pub fn missing(&self, key: &str) -> DecodeError {
        DecodeError::MissingField {
            code: self.code.into(),
            field: self.field(key),
        }
    }

    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> DecodeError {
        DecodeError::InvalidField {
            code: self.code.into(),
            field: self.field(key),
            reason: reason.into(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub fn require(&self, key: &str) -> Result<&'a Value, DecodeError> {
        self.map.get(key).ok_or_else(|| self.missing(key))
    }

    /// Applies the same allow-list treatment to an object nested under `key`.
    pub fn child(&self, key: &str, required: &[&str], optional: &[&str]) -> Result<Fragment<'a>, DecodeError> {
        let value = self.require(key)?;
        self.wrap(key, value, required, optional)
    }

    /// Treats an arbitrary value found under `key` as a nested object.
    pub fn wrap(
        &self,
        key: &str,
        value: &'a Value,
        required: &[&str],
        optional: &[&str],
    ) -> Result<Fragment<'a>, DecodeError> {
        let map = value
            .as_object()
            .ok_or_else(|| self.invalid(key, format!("expected an object, found {}", json_kind(value))))?;

        Self::checked(self.code, self.field(key), map, required, optional)
    }

    /// Deserializes an arbitrary value into `T`, reporting failures against `key`.
    pub fn parse<T: DeserializeOwned>(&self, key: &str, value: &Value) -> Result<T, DecodeError> {
        T::deserialize(value).map_err(|error| self.invalid(key, error.to_string()))
    }

    /// Deserializes the (required) field `key` into `T`.
    pub fn value<T: DeserializeOwned>(&self, key: &str) -> Result<T, DecodeError> {
        let value = self.require(key)?;
        self.parse(key, value)
    }

    /// Deserializes the field `key` into `T`, treating absence and `null` as `None`.
    pub fn optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DecodeError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.parse(key, value).map(Some),
        }
    }

    /// Selects the entry of a per-viewer payload that the active player may see.
    ///
    /// Such payloads are objects keyed by player id, by team name, or by `"global"`
    /// when everyone sees the same thing; they are looked up in that order.
    pub fn player_view(&self, key: &str, turn: &TurnContext) -> Result<&'a Value, DecodeError> {
        let value = self.require(key)?;
        let views = value
            .as_object()
            .ok_or_else(|| self.invalid(key, format!("expected a per-player object, found {}", json_kind(value))))?;

        views
            .get(&turn.active_player_id.to_string())
            .or_else(|| views.get(&turn.active_team))
            .or_else(|| views.get("global"))
            .ok_or_else(|| DecodeError::MissingPlayerView {
                code: self.code.into(),
                field: self.field(key),
                player_id: turn.active_player_id,
                team: turn.active_team.clone(),
            })
    }

    /// Fails with `UnknownPlayer` unless the replay lists `player_id`.
    pub fn known_player(&self, replay: &ReplayContext, player_id: i64) -> Result<i64, DecodeError> {
        match replay.has_player(player_id) {
            true => Ok(player_id),
            false => Err(DecodeError::UnknownPlayer(player_id)),
        }
    }

    /// Decodes an action nested under `key` through the registry, demanding that it
    /// come back as the variant `extract` accepts.
    ///
    /// The server writes an empty array when there is nothing nested, so that (and
    /// absence, and `null`) yields `None`. A nested fragment without its own
    /// `"action"` key is decoded as `expected`.
    pub fn nested<T>(
        &self,
        key: &str,
        expected: &'static str,
        registry: &ActionRegistry,
        replay: &ReplayContext,
        turn: &TurnContext,
        extract: fn(ReplayAction) -> Result<T, ReplayAction>,
    ) -> Result<Option<T>, DecodeError> {
        let value = match self.map.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(items)) if items.is_empty() => return Ok(None),
            Some(value) => value,
        };

        let code = value.get(ACTION_KEY).and_then(Value::as_str).unwrap_or(expected);
        let action = registry.decode(code, value, replay, turn)?;

        extract(action).map(Some).map_err(|other| DecodeError::TypeMismatch {
            code: self.code.into(),
            expected,
            found: other.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let map = object(json!({"action": "Test", "a": 1, "surprise": true}));
        let error = Fragment::new("Test", &map, &["a"], &[]).err().unwrap();

        assert_eq!(
            error,
            DecodeError::UnknownField {
                code: "Test".into(),
                field: "surprise".into()
            }
        );
    }

    #[test]
    fn allow_listed_keys_are_optional() {
        let map = object(json!({"a": 1}));
        assert!(Fragment::new("Test", &map, &["a"], &["b"]).is_ok());

        let map = object(json!({"b": 1}));
        assert!(matches!(
            Fragment::new("Test", &map, &["a"], &["b"]),
            Err(DecodeError::MissingField { .. })
        ));
    }

    #[test]
    fn nested_field_paths_are_reported() {
        let map = object(json!({"outer": {"inner": 1, "extra": 2}}));
        let fragment = Fragment::new("Test", &map, &["outer"], &[]).unwrap();
        let error = fragment.child("outer", &["inner"], &[]).err().unwrap();

        assert_eq!(
            error,
            DecodeError::UnknownField {
                code: "Test".into(),
                field: "outer.extra".into()
            }
        );
    }

    #[test]
    fn player_views_prefer_the_most_specific_entry() {
        let map = object(json!({
            "view": {"global": 1, "team-a": 2, "1001": 3}
        }));
        let fragment = Fragment::new("Test", &map, &["view"], &[]).unwrap();

        let by_player = TurnContext {
            active_player_id: 1001,
            active_team: "team-a".into(),
            day: 1,
        };
        let by_team = TurnContext {
            active_player_id: 1002,
            ..by_player.clone()
        };
        let global = TurnContext {
            active_player_id: 1003,
            active_team: "team-b".into(),
            day: 1,
        };

        assert_eq!(fragment.player_view("view", &by_player).unwrap(), &json!(3));
        assert_eq!(fragment.player_view("view", &by_team).unwrap(), &json!(2));
        assert_eq!(fragment.player_view("view", &global).unwrap(), &json!(1));
    }

    #[test]
    fn missing_player_view_is_an_error() {
        let map = object(json!({"view": {"1001": 3}}));
        let fragment = Fragment::new("Test", &map, &["view"], &[]).unwrap();
        let turn = TurnContext {
            active_player_id: 1002,
            active_team: "1002".into(),
            day: 3,
        };

        assert!(matches!(
            fragment.player_view("view", &turn),
            Err(DecodeError::MissingPlayerView { player_id: 1002, .. })
        ));
    }
}

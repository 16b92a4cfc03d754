use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::actions::{self, ReplayAction};
use crate::errors::{DecodeError, RegistryError};
use crate::model::{ReplayContext, TurnContext};

/// The signature every action decoder conforms to.
///
/// Decoders are plain function pointers: they cannot capture state, so the same
/// fragment always decodes to the same action. The registry is handed back in so
/// that decoders can dispatch any actions nested inside their fragment.
pub type DecodeFn =
    fn(&ActionRegistry, &Map<String, Value>, &ReplayContext, &TurnContext) -> Result<ReplayAction, DecodeError>;

/// Maps action codes (`"Fire"`, `"Move"`, ...) to their decoders.
///
/// The set is fixed once built; there is no way to replace a decoder after it has
/// been registered.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl ActionRegistry {
    /// A registry with nothing in it. Mostly useful for tests; see `with_default_actions`.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// A registry with every action this crate knows how to decode.
    pub fn with_default_actions() -> Self {
        let mut registry = Self::empty();

        for (code, decoder) in actions::BUILTIN_DECODERS {
            registry.decoders.insert((*code).to_string(), *decoder);
        }

        registry
    }

    /// Registers a decoder for `code`. Fails if `code` already has one.
    pub fn register(&mut self, code: &str, decoder: DecodeFn) -> Result<(), RegistryError> {
        if self.decoders.contains_key(code) {
            return Err(RegistryError::DuplicateCode(code.to_string()));
        }

        self.decoders.insert(code.to_string(), decoder);
        Ok(())
    }

    pub fn is_registered(&self, code: &str) -> bool {
        self.decoders.contains_key(code)
    }

    /// Registered codes, sorted for stable output.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Decodes `fragment` with the decoder registered for `code`.
    pub fn decode(
        &self,
        code: &str,
        fragment: &Value,
        replay: &ReplayContext,
        turn: &TurnContext,
    ) -> Result<ReplayAction, DecodeError> {
        let decoder = self
            .decoders
            .get(code)
            .ok_or_else(|| DecodeError::UnknownAction(code.to_string()))?;

        let object = fragment.as_object().ok_or_else(|| DecodeError::InvalidField {
            code: code.to_string(),
            field: "<fragment>".into(),
            reason: format!("expected an object, found {}", actions::json_kind(fragment)),
        })?;

        decoder(self, object, replay, turn)
    }

    /// Decodes a fragment that carries its own code under the `"action"` key.
    pub fn decode_fragment(
        &self,
        fragment: &Value,
        replay: &ReplayContext,
        turn: &TurnContext,
    ) -> Result<ReplayAction, DecodeError> {
        let code = fragment
            .get(actions::ACTION_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::MissingField {
                code: "<unknown>".into(),
                field: actions::ACTION_KEY.into(),
            })?;

        self.decode(code, fragment, replay, turn)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_default_actions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{DeleteUnitAction, ReplayAction};
    use serde_json::json;

    fn always_delete(
        _: &ActionRegistry,
        _: &Map<String, Value>,
        _: &ReplayContext,
        _: &TurnContext,
    ) -> Result<ReplayAction, DecodeError> {
        Ok(ReplayAction::Delete(DeleteUnitAction { unit_id: 1 }))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ActionRegistry::with_default_actions();

        assert_eq!(
            registry.register("Fire", always_delete),
            Err(RegistryError::DuplicateCode("Fire".into()))
        );

        assert!(registry.register("Hide", always_delete).is_ok());
        assert!(registry.register("Hide", always_delete).is_err());
    }

    #[test]
    fn unknown_codes_fail() {
        let registry = ActionRegistry::with_default_actions();
        let error = registry
            .decode_fragment(&json!({"action": "Launch"}), &ReplayContext::default(), &TurnContext::default())
            .unwrap_err();

        assert_eq!(error, DecodeError::UnknownAction("Launch".into()));
    }

    #[test]
    fn fragments_must_be_objects() {
        let registry = ActionRegistry::with_default_actions();
        let error = registry
            .decode("Move", &json!([1, 2]), &ReplayContext::default(), &TurnContext::default())
            .unwrap_err();

        assert!(matches!(error, DecodeError::InvalidField { .. }));
    }

    #[test]
    fn every_builtin_is_registered() {
        let registry = ActionRegistry::default();

        assert_eq!(
            registry.codes(),
            vec!["Build", "Capt", "Delete", "Eliminated", "End", "Fire", "GameOver", "Move", "Power"]
        );
    }
}

//! Which CO powers change combat order.

use awbw_replay::actions::PowerKind;

/// Powers that let a defender strike before its attacker.
const ATTACK_FIRST_POWERS: &[(&str, PowerKind)] = &[("Sonja", PowerKind::SuperPower)];

pub fn grants_attack_first(co_name: &str, kind: PowerKind) -> bool {
    ATTACK_FIRST_POWERS
        .iter()
        .any(|(name, power)| *power == kind && name.eq_ignore_ascii_case(co_name))
}

//! The typed record of a single match, plus the summary that gets persisted in
//! the catalog index.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actions::ReplayAction;
use crate::date_parser;

/// A tile coordinate on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A player record as it appears in a replay, and as it gets persisted.
///
/// `username` is `None` until it has been resolved from the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayUser {
    /// In-game player id; unique within one replay.
    pub id: i64,

    /// Site-wide user id; the key the username cache uses.
    pub user_id: i64,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub team: String,
}

/// Summary metadata for a replay. This is what the catalog index stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayInfo {
    pub id: i64,
    pub name: String,

    #[serde(with = "date_parser")]
    pub start_date: DateTime<Utc>,

    #[serde(with = "date_parser::optional", default)]
    pub end_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub league_match: bool,

    /// Keyed by in-game player id.
    pub players: BTreeMap<i64, ReplayUser>,

    /// Player ids that won, if the replay contains the end of the game.
    #[serde(default)]
    pub winners: Vec<i64>,

    #[serde(default)]
    pub turn_count: usize,
}

impl ReplayInfo {
    /// Whether any player in this replay is still missing a display name.
    pub fn has_unresolved_usernames(&self) -> bool {
        self.players.values().any(|player| player.username.is_none())
    }
}

/// One unit's stats as reported by an action.
///
/// The server only sends what changed (or what the viewer may see), so nearly
/// everything is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayUnit {
    #[serde(rename = "units_id")]
    pub id: i64,

    #[serde(rename = "units_players_id", default)]
    pub player_id: Option<i64>,

    #[serde(rename = "units_name", default)]
    pub name: Option<String>,

    #[serde(rename = "units_x", default)]
    pub x: Option<i32>,

    #[serde(rename = "units_y", default)]
    pub y: Option<i32>,

    #[serde(rename = "units_hit_points", default)]
    pub hit_points: Option<f32>,

    #[serde(rename = "units_ammo", default)]
    pub ammo: Option<i32>,

    #[serde(rename = "units_fuel", default)]
    pub fuel: Option<i32>,
}

impl ReplayUnit {
    pub fn position(&self) -> Option<Position> {
        Some(Position::new(self.x?, self.y?))
    }
}

/// A building's state after a capture step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayBuilding {
    #[serde(rename = "buildings_id")]
    pub id: i64,

    #[serde(rename = "buildings_x")]
    pub x: i32,

    #[serde(rename = "buildings_y")]
    pub y: i32,

    /// Remaining capture points; 20 means untouched.
    #[serde(rename = "buildings_capture")]
    pub capture: i32,

    #[serde(rename = "buildings_players_id", default)]
    pub player_id: Option<i64>,

    #[serde(rename = "buildings_team", default)]
    pub team: Option<String>,
}

impl ReplayBuilding {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Replay-wide information a decoder may consult.
#[derive(Debug, Clone, Default)]
pub struct ReplayContext {
    pub replay_id: i64,
    pub players: BTreeMap<i64, ReplayUser>,
}

impl ReplayContext {
    pub fn has_player(&self, player_id: i64) -> bool {
        self.players.contains_key(&player_id)
    }
}

/// Who is acting (and therefore viewing) during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnContext {
    pub active_player_id: i64,
    pub active_team: String,
    pub day: u32,
}

/// One turn: the acting player and their actions, in log order.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnData {
    pub active_player_id: i64,
    pub active_team: String,
    pub day: u32,
    pub actions: Vec<ReplayAction>,
}

impl TurnData {
    pub fn context(&self) -> TurnContext {
        TurnContext {
            active_player_id: self.active_player_id,
            active_team: self.active_team.clone(),
            day: self.day,
        }
    }
}

/// A fully decoded replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayData {
    pub info: ReplayInfo,
    pub turns: Vec<TurnData>,
}

impl ReplayData {
    /// Total number of top-level actions across all turns.
    pub fn action_count(&self) -> usize {
        self.turns.iter().map(|turn| turn.actions.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary() -> ReplayInfo {
        let mut players = BTreeMap::new();
        players.insert(
            1001,
            ReplayUser {
                id: 1001,
                user_id: 77,
                username: Some("Hellraider".into()),
                team: "1001".into(),
            },
        );
        players.insert(
            1002,
            ReplayUser {
                id: 1002,
                user_id: 78,
                username: None,
                team: "1002".into(),
            },
        );

        ReplayInfo {
            id: 42,
            name: "Test Match".into(),
            start_date: date_parser::parse_str("2022-01-01 12:30:00").unwrap(),
            end_date: date_parser::parse_str("2022-01-03T08:00:00.250Z"),
            league_match: true,
            players,
            winners: vec![1001],
            turn_count: 12,
        }
    }

    #[test]
    fn index_roundtrip_is_lossless() {
        let info = summary();

        let mut index = BTreeMap::new();
        index.insert(info.id, info.clone());

        let serialized = serde_json::to_string_pretty(&index).unwrap();
        let parsed: BTreeMap<i64, ReplayInfo> = serde_json::from_str(&serialized).unwrap();

        assert_eq!(parsed.get(&42), Some(&info));
    }

    #[test]
    fn older_index_entries_still_load() {
        let parsed: ReplayInfo = serde_json::from_value(json!({
            "id": 5,
            "name": "Old",
            "startDate": "2021-06-01 00:00:00",
            "players": {}
        }))
        .unwrap();

        assert!(parsed.end_date.is_none());
        assert!(parsed.winners.is_empty());
        assert!(!parsed.has_unresolved_usernames());
    }

    #[test]
    fn unresolved_usernames_are_detected() {
        assert!(summary().has_unresolved_usernames());
    }
}

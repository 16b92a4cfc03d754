//! End to end decoding of packaged replays.

use std::io::{Cursor, Write};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Map, Value};

use awbw_replay::actions::DeleteUnitAction;
use awbw_replay::{
    ActionRegistry, ContainerKind, DecodeError, ReplayAction, ReplayContext, ReplayParser, TurnContext,
};

fn infantry(id: i64, owner: i64, x: i32, y: i32, hit_points: f32) -> Value {
    json!({
        "units_id": id,
        "units_players_id": owner,
        "units_name": "Infantry",
        "units_x": x,
        "units_y": y,
        "units_hit_points": hit_points
    })
}

fn end_turn(next_player: i64, day: u32) -> Value {
    json!({
        "action": "End",
        "updatedInfo": {
            "event": "NextTurn",
            "nextPId": next_player,
            "day": day,
            "nextFunds": {"global": 9000}
        }
    })
}

fn moved_attack() -> Value {
    json!({
        "action": "Fire",
        "Move": {
            "action": "Move",
            "unit": {"global": infantry(1, 1001, 2, 1, 10.0)},
            "paths": {"global": [{"x": 1, "y": 1}, {"x": 2, "y": 1}]},
            "dist": 1,
            "trapped": false
        },
        "Fire": {
            "action": "Fire",
            "combatInfoVision": {
                "global": {
                    "hasVision": true,
                    "combatInfo": {
                        "attacker": infantry(1, 1001, 2, 1, 8.5),
                        "defender": infantry(2, 1002, 3, 1, 4.0)
                    }
                }
            },
            "copValues": {
                "attacker": {"playerId": 1001, "copValue": 500},
                "defender": {"playerId": 1002, "copValue": 800}
            }
        }
    })
}

fn document() -> Value {
    json!({
        "version": 1,
        "id": 42,
        "name": "Bean Island Rematch",
        "startDate": "2023-04-01 18:00:00",
        "endDate": "2023-04-09T21:15:00Z",
        "leagueMatch": false,
        "players": [
            {"id": 1001, "userId": 77, "team": ""},
            {"id": 1002, "userId": 78, "team": ""}
        ],
        "turns": [
            {
                "playerId": 1001,
                "day": 1,
                "actions": [
                    {"action": "Build", "newUnit": {"global": infantry(1, 1001, 1, 1, 10.0)}},
                    moved_attack(),
                    end_turn(1002, 1)
                ]
            },
            {
                "playerId": 1002,
                "day": 1,
                "actions": [
                    {
                        "action": "Capt",
                        "Move": [],
                        "buildingInfo": {
                            "buildings_id": 300,
                            "buildings_x": 3,
                            "buildings_y": 1,
                            "buildings_capture": 16,
                            "buildings_players_id": 1001
                        }
                    },
                    {
                        "action": "Power",
                        "playerID": 1002,
                        "coName": "Sonja",
                        "coPower": "S",
                        "powerName": "Counter Break"
                    },
                    {"action": "Delete", "Delete": {"action": "Delete", "unitId": {"global": 2}}},
                    end_turn(1001, 2)
                ]
            },
            {
                "playerId": 1001,
                "day": 2,
                "actions": [
                    {
                        "action": "Eliminated",
                        "eliminatedByPId": 1001,
                        "playerId": 1002,
                        "message": "1002 has no units left",
                        "GameOver": {
                            "day": 2,
                            "gameEndDate": "2023-04-09 21:15:00",
                            "winners": [1001],
                            "losers": [1002]
                        }
                    }
                ]
            }
        ]
    })
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for (name, contents) in entries {
        writer.start_file(*name, zip::write::FileOptions::default()).unwrap();
        writer.write_all(contents).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

fn document_bytes(document: &Value) -> Vec<u8> {
    serde_json::to_vec(document).unwrap()
}

#[test]
fn zipped_replay_decodes_every_turn() {
    let packaged = zip_with(&[("42.json", &gzip(&document_bytes(&document())))]);

    let (replay, container) = ReplayParser::default().parse_bytes(&packaged, ContainerKind::Zip).unwrap();
    assert_eq!(container, ContainerKind::Zip);

    assert_eq!(replay.info.id, 42);
    assert_eq!(replay.info.turn_count, 3);
    assert_eq!(replay.info.winners, vec![1001]);
    assert!(replay.info.has_unresolved_usernames());
    assert_eq!(replay.info.players[&1002].team, "1002");
    assert_eq!(replay.action_count(), 8);

    let codes: Vec<&str> = replay
        .turns
        .iter()
        .flat_map(|turn| turn.actions.iter().map(ReplayAction::code))
        .collect();
    assert_eq!(codes, ["Build", "Fire", "End", "Capt", "Power", "Delete", "End", "Eliminated"]);

    match &replay.turns[0].actions[1] {
        ReplayAction::Fire(attack) => {
            assert_eq!(attack.move_unit.as_ref().map(|movement| movement.distance), Some(1));
            assert_eq!(attack.defender.hit_points, Some(4.0));
        },
        other => panic!("expected an attack, got {other:?}"),
    }

    match &replay.turns[1].actions[0] {
        ReplayAction::Capture(capture) => assert!(capture.move_unit.is_none()),
        other => panic!("expected a capture, got {other:?}"),
    }
}

#[test]
fn bare_gzip_and_zip_decode_identically() {
    let json = document_bytes(&document());
    let parser = ReplayParser::default();

    let (from_zip, _) = parser.parse_bytes(&zip_with(&[("42.json", &gzip(&json))]), ContainerKind::Zip).unwrap();
    let (from_gzip, container) = parser.parse_bytes(&gzip(&json), ContainerKind::Compressed).unwrap();

    assert_eq!(container, ContainerKind::Compressed);
    assert_eq!(from_zip, from_gzip);
}

#[test]
fn decoding_twice_gives_the_same_replay() {
    let packaged = gzip(&document_bytes(&document()));
    let parser = ReplayParser::default();

    assert_eq!(
        parser.parse_bytes(&packaged, ContainerKind::Compressed),
        parser.parse_bytes(&packaged, ContainerKind::Compressed)
    );
}

#[test]
fn misnamed_container_falls_back() {
    let packaged = gzip(&document_bytes(&document()));

    let (replay, container) = ReplayParser::default().parse_bytes(&packaged, ContainerKind::Zip).unwrap();

    assert_eq!(container, ContainerKind::Compressed);
    assert_eq!(replay.info.id, 42);
}

#[test]
fn zip_without_json_entry_uses_first_file() {
    let json = document_bytes(&document());
    let packaged = zip_with(&[("42", &json), ("notes.txt", b"gg")]);

    let (replay, _) = ReplayParser::default().parse_bytes(&packaged, ContainerKind::Zip).unwrap();
    assert_eq!(replay.info.name, "Bean Island Rematch");
}

#[test]
fn malformed_nested_move_fails_whole_match() {
    let mut broken = document();
    broken["turns"][0]["actions"][1]["Move"]
        .as_object_mut()
        .unwrap()
        .remove("dist");

    let error = ReplayParser::default()
        .parse_bytes(&gzip(&document_bytes(&broken)), ContainerKind::Compressed)
        .unwrap_err();

    assert!(matches!(error, DecodeError::InTurn { turn: 0, action: 1, .. }));
    assert_eq!(
        error.root(),
        &DecodeError::MissingField {
            code: "Move".into(),
            field: "dist".into()
        }
    );
}

#[test]
fn unknown_action_code_fails_whole_match() {
    let mut broken = document();
    broken["turns"][1]["actions"][2] = json!({"action": "Teleport", "unit": 2});

    let error = ReplayParser::default()
        .parse_document(&document_bytes(&broken))
        .unwrap_err();

    assert_eq!(error.root(), &DecodeError::UnknownAction("Teleport".into()));
}

#[test]
fn turns_by_unlisted_players_fail() {
    let mut broken = document();
    broken["turns"][2]["playerId"] = json!(5555);

    let error = ReplayParser::default()
        .parse_document(&document_bytes(&broken))
        .unwrap_err();

    assert_eq!(error, DecodeError::UnknownPlayer(5555));
}

fn decode_scrap(
    _registry: &ActionRegistry,
    fragment: &Map<String, Value>,
    _replay: &ReplayContext,
    _turn: &TurnContext,
) -> Result<ReplayAction, DecodeError> {
    let unit_id = fragment.get("unit").and_then(Value::as_i64).ok_or(DecodeError::MissingField {
        code: "Scrap".into(),
        field: "unit".into(),
    })?;

    Ok(ReplayAction::Delete(DeleteUnitAction { unit_id }))
}

#[test]
fn registered_decoders_take_part_in_decoding() {
    let mut registry = ActionRegistry::with_default_actions();
    registry.register("Scrap", decode_scrap).unwrap();

    let mut custom = document();
    custom["turns"][1]["actions"][2] = json!({"action": "Scrap", "unit": 2});

    let replay = ReplayParser::new(Arc::new(registry))
        .parse_document(&document_bytes(&custom))
        .unwrap();

    assert_eq!(
        replay.turns[1].actions[2],
        ReplayAction::Delete(DeleteUnitAction { unit_id: 2 })
    );
}

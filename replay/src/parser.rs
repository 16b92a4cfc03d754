use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use serde_json::Value;

use awbw_integrations::Log;

use crate::actions::ReplayAction;
use crate::date_parser;
use crate::errors::DecodeError;
use crate::model::{ReplayContext, ReplayData, ReplayInfo, ReplayUser, TurnContext, TurnData};
use crate::registry::ActionRegistry;

/// Newest document version this build understands. Documents without a version
/// predate versioning and are treated as version 1.
pub const SUPPORTED_VERSION: u32 = 1;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// How a replay's bytes are packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// A zip archive holding the JSON document.
    Zip,

    /// A bare gzip stream of the JSON document.
    Compressed,
}

impl ContainerKind {
    /// Guesses the container from a file name: `.zip` is a zip, anything else is
    /// assumed to be a compressed stream.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("zip") => Self::Zip,
            _ => Self::Compressed,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Zip => Self::Compressed,
            Self::Compressed => Self::Zip,
        }
    }

    /// The name a replay of this kind is stored under.
    pub fn storage_name(self, replay_id: i64) -> String {
        match self {
            Self::Zip => format!("{replay_id}.zip"),
            Self::Compressed => format!("{replay_id}"),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReplay {
    #[serde(default)]
    version: Option<u32>,
    id: i64,
    name: String,

    #[serde(with = "date_parser")]
    start_date: chrono::DateTime<chrono::Utc>,

    #[serde(with = "date_parser::optional", default)]
    end_date: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default)]
    league_match: bool,

    players: Vec<ReplayUser>,
    turns: Vec<RawTurn>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTurn {
    player_id: i64,

    #[serde(default)]
    team: Option<String>,

    day: u32,
    actions: Vec<Value>,
}

/// Turns replay bytes into a `ReplayData`.
///
/// Cheap to clone; the registry is shared.
#[derive(Debug, Clone)]
pub struct ReplayParser {
    registry: Arc<ActionRegistry>,
}

impl ReplayParser {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Parses `bytes`, trying the `hint` container first and falling back to the
    /// other one if the container couldn't be opened.
    ///
    /// Returns the container that actually worked alongside the replay. Failures
    /// inside the document are never retried with the other container.
    pub fn parse_bytes(&self, bytes: &[u8], hint: ContainerKind) -> Result<(ReplayData, ContainerKind), DecodeError> {
        match self.parse_as(bytes, hint) {
            Ok(data) => Ok((data, hint)),

            Err(error) if error.is_container() => {
                tracing::debug!(target: Log::Replay, ?error, ?hint, "Container mismatch, trying fallback");

                match self.parse_as(bytes, hint.other()) {
                    Ok(data) => Ok((data, hint.other())),

                    // The fallback failing to even open tells us nothing new.
                    Err(fallback) if fallback.is_container() => Err(error),
                    Err(fallback) => Err(fallback),
                }
            },

            Err(error) => Err(error),
        }
    }

    pub fn parse_as(&self, bytes: &[u8], kind: ContainerKind) -> Result<ReplayData, DecodeError> {
        match kind {
            ContainerKind::Zip => self.parse_zip(bytes),
            ContainerKind::Compressed => self.parse_compressed(bytes),
        }
    }

    /// Reads the document out of a zip archive. The first `.json` entry wins; if
    /// there isn't one, the first file entry is used.
    pub fn parse_zip(&self, bytes: &[u8]) -> Result<ReplayData, DecodeError> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|error| DecodeError::Container(error.to_string()))?;

        // Archive order, not name order.
        let mut files = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|error| DecodeError::Container(error.to_string()))?;

            if !entry.is_dir() {
                files.push((index, entry.name().to_owned()));
            }
        }

        let (index, entry_name) = files
            .iter()
            .find(|(_, name)| name.ends_with(".json"))
            .or_else(|| files.first())
            .cloned()
            .ok_or_else(|| DecodeError::Container("zip archive contains no files".into()))?;

        let mut contents = Vec::new();
        archive
            .by_index(index)
            .map_err(|error| DecodeError::Container(error.to_string()))?
            .read_to_end(&mut contents)
            .map_err(|error| DecodeError::Container(format!("{entry_name}: {error}")))?;

        // Archives downloaded from the site hold a gzipped document inside.
        if contents.starts_with(&GZIP_MAGIC) {
            contents = inflate(&contents)?;
        }

        self.parse_document(&contents)
    }

    /// Reads a bare gzip stream.
    pub fn parse_compressed(&self, bytes: &[u8]) -> Result<ReplayData, DecodeError> {
        self.parse_document(&inflate(bytes)?)
    }

    /// Decodes the JSON document itself.
    pub fn parse_document(&self, json: &[u8]) -> Result<ReplayData, DecodeError> {
        let raw: RawReplay =
            serde_json::from_slice(json).map_err(|error| DecodeError::InvalidDocument(error.to_string()))?;

        self.build_match(raw)
    }

    /// Decodes every action of every turn, in order. The first failure aborts the
    /// whole replay; there is no such thing as a partially decoded match.
    fn build_match(&self, raw: RawReplay) -> Result<ReplayData, DecodeError> {
        let version = raw.version.unwrap_or(1);
        if version > SUPPORTED_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let mut context = ReplayContext {
            replay_id: raw.id,
            ..Default::default()
        };

        for mut player in raw.players {
            // Non-team games leave the team blank; the player is their own team.
            if player.team.is_empty() {
                player.team = player.id.to_string();
            }

            context.players.insert(player.id, player);
        }

        let mut turns = Vec::with_capacity(raw.turns.len());
        let mut winners = Vec::new();

        for (turn_index, raw_turn) in raw.turns.into_iter().enumerate() {
            let player = context
                .players
                .get(&raw_turn.player_id)
                .ok_or(DecodeError::UnknownPlayer(raw_turn.player_id))?;

            let turn = TurnContext {
                active_player_id: raw_turn.player_id,
                active_team: raw_turn.team.unwrap_or_else(|| player.team.clone()),
                day: raw_turn.day,
            };

            let mut actions = Vec::with_capacity(raw_turn.actions.len());

            for (action_index, fragment) in raw_turn.actions.iter().enumerate() {
                let action = self
                    .registry
                    .decode_fragment(fragment, &context, &turn)
                    .map_err(|error| DecodeError::InTurn {
                        turn: turn_index,
                        action: action_index,
                        source: Box::new(error),
                    })?;

                if let Some(game_winners) = winners_of(&action) {
                    winners = game_winners.to_vec();
                }

                actions.push(action);
            }

            turns.push(TurnData {
                active_player_id: turn.active_player_id,
                active_team: turn.active_team,
                day: turn.day,
                actions,
            });
        }

        tracing::debug!(
            target: Log::Replay,
            replay_id = raw.id,
            turns = turns.len(),
            "Decoded replay"
        );

        let info = ReplayInfo {
            id: raw.id,
            name: raw.name,
            start_date: raw.start_date,
            end_date: raw.end_date,
            league_match: raw.league_match,
            players: context.players,
            winners,
            turn_count: turns.len(),
        };

        Ok(ReplayData { info, turns })
    }
}

impl Default for ReplayParser {
    fn default() -> Self {
        Self::new(Arc::new(ActionRegistry::with_default_actions()))
    }
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut contents = Vec::new();

    GzDecoder::new(bytes)
        .read_to_end(&mut contents)
        .map_err(|error| DecodeError::Container(format!("gzip: {error}")))?;

    Ok(contents)
}

fn winners_of(action: &ReplayAction) -> Option<&[i64]> {
    match action {
        ReplayAction::GameOver(game_over) => Some(&game_over.winners),
        ReplayAction::Eliminated(eliminated) => eliminated.game_over.as_ref().map(|game_over| game_over.winners.as_slice()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_is_guessed_from_extension() {
        assert_eq!(ContainerKind::from_path(Path::new("replays/42.zip")), ContainerKind::Zip);
        assert_eq!(ContainerKind::from_path(Path::new("replays/42.ZIP")), ContainerKind::Zip);
        assert_eq!(ContainerKind::from_path(Path::new("replays/42")), ContainerKind::Compressed);
        assert_eq!(ContainerKind::Zip.storage_name(42), "42.zip");
        assert_eq!(ContainerKind::Compressed.storage_name(42), "42");
    }

    #[test]
    fn garbage_is_a_container_error_either_way() {
        let parser = ReplayParser::default();
        let error = parser.parse_bytes(b"definitely not a replay", ContainerKind::Zip).unwrap_err();

        assert!(error.is_container());
    }

    #[test]
    fn newer_versions_are_rejected() {
        let parser = ReplayParser::default();
        let document = serde_json::json!({
            "version": SUPPORTED_VERSION + 1,
            "id": 1,
            "name": "From the future",
            "startDate": "2030-01-01T00:00:00Z",
            "players": [],
            "turns": []
        });

        let error = parser.parse_document(document.to_string().as_bytes()).unwrap_err();
        assert_eq!(error, DecodeError::UnsupportedVersion(SUPPORTED_VERSION + 1));
    }
}

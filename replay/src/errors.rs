use thiserror::Error;

/// Everything that can go wrong while turning bytes into a `ReplayData`.
///
/// These are all fatal for the replay being decoded; nothing here is retried or
/// skipped over.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("No decoder registered for action code `{0}`")]
    UnknownAction(String),

    #[error("`{code}` action is missing the `{field}` field")]
    MissingField { code: String, field: String },

    #[error("`{code}` action contains the unhandled field `{field}`")]
    UnknownField { code: String, field: String },

    #[error("`{code}` action has an invalid `{field}` field: {reason}")]
    InvalidField { code: String, field: String, reason: String },

    #[error("`{code}` action expected a nested `{expected}` action but found `{found}`")]
    TypeMismatch {
        code: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{code}` action describes combat that player {player_id} has no vision on")]
    MissingVision { code: String, player_id: i64 },

    #[error("`{code}` action has no `{field}` entry visible to player {player_id} (team `{team}`)")]
    MissingPlayerView {
        code: String,
        field: String,
        player_id: i64,
        team: String,
    },

    #[error("Replay references unknown player {0}")]
    UnknownPlayer(i64),

    #[error("Replay document version {0} is newer than this build supports")]
    UnsupportedVersion(u32),

    #[error("Replay document is malformed: {0}")]
    InvalidDocument(String),

    #[error("Unable to open replay container: {0}")]
    Container(String),

    #[error("Turn {turn}, action {action}: {source}")]
    InTurn {
        turn: usize,
        action: usize,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Strips any positional wrapping and returns the underlying failure.
    pub fn root(&self) -> &DecodeError {
        match self {
            Self::InTurn { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this failure came from the container layer (zip/gzip) rather than
    /// the document inside it.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container(_))
    }
}

/// Raised when the action registry is configured incorrectly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("A decoder for action code `{0}` is already registered")]
    DuplicateCode(String),
}

use awbw_replay::DecodeError;

/// Failures from the byte store that holds replay artifacts and snapshots.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unable to {operation} `{name}`")]
    Io {
        operation: &'static str,
        name: String,

        #[source]
        source: std::io::Error,
    },

    #[error("`{0}` does not exist in the replay store")]
    NotFound(String),

    #[error("Unable to serialize `{name}`")]
    Serialize {
        name: String,

        #[source]
        source: serde_json::Error,
    },
}

/// Username enrichment gave up on a replay.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// The lookup failed `failures` times in one run. Players resolved before
    /// that point (`resolved` of them) keep their names.
    #[error("Failed to resolve usernames for replay {replay_id} after {failures} failed lookups")]
    TooManyFailures {
        replay_id: i64,
        failures: u32,
        resolved: usize,
    },
}

impl EnrichmentError {
    /// Players resolved before the run failed.
    pub fn resolved(&self) -> usize {
        match self {
            Self::TooManyFailures { resolved, .. } => *resolved,
        }
    }
}

/// Everything a catalog operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to decode replay")]
    Decode(#[from] DecodeError),

    #[error("No replay with id {0} is known")]
    UnknownReplay(i64),

    #[error("Unable to read replay file `{path}`")]
    Read {
        path: std::path::PathBuf,

        #[source]
        source: std::io::Error,
    },
}

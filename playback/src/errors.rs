use thiserror::Error;

use crate::types::DriverStatus;

/// Playback failures. The state errors raised while an action executes leave
/// the driver `Failed`, as the game state may already be partially mutated;
/// `InvalidTransition` and `Unsupported` leave it untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("unit {0} is not on the board")]
    UnitNotFound(i64),

    #[error("unit {0} has no owner")]
    UndeterminedOwner(i64),

    #[error("player {0} is not part of this game")]
    PlayerNotFound(i64),

    #[error("cannot {operation} while the driver is {status:?}")]
    InvalidTransition {
        operation: &'static str,
        status: DriverStatus,
    },

    #[error("{operation} is not supported (last action: {})", .code.unwrap_or("none"))]
    Unsupported {
        operation: &'static str,
        code: Option<&'static str>,
    },
}

use awbw_replay::actions::PowerKind;
use awbw_replay::Position;

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Nothing loaded.
    Idle,

    /// Loaded and ready to `step`.
    Running,

    /// Paused at a wait point until `resume_from_wait`.
    Suspended,

    /// Every action has been performed.
    Completed,

    /// An action could not be performed; see the error that `step` returned.
    Failed,
}

/// A point at which the driver pauses so the presentation layer can show what
/// just happened. State mutations up to the wait point have been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitPoint {
    UnitMoved { unit_id: i64, to: Option<Position> },

    /// `striker` is about to hit `target`; nothing has been applied yet.
    Strike { striker: i64, target: i64 },

    UnitDestroyed { unit_id: i64 },
    UnitBuilt { unit_id: i64 },
    UnitDeleted { unit_id: i64 },
    BuildingUpdated { building_id: i64, position: Position },
    PowerActivated { player_id: i64, kind: PowerKind },
    TurnEnded { next_player_id: i64 },
    PlayerEliminated { player_id: i64 },
    GameOver { winners: Vec<i64> },
}

/// What a call to `step` or `resume_from_wait` ended on.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Waiting(WaitPoint),
    Completed,
}

/// Notifications sent to a controller's listener, if it has one.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started { actions: usize },
    TurnStarted { turn: usize, player_id: i64, day: u32 },
    Wait(WaitPoint),
    ActionFinished { index: usize, code: &'static str },
    Completed,
    Failed(crate::PlaybackError),
    Cancelled,
}

//! Steps a decoded replay against a `GameState`, pausing at every wait point.
//!
//! `ReplayController` is the surface the presentation layer drives: `start`
//! hands it a replay and a state, `step` runs until the next wait point, and
//! `resume_from_wait` carries on once whatever the wait point was shown for has
//! finished. Nothing here blocks or schedules; the caller decides when to move.

use std::fmt;
use std::marker::PhantomData;
use std::sync::mpsc::Sender;

use awbw_integrations::Log;
use awbw_replay::ReplayData;

mod board;
pub use board::{ActivePower, Board, BoardBuilding, BoardPlayer, BoardUnit, GameState};

mod errors;
pub use errors::PlaybackError;

mod perform;
pub use perform::{strike_order, StrikeOrder};

pub mod powers;

mod state;
use state::Cursor;

mod types;
pub use types::{DriverStatus, PlaybackEvent, Progress, WaitPoint};

/// The playback driver.
pub struct ReplayController<S: GameState> {
    status: DriverStatus,
    session: Option<(S, Cursor)>,
    listener: Option<Sender<PlaybackEvent>>,
    replay_id: Option<i64>,
}

impl<S: GameState> fmt::Debug for ReplayController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayController")
            .field("status", &self.status)
            .field("replay_id", &self.replay_id)
            .field("listening", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: GameState> Default for ReplayController<S> {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<S: GameState> ReplayController<S> {
    pub fn builder() -> ReplayControllerBuilder<S> {
        ReplayControllerBuilder::default()
    }

    pub fn status(&self) -> DriverStatus {
        self.status
    }

    /// The game state being driven, if a replay is loaded.
    pub fn state(&self) -> Option<&S> {
        self.session.as_ref().map(|(state, _)| state)
    }

    /// Loads `replay` against `state`. Only valid while idle.
    pub fn start(&mut self, replay: ReplayData, state: S) -> Result<(), PlaybackError> {
        self.expect_status("start", DriverStatus::Idle)?;

        let cursor = Cursor::new(replay.turns);
        let actions = cursor.total_actions();

        tracing::info!(target: Log::Playback, replay_id = replay.info.id, ?actions, "Starting playback");

        self.replay_id = Some(replay.info.id);
        self.session = Some((state, cursor));
        self.status = DriverStatus::Running;
        self.notify(PlaybackEvent::Started { actions });

        Ok(())
    }

    /// Performs actions until the next wait point, or until the replay runs out.
    ///
    /// A state error leaves the driver `Failed`; the state keeps whatever was
    /// applied before the error and can be taken back with `cancel`.
    pub fn step(&mut self) -> Result<Progress, PlaybackError> {
        self.expect_status("step", DriverStatus::Running)?;

        let Some((state, cursor)) = self.session.as_mut() else {
            return Err(PlaybackError::InvalidTransition {
                operation: "step",
                status: self.status,
            });
        };

        let listener = self.listener.as_ref();
        let mut notify = |event: PlaybackEvent| send(listener, event);

        match cursor.advance(state, &mut notify) {
            Ok(Progress::Waiting(wait)) => {
                self.status = DriverStatus::Suspended;
                self.notify(PlaybackEvent::Wait(wait.clone()));

                Ok(Progress::Waiting(wait))
            },

            Ok(Progress::Completed) => {
                tracing::info!(target: Log::Playback, replay_id = ?self.replay_id, "Playback completed");

                self.status = DriverStatus::Completed;
                self.notify(PlaybackEvent::Completed);

                Ok(Progress::Completed)
            },

            Err(error) => {
                tracing::error!(target: Log::Playback, replay_id = ?self.replay_id, ?error, "Playback failed");

                self.status = DriverStatus::Failed;
                self.notify(PlaybackEvent::Failed(error.clone()));

                Err(error)
            },
        }
    }

    /// Signals that the current wait point has been shown, and steps on.
    pub fn resume_from_wait(&mut self) -> Result<Progress, PlaybackError> {
        self.expect_status("resume", DriverStatus::Suspended)?;

        self.status = DriverStatus::Running;
        self.step()
    }

    /// Drops the loaded replay and hands the game state back. Returns `None`
    /// if nothing was loaded.
    pub fn cancel(&mut self) -> Option<S> {
        let (state, _) = self.session.take()?;

        tracing::info!(target: Log::Playback, replay_id = ?self.replay_id, status = ?self.status, "Playback cancelled");

        self.status = DriverStatus::Idle;
        self.replay_id = None;
        self.notify(PlaybackEvent::Cancelled);

        Some(state)
    }

    /// Rolling back actions is not supported.
    pub fn undo(&mut self) -> Result<(), PlaybackError> {
        let code = self
            .session
            .as_ref()
            .and_then(|(_, cursor)| cursor.last_started());

        Err(PlaybackError::Unsupported {
            operation: "undo",
            code,
        })
    }

    fn expect_status(&self, operation: &'static str, expected: DriverStatus) -> Result<(), PlaybackError> {
        if self.status != expected {
            return Err(PlaybackError::InvalidTransition {
                operation,
                status: self.status,
            });
        }

        Ok(())
    }

    fn notify(&self, event: PlaybackEvent) {
        send(self.listener.as_ref(), event);
    }
}

fn send(listener: Option<&Sender<PlaybackEvent>>, event: PlaybackEvent) {
    if let Some(listener) = listener {
        // A listener that went away just stops hearing about playback.
        if let Err(error) = listener.send(event) {
            tracing::warn!(target: Log::Playback, ?error, "Playback listener disconnected");
        }
    }
}

/// Builds a `ReplayController` for one kind of game state.
pub struct ReplayControllerBuilder<S: GameState> {
    listener: Option<Sender<PlaybackEvent>>,
    state: PhantomData<S>,
}

impl<S: GameState> Default for ReplayControllerBuilder<S> {
    fn default() -> Self {
        Self {
            listener: None,
            state: PhantomData,
        }
    }
}

impl<S: GameState> fmt::Debug for ReplayControllerBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayControllerBuilder")
            .field("listener", &self.listener)
            .finish()
    }
}

impl<S: GameState> ReplayControllerBuilder<S> {
    /// Wait points and lifecycle changes are also sent to `listener`.
    pub fn with_listener(mut self, listener: Sender<PlaybackEvent>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> ReplayController<S> {
        ReplayController {
            status: DriverStatus::Idle,
            session: None,
            listener: self.listener,
            replay_id: None,
        }
    }
}

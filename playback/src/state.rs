use std::collections::VecDeque;

use awbw_integrations::Log;
use awbw_replay::TurnData;

use crate::board::GameState;
use crate::errors::PlaybackError;
use crate::perform::{self, Op, OpResult};
use crate::types::{PlaybackEvent, Progress};

/// Position within a replay: which turn, which action, and what is left of the
/// action in progress.
#[derive(Debug)]
pub(crate) struct Cursor {
    turns: Vec<TurnData>,
    turn: usize,
    next_action: usize,
    turn_started: bool,

    /// Remaining ops of the action in progress.
    script: VecDeque<Op>,
    current: Option<&'static str>,

    /// Actions finished so far, across all turns.
    finished: usize,

    /// Code of the most recently started action.
    last_started: Option<&'static str>,
}

impl Cursor {
    pub fn new(turns: Vec<TurnData>) -> Self {
        Self {
            turns,
            turn: 0,
            next_action: 0,
            turn_started: false,
            script: VecDeque::new(),
            current: None,
            finished: 0,
            last_started: None,
        }
    }

    pub fn total_actions(&self) -> usize {
        self.turns.iter().map(|turn| turn.actions.len()).sum()
    }

    pub fn last_started(&self) -> Option<&'static str> {
        self.last_started
    }

    /// Runs ops until one pauses or the replay runs out.
    pub fn advance<S: GameState + ?Sized>(
        &mut self,
        state: &mut S,
        notify: &mut dyn FnMut(PlaybackEvent),
    ) -> Result<Progress, PlaybackError> {
        loop {
            if let Some(op) = self.script.pop_front() {
                match perform::run(op, state)? {
                    OpResult::Wait(wait) => return Ok(Progress::Waiting(wait)),
                    OpResult::Continue => {},

                    OpResult::Expand(ops) => {
                        for op in ops.into_iter().rev() {
                            self.script.push_front(op);
                        }
                    },

                    OpResult::Finish(wait) => {
                        self.script.clear();
                        return Ok(Progress::Waiting(wait));
                    },
                }

                continue;
            }

            if let Some(code) = self.current.take() {
                notify(PlaybackEvent::ActionFinished {
                    index: self.finished,
                    code,
                });
                self.finished += 1;
            }

            let Some(turn) = self.turns.get(self.turn) else {
                return Ok(Progress::Completed);
            };

            if !self.turn_started {
                state.begin_turn(&turn.context())?;
                self.turn_started = true;

                tracing::debug!(
                    target: Log::Playback,
                    turn = self.turn,
                    player_id = turn.active_player_id,
                    "Starting turn"
                );

                notify(PlaybackEvent::TurnStarted {
                    turn: self.turn,
                    player_id: turn.active_player_id,
                    day: turn.day,
                });
            }

            match turn.actions.get(self.next_action) {
                Some(action) => {
                    self.next_action += 1;
                    self.current = Some(action.code());
                    self.last_started = self.current;
                    self.script = perform::script(action);
                },

                None => {
                    self.turn += 1;
                    self.next_action = 0;
                    self.turn_started = false;
                },
            }
        }
    }
}

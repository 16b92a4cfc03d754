//! The game state the driver mutates, and a plain in-memory board that
//! implements it.

use std::collections::{BTreeMap, HashMap};

use awbw_replay::actions::{EndTurnAction, GameOverAction, PowerAction, PowerKind};
use awbw_replay::{Position, ReplayBuilding, ReplayInfo, ReplayUnit, TurnContext};

use crate::errors::PlaybackError;
use crate::powers;

/// Everything the driver needs from a game state.
///
/// The presentation layer owns the real state; the driver only borrows it for
/// the duration of a session and reports inconsistencies as errors instead of
/// patching over them.
pub trait GameState {
    /// The owning player of a unit. `Ok(None)` means the unit exists but its
    /// owner is unknown.
    fn unit_owner(&self, unit_id: i64) -> Result<Option<i64>, PlaybackError>;

    fn unit_hit_points(&self, unit_id: i64) -> Result<f32, PlaybackError>;

    /// Moves an existing unit to `to`, or creates it there if the board hasn't
    /// seen it yet (units can appear out of fog mid-move).
    fn move_unit(&mut self, stats: &ReplayUnit, to: Option<Position>) -> Result<(), PlaybackError>;

    /// Applies the fields present in `stats` to an existing unit.
    fn update_unit(&mut self, stats: &ReplayUnit) -> Result<(), PlaybackError>;

    fn spawn_unit(&mut self, stats: &ReplayUnit) -> Result<(), PlaybackError>;

    fn remove_unit(&mut self, unit_id: i64) -> Result<(), PlaybackError>;

    /// Uses one round of ammunition, for units that track it.
    fn spend_ammo(&mut self, unit_id: i64) -> Result<(), PlaybackError>;

    /// Whether the player's active power lets their units strike first even
    /// when defending.
    fn attacks_first(&self, player_id: i64) -> bool;

    fn activate_power(&mut self, power: &PowerAction) -> Result<(), PlaybackError>;

    /// Hands the turn over: the next player's power wears off and their funds
    /// are updated when known.
    fn end_turn(&mut self, end: &EndTurnAction) -> Result<(), PlaybackError>;

    fn set_building(&mut self, building: &ReplayBuilding) -> Result<(), PlaybackError>;

    fn eliminate_player(&mut self, player_id: i64) -> Result<(), PlaybackError>;

    fn finish_game(&mut self, game_over: &GameOverAction) -> Result<(), PlaybackError>;

    /// Called before the first action of every turn.
    fn begin_turn(&mut self, _turn: &TurnContext) -> Result<(), PlaybackError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardUnit {
    pub id: i64,
    pub owner: Option<i64>,
    pub name: Option<String>,
    pub position: Option<Position>,
    pub hit_points: f32,

    /// `None` for units with unlimited ammunition.
    pub ammo: Option<i32>,
    pub fuel: Option<i32>,

    /// Cleared once the unit has acted this turn.
    pub can_move: bool,
}

impl BoardUnit {
    fn from_stats(stats: &ReplayUnit) -> Self {
        Self {
            id: stats.id,
            owner: stats.player_id,
            name: stats.name.clone(),
            position: stats.position(),
            hit_points: stats.hit_points.unwrap_or(10.0),
            ammo: stats.ammo,
            fuel: stats.fuel,
            can_move: true,
        }
    }

    fn apply(&mut self, stats: &ReplayUnit) {
        if let Some(owner) = stats.player_id {
            self.owner = Some(owner);
        }

        if let Some(name) = &stats.name {
            self.name = Some(name.clone());
        }

        if let Some(position) = stats.position() {
            self.position = Some(position);
        }

        if let Some(hit_points) = stats.hit_points {
            self.hit_points = hit_points;
        }

        if stats.ammo.is_some() {
            self.ammo = stats.ammo;
        }

        if stats.fuel.is_some() {
            self.fuel = stats.fuel;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePower {
    pub co_name: String,
    pub kind: PowerKind,
    pub attack_first: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPlayer {
    pub id: i64,
    pub team: String,
    pub funds: Option<i64>,
    pub eliminated: bool,
    pub active_power: Option<ActivePower>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardBuilding {
    pub id: i64,
    pub capture: i32,
    pub owner: Option<i64>,
}

/// A minimal board that tracks what the replay tells it and nothing more.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    pub units: BTreeMap<i64, BoardUnit>,
    pub players: BTreeMap<i64, BoardPlayer>,
    pub buildings: HashMap<Position, BoardBuilding>,
    pub active_player: Option<i64>,
    pub day: u32,
    pub result: Option<GameOverAction>,
}

impl Board {
    /// An empty board seated with the replay's players.
    pub fn for_replay(info: &ReplayInfo) -> Self {
        let players = info
            .players
            .values()
            .map(|player| {
                let seat = BoardPlayer {
                    id: player.id,
                    team: player.team.clone(),
                    funds: None,
                    eliminated: false,
                    active_power: None,
                };

                (player.id, seat)
            })
            .collect();

        Self {
            players,
            ..Default::default()
        }
    }

    /// Places a unit before playback, e.g. from a map's predeployed units.
    pub fn with_unit(mut self, unit: BoardUnit) -> Self {
        self.units.insert(unit.id, unit);
        self
    }

    fn unit_mut(&mut self, unit_id: i64) -> Result<&mut BoardUnit, PlaybackError> {
        self.units.get_mut(&unit_id).ok_or(PlaybackError::UnitNotFound(unit_id))
    }

    fn player_mut(&mut self, player_id: i64) -> Result<&mut BoardPlayer, PlaybackError> {
        self.players
            .get_mut(&player_id)
            .ok_or(PlaybackError::PlayerNotFound(player_id))
    }
}

impl GameState for Board {
    fn unit_owner(&self, unit_id: i64) -> Result<Option<i64>, PlaybackError> {
        self.units
            .get(&unit_id)
            .map(|unit| unit.owner)
            .ok_or(PlaybackError::UnitNotFound(unit_id))
    }

    fn unit_hit_points(&self, unit_id: i64) -> Result<f32, PlaybackError> {
        self.units
            .get(&unit_id)
            .map(|unit| unit.hit_points)
            .ok_or(PlaybackError::UnitNotFound(unit_id))
    }

    fn move_unit(&mut self, stats: &ReplayUnit, to: Option<Position>) -> Result<(), PlaybackError> {
        let unit = self
            .units
            .entry(stats.id)
            .or_insert_with(|| BoardUnit::from_stats(stats));

        unit.apply(stats);
        if to.is_some() {
            unit.position = to;
        }
        unit.can_move = false;

        Ok(())
    }

    fn update_unit(&mut self, stats: &ReplayUnit) -> Result<(), PlaybackError> {
        self.unit_mut(stats.id)?.apply(stats);
        Ok(())
    }

    fn spawn_unit(&mut self, stats: &ReplayUnit) -> Result<(), PlaybackError> {
        let mut unit = BoardUnit::from_stats(stats);

        // Freshly built units wait a turn.
        unit.can_move = false;
        self.units.insert(unit.id, unit);

        Ok(())
    }

    fn remove_unit(&mut self, unit_id: i64) -> Result<(), PlaybackError> {
        self.units
            .remove(&unit_id)
            .map(|_| ())
            .ok_or(PlaybackError::UnitNotFound(unit_id))
    }

    fn spend_ammo(&mut self, unit_id: i64) -> Result<(), PlaybackError> {
        let unit = self.unit_mut(unit_id)?;

        if let Some(ammo) = unit.ammo.as_mut() {
            *ammo = (*ammo - 1).max(0);
        }

        Ok(())
    }

    fn attacks_first(&self, player_id: i64) -> bool {
        self.players
            .get(&player_id)
            .and_then(|player| player.active_power.as_ref())
            .map(|power| power.attack_first)
            .unwrap_or(false)
    }

    fn activate_power(&mut self, power: &PowerAction) -> Result<(), PlaybackError> {
        let player = self.player_mut(power.player_id)?;

        player.active_power = Some(ActivePower {
            co_name: power.co_name.clone(),
            kind: power.kind,
            attack_first: powers::grants_attack_first(&power.co_name, power.kind),
        });

        Ok(())
    }

    fn end_turn(&mut self, end: &EndTurnAction) -> Result<(), PlaybackError> {
        let player = self.player_mut(end.next_player_id)?;

        player.active_power = None;
        if end.next_funds.is_some() {
            player.funds = end.next_funds;
        }

        self.active_player = Some(end.next_player_id);
        self.day = end.day;

        for unit in self.units.values_mut() {
            unit.can_move = true;
        }

        Ok(())
    }

    fn set_building(&mut self, building: &ReplayBuilding) -> Result<(), PlaybackError> {
        let entry = self
            .buildings
            .entry(building.position())
            .or_insert_with(|| BoardBuilding {
                id: building.id,
                capture: building.capture,
                owner: building.player_id,
            });

        entry.id = building.id;
        entry.capture = building.capture;
        if building.player_id.is_some() {
            entry.owner = building.player_id;
        }

        Ok(())
    }

    fn eliminate_player(&mut self, player_id: i64) -> Result<(), PlaybackError> {
        self.player_mut(player_id)?.eliminated = true;
        self.units.retain(|_, unit| unit.owner != Some(player_id));

        Ok(())
    }

    fn finish_game(&mut self, game_over: &GameOverAction) -> Result<(), PlaybackError> {
        self.result = Some(game_over.clone());
        Ok(())
    }

    fn begin_turn(&mut self, turn: &TurnContext) -> Result<(), PlaybackError> {
        if !self.players.contains_key(&turn.active_player_id) {
            return Err(PlaybackError::PlayerNotFound(turn.active_player_id));
        }

        self.active_player = Some(turn.active_player_id);
        self.day = turn.day;

        Ok(())
    }
}

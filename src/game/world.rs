//! Authoritative world state, command handlers and the per-tick step

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::combat::CombatSystem;
use super::entities::{
    Building, BuildingType, CentralStructure, Enemy, GameEvent, MatchPhase, MoveInput, Player,
    Projectile,
};
use super::physics::{Bounds, PhysicsSystem};
use super::tuning::{TowerStats, WorldConfig};

/// Why a building placement was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum PlacementRejection {
    #[error("buildings can only be placed while the match is running")]
    WrongPhase,

    #[error("too close to the central structure")]
    TooCloseToCentral,

    #[error("too many buildings nearby")]
    TooCrowded,

    #[error("unknown player")]
    UnknownPlayer,

    #[error("position is outside the arena")]
    OutOfBounds,

    #[error("another building already stands here")]
    Occupied,
}

/// The single owner of every entity in a match
pub struct World {
    config: WorldConfig,
    rng: ChaCha8Rng,
    phase: MatchPhase,
    tick: u64,
    /// Monotonic world clock in milliseconds, as of the last step
    now_ms: u64,

    players: BTreeMap<Uuid, Player>,
    inputs: BTreeMap<Uuid, MoveInput>,
    ready: BTreeSet<Uuid>,
    enemies: BTreeMap<u64, Enemy>,
    buildings: BTreeMap<u64, Building>,
    projectiles: BTreeMap<u64, Projectile>,
    central: CentralStructure,

    next_enemy_id: u64,
    next_building_id: u64,
    next_projectile_id: u64,
    next_spawn_point: usize,
    last_spawn_ms: u64,

    events: Vec<GameEvent>,
}

impl World {
    pub fn new(config: WorldConfig, seed: u64) -> Self {
        let central = Self::fresh_central(&config);
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            phase: MatchPhase::Waiting,
            tick: 0,
            now_ms: 0,
            players: BTreeMap::new(),
            inputs: BTreeMap::new(),
            ready: BTreeSet::new(),
            enemies: BTreeMap::new(),
            buildings: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            central,
            next_enemy_id: 1,
            next_building_id: 1,
            next_projectile_id: 1,
            next_spawn_point: 0,
            last_spawn_ms: 0,
            events: Vec::new(),
        }
    }

    fn fresh_central(config: &WorldConfig) -> CentralStructure {
        let (x, y) = config.center();
        CentralStructure {
            x,
            y,
            health: config.central_max_health,
            max_health: config.central_max_health,
            size: config.central_size,
        }
    }

    // ------------------------------------------------------------------
    // Command handlers
    // ------------------------------------------------------------------

    /// Register a newly connected player at a random spot away from the edges
    pub fn add_player(&mut self, player_id: Uuid, display_name: String) -> Player {
        let palette = &self.config.palette;
        let color = palette
            .get(self.players.len() % palette.len().max(1))
            .copied()
            .unwrap_or("#ffffff");

        let margin = self.config.spawn_margin;
        let x = self.random_coordinate(margin, self.config.width);
        let y = self.random_coordinate(margin, self.config.height);

        let player = Player {
            id: player_id,
            display_name,
            x,
            y,
            color,
            speed: self.config.player_speed,
        };

        self.players.insert(player_id, player.clone());
        self.inputs.insert(player_id, MoveInput::default());

        info!(
            player_id = %player_id,
            player_count = self.players.len(),
            "Player joined"
        );
        player
    }

    fn random_coordinate(&mut self, margin: f32, dimension: f32) -> f32 {
        let (lo, hi) = (margin, dimension - margin);
        if lo < hi {
            self.rng.gen_range(lo..hi)
        } else {
            dimension / 2.0
        }
    }

    pub fn remove_player(&mut self, player_id: Uuid) {
        self.inputs.remove(&player_id);
        self.ready.remove(&player_id);
        if self.players.remove(&player_id).is_some() {
            info!(
                player_id = %player_id,
                player_count = self.players.len(),
                "Player left"
            );
        }
    }

    /// Replace a player's directional intent. Unknown players are ignored.
    pub fn set_player_input(&mut self, player_id: Uuid, input: MoveInput) {
        if let Some(stored) = self.inputs.get_mut(&player_id) {
            *stored = input;
        }
    }

    pub fn place_building(
        &mut self,
        x: f32,
        y: f32,
        building_type: BuildingType,
        owner_id: Uuid,
    ) -> Result<Building, PlacementRejection> {
        let result = self.validate_placement(x, y, owner_id);
        if let Err(reason) = result {
            debug!(player_id = %owner_id, x, y, %reason, "Building placement rejected");
            return Err(reason);
        }

        let stats = TowerStats::for_type(building_type);
        let id = self.next_building_id;
        self.next_building_id += 1;

        let building = Building {
            id,
            x,
            y,
            building_type,
            health: stats.max_health,
            max_health: stats.max_health,
            owner_id,
            last_shot_ms: None,
        };
        self.buildings.insert(id, building.clone());

        info!(
            player_id = %owner_id,
            building_id = id,
            ?building_type,
            x,
            y,
            "Building placed"
        );
        Ok(building)
    }

    fn validate_placement(&self, x: f32, y: f32, owner_id: Uuid) -> Result<(), PlacementRejection> {
        if self.phase != MatchPhase::Running {
            return Err(PlacementRejection::WrongPhase);
        }
        if !self.players.contains_key(&owner_id) {
            return Err(PlacementRejection::UnknownPlayer);
        }

        let unit = self.config.building_size;
        let half = unit / 2.0;
        let inside = |v: f32, dimension: f32| v.is_finite() && v >= half && v <= dimension - half;
        if !inside(x, self.config.width) || !inside(y, self.config.height) {
            return Err(PlacementRejection::OutOfBounds);
        }

        let keep_out = self.central.half_size() + half;
        if PhysicsSystem::distance(x, y, self.central.x, self.central.y) < keep_out {
            return Err(PlacementRejection::TooCloseToCentral);
        }

        if self.buildings.values().any(|b| b.x == x && b.y == y) {
            return Err(PlacementRejection::Occupied);
        }

        let neighbours = self
            .buildings
            .values()
            .filter(|b| PhysicsSystem::within_square(x, y, b.x, b.y, unit))
            .count();
        if neighbours >= self.config.max_adjacent_buildings {
            return Err(PlacementRejection::TooCrowded);
        }

        Ok(())
    }

    /// Ready a player up. Returns true when this call started a new match.
    pub fn mark_ready(&mut self, player_id: Uuid) -> bool {
        if self.phase != MatchPhase::Waiting || !self.players.contains_key(&player_id) {
            return false;
        }

        self.ready.insert(player_id);
        debug!(
            player_id = %player_id,
            ready = self.ready.len(),
            players = self.players.len(),
            "Player ready"
        );

        let all_ready = !self.players.is_empty()
            && self.players.keys().all(|id| self.ready.contains(id));
        if all_ready {
            self.reset_match();
        }
        all_ready
    }

    /// WAITING -> RUNNING: wipe transient entities and rebuild the central structure
    fn reset_match(&mut self) {
        self.enemies.clear();
        self.buildings.clear();
        self.projectiles.clear();
        self.ready.clear();
        self.central = Self::fresh_central(&self.config);
        self.phase = MatchPhase::Running;
        self.last_spawn_ms = self.now_ms;
        self.events.push(GameEvent::MatchReset);

        info!(players = self.players.len(), tick = self.tick, "Match started");
    }

    // ------------------------------------------------------------------
    // Simulation step
    // ------------------------------------------------------------------

    /// Advance the world by `dt` seconds, `now_ms` being the monotonic world clock.
    pub fn step(&mut self, dt: f32, now_ms: u64) {
        self.tick += 1;
        self.now_ms = now_ms;

        self.move_players(dt);

        let running = self.phase == MatchPhase::Running;
        if running {
            self.spawn_enemies();
            CombatSystem::update_enemies(
                &mut self.enemies,
                &mut self.buildings,
                &mut self.central,
                &self.config,
                now_ms,
                dt,
                &mut self.events,
            );
            CombatSystem::update_buildings(
                &mut self.buildings,
                &self.enemies,
                &mut self.projectiles,
                &mut self.next_projectile_id,
                now_ms,
                &mut self.events,
            );
        }

        CombatSystem::update_projectiles(
            &mut self.projectiles,
            &mut self.enemies,
            &self.config,
            dt,
        );
        CombatSystem::cull_dead_enemies(&mut self.enemies, &mut self.events);

        if running {
            self.check_phase();
        }
    }

    fn move_players(&mut self, dt: f32) {
        let bounds = Bounds {
            width: self.config.width,
            height: self.config.height,
        };
        let footprint = self.config.player_size;

        for player in self.players.values_mut() {
            let input = self.inputs.get(&player.id).copied().unwrap_or_default();
            let (x, y) = PhysicsSystem::move_player(
                player.x,
                player.y,
                &input,
                player.speed,
                footprint,
                bounds,
                dt,
            );
            player.x = x;
            player.y = y;
        }
    }

    fn spawn_enemies(&mut self) {
        if self.now_ms.saturating_sub(self.last_spawn_ms) < self.config.enemy_spawn_interval_ms {
            return;
        }
        let points = &self.config.enemy_spawn_points;
        if points.is_empty() {
            return;
        }

        let (x, y) = points[self.next_spawn_point % points.len()];
        self.next_spawn_point = (self.next_spawn_point + 1) % points.len();

        let id = self.next_enemy_id;
        self.next_enemy_id += 1;
        self.enemies.insert(
            id,
            Enemy {
                id,
                x,
                y,
                health: self.config.enemy_max_health,
                max_health: self.config.enemy_max_health,
                speed: self.config.enemy_speed,
                last_attack_ms: None,
            },
        );
        self.last_spawn_ms = self.now_ms;
        self.events.push(GameEvent::EnemySpawned { enemy_id: id, x, y });
    }

    /// RUNNING -> WAITING once the central structure falls. Entities stay in
    /// place until the next reset.
    fn check_phase(&mut self) {
        if self.central.is_destroyed() {
            self.phase = MatchPhase::Waiting;
            self.ready.clear();
            self.events.push(GameEvent::CentralDestroyed);
            info!(tick = self.tick, "Central structure destroyed, waiting for players");
        }
    }

    // ------------------------------------------------------------------
    // Read-only accessors
    // ------------------------------------------------------------------

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn enemies(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.values()
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn central(&self) -> &CentralStructure {
        &self.central
    }

    pub fn ready_players(&self) -> impl Iterator<Item = &Uuid> {
        self.ready.iter()
    }

    /// Hand over the events recorded since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    #[cfg(test)]
    pub(crate) fn spawn_enemy_at(&mut self, x: f32, y: f32) -> u64 {
        let id = self.next_enemy_id;
        self.next_enemy_id += 1;
        self.enemies.insert(
            id,
            Enemy {
                id,
                x,
                y,
                health: self.config.enemy_max_health,
                max_health: self.config.enemy_max_health,
                speed: self.config.enemy_speed,
                last_attack_ms: None,
            },
        );
        id
    }

    #[cfg(test)]
    pub(crate) fn enemy_mut(&mut self, id: u64) -> Option<&mut Enemy> {
        self.enemies.get_mut(&id)
    }

    #[cfg(test)]
    pub(crate) fn central_mut(&mut self) -> &mut CentralStructure {
        &mut self.central
    }
}

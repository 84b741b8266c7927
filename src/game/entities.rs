//! Entity records owned by the world

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Combat active: enemies spawn, buildings may be placed
    Running,
    /// Central structure destroyed, waiting for every player to ready up
    Waiting,
}

/// Building kinds that can be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    /// Long range, fast firing, light damage
    ArrowTower,
    /// Short range, slow firing, heavy damage
    Cannon,
}

impl Default for BuildingType {
    fn default() -> Self {
        Self::ArrowTower
    }
}

/// Directional intent flags from a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Connected player (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub color: &'static str,
    pub speed: f32,
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    /// Timestamp (world millis) of the last landed attack
    pub last_attack_ms: Option<u64>,
}

impl Enemy {
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

#[derive(Debug, Clone)]
pub struct Building {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub building_type: BuildingType,
    pub health: f32,
    pub max_health: f32,
    pub owner_id: Uuid,
    /// Timestamp (world millis) of the last shot fired
    pub last_shot_ms: Option<u64>,
}

/// Projectile flying toward a point fixed at launch
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub speed: f32,
    pub damage: f32,
    pub source_building_id: u64,
}

/// The structure every enemy marches on
#[derive(Debug, Clone)]
pub struct CentralStructure {
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub size: f32,
}

impl CentralStructure {
    pub fn half_size(&self) -> f32 {
        self.size / 2.0
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }
}

/// Things that happened during a tick, drained into the next snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    EnemySpawned {
        enemy_id: u64,
        x: f32,
        y: f32,
    },
    EnemyKilled {
        enemy_id: u64,
        x: f32,
        y: f32,
    },
    ShotFired {
        building_id: u64,
        projectile_id: u64,
        target_x: f32,
        target_y: f32,
    },
    BuildingDestroyed {
        building_id: u64,
        owner_id: Uuid,
    },
    CentralDestroyed,
    MatchReset,
}

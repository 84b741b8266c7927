//! Gameplay tuning.
//!
//! Kept separate from runtime/server configuration (bind address, log level).

use super::entities::BuildingType;

/// Per building-type combat stats
#[derive(Debug, Clone, Copy)]
pub struct TowerStats {
    pub max_health: f32,
    /// Radius within which enemies are engaged
    pub attack_range: f32,
    /// Minimum time between shots (milliseconds)
    pub cooldown_ms: u64,
    pub projectile_speed: f32,
    pub projectile_damage: f32,
}

impl TowerStats {
    pub fn for_type(building_type: BuildingType) -> Self {
        match building_type {
            BuildingType::ArrowTower => Self {
                max_health: 200.0,
                attack_range: 150.0,
                cooldown_ms: 500,
                projectile_speed: 400.0,
                projectile_damage: 25.0,
            },
            BuildingType::Cannon => Self {
                max_health: 300.0,
                attack_range: 120.0,
                cooldown_ms: 1500,
                projectile_speed: 250.0,
                projectile_damage: 60.0,
            },
        }
    }
}

/// Tuning for a whole world instance
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,

    /// Player square footprint
    pub player_size: f32,
    /// Units per second
    pub player_speed: f32,
    /// Keep-out distance from the world bounds when spawning players
    pub spawn_margin: f32,
    pub palette: Vec<&'static str>,

    pub central_size: f32,
    pub central_max_health: f32,

    /// Building square footprint, also the adjacency unit
    pub building_size: f32,
    /// Neighbours within one footprint that block a placement
    pub max_adjacent_buildings: usize,

    pub enemy_max_health: f32,
    pub enemy_speed: f32,
    /// Radius used for projectile impact tests
    pub enemy_hit_radius: f32,
    /// Reach beyond the target's half size
    pub enemy_attack_range: f32,
    pub enemy_damage: f32,
    pub enemy_attack_cooldown_ms: u64,
    pub enemy_spawn_interval_ms: u64,
    /// Fixed edge spawn points, used round-robin
    pub enemy_spawn_points: Vec<(f32, f32)>,

    /// Distance to the target point at which a projectile detonates
    pub projectile_impact_distance: f32,
}

impl WorldConfig {
    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        let width = 1600.0;
        let height = 1200.0;
        Self {
            width,
            height,
            player_size: 30.0,
            player_speed: 220.0,
            spawn_margin: 60.0,
            palette: vec![
                "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0",
                "#f032e6",
            ],
            central_size: 120.0,
            central_max_health: 1000.0,
            building_size: 40.0,
            max_adjacent_buildings: 2,
            enemy_max_health: 100.0,
            enemy_speed: 60.0,
            enemy_hit_radius: 16.0,
            enemy_attack_range: 20.0,
            enemy_damage: 20.0,
            enemy_attack_cooldown_ms: 1000,
            enemy_spawn_interval_ms: 2000,
            enemy_spawn_points: vec![
                (0.0, height / 2.0),
                (width, height / 2.0),
                (width / 2.0, 0.0),
                (width / 2.0, height),
            ],
            projectile_impact_distance: 4.0,
        }
    }
}

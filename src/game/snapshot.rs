//! Snapshot building for network transmission

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entities::{
    Building, BuildingType, CentralStructure, Enemy, GameEvent, MatchPhase, Player, Projectile,
};
use super::World;

/// Complete, self-contained view of the world at one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Server tick number
    pub tick: u64,
    /// Monotonic world clock (milliseconds since the world was created)
    pub timestamp_ms: u64,
    pub phase: MatchPhase,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub buildings: Vec<BuildingSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub central: CentralSnapshot,
    /// Players that have readied up, in id order
    pub ready: Vec<Uuid>,
    /// Events that occurred since the last snapshot
    pub events: Vec<GameEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub building_type: BuildingType,
    pub health: f32,
    pub max_health: f32,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub source_building_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralSnapshot {
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub size: f32,
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name.clone(),
            x: p.x,
            y: p.y,
            color: p.color.to_string(),
        }
    }
}

impl From<&Enemy> for EnemySnapshot {
    fn from(e: &Enemy) -> Self {
        Self {
            id: e.id,
            x: e.x,
            y: e.y,
            health: e.health,
            max_health: e.max_health,
        }
    }
}

impl From<&Building> for BuildingSnapshot {
    fn from(b: &Building) -> Self {
        Self {
            id: b.id,
            x: b.x,
            y: b.y,
            building_type: b.building_type,
            health: b.health,
            max_health: b.max_health,
            owner_id: b.owner_id,
        }
    }
}

impl From<&Projectile> for ProjectileSnapshot {
    fn from(p: &Projectile) -> Self {
        Self {
            id: p.id,
            x: p.x,
            y: p.y,
            target_x: p.target_x,
            target_y: p.target_y,
            source_building_id: p.source_building_id,
        }
    }
}

impl From<&CentralStructure> for CentralSnapshot {
    fn from(c: &CentralStructure) -> Self {
        Self {
            x: c.x,
            y: c.y,
            health: c.health,
            max_health: c.max_health,
            size: c.size,
        }
    }
}

/// Builds snapshots and keeps simple bookkeeping for logging
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshots_built: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a full snapshot, draining the world's pending events into it
    pub fn build(&mut self, world: &mut World) -> WorldSnapshot {
        let events = world.drain_events();
        self.snapshots_built += 1;

        WorldSnapshot {
            tick: world.tick(),
            timestamp_ms: world.now_ms(),
            phase: world.phase(),
            players: world.players().map(PlayerSnapshot::from).collect(),
            enemies: world.enemies().map(EnemySnapshot::from).collect(),
            buildings: world.buildings().map(BuildingSnapshot::from).collect(),
            projectiles: world.projectiles().map(ProjectileSnapshot::from).collect(),
            central: CentralSnapshot::from(world.central()),
            ready: world.ready_players().copied().collect(),
            events,
        }
    }

    pub fn snapshots_built(&self) -> u64 {
        self.snapshots_built
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::WorldConfig;

    #[test]
    fn snapshot_contains_everything_and_drains_events() {
        let mut world = World::new(WorldConfig::default(), 2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        world.add_player(a, "alice".into());
        world.add_player(b, "bob".into());
        world.mark_ready(a);
        world.step(1.0 / 60.0, 16);

        let mut builder = SnapshotBuilder::new();
        let snap = builder.build(&mut world);
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.timestamp_ms, 16);
        assert_eq!(snap.phase, MatchPhase::Waiting);
        assert_eq!(snap.players.len(), 2);
        assert_eq!(snap.ready, vec![a]);
        assert_eq!(snap.central.health, snap.central.max_health);

        world.mark_ready(b);
        let snap = builder.build(&mut world);
        assert_eq!(snap.phase, MatchPhase::Running);
        assert!(snap.ready.is_empty());
        assert_eq!(snap.events, vec![GameEvent::MatchReset]);

        let snap = builder.build(&mut world);
        assert!(snap.events.is_empty());
        assert_eq!(builder.snapshots_built(), 3);
    }

    #[test]
    fn snapshot_serializes_phase_in_snake_case() {
        let mut world = World::new(WorldConfig::default(), 2);
        let snap = SnapshotBuilder::new().build(&mut world);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["phase"], "waiting");
        assert_eq!(json["central"]["size"], 120.0);
    }
}

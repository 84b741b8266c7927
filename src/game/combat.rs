//! Combat system - targeting, cooldowns, damage and projectiles

use std::collections::BTreeMap;

use tracing::debug;

use super::entities::{Building, CentralStructure, Enemy, GameEvent, Projectile};
use super::physics::PhysicsSystem;
use super::tuning::{TowerStats, WorldConfig};

/// What an enemy has chosen to attack
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetKind {
    Central,
    Building(u64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub kind: TargetKind,
    pub x: f32,
    pub y: f32,
    pub half_size: f32,
    pub distance: f32,
}

/// Combat system for targeting and damage resolution
pub struct CombatSystem;

impl CombatSystem {
    /// Whether an attacker whose last attack was at `last_ms` may attack at `now_ms`
    pub fn cooldown_ready(last_ms: Option<u64>, now_ms: u64, cooldown_ms: u64) -> bool {
        match last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= cooldown_ms,
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }

    /// Closest live attackable target for an enemy at (x, y).
    ///
    /// The central structure is evaluated first and only a strictly closer
    /// building replaces it, so an exact tie goes to the central structure.
    /// Buildings tie-break by ascending id.
    pub fn nearest_target(
        x: f32,
        y: f32,
        central: &CentralStructure,
        buildings: &BTreeMap<u64, Building>,
        building_half_size: f32,
    ) -> Option<Target> {
        let mut best: Option<Target> = None;

        if !central.is_destroyed() {
            best = Some(Target {
                kind: TargetKind::Central,
                x: central.x,
                y: central.y,
                half_size: central.half_size(),
                distance: PhysicsSystem::distance(x, y, central.x, central.y),
            });
        }

        for building in buildings.values().filter(|b| b.health > 0.0) {
            let distance = PhysicsSystem::distance(x, y, building.x, building.y);
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(Target {
                    kind: TargetKind::Building(building.id),
                    x: building.x,
                    y: building.y,
                    half_size: building_half_size,
                    distance,
                });
            }
        }

        best
    }

    /// Enemy pass: pick a target, attack it when in reach, otherwise march on it.
    pub fn update_enemies(
        enemies: &mut BTreeMap<u64, Enemy>,
        buildings: &mut BTreeMap<u64, Building>,
        central: &mut CentralStructure,
        config: &WorldConfig,
        now_ms: u64,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) {
        let building_half = config.building_size / 2.0;
        let mut dead_enemies = Vec::new();

        for enemy in enemies.values_mut() {
            if enemy.is_dead() {
                dead_enemies.push(enemy.id);
                continue;
            }

            let Some(target) =
                Self::nearest_target(enemy.x, enemy.y, central, buildings, building_half)
            else {
                continue;
            };

            if target.distance <= config.enemy_attack_range + target.half_size {
                if !Self::cooldown_ready(
                    enemy.last_attack_ms,
                    now_ms,
                    config.enemy_attack_cooldown_ms,
                ) {
                    continue;
                }

                match target.kind {
                    TargetKind::Central => {
                        let (health, _) = Self::apply_damage(central.health, config.enemy_damage);
                        central.health = health;
                    }
                    TargetKind::Building(id) => {
                        if let Some(building) = buildings.get_mut(&id) {
                            let (health, _) =
                                Self::apply_damage(building.health, config.enemy_damage);
                            building.health = health;
                        }
                    }
                }
                enemy.last_attack_ms = Some(now_ms);
            } else {
                let (x, y) =
                    PhysicsSystem::step_toward(enemy.x, enemy.y, target.x, target.y, enemy.speed * dt);
                enemy.x = x;
                enemy.y = y;
            }
        }

        for id in dead_enemies {
            if let Some(enemy) = enemies.remove(&id) {
                events.push(GameEvent::EnemyKilled {
                    enemy_id: enemy.id,
                    x: enemy.x,
                    y: enemy.y,
                });
            }
        }

        let destroyed: Vec<u64> = buildings
            .values()
            .filter(|b| b.health <= 0.0)
            .map(|b| b.id)
            .collect();
        for id in destroyed {
            if let Some(building) = buildings.remove(&id) {
                debug!(building_id = id, owner_id = %building.owner_id, "Building destroyed");
                events.push(GameEvent::BuildingDestroyed {
                    building_id: id,
                    owner_id: building.owner_id,
                });
            }
        }
    }

    /// Building pass: each building fires at the closest enemy in range once
    /// its cooldown allows. The projectile aims at where the enemy is now.
    pub fn update_buildings(
        buildings: &mut BTreeMap<u64, Building>,
        enemies: &BTreeMap<u64, Enemy>,
        projectiles: &mut BTreeMap<u64, Projectile>,
        next_projectile_id: &mut u64,
        now_ms: u64,
        events: &mut Vec<GameEvent>,
    ) {
        for building in buildings.values_mut() {
            let stats = TowerStats::for_type(building.building_type);
            if !Self::cooldown_ready(building.last_shot_ms, now_ms, stats.cooldown_ms) {
                continue;
            }

            let nearest = enemies
                .values()
                .filter(|e| !e.is_dead())
                .map(|e| (e, PhysicsSystem::distance(building.x, building.y, e.x, e.y)))
                .filter(|(_, d)| *d <= stats.attack_range)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let Some((enemy, _)) = nearest else {
                continue;
            };

            let id = *next_projectile_id;
            *next_projectile_id += 1;
            projectiles.insert(
                id,
                Projectile {
                    id,
                    x: building.x,
                    y: building.y,
                    target_x: enemy.x,
                    target_y: enemy.y,
                    speed: stats.projectile_speed,
                    damage: stats.projectile_damage,
                    source_building_id: building.id,
                },
            );
            building.last_shot_ms = Some(now_ms);

            events.push(GameEvent::ShotFired {
                building_id: building.id,
                projectile_id: id,
                target_x: enemy.x,
                target_y: enemy.y,
            });
        }
    }

    /// Projectile pass: fly toward the fixed target point and detonate there,
    /// damaging every live enemy within hit radius of the impact point.
    pub fn update_projectiles(
        projectiles: &mut BTreeMap<u64, Projectile>,
        enemies: &mut BTreeMap<u64, Enemy>,
        config: &WorldConfig,
        dt: f32,
    ) {
        let mut spent = Vec::new();

        for projectile in projectiles.values_mut() {
            let (x, y) = PhysicsSystem::step_toward(
                projectile.x,
                projectile.y,
                projectile.target_x,
                projectile.target_y,
                projectile.speed * dt,
            );
            projectile.x = x;
            projectile.y = y;

            let remaining =
                PhysicsSystem::distance(x, y, projectile.target_x, projectile.target_y);
            if remaining > config.projectile_impact_distance {
                continue;
            }

            for enemy in enemies.values_mut().filter(|e| !e.is_dead()) {
                if PhysicsSystem::distance(x, y, enemy.x, enemy.y) <= config.enemy_hit_radius {
                    let (health, _) = Self::apply_damage(enemy.health, projectile.damage);
                    enemy.health = health;
                }
            }
            spent.push(projectile.id);
        }

        for id in spent {
            projectiles.remove(&id);
        }
    }

    /// Remove enemies whose health has run out
    pub fn cull_dead_enemies(enemies: &mut BTreeMap<u64, Enemy>, events: &mut Vec<GameEvent>) {
        enemies.retain(|_, enemy| {
            if enemy.is_dead() {
                events.push(GameEvent::EnemyKilled {
                    enemy_id: enemy.id,
                    x: enemy.x,
                    y: enemy.y,
                });
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::BuildingType;
    use uuid::Uuid;

    fn central_at(x: f32, y: f32) -> CentralStructure {
        CentralStructure {
            x,
            y,
            health: 1000.0,
            max_health: 1000.0,
            size: 120.0,
        }
    }

    fn enemy(id: u64, x: f32, y: f32) -> Enemy {
        Enemy {
            id,
            x,
            y,
            health: 100.0,
            max_health: 100.0,
            speed: 60.0,
            last_attack_ms: None,
        }
    }

    fn tower(id: u64, x: f32, y: f32) -> Building {
        Building {
            id,
            x,
            y,
            building_type: BuildingType::ArrowTower,
            health: 200.0,
            max_health: 200.0,
            owner_id: Uuid::nil(),
            last_shot_ms: None,
        }
    }

    #[test]
    fn damage_never_goes_negative() {
        assert_eq!(CombatSystem::apply_damage(10.0, 25.0), (0.0, true));
        assert_eq!(CombatSystem::apply_damage(30.0, 25.0), (5.0, false));
    }

    #[test]
    fn cooldown_gating() {
        assert!(CombatSystem::cooldown_ready(None, 0, 1000));
        assert!(!CombatSystem::cooldown_ready(Some(500), 1499, 1000));
        assert!(CombatSystem::cooldown_ready(Some(500), 1500, 1000));
    }

    #[test]
    fn central_wins_exact_distance_tie() {
        let central = central_at(100.0, 0.0);
        let mut buildings = BTreeMap::new();
        buildings.insert(1, tower(1, -100.0, 0.0));

        let target = CombatSystem::nearest_target(0.0, 0.0, &central, &buildings, 20.0).unwrap();
        assert_eq!(target.kind, TargetKind::Central);

        buildings.insert(2, tower(2, -99.0, 0.0));
        let target = CombatSystem::nearest_target(0.0, 0.0, &central, &buildings, 20.0).unwrap();
        assert_eq!(target.kind, TargetKind::Building(2));
    }

    #[test]
    fn destroyed_central_is_not_a_target() {
        let mut central = central_at(0.0, 0.0);
        central.health = 0.0;
        let buildings = BTreeMap::new();
        assert!(CombatSystem::nearest_target(5.0, 5.0, &central, &buildings, 20.0).is_none());
    }

    #[test]
    fn enemy_marches_when_out_of_reach() {
        let config = WorldConfig::default();
        let mut central = central_at(500.0, 0.0);
        let mut enemies = BTreeMap::new();
        enemies.insert(1, enemy(1, 0.0, 0.0));
        let mut buildings = BTreeMap::new();
        let mut events = Vec::new();

        CombatSystem::update_enemies(
            &mut enemies,
            &mut buildings,
            &mut central,
            &config,
            0,
            1.0,
            &mut events,
        );

        let moved = &enemies[&1];
        assert!((moved.x - 60.0).abs() < 1e-3);
        assert_eq!(moved.y, 0.0);
        assert_eq!(central.health, 1000.0);
    }

    #[test]
    fn enemy_destroys_building_and_it_is_removed() {
        let config = WorldConfig::default();
        let mut central = central_at(1000.0, 1000.0);
        let mut enemies = BTreeMap::new();
        enemies.insert(1, enemy(1, 0.0, 0.0));
        let mut buildings = BTreeMap::new();
        let mut weak = tower(7, 10.0, 0.0);
        weak.health = 15.0;
        buildings.insert(7, weak);
        let mut events = Vec::new();

        CombatSystem::update_enemies(
            &mut enemies,
            &mut buildings,
            &mut central,
            &config,
            0,
            0.016,
            &mut events,
        );

        assert!(buildings.is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::BuildingDestroyed { building_id: 7, .. }
        )));
    }

    #[test]
    fn tower_engages_only_within_range() {
        let mut buildings = BTreeMap::new();
        buildings.insert(1, tower(1, 0.0, 0.0));
        let mut enemies = BTreeMap::new();
        enemies.insert(1, enemy(1, 151.0, 0.0));
        let mut projectiles = BTreeMap::new();
        let mut next_id = 1;
        let mut events = Vec::new();

        CombatSystem::update_buildings(
            &mut buildings,
            &enemies,
            &mut projectiles,
            &mut next_id,
            0,
            &mut events,
        );
        assert!(projectiles.is_empty());

        enemies.get_mut(&1).unwrap().x = 149.0;
        CombatSystem::update_buildings(
            &mut buildings,
            &enemies,
            &mut projectiles,
            &mut next_id,
            16,
            &mut events,
        );
        assert_eq!(projectiles.len(), 1);
        let shot = &projectiles[&1];
        assert_eq!((shot.target_x, shot.target_y), (149.0, 0.0));
        assert_eq!(shot.source_building_id, 1);

        // Cooldown holds the second shot
        CombatSystem::update_buildings(
            &mut buildings,
            &enemies,
            &mut projectiles,
            &mut next_id,
            32,
            &mut events,
        );
        assert_eq!(projectiles.len(), 1);
    }

    #[test]
    fn projectile_hits_whatever_is_at_the_fixed_point() {
        let config = WorldConfig::default();
        let mut projectiles = BTreeMap::new();
        projectiles.insert(
            1,
            Projectile {
                id: 1,
                x: 0.0,
                y: 0.0,
                target_x: 100.0,
                target_y: 0.0,
                speed: 400.0,
                damage: 25.0,
                source_building_id: 1,
            },
        );
        let mut enemies = BTreeMap::new();
        // The aimed-at enemy moved away; two others now stand on the point.
        enemies.insert(1, enemy(1, 300.0, 300.0));
        enemies.insert(2, enemy(2, 105.0, 0.0));
        enemies.insert(3, enemy(3, 100.0, 8.0));

        CombatSystem::update_projectiles(&mut projectiles, &mut enemies, &config, 0.1);
        assert_eq!(projectiles.len(), 1);
        assert_eq!(enemies[&2].health, 100.0);

        CombatSystem::update_projectiles(&mut projectiles, &mut enemies, &config, 0.2);
        assert!(projectiles.is_empty());
        assert_eq!(enemies[&1].health, 100.0);
        assert_eq!(enemies[&2].health, 75.0);
        assert_eq!(enemies[&3].health, 75.0);
    }

    #[test]
    fn dead_enemies_are_culled_with_events() {
        let mut enemies = BTreeMap::new();
        let mut dead = enemy(4, 1.0, 2.0);
        dead.health = 0.0;
        enemies.insert(4, dead);
        enemies.insert(5, enemy(5, 0.0, 0.0));
        let mut events = Vec::new();

        CombatSystem::cull_dead_enemies(&mut enemies, &mut events);
        assert_eq!(enemies.len(), 1);
        assert_eq!(
            events,
            vec![GameEvent::EnemyKilled {
                enemy_id: 4,
                x: 1.0,
                y: 2.0
            }]
        );
    }
}

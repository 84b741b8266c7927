//! Match task and the authoritative tick loop

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{Timer, MAX_TICK_DELTA, TICK_DURATION_MICROS};
use crate::ws::protocol::ServerMsg;

use super::entities::{BuildingType, MatchPhase, MoveInput};
use super::snapshot::{BuildingSnapshot, PlayerSnapshot, SnapshotBuilder};
use super::tuning::WorldConfig;
use super::world::{PlacementRejection, World};

/// Commands funnelled from connections into the match task
#[derive(Debug)]
pub enum MatchCommand {
    Join {
        player_id: Uuid,
        display_name: String,
        reply: oneshot::Sender<PlayerSnapshot>,
    },
    Leave {
        player_id: Uuid,
    },
    Input {
        player_id: Uuid,
        input: MoveInput,
    },
    PlaceBuilding {
        player_id: Uuid,
        x: f32,
        y: f32,
        building_type: BuildingType,
        reply: oneshot::Sender<Result<BuildingSnapshot, PlacementRejection>>,
    },
    ReadyUp {
        player_id: Uuid,
        reply: oneshot::Sender<bool>,
    },
}

/// Read-only status published after every tick and command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchStatus {
    pub phase: MatchPhase,
    pub player_count: usize,
    pub tick: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("match task is no longer running")]
    Closed,
}

/// Handle to the running match
#[derive(Clone)]
pub struct MatchHandle {
    command_tx: mpsc::Sender<MatchCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    status_rx: watch::Receiver<MatchStatus>,
    world_size: (f32, f32),
}

impl MatchHandle {
    async fn send(&self, command: MatchCommand) -> Result<(), MatchError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| MatchError::Closed)
    }

    pub async fn join(
        &self,
        player_id: Uuid,
        display_name: String,
    ) -> Result<PlayerSnapshot, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Join {
            player_id,
            display_name,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MatchError::Closed)
    }

    pub async fn leave(&self, player_id: Uuid) -> Result<(), MatchError> {
        self.send(MatchCommand::Leave { player_id }).await
    }

    pub async fn input(&self, player_id: Uuid, input: MoveInput) -> Result<(), MatchError> {
        self.send(MatchCommand::Input { player_id, input }).await
    }

    pub async fn place_building(
        &self,
        player_id: Uuid,
        x: f32,
        y: f32,
        building_type: BuildingType,
    ) -> Result<Result<BuildingSnapshot, PlacementRejection>, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::PlaceBuilding {
            player_id,
            x,
            y,
            building_type,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MatchError::Closed)
    }

    pub async fn ready_up(&self, player_id: Uuid) -> Result<bool, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::ReadyUp { player_id, reply }).await?;
        rx.await.map_err(|_| MatchError::Closed)
    }

    /// Subscribe to per-tick snapshots
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }

    pub fn status(&self) -> MatchStatus {
        *self.status_rx.borrow()
    }

    pub fn player_count(&self) -> usize {
        self.status().player_count
    }

    pub fn phase(&self) -> MatchPhase {
        self.status().phase
    }

    /// World (width, height)
    pub fn world_size(&self) -> (f32, f32) {
        self.world_size
    }
}

/// The authoritative game match. Owns the world; every mutation goes through
/// this task, either from a command or from the tick.
pub struct GameMatch {
    world: World,
    command_rx: mpsc::Receiver<MatchCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    status_tx: watch::Sender<MatchStatus>,
    snapshot_builder: SnapshotBuilder,
    clock: Timer,
    last_tick_ms: u64,
}

impl GameMatch {
    /// Create a new match
    pub fn new(config: WorldConfig, seed: u64) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let world = World::new(config, seed);
        let (status_tx, status_rx) = watch::channel(Self::status_of(&world));

        let handle = MatchHandle {
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            status_rx,
            world_size: (world.config().width, world.config().height),
        };

        let game_match = Self {
            world,
            command_rx,
            snapshot_tx,
            status_tx,
            snapshot_builder: SnapshotBuilder::new(),
            clock: Timer::new(),
            last_tick_ms: 0,
        };

        (game_match, handle)
    }

    fn status_of(world: &World) -> MatchStatus {
        MatchStatus {
            phase: world.phase(),
            player_count: world.player_count(),
            tick: world.tick(),
        }
    }

    /// Run the authoritative tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            width = self.world.config().width,
            height = self.world.config().height,
            "Match loop started"
        );

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.run_tick();
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
            }
        }

        info!("Match loop stopped");
    }

    /// Apply a single command immediately. Status is published before any
    /// reply so callers observe it once the reply arrives.
    fn handle_command(&mut self, command: MatchCommand) {
        match command {
            MatchCommand::Join {
                player_id,
                display_name,
                reply,
            } => {
                let player = self.world.add_player(player_id, display_name);
                self.publish_status();
                let _ = reply.send(PlayerSnapshot::from(&player));
            }
            MatchCommand::Leave { player_id } => {
                self.world.remove_player(player_id);
                self.publish_status();
            }
            MatchCommand::Input { player_id, input } => {
                self.world.set_player_input(player_id, input);
            }
            MatchCommand::PlaceBuilding {
                player_id,
                x,
                y,
                building_type,
                reply,
            } => {
                let result = self
                    .world
                    .place_building(x, y, building_type, player_id)
                    .map(|b| BuildingSnapshot::from(&b));
                self.publish_status();
                let _ = reply.send(result);
            }
            MatchCommand::ReadyUp { player_id, reply } => {
                let started = self.world.mark_ready(player_id);
                if started {
                    info!(player_id = %player_id, "Last player ready, match reset");
                }
                self.publish_status();
                let _ = reply.send(started);
            }
        }
    }

    /// Step the world and broadcast the snapshot
    fn run_tick(&mut self) {
        let work = Timer::new();

        let now_ms = self.clock.elapsed_ms();
        let dt = (now_ms.saturating_sub(self.last_tick_ms) as f32 / 1000.0).min(MAX_TICK_DELTA);
        self.last_tick_ms = now_ms;

        self.world.step(dt, now_ms);
        let snapshot = self.snapshot_builder.build(&mut self.world);

        // Keep simulating with nobody connected, just don't broadcast
        if self.world.player_count() > 0 {
            let _ = self.snapshot_tx.send(ServerMsg::Snapshot(snapshot));
        }

        self.publish_status();

        let elapsed = work.elapsed_micros();
        if elapsed > TICK_DURATION_MICROS {
            warn!(
                tick = self.world.tick(),
                elapsed_micros = elapsed,
                budget_micros = TICK_DURATION_MICROS,
                "Tick exceeded budget"
            );
        } else if self.world.tick() % 3600 == 0 {
            debug!(
                tick = self.world.tick(),
                snapshots = self.snapshot_builder.snapshots_built(),
                players = self.world.player_count(),
                "Match heartbeat"
            );
        }
    }

    fn publish_status(&self) {
        let status = Self::status_of(&self.world);
        self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }
}

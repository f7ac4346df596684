//! Client implementation.
//!
//! The client maintains:
//! - A predicted world that runs ahead of the server
//! - Snapshot history for interpolation of confirmed projectiles
//! - Reconciliation of every accepted snapshot
//!
//! With prediction disabled the world simply mirrors the newest snapshot and
//! rendering lerps between the two newest snapshots.

use predict_shared::{
    collision::CollisionMap,
    config::{MatchPolicy, PredictionConfig},
    event::ImpactEvent,
    ids::EntityId,
    log::LogHandle,
    math::Vec2,
    snapshot::{decode_snapshot, ProjectileSnapshot},
};
use tracing::{debug, info, warn};

use crate::{
    interp::SnapshotBuffer,
    projectile::FireParams,
    reconcile::{reconcile, ReconcileReport},
    world::{GameWorld, StepReport},
};

/// Predicting projectile client.
pub struct PredictionClient {
    world: GameWorld,
    snaps: SnapshotBuffer,
    policy: MatchPolicy,
    predict: bool,
    log: LogHandle,
}

impl PredictionClient {
    pub fn new(cfg: &PredictionConfig, collision: Box<dyn CollisionMap>, log: LogHandle) -> Self {
        Self {
            world: GameWorld::new(cfg, collision, log.clone()),
            snaps: SnapshotBuffer::new(cfg.snapshot_history),
            policy: cfg.matching,
            predict: true,
            log,
        }
    }

    pub fn prediction_enabled(&self) -> bool {
        self.predict
    }

    /// Toggles local prediction. Takes effect with the next snapshot.
    pub fn set_prediction(&mut self, enabled: bool) {
        if self.predict != enabled {
            self.log
                .in_scope(|| info!(enabled, "client prediction toggled"));
        }
        self.predict = enabled;
    }

    /// Fires a predicted projectile at the current tick. `None` when
    /// prediction is disabled; the server's projectile arrives by snapshot.
    pub fn fire(&mut self, params: FireParams) -> Option<EntityId> {
        self.predict.then(|| self.world.fire(params))
    }

    /// Advances the predicted world one tick. Without prediction only the
    /// clock moves; mirrored projectiles are not simulated.
    pub fn tick(&mut self) -> StepReport {
        if self.predict {
            return self.world.step();
        }
        let tick = self.world.game_tick().saturating_add(1);
        self.world.set_tick(tick);
        StepReport {
            tick,
            ..StepReport::default()
        }
    }

    /// Accepts a decoded snapshot. Returns `None` when the snapshot was stale.
    pub fn on_snapshot(&mut self, snap: ProjectileSnapshot) -> Option<ReconcileReport> {
        if !self.snaps.push(snap.clone()) {
            return None;
        }

        if self.world.game_tick() < snap.tick {
            let behind = snap.tick - self.world.game_tick();
            self.log.in_scope(|| {
                debug!(
                    tick = self.world.game_tick(),
                    server_tick = snap.tick,
                    behind,
                    "client clock behind server, catching up"
                )
            });
            // Predictions are stepped through every skipped tick so walls in
            // between still stop them.
            while self.world.game_tick() < snap.tick {
                self.tick();
            }
        }

        if self.predict {
            Some(reconcile(&mut self.world, &snap, &self.policy))
        } else {
            Some(self.mirror(&snap))
        }
    }

    /// Decodes and accepts a wire snapshot. Undecodable input is logged and
    /// dropped.
    pub fn on_snapshot_bytes(&mut self, bytes: &[u8]) -> Option<ReconcileReport> {
        match decode_snapshot(bytes) {
            Ok(snap) => self.on_snapshot(snap),
            Err(e) => {
                self.log.in_scope(|| {
                    warn!(error = %format!("{e:#}"), len = bytes.len(), "dropping malformed snapshot")
                });
                None
            }
        }
    }

    fn mirror(&mut self, snap: &ProjectileSnapshot) -> ReconcileReport {
        self.world.entities.clear();
        self.world.retired.clear();
        self.world.set_tick(snap.tick);
        for item in &snap.items {
            self.world.spawn_confirmed(item.id, &item.record, snap.tick);
        }
        ReconcileReport {
            tick: snap.tick,
            confirmed: snap.items.len(),
            spawned: snap.items.len(),
            ..ReconcileReport::default()
        }
    }

    /// Positions to draw this frame, `intra_tick` into the next tick.
    ///
    /// Predicted projectiles are evaluated on their trajectory. Mirrored
    /// ones are lerped between the two newest snapshots, or drawn at their
    /// newest record when only one snapshot has them.
    pub fn render_positions(&self, intra_tick: f32) -> Vec<(EntityId, Vec2)> {
        let ctx = self.world.context();
        self.world
            .entities()
            .iter()
            .map(|e| {
                let confirmed = e.server_id.filter(|_| !self.predict).and_then(|sid| {
                    self.snaps.interp_record(sid, intra_tick).or_else(|| {
                        self.snaps.latest_record(sid).map(|record| record.position())
                    })
                });
                let pos = confirmed
                    .unwrap_or_else(|| e.projectile.render_position(&ctx, intra_tick));
                (e.id, pos)
            })
            .collect()
    }

    /// Impacts predicted since the last call.
    pub fn drain_impacts(&mut self) -> Vec<ImpactEvent> {
        self.world.drain_impacts()
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut GameWorld {
        &mut self.world
    }

    pub fn snapshots(&self) -> &SnapshotBuffer {
        &self.snaps
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }
}

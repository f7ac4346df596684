//! Game world.
//!
//! Owns every live projectile and the collaborators they tick against: the
//! tuning table, the collision map and the effect bus. The same type runs the
//! authoritative simulation and the client's prediction.
//!
//! Determinism notes:
//! - `step` advances exactly one tick; projectiles never interact, so the
//!   iteration order does not affect results.
//! - Removal is a flag; removed projectiles are swept after every step and
//!   kept briefly in a retired list so late snapshots can still find them.

use predict_shared::{
    collision::CollisionMap,
    config::PredictionConfig,
    event::{EventBus, ImpactEvent},
    ids::{EntityId, Tick},
    log::LogHandle,
    snapshot::{ProjectileRecord, ProjectileSnapshot, SnapshotItem},
    tuning::TuningTable,
};
use tracing::{debug, info};

use crate::projectile::{FireParams, Projectile, TickContext, TickOutcome};

/// Retired projectiles kept for late snapshot matching.
const RETIRED_CAPACITY: usize = 256;

/// A projectile tracked by the world.
#[derive(Debug, Clone)]
pub struct WorldEntity {
    /// Local id, stable for the entity's lifetime.
    pub id: EntityId,
    /// Server id once the server has confirmed this projectile.
    pub server_id: Option<EntityId>,
    pub projectile: Projectile,
}

/// Counters for one [`GameWorld::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub tick: Tick,
    pub bounced: usize,
    pub impacts: usize,
    pub expired: usize,
    pub clipped: usize,
    pub removed: usize,
}

pub struct GameWorld {
    tick: Tick,
    tick_hz: u32,
    tuning: TuningTable,
    collision: Box<dyn CollisionMap>,
    effects: EventBus,
    pub(crate) entities: Vec<WorldEntity>,
    pub(crate) retired: Vec<WorldEntity>,
    next_id: u64,
    log: LogHandle,
}

impl GameWorld {
    /// Creates an empty world at tick 0.
    pub fn new(cfg: &PredictionConfig, collision: Box<dyn CollisionMap>, log: LogHandle) -> Self {
        Self {
            tick: 0,
            tick_hz: cfg.tick_hz.max(1),
            tuning: cfg.tuning.clone(),
            collision,
            effects: EventBus::default(),
            entities: Vec::new(),
            retired: Vec::new(),
            next_id: 1,
            log,
        }
    }

    pub fn game_tick(&self) -> Tick {
        self.tick
    }

    pub fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    /// Moves the clock, e.g. to align prediction with the server.
    pub fn set_tick(&mut self, tick: Tick) {
        self.tick = tick;
    }

    pub fn tuning(&self) -> &TuningTable {
        &self.tuning
    }

    pub fn tuning_mut(&mut self) -> &mut TuningTable {
        &mut self.tuning
    }

    pub fn log(&self) -> &LogHandle {
        &self.log
    }

    /// Context at the current tick.
    pub fn context(&self) -> TickContext<'_> {
        self.context_at(self.tick)
    }

    /// Context at an arbitrary tick.
    pub fn context_at(&self, tick: Tick) -> TickContext<'_> {
        TickContext {
            tick,
            tick_hz: self.tick_hz,
            tuning: &self.tuning,
            collision: self.collision.as_ref(),
        }
    }

    pub(crate) fn insert(&mut self, server_id: Option<EntityId>, projectile: Projectile) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.push(WorldEntity {
            id,
            server_id,
            projectile,
        });
        id
    }

    /// Fires a projectile at the current tick.
    pub fn fire(&mut self, params: FireParams) -> EntityId {
        let log = self.log.clone();
        log.in_scope(|| {
            let projectile = Projectile::fire(&self.context(), params);
            self.insert(None, projectile)
        })
    }

    /// Adds a server-confirmed projectile observed at `observed_tick`.
    pub fn spawn_confirmed(
        &mut self,
        server_id: EntityId,
        record: &ProjectileRecord,
        observed_tick: Tick,
    ) -> EntityId {
        let log = self.log.clone();
        log.in_scope(|| {
            let projectile = Projectile::from_snapshot(&self.context_at(observed_tick), record);
            let id = self.insert(Some(server_id), projectile);
            debug!(?id, ?server_id, observed_tick, "confirmed projectile spawned");
            id
        })
    }

    /// Advances one tick and sweeps removed projectiles.
    pub fn step(&mut self) -> StepReport {
        let log = self.log.clone();
        log.in_scope(|| self.step_inner())
    }

    fn step_inner(&mut self) -> StepReport {
        self.tick = self.tick.saturating_add(1);
        let ctx = TickContext {
            tick: self.tick,
            tick_hz: self.tick_hz,
            tuning: &self.tuning,
            collision: self.collision.as_ref(),
        };

        let mut report = StepReport {
            tick: self.tick,
            ..StepReport::default()
        };
        for entity in &mut self.entities {
            match entity.projectile.tick(&ctx, &mut self.effects) {
                TickOutcome::Bounced => report.bounced += 1,
                TickOutcome::Impact => report.impacts += 1,
                TickOutcome::Expired => report.expired += 1,
                TickOutcome::Clipped => report.clipped += 1,
                TickOutcome::Flying | TickOutcome::Inactive => {}
            }
        }

        report.removed = self.sweep();
        if report.removed > 0 {
            debug!(
                tick = report.tick,
                removed = report.removed,
                live = self.entities.len(),
                "swept projectiles"
            );
        }
        report
    }

    /// Ticks one projectile from `from + 1` up to the current tick. Effects
    /// are discarded; the server reports its own impacts.
    pub(crate) fn catch_up(&mut self, id: EntityId, from: Tick) {
        let Some(entity) = self.entities.iter_mut().find(|e| e.id == id) else {
            return;
        };
        let mut discarded: Vec<ImpactEvent> = Vec::new();
        let mut tick = from;
        while tick < self.tick && !entity.projectile.is_removed() {
            tick += 1;
            let ctx = TickContext {
                tick,
                tick_hz: self.tick_hz,
                tuning: &self.tuning,
                collision: self.collision.as_ref(),
            };
            entity.projectile.tick(&ctx, &mut discarded);
        }
    }

    /// Moves removed projectiles to the retired list. Returns how many moved.
    pub fn sweep(&mut self) -> usize {
        let before = self.entities.len();
        let (removed, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entities)
            .into_iter()
            .partition(|e| e.projectile.is_removed());
        self.entities = live;
        self.retired.extend(removed);
        if self.retired.len() > RETIRED_CAPACITY {
            let excess = self.retired.len() - RETIRED_CAPACITY;
            self.retired.drain(..excess);
        }
        before - self.entities.len()
    }

    /// Exports every live projectile as seen at the current tick.
    pub fn snapshot(&self) -> ProjectileSnapshot {
        let ctx = self.context();
        ProjectileSnapshot {
            tick: self.tick,
            items: self
                .entities
                .iter()
                .map(|e| SnapshotItem {
                    id: e.id,
                    record: e.projectile.to_record(&ctx),
                })
                .collect(),
        }
    }

    /// Drains impacts emitted since the last call.
    pub fn drain_impacts(&mut self) -> Vec<ImpactEvent> {
        self.effects.drain::<ImpactEvent>()
    }

    pub fn get(&self, id: EntityId) -> Option<&WorldEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut WorldEntity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    pub fn find_by_server_id(&self, server_id: EntityId) -> Option<&WorldEntity> {
        self.entities
            .iter()
            .find(|e| e.server_id == Some(server_id))
    }

    pub fn entities(&self) -> &[WorldEntity] {
        &self.entities
    }

    pub fn retired(&self) -> &[WorldEntity] {
        &self.retired
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drops every projectile and pending effect (end of match, reconnect).
    pub fn clear(&mut self) {
        let log = self.log.clone();
        log.in_scope(|| {
            info!(
                live = self.entities.len(),
                tick = self.tick,
                "clearing world"
            );
        });
        self.entities.clear();
        self.retired.clear();
        self.effects.clear();
    }
}

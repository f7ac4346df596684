//! Reconciliation of predicted projectiles against server snapshots.
//!
//! A snapshot lists every projectile the server considers alive. Each record
//! is paired with at most one local projectile:
//! - tracked by server id: authoritative fields are adopted;
//! - otherwise an unclaimed prediction that `matches` is claimed;
//! - otherwise the confirmed projectile is spawned.
//!
//! Projectiles that died locally stay in the world's retired list for a
//! while, so a record for a projectile the client already saw explode is
//! suppressed instead of respawned.
//!
//! Legacy records carry no extra block. For a paired projectile the local
//! bounces, tune zone, layer and number stand in for it; only a spawned
//! projectile falls back to the defaults.

use std::collections::BTreeSet;

use predict_shared::{
    config::MatchPolicy,
    ids::{ticks_to_secs, EntityId, Tick},
    math::Vec2,
    snapshot::{ProjectileRecord, ProjectileSnapshot},
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    projectile::Projectile,
    world::{GameWorld, WorldEntity},
};

/// What one [`reconcile`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub tick: Tick,
    /// Records in the snapshot.
    pub confirmed: usize,
    /// Predictions paired with a server id for the first time.
    pub claimed: usize,
    /// Already paired projectiles refreshed from their record.
    pub adopted: usize,
    /// Paired projectiles whose trajectory was swapped for the server's.
    pub replaced: usize,
    /// Records for projectiles that already died locally.
    pub suppressed: usize,
    /// Records with no local counterpart.
    pub spawned: usize,
    /// Paired projectiles the server no longer reports.
    pub dropped: usize,
    /// Predictions the server never confirmed.
    pub discarded: usize,
}

/// Applies `snapshot` to `world`.
pub fn reconcile(
    world: &mut GameWorld,
    snapshot: &ProjectileSnapshot,
    policy: &MatchPolicy,
) -> ReconcileReport {
    let log = world.log().clone();
    log.in_scope(|| reconcile_inner(world, snapshot, policy))
}

fn reconcile_inner(
    world: &mut GameWorld,
    snapshot: &ProjectileSnapshot,
    policy: &MatchPolicy,
) -> ReconcileReport {
    let at = snapshot.tick;
    let mut report = ReconcileReport {
        tick: at,
        confirmed: snapshot.items.len(),
        ..ReconcileReport::default()
    };

    for item in &snapshot.items {
        let server_id = item.id;
        let observed = item.record.position();

        if let Some(idx) = world
            .entities
            .iter()
            .position(|e| e.server_id == Some(server_id))
        {
            let local = &world.entities[idx].projectile;
            let proj = confirmed_copy(world, &item.record, at, Some(local));
            world.entities[idx].projectile.adopt_authority(&proj);
            report.adopted += 1;
            correct(world, idx, proj, observed, at, policy, &mut report);
            continue;
        }

        if world.retired.iter().any(|e| e.server_id == Some(server_id)) {
            trace!(?server_id, "record for locally dead projectile");
            report.suppressed += 1;
            continue;
        }

        let proj = confirmed_copy(world, &item.record, at, None);
        if let Some(idx) = best_match(&world.entities, &proj, at, policy) {
            let local = &world.entities[idx].projectile;
            let proj = confirmed_copy(world, &item.record, at, Some(local));
            let entity = &mut world.entities[idx];
            entity.server_id = Some(server_id);
            entity.projectile.adopt_authority(&proj);
            debug!(local = ?entity.id, ?server_id, "prediction confirmed");
            report.claimed += 1;
            correct(world, idx, proj, observed, at, policy, &mut report);
            continue;
        }

        if let Some(idx) = best_match(&world.retired, &proj, at, policy) {
            let entity = &mut world.retired[idx];
            entity.server_id = Some(server_id);
            debug!(local = ?entity.id, ?server_id, "confirmed projectile already dead locally");
            report.suppressed += 1;
            continue;
        }

        let id = world.insert(Some(server_id), proj);
        world.catch_up(id, at);
        debug!(local = ?id, ?server_id, "unpredicted projectile spawned");
        report.spawned += 1;
    }

    let present: BTreeSet<EntityId> = snapshot.items.iter().map(|item| item.id).collect();
    let horizon = at.saturating_sub(policy.tick_window.max(0));
    for entity in &mut world.entities {
        match entity.server_id {
            Some(server_id) if !present.contains(&server_id) => {
                entity.projectile.mark_removed();
                report.dropped += 1;
            }
            None if entity.projectile.start_tick() < horizon => {
                entity.projectile.mark_removed();
                report.discarded += 1;
            }
            _ => {}
        }
    }
    world.sweep();
    world.retired.retain(|e| match e.server_id {
        Some(server_id) => present.contains(&server_id),
        None => e.projectile.start_tick() >= horizon,
    });

    if report.dropped + report.discarded + report.replaced > 0 {
        debug!(
            tick = at,
            dropped = report.dropped,
            discarded = report.discarded,
            replaced = report.replaced,
            "reconciled with corrections"
        );
    }
    report
}

/// Projectile described by `record` at tick `at`. A legacy record takes its
/// missing extra block from `paired` as it was at `at`.
fn confirmed_copy(
    world: &GameWorld,
    record: &ProjectileRecord,
    at: Tick,
    paired: Option<&Projectile>,
) -> Projectile {
    let mut record = *record;
    if record.extra.is_none() {
        record.extra = paired.map(|local| local.extra_at(at));
    }
    Projectile::from_snapshot(&world.context_at(at), &record)
}

/// Unpaired candidate that matches `confirmed` as of `at`, closest start
/// tick first.
fn best_match(
    candidates: &[WorldEntity],
    confirmed: &Projectile,
    at: Tick,
    policy: &MatchPolicy,
) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, e)| e.server_id.is_none() && e.projectile.matches_at(confirmed, at, policy))
        .min_by_key(|(_, e)| e.projectile.start_tick().abs_diff(confirmed.start_tick()))
        .map(|(idx, _)| idx)
}

/// Swaps in the confirmed trajectory when the paired projectile was
/// somewhere else at the snapshot tick.
fn correct(
    world: &mut GameWorld,
    idx: usize,
    confirmed: Projectile,
    observed: Vec2,
    at: Tick,
    policy: &MatchPolicy,
    report: &mut ReconcileReport,
) {
    let entity = &world.entities[idx];
    let local = &entity.projectile;
    // A bounce after the snapshot tick makes the old position unknowable.
    if local.launch_tick() > at {
        return;
    }
    let elapsed = ticks_to_secs(at.saturating_sub(local.launch_tick()), world.tick_hz());
    let error = local.position_at(elapsed, world.tuning()).distance(observed);
    if error <= policy.correction_distance {
        return;
    }

    let id = entity.id;
    debug!(local = ?id, error, "replacing mispredicted trajectory");
    world.entities[idx].projectile = confirmed;
    world.catch_up(id, at);
    report.replaced += 1;
}

//! Interpolation.
//!
//! The server sends discrete snapshots at tick boundaries.
//! The client renders at its own rate: predicted projectiles are evaluated
//! at a fractional tick, confirmed records are lerped between snapshots.

use std::{collections::VecDeque, time::Duration};

use predict_shared::{
    ids::EntityId,
    math::Vec2,
    snapshot::{ProjectileRecord, ProjectileSnapshot},
};
use tracing::trace;

/// Buffered snapshot history for interpolation.
#[derive(Debug, Default)]
pub struct SnapshotBuffer {
    history: VecDeque<ProjectileSnapshot>,
    max: usize,
}

impl SnapshotBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            history: VecDeque::new(),
            max: max.max(1),
        }
    }

    /// Buffers `snap`. Snapshots not newer than the latest one are rejected.
    pub fn push(&mut self, snap: ProjectileSnapshot) -> bool {
        if let Some(last) = self.history.back() {
            if snap.tick <= last.tick {
                trace!(tick = snap.tick, latest = last.tick, "stale snapshot ignored");
                return false;
            }
        }
        self.history.push_back(snap);
        while self.history.len() > self.max {
            self.history.pop_front();
        }
        true
    }

    /// Returns the number of buffered snapshots.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if no snapshots are buffered.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn latest(&self) -> Option<&ProjectileSnapshot> {
        self.history.back()
    }

    /// Record for `id` in the newest snapshot.
    pub fn latest_record(&self, id: EntityId) -> Option<&ProjectileRecord> {
        self.latest().and_then(|snap| snap.find(id))
    }

    /// Gets an interpolated position for a server projectile.
    ///
    /// `alpha` should be in $[0,1]$ where 0 = older snapshot, 1 = newer.
    /// Projectiles missing from either of the two newest snapshots yield
    /// `None`.
    pub fn interp_record(&self, id: EntityId, alpha: f32) -> Option<Vec2> {
        if self.history.len() < 2 {
            return None;
        }
        let a = &self.history[self.history.len() - 2];
        let b = &self.history[self.history.len() - 1];

        let pa = a.find(id).map(ProjectileRecord::position);
        let pb = b.find(id).map(ProjectileRecord::position);
        match (pa, pb) {
            (Some(pa), Some(pb)) => Some(pa.lerp(pb, alpha)),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

/// Fraction of the current tick elapsed after `since_tick`, in `[0, 1]`.
pub fn intra_tick(since_tick: Duration, tick_hz: u32) -> f32 {
    let tick_secs = 1.0 / tick_hz.max(1) as f32;
    (since_tick.as_secs_f32() / tick_secs).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use predict_shared::snapshot::{RecordFlags, SnapshotItem};

    fn snap(tick: i32, x: f32) -> ProjectileSnapshot {
        let mut record = ProjectileRecord {
            weapon: 3,
            start_tick: 0,
            owner: 1,
            x: 0,
            y: 0,
            dir_x: 1_000_000,
            dir_y: 0,
            lifespan: -1,
            flags: RecordFlags::EXPLOSIVE,
            force: 0,
            sound_impact: -1,
            extra: None,
        };
        record.set_position(Vec2::new(x, 0.0));
        ProjectileSnapshot {
            tick,
            items: vec![SnapshotItem {
                id: EntityId(9),
                record,
            }],
        }
    }

    #[test]
    fn lerps_between_two_newest() {
        let mut buf = SnapshotBuffer::new(4);
        assert!(buf.push(snap(1, 0.0)));
        assert_eq!(buf.interp_record(EntityId(9), 0.5), None);
        assert!(buf.push(snap(2, 10.0)));
        assert!(buf.push(snap(3, 20.0)));

        assert_eq!(buf.interp_record(EntityId(9), 0.5), Some(Vec2::new(15.0, 0.0)));
        assert_eq!(buf.interp_record(EntityId(9), 2.0), Some(Vec2::new(20.0, 0.0)));
        assert_eq!(buf.interp_record(EntityId(1), 0.5), None);
        assert_eq!(buf.latest_record(EntityId(9)).unwrap().position(), Vec2::new(20.0, 0.0));
    }

    #[test]
    fn rejects_stale_and_bounds_history() {
        let mut buf = SnapshotBuffer::new(2);
        assert!(buf.push(snap(5, 0.0)));
        assert!(!buf.push(snap(5, 1.0)));
        assert!(!buf.push(snap(4, 1.0)));
        assert!(buf.push(snap(6, 1.0)));
        assert!(buf.push(snap(7, 2.0)));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.latest().unwrap().tick, 7);
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn intra_tick_is_clamped() {
        assert_eq!(intra_tick(Duration::ZERO, 50), 0.0);
        assert!((intra_tick(Duration::from_millis(10), 50) - 0.5).abs() < 1.0e-6);
        assert_eq!(intra_tick(Duration::from_millis(500), 50), 1.0);
        assert_eq!(intra_tick(Duration::from_millis(10), 0), 0.01);
    }
}

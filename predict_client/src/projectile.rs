//! Projectile trajectory.
//!
//! A projectile never stores its current position. Position is a closed-form
//! function of the launch origin, the unit launch direction, the tuning table
//! and the elapsed flight time, so re-simulating the same ticks after a
//! rollback reproduces the same positions bit for bit.
//!
//! Two ticks are tracked:
//! - `start_tick`: creation tick. Never changes; it is the projectile's
//!   identity for matching and the base of its lifespan.
//! - `launch_tick`: epoch of the current trajectory. Equal to `start_tick`
//!   until a bounce restarts the trajectory from the impact point.
//!
//! Earlier trajectory segments are remembered so a snapshot taken before a
//! local bounce can still be compared against the heading of that time.

use predict_shared::{
    collision::CollisionMap,
    config::MatchPolicy,
    event::{EffectSink, ImpactEvent},
    ids::{ticks_to_secs, ClientId, Tick},
    math::Vec2,
    snapshot::{ProjectileRecord, RecordExtra, RecordFlags},
    tuning::{TuningTable, WeaponKind},
};
use tracing::{debug, trace, warn};

/// Largest deviation from unit length accepted without renormalizing.
const UNIT_TOLERANCE: f32 = 1.0e-4;

/// World state a projectile reads while it is built, ticked or published.
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    pub tick: Tick,
    pub tick_hz: u32,
    pub tuning: &'a TuningTable,
    pub collision: &'a dyn CollisionMap,
}

impl TickContext<'_> {
    /// Seconds covered by `ticks` at this context's rate.
    pub fn secs(&self, ticks: Tick) -> f32 {
        ticks_to_secs(ticks, self.tick_hz)
    }
}

/// Launch parameters for a fired projectile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireParams {
    pub weapon: WeaponKind,
    pub owner: Option<ClientId>,
    pub origin: Vec2,
    pub direction: Vec2,
    /// `None` keeps the projectile alive until it collides.
    pub lifespan: Option<u32>,
    pub freeze: bool,
    pub explosive: bool,
    pub force: f32,
    pub sound_impact: Option<i32>,
    pub bounces: u32,
    /// `None` reads the zone from the collision map at `origin`.
    pub tune_zone: Option<u32>,
    pub layer: i32,
    pub number: i32,
}

impl FireParams {
    /// Parameters with no lifespan, no bounces and no knockback. Grenades
    /// are explosive.
    pub fn new(weapon: WeaponKind, owner: Option<ClientId>, origin: Vec2, direction: Vec2) -> Self {
        Self {
            weapon,
            owner,
            origin,
            direction,
            lifespan: None,
            freeze: false,
            explosive: weapon == WeaponKind::Grenade,
            force: 0.0,
            sound_impact: None,
            bounces: 0,
            tune_zone: None,
            layer: 0,
            number: 0,
        }
    }
}

/// What a call to [`Projectile::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still in flight.
    Flying,
    /// Reflected off a bounce surface; the trajectory restarted.
    Bounced,
    /// Hit geometry; effects were emitted and the projectile is removed.
    Impact,
    /// Lifespan ran out; removed without effects.
    Expired,
    /// Left the map; removed without effects.
    Clipped,
    /// Already removed; nothing happened.
    Inactive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    weapon: WeaponKind,
    owner: Option<ClientId>,
    origin: Vec2,
    direction: Vec2,
    start_tick: Tick,
    launch_tick: Tick,
    lifespan: Option<u32>,
    explosive: bool,
    freeze: bool,
    force: f32,
    sound_impact: Option<i32>,
    bounces: u32,
    tune_zone: u32,
    layer: i32,
    number: i32,
    /// `(launch_tick, direction)` of segments before the current one, oldest first.
    past_segments: Vec<(Tick, Vec2)>,
    removed: bool,
}

impl Projectile {
    /// Creates a projectile fired at `ctx.tick`.
    pub fn fire(ctx: &TickContext<'_>, params: FireParams) -> Self {
        let origin = if params.origin.is_finite() {
            params.origin
        } else {
            warn!(origin = ?params.origin, "non-finite fire origin, using zero");
            Vec2::ZERO
        };
        if !params.direction.is_finite() {
            warn!(direction = ?params.direction, "non-finite fire direction");
        }
        let force = if params.force.is_finite() { params.force } else { 0.0 };
        let tune_zone = params
            .tune_zone
            .unwrap_or_else(|| ctx.collision.tune_zone_at(origin));

        debug!(
            tick = ctx.tick,
            weapon = ?params.weapon,
            owner = ?params.owner,
            tune_zone,
            "projectile fired"
        );

        Self {
            weapon: params.weapon,
            owner: params.owner,
            origin,
            direction: params.direction.normalize_or_zero(),
            start_tick: ctx.tick,
            launch_tick: ctx.tick,
            lifespan: params.lifespan,
            explosive: params.explosive,
            freeze: params.freeze,
            force,
            sound_impact: params.sound_impact,
            bounces: params.bounces,
            tune_zone,
            layer: params.layer,
            number: params.number,
            past_segments: Vec::new(),
            removed: false,
        }
    }

    /// Rebuilds a projectile from a record observed at `ctx.tick`.
    ///
    /// The record carries the position at the snapshot tick; the launch
    /// origin is solved backward over the elapsed flight time so later
    /// queries behave exactly like a locally fired projectile.
    pub fn from_snapshot(ctx: &TickContext<'_>, record: &ProjectileRecord) -> Self {
        let extra = record.extra_or_default();

        let mut direction = record.direction();
        if (direction.length() - 1.0).abs() > UNIT_TOLERANCE {
            debug!(?direction, "renormalizing snapshot direction");
            direction = direction.normalize_or_zero();
        }

        let observed = record.position();
        let mut proj = Self {
            weapon: record.weapon_kind(),
            owner: record.owner_id(),
            origin: observed,
            direction,
            start_tick: record.start_tick,
            launch_tick: record.start_tick.saturating_add(extra.launch_offset),
            lifespan: u32::try_from(record.lifespan).ok(),
            explosive: record.flags.contains(RecordFlags::EXPLOSIVE),
            freeze: record.flags.contains(RecordFlags::FREEZE),
            force: record.force(),
            sound_impact: (record.sound_impact >= 0).then_some(record.sound_impact),
            bounces: extra.bounces,
            tune_zone: extra.tune_zone,
            layer: extra.layer,
            number: extra.number,
            past_segments: Vec::new(),
            removed: false,
        };

        let elapsed = ctx.secs(ctx.tick.saturating_sub(proj.launch_tick));
        let origin = observed - proj.displacement(elapsed, ctx.tuning);
        if origin.is_finite() {
            proj.origin = origin;
        } else {
            warn!(
                start_tick = record.start_tick,
                tick = ctx.tick,
                "cannot solve snapshot origin, restarting trajectory at observed position"
            );
            proj.launch_tick = ctx.tick;
        }
        proj
    }

    /// Publishes this projectile as observed at `ctx.tick`.
    pub fn to_record(&self, ctx: &TickContext<'_>) -> ProjectileRecord {
        let mut flags = RecordFlags::empty();
        flags.set(RecordFlags::EXPLOSIVE, self.explosive);
        flags.set(RecordFlags::FREEZE, self.freeze);

        let mut record = ProjectileRecord {
            weapon: self.weapon.to_wire(),
            start_tick: self.start_tick,
            owner: ClientId::to_wire(self.owner),
            x: 0,
            y: 0,
            dir_x: 0,
            dir_y: 0,
            lifespan: self
                .lifespan
                .map_or(-1, |s| i32::try_from(s).unwrap_or(i32::MAX)),
            flags,
            force: 0,
            sound_impact: self.sound_impact.unwrap_or(-1),
            extra: Some(self.extra_at(ctx.tick)),
        };
        record.set_position(self.position_at(self.flight_secs(ctx), ctx.tuning));
        record.set_direction(self.direction);
        record.set_force(self.force);
        record
    }

    fn displacement(&self, time: f32, tuning: &TuningTable) -> Vec2 {
        let t = tuning.get(self.tune_zone, self.weapon);
        self.direction * (t.speed * time) + Vec2::DOWN * (0.5 * t.gravity * time * time)
    }

    /// Position `time` seconds after the current trajectory's launch.
    pub fn position_at(&self, time: f32, tuning: &TuningTable) -> Vec2 {
        self.origin + self.displacement(time, tuning)
    }

    fn flight_secs(&self, ctx: &TickContext<'_>) -> f32 {
        ctx.secs(ctx.tick.saturating_sub(self.launch_tick))
    }

    /// Position at `ctx.tick` plus a fraction of the next tick.
    pub fn render_position(&self, ctx: &TickContext<'_>, intra_tick: f32) -> Vec2 {
        let intra = if intra_tick.is_finite() {
            intra_tick.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let time = self.flight_secs(ctx) + ticks_to_secs(1, ctx.tick_hz) * intra;
        self.position_at(time, ctx.tuning)
    }

    /// Advances one simulation step ending at `ctx.tick`.
    pub fn tick(&mut self, ctx: &TickContext<'_>, effects: &mut dyn EffectSink) -> TickOutcome {
        if self.removed {
            return TickOutcome::Inactive;
        }

        let flight = ctx.tick.saturating_sub(self.launch_tick);
        let prev = self.position_at(ctx.secs(flight.saturating_sub(1).max(0)), ctx.tuning);
        let cur = self.position_at(ctx.secs(flight), ctx.tuning);

        if let Some(hit) = ctx.collision.intersect_segment(prev, cur) {
            if hit.bounce && self.bounces > 0 {
                self.past_segments.push((self.launch_tick, self.direction));
                self.direction = self.direction.reflect(hit.normal).normalize_or_zero();
                self.origin = hit.before;
                self.launch_tick = ctx.tick;
                self.bounces -= 1;
                trace!(tick = ctx.tick, bounces = self.bounces, "projectile bounced");
                return TickOutcome::Bounced;
            }

            effects.impact(ImpactEvent {
                tick: ctx.tick,
                position: hit.point,
                owner: self.owner,
                weapon: self.weapon,
                explosive: self.explosive,
                freeze: self.freeze,
                force: self.force,
                sound_impact: self.sound_impact,
            });
            self.removed = true;
            debug!(tick = ctx.tick, weapon = ?self.weapon, position = ?hit.point, "projectile impact");
            return TickOutcome::Impact;
        }

        if ctx.collision.is_clipped(cur) {
            self.removed = true;
            debug!(tick = ctx.tick, position = ?cur, "projectile left the map");
            return TickOutcome::Clipped;
        }

        if let Some(span) = self.lifespan {
            let age = i64::from(ctx.tick) - i64::from(self.start_tick);
            if age >= i64::from(span) {
                self.removed = true;
                trace!(tick = ctx.tick, age, "projectile expired");
                return TickOutcome::Expired;
            }
        }

        TickOutcome::Flying
    }

    /// Whether `self` and `other` describe the same shot.
    ///
    /// Symmetric. Position is deliberately not compared: a projectile
    /// reconstructed from a record shifted by a tick sits elsewhere on the
    /// same trajectory.
    pub fn matches(&self, other: &Projectile, policy: &MatchPolicy) -> bool {
        self.same_shot(self.direction, other, policy)
    }

    /// Like [`matches`](Self::matches) for a projectile observed at `tick`:
    /// this projectile's heading is taken as it was at that tick, before
    /// any later bounce.
    pub fn matches_at(&self, observed: &Projectile, tick: Tick, policy: &MatchPolicy) -> bool {
        self.same_shot(self.direction_at(tick), observed, policy)
    }

    fn same_shot(&self, direction: Vec2, other: &Projectile, policy: &MatchPolicy) -> bool {
        self.owner == other.owner
            && self.weapon == other.weapon
            && direction.distance(other.direction) <= policy.direction_epsilon
            && self.start_tick.abs_diff(other.start_tick) <= policy.tick_window.max(0) as u32
    }

    /// Launch tick and direction of the segment in flight at `tick`.
    fn segment_at(&self, tick: Tick) -> (Tick, Vec2) {
        let mut segment = (self.launch_tick, self.direction);
        for &earlier in self.past_segments.iter().rev() {
            if segment.0 <= tick {
                break;
            }
            segment = earlier;
        }
        segment
    }

    /// Direction of flight at `tick`.
    pub fn direction_at(&self, tick: Tick) -> Vec2 {
        self.segment_at(tick).1
    }

    /// Remaining bounces at `tick`: the current count plus bounces taken
    /// after it.
    pub fn bounces_at(&self, tick: Tick) -> u32 {
        let later = self
            .past_segments
            .iter()
            .map(|&(launch, _)| launch)
            .chain(std::iter::once(self.launch_tick))
            .skip(1)
            .filter(|&launch| launch > tick)
            .count();
        self.bounces
            .saturating_add(u32::try_from(later).unwrap_or(u32::MAX))
    }

    /// The record extra block describing this projectile as it was at `tick`.
    pub fn extra_at(&self, tick: Tick) -> RecordExtra {
        RecordExtra {
            layer: self.layer,
            number: self.number,
            tune_zone: self.tune_zone,
            bounces: self.bounces_at(tick),
            launch_offset: self.segment_at(tick).0.saturating_sub(self.start_tick),
        }
    }

    /// Overrides the remaining bounces with the server's value.
    pub fn set_bouncing(&mut self, value: u32) {
        self.bounces = value;
    }

    /// Copies server-authoritative fields from a confirmed instance without
    /// touching this projectile's trajectory.
    ///
    /// The bounce count is kept when this projectile has bounced since the
    /// confirmed state was taken.
    pub fn adopt_authority(&mut self, confirmed: &Projectile) {
        if self.launch_tick <= confirmed.launch_tick {
            if self.bounces != confirmed.bounces {
                debug!(
                    predicted = self.bounces,
                    confirmed = confirmed.bounces,
                    "correcting predicted bounces"
                );
            }
            self.set_bouncing(confirmed.bounces);
        }
        self.lifespan = confirmed.lifespan;
        self.explosive = confirmed.explosive;
        self.freeze = confirmed.freeze;
        self.force = confirmed.force;
        self.sound_impact = confirmed.sound_impact;
        self.tune_zone = confirmed.tune_zone;
        self.layer = confirmed.layer;
        self.number = confirmed.number;
    }

    /// Flags the projectile for the world's sweep.
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn weapon(&self) -> WeaponKind {
        self.weapon
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.owner
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn start_tick(&self) -> Tick {
        self.start_tick
    }

    pub fn launch_tick(&self) -> Tick {
        self.launch_tick
    }

    pub fn lifespan(&self) -> Option<u32> {
        self.lifespan
    }

    pub fn bounces(&self) -> u32 {
        self.bounces
    }

    pub fn tune_zone(&self) -> u32 {
        self.tune_zone
    }

    pub fn is_explosive(&self) -> bool {
        self.explosive
    }

    pub fn is_freeze(&self) -> bool {
        self.freeze
    }

    pub fn force(&self) -> f32 {
        self.force
    }

    pub fn sound_impact(&self) -> Option<i32> {
        self.sound_impact
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn number(&self) -> i32 {
        self.number
    }
}

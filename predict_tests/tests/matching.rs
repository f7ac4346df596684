//! Match relation properties over randomly generated projectiles.

use predict_client::{FireParams, Projectile, TickContext};
use predict_shared::{
    collision::NullCollision,
    config::MatchPolicy,
    ids::{ClientId, EntityId},
    math::Vec2,
    snapshot::{decode_snapshot, encode_snapshot, ProjectileSnapshot, SnapshotItem, PROTOCOL_VERSION},
    tuning::{TuningTable, WeaponKind},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn ctx<'a>(tick: i32, tuning: &'a TuningTable) -> TickContext<'a> {
    TickContext {
        tick,
        tick_hz: 50,
        tuning,
        collision: &NullCollision,
    }
}

fn random_projectile(rng: &mut StdRng, tuning: &TuningTable) -> Projectile {
    let weapon = if rng.gen_bool(0.5) {
        WeaponKind::Grenade
    } else {
        WeaponKind::Gun
    };
    // Few owners, ticks and directions so that matches actually occur.
    let angle = rng.gen_range(0..4) as f32 * 0.5 + rng.gen_range(0.0..0.004);
    Projectile::fire(
        &ctx(rng.gen_range(100..106), tuning),
        FireParams::new(
            weapon,
            Some(ClientId(rng.gen_range(0..2))),
            Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)),
            Vec2::new(angle.cos(), angle.sin()),
        ),
    )
}

#[test]
fn match_is_reflexive_and_symmetric() {
    let tuning = TuningTable::default();
    let policy = MatchPolicy::default();
    let mut rng = StdRng::seed_from_u64(7);

    let mut matched = 0;
    for _ in 0..2000 {
        let a = random_projectile(&mut rng, &tuning);
        let b = random_projectile(&mut rng, &tuning);
        assert!(a.matches(&a, &policy));
        assert_eq!(a.matches(&b, &policy), b.matches(&a, &policy), "{a:?} / {b:?}");
        matched += usize::from(a.matches(&b, &policy));
    }
    assert!(matched > 0);
}

#[test]
fn wire_copies_match_their_source() -> anyhow::Result<()> {
    let tuning = TuningTable::default();
    let policy = MatchPolicy::default();
    let mut rng = StdRng::seed_from_u64(11);

    for i in 0..200 {
        let source = random_projectile(&mut rng, &tuning);
        let seen_at = source.start_tick() + rng.gen_range(0..60);
        let c = ctx(seen_at, &tuning);
        let snap = ProjectileSnapshot {
            tick: seen_at,
            items: vec![SnapshotItem {
                id: EntityId(i),
                record: source.to_record(&c),
            }],
        };

        let decoded = decode_snapshot(&encode_snapshot(&snap, PROTOCOL_VERSION)?)?;
        let copy = Projectile::from_snapshot(&c, &decoded.items[0].record);
        assert!(copy.matches(&source, &policy));
        assert_eq!(copy.start_tick(), source.start_tick());
    }
    Ok(())
}

#[test]
fn tighter_policy_rejects_shifted_ticks() {
    let tuning = TuningTable::default();
    let shot = |tick| {
        Projectile::fire(
            &ctx(tick, &tuning),
            FireParams::new(WeaponKind::Gun, None, Vec2::ZERO, Vec2::new(0.0, 1.0)),
        )
    };
    let strict = MatchPolicy {
        tick_window: 0,
        ..MatchPolicy::default()
    };
    assert!(shot(10).matches(&shot(10), &strict));
    assert!(!shot(10).matches(&shot(11), &strict));
    assert!(shot(10).matches(&shot(12), &MatchPolicy::default()));
    assert!(!shot(10).matches(&shot(13), &MatchPolicy::default()));
}

//! Server and predicting client fed the same shots, with snapshots delayed
//! by a few ticks.

use predict_client::FireParams;
use predict_shared::{
    collision::Tile,
    config::PredictionConfig,
    ids::{ClientId, Tick},
    math::Vec2,
    snapshot::{LEGACY_PROTOCOL_VERSION, PROTOCOL_VERSION},
    tuning::WeaponKind,
};
use predict_tests::{arena, Session};

fn shot(tick: Tick, cfg: &PredictionConfig, bounces: bool) -> FireParams {
    let weapon = match tick % 3 {
        0 => WeaponKind::Grenade,
        1 => WeaponKind::Gun,
        _ => WeaponKind::Shotgun,
    };
    let angle = tick as f32 * 0.71;
    FireParams {
        lifespan: Some(cfg.tuning.get(0, weapon).lifetime_ticks(cfg.tick_hz)),
        bounces: if bounces && weapon == WeaponKind::Grenade { 2 } else { 0 },
        ..FireParams::new(
            weapon,
            Some(ClientId((tick % 2) as u32)),
            Vec2::new(120.0, 64.0),
            Vec2::new(angle.cos(), angle.sin()),
        )
    }
}

fn run_lockstep(protocol: u32, bounces: bool) -> anyhow::Result<Session> {
    let cfg = PredictionConfig::default();
    let mut session = Session::new(&cfg, arena()?, arena()?, 3, protocol);
    for _ in 0..300 {
        let tick = session.server.game_tick();
        if tick % 7 == 0 {
            session.fire(shot(tick, &cfg, bounces));
        }
        session.step()?;
    }
    Ok(session)
}

fn assert_converged(session: &mut Session) {
    let totals = session.totals;
    assert!(totals.claimed > 0, "{totals:?}");
    assert_eq!(totals.spawned, 0, "{totals:?}");
    assert_eq!(totals.replaced, 0, "{totals:?}");
    assert_eq!(totals.dropped, 0, "{totals:?}");
    assert_eq!(totals.discarded, 0, "{totals:?}");

    // Every prediction old enough to appear in a delivered snapshot is paired.
    let now = session.client.world().game_tick();
    for entity in session.client.world().entities() {
        if entity.projectile.start_tick() + 1 + 3 <= now {
            assert!(entity.server_id.is_some(), "unpaired {:?}", entity.id);
        }
    }

    let server_impacts = session.server.drain_impacts();
    let client_impacts = session.client.drain_impacts();
    assert!(!server_impacts.is_empty());
    assert_eq!(server_impacts, client_impacts);
}

#[test]
fn identical_simulations_reconcile_cleanly() -> anyhow::Result<()> {
    let mut session = run_lockstep(PROTOCOL_VERSION, true)?;
    assert_converged(&mut session);
    Ok(())
}

#[test]
fn legacy_snapshots_reconcile_without_extras() -> anyhow::Result<()> {
    let mut session = run_lockstep(LEGACY_PROTOCOL_VERSION, true)?;
    assert_converged(&mut session);
    Ok(())
}

fn assert_single_clean_claim(session: &mut Session) {
    let totals = session.totals;
    assert_eq!(totals.claimed, 1, "{totals:?}");
    assert_eq!(totals.spawned, 0, "{totals:?}");
    assert_eq!(totals.replaced, 0, "{totals:?}");
    assert_eq!(totals.discarded, 0, "{totals:?}");

    let server_impacts = session.server.drain_impacts();
    assert_eq!(server_impacts.len(), 1);
    assert_eq!(server_impacts, session.client.drain_impacts());
}

/// Gun shot that reaches the bounce strip on its second tick.
fn gun_into_bounce_strip() -> FireParams {
    FireParams {
        bounces: 2,
        ..FireParams::new(
            WeaponKind::Gun,
            Some(ClientId(0)),
            Vec2::new(400.0, 70.0),
            Vec2::new(1.0, 0.0),
        )
    }
}

#[test]
fn bounce_inside_latency_window_is_claimed() -> anyhow::Result<()> {
    for protocol in [PROTOCOL_VERSION, LEGACY_PROTOCOL_VERSION] {
        let cfg = PredictionConfig::default();
        let mut session = Session::new(&cfg, arena()?, arena()?, 3, protocol);
        session.fire(gun_into_bounce_strip());
        session.run(40)?;
        assert_single_clean_claim(&mut session);
    }
    Ok(())
}

#[test]
fn legacy_snapshots_keep_predicted_tune_zone() -> anyhow::Result<()> {
    let mut cfg = PredictionConfig::default();
    cfg.tuning.weapon_mut(1, WeaponKind::Gun).speed = 600.0;
    let mut session = Session::new(&cfg, arena()?, arena()?, 3, LEGACY_PROTOCOL_VERSION);
    // Fired from inside tune zone 1.
    session.fire(FireParams::new(
        WeaponKind::Gun,
        Some(ClientId(0)),
        Vec2::new(240.0, 72.0),
        Vec2::new(1.0, 0.0),
    ));
    session.run(60)?;
    assert_single_clean_claim(&mut session);
    assert_eq!(session.totals.dropped, 0);
    Ok(())
}

fn gun_right() -> FireParams {
    FireParams::new(
        WeaponKind::Gun,
        Some(ClientId(0)),
        Vec2::new(64.0, 64.0),
        Vec2::new(1.0, 0.0),
    )
}

#[test]
fn server_only_wall_drops_prediction() -> anyhow::Result<()> {
    let cfg = PredictionConfig::default();
    let mut server_map = arena()?;
    server_map.set_tile(5, 2, Tile::Solid);
    let mut session = Session::new(&cfg, server_map, arena()?, 2, PROTOCOL_VERSION);

    session.fire(gun_right());
    session.run(20)?;

    assert_eq!(session.totals.claimed, 1);
    assert_eq!(session.totals.dropped, 1);
    assert_eq!(session.server.drain_impacts().len(), 1);
    assert!(session.client.drain_impacts().is_empty());
    assert!(session.client.world().is_empty());
    Ok(())
}

#[test]
fn client_only_wall_suppresses_server_projectile() -> anyhow::Result<()> {
    let cfg = PredictionConfig::default();
    let mut client_map = arena()?;
    client_map.set_tile(5, 2, Tile::Solid);
    let mut session = Session::new(&cfg, arena()?, client_map, 4, PROTOCOL_VERSION);

    session.fire(gun_right());
    session.run(30)?;

    assert!(session.totals.suppressed > 0);
    assert_eq!(session.totals.spawned, 0);
    assert_eq!(session.client.drain_impacts().len(), 1);
    assert_eq!(session.server.drain_impacts().len(), 1);
    assert!(session.client.world().is_empty());
    assert!(session.client.world().retired().is_empty());
    Ok(())
}

#[test]
fn without_prediction_client_mirrors_server() -> anyhow::Result<()> {
    let cfg = PredictionConfig::default();
    let mut session = Session::new(&cfg, arena()?, arena()?, 2, PROTOCOL_VERSION);
    session.client.set_prediction(false);

    for _ in 0..60 {
        let tick = session.server.game_tick();
        if tick % 5 == 0 {
            session.fire(shot(tick, &cfg, true));
        }
        session.step()?;

        let latest = session.client.snapshots().latest().map_or(0, |s| s.items.len());
        assert_eq!(session.client.world().len(), latest);
    }

    assert_eq!(session.totals.claimed, 0);
    assert!(session.totals.spawned > 0);
    assert!(session.client.drain_impacts().is_empty());
    Ok(())
}

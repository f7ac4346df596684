//! Prediction demo binary.
//!
//! Usage:
//!   cargo run -p predict_client -- [--config predict.json] [--ticks 500] [--latency 4] [--no-predict]
//!
//! Runs an authoritative world and a predicting client side by side on a
//! small arena. Both fire the same shots; the server's snapshots reach the
//! client `--latency` ticks late and are reconciled against its predictions.

use std::collections::VecDeque;
use std::env;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use predict_client::{interp::intra_tick, FireParams, GameWorld, PredictionClient, ReconcileReport};
use predict_shared::{
    collision::TileGrid,
    config::PredictionConfig,
    ids::{ClientId, Tick},
    log::LogHandle,
    math::Vec2,
    snapshot::{encode_snapshot, PROTOCOL_VERSION},
    tuning::WeaponKind,
};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

const ARENA: &[&str] = &[
    "####################",
    "#..................#",
    "#..................*",
    "#.......11.........*",
    "#.......11.........*",
    "#..................#",
    "#..................#",
    "####****############",
];

/// Ticks between two demo shots.
const FIRE_EVERY: Tick = 10;

struct Args {
    config: Option<String>,
    ticks: u32,
    latency: Tick,
    predict: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut out = Args {
        config: None,
        ticks: 500,
        latency: 4,
        predict: true,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                out.config = Some(args[i + 1].clone());
                i += 2;
            }
            "--ticks" if i + 1 < args.len() => {
                out.ticks = args[i + 1].parse().context("parse --ticks")?;
                i += 2;
            }
            "--latency" if i + 1 < args.len() => {
                out.latency = args[i + 1].parse().context("parse --latency")?;
                anyhow::ensure!(out.latency >= 0, "--latency must not be negative");
                i += 2;
            }
            "--no-predict" => {
                out.predict = false;
                i += 1;
            }
            other => anyhow::bail!("unknown argument {other:?}"),
        }
    }
    Ok(out)
}

#[derive(Debug, Default, Serialize)]
struct DemoSummary {
    ticks: u32,
    shots: usize,
    snapshots: usize,
    claimed: usize,
    spawned: usize,
    replaced: usize,
    suppressed: usize,
    dropped: usize,
    discarded: usize,
    server_impacts: usize,
    predicted_impacts: usize,
    /// Projectile positions handed to the renderer over the run.
    drawn: usize,
}

impl DemoSummary {
    fn add(&mut self, report: &ReconcileReport) {
        self.snapshots += 1;
        self.claimed += report.claimed;
        self.spawned += report.spawned;
        self.replaced += report.replaced;
        self.suppressed += report.suppressed;
        self.dropped += report.dropped;
        self.discarded += report.discarded;
    }
}

/// Deterministic shot pattern: cycles weapons and sweeps the aim.
fn demo_shot(tick: Tick, cfg: &PredictionConfig) -> FireParams {
    let weapon = match (tick / FIRE_EVERY) % 3 {
        0 => WeaponKind::Grenade,
        1 => WeaponKind::Gun,
        _ => WeaponKind::Shotgun,
    };
    let angle = tick as f32 * 0.37;
    let lifespan = cfg.tuning.get(0, weapon).lifetime_ticks(cfg.tick_hz);
    FireParams {
        lifespan: Some(lifespan),
        bounces: u32::from(weapon == WeaponKind::Grenade),
        ..FireParams::new(
            weapon,
            Some(ClientId(0)),
            Vec2::new(320.0, 128.0),
            Vec2::new(angle.cos(), angle.sin()),
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let cfg = match &args.config {
        Some(path) => PredictionConfig::load(path)?,
        None => PredictionConfig::default(),
    };

    let log = LogHandle::new(&cfg.log_filter).context("build logger")?;
    let _guard = log.install();

    let arena = TileGrid::from_rows(ARENA).context("parse demo arena")?;
    info!(
        tick_hz = cfg.tick_hz,
        ticks = args.ticks,
        latency = args.latency,
        predict = args.predict,
        "Starting prediction demo"
    );

    let mut server = GameWorld::new(&cfg, Box::new(arena.clone()), log.clone());
    let mut client = PredictionClient::new(&cfg, Box::new(arena), log.clone());
    client.set_prediction(args.predict);

    let mut interval = tokio::time::interval(Duration::from_secs_f32(1.0 / cfg.tick_hz as f32));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut in_flight: VecDeque<(Tick, Bytes)> = VecDeque::new();
    let mut summary = DemoSummary::default();

    for _ in 0..args.ticks {
        let tick_started = interval.tick().await;

        let tick = server.game_tick();
        if tick % FIRE_EVERY == 0 {
            let shot = demo_shot(tick, &cfg);
            server.fire(shot);
            client.fire(shot);
            summary.shots += 1;
        }

        server.step();
        client.tick();
        summary.ticks += 1;

        let bytes = encode_snapshot(&server.snapshot(), PROTOCOL_VERSION)?;
        in_flight.push_back((server.game_tick() + args.latency, bytes));
        while in_flight
            .front()
            .is_some_and(|(due, _)| *due <= server.game_tick())
        {
            let Some((_, bytes)) = in_flight.pop_front() else {
                break;
            };
            if let Some(report) = client.on_snapshot_bytes(&bytes) {
                debug!(?report, "snapshot reconciled");
                summary.add(&report);
            }
        }

        summary.server_impacts += server.drain_impacts().len();
        summary.predicted_impacts += client.drain_impacts().len();

        let intra = intra_tick(tick_started.elapsed(), cfg.tick_hz);
        let frame = client.render_positions(intra);
        trace!(tick = client.world().game_tick(), intra, drawn = frame.len(), "frame");
        summary.drawn += frame.len();
    }

    info!(
        summary = %serde_json::to_string(&summary)?,
        live = client.world().len(),
        "Demo finished"
    );
    Ok(())
}

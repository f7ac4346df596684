//! Shared fixtures for the integration tests: an arena map, a server world
//! paired with a predicting client, and a delayed snapshot pipe.

use std::collections::VecDeque;

use anyhow::Context;
use bytes::Bytes;
use predict_client::{FireParams, GameWorld, PredictionClient, ReconcileReport};
use predict_shared::{
    collision::TileGrid,
    config::PredictionConfig,
    ids::Tick,
    log::LogHandle,
    snapshot::encode_snapshot,
};

/// Closed arena: solid walls, a bounce strip on the right, tune zone 1 in
/// the middle.
pub const ARENA: &[&str] = &[
    "################",
    "#..............*",
    "#......11......*",
    "#......11......*",
    "#..............#",
    "################",
];

pub fn arena() -> anyhow::Result<TileGrid> {
    TileGrid::from_rows(ARENA).context("parse arena")
}

/// Snapshots in flight, delivered `delay` ticks after they were taken.
#[derive(Debug, Default)]
pub struct LatencyPipe {
    delay: Tick,
    queue: VecDeque<(Tick, Bytes)>,
}

impl LatencyPipe {
    pub fn new(delay: Tick) -> Self {
        Self {
            delay,
            queue: VecDeque::new(),
        }
    }

    pub fn send(&mut self, now: Tick, bytes: Bytes) {
        self.queue.push_back((now + self.delay, bytes));
    }

    /// Everything due at or before `now`, oldest first.
    pub fn recv_due(&mut self, now: Tick) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Some((due, _)) = self.queue.front() {
            if *due > now {
                break;
            }
            if let Some((_, bytes)) = self.queue.pop_front() {
                out.push(bytes);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Summed reconciliation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub snapshots: usize,
    pub claimed: usize,
    pub adopted: usize,
    pub replaced: usize,
    pub suppressed: usize,
    pub spawned: usize,
    pub dropped: usize,
    pub discarded: usize,
}

impl Totals {
    pub fn add(&mut self, r: &ReconcileReport) {
        self.snapshots += 1;
        self.claimed += r.claimed;
        self.adopted += r.adopted;
        self.replaced += r.replaced;
        self.suppressed += r.suppressed;
        self.spawned += r.spawned;
        self.dropped += r.dropped;
        self.discarded += r.discarded;
    }
}

/// Authoritative world plus a predicting client connected by a pipe.
pub struct Session {
    pub server: GameWorld,
    pub client: PredictionClient,
    pub pipe: LatencyPipe,
    pub protocol: u32,
    pub totals: Totals,
}

impl Session {
    /// Server and client on the same map.
    pub fn new(
        cfg: &PredictionConfig,
        server_map: TileGrid,
        client_map: TileGrid,
        latency: Tick,
        protocol: u32,
    ) -> Self {
        Self {
            server: GameWorld::new(cfg, Box::new(server_map), LogHandle::disabled()),
            client: PredictionClient::new(cfg, Box::new(client_map), LogHandle::for_tests()),
            pipe: LatencyPipe::new(latency),
            protocol,
            totals: Totals::default(),
        }
    }

    /// Fires on the server, and on the client when it predicts.
    pub fn fire(&mut self, params: FireParams) {
        self.server.fire(params);
        self.client.fire(params);
    }

    /// One tick on both sides, then delivery of due snapshots.
    pub fn step(&mut self) -> anyhow::Result<()> {
        self.server.step();
        self.client.tick();

        let now = self.server.game_tick();
        let bytes = encode_snapshot(&self.server.snapshot(), self.protocol)?;
        self.pipe.send(now, bytes);
        for bytes in self.pipe.recv_due(now) {
            if let Some(report) = self.client.on_snapshot_bytes(&bytes) {
                self.totals.add(&report);
            }
        }
        Ok(())
    }

    pub fn run(&mut self, ticks: usize) -> anyhow::Result<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }
}

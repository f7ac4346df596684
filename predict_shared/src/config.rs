//! Configuration system.
//!
//! Loads prediction configuration from JSON strings/files.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{ids::Tick, tuning::TuningTable};

/// How strictly a predicted projectile must agree with a server one to be
/// treated as the same projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// Largest accepted start tick difference. Snapshot timing can shift the
    /// observed start tick by one or two ticks.
    #[serde(default = "default_tick_window")]
    pub tick_window: Tick,
    /// Largest accepted distance between the two unit directions. Covers the
    /// 1e-6 fixed-point rounding of records with a wide margin.
    #[serde(default = "default_direction_epsilon")]
    pub direction_epsilon: f32,
    /// Matched predictions further than this from the server position are
    /// replaced by the confirmed projectile.
    #[serde(default = "default_correction_distance")]
    pub correction_distance: f32,
}

fn default_tick_window() -> Tick {
    2
}

fn default_direction_epsilon() -> f32 {
    0.01
}

fn default_correction_distance() -> f32 {
    32.0
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            tick_window: default_tick_window(),
            direction_epsilon: default_direction_epsilon(),
            correction_distance: default_correction_distance(),
        }
    }
}

/// Root configuration for a prediction world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    #[serde(default)]
    pub matching: MatchPolicy,
    #[serde(default)]
    pub tuning: TuningTable,
    /// Snapshots kept for interpolation.
    #[serde(default = "default_snapshot_history")]
    pub snapshot_history: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_snapshot_history() -> usize {
    32
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            tick_hz: 50,
            matching: MatchPolicy::default(),
            tuning: TuningTable::default(),
            snapshot_history: default_snapshot_history(),
            log_filter: default_log_filter(),
        }
    }
}

impl PredictionConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        anyhow::ensure!(cfg.tick_hz > 0, "tick_hz must be positive");
        Ok(cfg)
    }
}

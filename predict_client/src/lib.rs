//! `predict_client`
//!
//! Client-side systems:
//! - Deterministic projectile trajectories
//! - A world that ticks projectiles against collision and tuning
//! - Reconciliation of predictions with server snapshots
//! - Interpolation for rendering between ticks

pub mod client;
pub mod interp;
pub mod projectile;
pub mod reconcile;
pub mod world;

pub use client::PredictionClient;
pub use projectile::{FireParams, Projectile, TickContext, TickOutcome};
pub use reconcile::{reconcile, ReconcileReport};
pub use world::{GameWorld, StepReport, WorldEntity};

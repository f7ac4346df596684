//! Identifiers and the simulation clock unit.

use serde::{Deserialize, Serialize};

/// Simulation tick (monotonic world clock). Signed so elapsed-time math can go
/// negative without wrapping.
pub type Tick = i32;

/// Opaque entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Identifies the actor that owns a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Decodes the wire form, where any negative value means "no owner".
    pub fn from_wire(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().map(ClientId)
    }

    pub fn to_wire(owner: Option<Self>) -> i32 {
        owner
            .and_then(|c| i32::try_from(c.0).ok())
            .unwrap_or(-1)
    }
}

/// Converts a tick count into seconds at the given tick rate.
pub fn ticks_to_secs(ticks: Tick, tick_hz: u32) -> f32 {
    ticks as f32 / tick_hz.max(1) as f32
}

//! Projectile tuning.
//!
//! Physics constants are never stored on a projectile. Each projectile keeps a
//! tune zone id and looks its weapon's constants up here on every position
//! query, so a map region can change ballistics without touching entity state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Weapon kinds that fire projectiles. Discriminants are the wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    Gun = 1,
    Shotgun = 2,
    Grenade = 3,
}

impl WeaponKind {
    pub fn to_wire(self) -> i32 {
        self as i32
    }

    pub fn from_wire(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::Gun),
            2 => Some(Self::Shotgun),
            3 => Some(Self::Grenade),
            _ => None,
        }
    }

    /// Like [`WeaponKind::from_wire`] but degrades unknown values to `Gun`.
    pub fn from_wire_lossy(raw: i32) -> Self {
        Self::from_wire(raw).unwrap_or_else(|| {
            warn!(raw, "unknown projectile weapon, treating as gun");
            Self::Gun
        })
    }
}

/// Ballistics for one weapon in one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponTuning {
    /// Launch speed in units per second.
    pub speed: f32,
    /// Acceleration along the down axis in units per second squared.
    pub gravity: f32,
    /// Radius used when testing hits against actors.
    pub collision_radius: f32,
    /// Default lifetime for newly fired projectiles.
    pub lifetime_secs: f32,
}

impl WeaponTuning {
    /// Lifetime in whole ticks at the given rate.
    pub fn lifetime_ticks(&self, tick_hz: u32) -> u32 {
        (self.lifetime_secs.max(0.0) * tick_hz as f32).round() as u32
    }
}

/// Per-zone tuning for every projectile weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneTuning {
    pub gun: WeaponTuning,
    pub shotgun: WeaponTuning,
    pub grenade: WeaponTuning,
}

impl ZoneTuning {
    pub fn weapon(&self, weapon: WeaponKind) -> &WeaponTuning {
        match weapon {
            WeaponKind::Gun => &self.gun,
            WeaponKind::Shotgun => &self.shotgun,
            WeaponKind::Grenade => &self.grenade,
        }
    }

    pub fn weapon_mut(&mut self, weapon: WeaponKind) -> &mut WeaponTuning {
        match weapon {
            WeaponKind::Gun => &mut self.gun,
            WeaponKind::Shotgun => &mut self.shotgun,
            WeaponKind::Grenade => &mut self.grenade,
        }
    }
}

// Gravity is 2 * curvature * speed^2 / 10^4, the closed form of the classic
// curvature tunings (gun 1.25, shotgun 1.25, grenade 7).
impl Default for ZoneTuning {
    fn default() -> Self {
        Self {
            gun: WeaponTuning {
                speed: 2200.0,
                gravity: 1210.0,
                collision_radius: 6.0,
                lifetime_secs: 2.0,
            },
            shotgun: WeaponTuning {
                speed: 2750.0,
                gravity: 1890.625,
                collision_radius: 6.0,
                lifetime_secs: 0.2,
            },
            grenade: WeaponTuning {
                speed: 1000.0,
                gravity: 1400.0,
                collision_radius: 6.0,
                lifetime_secs: 2.0,
            },
        }
    }
}

/// Zone id that always exists and backs every failed lookup.
pub const DEFAULT_ZONE: u32 = 0;

/// Tuning table keyed by zone id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<u32, ZoneTuning>", into = "BTreeMap<u32, ZoneTuning>")]
pub struct TuningTable {
    zones: BTreeMap<u32, ZoneTuning>,
}

impl Default for TuningTable {
    fn default() -> Self {
        Self::new(ZoneTuning::default())
    }
}

impl From<BTreeMap<u32, ZoneTuning>> for TuningTable {
    fn from(mut zones: BTreeMap<u32, ZoneTuning>) -> Self {
        zones.entry(DEFAULT_ZONE).or_default();
        Self { zones }
    }
}

impl From<TuningTable> for BTreeMap<u32, ZoneTuning> {
    fn from(table: TuningTable) -> Self {
        table.zones
    }
}

impl TuningTable {
    /// Creates a table whose default zone uses `base`.
    pub fn new(base: ZoneTuning) -> Self {
        let mut zones = BTreeMap::new();
        zones.insert(DEFAULT_ZONE, base);
        Self { zones }
    }

    /// Looks up `(zone, weapon)`, falling back to the default zone.
    pub fn get(&self, zone: u32, weapon: WeaponKind) -> &WeaponTuning {
        self.zone(zone).weapon(weapon)
    }

    /// Returns a zone's tuning, or the default zone's when it is unknown.
    pub fn zone(&self, zone: u32) -> &ZoneTuning {
        match self.zones.get(&zone) {
            Some(z) => z,
            None => &self.zones[&DEFAULT_ZONE],
        }
    }

    pub fn contains_zone(&self, zone: u32) -> bool {
        self.zones.contains_key(&zone)
    }

    /// Inserts or replaces a zone override.
    pub fn set_zone(&mut self, zone: u32, tuning: ZoneTuning) {
        self.zones.insert(zone, tuning);
    }

    /// Mutable access to one weapon in one zone, creating the zone from the
    /// default zone's values if needed.
    pub fn weapon_mut(&mut self, zone: u32, weapon: WeaponKind) -> &mut WeaponTuning {
        let base = *self.zone(DEFAULT_ZONE);
        self.zones.entry(zone).or_insert(base).weapon_mut(weapon)
    }
}

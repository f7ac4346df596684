//! Projectile snapshot records.
//!
//! Goals:
//! - A record fully describes one projectile as the server saw it at the
//!   snapshot tick, in integer fixed-point so it round-trips exactly.
//! - The DDRace extra block is optional so legacy peers stay readable.
//! - Keep the binary layout explicit and versioned.

use anyhow::{bail, ensure};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{
    ids::{ClientId, EntityId, Tick},
    math::Vec2,
    tuning::WeaponKind,
};

/// Current snapshot protocol version (records may carry an extra block).
pub const PROTOCOL_VERSION: u32 = 2;

/// Legacy protocol without the extra block.
pub const LEGACY_PROTOCOL_VERSION: u32 = 1;

/// Fixed-point scale of record positions.
pub const POS_SCALE: f32 = 100.0;
/// Fixed-point scale of record directions.
pub const DIR_SCALE: f32 = 1_000_000.0;
/// Fixed-point scale of record force.
pub const FORCE_SCALE: f32 = 100.0;

const ITEM_BASE_LEN: usize = 8 + 11 * 4;
const EXTRA_LEN: usize = 5 * 4;

bitflags::bitflags! {
    /// Behaviour flags carried by every record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RecordFlags: u32 {
        const EXPLOSIVE = 1 << 0;
        const FREEZE = 1 << 1;
    }
}

/// DDRace extension block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordExtra {
    pub layer: i32,
    pub number: i32,
    pub tune_zone: u32,
    pub bounces: u32,
    /// Ticks between the creation tick and the current trajectory's launch
    /// (non-zero after a bounce).
    pub launch_offset: i32,
}

/// One projectile as observed at a snapshot tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileRecord {
    pub weapon: i32,
    pub start_tick: Tick,
    /// Owner client id, `-1` for none.
    pub owner: i32,
    /// Position at the snapshot tick, scaled by [`POS_SCALE`].
    pub x: i32,
    pub y: i32,
    /// Launch direction, scaled by [`DIR_SCALE`].
    pub dir_x: i32,
    pub dir_y: i32,
    /// Lifespan in ticks, `-1` for "until collision".
    pub lifespan: i32,
    pub flags: RecordFlags,
    /// Knockback force, scaled by [`FORCE_SCALE`].
    pub force: i32,
    /// Impact sound id, `-1` for none.
    pub sound_impact: i32,
    pub extra: Option<RecordExtra>,
}

fn quantize(v: f32, scale: f32) -> i32 {
    // `as` saturates and maps NaN to 0.
    (v * scale).round() as i32
}

impl ProjectileRecord {
    pub fn set_position(&mut self, pos: Vec2) {
        self.x = quantize(pos.x, POS_SCALE);
        self.y = quantize(pos.y, POS_SCALE);
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x as f32 / POS_SCALE, self.y as f32 / POS_SCALE)
    }

    pub fn set_direction(&mut self, dir: Vec2) {
        self.dir_x = quantize(dir.x, DIR_SCALE);
        self.dir_y = quantize(dir.y, DIR_SCALE);
    }

    pub fn direction(&self) -> Vec2 {
        Vec2::new(self.dir_x as f32 / DIR_SCALE, self.dir_y as f32 / DIR_SCALE)
    }

    pub fn set_force(&mut self, force: f32) {
        self.force = quantize(force, FORCE_SCALE);
    }

    pub fn force(&self) -> f32 {
        self.force as f32 / FORCE_SCALE
    }

    pub fn weapon_kind(&self) -> WeaponKind {
        WeaponKind::from_wire_lossy(self.weapon)
    }

    pub fn owner_id(&self) -> Option<ClientId> {
        ClientId::from_wire(self.owner)
    }

    /// The extra block, or the defaults legacy records imply.
    pub fn extra_or_default(&self) -> RecordExtra {
        self.extra.unwrap_or_default()
    }
}

/// A snapshot item: server entity id plus its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub id: EntityId,
    pub record: ProjectileRecord,
}

/// All projectiles the server reported at one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub tick: Tick,
    pub items: Vec<SnapshotItem>,
}

impl ProjectileSnapshot {
    pub fn find(&self, id: EntityId) -> Option<&ProjectileRecord> {
        self.items.iter().find(|i| i.id == id).map(|i| &i.record)
    }
}

/// Encodes a snapshot in the given protocol version.
///
/// Encoding with [`LEGACY_PROTOCOL_VERSION`] drops every extra block.
pub fn encode_snapshot(snap: &ProjectileSnapshot, version: u32) -> anyhow::Result<Bytes> {
    ensure!(
        version == PROTOCOL_VERSION || version == LEGACY_PROTOCOL_VERSION,
        "unsupported snapshot protocol {version}"
    );

    let mut buf = BytesMut::with_capacity(12 + snap.items.len() * (ITEM_BASE_LEN + 1 + EXTRA_LEN));
    buf.put_u32(version);
    buf.put_i32(snap.tick);
    buf.put_u32(u32::try_from(snap.items.len())?);

    for item in &snap.items {
        let r = &item.record;
        buf.put_u64(item.id.0);
        buf.put_i32(r.weapon);
        buf.put_i32(r.start_tick);
        buf.put_i32(r.owner);
        buf.put_i32(r.x);
        buf.put_i32(r.y);
        buf.put_i32(r.dir_x);
        buf.put_i32(r.dir_y);
        buf.put_i32(r.lifespan);
        buf.put_u32(r.flags.bits());
        buf.put_i32(r.force);
        buf.put_i32(r.sound_impact);

        if version >= PROTOCOL_VERSION {
            match r.extra {
                Some(extra) => {
                    buf.put_u8(1);
                    buf.put_i32(extra.layer);
                    buf.put_i32(extra.number);
                    buf.put_u32(extra.tune_zone);
                    buf.put_u32(extra.bounces);
                    buf.put_i32(extra.launch_offset);
                }
                None => buf.put_u8(0),
            }
        }
    }
    Ok(buf.freeze())
}

fn need(buf: &impl Buf, len: usize, what: &str) -> anyhow::Result<()> {
    if buf.remaining() < len {
        bail!("truncated snapshot: {what} needs {len} bytes, {} left", buf.remaining());
    }
    Ok(())
}

/// Decodes a snapshot written by [`encode_snapshot`] in either version.
pub fn decode_snapshot(mut buf: &[u8]) -> anyhow::Result<ProjectileSnapshot> {
    need(&buf, 12, "header")?;
    let version = buf.get_u32();
    if version != PROTOCOL_VERSION && version != LEGACY_PROTOCOL_VERSION {
        bail!("unsupported snapshot protocol {version}");
    }
    let tick = buf.get_i32();
    let count = buf.get_u32() as usize;
    // Every item needs at least its base fields; reject lying counts up front.
    need(&buf, count.saturating_mul(ITEM_BASE_LEN), "items")?;

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        need(&buf, ITEM_BASE_LEN, "item")?;
        let id = EntityId(buf.get_u64());
        let mut record = ProjectileRecord {
            weapon: buf.get_i32(),
            start_tick: buf.get_i32(),
            owner: buf.get_i32(),
            x: buf.get_i32(),
            y: buf.get_i32(),
            dir_x: buf.get_i32(),
            dir_y: buf.get_i32(),
            lifespan: buf.get_i32(),
            flags: RecordFlags::from_bits_truncate(buf.get_u32()),
            force: buf.get_i32(),
            sound_impact: buf.get_i32(),
            extra: None,
        };

        if version >= PROTOCOL_VERSION {
            need(&buf, 1, "extra marker")?;
            match buf.get_u8() {
                0 => {}
                1 => {
                    need(&buf, EXTRA_LEN, "extra block")?;
                    record.extra = Some(RecordExtra {
                        layer: buf.get_i32(),
                        number: buf.get_i32(),
                        tune_zone: buf.get_u32(),
                        bounces: buf.get_u32(),
                        launch_offset: buf.get_i32(),
                    });
                }
                other => bail!("bad extra marker {other} for item {id:?}"),
            }
        }
        items.push(SnapshotItem { id, record });
    }

    if buf.has_remaining() {
        bail!("{} trailing bytes after snapshot", buf.remaining());
    }
    Ok(ProjectileSnapshot { tick, items })
}

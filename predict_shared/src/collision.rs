//! Collision abstraction.
//!
//! The trajectory core only needs a segment query and a bounce classification;
//! the map representation behind it is pluggable.

use anyhow::bail;

use crate::math::Vec2;
use crate::tuning::DEFAULT_ZONE;

/// Side length of a map tile in world units.
pub const TILE_SIZE: f32 = 32.0;

/// Tiles a projectile may travel outside the map before it is discarded.
const CLIP_MARGIN_TILES: f32 = 200.0;

/// Result of a segment query that hit geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// First sampled point inside geometry.
    pub point: Vec2,
    /// Last sampled point before `point` that was still free.
    pub before: Vec2,
    /// Unit surface normal facing the incoming segment.
    pub normal: Vec2,
    /// Whether the surface reflects projectiles instead of absorbing them.
    pub bounce: bool,
}

/// Map collision queries used during projectile ticks.
pub trait CollisionMap: Send + Sync {
    /// Returns the first hit along `from -> to`, if any.
    fn intersect_segment(&self, from: Vec2, to: Vec2) -> Option<SegmentHit>;

    /// Whether `pos` is so far outside the map that it can be discarded.
    fn is_clipped(&self, _pos: Vec2) -> bool {
        false
    }

    /// Tune zone at `pos`.
    fn tune_zone_at(&self, _pos: Vec2) -> u32 {
        DEFAULT_ZONE
    }
}

/// Open space: nothing ever collides.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollision;

impl CollisionMap for NullCollision {
    fn intersect_segment(&self, _from: Vec2, _to: Vec2) -> Option<SegmentHit> {
        None
    }
}

/// Tile kinds relevant to projectiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tile {
    #[default]
    Empty,
    Solid,
    Bounce,
}

impl Tile {
    fn blocks(self) -> bool {
        !matches!(self, Tile::Empty)
    }
}

/// Fixed grid of square tiles with an optional tune zone per tile.
///
/// Cells outside the grid are empty; projectiles leaving the grid by more
/// than a fixed margin are reported as clipped.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    zones: Vec<u32>,
}

impl TileGrid {
    /// Creates an empty grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::Empty; width * height],
            zones: vec![DEFAULT_ZONE; width * height],
        }
    }

    /// Parses a grid from ASCII rows.
    ///
    /// `#` solid, `*` bounce, `.` empty, `1`-`9` empty tile in that tune zone.
    pub fn from_rows(rows: &[&str]) -> anyhow::Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        let mut grid = Self::new(width, height);

        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                bail!("row {y} has {} tiles, expected {width}", row.chars().count());
            }
            for (x, c) in row.chars().enumerate() {
                let idx = y * width + x;
                match c {
                    '.' => {}
                    '#' => grid.tiles[idx] = Tile::Solid,
                    '*' => grid.tiles[idx] = Tile::Bounce,
                    '1'..='9' => grid.zones[idx] = c as u32 - '0' as u32,
                    other => bail!("unknown tile {other:?} at ({x}, {y})"),
                }
            }
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sets a tile; out-of-range coordinates are ignored.
    pub fn set_tile(&mut self, x: usize, y: usize, tile: Tile) {
        if x < self.width && y < self.height {
            self.tiles[y * self.width + x] = tile;
        }
    }

    pub fn set_zone(&mut self, x: usize, y: usize, zone: u32) {
        if x < self.width && y < self.height {
            self.zones[y * self.width + x] = zone;
        }
    }

    fn cell(pos: Vec2) -> (i64, i64) {
        (
            (pos.x / TILE_SIZE).floor() as i64,
            (pos.y / TILE_SIZE).floor() as i64,
        )
    }

    fn index(&self, cell: (i64, i64)) -> Option<usize> {
        let (x, y) = cell;
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// Tile at a world position.
    pub fn tile_at(&self, pos: Vec2) -> Tile {
        self.index(Self::cell(pos))
            .map(|i| self.tiles[i])
            .unwrap_or_default()
    }

    fn normal_between(&self, before: Vec2, point: Vec2) -> Vec2 {
        let (bx, by) = Self::cell(before);
        let (px, py) = Self::cell(point);
        let delta = point - before;
        let x_normal = Vec2::new(-delta.x.signum(), 0.0);
        let y_normal = Vec2::new(0.0, -delta.y.signum());

        match (bx != px, by != py) {
            (true, false) => x_normal,
            (false, true) => y_normal,
            // Diagonal entry: whichever axis alone would already be blocked.
            (true, true) if self.tile_at(Vec2::new(before.x, point.y)).blocks() => y_normal,
            (true, true) if self.tile_at(Vec2::new(point.x, before.y)).blocks() => x_normal,
            _ => (-delta).normalize_or_zero(),
        }
    }
}

impl CollisionMap for TileGrid {
    /// Samples the segment at roughly one-unit steps.
    fn intersect_segment(&self, from: Vec2, to: Vec2) -> Option<SegmentHit> {
        let steps = from.distance(to).min(1.0e6) as u32 + 1;
        let mut last = from;

        for i in 0..=steps {
            let point = from.lerp(to, i as f32 / steps as f32);
            let tile = self.tile_at(point);
            if tile.blocks() {
                return Some(SegmentHit {
                    point,
                    before: last,
                    normal: self.normal_between(last, point),
                    bounce: tile == Tile::Bounce,
                });
            }
            last = point;
        }
        None
    }

    fn is_clipped(&self, pos: Vec2) -> bool {
        let tx = pos.x / TILE_SIZE;
        let ty = pos.y / TILE_SIZE;
        tx < -CLIP_MARGIN_TILES
            || ty < -CLIP_MARGIN_TILES
            || tx > self.width as f32 + CLIP_MARGIN_TILES
            || ty > self.height as f32 + CLIP_MARGIN_TILES
    }

    fn tune_zone_at(&self, pos: Vec2) -> u32 {
        self.index(Self::cell(pos))
            .map(|i| self.zones[i])
            .unwrap_or(DEFAULT_ZONE)
    }
}

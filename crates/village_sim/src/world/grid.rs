use serde::{Deserialize, Serialize};

/// World units per tile edge.
pub const TILE_SIZE: f32 = 1.0;
/// Vertical world offset contributed by one height level.
pub const LEVEL_HEIGHT: f32 = 0.28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// The four orthogonal neighbors in enumeration order +x, -x, +y, -y.
    pub fn neighbors(self) -> [TileCoord; 4] {
        [
            self.offset(1, 0),
            self.offset(-1, 0),
            self.offset(0, 1),
            self.offset(0, -1),
        ]
    }

    pub fn manhattan(self, other: TileCoord) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }

    pub fn is_adjacent(self, other: TileCoord) -> bool {
        self.manhattan(other) == 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    #[default]
    Grass,
    Stone,
    Water,
    Road,
    Floor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Static tile type and height arrays of one area.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: u32,
    height: u32,
    kinds: Vec<TileKind>,
    heights: Vec<u8>,
}

impl Grid {
    pub fn filled(width: u32, height: u32, kind: TileKind, level: u8) -> Self {
        let cells = (width as usize) * (height as usize);
        Self {
            width,
            height,
            kinds: vec![kind; cells],
            heights: vec![level; cells],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, tile: TileCoord) -> bool {
        self.index_of(tile).is_some()
    }

    pub(crate) fn index_of(&self, tile: TileCoord) -> Option<usize> {
        let x = u32::try_from(tile.x).ok()?;
        let y = u32::try_from(tile.y).ok()?;
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub(crate) fn coord_of(&self, index: usize) -> TileCoord {
        let width = self.width.max(1) as usize;
        TileCoord {
            x: (index % width) as i32,
            y: (index / width) as i32,
        }
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn tile_kind(&self, tile: TileCoord) -> Option<TileKind> {
        self.index_of(tile).map(|index| self.kinds[index])
    }

    /// Height level of a tile. Out-of-bounds tiles report level 0.
    pub fn tile_height(&self, tile: TileCoord) -> u8 {
        self.index_of(tile)
            .map(|index| self.heights[index])
            .unwrap_or(0)
    }

    pub fn set(&mut self, tile: TileCoord, kind: TileKind, level: u8) {
        if let Some(index) = self.index_of(tile) {
            self.kinds[index] = kind;
            self.heights[index] = level;
        }
    }

    pub fn set_kind(&mut self, tile: TileCoord, kind: TileKind) {
        if let Some(index) = self.index_of(tile) {
            self.kinds[index] = kind;
        }
    }

    pub fn set_height(&mut self, tile: TileCoord, level: u8) {
        if let Some(index) = self.index_of(tile) {
            self.heights[index] = level;
        }
    }

    /// Tile center in world space; the grid is centered on the origin.
    pub fn tile_to_world(&self, tile: TileCoord) -> WorldPos {
        WorldPos {
            x: (tile.x as f32 - self.width as f32 / 2.0 + 0.5) * TILE_SIZE,
            y: self.tile_height(tile) as f32 * LEVEL_HEIGHT,
            z: (tile.y as f32 - self.height as f32 / 2.0 + 0.5) * TILE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_height_is_zero_and_not_in_bounds() {
        let mut grid = Grid::filled(4, 3, TileKind::Grass, 2);
        grid.set_height(TileCoord::new(1, 1), 3);
        assert_eq!(grid.tile_height(TileCoord::new(1, 1)), 3);
        assert_eq!(grid.tile_height(TileCoord::new(-1, 0)), 0);
        assert_eq!(grid.tile_height(TileCoord::new(4, 0)), 0);
        assert!(!grid.in_bounds(TileCoord::new(0, 3)));
        assert_eq!(grid.tile_kind(TileCoord::new(0, 3)), None);
    }

    #[test]
    fn world_mapping_is_affine_in_tile_and_height() {
        let mut grid = Grid::filled(10, 10, TileKind::Grass, 0);
        grid.set_height(TileCoord::new(6, 5), 2);
        let a = grid.tile_to_world(TileCoord::new(5, 5));
        let b = grid.tile_to_world(TileCoord::new(6, 5));
        assert!((a.x - 0.5).abs() < 1e-6);
        assert!((a.z - 0.5).abs() < 1e-6);
        assert!((b.x - a.x - TILE_SIZE).abs() < 1e-6);
        assert!((b.y - 2.0 * LEVEL_HEIGHT).abs() < 1e-6);
    }

    #[test]
    fn index_and_coord_round_trip() {
        let grid = Grid::filled(7, 5, TileKind::Floor, 0);
        let tile = TileCoord::new(3, 4);
        let index = grid.index_of(tile).expect("in bounds");
        assert_eq!(grid.coord_of(index), tile);
    }

    #[test]
    fn neighbors_enumerate_in_fixed_order() {
        let n = TileCoord::new(2, 2).neighbors();
        assert_eq!(
            n,
            [
                TileCoord::new(3, 2),
                TileCoord::new(1, 2),
                TileCoord::new(2, 3),
                TileCoord::new(2, 1)
            ]
        );
    }
}

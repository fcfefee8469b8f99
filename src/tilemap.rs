use std::collections::HashMap;
use std::path::Path;

use bevy::prelude::*;

/// A placed tile: source tile id plus its grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pub tile_id: u32,
    pub grid: (i32, i32),
}

/// Sparse tile map. Solid (collidable) and decorative (`no_collision`)
/// tiles live in disjoint maps keyed by grid coordinate; both are populated
/// once at load and immutable afterward.
#[derive(Resource, Clone, Debug)]
pub struct Tilemap {
    pub tile_size: f32,
    pub player_spawn: (f32, f32),
    solid: HashMap<(i32, i32), Tile>,
    decor: HashMap<(i32, i32), Tile>,
}

#[derive(serde::Deserialize)]
struct MapTileDef {
    #[serde(default)]
    no_collision: bool,
}

#[derive(serde::Deserialize)]
struct MapTile {
    id: u32,
    x: i32,
    y: i32,
}

#[derive(serde::Deserialize)]
struct MapFile {
    tile_size: f32,
    #[serde(default)]
    player_spawn: Option<(f32, f32)>,
    #[serde(default)]
    tile_defs: HashMap<String, MapTileDef>,
    tiles: Vec<MapTile>,
}

impl Tilemap {
    pub fn new(tile_size: f32) -> Self {
        Self {
            tile_size,
            player_spawn: (0.0, 0.0),
            solid: HashMap::new(),
            decor: HashMap::new(),
        }
    }

    pub fn insert_tile(&mut self, tile_id: u32, grid: (i32, i32), no_collision: bool) {
        let tile = Tile { tile_id, grid };
        if no_collision {
            self.decor.insert(grid, tile);
        } else {
            self.solid.insert(grid, tile);
        }
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read map file {}: {e}", path.display()))?;
        Self::from_json(&contents)
            .map_err(|e| format!("failed to parse map file {}: {e}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self, String> {
        let file: MapFile = serde_json::from_str(contents).map_err(|e| e.to_string())?;
        if file.tile_size <= 0.0 {
            return Err(format!("tile_size must be positive, got {}", file.tile_size));
        }

        let mut defs: HashMap<u32, bool> = HashMap::new();
        for (key, def) in &file.tile_defs {
            let id: u32 = key
                .parse()
                .map_err(|_| format!("tile_defs key '{key}' is not a tile id"))?;
            defs.insert(id, def.no_collision);
        }

        let mut map = Tilemap::new(file.tile_size);
        if let Some(spawn) = file.player_spawn {
            map.player_spawn = spawn;
        }
        for tile in &file.tiles {
            let no_collision = defs.get(&tile.id).copied().unwrap_or(false);
            map.insert_tile(tile.id, (tile.x, tile.y), no_collision);
        }
        Ok(map)
    }

    /// Grid cell containing `point`. Coordinates exactly on a cell boundary
    /// floor-divide toward the lower-index cell.
    pub fn cell_of(&self, point: Vec2) -> (i32, i32) {
        (
            (point.x / self.tile_size).floor() as i32,
            (point.y / self.tile_size).floor() as i32,
        )
    }

    pub fn is_solid_cell(&self, grid: (i32, i32)) -> bool {
        self.solid.contains_key(&grid)
    }

    pub fn is_solid_tile(&self, point: Vec2) -> bool {
        self.is_solid_cell(self.cell_of(point))
    }

    pub fn tile_rect(&self, grid: (i32, i32)) -> Rect {
        let ts = self.tile_size;
        let min = Vec2::new(grid.0 as f32 * ts, grid.1 as f32 * ts);
        Rect::from_corners(min, min + Vec2::splat(ts))
    }

    /// Solid tile rectangles in the cell bounding box of `area`, inflated by
    /// one cell in each direction. Cells outside the loaded map simply yield
    /// nothing.
    pub fn physics_rects_around(&self, area: Rect) -> Vec<Rect> {
        let ts = self.tile_size;
        let start_x = (area.min.x / ts).floor() as i32 - 1;
        let end_x = (area.max.x / ts).floor() as i32 + 1;
        let start_y = (area.min.y / ts).floor() as i32 - 1;
        let end_y = (area.max.y / ts).floor() as i32 + 1;

        let mut rects = Vec::new();
        for y in start_y..=end_y {
            for x in start_x..=end_x {
                if self.solid.contains_key(&(x, y)) {
                    rects.push(self.tile_rect((x, y)));
                }
            }
        }
        rects
    }

    pub fn solid_count(&self) -> usize {
        self.solid.len()
    }

    pub fn decor_count(&self) -> usize {
        self.decor.len()
    }

    /// A small level for headless runs and tests: a long floor, a step, a
    /// wall, and a floating platform.
    pub fn test_level() -> Self {
        let mut map = Tilemap::new(16.0);
        map.player_spawn = (2000.0, 200.0);

        for x in 0..160 {
            map.insert_tile(1, (x, 0), false);
        }
        for x in 40..44 {
            map.insert_tile(1, (x, 1), false);
        }
        for y in 1..5 {
            map.insert_tile(1, (80, y), false);
        }
        for x in 60..66 {
            map.insert_tile(1, (x, 5), false);
        }
        for x in 0..40 {
            map.insert_tile(7, (x, 1), true);
        }
        map
    }
}

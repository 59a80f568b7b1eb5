use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use super::{Tile, TileGrid, TilePos};

/// Map area the scatter counts below were tuned for.
const REFERENCE_AREA: f64 = 120.0 * 120.0;

/// Knobs for procedural terrain. Attempt counts are per 120x120 map and are
/// scaled with the actual map area.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub water_blobs: u32,
    pub blob_min_radius: i32,
    pub blob_radius_spread: i32,
    pub tree_attempts: u32,
    pub tree_chance: f64,
    pub rock_attempts: u32,
    pub rock_chance: f64,
    /// Half-width of the square kept as grass around the spawn point.
    pub spawn_clearance: i32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            water_blobs: 28,
            blob_min_radius: 3,
            blob_radius_spread: 7,
            tree_attempts: 500,
            tree_chance: 0.65,
            rock_attempts: 280,
            rock_chance: 0.7,
            spawn_clearance: 3,
        }
    }
}

fn scaled(count: u32, width: u32, height: u32) -> u32 {
    let area = width as f64 * height as f64;
    (count as f64 * area / REFERENCE_AREA).round() as u32
}

fn random_cell(rng: &mut ChaCha8Rng, width: u32, height: u32) -> TilePos {
    TilePos::new(
        (rng.gen::<f64>() * width as f64) as i32,
        (rng.gen::<f64>() * height as f64) as i32,
    )
}

/// Generates terrain for `seed`. The same seed and dimensions always
/// produce the same grid.
pub fn generate(width: u32, height: u32, seed: u64, params: &GenerationParams) -> TileGrid {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut grid = TileGrid::new(width, height);
    if width == 0 || height == 0 {
        return grid;
    }

    for _ in 0..scaled(params.water_blobs, width, height) {
        let center = random_cell(&mut rng, width, height);
        let spread = params.blob_radius_spread.max(0);
        let radius = params.blob_min_radius + (rng.gen::<f64>() * spread as f64) as i32;
        grid.paint_disc(center, radius, Tile::Water);
    }

    for _ in 0..scaled(params.tree_attempts, width, height) {
        let cell = random_cell(&mut rng, width, height);
        if grid.tile(cell) != Some(Tile::Water) && rng.gen::<f64>() < params.tree_chance {
            let _ = grid.set_tile(cell, Tile::Tree);
        }
    }

    for _ in 0..scaled(params.rock_attempts, width, height) {
        let cell = random_cell(&mut rng, width, height);
        if grid.tile(cell) == Some(Tile::Grass) && rng.gen::<f64>() < params.rock_chance {
            let _ = grid.set_tile(cell, Tile::Rock);
        }
    }

    let spawn = spawn_point(width, height);
    let clear = params.spawn_clearance;
    for dy in -clear..=clear {
        for dx in -clear..=clear {
            let _ = grid.set_tile(TilePos::new(spawn.x + dx, spawn.y + dy), Tile::Grass);
        }
    }

    grid
}

pub(crate) fn spawn_point(width: u32, height: u32) -> TilePos {
    TilePos::new((width / 2) as i32, (height / 2) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_world() {
        let params = GenerationParams::default();
        let a = generate(60, 40, 12345, &params);
        let b = generate(60, 40, 12345, &params);
        let c = generate(60, 40, 54321, &params);
        assert_eq!(a, b);
        assert_ne!(a.tiles(), c.tiles());
    }

    #[test]
    fn spawn_area_is_always_grass() {
        let params = GenerationParams::default();
        for seed in 0..8 {
            let grid = generate(120, 120, seed, &params);
            for dy in -3..=3 {
                for dx in -3..=3 {
                    assert_eq!(grid.tile(TilePos::new(60 + dx, 60 + dy)), Some(Tile::Grass));
                }
            }
        }
    }

    #[test]
    fn scatter_produces_resources() {
        let grid = generate(120, 120, 7, &GenerationParams::default());
        assert!(grid.count_tiles(Tile::Tree) > 0);
        assert!(grid.count_tiles(Tile::Rock) > 0);
        assert!(grid.count_tiles(Tile::Water) > 0);
    }
}

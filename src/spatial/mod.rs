//! Spatial model - tile grid with parallel respawn and crop layers

mod generation;

pub(crate) use generation::spawn_point;
pub use generation::{generate, GenerationParams};

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Terrain kind of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    #[default]
    Grass,
    Tree,
    Rock,
    Water,
    Tilled,
    Crop,
    Road,
}

impl Tile {
    /// Terrain that no footprint may cover.
    pub fn blocks_construction(self) -> bool {
        matches!(self, Tile::Water | Tile::Tree | Tile::Rock)
    }
}

/// Tile coordinate. Signed so that out-of-map requests can be represented
/// and rejected instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing a world-space point.
    pub fn containing(point: Vec2, tile_size: f32) -> Self {
        Self {
            x: (point.x / tile_size).floor() as i32,
            y: (point.y / tile_size).floor() as i32,
        }
    }

    pub fn center(self, tile_size: f32) -> Vec2 {
        Vec2 {
            x: self.x as f32 * tile_size + tile_size / 2.0,
            y: self.y as f32 * tile_size + tile_size / 2.0,
        }
    }

    pub fn distance_squared(self, other: TilePos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

/// Continuous world-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Moves toward `target` by at most `step` without overshooting.
    pub fn step_toward(&mut self, target: Vec2, step: f32) {
        let dist = self.distance(target);
        if dist <= f32::EPSILON {
            return;
        }
        let travel = step.max(0.0);
        if travel >= dist {
            *self = target;
            return;
        }
        self.x += (target.x - self.x) / dist * travel;
        self.y += (target.y - self.y) / dist * travel;
    }
}

/// Per-cell regrowth record for harvested trees and rocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResourceFeature {
    #[default]
    None,
    Respawning { timer: u32, restore: Tile },
}

impl ResourceFeature {
    pub fn is_none(&self) -> bool {
        matches!(self, ResourceFeature::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropPlot {
    pub growth: f32,
}

impl CropPlot {
    pub const MATURE: f32 = 100.0;

    pub fn seeded() -> Self {
        Self { growth: 0.0 }
    }

    pub fn is_mature(&self) -> bool {
        self.growth >= Self::MATURE
    }
}

/// Fixed-size terrain array plus the feature and crop layers, all indexed
/// row-major by `y * width + x`. A cell carries at most one of a live
/// feature and a crop plot.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    features: Vec<ResourceFeature>,
    crops: Vec<Option<CropPlot>>,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            tiles: vec![Tile::Grass; count],
            features: vec![ResourceFeature::None; count],
            crops: vec![None; count],
        }
    }

    /// Rebuilds a grid from persisted layers. Any layer whose length does not
    /// match `width * height` is replaced by an empty one; the names of the
    /// discarded layers are returned.
    pub fn from_layers(
        width: u32,
        height: u32,
        tiles: Option<Vec<Tile>>,
        features: Option<Vec<ResourceFeature>>,
        crops: Option<Vec<Option<CropPlot>>>,
    ) -> (Self, Vec<&'static str>) {
        let mut grid = Self::new(width, height);
        let count = grid.tile_count();
        let mut discarded = Vec::new();
        match tiles {
            Some(tiles) if tiles.len() == count => grid.tiles = tiles,
            _ => discarded.push("world"),
        }
        match features {
            Some(features) if features.len() == count => grid.features = features,
            _ => discarded.push("features"),
        }
        match crops {
            Some(crops) if crops.len() == count => grid.crops = crops,
            _ => discarded.push("crops"),
        }
        (grid, discarded)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Convert tile position to a layer index
    pub fn index_of(&self, pos: TilePos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    /// Convert a layer index back to a tile position
    pub fn pos_of(&self, index: usize) -> Option<TilePos> {
        if index < self.tile_count() {
            Some(TilePos {
                x: (index % self.width as usize) as i32,
                y: (index / self.width as usize) as i32,
            })
        } else {
            None
        }
    }

    fn checked_index(&self, pos: TilePos) -> Result<usize, SimError> {
        self.index_of(pos)
            .ok_or(SimError::OutOfBounds { x: pos.x, y: pos.y })
    }

    pub fn tile(&self, pos: TilePos) -> Option<Tile> {
        self.index_of(pos).map(|idx| self.tiles[idx])
    }

    pub fn set_tile(&mut self, pos: TilePos, tile: Tile) -> Result<(), SimError> {
        let idx = self.checked_index(pos)?;
        self.tiles[idx] = tile;
        Ok(())
    }

    pub fn feature(&self, pos: TilePos) -> Option<ResourceFeature> {
        self.index_of(pos).map(|idx| self.features[idx])
    }

    pub fn set_feature(&mut self, pos: TilePos, feature: ResourceFeature) -> Result<(), SimError> {
        let idx = self.checked_index(pos)?;
        if !feature.is_none() {
            self.crops[idx] = None;
        }
        self.features[idx] = feature;
        Ok(())
    }

    pub fn crop(&self, pos: TilePos) -> Option<CropPlot> {
        self.index_of(pos).and_then(|idx| self.crops[idx])
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn features(&self) -> &[ResourceFeature] {
        &self.features
    }

    pub fn crops(&self) -> &[Option<CropPlot>] {
        &self.crops
    }

    pub fn count_tiles(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|t| **t == tile).count()
    }

    /// Replaces a harvested resource with grass and schedules its return.
    pub fn start_respawn(&mut self, pos: TilePos, restore: Tile, days: u32) -> Result<(), SimError> {
        self.set_tile(pos, Tile::Grass)?;
        self.set_feature(pos, ResourceFeature::Respawning { timer: days, restore })
    }

    /// Seeds a tilled, unplanted cell with a growth-0 plot.
    pub fn plant(&mut self, pos: TilePos) -> Result<(), SimError> {
        let idx = self.checked_index(pos)?;
        if self.tiles[idx] != Tile::Tilled || self.crops[idx].is_some() {
            return Err(SimError::InvalidTarget {
                x: pos.x,
                y: pos.y,
                reason: "only tilled, unplanted soil can be seeded",
            });
        }
        self.crops[idx] = Some(CropPlot::seeded());
        self.features[idx] = ResourceFeature::None;
        self.tiles[idx] = Tile::Crop;
        Ok(())
    }

    /// Clears a mature plot and reverts the cell to tilled soil. Returns
    /// false (and changes nothing) when the plot is missing or immature.
    pub fn harvest_crop(&mut self, pos: TilePos) -> bool {
        let Some(idx) = self.index_of(pos) else {
            return false;
        };
        match self.crops[idx] {
            Some(plot) if plot.is_mature() => {
                self.crops[idx] = None;
                self.features[idx] = ResourceFeature::None;
                self.tiles[idx] = Tile::Tilled;
                true
            }
            _ => false,
        }
    }

    /// Removes any plot on the cell, e.g. when a road is laid over it.
    pub fn clear_crop(&mut self, pos: TilePos) {
        if let Some(idx) = self.index_of(pos) {
            self.crops[idx] = None;
        }
    }

    pub fn is_plantable(&self, pos: TilePos) -> bool {
        self.index_of(pos)
            .map(|idx| self.tiles[idx] == Tile::Tilled && self.crops[idx].is_none())
            .unwrap_or(false)
    }

    /// Grows every live plot by `amount`, clamped at maturity.
    pub fn tick_crop_growth(&mut self, amount: f32) {
        let amount = amount.max(0.0);
        for plot in self.crops.iter_mut().flatten() {
            plot.growth = (plot.growth + amount).min(CropPlot::MATURE);
        }
    }

    /// One day of regrowth. Cells for which `occupied` holds are skipped.
    /// Returns how many cells reverted to their original terrain.
    pub fn tick_daily_respawn(&mut self, occupied: impl Fn(TilePos) -> bool) -> usize {
        let mut restored = 0;
        for idx in 0..self.features.len() {
            let ResourceFeature::Respawning { timer, restore } = self.features[idx] else {
                continue;
            };
            let pos = TilePos {
                x: (idx % self.width as usize) as i32,
                y: (idx / self.width as usize) as i32,
            };
            if occupied(pos) {
                continue;
            }
            let timer = timer.saturating_sub(1);
            if timer == 0 {
                self.tiles[idx] = restore;
                self.features[idx] = ResourceFeature::None;
                restored += 1;
            } else {
                self.features[idx] = ResourceFeature::Respawning { timer, restore };
            }
        }
        restored
    }

    /// Nearest matching cell by squared Euclidean distance. Cells are scanned
    /// row-major and only a strictly closer cell replaces the current best,
    /// so exact ties go to the first cell found.
    pub fn nearest(&self, from: TilePos, matches: impl Fn(usize) -> bool) -> Option<TilePos> {
        let mut best: Option<(i64, usize)> = None;
        for idx in 0..self.tiles.len() {
            if !matches(idx) {
                continue;
            }
            let pos = TilePos {
                x: (idx % self.width as usize) as i32,
                y: (idx / self.width as usize) as i32,
            };
            let dist = pos.distance_squared(from);
            if best.map_or(true, |(best_dist, _)| dist < best_dist) {
                best = Some((dist, idx));
            }
        }
        best.and_then(|(_, idx)| self.pos_of(idx))
    }

    pub fn nearest_tile(&self, from: TilePos, tile: Tile) -> Option<TilePos> {
        self.nearest(from, |idx| self.tiles[idx] == tile)
    }

    pub fn nearest_mature_crop(&self, from: TilePos) -> Option<TilePos> {
        self.nearest(from, |idx| self.crops[idx].map_or(false, |plot| plot.is_mature()))
    }

    pub fn nearest_plantable(&self, from: TilePos) -> Option<TilePos> {
        self.nearest(from, |idx| {
            self.tiles[idx] == Tile::Tilled && self.crops[idx].is_none()
        })
    }

    /// Paints a filled disc, clipped to the map.
    pub(crate) fn paint_disc(&mut self, center: TilePos, radius: i32, tile: Tile) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                if let Some(idx) = self.index_of(TilePos::new(center.x + dx, center.y + dy)) {
                    self.tiles[idx] = tile;
                }
            }
        }
    }
}

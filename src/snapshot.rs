use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::world::Settlement;

/// Writes `tick_NNNNNN.json` under `<dir>/<scenario>/` every `interval`
/// ticks. An interval of zero disables output.
pub struct SnapshotWriter {
    dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn maybe_write(&self, world: &Settlement, scenario_name: &str) -> Result<Option<PathBuf>> {
        if self.interval == 0 || world.tick() % self.interval != 0 {
            return Ok(None);
        }
        let dir = self.dir.join(scenario_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("tick_{:06}.json", world.tick()));
        let json = serde_json::to_string_pretty(&world.snapshot(scenario_name))?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::spatial::TileGrid;

    #[test]
    fn writes_only_on_interval_ticks() {
        let temp = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(temp.path(), 2);
        let mut world = Settlement::new(TileGrid::new(8, 8), Tuning::default(), 3);

        world.advance_tick();
        assert!(writer.maybe_write(&world, "unit").unwrap().is_none());
        world.advance_tick();
        let path = writer.maybe_write(&world, "unit").unwrap().unwrap();
        assert!(path.ends_with("unit/tick_000002.json"));

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["tick"], 2);
        assert_eq!(value["day"], 1);
    }
}

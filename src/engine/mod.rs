use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::{
    rng::{RngManager, SystemRng},
    snapshot::SnapshotWriter,
    systems::{BookkeepingSystem, EnvironmentSystem, PopulationSystem, ServantSystem},
    world::{Settlement, SettlementSnapshot},
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    /// Wall seconds fed to every tick by `run`.
    pub dt_seconds: f64,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// The settlement's fixed system order: world, servants, day pass,
    /// bookkeeping.
    pub fn with_standard_systems(self) -> Self {
        self.with_system(EnvironmentSystem::new())
            .with_system(ServantSystem::new())
            .with_system(PopulationSystem::new())
            .with_system(BookkeepingSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            settings: self.settings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    /// True when the settlement was paused and nothing advanced.
    pub skipped: bool,
    pub elapsed_minutes: f64,
    pub day_rollovers: u32,
    pub alive: usize,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn standard(settings: EngineSettings) -> Self {
        EngineBuilder::new(settings).with_standard_systems().build()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Advances the settlement by `elapsed_seconds` of wall time. A paused
    /// settlement is left exactly as it was.
    pub fn tick(&mut self, world: &mut Settlement, elapsed_seconds: f64) -> Result<TickSummary> {
        if world.is_paused() {
            return Ok(TickSummary {
                tick: world.tick(),
                skipped: true,
                elapsed_minutes: 0.0,
                day_rollovers: 0,
                alive: world.alive_count(),
            });
        }

        let dt_seconds = if elapsed_seconds.is_finite() {
            elapsed_seconds.max(0.0)
        } else {
            0.0
        };
        let elapsed_minutes = dt_seconds * world.tuning().minutes_per_second;
        let day_rollovers = world.advance_clock(elapsed_minutes);
        world.advance_tick();

        let ctx = SystemContext {
            tick: world.tick(),
            dt_seconds,
            elapsed_minutes,
            day_rollovers,
            scenario_name: &self.settings.scenario_name,
        };
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            system.run(&ctx, world, &mut rng_stream)?;
        }

        if day_rollovers > 0 {
            info!(
                day = world.day(),
                alive = world.alive_count(),
                food = world.inventory().food,
                "day begins"
            );
        }
        self.snapshot_writer
            .maybe_write(world, &self.settings.scenario_name)?;

        Ok(TickSummary {
            tick: world.tick(),
            skipped: false,
            elapsed_minutes,
            day_rollovers,
            alive: world.alive_count(),
        })
    }

    pub fn run(&mut self, world: &mut Settlement, ticks: u64) -> Result<()> {
        self.run_with_hook(world, ticks, |_| {})
    }

    /// Runs `ticks` fixed steps, handing a snapshot to `hook` after each
    /// step that advanced.
    pub fn run_with_hook<F>(&mut self, world: &mut Settlement, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(SettlementSnapshot),
    {
        let dt = self.settings.dt_seconds;
        for _ in 0..ticks {
            let summary = self.tick(world, dt)?;
            if !summary.skipped {
                hook(world.snapshot(&self.settings.scenario_name));
            }
        }
        Ok(())
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub dt_seconds: f64,
    pub elapsed_minutes: f64,
    /// Midnights crossed during this tick; the daily passes run once each.
    pub day_rollovers: u32,
    pub scenario_name: &'a str,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut Settlement,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}

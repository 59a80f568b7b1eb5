use homestead::{
    engine::Engine,
    events::SettlementEvent,
    scenario::{Scenario, ScenarioLoader},
    structures::StructureKind,
};
use tempfile::tempdir;

fn frontier() -> Scenario {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/frontier.yaml")
        .expect("frontier scenario loads")
}

#[test]
fn frontier_world_is_founded() {
    let scenario = frontier();
    let world = scenario.build_world();

    assert_eq!(world.grid().width(), 48);
    assert_eq!(world.servants().len(), 2);
    assert_eq!(world.day(), 1);
    assert_eq!(world.clock().label(), "06:00");
    let center = world
        .structures()
        .iter()
        .find(|s| s.kind == StructureKind::TownCenter)
        .expect("town center placed");
    assert!(center.drop_off && center.built);
    assert_eq!(world.water_rations(), 0);
    assert!(world
        .events()
        .iter()
        .any(|e| matches!(e.event, SettlementEvent::WorldGenerated { .. })));
}

#[test]
fn same_seed_runs_identically() {
    let scenario = frontier();
    let temp = tempdir().unwrap();
    let run = || {
        let mut world = scenario.build_world();
        let mut engine = Engine::standard(scenario.engine_settings(temp.path()));
        engine.run(&mut world, 400).unwrap();
        serde_json::to_value(world.snapshot(&scenario.name)).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn large_elapsed_time_runs_each_daily_pass() {
    let scenario = frontier();
    let mut world = scenario.build_world();
    let temp = tempdir().unwrap();
    let mut engine = Engine::standard(scenario.engine_settings(temp.path()));

    // 3 days of simulated minutes in one call
    let seconds = 3.0 * 1440.0 / world.tuning().minutes_per_second;
    let summary = engine.tick(&mut world, seconds).unwrap();

    assert_eq!(summary.day_rollovers, 3);
    assert_eq!(world.day(), 4);
    assert_eq!(world.clock().label(), "06:00");
    for servant in world.servants() {
        assert!((0.0..=100.0).contains(&servant.needs.hunger));
        assert!((0.0..=100.0).contains(&servant.needs.thirst));
        assert!((0.0..=100.0).contains(&servant.needs.shelter));
    }
}

#[test]
fn needs_stay_in_range_over_a_long_run() {
    let scenario = frontier();
    let mut world = scenario.build_world();
    let temp = tempdir().unwrap();
    let mut engine = Engine::standard(scenario.engine_settings(temp.path()));

    for _ in 0..2_000 {
        engine.tick(&mut world, 0.5).unwrap();
        for servant in world.servants() {
            assert!((0.0..=100.0).contains(&servant.needs.hunger));
            assert!((0.0..=100.0).contains(&servant.needs.thirst));
            assert!((0.0..=100.0).contains(&servant.needs.shelter));
        }
        assert!(world.inventory().food <= world.capacities().max_food);
    }
    assert!(world.day() > 1);
}

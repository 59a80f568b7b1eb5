use homestead::{engine::Engine, scenario::ScenarioLoader};
use tempfile::tempdir;

#[test]
fn engine_runs_hook_each_tick() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader
        .load("scenarios/frontier.yaml")
        .expect("scenario should load");
    let mut world = scenario.build_world();
    let temp = tempdir().expect("tempdir");
    let mut engine = Engine::standard(scenario.engine_settings(temp.path()));

    let mut ticks = Vec::new();
    engine
        .run_with_hook(&mut world, 6, |snapshot| ticks.push(snapshot.tick))
        .expect("run succeeds");

    assert_eq!(ticks.len(), 6);
    assert_eq!(ticks.first().copied(), Some(1));
    assert_eq!(ticks.last().copied(), Some(6));
}

#[test]
fn paused_settlement_skips_ticks() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader.load("scenarios/frontier.yaml").unwrap();
    let mut world = scenario.build_world();
    let temp = tempdir().unwrap();
    let mut engine = Engine::standard(scenario.engine_settings(temp.path()));

    engine.run(&mut world, 3).unwrap();
    let clock = world.clock();
    let needs: Vec<f32> = world.servants().iter().map(|s| s.needs.hunger).collect();

    world.set_paused(true);
    let mut hooked = 0;
    engine
        .run_with_hook(&mut world, 50, |_| hooked += 1)
        .unwrap();
    let summary = engine.tick(&mut world, 1_000.0).unwrap();

    assert!(summary.skipped);
    assert_eq!(hooked, 0);
    assert_eq!(world.tick(), 3);
    assert_eq!(world.clock(), clock);
    let after: Vec<f32> = world.servants().iter().map(|s| s.needs.hunger).collect();
    assert_eq!(after, needs);

    assert!(!world.toggle_paused());
    assert!(!engine.tick(&mut world, 0.1).unwrap().skipped);
    assert_eq!(world.tick(), 4);
}

#[test]
fn snapshots_are_written_on_interval() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let mut scenario = loader.load("scenarios/frontier.yaml").unwrap();
    scenario.snapshot_interval_ticks = 5;
    let mut world = scenario.build_world();
    let temp = tempdir().unwrap();
    let mut engine = Engine::standard(scenario.engine_settings(temp.path()));

    engine.run(&mut world, 12).unwrap();

    let dir = temp.path().join(&scenario.name);
    let mut files: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["tick_000005.json", "tick_000010.json"]);

    let raw = std::fs::read_to_string(dir.join("tick_000010.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["tick"], 10);
    assert_eq!(value["scenario"], "frontier");
}

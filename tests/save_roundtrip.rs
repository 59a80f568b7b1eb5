use homestead::{
    engine::Engine,
    save::{self, Field, SaveGame},
    scenario::ScenarioLoader,
    structures::StructureKind,
};
use tempfile::tempdir;

#[test]
fn saved_run_restores_identically() {
    let scenario = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/frontier.yaml")
        .unwrap();
    let mut world = scenario.build_world();
    let temp = tempdir().unwrap();
    let mut engine = Engine::standard(scenario.engine_settings(temp.path()));
    engine.run(&mut world, 300).unwrap();

    let path = temp.path().join("saves/frontier.json");
    save::save_to_path(&world, &path).unwrap();
    let loaded = save::load_from_path(&path, &scenario).unwrap();
    assert!(loaded.issues.is_empty(), "{:?}", loaded.issues);
    let restored = loaded.settlement;

    assert_eq!(restored.grid(), world.grid());
    assert_eq!(restored.inventory(), world.inventory());
    assert_eq!(
        restored.structures().iter().collect::<Vec<_>>(),
        world.structures().iter().collect::<Vec<_>>()
    );
    assert_eq!(restored.servants(), world.servants());
    assert_eq!(restored.clock(), world.clock());
    assert_eq!(restored.tick(), world.tick());
}

#[test]
fn save_records_timestamp_and_counters() {
    let scenario = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/frontier.yaml")
        .unwrap();
    let world = scenario.build_world();
    let json = save::to_json(&save::capture(&world)).unwrap();
    let parsed: SaveGame = save::from_json(&json).unwrap();

    assert!(matches!(parsed.saved_at, Field::Valid(_)));
    assert_eq!(parsed.width, Field::Valid(48));
    assert_eq!(parsed.next_servant_id, Field::Valid(3));
    assert!(matches!(&parsed.buildings, Field::Valid(list) if list.len() == 1));
}

#[test]
fn bare_save_gets_a_town_center() {
    let scenario = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/frontier.yaml")
        .unwrap();
    let save = save::from_json(r#"{"width": 48, "height": 48, "day": 4, "time": 720.5}"#).unwrap();
    let loaded = save::restore(save, &scenario);
    let world = loaded.settlement;

    assert_eq!(world.day(), 4);
    assert_eq!(world.clock().label(), "12:00");
    assert_eq!(world.structures().built_count(StructureKind::TownCenter), 1);
    assert!(world.servants().is_empty());
}

#[test]
fn corrupted_save_still_loads_with_a_repair_report() {
    let scenario = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/frontier.yaml")
        .unwrap();
    let save = save::from_json(
        r#"{"width": 4000000000, "height": 4000000000, "inventory": {"wood": "lots"},
            "player": {"x": "a"}, "day": "monday"}"#,
    )
    .unwrap();
    let loaded = save::restore(save, &scenario);
    let world = loaded.settlement;

    assert_eq!(world.grid().width(), 48);
    assert_eq!(world.day(), 1);
    assert_eq!(world.inventory().wood, 10);
    assert!(loaded.issues.len() >= 4, "{:?}", loaded.issues);
}

//! End-to-end tests for the designation/job protocol.
//!
//! Exercises: Templates → WorldLayout → SimulationEngine → Idle claims a
//! designation → SatisfyDesignation runs Move / PerformJob / item transfers
//! → areas and the spatial index reflect the result.

use colonysim_core::designation::{DesignationStatus, HaulTarget};
use colonysim_core::prelude::*;
use colonysim_core::recording::{ChangeValue, Property, Subject};
use colonysim_logic::AreaChange;

// ── Helpers ────────────────────────────────────────────────────────────

fn engine(map: &str) -> SimulationEngine {
    let templates = Templates::builtin().unwrap();
    let layout = WorldLayout::parse(map, &templates).unwrap();
    SimulationEngine::new(SimConfig::default(), templates, layout).unwrap()
}

fn status(engine: &SimulationEngine, id: DesignationId) -> DesignationStatus {
    engine.designation(id).unwrap().status
}

fn released(engine: &SimulationEngine, id: DesignationId) -> bool {
    engine
        .changes()
        .for_subject(Subject::Designation(id.0))
        .any(|e| {
            e.property == Property::DesignationStatus
                && e.old == ChangeValue::Label("claimed".into())
                && e.new == ChangeValue::Label("unclaimed".into())
        })
}

fn claims(engine: &SimulationEngine, id: DesignationId) -> usize {
    engine
        .changes()
        .for_subject(Subject::Designation(id.0))
        .filter(|e| {
            e.property == Property::DesignationStatus
                && e.new == ChangeValue::Label("claimed".into())
        })
        .count()
}

const OPEN_5X3: &str = "
    .....
    .....
    .....
";

// ── Claiming ───────────────────────────────────────────────────────────

#[test]
fn test_only_one_actor_claims_a_designation() {
    let mut engine = engine(OPEN_5X3);
    let a = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let b = engine.spawn_actor("settler", GridPos::new(0, 2)).unwrap();
    let id = engine.designate_build(GridPos::new(4, 1)).unwrap();

    engine.update().unwrap();

    let holders: Vec<_> = [a, b]
        .into_iter()
        .filter(|actor| engine.actor_designation(*actor).unwrap() == Some(id))
        .collect();
    assert_eq!(holders, vec![a]);
    assert_eq!(status(&engine, id), DesignationStatus::Claimed(a));
    assert_eq!(engine.actor_states(b).unwrap(), vec!["idle"]);
}

#[test]
fn test_actor_ignores_jobs_it_cannot_do() {
    let mut engine = engine(OPEN_5X3);
    // Foragers only harvest.
    let forager = engine.spawn_actor("forager", GridPos::new(0, 0)).unwrap();
    let id = engine.designate_build(GridPos::new(4, 1)).unwrap();
    engine.run(5).unwrap();
    assert_eq!(status(&engine, id), DesignationStatus::Unclaimed);
    assert_eq!(engine.actor_states(forager).unwrap(), vec!["idle"]);
}

#[test]
fn test_designation_in_another_area_is_not_claimed() {
    let mut engine = engine(
        "
        ..#..
        ..#..
        ",
    );
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let id = engine.designate_build(GridPos::new(4, 0)).unwrap();
    engine.run(5).unwrap();
    assert_eq!(status(&engine, id), DesignationStatus::Unclaimed);
    assert_eq!(engine.actor_position(actor).unwrap(), GridPos::new(0, 0));
}

// ── Jobs ───────────────────────────────────────────────────────────────

#[test]
fn test_harvest_end_to_end() {
    let mut engine = engine(OPEN_5X3);
    let actor = engine.spawn_actor("settler", GridPos::new(0, 1)).unwrap();
    let tree = engine.spawn_interactable("tree", GridPos::new(4, 1)).unwrap();
    let id = engine.designate_nearest_harvest(GridPos::new(0, 1), "tree").unwrap();

    engine.run(20).unwrap();

    assert_eq!(status(&engine, id), DesignationStatus::Completed);
    assert_eq!(engine.harvestable(tree).unwrap().remaining, 1);
    let at = engine.actor_position(actor).unwrap();
    assert!(at.manhattan(GridPos::new(4, 1)) <= 1);
    assert_eq!(engine.items_at(at, "wood").len(), 2);
    assert_eq!(engine.spatial().count(&"wood".to_string()), 2);
    assert_eq!(engine.actor_states(actor).unwrap(), vec!["idle"]);
}

#[test]
fn test_harvest_waits_for_duration() {
    let mut engine = engine(".....");
    engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let bush = engine.spawn_interactable("berry_bush", GridPos::new(1, 0)).unwrap();
    let id = engine.designate_harvest(bush).unwrap();

    // Already in reach: the job starts on tick 0 and takes 10 ticks.
    engine.run(10).unwrap();
    assert_eq!(engine.harvestable(bush).unwrap().remaining, 3);
    engine.run(1).unwrap();
    assert_eq!(engine.harvestable(bush).unwrap().remaining, 2);
    assert_eq!(status(&engine, id), DesignationStatus::Completed);
}

#[test]
fn test_proficiency_scales_job_time() {
    let mut engine = engine(".....");
    // Miners dig at half the base duration of 20 ticks.
    engine.spawn_actor("miner", GridPos::new(0, 0)).unwrap();
    let id = engine.designate_dig(GridPos::new(1, 0)).unwrap();
    engine.set_tile_accessible(GridPos::new(1, 0), false).unwrap();

    engine.run(10).unwrap();
    assert_eq!(status(&engine, id), DesignationStatus::Claimed(engine.actors()[0]));
    engine.run(1).unwrap();
    assert_eq!(status(&engine, id), DesignationStatus::Completed);
    assert!(engine.grid().is_accessible(GridPos::new(1, 0)));
}

#[test]
fn test_dig_merges_areas() {
    let mut engine = engine(
        "
        ..#..
        ..#..
        ..#..
        ",
    );
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    assert_eq!(engine.areas().live_areas().count(), 2);
    let id = engine.designate_dig(GridPos::new(2, 1)).unwrap();

    engine.run(40).unwrap();

    assert_eq!(status(&engine, id), DesignationStatus::Completed);
    assert_eq!(engine.areas().live_areas().count(), 1);
    let grid = engine.grid();
    assert_eq!(grid.area_of(GridPos::new(0, 0)), grid.area_of(GridPos::new(4, 2)));
    assert_eq!(grid.area_of(GridPos::new(2, 1)), grid.area_of(GridPos::new(0, 0)));
    assert_eq!(engine.layout().tile_kind(GridPos::new(2, 1)), Some("floor"));
    assert!(engine.actor_position(actor).unwrap().manhattan(GridPos::new(2, 1)) <= 1);
}

#[test]
fn test_build_splits_areas() {
    let mut engine = engine(".....");
    engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let id = engine.designate_build(GridPos::new(2, 0)).unwrap();

    engine.run(30).unwrap();

    assert_eq!(status(&engine, id), DesignationStatus::Completed);
    assert!(!engine.grid().is_accessible(GridPos::new(2, 0)));
    assert_eq!(engine.areas().live_areas().count(), 2);
    let grid = engine.grid();
    assert_ne!(grid.area_of(GridPos::new(0, 0)), grid.area_of(GridPos::new(4, 0)));
}

#[test]
fn test_blocked_build_releases_designation() {
    let mut engine = engine(".....");
    engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    // A forager has no build skill and idles on the target tile.
    engine.spawn_actor("forager", GridPos::new(2, 0)).unwrap();
    let id = engine.designate_build(GridPos::new(2, 0)).unwrap();

    engine.run(20).unwrap();

    assert!(released(&engine, id));
    assert_ne!(status(&engine, id), DesignationStatus::Completed);
    assert!(engine.grid().is_accessible(GridPos::new(2, 0)));
}

// ── Hauling ────────────────────────────────────────────────────────────

#[test]
fn test_haul_to_ground() {
    let mut engine = engine(OPEN_5X3);
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let wood = engine.spawn_item("wood", GridPos::new(2, 2)).unwrap();
    let id = engine
        .designate_haul(wood, HaulTarget::Ground(GridPos::new(4, 0)))
        .unwrap();

    engine.run(30).unwrap();

    assert_eq!(status(&engine, id), DesignationStatus::Completed);
    assert_eq!(engine.position(wood), Some(GridPos::new(4, 0)));
    assert_eq!(engine.items_at(GridPos::new(4, 0), "wood"), vec![wood]);
    assert!(engine.items_at(GridPos::new(2, 2), "wood").is_empty());
    assert!(engine.held_items(actor).unwrap().is_empty());
}

#[test]
fn test_haul_into_container_until_full() {
    let mut engine = engine(OPEN_5X3);
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let crate_ = engine.spawn_container(GridPos::new(4, 2), 1).unwrap();
    let wood = engine.spawn_item("wood", GridPos::new(2, 2)).unwrap();
    let first = engine
        .designate_haul(wood, HaulTarget::Container(crate_))
        .unwrap();

    engine.run(30).unwrap();

    assert_eq!(status(&engine, first), DesignationStatus::Completed);
    assert_eq!(engine.inventory(crate_).unwrap(), vec![wood]);
    assert_eq!(engine.position(wood), None);
    assert_eq!(engine.spatial().count(&"wood".to_string()), 0);
    assert!(engine.held_items(actor).unwrap().is_empty());

    let stone = engine.spawn_item("stone", GridPos::new(0, 2)).unwrap();
    let second = engine
        .designate_haul(stone, HaulTarget::Container(crate_))
        .unwrap();
    engine.run(10).unwrap();
    assert_eq!(status(&engine, second), DesignationStatus::Unclaimed);
    assert_eq!(engine.position(stone), Some(GridPos::new(0, 2)));
}

#[test]
fn test_failed_haul_drops_item_and_releases() {
    let mut engine = engine(".....");
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let wood = engine.spawn_item("wood", GridPos::new(1, 0)).unwrap();
    let id = engine
        .designate_haul(wood, HaulTarget::Ground(GridPos::new(4, 0)))
        .unwrap();

    // Tick 0 picks the item up; the wall then cuts the drop-off away.
    engine.run(1).unwrap();
    assert_eq!(engine.held_items(actor).unwrap(), vec![wood]);
    engine.set_tile_accessible(GridPos::new(3, 0), false).unwrap();
    engine.run(1).unwrap();

    assert!(released(&engine, id));
    assert_eq!(status(&engine, id), DesignationStatus::Unclaimed);
    assert_eq!(engine.position(wood), Some(GridPos::new(0, 0)));
    assert!(engine.held_items(actor).unwrap().is_empty());
    assert_eq!(engine.actor_states(actor).unwrap(), vec!["idle"]);

    // The drop-off is now in another area, so nobody takes it again.
    engine.run(20).unwrap();
    assert_eq!(claims(&engine, id), 1);
    assert_eq!(status(&engine, id), DesignationStatus::Unclaimed);
}

#[test]
fn test_unreachable_haul_is_left_for_reachable_work() {
    let mut engine = engine(
        "
        ...#...
        #######
        ",
    );
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let wood = engine.spawn_item("wood", GridPos::new(1, 0)).unwrap();
    let haul = engine
        .designate_haul(wood, HaulTarget::Ground(GridPos::new(5, 0)))
        .unwrap();
    let dig = engine.designate_dig(GridPos::new(2, 1)).unwrap();

    engine.run(300).unwrap();

    assert_eq!(status(&engine, dig), DesignationStatus::Completed);
    assert_eq!(status(&engine, haul), DesignationStatus::Unclaimed);
    assert_eq!(claims(&engine, haul), 0);
    assert_eq!(engine.position(wood), Some(GridPos::new(1, 0)));
    assert!(engine.held_items(actor).unwrap().is_empty());
    assert_eq!(engine.actor_states(actor).unwrap(), vec!["idle"]);
}

// ── Movement ───────────────────────────────────────────────────────────

#[test]
fn test_move_to_unreachable_sentinel_is_an_error() {
    let mut engine = engine(OPEN_5X3);
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    assert!(matches!(
        engine.order_move(actor, Destination::Unreachable),
        Err(EngineError::InvalidDestination)
    ));
}

#[test]
fn test_move_replans_around_new_wall() {
    let mut engine = engine(OPEN_5X3);
    let actor = engine.spawn_actor("forager", GridPos::new(0, 1)).unwrap();
    engine
        .order_move(actor, Destination::Point(GridPos::new(4, 1)))
        .unwrap();

    engine.update().unwrap();
    assert_eq!(engine.actor_position(actor).unwrap(), GridPos::new(1, 1));

    let change = engine.set_tile_accessible(GridPos::new(2, 1), false).unwrap();
    assert!(matches!(change, AreaChange::Removed(_)));
    engine.run(20).unwrap();

    assert_eq!(engine.actor_position(actor).unwrap(), GridPos::new(4, 1));
    assert_eq!(engine.actor_states(actor).unwrap(), vec!["idle"]);
    let mover = engine.world.get::<&Mover>(actor).unwrap();
    assert!(!mover.is_moving());
    assert_eq!(mover.destination, None);
}

#[test]
fn test_move_without_path_fails_back_to_idle() {
    let mut engine = engine("..#..");
    let actor = engine.spawn_actor("forager", GridPos::new(0, 0)).unwrap();
    engine
        .order_move(actor, Destination::Point(GridPos::new(4, 0)))
        .unwrap();
    engine.run(3).unwrap();
    assert_eq!(engine.actor_position(actor).unwrap(), GridPos::new(0, 0));
    assert_eq!(engine.actor_states(actor).unwrap(), vec!["idle"]);
}

#[test]
fn test_actor_spatial_membership_follows_movement() {
    let mut engine = engine(OPEN_5X3);
    let actor = engine.spawn_actor("forager", GridPos::new(0, 0)).unwrap();
    engine
        .order_move(actor, Destination::Point(GridPos::new(4, 2)))
        .unwrap();
    engine.run(10).unwrap();
    assert_eq!(
        engine.find_nearest(GridPos::new(4, 2), "actor").unwrap(),
        (GridPos::new(4, 2), actor)
    );
    let occupants = &engine.grid().tile(GridPos::new(4, 2)).unwrap().occupants;
    assert_eq!(occupants, &vec![actor.to_bits().get()]);
    assert!(engine.grid().tile(GridPos::new(0, 0)).unwrap().occupants.is_empty());
}

#[test]
fn test_interrupt_releases_claim() {
    let mut engine = engine(OPEN_5X3);
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    let id = engine.designate_build(GridPos::new(4, 2)).unwrap();
    engine.update().unwrap();
    assert_eq!(engine.actor_designation(actor).unwrap(), Some(id));

    assert!(engine.interrupt_actor(actor).unwrap());
    assert_eq!(engine.actor_states(actor).unwrap(), vec!["idle"]);
    assert_eq!(status(&engine, id), DesignationStatus::Unclaimed);
}

// ── Recording ──────────────────────────────────────────────────────────

#[test]
fn test_recording_round_trip_after_a_run() {
    let mut engine = engine(OPEN_5X3);
    let actor = engine.spawn_actor("settler", GridPos::new(0, 0)).unwrap();
    engine.designate_dig(GridPos::new(3, 1)).unwrap();
    engine.set_tile_accessible(GridPos::new(3, 1), false).unwrap();
    engine.run(40).unwrap();

    let moves = engine
        .changes()
        .for_subject(Subject::Entity(actor))
        .filter(|e| e.property == Property::Position)
        .count();
    assert!(moves > 0);

    let mut buffer = Vec::new();
    engine.changes().save(&mut buffer).unwrap();
    let loaded = ChangeLog::load(buffer.as_slice()).unwrap();
    assert_eq!(loaded.events(), engine.changes().events());

    let drained = engine.drain_changes();
    assert_eq!(drained.len(), loaded.len());
    assert!(engine.changes().is_empty());
}

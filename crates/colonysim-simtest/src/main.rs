//! ColonySim Headless Simulation Harness
//!
//! Builds a seeded cave world, populates it with actors and work orders,
//! runs it for a fixed number of ticks and validates engine invariants.
//! Runs entirely in-process with no rendering.
//!
//! Usage:
//!   cargo run -p colonysim-simtest
//!   cargo run -p colonysim-simtest -- --verbose --ticks 2000 --seed 9
//!   cargo run -p colonysim-simtest -- --templates my_templates.json

use std::collections::{HashMap, HashSet, VecDeque};

use colonysim_core::designation::{DesignationStatus, HaulTarget};
use colonysim_core::prelude::*;
use colonysim_logic::{
    AreaChange, AreaManager, GridPos as Pos, PathfindRequest, Pathfinder, SearchState, SpatialTree,
    TileGrid,
};
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

// ── Command line ────────────────────────────────────────────────────────

struct Options {
    verbose: bool,
    ticks: u64,
    seed: u64,
    templates: Option<String>,
}

impl Options {
    fn parse() -> Self {
        let mut options = Options {
            verbose: false,
            ticks: 1_500,
            seed: 7,
            templates: None,
        };
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--verbose" => options.verbose = true,
                "--ticks" => {
                    if let Some(n) = args.next().and_then(|v| v.parse().ok()) {
                        options.ticks = n;
                    }
                }
                "--seed" => {
                    if let Some(n) = args.next().and_then(|v| v.parse().ok()) {
                        options.seed = n;
                    }
                }
                "--templates" => options.templates = args.next(),
                other => eprintln!("ignoring unknown argument {}", other),
            }
        }
        options
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

fn main() {
    let options = Options::parse();
    let default_filter = if options.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    println!("=== ColonySim Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Template data
    let templates = match load_templates(&options) {
        Ok(t) => t,
        Err(e) => {
            println!("  ✗ templates_parse: {}", e);
            std::process::exit(1);
        }
    };
    results.extend(validate_templates(&templates));

    // 2. Area maintenance under random edits
    results.extend(validate_area_maintenance(options.seed));

    // 3. Sliced search agrees with single-shot search
    results.extend(validate_pathfinding(&templates, options.seed));

    // 4. Spatial index nearest lookups
    results.extend(validate_spatial_index(options.seed));

    // 5. Full colony run
    results.extend(validate_colony_run(&templates, &options));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || options.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn load_templates(options: &Options) -> Result<Templates, String> {
    match &options.templates {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
            Templates::from_json(&json).map_err(|e| e.to_string())
        }
        None => Templates::builtin().map_err(|e| e.to_string()),
    }
}

fn component_count(grid: &TileGrid) -> usize {
    let mut seen = HashSet::new();
    let mut count = 0;
    for tile in grid.tiles().filter(|t| t.accessible) {
        if !seen.insert(tile.pos) {
            continue;
        }
        count += 1;
        let mut queue = VecDeque::from([tile.pos]);
        while let Some(pos) = queue.pop_front() {
            for n in grid.accessible_neighbours(pos) {
                if seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
    }
    count
}

/// Returns a description of the first partition defect found.
fn partition_defect(grid: &TileGrid, areas: &AreaManager) -> Option<String> {
    let mut ids = HashSet::new();
    for tile in grid.tiles() {
        if tile.accessible == tile.area.is_wall() {
            return Some(format!("tile {} accessible={} area={:?}", tile.pos, tile.accessible, tile.area));
        }
        if !tile.accessible {
            continue;
        }
        ids.insert(tile.area);
        if let Some(n) = grid
            .accessible_neighbours(tile.pos)
            .find(|n| grid.area_of(*n) != tile.area)
        {
            return Some(format!("neighbours {} and {} in different areas", tile.pos, n));
        }
    }
    let components = component_count(grid);
    if ids.len() != components {
        return Some(format!("{} area ids for {} components", ids.len(), components));
    }
    let live = areas.live_areas().count();
    if live != components {
        return Some(format!("{} live areas for {} components", live, components));
    }
    None
}

// ── 1. Templates ────────────────────────────────────────────────────────

fn validate_templates(templates: &Templates) -> Vec<TestResult> {
    println!("--- Templates ---");
    let mut results = Vec::new();

    // Haul is made of take/place/drop steps and has no timing of its own
    let timed = [
        ActionType::Walk,
        ActionType::Harvest,
        ActionType::Dig,
        ActionType::Build,
        ActionType::TakeItem,
        ActionType::PlaceItem,
        ActionType::DropItem,
    ];
    let missing: Vec<_> = timed
        .iter()
        .filter(|a| templates.duration(**a).is_none())
        .map(|a| a.name())
        .collect();
    results.push(TestResult::new(
        "template_action_timings",
        missing.is_empty(),
        if missing.is_empty() {
            "every timed action has a base duration".to_string()
        } else {
            format!("no timing for {:?}", missing)
        },
    ));

    let open = templates.tile_with_access(true);
    let closed = templates.tile_with_access(false);
    results.push(TestResult::new(
        "template_tile_kinds",
        open.is_some() && closed.is_some(),
        format!("open={:?} closed={:?}", open, closed),
    ));

    let settler = templates.actor("settler");
    results.push(TestResult::new(
        "template_settler_present",
        settler.is_ok(),
        match settler {
            Ok(_) => "settler template found".to_string(),
            Err(e) => e.to_string(),
        },
    ));

    results
}

// ── 2. Area maintenance ─────────────────────────────────────────────────

fn validate_area_maintenance(seed: u64) -> Vec<TestResult> {
    println!("--- Area Maintenance ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut grid = TileGrid::from_fn(20, 14, |_| rng.gen_bool(0.7));
    let mut areas = AreaManager::build(&mut grid);
    results.push(TestResult::new(
        "areas_initial_partition",
        partition_defect(&grid, &areas).is_none(),
        format!("{} areas after build", areas.live_areas().count()),
    ));

    let mut defect = None;
    let mut changes: HashMap<&'static str, usize> = HashMap::new();
    for step in 0..500 {
        let pos = Pos::new(rng.gen_range(0..20), rng.gen_range(0..14));
        let open = !grid.is_accessible(pos);
        match areas.set_accessible(&mut grid, pos, open) {
            Ok(change) => {
                let label = match change {
                    AreaChange::Unchanged => "unchanged",
                    AreaChange::Created(_) => "created",
                    AreaChange::Joined(_) => "joined",
                    AreaChange::Merged { .. } => "merged",
                    AreaChange::Removed(_) => "removed",
                    AreaChange::Split { .. } => "split",
                };
                *changes.entry(label).or_default() += 1;
            }
            Err(e) => {
                defect = Some(format!("step {}: {}", step, e));
                break;
            }
        }
        if let Some(d) = partition_defect(&grid, &areas) {
            defect = Some(format!("step {}: {}", step, d));
            break;
        }
    }
    info!("area edits by outcome: {:?}", changes);
    results.push(TestResult::new(
        "areas_partition_after_edits",
        defect.is_none(),
        defect.unwrap_or_else(|| format!("500 edits consistent ({} splits)", changes.get("split").unwrap_or(&0))),
    ));

    results
}

// ── 3. Pathfinding ──────────────────────────────────────────────────────

fn validate_pathfinding(templates: &Templates, seed: u64) -> Vec<TestResult> {
    println!("--- Pathfinding ---");
    let mut results = Vec::new();

    let cave = CaveConfig {
        seed,
        ..Default::default()
    };
    let layout = match generate_cave(&cave, templates) {
        Ok(l) => l,
        Err(e) => {
            results.push(TestResult::new("path_cave_generation", false, e.to_string()));
            return results;
        }
    };
    let mut grid = layout.to_grid();
    AreaManager::build(&mut grid);
    let open: Vec<Pos> = layout.open_tiles().collect();
    let mut rng = StdRng::seed_from_u64(seed ^ 0xA5A5);

    let mut mismatches = 0;
    let mut reachable_failures = 0;
    let mut searches = 0;
    for _ in 0..60 {
        let (Some(&start), Some(&goal)) = (open.choose(&mut rng), open.choose(&mut rng)) else {
            break;
        };
        let request = PathfindRequest::to_point(start, goal, searches);
        searches += 1;

        let mut whole = Pathfinder::new();
        whole.new_search(request.clone());
        let whole_state = whole.run_to_completion(&grid);

        let mut sliced = Pathfinder::new();
        sliced.new_search(request);
        let mut sliced_state = SearchState::Searching;
        while !sliced_state.is_terminal() {
            sliced_state = sliced.step(&grid, 5);
        }

        let same_length = match (whole.final_result(), sliced.final_result()) {
            (Ok(a), Ok(b)) => a.directions.len() == b.directions.len(),
            (Err(_), Err(_)) => true,
            _ => false,
        };
        if whole_state != sliced_state || !same_length {
            mismatches += 1;
        }
        let connected = AreaManager::reachable(&grid, start, goal);
        if connected != (whole_state == SearchState::Succeeded) {
            reachable_failures += 1;
        }
    }

    results.push(TestResult::new(
        "path_sliced_matches_whole",
        mismatches == 0,
        format!("{} searches, {} mismatches", searches, mismatches),
    ));
    results.push(TestResult::new(
        "path_success_matches_areas",
        reachable_failures == 0,
        format!("{} searches disagreed with area ids", reachable_failures),
    ));

    results
}

// ── 4. Spatial index ────────────────────────────────────────────────────

fn validate_spatial_index(seed: u64) -> Vec<TestResult> {
    println!("--- Spatial Index ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5A5A);

    let mut tree: SpatialTree<String, u32> = match SpatialTree::initialise(40, 30, &[4, 3, 2]) {
        Ok(t) => t,
        Err(e) => {
            results.push(TestResult::new("spatial_initialise", false, e.to_string()));
            return results;
        }
    };
    let mut placed = Vec::new();
    for id in 0..80 {
        let pos = Pos::new(rng.gen_range(0..40), rng.gen_range(0..30));
        let key = if id % 3 == 0 { "stone" } else { "wood" }.to_string();
        if tree.add(pos, key.clone(), id).is_ok() {
            placed.push((pos, key, id));
        }
    }

    let mut wrong = 0;
    for _ in 0..100 {
        let query = Pos::new(rng.gen_range(0..40), rng.gen_range(0..30));
        let key = "stone".to_string();
        let best = placed
            .iter()
            .filter(|(_, k, _)| *k == key)
            .map(|(p, _, _)| p.manhattan(query))
            .min();
        let found = tree.find_closest(query, &key).ok().map(|(p, _)| p.manhattan(query));
        if best != found {
            wrong += 1;
        }
    }
    results.push(TestResult::new(
        "spatial_nearest_exact",
        wrong == 0,
        format!("{} of 100 queries returned a farther member", wrong),
    ));

    let stones = placed.iter().filter(|(_, k, _)| k == "stone").count();
    results.push(TestResult::new(
        "spatial_counts",
        tree.count(&"stone".to_string()) == stones,
        format!("{} stones indexed", stones),
    ));

    results
}

// ── 5. Colony run ───────────────────────────────────────────────────────

fn populate(engine: &mut SimulationEngine, seed: u64) -> Result<usize, EngineError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut open: Vec<Pos> = engine.layout().open_tiles().collect();
    open.shuffle(&mut rng);
    let mut spots = open.into_iter();
    let mut designations = 0;

    for template in ["settler", "settler", "settler", "miner", "miner", "forager"] {
        if let Some(pos) = spots.next() {
            engine.spawn_actor(template, pos)?;
        }
    }
    for template in ["tree", "tree", "berry_bush", "berry_bush"] {
        if let Some(pos) = spots.next() {
            let target = engine.spawn_interactable(template, pos)?;
            engine.designate_harvest(target)?;
            designations += 1;
        }
    }
    let width = engine.grid().width() as i32;
    let height = engine.grid().height() as i32;
    let rock: Vec<Pos> = (1..height - 1)
        .flat_map(|y| (1..width - 1).map(move |x| Pos::new(x, y)))
        .filter(|p| {
            !engine.grid().is_accessible(*p) && engine.grid().accessible_neighbours(*p).next().is_some()
        })
        .take(6)
        .collect();
    for pos in rock {
        engine.designate_dig(pos)?;
        designations += 1;
    }
    let bin = match spots.next() {
        Some(pos) => Some(engine.spawn_container(pos, 4)?),
        None => None,
    };
    for kind in ["stone", "wood", "stone"] {
        let (Some(at), Some(to)) = (spots.next(), spots.next()) else {
            break;
        };
        let item = engine.spawn_item(kind, at)?;
        let target = match bin {
            Some(bin) if kind == "stone" => HaulTarget::Container(bin),
            _ => HaulTarget::Ground(to),
        };
        engine.designate_haul(item, target)?;
        designations += 1;
    }
    Ok(designations)
}

fn validate_colony_run(templates: &Templates, options: &Options) -> Vec<TestResult> {
    println!("--- Colony Run ---");
    let mut results = Vec::new();

    let config = SimConfig::default();
    if options.verbose {
        if let Ok(json) = serde_json::to_string_pretty(&config) {
            println!("{}", json);
        }
    }
    let cave = CaveConfig {
        seed: options.seed,
        ..Default::default()
    };
    let setup = generate_cave(&cave, templates)
        .map_err(EngineError::from)
        .and_then(|layout| SimulationEngine::new(config, templates.clone(), layout))
        .and_then(|mut engine| populate(&mut engine, options.seed).map(|n| (engine, n)));
    let (mut engine, designated) = match setup {
        Ok(s) => s,
        Err(e) => {
            results.push(TestResult::new("colony_setup", false, e.to_string()));
            return results;
        }
    };
    info!("colony populated with {} designations", designated);

    let mut violation = None;
    for _ in 0..options.ticks {
        if let Err(e) = engine.update() {
            violation = Some(format!("tick {}: {}", engine.tick(), e));
            break;
        }
        if let Some(v) = claim_violation(&engine) {
            violation = Some(format!("tick {}: {}", engine.tick(), v));
            break;
        }
    }
    results.push(TestResult::new(
        "colony_claims_exclusive",
        violation.is_none(),
        violation.unwrap_or_else(|| format!("{} ticks without double claims", options.ticks)),
    ));

    let completed = engine.designations().completed_count();
    results.push(TestResult::new(
        "colony_work_completed",
        completed > 0,
        format!("{} of {} designations completed", completed, designated),
    ));

    let defect = partition_defect(engine.grid(), engine.areas());
    results.push(TestResult::new(
        "colony_partition_consistent",
        defect.is_none(),
        defect.unwrap_or_else(|| format!("{} areas", engine.areas().live_areas().count())),
    ));

    let mut buffer = Vec::new();
    let round_trip = engine
        .changes()
        .save(&mut buffer)
        .and_then(|_| ChangeLog::load(buffer.as_slice()));
    results.push(TestResult::new(
        "colony_recording_round_trip",
        matches!(&round_trip, Ok(log) if log.events() == engine.changes().events()),
        match &round_trip {
            Ok(log) => format!("{} events, {} bytes", log.len(), buffer.len()),
            Err(e) => e.to_string(),
        },
    ));

    results
}

fn claim_violation(engine: &SimulationEngine) -> Option<String> {
    let mut held = HashMap::new();
    for actor in engine.actors() {
        if let Ok(Some(id)) = engine.actor_designation(actor) {
            if held.insert(id, actor).is_some() {
                return Some(format!("{} held by two actors", id));
            }
        }
    }
    engine.designations().iter().find_map(|d| match d.status {
        DesignationStatus::Claimed(actor) if held.get(&d.id) != Some(&actor) => {
            Some(format!("{} claimed by {:?} which is not working on it", d.id, actor))
        }
        _ => None,
    })
}

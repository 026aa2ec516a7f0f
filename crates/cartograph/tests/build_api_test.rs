use std::collections::{HashSet, VecDeque};

use proptest::prelude::*;

use cartograph::{
    CartographError, Direction, EntityId, EntityKind, WorldBuilder, assemble,
    config::AppConfig,
    recipe::{ItemSpec, PlotKind, PlotSpec, WorldRecipe},
    report::ProblemCode,
};

const TWO_ROOMS: &str = r#"
thing(start).self.kind="plot".self.name="Start".self.region="R"
thing(start).east.leadsTo="east-room"
thing("east-room").self.kind="plot".self.name="East Room".self.region="R"
    .self.locationX=1.self.locationY=0
"#;

const MANOR: &str = r#"
thing(settings).self.kind="game".self.seed=7.self.preamble="It begins."
thing(hall).self.name="Hall".self.start=true.self.contains=["lamp"]
    .north.leadsTo="library".north.keyExpression="has(brass-key)"
    .desk.name="Desk".desk.contains=["letter"]
thing(library).self.name="Library"
    .south.leadsTo="hall".south.visible=false
thing(limbo).self.abstract=true
thing(lamp).self.kind="item".self.footprint=2
thing(letter).self.kind="item"
thing(satchel).self.kind="item".self.capacity=3.self.owner="hero"
actor(hero).self.player=true.self.owner="hall".self.skills=["read"]
"#;

fn plot_id(key: &str) -> EntityId {
    EntityId::derive(EntityKind::Plot, key)
}

fn item(key: &str, owner: EntityId) -> ItemSpec {
    ItemSpec {
        id: EntityId::derive(EntityKind::Item, key),
        key: key.to_string(),
        name: key.to_string(),
        description: None,
        owner: Some(owner),
        visible: true,
        footprint: 1,
        capacity: None,
    }
}

fn grid_recipe(cells: &[(i64, i64)]) -> WorldRecipe {
    let plots: Vec<PlotSpec> = cells
        .iter()
        .map(|(x, y)| {
            let key = format!("cell-{x}-{y}");
            PlotSpec {
                id: plot_id(&key),
                key: key.clone(),
                name: key,
                region: None,
                x: *x,
                y: *y,
                description: None,
                kind: PlotKind::Land,
            }
        })
        .collect();
    WorldRecipe {
        start_plot: plots.first().map(|plot| plot.id),
        plots,
        ..WorldRecipe::default()
    }
}

#[test]
fn test_round_trip_builds_cleanly() {
    let builder = WorldBuilder::default();
    let (world, report) = builder.build_source(TWO_ROOMS).unwrap();
    assert!(report.is_empty());

    assert_eq!(world.plots().count(), 2);
    assert_eq!(world.gates().count(), 1);
    assert_eq!(world.start(), Some(plot_id("start")));

    let gate = world.gate_at(plot_id("start"), Direction::East).unwrap();
    assert!(!gate.synthesized);
    assert_eq!(
        world.gate_at(plot_id("east-room"), Direction::West).map(|gate| gate.id),
        Some(gate.id)
    );
}

#[test]
fn test_full_world_builds_cleanly() {
    let builder = WorldBuilder::new(AppConfig::default().with_bill_of_materials(true));
    let (world, _) = builder.build_source(MANOR).unwrap();

    // hall/north plus the reverse library/south folded into it, and one
    // synthesized gate between hall (0, 0) and library (1, 0).
    assert_eq!(world.gates().count(), 2);
    assert_eq!(world.gates().filter(|gate| gate.synthesized).count(), 1);
    assert_eq!(world.items().count(), 4);
    assert_eq!(world.actors().count(), 1);
}

#[test]
fn test_compile_error_surfaces_through_builder() {
    let err = WorldBuilder::default()
        .build_source("thing(a).self")
        .unwrap_err();
    assert!(matches!(err, CartographError::Compile(_)));
}

#[test]
fn test_gap_fill_does_not_override_authored_gate() {
    let source = r#"
        thing(hall).self.name="Hall".self.start=true
            .east.leadsTo="cellar"
        thing(cellar).self.name="Cellar".self.locationX=5.self.locationY=5
        thing(library).self.name="Library".self.locationX=1.self.locationY=0
    "#;
    let recipe = WorldBuilder::default().compile(source).unwrap();
    let world = assemble::assemble(&recipe).unwrap();

    let east = world.gate_at(plot_id("hall"), Direction::East).unwrap();
    assert_eq!(east.other_side(plot_id("hall")), Some(plot_id("cellar")));
    assert!(world.gates().all(|gate| !gate.synthesized));
    assert!(world.slot_free(plot_id("library"), Direction::West));
}

#[test]
fn test_abstract_plot_does_not_split_auto_layout_row() {
    let source = r#"
        thing(a).self.start=true
        thing(b).self.abstract=true
        thing(c).self.name="C"
    "#;
    let (world, report) = WorldBuilder::default().build_source(source).unwrap();

    assert!(report.is_empty());
    let east = world.gate_at(plot_id("a"), Direction::East).unwrap();
    assert!(east.synthesized);
    assert_eq!(east.other_side(plot_id("a")), Some(plot_id("c")));
}

#[test]
fn test_unreachable_library_blocks_build() {
    let source = r#"
        thing(hall).self.name="Hall".self.start=true
            .east.leadsTo="cellar"
        thing(cellar).self.name="Cellar".self.locationX=5.self.locationY=5
        thing(library).self.name="Library".self.locationX=1.self.locationY=0
    "#;
    let builder = WorldBuilder::default();
    let recipe = builder.compile(source).unwrap();
    let err = builder.build(&recipe).unwrap_err();

    let report = err.report();
    assert_eq!(report.len(), 1);
    assert_eq!(report.problems()[0].code(), ProblemCode::UnreachablePlot);
    assert_eq!(report.problems()[0].entity_id(), Some(plot_id("library")));
}

#[test]
fn test_ownership_cycle_reported_once() {
    let mut recipe = grid_recipe(&[(0, 0)]);
    let box_a = EntityId::derive(EntityKind::Item, "box-a");
    let box_b = EntityId::derive(EntityKind::Item, "box-b");
    recipe.items.push(item("box-a", box_b));
    recipe.items.push(item("box-b", box_a));

    let err = WorldBuilder::default().build(&recipe).unwrap_err();
    assert_eq!(err.report().len(), 1);
    assert_eq!(
        err.report().problems()[0].code(),
        ProblemCode::OwnershipCycle
    );
}

#[test]
fn test_both_passes_report_into_one_build_error() {
    let mut recipe = grid_recipe(&[(0, 0)]);
    recipe
        .items
        .push(item("lamp", EntityId::derive(EntityKind::Plot, "nonexistent")));

    let err = WorldBuilder::default().build(&recipe).unwrap_err();
    let report = err.report();

    assert!(report.contains_code(ProblemCode::OwnerNotFound));
    assert!(report.contains_code(ProblemCode::DanglingOwner));
    assert_eq!(report.problems()[0].code(), ProblemCode::OwnerNotFound);
    assert_eq!(err.to_string(), "world build failed with 2 problem(s)");
}

#[test]
fn test_root_collision_is_a_build_exception() {
    let mut recipe = grid_recipe(&[(0, 0)]);
    recipe.plots[0].id = EntityId::world_root();
    recipe.start_plot = Some(EntityId::world_root());

    let err = WorldBuilder::default().build(&recipe).unwrap_err();
    assert!(err.report().contains_code(ProblemCode::BuildException));
}

#[test]
fn test_config_from_toml() {
    let config: AppConfig = toml::from_str("[report]\nbill_of_materials = true\n").unwrap();
    assert!(config.report().bill_of_materials());

    let config: AppConfig = toml::from_str("").unwrap();
    assert!(!config.report().bill_of_materials());
}

/// Plots of `cells` reachable from the first cell over 4-neighbour adjacency.
fn grid_component(cells: &[(i64, i64)]) -> usize {
    let all: HashSet<(i64, i64)> = cells.iter().copied().collect();
    let mut seen = HashSet::from([cells[0]]);
    let mut queue = VecDeque::from([cells[0]]);
    while let Some((x, y)) = queue.pop_front() {
        for next in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
            if all.contains(&next) && seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen.len()
}

fn cell_set() -> impl Strategy<Value = Vec<(i64, i64)>> {
    proptest::collection::hash_set((0i64..5, 0i64..5), 1..20)
        .prop_map(|cells| cells.into_iter().collect())
}

proptest! {
    #[test]
    fn gate_slots_are_a_bijection(cells in cell_set()) {
        let world = assemble::build_map(&grid_recipe(&cells)).unwrap();

        for gate in world.gates() {
            let a = world.gate_at(gate.plot_a, gate.direction).map(|found| found.id);
            let b = world
                .gate_at(gate.plot_b, gate.direction.opposite())
                .map(|found| found.id);
            prop_assert_eq!(a, Some(gate.id));
            prop_assert_eq!(b, Some(gate.id));
        }
        for plot in world.plots() {
            for (direction, gate) in &plot.gates {
                let gate = world.gate(*gate).unwrap();
                let on_a = gate.plot_a == plot.id && gate.direction == *direction;
                let on_b = gate.plot_b == plot.id && gate.direction.opposite() == *direction;
                prop_assert!(on_a || on_b);
            }
        }
    }

    #[test]
    fn gap_filled_grid_reaches_its_component(cells in cell_set()) {
        let recipe = grid_recipe(&cells);
        let unreachable = match WorldBuilder::default().build(&recipe) {
            Ok(_) => 0,
            Err(err) => err.report().count_code(ProblemCode::UnreachablePlot),
        };
        prop_assert_eq!(unreachable, cells.len() - grid_component(&cells));
    }
}

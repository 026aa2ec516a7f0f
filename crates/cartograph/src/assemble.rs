//! World assembly: turn a [`WorldRecipe`] into a [`Graph`].
//!
//! The assembler is permissive. Recipe defects such as duplicate ids,
//! incomplete gates, or occupied slots are logged and skipped so that tooling
//! can assemble unvalidated recipes; the validators are the strict layer.
//! Only a failure that leaves the whole phase unable to proceed is returned
//! as an [`AssembleError`].

use std::collections::{BTreeMap, HashMap, hash_map::Entry};

use log::{debug, info, trace, warn};
use thiserror::Error;

use cartograph_core::{
    Direction, EntityId, EntityKind,
    recipe::{ActorSpec, FixtureSpec, GateSpec, ItemSpec, PlotSpec, WorldRecipe},
};

use crate::graph::{ActorNode, GateNode, Graph, GraphError, ItemClass, ItemNode, PlotNode};

/// Directions examined by gap-filling; each adjacent pair is seen once.
const GAP_FILL_DIRECTIONS: [Direction; 2] = [Direction::East, Direction::South];

const SYNTHESIZED_DESCRIPTION: &str = "Automatically generated connection.";

/// Key expression of gates that are always open.
const OPEN_KEY_EXPRESSION: &str = "true";

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("{kind} `{key}` has the id reserved for the world root")]
    RootCollision { kind: EntityKind, key: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

fn check_root(
    graph: &Graph,
    id: EntityId,
    kind: EntityKind,
    key: &str,
) -> Result<(), AssembleError> {
    if id == graph.root() {
        return Err(AssembleError::RootCollision {
            kind,
            key: key.to_string(),
        });
    }
    Ok(())
}

fn plot_node(spec: &PlotSpec, root: EntityId) -> PlotNode {
    PlotNode {
        id: spec.id,
        key: spec.key.clone(),
        name: spec.name.clone(),
        region: spec.region.clone(),
        x: spec.x,
        y: spec.y,
        description: spec.description.clone(),
        kind: spec.kind,
        owner: root,
        gates: BTreeMap::new(),
    }
}

/// The gate node for a complete gate spec; `None` if a field is missing.
fn gate_node(spec: &GateSpec) -> Option<GateNode> {
    Some(GateNode {
        id: spec.id,
        key: spec.key.clone(),
        plot_a: spec.from_plot?,
        plot_b: spec.to_plot?,
        direction: spec.direction?,
        visible: spec.visible,
        key_expression: spec.key_expression.clone(),
        label: spec.label.clone(),
        description: spec.description.clone(),
        synthesized: false,
    })
}

/// Register plots and authored gates, then fill grid gaps.
pub fn build_map(recipe: &WorldRecipe) -> Result<Graph, AssembleError> {
    info!(plots = recipe.plots.len(), gates = recipe.gates.len(); "Building map");
    let mut graph = Graph::new(EntityId::world_root());

    for spec in &recipe.plots {
        check_root(&graph, spec.id, EntityKind::Plot, &spec.key)?;
        match graph.insert_plot(plot_node(spec, graph.root())) {
            Ok(()) => trace!(key = spec.key.as_str(), x = spec.x, y = spec.y; "Plot registered"),
            Err(err) => warn!(key = spec.key.as_str(), err:%; "Skipping plot"),
        }
    }

    for spec in &recipe.gates {
        check_root(&graph, spec.id, EntityKind::Gate, &spec.key)?;
        let Some(gate) = gate_node(spec) else {
            warn!(key = spec.key.as_str(); "Skipping incomplete gate");
            continue;
        };
        let reverse = graph
            .gate_at(gate.plot_a, gate.direction)
            .is_some_and(|existing| existing.other_side(gate.plot_a) == Some(gate.plot_b));
        if reverse {
            debug!(key = spec.key.as_str(); "Gate already joins these plots");
            continue;
        }
        match graph.connect(gate) {
            Ok(()) => trace!(key = spec.key.as_str(); "Gate connected"),
            Err(err) => warn!(key = spec.key.as_str(), err:%; "Skipping gate"),
        }
    }

    let synthesized = fill_gaps(&mut graph)?;
    graph.set_start(recipe.start_plot);

    debug!(nodes = graph.len(), synthesized; "Map built");
    Ok(graph)
}

/// Connect grid-adjacent land plots that have no gate between them.
///
/// A gate is synthesized only when the slot on both plots is free, so an
/// authored gate in either direction is never overridden.
fn fill_gaps(graph: &mut Graph) -> Result<usize, AssembleError> {
    let land: Vec<(EntityId, String, String, i64, i64)> = graph
        .plots()
        .filter(|plot| plot.kind.is_land())
        .map(|plot| (plot.id, plot.key.clone(), plot.name.clone(), plot.x, plot.y))
        .collect();

    let mut cells: HashMap<(i64, i64), usize> = HashMap::new();
    for (index, (_, key, _, x, y)) in land.iter().enumerate() {
        match cells.entry((*x, *y)) {
            Entry::Vacant(cell) => {
                cell.insert(index);
            }
            Entry::Occupied(cell) => {
                let holder = &land[*cell.get()].1;
                warn!(
                    key = key.as_str(), holder = holder.as_str(), x = *x, y = *y;
                    "Plot shares a grid cell, not gap-filled"
                );
            }
        }
    }

    let mut synthesized = 0;
    for (id, key, name, x, y) in &land {
        for direction in GAP_FILL_DIRECTIONS {
            let Some((dx, dy)) = direction.offset() else {
                continue;
            };
            let (Some(nx), Some(ny)) = (x.checked_add(dx), y.checked_add(dy)) else {
                continue;
            };
            let Some(&neighbor) = cells.get(&(nx, ny)) else {
                continue;
            };
            let (other_id, other_key, other_name, _, _) = &land[neighbor];

            if !graph.slot_free(*id, direction) || !graph.slot_free(*other_id, direction.opposite())
            {
                continue;
            }

            let gate_key = format!("auto/{key}/{direction}/{other_key}");
            graph.connect(GateNode {
                id: EntityId::derive(EntityKind::Gate, &gate_key),
                plot_a: *id,
                plot_b: *other_id,
                direction,
                visible: true,
                key_expression: Some(OPEN_KEY_EXPRESSION.to_string()),
                label: format!("{name} -> {other_name}"),
                description: Some(SYNTHESIZED_DESCRIPTION.to_string()),
                synthesized: true,
                key: gate_key,
            })?;
            trace!(from = key.as_str(), to = other_key.as_str(), direction:?; "Gate synthesized");
            synthesized += 1;
        }
    }

    Ok(synthesized)
}

fn fixture_node(spec: &FixtureSpec) -> Option<ItemNode> {
    Some(ItemNode {
        id: spec.id,
        key: spec.key.clone(),
        name: spec.name.clone(),
        description: spec.description.clone(),
        owner: spec.owner?,
        visible: spec.visible,
        class: ItemClass::Fixture,
    })
}

fn item_node(spec: &ItemSpec) -> Option<ItemNode> {
    Some(ItemNode {
        id: spec.id,
        key: spec.key.clone(),
        name: spec.name.clone(),
        description: spec.description.clone(),
        owner: spec.owner?,
        visible: spec.visible,
        class: ItemClass::Portable {
            footprint: spec.footprint,
            capacity: spec.capacity,
        },
    })
}

fn actor_node(spec: &ActorSpec) -> Option<ActorNode> {
    Some(ActorNode {
        id: spec.id,
        key: spec.key.clone(),
        name: spec.name.clone(),
        description: spec.description.clone(),
        owner: spec.owner?,
        visible: spec.visible,
        player: spec.player,
        skills: spec.skills.clone(),
    })
}

/// Add fixture nodes. Returns how many were placed.
///
/// A fixture without an owner, or whose id is taken, is skipped.
pub fn place_fixtures(recipe: &WorldRecipe, graph: &mut Graph) -> Result<usize, AssembleError> {
    let mut placed = 0;
    for spec in &recipe.fixtures {
        check_root(graph, spec.id, EntityKind::Fixture, &spec.key)?;
        let Some(node) = fixture_node(spec) else {
            warn!(key = spec.key.as_str(); "Skipping fixture without owner");
            continue;
        };
        match graph.insert_item(node) {
            Ok(()) => placed += 1,
            Err(err) => warn!(key = spec.key.as_str(), err:%; "Skipping fixture"),
        }
    }
    debug!(placed, declared = recipe.fixtures.len(); "Fixtures placed");
    Ok(placed)
}

/// Add portable item nodes. Returns how many were placed.
pub fn place_items(recipe: &WorldRecipe, graph: &mut Graph) -> Result<usize, AssembleError> {
    let mut placed = 0;
    for spec in &recipe.items {
        check_root(graph, spec.id, EntityKind::Item, &spec.key)?;
        let Some(node) = item_node(spec) else {
            warn!(key = spec.key.as_str(); "Skipping item without owner");
            continue;
        };
        match graph.insert_item(node) {
            Ok(()) => placed += 1,
            Err(err) => warn!(key = spec.key.as_str(), err:%; "Skipping item"),
        }
    }
    debug!(placed, declared = recipe.items.len(); "Items placed");
    Ok(placed)
}

/// Add actor nodes. Returns how many were placed.
pub fn place_actors(recipe: &WorldRecipe, graph: &mut Graph) -> Result<usize, AssembleError> {
    let mut placed = 0;
    for spec in &recipe.actors {
        check_root(graph, spec.id, EntityKind::Actor, &spec.key)?;
        let Some(node) = actor_node(spec) else {
            warn!(key = spec.key.as_str(); "Skipping actor without owner");
            continue;
        };
        match graph.insert_actor(node) {
            Ok(()) => placed += 1,
            Err(err) => warn!(key = spec.key.as_str(), err:%; "Skipping actor"),
        }
    }
    debug!(placed, declared = recipe.actors.len(); "Actors placed");
    Ok(placed)
}

/// Run every assembly phase.
pub fn assemble(recipe: &WorldRecipe) -> Result<Graph, AssembleError> {
    let mut graph = build_map(recipe)?;
    place_fixtures(recipe, &mut graph)?;
    place_items(recipe, &mut graph)?;
    place_actors(recipe, &mut graph)?;
    info!(nodes = graph.len(); "World assembled");
    Ok(graph)
}

//! Collect-all validators for recipes and assembled worlds.
//!
//! Neither pass stops at the first problem. Each returns a [`Report`] holding
//! every problem it found, in a stable order.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info, trace};

use cartograph_core::{
    Direction, EntityId, EntityKind,
    recipe::{GateSpec, WorldRecipe},
};

use crate::{
    graph::{Graph, Node},
    report::{Problem, ProblemCode, Report},
};

// ============================================================================
// Recipe validation
// ============================================================================

/// Report every id that appears more than once in one category.
fn check_duplicates<'a>(
    report: &mut Report,
    category: EntityKind,
    entries: impl Iterator<Item = (EntityId, &'a str)>,
) -> HashSet<EntityId> {
    let mut seen = HashSet::new();
    for (id, key) in entries {
        if !seen.insert(id) {
            report.push(
                Problem::new(
                    ProblemCode::DuplicateId,
                    category,
                    format!("{category} `{key}` is declared more than once"),
                )
                .with_entity(id),
            );
        }
    }
    seen
}

/// Check an owner reference against the ids of the categories it may name.
fn check_owner(
    report: &mut Report,
    category: EntityKind,
    id: EntityId,
    key: &str,
    owner: Option<EntityId>,
    candidates: &[&HashSet<EntityId>],
) {
    match owner {
        None => report.push(
            Problem::new(
                ProblemCode::OwnerMissing,
                category,
                format!("{category} `{key}` has no owner"),
            )
            .with_entity(id),
        ),
        Some(owner) if !candidates.iter().any(|ids| ids.contains(&owner)) => report.push(
            Problem::new(
                ProblemCode::OwnerNotFound,
                category,
                format!("{category} `{key}` is owned by unknown entity {owner}"),
            )
            .with_entity(id),
        ),
        Some(_) => {}
    }
}

fn check_gate_endpoint(
    report: &mut Report,
    gate: &GateSpec,
    side: &str,
    endpoint: Option<EntityId>,
    plots: &HashSet<EntityId>,
) {
    match endpoint {
        None => report.push(
            Problem::new(
                ProblemCode::GateEndpointMissing,
                EntityKind::Gate,
                format!("gate `{}` has no {side} plot", gate.key),
            )
            .with_entity(gate.id),
        ),
        Some(plot) if !plots.contains(&plot) => report.push(
            Problem::new(
                ProblemCode::GateEndpointUnknown,
                EntityKind::Gate,
                format!("gate `{}` has unknown {side} plot {plot}", gate.key),
            )
            .with_entity(gate.id),
        ),
        Some(_) => {}
    }
}

/// Check every gate; slot conflicts are checked on both endpoints.
///
/// A gate claims `direction` on its origin and the opposite slot on its
/// destination. Two gates may share a slot only when they join the same two
/// plots through it, as an authored gate and its reverse do.
fn check_gates(report: &mut Report, recipe: &WorldRecipe, plots: &HashSet<EntityId>) {
    let mut from_origin: HashSet<(EntityId, Direction)> = HashSet::new();
    let mut claims: HashMap<(EntityId, Direction), EntityId> = HashMap::new();

    for gate in &recipe.gates {
        check_gate_endpoint(report, gate, "origin", gate.from_plot, plots);
        check_gate_endpoint(report, gate, "destination", gate.to_plot, plots);

        if gate
            .key_expression
            .as_deref()
            .is_none_or(|expression| expression.trim().is_empty())
        {
            report.push(
                Problem::new(
                    ProblemCode::GateKeyMissing,
                    EntityKind::Gate,
                    format!("gate `{}` has no key expression", gate.key),
                )
                .with_entity(gate.id),
            );
        }

        let Some(direction) = gate.direction else {
            report.push(
                Problem::new(
                    ProblemCode::GateDirectionMissing,
                    EntityKind::Gate,
                    format!("gate `{}` has no direction", gate.key),
                )
                .with_entity(gate.id),
            );
            continue;
        };
        let (Some(from), Some(to)) = (gate.from_plot, gate.to_plot) else {
            continue;
        };

        if !from_origin.insert((from, direction)) {
            report.push(
                Problem::new(
                    ProblemCode::GateDirectionDuplicate,
                    EntityKind::Gate,
                    format!(
                        "gate `{}` leaves its plot {direction}, which another gate already uses",
                        gate.key
                    ),
                )
                .with_entity(gate.id),
            );
            continue;
        }

        let slots = [((from, direction), to), ((to, direction.opposite()), from)];
        let conflict = slots.iter().find(|(slot, other)| {
            claims
                .get(slot)
                .is_some_and(|claimed_other| claimed_other != other)
        });
        if let Some(((plot, slot_direction), _)) = conflict {
            report.push(
                Problem::new(
                    ProblemCode::GateDirectionDuplicate,
                    EntityKind::Gate,
                    format!(
                        "gate `{}` needs the {slot_direction} slot of plot {plot}, \
                         which another gate already uses",
                        gate.key
                    ),
                )
                .with_entity(gate.id),
            );
            continue;
        }
        for (slot, other) in slots {
            claims.entry(slot).or_insert(other);
        }
    }
}

/// Structural checks on a recipe alone.
pub fn validate_recipe(recipe: &WorldRecipe) -> Report {
    info!(entities = recipe.entity_count(); "Validating recipe");
    let mut report = Report::new();

    let plots = check_duplicates(
        &mut report,
        EntityKind::Plot,
        recipe.plots.iter().map(|plot| (plot.id, plot.key.as_str())),
    );
    check_duplicates(
        &mut report,
        EntityKind::Gate,
        recipe.gates.iter().map(|gate| (gate.id, gate.key.as_str())),
    );
    let fixtures = check_duplicates(
        &mut report,
        EntityKind::Fixture,
        recipe.fixtures.iter().map(|fixture| (fixture.id, fixture.key.as_str())),
    );
    let items = check_duplicates(
        &mut report,
        EntityKind::Item,
        recipe.items.iter().map(|item| (item.id, item.key.as_str())),
    );
    let actors = check_duplicates(
        &mut report,
        EntityKind::Actor,
        recipe.actors.iter().map(|actor| (actor.id, actor.key.as_str())),
    );

    match recipe.start_plot {
        None => report.push(Problem::new(
            ProblemCode::StartPlotMissing,
            EntityKind::World,
            "the recipe has no start plot",
        )),
        Some(start) if !plots.contains(&start) => report.push(
            Problem::new(
                ProblemCode::StartPlotUnknown,
                EntityKind::World,
                format!("start plot {start} is not a plot of the recipe"),
            )
            .with_entity(start),
        ),
        Some(_) => {}
    }

    check_gates(&mut report, recipe, &plots);

    for fixture in &recipe.fixtures {
        check_owner(
            &mut report,
            EntityKind::Fixture,
            fixture.id,
            &fixture.key,
            fixture.owner,
            &[&plots, &fixtures, &actors],
        );
    }
    for item in &recipe.items {
        check_owner(
            &mut report,
            EntityKind::Item,
            item.id,
            &item.key,
            item.owner,
            &[&plots, &fixtures, &items, &actors],
        );
    }
    for actor in &recipe.actors {
        check_owner(
            &mut report,
            EntityKind::Actor,
            actor.id,
            &actor.key,
            actor.owner,
            &[&plots, &fixtures],
        );
    }

    debug!(problems = report.len(); "Recipe validated");
    report
}

// ============================================================================
// World validation
// ============================================================================

/// Where an owner chain ends.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChainEnd {
    Plot(EntityId),
    /// The chain names an id that is not an owning node.
    Dangling(EntityId),
    /// The chain loops; members are listed from the first repeated node.
    Cycle(Vec<EntityId>),
}

/// Follow owner references from `start` until a plot, a gap, or a loop.
fn walk_owner_chain(graph: &Graph, start: EntityId) -> ChainEnd {
    let mut path = vec![start];
    let mut visited = HashSet::from([start]);
    let mut current = graph.node(start).and_then(Node::owner);

    loop {
        let Some(id) = current else {
            return ChainEnd::Dangling(start);
        };
        match graph.node(id) {
            Some(Node::Plot(_)) => return ChainEnd::Plot(id),
            Some(Node::Item(_) | Node::Actor(_)) => {
                if !visited.insert(id) {
                    let entry = path.iter().position(|member| *member == id).unwrap_or(0);
                    return ChainEnd::Cycle(path.split_off(entry));
                }
                path.push(id);
                current = graph.node(id).and_then(Node::owner);
            }
            Some(Node::Gate(_)) | None => return ChainEnd::Dangling(id),
        }
    }
}

/// Plots reachable from the start plot over any gate.
fn reachable_plots(graph: &Graph, start: EntityId) -> HashSet<EntityId> {
    let mut reached = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(plot) = queue.pop_front() {
        for neighbor in graph.neighbors(plot) {
            if reached.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }
    reached
}

/// Structural checks on an assembled world.
///
/// Reachability is only checked when the graph's start plot exists; a
/// missing start is reported by [`validate_recipe`].
pub fn validate_world(graph: &Graph) -> Report {
    info!(nodes = graph.len(); "Validating world");
    let mut report = Report::new();

    let reached = graph
        .start()
        .filter(|start| graph.plot(*start).is_some())
        .map(|start| reachable_plots(graph, start));
    match &reached {
        Some(reached) => debug!(reached = reached.len(); "Reachability computed"),
        None => debug!("No start plot in graph, skipping reachability"),
    }

    for plot in graph.plots().filter(|plot| plot.kind.is_land()) {
        if reached
            .as_ref()
            .is_some_and(|reached| !reached.contains(&plot.id))
        {
            report.push(
                Problem::new(
                    ProblemCode::UnreachablePlot,
                    EntityKind::Plot,
                    format!("plot `{}` cannot be reached from the start plot", plot.key),
                )
                .with_entity(plot.id),
            );
        }
        if plot.owner != graph.root() {
            report.push(
                Problem::new(
                    ProblemCode::UnanchoredPlot,
                    EntityKind::Plot,
                    format!("plot `{}` is not anchored to the world root", plot.key),
                )
                .with_entity(plot.id),
            );
        }
    }

    let mut in_reported_cycle: HashSet<EntityId> = HashSet::new();
    let owned = graph
        .nodes()
        .filter(|node| matches!(node, Node::Item(_) | Node::Actor(_)));

    for node in owned {
        let (id, kind, key) = (node.id(), node.kind(), node.key());
        let end = walk_owner_chain(graph, id);
        trace!(key, end:?; "Owner chain walked");

        match end {
            ChainEnd::Plot(plot_id) => {
                let Some(plot) = graph.plot(plot_id) else {
                    continue;
                };
                if !plot.kind.is_land() {
                    report.push(
                        Problem::new(
                            ProblemCode::OwnerChainNonLand,
                            kind,
                            format!("{kind} `{key}` ends up in non-land plot `{}`", plot.key),
                        )
                        .with_entity(id),
                    );
                } else if reached
                    .as_ref()
                    .is_some_and(|reached| !reached.contains(&plot_id))
                {
                    report.push(
                        Problem::new(
                            ProblemCode::FixtureUnreachable,
                            kind,
                            format!("{kind} `{key}` is in unreachable plot `{}`", plot.key),
                        )
                        .with_entity(id),
                    );
                }
            }
            ChainEnd::Dangling(missing) => report.push(
                Problem::new(
                    ProblemCode::DanglingOwner,
                    kind,
                    format!("{kind} `{key}` has an owner chain ending at unknown entity {missing}"),
                )
                .with_entity(id),
            ),
            ChainEnd::Cycle(members) => {
                if members.iter().any(|member| in_reported_cycle.contains(member)) {
                    continue;
                }
                let names: Vec<&str> = members
                    .iter()
                    .filter_map(|member| graph.node(*member).map(Node::key))
                    .collect();
                report.push(
                    Problem::new(
                        ProblemCode::OwnershipCycle,
                        kind,
                        format!("ownership cycle: {}", names.join(" -> ")),
                    )
                    .with_entity(members[0]),
                );
                in_reported_cycle.extend(members);
            }
        }
    }

    debug!(problems = report.len(); "World validated");
    report
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::graph::{ActorNode, GateNode, ItemClass, ItemNode, PlotNode};
    use cartograph_core::recipe::{FixtureSpec, ItemSpec, PlotKind, PlotSpec};

    fn plot_id(key: &str) -> EntityId {
        EntityId::derive(EntityKind::Plot, key)
    }

    fn fixture_id(key: &str) -> EntityId {
        EntityId::derive(EntityKind::Fixture, key)
    }

    fn plot_spec(key: &str) -> PlotSpec {
        PlotSpec {
            id: plot_id(key),
            key: key.to_string(),
            name: key.to_string(),
            region: None,
            x: 0,
            y: 0,
            description: None,
            kind: PlotKind::Land,
        }
    }

    fn gate_spec(key: &str, from: &str, direction: Direction, to: &str) -> GateSpec {
        GateSpec {
            id: EntityId::derive(EntityKind::Gate, key),
            key: key.to_string(),
            from_plot: Some(plot_id(from)),
            direction: Some(direction),
            to_plot: Some(plot_id(to)),
            visible: true,
            key_expression: Some("true".to_string()),
            label: key.to_string(),
            description: None,
        }
    }

    fn recipe_with(plots: &[&str]) -> WorldRecipe {
        WorldRecipe {
            plots: plots.iter().map(|key| plot_spec(key)).collect(),
            start_plot: plots.first().map(|key| plot_id(key)),
            ..WorldRecipe::default()
        }
    }

    fn codes(report: &Report) -> Vec<ProblemCode> {
        report.iter().map(Problem::code).collect()
    }

    #[test]
    fn test_clean_recipe() {
        let mut recipe = recipe_with(&["a", "b"]);
        recipe.gates.push(gate_spec("a/east", "a", Direction::East, "b"));
        assert!(validate_recipe(&recipe).is_empty());
    }

    #[test]
    fn test_duplicate_plot_id() {
        let recipe = recipe_with(&["a", "a"]);
        assert_eq!(codes(&validate_recipe(&recipe)), vec![ProblemCode::DuplicateId]);
    }

    #[test]
    fn test_start_plot_checks() {
        let mut recipe = recipe_with(&["a"]);
        recipe.start_plot = None;
        assert_eq!(
            codes(&validate_recipe(&recipe)),
            vec![ProblemCode::StartPlotMissing]
        );

        recipe.start_plot = Some(plot_id("elsewhere"));
        assert_eq!(
            codes(&validate_recipe(&recipe)),
            vec![ProblemCode::StartPlotUnknown]
        );
    }

    #[test]
    fn test_gate_defects_are_all_collected() {
        let mut recipe = recipe_with(&["a"]);
        let mut broken = gate_spec("a/x", "a", Direction::East, "ghost");
        broken.from_plot = None;
        broken.direction = None;
        broken.key_expression = Some("   ".to_string());
        recipe.gates.push(broken);

        assert_eq!(
            codes(&validate_recipe(&recipe)),
            vec![
                ProblemCode::GateEndpointMissing,
                ProblemCode::GateEndpointUnknown,
                ProblemCode::GateKeyMissing,
                ProblemCode::GateDirectionMissing,
            ]
        );
    }

    #[test]
    fn test_duplicate_direction_from_origin() {
        let mut recipe = recipe_with(&["a", "b", "c"]);
        recipe.gates.push(gate_spec("a/east", "a", Direction::East, "b"));
        recipe.gates.push(gate_spec("a/door", "a", Direction::East, "c"));

        let report = validate_recipe(&recipe);
        assert_eq!(codes(&report), vec![ProblemCode::GateDirectionDuplicate]);
        assert_eq!(
            report.problems()[0].entity_id(),
            Some(EntityId::derive(EntityKind::Gate, "a/door"))
        );
    }

    #[test]
    fn test_reverse_gate_is_not_a_conflict() {
        let mut recipe = recipe_with(&["a", "b"]);
        recipe.gates.push(gate_spec("a/east", "a", Direction::East, "b"));
        recipe.gates.push(gate_spec("b/west", "b", Direction::West, "a"));
        assert!(validate_recipe(&recipe).is_empty());
    }

    #[test]
    fn test_destination_slot_conflict() {
        let mut recipe = recipe_with(&["a", "b", "c"]);
        recipe.gates.push(gate_spec("a/east", "a", Direction::East, "b"));
        recipe.gates.push(gate_spec("c/east", "c", Direction::East, "b"));

        assert_eq!(
            codes(&validate_recipe(&recipe)),
            vec![ProblemCode::GateDirectionDuplicate]
        );
    }

    #[test]
    fn test_owner_checks() {
        let mut recipe = recipe_with(&["a"]);
        recipe.fixtures.push(FixtureSpec {
            id: fixture_id("desk"),
            key: "desk".to_string(),
            name: "Desk".to_string(),
            description: None,
            owner: None,
            visible: true,
        });
        recipe.items.push(ItemSpec {
            id: EntityId::derive(EntityKind::Item, "lamp"),
            key: "lamp".to_string(),
            name: "Lamp".to_string(),
            description: None,
            owner: Some(EntityId::derive(EntityKind::Plot, "nonexistent")),
            visible: true,
            footprint: 1,
            capacity: None,
        });

        let report = validate_recipe(&recipe);
        assert_eq!(
            codes(&report),
            vec![ProblemCode::OwnerMissing, ProblemCode::OwnerNotFound]
        );
        assert_eq!(report.problems()[1].category(), EntityKind::Item);
    }

    // ------------------------------------------------------------------------
    // World
    // ------------------------------------------------------------------------

    fn world(plots: &[(&str, PlotKind)]) -> Graph {
        let mut graph = Graph::new(EntityId::world_root());
        for (key, kind) in plots {
            graph
                .insert_plot(PlotNode {
                    id: plot_id(key),
                    key: key.to_string(),
                    name: key.to_string(),
                    region: None,
                    x: 0,
                    y: 0,
                    description: None,
                    kind: *kind,
                    owner: graph.root(),
                    gates: BTreeMap::new(),
                })
                .unwrap();
        }
        graph.set_start(plots.first().map(|(key, _)| plot_id(key)));
        graph
    }

    fn connect(graph: &mut Graph, from: &str, direction: Direction, to: &str) {
        let key = format!("{from}/{direction}");
        graph
            .connect(GateNode {
                id: EntityId::derive(EntityKind::Gate, &key),
                key: key.clone(),
                plot_a: plot_id(from),
                plot_b: plot_id(to),
                direction,
                visible: false,
                key_expression: Some("false".to_string()),
                label: key,
                description: None,
                synthesized: false,
            })
            .unwrap();
    }

    fn fixture(graph: &mut Graph, key: &str, owner: EntityId) {
        graph
            .insert_item(ItemNode {
                id: fixture_id(key),
                key: key.to_string(),
                name: key.to_string(),
                description: None,
                owner,
                visible: true,
                class: ItemClass::Fixture,
            })
            .unwrap();
    }

    #[test]
    fn test_reachability_ignores_visibility_and_keys() {
        let mut graph = world(&[("a", PlotKind::Land), ("b", PlotKind::Land)]);
        connect(&mut graph, "a", Direction::Up, "b");
        assert!(validate_world(&graph).is_empty());
    }

    #[test]
    fn test_unreachable_plot_and_its_fixture() {
        let mut graph = world(&[("a", PlotKind::Land), ("island", PlotKind::Land)]);
        fixture(&mut graph, "palm", plot_id("island"));

        let report = validate_world(&graph);
        assert_eq!(
            codes(&report),
            vec![ProblemCode::UnreachablePlot, ProblemCode::FixtureUnreachable]
        );
    }

    #[test]
    fn test_abstract_plots_are_exempt_but_not_as_owners() {
        let mut graph = world(&[("a", PlotKind::Land), ("limbo", PlotKind::Abstract)]);
        fixture(&mut graph, "ghost", plot_id("limbo"));

        assert_eq!(
            codes(&validate_world(&graph)),
            vec![ProblemCode::OwnerChainNonLand]
        );
    }

    #[test]
    fn test_unanchored_plot() {
        let mut graph = Graph::new(EntityId::world_root());
        graph
            .insert_plot(PlotNode {
                id: plot_id("a"),
                key: "a".to_string(),
                name: "a".to_string(),
                region: None,
                x: 0,
                y: 0,
                description: None,
                kind: PlotKind::Land,
                owner: plot_id("elsewhere"),
                gates: BTreeMap::new(),
            })
            .unwrap();
        graph.set_start(Some(plot_id("a")));

        assert_eq!(
            codes(&validate_world(&graph)),
            vec![ProblemCode::UnanchoredPlot]
        );
    }

    #[test]
    fn test_dangling_owner() {
        let mut graph = world(&[("a", PlotKind::Land)]);
        fixture(&mut graph, "desk", fixture_id("missing"));
        fixture(&mut graph, "drawer", fixture_id("desk"));

        let report = validate_world(&graph);
        assert_eq!(report.count_code(ProblemCode::DanglingOwner), 2);
    }

    #[test]
    fn test_two_node_cycle_reported_once() {
        let mut graph = world(&[("a", PlotKind::Land)]);
        fixture(&mut graph, "box-a", fixture_id("box-b"));
        fixture(&mut graph, "box-b", fixture_id("box-a"));

        let report = validate_world(&graph);
        assert_eq!(codes(&report), vec![ProblemCode::OwnershipCycle]);
    }

    #[test]
    fn test_cycle_with_tail_reported_once() {
        let mut graph = world(&[("a", PlotKind::Land)]);
        fixture(&mut graph, "tail", fixture_id("loop-a"));
        fixture(&mut graph, "loop-a", fixture_id("loop-b"));
        fixture(&mut graph, "loop-b", fixture_id("loop-a"));
        fixture(&mut graph, "self-owned", fixture_id("self-owned"));

        let report = validate_world(&graph);
        assert_eq!(report.count_code(ProblemCode::OwnershipCycle), 2);
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_actor_chain_reaches_plot() {
        let mut graph = world(&[("a", PlotKind::Land)]);
        graph
            .insert_actor(ActorNode {
                id: EntityId::derive(EntityKind::Actor, "hero"),
                key: "hero".to_string(),
                name: "Hero".to_string(),
                description: None,
                owner: fixture_id("bed"),
                visible: true,
                player: true,
                skills: Vec::new(),
            })
            .unwrap();
        fixture(&mut graph, "bed", plot_id("a"));

        assert!(validate_world(&graph).is_empty());
    }

    #[test]
    fn test_no_start_skips_reachability() {
        let mut graph = world(&[("a", PlotKind::Land), ("b", PlotKind::Land)]);
        graph.set_start(None);
        assert!(validate_world(&graph).is_empty());
    }
}

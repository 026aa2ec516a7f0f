//! Bill of materials: a countable summary of an assembled world.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::graph::{Graph, Node};

/// Entity counts for a [`Graph`], plus the direct contents of every plot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillOfMaterials {
    pub plots: usize,
    pub gates: usize,
    pub synthesized_gates: usize,
    pub fixtures: usize,
    pub items: usize,
    pub actors: usize,
    /// Keys of the nodes owned directly by each plot, keyed by plot key.
    pub contents: IndexMap<String, Vec<String>>,
}

impl BillOfMaterials {
    pub fn from_graph(graph: &Graph) -> Self {
        let mut bom = Self {
            contents: graph
                .plots()
                .map(|plot| (plot.key.clone(), Vec::new()))
                .collect(),
            ..Self::default()
        };

        for node in graph.nodes() {
            match node {
                Node::Plot(_) => bom.plots += 1,
                Node::Gate(gate) => {
                    bom.gates += 1;
                    if gate.synthesized {
                        bom.synthesized_gates += 1;
                    }
                }
                Node::Item(item) if item.is_fixture() => bom.fixtures += 1,
                Node::Item(_) => bom.items += 1,
                Node::Actor(_) => bom.actors += 1,
            }

            let Some(plot) = node.owner().and_then(|owner| graph.plot(owner)) else {
                continue;
            };
            if let Some(keys) = bom.contents.get_mut(&plot.key) {
                keys.push(node.key().to_string());
            }
        }
        bom
    }

    /// Total number of nodes counted.
    pub fn total(&self) -> usize {
        self.plots + self.gates + self.fixtures + self.items + self.actors
    }
}

impl fmt::Display for BillOfMaterials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "plots:    {}", self.plots)?;
        writeln!(
            f,
            "gates:    {} ({} synthesized)",
            self.gates, self.synthesized_gates
        )?;
        writeln!(f, "fixtures: {}", self.fixtures)?;
        writeln!(f, "items:    {}", self.items)?;
        writeln!(f, "actors:   {}", self.actors)?;
        for (plot, keys) in &self.contents {
            if keys.is_empty() {
                writeln!(f, "  {plot}: (empty)")?;
            } else {
                writeln!(f, "  {plot}: {}", keys.join(", "))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::graph::{GateNode, ItemClass, ItemNode, PlotNode};
    use cartograph_core::{Direction, EntityId, EntityKind, recipe::PlotKind};

    fn plot(graph: &mut Graph, key: &str, x: i64) {
        graph
            .insert_plot(PlotNode {
                id: EntityId::derive(EntityKind::Plot, key),
                key: key.to_string(),
                name: key.to_string(),
                region: None,
                x,
                y: 0,
                description: None,
                kind: PlotKind::Land,
                owner: graph.root(),
                gates: BTreeMap::new(),
            })
            .unwrap();
    }

    #[test]
    fn test_counts_and_contents() {
        let mut graph = Graph::new(EntityId::world_root());
        plot(&mut graph, "hall", 0);
        plot(&mut graph, "attic", 1);
        graph
            .connect(GateNode {
                id: EntityId::derive(EntityKind::Gate, "auto/hall/east/attic"),
                key: "auto/hall/east/attic".to_string(),
                plot_a: EntityId::derive(EntityKind::Plot, "hall"),
                plot_b: EntityId::derive(EntityKind::Plot, "attic"),
                direction: Direction::East,
                visible: true,
                key_expression: Some("true".to_string()),
                label: "hall -> attic".to_string(),
                description: None,
                synthesized: true,
            })
            .unwrap();
        graph
            .insert_item(ItemNode {
                id: EntityId::derive(EntityKind::Item, "lamp"),
                key: "lamp".to_string(),
                name: "Lamp".to_string(),
                description: None,
                owner: EntityId::derive(EntityKind::Plot, "hall"),
                visible: true,
                class: ItemClass::Portable {
                    footprint: 1,
                    capacity: None,
                },
            })
            .unwrap();

        let bom = BillOfMaterials::from_graph(&graph);
        assert_eq!(bom.plots, 2);
        assert_eq!(bom.gates, 1);
        assert_eq!(bom.synthesized_gates, 1);
        assert_eq!(bom.items, 1);
        assert_eq!(bom.total(), 4);
        assert_eq!(bom.contents["hall"], vec!["lamp".to_string()]);
        assert!(bom.contents["attic"].is_empty());

        let text = bom.to_string();
        assert!(text.contains("gates:    1 (1 synthesized)"));
        assert!(text.contains("  attic: (empty)"));
    }
}

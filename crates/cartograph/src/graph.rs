//! Arena of world nodes keyed by [`EntityId`].
//!
//! Relationships are stored as ids rather than references: a gate names its
//! two plots, every owned node names its owner, and every plot records the
//! gate occupying each of its direction slots. Reachability and owner-chain
//! walks are therefore plain id lookups.
//!
//! The arena enforces two structural rules on insertion:
//! - ids are unique across all nodes
//! - a gate is only connected when the slot it needs on both plots is free

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cartograph_core::{Direction, EntityId, EntityKind, recipe::PlotKind};

/// Errors raised by the arena when an insertion would break its rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} already exists")]
    DuplicateNode(EntityId),

    #[error("plot {0} does not exist")]
    UnknownPlot(EntityId),

    #[error("plot {plot} already has a gate to the {direction}")]
    SlotOccupied { plot: EntityId, direction: Direction },
}

/// A location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotNode {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub region: Option<String>,
    pub x: i64,
    pub y: i64,
    pub description: Option<String>,
    pub kind: PlotKind,
    /// The world root for every plot placed by the assembler.
    pub owner: EntityId,
    /// Gate occupying each direction slot.
    pub gates: BTreeMap<Direction, EntityId>,
}

/// A bidirectional connection between two plots.
///
/// The gate occupies `direction` on `plot_a` and the opposite slot on
/// `plot_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateNode {
    pub id: EntityId,
    pub key: String,
    pub plot_a: EntityId,
    pub plot_b: EntityId,
    pub direction: Direction,
    pub visible: bool,
    pub key_expression: Option<String>,
    pub label: String,
    pub description: Option<String>,
    /// Whether the gate was added by gap-filling rather than authored.
    pub synthesized: bool,
}

impl GateNode {
    /// The plot on the other side of the gate from `plot`.
    pub fn other_side(&self, plot: EntityId) -> Option<EntityId> {
        if plot == self.plot_a {
            Some(self.plot_b)
        } else if plot == self.plot_b {
            Some(self.plot_a)
        } else {
            None
        }
    }
}

/// Whether an item node is fixed in place or portable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemClass {
    Fixture,
    Portable { footprint: u32, capacity: Option<u32> },
}

/// A fixture or a portable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemNode {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: EntityId,
    pub visible: bool,
    pub class: ItemClass,
}

impl ItemNode {
    pub fn is_fixture(&self) -> bool {
        matches!(self.class, ItemClass::Fixture)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorNode {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: EntityId,
    pub visible: bool,
    pub player: bool,
    pub skills: Vec<String>,
}

/// Any node of the world graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Plot(PlotNode),
    Gate(GateNode),
    Item(ItemNode),
    Actor(ActorNode),
}

impl Node {
    pub fn id(&self) -> EntityId {
        match self {
            Node::Plot(plot) => plot.id,
            Node::Gate(gate) => gate.id,
            Node::Item(item) => item.id,
            Node::Actor(actor) => actor.id,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Node::Plot(plot) => &plot.key,
            Node::Gate(gate) => &gate.key,
            Node::Item(item) => &item.key,
            Node::Actor(actor) => &actor.key,
        }
    }

    /// The entity category of the node; items report whether they are fixtures.
    pub fn kind(&self) -> EntityKind {
        match self {
            Node::Plot(_) => EntityKind::Plot,
            Node::Gate(_) => EntityKind::Gate,
            Node::Item(item) if item.is_fixture() => EntityKind::Fixture,
            Node::Item(_) => EntityKind::Item,
            Node::Actor(_) => EntityKind::Actor,
        }
    }

    /// The owner reference; gates have none.
    pub fn owner(&self) -> Option<EntityId> {
        match self {
            Node::Plot(plot) => Some(plot.owner),
            Node::Gate(_) => None,
            Node::Item(item) => Some(item.owner),
            Node::Actor(actor) => Some(actor.owner),
        }
    }
}

/// The assembled world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    root: EntityId,
    start: Option<EntityId>,
    nodes: IndexMap<EntityId, Node>,
}

impl Graph {
    /// Create an empty graph whose plots are anchored to `root`.
    pub fn new(root: EntityId) -> Self {
        Self {
            root,
            start: None,
            nodes: IndexMap::new(),
        }
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn start(&self) -> Option<EntityId> {
        self.start
    }

    pub fn set_start(&mut self, start: Option<EntityId>) {
        self.start = start;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: EntityId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn plot(&self, id: EntityId) -> Option<&PlotNode> {
        match self.nodes.get(&id) {
            Some(Node::Plot(plot)) => Some(plot),
            _ => None,
        }
    }

    pub fn gate(&self, id: EntityId) -> Option<&GateNode> {
        match self.nodes.get(&id) {
            Some(Node::Gate(gate)) => Some(gate),
            _ => None,
        }
    }

    pub fn plots(&self) -> impl Iterator<Item = &PlotNode> {
        self.nodes.values().filter_map(|node| match node {
            Node::Plot(plot) => Some(plot),
            _ => None,
        })
    }

    pub fn gates(&self) -> impl Iterator<Item = &GateNode> {
        self.nodes.values().filter_map(|node| match node {
            Node::Gate(gate) => Some(gate),
            _ => None,
        })
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemNode> {
        self.nodes.values().filter_map(|node| match node {
            Node::Item(item) => Some(item),
            _ => None,
        })
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorNode> {
        self.nodes.values().filter_map(|node| match node {
            Node::Actor(actor) => Some(actor),
            _ => None,
        })
    }

    /// The gate in `direction` from `plot`, if any.
    pub fn gate_at(&self, plot: EntityId, direction: Direction) -> Option<&GateNode> {
        let gate = self.plot(plot)?.gates.get(&direction)?;
        self.gate(*gate)
    }

    /// Whether `plot` exists and its `direction` slot is empty.
    pub fn slot_free(&self, plot: EntityId, direction: Direction) -> bool {
        self.plot(plot)
            .is_some_and(|plot| !plot.gates.contains_key(&direction))
    }

    /// Plots one gate away from `plot`.
    pub fn neighbors(&self, plot: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.plot(plot)
            .into_iter()
            .flat_map(|node| node.gates.values())
            .filter_map(move |gate| self.gate(*gate)?.other_side(plot))
    }

    fn insert_new(&mut self, node: Node) -> Result<(), GraphError> {
        let id = node.id();
        if id == self.root || self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    pub fn insert_plot(&mut self, plot: PlotNode) -> Result<(), GraphError> {
        self.insert_new(Node::Plot(plot))
    }

    pub fn insert_item(&mut self, item: ItemNode) -> Result<(), GraphError> {
        self.insert_new(Node::Item(item))
    }

    pub fn insert_actor(&mut self, actor: ActorNode) -> Result<(), GraphError> {
        self.insert_new(Node::Actor(actor))
    }

    /// Insert a gate and claim its slot on both plots.
    ///
    /// Nothing is changed if either slot is already taken.
    pub fn connect(&mut self, gate: GateNode) -> Result<(), GraphError> {
        let reverse = gate.direction.opposite();

        for plot in [gate.plot_a, gate.plot_b] {
            if self.plot(plot).is_none() {
                return Err(GraphError::UnknownPlot(plot));
            }
        }
        if gate.id == self.root || self.nodes.contains_key(&gate.id) {
            return Err(GraphError::DuplicateNode(gate.id));
        }
        for (plot, direction) in [(gate.plot_a, gate.direction), (gate.plot_b, reverse)] {
            if !self.slot_free(plot, direction) {
                return Err(GraphError::SlotOccupied { plot, direction });
            }
        }

        let (id, plot_a, plot_b, direction) = (gate.id, gate.plot_a, gate.plot_b, gate.direction);
        if let Some(Node::Plot(plot)) = self.nodes.get_mut(&plot_a) {
            plot.gates.insert(direction, id);
        }
        if let Some(Node::Plot(plot)) = self.nodes.get_mut(&plot_b) {
            plot.gates.insert(reverse, id);
        }
        self.nodes.insert(id, Node::Gate(gate));
        Ok(())
    }
}

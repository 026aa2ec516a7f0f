//! The World Recipe: flat output of the compiler and input to the assembler.
//!
//! Fields are public so tooling can build or patch recipes directly. Nothing
//! here is validated; see the recipe validator in the `cartograph` crate.

use serde::{Deserialize, Serialize};

use crate::{direction::Direction, identifier::EntityId};

/// Whether a plot takes part in reachability and anchoring checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    #[default]
    Land,
    Abstract,
}

impl PlotKind {
    pub fn is_land(self) -> bool {
        matches!(self, PlotKind::Land)
    }
}

/// A location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub region: Option<String>,
    pub x: i64,
    pub y: i64,
    pub description: Option<String>,
    pub kind: PlotKind,
}

/// A connection leaving `from_plot` through `direction`.
///
/// Endpoints, direction, and key expression are optional so that recipes
/// with authoring defects can still be represented and reported on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSpec {
    pub id: EntityId,
    pub key: String,
    pub from_plot: Option<EntityId>,
    pub direction: Option<Direction>,
    pub to_plot: Option<EntityId>,
    pub visible: bool,
    pub key_expression: Option<String>,
    pub label: String,
    pub description: Option<String>,
}

/// An immovable object owned by a plot, another fixture, or an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSpec {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<EntityId>,
    pub visible: bool,
}

/// A portable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<EntityId>,
    pub visible: bool,
    pub footprint: u32,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSpec {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<EntityId>,
    pub visible: bool,
    pub player: bool,
    pub skills: Vec<String>,
}

/// Compiled world definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldRecipe {
    pub plots: Vec<PlotSpec>,
    pub gates: Vec<GateSpec>,
    pub fixtures: Vec<FixtureSpec>,
    pub items: Vec<ItemSpec>,
    pub actors: Vec<ActorSpec>,
    pub start_plot: Option<EntityId>,
    pub seed: i64,
    pub preamble: Option<String>,
}

impl WorldRecipe {
    /// Looks up a plot by id.
    pub fn plot(&self, id: EntityId) -> Option<&PlotSpec> {
        self.plots.iter().find(|plot| plot.id == id)
    }

    /// Looks up a plot by normalized key.
    pub fn plot_by_key(&self, key: &str) -> Option<&PlotSpec> {
        self.plots.iter().find(|plot| plot.key == key)
    }

    /// Total number of entities of every category.
    pub fn entity_count(&self) -> usize {
        self.plots.len()
            + self.gates.len()
            + self.fixtures.len()
            + self.items.len()
            + self.actors.len()
    }
}

//! Cartograph - A world-definition language for text adventures.
//!
//! Compiles world source into a [`WorldRecipe`], assembles the recipe into a
//! world [`Graph`], and validates both. [`WorldBuilder`] drives the whole
//! pipeline; the individual phases are public for tooling.

pub mod assemble;
pub mod bom;
pub mod config;
pub mod graph;
pub mod report;
pub mod validate;

mod error;

pub use cartograph_core::{Direction, EntityId, EntityKind, recipe};
pub use cartograph_parser::CompileError;

pub use error::{BuildError, CartographError};

use log::{debug, info, trace, warn};

use cartograph_core::recipe::WorldRecipe;

use bom::BillOfMaterials;
use config::AppConfig;
use graph::Graph;
use report::{Problem, ProblemCode, Report};

/// Builder for compiling and assembling Cartograph worlds.
///
/// # Examples
///
/// ```rust
/// use cartograph::{WorldBuilder, config::AppConfig};
///
/// let source = r#"
///     thing(start).self.name="Start"
///     thing(start).east.leadsTo="garden"
///     thing(garden).self.name="Garden".self.locationX=1.self.locationY=0
/// "#;
///
/// let builder = WorldBuilder::new(AppConfig::default());
/// let recipe = builder.compile(source).expect("Failed to compile");
/// let (world, report) = builder.build(&recipe).expect("Failed to build");
///
/// assert_eq!(world.plots().count(), 2);
/// assert!(report.is_empty());
/// ```
#[derive(Default)]
pub struct WorldBuilder {
    config: AppConfig,
}

impl WorldBuilder {
    /// Create a new world builder with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Compile world source into a recipe.
    ///
    /// # Errors
    ///
    /// Returns [`CartographError::Compile`] carrying the first scanner,
    /// parser, or compiler diagnostic.
    pub fn compile(&self, source: &str) -> Result<WorldRecipe, CartographError> {
        info!("Compiling world");
        let recipe = cartograph_parser::compile_source(source)?;
        debug!(entities = recipe.entity_count(); "World compiled successfully");
        trace!(recipe:?; "Compiled recipe");
        Ok(recipe)
    }

    /// Validate a recipe, assemble it, and validate the result.
    ///
    /// Recipe validation always runs to completion. World validation runs
    /// whenever assembly succeeds, so one failed build reports problems
    /// from both passes. On success the returned report is empty.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] with every problem found when any pass
    /// reports one.
    pub fn build(&self, recipe: &WorldRecipe) -> Result<(Graph, Report), BuildError> {
        info!(entities = recipe.entity_count(); "Building world");
        let mut report = validate::validate_recipe(recipe);

        match assemble::assemble(recipe) {
            Ok(graph) => {
                report.extend(validate::validate_world(&graph));
                if !report.is_empty() {
                    warn!(problems = report.len(); "World build failed");
                    return Err(BuildError::new(report));
                }

                info!(nodes = graph.len(); "World built successfully");
                if self.config.report().bill_of_materials() {
                    let bom = BillOfMaterials::from_graph(&graph);
                    info!("Bill of materials\n{bom}");
                }
                Ok((graph, report))
            }
            Err(err) => {
                warn!(err:%; "World assembly failed");
                report.push(Problem::new(
                    ProblemCode::BuildException,
                    EntityKind::World,
                    err.to_string(),
                ));
                Err(BuildError::new(report))
            }
        }
    }

    /// Compile and build in one step.
    ///
    /// # Errors
    ///
    /// Returns [`CartographError`] for compile or build failures.
    pub fn build_source(&self, source: &str) -> Result<(Graph, Report), CartographError> {
        let recipe = self.compile(source)?;
        Ok(self.build(&recipe)?)
    }
}


//! CLI logic for the Cartograph world compiler.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;

use std::fs;

use log::info;

use cartograph::{CartographError, WorldBuilder, bom::BillOfMaterials};

/// Run the Cartograph CLI application
///
/// Compiles and builds the input world. With `--bom`, the bill of
/// materials is printed to stdout.
///
/// # Errors
///
/// Returns `CartographError` for:
/// - File I/O and configuration errors
/// - The first compile diagnostic
/// - Every problem of a rejected build
pub fn run(args: &Args) -> Result<BillOfMaterials, CartographError> {
    info!(input_path = args.input; "Processing world");

    let app_config = config::load_config(args.config.as_ref())?;
    let source = fs::read_to_string(&args.input)?;

    let builder = WorldBuilder::new(app_config);
    let (world, _) = builder.build_source(&source)?;
    let bom = BillOfMaterials::from_graph(&world);

    info!(
        plots = bom.plots,
        gates = bom.gates,
        fixtures = bom.fixtures,
        items = bom.items,
        actors = bom.actors;
        "World built"
    );
    if args.bom {
        print!("{bom}");
    }

    Ok(bom)
}

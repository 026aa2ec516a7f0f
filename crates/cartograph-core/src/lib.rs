//! # Cartograph Core
//!
//! Shared vocabulary of the Cartograph world pipeline: content-derived
//! identifiers, compass directions, and the flat [`recipe::WorldRecipe`]
//! handed from the compiler to the assembler.

pub mod direction;
pub mod identifier;
pub mod recipe;

pub use direction::Direction;
pub use identifier::{EntityId, EntityKind, KeyError, normalize_key};

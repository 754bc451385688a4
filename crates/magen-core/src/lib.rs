pub mod authoring;
pub mod compose;
pub mod config;
pub mod error;
pub mod generator;
pub mod io;
pub mod json_schema;
pub mod layering;
pub mod metadata;
pub mod patch;
pub mod paths;
pub mod registry;
pub mod render;
pub mod scaffold;
pub mod schema;
pub mod sdd;
pub mod selection;
pub mod testing;
pub mod types;
pub mod variables;

pub use error::{MagenError, Result};

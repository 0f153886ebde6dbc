pub mod assets;
pub mod cli;
pub mod load_config;
pub mod progress;
pub mod upload;

pub use cli::{run, Cli, Commands};

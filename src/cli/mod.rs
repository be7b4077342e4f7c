//! Command-line interface for sdlc.
//!
//! Wraps the environment tooling (`dev`, `build`, `deploy`, `update`), task
//! authoring (`new-task`, `generate-golden`, `validate`, `setup`), taskset
//! sync and repository cloning.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};

//! sdlc-tasks: agentic-coding benchmark tasks for the SDLC environment.
//!
//! The crate carries the task pack ([`tasks`]), the bug-fix scenarios that
//! set up and grade them ([`scenario`], [`graders`], [`services`]), and the
//! tooling around them: repo cloning, taskset sync, scaffolding, golden
//! patch generation and validation.

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod golden;
pub mod graders;
pub mod hud;
pub mod llm;
pub mod repos;
pub mod scaffold;
pub mod scenario;
pub mod services;
pub mod sync;
pub mod tasks;
pub mod validation;

pub use error::{
    ApiError, CloneError, ConfigError, ExecError, GoldenError, GradeError, LlmError, ScaffoldError,
    ScenarioError, ServiceError, SyncError, ValidationError,
};

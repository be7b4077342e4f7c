//! Error types for sdlc-tasks operations.
//!
//! Defines error types for each subsystem:
//! - Repository cloning and git plumbing
//! - Remote task API calls and taskset sync
//! - Task scaffolding
//! - Scenario setup and grading
//! - Mock service adapters
//! - Grading-model (LLM) interactions
//! - Configuration and golden-diff generation

use thiserror::Error;

/// Errors raised while running external commands.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out after {seconds} seconds: {command}")]
    Timeout { command: String, seconds: u64 },

    #[error("Command exited with code {code}: {command}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Unsafe shell input: {0}")]
    UnsafeInput(String),
}

/// Errors that can occur while cloning repositories from the manifest.
#[derive(Debug, Error)]
pub enum CloneError {
    #[error("Failed to read repo manifest '{path}': {source}")]
    ReadManifest {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse repo manifest '{path}': {source}")]
    ParseManifest {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Clone failed for {repo}: {stderr}")]
    CloneFailed { repo: String, stderr: String },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the remote task API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {path} failed ({status}): {detail}")]
    Status {
        method: String,
        path: String,
        status: u16,
        detail: String,
    },

    #[error("{method} {path} request failed: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    #[error("Unexpected response from {path}: {message}")]
    UnexpectedResponse { path: String, message: String },
}

impl ApiError {
    /// Whether this error is an HTTP 404 from the remote.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// Errors that can occur while reconciling local tasks with a remote taskset.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Task '{name}' has non-object args; found {found}")]
    InvalidArgs { name: String, found: String },

    #[error("Tasks missing stable task_id (slug): {}. Set the slug on each task.", .0.join(", "))]
    MissingTaskIds(Vec<String>),

    #[error("Duplicate local task IDs detected: {0}")]
    DuplicateTaskIds(String),

    #[error("Task '{name}' not found. Available: {available}")]
    UnknownTask { name: String, available: String },

    #[error("Excluded task(s) not found: {missing}. Available: {available}")]
    UnknownExcludes { missing: String, available: String },

    #[error("No tasks left to sync after exclusions.")]
    NothingLeft,

    #[error("No tasks found in the registry.")]
    NoTasks,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while scaffolding a new task.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("Invalid task name '{0}'. Use snake_case (e.g. 'fix_auth_bug').")]
    InvalidName(String),

    #[error("Task '{name}' already exists at {path}")]
    AlreadyExists { name: String, path: String },

    #[error("Template rendering error: {0}")]
    Tera(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by mock service adapters.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} service is not configured")]
    NotConfigured { service: &'static str },

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Repo setup command failed: {0}")]
    RepoSetup(String),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key for the grading model")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while computing a grade.
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("Invalid weight {weight} for subscore '{name}': must be non-negative")]
    NegativeWeight { name: String, weight: f64 },

    #[error("Rubric grader requires a grading model, none configured")]
    NoJudge,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Errors that can occur while running a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("Invalid args for scenario '{scenario}': {source}")]
    InvalidArgs {
        scenario: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Setup step failed: {0}")]
    Setup(String),

    #[error("Could not determine the agent branch in {0}")]
    NoAgentBranch(String),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Grade(#[from] GradeError),
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not set. {hint}")]
    Missing { name: String, hint: String },

    #[error("Failed to parse {path}: {source}")]
    DotEnv {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}

/// Errors that can occur while generating a golden patch.
#[derive(Debug, Error)]
pub enum GoldenError {
    #[error("Task directory {0} does not exist. Run new-task first.")]
    TaskNotFound(String),

    #[error("Cannot parse owner/repo from '{0}'")]
    InvalidRepoUrl(String),

    #[error("Empty diff between {base}..{golden}")]
    EmptyDiff { base: String, golden: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while validating tasks.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No tasks matching '{filter}'. Available: {available}")]
    NoMatch { filter: String, available: String },

    #[error("Validation step {index} ({tool}) failed: {reason}")]
    StepFailed {
        index: usize,
        tool: String,
        reason: String,
    },

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

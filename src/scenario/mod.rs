//! Bug-fix scenarios.
//!
//! A scenario runs in two phases. [`setup`] prepares the repositories and
//! mock services for a task and yields the prompt handed to the agent; after
//! the agent has worked, [`PreparedScenario::grade`] inspects the result.
//! The phases are separate types, so grading cannot run before setup.

pub mod bug_fix;
pub mod bug_fix_linear;
pub mod workspace;

pub use bug_fix::BugFixArgs;
pub use bug_fix_linear::BugFixLinearArgs;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::exec::CommandRunner;
use crate::graders::rubric::Judge;
use crate::graders::Grade;
use crate::services::Services;
use crate::tasks::Task;

/// The scenarios a task can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    BugFix,
    BugFixLinear,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 2] = [ScenarioKind::BugFix, ScenarioKind::BugFixLinear];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::BugFix => "bug_fix",
            ScenarioKind::BugFixLinear => "bug_fix_linear",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ScenarioError::UnknownScenario(s.to_string()))
    }
}

/// Filesystem layout of the task environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioPaths {
    /// Cloned source repositories, one directory per manifest entry.
    pub sources: PathBuf,
    /// Parent of the agent's workspaces.
    pub workspaces: PathBuf,
    /// Bare repository served by the GitHub mock.
    pub bare_repo: PathBuf,
    /// Root of the mock services' seed data.
    pub mock_data: PathBuf,
    /// Parent of the grading clones.
    pub grading: PathBuf,
    pub repo_owner: String,
    /// Unix user that owns the agent's workspace.
    pub workspace_user: String,
}

impl Default for ScenarioPaths {
    fn default() -> Self {
        Self {
            sources: PathBuf::from(crate::repos::DEFAULT_SOURCE_BASE),
            workspaces: PathBuf::from("/home/ubuntu/workspace"),
            bare_repo: PathBuf::from("/srv/git/project.git"),
            mock_data: PathBuf::from("/mcp_server/data"),
            grading: PathBuf::from("/tmp/grading"),
            repo_owner: "acme-corp".to_string(),
            workspace_user: "ubuntu".to_string(),
        }
    }
}

/// Everything a scenario run needs, built once per run.
#[derive(Clone)]
pub struct ScenarioContext {
    pub runner: Arc<dyn CommandRunner>,
    pub services: Services,
    /// Grading model for rubric graders; rubric checks score 0 without one.
    pub judge: Option<Judge>,
    pub paths: ScenarioPaths,
}

impl ScenarioContext {
    /// Local services and the default layout.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            services: Services::local(Arc::clone(&runner)),
            runner,
            judge: None,
            paths: ScenarioPaths::default(),
        }
    }

    pub fn with_judge(mut self, judge: Option<Judge>) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_paths(mut self, paths: ScenarioPaths) -> Self {
        self.paths = paths;
        self
    }
}

enum Stage {
    BugFix(bug_fix::Prepared),
    BugFixLinear(bug_fix_linear::Prepared),
}

/// A scenario whose setup has run; holds the prompt until grading.
pub struct PreparedScenario {
    prompt: String,
    ctx: ScenarioContext,
    stage: Stage,
}

impl PreparedScenario {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn context(&self) -> &ScenarioContext {
        &self.ctx
    }

    /// Grade the agent's work. Consumes the scenario.
    pub async fn grade(self) -> Result<Grade, ScenarioError> {
        let grade = match self.stage {
            Stage::BugFix(prepared) => bug_fix::grade(prepared, &self.ctx).await?,
            Stage::BugFixLinear(prepared) => bug_fix_linear::grade(prepared, &self.ctx).await?,
        };
        tracing::info!(score = grade.score, subscores = grade.subscores.len(), "Scenario graded");
        Ok(grade)
    }
}

fn decode_args<T: DeserializeOwned>(task: &Task) -> Result<T, ScenarioError> {
    serde_json::from_value(task.args.clone()).map_err(|source| ScenarioError::InvalidArgs {
        scenario: task.scenario.to_string(),
        source,
    })
}

/// Run the setup phase of `task`'s scenario.
pub async fn setup(task: &Task, ctx: ScenarioContext) -> Result<PreparedScenario, ScenarioError> {
    tracing::info!(slug = %task.slug, scenario = %task.scenario, "Setting up scenario");
    let (prompt, stage) = match task.scenario {
        ScenarioKind::BugFix => {
            let prepared = bug_fix::setup(decode_args(task)?, &ctx).await?;
            (prepared.prompt().to_string(), Stage::BugFix(prepared))
        }
        ScenarioKind::BugFixLinear => {
            let prepared = bug_fix_linear::setup(decode_args(task)?, &ctx).await?;
            (prepared.prompt().to_string(), Stage::BugFixLinear(prepared))
        }
    };
    Ok(PreparedScenario { prompt, ctx, stage })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::exec::CommandOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records commands and answers them from a list of (substring, output) rules.
    #[derive(Default)]
    pub(crate) struct MockRunner {
        pub(crate) commands: Mutex<Vec<String>>,
        rules: Vec<(String, CommandOutput)>,
    }

    impl MockRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn on(mut self, needle: &str, exit_code: i32, stdout: &str) -> Self {
            self.rules.push((
                needle.to_string(),
                CommandOutput {
                    exit_code,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                },
            ));
            self
        }

        pub(crate) fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for MockRunner {
        async fn run(
            &self,
            command: &str,
            _timeout: Option<Duration>,
        ) -> Result<CommandOutput, ExecError> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(self
                .rules
                .iter()
                .find(|(needle, _)| command.contains(needle.as_str()))
                .map(|(_, out)| out.clone())
                .unwrap_or_default())
        }
    }

    #[test]
    fn test_scenario_kind_round_trip_names() {
        assert_eq!("bug_fix".parse::<ScenarioKind>().unwrap(), ScenarioKind::BugFix);
        assert_eq!(ScenarioKind::BugFixLinear.to_string(), "bug_fix_linear");
        assert!("bug_hunt".parse::<ScenarioKind>().is_err());
        assert_eq!(
            serde_json::to_value(ScenarioKind::BugFixLinear).unwrap(),
            "bug_fix_linear"
        );
    }

    #[tokio::test]
    async fn test_setup_rejects_bad_args() {
        let task = Task::new("broken", ScenarioKind::BugFix, serde_json::json!({"prompt": "x"}));
        let ctx = ScenarioContext::new(Arc::new(MockRunner::new()));
        let err = setup(&task, ctx).await.err().unwrap();
        assert!(matches!(err, ScenarioError::InvalidArgs { .. }));
    }
}

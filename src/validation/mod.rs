//! Baseline and golden validation of tasks.
//!
//! A valid task fails on the untouched baseline (score below 1) and scores
//! exactly 1 once its validation steps have been replayed. Each run gets a
//! fresh [`ScenarioContext`] so service state never leaks between runs.

use std::io::Write;
use std::time::Duration;

use crate::error::ValidationError;
use crate::scenario::{self, ScenarioContext};
use crate::tasks::{Task, TaskRegistry, ToolCall};

const STEP_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of one run: the score, or why the run did not finish.
pub type RunResult = Result<f64, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct TaskValidation {
    pub name: String,
    pub baseline: RunResult,
    pub golden: RunResult,
}

impl TaskValidation {
    pub fn baseline_ok(&self) -> bool {
        matches!(self.baseline, Ok(score) if score < 1.0 - 1e-9)
    }

    pub fn golden_ok(&self) -> bool {
        matches!(self.golden, Ok(score) if score >= 1.0 - 1e-9)
    }

    pub fn is_valid(&self) -> bool {
        self.baseline_ok() && self.golden_ok()
    }

    /// One-line report.
    pub fn line(&self) -> String {
        let show = |run: &RunResult| match run {
            Ok(score) => format!("{score:.2}"),
            Err(err) => format!("error ({err})"),
        };
        let status = if self.is_valid() { "PASS" } else { "FAIL" };
        let mut line = format!(
            "{status} {}: baseline {}, golden {}",
            self.name,
            show(&self.baseline),
            show(&self.golden)
        );
        if !self.baseline_ok() {
            line.push_str(" [baseline should score < 1]");
        }
        if !self.golden_ok() {
            line.push_str(" [golden should score 1]");
        }
        line
    }
}

/// Replay validation steps: `bash` through the runner, everything else through the services.
pub async fn replay(steps: &[ToolCall], ctx: &ScenarioContext) -> Result<(), ValidationError> {
    for (index, step) in steps.iter().enumerate() {
        let failed = |reason: String| ValidationError::StepFailed {
            index,
            tool: step.name.clone(),
            reason,
        };
        tracing::debug!(index, tool = %step.name, "Replaying validation step");
        if step.name == "bash" {
            let command = step
                .command()
                .ok_or_else(|| failed("missing command".to_string()))?;
            let output = ctx
                .runner
                .run(command, Some(STEP_TIMEOUT))
                .await
                .map_err(|e| failed(e.to_string()))?;
            if !output.success() {
                return Err(failed(format!(
                    "exit code {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                )));
            }
        } else {
            ctx.services
                .call_tool(&step.name, &step.arguments)
                .await
                .map_err(|e| failed(e.to_string()))?;
        }
    }
    Ok(())
}

async fn baseline_run(task: &Task, ctx: ScenarioContext) -> Result<f64, ValidationError> {
    let prepared = scenario::setup(task, ctx).await?;
    Ok(prepared.grade().await?.score)
}

async fn golden_run(task: &Task, ctx: ScenarioContext) -> Result<f64, ValidationError> {
    let prepared = scenario::setup(task, ctx).await?;
    replay(&task.validation, prepared.context()).await?;
    Ok(prepared.grade().await?.score)
}

/// Run the baseline and golden passes for one task.
pub async fn validate_task(
    name: &str,
    task: &Task,
    make_ctx: &dyn Fn() -> ScenarioContext,
) -> TaskValidation {
    tracing::info!(task = name, "Validating baseline");
    let baseline = baseline_run(task, make_ctx()).await.map_err(|e| e.to_string());
    tracing::info!(task = name, "Validating golden");
    let golden = golden_run(task, make_ctx()).await.map_err(|e| e.to_string());
    TaskValidation {
        name: name.to_string(),
        baseline,
        golden,
    }
}

/// Validate every task whose name contains `filter`, printing one line each.
pub async fn validate_tasks(
    registry: &TaskRegistry,
    filter: Option<&str>,
    make_ctx: &dyn Fn() -> ScenarioContext,
    out: &mut dyn Write,
) -> Result<Vec<TaskValidation>, ValidationError> {
    let filter = filter.unwrap_or_default();
    let selected: Vec<(&str, &Task)> = registry.matching(filter).collect();
    if selected.is_empty() {
        return Err(ValidationError::NoMatch {
            filter: filter.to_string(),
            available: registry.names().join(", "),
        });
    }

    let mut results = Vec::with_capacity(selected.len());
    for (name, task) in selected {
        let result = validate_task(name, task, make_ctx).await;
        writeln!(out, "{}", result.line())?;
        results.push(result);
    }
    let valid = results.iter().filter(|r| r.is_valid()).count();
    writeln!(out, "\n{valid}/{} tasks valid", results.len())?;
    Ok(results)
}

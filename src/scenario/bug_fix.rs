//! The `bug_fix` scenario.
//!
//! Three grading modes, chosen from the args:
//! - mock services (`repo_name` and `github_data_dir`): the agent pushes to
//!   the GitHub mock; hidden tests run on a clone of its branch and a rubric
//!   judges the pull request.
//! - agentic (`agentic_criteria`): a grading model explores a copy of the
//!   workspace and judges each criterion.
//! - plain: hidden tests are dropped into the workspace and run there.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::workspace::{self, Layout, MockServices};
use super::ScenarioContext;
use crate::error::ScenarioError;
use crate::exec::truncate;
use crate::graders::{
    grade_all, AgenticConfig, AgenticCriterion, AgenticGrader, BashGrader, GitHubLogRubricGrader,
    Grade, Grader, Subscore,
};

/// Rubric for the pull request the agent is expected to open.
pub const PR_RUBRIC: &str =
    "Did the agent create a pull request with a clear description of the bug fix?";

pub const DEFAULT_AGENTIC_MODEL: &str = "claude-opus-4-6";
pub const DEFAULT_AGENTIC_MAX_TURNS: usize = 10;

/// Arguments of the `bug_fix` scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BugFixArgs {
    pub prompt: String,
    pub source_repo: String,
    pub branch_prefix: String,
    pub test_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentry_data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentry_project: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_test_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agentic_criteria: Option<Vec<AgenticCriterion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agentic_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agentic_max_turns: Option<usize>,
}

impl BugFixArgs {
    fn uses_mocks(&self) -> bool {
        self.repo_name.is_some() && self.github_data_dir.is_some()
    }

    fn mocks(&self) -> Option<MockServices<'_>> {
        match (&self.repo_name, &self.github_data_dir) {
            (Some(repo_name), Some(github_data_dir)) => Some(MockServices {
                repo_name,
                github_data_dir,
                linear_data_dir: self.linear_data_dir.as_deref(),
                sentry_data_dir: self.sentry_data_dir.as_deref(),
                sentry_project: self.sentry_project.as_ref(),
            }),
            _ => None,
        }
    }
}

/// A `bug_fix` run after setup.
#[derive(Debug)]
pub struct Prepared {
    args: BugFixArgs,
    layout: Layout,
}

impl Prepared {
    pub fn prompt(&self) -> &str {
        &self.args.prompt
    }
}

pub async fn setup(args: BugFixArgs, ctx: &ScenarioContext) -> Result<Prepared, ScenarioError> {
    let layout = Layout::new(
        &ctx.paths,
        &args.source_repo,
        args.workspace_name.as_deref(),
        &args.branch_prefix,
        &args.test_files,
    )?;

    match args.mocks() {
        Some(mocks) => workspace::setup_with_mocks(ctx, &layout, &mocks).await?,
        None => workspace::setup_direct(ctx, &layout).await?,
    }
    Ok(Prepared { args, layout })
}

pub async fn grade(prepared: Prepared, ctx: &ScenarioContext) -> Result<Grade, ScenarioError> {
    let Prepared { args, layout } = prepared;

    if args.uses_mocks() {
        workspace::prepare_grading_clone(ctx, &layout).await?;
        workspace::run_pre_test_commands(ctx, &layout, args.pre_test_commands.as_deref().unwrap_or_default()).await;
        workspace::apply_test_diffs(ctx, &layout).await;

        let graders: Vec<Box<dyn Grader>> = vec![
            Box::new(BashGrader::new(
                ctx.runner.clone(),
                layout.pytest_command(&layout.grading_dir),
                0.8,
            )),
            Box::new(GitHubLogRubricGrader::new(
                ctx.services.github.clone(),
                ctx.judge.clone(),
                PR_RUBRIC,
                0.2,
            )),
        ];
        return Ok(grade_all(&graders).await?);
    }

    if let Some(criteria) = args.agentic_criteria.as_deref().filter(|c| !c.is_empty()) {
        workspace::copy_workspace_for_grading(ctx, &layout).await?;
        workspace::apply_test_diffs(ctx, &layout).await;
        let subscores = grade_agentic(&args, criteria, ctx).await;
        log_criteria(&subscores);
        return Ok(Grade::from_subscores(subscores)?);
    }

    workspace::write_test_files(ctx, &layout).await;
    let graders: Vec<Box<dyn Grader>> = vec![Box::new(BashGrader::new(
        ctx.runner.clone(),
        layout.pytest_command(&layout.workspace),
        1.0,
    ))];
    Ok(grade_all(&graders).await?)
}

async fn grade_agentic(
    args: &BugFixArgs,
    criteria: &[AgenticCriterion],
    ctx: &ScenarioContext,
) -> Vec<Subscore> {
    let zeroed = |reason: &str| {
        criteria
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Subscore::new(format!("criterion_{}", i + 1), c.weight, 0.0).with_info(serde_json::json!({
                    "rubric": c.rubric,
                    "passed": false,
                    "reasoning": reason,
                    "action_log": [],
                }))
            })
            .collect::<Vec<_>>()
    };

    let Some(judge) = &ctx.judge else {
        tracing::warn!("No grading model configured, agentic criteria score 0");
        return zeroed("no grading model configured");
    };

    let config = AgenticConfig::default()
        .with_model(args.agentic_model.as_deref().unwrap_or(DEFAULT_AGENTIC_MODEL))
        .with_max_turns(args.agentic_max_turns.unwrap_or(DEFAULT_AGENTIC_MAX_TURNS));
    let grader = AgenticGrader::new(judge.provider(), ctx.runner.clone(), config)
        .with_services(ctx.services.github.clone(), ctx.services.linear.clone());
    match grader.grade(&args.prompt, criteria).await {
        Ok(subscores) => subscores,
        Err(e) => {
            tracing::warn!(error = %e, "Agentic grading failed");
            zeroed(&e.to_string())
        }
    }
}

fn log_criteria(subscores: &[Subscore]) {
    for sub in subscores {
        let passed = sub.info.get("passed").and_then(Value::as_bool);
        let icon = match passed {
            Some(true) => "✅",
            Some(false) => "❌",
            None => "📊",
        };
        let steps = sub
            .info
            .get("action_log")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let reasoning = sub.info.get("reasoning").and_then(Value::as_str).unwrap_or_default();
        info!(
            "{icon} {}  passed={passed:?}  turns={}  reasoning={}",
            sub.name,
            steps.len(),
            truncate(reasoning, 300)
        );
        for (i, step) in steps.iter().enumerate() {
            let command = step.get("command").and_then(Value::as_str).unwrap_or_default();
            let action = step.get("action").and_then(Value::as_str).unwrap_or("?");
            info!("  {}. [{action}] {}", i + 1, truncate(command, 120));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::MockRunner;
    use crate::scenario::{setup as setup_task, ScenarioKind};
    use crate::tasks::Task;
    use std::sync::Arc;

    fn plain_args() -> BugFixArgs {
        BugFixArgs {
            prompt: "Fix the JSON serialization bug in server.py.".into(),
            source_repo: "coding-template-sample".into(),
            branch_prefix: "server_fix".into(),
            test_files: vec!["test_server.py".into()],
            workspace_name: Some("workspace".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_args_serialize_without_unset_fields() {
        let value = serde_json::to_value(plain_args()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        assert!(!obj.contains_key("repo_name"));
        assert!(!obj.contains_key("agentic_model"));
    }

    #[test]
    fn test_args_reject_unknown_fields() {
        let err = serde_json::from_value::<BugFixArgs>(serde_json::json!({
            "prompt": "p", "source_repo": "s", "branch_prefix": "b", "test_files": [],
            "linear_rubric": "not a bug_fix arg"
        }));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_plain_path_setup_and_grade() {
        let runner = Arc::new(MockRunner::new());
        let ctx = ScenarioContext::new(runner.clone());
        let task = Task::new(
            "basic",
            ScenarioKind::BugFix,
            serde_json::to_value(plain_args()).unwrap(),
        );

        let prepared = setup_task(&task, ctx).await.unwrap();
        assert!(prepared.prompt().starts_with("Fix the JSON"));
        let grade = prepared.grade().await.unwrap();
        assert_eq!(grade.subscores.len(), 1);
        assert_eq!(grade.score, 1.0);

        let commands = runner.commands();
        assert!(commands.iter().any(|c| c
            == "git clone --single-branch --branch server_fix_baseline /home/root/source/coding-template-sample /home/ubuntu/workspace/workspace"));
        assert!(commands.iter().any(|c| c
            == "git -C /home/root/source/coding-template-sample show server_fix_test:test_server.py > /home/ubuntu/workspace/workspace/test_server.py"));
        assert!(commands.last().unwrap().ends_with("python -m pytest test_server.py -v"));
    }

    #[tokio::test]
    async fn test_mock_path_grades_agent_branch() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            MockRunner::new()
                .on("for-each-ref", 0, "origin\norigin/fix/webhook\norigin/webhook_bug_baseline\n")
                .on("pytest", 1, ""),
        );
        let mut paths = crate::scenario::ScenarioPaths::default();
        paths.mock_data = tmp.path().to_path_buf();
        let ctx = ScenarioContext::new(runner.clone()).with_paths(paths);

        let args = BugFixArgs {
            prompt: "Fix webhooks".into(),
            source_repo: "coding-template-sample".into(),
            branch_prefix: "webhook_bug".into(),
            test_files: vec!["test_notifications.py".into()],
            repo_name: Some("webhook-service".into()),
            workspace_name: Some("webhook_svc".into()),
            github_data_dir: Some("gh".into()),
            pre_test_commands: Some(vec!["cd {grading_dir} && pip install -e .".into()]),
            ..Default::default()
        };
        let task = Task::new("webhook_bug", ScenarioKind::BugFix, serde_json::to_value(args).unwrap());
        let prepared = setup_task(&task, ctx).await.unwrap();
        let grade = prepared.grade().await.unwrap();

        // Tests failed and no judge is configured.
        assert_eq!(grade.score, 0.0);
        assert_eq!(grade.subscores.len(), 2);
        assert_eq!(grade.subscores[0].weight, 0.8);
        assert_eq!(grade.subscores[1].weight, 0.2);

        let commands = runner.commands();
        assert!(commands.iter().any(|c| c
            == "git clone --branch webhook_bug_baseline /srv/git/project.git /home/ubuntu/workspace/webhook_svc"));
        assert!(commands.iter().any(|c| c == "git -C /tmp/grading/webhook_svc checkout fix/webhook"));
        assert!(commands.iter().any(|c| c == "cd /tmp/grading/webhook_svc && pip install -e ."));
        assert!(commands.iter().any(|c| c
            == "git -C /home/root/source/coding-template-sample diff webhook_bug_baseline..webhook_bug_test -- test_notifications.py | git -C /tmp/grading/webhook_svc apply"));
    }

    #[tokio::test]
    async fn test_agentic_path_without_judge_scores_zero() {
        let runner = Arc::new(MockRunner::new());
        let ctx = ScenarioContext::new(runner.clone());
        let mut args = plain_args();
        args.agentic_criteria = Some(vec![
            AgenticCriterion { rubric: "a".into(), weight: 0.5 },
            AgenticCriterion { rubric: "b".into(), weight: 0.5 },
        ]);
        let task = Task::new("agentic", ScenarioKind::BugFix, serde_json::to_value(args).unwrap());
        let grade = setup_task(&task, ctx).await.unwrap().grade().await.unwrap();
        assert_eq!(grade.subscores.len(), 2);
        assert_eq!(grade.score, 0.0);
        assert!(runner
            .commands()
            .iter()
            .any(|c| c.contains("cp -r /home/ubuntu/workspace/workspace /tmp/grading/workspace")));
    }
}

//! The `bug_fix_linear` scenario: `bug_fix` with the mock services always on
//! and the agent's Linear ticket work graded alongside the code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bug_fix::PR_RUBRIC;
use super::workspace::{self, Layout, MockServices};
use super::ScenarioContext;
use crate::error::ScenarioError;
use crate::graders::{
    grade_all, BashGrader, GitHubLogRubricGrader, Grade, Grader, LinearIssueGrader,
    LinearLogRubricGrader,
};

pub const DEFAULT_ISSUE_STATE_TYPE: &str = "completed";

/// Arguments of the `bug_fix_linear` scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BugFixLinearArgs {
    pub prompt: String,
    pub source_repo: String,
    pub branch_prefix: String,
    pub test_files: Vec<String>,
    pub repo_name: String,
    pub github_data_dir: String,
    pub linear_data_dir: String,
    /// Case-insensitive substring identifying the issue the agent must close.
    pub linear_issue_title_contains: String,
    pub linear_rubric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentry_data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentry_project: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_test_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_issue_state_type: Option<String>,
}

#[derive(Debug)]
pub struct Prepared {
    args: BugFixLinearArgs,
    layout: Layout,
}

impl Prepared {
    pub fn prompt(&self) -> &str {
        &self.args.prompt
    }
}

pub async fn setup(
    args: BugFixLinearArgs,
    ctx: &ScenarioContext,
) -> Result<Prepared, ScenarioError> {
    let layout = Layout::new(
        &ctx.paths,
        &args.source_repo,
        args.workspace_name.as_deref(),
        &args.branch_prefix,
        &args.test_files,
    )?;
    let mocks = MockServices {
        repo_name: &args.repo_name,
        github_data_dir: &args.github_data_dir,
        linear_data_dir: Some(&args.linear_data_dir),
        sentry_data_dir: args.sentry_data_dir.as_deref(),
        sentry_project: args.sentry_project.as_ref(),
    };
    workspace::setup_with_mocks(ctx, &layout, &mocks).await?;
    Ok(Prepared { args, layout })
}

pub async fn grade(prepared: Prepared, ctx: &ScenarioContext) -> Result<Grade, ScenarioError> {
    let Prepared { args, layout } = prepared;

    workspace::prepare_grading_clone(ctx, &layout).await?;
    workspace::run_pre_test_commands(
        ctx,
        &layout,
        args.pre_test_commands.as_deref().unwrap_or_default(),
    )
    .await;
    workspace::apply_test_diffs(ctx, &layout).await;

    let graders: Vec<Box<dyn Grader>> = vec![
        Box::new(BashGrader::new(
            ctx.runner.clone(),
            layout.pytest_command(&layout.grading_dir),
            0.6,
        )),
        Box::new(GitHubLogRubricGrader::new(
            ctx.services.github.clone(),
            ctx.judge.clone(),
            PR_RUBRIC,
            0.1,
        )),
        Box::new(LinearIssueGrader::new(
            ctx.services.linear.clone(),
            &args.linear_issue_title_contains,
            args.linear_issue_state_type
                .as_deref()
                .unwrap_or(DEFAULT_ISSUE_STATE_TYPE),
            0.1,
        )),
        Box::new(LinearLogRubricGrader::new(
            ctx.services.linear.clone(),
            ctx.judge.clone(),
            &args.linear_rubric,
            0.2,
        )),
    ];
    Ok(grade_all(&graders).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::MockRunner;
    use crate::scenario::{setup as setup_task, ScenarioKind, ScenarioPaths};
    use crate::tasks::Task;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_linear_grade_weights_and_issue_check() {
        let tmp = tempfile::tempdir().unwrap();
        let linear_dir = tmp.path().join("linear");
        std::fs::create_dir_all(&linear_dir).unwrap();
        std::fs::write(
            linear_dir.join("issues.json"),
            r#"[{"id": "issue-305", "identifier": "ENG-305", "title": "Eval rewards always 0.0"}]"#,
        )
        .unwrap();

        let runner = Arc::new(MockRunner::new().on("for-each-ref", 0, "origin/fix/eval-reward\n"));
        let mut paths = ScenarioPaths::default();
        paths.mock_data = tmp.path().to_path_buf();
        let ctx = ScenarioContext::new(runner).with_paths(paths);

        let args = BugFixLinearArgs {
            prompt: "You have been assigned Linear issue ENG-305.".into(),
            source_repo: "sdlc-tasks-data".into(),
            branch_prefix: "eval_reward".into(),
            test_files: vec!["tests/test_eval_reward.py".into()],
            repo_name: "hud-sdk".into(),
            github_data_dir: "github".into(),
            linear_data_dir: "linear".into(),
            linear_issue_title_contains: "rewards".into(),
            linear_rubric: "Did the agent comment?".into(),
            workspace_name: Some("hud_python".into()),
            ..Default::default()
        };
        let task = Task::new("eval_reward", ScenarioKind::BugFixLinear, serde_json::to_value(args).unwrap());
        let prepared = setup_task(&task, ctx).await.unwrap();

        prepared
            .context()
            .services
            .call_tool("linear_update_issue", &serde_json::json!({"id": "issue-305", "state": "Done"}))
            .await
            .unwrap();

        let grade = prepared.grade().await.unwrap();
        let weights: Vec<f64> = grade.subscores.iter().map(|s| s.weight).collect();
        assert_eq!(weights, vec![0.6, 0.1, 0.1, 0.2]);
        // Tests pass, issue closed, rubrics unscored without a judge.
        assert!((grade.score - 0.7).abs() < 1e-9);
    }
}

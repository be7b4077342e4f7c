use serde_json::json;

use crate::scenario::BugFixLinearArgs;
use crate::tasks::{commit_and_push_step, golden_patch_step, Task, ToolCall};

pub const SLUG: &str = "eval_reward";

const WORKSPACE: &str = "/home/ubuntu/workspace/hud_python";
const BRANCH: &str = "fix/eval-reward-pipeline";
const TITLE: &str = "fix: reward pipeline — forward structuredContent, fix propagation, CLI --full flag";

pub fn task() -> Task {
    let mut validation: Vec<ToolCall> = golden_patch_step(WORKSPACE, include_str!("golden.patch"))
        .into_iter()
        .collect();
    validation.extend([
        commit_and_push_step(WORKSPACE, BRANCH, TITLE),
        ToolCall::new(
            "create_pull_request",
            json!({
                "owner": "acme-corp",
                "repo": "hud-sdk",
                "title": TITLE,
                "body": "## Summary\n\n\
                         Fixed 5 bugs causing evaluation rewards to always return 0.0:\n\n\
                         1. `_execute_tool` now forwards `structuredContent` for both local and remote tools\n\
                         2. Runner no longer overwrites `ctx.reward` before evaluate tools run\n\
                         3. `EvalContext.__aexit__` unconditionally propagates `_evaluate_reward`\n\
                         4. `--full` CLI flag now composes `--all`, `--auto-respond`, and `--max-steps 100`\n\
                         5. `find_reward` error logging now shows `structuredContent` instead of full object\n\n\
                         Fixes ENG-305.",
                "head": BRANCH,
                "base": "eval_reward_baseline",
            }),
        ),
        ToolCall::new(
            "create_comment",
            json!({
                "issueId": "issue-305",
                "body": "Fixed all 5 reward pipeline bugs:\n\n\
                         1. `environment.py`: `_execute_tool` was dropping `structuredContent` — now forwarded\n\
                         2. `runner.py`: removed `ctx.reward = result.reward` that overwrote evaluate tool results\n\
                         3. `context.py`: `__aexit__` now unconditionally propagates `_evaluate_reward`\n\
                         4. `cli/eval.py`: `--full` now sets `auto_respond=True` and `max_steps=100`\n\
                         5. `agents/base.py`: improved error logging in `find_reward`\n\n\
                         PR: fix/eval-reward-pipeline",
            }),
        ),
        ToolCall::new(
            "linear_update_issue",
            json!({ "id": "issue-305", "state": "Done" }),
        ),
    ]);

    Task::bug_fix_linear(
        SLUG,
        BugFixLinearArgs {
            prompt: "You have been assigned Linear issue ENG-305. \
                     Use the Linear tools to read the ticket details.\n\n\
                     Then investigate the codebase at /home/ubuntu/workspace/hud_python \
                     and use the GitHub tools to explore the repository \
                     (owner: acme-corp, repo: hud-sdk).\n\n\
                     There are multiple related bugs causing evaluation rewards to \
                     always return 0.0. The bugs span the eval CLI, the dataset runner, \
                     the environment tool execution, and the eval context. \
                     Fix all of them. Once fixed:\n\
                     1. Commit your changes to a new branch\n\
                     2. Push the branch to origin\n\
                     3. Create a pull request using the GitHub tools\n\
                     4. Leave a comment on the Linear issue summarizing your fix\n\
                     5. Mark the Linear issue as Done\n"
                .to_string(),
            source_repo: "sdlc-tasks-data".to_string(),
            repo_name: "hud-sdk".to_string(),
            workspace_name: Some("hud_python".to_string()),
            branch_prefix: "eval_reward".to_string(),
            test_files: vec!["tests/test_eval_reward.py".to_string()],
            github_data_dir: "eval_reward_task/hud_python_github_data".to_string(),
            linear_data_dir: "eval_reward_task/hud_python_linear_data".to_string(),
            linear_issue_title_contains: "rewards".to_string(),
            linear_rubric: "Did the agent leave a meaningful comment on the Linear issue summarizing \
                            the diagnosis and fix? Did the agent mark the issue as Done?"
                .to_string(),
            pre_test_commands: Some(vec![
                "cd {grading_dir} && pip install --no-deps --force-reinstall -e . -q 2>/dev/null || true"
                    .to_string(),
            ]),
            ..Default::default()
        },
    )
    .with_validation(validation)
}

use serde_json::json;

use crate::scenario::BugFixArgs;
use crate::tasks::{commit_and_push_step, golden_patch_step, Task, ToolCall};

pub const SLUG: &str = "sentry_triage";

const WORKSPACE: &str = "/home/ubuntu/workspace/user_service";
const BRANCH: &str = "fix/handle-missing-profile";
const TITLE: &str = "fix: handle None/missing user profile gracefully";

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
                "repo": "user-service",
                "title": TITLE,
                "body": "## Summary\n\n\
                         Fixed TypeError crash in `get_user_profile()` when a user has no profile \
                         (profile is `None` or the key is missing entirely).\n\n\
                         The function now falls back to `user['name']` when profile is unavailable.\n\n\
                         Fixes Sentry issue USER-SVC-1 (142 occurrences, 23 users affected).",
                "head": BRANCH,
                "base": "sentry_fix_baseline",
            }),
        ),
    ]);

    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "There are production errors showing up in Sentry for the user-service project. \
                     Use the Sentry tools to investigate the unresolved issues — check the error \
                     details, stacktraces, and affected users.\n\n\
                     The code is available locally at /home/ubuntu/workspace/user_service and via \
                     GitHub (owner: acme-corp, repo: user-service).\n\n\
                     Diagnose and fix the bug. Once fixed:\n\
                     1. Commit your changes to a new branch\n\
                     2. Push the branch to origin\n\
                     3. Create a pull request using the GitHub tools\n"
                .to_string(),
            source_repo: "coding-template-sample".to_string(),
            repo_name: Some("user-service".to_string()),
            workspace_name: Some("user_service".to_string()),
            branch_prefix: "sentry_fix".to_string(),
            test_files: vec!["test_user_service.py".to_string()],
            github_data_dir: Some("sentry_triage_task/github_data".to_string()),
            sentry_data_dir: Some("sentry_triage_task/sentry_data".to_string()),
            sentry_project: Some(json!({
                "id": "2",
                "slug": "user-service",
                "name": "user-service",
                "platform": "python",
            })),
            ..Default::default()
        },
    )
    .with_validation(validation)
}

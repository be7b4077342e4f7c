use serde_json::json;

use crate::scenario::BugFixArgs;
use crate::tasks::{commit_and_push_step, golden_patch_step, Task, ToolCall};

pub const SLUG: &str = "webhook_bug";

const WORKSPACE: &str = "/home/ubuntu/workspace/webhook_svc";
const BRANCH: &str = "fix/webhook-mutation-bug";
const TITLE: &str = "fix: copy channels list to prevent mutation across webhook events";

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
                "repo": "webhook-service",
                "title": TITLE,
                "body": "## Summary\n\n\
                         Fixed notification delivery bug where users received notifications on \
                         channels they hadn't opted into.\n\n\
                         The root cause was that `resolve_channels()` returned a reference to the \
                         shared channel list in `CHANNEL_REGISTRY`. When `build_notification()` \
                         appended extra channels, it mutated the registry entry, causing subsequent \
                         events to inherit channels from earlier ones.\n\n\
                         The fix copies the channel list before modification so each event gets \
                         its own independent list.\n\n\
                         Fixes #42, #45",
                "head": BRANCH,
                "base": "webhook_bug_baseline",
            }),
        ),
    ]);

    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "You are an on-call engineer for the Platform team. \
                     There have been reports of notification delivery issues in the webhook service.\n\n\
                     Check the GitHub issues on the acme-corp/webhook-service repository for details. \
                     The code is available locally at /home/ubuntu/workspace/webhook_svc.\n\n\
                     Your job:\n\
                     1. Investigate the reported issues and the codebase to identify the root cause\n\
                     2. Fix the bug\n\
                     3. Commit your changes to a new branch and push to origin\n\
                     4. Create a pull request using the GitHub tools\n\
                     5. Create a Linear ticket (team: Platform) documenting your diagnosis and fix\n\
                     6. Mark your Linear ticket as Done\n"
                .to_string(),
            source_repo: "coding-template-sample".to_string(),
            repo_name: Some("webhook-service".to_string()),
            workspace_name: Some("webhook_svc".to_string()),
            branch_prefix: "webhook_bug".to_string(),
            test_files: vec!["test_notifications.py".to_string()],
            github_data_dir: Some("webhook_bug_task/webhook_github_data".to_string()),
            linear_data_dir: Some("webhook_bug_task/webhook_linear_data".to_string()),
            ..Default::default()
        },
    )
    .with_validation(validation)
}

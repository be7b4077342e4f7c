use crate::scenario::BugFixArgs;
use crate::tasks::{golden_patch_step, Task};

pub const SLUG: &str = "basic";

const WORKSPACE: &str = "/home/ubuntu/workspace/workspace";

pub fn task() -> Task {
    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "Fix the JSON serialization bug in server.py. \
                     The API server's responses are malformed — the response body is not valid JSON, \
                     it looks like a Python dict representation instead of proper JSON."
                .to_string(),
            source_repo: "coding-template-sample".to_string(),
            workspace_name: Some("workspace".to_string()),
            branch_prefix: "server_fix".to_string(),
            test_files: vec!["test_server.py".to_string()],
            ..Default::default()
        },
    )
    .with_validation(
        golden_patch_step(WORKSPACE, include_str!("golden.patch"))
            .into_iter()
            .collect(),
    )
}

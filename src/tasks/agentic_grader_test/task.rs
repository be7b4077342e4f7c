use crate::graders::AgenticCriterion;
use crate::scenario::BugFixArgs;
use crate::tasks::{golden_patch_step, Task};

pub const SLUG: &str = "agentic_grader_test";

const WORKSPACE: &str = "/home/ubuntu/workspace/workspace";
const GRADING_DIR: &str = "/tmp/grading/workspace";

pub fn task() -> Task {
    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "Fix the JSON serialization bug in server.py.\n\n\
                     The API server's responses are malformed. When you make a request to any endpoint,\n\
                     the response body is not valid JSON — it looks like a Python dict representation\n\
                     instead of proper JSON (e.g., single quotes instead of double quotes)."
                .to_string(),
            source_repo: "coding-template-sample".to_string(),
            workspace_name: Some("workspace".to_string()),
            branch_prefix: "server_fix".to_string(),
            test_files: vec!["test_server.py".to_string()],
            agentic_criteria: Some(vec![
                AgenticCriterion {
                    rubric: format!(
                        "Inspect the code in {WORKSPACE}/server.py. \
                         Has the agent fixed the root cause of the malformed JSON responses? \
                         The bug was that the server returned Python string representations \
                         (single quotes, Python-style True/False/None) instead of valid JSON. \
                         The fix should ensure all API responses are valid JSON. \
                         Any approach that achieves this is acceptable (json.dumps, jsonify, \
                         a serialization library, etc.)."
                    ),
                    weight: 0.5,
                },
                AgenticCriterion {
                    rubric: format!(
                        "Do all hidden unit tests pass? Run: \
                         cd {GRADING_DIR} && python -m pytest test_server.py -v"
                    ),
                    weight: 0.5,
                },
            ]),
            ..Default::default()
        },
    )
    .with_validation(
        golden_patch_step(WORKSPACE, include_str!("golden.patch"))
            .into_iter()
            .collect(),
    )
}

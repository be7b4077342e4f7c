use crate::scenario::BugFixArgs;
use crate::tasks::Task;

pub const SLUG: &str = "openai_schema";

pub fn task() -> Task {
    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "You have been assigned Linear issue ENG-201. \
                     Use the Linear tools to read the ticket details.\n\n\
                     Then investigate the codebase at /home/ubuntu/workspace/hud_python \
                     and use the GitHub tools to explore the repository \
                     (owner: acme-corp, repo: hud-sdk).\n\n\
                     Fix the bug described in the ticket. Once fixed:\n\
                     1. Commit your changes to a new branch\n\
                     2. Push the branch to origin\n\
                     3. Create a pull request using the GitHub tools\n\
                     4. Leave a comment on the Linear issue summarizing your fix\n\
                     5. Mark the Linear issue as Done\n"
                .to_string(),
            source_repo: "sdlc-tasks-data".to_string(),
            repo_name: Some("hud-sdk".to_string()),
            workspace_name: Some("hud_python".to_string()),
            branch_prefix: "openai_schema".to_string(),
            test_files: vec!["hud/environment/tests/test_openai_schema_mutation.py".to_string()],
            github_data_dir: Some("openai_schema_task/hud_python_github_data".to_string()),
            linear_data_dir: Some("openai_schema_task/hud_python_linear_data".to_string()),
            pre_test_commands: Some(vec![
                "cd {grading_dir} && pip install --no-deps -e . -q 2>/dev/null || true".to_string(),
            ]),
            ..Default::default()
        },
    )
}

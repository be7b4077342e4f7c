use crate::scenario::BugFixArgs;
use crate::tasks::Task;

pub const SLUG: &str = "github_linear";

pub fn task() -> Task {
    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "You have been assigned Linear issue ENG-1. \
                     Use the Linear tools to read the ticket details.\n\n\
                     Then use the GitHub tools to explore the repository \
                     (owner: acme-corp, repo: server-app). \
                     The code is also available locally at /home/ubuntu/workspace/server_repo.\n\n\
                     Fix the bug described in the ticket. Once fixed:\n\
                     1. Commit your changes to a new branch\n\
                     2. Push the branch to origin\n\
                     3. Create a pull request using the GitHub tools\n\
                     4. Leave a comment on the Linear issue summarizing what you did\n\
                     5. Mark the Linear issue as Done\n"
                .to_string(),
            source_repo: "coding-template-sample".to_string(),
            repo_name: Some("server-app".to_string()),
            workspace_name: Some("server_repo".to_string()),
            branch_prefix: "server_fix".to_string(),
            test_files: vec!["test_server.py".to_string()],
            github_data_dir: Some("github_linear_task/github_data".to_string()),
            linear_data_dir: Some("github_linear_task/linear_data".to_string()),
            ..Default::default()
        },
    )
}

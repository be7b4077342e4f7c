use crate::scenario::BugFixArgs;
use crate::tasks::Task;

pub const SLUG: &str = "notification_bug";

pub fn task() -> Task {
    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "You have been assigned Linear issue PLT-42. \
                     Use the Linear tools to read the ticket details.\n\n\
                     Then use the GitHub tools to explore the repository \
                     (owner: acme-corp, repo: task-manager). \
                     The code is also available locally at /home/ubuntu/workspace/task_manager.\n\n\
                     Diagnose and fix the bug described in the ticket. \
                     The GitHub issues may contain useful context. Once fixed:\n\
                     1. Commit your changes to a new branch\n\
                     2. Push the branch to origin\n\
                     3. Create a pull request using the GitHub tools\n\
                     4. Leave a comment on the Linear issue summarizing your diagnosis and fix\n\
                     5. Mark the Linear issue as Done\n"
                .to_string(),
            source_repo: "coding-template-sample".to_string(),
            repo_name: Some("task-manager".to_string()),
            workspace_name: Some("task_manager".to_string()),
            branch_prefix: "notif_bug".to_string(),
            test_files: vec!["test_notifications.py".to_string()],
            github_data_dir: Some("notification_bug_task/notif_github_data".to_string()),
            linear_data_dir: Some("notification_bug_task/notif_linear_data".to_string()),
            ..Default::default()
        },
    )
}

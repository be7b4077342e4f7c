use crate::scenario::BugFixArgs;
use crate::tasks::Task;

pub const SLUG: &str = "settings_bug";

pub fn task() -> Task {
    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "You are an on-call engineer for the Platform team. \
                     There have been user complaints about the settings API.\n\n\
                     Check the GitHub issues on the acme-corp/settings-api repository for details. \
                     The code is available locally at /home/ubuntu/workspace/settings_api.\n\n\
                     Your job:\n\
                     1. Investigate the reported issues and the codebase to identify the root cause\n\
                     2. Fix the bug\n\
                     3. Commit your changes to a new branch and push to origin\n\
                     4. Create a pull request using the GitHub tools\n\
                     5. Create a Linear ticket (team: Platform) documenting your diagnosis and fix\n\
                     6. Mark your Linear ticket as Done\n"
                .to_string(),
            source_repo: "coding-template-sample".to_string(),
            repo_name: Some("settings-api".to_string()),
            workspace_name: Some("settings_api".to_string()),
            branch_prefix: "settings_bug".to_string(),
            test_files: vec!["test_settings.py".to_string()],
            github_data_dir: Some("settings_bug_task/settings_github_data".to_string()),
            linear_data_dir: Some("settings_bug_task/settings_linear_data".to_string()),
            ..Default::default()
        },
    )
}

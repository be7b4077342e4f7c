//! Repository steps shared by the bug-fix scenarios.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, warn};

use super::{ScenarioContext, ScenarioPaths};
use crate::error::{ExecError, ScenarioError};
use crate::exec::{ensure_safe_path, ensure_safe_ref, shell_quote, truncate};
use crate::services::{GitHubConfig, LinearConfig, SentryConfig};

/// Paths and branch names derived from a task's args.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub source: PathBuf,
    pub workspace: PathBuf,
    pub grading_dir: PathBuf,
    pub baseline: String,
    pub test_branch: String,
    pub golden_branch: String,
    pub test_files: Vec<String>,
}

impl Layout {
    /// Derive the layout, rejecting names that are unsafe in shell commands.
    pub fn new(
        paths: &ScenarioPaths,
        source_repo: &str,
        workspace_name: Option<&str>,
        branch_prefix: &str,
        test_files: &[String],
    ) -> Result<Self, ExecError> {
        ensure_safe_ref(source_repo)?;
        ensure_safe_ref(branch_prefix)?;
        let ws = workspace_name.unwrap_or(source_repo);
        ensure_safe_ref(ws)?;
        for tf in test_files {
            ensure_safe_path(tf)?;
        }
        Ok(Self {
            source: paths.sources.join(source_repo),
            workspace: paths.workspaces.join(ws),
            grading_dir: paths.grading.join(ws),
            baseline: format!("{branch_prefix}_baseline"),
            test_branch: format!("{branch_prefix}_test"),
            golden_branch: format!("{branch_prefix}_golden"),
            test_files: test_files.to_vec(),
        })
    }

    /// `cd <dir> && python -m pytest <files> -v`.
    pub fn pytest_command(&self, dir: &std::path::Path) -> String {
        format!(
            "cd {} && python -m pytest {} -v",
            q(dir),
            self.test_files.join(" ")
        )
    }
}

fn q(path: &std::path::Path) -> String {
    shell_quote(&path.display().to_string())
}

/// Optional mock-service data directories, relative to the mock data root.
#[derive(Debug, Clone, Default)]
pub struct MockServices<'a> {
    pub repo_name: &'a str,
    pub github_data_dir: &'a str,
    pub linear_data_dir: Option<&'a str>,
    pub sentry_data_dir: Option<&'a str>,
    pub sentry_project: Option<&'a serde_json::Value>,
}

async fn step(ctx: &ScenarioContext, command: &str) -> Result<(), ScenarioError> {
    ctx.runner.run_checked(command).await.map_err(|e| {
        ScenarioError::Setup(format!("{}: {e}", truncate(command, 200)))
    })?;
    Ok(())
}

async fn soft_step(ctx: &ScenarioContext, command: &str) {
    match ctx.runner.run(command, None).await {
        Ok(out) if out.success() => {}
        Ok(out) => warn!(
            command = %truncate(command, 200),
            exit_code = out.exit_code,
            stderr = %truncate(out.stderr.trim(), 300),
            "Step failed, continuing"
        ),
        Err(e) => warn!(command = %truncate(command, 200), error = %e, "Step failed, continuing"),
    }
}

/// Commands that recreate the bare repository from the source checkout.
pub fn repo_setup_commands(paths: &ScenarioPaths, layout: &Layout) -> Vec<String> {
    let bare = q(&paths.bare_repo);
    let parent = paths
        .bare_repo
        .parent()
        .map(q)
        .unwrap_or_else(|| "/".to_string());
    vec![
        "git config --global --add safe.directory '*'".to_string(),
        format!(
            "su -c \"git config --global --add safe.directory '*'\" {} || true",
            paths.workspace_user
        ),
        format!("rm -rf {bare}"),
        format!("mkdir -p {parent}"),
        format!("git clone --bare {} {bare}", q(&layout.source)),
        format!("git -C {bare} branch -D {} || true", layout.test_branch),
        format!("git -C {bare} branch -D {} || true", layout.golden_branch),
    ]
}

/// Configure the mock services and give the agent a clone of the baseline.
pub async fn setup_with_mocks(
    ctx: &ScenarioContext,
    layout: &Layout,
    mocks: &MockServices<'_>,
) -> Result<(), ScenarioError> {
    ensure_safe_ref(mocks.repo_name)?;
    let paths = &ctx.paths;
    let mut repo_setup = BTreeMap::new();
    repo_setup.insert(mocks.repo_name.to_string(), repo_setup_commands(paths, layout));

    ctx.services
        .github
        .configure(GitHubConfig {
            bare_repo_path: paths.bare_repo.clone(),
            data_dir: paths.mock_data.join(mocks.github_data_dir),
            repo_owner: paths.repo_owner.clone(),
            repo_name: mocks.repo_name.to_string(),
            default_branch: layout.baseline.clone(),
            repo_setup,
        })
        .await?;
    ctx.services.github.setup_repos().await?;

    let repo_url = ctx.services.github.repo_url().await?;
    let ws = q(&layout.workspace);
    step(ctx, &format!("rm -rf {ws}")).await?;
    step(
        ctx,
        &format!(
            "git clone --branch {} {} {ws}",
            layout.baseline,
            shell_quote(&repo_url)
        ),
    )
    .await?;
    soft_step(
        ctx,
        &format!("chown -R {0}:{0} {ws}", paths.workspace_user),
    )
    .await;

    if let Some(dir) = mocks.linear_data_dir {
        ctx.services
            .linear
            .configure(LinearConfig {
                data_dir: paths.mock_data.join(dir),
            })
            .await?;
    }
    if let Some(dir) = mocks.sentry_data_dir {
        ctx.services
            .sentry
            .configure(SentryConfig {
                data_dir: paths.mock_data.join(dir),
                project: mocks.sentry_project.cloned(),
            })
            .await?;
    }
    info!(workspace = %layout.workspace.display(), branch = %layout.baseline, "Workspace ready");
    Ok(())
}

/// Fresh single-branch clone of the baseline straight from the source.
pub async fn setup_direct(ctx: &ScenarioContext, layout: &Layout) -> Result<(), ScenarioError> {
    let ws = q(&layout.workspace);
    step(ctx, &format!("rm -rf {ws}")).await?;
    if let Some(parent) = layout.workspace.parent() {
        step(ctx, &format!("mkdir -p {}", q(parent))).await?;
    }
    step(
        ctx,
        &format!(
            "git clone --single-branch --branch {} {} {ws}",
            layout.baseline,
            q(&layout.source)
        ),
    )
    .await?;
    soft_step(
        ctx,
        &format!("chown -R {0}:{0} {ws}", ctx.paths.workspace_user),
    )
    .await;
    info!(workspace = %layout.workspace.display(), branch = %layout.baseline, "Workspace ready");
    Ok(())
}

/// Pick the branch the agent pushed: the most recently committed remote ref.
pub fn select_agent_branch(for_each_ref_output: &str) -> Option<String> {
    for_each_ref_output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "origin" && !l.ends_with("/HEAD"))
        .map(|l| l.strip_prefix("origin/").unwrap_or(l).to_string())
        .next()
}

/// Clone the bare repo into the grading dir and check out the agent's branch.
pub async fn prepare_grading_clone(
    ctx: &ScenarioContext,
    layout: &Layout,
) -> Result<String, ScenarioError> {
    let gd = q(&layout.grading_dir);
    step(
        ctx,
        &format!(
            "mkdir -p {} && rm -rf {gd} && git clone {} {gd}",
            q(&ctx.paths.grading),
            q(&ctx.paths.bare_repo)
        ),
    )
    .await?;

    let refs = ctx
        .runner
        .run_checked(&format!(
            "git -C {gd} for-each-ref --sort=-committerdate '--format=%(refname:short)' refs/remotes/origin"
        ))
        .await?;
    let branch = select_agent_branch(&refs.stdout)
        .ok_or_else(|| ScenarioError::NoAgentBranch(layout.grading_dir.display().to_string()))?;
    ensure_safe_ref(&branch)?;
    info!(branch = %branch, "Grading agent branch");
    step(ctx, &format!("git -C {gd} checkout {branch}")).await?;
    Ok(branch)
}

/// Copy the agent's workspace into the grading dir as is.
pub async fn copy_workspace_for_grading(
    ctx: &ScenarioContext,
    layout: &Layout,
) -> Result<(), ScenarioError> {
    step(
        ctx,
        &format!(
            "mkdir -p {} && rm -rf {gd} && cp -r {} {gd}",
            q(&ctx.paths.grading),
            q(&layout.workspace),
            gd = q(&layout.grading_dir)
        ),
    )
    .await
}

/// Run `pre_test_commands` with `{grading_dir}` substituted.
pub async fn run_pre_test_commands(ctx: &ScenarioContext, layout: &Layout, commands: &[String]) {
    let grading_dir = layout.grading_dir.display().to_string();
    for cmd in commands {
        soft_step(ctx, &cmd.replace("{grading_dir}", &grading_dir)).await;
    }
}

/// Apply the hidden test diff (baseline..test) for each test file.
pub async fn apply_test_diffs(ctx: &ScenarioContext, layout: &Layout) {
    for tf in &layout.test_files {
        soft_step(
            ctx,
            &format!(
                "git -C {} diff {}..{} -- {tf} | git -C {} apply",
                q(&layout.source),
                layout.baseline,
                layout.test_branch,
                q(&layout.grading_dir)
            ),
        )
        .await;
    }
}

/// Write the test branch's version of each test file into the workspace.
pub async fn write_test_files(ctx: &ScenarioContext, layout: &Layout) {
    for tf in &layout.test_files {
        soft_step(
            ctx,
            &format!(
                "git -C {} show {}:{tf} > {}",
                q(&layout.source),
                layout.test_branch,
                q(&layout.workspace.join(tf))
            ),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new(
            &ScenarioPaths::default(),
            "coding-template-sample",
            Some("webhook_svc"),
            "webhook_bug",
            &["test_notifications.py".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_layout_derivation() {
        let l = layout();
        assert_eq!(l.source, PathBuf::from("/home/root/source/coding-template-sample"));
        assert_eq!(l.workspace, PathBuf::from("/home/ubuntu/workspace/webhook_svc"));
        assert_eq!(l.grading_dir, PathBuf::from("/tmp/grading/webhook_svc"));
        assert_eq!(l.baseline, "webhook_bug_baseline");
        assert_eq!(l.test_branch, "webhook_bug_test");
        assert_eq!(l.golden_branch, "webhook_bug_golden");
    }

    #[test]
    fn test_layout_defaults_workspace_to_source_repo() {
        let l = Layout::new(&ScenarioPaths::default(), "sample", None, "fix", &[]).unwrap();
        assert_eq!(l.workspace, PathBuf::from("/home/ubuntu/workspace/sample"));
    }

    #[test]
    fn test_layout_rejects_shell_metacharacters() {
        let paths = ScenarioPaths::default();
        assert!(Layout::new(&paths, "repo", None, "fix; rm -rf /", &[]).is_err());
        assert!(Layout::new(&paths, "repo", None, "fix", &["a.py && true".to_string()]).is_err());
        assert!(Layout::new(&paths, "../etc", None, "fix", &[]).is_err());
    }

    #[test]
    fn test_pytest_command() {
        let l = layout();
        assert_eq!(
            l.pytest_command(&l.grading_dir),
            "cd /tmp/grading/webhook_svc && python -m pytest test_notifications.py -v"
        );
    }

    #[test]
    fn test_select_agent_branch() {
        let out = "origin\norigin/fix/webhook-mutation-bug\norigin/webhook_bug_baseline\n";
        assert_eq!(select_agent_branch(out).as_deref(), Some("fix/webhook-mutation-bug"));
        assert_eq!(select_agent_branch("origin/HEAD\n").as_deref(), None);
        assert_eq!(select_agent_branch("").as_deref(), None);
    }

    #[test]
    fn test_repo_setup_commands_drop_hidden_branches() {
        let cmds = repo_setup_commands(&ScenarioPaths::default(), &layout());
        assert!(cmds.contains(&"git clone --bare /home/root/source/coding-template-sample /srv/git/project.git".to_string()));
        assert!(cmds.contains(&"git -C /srv/git/project.git branch -D webhook_bug_test || true".to_string()));
        assert!(cmds.contains(&"git -C /srv/git/project.git branch -D webhook_bug_golden || true".to_string()));
    }
}

//! End-to-end checks of the `sdlc` binary.

use std::process::Command;

fn sdlc() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sdlc"));
    cmd.env_remove("HUD_API_KEY").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let out = sdlc().arg("--help").output().unwrap();
    assert!(out.status.success());
    let help = String::from_utf8_lossy(&out.stdout);
    for sub in [
        "dev",
        "build",
        "deploy",
        "update",
        "setup",
        "new-task",
        "sync-tasks",
        "generate-golden",
        "validate",
        "clone-repos",
    ] {
        assert!(help.contains(sub), "missing {sub} in help");
    }
}

#[test]
fn test_new_task_scaffolds_and_refuses_duplicate() {
    let root = tempfile::tempdir().unwrap();
    let run = || {
        sdlc()
            .args(["new-task", "fix_auth_bug", "--root"])
            .arg(root.path())
            .output()
            .unwrap()
    };

    let out = run();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Created src/tasks/fix_auth_bug/"));
    assert!(root.path().join("src/tasks/fix_auth_bug/golden.patch").is_file());

    let out = run();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_sync_tasks_without_api_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = sdlc()
        .current_dir(dir.path())
        .args(["sync-tasks", "--taskset", "t", "--env", "e"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("sync-tasks failed: HUD_API_KEY is not set"), "{stdout}");
}

#[test]
fn test_invalid_task_name_rejected() {
    let root = tempfile::tempdir().unwrap();
    let out = sdlc()
        .args(["new-task", "Fix-Auth", "--root"])
        .arg(root.path())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Invalid task name 'Fix-Auth'"));
}

//! Cloner tests against real git repositories created in a temp dir.

use std::path::Path;
use std::process::Command;

use sdlc_tasks::repos::{ClonerConfig, RepoCloner, RepoConfig, RepoManifest};

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(["-c", "user.name=t", "-c", "user.email=t@t", "-c", "init.defaultBranch=main"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git should run");
    assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// Origin with `main`, `fix_baseline` and `fix_test` branches.
fn make_origin(root: &Path) -> String {
    let origin = root.join("origin");
    std::fs::create_dir_all(&origin).unwrap();
    git(&origin, &["init"]);
    std::fs::write(origin.join("app.py"), "print('hi')\n").unwrap();
    git(&origin, &["add", "-A"]);
    git(&origin, &["commit", "-m", "init"]);
    git(&origin, &["branch", "fix_baseline"]);
    git(&origin, &["checkout", "-b", "fix_test"]);
    std::fs::write(origin.join("test_app.py"), "def test_x():\n    pass\n").unwrap();
    git(&origin, &["add", "-A"]);
    git(&origin, &["commit", "-m", "tests"]);
    git(&origin, &["checkout", "main"]);
    origin.display().to_string()
}

fn manifest(url: &str) -> RepoManifest {
    RepoManifest {
        repos: vec![(
            "sample".to_string(),
            RepoConfig {
                repo_url: url.to_string(),
                branches: vec![
                    "fix_baseline".to_string(),
                    "fix_test".to_string(),
                    "missing_branch".to_string(),
                ],
            },
        )],
    }
}

#[tokio::test]
async fn test_clone_checks_out_first_branch() {
    let tmp = tempfile::tempdir().unwrap();
    let url = make_origin(tmp.path());
    let base = tmp.path().join("source");

    let cloner = RepoCloner::new(ClonerConfig::new(&base));
    cloner.clone_all(&manifest(&url)).await.unwrap();

    let checkout = base.join("sample");
    assert_eq!(git(&checkout, &["rev-parse", "--abbrev-ref", "HEAD"]), "fix_baseline");
    let branches = git(&checkout, &["branch", "--format=%(refname:short)"]);
    assert!(branches.lines().any(|b| b == "fix_test"));
    assert!(!branches.lines().any(|b| b == "missing_branch"));
}

#[tokio::test]
async fn test_clone_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let url = make_origin(tmp.path());
    let base = tmp.path().join("source");
    let cloner = RepoCloner::new(ClonerConfig::new(&base));

    cloner.clone_all(&manifest(&url)).await.unwrap();
    let checkout = base.join("sample");
    let first = git(&checkout, &["branch", "--format=%(refname:short)"]);

    cloner.clone_all(&manifest(&url)).await.unwrap();
    let second = git(&checkout, &["branch", "--format=%(refname:short)"]);
    assert_eq!(first, second);
    assert_eq!(git(&checkout, &["rev-parse", "--abbrev-ref", "HEAD"]), "fix_baseline");
}

#[tokio::test]
async fn test_empty_manifest_is_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().join("source");
    let cloner = RepoCloner::new(ClonerConfig::new(&base));
    cloner.clone_all(&RepoManifest::default()).await.unwrap();
    assert!(!base.exists());
}

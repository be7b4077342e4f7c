//! `new-task`: scaffold a task module under `src/tasks/<name>/`.

use std::path::{Path, PathBuf};

use regex::Regex;
use tera::{Context, Tera};

use crate::error::ScaffoldError;

const MOD_TEMPLATE: &str = "mod task;\n\npub use task::{task, SLUG};\n";

const TASK_TEMPLATE: &str = r#"use crate::scenario::BugFixArgs;
use crate::tasks::{golden_patch_step, Task};

pub const SLUG: &str = "{{ name }}";

const WORKSPACE: &str = "/home/ubuntu/workspace/repo";

pub fn task() -> Task {
    Task::bug_fix(
        SLUG,
        BugFixArgs {
            prompt: "Describe the bug and what the agent should deliver.".to_string(),
            source_repo: "coding-template-sample".to_string(),
            branch_prefix: "{{ name }}".to_string(),
            test_files: vec!["test.py".to_string()],
            ..Default::default()
        },
    )
    .with_validation(
        golden_patch_step(WORKSPACE, include_str!("golden.patch"))
            .into_iter()
            .collect(),
    )
}
"#;

const TASK_NAME_PATTERN: &str = r"^[a-z][a-z0-9_]*$";

/// Strict and reserved keywords; a task name becomes a `mod` identifier.
const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Snake case, starting with a letter, and not a Rust keyword.
pub fn is_valid_task_name(name: &str) -> bool {
    !RUST_KEYWORDS.contains(&name)
        && Regex::new(TASK_NAME_PATTERN)
            .map(|re| re.is_match(name))
            .unwrap_or(false)
}

/// Files written for a new task.
#[derive(Debug, Clone)]
pub struct ScaffoldedTask {
    pub name: String,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

impl ScaffoldedTask {
    /// Lines printed after scaffolding.
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!("Created src/tasks/{}/", self.name),
            "  task.rs       - edit prompt, source_repo, branch_prefix, test_files".to_string(),
            "  golden.patch  - add golden diff (use generate-golden)".to_string(),
            format!(
                "Register it in src/tasks/mod.rs: add `mod {0};` and `entry!({0}),` to ENTRIES.",
                self.name
            ),
        ]
    }
}

/// Create `<root>/src/tasks/<name>/` with `mod.rs`, `task.rs` and an empty `golden.patch`.
pub fn scaffold_task(root: &Path, name: &str) -> Result<ScaffoldedTask, ScaffoldError> {
    if !is_valid_task_name(name) {
        return Err(ScaffoldError::InvalidName(name.to_string()));
    }

    let dir = root.join("src").join("tasks").join(name);
    if dir.exists() {
        return Err(ScaffoldError::AlreadyExists {
            name: name.to_string(),
            path: dir.display().to_string(),
        });
    }

    let mut context = Context::new();
    context.insert("name", name);
    let task_rs = Tera::one_off(TASK_TEMPLATE, &context, false)?;

    std::fs::create_dir_all(&dir)?;
    let files = [
        ("mod.rs", MOD_TEMPLATE.to_string()),
        ("task.rs", task_rs),
        ("golden.patch", String::new()),
    ]
    .into_iter()
    .map(|(file, content)| {
        let path = dir.join(file);
        std::fs::write(&path, content)?;
        Ok(path)
    })
    .collect::<Result<Vec<_>, std::io::Error>>()?;

    tracing::info!(task = name, dir = %dir.display(), "Scaffolded task");
    Ok(ScaffoldedTask {
        name: name.to_string(),
        dir,
        files,
    })
}

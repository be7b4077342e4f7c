//! The task pack.
//!
//! Every task lives in its own module under `src/tasks/<name>/` and is
//! listed once in [`ENTRIES`]. The table is checked at compile time: two
//! entries with the same slug fail the build.

mod agentic_grader_test;
mod basic;
mod eval_reward;
mod github_linear;
mod notification_bug;
mod openai_schema;
mod order_pricing;
mod sentry_triage;
mod settings_bug;
mod webhook_bug;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::scenario::{BugFixArgs, BugFixLinearArgs, ScenarioKind};

/// A validation step replayed on the golden path: `bash` or a service tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    pub fn bash(command: impl Into<String>) -> Self {
        Self::new("bash", json!({ "command": command.into() }))
    }

    /// The shell command of a `bash` call.
    pub fn command(&self) -> Option<&str> {
        if self.name != "bash" {
            return None;
        }
        self.arguments.get("command").and_then(Value::as_str)
    }
}

/// A benchmark task: a scenario plus its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identity used to match local and remote tasks.
    pub slug: String,
    pub scenario: ScenarioKind,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ToolCall>,
}

impl Task {
    pub fn new(slug: impl Into<String>, scenario: ScenarioKind, args: Value) -> Self {
        Self {
            slug: slug.into(),
            scenario,
            args,
            validation: Vec::new(),
        }
    }

    pub fn bug_fix(slug: impl Into<String>, args: BugFixArgs) -> Self {
        Self::new(
            slug,
            ScenarioKind::BugFix,
            serde_json::to_value(args).unwrap_or_default(),
        )
    }

    pub fn bug_fix_linear(slug: impl Into<String>, args: BugFixLinearArgs) -> Self {
        Self::new(
            slug,
            ScenarioKind::BugFixLinear,
            serde_json::to_value(args).unwrap_or_default(),
        )
    }

    pub fn with_validation(mut self, validation: Vec<ToolCall>) -> Self {
        self.validation = validation;
        self
    }
}

/// `git apply` the golden patch inside `workspace`. `None` for an empty patch.
pub fn golden_patch_step(workspace: &str, patch: &str) -> Option<ToolCall> {
    if patch.trim().is_empty() {
        return None;
    }
    let newline = if patch.ends_with('\n') { "" } else { "\n" };
    Some(ToolCall::bash(format!(
        "cd {workspace} && git apply <<'GOLDEN_PATCH'\n{patch}{newline}GOLDEN_PATCH"
    )))
}

/// `bash` step that commits the workspace to a new branch and pushes it.
pub fn commit_and_push_step(workspace: &str, branch: &str, message: &str) -> ToolCall {
    ToolCall::bash(format!(
        "cd {workspace} && git checkout -b {branch} && git add -A && git commit -m '{message}' && git push origin {branch}"
    ))
}

/// One row of the task table.
pub struct TaskEntry {
    /// Module name; the task's key in the registry.
    pub name: &'static str,
    pub slug: &'static str,
    pub build: fn() -> Task,
}

macro_rules! entry {
    ($module:ident) => {
        TaskEntry {
            name: stringify!($module),
            slug: $module::SLUG,
            build: $module::task,
        }
    };
}

/// All tasks, in name order.
pub const ENTRIES: &[TaskEntry] = &[
    entry!(agentic_grader_test),
    entry!(basic),
    entry!(eval_reward),
    entry!(github_linear),
    entry!(notification_bug),
    entry!(openai_schema),
    entry!(order_pricing),
    entry!(sentry_triage),
    entry!(settings_bug),
    entry!(webhook_bug),
];

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

const fn has_duplicate_slugs(entries: &[TaskEntry]) -> bool {
    let mut i = 0;
    while i < entries.len() {
        let mut j = i + 1;
        while j < entries.len() {
            if str_eq(entries[i].slug, entries[j].slug) {
                return true;
            }
            j += 1;
        }
        i += 1;
    }
    false
}

const _: () = assert!(!has_duplicate_slugs(ENTRIES), "two tasks share a slug");

/// Name-keyed view over a set of tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Task>,
}

impl TaskRegistry {
    /// The tasks shipped in this crate.
    pub fn builtin() -> Self {
        Self::from_tasks(ENTRIES.iter().map(|e| (e.name.to_string(), (e.build)())))
    }

    pub fn from_tasks(tasks: impl IntoIterator<Item = (String, Task)>) -> Self {
        Self {
            tasks: tasks.into_iter().collect(),
        }
    }

    /// name → task, in name order.
    pub fn tasks(&self) -> &BTreeMap<String, Task> {
        &self.tasks
    }

    /// name → slug, for tasks with a non-empty slug.
    pub fn task_ids(&self) -> BTreeMap<String, String> {
        self.tasks
            .iter()
            .filter(|(_, t)| !t.slug.is_empty())
            .map(|(name, t)| (name.clone(), t.slug.clone()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Tasks whose name contains `filter`.
    pub fn matching<'a>(&'a self, filter: &'a str) -> impl Iterator<Item = (&'a str, &'a Task)> + 'a {
        self.tasks
            .iter()
            .filter(move |(name, _)| name.contains(filter))
            .map(|(name, task)| (name.as_str(), task))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_registry_has_all_tasks() {
        let registry = TaskRegistry::builtin();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.names()[0], "agentic_grader_test");
        assert!(registry.get("eval_reward").is_some());
    }

    #[test]
    fn test_entry_slugs_match_built_tasks() {
        for entry in ENTRIES {
            let task = (entry.build)();
            assert_eq!(task.slug, entry.slug, "task {}", entry.name);
        }
    }

    #[test]
    fn test_task_ids_unique_and_non_empty() {
        let ids = TaskRegistry::builtin().task_ids();
        assert_eq!(ids.len(), 10);
        let unique: HashSet<_> = ids.values().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_task_args_decode_into_scenario_args() {
        for (name, task) in TaskRegistry::builtin().tasks() {
            let ok = match task.scenario {
                ScenarioKind::BugFix => serde_json::from_value::<BugFixArgs>(task.args.clone()).is_ok(),
                ScenarioKind::BugFixLinear => {
                    serde_json::from_value::<BugFixLinearArgs>(task.args.clone()).is_ok()
                }
            };
            assert!(ok, "args of {name} do not decode");
        }
    }

    #[test]
    fn test_duplicate_detection() {
        fn t() -> Task {
            Task::new("x", ScenarioKind::BugFix, json!({}))
        }
        let dup = [
            TaskEntry { name: "a", slug: "same", build: t },
            TaskEntry { name: "b", slug: "same", build: t },
        ];
        assert!(has_duplicate_slugs(&dup));
        assert!(!has_duplicate_slugs(&ENTRIES[..2]));
    }

    #[test]
    fn test_matching_and_empty_slug_ids() {
        let registry = TaskRegistry::from_tasks([
            ("order_pricing".to_string(), Task::new("order_pricing", ScenarioKind::BugFix, json!({}))),
            ("settings_bug".to_string(), Task::new("", ScenarioKind::BugFix, json!({}))),
        ]);
        assert_eq!(registry.matching("bug").count(), 1);
        assert_eq!(registry.task_ids().len(), 1);
    }

    #[test]
    fn test_golden_patch_step() {
        assert!(golden_patch_step("/w", "  \n").is_none());
        let step = golden_patch_step("/w", "diff --git a/x b/x").unwrap();
        assert_eq!(
            step.command().unwrap(),
            "cd /w && git apply <<'GOLDEN_PATCH'\ndiff --git a/x b/x\nGOLDEN_PATCH"
        );
    }
}

//! Reconcile local tasks with a remote taskset.
//!
//! Local tasks are projected into [`TaskSpec`]s keyed by slug, each carrying
//! a signature (scenario name plus canonical JSON of its args). The remote
//! taskset is indexed by slug, and every local task is classified as
//! create, update, or unchanged by exact signature comparison. Only create
//! and update entries are uploaded, and only after confirmation.

pub mod client;

pub use client::{HudApiClient, TaskStore, UploadRequest, UploadResponse, UploadTask};

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;
use crate::tasks::{Task, TaskRegistry};

/// Sync-time projection of a local task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub name: String,
    pub task_id: String,
    pub scenario_name: String,
    pub args: Value,
    pub signature: String,
}

/// A task as returned by the remote; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
}

impl RemoteTask {
    /// Slug, falling back to `external_id` for older records.
    pub fn key(&self) -> Option<&str> {
        self.slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.external_id.as_deref().filter(|s| !s.is_empty()))
    }

    pub fn signature(&self) -> String {
        let empty = Value::Object(Default::default());
        let args = self.args.as_ref().filter(|a| a.is_object()).unwrap_or(&empty);
        signature(self.scenario.as_deref().unwrap_or_default(), args)
    }
}

/// A remote taskset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteTaskset {
    pub taskset_id: String,
    pub taskset_name: String,
    pub tasks: BTreeMap<String, RemoteTask>,
}

/// What a sync would do.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub taskset_name: String,
    pub taskset_id: String,
    pub taskset_exists: bool,
    pub to_create: Vec<TaskSpec>,
    pub to_update: Vec<TaskSpec>,
    pub unchanged: usize,
}

impl SyncPlan {
    /// Create and update entries, sorted by task id.
    pub fn to_upload(&self) -> Vec<&TaskSpec> {
        let mut specs: Vec<&TaskSpec> = self.to_create.iter().chain(&self.to_update).collect();
        specs.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        specs
    }

    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty()
    }
}

/// Serialize with keys sorted at every level and no whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// `"<scenario>|" + canonical_json(args)`.
pub fn signature(scenario: &str, args: &Value) -> String {
    format!("{scenario}|{}", canonical_json(args))
}

/// Project local tasks into specs, reporting every missing or shared slug at once.
pub fn build_local_specs(tasks: &BTreeMap<String, Task>) -> Result<Vec<TaskSpec>, SyncError> {
    let mut specs = Vec::with_capacity(tasks.len());
    let mut missing = Vec::new();

    for (name, task) in tasks {
        let args = match &task.args {
            Value::Null => Value::Object(Default::default()),
            args @ Value::Object(_) => args.clone(),
            other => {
                return Err(SyncError::InvalidArgs {
                    name: name.clone(),
                    found: json_type_name(other).to_string(),
                })
            }
        };
        let task_id = task.slug.trim();
        if task_id.is_empty() {
            missing.push(name.clone());
            continue;
        }
        let scenario_name = task.scenario.to_string();
        specs.push(TaskSpec {
            name: name.clone(),
            task_id: task_id.to_string(),
            signature: signature(&scenario_name, &args),
            scenario_name,
            args,
        });
    }

    if !missing.is_empty() {
        missing.sort();
        return Err(SyncError::MissingTaskIds(missing));
    }

    let mut by_id: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for spec in &specs {
        by_id.entry(&spec.task_id).or_default().push(&spec.name);
    }
    let duplicates: Vec<String> = by_id
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(id, mut names)| {
            names.sort();
            format!("{id} -> {}", names.join(", "))
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(SyncError::DuplicateTaskIds(duplicates.join(", ")));
    }

    Ok(specs)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Classify local specs against the remote taskset (`None` when it does not exist).
pub fn plan_sync(taskset: &str, remote: Option<&RemoteTaskset>, local: Vec<TaskSpec>) -> SyncPlan {
    let by_slug: HashMap<&str, &RemoteTask> = remote
        .map(|r| r.tasks.values().filter_map(|t| t.key().map(|k| (k, t))).collect())
        .unwrap_or_default();

    let mut plan = SyncPlan {
        taskset_name: remote
            .map(|r| r.taskset_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| taskset.to_string()),
        taskset_id: remote.map(|r| r.taskset_id.clone()).unwrap_or_default(),
        taskset_exists: remote.is_some(),
        to_create: Vec::new(),
        to_update: Vec::new(),
        unchanged: 0,
    };

    for spec in local {
        match by_slug.get(spec.task_id.as_str()) {
            None => plan.to_create.push(spec),
            Some(existing) if existing.signature() == spec.signature => plan.unchanged += 1,
            Some(_) => plan.to_update.push(spec),
        }
    }
    plan.to_create.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    plan.to_update.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    plan
}

/// Print the plan in the sync-tasks format.
pub fn render_plan(plan: &SyncPlan, env_name: &str, out: &mut dyn Write) -> std::io::Result<()> {
    let id = if plan.taskset_id.is_empty() {
        "new"
    } else {
        plan.taskset_id.as_str()
    };
    writeln!(
        out,
        "\nSync plan for taskset '{}' ({id}) on env '{env_name}':",
        plan.taskset_name
    )?;
    if !plan.taskset_exists {
        writeln!(out, "  taskset will be created")?;
    }
    if !plan.to_create.is_empty() {
        writeln!(out, "\n  Create ({}):", plan.to_create.len())?;
        for spec in &plan.to_create {
            writeln!(out, "    + {} ({})", spec.name, spec.task_id)?;
        }
    }
    if !plan.to_update.is_empty() {
        writeln!(out, "\n  Update ({}):", plan.to_update.len())?;
        for spec in &plan.to_update {
            writeln!(out, "    ~ {} ({})", spec.name, spec.task_id)?;
        }
    }
    if plan.unchanged > 0 {
        writeln!(out, "\n  Unchanged: {}", plan.unchanged)?;
    }
    Ok(())
}

/// Build the upload body for the plan's create and update entries.
pub fn upload_request(plan: &SyncPlan, env_name: &str) -> UploadRequest {
    UploadRequest {
        name: plan.taskset_name.clone(),
        tasks: plan
            .to_upload()
            .into_iter()
            .map(|spec| UploadTask::new(&spec.task_id, env_name, &spec.scenario_name, spec.args.clone()))
            .collect(),
    }
}

/// Source of the yes/no answer to the confirmation prompt.
pub trait Confirm {
    /// Show `prompt` and read one answer line. `None` on end of input.
    fn ask(&mut self, prompt: &str) -> std::io::Result<Option<String>>;
}

/// Reads the answer from a buffered reader (stdin in the CLI).
pub struct LineConfirm<R> {
    reader: R,
}

impl<R: BufRead> LineConfirm<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Confirm for LineConfirm<R> {
    fn ask(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// Which tasks to sync and where.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub taskset: String,
    pub env_name: String,
    /// Sync only this task.
    pub task: Option<String>,
    pub exclude: Vec<String>,
}

/// How a sync run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NothingToSync,
    /// The user declined; `interrupted` when input ended before an answer.
    Aborted { interrupted: bool },
    Synced {
        created: u64,
        updated: u64,
        unchanged: usize,
    },
}

/// Apply `--task` / `--exclude-task` to the registry.
pub fn select_tasks(
    registry: &TaskRegistry,
    options: &SyncOptions,
) -> Result<BTreeMap<String, Task>, SyncError> {
    let all = registry.tasks();
    if all.is_empty() {
        return Err(SyncError::NoTasks);
    }
    let available = || all.keys().cloned().collect::<Vec<_>>().join(", ");

    // A single selected task ignores excludes.
    if let Some(name) = &options.task {
        let task = all.get(name).ok_or_else(|| SyncError::UnknownTask {
            name: name.clone(),
            available: available(),
        })?;
        return Ok(BTreeMap::from([(name.clone(), task.clone())]));
    }

    let exclude: Vec<&str> = options
        .exclude
        .iter()
        .map(String::as_str)
        .filter(|name| !name.is_empty())
        .collect();
    let mut selected = all.clone();
    if !exclude.is_empty() {
        let mut missing: Vec<&str> = exclude
            .iter()
            .copied()
            .filter(|name| !all.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(SyncError::UnknownExcludes {
                missing: missing.join(", "),
                available: available(),
            });
        }
        for name in exclude {
            selected.remove(name);
        }
        if selected.is_empty() {
            return Err(SyncError::NothingLeft);
        }
    }
    Ok(selected)
}

/// Plan, confirm, and upload.
pub async fn run_sync(
    store: &dyn TaskStore,
    registry: &TaskRegistry,
    options: &SyncOptions,
    out: &mut dyn Write,
    confirm: &mut dyn Confirm,
) -> Result<SyncOutcome, SyncError> {
    let tasks = select_tasks(registry, options)?;
    let local = build_local_specs(&tasks)?;

    let remote = store.get_taskset(&options.taskset).await?;
    if remote.is_none() {
        tracing::info!(taskset = %options.taskset, "Taskset does not exist yet");
    }
    let plan = plan_sync(&options.taskset, remote.as_ref(), local);
    render_plan(&plan, &options.env_name, out)?;

    if plan.is_noop() {
        writeln!(out, "\nNothing to sync, all tasks up to date.")?;
        return Ok(SyncOutcome::NothingToSync);
    }

    let answer = match confirm.ask("\nProceed? [y/N] ")? {
        Some(answer) => answer,
        None => {
            writeln!(out, "\nAborted.")?;
            return Ok(SyncOutcome::Aborted { interrupted: true });
        }
    };
    if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        writeln!(out, "Aborted.")?;
        return Ok(SyncOutcome::Aborted { interrupted: false });
    }

    let request = upload_request(&plan, &options.env_name);
    tracing::info!(taskset = %request.name, tasks = request.tasks.len(), "Uploading tasks");
    let response = store.upload(&request).await?;

    writeln!(out, "Sync complete.")?;
    writeln!(out, "  - created: {}", response.tasks_created)?;
    writeln!(out, "  - updated: {}", response.tasks_updated)?;
    writeln!(out, "  - unchanged: {}", plan.unchanged)?;
    Ok(SyncOutcome::Synced {
        created: response.tasks_created,
        updated: response.tasks_updated,
        unchanged: plan.unchanged,
    })
}

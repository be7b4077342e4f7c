//! Agentic grader.
//!
//! For each criterion a grading model explores the graded workspace with
//! shell commands for a bounded number of turns, then returns a verdict.
//! Every criterion becomes its own subscore with the exploration trail in
//! `info.action_log`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Subscore;
use crate::error::GradeError;
use crate::exec::{truncate, CommandRunner};
use crate::llm::{extract_json_object, GenerationRequest, LlmProvider, Message};
use crate::services::{GitHubService, LinearService};

const OBSERVATION_LIMIT: usize = 6000;

/// One grading criterion: a rubric and its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgenticCriterion {
    pub rubric: String,
    pub weight: f64,
}

/// Configuration for the exploration loop.
#[derive(Debug, Clone)]
pub struct AgenticConfig {
    pub model: String,
    /// Exploration turns per criterion before a verdict is forced.
    pub max_turns: usize,
    pub command_timeout: Duration,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AgenticConfig {
    fn default() -> Self {
        Self {
            model: "claude-opus-4-6".to_string(),
            max_turns: 10,
            command_timeout: Duration::from_secs(60),
            temperature: 0.0,
            max_tokens: 2048,
        }
    }
}

impl AgenticConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}

/// A shell command the grading model ran while exploring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStep {
    pub action: String,
    pub command: String,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone)]
struct Verdict {
    passed: Option<bool>,
    score: f64,
    reasoning: String,
}

enum Reply {
    Bash(String),
    Verdict(Verdict),
    Invalid,
}

fn parse_reply(content: &str) -> Reply {
    let Some(value) = extract_json_object(content) else {
        return Reply::Invalid;
    };
    match value.get("action").and_then(Value::as_str) {
        Some("bash") => match value.get("command").and_then(Value::as_str) {
            Some(cmd) if !cmd.trim().is_empty() => Reply::Bash(cmd.to_string()),
            _ => Reply::Invalid,
        },
        Some("verdict") => {
            let passed = value.get("passed").and_then(Value::as_bool);
            let score = value
                .get("score")
                .and_then(Value::as_f64)
                .or_else(|| passed.map(|p| f64::from(u8::from(p))))
                .unwrap_or(0.0);
            Reply::Verdict(Verdict {
                passed,
                score: score.clamp(0.0, 1.0),
                reasoning: value
                    .get("reasoning")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        }
        _ => Reply::Invalid,
    }
}

const SYSTEM_PROMPT: &str = "You are grading the work of a coding agent. You can explore the machine the \
agent worked on by running shell commands. Each reply must be exactly one JSON object, either\n\
  {\"action\": \"bash\", \"command\": \"<shell command>\"}\n\
to run a command and see its output, or\n\
  {\"action\": \"verdict\", \"passed\": true|false, \"score\": <0..1>, \"reasoning\": \"<why>\"}\n\
once you can judge the criterion. Do not modify files.";

const FORCE_VERDICT: &str = "You have used all exploration turns. Reply now with your verdict JSON object.";

const INVALID_REPLY: &str = "Your reply was not a valid action. Reply with one JSON object with \"action\" \
set to \"bash\" or \"verdict\".";

/// Exploration-based grader over a list of criteria.
pub struct AgenticGrader {
    provider: Arc<dyn LlmProvider>,
    runner: Arc<dyn CommandRunner>,
    config: AgenticConfig,
    github: Option<Arc<dyn GitHubService>>,
    linear: Option<Arc<dyn LinearService>>,
}

impl AgenticGrader {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        runner: Arc<dyn CommandRunner>,
        config: AgenticConfig,
    ) -> Self {
        Self {
            provider,
            runner,
            config,
            github: None,
            linear: None,
        }
    }

    /// Include the agent's service activity in the grading context.
    pub fn with_services(
        mut self,
        github: Arc<dyn GitHubService>,
        linear: Arc<dyn LinearService>,
    ) -> Self {
        self.github = Some(github);
        self.linear = Some(linear);
        self
    }

    /// Grade each criterion, one subscore per criterion.
    pub async fn grade(
        &self,
        task_prompt: &str,
        criteria: &[AgenticCriterion],
    ) -> Result<Vec<Subscore>, GradeError> {
        let activity = self.service_activity().await;
        let mut subscores = Vec::with_capacity(criteria.len());
        for (i, criterion) in criteria.iter().enumerate() {
            let name = format!("criterion_{}", i + 1);
            let subscore = match self.grade_criterion(task_prompt, criterion, &activity).await {
                Ok((verdict, steps)) => Subscore::new(&name, criterion.weight, verdict.score)
                    .with_info(json!({
                        "rubric": criterion.rubric,
                        "passed": verdict.passed,
                        "reasoning": verdict.reasoning,
                        "action_log": steps,
                    })),
                Err(e) => {
                    tracing::warn!(criterion = %name, error = %e, "Agentic grading failed");
                    Subscore::new(&name, criterion.weight, 0.0).with_info(json!({
                        "rubric": criterion.rubric,
                        "passed": false,
                        "reasoning": format!("grader error: {e}"),
                        "action_log": [],
                    }))
                }
            };
            subscores.push(subscore);
        }
        Ok(subscores)
    }

    async fn service_activity(&self) -> Value {
        let mut activity = serde_json::Map::new();
        if let Some(github) = &self.github {
            if let Ok(prs) = github.pull_requests().await {
                activity.insert("github_pull_requests".into(), json!(prs));
            }
        }
        if let Some(linear) = &self.linear {
            if let Ok(log) = linear.action_log().await {
                activity.insert("linear_actions".into(), json!(log));
            }
        }
        Value::Object(activity)
    }

    async fn grade_criterion(
        &self,
        task_prompt: &str,
        criterion: &AgenticCriterion,
        activity: &Value,
    ) -> Result<(Verdict, Vec<ActionStep>), GradeError> {
        let mut conversation = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!(
                "The agent was given this task:\n\n{task_prompt}\n\n\
                 Criterion to judge:\n{}\n\n\
                 Agent service activity:\n{}\n\n\
                 You have up to {} commands.",
                criterion.rubric,
                serde_json::to_string_pretty(activity).unwrap_or_default(),
                self.config.max_turns
            )),
        ];
        let mut steps = Vec::new();

        for turn in 0..=self.config.max_turns {
            if turn == self.config.max_turns {
                conversation.push(Message::user(FORCE_VERDICT));
            }
            let request = GenerationRequest::new(self.config.model.clone(), conversation.clone())
                .with_temperature(self.config.temperature)
                .with_max_tokens(self.config.max_tokens);
            let reply = self.provider.generate(request).await?.content;
            conversation.push(Message::assistant(&reply));

            match parse_reply(&reply) {
                Reply::Verdict(verdict) => return Ok((verdict, steps)),
                Reply::Bash(_) | Reply::Invalid if turn == self.config.max_turns => break,
                Reply::Bash(command) => {
                    let observation = self.explore(&command, &mut steps).await;
                    conversation.push(Message::user(observation));
                }
                Reply::Invalid => conversation.push(Message::user(INVALID_REPLY)),
            }
        }

        Ok((
            Verdict {
                passed: Some(false),
                score: 0.0,
                reasoning: "no verdict within the turn limit".to_string(),
            },
            steps,
        ))
    }

    async fn explore(&self, command: &str, steps: &mut Vec<ActionStep>) -> String {
        tracing::debug!(command = %truncate(command, 120), "Agentic grader exploring");
        match self.runner.run(command, Some(self.config.command_timeout)).await {
            Ok(out) => {
                steps.push(ActionStep {
                    action: "bash".to_string(),
                    command: command.to_string(),
                    exit_code: Some(out.exit_code),
                });
                format!(
                    "exit code: {}\nstdout:\n{}\nstderr:\n{}",
                    out.exit_code,
                    truncate(&out.stdout, OBSERVATION_LIMIT),
                    truncate(&out.stderr, OBSERVATION_LIMIT / 4)
                )
            }
            Err(e) => {
                steps.push(ActionStep {
                    action: "bash".to_string(),
                    command: command.to_string(),
                    exit_code: None,
                });
                format!("command failed: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::LocalRunner;
    use crate::graders::rubric::tests::MockLlmProvider;

    fn criterion(rubric: &str, weight: f64) -> AgenticCriterion {
        AgenticCriterion {
            rubric: rubric.to_string(),
            weight,
        }
    }

    #[test]
    fn test_parse_reply() {
        assert!(matches!(
            parse_reply(r#"{"action": "bash", "command": "ls"}"#),
            Reply::Bash(c) if c == "ls"
        ));
        assert!(matches!(
            parse_reply(r#"{"action": "verdict", "passed": true, "reasoning": "ok"}"#),
            Reply::Verdict(Verdict { score, .. }) if score == 1.0
        ));
        assert!(matches!(parse_reply("I think it passes"), Reply::Invalid));
        assert!(matches!(parse_reply(r#"{"action": "bash"}"#), Reply::Invalid));
    }

    #[tokio::test]
    async fn test_explores_then_judges() {
        let mock = Arc::new(MockLlmProvider::new(&[
            r#"{"action": "bash", "command": "echo json.dumps"}"#,
            r#"{"action": "verdict", "passed": true, "score": 1.0, "reasoning": "uses json.dumps"}"#,
        ]));
        let grader = AgenticGrader::new(mock.clone(), Arc::new(LocalRunner), AgenticConfig::default());
        let subs = grader
            .grade("Fix server.py", &[criterion("Is JSON valid?", 0.5)])
            .await
            .unwrap();

        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name, "criterion_1");
        assert_eq!(subs[0].value, 1.0);
        assert_eq!(subs[0].info["action_log"][0]["command"], "echo json.dumps");

        let prompts = mock.prompts.lock().unwrap();
        let last = prompts.last().unwrap();
        assert!(last.iter().any(|m| m.content.contains("json.dumps") && m.role == "user"));
    }

    #[tokio::test]
    async fn test_turn_limit_forces_verdict() {
        let mock = Arc::new(MockLlmProvider::new(&[
            r#"{"action": "bash", "command": "true"}"#,
            r#"{"action": "bash", "command": "true"}"#,
        ]));
        let config = AgenticConfig::default().with_max_turns(1);
        let grader = AgenticGrader::new(mock, Arc::new(LocalRunner), config);
        let subs = grader.grade("t", &[criterion("r", 1.0)]).await.unwrap();
        assert_eq!(subs[0].value, 0.0);
        assert_eq!(subs[0].info["passed"], false);
        assert_eq!(subs[0].info["action_log"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_zeroes_criterion() {
        let mock = Arc::new(MockLlmProvider::new(&[]));
        let grader = AgenticGrader::new(mock, Arc::new(LocalRunner), AgenticConfig::default());
        let subs = grader
            .grade("t", &[criterion("a", 0.5), criterion("b", 0.5)])
            .await
            .unwrap();
        assert_eq!(subs.len(), 2);
        assert!(subs.iter().all(|s| s.value == 0.0));
    }
}

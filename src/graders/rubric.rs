//! Rubric graders that ask a grading model to judge service activity.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Grader, Subscore};
use crate::error::{GradeError, LlmError};
use crate::exec::truncate;
use crate::llm::{extract_json_object, GenerationRequest, LlmProvider, Message};
use crate::services::{GitHubService, LinearService};

/// Grading model used when a task does not name one.
pub const DEFAULT_JUDGE_MODEL: &str = "anthropic/claude-sonnet-4";

const EVIDENCE_LIMIT: usize = 30_000;

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict grader for a software engineering benchmark. \
You are given a rubric and a JSON record of what an agent did. Judge only from the record. \
Reply with a single JSON object: {\"score\": <number between 0 and 1>, \"reasoning\": \"<one paragraph>\"}.";

/// A grading model handle.
#[derive(Clone)]
pub struct Judge {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl Judge {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: DEFAULT_JUDGE_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn provider(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.provider)
    }

    /// Ask the model to score `evidence` against `rubric`.
    pub async fn score(&self, rubric: &str, evidence: &Value) -> Result<(f64, String), GradeError> {
        let evidence = serde_json::to_string_pretty(evidence).unwrap_or_default();
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![
                Message::system(JUDGE_SYSTEM_PROMPT),
                Message::user(format!(
                    "Rubric:\n{rubric}\n\nRecord:\n{}",
                    truncate(&evidence, EVIDENCE_LIMIT)
                )),
            ],
        )
        .with_temperature(0.0)
        .with_max_tokens(1024);

        let response = self.provider.generate(request).await?;
        parse_verdict(&response.content)
    }
}

/// Read `{score, reasoning}` (or `{passed, reasoning}`) from a model reply.
pub(crate) fn parse_verdict(content: &str) -> Result<(f64, String), GradeError> {
    let value = extract_json_object(content).ok_or_else(|| {
        LlmError::ParseError(format!("no JSON verdict in reply: {}", truncate(content, 200)))
    })?;
    let score = match (value.get("score"), value.get("passed")) {
        (Some(score), _) if score.is_number() => score.as_f64().unwrap_or(0.0),
        (_, Some(Value::Bool(passed))) => f64::from(u8::from(*passed)),
        _ => {
            return Err(LlmError::ParseError("verdict has no 'score' or 'passed'".to_string()).into())
        }
    };
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok((score.clamp(0.0, 1.0), reasoning))
}

/// Judges the agent's GitHub activity (pull requests and tool calls).
pub struct GitHubLogRubricGrader {
    github: Arc<dyn GitHubService>,
    judge: Option<Judge>,
    rubric: String,
    weight: f64,
}

impl GitHubLogRubricGrader {
    pub fn new(
        github: Arc<dyn GitHubService>,
        judge: Option<Judge>,
        rubric: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            github,
            judge,
            rubric: rubric.into(),
            weight,
        }
    }
}

#[async_trait]
impl Grader for GitHubLogRubricGrader {
    fn name(&self) -> &str {
        "github_log_rubric"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn evaluate(&self) -> Result<Subscore, GradeError> {
        let judge = self.judge.as_ref().ok_or(GradeError::NoJudge)?;
        let evidence = json!({
            "pull_requests": self.github.pull_requests().await?,
            "actions": self.github.action_log().await?,
        });
        let (score, reasoning) = judge.score(&self.rubric, &evidence).await?;
        Ok(Subscore::new(self.name(), self.weight, score)
            .with_info(json!({ "rubric": self.rubric, "reasoning": reasoning })))
    }
}

/// Judges the agent's Linear activity (issue state, comments, tool calls).
pub struct LinearLogRubricGrader {
    linear: Arc<dyn LinearService>,
    judge: Option<Judge>,
    rubric: String,
    weight: f64,
}

impl LinearLogRubricGrader {
    pub fn new(
        linear: Arc<dyn LinearService>,
        judge: Option<Judge>,
        rubric: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            linear,
            judge,
            rubric: rubric.into(),
            weight,
        }
    }
}

#[async_trait]
impl Grader for LinearLogRubricGrader {
    fn name(&self) -> &str {
        "linear_log_rubric"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn evaluate(&self) -> Result<Subscore, GradeError> {
        let judge = self.judge.as_ref().ok_or(GradeError::NoJudge)?;
        let evidence = json!({
            "issues": self.linear.issues().await?,
            "actions": self.linear.action_log().await?,
        });
        let (score, reasoning) = judge.score(&self.rubric, &evidence).await?;
        Ok(Subscore::new(self.name(), self.weight, score)
            .with_info(json!({ "rubric": self.rubric, "reasoning": reasoning })))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exec::LocalRunner;
    use crate::llm::GenerationResponse;
    use crate::services::{GitHubConfig, LocalGitHub};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records the prompts it saw.
    pub(crate) struct MockLlmProvider {
        replies: Mutex<VecDeque<String>>,
        pub(crate) prompts: Mutex<Vec<Vec<Message>>>,
    }

    impl MockLlmProvider {
        pub(crate) fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            self.prompts.lock().unwrap().push(request.messages);
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::RequestFailed("no more replies".to_string()))?;
            Ok(GenerationResponse {
                model: request.model,
                content,
            })
        }
    }

    #[test]
    fn test_parse_verdict_variants() {
        assert_eq!(parse_verdict(r#"{"score": 0.5, "reasoning": "half"}"#).unwrap().0, 0.5);
        assert_eq!(parse_verdict(r#"ok: {"passed": true}"#).unwrap().0, 1.0);
        assert_eq!(parse_verdict(r#"{"score": 7}"#).unwrap().0, 1.0);
        assert!(parse_verdict("looks good to me").is_err());
        assert!(parse_verdict(r#"{"reasoning": "?"}"#).is_err());
    }

    #[tokio::test]
    async fn test_github_rubric_sends_pull_requests() {
        let tmp = tempfile::tempdir().unwrap();
        let github = Arc::new(LocalGitHub::new(Arc::new(LocalRunner)));
        github
            .configure(GitHubConfig {
                bare_repo_path: tmp.path().join("p.git"),
                data_dir: tmp.path().to_path_buf(),
                repo_owner: "acme-corp".into(),
                repo_name: "svc".into(),
                default_branch: "b".into(),
                repo_setup: Default::default(),
            })
            .await
            .unwrap();
        github
            .call_tool("create_pull_request", &json!({"title": "fix: leak", "head": "fix/leak"}))
            .await
            .unwrap();

        let mock = Arc::new(MockLlmProvider::new(&[r#"{"score": 1.0, "reasoning": "clear PR"}"#]));
        let grader = GitHubLogRubricGrader::new(
            github,
            Some(Judge::new(mock.clone())),
            "Did the agent open a PR?",
            0.2,
        );
        let sub = grader.evaluate().await.unwrap();
        assert_eq!(sub.value, 1.0);
        assert_eq!(sub.info["reasoning"], "clear PR");

        let prompts = mock.prompts.lock().unwrap();
        assert!(prompts[0][1].content.contains("fix: leak"));
        assert!(prompts[0][1].content.contains("Did the agent open a PR?"));
    }

    #[tokio::test]
    async fn test_rubric_without_judge_errors() {
        let github = Arc::new(LocalGitHub::new(Arc::new(LocalRunner)));
        let grader = GitHubLogRubricGrader::new(github, None, "r", 0.2);
        assert!(matches!(grader.evaluate().await, Err(GradeError::NoJudge)));
    }
}
